//! Prompts for taxonomy generation and content filtering.
//!
//! Every prompt lives here so a wording change touches exactly one place and
//! unit tests can inspect the text without a model. Callers can replace the
//! taxonomy prompt via [`crate::config::TaxonomyConfig::prompt_template`];
//! the `{page_start}` and `{page_end}` placeholders are substituted either way.

use crate::config::PageRange;

/// Default taxonomy prompt template.
pub const TAXONOMY_PROMPT_TEMPLATE: &str = r#"You are an expert document analysis system. Analyze the attached PDF and produce a deep, comprehensive, hierarchical taxonomy of its content.

PRIMARY GOAL: build a multi-level hierarchy of topics and subtopics (5-6 levels or more when the document supports it) that mirrors the document's structure.

PAGE RANGE: analyze from page {page_start} to {page_end}.

1. HIERARCHY
   - Derive the hierarchy from the document's headings, sections and content flow.
   - Do not cap the depth. A well-structured document should yield at least 5-6 levels.
   - Nest every subtopic inside its parent topic; the output is a tree.

2. CONTENT
   - Every topic and subtopic MUST have a `title` and a `summary`.
   - Title: taken from the document's headings, or a concise label for the topic.
   - Summary: 2-3 sentences, dense with keywords so it is useful for search.
   - confidenceScore: an integer from 0 to 100 reflecting how clearly the topic is defined in the source.

3. IMAGES AND TABLES
   - Identify the important images, figures and tables relevant to each topic.
   - For each one record its caption (if any), its page number, and a detailed description of what it shows or the data it contains.
   - Put these entries in the `image_table_info` array of the topic they belong to.

4. QUALITY
   - Ignore page numbers, running headers and footers, and boilerplate. Keep to the substance of the document.
   - Stay faithful to the source: titles, summaries and data must come from the document.
   - Reproduce mathematical formulas and equations accurately where they appear in summaries or descriptions.

5. METADATA
   - numberOfTopics: the count of ALL topics and subtopics in the whole tree.
   - pageRangeAnalyzed: the range of pages you analyzed (e.g. "1-10" or "all pages").
   - imagesTablesAnalyzed: the count of all images and tables you described.

OUTPUT: respond with a single valid JSON object that follows the output schema exactly. Its root holds the `taxonomy` array of top-level topics and the `metadata` object. No commentary, no Markdown fences."#;

/// Appended to the system message when the transport cannot enforce a
/// response schema natively. `{schema}` is replaced with the JSON schema.
pub const SCHEMA_INSTRUCTION: &str = r#"

OUTPUT SCHEMA (JSON):
{schema}"#;

/// User-turn text accompanying the page images on the page-image transport.
pub const PAGE_IMAGES_USER_TEXT: &str =
    "The attached images are the pages of the PDF, in order. Produce the taxonomy JSON now.";

/// Prompt for stripping headers, footers and boilerplate from document text.
pub const FILTER_CONTENT_PROMPT: &str = r#"You are an expert in document processing.
Remove irrelevant content from the document text below, such as running headers, footers, page numbers and boilerplate, and keep only the meaningful content. Do not summarize or rewrite what remains.

Respond with a single JSON object of the form {"filteredText": "<the filtered text>"}.

Document text:
"""
{document_text}
""""#;

/// Render the taxonomy prompt for a page range.
///
/// `template` defaults to [`TAXONOMY_PROMPT_TEMPLATE`]. A missing start reads
/// as page 1, a missing end as "the final page".
pub fn taxonomy_prompt(template: Option<&str>, range: &PageRange) -> String {
    let start = range.start.unwrap_or(1).to_string();
    let end = range
        .end
        .map(|e| e.to_string())
        .unwrap_or_else(|| "the final page".to_string());
    template
        .unwrap_or(TAXONOMY_PROMPT_TEMPLATE)
        .replace("{page_start}", &start)
        .replace("{page_end}", &end)
}

/// Append the schema to a prompt for transports without native schema support.
pub fn with_schema_instruction(prompt: &str, schema: &serde_json::Value) -> String {
    let pretty = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
    format!("{prompt}{}", SCHEMA_INSTRUCTION.replace("{schema}", &pretty))
}

/// Render the content-filtering prompt.
pub fn filter_content_prompt(document_text: &str) -> String {
    FILTER_CONTENT_PROMPT.replace("{document_text}", document_text)
}
