//! Output schemas handed to the model.
//!
//! The schemas use the OpenAPI subset accepted by Gemini's `responseSchema`
//! (upper-case type names, `required`, `enum`, `description`). That dialect
//! has no `$ref`, so the recursive topic node is unrolled: level `depth` is
//! emitted without a `subtopics` property.

use serde_json::{json, Map, Value};

/// Default unroll depth for the topic node.
pub const DEFAULT_SCHEMA_DEPTH: usize = 6;

fn image_table_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "type": {
                "type": "STRING",
                "enum": ["image", "table"],
                "description": "The type of content, either 'image' or 'table'."
            },
            "description": {
                "type": "STRING",
                "description": "A detailed description of the image or a summary of the table's data."
            },
            "pageNumber": {
                "type": "INTEGER",
                "description": "The page number where the image or table is located."
            },
            "caption": {
                "type": "STRING",
                "description": "The caption of the image or table, if available."
            }
        },
        "required": ["type", "description", "pageNumber"]
    })
}

/// Schema of one topic node whose subtree may hold `remaining` more levels.
fn node_schema(remaining: usize) -> Value {
    let mut properties = Map::new();
    properties.insert(
        "title".into(),
        json!({
            "type": "STRING",
            "description": "The title of the topic or subtopic. MUST be extracted from the document."
        }),
    );
    properties.insert(
        "summary".into(),
        json!({
            "type": "STRING",
            "description": "A concise 2-3 sentence summary of the topic, rich with keywords for searchability."
        }),
    );
    properties.insert(
        "confidenceScore".into(),
        json!({
            "type": "INTEGER",
            "description": "Integer from 0 to 100: relevance and clarity of the extracted topic."
        }),
    );
    if remaining > 1 {
        properties.insert(
            "subtopics".into(),
            json!({
                "type": "ARRAY",
                "description": "Nested subtopics. Build a deep hierarchy (5-6 levels or more) when the document supports it.",
                "items": node_schema(remaining - 1)
            }),
        );
    }
    properties.insert(
        "image_table_info".into(),
        json!({
            "type": "ARRAY",
            "description": "Important images or tables within this topic, with captions and descriptions.",
            "items": image_table_schema()
        }),
    );

    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": ["title", "summary", "confidenceScore"]
    })
}

/// Schema of the full model answer: `{ taxonomy: [node], metadata: {...} }`.
///
/// `depth` is clamped to at least 1.
pub fn taxonomy_response_schema(depth: usize) -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "taxonomy": {
                "type": "ARRAY",
                "description": "The complete, hierarchical taxonomy of the PDF. MUST be an array of top-level topics.",
                "items": node_schema(depth.max(1))
            },
            "metadata": {
                "type": "OBJECT",
                "properties": {
                    "numberOfTopics": {
                        "type": "INTEGER",
                        "description": "The TOTAL number of topics and subtopics in the entire taxonomy."
                    },
                    "pageRangeAnalyzed": {
                        "type": "STRING",
                        "description": "The page range that was analyzed (e.g. \"1-10\" or \"all pages\")."
                    },
                    "imagesTablesAnalyzed": {
                        "type": "INTEGER",
                        "description": "The total number of images and tables analyzed in the document."
                    }
                },
                "required": ["numberOfTopics", "pageRangeAnalyzed", "imagesTablesAnalyzed"]
            }
        },
        "required": ["taxonomy", "metadata"]
    })
}

/// Schema of the content-filtering answer: `{ filteredText: string }`.
pub fn filter_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "filteredText": {
                "type": "STRING",
                "description": "The filtered text content of the document."
            }
        },
        "required": ["filteredText"]
    })
}
