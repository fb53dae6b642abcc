//! Post-processing: turn raw model text into a [`TaxonomyResult`].
//!
//! Even schema-constrained models occasionally wrap their JSON in
//! ` ```json ... ``` ` fences, prepend a sentence of prose, or emit a BOM.
//! The rules here are cheap and deterministic:
//!
//! 1. Strip invisible Unicode (BOM, zero-width characters)
//! 2. Strip an outer Markdown code fence
//! 3. Cut the outermost JSON value out of any surrounding prose, skipping
//!    bracketed prose that is not JSON
//! 4. Decode leniently (see [`crate::output`])
//!
//! [`enrich`] then attaches the locally computed metadata.

use crate::config::PageRange;
use crate::error::TaxonomyError;
use crate::output::{FilteredContent, ModelTaxonomy, TaxonomyMetadata, TaxonomyResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

const EXCERPT_CHARS: usize = 200;

/// Unparseable bracket candidates tried before giving up.
const MAX_REJECTED_CANDIDATES: usize = 32;

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)\r?\n?```\s*$").unwrap());

static RE_INVISIBLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\u{FEFF}\u{200B}\u{200C}\u{200D}\u{2060}]").unwrap());

fn remove_invisible_chars(input: &str) -> String {
    RE_INVISIBLE.replace_all(input, "").into_owned()
}

fn strip_code_fences(input: &str) -> String {
    let trimmed = input.trim();
    if let Some(caps) = RE_OUTER_FENCES.captures(trimmed) {
        caps[1].to_string()
    } else {
        trimmed.to_string()
    }
}

/// The outermost JSON value in `input`, ignoring text around it.
///
/// Every `{` or `[` is a candidate start. Candidates that do not parse are
/// skipped, so bracketed prose such as `pages [1-10]` ahead of the answer is
/// not mistaken for it. The longest candidate that parses wins. A value that
/// never closes (a truncated answer) ends the search and is returned as is
/// for the decoder to report.
pub fn extract_json(input: &str) -> Option<&str> {
    let mut first = None;
    let mut best: Option<&str> = None;
    let mut rejected = 0;
    let mut pos = 0;

    while let Some(found) = input[pos..].find(['{', '[']) {
        let start = pos + found;
        let Some(candidate) = balanced_slice(&input[start..]) else {
            return best.or(Some(&input[start..]));
        };
        first.get_or_insert(candidate);

        if serde_json::from_str::<Value>(candidate).is_ok() {
            if best.map_or(true, |b| candidate.len() > b.len()) {
                best = Some(candidate);
            }
            pos = start + candidate.len();
        } else {
            rejected += 1;
            if rejected >= MAX_REJECTED_CANDIDATES {
                break;
            }
            pos = start + 1;
        }
    }
    best.or(first)
}

/// The bracketed value at the start of `input`, or `None` if it never closes.
/// Brackets inside string literals are skipped.
fn balanced_slice(input: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in input.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&input[..offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

fn excerpt(text: &str) -> String {
    text.chars().take(EXCERPT_CHARS).collect()
}

/// Clean raw model text down to a JSON value.
fn decode_json(raw: &str) -> Result<Value, TaxonomyError> {
    let cleaned = strip_code_fences(&remove_invisible_chars(raw));
    if cleaned.is_empty() {
        return Err(TaxonomyError::EmptyResponse);
    }
    let json = extract_json(&cleaned).ok_or_else(|| TaxonomyError::MalformedResponse {
        detail: "no JSON object found".to_string(),
        excerpt: excerpt(&cleaned),
    })?;
    serde_json::from_str(json).map_err(|e| TaxonomyError::MalformedResponse {
        detail: e.to_string(),
        excerpt: excerpt(&cleaned),
    })
}

/// Decode a model answer into the taxonomy and the metadata the model reported.
///
/// A bare array at the root is read as the `taxonomy` array. An object
/// without a `taxonomy` key is malformed.
pub fn parse_model_taxonomy(raw: &str) -> Result<ModelTaxonomy, TaxonomyError> {
    let value = match decode_json(raw)? {
        Value::Array(items) => serde_json::json!({ "taxonomy": items }),
        Value::Object(map) if map.contains_key("taxonomy") => Value::Object(map),
        other => {
            return Err(TaxonomyError::MalformedResponse {
                detail: "missing 'taxonomy' field".to_string(),
                excerpt: excerpt(&other.to_string()),
            })
        }
    };

    serde_json::from_value(value.clone()).map_err(|e| TaxonomyError::MalformedResponse {
        detail: e.to_string(),
        excerpt: excerpt(&value.to_string()),
    })
}

/// Decode a content-filtering answer.
pub fn parse_filtered(raw: &str) -> Result<FilteredContent, TaxonomyError> {
    let value = decode_json(raw)?;
    serde_json::from_value(value.clone()).map_err(|e| TaxonomyError::MalformedResponse {
        detail: e.to_string(),
        excerpt: excerpt(&value.to_string()),
    })
}

/// Format a duration the way `processingTime` is reported: seconds, two decimals.
pub fn format_processing_time(elapsed: Duration) -> String {
    format!("{:.2}s", elapsed.as_secs_f64())
}

/// Build the final result from the decoded model answer.
///
/// Counts are recomputed from the tree; a disagreeing model count is logged
/// and discarded. `pageRangeAnalyzed` keeps the model's wording when present,
/// otherwise describes `requested`.
pub fn enrich(model: ModelTaxonomy, elapsed: Duration, requested: &PageRange) -> TaxonomyResult {
    let mut result = TaxonomyResult {
        taxonomy: model.taxonomy,
        metadata: TaxonomyMetadata::default(),
    };
    let topics = result.count_topics();
    let images_tables = result.count_images_tables();

    if let Some(reported) = model.metadata.number_of_topics {
        if reported != topics {
            warn!(
                "Model reported {} topics but the tree holds {}; using the tree count",
                reported, topics
            );
        }
    }
    if let Some(reported) = model.metadata.images_tables_analyzed {
        if reported != images_tables {
            warn!(
                "Model reported {} images/tables but the tree holds {}; using the tree count",
                reported, images_tables
            );
        }
    }

    let page_range = model
        .metadata
        .page_range_analyzed
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| requested.describe());

    result.metadata = TaxonomyMetadata {
        number_of_topics: topics,
        page_range_analyzed: page_range,
        images_tables_analyzed: images_tables,
        processing_time: format_processing_time(elapsed),
    };
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANSWER: &str = r#"{
        "taxonomy": [
            {"title": "Methods", "summary": "How.", "confidenceScore": 92,
             "subtopics": [{"title": "Data {raw}", "summary": "Corpus [v2].", "confidenceScore": 80}],
             "image_table_info": [{"type": "table", "description": "Hyperparameters", "pageNumber": 5}]}
        ],
        "metadata": {"numberOfTopics": 7, "pageRangeAnalyzed": "1-12", "imagesTablesAnalyzed": 1}
    }"#;

    #[test]
    fn strips_json_fence() {
        let fenced = format!("```json\n{ANSWER}\n```");
        let m = parse_model_taxonomy(&fenced).unwrap();
        assert_eq!(m.taxonomy[0].title, "Methods");
    }

    #[test]
    fn strips_bare_fence_and_bom() {
        let fenced = format!("\u{FEFF}```\n{ANSWER}\n```\n");
        assert!(parse_model_taxonomy(&fenced).is_ok());
    }

    #[test]
    fn extracts_object_from_prose() {
        let chatty = format!("Here is the taxonomy you asked for:\n{ANSWER}\nLet me know!");
        let m = parse_model_taxonomy(&chatty).unwrap();
        assert_eq!(m.taxonomy[0].subtopics[0].title, "Data {raw}");
    }

    #[test]
    fn extract_json_skips_brackets_in_strings() {
        let s = r#"x {"a": "}{", "b": [1, {"c": "]"}]} y"#;
        assert_eq!(extract_json(s), Some(r#"{"a": "}{", "b": [1, {"c": "]"}]}"#));
        assert_eq!(extract_json("no json here"), None);
    }

    #[test]
    fn bracketed_prose_before_answer_is_skipped() {
        let chatty = format!("Taxonomy for pages [1-10] follows:\n{ANSWER}");
        let m = parse_model_taxonomy(&chatty).unwrap();
        assert_eq!(m.taxonomy[0].title, "Methods");

        // A citation that happens to be valid JSON loses to the longer answer.
        let cited = format!("As discussed in [1], see {{below}}:\n{ANSWER}\nReferences [2].");
        let m = parse_model_taxonomy(&cited).unwrap();
        assert_eq!(m.metadata.page_range_analyzed.as_deref(), Some("1-12"));

        assert_eq!(
            extract_json(r#"Range [1-10] then {"a": [1, 2]} done"#),
            Some(r#"{"a": [1, 2]}"#)
        );
    }

    #[test]
    fn truncated_answer_after_prose_is_reported() {
        let cut = r#"Pages [3-4]: {"taxonomy": [{"title": "A", "subtopics": [{"title": "B"}], "summ"#;
        assert_eq!(extract_json(cut), Some(&cut[13..]));
        assert!(matches!(
            parse_model_taxonomy(cut),
            Err(TaxonomyError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn root_array_is_taxonomy() {
        let m = parse_model_taxonomy(r#"[{"title": "Only", "confidenceScore": 60}]"#).unwrap();
        assert_eq!(m.taxonomy.len(), 1);
        assert!(m.metadata.number_of_topics.is_none());
    }

    #[test]
    fn blank_answer_is_empty_response() {
        assert!(matches!(
            parse_model_taxonomy("  \n "),
            Err(TaxonomyError::EmptyResponse)
        ));
        assert!(matches!(
            parse_model_taxonomy("```json\n```"),
            Err(TaxonomyError::EmptyResponse)
        ));
    }

    #[test]
    fn malformed_answers() {
        assert!(matches!(
            parse_model_taxonomy("I could not read the document."),
            Err(TaxonomyError::MalformedResponse { .. })
        ));
        assert!(matches!(
            parse_model_taxonomy(r#"{"topics": []}"#),
            Err(TaxonomyError::MalformedResponse { .. })
        ));
        // Truncated by the output-token limit.
        assert!(matches!(
            parse_model_taxonomy(r#"{"taxonomy": [{"title": "Cut"#),
            Err(TaxonomyError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn enrich_recomputes_counts() {
        let m = parse_model_taxonomy(ANSWER).unwrap();
        let r = enrich(m, Duration::from_millis(3456), &PageRange::all());
        assert_eq!(r.metadata.number_of_topics, 2);
        assert_eq!(r.metadata.images_tables_analyzed, 1);
        assert_eq!(r.metadata.page_range_analyzed, "1-12");
        assert_eq!(r.metadata.processing_time, "3.46s");
    }

    #[test]
    fn enrich_falls_back_to_requested_range() {
        let m = parse_model_taxonomy(r#"{"taxonomy": [], "metadata": {"pageRangeAnalyzed": " "}}"#).unwrap();
        let r = enrich(m, Duration::ZERO, &PageRange::new(Some(2), Some(4)));
        assert_eq!(r.metadata.page_range_analyzed, "2-4");
        assert_eq!(r.metadata.number_of_topics, 0);
        assert_eq!(r.metadata.processing_time, "0.00s");
    }

    #[test]
    fn parses_filtered_text() {
        let f = parse_filtered("```json\n{\"filteredText\": \"Body only.\"}\n```").unwrap();
        assert_eq!(f.filtered_text, "Body only.");
        assert!(parse_filtered(r#"{"text": "x"}"#).is_err());
    }
}
