//! Taxonomy data model and generation output types.
//!
//! The JSON shape of [`TaxonomyResult`] is the public contract: field names
//! are exactly what downstream consumers (the HTTP service, a browser UI)
//! expect, including the snake_case `image_table_info` next to camelCase
//! siblings.
//!
//! Serialisation is canonical. Deserialisation is lenient, because the same
//! types decode raw model output: a model may return a single topic object
//! instead of an array, a float confidence, or `"Table"` instead of `"table"`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::warn;

/// One topic or subtopic of the taxonomy tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyNode {
    /// Topic title, extracted from the document's headings where possible.
    pub title: String,

    /// Keyword-dense 2–3 sentence summary.
    #[serde(default)]
    pub summary: String,

    /// How clearly the topic is defined in the source, 0–100.
    #[serde(
        rename = "confidenceScore",
        default,
        deserialize_with = "de_confidence"
    )]
    pub confidence_score: u8,

    /// Nested subtopics, in document order.
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "de_subtopics"
    )]
    pub subtopics: Vec<TaxonomyNode>,

    /// Important images and tables belonging to this topic.
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "de_image_tables"
    )]
    pub image_table_info: Vec<ImageTableInfo>,
}

impl TaxonomyNode {
    /// Create a leaf node.
    pub fn new(title: impl Into<String>, summary: impl Into<String>, confidence_score: u8) -> Self {
        Self {
            title: title.into(),
            summary: summary.into(),
            confidence_score: confidence_score.min(100),
            subtopics: Vec::new(),
            image_table_info: Vec::new(),
        }
    }

    pub fn with_subtopic(mut self, node: TaxonomyNode) -> Self {
        self.subtopics.push(node);
        self
    }

    pub fn with_image_table(mut self, info: ImageTableInfo) -> Self {
        self.image_table_info.push(info);
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.subtopics.is_empty()
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn count_topics(&self) -> usize {
        1 + self.subtopics.iter().map(Self::count_topics).sum::<usize>()
    }

    /// Number of image/table annotations in this subtree.
    pub fn count_images_tables(&self) -> usize {
        self.image_table_info.len()
            + self
                .subtopics
                .iter()
                .map(Self::count_images_tables)
                .sum::<usize>()
    }

    /// Depth of this subtree; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        1 + self.subtopics.iter().map(Self::depth).max().unwrap_or(0)
    }
}

/// Kind of non-text content attached to a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Image,
    Table,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Image => f.write_str("image"),
            ContentKind::Table => f.write_str("table"),
        }
    }
}

impl<'de> Deserialize<'de> for ContentKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.trim().to_lowercase().as_str() {
            "image" | "figure" | "chart" | "diagram" | "photo" | "graph" => Ok(ContentKind::Image),
            "table" => Ok(ContentKind::Table),
            other => Err(serde::de::Error::unknown_variant(other, &["image", "table"])),
        }
    }
}

/// An image or table the model identified within a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageTableInfo {
    #[serde(rename = "type")]
    pub kind: ContentKind,

    /// Description of the image, or a summary of the table's data.
    #[serde(default)]
    pub description: String,

    /// 1-indexed page number; 0 when the model did not say.
    #[serde(rename = "pageNumber", default, deserialize_with = "de_page_number")]
    pub page_number: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// Document-level facts accompanying a taxonomy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyMetadata {
    /// Total number of topics and subtopics in the whole tree.
    #[serde(rename = "numberOfTopics")]
    pub number_of_topics: usize,

    /// Page range that was analysed, e.g. `"1-10"` or `"all pages"`.
    #[serde(rename = "pageRangeAnalyzed")]
    pub page_range_analyzed: String,

    /// Total number of images and tables annotated in the tree.
    #[serde(rename = "imagesTablesAnalyzed")]
    pub images_tables_analyzed: usize,

    /// Wall-clock time of the generation, formatted as seconds (`"3.42s"`).
    #[serde(rename = "processingTime")]
    pub processing_time: String,
}

/// The complete answer for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyResult {
    #[serde(deserialize_with = "de_one_or_many")]
    pub taxonomy: Vec<TaxonomyNode>,
    pub metadata: TaxonomyMetadata,
}

impl TaxonomyResult {
    /// Total topic count over all roots.
    pub fn count_topics(&self) -> usize {
        self.taxonomy.iter().map(TaxonomyNode::count_topics).sum()
    }

    /// Total image/table annotation count over all roots.
    pub fn count_images_tables(&self) -> usize {
        self.taxonomy
            .iter()
            .map(TaxonomyNode::count_images_tables)
            .sum()
    }

    /// Deepest level of the tree; 0 for an empty taxonomy.
    pub fn max_depth(&self) -> usize {
        self.taxonomy.iter().map(TaxonomyNode::depth).max().unwrap_or(0)
    }

    /// Depth-first, pre-order traversal yielding `(depth, node)` with roots at depth 1.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: self.taxonomy.iter().rev().map(|n| (1, n)).collect(),
        }
    }
}

/// Iterator returned by [`TaxonomyResult::walk`].
pub struct Walk<'a> {
    stack: Vec<(usize, &'a TaxonomyNode)>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (usize, &'a TaxonomyNode);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        self.stack
            .extend(node.subtopics.iter().rev().map(|child| (depth + 1, child)));
        Some((depth, node))
    }
}

/// What the model itself returns: the taxonomy plus the metadata it was
/// asked to compute. Every metadata field is optional because models drop
/// them; [`crate::pipeline::postprocess::enrich`] fills the gaps.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelTaxonomy {
    #[serde(default, deserialize_with = "de_one_or_many")]
    pub taxonomy: Vec<TaxonomyNode>,
    #[serde(default, deserialize_with = "de_null_default")]
    pub metadata: ModelMetadata,
}

/// Metadata as reported by the model.
///
/// Only ever advisory, so decoding never fails: a field of the wrong shape
/// reads as absent and a non-object reads as empty.
#[derive(Debug, Clone, Default)]
pub struct ModelMetadata {
    pub number_of_topics: Option<usize>,
    pub page_range_analyzed: Option<String>,
    pub images_tables_analyzed: Option<usize>,
}

impl<'de> Deserialize<'de> for ModelMetadata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let Value::Object(map) = Value::deserialize(deserializer)? else {
            return Ok(Self::default());
        };
        let count = |key: &str| {
            map.get(key)
                .and_then(number_in)
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f.round() as usize)
        };
        let page_range_analyzed = match map.get("pageRangeAnalyzed") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Array(bounds)) => match bounds.as_slice() {
                [Value::Number(from), Value::Number(to)] => Some(format!("{from}-{to}")),
                _ => None,
            },
            _ => None,
        };
        Ok(Self {
            number_of_topics: count("numberOfTopics"),
            page_range_analyzed,
            images_tables_analyzed: count("imagesTablesAnalyzed"),
        })
    }
}

/// Document facts read from the PDF itself (no model involved).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub name: String,
    pub size_bytes: usize,
    pub page_count: usize,
    pub pdf_version: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
}

/// Bookkeeping for one generation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Backend that served the request (`"gemini"`, or the vision provider such as `"openai"`).
    pub backend: String,
    pub model: String,
    pub document_name: String,
    pub document_bytes: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Model calls made, including the successful one.
    pub attempts: u32,
    /// End-to-end duration including input resolution.
    pub total_duration_ms: u64,
    /// Duration of the model stage (calls, backoff, decoding).
    pub model_duration_ms: u64,
}

/// Result of [`crate::generate::generate_taxonomy`] and friends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyOutput {
    pub result: TaxonomyResult,
    pub stats: GenerationStats,
}

/// Result of [`crate::generate::filter_content`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredContent {
    #[serde(rename = "filteredText")]
    pub filtered_text: String,
}

// ── Lenient deserialisers ────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
    Null(()),
}

fn de_one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match OneOrMany::<T>::deserialize(deserializer)? {
        OneOrMany::Many(v) => v,
        OneOrMany::One(t) => vec![t],
        OneOrMany::Null(()) => Vec::new(),
    })
}

fn de_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Numeric {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Numeric {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Numeric::Int(i) => Some(*i as f64),
            Numeric::Float(f) => Some(*f),
            Numeric::Text(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        }
    }
}

fn de_confidence<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let value = Option::<Numeric>::deserialize(deserializer)?;
    Ok(value
        .and_then(|n| n.as_f64())
        .filter(|f| f.is_finite())
        .map(|f| f.round().clamp(0.0, 100.0) as u8)
        .unwrap_or(0))
}

fn de_page_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Option::<Numeric>::deserialize(deserializer)?;
    Ok(value
        .and_then(|n| n.as_f64())
        .filter(|f| f.is_finite() && *f >= 0.0)
        .map(|f| f.round().min(u32::MAX as f64) as u32)
        .unwrap_or(0))
}

fn number_in(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A list where unreadable entries are dropped with a warning instead of
/// failing the whole document. A lone object counts as a one-item list.
fn de_skip_invalid<'de, D, T>(deserializer: D, what: &str) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("Skipping unreadable {} entry: {}", what, e);
                None
            }
        })
        .collect())
}

fn de_subtopics<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<TaxonomyNode>, D::Error> {
    de_skip_invalid(deserializer, "subtopic")
}

fn de_image_tables<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<ImageTableInfo>, D::Error> {
    de_skip_invalid(deserializer, "image/table")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> TaxonomyResult {
        TaxonomyResult {
            taxonomy: vec![
                TaxonomyNode::new("Intro", "Opening.", 90).with_subtopic(
                    TaxonomyNode::new("Motivation", "Why.", 80)
                        .with_subtopic(TaxonomyNode::new("Prior work", "Before.", 70)),
                ),
                TaxonomyNode::new("Results", "Numbers.", 95).with_image_table(ImageTableInfo {
                    kind: ContentKind::Table,
                    description: "Accuracy per model".into(),
                    page_number: 7,
                    caption: Some("Table 2".into()),
                }),
            ],
            metadata: TaxonomyMetadata {
                number_of_topics: 4,
                page_range_analyzed: "all pages".into(),
                images_tables_analyzed: 1,
                processing_time: "1.00s".into(),
            },
        }
    }

    #[test]
    fn serialises_with_wire_names() {
        let v = serde_json::to_value(sample()).unwrap();
        let results = &v["taxonomy"][1];
        assert_eq!(results["confidenceScore"], 95);
        assert_eq!(results["image_table_info"][0]["type"], "table");
        assert_eq!(results["image_table_info"][0]["pageNumber"], 7);
        assert_eq!(v["metadata"]["numberOfTopics"], 4);
        assert_eq!(v["metadata"]["processingTime"], "1.00s");
        // Leaves omit empty optional arrays.
        assert!(results.get("subtopics").is_none());
    }

    #[test]
    fn counts_and_depth() {
        let r = sample();
        assert_eq!(r.count_topics(), 4);
        assert_eq!(r.count_images_tables(), 1);
        assert_eq!(r.max_depth(), 3);
    }

    #[test]
    fn walk_is_preorder_with_depths() {
        let r = sample();
        let visited: Vec<(usize, &str)> = r.walk().map(|(d, n)| (d, n.title.as_str())).collect();
        assert_eq!(
            visited,
            vec![(1, "Intro"), (2, "Motivation"), (3, "Prior work"), (1, "Results")]
        );
    }

    #[test]
    fn single_object_taxonomy_becomes_array() {
        let raw = json!({
            "taxonomy": {"title": "Only", "summary": "s", "confidenceScore": 50},
            "metadata": {"numberOfTopics": 1}
        });
        let m: ModelTaxonomy = serde_json::from_value(raw).unwrap();
        assert_eq!(m.taxonomy.len(), 1);
        assert_eq!(m.taxonomy[0].title, "Only");
    }

    #[test]
    fn lenient_numbers_and_kinds() {
        let raw = json!({
            "title": "T",
            "confidenceScore": 87.6,
            "subtopics": null,
            "image_table_info": [
                {"type": "Figure", "description": "d", "pageNumber": "3"},
                {"type": "TABLE", "description": "t", "pageNumber": 4.0, "caption": "c"}
            ]
        });
        let node: TaxonomyNode = serde_json::from_value(raw).unwrap();
        assert_eq!(node.confidence_score, 88);
        assert!(node.subtopics.is_empty());
        assert_eq!(node.summary, "");
        assert_eq!(node.image_table_info[0].kind, ContentKind::Image);
        assert_eq!(node.image_table_info[0].page_number, 3);
        assert_eq!(node.image_table_info[1].kind, ContentKind::Table);
        assert_eq!(node.image_table_info[1].caption.as_deref(), Some("c"));
    }

    #[test]
    fn confidence_is_clamped() {
        let high: TaxonomyNode =
            serde_json::from_value(json!({"title": "a", "confidenceScore": 250})).unwrap();
        let low: TaxonomyNode =
            serde_json::from_value(json!({"title": "b", "confidenceScore": -4})).unwrap();
        let pct: TaxonomyNode =
            serde_json::from_value(json!({"title": "c", "confidenceScore": "75%"})).unwrap();
        assert_eq!(high.confidence_score, 100);
        assert_eq!(low.confidence_score, 0);
        assert_eq!(pct.confidence_score, 75);
    }

    #[test]
    fn unknown_content_kind_is_rejected() {
        let raw = json!({"type": "video", "description": "d", "pageNumber": 1});
        assert!(serde_json::from_value::<ImageTableInfo>(raw).is_err());
    }

    #[test]
    fn unknown_content_kind_drops_only_that_entry() {
        let raw = json!({
            "title": "Derivation",
            "confidenceScore": 70,
            "image_table_info": [
                {"type": "equation", "description": "Eq. 3", "pageNumber": 4},
                {"type": "table", "description": "Ablations", "pageNumber": 6}
            ],
            "subtopics": [
                {"title": "Proof", "image_table_info": {"type": "video", "description": "v"}},
                {"summary": "no title"}
            ]
        });
        let node: TaxonomyNode = serde_json::from_value(raw).unwrap();
        assert_eq!(node.image_table_info.len(), 1);
        assert_eq!(node.image_table_info[0].description, "Ablations");
        assert_eq!(node.subtopics.len(), 1);
        assert_eq!(node.subtopics[0].title, "Proof");
        assert!(node.subtopics[0].image_table_info.is_empty());
    }

    #[test]
    fn model_metadata_of_any_shape_decodes() {
        let m: ModelTaxonomy = serde_json::from_value(json!({
            "taxonomy": [],
            "metadata": {"pageRangeAnalyzed": 12, "numberOfTopics": "5", "imagesTablesAnalyzed": [2]}
        }))
        .unwrap();
        assert_eq!(m.metadata.page_range_analyzed.as_deref(), Some("12"));
        assert_eq!(m.metadata.number_of_topics, Some(5));
        assert_eq!(m.metadata.images_tables_analyzed, None);

        let m: ModelTaxonomy =
            serde_json::from_value(json!({"taxonomy": [], "metadata": {"pageRangeAnalyzed": [3, 9]}}))
                .unwrap();
        assert_eq!(m.metadata.page_range_analyzed.as_deref(), Some("3-9"));

        let m: ModelTaxonomy =
            serde_json::from_str(r#"{"taxonomy": [{"title": "T"}], "metadata": "n/a"}"#).unwrap();
        assert_eq!(m.taxonomy.len(), 1);
        assert!(m.metadata.page_range_analyzed.is_none());
        assert!(m.metadata.number_of_topics.is_none());
    }

    #[test]
    fn result_round_trips_through_json() {
        let r = sample();
        let back: TaxonomyResult = serde_json::from_str(&serde_json::to_string(&r).unwrap()).unwrap();
        assert_eq!(back, r);
    }
}
