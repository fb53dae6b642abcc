//! Human-readable renderings of a [`TaxonomyResult`].
//!
//! * [`to_markdown`]: a document with one heading per topic (deeper levels
//!   than Markdown headings allow continue as nested bullets), summaries,
//!   confidence and the image/table annotations.
//! * [`to_outline`]: a compact numbered tree for the terminal.

use crate::output::{ContentKind, ImageTableInfo, TaxonomyNode, TaxonomyResult};
use std::fmt::Write;

/// Deepest topic level rendered as a Markdown heading (`######`).
const MAX_HEADING_DEPTH: usize = 5;

/// Render the taxonomy as Markdown.
pub fn to_markdown(result: &TaxonomyResult) -> String {
    let mut out = String::from("# Taxonomy\n\n");
    let m = &result.metadata;
    let _ = writeln!(
        out,
        "_{} topics · {} images/tables · pages: {} · generated in {}_\n",
        m.number_of_topics, m.images_tables_analyzed, m.page_range_analyzed, m.processing_time
    );

    if result.taxonomy.is_empty() {
        out.push_str("No topics were identified.\n");
        return out;
    }

    for node in &result.taxonomy {
        write_markdown_node(&mut out, node, 1);
    }
    out
}

fn write_markdown_node(out: &mut String, node: &TaxonomyNode, depth: usize) {
    if depth <= MAX_HEADING_DEPTH {
        let _ = writeln!(
            out,
            "{} {} ({}%)\n",
            "#".repeat(depth + 1),
            node.title,
            node.confidence_score
        );
        if !node.summary.is_empty() {
            let _ = writeln!(out, "{}\n", node.summary);
        }
        for info in &node.image_table_info {
            let _ = writeln!(out, "- {}", describe_image_table(info));
        }
        if !node.image_table_info.is_empty() {
            out.push('\n');
        }
    } else {
        let indent = "  ".repeat(depth - MAX_HEADING_DEPTH - 1);
        let _ = write!(out, "{indent}- **{}** ({}%)", node.title, node.confidence_score);
        if !node.summary.is_empty() {
            let _ = write!(out, ": {}", node.summary);
        }
        out.push('\n');
        for info in &node.image_table_info {
            let _ = writeln!(out, "{indent}  - {}", describe_image_table(info));
        }
        if node.subtopics.is_empty() && depth == MAX_HEADING_DEPTH + 1 {
            out.push('\n');
        }
    }

    for child in &node.subtopics {
        write_markdown_node(out, child, depth + 1);
    }
}

fn describe_image_table(info: &ImageTableInfo) -> String {
    let label = match info.kind {
        ContentKind::Image => "Image",
        ContentKind::Table => "Table",
    };
    let page = if info.page_number > 0 {
        format!(", page {}", info.page_number)
    } else {
        String::new()
    };
    match info.caption.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(caption) => format!("**{label}{page}** _{caption}_: {}", info.description),
        None => format!("**{label}{page}**: {}", info.description),
    }
}

/// Render the taxonomy as an indented, numbered outline.
///
/// ```text
/// 1 Introduction [95]
///   1.1 Motivation [88]
///   1.2 Contributions [90] (1 table)
/// ```
pub fn to_outline(result: &TaxonomyResult) -> String {
    let mut out = String::new();
    for (i, node) in result.taxonomy.iter().enumerate() {
        write_outline_node(&mut out, node, &(i + 1).to_string(), 0);
    }
    let m = &result.metadata;
    let _ = writeln!(
        out,
        "-- {} topics, {} images/tables, pages {}, {}",
        m.number_of_topics, m.images_tables_analyzed, m.page_range_analyzed, m.processing_time
    );
    out
}

fn write_outline_node(out: &mut String, node: &TaxonomyNode, number: &str, level: usize) {
    let _ = write!(
        out,
        "{}{} {} [{}]",
        "  ".repeat(level),
        number,
        node.title,
        node.confidence_score
    );

    let images = node
        .image_table_info
        .iter()
        .filter(|i| i.kind == ContentKind::Image)
        .count();
    let tables = node.image_table_info.len() - images;
    let mut notes = Vec::new();
    if images > 0 {
        notes.push(plural(images, "image"));
    }
    if tables > 0 {
        notes.push(plural(tables, "table"));
    }
    if !notes.is_empty() {
        let _ = write!(out, " ({})", notes.join(", "));
    }
    out.push('\n');

    for (i, child) in node.subtopics.iter().enumerate() {
        write_outline_node(out, child, &format!("{number}.{}", i + 1), level + 1);
    }
}

fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("1 {noun}")
    } else {
        format!("{n} {noun}s")
    }
}
