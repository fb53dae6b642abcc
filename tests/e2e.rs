//! End-to-end integration tests for edgequake-taxonomy.
//!
//! These tests use real PDF files in `./test_cases/` and make live model API
//! calls. They are gated behind the `E2E_ENABLED` environment variable so
//! they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 GEMINI_API_KEY=... cargo test --test e2e -- --nocapture
//!
//! Page-image tests additionally need pdfium and a vision provider:
//!   E2E_ENABLED=1 OPENAI_API_KEY=... DYLD_LIBRARY_PATH=. cargo test --test e2e images -- --nocapture

use edgequake_taxonomy::{
    generate_taxonomy, generate_to_file, inspect, to_outline, PageRange, TaxonomyConfig,
    TaxonomyResult, Transport,
};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/output");
    std::fs::create_dir_all(&d).ok();
    d
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            println!("       Run: make download-test-pdfs");
            return;
        }
        p
    }};
}

fn gemini_available() -> bool {
    ["GEMINI_API_KEY", "GOOGLE_API_KEY"]
        .iter()
        .any(|k| std::env::var(k).map(|v| !v.is_empty()).unwrap_or(false))
}

/// Structural checks every live taxonomy must pass.
fn assert_taxonomy_quality(result: &TaxonomyResult, context: &str) {
    assert!(!result.taxonomy.is_empty(), "[{context}] Taxonomy is empty");
    assert_eq!(
        result.metadata.number_of_topics,
        result.count_topics(),
        "[{context}] numberOfTopics must match the tree"
    );
    assert_eq!(
        result.metadata.images_tables_analyzed,
        result.count_images_tables(),
        "[{context}] imagesTablesAnalyzed must match the tree"
    );
    assert!(
        result.metadata.processing_time.ends_with('s'),
        "[{context}] processingTime must be seconds, got {:?}",
        result.metadata.processing_time
    );

    for (depth, node) in result.walk() {
        assert!(!node.title.trim().is_empty(), "[{context}] Empty title at depth {depth}");
        assert!(node.confidence_score <= 100);
        for info in &node.image_table_info {
            assert!(
                !info.description.trim().is_empty(),
                "[{context}] '{}' has an undescribed {}",
                node.title,
                info.kind
            );
        }
    }

    println!(
        "[{context}] ✓  {} topics, depth {}, {} images/tables, {}",
        result.metadata.number_of_topics,
        result.max_depth(),
        result.metadata.images_tables_analyzed,
        result.metadata.processing_time
    );
}

// ── Inspect tests (no model, instant) ────────────────────────────────────────

#[tokio::test]
async fn test_inspect_arxiv_paper() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));

    let meta = inspect(path.to_str().unwrap(), &TaxonomyConfig::default())
        .await
        .expect("inspect() should succeed");

    assert_eq!(meta.page_count, 15, "Attention paper should have 15 pages");
    assert!(!meta.pdf_version.is_empty());
    assert_eq!(meta.name, "attention_is_all_you_need.pdf");

    println!("Metadata: {:?}", meta);
}

// ── Inline PDF (Gemini) ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_inline_whole_paper() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));
    if !gemini_available() {
        println!("SKIP — GEMINI_API_KEY not set");
        return;
    }

    let config = TaxonomyConfig::builder()
        .transport(Transport::InlinePdf)
        .build()
        .unwrap();
    let output = generate_taxonomy(path.to_str().unwrap(), &config)
        .await
        .expect("taxonomy generation should succeed");

    assert_taxonomy_quality(&output.result, "inline/attention");
    assert!(
        output.result.count_images_tables() > 0,
        "The Transformer paper has figures and tables"
    );
    println!("{}", to_outline(&output.result));
    println!("Stats: {:?}", output.stats);
}

#[tokio::test]
async fn test_inline_page_range_to_file() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));
    if !gemini_available() {
        println!("SKIP — GEMINI_API_KEY not set");
        return;
    }

    let out = output_dir().join("attention_1-3.taxonomy.json");
    let config = TaxonomyConfig::builder()
        .transport(Transport::InlinePdf)
        .pages(PageRange::new(Some(1), Some(3)))
        .build()
        .unwrap();

    let stats = generate_to_file(path.to_str().unwrap(), &out, &config)
        .await
        .expect("generate_to_file should succeed");

    let written: TaxonomyResult =
        serde_json::from_slice(&std::fs::read(&out).unwrap()).expect("valid TaxonomyResult JSON");
    assert_taxonomy_quality(&written, "inline/attention 1-3");
    assert!(stats.attempts >= 1);
}

#[tokio::test]
async fn test_inline_from_url() {
    if std::env::var("E2E_ENABLED").is_err() || !gemini_available() {
        println!("SKIP — set E2E_ENABLED=1 and GEMINI_API_KEY");
        return;
    }

    let config = TaxonomyConfig::builder()
        .transport(Transport::InlinePdf)
        .pages(PageRange::new(Some(1), Some(2)))
        .build()
        .unwrap();
    let output = generate_taxonomy("https://arxiv.org/pdf/1706.03762", &config)
        .await
        .expect("URL input should succeed");

    assert_taxonomy_quality(&output.result, "inline/url");
    assert_eq!(output.stats.document_name, "1706.03762");
}

// ── Page images (vision provider) ────────────────────────────────────────────

#[tokio::test]
async fn test_images_first_pages() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));
    if std::env::var("OPENAI_API_KEY").is_err() {
        println!("SKIP — OPENAI_API_KEY not set");
        return;
    }

    let config = TaxonomyConfig::builder()
        .transport(Transport::PageImages)
        .provider_name("openai")
        .model("gpt-4.1-mini")
        .pages(PageRange::new(Some(1), Some(4)))
        .build()
        .unwrap();
    let output = generate_taxonomy(path.to_str().unwrap(), &config)
        .await
        .expect("page-image generation should succeed");

    assert_taxonomy_quality(&output.result, "images/attention 1-4");
    assert_eq!(output.stats.backend, "openai");
}

#[tokio::test]
async fn test_images_range_past_end_is_rejected() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));
    if std::env::var("OPENAI_API_KEY").is_err() {
        println!("SKIP — OPENAI_API_KEY not set");
        return;
    }

    let config = TaxonomyConfig::builder()
        .transport(Transport::PageImages)
        .provider_name("openai")
        .pages(PageRange::new(Some(40), Some(45)))
        .build()
        .unwrap();
    let err = generate_taxonomy(path.to_str().unwrap(), &config)
        .await
        .expect_err("a range past the last page has nothing to render");

    assert!(err.to_string().contains("out of range"), "{err}");
}
