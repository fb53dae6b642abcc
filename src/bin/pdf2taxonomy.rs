//! CLI binary for edgequake-taxonomy.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `TaxonomyConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_taxonomy::{
    filter_content, generate_stream, generate_taxonomy, generate_to_file, inspect, to_markdown,
    to_outline, GenerationStage, GenerationStats, PageRange, ProgressCallback, TaxonomyConfig,
    TaxonomyProgressCallback, TaxonomyResult, Transport,
};
use futures::StreamExt;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One spinner per document in flight; the stage is the spinner message.
struct CliProgressCallback {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        })
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"])
    }

    fn take_bar(&self, document: &str) -> Option<ProgressBar> {
        self.bars.lock().ok().and_then(|mut bars| bars.remove(document))
    }
}

impl TaxonomyProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        if total_documents > 1 {
            let _ = self.multi.println(format!(
                "{} {}",
                cyan("◆"),
                bold(&format!("Generating taxonomies for {total_documents} documents…"))
            ));
        }
    }

    fn on_document_start(&self, document: &str) {
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(Self::spinner_style());
        bar.set_prefix(short_name(document));
        bar.set_message("starting…");
        bar.enable_steady_tick(Duration::from_millis(80));
        if let Ok(mut bars) = self.bars.lock() {
            bars.insert(document.to_string(), bar);
        }
    }

    fn on_stage(&self, document: &str, stage: GenerationStage) {
        if let Ok(bars) = self.bars.lock() {
            if let Some(bar) = bars.get(document) {
                bar.set_message(format!("{stage}…"));
            }
        }
    }

    fn on_retry(&self, document: &str, attempt: u32, delay_ms: u64, reason: &str) {
        let _ = self.multi.println(format!(
            "  {} {}  retry {} in {:.1}s  {}",
            cyan("↻"),
            short_name(document),
            attempt,
            delay_ms as f64 / 1000.0,
            dim(&truncate(reason, 80)),
        ));
    }

    fn on_document_complete(&self, document: &str, topics: usize, processing_time: &str) {
        if let Some(bar) = self.take_bar(document) {
            bar.finish_and_clear();
        }
        let _ = self.multi.println(format!(
            "  {} {}  {} topics  {}",
            green("✓"),
            short_name(document),
            topics,
            dim(processing_time),
        ));
    }

    fn on_document_error(&self, document: &str, error: &str) {
        if let Some(bar) = self.take_bar(document) {
            bar.finish_and_clear();
        }
        let first_line = error.lines().next().unwrap_or(error);
        let _ = self.multi.println(format!(
            "  {} {}  {}",
            red("✗"),
            short_name(document),
            red(&truncate(first_line, 100)),
        ));
    }

    fn on_batch_complete(&self, total_documents: usize, success_count: usize) {
        if total_documents > 1 {
            let failed = total_documents.saturating_sub(success_count);
            let mark = if failed == 0 { green("✔") } else { cyan("⚠") };
            let _ = self.multi.println(format!(
                "{} {}/{} documents  ({} failed)",
                mark,
                bold(&success_count.to_string()),
                total_documents,
                failed
            ));
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}\u{2026}", s.chars().take(max - 1).collect::<String>())
    } else {
        s.to_string()
    }
}

/// Last path or URL segment; data URIs are labelled by the library already.
fn short_name(input: &str) -> String {
    input
        .trim_end_matches('/')
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(input)
        .to_string()
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Taxonomy as JSON on stdout (Gemini, inline PDF)
  pdf2taxonomy paper.pdf

  # Pages 3 to 12, written to a file
  pdf2taxonomy --page-start 3 --page-end 12 paper.pdf -o paper.taxonomy.json

  # Indented outline in the terminal
  pdf2taxonomy --format outline paper.pdf

  # Markdown report
  pdf2taxonomy --format markdown paper.pdf -o paper.md

  # Page images to any vision model instead of Gemini
  pdf2taxonomy --transport images --provider openai --model gpt-4.1-mini paper.pdf

  # From a URL
  pdf2taxonomy https://arxiv.org/pdf/1706.03762

  # Several documents, four at a time, one file each
  pdf2taxonomy --concurrency 4 --output-dir taxonomies/ a.pdf b.pdf c.pdf

  # Inspect PDF metadata (no API key needed)
  pdf2taxonomy --inspect-only paper.pdf

  # Strip headers/footers/boilerplate from extracted text
  pdf2taxonomy --filter-text extracted.txt

TRANSPORTS:
  inline   The PDF itself goes to Gemini's generateContent, base64-inlined,
           with a native response schema. Needs GEMINI_API_KEY. No pdfium.
  images   Pages are rendered with pdfium and sent as PNGs to any vision
           provider supported by edgequake-llm. Schema is part of the prompt.
  auto     inline when a Gemini key is set and no --provider is given,
           images otherwise (default).

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (GOOGLE_API_KEY also read)
  OPENAI_API_KEY          OpenAI API key (page-image transport)
  ANTHROPIC_API_KEY       Anthropic API key (page-image transport)
  EDGEQUAKE_LLM_PROVIDER  Provider for the page-image transport
  EDGEQUAKE_MODEL         Model ID
  PDFIUM_LIB_PATH         Directory or file of libpdfium (images / inspect)
  TAXONOMY_*              Every flag below also reads TAXONOMY_<FLAG>
"#;

/// Generate hierarchical content taxonomies from PDF documents.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2taxonomy",
    version,
    about = "Generate hierarchical content taxonomies from PDF documents",
    long_about = "Generate a hierarchical taxonomy (topics, subtopics, summaries, confidence \
scores, images and tables) of PDF documents with a generative model. Local files, HTTP/HTTPS \
URLs and data URIs are accepted.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF paths, HTTP/HTTPS URLs or data URIs.
    #[arg(required_unless_present = "filter_text")]
    inputs: Vec<String>,

    /// Write the result to this file instead of stdout (single input only).
    #[arg(short, long, env = "TAXONOMY_OUTPUT", conflicts_with = "output_dir")]
    output: Option<PathBuf>,

    /// Write one result per input into this directory.
    #[arg(long, env = "TAXONOMY_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, env = "TAXONOMY_FORMAT", value_enum, default_value = "json")]
    format: FormatArg,

    /// How the document reaches the model.
    #[arg(long, env = "TAXONOMY_TRANSPORT", value_enum, default_value = "auto")]
    transport: TransportArg,

    /// Model ID (e.g. gemini-2.0-flash, gpt-4.1-mini).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Vision provider for the page-image transport: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_LLM_PROVIDER")]
    provider: Option<String>,

    /// Gemini API key for the inline transport.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Gemini REST base URL.
    #[arg(long, env = "TAXONOMY_API_BASE_URL")]
    api_base_url: Option<String>,

    /// First page to analyse (1-indexed).
    #[arg(long, env = "TAXONOMY_PAGE_START")]
    page_start: Option<usize>,

    /// Last page to analyse (inclusive).
    #[arg(long, env = "TAXONOMY_PAGE_END")]
    page_end: Option<usize>,

    /// Path to a text file with a custom prompt ({page_start}/{page_end} are substituted).
    #[arg(long, env = "TAXONOMY_PROMPT")]
    prompt: Option<PathBuf>,

    /// Unroll depth of the recursive topic schema (1–10).
    #[arg(long, env = "TAXONOMY_SCHEMA_DEPTH", default_value_t = 6,
          value_parser = clap::value_parser!(u8).range(1..=10))]
    schema_depth: u8,

    /// PDF user password for encrypted documents (images transport / inspect).
    #[arg(long, env = "TAXONOMY_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Longest edge, in pixels, of each rendered page for the images transport.
    #[arg(long, env = "TAXONOMY_MAX_PIXELS", default_value_t = 1600,
          value_parser = clap::value_parser!(u32).range(100..))]
    max_pixels: u32,

    /// Maximum pages rendered for the page-image transport.
    #[arg(long, env = "TAXONOMY_MAX_IMAGE_PAGES", default_value_t = 50)]
    max_image_pages: usize,

    /// Documents processed at once.
    #[arg(short, long, env = "TAXONOMY_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "TAXONOMY_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max output tokens per taxonomy.
    #[arg(long, env = "TAXONOMY_MAX_OUTPUT_TOKENS", default_value_t = 8192)]
    max_output_tokens: usize,

    /// Retries on overload, rate limit or timeout.
    #[arg(long, env = "TAXONOMY_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Largest accepted PDF in MiB.
    #[arg(long, env = "TAXONOMY_MAX_PDF_MB", default_value_t = 20)]
    max_pdf_mb: usize,

    /// Per-call model timeout in seconds.
    #[arg(long, env = "TAXONOMY_API_TIMEOUT", default_value_t = 300)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "TAXONOMY_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print backend, model, tokens and timing after each document.
    #[arg(long, env = "TAXONOMY_STATS")]
    stats: bool,

    /// Print PDF metadata only, no model call.
    #[arg(long)]
    inspect_only: bool,

    /// Filter boilerplate out of this text file instead of generating a taxonomy.
    #[arg(long, value_name = "FILE")]
    filter_text: Option<PathBuf>,

    /// Disable progress spinners.
    #[arg(long, env = "TAXONOMY_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TAXONOMY_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TAXONOMY_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FormatArg {
    Json,
    Markdown,
    Outline,
}

impl FormatArg {
    fn extension(self) -> &'static str {
        match self {
            FormatArg::Json => "taxonomy.json",
            FormatArg::Markdown => "taxonomy.md",
            FormatArg::Outline => "taxonomy.txt",
        }
    }

    fn render(self, result: &TaxonomyResult) -> Result<String> {
        Ok(match self {
            FormatArg::Json => {
                serde_json::to_string_pretty(result).context("Failed to serialise taxonomy")?
            }
            FormatArg::Markdown => to_markdown(result),
            FormatArg::Outline => to_outline(result),
        })
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum TransportArg {
    Auto,
    Inline,
    Images,
}

impl From<TransportArg> for Transport {
    fn from(v: TransportArg) -> Self {
        match v {
            TransportArg::Auto => Transport::Auto,
            TransportArg::Inline => Transport::InlinePdf,
            TransportArg::Images => Transport::PageImages,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Spinners carry the per-document feedback; library INFO logs would
    // tear them, so they are only shown without spinners.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.inspect_only && cli.filter_text.is_none();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn TaxonomyProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Filter-text mode ─────────────────────────────────────────────────
    if let Some(ref path) = cli.filter_text {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read text from {:?}", path))?;
        let filtered = filter_content(&text, &config)
            .await
            .map_err(|e| anyhow::anyhow!("{}\n{}", e.user_message(), dim(&e.to_string())))
            .context("Content filtering failed")?;
        let rendered = if cli.format == FormatArg::Json {
            serde_json::to_string_pretty(&filtered).context("Failed to serialise output")?
        } else {
            filtered.filtered_text
        };
        return emit(cli.output.as_deref(), &rendered).await;
    }

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        for input in &cli.inputs {
            let meta = inspect(input, &config).await.context("Failed to inspect PDF")?;

            if cli.format == FormatArg::Json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
                );
            } else {
                println!("File:         {}", meta.name);
                println!("Size:         {} bytes", meta.size_bytes);
                if let Some(ref t) = meta.title {
                    println!("Title:        {}", t);
                }
                if let Some(ref a) = meta.author {
                    println!("Author:       {}", a);
                }
                if let Some(ref s) = meta.subject {
                    println!("Subject:      {}", s);
                }
                println!("Pages:        {}", meta.page_count);
                println!("PDF Version:  {}", meta.pdf_version);
                if let Some(ref p) = meta.producer {
                    println!("Producer:     {}", p);
                }
                if let Some(ref c) = meta.creator {
                    println!("Creator:      {}", c);
                }
            }
        }
        return Ok(());
    }

    // ── Single document ──────────────────────────────────────────────────
    if cli.inputs.len() == 1 && cli.output_dir.is_none() {
        let input = &cli.inputs[0];

        if let (Some(path), FormatArg::Json) = (&cli.output, cli.format) {
            let stats = generate_to_file(input, path, &config)
                .await
                .map_err(|e| anyhow::anyhow!("{}\n{}", e.user_message(), dim(&e.to_string())))
                .context("Taxonomy generation failed")?;
            if !cli.quiet {
                eprintln!("{}  →  {}", green("✔"), bold(&path.display().to_string()));
            }
            if cli.stats {
                print_stats(&stats);
            }
            return Ok(());
        }

        let output = generate_taxonomy(input, &config)
            .await
            .map_err(|e| anyhow::anyhow!("{}\n{}", e.user_message(), dim(&e.to_string())))
            .context("Taxonomy generation failed")?;
        emit(cli.output.as_deref(), &cli.format.render(&output.result)?).await?;
        if cli.stats {
            print_stats(&output.stats);
        }
        return Ok(());
    }

    // ── Batch ────────────────────────────────────────────────────────────
    if cli.output.is_some() {
        anyhow::bail!("--output takes a single input; use --output-dir for several");
    }
    if let Some(ref dir) = cli.output_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create output directory {:?}", dir))?;
    }

    let total = cli.inputs.len();
    let mut failed = 0usize;
    let mut file_names = plan_output_names(&cli.inputs, cli.format);
    let mut outcomes = generate_stream(cli.inputs.clone(), &config);
    while let Some(outcome) = outcomes.next().await {
        match outcome.result {
            Ok(output) => {
                let rendered = cli.format.render(&output.result)?;
                match cli.output_dir {
                    Some(ref dir) => {
                        let name = file_names
                            .get_mut(&outcome.input)
                            .and_then(VecDeque::pop_front)
                            .unwrap_or_else(|| output_file_name(&outcome.input, cli.format));
                        let path = dir.join(name);
                        tokio::fs::write(&path, rendered.as_bytes())
                            .await
                            .with_context(|| format!("Failed to write {:?}", path))?;
                        if !cli.quiet && !show_progress {
                            eprintln!("{} {}  →  {}", green("✓"), outcome.input, path.display());
                        }
                    }
                    None => {
                        println!("{}", dim(&format!("== {} ==", outcome.input)));
                        println!("{}", rendered.trim_end());
                    }
                }
                if cli.stats {
                    print_stats(&output.stats);
                }
            }
            Err(e) => {
                failed += 1;
                if !show_progress {
                    eprintln!("{} {}  {}", red("✗"), outcome.input, e.user_message());
                }
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {total} documents failed");
    }
    Ok(())
}

/// Map CLI args to `TaxonomyConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<TaxonomyConfig> {
    let mut builder = TaxonomyConfig::builder()
        .transport(cli.transport.into())
        .pages(PageRange::new(cli.page_start, cli.page_end))
        .schema_depth(cli.schema_depth as usize)
        .max_rendered_pixels(cli.max_pixels)
        .max_image_pages(cli.max_image_pages)
        .concurrency(cli.concurrency)
        .temperature(cli.temperature)
        .max_output_tokens(cli.max_output_tokens)
        .max_retries(cli.max_retries)
        .max_pdf_bytes(cli.max_pdf_mb.saturating_mul(1024 * 1024))
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.prompt {
        let template = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt_template(template);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref url) = cli.api_base_url {
        builder = builder.api_base_url(url);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Write to `path`, or stdout with a trailing newline.
async fn emit(path: Option<&Path>, contents: &str) -> Result<()> {
    match path {
        Some(path) => tokio::fs::write(path, contents.as_bytes())
            .await
            .with_context(|| format!("Failed to write {:?}", path)),
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(contents.as_bytes())
                .context("Failed to write to stdout")?;
            if !contents.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
            Ok(())
        }
    }
}

fn print_stats(stats: &GenerationStats) {
    eprintln!(
        "   {}  {}/{}  {} attempt(s)  {} tokens in / {} tokens out  {}ms model / {}ms total",
        dim(&stats.document_name),
        stats.backend,
        stats.model,
        stats.attempts,
        stats.input_tokens,
        stats.output_tokens,
        stats.model_duration_ms,
        stats.total_duration_ms,
    );
}

/// `<stem>.<format extension>` for an input path or URL. Only a `.pdf`
/// extension is dropped, so `1706.03762` keeps its full name.
fn output_file_name(input: &str, format: FormatArg) -> String {
    format!("{}.{}", output_stem(input), format.extension())
}

fn output_stem(input: &str) -> String {
    if input.starts_with("data:") {
        return "upload".to_string();
    }
    let path = input.split(['?', '#']).next().unwrap_or(input);
    let name = short_name(path);
    let stem = match name.len().checked_sub(4).and_then(|i| name.get(i..).map(|ext| (i, ext))) {
        Some((i, ext)) if ext.eq_ignore_ascii_case(".pdf") => &name[..i],
        _ => name.as_str(),
    };
    if stem.is_empty() {
        "document".to_string()
    } else {
        stem.to_string()
    }
}

/// One distinct output file name per input, in input order. Inputs that
/// would share a name get `-2`, `-3`, … suffixes. A repeated input gets one
/// name per occurrence.
fn plan_output_names(inputs: &[String], format: FormatArg) -> HashMap<String, VecDeque<String>> {
    let mut taken = HashSet::new();
    let mut planned: HashMap<String, VecDeque<String>> = HashMap::new();
    for input in inputs {
        let stem = output_stem(input);
        let mut name = format!("{stem}.{}", format.extension());
        let mut n = 2;
        while !taken.insert(name.to_lowercase()) {
            name = format!("{stem}-{n}.{}", format.extension());
            n += 1;
        }
        planned.entry(input.clone()).or_default().push_back(name);
    }
    planned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_names() {
        assert_eq!(output_file_name("docs/paper.pdf", FormatArg::Json), "paper.taxonomy.json");
        assert_eq!(output_file_name("docs/SCAN.PDF", FormatArg::Json), "SCAN.taxonomy.json");
        assert_eq!(
            output_file_name("https://arxiv.org/pdf/1706.03762", FormatArg::Markdown),
            "1706.03762.taxonomy.md"
        );
        assert_eq!(
            output_file_name("https://host/files/deck.pdf?download=1", FormatArg::Json),
            "deck.taxonomy.json"
        );
        assert_eq!(output_file_name("data:application/pdf;base64,AA", FormatArg::Outline), "upload.taxonomy.txt");
    }

    #[test]
    fn batch_output_names_never_collide() {
        let inputs: Vec<String> = [
            "x/report.pdf",
            "y/report.pdf",
            "https://arxiv.org/pdf/1706.03762",
            "https://arxiv.org/pdf/1706.03763",
            "data:application/pdf;base64,AA",
            "data:application/pdf;base64,BB",
            "x/report.pdf",
            "z/Report-2.pdf",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let mut planned = plan_output_names(&inputs, FormatArg::Json);

        let mut names: Vec<String> = inputs
            .iter()
            .map(|i| planned.get_mut(i).and_then(VecDeque::pop_front).unwrap())
            .collect();
        assert_eq!(names[0], "report.taxonomy.json");
        assert_eq!(names[1], "report-2.taxonomy.json");
        assert_eq!(names[2], "1706.03762.taxonomy.json");
        assert_eq!(names[3], "1706.03763.taxonomy.json");
        assert_eq!(names[4], "upload.taxonomy.json");
        assert_eq!(names[5], "upload-2.taxonomy.json");
        assert_eq!(names[6], "report-3.taxonomy.json");
        assert_eq!(names[7], "Report-2-2.taxonomy.json");

        names.sort_by_key(|n| n.to_lowercase());
        names.dedup_by_key(|n| n.to_lowercase());
        assert_eq!(names.len(), inputs.len());
    }

    #[test]
    fn short_names() {
        assert_eq!(short_name("/tmp/x/report.pdf"), "report.pdf");
        assert_eq!(short_name("https://host/a/b/"), "b");
        assert_eq!(short_name("plain.pdf"), "plain.pdf");
    }

    #[test]
    fn truncation_is_char_safe() {
        assert_eq!(truncate("ééééé", 3), "éé\u{2026}");
        assert_eq!(truncate("short", 10), "short");
    }
}
