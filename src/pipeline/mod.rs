//! Pipeline stages for taxonomy generation.
//!
//! Each submodule implements one step, so each is testable on its own and a
//! backend can be swapped without touching input handling or decoding.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ backend ──▶ postprocess
//! (path/URL/  (base64)   (Gemini or   (fences, lenient
//!  data URI)             vision LLM)  JSON, enrich)
//! ```
//!
//! 1. [`input`]   — resolve the user-supplied path, URL or data URI to
//!    validated PDF bytes
//! 2. [`encode`]  — base64 and data-URI helpers; PNG encoding of pages
//! 3. [`backend`] — the [`backend::TaxonomyBackend`] seam and backend
//!    resolution; [`gemini`] sends the PDF inline, [`llm`] sends page images
//!    rendered by [`render`] (pdfium, in `spawn_blocking`)
//! 4. [`postprocess`] — strip fences and prose, decode leniently, recompute
//!    metadata

pub mod backend;
pub mod encode;
pub mod gemini;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod render;
