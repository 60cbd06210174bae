//! Shared test utilities for cardscan integration tests.
//!
//! - `fixtures` builds small card PDFs with lopdf
//! - `TestHarness` wires a pipeline to temp directories, an in-memory
//!   registry and synthetic rasterizer/OCR backends

pub mod fixtures;
pub mod harness;

pub use fixtures::*;
pub use harness::TestHarness;
