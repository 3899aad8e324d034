// Redactify - Medical Document De-identification
// Copyright (c) 2025 Redactify Contributors
// Licensed under the MIT License

//! # Redactify - Medical Document De-identification
//!
//! Redactify takes a scanned medical document and produces a visually
//! masked copy in which every region of text carrying Protected Health
//! Information (PHI) has been painted over. The hard problem it solves is
//! **entity-to-geometry resolution**: OCR reports word-level pixel
//! geometry, while PHI detection reports character offsets into the
//! document text; the core reconciles the two into pixel rectangles.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`pipeline`] - The de-identification orchestrator
//! - [`matching`] - Offset indexing and entity-to-geometry resolution
//! - [`providers`] - OCR and PHI detection collaborators (Azure, offline)
//! - [`document`] - Multi-page raster I/O and the mask painter
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use redactify::config::RedactionConfig;
//! use redactify::document::DocumentFormat;
//! use redactify::pipeline::Deidentifier;
//! use redactify::providers::{MockOcrProvider, PatternPhiProvider};
//! use std::sync::Arc;
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> redactify::domain::Result<()> {
//!     let deidentifier = Deidentifier::new(
//!         Arc::new(MockOcrProvider::new()),
//!         Arc::new(PatternPhiProvider::new()),
//!         RedactionConfig::default(),
//!     )?;
//!
//!     let (_cancel_tx, cancel_rx) = watch::channel(false);
//!     let document = std::fs::read("scan.tiff")?;
//!     let result = deidentifier
//!         .deidentify(&document, DocumentFormat::Tiff, cancel_rx)
//!         .await?;
//!
//!     println!(
//!         "masked {} regions across {} pages ({} unmatched)",
//!         result.regions_produced, result.pages_processed, result.entities_unmatched
//!     );
//!     std::fs::write("scan.redacted.tiff", &result.masked_bytes)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Error handling
//!
//! All fallible operations return [`domain::Result`]. Cancellation is the
//! only condition [`pipeline::Deidentifier::deidentify`] reports as `Err`;
//! other failures produce a failure-status result carrying the error trail.
//! Unmatched entities are counted, not fatal.

pub mod cli;
pub mod config;
pub mod document;
pub mod domain;
pub mod logging;
pub mod matching;
pub mod pipeline;
pub mod providers;
