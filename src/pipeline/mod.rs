//! De-identification pipeline
//!
//! Coordinates the full run: load document, OCR, PHI detection, offset
//! indexing, entity matching, mask painting, reassembly. Within one document
//! everything is a linear pass over ordered data; provider calls are the
//! only suspension points. Documents are independent: a [`Deidentifier`] can
//! be shared across worker tasks because it holds no per-document state.
//!
//! Cancellation is observed between phases and raced against provider
//! calls; it is the only condition reported as `Err`. Every other failure
//! becomes a `status = failure` result with empty masked bytes, while
//! recoverable anomalies (unmatched entities) leave the status at success.

use crate::config::RedactionConfig;
use crate::document::{codec_for, optimize_for_ocr, DocumentFormat, MaskPainter};
use crate::domain::{DeidentificationResult, RedactifyError, Result};
use crate::matching::{build_offset_index, EntityMatcher};
use crate::providers::{OcrProvider, PhiProvider};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// Orchestrates de-identification of single documents
pub struct Deidentifier {
    ocr: Arc<dyn OcrProvider>,
    phi: Arc<dyn PhiProvider>,
    config: RedactionConfig,
}

impl Deidentifier {
    /// Compose the pipeline from its collaborators
    pub fn new(
        ocr: Arc<dyn OcrProvider>,
        phi: Arc<dyn PhiProvider>,
        config: RedactionConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self { ocr, phi, config })
    }

    /// De-identify a document, painting over every matched PHI region
    ///
    /// Returns `Err` only for cancellation; any other failure is folded into
    /// a failure-status result so callers always get counts and an error
    /// trail.
    pub async fn deidentify(
        &self,
        document_bytes: &[u8],
        format: DocumentFormat,
        cancel: watch::Receiver<bool>,
    ) -> Result<DeidentificationResult> {
        let started = Instant::now();

        match self.run_pipeline(document_bytes, format, &cancel, started).await {
            Ok(result) => Ok(result),
            Err(RedactifyError::Cancelled) => {
                tracing::info!("de-identification cancelled");
                Err(RedactifyError::Cancelled)
            }
            Err(e) => {
                let message = format!("de-identification failed: {e}");
                tracing::error!(error = %e, "de-identification failed");
                Ok(DeidentificationResult::failure(
                    started.elapsed().as_millis() as u64,
                    vec![message],
                ))
            }
        }
    }

    /// Convenience wrapper reading from and writing to the filesystem
    ///
    /// The format is inferred from the input extension. The output file is
    /// only written when the run succeeds.
    pub async fn deidentify_file(
        &self,
        input_path: impl AsRef<Path>,
        output_path: Option<&Path>,
        cancel: watch::Receiver<bool>,
    ) -> Result<DeidentificationResult> {
        let input_path = input_path.as_ref();
        let format: DocumentFormat = input_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .parse()
            .map_err(RedactifyError::DocumentLoad)?;

        let document_bytes = tokio::fs::read(input_path).await?;
        let result = self.deidentify(&document_bytes, format, cancel).await?;

        if let Some(path) = output_path {
            if result.is_success() {
                tokio::fs::write(path, &result.masked_bytes).await?;
                tracing::info!(path = %path.display(), "saved de-identified document");
            }
        }

        Ok(result)
    }

    async fn run_pipeline(
        &self,
        document_bytes: &[u8],
        format: DocumentFormat,
        cancel: &watch::Receiver<bool>,
        started: Instant,
    ) -> Result<DeidentificationResult> {
        tracing::info!(
            %format,
            level = %self.config.masking_level,
            bytes = document_bytes.len(),
            "starting de-identification pipeline"
        );

        // Step 1: load the document and split it into pages
        let codec = codec_for(format)?;
        let (images, metadata) = codec.load(document_bytes)?;
        tracing::info!(pages = images.len(), "loaded document");
        ensure_not_cancelled(cancel)?;

        // Step 2: OCR over the optimized upload
        let ocr_bytes = optimize_for_ocr(
            codec.as_ref(),
            &images,
            &metadata,
            self.config.max_ocr_size_mb,
        )?;
        let ocr_result =
            race_cancel(self.ocr.analyze(&ocr_bytes, format, None), cancel).await?;
        ocr_result.validate()?;
        tracing::info!(
            pages = ocr_result.pages.len(),
            words = ocr_result.word_count(),
            "OCR extraction completed"
        );
        ensure_not_cancelled(cancel)?;

        // Step 3: PHI detection over the concatenated text
        let entities = race_cancel(
            self.phi.detect(&ocr_result.full_text, self.config.masking_level),
            cancel,
        )
        .await?;
        tracing::info!(entities = entities.len(), "PHI detection completed");
        ensure_not_cancelled(cancel)?;

        // Step 4: align words to text, then resolve entities to geometry
        let index = build_offset_index(&ocr_result, self.config.fuzzy_word_threshold);
        let matcher = EntityMatcher::new(self.config.matcher_config());
        let report = matcher.match_entities(&ocr_result, &index, &entities)?;
        tracing::info!(
            regions = report.regions.len(),
            matched = report.matched,
            unmatched = report.unmatched,
            filtered = report.filtered,
            "entity matching completed"
        );
        if report.unmatched > 0 {
            tracing::warn!(
                unmatched = report.unmatched,
                "some PHI entities could not be mapped to geometry and will not be masked"
            );
        }
        ensure_not_cancelled(cancel)?;

        // Step 5: paint the masks
        let painter = MaskPainter::new(
            self.config.mask_color,
            f64::from(self.config.padding_px),
            self.config.debug_mode,
        );
        let masked_images = painter.apply_masks(&images, &report.regions, &ocr_result)?;

        // Step 6: reassemble the document
        let masked_bytes = codec.save(&masked_images, &metadata)?;

        let elapsed = started.elapsed().as_millis() as u64;
        tracing::info!(
            pages = images.len(),
            entities = entities.len(),
            regions = report.regions.len(),
            elapsed_ms = elapsed,
            "de-identification complete"
        );

        Ok(DeidentificationResult::success(
            masked_bytes,
            images.len(),
            entities.len(),
            report.unmatched,
            report.filtered,
            report.regions,
            elapsed,
            report.warnings,
        ))
    }
}

/// Check the cancellation flag between phases
fn ensure_not_cancelled(cancel: &watch::Receiver<bool>) -> Result<()> {
    if *cancel.borrow() {
        Err(RedactifyError::Cancelled)
    } else {
        Ok(())
    }
}

/// Race a provider call against cancellation; dropping the in-flight future
/// forwards the abort to the collaborator
async fn race_cancel<T>(
    operation: impl Future<Output = Result<T>>,
    cancel: &watch::Receiver<bool>,
) -> Result<T> {
    let mut rx = cancel.clone();
    if *rx.borrow() {
        return Err(RedactifyError::Cancelled);
    }

    tokio::select! {
        result = operation => result,
        _ = wait_for_cancel(&mut rx) => Err(RedactifyError::Cancelled),
    }
}

async fn wait_for_cancel(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender dropped: cancellation can never arrive
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_race_cancel_passes_through_results() {
        let (_tx, rx) = watch::channel(false);
        let value = race_cancel(async { Ok(7) }, &rx).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_race_cancel_aborts_pending_operation() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let result: Result<()> = race_cancel(std::future::pending(), &rx).await;
        assert!(matches!(result, Err(RedactifyError::Cancelled)));
    }

    #[tokio::test]
    async fn test_race_cancel_reacts_to_late_signal() {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            let _ = tx.send(true);
        });
        let result: Result<()> = race_cancel(std::future::pending(), &rx).await;
        assert!(matches!(result, Err(RedactifyError::Cancelled)));
    }
}
