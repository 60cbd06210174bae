use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use image::RgbImage;
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::compose::{encode_png, Composer, PreviewComposite};
use crate::document::{DocumentStatus, ExtractedFields, OutputArtifacts};
use crate::error::ProcessError;
use crate::processor::{
    read_text_layer, Blocklist, CardRegions, ExtractionInput, ExtractionStrategy, FieldExtractor,
    FieldParser, OcrExtractor, PageRasterizer, PopplerRasterizer, RasterizedPage,
    RegionCalibrator, TesseractRecognizer, TextLayerExtractor, TextRecognizer,
};
use crate::registry::DocumentRegistry;
use crate::sanitize;
use crate::storage::{validate_file_name, ArtifactStore, UploadStore};

use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::error::{PipelineError, PipelineWarning};
use super::progress::{IngestPhase, ProgressEvent, ProgressReporter};

/// Result of a successful `ingest`; the document waits in `processing` for
/// the operator to verify the fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    pub document_id: String,
    /// Upload copy name, e.g. `1700000000000_card.pdf`.
    pub file_name: String,
    /// Pass this to `finalize`.
    pub base_name: String,
    pub fields: ExtractedFields,
    pub strategy: ExtractionStrategy,
    /// PNG of the photo crop, fed back into `finalize`.
    #[serde(skip)]
    pub preview_photo: Vec<u8>,
    #[serde(skip)]
    pub preview_composite: RgbImage,
    pub warnings: Vec<PipelineWarning>,
}

impl IngestOutcome {
    pub fn preview_png(&self) -> Result<Vec<u8>, ProcessError> {
        encode_png(&self.preview_composite)
    }
}

/// A failed `ingest`. `document_id` is set once a record exists; that record
/// is now in `error`.
#[derive(Debug)]
pub struct IngestFailure {
    pub document_id: Option<String>,
    pub error: PipelineError,
}

impl std::fmt::Display for IngestFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.document_id {
            Some(id) => write!(f, "document {}: {}", id, self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for IngestFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Stage outputs of one ingestion.
struct Extracted {
    strategy: ExtractionStrategy,
    fields: ExtractedFields,
    preview: PreviewComposite,
}

pub struct Pipeline {
    config: Arc<PipelineConfig>,
    registry: Arc<dyn DocumentRegistry>,
    rasterizer: Arc<dyn PageRasterizer>,
    recognizer: Arc<dyn TextRecognizer>,
    composer: Composer,
    calibrator: RegionCalibrator,
    blocklist: Blocklist,
    uploads: UploadStore,
    artifacts: ArtifactStore,
}

impl Pipeline {
    /// Production constructor: poppler rasterizer, Tesseract, configured font.
    pub fn from_config(
        config: Arc<PipelineConfig>,
        registry: Arc<dyn DocumentRegistry>,
    ) -> Result<Self, ProcessError> {
        let composer = Composer::from_config(&config.composer)?;
        Ok(Self::new(config, registry, composer))
    }

    pub fn new(
        config: Arc<PipelineConfig>,
        registry: Arc<dyn DocumentRegistry>,
        composer: Composer,
    ) -> Self {
        let recognizer = Arc::new(TesseractRecognizer::new(&config.ocr_languages));
        let calibrator = RegionCalibrator::new(&config.calibration);
        let blocklist = Blocklist::new(config.blocklist.iter().cloned());
        let uploads = UploadStore::new(&config.upload_directory);
        let artifacts = ArtifactStore::new(&config.output_directory);

        Self {
            config,
            registry,
            rasterizer: Arc::new(PopplerRasterizer::new()),
            recognizer,
            composer,
            calibrator,
            blocklist,
            uploads,
            artifacts,
        }
    }

    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn with_recognizer(mut self, recognizer: Arc<dyn TextRecognizer>) -> Self {
        self.recognizer = recognizer;
        self
    }

    pub fn registry(&self) -> &Arc<dyn DocumentRegistry> {
        &self.registry
    }

    /// Copies the upload, registers it and runs it through to the preview.
    ///
    /// Any stage failure moves the record to `error` and is returned as an
    /// [`IngestFailure`]. Finding no fields is not a failure.
    pub fn ingest(
        &self,
        source: &Path,
        original_name: &str,
        owner: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<IngestOutcome, IngestFailure> {
        let _span = info_span!("ingest",
            filename = %sanitize::redact_path(Path::new(original_name)),
            owner = %owner,
        )
        .entered();

        let mut ctx = self
            .register(source, original_name, owner)
            .map_err(|error| self.fail(None, error, progress))?;

        let _doc_span = info_span!("document", document_id = %ctx.document_id).entered();

        let extracted = match self.run_stages(&mut ctx, progress) {
            Ok(extracted) => extracted,
            Err(error) => return Err(self.fail(Some(&ctx.document_id), error, progress)),
        };

        if let Err(error) = self
            .registry
            .update_fields(&ctx.document_id, &extracted.fields, None)
        {
            return Err(self.fail(Some(&ctx.document_id), error.into(), progress));
        }

        info!(
            strategy = %extracted.strategy,
            id_number = %extracted
                .fields
                .id_number
                .as_deref()
                .map(sanitize::mask_id_number)
                .unwrap_or_default(),
            "Extracted card fields"
        );

        progress.report(ProgressEvent::Completed {
            document_id: ctx.document_id.clone(),
            strategy: extracted.strategy,
            fields_found: !extracted.fields.is_empty(),
        });

        Ok(IngestOutcome {
            file_name: ctx.file_name(),
            base_name: ctx.base_name(),
            document_id: ctx.document_id,
            fields: extracted.fields,
            strategy: extracted.strategy,
            preview_photo: extracted.preview.photo_png,
            preview_composite: extracted.preview.composite,
            warnings: ctx.warnings,
        })
    }

    /// Renders the verified fields into `processed_<base_name>.png|pdf` and
    /// completes the record.
    ///
    /// Failures leave the record in `processing` so finalize can be retried.
    pub fn finalize(
        &self,
        document_id: &str,
        base_name: &str,
        fields: &ExtractedFields,
        photo_png: &[u8],
    ) -> Result<OutputArtifacts, PipelineError> {
        let _span = info_span!("finalize", document_id = %document_id).entered();

        let record = self.registry.get_record(document_id)?;
        if record.status != DocumentStatus::Processing {
            return Err(PipelineError::NotProcessing {
                id: document_id.to_string(),
                status: record.status,
            });
        }
        validate_file_name(base_name)?;

        let composite = self.composer.compose_final(photo_png, fields)?;
        let (image_path, pdf_path) =
            self.artifacts
                .write_final(base_name, &composite.png, &composite.pdf)?;

        let artifacts = OutputArtifacts {
            image_path,
            pdf_path,
        };
        self.registry
            .update_fields(document_id, fields, Some(&artifacts))?;

        info!(
            "Finalized {} -> {}",
            document_id,
            sanitize::redact_path(&artifacts.pdf_path)
        );
        Ok(artifacts)
    }

    fn register(
        &self,
        source: &Path,
        original_name: &str,
        owner: &str,
    ) -> Result<PipelineContext, PipelineError> {
        let upload_path = self.uploads.store(source, original_name)?;
        let document_id = self
            .registry
            .create_record(owner, original_name, &upload_path)?;
        self.registry
            .update_status(&document_id, DocumentStatus::Processing, None)?;

        debug!(
            "Registered {} as {}",
            sanitize::redact_path(&upload_path),
            document_id
        );
        Ok(PipelineContext::new(
            document_id,
            owner,
            original_name,
            upload_path,
        ))
    }

    fn run_stages(
        &self,
        ctx: &mut PipelineContext,
        progress: &dyn ProgressReporter,
    ) -> Result<Extracted, PipelineError> {
        let page = {
            let _step = info_span!("rasterize").entered();
            self.phase(ctx, progress, IngestPhase::Rasterizing, "Rendering page 1...");
            self.step_rasterize(ctx)?
        };

        let regions = {
            let _step = info_span!("calibrate").entered();
            self.phase(ctx, progress, IngestPhase::Calibrating, "Locating card region...");
            self.calibrator.crop(&page)?
        };
        drop(page);

        let (strategy, lines) = {
            let _step = info_span!("extract").entered();
            self.phase(ctx, progress, IngestPhase::Extracting, "Reading card text...");
            self.step_extract(ctx, &regions)?
        };

        let fields = {
            let _step = info_span!("parse").entered();
            self.phase(ctx, progress, IngestPhase::Parsing, "Parsing fields...");
            FieldParser::new(strategy, self.blocklist.clone()).parse(&lines)
        };

        let preview = {
            self.phase(ctx, progress, IngestPhase::Composing, "Composing preview...");
            self.composer.compose_preview(&regions.photo, &fields)?
        };

        Ok(Extracted {
            strategy,
            fields,
            preview,
        })
    }

    fn step_rasterize(&self, ctx: &mut PipelineContext) -> Result<RasterizedPage, PipelineError> {
        let page = self
            .rasterizer
            .rasterize(&ctx.upload_path, self.config.raster_scale)?;

        if self.config.debug_page_images {
            let written = encode_png(&page.image.to_rgb8())
                .map_err(PipelineError::from)
                .and_then(|png| {
                    self.artifacts
                        .write_debug_page(&ctx.document_id, &png)
                        .map_err(PipelineError::from)
                });
            if let Err(e) = written {
                warn!("Failed to write debug page render: {}", e);
                ctx.warnings.push(PipelineWarning::DebugPageFailed {
                    error: e.to_string(),
                });
            }
        }

        Ok(page)
    }

    fn step_extract(
        &self,
        ctx: &PipelineContext,
        regions: &CardRegions,
    ) -> Result<(ExtractionStrategy, Vec<String>), PipelineError> {
        let text_layer = read_text_layer(&ctx.upload_path)?;
        let strategy = ExtractionStrategy::select(self.config.strategy, text_layer.as_deref());
        debug!("Using {} strategy", strategy);

        let extractor: Box<dyn FieldExtractor> = match strategy {
            ExtractionStrategy::TextLayer => Box::new(TextLayerExtractor::new(
                self.config.template_marker.clone(),
                self.blocklist.clone(),
            )),
            ExtractionStrategy::Ocr => Box::new(OcrExtractor::new(
                Arc::clone(&self.recognizer),
                self.blocklist.clone(),
            )),
        };

        let lines = extractor.extract_lines(&ExtractionInput {
            text_layer: text_layer.as_deref(),
            card: &regions.card,
        })?;
        Ok((extractor.strategy(), lines))
    }

    fn phase(
        &self,
        ctx: &PipelineContext,
        progress: &dyn ProgressReporter,
        phase: IngestPhase,
        message: &str,
    ) {
        progress.report(ProgressEvent::Phase {
            document_id: ctx.document_id.clone(),
            phase,
            message: message.to_string(),
        });
    }

    /// Records the failure against the document (if any) and reports it.
    fn fail(
        &self,
        document_id: Option<&str>,
        error: PipelineError,
        progress: &dyn ProgressReporter,
    ) -> IngestFailure {
        let failure = error.to_failure();

        if let Some(id) = document_id {
            if let Err(e) = self.registry.record_failure(id, &failure.message, Utc::now()) {
                warn!("Failed to record failure for {}: {}", id, e);
            }
        }

        progress.report(ProgressEvent::Failed {
            document_id: document_id.map(str::to_string),
            kind: failure.kind,
            error: failure.message,
        });

        IngestFailure {
            document_id: document_id.map(str::to_string),
            error,
        }
    }
}
