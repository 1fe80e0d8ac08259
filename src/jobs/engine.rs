use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::analysis::{
    build_credit_lines, detect_credits_band, group_credit_lines, reconstruct_lines, CreditGroup,
    CreditsConfig, LineRegion, RegionGeometry, TextRole,
};
use crate::imaging::{self, THUMBNAIL_MAX_EDGE_PX};
use crate::providers::{
    GoogleVision, InpaintingClient, OcrClient, OpenAiTranslator, StubInpainter, TranslationClient,
    TranslationRegion,
};
use crate::settings::{LocalizationMode, Settings};

use super::mock::MockEngine;
use super::store::JobStore;
use super::{
    DebugGeometry, DebugInfo, DebugTextRegion, DetectedText, ErrorCode, ErrorInfo, JobResult,
    JobStatus, LocalizationJob, ProcessingTimeMs, ProgressStage, StageTimingsMs,
};

/// Tagline phrases matched against uppercased line text.
const TAGLINE_MARKERS: [&str; 3] = ["COMING SOON", "NOW PLAYING", "IN THEATERS"];
const CREDITS_MARKERS: [&str; 2] = ["DIRECTED BY", "PRODUCED BY"];

pub type EngineFuture = Pin<Box<dyn Future<Output = LocalizationJob> + Send>>;

/// A localization pipeline. `run` owns the job for the whole pipeline and
/// pushes snapshots into the store as stages finish, so polling clients
/// see progress while the job is still in flight.
pub trait LocalizationEngine: Send + Sync {
    fn run(&self, job: LocalizationJob, store: Arc<JobStore>) -> EngineFuture;
}

pub fn build_engine(settings: &Settings) -> Result<Arc<dyn LocalizationEngine>> {
    match settings.mode {
        LocalizationMode::Mock => {
            info!("using mock localization engine");
            Ok(Arc::new(MockEngine))
        }
        LocalizationMode::Live => {
            let engine = LiveEngine::from_settings(settings)?;
            info!("using live localization engine");
            Ok(Arc::new(engine))
        }
    }
}

/// OCR, translation, inpainting, and packaging against real providers.
#[derive(Clone)]
pub struct LiveEngine {
    ocr: Arc<dyn OcrClient>,
    translator: Arc<dyn TranslationClient>,
    inpainter: Arc<dyn InpaintingClient>,
    analysis_max_long_edge_px: u32,
    credits: CreditsConfig,
}

impl std::fmt::Debug for LiveEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveEngine")
            .field("analysis_max_long_edge_px", &self.analysis_max_long_edge_px)
            .field("credits", &self.credits)
            .finish_non_exhaustive()
    }
}

impl LiveEngine {
    pub fn new(
        ocr: Arc<dyn OcrClient>,
        translator: Arc<dyn TranslationClient>,
        inpainter: Arc<dyn InpaintingClient>,
        analysis_max_long_edge_px: u32,
        credits: CreditsConfig,
    ) -> Self {
        Self {
            ocr,
            translator,
            inpainter,
            analysis_max_long_edge_px,
            credits,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let ocr = GoogleVision::new(
            settings.ocr_api_key.clone().unwrap_or_default(),
            settings.ocr_api_endpoint.clone(),
        )?;
        let translator = OpenAiTranslator::new(
            settings.openai_api_key.clone().unwrap_or_default(),
            settings.translation_model.clone(),
        )?;
        Ok(Self::new(
            Arc::new(ocr),
            Arc::new(translator),
            Arc::new(StubInpainter),
            settings.analysis_max_long_edge_px,
            CreditsConfig::default(),
        ))
    }

    async fn process(
        &self,
        job: &mut LocalizationJob,
        store: &JobStore,
    ) -> Result<(), ErrorInfo> {
        let image_path = match &job.file_path {
            Some(path) => path.clone(),
            None => {
                error!("JobFailed jobId={} error=Job filePath is required", job.job_id);
                return Err(ErrorInfo::internal());
            }
        };
        let image_bytes = match tokio::fs::read(&image_path).await {
            Ok(bytes) => bytes,
            Err(_) => {
                error!(
                    "JobFailed jobId={} error=Image file not found: {}",
                    job.job_id,
                    image_path.display()
                );
                return Err(ErrorInfo::internal());
            }
        };

        info!("JobStarted jobId={} stage=OCR", job.job_id);
        let ocr_start = Instant::now();
        let derivative = imaging::analysis_derivative(&image_bytes, self.analysis_max_long_edge_px);
        let scan = match self.ocr.recognize_text(derivative).await {
            Ok(scan) => scan,
            Err(err) => {
                error!("OCR failed for job {}: {}", job.job_id, err);
                return Err(ErrorInfo::stage(
                    ErrorCode::OcrModelError,
                    format!("OCR processing failed: {}", err),
                ));
            }
        };
        let mut regions = reconstruct_lines(&scan.words);
        classify_regions(&mut regions);
        self.credits_pass(job, &image_bytes, &regions).await;
        let ocr_ms = elapsed_ms(ocr_start);
        job.set_progress(
            ProgressStage::Ocr,
            25,
            StageTimingsMs {
                ocr: Some(ocr_ms),
                ..StageTimingsMs::default()
            },
        );
        push_snapshot(store, job);
        info!(
            "JobUpdated jobId={} stage=OCR durationMs={} regions={}",
            job.job_id,
            ocr_ms,
            regions.len()
        );

        info!("JobUpdated jobId={} stage=TRANSLATION", job.job_id);
        let translation_start = Instant::now();
        let requests: Vec<TranslationRegion> = regions
            .iter()
            .filter(|region| is_localizable(region))
            .map(|region| TranslationRegion {
                text: region.text.clone(),
                role: region.role,
                bbox: region.bbox,
            })
            .collect();
        let translated = match self
            .translator
            .translate_regions(requests, job.target_language.clone())
            .await
        {
            Ok(translated) => translated,
            Err(err) => {
                error!("Translation failed for job {}: {}", job.job_id, err);
                return Err(ErrorInfo::stage(
                    ErrorCode::TranslationModelError,
                    format!("Translation processing failed: {}", err),
                ));
            }
        };
        let translation_ms = elapsed_ms(translation_start);
        job.set_progress(
            ProgressStage::Translation,
            50,
            StageTimingsMs {
                ocr: Some(ocr_ms),
                translation: Some(translation_ms),
                ..StageTimingsMs::default()
            },
        );
        push_snapshot(store, job);
        info!(
            "JobUpdated jobId={} stage=TRANSLATION durationMs={} translated={}",
            job.job_id,
            translation_ms,
            translated.len()
        );

        info!("JobUpdated jobId={} stage=INPAINT", job.job_id);
        let inpaint_start = Instant::now();
        let masks = regions.iter().map(|region| region.bbox).collect();
        let inpainted = match self
            .inpainter
            .inpaint_regions(image_bytes.clone(), masks)
            .await
        {
            Ok(bytes) => bytes,
            Err(err) => {
                error!("Inpainting failed for job {}: {}", job.job_id, err);
                return Err(ErrorInfo::stage(
                    ErrorCode::InpaintModelError,
                    format!("Inpainting processing failed: {}", err),
                ));
            }
        };
        let inpaint_ms = elapsed_ms(inpaint_start);
        job.set_progress(
            ProgressStage::Inpaint,
            75,
            StageTimingsMs {
                ocr: Some(ocr_ms),
                translation: Some(translation_ms),
                inpaint: Some(inpaint_ms),
                ..StageTimingsMs::default()
            },
        );
        push_snapshot(store, job);
        info!(
            "JobUpdated jobId={} stage=INPAINT durationMs={}",
            job.job_id, inpaint_ms
        );

        info!("JobUpdated jobId={} stage=PACKAGING", job.job_id);
        let packaging_start = Instant::now();
        let output_dir = image_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        if let Err(err) = tokio::fs::write(output_dir.join("output.png"), &inpainted).await {
            error!("JobFailed jobId={} error={}", job.job_id, err);
            return Err(ErrorInfo::internal());
        }
        match imaging::make_thumbnail(&inpainted, THUMBNAIL_MAX_EDGE_PX) {
            Ok(thumb) => {
                if let Err(err) = tokio::fs::write(output_dir.join("thumb.png"), thumb).await {
                    warn!("thumbnail write failed for job {}: {}", job.job_id, err);
                }
            }
            Err(err) => warn!("thumbnail encode failed for job {}: {}", job.job_id, err),
        }

        let find_translation = |text: &str| {
            translated
                .iter()
                .find(|item| item.original_text == text)
                .map(|item| item.translated_text.clone())
        };
        let detected_text: Vec<DetectedText> = regions
            .iter()
            .map(|region| DetectedText {
                text: find_translation(&region.text).unwrap_or_else(|| region.text.clone()),
                bounding_box: region.bbox,
                role: region.role,
            })
            .collect();
        let debug_regions: Vec<DebugTextRegion> = regions
            .iter()
            .enumerate()
            .map(|(index, region)| DebugTextRegion {
                id: format!("region-{}", index),
                role: region.role,
                bbox_norm: [
                    region.bbox.x1,
                    region.bbox.y1,
                    region.bbox.width(),
                    region.bbox.height(),
                ],
                original_text: region.text.clone(),
                translated_text: find_translation(&region.text),
                is_localizable: is_localizable(region),
                geometry: region.geometry.as_ref().map(|geometry| DebugGeometry {
                    quad_norm: geometry.quad,
                    center_norm: geometry.center,
                    angle_deg: geometry.angle_deg,
                }),
            })
            .collect();

        let packaging_ms = elapsed_ms(packaging_start);
        let total_ms = ocr_ms + translation_ms + inpaint_ms + packaging_ms;
        job.set_progress(
            ProgressStage::Packaging,
            100,
            StageTimingsMs {
                ocr: Some(ocr_ms),
                translation: Some(translation_ms),
                inpaint: Some(inpaint_ms),
                packaging: Some(packaging_ms),
            },
        );

        let timings = ProcessingTimeMs {
            ocr: ocr_ms,
            translation: translation_ms,
            inpaint: inpaint_ms,
            packaging: 0,
            total: total_ms,
        };
        job.result = Some(JobResult {
            image_url: format!("/static/jobs/{}/output.png", job.job_id),
            thumbnail_url: Some(format!("/static/jobs/{}/thumb.png", job.job_id)),
            processing_time_ms: timings,
            language: job.target_language.clone(),
            source_language: Some(
                job.source_language
                    .clone()
                    .unwrap_or_else(|| "en-US".to_string()),
            ),
            detected_text: Some(detected_text),
            debug: Some(DebugInfo {
                regions: debug_regions,
                timings,
            }),
        });
        job.status = JobStatus::Succeeded;
        job.touch();
        info!(
            "JobCompleted jobId={} status=succeeded durationMs={}",
            job.job_id, total_ms
        );
        push_snapshot(store, job);
        Ok(())
    }

    /// Second OCR pass over the detected credits block. Failures here never
    /// fail the job; the block just keeps no groups.
    async fn credits_pass(
        &self,
        job: &mut LocalizationJob,
        image_bytes: &[u8],
        regions: &[LineRegion],
    ) {
        let mut detection = match detect_credits_band(regions, &self.credits) {
            Some(detection) => detection,
            None => return,
        };
        if let Some(block) = detection.credits_block.as_mut() {
            match self.crop_and_group(image_bytes, &block.geometry).await {
                Ok(groups) => block.credit_groups = groups,
                Err(err) => {
                    warn!("credits crop analysis failed for the detected block: {}", err);
                }
            }
        }
        job.credits_detection = Some(detection);
    }

    async fn crop_and_group(
        &self,
        image_bytes: &[u8],
        geometry: &RegionGeometry,
    ) -> Result<Vec<CreditGroup>> {
        let (crop, mode) = imaging::extract_credits_crop(image_bytes, geometry);
        debug!("credits crop mode={} bytes={}", mode, crop.len());
        let scan = self.ocr.recognize_text(crop).await?;
        let lines = reconstruct_lines(&scan.words);
        let credit_lines = build_credit_lines(&lines);
        Ok(group_credit_lines(&credit_lines, &self.credits))
    }
}

impl LocalizationEngine for LiveEngine {
    fn run(&self, mut job: LocalizationJob, store: Arc<JobStore>) -> EngineFuture {
        let engine = self.clone();
        Box::pin(async move {
            job.status = JobStatus::Processing;
            job.touch();
            push_snapshot(&store, &job);
            if let Err(error) = engine.process(&mut job, &store).await {
                job.fail(error);
                push_snapshot(&store, &job);
            }
            job
        })
    }
}

/// A dropped snapshot means the job was evicted mid-flight; the pipeline
/// keeps going and the final state is simply not observable any more.
pub(super) fn push_snapshot(store: &JobStore, job: &LocalizationJob) {
    if let Err(err) = store.update(job.clone()) {
        debug!("progress snapshot dropped: {}", err);
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    (started.elapsed().as_millis() as u64).max(1)
}

/// Role heuristics over reconstructed lines. The first matching rule wins;
/// unmatched lines keep the role they already carry.
fn classify_regions(regions: &mut [LineRegion]) {
    for region in regions.iter_mut() {
        let upper = region.text.to_uppercase();
        if TAGLINE_MARKERS.iter().any(|marker| upper.contains(marker)) {
            region.role = TextRole::Tagline;
        } else if CREDITS_MARKERS.iter().any(|marker| upper.contains(marker)) {
            region.role = TextRole::Credits;
        } else if upper.contains("HTTP") || upper.contains("WWW.") || upper.contains('@') {
            region.role = TextRole::Other;
        } else if upper.chars().count() > 30 {
            region.role = TextRole::Title;
        } else if upper.chars().count() < 10 && upper.chars().any(|c| c.is_ascii_digit()) {
            region.role = TextRole::Other;
        }
    }
}

/// Lock policy. URLs, social handles, and titles stay untouched; credits,
/// taglines, and everything else goes to the translator.
fn is_localizable(region: &LineRegion) -> bool {
    let upper = region.text.to_uppercase();
    if upper.contains("HTTP") || upper.contains("WWW.") || upper.contains('@') {
        return false;
    }
    region.role != TextRole::Title
}
