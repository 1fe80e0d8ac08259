use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use time::OffsetDateTime;

use crate::analysis::{BBoxNorm, CreditsBandDetection, NormPoint, Quad, TextRole};

mod engine;
mod mock;
mod store;

pub use engine::{build_engine, EngineFuture, LiveEngine, LocalizationEngine};
pub use mock::MockEngine;
pub use store::JobStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Succeeded,
    Failed,
    /// Reserved; nothing cancels jobs yet.
    Canceled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStage {
    Ocr,
    Translation,
    Inpaint,
    Packaging,
}

impl ProgressStage {
    /// Stage name as it appears in pipeline log lines.
    pub fn log_name(&self) -> &'static str {
        match self {
            ProgressStage::Ocr => "OCR",
            ProgressStage::Translation => "TRANSLATION",
            ProgressStage::Inpaint => "INPAINT",
            ProgressStage::Packaging => "PACKAGING",
        }
    }
}

/// Per-stage wall-clock timings, keyed the way clients see them. A key is
/// present once its stage has finished.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StageTimingsMs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inpaint: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packaging: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub stage: ProgressStage,
    pub percent: u8,
    pub stage_timings_ms: StageTimingsMs,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ProcessingTimeMs {
    pub ocr: u64,
    pub translation: u64,
    pub inpaint: u64,
    pub packaging: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectedText {
    pub text: String,
    #[serde(rename = "boundingBox")]
    pub bounding_box: BBoxNorm,
    pub role: TextRole,
}

/// Line-level OCR output with full metadata, exposed under `result.debug`.
#[derive(Debug, Clone, Serialize)]
pub struct DebugTextRegion {
    pub id: String,
    pub role: TextRole,
    /// Normalized `[x, y, width, height]`.
    pub bbox_norm: [f32; 4],
    pub original_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_text: Option<String>,
    pub is_localizable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<DebugGeometry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebugGeometry {
    pub quad_norm: Quad,
    pub center_norm: NormPoint,
    pub angle_deg: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebugInfo {
    pub regions: Vec<DebugTextRegion>,
    pub timings: ProcessingTimeMs,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub processing_time_ms: ProcessingTimeMs,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_text: Option<Vec<DetectedText>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidInput,
    NotFound,
    PayloadTooLarge,
    UnsupportedMediaType,
    InternalError,
    OcrModelError,
    TranslationModelError,
    InpaintModelError,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorInfo {
    /// Failure inside a named pipeline stage. Stage failures are
    /// retryable: the upload is still on disk.
    pub fn stage(code: ErrorCode, message: String) -> Self {
        Self {
            code,
            message,
            retryable: true,
            details: None,
        }
    }

    pub fn internal() -> Self {
        Self {
            code: ErrorCode::InternalError,
            message: "An unexpected error occurred during processing.".to_string(),
            retryable: true,
            details: None,
        }
    }
}

/// Internal job record. Only the fields surfaced by [`GetJobResponse`]
/// leave the process.
#[derive(Debug, Clone)]
pub struct LocalizationJob {
    pub job_id: String,
    pub status: JobStatus,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub target_language: String,
    pub source_language: Option<String>,
    pub progress: Option<Progress>,
    pub result: Option<JobResult>,
    pub error: Option<ErrorInfo>,
    pub file_path: Option<PathBuf>,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub job_metadata: Option<serde_json::Value>,
    pub credits_detection: Option<CreditsBandDetection>,
}

impl LocalizationJob {
    pub fn new(job_id: String, target_language: String) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            job_id,
            status: JobStatus::Queued,
            created_at: now,
            updated_at: now,
            target_language,
            source_language: None,
            progress: None,
            result: None,
            error: None,
            file_path: None,
            file_name: None,
            file_size: None,
            job_metadata: None,
            credits_detection: None,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = OffsetDateTime::now_utc();
    }

    pub fn set_progress(&mut self, stage: ProgressStage, percent: u8, timings: StageTimingsMs) {
        self.progress = Some(Progress {
            stage,
            percent,
            stage_timings_ms: timings,
        });
        self.touch();
    }

    pub fn fail(&mut self, error: ErrorInfo) {
        self.status = JobStatus::Failed;
        self.error = Some(error);
        self.touch();
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponse {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_seconds: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetJobResponse {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl From<&LocalizationJob> for GetJobResponse {
    fn from(job: &LocalizationJob) -> Self {
        Self {
            job_id: job.job_id.clone(),
            status: job.status,
            created_at: job.created_at,
            updated_at: job.updated_at,
            progress: job.progress.clone(),
            result: job.result.clone(),
            error: job.error.clone(),
        }
    }
}

static JOB_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// `loc_` followed by 26 uppercase hex characters.
pub fn generate_job_id() -> String {
    let sequence = JOB_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    let digest = md5::compute(format!("{}-{}-{}", nanos, sequence, std::process::id()));
    let hex = format!("{:x}", digest);
    format!("loc_{}", hex[..26].to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_ids_are_prefixed_unique_and_upper_hex() {
        let a = generate_job_id();
        let b = generate_job_id();
        assert_ne!(a, b);
        for id in [&a, &b] {
            assert_eq!(id.len(), 4 + 26);
            assert!(id.starts_with("loc_"));
            assert!(id[4..]
                .chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        }
    }

    #[test]
    fn get_response_hides_internal_fields() {
        let mut job = LocalizationJob::new("loc_X".into(), "fr-FR".into());
        job.file_path = Some(PathBuf::from("tmp/uploads/loc_X/poster.png"));
        job.set_progress(
            ProgressStage::Ocr,
            25,
            StageTimingsMs {
                ocr: Some(120),
                ..StageTimingsMs::default()
            },
        );

        let body = serde_json::to_value(GetJobResponse::from(&job)).unwrap();
        assert_eq!(body["jobId"], "loc_X");
        assert_eq!(body["status"], "queued");
        assert_eq!(body["progress"]["stage"], "ocr");
        assert_eq!(body["progress"]["percent"], 25);
        assert_eq!(body["progress"]["stageTimingsMs"]["ocr"], 120);
        assert!(body["progress"]["stageTimingsMs"]
            .get("translation")
            .is_none());
        assert!(body.get("result").is_none());
        assert!(body.get("filePath").is_none());
        assert!(body.get("estimatedSeconds").is_none());
    }

    #[test]
    fn result_serializes_camel_case_and_omits_empty_fields() {
        let result = JobResult {
            image_url: "/static/jobs/loc_X/output.png".into(),
            thumbnail_url: Some("/static/jobs/loc_X/thumb.png".into()),
            processing_time_ms: ProcessingTimeMs {
                ocr: 900,
                translation: 700,
                inpaint: 3200,
                packaging: 0,
                total: 5100,
            },
            language: "fr-FR".into(),
            source_language: Some("en-US".into()),
            detected_text: None,
            debug: None,
        };
        let body = serde_json::to_value(&result).unwrap();
        assert_eq!(body["imageUrl"], "/static/jobs/loc_X/output.png");
        assert_eq!(body["processingTimeMs"]["total"], 5100);
        assert_eq!(body["processingTimeMs"]["packaging"], 0);
        assert!(body.get("detectedText").is_none());
        assert!(body.get("debug").is_none());
    }

    #[test]
    fn error_codes_serialize_screaming_snake_case() {
        let error = ErrorInfo::stage(
            ErrorCode::OcrModelError,
            "OCR processing failed: timeout".into(),
        );
        let body = serde_json::to_value(&error).unwrap();
        assert_eq!(body["code"], "OCR_MODEL_ERROR");
        assert_eq!(body["retryable"], true);
        assert!(body.get("details").is_none());
    }
}
