use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::sleep;
use tracing::info;

use crate::analysis::{BBoxNorm, TextRole};

use super::engine::{push_snapshot, EngineFuture, LocalizationEngine};
use super::store::JobStore;
use super::{
    DetectedText, JobResult, JobStatus, LocalizationJob, ProcessingTimeMs, ProgressStage,
    StageTimingsMs,
};

/// Pipeline simulator. Stage delays and the canned result are shaped like
/// a real run so clients can be built against it without provider keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockEngine;

impl LocalizationEngine for MockEngine {
    fn run(&self, mut job: LocalizationJob, store: Arc<JobStore>) -> EngineFuture {
        Box::pin(async move {
            job.status = JobStatus::Processing;
            job.touch();
            push_snapshot(&store, &job);

            info!("JobStarted jobId={} stage=OCR", job.job_id);
            let ocr_ms = simulate_stage(800, 2000).await;
            job.set_progress(
                ProgressStage::Ocr,
                25,
                StageTimingsMs {
                    ocr: Some(ocr_ms),
                    ..StageTimingsMs::default()
                },
            );
            push_snapshot(&store, &job);

            info!("JobUpdated jobId={} stage=TRANSLATION", job.job_id);
            let translation_ms = simulate_stage(600, 1500).await;
            job.set_progress(
                ProgressStage::Translation,
                50,
                StageTimingsMs {
                    ocr: Some(ocr_ms),
                    translation: Some(translation_ms),
                    ..StageTimingsMs::default()
                },
            );
            push_snapshot(&store, &job);

            info!("JobUpdated jobId={} stage=INPAINT", job.job_id);
            let inpaint_ms = simulate_stage(3000, 6000).await;
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
            push_snapshot(&store, &job);

            info!("JobUpdated jobId={} stage=PACKAGING", job.job_id);
            let packaging_ms = simulate_stage(200, 500).await;
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

            job.result = Some(mock_result(
                &job.job_id,
                &job.target_language,
                job.source_language.as_deref().unwrap_or("en-US"),
                ProcessingTimeMs {
                    ocr: ocr_ms,
                    translation: translation_ms,
                    inpaint: inpaint_ms,
                    packaging: 0,
                    total: total_ms,
                },
            ));
            job.status = JobStatus::Succeeded;
            job.touch();
            info!(
                "JobCompleted jobId={} status=succeeded durationMs={}",
                job.job_id, total_ms
            );
            push_snapshot(&store, &job);
            job
        })
    }
}

/// Sleeps a pseudo-random duration in `[min_ms, max_ms]` and reports it.
/// Clock nanos stand in for an RNG.
async fn simulate_stage(min_ms: u64, max_ms: u64) -> u64 {
    let jitter = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::from(elapsed.subsec_nanos()))
        .unwrap_or(0);
    let delay_ms = min_ms + jitter % (max_ms - min_ms + 1);
    sleep(Duration::from_millis(delay_ms)).await;
    delay_ms
}

fn mock_result(
    job_id: &str,
    target_language: &str,
    source_language: &str,
    processing_time_ms: ProcessingTimeMs,
) -> JobResult {
    let detected_text = vec![
        DetectedText {
            text: "THE GREAT HEIST".to_string(),
            bounding_box: bbox(0.10, 0.20, 0.80, 0.28),
            role: TextRole::Title,
        },
        DetectedText {
            text: "COMING SOON".to_string(),
            bounding_box: bbox(0.12, 0.90, 0.78, 0.95),
            role: TextRole::Tagline,
        },
        DetectedText {
            text: "Directed by John Smith".to_string(),
            bounding_box: bbox(0.15, 0.85, 0.75, 0.88),
            role: TextRole::Credits,
        },
        DetectedText {
            text: "[FPO - Manual Art Required]".to_string(),
            bounding_box: bbox(0.05, 0.30, 0.95, 0.50),
            role: TextRole::Other,
        },
    ];
    JobResult {
        image_url: format!("/static/jobs/{}/output.png", job_id),
        thumbnail_url: Some(format!("/static/jobs/{}/thumb.png", job_id)),
        processing_time_ms,
        language: target_language.to_string(),
        source_language: Some(source_language.to_string()),
        detected_text: Some(detected_text),
        debug: None,
    }
}

fn bbox(x1: f32, y1: f32, x2: f32, y2: f32) -> BBoxNorm {
    BBoxNorm { x1, y1, x2, y2 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn mock_run_succeeds_with_the_canned_result() {
        let store = Arc::new(JobStore::new(4, 3600));
        let job = store
            .create(LocalizationJob::new(
                "loc_MOCK1".to_string(),
                "ja-JP".to_string(),
            ))
            .unwrap();

        let done = MockEngine.run(job, store.clone()).await;

        assert_eq!(done.status, JobStatus::Succeeded);
        let progress = done.progress.as_ref().unwrap();
        assert_eq!(progress.stage, ProgressStage::Packaging);
        assert_eq!(progress.percent, 100);
        let timings = progress.stage_timings_ms;
        let ocr = timings.ocr.unwrap();
        let translation = timings.translation.unwrap();
        let inpaint = timings.inpaint.unwrap();
        let packaging = timings.packaging.unwrap();
        assert!((800..=2000).contains(&ocr));
        assert!((600..=1500).contains(&translation));
        assert!((3000..=6000).contains(&inpaint));
        assert!((200..=500).contains(&packaging));

        let result = done.result.as_ref().unwrap();
        assert_eq!(result.image_url, "/static/jobs/loc_MOCK1/output.png");
        assert_eq!(
            result.thumbnail_url.as_deref(),
            Some("/static/jobs/loc_MOCK1/thumb.png")
        );
        assert_eq!(result.language, "ja-JP");
        assert_eq!(result.source_language.as_deref(), Some("en-US"));
        assert_eq!(result.processing_time_ms.packaging, 0);
        assert_eq!(
            result.processing_time_ms.total,
            ocr + translation + inpaint + packaging
        );

        let detected = result.detected_text.as_ref().unwrap();
        let texts: Vec<&str> = detected.iter().map(|entry| entry.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "THE GREAT HEIST",
                "COMING SOON",
                "Directed by John Smith",
                "[FPO - Manual Art Required]",
            ]
        );
        assert_eq!(detected[0].role, TextRole::Title);
        assert_eq!(detected[3].role, TextRole::Other);
        assert!(result.debug.is_none());

        assert_eq!(store.get("loc_MOCK1").unwrap().status, JobStatus::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn mock_reports_progress_stage_by_stage() {
        let store = Arc::new(JobStore::new(4, 3600));
        let job = store
            .create(LocalizationJob::new(
                "loc_MOCK2".to_string(),
                "fr-FR".to_string(),
            ))
            .unwrap();

        let handle = tokio::spawn(MockEngine.run(job, store.clone()));
        tokio::task::yield_now().await;
        let started = store.get("loc_MOCK2").unwrap();
        assert_eq!(started.status, JobStatus::Processing);
        assert!(started.progress.is_none());

        // The longest possible OCR delay has passed, but translation has
        // not; the visible snapshot is still the OCR one.
        tokio::time::advance(Duration::from_millis(2000)).await;
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        let mid = store.get("loc_MOCK2").unwrap();
        assert_eq!(mid.status, JobStatus::Processing);
        let progress = mid.progress.as_ref().unwrap();
        assert_eq!(progress.stage, ProgressStage::Ocr);
        assert_eq!(progress.percent, 25);
        assert!(progress.stage_timings_ms.translation.is_none());

        let done = handle.await.unwrap();
        assert_eq!(done.status, JobStatus::Succeeded);
        assert_eq!(store.get("loc_MOCK2").unwrap().status, JobStatus::Succeeded);
    }
}
