use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use time::OffsetDateTime;
use tracing::{debug, info};

use super::LocalizationJob;

/// In-memory job store. Jobs expire after a TTL measured from creation;
/// at capacity the oldest jobs are evicted to make room.
pub struct JobStore {
    jobs: Mutex<HashMap<String, LocalizationJob>>,
    max_jobs: usize,
    ttl_seconds: u64,
}

impl JobStore {
    pub fn new(max_jobs: usize, ttl_seconds: u64) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            max_jobs,
            ttl_seconds,
        }
    }

    pub fn create(&self, job: LocalizationJob) -> Result<LocalizationJob> {
        let mut jobs = self.lock();
        if jobs.len() >= self.max_jobs {
            self.evict_old_jobs(&mut jobs);
        }
        if jobs.len() >= self.max_jobs {
            return Err(anyhow!(
                "Job store is at capacity ({} jobs). Please wait for jobs to complete or expire.",
                self.max_jobs
            ));
        }

        jobs.insert(job.job_id.clone(), job.clone());
        info!(
            "JobCreated jobId={} targetLang={}",
            job.job_id, job.target_language
        );
        Ok(job)
    }

    /// Returns a snapshot of the job, dropping it first if its TTL has
    /// passed.
    pub fn get(&self, job_id: &str) -> Option<LocalizationJob> {
        let mut jobs = self.lock();
        let age_seconds = match jobs.get(job_id) {
            Some(job) => (OffsetDateTime::now_utc() - job.created_at).whole_seconds(),
            None => return None,
        };
        if age_seconds > self.ttl_seconds as i64 {
            debug!("Job {} has expired (age: {}s)", job_id, age_seconds);
            jobs.remove(job_id);
            return None;
        }
        jobs.get(job_id).cloned()
    }

    /// Replaces a stored job and refreshes its `updatedAt`. Errors when
    /// the job was evicted in the meantime.
    pub fn update(&self, mut job: LocalizationJob) -> Result<()> {
        let mut jobs = self.lock();
        if !jobs.contains_key(&job.job_id) {
            return Err(anyhow!("Job {} not found in store", job.job_id));
        }
        job.touch();
        debug!(
            "JobUpdated jobId={} status={}",
            job.job_id,
            job.status.as_str()
        );
        jobs.insert(job.job_id.clone(), job);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn evict_old_jobs(&self, jobs: &mut HashMap<String, LocalizationJob>) {
        let now = OffsetDateTime::now_utc();
        let expired: Vec<String> = jobs
            .iter()
            .filter(|(_, job)| (now - job.created_at).whole_seconds() > self.ttl_seconds as i64)
            .map(|(job_id, _)| job_id.clone())
            .collect();
        for job_id in &expired {
            jobs.remove(job_id);
            debug!("Evicted expired job {}", job_id);
        }

        if jobs.len() >= self.max_jobs {
            let mut by_age: Vec<(String, OffsetDateTime)> = jobs
                .iter()
                .map(|(job_id, job)| (job_id.clone(), job.created_at))
                .collect();
            by_age.sort_by_key(|(_, created_at)| *created_at);
            let num_to_evict = jobs.len() - self.max_jobs + 1;
            for (job_id, _) in by_age.into_iter().take(num_to_evict) {
                jobs.remove(&job_id);
                debug!("Evicted oldest job {} to make room", job_id);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, LocalizationJob>> {
        self.jobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobStatus;
    use time::Duration;

    fn job(job_id: &str) -> LocalizationJob {
        LocalizationJob::new(job_id.to_string(), "fr-FR".to_string())
    }

    fn backdated(job_id: &str, seconds_ago: i64) -> LocalizationJob {
        let mut job = job(job_id);
        job.created_at = OffsetDateTime::now_utc() - Duration::seconds(seconds_ago);
        job
    }

    #[test]
    fn create_then_get_returns_the_job() {
        let store = JobStore::new(10, 7200);
        store.create(job("loc_A")).unwrap();
        let fetched = store.get("loc_A").unwrap();
        assert_eq!(fetched.status, JobStatus::Queued);
        assert!(store.get("loc_MISSING").is_none());
    }

    #[test]
    fn expired_jobs_vanish_on_read() {
        let store = JobStore::new(10, 7200);
        store.create(backdated("loc_OLD", 7201)).unwrap();
        assert!(store.get("loc_OLD").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn capacity_evicts_expired_jobs_first() {
        let store = JobStore::new(2, 7200);
        store.create(backdated("loc_EXPIRED", 9000)).unwrap();
        store.create(backdated("loc_FRESH", 10)).unwrap();
        store.create(job("loc_NEW")).unwrap();
        assert!(store.get("loc_FRESH").is_some());
        assert!(store.get("loc_NEW").is_some());
        assert!(store.get("loc_EXPIRED").is_none());
    }

    #[test]
    fn capacity_evicts_the_oldest_when_nothing_expired() {
        let store = JobStore::new(2, 7200);
        store.create(backdated("loc_OLDEST", 100)).unwrap();
        store.create(backdated("loc_MIDDLE", 50)).unwrap();
        store.create(job("loc_NEW")).unwrap();
        assert!(store.get("loc_OLDEST").is_none());
        assert!(store.get("loc_MIDDLE").is_some());
        assert!(store.get("loc_NEW").is_some());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn zero_capacity_reports_the_limit() {
        let store = JobStore::new(0, 7200);
        let err = store.create(job("loc_A")).unwrap_err();
        assert!(err.to_string().contains("at capacity (0 jobs)"));
    }

    #[test]
    fn update_refreshes_updated_at_and_rejects_unknown_jobs() {
        let store = JobStore::new(10, 7200);
        let created = store.create(job("loc_A")).unwrap();

        let mut changed = created.clone();
        changed.status = JobStatus::Processing;
        store.update(changed).unwrap();

        let fetched = store.get("loc_A").unwrap();
        assert_eq!(fetched.status, JobStatus::Processing);
        assert!(fetched.updated_at >= created.updated_at);

        let err = store.update(job("loc_GHOST")).unwrap_err();
        assert_eq!(err.to_string(), "Job loc_GHOST not found in store");
    }
}
