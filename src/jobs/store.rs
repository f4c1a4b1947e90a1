use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{JobError, Result};
use crate::jobs::types::{JobId, JobRecord, JobUpdate};

/// Storage for job records.
///
/// Reads return whole snapshots; an update is applied under one lock so a
/// reader sees either the old or the new record, never a mix.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new record; fails if the id is taken
    async fn insert(&self, record: JobRecord) -> Result<()>;

    async fn get(&self, id: &JobId) -> Result<JobRecord>;

    async fn contains(&self, id: &JobId) -> bool;

    /// Move a job forward, rejecting transitions that would regress it
    async fn update(&self, id: &JobId, update: JobUpdate) -> Result<JobRecord>;
}

/// Process-local store on a single `RwLock`
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, JobRecord>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, record: JobRecord) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&record.job_id) {
            return Err(JobError::InvalidTransition {
                id: record.job_id.to_string(),
                from: "existing".to_string(),
                to: record.status.to_string(),
            }
            .into());
        }
        jobs.insert(record.job_id.clone(), record);
        Ok(())
    }

    async fn get(&self, id: &JobId) -> Result<JobRecord> {
        self.jobs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| JobError::JobNotFound { id: id.to_string() }.into())
    }

    async fn contains(&self, id: &JobId) -> bool {
        self.jobs.read().await.contains_key(id)
    }

    async fn update(&self, id: &JobId, update: JobUpdate) -> Result<JobRecord> {
        let mut jobs = self.jobs.write().await;
        let record = jobs
            .get_mut(id)
            .ok_or_else(|| JobError::JobNotFound { id: id.to_string() })?;

        let next = update.status();
        if !record.status.can_advance_to(next) {
            return Err(JobError::InvalidTransition {
                id: id.to_string(),
                from: record.status.to_string(),
                to: next.to_string(),
            }
            .into());
        }

        update.apply(record);
        Ok(record.clone())
    }
}
