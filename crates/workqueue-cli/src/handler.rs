//! Default job handler wired into the worker pool by this binary.
//!
//! The core worker runtime (`workqueue_core::worker`) takes an arbitrary
//! `JobHandler`; this binary's handler confirms the file a job names still
//! exists and is readable. A missing file is poison (retrying won't make
//! it reappear); a transient I/O error (e.g. a temporarily unavailable
//! mount) is retried.

use std::io::ErrorKind;

use tracing::debug;
use workqueue_core::{Job, JobError, JobHandler};

pub fn default_handler() -> JobHandler {
    let handler: JobHandler = std::sync::Arc::new(move |job: Job| Box::pin(process(job)));
    handler
}

async fn process(job: Job) -> Result<(), JobError> {
    match tokio::fs::metadata(&job.filepath).await {
        Ok(metadata) => {
            debug!(job_id = %job.id, filepath = %job.filepath, size = metadata.len(), "file present, job satisfied");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(JobError::Poison(format!("{} no longer exists", job.filepath)))
        }
        Err(e) => Err(JobError::Transient(format!("stat {} failed: {e}", job.filepath))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workqueue_core::Priority;

    #[tokio::test]
    async fn missing_file_is_poison() {
        let job = Job::new("/nonexistent/path/for/sure.bin", 0, Priority::low());
        let err = process(job).await.unwrap_err();
        assert!(matches!(err, JobError::Poison(_)));
    }

    #[tokio::test]
    async fn existing_file_succeeds() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let job = Job::new(file.path().to_string_lossy().to_string(), 0, Priority::low());
        process(job).await.unwrap();
    }
}
