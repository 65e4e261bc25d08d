//! Walks a filesystem tree and enqueues one job per accepted file.

use std::path::{Path, PathBuf};

use deadpool_redis::Pool;
use globset::{Glob, GlobSet, GlobSetBuilder};
use redis::AsyncCommands;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{JobError, JobResult};
use crate::job::Job;
use crate::metrics;
use crate::priority::Priority;
use crate::rate_limiter::RateLimiter;
use crate::schema::queue_key;

/// Producer configuration: scan root, glob filters, priority classification,
/// and rate limit.
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    pub scan_dir: PathBuf,
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    /// Extension (without the dot, lowercase) -> priority band.
    pub high_priority_extensions: Vec<String>,
    pub default_priority: Priority,
    pub rate_limit_per_sec: u64,
}

/// Scans `config.scan_dir` and pushes one job per accepted file. Returns the
/// number of jobs enqueued.
pub struct Producer {
    pool: Pool,
    config: ProducerConfig,
    include: GlobSet,
    exclude: GlobSet,
    limiter: RateLimiter,
}

impl Producer {
    pub fn new(pool: Pool, config: ProducerConfig, limiter: RateLimiter) -> JobResult<Self> {
        let include = build_globset(&config.include_globs)?;
        let exclude = build_globset(&config.exclude_globs)?;
        Ok(Self { pool, config, include, exclude, limiter })
    }

    /// Streams the scan root depth-first, never materializing the full file
    /// list, and enqueues one job per accepted file.
    pub async fn run(&self, trace_id: &str) -> JobResult<u64> {
        let root = self
            .config
            .scan_dir
            .canonicalize()
            .map_err(|e| JobError::Scan(format!("cannot read scan root {:?}: {e}", self.config.scan_dir)))?;

        let mut enqueued = 0u64;

        for entry in WalkDir::new(&root).follow_links(false) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if !path_is_contained(&root, path) {
                warn!(path = %path.display(), "skipping path outside scan root (symlink escape)");
                continue;
            }

            let rel = path.strip_prefix(&root).unwrap_or(path);
            if !self.include.is_empty() && !self.include.is_match(rel) {
                continue;
            }
            if self.exclude.is_match(rel) {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping file, stat failed");
                    continue;
                }
            };

            self.limiter.acquire().await?;

            let priority = self.classify_priority(path);
            let job = Job::new(path.to_string_lossy().to_string(), metadata.len(), priority.clone())
                .with_trace(trace_id, "");

            self.enqueue(&job).await?;
            metrics::record_job_produced(priority.as_str());
            enqueued += 1;
        }

        debug!(enqueued, root = %root.display(), "producer scan complete");
        Ok(enqueued)
    }

    fn classify_priority(&self, path: &Path) -> Priority {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        if self.config.high_priority_extensions.iter().any(|e| e == &ext) {
            Priority::high()
        } else {
            self.config.default_priority.clone()
        }
    }

    async fn enqueue(&self, job: &Job) -> JobResult<()> {
        let mut conn = self.pool.get().await?;
        let payload = job.encode()?;
        let key = queue_key(&job.priority);
        let _: i64 = conn.lpush(&key, payload).await?;
        Ok(())
    }
}

fn build_globset(patterns: &[String]) -> JobResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| JobError::Configuration(format!("invalid glob {pattern:?}: {e}")))?;
        builder.add(glob);
    }
    builder.build().map_err(|e| JobError::Configuration(format!("failed to build glob set: {e}")))
}

fn path_is_contained(root: &Path, path: &Path) -> bool {
    match path.canonicalize() {
        Ok(canonical) => canonical.starts_with(root),
        Err(_) => false,
    }
}

trait GlobSetExt {
    fn is_empty(&self) -> bool;
}

impl GlobSetExt for GlobSet {
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn globset_builds_from_patterns() {
        let set = build_globset(&["**/*.csv".to_string()]).unwrap();
        assert!(set.is_match(Path::new("a/b/c.csv")));
        assert!(!set.is_match(Path::new("a/b/c.txt")));
    }

    #[test]
    fn empty_globset_is_empty() {
        let set = build_globset(&[]).unwrap();
        assert!(GlobSetExt::is_empty(&set));
    }
}
