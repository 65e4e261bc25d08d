//! Redis key layout. The single source of truth for every key name used by
//! the rest of the crate - no other module may synthesize a key directly.

use crate::priority::Priority;

/// Pending jobs for one priority band.
pub fn queue_key(priority: &Priority) -> String {
    format!("queue:{}", priority.as_str())
}

/// Jobs currently owned by one worker.
pub fn processing_key(worker_id: &str) -> String {
    format!("processing:{}", worker_id)
}

/// Presence of this key (with its TTL) signals worker liveness.
pub fn heartbeat_key(worker_id: &str) -> String {
    format!("heartbeat:{}", worker_id)
}

/// Terminal list for jobs that exhausted retries or were classified poison.
pub const DEAD_LETTER_KEY: &str = "dead_letter";

/// Bounded list of successfully processed job ids, for observability.
pub const COMPLETED_KEY: &str = "completed";

/// Fixed-window counter backing the producer's rate limiter.
pub const RATE_LIMIT_PRODUCER_KEY: &str = "rate_limit:producer";

/// Glob pattern matching every `processing:*` key, used by the Reaper's scan.
pub const PROCESSING_SCAN_PATTERN: &str = "processing:*";

/// Extracts the worker id suffix from a `processing:{worker_id}` key.
pub fn worker_id_from_processing_key(key: &str) -> Option<&str> {
    key.strip_prefix("processing:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_match_spec_layout() {
        assert_eq!(queue_key(&Priority::high()), "queue:high");
        assert_eq!(processing_key("w1"), "processing:w1");
        assert_eq!(heartbeat_key("w1"), "heartbeat:w1");
        assert_eq!(DEAD_LETTER_KEY, "dead_letter");
        assert_eq!(COMPLETED_KEY, "completed");
        assert_eq!(RATE_LIMIT_PRODUCER_KEY, "rate_limit:producer");
    }

    #[test]
    fn extracts_worker_id() {
        assert_eq!(worker_id_from_processing_key("processing:w-7"), Some("w-7"));
        assert_eq!(worker_id_from_processing_key("heartbeat:w-7"), None);
    }
}
