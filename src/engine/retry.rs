// src/engine/retry.rs

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, warn};

/// When and how often failed executions are restarted.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay between observing a failure and re-submitting the request.
    pub delay: Duration,
    /// Maximum restarts per job instance; `None` means retry forever.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            max_attempts: None,
        }
    }
}

/// Counts restarts per job instance so a bounded policy can give up.
///
/// Keys are instance identities (job name + parameters); the runtime clears
/// an entry once the instance completes.
#[derive(Debug, Default)]
pub struct RetryTracker {
    restarts: HashMap<String, u32>,
}

impl RetryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask to restart the given instance.
    ///
    /// Returns `Some(attempt_number)` (1-based) and records the attempt when
    /// the policy allows it, `None` once attempts are exhausted.
    pub fn next_attempt(&mut self, key: &str, policy: &RetryPolicy) -> Option<u32> {
        let restarts = self.restarts.entry(key.to_string()).or_insert(0);

        if let Some(max) = policy.max_attempts {
            if *restarts >= max {
                warn!(
                    instance = %key,
                    attempts = *restarts,
                    max,
                    "retry attempts exhausted; giving up on this instance"
                );
                return None;
            }
        }

        *restarts += 1;
        debug!(instance = %key, attempt = *restarts, "retry attempt granted");
        Some(*restarts)
    }

    /// Forget an instance, typically after it completed.
    pub fn clear(&mut self, key: &str) {
        self.restarts.remove(key);
    }
}
