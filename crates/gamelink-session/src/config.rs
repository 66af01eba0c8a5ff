use std::time::Duration;

/// Tuning knobs for session coordinators.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    /// Deadline for any single store operation. A store that blows this
    /// deadline produces a transient error to the caller instead of
    /// wedging the session's mailbox.
    pub store_timeout: Duration,

    /// Command channel capacity per session actor. Bounded so a flood
    /// from one session backpressures its own callers only.
    pub mailbox_size: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(5),
            mailbox_size: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.store_timeout, Duration::from_secs(5));
        assert_eq!(config.mailbox_size, 64);
    }
}
