use std::time::Duration;

/// Configuration for a single job's polling loop.
///
/// Use [`PollConfig::default()`] for the standard policy (3 second
/// interval, 10 attempts ≈ a 30 second window), or the builder methods
/// to adjust either knob. The single-look and batch paths share this
/// type; a call site wanting a longer window passes its own config
/// instead of carrying a second implementation.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Fixed delay between status checks.
    pub interval: Duration,

    /// Number of non-terminal polls before the client gives up and
    /// reports `timed_out_checking`. Attempt-count based, not
    /// wall-clock based.
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_attempts: 10,
        }
    }
}

impl PollConfig {
    /// Set the delay between status checks.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the attempt ceiling.
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }
}

/// Configuration for a batch of looks.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Smallest allowed batch size. Resize requests below this are
    /// clamped, not rejected.
    pub min_slots: usize,

    /// Largest allowed batch size. Resize requests above this are
    /// clamped, not rejected.
    pub max_slots: usize,

    /// Polling policy applied to every slot's job independently.
    pub poll: PollConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            min_slots: 2,
            max_slots: 5,
            poll: PollConfig::default(),
        }
    }
}

impl BatchConfig {
    /// Set the allowed batch size range.
    pub fn with_slot_bounds(mut self, min: usize, max: usize) -> Self {
        self.min_slots = min;
        self.max_slots = max.max(min);
        self
    }

    /// Set the per-slot polling policy.
    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Clamp a requested batch size into the allowed range.
    pub fn clamp_slots(&self, requested: usize) -> usize {
        requested.clamp(self.min_slots, self.max_slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_defaults() {
        let config = PollConfig::default();
        assert_eq!(config.interval, Duration::from_secs(3));
        assert_eq!(config.max_attempts, 10);
    }

    #[test]
    fn test_poll_builder() {
        let config = PollConfig::default()
            .with_interval(Duration::from_secs(1))
            .with_max_attempts(20);
        assert_eq!(config.interval, Duration::from_secs(1));
        assert_eq!(config.max_attempts, 20);
    }

    #[test]
    fn test_batch_defaults() {
        let config = BatchConfig::default();
        assert_eq!(config.min_slots, 2);
        assert_eq!(config.max_slots, 5);
    }

    #[test]
    fn test_clamp_slots() {
        let config = BatchConfig::default();
        assert_eq!(config.clamp_slots(0), 2);
        assert_eq!(config.clamp_slots(3), 3);
        assert_eq!(config.clamp_slots(99), 5);
    }

    #[test]
    fn test_slot_bounds_keep_max_above_min() {
        let config = BatchConfig::default().with_slot_bounds(4, 2);
        assert_eq!(config.min_slots, 4);
        assert_eq!(config.max_slots, 4);
    }
}
