#![forbid(unsafe_code)]

//! Scheduler configuration.

/// Tunables for a scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SchedulerConfig {
    /// Maximum activations of one instance within one externally-triggered
    /// task before the flush aborts with a loop error. Each flush pass that
    /// re-activates the instance counts, including the activation that
    /// started the task.
    pub activation_ceiling: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            activation_ceiling: 25,
        }
    }
}

impl SchedulerConfig {
    /// Set the per-task activation ceiling.
    #[must_use]
    pub fn with_activation_ceiling(mut self, ceiling: u32) -> Self {
        self.activation_ceiling = ceiling;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ceiling() {
        assert_eq!(SchedulerConfig::default().activation_ceiling, 25);
    }

    #[test]
    fn builder_overrides_ceiling() {
        let config = SchedulerConfig::default().with_activation_ceiling(3);
        assert_eq!(config.activation_ceiling, 3);
    }
}
