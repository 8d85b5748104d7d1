use std::time::Duration;

use arcana_config::EngineSection;

use crate::fan::DEFAULT_FLING_MIN_VELOCITY;
use crate::transfer::DEFAULT_TRANSFER_DURATION;

pub const DEFAULT_SHUFFLE_DURATION: Duration = Duration::from_millis(2500);

/// Resolved engine tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub shuffle_duration: Duration,
    pub transfer_duration: Duration,
    /// Degrees per second.
    pub fling_min_velocity: f64,
    pub require_question: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shuffle_duration: DEFAULT_SHUFFLE_DURATION,
            transfer_duration: DEFAULT_TRANSFER_DURATION,
            fling_min_velocity: DEFAULT_FLING_MIN_VELOCITY,
            require_question: true,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn from_section(section: Option<&EngineSection>) -> Self {
        let defaults = Self::default();
        let Some(section) = section else {
            return defaults;
        };

        let fling_min_velocity = section
            .fling_min_velocity
            .filter(|v| v.is_finite() && *v >= 0.0)
            .unwrap_or(defaults.fling_min_velocity);

        Self {
            shuffle_duration: section
                .shuffle_ms
                .map_or(defaults.shuffle_duration, Duration::from_millis),
            transfer_duration: section
                .transfer_ms
                .map_or(defaults.transfer_duration, Duration::from_millis),
            fling_min_velocity,
            require_question: section.require_question,
        }
    }
}
