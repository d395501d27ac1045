//! Tunable thresholds for the guidance classifier.

use serde::{Deserialize, Serialize};

/// Angular thresholds steering the intersection classification.
///
/// The defaults are the values the classifier was tuned with; changing them
/// shifts where turns stop being "narrow", where forks stop being forks and
/// how aggressively an almost-straight road is treated as the obvious
/// continuation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuidanceConfig {
    /// Angle of the dead-ahead continuation, measured from the u-turn
    /// direction. Fixed at 180 degrees for the usual angle convention.
    pub straight_angle: f64,

    /// Deviations below this still count as "barely turning". Used to find
    /// fork candidates and end-of-road arms. Default: 35 degrees.
    pub narrow_turn_angle: f64,

    /// Angular differences below this are considered noise. Also bounds the
    /// u-turn band of the direction buckets. Default: 15 degrees.
    pub fuzzy_angle_difference: f64,

    /// Roads closer together than this form one visual group; a fork must be
    /// separated from its neighbours by at least this much. Default: 60 degrees.
    pub group_angle: f64,

    /// Maximum deviation from a perfect 90/270 degree turn for which the turn
    /// still keeps its plain Left/Right modifier during conflict resolution.
    /// Default: 60 degrees.
    pub max_no_turn_deviation: f64,

    /// How much larger the alternative's deviation from straight must be
    /// (as a ratio) before a road counts as the obvious continuation.
    /// Default: 1.4.
    pub distinction_ratio: f64,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            straight_angle: 180.0,
            narrow_turn_angle: 35.0,
            fuzzy_angle_difference: 15.0,
            group_angle: 60.0,
            max_no_turn_deviation: 60.0,
            distinction_ratio: 1.4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thresholds() {
        let config = GuidanceConfig::default();
        assert_eq!(config.straight_angle, 180.0);
        assert_eq!(config.narrow_turn_angle, 35.0);
        assert_eq!(config.fuzzy_angle_difference, 15.0);
        assert_eq!(config.group_angle, 60.0);
        assert_eq!(config.max_no_turn_deviation, 60.0);
        assert_eq!(config.distinction_ratio, 1.4);
    }
}
