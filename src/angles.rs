//! Angular helpers shared by all classification stages.
//!
//! Angles live in [0, 360). 0 is the reverse of the incoming edge (the u-turn
//! slot) and angles grow counter-clockwise, so a road leaving to the right of
//! travel has an angle below 180.

use crate::config::GuidanceConfig;
use crate::instruction::DirectionModifier;

/// Shortest angular distance between two angles, in [0, 180].
pub fn angular_deviation(a: f64, b: f64) -> f64 {
    let deviation = (a - b).abs();
    if deviation > 180.0 {
        360.0 - deviation
    } else {
        deviation
    }
}

/// Bucket a raw angle into one of the eight direction modifiers.
///
/// The band edges are fixed; only the fuzzy band around the u-turn slot is
/// configurable. Bands on the right side are closed at the lower edge, bands
/// on the left side at the upper edge, so mirroring an angle lands in the
/// mirrored bucket even exactly on a boundary.
pub fn turn_direction(angle: f64, config: &GuidanceConfig) -> DirectionModifier {
    let fuzzy = config.fuzzy_angle_difference;
    if angle < fuzzy {
        DirectionModifier::UTurn
    } else if angle < 60.0 {
        DirectionModifier::SharpRight
    } else if angle < 140.0 {
        DirectionModifier::Right
    } else if angle < 165.0 {
        DirectionModifier::SlightRight
    } else if angle <= 195.0 {
        DirectionModifier::Straight
    } else if angle <= 220.0 {
        DirectionModifier::SlightLeft
    } else if angle <= 300.0 {
        DirectionModifier::Left
    } else if angle <= 360.0 - fuzzy {
        DirectionModifier::SharpLeft
    } else {
        DirectionModifier::UTurn
    }
}
