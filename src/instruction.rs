//! Turn instructions: what a traveler is told at an intersection exit.

use serde::{Deserialize, Serialize};

/// The eight direction modifiers, in cyclic order around the intersection.
///
/// The order matters: each modifier mirrors onto the one equally far from
/// `Straight` on the opposite side, with `UTurn` and `Straight` as the fixed
/// points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DirectionModifier {
    UTurn,
    SharpRight,
    Right,
    SlightRight,
    Straight,
    SlightLeft,
    Left,
    SharpLeft,
}

impl DirectionModifier {
    /// All modifiers in cyclic order.
    pub const ALL: [DirectionModifier; 8] = [
        DirectionModifier::UTurn,
        DirectionModifier::SharpRight,
        DirectionModifier::Right,
        DirectionModifier::SlightRight,
        DirectionModifier::Straight,
        DirectionModifier::SlightLeft,
        DirectionModifier::Left,
        DirectionModifier::SharpLeft,
    ];

    /// The modifier equally far from `Straight` on the opposite side.
    pub fn mirrored(self) -> DirectionModifier {
        match self {
            DirectionModifier::UTurn => DirectionModifier::UTurn,
            DirectionModifier::SharpRight => DirectionModifier::SharpLeft,
            DirectionModifier::Right => DirectionModifier::Left,
            DirectionModifier::SlightRight => DirectionModifier::SlightLeft,
            DirectionModifier::Straight => DirectionModifier::Straight,
            DirectionModifier::SlightLeft => DirectionModifier::SlightRight,
            DirectionModifier::Left => DirectionModifier::Right,
            DirectionModifier::SharpLeft => DirectionModifier::SharpRight,
        }
    }
}

/// Kind of maneuver announced for one outgoing road.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TurnType {
    /// Default before classification; also the result for unreachable roads.
    NoTurn,
    /// A plain turn onto a differently named road.
    Turn,
    /// The road carries the traveled street onward.
    Continue,
    /// Joining a through street that carries a different name.
    Merge,
    /// Ramp leading up onto a more important road.
    OnRamp,
    /// Exit ramp leaving a more important road.
    OffRamp,
    /// The traveled street ends; the traveler must pick a side.
    EndOfRoad,
    /// One branch of a fork of near-straight, similarly classed roads.
    Fork,
    /// A continuation so unambiguous it needs no announcement.
    Suppressed,
}

/// One assigned instruction: maneuver kind plus direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnInstruction {
    pub turn_type: TurnType,
    pub modifier: DirectionModifier,
}

impl TurnInstruction {
    /// The unassigned instruction every road starts out with.
    pub const NO_TURN: TurnInstruction = TurnInstruction {
        turn_type: TurnType::NoTurn,
        modifier: DirectionModifier::UTurn,
    };

    pub fn new(turn_type: TurnType, modifier: DirectionModifier) -> Self {
        Self { turn_type, modifier }
    }
}

impl Default for TurnInstruction {
    fn default() -> Self {
        Self::NO_TURN
    }
}
