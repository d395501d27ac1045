//! The intersection model: the ordered fan of roads leaving one node.
//!
//! An intersection always carries the u-turn slot at index 0 (angle about 0,
//! possibly with entry disallowed) and lists the remaining roads sorted by
//! increasing angle, counter-clockwise from the direction the traveler came
//! from.

use std::fmt;
use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::angles::angular_deviation;
use crate::graph::{EdgeId, RoadNetwork};
use crate::instruction::TurnInstruction;

/// One outgoing road around the intersection node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectedRoad {
    /// The outgoing edge.
    pub eid: EdgeId,
    /// Whether the traveler may enter the edge at this node.
    pub entry_allowed: bool,
    /// Angle from the u-turn direction, in [0, 360).
    pub angle: f64,
    /// Absolute compass bearing of the road, carried through unchanged.
    pub bearing: f64,
    /// Output slot, filled by the turn handler.
    pub instruction: TurnInstruction,
    /// Lane-data reference, carried through unchanged.
    pub lane_data_id: Option<u16>,
}

impl ConnectedRoad {
    pub fn new(eid: EdgeId, entry_allowed: bool, angle: f64, bearing: f64) -> Self {
        Self {
            eid,
            entry_allowed,
            angle,
            bearing,
            instruction: TurnInstruction::NO_TURN,
            lane_data_id: None,
        }
    }

    /// Reflect the road across the straight axis: the angle flips to
    /// `360 - angle` and the direction modifier to its mirror counterpart.
    /// The u-turn slot (angle essentially zero) is left untouched.
    pub fn mirror(&mut self) {
        if angular_deviation(self.angle, 0.0) > f64::EPSILON {
            self.angle = 360.0 - self.angle;
            self.instruction.modifier = self.instruction.modifier.mirrored();
        }
    }

    /// Non-mutating counterpart of [`mirror`](Self::mirror).
    pub fn mirrored_copy(&self) -> Self {
        let mut copy = *self;
        copy.mirror();
        copy
    }
}

impl fmt::Display for ConnectedRoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[connection] edge {} entry {} angle {:.2} bearing {:.2} instruction {:?}/{:?} lanes {:?}",
            self.eid,
            self.entry_allowed,
            self.angle,
            self.bearing,
            self.instruction.turn_type,
            self.instruction.modifier,
            self.lane_data_id,
        )
    }
}

/// Index and deviation of the road closest to going straight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StraightestTurn {
    pub index: usize,
    pub deviation: f64,
}

/// Ordered fan of connected roads around one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intersection {
    roads: Vec<ConnectedRoad>,
}

impl Intersection {
    pub fn new(roads: Vec<ConnectedRoad>) -> Self {
        Self { roads }
    }

    pub fn into_roads(self) -> Vec<ConnectedRoad> {
        self.roads
    }

    /// The layout every produced intersection must satisfy: non-empty, roads
    /// sorted by increasing angle, u-turn slot first at angle about zero.
    /// Equal angles are tolerated; they occur in badly mapped data.
    pub fn is_valid(&self) -> bool {
        !self.roads.is_empty()
            && self
                .roads
                .windows(2)
                .all(|pair| pair[0].angle <= pair[1].angle)
            && self.roads[0].angle < f64::EPSILON
    }

    /// The road whose angle deviates least from `angle`. Ties keep the first
    /// occurrence.
    pub fn find_closest_turn(&self, angle: f64) -> usize {
        let mut best = 0;
        let mut best_deviation = f64::INFINITY;
        for (index, road) in self.roads.iter().enumerate() {
            let deviation = angular_deviation(road.angle, angle);
            if deviation < best_deviation {
                best = index;
                best_deviation = deviation;
            }
        }
        best
    }

    /// The entry-allowed road (index 1 and up) closest to going straight.
    /// Falls back to index 0 with deviation 180 when no road allows entry.
    pub fn closest_to_straight(&self, straight_angle: f64) -> StraightestTurn {
        let mut best = StraightestTurn {
            index: 0,
            deviation: 180.0,
        };
        for (index, road) in self.roads.iter().enumerate().skip(1) {
            let deviation = angular_deviation(road.angle, straight_angle);
            if road.entry_allowed && deviation < best.deviation {
                best = StraightestTurn { index, deviation };
            }
        }
        best
    }

    /// Maximum lane count over all member edges.
    pub fn highest_connected_lane_count(&self, graph: &impl RoadNetwork) -> u8 {
        self.roads
            .iter()
            .map(|road| graph.edge_data(road.eid).classification.lanes)
            .max()
            .unwrap_or(0)
    }

    /// Whether every road in the inclusive range `[first, last]` allows entry.
    pub fn has_valid_entries(&self, first: usize, last: usize) -> bool {
        debug_assert!(last < self.roads.len());
        self.roads[first..=last].iter().all(|road| road.entry_allowed)
    }
}

impl Deref for Intersection {
    type Target = [ConnectedRoad];

    fn deref(&self) -> &Self::Target {
        &self.roads
    }
}

impl DerefMut for Intersection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.roads
    }
}
