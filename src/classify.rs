//! Basic per-road classification and the shared context record.
//!
//! Everything here answers local questions about a single via-edge/road pair:
//! which base maneuver it is, whether one road dominates another by class,
//! and what instruction an unambiguous continuation receives. The global
//! questions (which road is obvious, where the fork is) build on these.

use crate::angles::{angular_deviation, turn_direction};
use crate::config::GuidanceConfig;
use crate::graph::{EdgeId, RoadClassification, RoadNetwork};
use crate::instruction::{DirectionModifier, TurnInstruction, TurnType};
use crate::intersection::{ConnectedRoad, Intersection};
use crate::names::{requires_name_announced, NameTable, SuffixTable, EMPTY_NAME_ID};

/// Angles closer to the u-turn slot than this are treated as a u-turn when
/// assigning the obvious continuation.
const UTURN_ANGLE_TOLERANCE: f64 = 0.01;

/// Borrowed view of everything the classifier consults while processing one
/// intersection: the edge table, the name tables and the thresholds.
#[derive(Debug)]
pub struct GuidanceContext<'a, G> {
    pub graph: &'a G,
    pub names: &'a NameTable,
    pub suffixes: &'a SuffixTable,
    pub config: GuidanceConfig,
}

impl<'a, G: RoadNetwork> GuidanceContext<'a, G> {
    pub fn new(graph: &'a G, names: &'a NameTable, suffixes: &'a SuffixTable) -> Self {
        Self {
            graph,
            names,
            suffixes,
            config: GuidanceConfig::default(),
        }
    }

    pub fn with_config(
        graph: &'a G,
        names: &'a NameTable,
        suffixes: &'a SuffixTable,
        config: GuidanceConfig,
    ) -> Self {
        Self {
            graph,
            names,
            suffixes,
            config,
        }
    }

    pub fn classification(&self, edge: EdgeId) -> RoadClassification {
        self.graph.edge_data(edge).classification
    }

    /// Whether moving from `from` onto `to` needs the new name spoken.
    pub fn requires_announcement(&self, from: EdgeId, to: EdgeId) -> bool {
        let from_name = self.graph.edge_data(from).name_id;
        let to_name = self.graph.edge_data(to).name_id;
        requires_name_announced(from_name, to_name, self.names, self.suffixes)
    }

    /// The base maneuver for taking `road` when coming in over `via_edge`,
    /// before any intersection-level reasoning.
    ///
    /// Turning onto a link road is a ramp; whether it ramps on or off depends
    /// on which side of the link the more important road lies. Otherwise name
    /// continuity decides between `Continue` and `Turn`.
    pub fn basic_turn_type(&self, via_edge: EdgeId, road: &ConnectedRoad) -> TurnType {
        let via = self.graph.edge_data(via_edge);
        let out = self.graph.edge_data(road.eid);
        if !via.classification.link && out.classification.link {
            return if via.classification.priority < out.classification.priority {
                TurnType::OffRamp
            } else {
                TurnType::OnRamp
            };
        }
        let keeps_name = via.name_id != EMPTY_NAME_ID
            && !requires_name_announced(via.name_id, out.name_id, self.names, self.suffixes);
        if keeps_name {
            TurnType::Continue
        } else {
            TurnType::Turn
        }
    }

    /// Instruction for a road already judged to be the single reasonable
    /// continuation.
    pub fn instruction_for_obvious(
        &self,
        via_edge: EdgeId,
        through_street: bool,
        road: &ConnectedRoad,
    ) -> TurnInstruction {
        let turn_type = self.basic_turn_type(via_edge, road);
        let direction = turn_direction(road.angle, &self.config);
        if matches!(turn_type, TurnType::OnRamp | TurnType::OffRamp) {
            return TurnInstruction::new(turn_type, direction);
        }
        if angular_deviation(road.angle, 0.0) < UTURN_ANGLE_TOLERANCE {
            // An obvious road back the way we came still gets announced.
            return TurnInstruction::new(TurnType::Turn, DirectionModifier::UTurn);
        }
        if turn_type == TurnType::Turn {
            if self.requires_announcement(via_edge, road.eid) {
                if through_street {
                    // Joining a road that continues past the node under its
                    // own name reads as a merge, not a turn.
                    let modifier = if road.angle > self.config.straight_angle {
                        DirectionModifier::SlightLeft
                    } else {
                        DirectionModifier::SlightRight
                    };
                    return TurnInstruction::new(TurnType::Merge, modifier);
                }
                return TurnInstruction::new(TurnType::Turn, direction);
            }
            return TurnInstruction::new(TurnType::Suppressed, direction);
        }
        TurnInstruction::new(TurnType::Continue, direction)
    }

    /// Whether the road at `index` belongs to a street that continues through
    /// the intersection: some other outgoing road carries the same announced
    /// name at a roughly opposite angle.
    pub fn is_through_street(&self, index: usize, intersection: &Intersection) -> bool {
        let data = self.graph.edge_data(intersection[index].eid);
        if data.name_id == EMPTY_NAME_ID {
            return false;
        }
        let angle = intersection[index].angle;
        let opposite = self.config.straight_angle - self.config.narrow_turn_angle;
        intersection.iter().enumerate().skip(1).any(|(i, road)| {
            if i == index {
                return false;
            }
            let other = self.graph.edge_data(road.eid);
            other.name_id != EMPTY_NAME_ID
                && !requires_name_announced(data.name_id, other.name_id, self.names, self.suffixes)
                && angular_deviation(angle, road.angle) > opposite
        })
    }
}

/// Whether `candidate` is so clearly the continuation of `via` that `other`
/// never needs mentioning: the candidate stays within one tier of the via
/// road and either the alternative is a mere link road or it is more than one
/// tier less important.
pub fn obvious_by_road_class(
    via: RoadClassification,
    candidate: RoadClassification,
    other: RoadClassification,
) -> bool {
    let continues_tier = candidate.priority <= via.priority.saturating_add(1);
    if !continues_tier {
        return false;
    }
    if !candidate.link && other.link {
        return true;
    }
    other.priority > candidate.priority && other.priority - candidate.priority > 1
}

/// Two roads can form a fork only within the same broad tier: both links or
/// both regular roads, at most one priority step apart.
pub fn can_be_seen_as_fork(left: RoadClassification, right: RoadClassification) -> bool {
    left.link == right.link && left.priority.abs_diff(right.priority) <= 1
}

/// Hand both fork branches their instructions. `right` and `left` index the
/// intersection with `right < left`.
pub fn assign_fork(intersection: &mut Intersection, right: usize, left: usize) {
    intersection[left].instruction =
        TurnInstruction::new(TurnType::Fork, DirectionModifier::SlightLeft);
    intersection[right].instruction =
        TurnInstruction::new(TurnType::Fork, DirectionModifier::SlightRight);
}

/// Three-way fork: the middle branch keeps straight.
pub fn assign_fork_three(intersection: &mut Intersection, right: usize, middle: usize, left: usize) {
    assign_fork(intersection, right, left);
    intersection[middle].instruction =
        TurnInstruction::new(TurnType::Fork, DirectionModifier::Straight);
}
