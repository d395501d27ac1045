//! The turn handler: orchestrates classification of one intersection.
//!
//! Dispatch is by intersection size. Dead ends only allow the u-turn; two-way
//! intersections have a single forced continuation; three-way intersections
//! distinguish forks, T shapes and through roads with one side turn; larger
//! intersections are split at the straightest road and each side is assigned
//! separately. Left-hand assignment reuses the right-hand logic by mirroring
//! the fan, reversing the road order, and mirroring back afterwards.

use anyhow::{bail, Result};
use log::{debug, warn};
use rayon::prelude::*;

use crate::angles::{angular_deviation, turn_direction};
use crate::classify::{assign_fork, assign_fork_three, can_be_seen_as_fork, GuidanceContext};
use crate::config::GuidanceConfig;
use crate::fork::find_fork;
use crate::graph::{EdgeId, RoadNetwork};
use crate::instruction::{DirectionModifier, TurnInstruction, TurnType};
use crate::intersection::{ConnectedRoad, Intersection};
use crate::names::{NameTable, SuffixTable};
use crate::obvious::find_obvious_turn;

/// Assigns turn instructions to every road of an intersection.
///
/// The handler borrows the edge table and the name tables for its lifetime;
/// intersections pass through by value and come back with their instruction
/// slots filled.
#[derive(Debug)]
pub struct TurnHandler<'a, G> {
    ctx: GuidanceContext<'a, G>,
}

impl<'a, G: RoadNetwork> TurnHandler<'a, G> {
    pub fn new(graph: &'a G, names: &'a NameTable, suffixes: &'a SuffixTable) -> Self {
        Self {
            ctx: GuidanceContext::new(graph, names, suffixes),
        }
    }

    pub fn with_config(
        graph: &'a G,
        names: &'a NameTable,
        suffixes: &'a SuffixTable,
        config: GuidanceConfig,
    ) -> Self {
        Self {
            ctx: GuidanceContext::with_config(graph, names, suffixes, config),
        }
    }

    pub fn context(&self) -> &GuidanceContext<'a, G> {
        &self.ctx
    }

    /// Classify one intersection entered over `via_edge`.
    pub fn classify(&self, via_edge: EdgeId, mut intersection: Intersection) -> Intersection {
        debug_assert!(intersection.is_valid(), "intersection violates the layout invariants");
        if intersection.len() == 1 {
            // Dead end; the only road is the way back.
            return intersection;
        }

        if intersection[0].entry_allowed {
            let turn_type = self.ctx.basic_turn_type(via_edge, &intersection[0]);
            intersection[0].instruction =
                TurnInstruction::new(turn_type, DirectionModifier::UTurn);
        }

        match intersection.len() {
            2 => self.handle_two_way(via_edge, &mut intersection),
            3 => self.handle_three_way(via_edge, &mut intersection),
            _ => self.handle_complex(via_edge, &mut intersection),
        }
        intersection
    }

    /// Classify a batch of independent intersections in parallel. Input
    /// intersections must satisfy the layout invariants; order is preserved.
    pub fn classify_batch(
        &self,
        batch: Vec<(EdgeId, Intersection)>,
    ) -> Result<Vec<Intersection>>
    where
        G: Sync,
    {
        if let Some(position) = batch.iter().position(|(_, i)| !i.is_valid()) {
            warn!("rejecting batch: intersection {position} violates the layout invariants");
            bail!("intersection {position} violates the layout invariants");
        }
        let classified: Vec<Intersection> = batch
            .into_par_iter()
            .map(|(via_edge, intersection)| self.classify(via_edge, intersection))
            .collect();
        debug!("classified {} intersections", classified.len());
        Ok(classified)
    }

    fn handle_two_way(&self, via_edge: EdgeId, intersection: &mut Intersection) {
        let instruction = self.ctx.instruction_for_obvious(via_edge, false, &intersection[1]);
        intersection[1].instruction = instruction;
    }

    /// A T shape: both arms leave at roughly right angles, far apart.
    fn is_end_of_road(&self, right_arm: &ConnectedRoad, left_arm: &ConnectedRoad) -> bool {
        let narrow = self.ctx.config.narrow_turn_angle;
        angular_deviation(right_arm.angle, 90.0) < narrow
            && angular_deviation(left_arm.angle, 270.0) < narrow
            && angular_deviation(right_arm.angle, left_arm.angle) > 2.0 * narrow
    }

    fn handle_three_way(&self, via_edge: EdgeId, intersection: &mut Intersection) {
        debug_assert_eq!(intersection.len(), 3);
        let obvious_index = find_obvious_turn(&self.ctx, via_edge, intersection);
        let fork = find_fork(&self.ctx, via_edge, intersection);

        if let (Some(fork), 0) = (fork, obvious_index) {
            assign_fork(intersection, fork.right, fork.left);
        } else if obvious_index == 0
            && self.is_end_of_road(&intersection[1], &intersection[2])
        {
            // The traveled road ends; each arm is announced as end of road
            // unless it is a ramp in its own right.
            for (index, modifier) in [(1usize, DirectionModifier::Right), (2, DirectionModifier::Left)] {
                if !intersection[index].entry_allowed {
                    continue;
                }
                let basic = self.ctx.basic_turn_type(via_edge, &intersection[index]);
                let turn_type = if basic == TurnType::OnRamp {
                    TurnType::OnRamp
                } else {
                    TurnType::EndOfRoad
                };
                intersection[index].instruction = TurnInstruction::new(turn_type, modifier);
            }
        } else if obvious_index != 0 {
            let first_direction = turn_direction(intersection[1].angle, &self.ctx.config);
            let second_direction = turn_direction(intersection[2].angle, &self.ctx.config);
            if obvious_index == 1 {
                let through = self.ctx.is_through_street(1, intersection);
                let instruction =
                    self.ctx.instruction_for_obvious(via_edge, through, &intersection[1]);
                intersection[1].instruction = instruction;
                // Both straight would leave the side road ambiguous; nudge it.
                let modifier = if first_direction == second_direction
                    && second_direction == DirectionModifier::Straight
                {
                    DirectionModifier::SlightLeft
                } else {
                    second_direction
                };
                let basic = self.ctx.basic_turn_type(via_edge, &intersection[2]);
                intersection[2].instruction = TurnInstruction::new(basic, modifier);
            } else {
                debug_assert_eq!(obvious_index, 2);
                let through = self.ctx.is_through_street(2, intersection);
                let instruction =
                    self.ctx.instruction_for_obvious(via_edge, through, &intersection[2]);
                intersection[2].instruction = instruction;
                let modifier = if first_direction == second_direction
                    && first_direction == DirectionModifier::Straight
                {
                    DirectionModifier::SlightRight
                } else {
                    first_direction
                };
                let basic = self.ctx.basic_turn_type(via_edge, &intersection[1]);
                intersection[1].instruction = TurnInstruction::new(basic, modifier);
            }
        } else {
            self.assign_trivial_turns(via_edge, intersection, 1, 3);
        }
    }

    fn handle_complex(&self, via_edge: EdgeId, intersection: &mut Intersection) {
        let obvious_index = find_obvious_turn(&self.ctx, via_edge, intersection);
        let fork = find_fork(&self.ctx, via_edge, intersection);
        let straightest = intersection.closest_to_straight(self.ctx.config.straight_angle);

        if obvious_index != 0 {
            let through = self.ctx.is_through_street(obvious_index, intersection);
            let instruction =
                self.ctx
                    .instruction_for_obvious(via_edge, through, &intersection[obvious_index]);
            intersection[obvious_index].instruction = instruction;
            self.assign_left_turns(via_edge, intersection, obvious_index + 1);
            self.assign_right_turns(via_edge, intersection, obvious_index);
        } else if let Some(fork) = fork {
            if fork.size() == 2 {
                self.assign_fork_or_dominant(via_edge, intersection, fork.left, fork.right);
            } else {
                debug_assert_eq!(fork.size(), 3);
                assign_fork_three(intersection, fork.right, fork.right + 1, fork.left);
            }
            self.assign_left_turns(via_edge, intersection, fork.left + 1);
            self.assign_right_turns(via_edge, intersection, fork.right);
        } else if straightest.deviation < self.ctx.config.fuzzy_angle_difference
            && !intersection[straightest.index].entry_allowed
        {
            // A straight continuation exists but cannot be entered; split
            // around it and leave it unassigned.
            self.assign_left_turns(via_edge, intersection, straightest.index + 1);
            self.assign_right_turns(via_edge, intersection, straightest.index);
        } else if intersection[straightest.index].angle > self.ctx.config.straight_angle {
            self.assign_left_turns(via_edge, intersection, straightest.index);
            self.assign_right_turns(via_edge, intersection, straightest.index);
        } else if intersection[straightest.index].angle < self.ctx.config.straight_angle {
            self.assign_left_turns(via_edge, intersection, straightest.index + 1);
            self.assign_right_turns(via_edge, intersection, straightest.index + 1);
        } else {
            let len = intersection.len();
            self.assign_trivial_turns(via_edge, intersection, 1, len);
        }
    }

    /// A narrow pair that reads as a fork gets fork instructions; otherwise
    /// the more important side is treated as the continuation and the other
    /// side is nudged outwards.
    fn assign_fork_or_dominant(
        &self,
        via_edge: EdgeId,
        intersection: &mut Intersection,
        left: usize,
        right: usize,
    ) {
        let left_class = self.ctx.classification(intersection[left].eid);
        let right_class = self.ctx.classification(intersection[right].eid);
        if can_be_seen_as_fork(left_class, right_class) {
            assign_fork(intersection, right, left);
        } else if left_class.priority > right_class.priority {
            let instruction =
                self.ctx.instruction_for_obvious(via_edge, false, &intersection[right]);
            intersection[right].instruction = instruction;
            let basic = self.ctx.basic_turn_type(via_edge, &intersection[left]);
            intersection[left].instruction =
                TurnInstruction::new(basic, DirectionModifier::SlightLeft);
        } else {
            let instruction =
                self.ctx.instruction_for_obvious(via_edge, false, &intersection[left]);
            intersection[left].instruction = instruction;
            let basic = self.ctx.basic_turn_type(via_edge, &intersection[right]);
            intersection[right].instruction =
                TurnInstruction::new(basic, DirectionModifier::SlightRight);
        }
    }

    /// Assign the left half by mirroring the fan, reusing the right-hand
    /// logic and mirroring back. Mirroring is an involution and keeps the
    /// u-turn slot, so the round trip restores order and angles exactly.
    fn assign_left_turns(
        &self,
        via_edge: EdgeId,
        intersection: &mut Intersection,
        starting_at: usize,
    ) {
        debug_assert!(starting_at <= intersection.len());
        fn switch_left_and_right(intersection: &mut Intersection) {
            for road in intersection.iter_mut() {
                road.mirror();
            }
            intersection[1..].reverse();
        }

        switch_left_and_right(intersection);
        // The count includes the u-turn slot, which stays at index 0.
        let up_to = intersection.len() - starting_at + 1;
        self.assign_right_turns(via_edge, intersection, up_to);
        switch_left_and_right(intersection);
    }

    /// Assign turns on indices `[1, up_to)`, resolving modifier conflicts
    /// between neighbouring roads that bucket to the same direction.
    fn assign_right_turns(&self, via_edge: EdgeId, intersection: &mut Intersection, up_to: usize) {
        debug_assert!(up_to <= intersection.len());
        let valid = (1..up_to)
            .filter(|&index| intersection[index].entry_allowed)
            .count();
        if up_to <= 1 || valid == 0 {
            return;
        }

        if up_to == 2 {
            self.assign_trivial_turns(via_edge, intersection, 1, up_to);
        } else if up_to == 3 {
            let first = turn_direction(intersection[1].angle, &self.ctx.config);
            let second = turn_direction(intersection[2].angle, &self.ctx.config);
            if first == second {
                self.handle_distinct_conflict(via_edge, intersection, 2, 1);
            } else {
                self.assign_trivial_turns(via_edge, intersection, 1, up_to);
            }
        } else if up_to == 4 {
            let first = turn_direction(intersection[1].angle, &self.ctx.config);
            let second = turn_direction(intersection[2].angle, &self.ctx.config);
            let third = turn_direction(intersection[3].angle, &self.ctx.config);
            let narrow = self.ctx.config.narrow_turn_angle;
            let group = self.ctx.config.group_angle;
            let gap_low = angular_deviation(intersection[1].angle, intersection[2].angle);
            let gap_high = angular_deviation(intersection[2].angle, intersection[3].angle);

            if first != second && second != third {
                // The circular order makes all three directions distinct.
                self.assign_trivial_turns(via_edge, intersection, 1, up_to);
            } else if valid <= 2 {
                // With an entry missing, only one pair can actually conflict.
                if !intersection[3].entry_allowed {
                    self.handle_distinct_conflict(via_edge, intersection, 2, 1);
                } else if !intersection[1].entry_allowed {
                    self.handle_distinct_conflict(via_edge, intersection, 3, 2);
                } else {
                    self.handle_distinct_conflict(via_edge, intersection, 3, 1);
                }
            } else if gap_low >= narrow && gap_high >= narrow {
                // Three well separated turns on one side still fit the three
                // right-hand buckets.
                let sharp = self.ctx.basic_turn_type(via_edge, &intersection[1]);
                intersection[1].instruction =
                    TurnInstruction::new(sharp, DirectionModifier::SharpRight);
                let plain = self.ctx.basic_turn_type(via_edge, &intersection[2]);
                intersection[2].instruction =
                    TurnInstruction::new(plain, DirectionModifier::Right);
                let slight = self.ctx.basic_turn_type(via_edge, &intersection[3]);
                intersection[3].instruction =
                    TurnInstruction::new(slight, DirectionModifier::SlightRight);
            } else if (first == second && second == third)
                || (first == second && gap_high < group)
                || (second == third && gap_low < group)
            {
                self.assign_trivial_turns(via_edge, intersection, 1, up_to);
            } else if (first == second && gap_high >= group)
                || (second == third && gap_low >= group)
            {
                // One shared bucket next to a clearly separated third road:
                // resolve the narrow pair, the far road keeps its bucket.
                if gap_high >= group {
                    self.handle_distinct_conflict(via_edge, intersection, 2, 1);
                    let basic = self.ctx.basic_turn_type(via_edge, &intersection[3]);
                    intersection[3].instruction = TurnInstruction::new(basic, third);
                } else {
                    let basic = self.ctx.basic_turn_type(via_edge, &intersection[1]);
                    intersection[1].instruction = TurnInstruction::new(basic, first);
                    self.handle_distinct_conflict(via_edge, intersection, 3, 2);
                }
            } else {
                self.assign_trivial_turns(via_edge, intersection, 1, up_to);
            }
        } else {
            self.assign_trivial_turns(via_edge, intersection, 1, up_to);
        }
    }

    /// Natural instruction for every entry-allowed road in `[from, to)`.
    fn assign_trivial_turns(
        &self,
        via_edge: EdgeId,
        intersection: &mut Intersection,
        from: usize,
        to: usize,
    ) {
        for index in from..to {
            if intersection[index].entry_allowed {
                let basic = self.ctx.basic_turn_type(via_edge, &intersection[index]);
                let direction = turn_direction(intersection[index].angle, &self.ctx.config);
                intersection[index].instruction = TurnInstruction::new(basic, direction);
            }
        }
    }

    /// Two neighbouring roads bucket to the same direction; shift one of them
    /// into the adjacent bucket. `left` and `right` index the intersection
    /// with the left road at the larger angle.
    fn handle_distinct_conflict(
        &self,
        via_edge: EdgeId,
        intersection: &mut Intersection,
        left: usize,
        right: usize,
    ) {
        debug_assert!(left > right);
        // A one-sided conflict or two roads at the very same angle (bad map
        // data) keep their natural buckets.
        if !intersection[left].entry_allowed
            || !intersection[right].entry_allowed
            || intersection[left].angle == intersection[right].angle
        {
            for index in [left, right] {
                if intersection[index].entry_allowed {
                    let basic = self.ctx.basic_turn_type(via_edge, &intersection[index]);
                    let direction = turn_direction(intersection[index].angle, &self.ctx.config);
                    intersection[index].instruction = TurnInstruction::new(basic, direction);
                }
            }
            return;
        }

        let left_direction = turn_direction(intersection[left].angle, &self.ctx.config);
        let right_direction = turn_direction(intersection[right].angle, &self.ctx.config);

        if left_direction == DirectionModifier::Straight
            || left_direction == DirectionModifier::SlightLeft
            || right_direction == DirectionModifier::SlightRight
        {
            self.assign_fork_or_dominant(via_edge, intersection, left, right);
            // No early return here: the deviation table below may still
            // reassign the pair.
        }

        let left_type = self.ctx.basic_turn_type(via_edge, &intersection[left]);
        let right_type = self.ctx.basic_turn_type(via_edge, &intersection[right]);
        let tolerance = self.ctx.config.max_no_turn_deviation;

        if angular_deviation(intersection[left].angle, 90.0) < tolerance {
            // The left road is the proper right turn; push the other outwards.
            intersection[left].instruction =
                TurnInstruction::new(left_type, DirectionModifier::Right);
            intersection[right].instruction =
                TurnInstruction::new(right_type, DirectionModifier::SharpRight);
            return;
        }
        if angular_deviation(intersection[right].angle, 90.0) < tolerance {
            intersection[left].instruction =
                TurnInstruction::new(left_type, DirectionModifier::SlightRight);
            intersection[right].instruction =
                TurnInstruction::new(right_type, DirectionModifier::Right);
            return;
        }
        if angular_deviation(intersection[left].angle, 270.0) < tolerance {
            intersection[left].instruction =
                TurnInstruction::new(left_type, DirectionModifier::Left);
            intersection[right].instruction =
                TurnInstruction::new(right_type, DirectionModifier::SlightLeft);
            return;
        }
        if angular_deviation(intersection[right].angle, 270.0) < tolerance {
            intersection[left].instruction =
                TurnInstruction::new(left_type, DirectionModifier::SharpLeft);
            intersection[right].instruction =
                TurnInstruction::new(right_type, DirectionModifier::Left);
            return;
        }

        // Neither road sits near a perfect turn; shift whichever loses less.
        if left_direction == DirectionModifier::SharpLeft {
            intersection[left].instruction =
                TurnInstruction::new(left_type, DirectionModifier::SharpLeft);
            intersection[right].instruction =
                TurnInstruction::new(right_type, DirectionModifier::Left);
            return;
        }
        if right_direction == DirectionModifier::SharpRight {
            intersection[left].instruction =
                TurnInstruction::new(left_type, DirectionModifier::Right);
            intersection[right].instruction =
                TurnInstruction::new(right_type, DirectionModifier::SharpRight);
            return;
        }

        if left_direction == DirectionModifier::Right {
            if angular_deviation(intersection[left].angle, 85.0)
                >= angular_deviation(intersection[right].angle, 85.0)
            {
                intersection[left].instruction =
                    TurnInstruction::new(left_type, DirectionModifier::Right);
                intersection[right].instruction =
                    TurnInstruction::new(right_type, DirectionModifier::SharpRight);
            } else {
                intersection[left].instruction =
                    TurnInstruction::new(left_type, DirectionModifier::SlightRight);
                intersection[right].instruction =
                    TurnInstruction::new(right_type, DirectionModifier::Right);
            }
        } else if angular_deviation(intersection[left].angle, 265.0)
            >= angular_deviation(intersection[right].angle, 265.0)
        {
            intersection[left].instruction =
                TurnInstruction::new(left_type, DirectionModifier::SharpLeft);
            intersection[right].instruction =
                TurnInstruction::new(right_type, DirectionModifier::Left);
        } else {
            intersection[left].instruction =
                TurnInstruction::new(left_type, DirectionModifier::Left);
            intersection[right].instruction =
                TurnInstruction::new(right_type, DirectionModifier::SlightLeft);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeData, MemoryGraph, RoadClassification};
    use crate::names::EMPTY_NAME_ID;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    struct Fixture {
        graph: MemoryGraph,
        names: NameTable,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                graph: MemoryGraph::new(),
                names: NameTable::new(),
            }
        }

        fn edge(&mut self, name: &str, classification: RoadClassification) -> EdgeId {
            let name_id = self.names.insert(name);
            self.graph.push_edge(EdgeData::new(name_id, classification))
        }

        fn handler(&self) -> TurnHandler<'_, MemoryGraph> {
            TurnHandler::new(&self.graph, &self.names, SuffixTable::standard())
        }
    }

    fn road(eid: EdgeId, angle: f64) -> ConnectedRoad {
        ConnectedRoad::new(eid, true, angle, angle)
    }

    fn instruction(turn_type: TurnType, modifier: DirectionModifier) -> TurnInstruction {
        TurnInstruction::new(turn_type, modifier)
    }

    #[test]
    fn two_way_continuation() {
        let mut fixture = Fixture::new();
        let via = fixture.edge("Market Street", RoadClassification::residential());
        let ahead = fixture.edge("Market Street", RoadClassification::residential());
        let handler = fixture.handler();

        let fan = Intersection::new(vec![road(via, 0.0), road(ahead, 180.0)]);
        let result = handler.classify(via, fan);
        assert_eq!(
            result[1].instruction,
            instruction(TurnType::Continue, DirectionModifier::Straight)
        );
        assert_eq!(result[0].instruction.modifier, DirectionModifier::UTurn);
    }

    #[test]
    fn t_intersection_is_end_of_road() {
        let mut fixture = Fixture::new();
        let via = fixture.edge("Castro Street", RoadClassification::residential());
        let right = fixture.edge("Market Street", RoadClassification::residential());
        let left = fixture.edge("Noe Street", RoadClassification::residential());
        let handler = fixture.handler();

        let fan = Intersection::new(vec![road(via, 0.0), road(right, 90.0), road(left, 270.0)]);
        let result = handler.classify(via, fan);
        assert_eq!(
            result[1].instruction,
            instruction(TurnType::EndOfRoad, DirectionModifier::Right)
        );
        assert_eq!(
            result[2].instruction,
            instruction(TurnType::EndOfRoad, DirectionModifier::Left)
        );
    }

    #[test]
    fn t_intersection_onto_a_ramp() {
        let mut fixture = Fixture::new();
        let via = fixture.edge("Station Road", RoadClassification::residential());
        let ramp = fixture.edge("", RoadClassification::motorway_link());
        let left = fixture.edge("Noe Street", RoadClassification::residential());
        let handler = fixture.handler();

        let fan = Intersection::new(vec![road(via, 0.0), road(ramp, 90.0), road(left, 270.0)]);
        let result = handler.classify(via, fan);
        assert_eq!(
            result[1].instruction,
            instruction(TurnType::OnRamp, DirectionModifier::Right),
            "a ramp arm keeps its ramp type"
        );
        assert_eq!(
            result[2].instruction,
            instruction(TurnType::EndOfRoad, DirectionModifier::Left)
        );
    }

    #[test]
    fn three_way_fork() {
        let mut fixture = Fixture::new();
        let via = fixture.edge("Market Street", RoadClassification::secondary());
        let right = fixture.edge("Market Street", RoadClassification::secondary());
        let left = fixture.edge("Castro Street", RoadClassification::secondary());
        let handler = fixture.handler();

        let fan = Intersection::new(vec![road(via, 0.0), road(right, 170.0), road(left, 195.0)]);
        let result = handler.classify(via, fan);
        assert_eq!(
            result[1].instruction,
            instruction(TurnType::Fork, DirectionModifier::SlightRight)
        );
        assert_eq!(
            result[2].instruction,
            instruction(TurnType::Fork, DirectionModifier::SlightLeft)
        );
    }

    #[test]
    fn obvious_continuation_with_side_turn() {
        let mut fixture = Fixture::new();
        let via = fixture.edge("Market Street", RoadClassification::residential());
        let side = fixture.edge("Castro Street", RoadClassification::service());
        let ahead = fixture.edge("Market Street", RoadClassification::residential());
        let handler = fixture.handler();

        let fan = Intersection::new(vec![road(via, 0.0), road(side, 95.0), road(ahead, 180.0)]);
        let result = handler.classify(via, fan);
        assert_eq!(
            result[2].instruction,
            instruction(TurnType::Continue, DirectionModifier::Straight)
        );
        assert_eq!(
            result[1].instruction,
            instruction(TurnType::Turn, DirectionModifier::Right)
        );
    }

    #[test]
    fn obvious_with_straight_side_road_nudges_it_left() {
        let mut fixture = Fixture::new();
        let via = fixture.edge("Market Street", RoadClassification::residential());
        let ahead = fixture.edge("Market Street", RoadClassification::residential());
        let shadow = fixture.edge("Castro Street", RoadClassification::residential());
        let handler = fixture.handler();

        let fan = Intersection::new(vec![road(via, 0.0), road(ahead, 180.0), road(shadow, 195.0)]);
        let result = handler.classify(via, fan);
        assert_eq!(
            result[1].instruction,
            instruction(TurnType::Continue, DirectionModifier::Straight)
        );
        assert_eq!(
            result[2].instruction,
            instruction(TurnType::Turn, DirectionModifier::SlightLeft),
            "a second straight road moves into the slight-left bucket"
        );
    }

    #[test]
    fn four_way_right_hand_cluster_gets_the_fixed_triple() {
        let mut fixture = Fixture::new();
        let via = fixture.edge("A", RoadClassification::residential());
        let r1 = fixture.edge("B", RoadClassification::residential());
        let r2 = fixture.edge("C", RoadClassification::residential());
        let r3 = fixture.edge("D", RoadClassification::residential());
        let handler = fixture.handler();

        // Three well separated exits, all on the right-hand side.
        let fan = Intersection::new(vec![
            road(via, 0.0),
            road(r1, 20.0),
            road(r2, 55.0),
            road(r3, 90.0),
        ]);
        let result = handler.classify(via, fan);
        assert_eq!(
            result[1].instruction,
            instruction(TurnType::Turn, DirectionModifier::SharpRight)
        );
        assert_eq!(
            result[2].instruction,
            instruction(TurnType::Turn, DirectionModifier::Right)
        );
        assert_eq!(
            result[3].instruction,
            instruction(TurnType::Turn, DirectionModifier::SlightRight)
        );
    }

    #[test]
    fn four_way_crossing_keeps_natural_directions() {
        let mut fixture = Fixture::new();
        let via = fixture.edge("A", RoadClassification::residential());
        let right = fixture.edge("B", RoadClassification::residential());
        let ahead = fixture.edge("C", RoadClassification::residential());
        let left = fixture.edge("D", RoadClassification::residential());
        let handler = fixture.handler();

        let fan = Intersection::new(vec![
            road(via, 0.0),
            road(right, 90.0),
            road(ahead, 180.0),
            road(left, 270.0),
        ]);
        let result = handler.classify(via, fan);
        assert_eq!(
            result[1].instruction,
            instruction(TurnType::Turn, DirectionModifier::Right)
        );
        assert_eq!(result[2].instruction.modifier, DirectionModifier::Straight);
        assert!(matches!(
            result[2].instruction.turn_type,
            TurnType::Turn | TurnType::Continue
        ));
        assert_eq!(
            result[3].instruction,
            instruction(TurnType::Turn, DirectionModifier::Left)
        );
    }

    #[test]
    fn conflict_near_the_perfect_right_turn() {
        let mut fixture = Fixture::new();
        let via = fixture.edge("A", RoadClassification::residential());
        let low = fixture.edge("B", RoadClassification::residential());
        let high = fixture.edge("C", RoadClassification::residential());
        let handler = fixture.handler();

        let mut fan = Intersection::new(vec![road(via, 0.0), road(low, 80.0), road(high, 100.0)]);
        handler.handle_distinct_conflict(via, &mut fan, 2, 1);
        assert_eq!(
            fan[2].instruction,
            instruction(TurnType::Turn, DirectionModifier::Right)
        );
        assert_eq!(
            fan[1].instruction,
            instruction(TurnType::Turn, DirectionModifier::SharpRight)
        );
    }

    #[test]
    fn conflict_with_blocked_road_keeps_natural_buckets() {
        let mut fixture = Fixture::new();
        let via = fixture.edge("A", RoadClassification::residential());
        let open = fixture.edge("B", RoadClassification::residential());
        let blocked = fixture.edge("C", RoadClassification::residential());
        let handler = fixture.handler();

        let mut fan = Intersection::new(vec![road(via, 0.0), road(open, 95.0), road(blocked, 110.0)]);
        fan[2].entry_allowed = false;
        handler.handle_distinct_conflict(via, &mut fan, 2, 1);
        assert_eq!(
            fan[1].instruction,
            instruction(TurnType::Turn, DirectionModifier::Right)
        );
        assert_eq!(fan[2].instruction, TurnInstruction::NO_TURN);
    }

    #[test]
    fn conflict_fork_branch_falls_through_to_the_deviation_table() {
        let mut fixture = Fixture::new();
        let via = fixture.edge("A", RoadClassification::residential());
        let right = fixture.edge("B", RoadClassification::residential());
        let left = fixture.edge("C", RoadClassification::residential());
        let handler = fixture.handler();

        let mut fan = Intersection::new(vec![road(via, 0.0), road(right, 150.0), road(left, 168.0)]);
        handler.handle_distinct_conflict(via, &mut fan, 2, 1);
        // The pair first reads as a fork, but the deviation table reassigns
        // both roads afterwards.
        assert_eq!(
            fan[2].instruction,
            instruction(TurnType::Turn, DirectionModifier::Left)
        );
        assert_eq!(
            fan[1].instruction,
            instruction(TurnType::Turn, DirectionModifier::SlightLeft)
        );
    }

    #[test]
    fn left_assignment_mirrors_right_assignment() {
        let mut fixture = Fixture::new();
        let via = fixture.edge("A", RoadClassification::residential());
        let b = fixture.edge("B", RoadClassification::residential());
        let c = fixture.edge("C", RoadClassification::residential());
        let handler = fixture.handler();

        let mut right_fan =
            Intersection::new(vec![road(via, 0.0), road(b, 80.0), road(c, 100.0)]);
        handler.assign_right_turns(via, &mut right_fan, 3);

        let mut left_fan =
            Intersection::new(vec![road(via, 0.0), road(c, 260.0), road(b, 280.0)]);
        handler.assign_left_turns(via, &mut left_fan, 1);

        // Road b at 80 corresponds to road b at 280, road c at 100 to road c
        // at 260; modifiers must be mirror images.
        assert_eq!(
            left_fan[2].instruction.modifier,
            right_fan[1].instruction.modifier.mirrored()
        );
        assert_eq!(
            left_fan[1].instruction.modifier,
            right_fan[2].instruction.modifier.mirrored()
        );
        assert_eq!(left_fan[1].angle, 260.0, "angles are restored after mirroring");
        assert_eq!(left_fan[2].angle, 280.0);
    }

    #[test]
    fn random_fans_keep_shape_and_cover_all_entries() {
        let mut rng = StdRng::seed_from_u64(9001);
        let classes = [
            RoadClassification::motorway(),
            RoadClassification::primary(),
            RoadClassification::secondary(),
            RoadClassification::residential(),
            RoadClassification::service(),
            RoadClassification::motorway_link(),
        ];

        for round in 0..300 {
            let mut graph = MemoryGraph::new();
            let mut names = NameTable::new();
            let name_ids = [
                EMPTY_NAME_ID,
                names.insert("Market Street"),
                names.insert("Castro Street"),
                names.insert("Noe Street"),
            ];

            let mut random_edge = |rng: &mut StdRng, graph: &mut MemoryGraph| {
                graph.push_edge(EdgeData::new(
                    name_ids[rng.gen_range(0..name_ids.len())],
                    classes[rng.gen_range(0..classes.len())],
                ))
            };

            let size = rng.gen_range(2..=6);
            let via = random_edge(&mut rng, &mut graph);
            let mut roads = vec![ConnectedRoad::new(via, rng.gen(), 0.0, 0.0)];
            let mut angles: Vec<f64> =
                (1..size).map(|_| rng.gen_range(5.0..355.0)).collect();
            angles.sort_by(|a, b| a.partial_cmp(b).unwrap());
            for angle in angles {
                let eid = random_edge(&mut rng, &mut graph);
                roads.push(ConnectedRoad::new(eid, rng.gen(), angle, angle));
            }
            let fan = Intersection::new(roads);
            assert!(fan.is_valid());
            let before = fan.clone();

            let handler = TurnHandler::new(&graph, &names, SuffixTable::standard());
            let after = handler.classify(via, fan);

            assert_eq!(after.len(), before.len(), "round {round}: size must not change");
            for (index, (a, b)) in after.iter().zip(before.iter()).enumerate() {
                assert_eq!(
                    a.angle, b.angle,
                    "round {round}: angle of road {index} must not change"
                );
                assert_eq!(a.eid, b.eid, "round {round}: order must not change");
            }
            assert!(after[0].angle < f64::EPSILON);
            if after[0].entry_allowed {
                assert_eq!(
                    after[0].instruction.modifier,
                    DirectionModifier::UTurn,
                    "round {round}: the u-turn slot keeps its modifier"
                );
            }
            for (index, road) in after.iter().enumerate().skip(1) {
                if road.entry_allowed {
                    assert_ne!(
                        road.instruction.turn_type,
                        TurnType::NoTurn,
                        "round {round}: entry-allowed road {index} at {} was left unassigned",
                        road.angle
                    );
                }
            }
        }
    }

    #[test]
    fn batch_classification_preserves_order_and_rejects_bad_input() {
        let mut fixture = Fixture::new();
        let via = fixture.edge("Market Street", RoadClassification::residential());
        let ahead = fixture.edge("Market Street", RoadClassification::residential());
        let handler = fixture.handler();

        let fan = |angle: f64| Intersection::new(vec![road(via, 0.0), road(ahead, angle)]);
        let batch = vec![(via, fan(180.0)), (via, fan(120.0)), (via, fan(240.0))];
        let classified = handler.classify_batch(batch).expect("valid batch");
        assert_eq!(classified.len(), 3);
        assert_eq!(classified[0][1].angle, 180.0);
        assert_eq!(classified[1][1].angle, 120.0);
        assert_eq!(classified[2][1].angle, 240.0);

        let broken = Intersection::new(vec![road(via, 30.0)]);
        assert!(handler.classify_batch(vec![(via, broken)]).is_err());
    }
}
