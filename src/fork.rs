//! Detecting forks: two or three adjacent, near-straight outgoing roads that
//! are presented as one "keep left / keep right" choice.
//!
//! ```text
//!     left   right          left   right
//!        \   /                 \ | /
//!         \ /                   \|/
//!          |                     |
//!          |                     |
//! ```
//!
//! A candidate group is grown outwards from the straightest road and then
//! checked for isolation, class compatibility and entry permission.

use crate::angles::angular_deviation;
use crate::classify::{obvious_by_road_class, GuidanceContext};
use crate::config::GuidanceConfig;
use crate::graph::{EdgeId, RoadNetwork};
use crate::intersection::{ConnectedRoad, Intersection};
use crate::obvious::is_obvious_of_two;

/// Inclusive index range `[right, left]` of the fork branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fork {
    pub right: usize,
    pub left: usize,
}

impl Fork {
    pub fn new(right: usize, left: usize) -> Self {
        debug_assert!(right < left);
        let fork = Self { right, left };
        debug_assert!(fork.size() >= 2 && fork.size() <= 3);
        fork
    }

    pub fn size(&self) -> usize {
        self.left - self.right + 1
    }
}

/// Given `road` inside a candidate group and `next` one step further out,
/// report whether `road` is the outermost member: `next` no longer counts as
/// a fork candidate because it bends away from straight and either sits far
/// from `road` or `road` itself already left the straight group.
fn is_outermost_fork_candidate(
    config: &GuidanceConfig,
    road: &ConnectedRoad,
    next: &ConnectedRoad,
) -> bool {
    let next_to_straight = angular_deviation(next.angle, config.straight_angle);
    let between = angular_deviation(road.angle, next.angle);
    let road_to_straight = angular_deviation(road.angle, config.straight_angle);
    next_to_straight > config.narrow_turn_angle
        && (between > config.narrow_turn_angle || road_to_straight > config.group_angle)
}

/// Grow the candidate range outwards from the straightest entry-allowed road.
/// Returns the range only when it spans two or three roads.
fn find_left_and_rightmost_candidates(
    config: &GuidanceConfig,
    intersection: &Intersection,
) -> Option<Fork> {
    if intersection.len() < 3 {
        return None;
    }
    let straightest = intersection.closest_to_straight(config.straight_angle);
    if straightest.deviation > config.narrow_turn_angle {
        return None;
    }

    let mut right = straightest.index;
    while right > 1
        && !is_outermost_fork_candidate(config, &intersection[right], &intersection[right - 1])
    {
        right -= 1;
    }

    let mut left = straightest.index;
    while left + 1 < intersection.len()
        && !is_outermost_fork_candidate(config, &intersection[left], &intersection[left + 1])
    {
        left += 1;
    }

    if right < left && left - right + 1 <= 3 {
        Some(Fork::new(right, left))
    } else {
        None
    }
}

/// All fork branches must sit in the same link tier as the rightmost branch,
/// and no branch may dominate another by road class.
fn is_compatible_by_road_class<G: RoadNetwork>(
    ctx: &GuidanceContext<'_, G>,
    intersection: &Intersection,
    fork: Fork,
) -> bool {
    let via_class = ctx.classification(intersection[0].eid);
    let right_is_link = ctx.classification(intersection[fork.right].eid).link;
    if !(fork.right + 1..=fork.left)
        .all(|index| ctx.classification(intersection[index].eid).link == right_is_link)
    {
        return false;
    }
    (fork.right..=fork.left).all(|base| {
        let base_class = ctx.classification(intersection[base].eid);
        (fork.right..=fork.left).all(|compare| {
            compare == base
                || !obvious_by_road_class(
                    via_class,
                    base_class,
                    ctx.classification(intersection[compare].eid),
                )
        })
    })
}

/// Whether any adjacent pair inside the candidate range contains an obvious
/// choice. A fork with an obvious branch is not a fork.
fn has_obvious<G: RoadNetwork>(
    ctx: &GuidanceContext<'_, G>,
    via_edge: EdgeId,
    intersection: &Intersection,
    fork: Fork,
) -> bool {
    (fork.right..fork.left).any(|index| {
        is_obvious_of_two(ctx, via_edge, &intersection[index], &intersection[index + 1])
            || is_obvious_of_two(ctx, via_edge, &intersection[index + 1], &intersection[index])
    })
}

/// Find the fork at this intersection, if there is one.
pub fn find_fork<G: RoadNetwork>(
    ctx: &GuidanceContext<'_, G>,
    via_edge: EdgeId,
    intersection: &Intersection,
) -> Option<Fork> {
    let fork = find_left_and_rightmost_candidates(&ctx.config, intersection)?;

    // The group must stand free of its neighbours on both sides; past the
    // last road the neighbour wraps around to the u-turn slot.
    let next = if fork.left + 1 == intersection.len() {
        0
    } else {
        fork.left + 1
    };
    let separated_left = angular_deviation(intersection[fork.left].angle, intersection[next].angle)
        >= ctx.config.group_angle;
    let separated_right = angular_deviation(
        intersection[fork.right].angle,
        intersection[fork.right - 1].angle,
    ) >= ctx.config.group_angle;

    let acceptable = separated_left
        && separated_right
        && !has_obvious(ctx, via_edge, intersection, fork)
        && is_compatible_by_road_class(ctx, intersection, fork)
        && intersection.has_valid_entries(fork.right, fork.left);
    acceptable.then_some(fork)
}
