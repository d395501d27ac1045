//! Deciding whether exactly one outgoing road is the natural continuation.

use crate::angles::angular_deviation;
use crate::classify::{obvious_by_road_class, GuidanceContext};
use crate::graph::{EdgeId, RoadNetwork};
use crate::intersection::{ConnectedRoad, Intersection};
use crate::names::EMPTY_NAME_ID;

/// Whether taking `road` is obvious when `other` is the only alternative.
///
/// Road class dominance decides first, in either direction. After that a
/// perfectly straight continuation of the traveled name is obvious, and
/// finally a road wins if the alternative bends away noticeably harder.
pub fn is_obvious_of_two<G: RoadNetwork>(
    ctx: &GuidanceContext<'_, G>,
    via_edge: EdgeId,
    road: &ConnectedRoad,
    other: &ConnectedRoad,
) -> bool {
    let via_class = ctx.classification(via_edge);
    let road_class = ctx.classification(road.eid);
    let other_class = ctx.classification(other.eid);
    if obvious_by_road_class(via_class, road_class, other_class) {
        return true;
    }
    if obvious_by_road_class(via_class, other_class, road_class) {
        return false;
    }

    let config = &ctx.config;
    let road_deviation = angular_deviation(road.angle, config.straight_angle);
    let perfectly_straight = road_deviation < f64::EPSILON;
    let via_name = ctx.graph.edge_data(via_edge).name_id;
    if perfectly_straight
        && via_name != EMPTY_NAME_ID
        && !ctx.requires_announcement(via_edge, road.eid)
    {
        return true;
    }

    let other_deviation = angular_deviation(other.angle, config.straight_angle);
    other_deviation / road_deviation > config.distinction_ratio
        && (other_deviation - road_deviation).abs() > config.fuzzy_angle_difference
}

/// Index of the single road that is obvious over every alternative, or 0 when
/// there is none. The u-turn slot never counts as obvious.
pub fn find_obvious_turn<G: RoadNetwork>(
    ctx: &GuidanceContext<'_, G>,
    via_edge: EdgeId,
    intersection: &Intersection,
) -> usize {
    let mut obvious = 0;
    for index in 1..intersection.len() {
        if !intersection[index].entry_allowed {
            continue;
        }
        let beats_every_alternative = (1..intersection.len())
            .filter(|&other| other != index)
            .all(|other| {
                is_obvious_of_two(ctx, via_edge, &intersection[index], &intersection[other])
            });
        if beats_every_alternative {
            if obvious != 0 {
                // Two roads each claiming to be obvious means neither is.
                return 0;
            }
            obvious = index;
        }
    }
    obvious
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeData, MemoryGraph, RoadClassification};
    use crate::names::{NameTable, SuffixTable};

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
    }

    fn road(eid: EdgeId, angle: f64) -> ConnectedRoad {
        ConnectedRoad::new(eid, true, angle, angle)
    }

    #[test]
    fn class_dominance_decides_first() {
        let mut fixture = Fixture::new();
        let via = fixture.edge("A", RoadClassification::primary());
        let main = fixture.edge("B", RoadClassification::primary());
        let side = fixture.edge("C", RoadClassification::service());
        let ctx = GuidanceContext::new(&fixture.graph, &fixture.names, SuffixTable::standard());

        // Even at a worse angle the dominant road is the obvious one.
        assert!(is_obvious_of_two(&ctx, via, &road(main, 150.0), &road(side, 180.0)));
        assert!(!is_obvious_of_two(&ctx, via, &road(side, 180.0), &road(main, 150.0)));
    }

    #[test]
    fn straight_continuation_of_the_name_is_obvious() {
        let mut fixture = Fixture::new();
        let via = fixture.edge("Market Street", RoadClassification::residential());
        let ahead = fixture.edge("Market Street", RoadClassification::residential());
        let side = fixture.edge("Castro Street", RoadClassification::residential());
        let ctx = GuidanceContext::new(&fixture.graph, &fixture.names, SuffixTable::standard());

        assert!(is_obvious_of_two(&ctx, via, &road(ahead, 180.0), &road(side, 170.0)));
        // Without the name match an exactly straight road gains nothing.
        assert!(!is_obvious_of_two(&ctx, via, &road(side, 180.0), &road(ahead, 170.0)));
    }

    #[test]
    fn much_straighter_roads_are_obvious() {
        let mut fixture = Fixture::new();
        let via = fixture.edge("A", RoadClassification::residential());
        let a = fixture.edge("B", RoadClassification::residential());
        let b = fixture.edge("C", RoadClassification::residential());
        let ctx = GuidanceContext::new(&fixture.graph, &fixture.names, SuffixTable::standard());

        // Deviations 20 vs 60: ratio 3.0 and difference 40, both clear.
        assert!(is_obvious_of_two(&ctx, via, &road(a, 160.0), &road(b, 120.0)));
        // Deviations 10 vs 15: the ratio passes but the difference is noise.
        assert!(!is_obvious_of_two(&ctx, via, &road(a, 170.0), &road(b, 165.0)));
        // Deviations 50 vs 65: the difference passes but the ratio does not.
        assert!(!is_obvious_of_two(&ctx, via, &road(a, 130.0), &road(b, 115.0)));
    }

    #[test]
    fn obvious_turn_is_unique_or_absent() {
        let mut fixture = Fixture::new();
        let via = fixture.edge("Market Street", RoadClassification::residential());
        let ahead = fixture.edge("Market Street", RoadClassification::residential());
        let left = fixture.edge("Castro Street", RoadClassification::residential());
        let right = fixture.edge("Noe Street", RoadClassification::residential());
        let ctx = GuidanceContext::new(&fixture.graph, &fixture.names, SuffixTable::standard());

        let fan = Intersection::new(vec![
            road(via, 0.0),
            road(right, 90.0),
            road(ahead, 180.0),
            road(left, 270.0),
        ]);
        let index = find_obvious_turn(&ctx, via, &fan);
        assert_eq!(index, 2);
        for other in [1, 3] {
            assert!(
                is_obvious_of_two(&ctx, via, &fan[index], &fan[other]),
                "the reported obvious road must beat road {other}"
            );
        }

        // A symmetric T junction has no obvious continuation.
        let t = Intersection::new(vec![road(via, 0.0), road(right, 90.0), road(left, 270.0)]);
        assert_eq!(find_obvious_turn(&ctx, via, &t), 0);
    }

    #[test]
    fn blocked_roads_are_never_obvious() {
        let mut fixture = Fixture::new();
        let via = fixture.edge("Market Street", RoadClassification::residential());
        let ahead = fixture.edge("Market Street", RoadClassification::residential());
        let side = fixture.edge("Castro Street", RoadClassification::residential());
        let ctx = GuidanceContext::new(&fixture.graph, &fixture.names, SuffixTable::standard());

        let mut fan = Intersection::new(vec![
            road(via, 0.0),
            road(side, 90.0),
            road(ahead, 180.0),
        ]);
        fan[2].entry_allowed = false;
        assert_eq!(find_obvious_turn(&ctx, via, &fan), 0);
    }
}
