//! Road map construction: lane attachment and sub-intersections

use traffic_convoy::simulation::{
    Cardinal, GraphInput, JunctionKind, Position, RoadId, Topology,
};

fn point(x: f32, y: f32) -> Position {
    Position::new(x, y)
}

#[test]
fn test_single_turn_gives_one_sub_intersection_at_the_crossing() {
    // northbound into T, eastbound out of T
    let input = GraphInput::new()
        .junction("S", 300.0, 600.0)
        .junction("T", 300.0, 300.0)
        .junction("E", 600.0, 300.0)
        .road("S", "T")
        .road("T", "E");
    let topology = Topology::build(&input).unwrap();

    let t = topology.junction_by_name("T").unwrap();
    assert_eq!(t.kind(), JunctionKind::Transit);
    assert_eq!(t.sub_intersections().len(), 1);

    let sub = &t.sub_intersections()[0];
    // north lane at x + 3W/4, east lane at y + 3W/4
    assert_eq!(sub.point, point(345.0, 345.0));
    assert_eq!(sub.roads(), &[RoadId(1)]);
    assert!(!sub.is_final());
}

#[test]
fn test_lane_attachment_follows_direction() {
    let input = GraphInput::new()
        .junction("A", 0.0, 0.0)
        .junction("B", 300.0, 0.0)
        .road("A", "B")
        .road("B", "A");
    let topology = Topology::build(&input).unwrap();

    let east = topology.road(RoadId(0)).unwrap();
    assert_eq!(east.start_side, Cardinal::East);
    assert_eq!(east.end_side, Cardinal::West);
    assert_eq!(east.start_point, point(60.0, 45.0));
    assert_eq!(east.end_point, point(300.0, 45.0));
    assert_eq!(east.distance, 240.0);

    let west = topology.road(RoadId(1)).unwrap();
    assert_eq!(west.start_side, Cardinal::West);
    assert_eq!(west.start_point, point(300.0, 15.0));
    assert_eq!(west.end_point, point(60.0, 15.0));

    // steeper than 45 degrees counts as vertical
    let input = GraphInput::new()
        .junction("A", 0.0, 0.0)
        .junction("B", 100.0, -250.0)
        .road("A", "B");
    let topology = Topology::build(&input).unwrap();
    let road = topology.road(RoadId(0)).unwrap();
    assert_eq!(road.start_side, Cardinal::North);
    assert_eq!(road.end_side, Cardinal::South);
}

#[test]
fn test_source_and_final_junctions() {
    let input = GraphInput::new()
        .junction("IN", 0.0, 0.0)
        .junction("MID", 300.0, 0.0)
        .junction("OUT", 600.0, 0.0)
        .road("IN", "MID")
        .road("MID", "OUT");
    let topology = Topology::build(&input).unwrap();

    let source = topology.junction_by_name("IN").unwrap();
    assert!(source.is_source());
    assert_eq!(source.sub_intersections().len(), 1);
    assert_eq!(source.sub_intersections()[0].point, point(60.0, 45.0));

    let last = topology.junction_by_name("OUT").unwrap();
    assert!(last.is_final());
    assert_eq!(last.sub_intersections().len(), 1);
    assert!(last.sub_intersections()[0].is_final());
    assert_eq!(last.sub_intersections()[0].point, point(600.0, 45.0));

    // driving straight through: the point sits where the next road starts
    let mid = topology.junction_by_name("MID").unwrap();
    assert_eq!(mid.sub_intersections().len(), 1);
    assert_eq!(mid.sub_intersections()[0].point, point(360.0, 45.0));

    assert_eq!(topology.sources().count(), 1);
    assert_eq!(topology.finals().count(), 1);
}

#[test]
fn test_u_turn_only_junction_is_a_dead_end() {
    let input = GraphInput::new()
        .junction("IN", 0.0, 0.0)
        .junction("LOOP", 300.0, 0.0)
        .junction("OUT", 0.0, 300.0)
        .road("IN", "LOOP")
        .road("LOOP", "IN")
        .road("IN", "OUT");
    let topology = Topology::build(&input).unwrap();

    let looped = topology.junction_by_name("LOOP").unwrap();
    assert_eq!(looped.kind(), JunctionKind::Transit);
    let subs = looped.sub_intersections();
    assert_eq!(subs.len(), 1);
    assert!(subs[0].is_final());
    assert_eq!(subs[0].point, point(300.0, 45.0));
}

#[test]
fn test_full_crossing_merges_shared_points() {
    let topology = Topology::build(&GraphInput::demo()).unwrap();
    let center = topology.junction_by_name("G11").unwrap();
    let (x, y) = (center.position.x, center.position.y);

    // four turning points, two of them shared, plus four straight-on points
    let subs = center.sub_intersections();
    assert_eq!(subs.len(), 8);
    for (dx, dy) in [(45.0, 45.0), (45.0, 15.0), (15.0, 45.0), (15.0, 15.0)] {
        let sub = subs
            .iter()
            .find(|s| s.point == point(x + dx, y + dy))
            .unwrap_or_else(|| panic!("missing sub-intersection at +({}, {})", dx, dy));
        assert_eq!(sub.roads().len(), 2);
    }
    for (dx, dy) in [(45.0, 0.0), (15.0, 60.0), (60.0, 45.0), (0.0, 15.0)] {
        let sub = subs.iter().find(|s| s.point == point(x + dx, y + dy)).unwrap();
        assert_eq!(sub.roads().len(), 1);
    }
}

#[test]
fn test_fix_is_idempotent() {
    let mut topology = Topology::build(&GraphInput::demo()).unwrap();
    let before: Vec<_> = topology.sub_intersections().cloned().collect();
    topology.fix();
    topology.fix();
    let after: Vec<_> = topology.sub_intersections().cloned().collect();
    assert_eq!(before, after);
}

#[test]
fn test_every_sub_intersection_belongs_to_its_junction() {
    let topology = Topology::build(&GraphInput::demo()).unwrap();
    for junction in topology.junctions() {
        for (index, sub) in junction.sub_intersections().iter().enumerate() {
            assert_eq!(sub.junction(), junction.id);
            assert_eq!(sub.id.index, index);
            for road in sub.roads() {
                assert_eq!(topology.road(*road).unwrap().start, junction.id);
            }
        }
    }
}

#[test]
fn test_malformed_maps_are_rejected() {
    let unknown = GraphInput::new().junction("A", 0.0, 0.0).road("A", "B");
    assert!(Topology::build(&unknown).is_err());

    let duplicate = GraphInput::new()
        .junction("A", 0.0, 0.0)
        .junction("A", 300.0, 0.0);
    assert!(Topology::build(&duplicate).is_err());

    let self_loop = GraphInput::new().junction("A", 0.0, 0.0).road("A", "A");
    assert!(Topology::build(&self_loop).is_err());

    let stacked = GraphInput::new()
        .junction("A", 0.0, 0.0)
        .junction("B", 300.0, 0.0)
        .junction("C", 600.0, 50.0)
        .road("A", "B")
        .road("A", "C");
    let err = Topology::build(&stacked).unwrap_err();
    assert!(err.to_string().contains("already has road"));

    let isolated = GraphInput::new()
        .junction("A", 0.0, 0.0)
        .junction("B", 300.0, 0.0)
        .junction("C", 900.0, 900.0)
        .road("A", "B");
    assert!(Topology::build(&isolated).is_err());

    let same_spot = GraphInput::new()
        .junction("A", 0.0, 0.0)
        .junction("B", 0.0, 0.0)
        .road("A", "B");
    assert!(Topology::build(&same_spot).is_err());
}

#[test]
fn test_graph_input_reads_json() {
    let json = r#"{
        "junctions": [
            {"name": "A", "x": 0.0, "y": 0.0},
            {"name": "B", "x": 300.0, "y": 0.0}
        ],
        "roads": [{"from": "A", "to": "B"}]
    }"#;
    let input = GraphInput::from_json_str(json).unwrap();
    assert_eq!(input.junctions.len(), 2);
    let topology = Topology::build(&input).unwrap();
    assert_eq!(topology.roads().len(), 1);

    assert!(GraphInput::from_json_str("{ not json").is_err());
}
