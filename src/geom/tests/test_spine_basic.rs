use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geom::{FilamentSpine, Point3};

fn straight_ten() -> FilamentSpine {
    FilamentSpine::from_coords(&[[0.0, 0.0, 0.0], [10.0, 0.0, 0.0]]).expect("valid spine")
}

fn random_spine(rng: &mut StdRng, vertices: usize) -> FilamentSpine {
    let points: Vec<Point3> = (0..vertices)
        .map(|_| {
            Point3::new(
                rng.random_range(-20.0..20.0),
                rng.random_range(-20.0..20.0),
                rng.random_range(-20.0..20.0),
            )
        })
        .collect();
    FilamentSpine::new(points).expect("random spine")
}

#[test]
fn perpendicular_offset_projects_onto_interior() {
    let hit = straight_ten().nearest_point(Point3::new(5.0, 3.0, 0.0));
    assert_eq!(hit.distance, 3.0);
    assert_eq!(hit.arc_length, 5.0);
    assert_eq!(hit.closest_point, Point3::new(5.0, 0.0, 0.0));
}

#[test]
fn beyond_the_end_clamps_to_last_vertex() {
    let hit = straight_ten().nearest_point(Point3::new(15.0, 0.0, 0.0));
    assert_eq!(hit.distance, 5.0);
    assert_eq!(hit.arc_length, 10.0);
    assert_eq!(hit.t, 1.0);

    let before = straight_ten().nearest_point(Point3::new(-2.0, 0.0, 0.0));
    assert_eq!(before.distance, 2.0);
    assert_eq!(before.arc_length, 0.0);
}

#[test]
fn points_on_segments_have_zero_distance() {
    let spine = FilamentSpine::from_coords(&[
        [0.0, 0.0, 0.0],
        [4.0, 0.0, 0.0],
        [4.0, 2.0, 0.0],
        [4.0, 2.0, 6.0],
    ])
    .expect("valid spine");

    for (query, expected_arc) in [
        (Point3::new(1.5, 0.0, 0.0), 1.5),
        (Point3::new(4.0, 0.0, 0.0), 4.0),
        (Point3::new(4.0, 1.0, 0.0), 5.0),
        (Point3::new(4.0, 2.0, 3.0), 9.0),
        (Point3::new(4.0, 2.0, 6.0), 12.0),
    ] {
        let hit = spine.nearest_point(query);
        assert_eq!(hit.distance, 0.0, "query {query:?}");
        assert!((hit.arc_length - expected_arc).abs() < 1e-12, "query {query:?}");
    }
}

#[test]
fn arc_length_is_monotone_along_the_spine() {
    let spine = FilamentSpine::from_coords(&[
        [0.0, 0.0, 0.0],
        [1.0, 2.0, 0.0],
        [2.0, 0.0, 1.0],
        [3.0, 2.0, 1.0],
        [4.0, 0.0, 2.0],
    ])
    .expect("valid spine");
    assert!(spine.arc_lengths().windows(2).all(|w| w[0] < w[1]));

    let mut previous = -1.0;
    for i in 0..=200 {
        let s = spine.length() * f64::from(i) / 200.0;
        let hit = spine.nearest_point(spine.point_at_arc_length(s));
        assert!(hit.distance < 1e-9);
        assert!((hit.arc_length - s).abs() < 1e-9);
        assert!(hit.arc_length > previous);
        previous = hit.arc_length;
    }
}

#[test]
fn distance_ignores_vertex_order() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..20 {
        let spine = random_spine(&mut rng, 6);
        let reversed =
            FilamentSpine::new(spine.vertices().iter().rev().copied().collect()).expect("reversed");
        assert!((spine.length() - reversed.length()).abs() < 1e-9);

        for _ in 0..25 {
            let q = Point3::new(
                rng.random_range(-30.0..30.0),
                rng.random_range(-30.0..30.0),
                rng.random_range(-30.0..30.0),
            );
            let forward = spine.nearest_point(q);
            let backward = reversed.nearest_point(q);
            assert!(forward.distance >= 0.0);
            assert!((forward.distance - backward.distance).abs() < 1e-9);
        }
    }
}

#[test]
fn projections_match_single_segment_minimum() {
    let mut rng = StdRng::seed_from_u64(3);
    let spine = random_spine(&mut rng, 8);
    let queries: Vec<Point3> = (0..50)
        .map(|_| Point3::new(rng.random_range(-25.0..25.0), rng.random_range(-25.0..25.0), 0.0))
        .collect();

    for (q, hit) in queries.iter().zip(spine.project_points(&queries)) {
        let best = (0..spine.segments().len())
            .filter_map(|i| spine.project_segment(i, *q))
            .map(|p| p.distance)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(hit.distance, best);
    }
    assert!(spine.project_segment(spine.segments().len(), Point3::ORIGIN).is_none());
}
