use filament_jackknife::{
    DistanceIndex, DistanceOptions, FilamentId, FilamentSpine, Point3, index,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_point(rng: &mut StdRng, half_width: f64) -> Point3 {
    Point3::new(
        rng.random_range(-half_width..half_width),
        rng.random_range(-half_width..half_width),
        rng.random_range(-half_width..half_width),
    )
}

/// Random walk so consecutive vertices stay close, like real spines.
fn random_spine(rng: &mut StdRng) -> FilamentSpine {
    let vertex_count = rng.random_range(2..30);
    let mut p = random_point(rng, 40.0);
    let mut vertices = vec![p];
    for _ in 1..vertex_count {
        p = Point3::new(
            p.x + rng.random_range(-3.0..3.0),
            p.y + rng.random_range(-3.0..3.0),
            p.z + rng.random_range(-3.0..3.0),
        );
        vertices.push(p);
    }
    FilamentSpine::new(vertices).expect("random spine")
}

#[test]
fn pruned_search_matches_brute_force_on_random_catalogs() {
    let mut rng = StdRng::seed_from_u64(20_240_601);

    for round in 0..12 {
        let spines: Vec<FilamentSpine> = (0..rng.random_range(1..10))
            .map(|_| random_spine(&mut rng))
            .collect();
        let tracers: Vec<Point3> = (0..300).map(|_| random_point(&mut rng, 60.0)).collect();

        let brute = index::compute_all(
            &tracers,
            &spines,
            &DistanceOptions {
                prune: false,
                ..DistanceOptions::default()
            },
        )
        .expect("brute force");

        for (leaf_size, max_distance) in
            [(1, None), (4, Some(2.0)), (8, Some(0.0)), (32, Some(25.0))]
        {
            let options = DistanceOptions {
                max_distance,
                prune: true,
                leaf_size,
            };
            let pruned = index::compute_all(&tracers, &spines, &options).expect("pruned");
            assert_eq!(pruned, brute, "round {round}, options {options:?}");
        }
    }
}

#[test]
fn pruning_skips_most_segments_on_large_catalogs() {
    let mut rng = StdRng::seed_from_u64(99);
    let spines: Vec<FilamentSpine> = (0..40).map(|_| random_spine(&mut rng)).collect();
    let tracers: Vec<Point3> = (0..500).map(|_| random_point(&mut rng, 45.0)).collect();

    let index = DistanceIndex::build(spines, DistanceOptions::default()).expect("index");
    let (_, diagnostics) = index.compute_all_with_diagnostics(&tracers).expect("records");

    assert_eq!(diagnostics.tracer_count, 500);
    assert!(diagnostics.bvh_node_count > 0);
    assert!(diagnostics.segments_evaluated < diagnostics.tracer_count * diagnostics.segment_count);
    assert!(diagnostics.pruned_fraction() > 0.5, "{}", diagnostics.summary());
}

#[test]
fn exact_ties_between_filaments_go_to_lower_id() {
    // Mirror images across y = 0, listed in both orders.
    let upper = FilamentSpine::from_coords(&[[-5.0, 3.0, 0.0], [5.0, 3.0, 0.0], [5.0, 8.0, 0.0]])
        .expect("spine");
    let lower = FilamentSpine::from_coords(&[[-5.0, -3.0, 0.0], [5.0, -3.0, 0.0], [5.0, -8.0, 0.0]])
        .expect("spine");
    let tracers: Vec<Point3> = (-4..=4).map(|x| Point3::new(f64::from(x), 0.0, 0.0)).collect();

    for spines in [vec![upper.clone(), lower.clone()], vec![lower, upper]] {
        for prune in [true, false] {
            let records = index::compute_all(
                &tracers,
                &spines,
                &DistanceOptions {
                    prune,
                    ..DistanceOptions::default()
                },
            )
            .expect("records");
            assert!(records.iter().all(|r| r.filament == FilamentId(0)));
            assert!(records.iter().all(|r| r.distance == 3.0));
        }
    }
}

#[test]
fn strictly_nearer_filament_wins() {
    let spines = vec![
        FilamentSpine::from_coords(&[[0.0, 0.0, 0.0], [10.0, 0.0, 0.0]]).expect("spine"),
        FilamentSpine::from_coords(&[[0.0, 4.0, 0.0], [10.0, 4.0, 0.0]]).expect("spine"),
    ];
    let tracers = [
        Point3::new(5.0, 1.9, 0.0),
        Point3::new(5.0, 2.1, 0.0),
        Point3::new(-3.0, 3.0, 0.0),
    ];
    let records =
        index::compute_all(&tracers, &spines, &DistanceOptions::default()).expect("records");
    let ids: Vec<FilamentId> = records.iter().map(|r| r.filament).collect();
    assert_eq!(ids, vec![FilamentId(0), FilamentId(1), FilamentId(1)]);
    assert_eq!(records[2].arc_length, 0.0);
}
