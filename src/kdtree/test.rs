use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::SolarRankError;
use crate::kdtree::r#trait::sq_dist;
use crate::kdtree::{
    Neighbor, OwnedSpatialIndex, SpatialIndexBuilder, SpatialIndexRef, SpatialQuery,
    SELF_MATCH_EPSILON_M,
};

fn random_points(n: usize, seed: u64) -> Vec<(f64, f64)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| (rng.gen_range(0.0..1000.0), rng.gen_range(0.0..1000.0)))
        .collect()
}

fn make_index(points: &[(f64, f64)]) -> OwnedSpatialIndex {
    let mut builder = SpatialIndexBuilder::new_with_node_size(points.len(), 10);
    for (x, y) in points {
        builder.add(*x, *y);
    }
    builder.finish()
}

/// All items with distance in `[SELF_MATCH_EPSILON_M, r]`, sorted the way
/// `within` sorts.
fn brute_force_within(points: &[(f64, f64)], qx: f64, qy: f64, r: f64) -> Vec<Neighbor> {
    let eps2 = SELF_MATCH_EPSILON_M * SELF_MATCH_EPSILON_M;
    let mut result: Vec<Neighbor> = points
        .iter()
        .enumerate()
        .filter_map(|(i, (x, y))| {
            let d2 = sq_dist(*x, *y, qx, qy);
            (d2 <= r * r && d2 >= eps2).then(|| Neighbor {
                item: i as u32,
                distance: d2.sqrt(),
            })
        })
        .collect();
    result.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.item.cmp(&b.item))
    });
    result
}

/// First `k` items of the full distance sort, ties by insertion order.
fn brute_force_nearest(points: &[(f64, f64)], qx: f64, qy: f64, k: usize) -> Vec<Neighbor> {
    let mut all: Vec<Neighbor> = points
        .iter()
        .enumerate()
        .map(|(i, (x, y))| Neighbor {
            item: i as u32,
            distance: sq_dist(*x, *y, qx, qy).sqrt(),
        })
        .collect();
    all.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.item.cmp(&b.item))
    });
    all.truncate(k);
    all
}

#[test]
fn within_matches_brute_force() {
    let points = random_points(200, 42);
    let index = make_index(&points);

    let queries = [(500.0, 500.0), (0.0, 0.0), (999.0, 10.0), (250.0, 750.0)];
    for (qx, qy) in queries {
        for r in [0.0, 25.0, 100.0, 400.0, 2000.0] {
            let result = index.within(qx, qy, r).unwrap();
            let expected = brute_force_within(&points, qx, qy, r);
            assert_eq!(result, expected, "query ({qx}, {qy}) radius {r}");
        }
    }
}

#[test]
fn within_is_monotone_in_radius() {
    let points = random_points(150, 7);
    let index = make_index(&points);

    let small: Vec<u32> = index
        .within(400.0, 400.0, 80.0)
        .unwrap()
        .iter()
        .map(|n| n.item)
        .collect();
    let large: Vec<u32> = index
        .within(400.0, 400.0, 200.0)
        .unwrap()
        .iter()
        .map(|n| n.item)
        .collect();
    for item in small {
        assert!(large.contains(&item));
    }
}

#[test]
fn within_excludes_self_match() {
    let points = vec![(10.0, 10.0), (10.5, 10.0), (13.0, 14.0)];
    let index = make_index(&points);

    // the item at the query point and the one half a meter away are
    // duplicates of the query, only the third survives
    let result = index.within(10.0, 10.0, 50.0).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].item, 2);
    assert_eq!(result[0].distance, 5.0);
}

#[test]
fn within_negative_radius_errors() {
    let index = make_index(&random_points(10, 1));
    let err = index.within(0.0, 0.0, -1.0).unwrap_err();
    assert!(matches!(err, SolarRankError::OutOfRangeQuery(_)));
}

#[test]
fn nearest_matches_brute_force() {
    let points = random_points(200, 99);
    let index = make_index(&points);

    let queries = [(500.0, 500.0), (0.0, 0.0), (873.0, 112.0)];
    for (qx, qy) in queries {
        for k in [1, 5, 17, 64, 200] {
            let result = index.nearest(qx, qy, k).unwrap();
            let expected = brute_force_nearest(&points, qx, qy, k);
            assert_eq!(result, expected, "query ({qx}, {qy}) k {k}");
        }
    }
}

#[test]
fn nearest_ties_keep_insertion_order() {
    // four points equidistant from the origin
    let points = vec![(5.0, 0.0), (0.0, 5.0), (-5.0, 0.0), (0.0, -5.0), (20.0, 0.0)];
    let index = make_index(&points);

    let result = index.nearest(0.0, 0.0, 4).unwrap();
    let items: Vec<u32> = result.iter().map(|n| n.item).collect();
    assert_eq!(items, vec![0, 1, 2, 3]);
}

#[test]
fn nearest_k_clamped_to_population() {
    let points = random_points(25, 3);
    let index = make_index(&points);
    let result = index.nearest(100.0, 100.0, 1000).unwrap();
    assert_eq!(result.len(), 25);
}

#[test]
fn nearest_k_zero_errors() {
    let index = make_index(&random_points(10, 5));
    let err = index.nearest(0.0, 0.0, 0).unwrap_err();
    assert!(matches!(err, SolarRankError::OutOfRangeQuery(_)));
}

#[test]
fn empty_index_queries_are_empty() {
    let index = SpatialIndexBuilder::new(0).finish();
    assert!(index.within(0.0, 0.0, 100.0).unwrap().is_empty());
    assert!(index.nearest(0.0, 0.0, 3).unwrap().is_empty());
}

#[test]
fn buffer_round_trip() {
    let points = random_points(120, 11);
    let owned = make_index(&points);
    let expected = owned.within(500.0, 500.0, 300.0).unwrap();

    let buffer = owned.into_inner();
    let view = SpatialIndexRef::try_new(&buffer).unwrap();
    assert_eq!(view.within(500.0, 500.0, 300.0).unwrap(), expected);
}

#[test]
fn rejects_foreign_buffer() {
    let points = random_points(20, 13);
    let mut buffer = make_index(&points).into_inner();
    buffer[0] = 0x00;
    let err = SpatialIndexRef::try_new(&buffer).unwrap_err();
    assert!(matches!(err, SolarRankError::InvalidParameter(_)));
}

#[test]
fn view_agrees_with_owner() {
    let points = random_points(80, 17);
    let owned = make_index(&points);
    let view = owned.as_index_ref();
    assert_eq!(
        owned.nearest(250.0, 250.0, 9).unwrap(),
        view.nearest(250.0, 250.0, 9).unwrap()
    );
}
