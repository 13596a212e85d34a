//! Spatial index build, query, chunked iteration, and staleness tests.

use hspc::{
    index::{IndexParams, SpatialIndex},
    Bounds, Header, Point, PointFormat, Reader, Writer,
};
use std::{collections::BTreeSet, io::Cursor, sync::Arc};

/// Writes a `width` x `height` integer grid; point id is `x * height + y`.
fn grid_file(width: u32, height: u32) -> Cursor<Vec<u8>> {
    let header = Header::new(PointFormat::new(0).unwrap());
    let mut writer = Writer::new(Cursor::new(Vec::new()), header).unwrap();
    let header: Arc<Header> = writer.header().clone().into();
    let mut point = Point::new(header);
    for x in 0..width {
        for y in 0..height {
            point
                .set_coordinates(f64::from(x), f64::from(y), 0.)
                .unwrap();
            writer.write_point(&mut point).unwrap();
        }
    }
    writer.into_inner().unwrap()
}

fn brute_force_grid(width: u32, height: u32, query: &Bounds) -> BTreeSet<u32> {
    let mut ids = BTreeSet::new();
    for x in 0..width {
        for y in 0..height {
            if query.contains(f64::from(x), f64::from(y), 0.) {
                let _ = ids.insert(x * height + y);
            }
        }
    }
    ids
}

#[test]
fn grid_query_matches_brute_force() {
    let reader = Reader::new(grid_file(100, 100)).unwrap();
    let mut index = SpatialIndex::build(reader, &IndexParams::default()).unwrap();
    let query = Bounds::new(20.5, 20.5, -1., 40.5, 40.5, 1.);
    let mut ids = index.query(&query).unwrap();
    ids.sort_unstable();
    let expected: Vec<u32> = brute_force_grid(100, 100, &query).into_iter().collect();
    assert_eq!(400, expected.len());
    assert_eq!(expected, ids);
}

#[test]
fn query_at_the_extents() {
    let reader = Reader::new(grid_file(30, 30)).unwrap();
    let mut index = SpatialIndex::build(reader, &IndexParams::default()).unwrap();
    let query = Bounds::new(0., 0., -1., 29., 29., 1.);
    let ids = index.query(&query).unwrap();
    assert_eq!(900, ids.len());
}

#[test]
fn tiny_memory_budget_spills_to_temp_file() {
    // scattered points break every run, so the in-memory window overflows
    // the minimum budget and pass one must flush mid-stream
    let position = |i: u32| (f64::from(i * 37 % 100), f64::from(i * 53 % 100));
    let header = Header::new(PointFormat::new(0).unwrap());
    let mut writer = Writer::new(Cursor::new(Vec::new()), header).unwrap();
    let shared: Arc<Header> = writer.header().clone().into();
    let mut point = Point::new(shared);
    for i in 0..20_000u32 {
        let (x, y) = position(i);
        point.set_coordinates(x, y, 0.).unwrap();
        writer.write_point(&mut point).unwrap();
    }
    let reader = Reader::new(writer.into_inner().unwrap()).unwrap();
    let params = IndexParams {
        max_memory: 1, // clamped to the minimum
        ..Default::default()
    };
    let mut index = SpatialIndex::build(reader, &params).unwrap();

    let query = Bounds::new(10.5, 10.5, -1., 39.5, 39.5, 1.);
    let mut ids = index.query(&query).unwrap();
    ids.sort_unstable();
    let expected: Vec<u32> = (0..20_000u32)
        .filter(|&i| {
            let (x, y) = position(i);
            query.contains(x, y, 0.)
        })
        .collect();
    assert!(!expected.is_empty());
    assert_eq!(expected, ids);
}

#[test]
fn chunked_iteration() {
    let reader = Reader::new(grid_file(100, 100)).unwrap();
    let mut index = SpatialIndex::build(reader, &IndexParams::default()).unwrap();
    // x in 10..=44, y in 0..=9: 350 conforming points
    let query = Bounds::new(9.5, -0.5, -1., 44.5, 9.5, 1.);

    let mut all = Vec::new();
    {
        let mut iterator = index.iter(query, 100);
        for expected in [100, 100, 100, 50, 0] {
            let chunk = iterator.next_chunk().unwrap();
            assert_eq!(expected, chunk.len());
            all.extend_from_slice(chunk);
        }
    }
    let mut sorted = all.clone();
    sorted.sort_unstable();
    let expected: Vec<u32> = brute_force_grid(100, 100, &query).into_iter().collect();
    assert_eq!(expected, sorted);

    // replay to the 251st conforming point
    let mut iterator = index.iter(query, 100);
    let _ = iterator.next_chunk().unwrap();
    let _ = iterator.next_chunk().unwrap();
    let _ = iterator.next_chunk().unwrap();
    let _ = iterator.next_chunk().unwrap();
    let tail = iterator.at(250).unwrap().to_vec();
    assert_eq!(all[250..350].to_vec(), tail);
}

#[test]
fn z_binning_splits_tall_cells() {
    let header = Header::new(PointFormat::new(0).unwrap());
    let mut writer = Writer::new(Cursor::new(Vec::new()), header).unwrap();
    let shared: Arc<Header> = writer.header().clone().into();
    let mut point = Point::new(shared);
    // a column of points spread over z
    for x in 0..50 {
        for z in 0..40 {
            point
                .set_coordinates(f64::from(x), f64::from(x % 7), f64::from(z))
                .unwrap();
            writer.write_point(&mut point).unwrap();
        }
    }
    let reader = Reader::new(writer.into_inner().unwrap()).unwrap();
    let params = IndexParams {
        cell_size_z: 5.,
        ..Default::default()
    };
    let mut index = SpatialIndex::build(reader, &params).unwrap();
    let (_, _, cells_z) = index.cell_counts();
    assert!(cells_z > 1);

    let query = Bounds::new(-1., -1., 10.5, 60., 60., 20.5);
    let mut ids = index.query(&query).unwrap();
    ids.sort_unstable();
    let expected: Vec<u32> = (0..50)
        .flat_map(|x| (11..=20).map(move |z| x * 40 + z))
        .collect();
    assert_eq!(expected, ids);
}

#[test]
fn overfilled_cells_subdivide_and_stay_complete() {
    // a dense cluster lands 4,000 points in one cell, forcing quadrant
    // subdivision, while a sparse backdrop keeps the extents wide
    let mut positions: Vec<(f64, f64)> = Vec::new();
    for i in 0..1000u32 {
        positions.push((f64::from(i * 97 % 1000) / 10., f64::from(i * 31 % 1000) / 10.));
    }
    for i in 0..4000u32 {
        positions.push((
            40. + f64::from(i % 64) / 64.,
            40. + f64::from(i / 64) / 64.,
        ));
    }

    let header = Header::new(PointFormat::new(0).unwrap());
    let mut writer = Writer::new(Cursor::new(Vec::new()), header).unwrap();
    let shared: Arc<Header> = writer.header().clone().into();
    let mut point = Point::new(shared);
    for &(x, y) in &positions {
        point.set_coordinates(x, y, 0.).unwrap();
        writer.write_point(&mut point).unwrap();
    }
    let reader = Reader::new(writer.into_inner().unwrap()).unwrap();
    let mut index = SpatialIndex::build(reader, &IndexParams::default()).unwrap();

    let query = Bounds::new(40.2, 40.2, -1., 40.7, 40.7, 1.);
    let mut ids = index.query(&query).unwrap();
    ids.sort_unstable();
    let expected: Vec<u32> = positions
        .iter()
        .enumerate()
        .filter(|(_, &(x, y))| query.contains(x, y, 0.))
        .map(|(i, _)| i as u32)
        .collect();
    assert!(!expected.is_empty());
    assert_eq!(expected, ids);
}

#[test]
fn standalone_index_save_load_and_staleness() {
    let path = std::env::temp_dir().join(format!(
        "hspc-index-test-{}.hsx",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);

    let reader = Reader::new(grid_file(40, 40)).unwrap();
    let index = SpatialIndex::build(reader, &IndexParams::default()).unwrap();
    assert!(index.validate());
    index.save(&path).unwrap();

    // reload against the same file
    let reader = Reader::new(grid_file(40, 40)).unwrap();
    let params = IndexParams {
        read_only: true,
        ..Default::default()
    };
    let mut loaded = SpatialIndex::load(reader, &path, &params).unwrap();
    let query = Bounds::new(4.5, 4.5, -1., 9.5, 9.5, 1.);
    assert_eq!(25, loaded.query(&query).unwrap().len());

    // the file grows by one point: the stored index is stale
    let reader = Reader::new(grid_file(40, 41)).unwrap();
    assert!(matches!(
        SpatialIndex::load(reader, &path, &params),
        Err(hspc::Error::StaleIndex)
    ));

    // without read-only the index is rebuilt and usable again
    let reader = Reader::new(grid_file(40, 41)).unwrap();
    let mut rebuilt = SpatialIndex::load(reader, &path, &IndexParams::default()).unwrap();
    assert!(rebuilt.validate());
    assert_eq!(25, rebuilt.query(&query).unwrap().len());

    let _ = std::fs::remove_file(&path);
}

#[test]
fn embedded_index_round_trip() {
    let reader = Reader::new(grid_file(20, 20)).unwrap();
    let mut index = SpatialIndex::build(reader, &IndexParams::default()).unwrap();
    let embedded = index.save_embedded(Cursor::new(Vec::new())).unwrap();

    let mut loaded = SpatialIndex::load_embedded(embedded).unwrap();
    let query = Bounds::new(0.5, 0.5, -1., 10.5, 10.5, 1.);
    let mut ids = loaded.query(&query).unwrap();
    ids.sort_unstable();
    let expected: Vec<u32> = brute_force_grid(20, 20, &query).into_iter().collect();
    assert_eq!(expected, ids);
}
