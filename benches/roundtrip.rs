use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hspc::{
    field::DataType, schema::BandDesc, Header, Point, PointFormat, Reader, Writer,
};
use std::{io::Cursor, sync::Arc};

fn roundtrip(npoints: usize, nbands: usize) {
    let mut header = Header::new(PointFormat::new(2).unwrap());
    header
        .schema_mut()
        .add_bands(&BandDesc::new(DataType::Short, "Band Value", ""), nbands)
        .unwrap();
    let mut writer = Writer::new(Cursor::new(Vec::new()), header).unwrap();
    let shared: Arc<Header> = writer.header().clone().into();
    let mut point = Point::new(shared);
    for i in 0..npoints {
        point
            .set_coordinates(i as f64, i as f64, i as f64)
            .unwrap();
        writer.write_point(&mut point).unwrap();
    }
    let mut reader = Reader::new(writer.into_inner().unwrap()).unwrap();
    while reader.read_next_point(false).unwrap() {
        let _ = reader.point().x();
    }
}

fn bench(criterion: &mut Criterion) {
    for npoints in [0, 10, 100, 1000] {
        let _ = criterion.bench_function(&format!("roundtrip {} points", npoints), |b| {
            b.iter(|| roundtrip(black_box(npoints), black_box(16)))
        });
    }
}

criterion_group!(benches, bench);
criterion_main!(benches);
