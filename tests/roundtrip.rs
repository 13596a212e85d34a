//! Write-read round trips for headers, bands, waveforms, and in-place
//! updates.

use byteorder::{ByteOrder, LittleEndian};
use hspc::{
    field::DataType,
    schema::BandDesc,
    waveform::{WaveformPacketDataDefinition, WaveformPacketDesc, WaveformPacketRecord},
    Field, FieldId, Header, Point, PointFormat, Reader, Updater, Variant, Writer,
};
use std::{io::Cursor, sync::Arc};

fn band_file() -> (Cursor<Vec<u8>>, u64) {
    let mut header = Header::new(PointFormat::new(5).unwrap());
    header
        .schema_mut()
        .add_bands(&BandDesc::new(DataType::Short, "Band Value", ""), 3)
        .unwrap();
    header.add_waveform_packet_desc(WaveformPacketDesc::new(0, 8, 0, 128, 10, 1., 0.));
    header.set_number_of_point_records(1);

    let mut writer = Writer::new(Cursor::new(Vec::new()), header).unwrap();
    let header: Arc<Header> = writer.header().clone().into();
    let record_length = header.data_record_length() as u64;

    let mut point = Point::new(header);
    point.set_coordinates(10., 20., 30.).unwrap();

    let mut record = WaveformPacketRecord::default();
    record.add_raw_packet(
        WaveformPacketDataDefinition {
            band_index: 0,
            descriptor_index: 0,
            ..Default::default()
        },
        vec![23; 128],
    );
    point.set_waveform_data(&record);

    let bands = [1000i16, 5000, 123];
    let mut bytes = [0u8; 6];
    for (i, &band) in bands.iter().enumerate() {
        LittleEndian::write_i16(&mut bytes[i * 2..], band);
    }
    point.set_band_values(0, 3, &bytes).unwrap();

    writer.write_point(&mut point).unwrap();
    (writer.into_inner().unwrap(), record_length)
}

#[test]
fn write_bands_and_waveform_then_read_back() {
    let (cursor, record_length) = band_file();
    let mut reader = Reader::new(cursor).unwrap();
    let header = reader.header();

    // record length is the format 5 base plus three i16 bands
    let base = header.schema().base_byte_size() as u64;
    assert_eq!(base + 6, record_length);
    assert_eq!(1, header.number_of_point_records());
    assert_eq!(1, header.waveform_descriptors().len());
    assert_eq!(128, header.waveform_descriptors()[0].samples);

    // the file holds the header, one record, and the waveform payload
    let header_size = header.header_size() as u64;
    let payload_size = 2 + 28 + 128;
    assert!(reader.read_next_point(true).unwrap());
    let point = reader.point();
    assert_eq!(
        header_size + record_length + payload_size,
        point.waveform_data_byte_offset().unwrap() + u64::from(point.waveform_data_size().unwrap())
    );

    assert!((point.x() - 10.).abs() < 1e-9);
    assert!((point.y() - 20.).abs() < 1e-9);
    assert!((point.z() - 30.).abs() < 1e-9);

    let mut bands = [0u8; 6];
    point.band_values(0, 3, &mut bands).unwrap();
    assert_eq!(1000, LittleEndian::read_i16(&bands[0..2]));
    assert_eq!(5000, LittleEndian::read_i16(&bands[2..4]));
    assert_eq!(123, LittleEndian::read_i16(&bands[4..6]));

    let packet = point.raw_waveform_packet_data(0).unwrap();
    assert_eq!(vec![23u8; 128], packet);

    assert!(!reader.read_next_point(true).unwrap());
}

#[test]
fn update_classification_then_reopen() {
    let (mut cursor, _) = band_file();
    cursor.set_position(0);

    let mut updater = Updater::new(cursor).unwrap();
    updater.seek(0).unwrap();
    updater
        .write_field_values_by_id(FieldId::Classification, &[Variant::from(2u8)])
        .unwrap();
    let point = updater.read_point_at(0, false).unwrap();
    let values = point.values_by_id(FieldId::Classification).unwrap();
    assert_eq!(Some(2u8), values[0].get());

    // waveform survives the in-place update
    let point = updater.read_point_at(0, true).unwrap();
    assert_eq!(vec![23u8; 128], point.raw_waveform_packet_data(0).unwrap());
}

#[test]
fn format_zero_record_is_twelve_bytes() {
    let header = Header::new(PointFormat::new(0).unwrap());
    assert_eq!(12, header.data_record_length());
}

#[test]
fn shared_byte_bit_fields_round_trip_full_ranges() {
    let mut header = Header::new(PointFormat::new(0).unwrap());
    let mut three = Field::new(FieldId::Unknown, "three", DataType::Bit, 3).unwrap();
    three.numeric = true;
    three.integer = true;
    header.schema_mut().add_field(three);
    let mut five = Field::new(FieldId::Unknown, "five", DataType::Bit, 5).unwrap();
    five.numeric = true;
    five.integer = true;
    header.schema_mut().add_field(five);
    assert_eq!(13, header.data_record_length());

    let header = Arc::new(header);
    for a in 0u8..8 {
        for b in 0u8..32 {
            let mut point = Point::new(header.clone());
            point.set_value(3, &Variant::from(a)).unwrap();
            point.set_value(4, &Variant::from(b)).unwrap();
            assert_eq!(Some(u64::from(a)), point.value(3).unwrap().get());
            assert_eq!(Some(u64::from(b)), point.value(4).unwrap().get());
            // writing one field again must not disturb the other
            point.set_value(3, &Variant::from(7 - a)).unwrap();
            assert_eq!(Some(u64::from(b)), point.value(4).unwrap().get());
        }
    }
}

#[test]
fn headers_differing_in_return_counts_are_compatible() {
    let mut a = Header::new(PointFormat::new(2).unwrap());
    let mut b = Header::new(PointFormat::new(2).unwrap());
    a.set_return_count(4);
    b.set_return_count(4);
    a.set_point_records_by_return(0, 10).unwrap();
    b.set_point_records_by_return(0, 99).unwrap();
    assert!(a.is_compatible(&b));

    b.add_waveform_packet_desc(WaveformPacketDesc::default());
    assert!(!a.is_compatible(&b));
}

#[test]
fn header_serialization_round_trip_matches_data_offset() {
    let mut header = Header::new(PointFormat::new(8).unwrap());
    header
        .schema_mut()
        .add_bands(&BandDesc::new(DataType::Float, "Band Value", ""), 2)
        .unwrap();
    header.set_return_count(2);
    header.update_header();
    let mut bytes = Vec::new();
    header.write_to(&mut bytes).unwrap();
    assert_eq!(header.point_data_offset(), bytes.len() as u64);
    let read = Header::read_from(bytes.as_slice()).unwrap();
    assert_eq!(header, read);
}

#[test]
fn scaled_write_read_is_exact_over_raw_range() {
    let mut header = Header::new(PointFormat::new(0).unwrap());
    header.set_scale(0.01, 0.01, 0.01);
    header.set_offset(-100., 0., 50.);
    let header = Arc::new(header);
    let mut point = Point::new(header.clone());
    for raw in [-100_000, -1, 0, 1, 99_999] {
        point.set_raw_x(raw);
        let x = point.x();
        point.set_x(x).unwrap();
        assert_eq!(raw, point.raw_x());
    }
}

#[test]
fn multiple_points_stream_in_order() {
    let mut header = Header::new(PointFormat::new(2).unwrap());
    header
        .schema_mut()
        .add_bands(&BandDesc::new(DataType::UnsignedShort, "Band Value", ""), 8)
        .unwrap();
    let mut writer = Writer::new(Cursor::new(Vec::new()), header).unwrap();
    let header: Arc<Header> = writer.header().clone().into();
    for i in 0..10u16 {
        let mut point = Point::new(header.clone());
        point
            .set_coordinates(f64::from(i), 0., f64::from(i) * 0.5)
            .unwrap();
        let values: Vec<Variant> = (0..8).map(|b| Variant::from(i * 10 + b)).collect();
        point.set_values_by_id(FieldId::BandValue, &values).unwrap();
        point
            .set_values_by_id(FieldId::GnssTime, &[Variant::from(f64::from(i) * 0.001)])
            .unwrap();
        writer.write_point(&mut point).unwrap();
    }
    let mut reader = Reader::new(writer.into_inner().unwrap()).unwrap();
    assert_eq!(10, reader.header().number_of_point_records());
    let mut i = 0u16;
    while reader.read_next_point(false).unwrap() {
        let point = reader.point();
        assert!((point.x() - f64::from(i)).abs() < 1e-9);
        let values = point.values_by_id(FieldId::BandValue).unwrap();
        assert_eq!(8, values.len());
        assert_eq!(Some(i * 10 + 3), values[3].get());
        i += 1;
    }
    assert_eq!(10, i);
}
