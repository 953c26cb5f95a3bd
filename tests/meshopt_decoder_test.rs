use glance3d::resources::decoder::{
    CompressedView, CompressionFilter, CompressionMode, MeshDecoder, MeshoptDecoder,
};
use serde_json::json;

#[test]
fn parses_the_compression_extension() {
    let ext = json!({
        "buffer": 1,
        "byteOffset": 8,
        "byteLength": 100,
        "byteStride": 12,
        "count": 10,
        "mode": "ATTRIBUTES",
        "filter": "OCTAHEDRAL"
    });

    let view = CompressedView::from_extension(&ext).unwrap();
    assert_eq!(view.buffer, 1);
    assert_eq!(view.byte_offset, 8);
    assert_eq!(view.byte_length, 100);
    assert_eq!(view.byte_stride, 12);
    assert_eq!(view.count, 10);
    assert_eq!(view.mode, CompressionMode::Attributes);
    assert_eq!(view.filter, CompressionFilter::Octahedral);
    assert_eq!(view.decoded_len(), 120);
}

#[test]
fn offset_and_filter_are_optional() {
    let ext = json!({
        "buffer": 0,
        "byteLength": 6,
        "byteStride": 2,
        "count": 3,
        "mode": "TRIANGLES"
    });

    let view = CompressedView::from_extension(&ext).unwrap();
    assert_eq!(view.byte_offset, 0);
    assert_eq!(view.filter, CompressionFilter::None);
    assert_eq!(view.mode, CompressionMode::Triangles);
}

#[test]
fn a_view_without_mode_is_rejected() {
    let ext = json!({
        "buffer": 0,
        "byteLength": 6,
        "byteStride": 2,
        "count": 3
    });
    assert!(CompressedView::from_extension(&ext).is_err());
}

#[test]
fn a_corrupt_stream_is_rejected() {
    let view = CompressedView {
        buffer: 0,
        byte_offset: 0,
        byte_length: 4,
        byte_stride: 12,
        count: 2,
        mode: CompressionMode::Attributes,
        filter: CompressionFilter::None,
    };

    // Far too short to be a valid meshopt vertex stream
    let result = MeshoptDecoder.decode(&view, &[0x17, 0x2a, 0x00, 0x00]);
    assert!(result.is_err());
}
