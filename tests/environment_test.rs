use glance3d::environment::{EnvironmentMap, YAW_OFFSET};

#[test]
fn decodes_a_radiance_pixel_to_linear_floats() {
    let mut bytes = b"#?RADIANCE\nFORMAT=32-bit_rle_rgbe\n\n-Y 1 +X 1\n".to_vec();
    // RGBE (128, 128, 128, 129) is 1.0 per channel
    bytes.extend_from_slice(&[128, 128, 128, 129]);

    let map = EnvironmentMap::decode(&bytes).expect("radiance pixel should decode");

    assert_eq!(map.width, 1);
    assert_eq!(map.height, 1);
    assert_eq!(map.pixels.len(), 4);
    for channel in &map.pixels[..3] {
        assert!((channel - 1.0).abs() < 2e-2, "channel {channel} not linear 1.0");
    }
    assert_eq!(map.pixels[3], 1.0);
}

#[test]
fn rejects_bytes_that_are_no_image() {
    assert!(EnvironmentMap::decode(b"not a panorama at all").is_err());
}

#[test]
fn the_panorama_is_rotated_by_half_a_turn() {
    assert_eq!(YAW_OFFSET, std::f32::consts::PI);
}
