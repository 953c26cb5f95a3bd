use glance3d::viewer::{FrameStats, ViewerConfig};

#[test]
fn every_frame_leaves_exactly_one_redraw_pending() {
    let mut stats = FrameStats::new();

    // Loop start schedules the first frame
    stats.record_schedule();

    for n in 1..=240u64 {
        // Each frame schedules its successor before drawing
        stats.record_schedule();
        stats.record_frame();

        assert_eq!(stats.frames_drawn(), n);
        assert_eq!(stats.redraws_requested(), n + 1);
    }
}

#[test]
fn no_frames_are_drawn_before_the_loop_starts() {
    let stats = FrameStats::new();
    assert_eq!(stats.frames_drawn(), 0);
    assert_eq!(stats.redraws_requested(), 0);
}

#[test]
fn default_config_points_at_both_resources() {
    let config = ViewerConfig::default();
    assert!(!config.mount_id.is_empty());
    assert!(config.environment.is_some());
    assert!(config.model.is_some());
    assert!(config.floor_size > 0.0);
    // The flat background stays white until the panorama lands
    assert_eq!(config.background, wgpu::Color::WHITE);
}
