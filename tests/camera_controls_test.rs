use std::f32::consts::FRAC_PI_2;
use std::time::Duration;

use cgmath::{Deg, Point3};
use glance3d::camera::{Camera, CameraUniform, OrbitController, Projection};

const FRAME: Duration = Duration::from_millis(16);

#[test]
fn aspect_matches_mount_dimensions_at_bind_time() {
    let projection = Projection::new(800, 600, Deg(75.0), 0.1, 1000.0);
    assert_eq!(projection.aspect, 800.0 / 600.0);
}

#[test]
fn resize_recomputes_the_aspect_instead_of_keeping_it_stale() {
    let mut projection = Projection::new(800, 600, Deg(75.0), 0.1, 1000.0);
    let before = projection.aspect;

    projection.resize(400, 300);

    // Same value, but freshly derived from the new dimensions
    assert_eq!(projection.aspect, 400.0 / 300.0);
    assert_eq!(projection.aspect.to_bits(), before.to_bits());

    projection.resize(1024, 256);
    assert_eq!(projection.aspect, 4.0);
}

#[test]
fn resizing_twice_with_identical_dimensions_is_a_noop() {
    let mut once = Projection::new(800, 600, Deg(75.0), 0.1, 1000.0);
    once.resize(400, 300);

    let mut twice = Projection::new(800, 600, Deg(75.0), 0.1, 1000.0);
    twice.resize(400, 300);
    twice.resize(400, 300);

    assert_eq!(once.aspect.to_bits(), twice.aspect.to_bits());
    let m_once: [[f32; 4]; 4] = once.matrix().into();
    let m_twice: [[f32; 4]; 4] = twice.matrix().into();
    assert_eq!(m_once, m_twice);
}

#[test]
fn orbit_coordinates_reproduce_the_configured_eye() {
    let camera = Camera::from_eye((1.0, 1.2, 1.2), (0.0, 0.0, 0.0));
    let position = camera.position();
    let expected = Point3::new(1.0, 1.2, 1.2);
    assert!((position.x - expected.x).abs() < 1e-5, "{position:?}");
    assert!((position.y - expected.y).abs() < 1e-5, "{position:?}");
    assert!((position.z - expected.z).abs() < 1e-5, "{position:?}");
}

#[test]
fn update_without_input_leaves_the_camera_untouched() {
    let mut camera = Camera::from_eye((1.0, 1.2, 1.2), (0.0, 0.0, 0.0));
    let mut controller = OrbitController::new(0.03, 1.2);
    let (yaw, pitch, radius) = (camera.yaw, camera.pitch, camera.radius);

    for _ in 0..100 {
        controller.update(&mut camera, FRAME);
    }

    assert_eq!(camera.yaw.0.to_bits(), yaw.0.to_bits());
    assert_eq!(camera.pitch.0.to_bits(), pitch.0.to_bits());
    assert_eq!(camera.radius.to_bits(), radius.to_bits());
}

#[test]
fn drag_input_eases_out_through_damping() {
    let mut camera = Camera::from_eye((1.0, 1.2, 1.2), (0.0, 0.0, 0.0));
    let mut controller = OrbitController::new(0.03, 1.2);
    let initial_yaw = camera.yaw.0;

    controller.handle_mouse(50.0, 0.0);
    controller.update(&mut camera, FRAME);
    let first_delta = camera.yaw.0 - initial_yaw;
    assert!(first_delta > 0.0);

    // With no further input the motion must decay towards a standstill
    let mut last = camera.yaw.0;
    let mut deltas = Vec::new();
    for _ in 0..200 {
        controller.update(&mut camera, FRAME);
        deltas.push(camera.yaw.0 - last);
        last = camera.yaw.0;
    }
    assert!(deltas[0] < first_delta, "no decay between frames");
    assert!(deltas.last().unwrap().abs() < 1e-6, "inertia never settled");
}

#[test]
fn pitch_never_reaches_the_poles() {
    let mut camera = Camera::from_eye((1.0, 1.2, 1.2), (0.0, 0.0, 0.0));
    let mut controller = OrbitController::new(0.03, 1.2);

    for _ in 0..300 {
        controller.handle_mouse(0.0, -1000.0);
        controller.update(&mut camera, FRAME);
    }
    assert!(camera.pitch.0.abs() < FRAC_PI_2);

    for _ in 0..600 {
        controller.handle_mouse(0.0, 1000.0);
        controller.update(&mut camera, FRAME);
    }
    assert!(camera.pitch.0.abs() < FRAC_PI_2);
}

#[test]
fn zoom_keeps_the_radius_strictly_positive() {
    let mut camera = Camera::from_eye((1.0, 1.2, 1.2), (0.0, 0.0, 0.0));
    let mut controller = OrbitController::new(0.03, 1.2);

    for _ in 0..1000 {
        controller.handle_scroll(10.0);
        controller.update(&mut camera, FRAME);
    }
    assert!(camera.radius > 0.0);

    for _ in 0..1000 {
        controller.handle_scroll(-10.0);
        controller.update(&mut camera, FRAME);
    }
    assert!(camera.radius.is_finite());
}

#[test]
fn uniform_carries_the_camera_position() {
    let camera = Camera::from_eye((1.0, 1.2, 1.2), (0.0, 0.0, 0.0));
    let projection = Projection::new(800, 600, Deg(75.0), 0.1, 1000.0);
    let mut uniform = CameraUniform::new();

    uniform.update_view_proj(&camera, &projection);

    let position = camera.position();
    assert!((uniform.view_position[0] - position.x).abs() < 1e-5);
    assert!((uniform.view_position[1] - position.y).abs() < 1e-5);
    assert!((uniform.view_position[2] - position.z).abs() < 1e-5);
}
