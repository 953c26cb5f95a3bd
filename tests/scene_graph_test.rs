use cgmath::{Deg, Quaternion, Rotation3, Vector3};
use glance3d::data_structures::{
    scene_graph::{Node, Scene},
    transform::Transform,
};

fn container(name: &str) -> Node {
    Node::new(name, Transform::new())
}

#[test]
fn attaching_and_background_clearing_commute() {
    // Environment-then-model
    let mut first = Scene::new(wgpu::Color::WHITE);
    first.clear_background();
    first.attach(container("model"));

    // Model-then-environment
    let mut second = Scene::new(wgpu::Color::WHITE);
    second.attach(container("model"));
    second.clear_background();

    assert_eq!(first.child_count(), second.child_count());
    assert_eq!(first.background, second.background);
    assert_eq!(first.background, None);
    let names_first: Vec<_> = first.children().iter().map(|n| n.name.clone()).collect();
    let names_second: Vec<_> = second.children().iter().map(|n| n.name.clone()).collect();
    assert_eq!(names_first, names_second);
}

#[test]
fn attach_is_a_single_child_addition() {
    let mut scene = Scene::new(wgpu::Color::WHITE);
    assert_eq!(scene.child_count(), 0);

    scene.attach(container("floor"));
    assert_eq!(scene.child_count(), 1);

    let mut model = container("model");
    model.add_child(container("wheel"));
    model.add_child(container("body"));
    scene.attach(model);

    // The subtree arrives whole, as one child of the root
    assert_eq!(scene.child_count(), 2);
    assert_eq!(scene.children()[1].children.len(), 2);
}

#[test]
fn a_scene_without_loaded_content_stays_empty() {
    // The model-load failure branch never attaches anything
    let scene = Scene::new(wgpu::Color::WHITE);
    assert_eq!(scene.child_count(), 0);
    assert_eq!(scene.mesh_count(), 0);
    assert!(scene.draw_items().is_empty());
    assert_eq!(scene.background, Some(wgpu::Color::WHITE));
}

#[test]
fn container_nodes_produce_no_draw_items() {
    let mut scene = Scene::new(wgpu::Color::WHITE);
    let mut group = container("group");
    group.add_child(container("inner"));
    scene.attach(group);

    assert!(scene.draw_items().is_empty());
    assert_eq!(scene.mesh_count(), 0);
}

#[test]
fn transform_composition_applies_parent_translation() {
    let parent = Transform::from(Vector3::new(1.0, 0.0, 0.0));
    let child = Transform::from(Vector3::new(0.0, 1.0, 0.0));

    let world = &parent * &child;
    assert_eq!(world.position, Vector3::new(1.0, 1.0, 0.0));
}

#[test]
fn transform_composition_scales_child_offsets() {
    let parent = Transform {
        position: Vector3::new(0.0, 0.0, 0.0),
        rotation: Quaternion::from_angle_y(Deg(0.0)),
        scale: Vector3::new(2.0, 2.0, 2.0),
    };
    let child = Transform::from(Vector3::new(1.0, 0.0, 0.0));

    let world = &parent * &child;
    assert!((world.position.x - 2.0).abs() < 1e-6);
    assert_eq!(world.scale, Vector3::new(2.0, 2.0, 2.0));
}

#[test]
fn identity_transform_matrix_is_identity() {
    let matrix: [[f32; 4]; 4] = Transform::new().to_matrix().into();
    let expected: [[f32; 4]; 4] = cgmath::Matrix4::from_scale(1.0f32).into();
    assert_eq!(matrix, expected);
}
