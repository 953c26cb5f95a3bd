use std::sync::Arc;

use glance3d::resources::{GltfLoader, decoder::MeshoptDecoder};

mod common;

const TRIANGLE_JSON: &str = r#"{
  "asset": {"version": "2.0"},
  "buffers": [{"byteLength": 56}],
  "bufferViews": [
    {"buffer": 0, "byteOffset": 0, "byteLength": 36},
    {"buffer": 0, "byteOffset": 36, "byteLength": 6},
    {"buffer": 0, "byteOffset": 44, "byteLength": 12}
  ],
  "accessors": [
    {"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]},
    {"bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR"},
    {"bufferView": 2, "componentType": 5123, "count": 3, "type": "VEC2", "normalized": true}
  ],
  "materials": [{"name": "checker", "pbrMetallicRoughness": {"baseColorFactor": [0.5, 0.5, 0.5, 1.0], "metallicFactor": 0.25, "roughnessFactor": 0.75}}],
  "meshes": [{"name": "tri", "primitives": [{"attributes": {"POSITION": 0, "TEXCOORD_0": 2}, "indices": 1, "material": 0}]}],
  "nodes": [{"name": "tri_node", "mesh": 0, "translation": [1.0, 2.0, 3.0]}],
  "scenes": [{"nodes": [0]}],
  "scene": 0
}"#;

fn triangle_bin() -> Vec<u8> {
    let mut bin = Vec::new();
    // Three positions
    for v in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
        for c in v {
            bin.extend_from_slice(&c.to_le_bytes());
        }
    }
    // Indices as u16
    for i in [0u16, 1, 2] {
        bin.extend_from_slice(&i.to_le_bytes());
    }
    // Pad to the 4-aligned texcoord view at offset 44
    bin.extend_from_slice(&[0, 0]);
    // Normalized u16 texcoords
    for uv in [[0u16, 0], [65535, 0], [0, 65535]] {
        for c in uv {
            bin.extend_from_slice(&c.to_le_bytes());
        }
    }
    assert_eq!(bin.len(), 56);
    bin
}

#[tokio::test]
async fn decodes_a_minimal_binary_gltf() {
    let glb = common::mk_glb(TRIANGLE_JSON, &triangle_bin());
    let loader = GltfLoader::new(Arc::new(MeshoptDecoder));

    let model = loader.parse(glb).await.expect("triangle should decode");

    assert_eq!(model.mesh_count(), 1);
    assert_eq!(model.roots.len(), 1);

    let node = &model.roots[0];
    assert_eq!(node.name, "tri_node");
    assert_eq!(node.transform.position, cgmath::Vector3::new(1.0, 2.0, 3.0));

    let mesh = &node.meshes[0];
    assert_eq!(mesh.indices, vec![0, 1, 2]);
    assert_eq!(mesh.vertices.len(), 3);
    assert_eq!(mesh.vertices[1].position, [1.0, 0.0, 0.0]);
    // Quantized texcoords widen back to unit floats
    assert!((mesh.vertices[1].tex_coords[0] - 1.0).abs() < 1e-4);
    assert!((mesh.vertices[2].tex_coords[1] - 1.0).abs() < 1e-4);
    assert_eq!(mesh.material, Some(0));

    let material = &model.materials[0];
    assert_eq!(material.name, "checker");
    assert_eq!(material.base_color, [0.5, 0.5, 0.5, 1.0]);
    assert!((material.metallic - 0.25).abs() < 1e-6);
    assert!((material.roughness - 0.75).abs() < 1e-6);
    assert!(material.diffuse.is_none());
    assert!(material.normal.is_none());
}

#[tokio::test]
async fn missing_model_file_reports_an_error() {
    let loader = GltfLoader::new(Arc::new(MeshoptDecoder));
    let result = loader.load("definitely_missing_model.glb").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn truncated_container_reports_an_error() {
    let loader = GltfLoader::new(Arc::new(MeshoptDecoder));
    let result = loader.parse(b"glTF trash".to_vec()).await;
    assert!(result.is_err());
}
