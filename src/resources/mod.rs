//! Loading of external viewer resources.
//!
//! The loaders run off the render path and produce plain CPU-side data
//! (`ModelData`, decoded images); uploading that data onto the GPU is a
//! separate synchronous step on the event loop thread. Byte fetching is
//! filesystem-based natively and HTTP-based on the web.

use std::{
    io::{BufReader, Cursor},
    sync::Arc,
};

use anyhow::{Context as _, Result};

use crate::{
    data_structures::{
        mesh::{Material, MaterialUniform, Mesh, Model, ModelVertex},
        scene_graph::Node,
        texture::Texture,
        transform::Transform,
    },
    resources::{
        accessor::ViewData,
        decoder::{CompressedView, MeshDecoder},
    },
};

pub mod accessor;
pub mod decoder;

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> reqwest::Url {
    let window = web_sys::window().unwrap();
    let location = window.location();
    let mut origin = location.origin().unwrap();
    if !origin.ends_with("assets") {
        origin = format!("{}/assets", origin);
    }
    let base = reqwest::Url::parse(&format!("{}/", origin,)).unwrap();
    base.join(file_name).unwrap()
}

pub async fn load_binary(file_name: &str) -> Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(file_name);
        reqwest::get(url).await?.bytes().await?.to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        let path = std::path::Path::new("./").join("assets").join(file_name);
        std::fs::read(path)?
    };

    Ok(data)
}

/// A decoded RGBA8 image, ready for upload.
#[derive(Clone, Debug)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl ImageData {
    /// Decode raw image file bytes, with an optional format hint
    /// (file extension style, e.g. "png").
    pub fn decode(bytes: &[u8], format: Option<&str>) -> Result<Self> {
        let img = match format.and_then(image::ImageFormat::from_extension) {
            Some(format) => image::load_from_memory_with_format(bytes, format)?,
            None => image::load_from_memory(bytes)?,
        };
        let rgba = img.to_rgba8();
        let (width, height) = (rgba.width(), rgba.height());
        Ok(Self {
            width,
            height,
            rgba: rgba.into_raw(),
        })
    }
}

#[derive(Clone, Debug)]
pub struct MaterialData {
    pub name: String,
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub diffuse: Option<ImageData>,
    pub normal: Option<ImageData>,
}

#[derive(Clone, Debug)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    pub material: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct NodeData {
    pub name: String,
    pub transform: Transform,
    pub meshes: Vec<MeshData>,
    pub children: Vec<NodeData>,
}

impl NodeData {
    pub fn mesh_count(&self) -> usize {
        self.meshes.len() + self.children.iter().map(NodeData::mesh_count).sum::<usize>()
    }
}

/// A fully decoded model: CPU-side nodes plus the materials they index.
#[derive(Clone, Debug)]
pub struct ModelData {
    pub materials: Vec<MaterialData>,
    pub roots: Vec<NodeData>,
}

impl ModelData {
    pub fn mesh_count(&self) -> usize {
        self.roots.iter().map(NodeData::mesh_count).sum()
    }

    /// Upload the decoded model as an attachable scene subtree.
    pub fn upload(&self, device: &wgpu::Device, queue: &wgpu::Queue, name: &str) -> Node {
        let layout = Material::layout(device);
        let materials: Vec<Material> = if self.materials.is_empty() {
            vec![upload_material(
                device,
                queue,
                &MaterialData {
                    name: "default material".to_string(),
                    base_color: [1.0, 1.0, 1.0, 1.0],
                    metallic: 0.0,
                    roughness: 0.9,
                    diffuse: None,
                    normal: None,
                },
                &layout,
            )]
        } else {
            self.materials
                .iter()
                .map(|data| upload_material(device, queue, data, &layout))
                .collect()
        };

        if let [only] = self.roots.as_slice() {
            return upload_node(device, only, &Transform::new(), &materials);
        }
        let mut root = Node::new(name, Transform::new());
        for data in &self.roots {
            root.add_child(upload_node(device, data, &Transform::new(), &materials));
        }
        root
    }
}

fn upload_material(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    data: &MaterialData,
    layout: &wgpu::BindGroupLayout,
) -> Material {
    let diffuse = match &data.diffuse {
        Some(img) => Texture::from_rgba8(
            device,
            queue,
            img.width,
            img.height,
            &img.rgba,
            true,
            &data.name,
        ),
        None => Texture::create_solid_color([255, 255, 255, 255], device, queue, &data.name),
    };
    let normal = match &data.normal {
        Some(img) => Texture::from_rgba8(
            device,
            queue,
            img.width,
            img.height,
            &img.rgba,
            false,
            &data.name,
        ),
        None => Texture::create_default_normal_map(2, 2, device, queue),
    };
    let uniform = MaterialUniform {
        base_color: data.base_color,
        params: [
            data.metallic,
            data.roughness,
            if data.normal.is_some() { 1.0 } else { 0.0 },
            0.0,
        ],
    };
    Material::new(device, &data.name, diffuse, normal, uniform, layout)
}

fn upload_node(
    device: &wgpu::Device,
    data: &NodeData,
    parent: &Transform,
    materials: &[Material],
) -> Node {
    let world = parent * &data.transform;
    let mut node = Node::new(&data.name, data.transform.clone());
    if !data.meshes.is_empty() {
        let meshes = data
            .meshes
            .iter()
            .map(|mesh| upload_mesh(device, mesh, materials.len()))
            .collect();
        node.attach_model(
            device,
            &world,
            Model {
                meshes,
                materials: materials.to_vec(),
            },
        );
    }
    for child in &data.children {
        node.add_child(upload_node(device, child, &world, materials));
    }
    node
}

fn upload_mesh(device: &wgpu::Device, data: &MeshData, material_count: usize) -> Mesh {
    use wgpu::util::DeviceExt;

    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{:?} Vertex Buffer", data.name)),
        contents: bytemuck::cast_slice(&data.vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{:?} Index Buffer", data.name)),
        contents: bytemuck::cast_slice(&data.indices),
        usage: wgpu::BufferUsages::INDEX,
    });

    Mesh {
        name: data.name.clone(),
        vertex_buffer,
        index_buffer,
        num_elements: data.indices.len() as u32,
        material: data.material.filter(|i| *i < material_count).unwrap_or(0),
    }
}

/// Asynchronous glTF loader with an injected geometry decompression
/// capability for `EXT_meshopt_compression` buffer views.
pub struct GltfLoader {
    decoder: Arc<dyn MeshDecoder + Send + Sync>,
}

impl GltfLoader {
    pub fn new(decoder: Arc<dyn MeshDecoder + Send + Sync>) -> Self {
        Self { decoder }
    }

    /// Fetch and fully decode a (binary) glTF file.
    pub async fn load(&self, file_name: &str) -> Result<ModelData> {
        let bytes = load_binary(file_name).await?;
        self.parse(bytes).await
    }

    /// Decode glTF bytes already in memory.
    pub async fn parse(&self, bytes: Vec<u8>) -> Result<ModelData> {
        let gltf_cursor = Cursor::new(bytes);
        let gltf_reader = BufReader::new(gltf_cursor);
        // Compressed files declare a required extension the base parser does
        // not know, so required-extension validation has to be skipped; the
        // compressed views go through the injected decoder instead.
        let gltf = gltf::Gltf::from_reader_without_validation(gltf_reader)?;

        // Load buffers
        let mut buffer_data: Vec<Vec<u8>> = Vec::new();
        for buffer in gltf.buffers() {
            match buffer.source() {
                gltf::buffer::Source::Bin => {
                    // Only the first buffer maps to the GLB binary chunk;
                    // any other uri-less buffer is a decompression fallback
                    // target that is never read directly.
                    if buffer.index() == 0 {
                        if let Some(blob) = gltf.blob.as_deref() {
                            buffer_data.push(blob.into());
                            continue;
                        }
                    }
                    buffer_data.push(Vec::new());
                }
                gltf::buffer::Source::Uri(uri) => {
                    let bin = load_binary(uri).await?;
                    buffer_data.push(bin);
                }
            }
        }

        let views = materialize_views(&gltf, &buffer_data, self.decoder.as_ref())?;

        // Load materials
        let mut materials = Vec::new();
        for material in gltf.materials() {
            materials.push(load_material(material, &views).await?);
        }

        // Load the node hierarchy
        let mut roots = Vec::new();
        for scene in gltf.scenes() {
            for node in scene.nodes() {
                roots.push(to_node_data(node, &views)?);
            }
        }

        Ok(ModelData { materials, roots })
    }
}

/// Resolve every buffer view into owned bytes, running compressed views
/// through the decompression capability.
fn materialize_views(
    gltf: &gltf::Gltf,
    buffers: &[Vec<u8>],
    decoder: &dyn MeshDecoder,
) -> Result<Vec<ViewData>> {
    let mut out = Vec::new();
    for view in gltf.views() {
        if let Some(ext) = view.extension_value("EXT_meshopt_compression") {
            let compressed = CompressedView::from_extension(ext)?;
            let buffer = buffers
                .get(compressed.buffer)
                .with_context(|| format!("compressed view references missing buffer {}", compressed.buffer))?;
            let source = buffer
                .get(compressed.byte_offset..compressed.byte_offset + compressed.byte_length)
                .context("compressed view out of buffer bounds")?;
            out.push(ViewData {
                bytes: decoder.decode(&compressed, source)?,
                stride: Some(compressed.byte_stride),
            });
        } else {
            let buffer = buffers
                .get(view.buffer().index())
                .with_context(|| format!("view references missing buffer {}", view.buffer().index()))?;
            let bytes = buffer
                .get(view.offset()..view.offset() + view.length())
                .context("buffer view out of buffer bounds")?
                .to_vec();
            out.push(ViewData {
                bytes,
                stride: None,
            });
        }
    }
    Ok(out)
}

async fn load_material(material: gltf::Material<'_>, views: &[ViewData]) -> Result<MaterialData> {
    let name = material
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("material_{}", material.index().unwrap_or(0)));
    let pbr = material.pbr_metallic_roughness();

    let diffuse = match pbr.base_color_texture() {
        Some(info) => Some(load_image(info.texture(), views).await?),
        None => None,
    };
    let normal = match material.normal_texture() {
        Some(info) => Some(load_image(info.texture(), views).await?),
        None => None,
    };

    Ok(MaterialData {
        name,
        base_color: pbr.base_color_factor(),
        metallic: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
        diffuse,
        normal,
    })
}

async fn load_image(texture: gltf::Texture<'_>, views: &[ViewData]) -> Result<ImageData> {
    match texture.source().source() {
        gltf::image::Source::View { view, mime_type } => {
            let data = views
                .get(view.index())
                .with_context(|| format!("image references missing view {}", view.index()))?;
            ImageData::decode(&data.bytes, mime_type.split('/').next_back())
        }
        gltf::image::Source::Uri { uri, mime_type } => {
            let bytes = load_binary(uri).await?;
            ImageData::decode(&bytes, mime_type.and_then(|mt| mt.split('/').next_back()))
        }
    }
}

fn to_node_data(node: gltf::scene::Node<'_>, views: &[ViewData]) -> Result<NodeData> {
    let name = node
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node_{}", node.index()));
    let (position, rotation, scale) = node.transform().decomposed();
    let transform = Transform {
        position: position.into(),
        rotation: rotation.into(),
        scale: scale.into(),
    };

    let meshes = match node.mesh() {
        Some(mesh) => to_mesh_data(mesh, views)?,
        None => Vec::new(),
    };

    let mut children = Vec::new();
    for child in node.children() {
        children.push(to_node_data(child, views)?);
    }

    Ok(NodeData {
        name,
        transform,
        meshes,
        children,
    })
}

fn to_mesh_data(mesh: gltf::Mesh<'_>, views: &[ViewData]) -> Result<Vec<MeshData>> {
    let mesh_name = mesh.name().unwrap_or("unknown_mesh");
    let mut out = Vec::new();

    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            log::warn!(
                "skipping non-triangle primitive {} of mesh {mesh_name}",
                primitive.index()
            );
            continue;
        }
        let Some(position_accessor) = primitive.get(&gltf::Semantic::Positions) else {
            log::warn!(
                "skipping primitive {} of mesh {mesh_name} without positions",
                primitive.index()
            );
            continue;
        };

        let positions = accessor::read_vec3(&position_accessor, views)?;
        let mut vertices: Vec<ModelVertex> = positions
            .into_iter()
            .map(|position| ModelVertex {
                position,
                tex_coords: Default::default(),
                normal: Default::default(),
                tangent: Default::default(),
                bitangent: Default::default(),
            })
            .collect();

        if let Some(acc) = primitive.get(&gltf::Semantic::Normals) {
            for (vertex, normal) in vertices.iter_mut().zip(accessor::read_vec3(&acc, views)?) {
                vertex.normal = normal;
            }
        }
        if let Some(acc) = primitive.get(&gltf::Semantic::TexCoords(0)) {
            for (vertex, tex_coords) in vertices.iter_mut().zip(accessor::read_vec2(&acc, views)?) {
                vertex.tex_coords = tex_coords;
            }
        }
        if let Some(acc) = primitive.get(&gltf::Semantic::Tangents) {
            // glTF tangents are vec4, the 4th component gives the bitangent sign
            for (vertex, tangent) in vertices.iter_mut().zip(accessor::read_vec4(&acc, views)?) {
                let t = cgmath::Vector3::new(tangent[0], tangent[1], tangent[2]);
                let normal: cgmath::Vector3<f32> = vertex.normal.into();
                vertex.tangent = t.into();
                vertex.bitangent = (normal.cross(t) * tangent[3]).into();
            }
        }

        let indices = match primitive.indices() {
            Some(acc) => accessor::read_indices(&acc, views)?,
            None => (0..vertices.len() as u32).collect(),
        };

        out.push(MeshData {
            name: mesh_name.to_string(),
            vertices,
            indices,
            material: primitive.material().index(),
        });
    }

    Ok(out)
}
