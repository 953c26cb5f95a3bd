//! The fixed light rig and its shadow pass.
//!
//! One ambient and one shadow-casting directional light, constructed once
//! during context setup and never mutated afterwards. The directional light
//! renders the scene into a fixed-size depth map from an orthographic
//! light-space projection; the model shader samples that map with a
//! comparison sampler and a small PCF kernel.

use cgmath::{Matrix4, Point3, Vector3};
use wgpu::util::DeviceExt;

use crate::{
    camera::OPENGL_TO_WGPU_MATRIX,
    data_structures::{
        mesh::{ModelVertex, Vertex},
        texture::Texture,
        transform::TransformRaw,
    },
};

/// Shadow map resolution, fixed at rig construction.
pub const SHADOW_MAP_SIZE: u32 = 1024;

/// Half-extent of the orthographic light frustum around the scene origin.
const SHADOW_EXTENT: f32 = 12.0;
const SHADOW_NEAR: f32 = 0.1;
const SHADOW_FAR: f32 = 50.0;

/// Uniform ambient fill light.
#[derive(Clone, Debug)]
pub struct AmbientLight {
    pub color: [f32; 3],
    pub intensity: f32,
}

/// Parallel-ray light shining from `position` towards the scene origin.
#[derive(Clone, Debug)]
pub struct DirectionalLight {
    pub color: [f32; 3],
    pub intensity: f32,
    pub position: Point3<f32>,
}

/// Light data in the layout the shaders expect.
///
/// The color vectors carry their intensity in the `w` component.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    pub ambient: [f32; 4],
    pub sun: [f32; 4],
    pub position: [f32; 4],
    pub view_proj: [[f32; 4]; 4],
}

/// The light rig bundled with its GPU resources.
#[derive(Debug)]
pub struct LightResources {
    pub ambient: AmbientLight,
    pub directional: DirectionalLight,
    pub uniform: LightUniform,
    pub buffer: wgpu::Buffer,
    pub shadow_map: Texture,
    pub shadow_pipeline: wgpu::RenderPipeline,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
    /// Uniform-only group for the depth pass, which must not bind the map
    /// it is rendering into.
    pub shadow_bind_group: wgpu::BindGroup,
}

impl LightResources {
    /// Build the fixed rig: white ambient and white directional at low
    /// intensity, the sun placed at (5, 10, 5) and casting shadows.
    pub fn new(device: &wgpu::Device) -> Self {
        let ambient = AmbientLight {
            color: [1.0, 1.0, 1.0],
            intensity: 0.2,
        };
        let directional = DirectionalLight {
            color: [1.0, 1.0, 1.0],
            intensity: 0.2,
            position: Point3::new(5.0, 10.0, 5.0),
        };

        let uniform = LightUniform {
            ambient: [ambient.color[0], ambient.color[1], ambient.color[2], ambient.intensity],
            sun: [
                directional.color[0],
                directional.color[1],
                directional.color[2],
                directional.intensity,
            ],
            position: [
                directional.position.x,
                directional.position.y,
                directional.position.z,
                1.0,
            ],
            view_proj: light_view_proj(directional.position).into(),
        };

        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Light Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let shadow_map = Texture::create_depth_texture(
            device,
            [SHADOW_MAP_SIZE, SHADOW_MAP_SIZE],
            1,
            "shadow_map",
        );

        let bind_group_layout = mk_bind_group_layout(device);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&shadow_map.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(
                        shadow_map.sampler.as_ref().expect("shadow sampler"),
                    ),
                },
            ],
            label: Some("light_bind_group"),
        });

        let shadow_bind_group_layout = mk_shadow_bind_group_layout(device);
        let shadow_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &shadow_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("shadow_bind_group"),
        });
        let shadow_pipeline = mk_shadow_pipeline(device, &shadow_bind_group_layout);

        Self {
            ambient,
            directional,
            uniform,
            buffer,
            shadow_map,
            shadow_pipeline,
            bind_group,
            bind_group_layout,
            shadow_bind_group,
        }
    }
}

/// Orthographic light-space projection looking from the sun towards origin.
pub fn light_view_proj(position: Point3<f32>) -> Matrix4<f32> {
    let view = Matrix4::look_at_rh(position, Point3::new(0.0, 0.0, 0.0), Vector3::unit_y());
    let proj = cgmath::ortho(
        -SHADOW_EXTENT,
        SHADOW_EXTENT,
        -SHADOW_EXTENT,
        SHADOW_EXTENT,
        SHADOW_NEAR,
        SHADOW_FAR,
    );
    OPENGL_TO_WGPU_MATRIX * proj * view
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Depth,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                count: None,
            },
        ],
        label: Some("light_bind_group_layout"),
    })
}

pub fn mk_shadow_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("shadow_bind_group_layout"),
    })
}

/// Depth-only pipeline rendering the scene from the light's point of view.
fn mk_shadow_pipeline(
    device: &wgpu::Device,
    shadow_bind_group_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Shadow Pipeline Layout"),
        bind_group_layouts: &[Some(shadow_bind_group_layout)],
        immediate_size: 0,
    });
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Shadow Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shadow.wgsl").into()),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some("Shadow Pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[ModelVertex::desc(), TransformRaw::desc()],
            compilation_options: Default::default(),
        },
        // Depth-only: no color target, no fragment stage
        fragment: None,
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: Some(wgpu::Face::Back),
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: Texture::DEPTH_FORMAT,
            depth_write_enabled: Some(true),
            depth_compare: Some(wgpu::CompareFunction::Less),
            stencil: wgpu::StencilState::default(),
            // Constant + slope bias keeps the receivers free of acne
            bias: wgpu::DepthBiasState {
                constant: 2,
                slope_scale: 2.0,
                clamp: 0.0,
            },
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview_mask: None,
    })
}
