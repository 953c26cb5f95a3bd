//! Equirectangular radiance environment.
//!
//! The panorama is decoded off the render path into an [`EnvironmentMap`]
//! (linear RGBA32F pixels) and installed at most once into the GPU-side
//! [`Environment`]. Until installation the bind group points at a neutral
//! 1x1 placeholder and the shaders see `installed = 0`, so the flat
//! background colour stays visible. Installation rotates the panorama by a
//! fixed yaw of half a turn.

use std::f32::consts::PI;

use wgpu::util::DeviceExt;

use crate::{data_structures::texture::Texture, resources::load_binary};

/// Fixed angular offset applied to the installed panorama.
pub const YAW_OFFSET: f32 = PI;

/// A decoded panorama: linear RGBA32F pixels in equirectangular layout.
#[derive(Clone, Debug)]
pub struct EnvironmentMap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<f32>,
}

impl EnvironmentMap {
    /// Decode panorama bytes (Radiance HDR and the other formats the image
    /// stack knows) into linear floating point pixels.
    pub fn decode(bytes: &[u8]) -> anyhow::Result<Self> {
        let img = image::load_from_memory(bytes)?;
        let rgba = img.to_rgba32f();
        let (width, height) = (rgba.width(), rgba.height());
        Ok(Self {
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }
}

/// Fetch and decode the panorama resource.
pub async fn load_environment(file_name: &str) -> anyhow::Result<EnvironmentMap> {
    let bytes = load_binary(file_name).await?;
    EnvironmentMap::decode(&bytes)
}

/// Environment data in the layout the shaders expect.
///
/// `params` packs `[yaw offset, installed flag, intensity, unused]`.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct EnvironmentUniform {
    pub params: [f32; 4],
}

/// GPU half of the environment: texture, uniform and bind group.
#[derive(Debug)]
pub struct Environment {
    texture: Texture,
    uniform: EnvironmentUniform,
    buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
    installed: bool,
}

impl Environment {
    pub fn layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        // RGBA32F is not filterable without extra features
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
            label: Some("environment_bind_group_layout"),
        })
    }

    /// Create the uninstalled placeholder environment.
    pub fn placeholder(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let texture = mk_radiance_texture(
            device,
            queue,
            1,
            1,
            &[1.0, 1.0, 1.0, 1.0],
            "environment placeholder",
        );
        let uniform = EnvironmentUniform {
            params: [YAW_OFFSET, 0.0, 1.0, 0.0],
        };
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Environment Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group_layout = Self::layout(device);
        let bind_group = mk_bind_group(device, &bind_group_layout, &texture, &buffer);

        Self {
            texture,
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
            installed: false,
        }
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Install a decoded panorama. At most one installation takes effect;
    /// later calls are ignored with a warning.
    pub fn install(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, map: EnvironmentMap) {
        if self.installed {
            log::warn!("environment map already installed, ignoring a second one");
            return;
        }
        self.texture = mk_radiance_texture(
            device,
            queue,
            map.width,
            map.height,
            &map.pixels,
            "environment map",
        );
        self.uniform.params[1] = 1.0;
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
        self.bind_group = mk_bind_group(device, &self.bind_group_layout, &self.texture, &self.buffer);
        self.installed = true;
    }
}

fn mk_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    texture: &Texture,
    buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(
                    texture.sampler.as_ref().expect("environment sampler"),
                ),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: buffer.as_entire_binding(),
            },
        ],
        label: Some("environment_bind_group"),
    })
}

fn mk_radiance_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    width: u32,
    height: u32,
    pixels: &[f32],
    label: &str,
) -> Texture {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba32Float,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            aspect: wgpu::TextureAspect::All,
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
        },
        bytemuck::cast_slice(pixels),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(16 * width),
            rows_per_image: Some(height),
        },
        size,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    // Horizontal wrap keeps the seam continuous; nearest because RGBA32F
    // cannot be linearly filtered on the baseline feature set
    let sampler = Some(device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Nearest,
        min_filter: wgpu::FilterMode::Nearest,
        mipmap_filter: wgpu::MipmapFilterMode::Nearest,
        ..Default::default()
    }));

    Texture {
        texture,
        view,
        sampler,
    }
}
