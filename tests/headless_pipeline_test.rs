//! GPU-dependent checks, gated like the other heavyweight tests so plain
//! `cargo test` stays runnable on machines without an adapter.
#![cfg(feature = "integration-tests")]

use std::time::Duration;

use futures::executor::block_on;
use glance3d::{
    camera,
    context::MSAA_SAMPLES,
    environment::Environment,
    pipelines::{
        environment::mk_environment_pipeline, light::LightResources, model::mk_model_pipeline,
    },
};

fn mk_device() -> (wgpu::Device, wgpu::Queue) {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let adapter = block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::default(),
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .expect("no adapter available");
    block_on(adapter.request_device(&wgpu::DeviceDescriptor::default())).expect("no device")
}

fn surface_config() -> wgpu::SurfaceConfiguration {
    wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        width: 256,
        height: 256,
        present_mode: wgpu::PresentMode::Fifo,
        alpha_mode: wgpu::CompositeAlphaMode::Opaque,
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    }
}

#[test]
fn render_pipelines_pass_validation() {
    let (device, queue) = mk_device();

    let camera_layout = camera::mk_bind_group_layout(&device);
    // Building the rig also builds and validates the shadow pipeline
    let light = LightResources::new(&device);
    let environment = Environment::placeholder(&device, &queue);
    let config = surface_config();

    let _model = mk_model_pipeline(
        &device,
        &config,
        &camera_layout,
        &light.bind_group_layout,
        &environment.bind_group_layout,
        MSAA_SAMPLES,
    );
    let _background = mk_environment_pipeline(
        &device,
        &config,
        &camera_layout,
        &environment.bind_group_layout,
        MSAA_SAMPLES,
    );

    device
        .poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: Some(Duration::from_secs(3)),
        })
        .unwrap();
}

#[test]
fn clear_pass_fills_the_target_with_the_background() {
    let (device, queue) = mk_device();
    let size = 64u32;

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("readback target"),
        size: wgpu::Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: None,
        size: (size * size * 4) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
    {
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::WHITE),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
    }
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(size * 4),
                rows_per_image: Some(size),
            },
        },
        wgpu::Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = buffer.slice(..);
    let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        tx.send(result).unwrap();
    });
    device
        .poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: Some(Duration::from_secs(3)),
        })
        .unwrap();
    block_on(rx.receive()).unwrap().unwrap();

    let data = slice.get_mapped_range();
    for pixel in data.chunks_exact(4) {
        assert_eq!(pixel, [255, 255, 255, 255]);
    }
}
