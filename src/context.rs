//! Central scene context.
//!
//! [`Context`] is created exactly once per viewer instance and owns the
//! surface binding, the GPU device and queue, the camera and light
//! resources, the render pipelines, the environment slot and the scene
//! root. It is passed explicitly to every component instead of living in
//! globals, so several viewers can coexist and tests can drive one in
//! isolation.

use std::sync::Arc;

use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    camera::{self, CameraResources, CameraUniform},
    data_structures::{scene_graph::Scene, texture::Texture},
    environment::{Environment, EnvironmentMap},
    pipelines::{
        environment::mk_environment_pipeline, light::LightResources, model::mk_model_pipeline,
    },
};

/// Fixed multisample count of the main color target.
pub const MSAA_SAMPLES: u32 = 4;

#[derive(Debug)]
pub struct Pipelines {
    pub model: wgpu::RenderPipeline,
    pub environment: wgpu::RenderPipeline,
}

#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: Texture,
    pub(crate) msaa_target: Texture,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub camera: CameraResources,
    pub projection: camera::Projection,
    pub light: LightResources,
    pub environment: Environment,
    pub pipelines: Pipelines,
    pub scene: Scene,
}

impl Context {
    pub async fn new(window: Arc<Window>, background: wgpu::Color) -> anyhow::Result<Self> {
        let size = window.inner_size();

        // The instance is a handle to our GPU
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
                // WebGL doesn't support all of wgpu's features, so if
                // we're building for the web we'll have to disable some.
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // The shaders assume an Srgb surface texture; on a non-Srgb surface
        // the colors would come out darker.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        // A short orbit: slightly above and beside the origin, looking at it
        let camera = camera::Camera::from_eye((1.0, 1.2, 1.2), (0.0, 0.0, 0.0));
        let projection = camera::Projection::new(
            config.width.max(1),
            config.height.max(1),
            cgmath::Deg(75.0),
            0.1,
            1000.0,
        );
        let camera_controller = camera::OrbitController::new(0.03, 1.2);

        let mut camera_uniform = CameraUniform::new();
        camera_uniform.update_view_proj(&camera, &projection);

        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[camera_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let camera_bind_group_layout = camera::mk_bind_group_layout(&device);

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        let camera = CameraResources {
            camera,
            controller: camera_controller,
            uniform: camera_uniform,
            buffer: camera_buffer,
            bind_group: camera_bind_group,
            bind_group_layout: camera_bind_group_layout,
        };

        let depth_texture = Texture::create_depth_texture(
            &device,
            [config.width, config.height],
            MSAA_SAMPLES,
            "depth_texture",
        );
        let msaa_target = Texture::create_msaa_target(
            &device,
            [config.width, config.height],
            config.format,
            MSAA_SAMPLES,
        );

        let light = LightResources::new(&device);
        let environment = Environment::placeholder(&device, &queue);

        let pipelines = Pipelines {
            model: mk_model_pipeline(
                &device,
                &config,
                &camera.bind_group_layout,
                &light.bind_group_layout,
                &environment.bind_group_layout,
                MSAA_SAMPLES,
            ),
            environment: mk_environment_pipeline(
                &device,
                &config,
                &camera.bind_group_layout,
                &environment.bind_group_layout,
                MSAA_SAMPLES,
            ),
        };

        let scene = Scene::new(background);

        Ok(Self {
            window,
            depth_texture,
            msaa_target,
            surface,
            device,
            queue,
            config,
            camera,
            projection,
            light,
            environment,
            pipelines,
            scene,
        })
    }

    /// Resize the surface binding and recompute the projection.
    ///
    /// Safe to call repeatedly with identical dimensions; the result only
    /// depends on the latest width/height.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width;
        self.config.height = height;
        self.projection.resize(width, height);
        self.surface.configure(&self.device, &self.config);
        self.depth_texture = Texture::create_depth_texture(
            &self.device,
            [self.config.width, self.config.height],
            MSAA_SAMPLES,
            "depth_texture",
        );
        self.msaa_target = Texture::create_msaa_target(
            &self.device,
            [self.config.width, self.config.height],
            self.config.format,
            MSAA_SAMPLES,
        );
    }

    /// Install a decoded panorama as ambient lighting and background.
    pub fn install_environment(&mut self, map: EnvironmentMap) {
        self.environment.install(&self.device, &self.queue, map);
        if self.environment.is_installed() {
            self.scene.clear_background();
        }
    }
}
