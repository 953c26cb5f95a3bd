//! Viewer lifecycle and event loop.
//!
//! This module owns the ordered setup sequence and the steady-state loop:
//!
//! 1. Bind the rendering surface (on the web: locate the mount canvas by id,
//!    aborting everything if it is missing)
//! 2. Create the scene [`Context`] (root, camera, surface, lights)
//! 3. Kick off the two asynchronous resource loads (panorama, model)
//! 4. Start the render loop, which each frame schedules the next frame,
//!    draws, and then advances the orbit controller's damping
//!
//! Loader completions are delivered as [`ViewerEvent`]s on the event loop
//! thread, so scene mutations are serialized with rendering and may arrive
//! in any order. Closing the window (or sending [`ViewerEvent::Exit`])
//! tears the loop down deterministically.

use std::{iter, sync::Arc};

use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::Window,
};

use crate::{
    context::Context,
    data_structures::{
        mesh::{DrawModel, DrawShadow, Material, MaterialUniform, Mesh, Model, ModelVertex},
        scene_graph::Node,
        texture::Texture,
        transform::Transform,
    },
    environment::{EnvironmentMap, load_environment},
    resources::{GltfLoader, ModelData, decoder::MeshoptDecoder},
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Outcome of a failed [`State::render`] call.
enum RenderError {
    /// The surface is lost or outdated and needs to be reconfigured.
    Reconfigure,
    Other(String),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::Reconfigure => write!(f, "surface needs reconfiguring"),
            RenderError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

/// Static configuration of one viewer instance.
#[derive(Clone, Debug)]
pub struct ViewerConfig {
    /// Document id of the mount canvas (web targets only).
    pub mount_id: String,
    /// Equirectangular radiance panorama, relative to the asset root.
    pub environment: Option<String>,
    /// Binary glTF model, relative to the asset root.
    pub model: Option<String>,
    /// Edge length of the reflective ground plane; zero disables it.
    pub floor_size: f32,
    /// Flat colour shown until the panorama is installed.
    pub background: wgpu::Color,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            mount_id: "viewer-canvas".to_string(),
            environment: Some("environment.hdr".to_string()),
            model: Some("model.glb".to_string()),
            floor_size: 10.0,
            background: wgpu::Color::WHITE,
        }
    }
}

/// User events joined onto the event loop thread.
///
/// The loader completions carry explicit results; the scene is only touched
/// here, never from the loader tasks themselves.
#[derive(Debug)]
pub enum ViewerEvent {
    /// Deferred initialization result on platforms that cannot block.
    #[allow(dead_code)]
    Initialized(Box<ViewerState>),
    EnvironmentLoaded(anyhow::Result<EnvironmentMap>),
    ModelLoaded(anyhow::Result<ModelData>),
    Exit,
}

/// Render-loop bookkeeping.
///
/// Every frame first schedules its successor, so after `n` drawn frames
/// `redraws_requested` is `n + 1` (the pending one) relative to loop start.
#[derive(Debug, Default)]
pub struct FrameStats {
    frames_drawn: u64,
    redraws_requested: u64,
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_schedule(&mut self) {
        self.redraws_requested += 1;
    }

    pub fn record_frame(&mut self) {
        self.frames_drawn += 1;
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    pub fn redraws_requested(&self) -> u64 {
        self.redraws_requested
    }
}

/// Application state bundle: scene context, surface status, loop stats.
#[derive(Debug)]
pub struct ViewerState {
    pub(crate) ctx: Context,
    is_surface_configured: bool,
    pub stats: FrameStats,
}

impl ViewerState {
    async fn new(window: Arc<Window>, config: &ViewerConfig) -> Self {
        let ctx = Context::new(window, config.background).await;
        let mut ctx = match ctx {
            Ok(ctx) => ctx,
            Err(e) => panic!(
                "App initialization failed. Cannot create the main context: {}",
                e
            ),
        };
        if config.floor_size > 0.0 {
            let floor = mk_floor(&ctx.device, &ctx.queue, config.floor_size);
            ctx.scene.attach(floor);
        }
        Self {
            ctx,
            is_surface_configured: false,
            stats: FrameStats::new(),
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.is_surface_configured = true;
            self.ctx.resize(width, height);
        }
    }

    fn render(&mut self) -> Result<(), RenderError> {
        // The next frame is scheduled before this one is drawn
        self.ctx.window.request_redraw();
        self.stats.record_schedule();

        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }

        let output = match self.ctx.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(tex)
            | wgpu::CurrentSurfaceTexture::Suboptimal(tex) => tex,
            wgpu::CurrentSurfaceTexture::Timeout | wgpu::CurrentSurfaceTexture::Occluded => {
                return Ok(());
            }
            wgpu::CurrentSurfaceTexture::Lost => return Err(RenderError::Reconfigure),
            wgpu::CurrentSurfaceTexture::Outdated => return Err(RenderError::Reconfigure),
            wgpu::CurrentSurfaceTexture::Validation => {
                return Err(RenderError::Other("surface validation error".to_string()));
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder: wgpu::CommandEncoder =
            self.ctx
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Render Encoder"),
                });

        let items = self.ctx.scene.draw_items();

        if !items.is_empty() {
            let mut shadow_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.light.shadow_map.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });
            shadow_pass.set_pipeline(&self.ctx.light.shadow_pipeline);
            for item in &items {
                shadow_pass.draw_model_shadow(
                    item.model,
                    item.instance_buffer,
                    &self.ctx.light.shadow_bind_group,
                );
            }
        }

        {
            let clear_colour = self.ctx.scene.background.unwrap_or(wgpu::Color::BLACK);
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.ctx.msaa_target.view,
                    resolve_target: Some(&view),
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });

            if self.ctx.environment.is_installed() {
                render_pass.set_pipeline(&self.ctx.pipelines.environment);
                render_pass.set_bind_group(0, &self.ctx.camera.bind_group, &[]);
                render_pass.set_bind_group(1, &self.ctx.environment.bind_group, &[]);
                render_pass.draw(0..3, 0..1);
            }

            render_pass.set_pipeline(&self.ctx.pipelines.model);
            for item in &items {
                render_pass.draw_model(
                    item.model,
                    item.instance_buffer,
                    &self.ctx.camera.bind_group,
                    &self.ctx.light.bind_group,
                    &self.ctx.environment.bind_group,
                );
            }
        }

        self.ctx.queue.submit(iter::once(encoder.finish()));
        output.present();
        self.stats.record_frame();
        Ok(())
    }

    /// Advance the orbit controller's damping and push the camera uniform.
    /// Runs once per frame, after the draw was encoded.
    fn update(&mut self, dt: Duration) {
        let camera = &mut self.ctx.camera;
        camera.controller.update(&mut camera.camera, dt);
        camera
            .uniform
            .update_view_proj(&camera.camera, &self.ctx.projection);
        self.ctx.queue.write_buffer(
            &camera.buffer,
            0,
            bytemuck::cast_slice(&[camera.uniform]),
        );
    }
}

pub struct App {
    config: ViewerConfig,
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<ViewerEvent>,
    state: Option<ViewerState>,
    last_time: Instant,
}

impl App {
    fn new(event_loop: &EventLoop<ViewerEvent>, config: ViewerConfig) -> Self {
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = tokio::runtime::Runtime::new().unwrap();
        Self {
            config,
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            proxy,
            state: None,
            last_time: Instant::now(),
        }
    }

    /// Kick off the configured resource loads. Fire-and-forget: each task
    /// reports back exactly once through the event loop proxy and is never
    /// retried or cancelled.
    fn spawn_loads(&self) {
        if let Some(file) = self.config.environment.clone() {
            let proxy = self.proxy.clone();
            let fut = async move {
                let result = load_environment(&file).await;
                if proxy
                    .send_event(ViewerEvent::EnvironmentLoaded(result))
                    .is_err()
                {
                    log::warn!("viewer exited before the environment load completed");
                }
            };
            #[cfg(not(target_arch = "wasm32"))]
            self.async_runtime.spawn(fut);
            #[cfg(target_arch = "wasm32")]
            wasm_bindgen_futures::spawn_local(fut);
        }

        if let Some(file) = self.config.model.clone() {
            let proxy = self.proxy.clone();
            let fut = async move {
                // The decompression capability is injected at construction
                let loader = GltfLoader::new(Arc::new(MeshoptDecoder));
                let result = loader.load(&file).await;
                if proxy.send_event(ViewerEvent::ModelLoaded(result)).is_err() {
                    log::warn!("viewer exited before the model load completed");
                }
            };
            #[cfg(not(target_arch = "wasm32"))]
            self.async_runtime.spawn(fut);
            #[cfg(target_arch = "wasm32")]
            wasm_bindgen_futures::spawn_local(fut);
        }
    }
}

impl ApplicationHandler<ViewerEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title("glance3d");

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            let window = wgpu::web_sys::window().unwrap_throw();
            let document = window.document().unwrap_throw();
            // Fatal precondition: without the mount element there is no
            // surface, no scene and no loop
            let Some(canvas) = document.get_element_by_id(&self.config.mount_id) else {
                log::error!(
                    "mount element \"{}\" not found, viewer setup aborted",
                    self.config.mount_id
                );
                event_loop.exit();
                return;
            };
            let html_canvas_element = canvas.unchecked_into();
            window_attributes = window_attributes.with_canvas(Some(html_canvas_element));
        }

        let window = Arc::new(event_loop.create_window(window_attributes).unwrap());

        #[cfg(not(target_arch = "wasm32"))]
        {
            let mut state = self
                .async_runtime
                .block_on(ViewerState::new(window, &self.config));
            let size = state.ctx.window.inner_size();
            state.resize(size.width, size.height);
            // The render loop starts exactly once, right after setup
            state.ctx.window.request_redraw();
            state.stats.record_schedule();
            self.state = Some(state);
            self.last_time = Instant::now();
            self.spawn_loads();
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            let config = self.config.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let state = ViewerState::new(window, &config).await;
                assert!(
                    proxy
                        .send_event(ViewerEvent::Initialized(Box::new(state)))
                        .is_ok()
                );
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Initialized(state) => {
                // This is the message from our wasm `spawn_local`
                self.state = Some(*state);
                let state = self.state.as_mut().unwrap();
                let size = state.ctx.window.inner_size();
                state.resize(size.width, size.height);
                state.ctx.window.request_redraw();
                state.stats.record_schedule();
                self.last_time = Instant::now();
                self.spawn_loads();
            }
            ViewerEvent::EnvironmentLoaded(result) => {
                let Some(state) = &mut self.state else { return };
                match result {
                    Ok(map) => {
                        state.ctx.install_environment(map);
                        log::info!("environment map installed");
                    }
                    // Not fatal: the scene keeps its flat background
                    Err(e) => log::error!("environment load error: {e:?}"),
                }
            }
            ViewerEvent::ModelLoaded(result) => {
                let Some(state) = &mut self.state else { return };
                match result {
                    Ok(data) => {
                        let meshes = data.mesh_count();
                        let node = data.upload(&state.ctx.device, &state.ctx.queue, "model");
                        state.ctx.scene.attach(node);
                        log::info!("model loaded ({meshes} meshes)");
                    }
                    // Not fatal: the scene stays without the asset
                    Err(e) => log::error!("model load error: {e:?}"),
                }
            }
            ViewerEvent::Exit => event_loop.exit(),
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            if state.ctx.camera.controller.is_dragging() {
                state.ctx.camera.controller.handle_mouse(dx, dy);
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };

        state.ctx.camera.controller.handle_window_events(&event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();

                match state.render() {
                    Ok(_) => state.update(dt),
                    // Reconfigure the surface if it's lost or outdated
                    Err(RenderError::Reconfigure) => {
                        let size = state.ctx.window.inner_size();
                        state.resize(size.width, size.height);
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Run a viewer with the given configuration until its window closes.
pub fn run(config: ViewerConfig) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info).unwrap_throw();
    }

    let event_loop: EventLoop<ViewerEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, config);
    event_loop.run_app(&mut app)?;

    Ok(())
}

/// The mirror-like ground plane under the model; it is the shadow receiver.
fn mk_floor(device: &wgpu::Device, queue: &wgpu::Queue, size: f32) -> Node {
    use wgpu::util::DeviceExt;

    let half = size / 2.0;
    let up = [0.0, 1.0, 0.0];
    let tangent = [1.0, 0.0, 0.0];
    let bitangent = [0.0, 0.0, -1.0];
    let vertices = [
        ModelVertex {
            position: [-half, 0.0, -half],
            tex_coords: [0.0, 0.0],
            normal: up,
            tangent,
            bitangent,
        },
        ModelVertex {
            position: [half, 0.0, -half],
            tex_coords: [1.0, 0.0],
            normal: up,
            tangent,
            bitangent,
        },
        ModelVertex {
            position: [half, 0.0, half],
            tex_coords: [1.0, 1.0],
            normal: up,
            tangent,
            bitangent,
        },
        ModelVertex {
            position: [-half, 0.0, half],
            tex_coords: [0.0, 1.0],
            normal: up,
            tangent,
            bitangent,
        },
    ];
    let indices: [u32; 6] = [0, 2, 1, 0, 3, 2];

    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("floor Vertex Buffer"),
        contents: bytemuck::cast_slice(&vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("floor Index Buffer"),
        contents: bytemuck::cast_slice(&indices),
        usage: wgpu::BufferUsages::INDEX,
    });
    let mesh = Mesh {
        name: "floor".to_string(),
        vertex_buffer,
        index_buffer,
        num_elements: indices.len() as u32,
        material: 0,
    };

    let layout = Material::layout(device);
    let material = Material::new(
        device,
        "floor",
        Texture::create_solid_color([255, 255, 255, 255], device, queue, "floor diffuse"),
        Texture::create_default_normal_map(2, 2, device, queue),
        MaterialUniform {
            base_color: [1.0, 1.0, 1.0, 1.0],
            params: [0.9, 0.1, 0.0, 0.0],
        },
        &layout,
    );

    let local = Transform::from(cgmath::Vector3::new(0.0, -5.0, 0.0));
    let mut node = Node::new("floor", local.clone());
    node.attach_model(
        device,
        &local,
        Model {
            meshes: vec![mesh],
            materials: vec![material],
        },
    );
    node
}
