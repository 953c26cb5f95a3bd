//! Orbit camera, projection and input controller.
//!
//! The camera orbits a focus point: its state is a target, a yaw/pitch pair
//! and a radius. [`OrbitController`] turns pointer input into orbit deltas
//! with inertia (damping) and must be advanced exactly once per frame via
//! [`OrbitController::update`]. [`Projection`] owns the perspective
//! parameters and is resized by the surface, never by the controller.

use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, Rad, SquareMatrix, Vector3};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Keep the pitch strictly off the poles so the view basis stays well-defined.
const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

/// A camera orbiting around a focus point.
#[derive(Clone, Debug)]
pub struct Camera {
    pub target: Point3<f32>,
    pub yaw: Rad<f32>,
    pub pitch: Rad<f32>,
    pub radius: f32,
}

impl Camera {
    /// Create a camera from an explicit eye position looking at `target`.
    ///
    /// The eye is converted into orbit coordinates, so subsequent controller
    /// input continues smoothly from the given viewpoint.
    pub fn from_eye<E: Into<Point3<f32>>, T: Into<Point3<f32>>>(eye: E, target: T) -> Self {
        let target = target.into();
        let offset = eye.into() - target;
        let radius = offset.magnitude().max(f32::EPSILON);
        Self {
            target,
            yaw: Rad(offset.z.atan2(offset.x)),
            pitch: Rad((offset.y / radius).clamp(-1.0, 1.0).asin()),
            radius,
        }
    }

    pub fn position(&self) -> Point3<f32> {
        let (sin_pitch, cos_pitch) = self.pitch.0.sin_cos();
        let (sin_yaw, cos_yaw) = self.yaw.0.sin_cos();
        self.target
            + Vector3::new(
                self.radius * cos_pitch * cos_yaw,
                self.radius * sin_pitch,
                self.radius * cos_pitch * sin_yaw,
            )
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position(), self.target, Vector3::unit_y())
    }
}

/// Perspective projection parameters, resized together with the surface.
#[derive(Clone, Debug)]
pub struct Projection {
    pub aspect: f32,
    pub fovy: Rad<f32>,
    pub znear: f32,
    pub zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    /// Recompute the aspect ratio from the current surface dimensions.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height as f32;
    }

    pub fn matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * cgmath::perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

/// Camera data in the layout the shaders expect.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_position: [f32; 4],
    pub view_proj: [[f32; 4]; 4],
    // The background pass unprojects NDC corners back into world rays.
    pub inv_view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
            inv_view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        let view_proj = projection.matrix() * camera.view_matrix();
        self.view_position = camera.position().to_homogeneous().into();
        self.view_proj = view_proj.into();
        self.inv_view_proj = view_proj
            .invert()
            .unwrap_or_else(Matrix4::identity)
            .into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// Orbit-style input controller with inertia.
///
/// Dragging with the left mouse button rotates the camera around its target,
/// the scroll wheel zooms. Input accumulates into angular/zoom velocities
/// that decay exponentially, so motion eases out after the pointer stops.
#[derive(Debug)]
pub struct OrbitController {
    rotate_speed: f32,
    zoom_speed: f32,
    /// Exponential decay rate of the velocities, per second.
    damping: f32,
    min_radius: f32,
    max_radius: f32,
    yaw_velocity: f32,
    pitch_velocity: f32,
    zoom_velocity: f32,
    dragging: bool,
}

impl OrbitController {
    pub fn new(rotate_speed: f32, zoom_speed: f32) -> Self {
        Self {
            rotate_speed,
            zoom_speed,
            damping: 8.0,
            min_radius: 0.2,
            max_radius: 200.0,
            yaw_velocity: 0.0,
            pitch_velocity: 0.0,
            zoom_velocity: 0.0,
            dragging: false,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Feed a raw pointer delta while a drag is in progress.
    pub fn handle_mouse(&mut self, dx: f64, dy: f64) {
        self.yaw_velocity += dx as f32 * self.rotate_speed;
        self.pitch_velocity += dy as f32 * self.rotate_speed;
    }

    /// Feed a scroll step; positive values zoom in.
    pub fn handle_scroll(&mut self, amount: f32) {
        self.zoom_velocity += amount * self.zoom_speed;
    }

    /// Track drag state and zoom input from window events.
    pub fn handle_window_events(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.dragging = *state == ElementState::Pressed;
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let amount = match delta {
                    MouseScrollDelta::LineDelta(_, rows) => *rows,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 50.0,
                };
                self.handle_scroll(amount);
            }
            _ => (),
        }
    }

    /// Integrate accumulated input into the camera. Call once per frame.
    pub fn update(&mut self, camera: &mut Camera, dt: instant::Duration) {
        let dt = dt.as_secs_f32();

        camera.yaw += Rad(self.yaw_velocity * dt);
        camera.pitch = Rad((camera.pitch.0 - self.pitch_velocity * dt).clamp(-PITCH_LIMIT, PITCH_LIMIT));
        camera.radius =
            (camera.radius * (1.0 - self.zoom_velocity * dt)).clamp(self.min_radius, self.max_radius);

        let decay = (-self.damping * dt).exp();
        self.yaw_velocity *= decay;
        self.pitch_velocity *= decay;
        self.zoom_velocity *= decay;
    }
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("camera_bind_group_layout"),
    })
}

/// Camera state bundled with its GPU resources.
#[derive(Debug)]
pub struct CameraResources {
    pub camera: Camera,
    pub controller: OrbitController,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}
