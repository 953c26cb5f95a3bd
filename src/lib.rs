//! glance3d
//!
//! A minimal cross-platform 3D scene viewer for native and WASM targets.
//! It binds a rendering surface, asynchronously loads an equirectangular
//! radiance panorama and a (possibly meshopt-compressed) binary glTF model,
//! and runs a perpetual render loop behind an orbit camera with inertia.
//! The crate is a small library plus a thin binary; everything is driven
//! through an explicit scene context so multiple viewers can coexist.
//!
//! High-level modules
//! - `camera`: orbit camera, projection and damping controller
//! - `context`: central scene context that owns device/queue/pipelines
//! - `data_structures`: viewer data models (meshes, textures, scene graph)
//! - `environment`: equirectangular radiance map loading and installation
//! - `pipelines`: definitions for the render pipelines (model, environment, shadow)
//! - `resources`: helpers to fetch and decode panoramas and glTF models
//! - `viewer`: the application lifecycle (surface binding, loads, render loop)
//!

pub mod camera;
pub mod context;
pub mod data_structures;
pub mod environment;
pub mod pipelines;
pub mod resources;
pub mod viewer;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;
pub use wgpu::*;
pub use winit::dpi::PhysicalPosition;
pub use winit::event::DeviceEvent;
pub use winit::event::WindowEvent;
