//! Render pipeline definitions.
//!
//! - `model` draws textured, lit and shadowed scene meshes
//! - `environment` draws the equirectangular panorama background
//! - `light` owns the light rig and the shadow depth pass

pub mod environment;
pub mod light;
pub mod model;
