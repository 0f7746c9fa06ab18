//! Rendering primitives
//!
//! The orbit camera that produces each frame's pass constants.

pub mod camera;

pub use camera::OrbitCamera;
