//! Constant records uploaded to GPU-readable memory
//!
//! Every record is a plain `#[repr(C)]` value with no implicit padding so it
//! can be copied byte-for-byte into an upload pool. Inside a pool each record
//! occupies `constant_buffer_byte_size(size_of::<T>())` bytes, and slot `k`
//! starts at `k * rounded_size`.

use crate::foundation::math::{to_gpu_matrix, Mat4};

/// Minimum constant buffer alignment of the hardware this pipeline targets
pub const MIN_CONSTANT_ALIGNMENT: usize = 256;

/// Directional lights a light record can hold
pub const MAX_DIRECTIONAL_LIGHTS: usize = 4;

/// Point lights a light record can hold
pub const MAX_POINT_LIGHTS: usize = 8;

/// Spot lights a light record can hold
pub const MAX_SPOT_LIGHTS: usize = 4;

/// Round `byte_size` up to a multiple of `alignment` (a power of two)
pub const fn align_to(byte_size: usize, alignment: usize) -> usize {
    (byte_size + alignment - 1) & !(alignment - 1)
}

/// Round `byte_size` up to the 256-byte constant alignment
pub const fn constant_buffer_byte_size(byte_size: usize) -> usize {
    align_to(byte_size, MIN_CONSTANT_ALIGNMENT)
}

/// Which pool a record lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstantKind {
    /// Per render item
    Object,
    /// Per frame camera/pass data
    Pass,
    /// Per material
    Material,
    /// Per frame lighting
    Light,
}

/// A fixed-size value type that can live in a constant upload pool
pub trait ConstantRecord: bytemuck::Pod {
    /// Pool kind this record belongs to
    const KIND: ConstantKind;

    /// Unpadded byte size
    fn byte_size() -> usize {
        std::mem::size_of::<Self>()
    }
}

/// Per render item constants
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectConstants {
    /// Object to world matrix, column-major
    pub world: [[f32; 4]; 4],
}

impl ObjectConstants {
    /// Build from a world matrix
    pub fn from_world(world: &Mat4) -> Self {
        Self {
            world: to_gpu_matrix(world),
        }
    }
}

impl Default for ObjectConstants {
    fn default() -> Self {
        Self::from_world(&Mat4::identity())
    }
}

unsafe impl bytemuck::Pod for ObjectConstants {}
unsafe impl bytemuck::Zeroable for ObjectConstants {}

impl ConstantRecord for ObjectConstants {
    const KIND: ConstantKind = ConstantKind::Object;
}

/// Per frame camera and timing constants
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassConstants {
    /// World to view
    pub view: [[f32; 4]; 4],
    /// View to world
    pub inv_view: [[f32; 4]; 4],
    /// View to clip
    pub proj: [[f32; 4]; 4],
    /// Clip to view
    pub inv_proj: [[f32; 4]; 4],
    /// World to clip
    pub view_proj: [[f32; 4]; 4],
    /// Clip to world
    pub inv_view_proj: [[f32; 4]; 4],
    /// Camera position in world space
    pub eye_position: [f32; 3],
    /// Padding
    pub _pad0: f32,
    /// Render target size in pixels
    pub render_target_size: [f32; 2],
    /// Reciprocal render target size
    pub inv_render_target_size: [f32; 2],
    /// Near clip plane
    pub near_z: f32,
    /// Far clip plane
    pub far_z: f32,
    /// Seconds since start
    pub total_time: f32,
    /// Seconds since previous frame
    pub delta_time: f32,
}

impl Default for PassConstants {
    fn default() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

unsafe impl bytemuck::Pod for PassConstants {}
unsafe impl bytemuck::Zeroable for PassConstants {}

impl ConstantRecord for PassConstants {
    const KIND: ConstantKind = ConstantKind::Pass;
}

/// Per material constants
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialConstants {
    /// Diffuse albedo, RGB + alpha
    pub albedo: [f32; 4],
    /// Specular color
    pub specular: [f32; 3],
    /// Surface roughness in [0, 1]
    pub roughness: f32,
    /// Ambient color
    pub ambient: [f32; 3],
    /// Index of refraction
    pub refraction: f32,
    /// 1 when the material samples a texture
    pub has_texture: u32,
    /// Texture slot when `has_texture` is 1
    pub texture_index: u32,
    /// Padding
    pub _pad: [u32; 2],
}

impl Default for MaterialConstants {
    fn default() -> Self {
        Self {
            albedo: [1.0, 1.0, 1.0, 1.0],
            specular: [0.01, 0.01, 0.01],
            roughness: 0.25,
            ambient: [0.0, 0.0, 0.0],
            refraction: 1.0,
            has_texture: 0,
            texture_index: 0,
            _pad: [0; 2],
        }
    }
}

unsafe impl bytemuck::Pod for MaterialConstants {}
unsafe impl bytemuck::Zeroable for MaterialConstants {}

impl ConstantRecord for MaterialConstants {
    const KIND: ConstantKind = ConstantKind::Material;
}

/// One light in the shader's light arrays
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightData {
    /// Light color times intensity
    pub strength: [f32; 3],
    /// Distance where attenuation starts (point/spot)
    pub falloff_start: f32,
    /// Direction the light travels (directional/spot)
    pub direction: [f32; 3],
    /// Distance where the light reaches zero (point/spot)
    pub falloff_end: f32,
    /// Position in world space (point/spot)
    pub position: [f32; 3],
    /// Spot cone exponent
    pub spot_power: f32,
}

impl Default for LightData {
    fn default() -> Self {
        Self {
            strength: [0.5, 0.5, 0.5],
            falloff_start: 1.0,
            direction: [0.0, -1.0, 0.0],
            falloff_end: 10.0,
            position: [0.0, 0.0, 0.0],
            spot_power: 64.0,
        }
    }
}

unsafe impl bytemuck::Pod for LightData {}
unsafe impl bytemuck::Zeroable for LightData {}

/// Per frame lighting constants
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightConstants {
    /// Ambient light term
    pub ambient: [f32; 4],
    /// Active directional lights
    pub directional_count: u32,
    /// Active point lights
    pub point_count: u32,
    /// Active spot lights
    pub spot_count: u32,
    /// Padding
    pub _pad: u32,
    /// Directional lights
    pub directional: [LightData; MAX_DIRECTIONAL_LIGHTS],
    /// Point lights
    pub point: [LightData; MAX_POINT_LIGHTS],
    /// Spot lights
    pub spot: [LightData; MAX_SPOT_LIGHTS],
}

impl Default for LightConstants {
    fn default() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

unsafe impl bytemuck::Pod for LightConstants {}
unsafe impl bytemuck::Zeroable for LightConstants {}

impl ConstantRecord for LightConstants {
    const KIND: ConstantKind = ConstantKind::Light;
}
