//! Lighting system
//!
//! Scene lights are kept as a flat list and packed into the fixed arrays of
//! [`LightConstants`] once per frame. Lights beyond an array's capacity are
//! dropped with a warning.

use crate::foundation::math::Vec3;
use crate::render::resources::constants::{
    LightConstants, LightData, MAX_DIRECTIONAL_LIGHTS, MAX_POINT_LIGHTS, MAX_SPOT_LIGHTS,
};

/// Light types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightType {
    /// Directional light (like sunlight)
    Directional,
    /// Point light (like a lightbulb)
    Point,
    /// Spot light (like a flashlight)
    Spot,
}

/// Light source
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    /// Light type
    pub light_type: LightType,
    /// Light position (for point/spot lights)
    pub position: Vec3,
    /// Direction the light travels (for directional/spot lights)
    pub direction: Vec3,
    /// Light color
    pub color: Vec3,
    /// Light intensity
    pub intensity: f32,
    /// Distance where attenuation starts (point/spot)
    pub falloff_start: f32,
    /// Distance where the light reaches zero (point/spot)
    pub falloff_end: f32,
    /// Spot cone exponent
    pub spot_power: f32,
}

impl Light {
    /// Create a directional light
    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            light_type: LightType::Directional,
            position: Vec3::zeros(),
            direction: direction.normalize(),
            color,
            intensity,
            falloff_start: 1.0,
            falloff_end: 10.0,
            spot_power: 64.0,
        }
    }

    /// Create a point light reaching zero at `range`
    pub fn point(position: Vec3, color: Vec3, intensity: f32, range: f32) -> Self {
        Self {
            light_type: LightType::Point,
            position,
            direction: Vec3::new(0.0, -1.0, 0.0),
            color,
            intensity,
            falloff_start: 1.0,
            falloff_end: range,
            spot_power: 64.0,
        }
    }

    /// Create a spot light
    pub fn spot(position: Vec3, direction: Vec3, color: Vec3, intensity: f32, range: f32, spot_power: f32) -> Self {
        Self {
            light_type: LightType::Spot,
            position,
            direction: direction.normalize(),
            color,
            intensity,
            falloff_start: 1.0,
            falloff_end: range,
            spot_power,
        }
    }

    /// Replace the attenuation range
    pub fn with_falloff(mut self, start: f32, end: f32) -> Self {
        self.falloff_start = start;
        self.falloff_end = end;
        self
    }

    /// Shader-side record of this light
    pub fn to_light_data(&self) -> LightData {
        LightData {
            strength: (self.color * self.intensity).into(),
            falloff_start: self.falloff_start,
            direction: self.direction.into(),
            falloff_end: self.falloff_end,
            position: self.position.into(),
            spot_power: self.spot_power,
        }
    }
}

/// Lighting environment containing multiple lights
#[derive(Debug, Clone)]
pub struct LightingEnvironment {
    /// List of lights in the scene
    pub lights: Vec<Light>,
    /// Ambient light color
    pub ambient_color: Vec3,
    /// Ambient light intensity
    pub ambient_intensity: f32,
}

impl LightingEnvironment {
    /// Create a new empty lighting environment
    pub fn new() -> Self {
        Self {
            lights: Vec::new(),
            ambient_color: Vec3::new(1.0, 1.0, 1.0),
            ambient_intensity: 0.1,
        }
    }

    /// Add a light to the environment
    pub fn add_light(mut self, light: Light) -> Self {
        self.lights.push(light);
        self
    }

    /// Set ambient lighting
    pub fn with_ambient(mut self, color: Vec3, intensity: f32) -> Self {
        self.ambient_color = color;
        self.ambient_intensity = intensity;
        self
    }

    /// Dim white ambient and one white directional light
    pub fn default_scene() -> Self {
        Self::new()
            .with_ambient(Vec3::new(1.0, 1.0, 1.0), 0.2)
            .add_light(Light::directional(
                Vec3::new(1.0, 1.0, 1.0),
                Vec3::new(1.0, 1.0, 1.0),
                1.0,
            ))
    }

    /// Pack into the shader's fixed light arrays
    pub fn to_constants(&self) -> LightConstants {
        let mut constants = LightConstants::default();
        let ambient = self.ambient_color * self.ambient_intensity;
        constants.ambient = [ambient.x, ambient.y, ambient.z, 1.0];

        let mut dropped = [0usize; 3];
        for light in &self.lights {
            let data = light.to_light_data();
            let (slots, count, kind): (&mut [LightData], &mut u32, usize) = match light.light_type {
                LightType::Directional => (constants.directional.as_mut_slice(), &mut constants.directional_count, 0),
                LightType::Point => (constants.point.as_mut_slice(), &mut constants.point_count, 1),
                LightType::Spot => (constants.spot.as_mut_slice(), &mut constants.spot_count, 2),
            };
            match slots.get_mut(*count as usize) {
                Some(slot) => {
                    *slot = data;
                    *count += 1;
                }
                None => dropped[kind] += 1,
            }
        }

        let capacities = [MAX_DIRECTIONAL_LIGHTS, MAX_POINT_LIGHTS, MAX_SPOT_LIGHTS];
        for ((name, dropped), capacity) in ["directional", "point", "spot"].iter().zip(dropped).zip(capacities) {
            if dropped > 0 {
                log::warn!("Dropped {} {} lights beyond the limit of {}", dropped, name, capacity);
            }
        }

        constants
    }
}

impl Default for LightingEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_scene_packs_one_directional() {
        let constants = LightingEnvironment::default_scene().to_constants();

        assert_relative_eq!(constants.ambient[0], 0.2);
        assert_eq!(constants.ambient[3], 1.0);
        assert_eq!(constants.directional_count, 1);
        assert_eq!(constants.point_count, 0);
        assert_eq!(constants.spot_count, 0);
        assert_eq!(constants.directional[0].strength, [1.0, 1.0, 1.0]);

        let inv_sqrt3 = 1.0 / 3.0_f32.sqrt();
        for component in constants.directional[0].direction {
            assert_relative_eq!(component, inv_sqrt3, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_lights_are_sorted_into_their_arrays() {
        let env = LightingEnvironment::new()
            .add_light(Light::point(Vec3::new(1.0, 2.0, 3.0), Vec3::new(1.0, 0.5, 0.0), 2.0, 8.0))
            .add_light(Light::directional(Vec3::new(0.0, -1.0, 0.0), Vec3::new(1.0, 1.0, 1.0), 0.5))
            .add_light(Light::spot(
                Vec3::zeros(),
                Vec3::new(0.0, 0.0, -1.0),
                Vec3::new(1.0, 1.0, 1.0),
                1.0,
                20.0,
                16.0,
            ));
        let constants = env.to_constants();

        assert_eq!(constants.point_count, 1);
        assert_eq!(constants.point[0].position, [1.0, 2.0, 3.0]);
        assert_eq!(constants.point[0].strength, [2.0, 1.0, 0.0]);
        assert_eq!(constants.point[0].falloff_end, 8.0);
        assert_eq!(constants.directional[0].strength, [0.5, 0.5, 0.5]);
        assert_eq!(constants.spot[0].spot_power, 16.0);
    }

    #[test]
    fn test_excess_lights_are_truncated() {
        let mut env = LightingEnvironment::new();
        for i in 0..(MAX_POINT_LIGHTS + 3) {
            env = env.add_light(Light::point(Vec3::new(i as f32, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0), 1.0, 5.0));
        }
        let constants = env.to_constants();

        assert_eq!(constants.point_count as usize, MAX_POINT_LIGHTS);
        assert_eq!(constants.point[MAX_POINT_LIGHTS - 1].position[0], (MAX_POINT_LIGHTS - 1) as f32);
    }
}
