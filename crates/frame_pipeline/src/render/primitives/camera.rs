//! # Orbit Camera
//!
//! A camera circling a target on a sphere. Dragging changes the azimuth
//! (`theta`, in the XZ plane) and elevation (`phi`); the wheel changes the
//! radius. The camera produces the complete per-frame [`PassConstants`].
//!
//! ## Coordinate System
//! Right-handed, Y-up view space. The projection maps into Vulkan clip
//! space (Y down, depth in [0, 1]) so the same matrices feed every backend.

use crate::core::config::CameraConfig;
use crate::foundation::math::{inverse_or_identity, to_gpu_matrix, utils, Mat4, Point3, Vec3};
use crate::foundation::time::FrameTiming;
use crate::render::api::Viewport;
use crate::render::resources::constants::PassConstants;

/// Keeps `phi` strictly inside (-pi/2, pi/2) so the view never flips
const PHI_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - f32::EPSILON;

/// Spherical orbit camera
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    /// Point the camera circles and looks at
    pub target: Vec3,
    /// Up vector
    pub up: Vec3,
    radius: f32,
    min_radius: f32,
    theta: f32,
    phi: f32,
    fov: f32,
    aspect: f32,
    near: f32,
    far: f32,
    mouse_sensitivity: f32,
    zoom_sensitivity: f32,
    last_pointer: Option<(f32, f32)>,
    proj: Mat4,
}

impl OrbitCamera {
    /// Camera configured from `config` for a `width` x `height` target
    pub fn from_config(config: &CameraConfig, width: u32, height: u32) -> Self {
        let mut camera = Self {
            target: Vec3::zeros(),
            up: Vec3::new(0.0, 1.0, 0.0),
            radius: config.radius.max(config.min_radius),
            min_radius: config.min_radius,
            theta: 0.0,
            phi: 0.0,
            fov: utils::deg_to_rad(config.fov_degrees),
            aspect: 1.0,
            near: config.near,
            far: config.far,
            mouse_sensitivity: config.mouse_sensitivity,
            zoom_sensitivity: config.zoom_sensitivity,
            last_pointer: None,
            proj: Mat4::identity(),
        };
        camera.resize(width, height);
        camera
    }

    /// Distance from the target
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Azimuth in radians
    pub fn theta(&self) -> f32 {
        self.theta
    }

    /// Elevation in radians
    pub fn phi(&self) -> f32 {
        self.phi
    }

    /// Width / height of the projection
    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Near clip plane
    pub fn near(&self) -> f32 {
        self.near
    }

    /// Far clip plane
    pub fn far(&self) -> f32 {
        self.far
    }

    /// Feed a pointer position; rotates only while `dragging`.
    ///
    /// The position is always remembered so a drag never jumps.
    pub fn on_pointer_moved(&mut self, x: f32, y: f32, dragging: bool) {
        if dragging {
            if let Some((last_x, last_y)) = self.last_pointer {
                let yaw = utils::deg_to_rad(self.mouse_sensitivity * (x - last_x));
                let pitch = utils::deg_to_rad(self.mouse_sensitivity * (y - last_y));
                self.theta += yaw;
                self.phi = utils::clamp(self.phi + pitch, -PHI_LIMIT, PHI_LIMIT);
                log::trace!("Camera orbit theta={:.3} phi={:.3}", self.theta, self.phi);
            }
        }
        self.last_pointer = Some((x, y));
    }

    /// Zoom by `delta` wheel units; positive moves closer
    pub fn on_wheel(&mut self, delta: f32) {
        self.radius = (self.radius - delta * self.zoom_sensitivity).max(self.min_radius);
        log::trace!("Camera radius {:.3}", self.radius);
    }

    /// Rebuild the projection for a new target size
    pub fn resize(&mut self, width: u32, height: u32) {
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        if (self.aspect - aspect).abs() > 0.01 {
            log::info!("Camera aspect ratio changed: {:.3} -> {:.3}", self.aspect, aspect);
        }
        self.aspect = aspect;
        self.proj = vulkan_clip() * Mat4::new_perspective(self.aspect, self.fov, self.near, self.far);
    }

    /// Eye position in world space
    pub fn eye_position(&self) -> Vec3 {
        let (sin_phi, cos_phi) = self.phi.sin_cos();
        let (sin_theta, cos_theta) = self.theta.sin_cos();
        Vec3::new(
            self.radius * cos_phi * cos_theta,
            self.radius * sin_phi,
            -self.radius * cos_phi * sin_theta,
        ) + self.target
    }

    /// World to view
    pub fn view_matrix(&self) -> Mat4 {
        let eye = Point3::from(self.eye_position());
        Mat4::look_at_rh(&eye, &Point3::from(self.target), &self.up)
    }

    /// View to clip
    pub fn projection_matrix(&self) -> Mat4 {
        self.proj
    }

    /// Complete pass record for this frame
    pub fn pass_constants(&self, timing: FrameTiming, viewport: Viewport) -> PassConstants {
        let view = self.view_matrix();
        let proj = self.proj;
        let view_proj = proj * view;
        let width = viewport.width.max(1) as f32;
        let height = viewport.height.max(1) as f32;

        PassConstants {
            view: to_gpu_matrix(&view),
            inv_view: to_gpu_matrix(&inverse_or_identity(&view)),
            proj: to_gpu_matrix(&proj),
            inv_proj: to_gpu_matrix(&inverse_or_identity(&proj)),
            view_proj: to_gpu_matrix(&view_proj),
            inv_view_proj: to_gpu_matrix(&inverse_or_identity(&view_proj)),
            eye_position: self.eye_position().into(),
            _pad0: 0.0,
            render_target_size: [width, height],
            inv_render_target_size: [1.0 / width, 1.0 / height],
            near_z: self.near,
            far_z: self.far,
            total_time: timing.total,
            delta_time: timing.delta,
        }
    }
}

/// GL-style clip space to Vulkan: flip Y, remap depth from [-1, 1] to [0, 1]
#[rustfmt::skip]
fn vulkan_clip() -> Mat4 {
    Mat4::new(
        1.0, 0.0, 0.0, 0.0,
        0.0, -1.0, 0.0, 0.0,
        0.0, 0.0, 0.5, 0.5,
        0.0, 0.0, 0.0, 1.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec4;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-4;

    fn camera() -> OrbitCamera {
        OrbitCamera::from_config(&CameraConfig::default(), 800, 600)
    }

    #[test]
    fn test_default_eye_on_positive_x() {
        let camera = camera();
        let eye = camera.eye_position();
        assert_relative_eq!(eye.x, 15.0, epsilon = EPSILON);
        assert_relative_eq!(eye.y, 0.0, epsilon = EPSILON);
        assert_relative_eq!(eye.z, 0.0, epsilon = EPSILON);
        assert_relative_eq!(camera.aspect(), 800.0 / 600.0, epsilon = EPSILON);
    }

    #[test]
    fn test_drag_rotates_a_quarter_degree_per_pixel() {
        let mut camera = camera();
        camera.on_pointer_moved(100.0, 100.0, false);
        camera.on_pointer_moved(460.0, 100.0, true);

        // 360 px * 0.25 deg = 90 deg
        assert_relative_eq!(camera.theta(), std::f32::consts::FRAC_PI_2, epsilon = EPSILON);
        let eye = camera.eye_position();
        assert_relative_eq!(eye.x, 0.0, epsilon = EPSILON);
        assert_relative_eq!(eye.z, -15.0, epsilon = EPSILON);
    }

    #[test]
    fn test_move_without_drag_only_tracks_pointer() {
        let mut camera = camera();
        camera.on_pointer_moved(0.0, 0.0, false);
        camera.on_pointer_moved(500.0, 500.0, false);
        camera.on_pointer_moved(504.0, 500.0, true);
        assert_relative_eq!(camera.theta(), utils::deg_to_rad(1.0), epsilon = EPSILON);
        assert_relative_eq!(camera.phi(), 0.0, epsilon = EPSILON);
    }

    #[test]
    fn test_phi_is_clamped_below_poles() {
        let mut camera = camera();
        camera.on_pointer_moved(0.0, 0.0, true);
        camera.on_pointer_moved(0.0, 10_000.0, true);
        assert!(camera.phi() < std::f32::consts::FRAC_PI_2);

        camera.on_pointer_moved(0.0, -20_000.0, true);
        assert!(camera.phi() > -std::f32::consts::FRAC_PI_2);
    }

    #[test]
    fn test_zoom_never_passes_min_radius() {
        let mut camera = camera();
        camera.on_wheel(10.0);
        assert_relative_eq!(camera.radius(), 14.0, epsilon = EPSILON);

        camera.on_wheel(1_000.0);
        assert_relative_eq!(camera.radius(), 0.1, epsilon = EPSILON);

        camera.on_wheel(-20.0);
        assert_relative_eq!(camera.radius(), 2.1, epsilon = EPSILON);
    }

    #[test]
    fn test_projection_maps_near_and_far_to_vulkan_depth() {
        let camera = camera();
        let proj = camera.projection_matrix();

        let near = proj * Vec4::new(0.0, 0.0, -camera.near(), 1.0);
        let far = proj * Vec4::new(0.0, 0.0, -camera.far(), 1.0);
        assert_relative_eq!(near.z / near.w, 0.0, epsilon = EPSILON);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = EPSILON);

        // Y up in view space is Y down in clip space
        let up = proj * Vec4::new(0.0, 1.0, -5.0, 1.0);
        assert!(up.y / up.w < 0.0);
    }

    #[test]
    fn test_pass_constants_carry_inverses_and_timing() {
        let camera = camera();
        let timing = FrameTiming { total: 2.5, delta: 0.016 };
        let pass = camera.pass_constants(timing, Viewport { width: 800, height: 600 });

        let view_proj = Mat4::from(pass.view_proj);
        let inv_view_proj = Mat4::from(pass.inv_view_proj);
        assert_relative_eq!(view_proj * inv_view_proj, Mat4::identity(), epsilon = 1e-3);

        let view = Mat4::from(pass.view);
        let origin_in_view = view.transform_point(&Point3::origin());
        assert_relative_eq!(origin_in_view.z, -15.0, epsilon = EPSILON);

        assert_eq!(pass.render_target_size, [800.0, 600.0]);
        assert_relative_eq!(pass.inv_render_target_size[0], 1.0 / 800.0);
        assert_eq!(pass.total_time, 2.5);
        assert_eq!(pass.delta_time, 0.016);
        assert_eq!(pass.near_z, 1.0);
        assert_eq!(pass.far_z, 100.0);
    }

    #[test]
    fn test_resize_rebuilds_projection() {
        let mut camera = camera();
        let before = camera.projection_matrix();
        camera.resize(1600, 400);
        assert_relative_eq!(camera.aspect(), 4.0, epsilon = EPSILON);
        assert!(camera.projection_matrix() != before);
    }
}
