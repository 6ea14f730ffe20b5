use glam::{Mat4, Vec3};

pub const FOV_Y_DEGREES: f32 = 75.0;
pub const NEAR: f32 = 0.001;
pub const FAR: f32 = 1000.0;
pub const START_DISTANCE: f32 = 5.0;
pub const MIN_DISTANCE: f32 = 0.001;
pub const MAX_DISTANCE: f32 = 50.0;
/// Camera Z units per pixel of wheel delta.
pub const ZOOM_SPEED: f32 = 0.1 * 0.001;

/// Perspective camera on the Z axis looking down -Z. Zoom moves it along Z;
/// the model rotates instead of the camera orbiting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl PerspectiveCamera {
    pub fn new(aspect: f32) -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, START_DISTANCE),
            target: Vec3::ZERO,
            fov_y: FOV_Y_DEGREES.to_radians(),
            aspect: sanitize_aspect(aspect).unwrap_or(1.0),
            near: NEAR,
            far: FAR,
        }
    }

    /// Updates the aspect ratio; zero-sized viewports keep the previous one.
    pub fn set_viewport(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        match sanitize_aspect(width as f32 / height as f32) {
            Some(aspect) => {
                self.aspect = aspect;
                true
            }
            None => false,
        }
    }

    /// Places the camera on +Z at twice the bounding diagonal, looking at the
    /// origin.
    pub fn frame_size(&mut self, diagonal: f32) {
        let distance = if diagonal.is_finite() && diagonal > 0.0 {
            diagonal * 2.0
        } else {
            START_DISTANCE
        };
        self.position = Vec3::new(0.0, 0.0, distance);
        self.target = Vec3::ZERO;
    }

    /// Applies a browser-style wheel delta (positive scrolls away).
    pub fn zoom_by(&mut self, delta_y: f32) {
        if !delta_y.is_finite() {
            return;
        }
        let z = self.position.z + delta_y * ZOOM_SPEED;
        self.position.z = z.clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    pub fn view(&self) -> Mat4 {
        let forward = self.target - self.position;
        let target = if forward.length_squared() > 1e-12 {
            self.target
        } else {
            self.position + Vec3::NEG_Z
        };
        Mat4::look_at_rh(self.position, target, Vec3::Y)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }
}

fn sanitize_aspect(aspect: f32) -> Option<f32> {
    (aspect.is_finite() && aspect > 0.0).then_some(aspect)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_on_z_axis_looking_at_origin() {
        let camera = PerspectiveCamera::new(16.0 / 9.0);
        assert_eq!(camera.position, Vec3::new(0.0, 0.0, 5.0));
        let clip = camera.view_projection() * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-6 && ndc.y.abs() < 1e-6);
        assert!((camera.fov_y.to_degrees() - 75.0).abs() < 1e-4);
    }

    #[test]
    fn wheel_delta_moves_camera_proportionally() {
        let mut camera = PerspectiveCamera::default();
        camera.zoom_by(1000.0);
        assert!((camera.position.z - 5.1).abs() < 1e-5);
        camera.zoom_by(-1000.0);
        assert!((camera.position.z - 5.0).abs() < 1e-5);
    }

    #[test]
    fn zoom_saturates_at_bounds() {
        let mut camera = PerspectiveCamera::default();
        for _ in 0..100 {
            camera.zoom_by(1.0e6);
        }
        assert_eq!(camera.position.z, MAX_DISTANCE);
        for _ in 0..100 {
            camera.zoom_by(-1.0e6);
        }
        assert_eq!(camera.position.z, MIN_DISTANCE);
        camera.zoom_by(f32::NAN);
        assert_eq!(camera.position.z, MIN_DISTANCE);
    }

    #[test]
    fn zero_sized_viewport_keeps_aspect() {
        let mut camera = PerspectiveCamera::new(2.0);
        assert!(!camera.set_viewport(0, 600));
        assert!(!camera.set_viewport(800, 0));
        assert_eq!(camera.aspect, 2.0);
        assert!(camera.set_viewport(300, 600));
        assert_eq!(camera.aspect, 0.5);
        assert!(camera.projection().is_finite());
    }

    #[test]
    fn framing_uses_twice_the_diagonal() {
        let mut camera = PerspectiveCamera::default();
        camera.frame_size(3.0);
        assert_eq!(camera.position, Vec3::new(0.0, 0.0, 6.0));
        camera.frame_size(0.0);
        assert_eq!(camera.position.z, START_DISTANCE);
        assert!(camera.view().is_finite());
    }
}
