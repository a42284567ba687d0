//! Camera and view math.

use glam::{Mat4, Vec3};

/// Perspective camera.
///
/// The projection bakes in the Vulkan clip-space Y flip, so meshes wound
/// counter-clockwise stay front-facing on screen.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub direction: Vec3,
    pub up: Vec3,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            direction: Vec3::NEG_Z,
            up: Vec3::Y,
            fov: std::f32::consts::FRAC_PI_4,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    /// Create a camera looking from `position` towards `target`.
    #[must_use]
    pub fn new(position: Vec3, target: Vec3, fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position,
            direction: (target - position).normalize(),
            up: Vec3::Y,
            fov,
            aspect,
            near,
            far,
        }
    }

    /// Set the camera position.
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Turn towards a target position.
    pub fn look_at(&mut self, target: Vec3) {
        self.direction = (target - self.position).normalize();
    }

    /// Set the aspect ratio.
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.direction, self.up)
    }

    /// Projection matrix with the Y flip baked in.
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        let mut projection = Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far);
        projection.y_axis.y *= -1.0;
        projection
    }

    #[must_use]
    pub fn inverse_view_matrix(&self) -> Mat4 {
        self.view_matrix().inverse()
    }

    /// Uniform block contents for the current state.
    #[must_use]
    pub fn uniforms(&self) -> CameraUniforms {
        CameraUniforms::from(self)
    }
}

/// Camera data laid out for a std140 uniform block.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniforms {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub position: [f32; 4],
}

impl From<&Camera> for CameraUniforms {
    fn from(camera: &Camera) -> Self {
        Self {
            view: camera.view_matrix().to_cols_array_2d(),
            projection: camera.projection_matrix().to_cols_array_2d(),
            position: [camera.position.x, camera.position.y, camera.position.z, 1.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn projection_flips_the_y_axis() {
        let camera = Camera::default();
        let raw = Mat4::perspective_rh(camera.fov, camera.aspect, camera.near, camera.far);
        let flipped = camera.projection_matrix();

        assert_relative_eq!(flipped.y_axis.y, -raw.y_axis.y, epsilon = 1e-6);
        assert_relative_eq!(flipped.x_axis.x, raw.x_axis.x, epsilon = 1e-6);
    }

    #[test]
    fn look_at_yields_a_unit_direction() {
        let mut camera = Camera::default();
        camera.set_position(Vec3::new(3.0, 4.0, 0.0));
        camera.look_at(Vec3::ZERO);

        assert_relative_eq!(camera.direction.length(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(camera.direction.x, -0.6, epsilon = 1e-6);
        assert_relative_eq!(camera.direction.y, -0.8, epsilon = 1e-6);
    }

    #[test]
    fn view_maps_the_camera_position_to_the_origin() {
        let mut camera = Camera::default();
        camera.set_position(Vec3::new(5.0, -2.0, 7.0));
        camera.look_at(Vec3::new(0.0, 1.0, 0.0));

        let eye_space = camera.view_matrix().transform_point3(camera.position);
        assert_relative_eq!(eye_space.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(eye_space.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(eye_space.z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn uniforms_carry_the_position_as_a_point() {
        let mut camera = Camera::default();
        camera.set_position(Vec3::new(1.0, 2.0, 3.0));

        let uniforms = camera.uniforms();
        assert_eq!(uniforms.position, [1.0, 2.0, 3.0, 1.0]);
    }
}
