// scene.rs: 渲染器协作者接口与透视相机

use glam::{Mat4, Vec3};
use image::RgbaImage;

pub const CAMERA_NEAR: f32 = 0.1;
pub const CAMERA_FAR: f32 = 1000.0;

/// The renderer that draws the textured sphere. The engine only pushes camera
/// parameters and texture updates into it.
pub trait SceneRenderer {
    type Error;

    fn set_size(&mut self, width: u32, height: u32);
    fn set_camera_aspect(&mut self, aspect: f32);
    fn set_camera_fov(&mut self, fov_deg: f32);
    /// Rebuilds the projection matrix from the current aspect and fov.
    fn recompute_projection(&mut self);
    fn set_camera_position(&mut self, position: Vec3);
    fn set_camera_look_at(&mut self, target: Vec3);
    fn upload_texture(&mut self, frame: RgbaImage);
    fn draw_frame(&mut self) -> Result<(), Self::Error>;
}

/// 透视相机。aspect / fov 修改后需要 update_projection_matrix 才生效。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveCamera {
    pub fov_deg: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub target: Vec3,
    projection: Mat4,
}

impl PerspectiveCamera {
    pub fn new(fov_deg: f32, aspect: f32) -> Self {
        let mut camera = Self {
            fov_deg,
            aspect,
            near: CAMERA_NEAR,
            far: CAMERA_FAR,
            position: Vec3::ZERO,
            target: Vec3::X,
            projection: Mat4::IDENTITY,
        };
        camera.update_projection_matrix();
        camera
    }

    pub fn update_projection_matrix(&mut self) {
        self.projection =
            Mat4::perspective_rh(self.fov_deg.to_radians(), self.aspect, self.near, self.far);
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view_matrix()
    }

    /// 用于 shader 中从 NDC 反推世界空间射线
    pub fn inverse_view_projection(&self) -> Mat4 {
        self.view_projection().inverse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn aspect_change_needs_explicit_recompute() {
        let mut cam = PerspectiveCamera::new(60.0, 1.0);
        let before = cam.projection_matrix();
        cam.aspect = 2.0;
        assert_eq!(cam.projection_matrix(), before);

        cam.update_projection_matrix();
        let f = 1.0 / (30.0f32.to_radians()).tan();
        assert!((cam.projection_matrix().x_axis.x - f / 2.0).abs() < 1e-5);
    }

    #[test]
    fn screen_center_unprojects_along_look_direction() {
        let mut cam = PerspectiveCamera::new(35.0, 16.0 / 9.0);
        cam.position = Vec3::ZERO;
        cam.target = Vec3::new(0.0, 0.0, 500.0);

        let p = cam.inverse_view_projection() * Vec4::new(0.0, 0.0, 1.0, 1.0);
        let dir = (p.truncate() / p.w - cam.position).normalize();
        assert!((dir - Vec3::Z).length() < 1e-3);
    }
}
