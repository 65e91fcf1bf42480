// projection.rs: 球面坐标 (经度, 纬度) -> 相机朝向

use crate::orientation::OrientationState;
use glam::Vec3;

/// 全景球半径，必须与贴图球体的半径一致
pub const SPHERE_RADIUS: f32 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionMode {
    /// 相机退到球心另一侧 (-c)，穿过球心看向 c
    #[default]
    Spherical,
    /// 相机固定在球心，畸变更小
    Flat,
}

impl ProjectionMode {
    pub fn from_flat_flag(flat_projection: bool) -> Self {
        if flat_projection {
            ProjectionMode::Flat
        } else {
            ProjectionMode::Spherical
        }
    }
}

/// Point on the sphere the camera looks at, for angles in degrees.
pub fn look_target(longitude: f32, latitude: f32) -> Vec3 {
    let phi = (90.0 - latitude).to_radians();
    let theta = longitude.to_radians();
    Vec3::new(
        SPHERE_RADIUS * phi.sin() * theta.cos(),
        SPHERE_RADIUS * phi.cos(),
        SPHERE_RADIUS * phi.sin() * theta.sin(),
    )
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub target: Vec3,
}

/// Clamps the latitude in place, then derives the camera pose.
pub fn camera_pose(orientation: &mut OrientationState, mode: ProjectionMode) -> CameraPose {
    let latitude = orientation.clamp_latitude();
    let target = look_target(orientation.longitude, latitude);
    let position = match mode {
        ProjectionMode::Flat => Vec3::ZERO,
        ProjectionMode::Spherical => -target,
    };
    CameraPose { position, target }
}
