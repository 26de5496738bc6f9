//! 第一人称变换
//!
//! 只存欧拉角 (pitch, yaw, roll)，没有四元数字段。
//! 平移相对于当前偏航方向（水平面内前进/后退/侧移），不受俯仰与翻滚影响。
//! 俯仰限制在 [-π/2, π/2]，偏航与翻滚回绕到 (-2π, 2π]。

use std::io::{Read, Write};

use glam::{Mat4, Quat, Vec3};

use super::{Axis, EulerParams, PoseParams};
use crate::io::{read_vec3, write_vec3};
use crate::math::{
    clamp_pitch, compose, decompose, euler_from_quat, quat_from_euler, rotation_towards_z, wrap_angle,
};
use crate::Result;

/// 限制俯仰并回绕偏航/翻滚
#[inline]
pub(super) fn sanitize_euler(euler: Vec3) -> Vec3 {
    Vec3::new(clamp_pitch(euler.x), wrap_angle(euler.y), wrap_angle(euler.z))
}

/// 单轴累加后再做限制
#[inline]
pub(super) fn rotate_euler_axis(euler: Vec3, axis: Axis, angle: f32) -> Vec3 {
    let mut euler = euler;
    match axis {
        Axis::X => euler.x = clamp_pitch(euler.x + angle),
        Axis::Y => euler.y = wrap_angle(euler.y + angle),
        Axis::Z => euler.z = wrap_angle(euler.z + angle),
    }
    euler
}

/// 欧拉 → 四元数 → 组合 → 欧拉
#[inline]
pub(super) fn rotate_euler_quat(euler: Vec3, rotation: Quat) -> Vec3 {
    sanitize_euler(euler_from_quat(quat_from_euler(euler) * rotation))
}

#[derive(Clone, Debug, PartialEq)]
pub struct QuaternionAdditiveTransform {
    pub position: Vec3,
    /// (pitch, yaw, roll)
    pub euler: Vec3,
    pub scale: Vec3,
}

impl Default for QuaternionAdditiveTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            euler: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl QuaternionAdditiveTransform {
    #[inline]
    pub fn pitch(&self) -> f32 {
        self.euler.x
    }

    #[inline]
    pub fn yaw(&self) -> f32 {
        self.euler.y
    }

    #[inline]
    pub fn roll(&self) -> f32 {
        self.euler.z
    }
}

impl PoseParams for QuaternionAdditiveTransform {
    const KIND: &'static str = "QuaternionAdditiveTransform";

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn is_neutral(&self) -> bool {
        self.position == Vec3::ZERO && self.euler == Vec3::ZERO && self.scale == Vec3::ONE
    }

    fn decompose_from(&mut self, m: Mat4) {
        let (scale, rotation, translation) = decompose(m);
        self.position = translation;
        self.euler = sanitize_euler(euler_from_quat(rotation));
        self.scale = scale;
    }

    /// 按偏航旋转位移后再累加：+Z 为前方，偏航 90° 后前方变为 +X
    fn translate(&mut self, delta: Vec3) {
        self.position += Quat::from_rotation_y(self.euler.y) * delta;
    }

    fn rotate_axis(&mut self, axis: Axis, angle: f32) {
        self.euler = rotate_euler_axis(self.euler, axis, angle);
    }

    fn rotate(&mut self, rotation: Quat) {
        self.euler = rotate_euler_quat(self.euler, rotation);
    }

    fn scale(&mut self, factor: Vec3) {
        self.scale *= factor;
    }

    fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    fn set_rotation(&mut self, rotation: Quat) {
        self.euler = sanitize_euler(euler_from_quat(rotation));
    }

    fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
    }

    fn set_direction_z(&mut self, direction: Vec3) {
        if let Some(rotation) = rotation_towards_z(direction) {
            self.set_rotation(rotation);
        }
    }

    fn compose(&mut self) -> Mat4 {
        compose(self.scale, quat_from_euler(self.euler), self.position)
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn rotation(&self) -> Quat {
        quat_from_euler(self.euler)
    }

    fn scale_factor(&self) -> Vec3 {
        self.scale
    }

    fn read_params<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        self.position = read_vec3(reader, "position")?;
        self.euler = sanitize_euler(read_vec3(reader, "euler")?);
        self.scale = read_vec3(reader, "scale")?;
        Ok(())
    }

    fn write_params<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_vec3(writer, self.position)?;
        write_vec3(writer, self.euler)?;
        write_vec3(writer, self.scale)
    }
}

impl EulerParams for QuaternionAdditiveTransform {
    fn set_rotation_euler(&mut self, euler: Vec3) {
        self.euler = sanitize_euler(euler);
    }

    fn euler(&self) -> Vec3 {
        self.euler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI, TAU};

    #[test]
    fn test_yaw_then_forward() {
        let mut t = QuaternionAdditiveTransform::default();
        t.rotate_axis(Axis::Y, FRAC_PI_2);
        assert!((t.yaw() - FRAC_PI_2).abs() < 1e-6);

        t.translate(Vec3::new(0.0, 0.0, 1.0));
        assert!((t.position - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_translate_ignores_pitch() {
        let mut t = QuaternionAdditiveTransform::default();
        t.rotate_axis(Axis::X, 0.8);
        t.translate(Vec3::Z);
        assert!((t.position - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn test_pitch_clamped() {
        let mut t = QuaternionAdditiveTransform::default();
        t.rotate_axis(Axis::X, 1.0);
        t.rotate_axis(Axis::X, 1.0);
        assert!((t.pitch() - FRAC_PI_2).abs() < 1e-6);

        t.rotate_axis(Axis::X, -PI * 3.0);
        assert!((t.pitch() + FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn test_yaw_and_roll_wrap() {
        let mut t = QuaternionAdditiveTransform::default();
        for _ in 0..5 {
            t.rotate_axis(Axis::Y, PI);
        }
        assert!(t.yaw() > -TAU && t.yaw() <= TAU);
        assert!((t.yaw() - PI).abs() < 1e-4);

        t.rotate_axis(Axis::Z, -TAU - 0.5);
        assert!((t.roll() + 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_huge_angles_stay_bounded() {
        let mut t = QuaternionAdditiveTransform::default();
        t.rotate_axis(Axis::Y, 1.0e9);
        t.rotate_axis(Axis::Z, -f32::MAX);
        assert!(t.yaw() > -TAU && t.yaw() <= TAU);
        assert!(t.roll() > -TAU && t.roll() <= TAU);

        // 损坏的数据流中读到极大的偏航角
        let mut bytes = Vec::new();
        for v in [0.0f32, 0.0, 0.0, 0.0, 1.0e9, f32::MAX, 1.0, 1.0, 1.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let mut loaded = QuaternionAdditiveTransform::default();
        loaded.read_params(&mut std::io::Cursor::new(bytes)).unwrap();
        assert!(loaded.yaw() > -TAU && loaded.yaw() <= TAU);
        assert!(loaded.roll() > -TAU && loaded.roll() <= TAU);
    }

    #[test]
    fn test_rotate_quaternion_converts_back() {
        let mut t = QuaternionAdditiveTransform::default();
        t.rotate(Quat::from_rotation_y(0.6));
        t.rotate(Quat::from_rotation_y(0.4));
        assert!((t.yaw() - 1.0).abs() < 1e-5);
        assert!(t.pitch().abs() < 1e-5);
    }
}
