//! 欧拉加算变换
//!
//! 除四元数旋转外另持有一个欧拉角累加器。按轴旋转只累加到累加器，
//! 在下一次重建时与四元数合并一次，累加器随之清零。

use std::io::{Read, Write};

use glam::{Mat4, Quat, Vec3};

use super::{Axis, EulerParams, PoseParams};
use crate::io::{read_quat, read_vec3, write_quat, write_vec3};
use crate::math::{compose, decompose, euler_from_quat, quat_from_euler, rotation_towards_z};
use crate::Result;

#[derive(Clone, Debug, PartialEq)]
pub struct EulerAdditiveTransform {
    pub position: Vec3,
    /// 已归一化的旋转
    pub rotation: Quat,
    /// 尚未合并的欧拉角 (pitch, yaw, roll)
    pub euler: Vec3,
    pub scale: Vec3,
}

impl Default for EulerAdditiveTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            euler: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl EulerAdditiveTransform {
    /// 累加器与四元数合并后的旋转
    #[inline]
    pub fn combined_rotation(&self) -> Quat {
        (quat_from_euler(self.euler) * self.rotation).normalize()
    }
}

impl PoseParams for EulerAdditiveTransform {
    const KIND: &'static str = "EulerAdditiveTransform";

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn is_neutral(&self) -> bool {
        self.position == Vec3::ZERO
            && self.rotation == Quat::IDENTITY
            && self.euler == Vec3::ZERO
            && self.scale == Vec3::ONE
    }

    fn decompose_from(&mut self, m: Mat4) {
        let (scale, rotation, translation) = decompose(m);
        self.position = translation;
        self.rotation = rotation;
        self.euler = Vec3::ZERO;
        self.scale = scale;
    }

    fn translate(&mut self, delta: Vec3) {
        self.position += delta;
    }

    fn rotate_axis(&mut self, axis: Axis, angle: f32) {
        self.euler[axis.index()] += angle;
    }

    fn rotate(&mut self, rotation: Quat) {
        self.rotation = (self.rotation * rotation).normalize();
    }

    fn scale(&mut self, factor: Vec3) {
        self.scale *= factor;
    }

    fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation.normalize();
        self.euler = Vec3::ZERO;
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
        let rotation = self.combined_rotation();
        self.rotation = rotation;
        self.euler = Vec3::ZERO;
        compose(self.scale, rotation, self.position)
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn rotation(&self) -> Quat {
        self.combined_rotation()
    }

    fn scale_factor(&self) -> Vec3 {
        self.scale
    }

    fn read_params<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        self.position = read_vec3(reader, "position")?;
        self.rotation = read_quat(reader, "rotation")?.normalize();
        self.euler = read_vec3(reader, "euler accumulator")?;
        self.scale = read_vec3(reader, "scale")?;
        Ok(())
    }

    fn write_params<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_vec3(writer, self.position)?;
        write_quat(writer, self.rotation)?;
        write_vec3(writer, self.euler)?;
        write_vec3(writer, self.scale)
    }
}

impl EulerParams for EulerAdditiveTransform {
    fn set_rotation_euler(&mut self, euler: Vec3) {
        self.rotation = Quat::IDENTITY;
        self.euler = euler;
    }

    fn euler(&self) -> Vec3 {
        euler_from_quat(self.combined_rotation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_accumulator_folds_on_compose() {
        let mut t = EulerAdditiveTransform::default();
        t.rotate_axis(Axis::Y, 0.25);
        t.rotate_axis(Axis::Y, 0.25);
        assert!((t.euler.y - 0.5).abs() < 1e-6);
        assert_eq!(t.rotation, Quat::IDENTITY);

        t.compose();
        assert_eq!(t.euler, Vec3::ZERO);
        assert!(t.rotation.angle_between(Quat::from_rotation_y(0.5)) < 1e-5);
    }

    #[test]
    fn test_accumulator_applies_on_top_of_quaternion() {
        let mut t = EulerAdditiveTransform::default();
        t.set_rotation(Quat::from_rotation_x(FRAC_PI_2));
        t.rotate_axis(Axis::Y, FRAC_PI_2);

        let m = t.compose();
        let expected = Quat::from_rotation_y(FRAC_PI_2) * Quat::from_rotation_x(FRAC_PI_2);
        assert!((m.transform_vector3(Vec3::Z) - expected * Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn test_recompose_is_stable() {
        let mut t = EulerAdditiveTransform::default();
        t.rotate_axis(Axis::X, 0.4);
        let first = t.compose();
        let second = t.compose();
        assert!((first - second).abs_diff_eq(Mat4::ZERO, 1e-6));
    }
}
