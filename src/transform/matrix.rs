//! 矩阵变换
//!
//! 位置 + 四元数 + 缩放。旋转为累积语义：新的旋转乘在当前旋转之后（本地坐标系）。

use std::io::{Read, Write};

use glam::{Mat4, Quat, Vec3};

use super::{Axis, EulerParams, PoseParams};
use crate::io::{read_quat, read_vec3, write_quat, write_vec3};
use crate::math::{compose, decompose, euler_from_quat, quat_from_euler, rotation_towards_z};
use crate::Result;

#[derive(Clone, Debug, PartialEq)]
pub struct MatrixTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for MatrixTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl PoseParams for MatrixTransform {
    const KIND: &'static str = "MatrixTransform";

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn is_neutral(&self) -> bool {
        self.position == Vec3::ZERO && self.rotation == Quat::IDENTITY && self.scale == Vec3::ONE
    }

    fn decompose_from(&mut self, m: Mat4) {
        let (scale, rotation, translation) = decompose(m);
        self.position = translation;
        self.rotation = rotation;
        self.scale = scale;
    }

    fn translate(&mut self, delta: Vec3) {
        self.position += delta;
    }

    fn rotate_axis(&mut self, axis: Axis, angle: f32) {
        self.rotate(Quat::from_axis_angle(axis.unit(), angle));
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
    }

    fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
    }

    fn set_direction_z(&mut self, direction: Vec3) {
        if let Some(rotation) = rotation_towards_z(direction) {
            self.rotation = rotation;
        }
    }

    fn compose(&mut self) -> Mat4 {
        compose(self.scale, self.rotation, self.position)
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn rotation(&self) -> Quat {
        self.rotation
    }

    fn scale_factor(&self) -> Vec3 {
        self.scale
    }

    fn read_params<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        self.position = read_vec3(reader, "position")?;
        self.rotation = read_quat(reader, "rotation")?.normalize();
        self.scale = read_vec3(reader, "scale")?;
        Ok(())
    }

    fn write_params<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_vec3(writer, self.position)?;
        write_quat(writer, self.rotation)?;
        write_vec3(writer, self.scale)
    }
}

impl EulerParams for MatrixTransform {
    fn set_rotation_euler(&mut self, euler: Vec3) {
        self.rotation = quat_from_euler(euler);
    }

    fn euler(&self) -> Vec3 {
        euler_from_quat(self.rotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_rotations_accumulate() {
        let mut t = MatrixTransform::default();
        t.rotate_axis(Axis::Z, FRAC_PI_2);
        t.rotate_axis(Axis::Z, FRAC_PI_2);

        let p = t.compose().transform_point3(Vec3::X);
        assert!((p - Vec3::new(-1.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_scale_applied_before_rotation() {
        let mut t = MatrixTransform::default();
        t.set_scale(Vec3::new(2.0, 1.0, 1.0));
        t.rotate_axis(Axis::Z, FRAC_PI_2);
        t.set_position(Vec3::new(0.0, 0.0, 5.0));

        // (1,0,0) → 缩放 (2,0,0) → 旋转 (0,2,0) → 平移 (0,2,5)
        let p = t.compose().transform_point3(Vec3::X);
        assert!((p - Vec3::new(0.0, 2.0, 5.0)).length() < 1e-5);
    }

    #[test]
    fn test_direction_z() {
        let mut t = MatrixTransform::default();
        t.set_direction_z(Vec3::new(0.0, 3.0, 0.0));
        assert!((t.rotation * Vec3::Z - Vec3::Y).length() < 1e-5);

        let before = t.rotation;
        t.set_direction_z(Vec3::ZERO);
        assert_eq!(t.rotation, before);
    }
}
