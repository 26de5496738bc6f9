//! 对偶四元数变换
//!
//! 旋转与平移合并在一个对偶四元数里，缩放单独保存，
//! 只在展开为 4x4 矩阵时施加（不进入对偶四元数代数）。

use std::io::{Read, Write};

use glam::{Mat4, Quat, Vec3};

use super::{Axis, PoseParams};
use crate::io::{read_quat, read_vec3, write_quat, write_vec3};
use crate::math::{decompose, rotation_towards_z, DualQuat};
use crate::Result;

#[derive(Clone, Debug, PartialEq)]
pub struct DualQuaternionTransform {
    pub position_rotation: DualQuat,
    pub scale: Vec3,
}

impl Default for DualQuaternionTransform {
    fn default() -> Self {
        Self {
            position_rotation: DualQuat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl DualQuaternionTransform {
    /// 左乘：在父坐标系中施加 `dq`
    pub fn transform(&mut self, dq: DualQuat) {
        self.position_rotation = dq * self.position_rotation;
    }
}

impl PoseParams for DualQuaternionTransform {
    const KIND: &'static str = "DualQuaternionTransform";

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn is_neutral(&self) -> bool {
        self.position_rotation == DualQuat::IDENTITY && self.scale == Vec3::ONE
    }

    fn decompose_from(&mut self, m: Mat4) {
        let (scale, rotation, translation) = decompose(m);
        self.position_rotation = DualQuat::from_rotation_translation(rotation, translation);
        self.scale = scale;
    }

    fn translate(&mut self, delta: Vec3) {
        self.transform(DualQuat::from_translation(delta));
    }

    fn rotate_axis(&mut self, axis: Axis, angle: f32) {
        self.rotate(Quat::from_axis_angle(axis.unit(), angle));
    }

    /// 右乘：绕自身原点旋转，位置不变
    fn rotate(&mut self, rotation: Quat) {
        self.position_rotation = self.position_rotation * DualQuat::from_rotation(rotation);
    }

    fn scale(&mut self, factor: Vec3) {
        self.scale *= factor;
    }

    fn set_position(&mut self, position: Vec3) {
        let rotation = self.position_rotation.normalize().rotation();
        self.position_rotation = DualQuat::from_rotation_translation(rotation, position);
    }

    fn set_rotation(&mut self, rotation: Quat) {
        let translation = self.position_rotation.normalize().translation();
        self.position_rotation = DualQuat::from_rotation_translation(rotation.normalize(), translation);
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
        self.position_rotation = self.position_rotation.normalize();
        self.position_rotation.to_mat4() * Mat4::from_scale(self.scale)
    }

    fn position(&self) -> Vec3 {
        self.position_rotation.normalize().translation()
    }

    fn rotation(&self) -> Quat {
        self.position_rotation.normalize().rotation()
    }

    fn scale_factor(&self) -> Vec3 {
        self.scale
    }

    fn read_params<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let real = read_quat(reader, "dual quaternion real part")?;
        let dual = read_quat(reader, "dual quaternion dual part")?;
        self.position_rotation = DualQuat { real, dual };
        self.scale = read_vec3(reader, "scale")?;
        Ok(())
    }

    fn write_params<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_quat(writer, self.position_rotation.real)?;
        write_quat(writer, self.position_rotation.dual)?;
        write_vec3(writer, self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::mat4_approx_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_translate_moves_position() {
        let mut t = DualQuaternionTransform::default();
        t.translate(Vec3::new(1.0, 2.0, 3.0));
        t.translate(Vec3::new(1.0, 0.0, 0.0));
        assert!((t.position() - Vec3::new(2.0, 2.0, 3.0)).length() < 1e-5);
    }

    #[test]
    fn test_rotate_keeps_position() {
        let mut t = DualQuaternionTransform::default();
        t.set_position(Vec3::new(0.0, 0.0, 4.0));
        t.rotate_axis(Axis::Y, FRAC_PI_2);
        assert!((t.position() - Vec3::new(0.0, 0.0, 4.0)).length() < 1e-5);

        let p = t.compose().transform_point3(Vec3::Z);
        assert!((p - Vec3::new(1.0, 0.0, 4.0)).length() < 1e-5);
    }

    #[test]
    fn test_non_uniform_scale_stays_outside() {
        let mut t = DualQuaternionTransform::default();
        t.set_scale(Vec3::new(2.0, 1.0, 0.5));
        t.set_rotation(Quat::from_rotation_z(FRAC_PI_2));
        t.set_position(Vec3::new(1.0, 1.0, 1.0));

        let expected = Mat4::from_scale_rotation_translation(
            Vec3::new(2.0, 1.0, 0.5),
            Quat::from_rotation_z(FRAC_PI_2),
            Vec3::new(1.0, 1.0, 1.0),
        );
        assert!(mat4_approx_eq(&t.compose(), &expected, 1e-5));
        assert!((t.position_rotation.real.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_transform_applies_in_parent_frame() {
        let mut t = DualQuaternionTransform::default();
        t.set_position(Vec3::X);
        t.transform(DualQuat::from_rotation(Quat::from_rotation_z(FRAC_PI_2)));
        assert!((t.position() - Vec3::Y).length() < 1e-5);
    }
}
