//! 空间变换
//!
//! 与第一人称变换一样只存欧拉角，但平移使用完整的当前旋转（三个轴），
//! 适合自由飞行一类的三维相对移动。

use std::io::{Read, Write};

use glam::{Mat4, Quat, Vec3};

use super::first_person::{rotate_euler_axis, rotate_euler_quat, sanitize_euler};
use super::{Axis, EulerParams, PoseParams};
use crate::io::{read_vec3, write_vec3};
use crate::math::{compose, decompose, euler_from_quat, quat_from_euler, rotation_towards_z};
use crate::Result;

#[derive(Clone, Debug, PartialEq)]
pub struct SpatialAdditiveTransform {
    pub position: Vec3,
    /// (pitch, yaw, roll)
    pub euler: Vec3,
    pub scale: Vec3,
}

impl Default for SpatialAdditiveTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            euler: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl PoseParams for SpatialAdditiveTransform {
    const KIND: &'static str = "SpatialAdditiveTransform";

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

    /// 在本地旋转坐标系中平移
    fn translate(&mut self, delta: Vec3) {
        self.position += quat_from_euler(self.euler) * delta;
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

impl EulerParams for SpatialAdditiveTransform {
    fn set_rotation_euler(&mut self, euler: Vec3) {
        self.euler = sanitize_euler(euler);
    }

    fn euler(&self) -> Vec3 {
        self.euler
    }
}
