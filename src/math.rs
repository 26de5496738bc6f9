//! 数学工具
//!
//! - DualQuat: 刚体变换（旋转 + 平移）的对偶四元数表示
//! - 欧拉角与四元数互转（YXZ 顺序：偏航 Y、俯仰 X、翻滚 Z）
//! - 不依赖行列式非零的矩阵分解

use glam::{EulerRot, Mat3, Mat4, Quat, Vec3};
use std::f32::consts::{FRAC_PI_2, TAU};
use std::ops::Mul;

// ============================================================================
// 对偶四元数
// ============================================================================

/// 对偶四元数 `real + ε·dual`
///
/// `real` 为旋转，`dual = 0.5 · t · real`（t 为纯四元数平移）。
/// 不包含缩放，缩放只在展开为 4x4 矩阵时施加。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DualQuat {
    pub real: Quat,
    pub dual: Quat,
}

impl DualQuat {
    pub const IDENTITY: Self = Self {
        real: Quat::IDENTITY,
        dual: Quat::from_xyzw(0.0, 0.0, 0.0, 0.0),
    };

    #[inline]
    pub fn from_rotation_translation(rotation: Quat, translation: Vec3) -> Self {
        let t = Quat::from_xyzw(translation.x, translation.y, translation.z, 0.0);
        Self {
            real: rotation,
            dual: (t * rotation) * 0.5,
        }
    }

    #[inline]
    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            real: rotation,
            dual: Quat::from_xyzw(0.0, 0.0, 0.0, 0.0),
        }
    }

    #[inline]
    pub fn from_translation(translation: Vec3) -> Self {
        Self::from_rotation_translation(Quat::IDENTITY, translation)
    }

    /// 从刚体矩阵构建（忽略缩放）
    pub fn from_mat4(m: Mat4) -> Self {
        let (_, rotation, translation) = decompose(m);
        Self::from_rotation_translation(rotation, translation)
    }

    #[inline]
    pub fn rotation(&self) -> Quat {
        self.real
    }

    /// 平移 = 2 · dual · conj(real)
    #[inline]
    pub fn translation(&self) -> Vec3 {
        let t = (self.dual * self.real.conjugate()) * 2.0;
        Vec3::new(t.x, t.y, t.z)
    }

    /// 归一化：实部单位化，并去除对偶部中与实部平行的分量
    pub fn normalize(&self) -> Self {
        let length = self.real.length();
        if length <= f32::EPSILON {
            return Self::IDENTITY;
        }
        let real = self.real * (1.0 / length);
        let dual = self.dual * (1.0 / length);
        let dual = dual - real * real.dot(dual);
        Self { real, dual }
    }

    #[inline]
    pub fn conjugate(&self) -> Self {
        Self {
            real: self.real.conjugate(),
            dual: self.dual.conjugate(),
        }
    }

    /// 变换点
    #[inline]
    pub fn transform_point3(&self, point: Vec3) -> Vec3 {
        self.real * point + self.translation()
    }

    /// 展开为刚体矩阵（不含缩放）
    #[inline]
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.real, self.translation())
    }
}

impl Default for DualQuat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for DualQuat {
    type Output = Self;

    /// 组合：先施加 `rhs`，再施加 `self`
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self {
            real: self.real * rhs.real,
            dual: self.real * rhs.dual + self.dual * rhs.real,
        }
    }
}

// ============================================================================
// 欧拉角
// ============================================================================

/// 欧拉角 (pitch=x, yaw=y, roll=z) → 四元数，按 yaw · pitch · roll 组合
#[inline]
pub fn quat_from_euler(euler: Vec3) -> Quat {
    Quat::from_euler(EulerRot::YXZ, euler.y, euler.x, euler.z)
}

/// 四元数 → 欧拉角 (pitch, yaw, roll)，pitch 位于 [-π/2, π/2]
#[inline]
pub fn euler_from_quat(rotation: Quat) -> Vec3 {
    let (yaw, pitch, roll) = rotation.normalize().to_euler(EulerRot::YXZ);
    Vec3::new(pitch, yaw, roll)
}

/// 俯仰角限制在 [-π/2, π/2]
#[inline]
pub fn clamp_pitch(angle: f32) -> f32 {
    angle.clamp(-FRAC_PI_2, FRAC_PI_2)
}

/// 偏航/翻滚角回绕到 (-2π, 2π]
///
/// 保留符号：正角落在 (0, 2π]，负角落在 (-2π, 0]。
#[inline]
pub fn wrap_angle(angle: f32) -> f32 {
    if !angle.is_finite() {
        return 0.0;
    }
    if angle > TAU {
        let r = angle % TAU;
        return if r <= 0.0 { TAU } else { r };
    }
    if angle <= -TAU {
        return angle % TAU;
    }
    angle
}

/// 使本地 Z 轴指向 `direction` 的旋转；零向量返回 None
pub fn rotation_towards_z(direction: Vec3) -> Option<Quat> {
    let dir = direction.try_normalize()?;
    Some(Quat::from_rotation_arc(Vec3::Z, dir))
}

// ============================================================================
// 矩阵分解
// ============================================================================

/// 分解为 (缩放, 旋转, 平移)
///
/// 缩放取列向量长度；行列式为负时翻转 X 轴缩放。
/// 退化矩阵（某列长度为 0）旋转返回单位四元数。
pub fn decompose(m: Mat4) -> (Vec3, Quat, Vec3) {
    let translation = m.w_axis.truncate();
    let x = m.x_axis.truncate();
    let y = m.y_axis.truncate();
    let z = m.z_axis.truncate();

    let mut scale = Vec3::new(x.length(), y.length(), z.length());
    if scale.x <= f32::EPSILON || scale.y <= f32::EPSILON || scale.z <= f32::EPSILON {
        return (scale, Quat::IDENTITY, translation);
    }
    if Mat3::from_cols(x, y, z).determinant() < 0.0 {
        scale.x = -scale.x;
    }

    let basis = Mat3::from_cols(x / scale.x, y / scale.y, z / scale.z);
    let rotation = Quat::from_mat3(&basis).normalize();
    (scale, rotation, translation)
}

/// 按 缩放 → 旋转 → 平移 组合
#[inline]
pub fn compose(scale: Vec3, rotation: Quat, translation: Vec3) -> Mat4 {
    Mat4::from_scale_rotation_translation(scale, rotation, translation)
}

/// 矩阵逐元素近似比较
pub fn mat4_approx_eq(a: &Mat4, b: &Mat4, tolerance: f32) -> bool {
    a.to_cols_array()
        .iter()
        .zip(b.to_cols_array().iter())
        .all(|(x, y)| (x - y).abs() <= tolerance)
}
