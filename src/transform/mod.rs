//! 变换系统
//!
//! 核心设计思想：
//! - Transform: 统一持有矩阵缓存与脏标记（所有变体共享一份）
//! - TransformKind: 封闭的变体集合，各自保存最小参数集
//! - 所有修改只标记脏，矩阵在 update() 或 matrix() 读取时惰性重建
//! - 重建顺序固定为 缩放 → 旋转 → 平移，每次都从当前参数快照重建

mod dual_quaternion;
mod euler_additive;
mod first_person;
mod matrix;
mod spatial;

pub use dual_quaternion::DualQuaternionTransform;
pub use euler_additive::EulerAdditiveTransform;
pub use first_person::QuaternionAdditiveTransform;
pub use matrix::MatrixTransform;
pub use spatial::SpatialAdditiveTransform;

use std::io::{Read, Write};

use glam::{Mat4, Quat, Vec3};

use crate::io::{read_string, write_string};
use crate::math::DualQuat;
use crate::{RigError, Result};

// ============================================================================
// 旋转轴
// ============================================================================

/// 按轴旋转时使用的坐标轴
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    #[inline]
    pub fn unit(self) -> Vec3 {
        match self {
            Axis::X => Vec3::X,
            Axis::Y => Vec3::Y,
            Axis::Z => Vec3::Z,
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

impl TryFrom<u8> for Axis {
    type Error = RigError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Axis::X),
            1 => Ok(Axis::Y),
            2 => Ok(Axis::Z),
            other => Err(RigError::InvalidAxis(other)),
        }
    }
}

// ============================================================================
// 变体参数接口
// ============================================================================

/// 变体的参数化接口
///
/// 实现者只负责参数本身，脏标记与矩阵缓存由 [`Transform`] 统一管理。
pub trait PoseParams {
    /// 序列化时写在最前面的类型名
    const KIND: &'static str;

    /// 重置为中性姿态（零平移、单位旋转、单位缩放）
    fn reset(&mut self);
    /// 与中性姿态严格相等（不带容差）
    fn is_neutral(&self) -> bool;
    /// 从矩阵分解出本变体的参数
    fn decompose_from(&mut self, m: Mat4);

    fn translate(&mut self, delta: Vec3);
    fn rotate_axis(&mut self, axis: Axis, angle: f32);
    fn rotate(&mut self, rotation: Quat);
    fn scale(&mut self, factor: Vec3);
    fn set_position(&mut self, position: Vec3);
    fn set_rotation(&mut self, rotation: Quat);
    fn set_scale(&mut self, scale: Vec3);
    /// 使本地 Z 轴指向 `direction`，零向量忽略
    fn set_direction_z(&mut self, direction: Vec3);

    /// 从当前参数重建矩阵
    fn compose(&mut self) -> Mat4;

    fn position(&self) -> Vec3;
    fn rotation(&self) -> Quat;
    fn scale_factor(&self) -> Vec3;

    fn read_params<R: Read>(&mut self, reader: &mut R) -> Result<()>;
    fn write_params<W: Write>(&self, writer: &mut W) -> Result<()>;
}

/// 以欧拉角 (pitch, yaw, roll) 设置旋转的能力
///
/// 对偶四元数变体不实现该接口。
pub trait EulerParams {
    fn set_rotation_euler(&mut self, euler: Vec3);
    fn euler(&self) -> Vec3;
}

// ============================================================================
// 变体集合
// ============================================================================

/// 变换变体
#[derive(Clone, Debug, PartialEq)]
pub enum TransformKind {
    /// 矩阵变换（旋转累积）
    Matrix(MatrixTransform),
    /// 欧拉加算变换
    EulerAdditive(EulerAdditiveTransform),
    /// 第一人称变换（偏航相对平移）
    QuaternionAdditive(QuaternionAdditiveTransform),
    /// 对偶四元数变换
    DualQuaternion(DualQuaternionTransform),
    /// 空间变换（完整旋转相对平移）
    SpatialAdditive(SpatialAdditiveTransform),
}

macro_rules! dispatch {
    ($kind:expr, $p:ident => $body:expr) => {
        match $kind {
            TransformKind::Matrix($p) => $body,
            TransformKind::EulerAdditive($p) => $body,
            TransformKind::QuaternionAdditive($p) => $body,
            TransformKind::DualQuaternion($p) => $body,
            TransformKind::SpatialAdditive($p) => $body,
        }
    };
}

impl TransformKind {
    /// 类型名
    pub fn name(&self) -> &'static str {
        match self {
            TransformKind::Matrix(_) => MatrixTransform::KIND,
            TransformKind::EulerAdditive(_) => EulerAdditiveTransform::KIND,
            TransformKind::QuaternionAdditive(_) => QuaternionAdditiveTransform::KIND,
            TransformKind::DualQuaternion(_) => DualQuaternionTransform::KIND,
            TransformKind::SpatialAdditive(_) => SpatialAdditiveTransform::KIND,
        }
    }

    /// 按类型名创建中性姿态的变体
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            MatrixTransform::KIND => Ok(TransformKind::Matrix(MatrixTransform::default())),
            EulerAdditiveTransform::KIND => Ok(TransformKind::EulerAdditive(EulerAdditiveTransform::default())),
            QuaternionAdditiveTransform::KIND => {
                Ok(TransformKind::QuaternionAdditive(QuaternionAdditiveTransform::default()))
            }
            DualQuaternionTransform::KIND => Ok(TransformKind::DualQuaternion(DualQuaternionTransform::default())),
            SpatialAdditiveTransform::KIND => Ok(TransformKind::SpatialAdditive(SpatialAdditiveTransform::default())),
            other => Err(RigError::UnknownTransformKind(other.to_string())),
        }
    }
}

// ============================================================================
// 变换（带缓存）
// ============================================================================

/// 带惰性矩阵缓存的变换
///
/// - `matrix` 仅在 `!dirty` 时有效
/// - `has_updated` 为边沿触发：重建真正改变矩阵时置位，由使用者显式清除
#[derive(Clone, Debug)]
pub struct Transform {
    kind: TransformKind,
    matrix: Mat4,
    dirty: bool,
    has_updated: bool,
}

impl Transform {
    /// 创建新变换（首次读取时计算矩阵）
    pub fn new(kind: TransformKind) -> Self {
        Self {
            kind,
            matrix: Mat4::IDENTITY,
            dirty: true,
            has_updated: false,
        }
    }

    pub fn new_matrix() -> Self {
        Self::new(TransformKind::Matrix(MatrixTransform::default()))
    }

    pub fn new_euler_additive() -> Self {
        Self::new(TransformKind::EulerAdditive(EulerAdditiveTransform::default()))
    }

    pub fn new_first_person() -> Self {
        Self::new(TransformKind::QuaternionAdditive(QuaternionAdditiveTransform::default()))
    }

    pub fn new_dual_quaternion() -> Self {
        Self::new(TransformKind::DualQuaternion(DualQuaternionTransform::default()))
    }

    pub fn new_spatial() -> Self {
        Self::new(TransformKind::SpatialAdditive(SpatialAdditiveTransform::default()))
    }

    // ========================================
    // 缓存协议
    // ========================================

    /// 若为脏则从参数重建矩阵
    ///
    /// 返回 true 表示确实发生了重建；false 表示无事可做，调用方可跳过下游工作。
    pub fn update(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        let matrix = dispatch!(&mut self.kind, p => p.compose());
        if matrix != self.matrix {
            self.has_updated = true;
        }
        self.matrix = matrix;
        self.dirty = false;
        true
    }

    /// 无条件重建（外部依赖变化而本地参数未变时使用）
    pub fn force_update(&mut self) -> bool {
        self.dirty = true;
        self.update()
    }

    /// 读取矩阵；脏则先重建
    pub fn matrix(&mut self) -> Mat4 {
        self.update();
        self.matrix
    }

    /// 缓存的矩阵，脏时返回 None
    #[inline]
    pub fn cached_matrix(&self) -> Option<Mat4> {
        if self.dirty {
            None
        } else {
            Some(self.matrix)
        }
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub fn has_updated(&self) -> bool {
        self.has_updated
    }

    #[inline]
    pub fn clear_updated(&mut self) {
        self.has_updated = false;
    }

    #[inline]
    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    // ========================================
    // 中性姿态
    // ========================================

    /// 重置为中性姿态，矩阵置为单位阵且不再为脏
    pub fn identity(&mut self) {
        dispatch!(&mut self.kind, p => p.reset());
        if self.matrix != Mat4::IDENTITY {
            self.has_updated = true;
        }
        self.matrix = Mat4::IDENTITY;
        self.dirty = false;
    }

    pub fn is_identity(&self) -> bool {
        dispatch!(&self.kind, p => p.is_neutral())
    }

    /// 分解矩阵为本变体参数，并立即重建缓存
    ///
    /// 无法表示剪切的变体会丢失剪切分量。
    pub fn set_matrix(&mut self, m: Mat4) {
        dispatch!(&mut self.kind, p => p.decompose_from(m));
        self.force_update();
    }

    // ========================================
    // 修改（只标记脏）
    // ========================================

    pub fn translate(&mut self, delta: Vec3) {
        dispatch!(&mut self.kind, p => p.translate(delta));
        self.mark_dirty();
    }

    pub fn rotate_axis(&mut self, axis: Axis, angle: f32) {
        dispatch!(&mut self.kind, p => p.rotate_axis(axis, angle));
        self.mark_dirty();
    }

    /// 以轴索引旋转，索引必须是 0 (X)、1 (Y) 或 2 (Z)
    pub fn rotate_axis_index(&mut self, axis: u8, angle: f32) -> Result<()> {
        let axis = Axis::try_from(axis)?;
        self.rotate_axis(axis, angle);
        Ok(())
    }

    pub fn rotate(&mut self, rotation: Quat) {
        dispatch!(&mut self.kind, p => p.rotate(rotation));
        self.mark_dirty();
    }

    pub fn scale(&mut self, factor: Vec3) {
        dispatch!(&mut self.kind, p => p.scale(factor));
        self.mark_dirty();
    }

    pub fn set_position(&mut self, position: Vec3) {
        dispatch!(&mut self.kind, p => p.set_position(position));
        self.mark_dirty();
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        dispatch!(&mut self.kind, p => p.set_rotation(rotation));
        self.mark_dirty();
    }

    /// 以欧拉角 (pitch, yaw, roll) 设置旋转
    pub fn set_rotation_euler(&mut self, euler: Vec3) -> Result<()> {
        match &mut self.kind {
            TransformKind::Matrix(p) => p.set_rotation_euler(euler),
            TransformKind::EulerAdditive(p) => p.set_rotation_euler(euler),
            TransformKind::QuaternionAdditive(p) => p.set_rotation_euler(euler),
            TransformKind::SpatialAdditive(p) => p.set_rotation_euler(euler),
            TransformKind::DualQuaternion(_) => {
                return Err(RigError::Unsupported {
                    kind: DualQuaternionTransform::KIND,
                    operation: "euler rotation",
                });
            }
        }
        self.mark_dirty();
        Ok(())
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        dispatch!(&mut self.kind, p => p.set_scale(scale));
        self.mark_dirty();
    }

    pub fn set_direction_z(&mut self, direction: Vec3) {
        dispatch!(&mut self.kind, p => p.set_direction_z(direction));
        self.mark_dirty();
    }

    /// 左乘一个对偶四元数（仅对偶四元数变体）
    pub fn transform(&mut self, dq: DualQuat) -> Result<()> {
        match &mut self.kind {
            TransformKind::DualQuaternion(p) => p.transform(dq),
            other => {
                return Err(RigError::Unsupported {
                    kind: other.name(),
                    operation: "dual quaternion transform",
                });
            }
        }
        self.mark_dirty();
        Ok(())
    }

    // ========================================
    // 访问器
    // ========================================

    #[inline]
    pub fn kind(&self) -> &TransformKind {
        &self.kind
    }

    /// 可变访问变体参数；保守地标记为脏
    pub fn kind_mut(&mut self) -> &mut TransformKind {
        self.dirty = true;
        &mut self.kind
    }

    #[inline]
    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn position(&self) -> Vec3 {
        dispatch!(&self.kind, p => p.position())
    }

    pub fn rotation(&self) -> Quat {
        dispatch!(&self.kind, p => p.rotation())
    }

    pub fn scale_factor(&self) -> Vec3 {
        dispatch!(&self.kind, p => p.scale_factor())
    }

    /// 当前旋转的欧拉角 (pitch, yaw, roll)；对偶四元数变体返回 None
    pub fn euler(&self) -> Option<Vec3> {
        match &self.kind {
            TransformKind::Matrix(p) => Some(p.euler()),
            TransformKind::EulerAdditive(p) => Some(p.euler()),
            TransformKind::QuaternionAdditive(p) => Some(p.euler()),
            TransformKind::SpatialAdditive(p) => Some(p.euler()),
            TransformKind::DualQuaternion(_) => None,
        }
    }

    pub fn as_first_person(&self) -> Option<&QuaternionAdditiveTransform> {
        match &self.kind {
            TransformKind::QuaternionAdditive(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_euler_additive(&self) -> Option<&EulerAdditiveTransform> {
        match &self.kind {
            TransformKind::EulerAdditive(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_dual_quaternion(&self) -> Option<&DualQuaternionTransform> {
        match &self.kind {
            TransformKind::DualQuaternion(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_spatial(&self) -> Option<&SpatialAdditiveTransform> {
        match &self.kind {
            TransformKind::SpatialAdditive(p) => Some(p),
            _ => None,
        }
    }

    // ========================================
    // 序列化
    // ========================================

    /// 写出：类型名，然后是变体参数
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_string(writer, self.kind_name())?;
        dispatch!(&self.kind, p => p.write_params(writer))
    }

    /// 读入：按类型名构建变体，读取参数后立即重建矩阵
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let name = read_string(reader, "transform kind")?;
        let mut kind = TransformKind::from_name(&name)?;
        dispatch!(&mut kind, p => p.read_params(reader))?;

        let mut transform = Self::new(kind);
        transform.force_update();
        transform.clear_updated();
        Ok(transform)
    }
}

impl Default for Transform {
    fn default() -> Self {
        let mut transform = Self::new_matrix();
        transform.identity();
        transform
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{compose, mat4_approx_eq};
    use std::f32::consts::FRAC_PI_2;
    use std::io::Cursor;

    fn all_kinds() -> Vec<Transform> {
        vec![
            Transform::new_matrix(),
            Transform::new_euler_additive(),
            Transform::new_first_person(),
            Transform::new_dual_quaternion(),
            Transform::new_spatial(),
        ]
    }

    #[test]
    fn test_identity_for_every_kind() {
        for mut t in all_kinds() {
            t.translate(Vec3::new(1.0, 2.0, 3.0));
            t.rotate_axis(Axis::Y, 0.5);
            t.set_scale(Vec3::splat(2.0));
            t.identity();

            assert!(!t.is_dirty(), "{}", t.kind_name());
            assert!(t.is_identity(), "{}", t.kind_name());
            assert_eq!(t.matrix(), Mat4::IDENTITY, "{}", t.kind_name());
        }
    }

    #[test]
    fn test_matrix_is_pure_in_parameters() {
        for mut t in all_kinds() {
            t.set_position(Vec3::new(1.0, -1.0, 0.5));
            t.rotate_axis(Axis::X, 0.3);
            t.rotate_axis(Axis::Y, -0.8);
            t.set_scale(Vec3::new(1.5, 1.5, 1.5));

            let first = t.matrix();
            let second = t.matrix();
            assert_eq!(first, second);

            let expected = compose(t.scale_factor(), t.rotation(), t.position());
            assert!(mat4_approx_eq(&first, &expected, 1e-5), "{}", t.kind_name());
        }
    }

    #[test]
    fn test_set_matrix_roundtrip() {
        let m = compose(
            Vec3::splat(1.25),
            Quat::from_euler(glam::EulerRot::YXZ, 0.6, -0.4, 0.2),
            Vec3::new(3.0, -2.0, 7.0),
        );
        for mut t in all_kinds() {
            t.set_matrix(m);
            assert!(!t.is_dirty());
            assert!(mat4_approx_eq(&t.matrix(), &m, 1e-5), "{}", t.kind_name());
        }
    }

    #[test]
    fn test_update_is_idempotent() {
        for mut t in all_kinds() {
            t.translate(Vec3::X);
            assert!(t.update());
            let m = t.cached_matrix().unwrap();
            assert!(!t.update());
            assert_eq!(t.cached_matrix().unwrap(), m);
        }
    }

    #[test]
    fn test_setters_mark_dirty() {
        for mut t in all_kinds() {
            t.identity();
            assert!(!t.is_dirty());

            t.set_scale(Vec3::ONE);
            assert!(t.is_dirty());
            assert!(t.cached_matrix().is_none());

            t.matrix();
            assert!(!t.is_dirty());

            t.set_direction_z(Vec3::X);
            assert!(t.is_dirty());
        }
    }

    #[test]
    fn test_has_updated_is_edge_triggered() {
        let mut t = Transform::new_matrix();
        t.identity();
        t.clear_updated();

        // 参数未变，重建后矩阵相同
        t.force_update();
        assert!(!t.has_updated());

        t.translate(Vec3::Y);
        t.update();
        assert!(t.has_updated());
        // 不随 dirty 自动清除
        t.update();
        assert!(t.has_updated());

        t.clear_updated();
        assert!(!t.has_updated());
    }

    #[test]
    fn test_axis_index_rejects_w() {
        let mut t = Transform::new_matrix();
        assert!(t.rotate_axis_index(1, FRAC_PI_2).is_ok());
        assert!(matches!(t.rotate_axis_index(3, 0.1), Err(RigError::InvalidAxis(3))));
    }

    #[test]
    fn test_euler_rotation_unsupported_on_dual_quaternion() {
        let mut t = Transform::new_dual_quaternion();
        t.matrix();
        let err = t.set_rotation_euler(Vec3::new(0.1, 0.2, 0.3));
        assert!(matches!(err, Err(RigError::Unsupported { .. })));
        assert!(!t.is_dirty());

        let mut m = Transform::new_matrix();
        assert!(m.transform(DualQuat::IDENTITY).is_err());
    }

    #[test]
    fn test_euler_accessor() {
        let euler = Vec3::new(0.3, -1.1, 0.6);
        for mut t in [
            Transform::new_matrix(),
            Transform::new_euler_additive(),
            Transform::new_first_person(),
            Transform::new_spatial(),
        ] {
            t.set_rotation_euler(euler).unwrap();
            let read = t.euler().unwrap();
            assert!((read - euler).length() < 1e-5, "{}: {:?}", t.kind_name(), read);
        }

        let mut dq = Transform::new_dual_quaternion();
        dq.rotate_axis(Axis::Y, 0.5);
        assert_eq!(dq.euler(), None);
    }

    #[test]
    fn test_serialization_roundtrip() {
        for mut t in all_kinds() {
            t.set_position(Vec3::new(0.5, 1.0, -2.0));
            t.rotate_axis(Axis::Y, 0.75);
            t.set_scale(Vec3::new(2.0, 2.0, 2.0));

            let mut buf = Vec::new();
            t.write_to(&mut buf).unwrap();

            let mut loaded = Transform::read_from(&mut Cursor::new(buf)).unwrap();
            assert_eq!(loaded.kind_name(), t.kind_name());
            assert!(!loaded.is_dirty());
            assert!(mat4_approx_eq(&loaded.matrix(), &t.matrix(), 1e-5), "{}", t.kind_name());
        }
    }

    #[test]
    fn test_unknown_kind() {
        let mut buf = Vec::new();
        write_string(&mut buf, "ShearTransform").unwrap();
        let err = Transform::read_from(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, RigError::UnknownTransformKind(name) if name == "ShearTransform"));
    }
}
