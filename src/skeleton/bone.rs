//! 骨骼节点
//!
//! Bone 是骨骼层次中的单个节点，拥有自己的本地变换。
//! 绝对矩阵 = 父骨骼绝对矩阵 * 本地矩阵（根骨骼的父为骨架持有者矩阵）。

use bitflags::bitflags;
use glam::Mat4;

use crate::transform::Transform;

use super::BoneId;

// ============================================================================
// 骨骼标志
// ============================================================================

bitflags! {
    /// 骨骼标志位
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct BoneFlags: u32 {
        /// 末端骨骼（指尖等），按约定不再挂接子骨骼
        const END_EFFECTOR = 1 << 0;
    }
}

// ============================================================================
// 骨骼节点
// ============================================================================

/// 骨骼节点
///
/// - 静态数据：名称、标志、父子关系
/// - 动态数据：本地变换（动画写入），绝对矩阵缓存（读取时惰性重建）
#[derive(Clone, Debug)]
pub struct Bone {
    /// 骨骼名称
    pub name: String,

    /// 骨骼标志
    pub flags: BoneFlags,

    /// 本地变换 (local_to_parent)
    pub transform: Transform,

    /// 父骨骼（None 表示根骨骼）
    pub(crate) parent: Option<BoneId>,

    /// 子骨骼（有序）
    pub(crate) children: Vec<BoneId>,

    /// 上次组合时使用的本地矩阵
    pub(crate) local: Mat4,

    /// 绝对矩阵缓存 (local_to_world)
    pub(crate) absolute: Mat4,

    /// 绝对矩阵每次重建递增
    pub(crate) version: u64,

    /// 上次重建时看到的父级版本
    pub(crate) seen_parent_version: u64,
}

impl Bone {
    pub(crate) fn new(name: String, flags: BoneFlags, transform: Transform, parent: Option<BoneId>) -> Self {
        Self {
            name,
            flags,
            transform,
            parent,
            children: Vec::new(),
            local: Mat4::IDENTITY,
            absolute: Mat4::IDENTITY,
            version: 0,
            seen_parent_version: u64::MAX,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn parent(&self) -> Option<BoneId> {
        self.parent
    }

    #[inline]
    pub fn children(&self) -> &[BoneId] {
        &self.children
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    #[inline]
    pub fn is_end_effector(&self) -> bool {
        self.flags.contains(BoneFlags::END_EFFECTOR)
    }

    /// 上次计算的绝对矩阵
    ///
    /// 可能已过期，需要最新值时使用 `Skeleton::absolute_matrix`。
    #[inline]
    pub fn last_absolute_matrix(&self) -> Mat4 {
        self.absolute
    }

    /// 由父级绝对矩阵重建；本地矩阵或父级版本变化时才重算
    pub(crate) fn refresh_absolute(&mut self, parent_matrix: Mat4, parent_version: u64) -> bool {
        let local = self.transform.matrix();
        if self.seen_parent_version == parent_version && local == self.local {
            return false;
        }
        self.local = local;
        self.absolute = parent_matrix * local;
        self.seen_parent_version = parent_version;
        self.version = self.version.wrapping_add(1);
        true
    }
}
