//! 骨骼系统
//!
//! 核心设计思想：
//! - Skeleton: 骨骼池（arena），持有唯一的根骨骼及整棵子树
//! - Bone: 单个骨骼节点，持有本地变换
//! - BoneId: 带代数与骨架标识的句柄，骨骼删除或骨架复制后旧句柄不会误指

mod bone;

pub use bone::{Bone, BoneFlags};

use std::io::{Read, Write};
use std::sync::atomic::{AtomicU32, Ordering};

use byteorder::{LittleEndian, WriteBytesExt};
use glam::Mat4;

use crate::io::{read_i32, read_string, read_u32, write_string};
use crate::transform::Transform;
use crate::{RigError, Result};

/// 骨架标识分配器
static NEXT_SKELETON_ID: AtomicU32 = AtomicU32::new(1);

/// 反序列化时的骨骼数量上限
const MAX_SERIALIZED_BONES: u32 = 1 << 16;

// ============================================================================
// 句柄
// ============================================================================

/// 骨骼句柄
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoneId {
    skeleton: u32,
    index: u32,
    generation: u32,
}

impl BoneId {
    /// 池内索引
    #[inline]
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

#[derive(Clone, Debug)]
struct BoneSlot {
    generation: u32,
    bone: Option<Bone>,
}

// ============================================================================
// 骨架
// ============================================================================

/// 骨架
#[derive(Debug)]
pub struct Skeleton {
    id: u32,
    slots: Vec<BoneSlot>,
    free: Vec<u32>,
    root: Option<BoneId>,
    /// 外部持有者（网格/场景节点）的世界矩阵
    owner_matrix: Mat4,
    owner_version: u64,
}

impl Skeleton {
    pub fn new() -> Self {
        Self {
            id: NEXT_SKELETON_ID.fetch_add(1, Ordering::Relaxed),
            slots: Vec::new(),
            free: Vec::new(),
            root: None,
            owner_matrix: Mat4::IDENTITY,
            owner_version: 0,
        }
    }

    // ========================================
    // 构建
    // ========================================

    /// 创建骨骼并挂到 `parent` 下；`parent` 为 None 时成为根骨骼
    pub fn create_bone(
        &mut self,
        name: impl Into<String>,
        parent: Option<BoneId>,
        end_effector: bool,
    ) -> Result<BoneId> {
        let name = name.into();
        match parent {
            Some(parent_id) => {
                let parent_bone = self.bone(parent_id).ok_or(RigError::InvalidBone)?;
                if parent_bone.is_end_effector() {
                    log::warn!("[Skeleton] 末端骨骼 '{}' 下挂接了子骨骼 '{}'", parent_bone.name, name);
                }
            }
            None if self.root.is_some() => return Err(RigError::RootAlreadyExists),
            None => {}
        }

        let flags = if end_effector {
            BoneFlags::END_EFFECTOR
        } else {
            BoneFlags::empty()
        };
        Ok(self.insert_bone(name, flags, Transform::new_matrix(), parent))
    }

    /// 插入骨骼，调用方保证 `parent` 有效且根骨骼唯一
    fn insert_bone(&mut self, name: String, flags: BoneFlags, transform: Transform, parent: Option<BoneId>) -> BoneId {
        let bone = Bone::new(name, flags, transform, parent);
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize].bone = Some(bone);
                index
            }
            None => {
                self.slots.push(BoneSlot { generation: 0, bone: Some(bone) });
                (self.slots.len() - 1) as u32
            }
        };
        let id = BoneId {
            skeleton: self.id,
            index,
            generation: self.slots[index as usize].generation,
        };

        match parent {
            Some(parent_id) => {
                if let Some(parent_bone) = self.bone_mut(parent_id) {
                    parent_bone.children.push(id);
                }
            }
            None => self.root = Some(id),
        }
        id
    }

    /// 删除骨骼及其整棵子树，返回删除的骨骼数
    pub fn remove_bone(&mut self, id: BoneId) -> Result<usize> {
        let parent = self.bone(id).ok_or(RigError::InvalidBone)?.parent;
        match parent {
            Some(parent_id) => {
                if let Some(parent_bone) = self.bone_mut(parent_id) {
                    parent_bone.children.retain(|child| *child != id);
                }
            }
            None => self.root = None,
        }

        let subtree = self.subtree(id);
        for bone_id in &subtree {
            let slot = &mut self.slots[bone_id.index()];
            slot.bone = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(bone_id.index);
        }
        Ok(subtree.len())
    }

    // ========================================
    // 访问
    // ========================================

    /// 句柄是否属于本骨架且仍然有效
    #[inline]
    pub fn contains(&self, id: BoneId) -> bool {
        self.bone(id).is_some()
    }

    pub fn bone(&self, id: BoneId) -> Option<&Bone> {
        if id.skeleton != self.id {
            return None;
        }
        let slot = self.slots.get(id.index())?;
        if slot.generation != id.generation {
            return None;
        }
        slot.bone.as_ref()
    }

    pub fn bone_mut(&mut self, id: BoneId) -> Option<&mut Bone> {
        if id.skeleton != self.id {
            return None;
        }
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation != id.generation {
            return None;
        }
        slot.bone.as_mut()
    }

    /// 本地变换（动画写入入口）
    #[inline]
    pub fn transform_mut(&mut self, id: BoneId) -> Option<&mut Transform> {
        self.bone_mut(id).map(|bone| &mut bone.transform)
    }

    #[inline]
    pub fn root(&self) -> Option<BoneId> {
        self.root
    }

    #[inline]
    pub fn parent(&self, id: BoneId) -> Option<BoneId> {
        self.bone(id)?.parent
    }

    pub fn children(&self, id: BoneId) -> &[BoneId] {
        self.bone(id).map(|bone| bone.children.as_slice()).unwrap_or(&[])
    }

    pub fn bone_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.bone.is_some()).count()
    }

    /// 深度优先遍历（父先于子，兄弟按创建顺序）
    pub fn depth_first(&self) -> Vec<BoneId> {
        match self.root {
            Some(root) => self.subtree(root),
            None => Vec::new(),
        }
    }

    /// 按名称查找（深度优先的第一个匹配）
    pub fn find_bone(&self, name: &str) -> Option<BoneId> {
        self.depth_first()
            .into_iter()
            .find(|id| self.bone(*id).is_some_and(|bone| bone.name == name))
    }

    fn subtree(&self, id: BoneId) -> Vec<BoneId> {
        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(bone) = self.bone(current) {
                result.push(current);
                stack.extend(bone.children.iter().rev().copied());
            }
        }
        result
    }

    // ========================================
    // 持有者矩阵
    // ========================================

    /// 设置外部持有者的世界矩阵，所有骨骼的绝对矩阵随之失效
    pub fn set_owner_matrix(&mut self, matrix: Mat4) {
        if matrix != self.owner_matrix {
            self.owner_matrix = matrix;
            self.owner_version = self.owner_version.wrapping_add(1);
        }
    }

    #[inline]
    pub fn owner_matrix(&self) -> Mat4 {
        self.owner_matrix
    }

    // ========================================
    // 绝对矩阵
    // ========================================

    /// 骨骼的绝对矩阵 = 持有者矩阵 * 根本地 * ... * 本地
    ///
    /// 沿祖先链自上而下刷新，只重算本地变换或父级变化过的节点。
    pub fn absolute_matrix(&mut self, id: BoneId) -> Option<Mat4> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(bone_id) = current {
            let bone = self.bone(bone_id)?;
            chain.push(bone_id.index());
            current = bone.parent;
        }

        let mut parent_matrix = self.owner_matrix;
        let mut parent_version = self.owner_version;
        for &index in chain.iter().rev() {
            let bone = self.slots[index].bone.as_mut()?;
            bone.refresh_absolute(parent_matrix, parent_version);
            parent_matrix = bone.absolute;
            parent_version = bone.version;
        }
        Some(parent_matrix)
    }

    /// 自上而下刷新整棵树，返回重算的骨骼数
    pub fn update_absolute_matrices(&mut self) -> usize {
        let Some(root) = self.root else {
            return 0;
        };

        let mut recomputed = 0;
        let mut stack = vec![(root.index(), self.owner_matrix, self.owner_version)];
        while let Some((index, parent_matrix, parent_version)) = stack.pop() {
            let Some(bone) = self.slots[index].bone.as_mut() else {
                continue;
            };
            if bone.refresh_absolute(parent_matrix, parent_version) {
                recomputed += 1;
            }
            for child in &bone.children {
                stack.push((child.index(), bone.absolute, bone.version));
            }
        }
        recomputed
    }

    /// 当前姿态下一组骨骼的绝对矩阵，用作 Skin 的参考矩阵
    pub fn bind_pose_matrices(&mut self, bones: &[BoneId]) -> Result<Vec<Mat4>> {
        bones
            .iter()
            .map(|id| self.absolute_matrix(*id).ok_or(RigError::InvalidBone))
            .collect()
    }

    // ========================================
    // 复制
    // ========================================

    /// 深拷贝整棵骨骼树：名称、标志和本地变换保留，句柄全部是新的
    pub fn duplicate(&self) -> Skeleton {
        let mut copy = Skeleton::new();
        copy.owner_matrix = self.owner_matrix;

        let Some(root) = self.root else {
            return copy;
        };

        let mut stack: Vec<(BoneId, Option<BoneId>)> = vec![(root, None)];
        while let Some((source_id, new_parent)) = stack.pop() {
            let Some(source) = self.bone(source_id) else {
                continue;
            };
            let new_id = copy.insert_bone(source.name.clone(), source.flags, source.transform.clone(), new_parent);
            for child in source.children.iter().rev() {
                stack.push((*child, Some(new_id)));
            }
        }

        log::debug!("[Skeleton] 复制骨架: {} 个骨骼", copy.bone_count());
        copy
    }

    /// 赋值：丢弃当前骨骼并深拷贝 `other`
    pub fn copy_from(&mut self, other: &Skeleton) {
        *self = other.duplicate();
    }

    // ========================================
    // 序列化
    // ========================================

    /// 写出：骨骼数，然后按深度优先写 名称、父序号(-1 为根)、标志、本地变换
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let order = self.depth_first();
        writer.write_u32::<LittleEndian>(order.len() as u32)?;

        for id in &order {
            let Some(bone) = self.bone(*id) else {
                continue;
            };
            let parent_index = bone
                .parent
                .and_then(|parent| order.iter().position(|other| *other == parent))
                .map_or(-1, |position| position as i32);

            write_string(writer, &bone.name)?;
            writer.write_i32::<LittleEndian>(parent_index)?;
            writer.write_u32::<LittleEndian>(bone.flags.bits())?;
            bone.transform.write_to(writer)?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let count = read_u32(reader, "bone count")?;
        if count > MAX_SERIALIZED_BONES {
            return Err(RigError::Format(format!("bone count {} exceeds limit", count)));
        }

        let mut skeleton = Skeleton::new();
        let mut ids: Vec<BoneId> = Vec::with_capacity(count as usize);
        for i in 0..count as usize {
            let name = read_string(reader, "bone name")?;
            let parent_index = read_i32(reader, "parent index")?;
            let flags = BoneFlags::from_bits_truncate(read_u32(reader, "bone flags")?);
            let transform = Transform::read_from(reader)?;

            let parent = if parent_index < 0 {
                if i != 0 {
                    return Err(RigError::Format(format!("bone '{}' is a second root", name)));
                }
                None
            } else {
                let parent_index = parent_index as usize;
                if parent_index >= i {
                    return Err(RigError::Format(format!(
                        "bone '{}' references parent {} before it is defined",
                        name, parent_index
                    )));
                }
                Some(ids[parent_index])
            };
            ids.push(skeleton.insert_bone(name, flags, transform, parent));
        }
        Ok(skeleton)
    }
}

impl Default for Skeleton {
    fn default() -> Self {
        Self::new()
    }
}
