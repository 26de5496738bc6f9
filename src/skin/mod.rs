//! 蒙皮系统
//!
//! - Skin: 骨骼引用 + 参考矩阵 + 预计算逆参考矩阵 + 每帧蒙皮矩阵
//! - 硬件路径：整组蒙皮矩阵上传给着色器，GPU 做逐顶点混合
//! - 软件路径：CPU 直接变换顶点位置与法线后交给渲染器

mod binding;
mod bounds;
mod deform;
mod pipeline;

pub use binding::AttachReport;
pub use bounds::BoundingBox;
pub use pipeline::{Skin, SkinFlags, SkinState};

use glam::{Mat4, Vec3};

use crate::{RigError, Result};

/// 每个顶点最多受影响的骨骼数
pub const MAX_INFLUENCES: usize = 4;

// ============================================================================
// 蒙皮类型
// ============================================================================

/// 蒙皮方式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkinKind {
    /// 加权多骨骼混合
    Skinning,
    /// 每顶点单骨骼（只使用第一个影响）
    Rigging,
}

impl SkinKind {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            SkinKind::Skinning => 0,
            SkinKind::Rigging => 1,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(SkinKind::Skinning),
            1 => Ok(SkinKind::Rigging),
            other => Err(RigError::Format(format!("unknown skin kind {}", other))),
        }
    }
}

// ============================================================================
// 顶点影响
// ============================================================================

/// 单个顶点的骨骼影响（未使用的槽位权重为 0）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VertexInfluences {
    /// Skin 内的骨骼序号
    pub bones: [u16; MAX_INFLUENCES],
    pub weights: [f32; MAX_INFLUENCES],
}

impl Default for VertexInfluences {
    fn default() -> Self {
        Self {
            bones: [0; MAX_INFLUENCES],
            weights: [0.0; MAX_INFLUENCES],
        }
    }
}

impl VertexInfluences {
    /// 单骨骼影响
    pub fn single(bone: u16) -> Self {
        let mut influences = Self::default();
        influences.bones[0] = bone;
        influences.weights[0] = 1.0;
        influences
    }

    /// 多骨骼影响，超过 MAX_INFLUENCES 时保留权重最大的几个，并归一化
    pub fn weighted(pairs: &[(u16, f32)]) -> Self {
        let mut sorted: Vec<(u16, f32)> = pairs.iter().copied().filter(|(_, w)| *w > 0.0).collect();
        sorted.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut influences = Self::default();
        for (slot, (bone, weight)) in sorted.into_iter().take(MAX_INFLUENCES).enumerate() {
            influences.bones[slot] = bone;
            influences.weights[slot] = weight;
        }
        influences.normalize();
        influences
    }

    /// 权重归一化为和 1.0
    pub fn normalize(&mut self) {
        let sum: f32 = self.weights.iter().sum();
        if sum > 0.0 {
            for w in &mut self.weights {
                *w /= sum;
            }
        }
    }

    /// 非零影响数
    pub fn influence_count(&self) -> usize {
        self.weights.iter().filter(|&&w| w > 0.0).count()
    }
}

// ============================================================================
// 网格
// ============================================================================

/// 绑定姿态下的网格顶点数据
#[derive(Clone, Debug, Default)]
pub struct SkinMesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub influences: Vec<VertexInfluences>,
}

impl SkinMesh {
    pub fn new(positions: Vec<Vec3>, normals: Vec<Vec3>, influences: Vec<VertexInfluences>) -> Result<Self> {
        if positions.len() != normals.len() || positions.len() != influences.len() {
            return Err(RigError::Format(format!(
                "mesh attribute length mismatch: {} positions, {} normals, {} influences",
                positions.len(),
                normals.len(),
                influences.len()
            )));
        }
        Ok(Self {
            positions,
            normals,
            influences,
        })
    }

    /// 三组属性都齐全的顶点数
    ///
    /// 字段是公开的，长度可能在构造后被改乱；多出的属性被忽略。
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len().min(self.normals.len()).min(self.influences.len())
    }

    /// 三组属性长度是否一致
    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.positions.len() == self.normals.len() && self.positions.len() == self.influences.len()
    }
}

// ============================================================================
// 渲染器接口
// ============================================================================

/// 蒙皮绘制所需的渲染层接口
///
/// 由调用方注入，Skin 不接触任何全局渲染状态。
pub trait SkinRenderer {
    /// 是否支持在顶点着色器中混合
    fn supports_hardware_skinning(&self) -> bool {
        true
    }

    /// 着色器矩阵数组容量
    fn max_hardware_bones(&self) -> usize;

    /// 上传整组蒙皮矩阵（硬件路径）
    fn upload_bone_matrices(&mut self, matrices: &[Mat4]);

    /// 提交顶点；`skinned_on_gpu` 为 true 时顶点为绑定姿态，由着色器混合
    fn draw_vertices(&mut self, positions: &[Vec3], normals: &[Vec3], skinned_on_gpu: bool);
}
