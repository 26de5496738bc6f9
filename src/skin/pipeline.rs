//! 每帧蒙皮管线
//!
//! 状态机：Uninitialized → Precomputed → Ready
//!
//! - 预计算：precomputed[i] = inverse(ref[i]) * mesh_ref（矩阵求逆只在绑定数据变化时做）
//! - 每帧：skin[i] = absolute(bone[i]) * precomputed[i]
//! - 绑定姿态下 absolute == ref，蒙皮矩阵还原为 mesh_ref

use bitflags::bitflags;
use glam::{Mat4, Vec3};

use super::bounds::BoundingBox;
use super::deform::deform_vertices;
use super::{SkinKind, SkinMesh, SkinRenderer};
use crate::config::get_config;
use crate::skeleton::{BoneId, Skeleton};
use crate::{RigError, Result};

/// 参考矩阵可逆性阈值
const SINGULAR_EPSILON: f32 = 1e-12;

bitflags! {
    /// Skin 标志位
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct SkinFlags: u32 {
        /// 使用硬件蒙皮
        const HARDWARE = 1 << 0;
        /// update 时从蒙皮后顶点重建包围盒
        const BOUNDING_AUTO_REGEN = 1 << 1;
    }
}

/// Skin 状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkinState {
    /// 绑定数据有变化，尚未预计算
    Uninitialized,
    /// 逆参考矩阵已就绪
    Precomputed,
    /// 本帧蒙皮矩阵已计算
    Ready,
}

/// 蒙皮对象
#[derive(Clone, Debug)]
pub struct Skin {
    pub name: String,
    pub(super) kind: SkinKind,
    pub(super) flags: SkinFlags,
    pub(super) state: SkinState,

    // ========================================
    // 绑定数据（按骨骼序号）
    // ========================================
    /// 非拥有的骨骼句柄，骨骼属于外部骨架
    pub(super) bones: Vec<Option<BoneId>>,
    /// 稳定的骨骼名称，用于重新绑定
    pub(super) bone_names: Vec<String>,
    pub(super) ref_matrices: Vec<Mat4>,
    pub(super) mesh_ref_matrix: Mat4,

    // ========================================
    // 派生数据
    // ========================================
    precomputed_ref_matrices: Vec<Mat4>,
    skin_matrices: Vec<Mat4>,

    // ========================================
    // 网格
    // ========================================
    mesh: SkinMesh,
    skinned_positions: Vec<Vec3>,
    skinned_normals: Vec<Vec3>,
    bounds: BoundingBox,
}

impl Skin {
    /// 创建 Skin；骨骼数为 0，需要先调用 `set_num_bones`
    pub fn new(name: impl Into<String>, kind: SkinKind, mesh: SkinMesh) -> Self {
        let config = get_config();
        let mut flags = SkinFlags::empty();
        flags.set(SkinFlags::HARDWARE, config.hardware_skinning_default);
        flags.set(SkinFlags::BOUNDING_AUTO_REGEN, config.bounding_auto_regen);

        let name = name.into();
        if !mesh.is_consistent() {
            log::warn!(
                "[Skin] '{}' 网格属性长度不一致，只使用前 {} 个完整顶点",
                name,
                mesh.vertex_count()
            );
        }
        let bounds = BoundingBox::from_points(mesh.positions.iter().copied()).expanded(config.bounding_margin);
        Self {
            name,
            kind,
            flags,
            state: SkinState::Uninitialized,
            bones: Vec::new(),
            bone_names: Vec::new(),
            ref_matrices: Vec::new(),
            mesh_ref_matrix: Mat4::IDENTITY,
            precomputed_ref_matrices: Vec::new(),
            skin_matrices: Vec::new(),
            mesh,
            skinned_positions: Vec::new(),
            skinned_normals: Vec::new(),
            bounds,
        }
    }

    /// 以骨架当前姿态作为绑定姿态创建 Skin
    pub fn from_skeleton_bind_pose(
        name: impl Into<String>,
        kind: SkinKind,
        mesh: SkinMesh,
        skeleton: &mut Skeleton,
        bones: &[BoneId],
    ) -> Result<Self> {
        let ref_matrices = skeleton.bind_pose_matrices(bones)?;
        let mut skin = Self::new(name, kind, mesh);
        skin.set_num_bones(bones.len())?;
        for (i, (id, ref_matrix)) in bones.iter().zip(ref_matrices).enumerate() {
            skin.set_bone(i, skeleton, *id)?;
            skin.set_ref_matrix(i, ref_matrix)?;
        }
        Ok(skin)
    }

    // ========================================
    // 访问器
    // ========================================

    #[inline]
    pub fn kind(&self) -> SkinKind {
        self.kind
    }

    #[inline]
    pub fn state(&self) -> SkinState {
        self.state
    }

    #[inline]
    pub fn is_precomputed(&self) -> bool {
        self.state != SkinState::Uninitialized
    }

    #[inline]
    pub fn num_bones(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    pub fn uses_hardware(&self) -> bool {
        self.flags.contains(SkinFlags::HARDWARE)
    }

    #[inline]
    pub fn mesh(&self) -> &SkinMesh {
        &self.mesh
    }

    #[inline]
    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    #[inline]
    pub fn skin_matrices(&self) -> &[Mat4] {
        &self.skin_matrices
    }

    #[inline]
    pub fn skin_matrix(&self, index: usize) -> Option<Mat4> {
        self.skin_matrices.get(index).copied()
    }

    #[inline]
    pub fn precomputed_ref_matrix(&self, index: usize) -> Option<Mat4> {
        if !self.is_precomputed() {
            return None;
        }
        self.precomputed_ref_matrices.get(index).copied()
    }

    /// 最近一次软件蒙皮的顶点位置
    #[inline]
    pub fn skinned_positions(&self) -> &[Vec3] {
        &self.skinned_positions
    }

    #[inline]
    pub fn skinned_normals(&self) -> &[Vec3] {
        &self.skinned_normals
    }

    #[inline]
    pub fn bone(&self, index: usize) -> Option<BoneId> {
        self.bones.get(index).copied().flatten()
    }

    #[inline]
    pub fn bone_name(&self, index: usize) -> Option<&str> {
        self.bone_names.get(index).map(String::as_str)
    }

    #[inline]
    pub fn ref_matrix(&self, index: usize) -> Option<Mat4> {
        self.ref_matrices.get(index).copied()
    }

    #[inline]
    pub fn mesh_ref_matrix(&self) -> Mat4 {
        self.mesh_ref_matrix
    }

    // ========================================
    // 绑定数据
    // ========================================

    /// 重新分配全部按骨骼序号的数组，之前的绑定数据全部丢弃
    pub fn set_num_bones(&mut self, count: usize) -> Result<()> {
        let max = get_config().max_bones;
        if count > max {
            return Err(RigError::TooManyBones { requested: count, max });
        }

        self.bones = vec![None; count];
        self.bone_names = vec![String::new(); count];
        self.ref_matrices = vec![Mat4::IDENTITY; count];
        self.precomputed_ref_matrices = vec![Mat4::IDENTITY; count];
        self.skin_matrices = vec![self.mesh_ref_matrix; count];
        self.invalidate();
        Ok(())
    }

    /// 绑定骨骼；越界时不修改任何槽位
    pub fn set_bone(&mut self, index: usize, skeleton: &Skeleton, bone: BoneId) -> Result<()> {
        self.check_index(index)?;
        let name = skeleton.bone(bone).ok_or(RigError::InvalidBone)?.name.clone();
        self.bones[index] = Some(bone);
        self.bone_names[index] = name;
        self.invalidate();
        Ok(())
    }

    /// 按名称绑定骨骼
    pub fn set_bone_by_name(&mut self, index: usize, skeleton: &Skeleton, name: &str) -> Result<()> {
        self.check_index(index)?;
        let bone = skeleton.find_bone(name).ok_or(RigError::InvalidBone)?;
        self.set_bone(index, skeleton, bone)
    }

    /// 设置参考矩阵；越界时不修改任何槽位
    pub fn set_ref_matrix(&mut self, index: usize, matrix: Mat4) -> Result<()> {
        self.check_index(index)?;
        self.ref_matrices[index] = matrix;
        self.invalidate();
        Ok(())
    }

    pub fn set_mesh_ref_matrix(&mut self, matrix: Mat4) {
        self.mesh_ref_matrix = matrix;
        self.invalidate();
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.bones.len() {
            return Err(RigError::BoneIndexOutOfRange {
                index,
                len: self.bones.len(),
            });
        }
        Ok(())
    }

    #[inline]
    pub(super) fn invalidate(&mut self) {
        self.state = SkinState::Uninitialized;
    }

    // ========================================
    // 预计算
    // ========================================

    /// 预计算逆参考矩阵
    ///
    /// 列向量约定（glam）：`precomputed = inverse(ref) * mesh_ref`，乘积右侧先作用。
    /// 行向量写法 `mesh_ref * inverse(ref)` 与此等价，不要按字面顺序改写，
    /// 否则 mesh_ref 非单位时绑定姿态不再还原为 mesh_ref。
    ///
    /// 任一参考矩阵不可逆时返回错误，已有的预计算结果保持不变。
    pub fn initialize(&mut self) -> Result<()> {
        if self.bones.is_empty() {
            return Err(RigError::MissingBindData);
        }

        let mut precomputed = Vec::with_capacity(self.ref_matrices.len());
        for (i, ref_matrix) in self.ref_matrices.iter().enumerate() {
            let det = ref_matrix.determinant();
            if !det.is_finite() || det.abs() < SINGULAR_EPSILON {
                log::warn!("[Skin] '{}' 参考矩阵 {} 不可逆", self.name, i);
                return Err(RigError::SingularReferenceMatrix(i));
            }
            precomputed.push(ref_matrix.inverse() * self.mesh_ref_matrix);
        }

        self.precomputed_ref_matrices = precomputed;
        self.state = SkinState::Precomputed;
        log::debug!("[Skin] '{}' 预计算完成: {} 骨骼", self.name, self.bones.len());
        Ok(())
    }

    // ========================================
    // 每帧
    // ========================================

    /// 计算本帧蒙皮矩阵
    ///
    /// 未绑定或句柄失效的骨骼固定为绑定姿态（蒙皮矩阵 = mesh_ref）。
    pub fn compute_skin_matrices(&mut self, skeleton: &mut Skeleton) -> Result<()> {
        if !self.is_precomputed() {
            self.initialize()?;
        }

        let mut unbound = 0;
        for i in 0..self.bones.len() {
            let absolute = self.bones[i].and_then(|id| skeleton.absolute_matrix(id));
            self.skin_matrices[i] = match absolute {
                Some(absolute) => absolute * self.precomputed_ref_matrices[i],
                None => {
                    unbound += 1;
                    self.mesh_ref_matrix
                }
            };
        }

        if unbound > 0 && get_config().debug_log {
            log::debug!("[Skin] '{}' {} 个骨骼未绑定，保持绑定姿态", self.name, unbound);
        }
        self.state = SkinState::Ready;
        Ok(())
    }

    /// 软件蒙皮：用当前蒙皮矩阵变换网格顶点
    fn deform_software(&mut self) {
        deform_vertices(
            self.kind,
            &self.mesh,
            &self.skin_matrices,
            get_config().parallel_vertex_threshold,
            &mut self.skinned_positions,
            &mut self.skinned_normals,
        );
    }

    /// 重建包围盒
    ///
    /// 开启自动重建时做一次完整的软件蒙皮取紧包围盒；
    /// 否则用 mesh_ref 下的静态包围盒并按配置外扩，覆盖动画范围。
    pub fn update(&mut self, skeleton: &mut Skeleton) -> Result<()> {
        if self.flags.contains(SkinFlags::BOUNDING_AUTO_REGEN) {
            self.compute_skin_matrices(skeleton)?;
            self.deform_software();
            self.bounds = BoundingBox::from_points(self.skinned_positions.iter().copied());
        } else {
            let margin = get_config().bounding_margin;
            self.bounds =
                BoundingBox::from_transformed_points(&self.mesh.positions, &self.mesh_ref_matrix).expanded(margin);
        }
        Ok(())
    }

    /// 绘制
    ///
    /// 硬件路径上传蒙皮矩阵并提交绑定姿态顶点；
    /// 软件路径在 CPU 上变换顶点后提交。
    pub fn draw(&mut self, skeleton: &mut Skeleton, renderer: &mut dyn SkinRenderer) -> Result<()> {
        self.compute_skin_matrices(skeleton)?;

        if self.uses_hardware() {
            if renderer.supports_hardware_skinning() {
                renderer.upload_bone_matrices(&self.skin_matrices);
                let count = self.mesh.vertex_count();
                renderer.draw_vertices(&self.mesh.positions[..count], &self.mesh.normals[..count], true);
                return Ok(());
            }
            log::warn!("[Skin] '{}' 渲染器不支持硬件蒙皮，回退到软件路径", self.name);
        }

        self.deform_software();
        renderer.draw_vertices(&self.skinned_positions, &self.skinned_normals, false);
        Ok(())
    }

    // ========================================
    // 模式切换
    // ========================================

    /// 切换到硬件蒙皮；已启用、渲染器不支持或骨骼数超出容量时返回 false
    pub fn enable_skinning(&mut self, renderer: &dyn SkinRenderer) -> bool {
        if self.uses_hardware() {
            return false;
        }
        if !renderer.supports_hardware_skinning() || self.bones.len() > renderer.max_hardware_bones() {
            return false;
        }
        self.flags.insert(SkinFlags::HARDWARE);
        true
    }

    /// 切换到软件蒙皮；已是软件路径时返回 false
    pub fn disable_skinning(&mut self) -> bool {
        if !self.uses_hardware() {
            return false;
        }
        self.flags.remove(SkinFlags::HARDWARE);
        true
    }

    #[inline]
    pub fn bounding_auto_regen(&self) -> bool {
        self.flags.contains(SkinFlags::BOUNDING_AUTO_REGEN)
    }

    #[inline]
    pub fn set_bounding_auto_regen(&mut self, enabled: bool) {
        self.flags.set(SkinFlags::BOUNDING_AUTO_REGEN, enabled);
    }
}
