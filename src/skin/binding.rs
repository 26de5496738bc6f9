//! Skin 绑定数据：按名称重新挂接骨架，以及绑定数据的读写
//!
//! 二进制格式（小端）：
//! - 标签 "Skin"（4 字节）
//! - 蒙皮类型 u8
//! - 骨骼数 u32
//! - mesh_ref 矩阵（16 × f32，列主序）
//! - 每个骨骼：名称（u32 长度 + UTF-8）+ 参考矩阵
//!
//! 骨骼句柄属于运行时，读入后全部未绑定，需调用 `attach_to_humanoid_skeleton`。

use std::io::{Read, Write};

use byteorder::{LittleEndian, WriteBytesExt};

use super::pipeline::Skin;
use super::{SkinKind, SkinMesh};
use crate::io::{read_mat4, read_string, read_u32, read_u8, write_mat4, write_string};
use crate::skeleton::Skeleton;
use crate::{RigError, Result};

const BINDING_TAG: &[u8; 4] = b"Skin";

/// 按名称挂接的结果
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttachReport {
    /// 成功绑定的骨骼数
    pub bound: usize,
    /// 未找到的骨骼（序号，名称）
    pub unresolved: Vec<(usize, String)>,
}

impl AttachReport {
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

impl Skin {
    /// 按骨骼名称重新绑定到另一副骨架
    ///
    /// 参考矩阵保持不变；找不到的骨骼解除绑定，蒙皮时固定为绑定姿态。
    pub fn attach_to_humanoid_skeleton(&mut self, skeleton: &Skeleton) -> AttachReport {
        let mut report = AttachReport::default();

        for (index, name) in self.bone_names.iter().enumerate() {
            match skeleton.find_bone(name) {
                Some(bone) => {
                    self.bones[index] = Some(bone);
                    report.bound += 1;
                }
                None => {
                    self.bones[index] = None;
                    report.unresolved.push((index, name.clone()));
                }
            }
        }

        for (index, name) in &report.unresolved {
            log::warn!("[Skin] '{}' 骨骼 {} '{}' 在骨架中不存在", self.name, index, name);
        }
        log::info!(
            "[Skin] '{}' 挂接骨架: {}/{} 骨骼",
            self.name,
            report.bound,
            self.bones.len()
        );

        self.invalidate();
        report
    }

    /// 写出绑定数据（不含网格）
    pub fn write_binding<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(BINDING_TAG)?;
        writer.write_u8(self.kind.to_u8())?;
        writer.write_u32::<LittleEndian>(self.bones.len() as u32)?;
        write_mat4(writer, &self.mesh_ref_matrix)?;
        for (name, ref_matrix) in self.bone_names.iter().zip(&self.ref_matrices) {
            write_string(writer, name)?;
            write_mat4(writer, ref_matrix)?;
        }
        Ok(())
    }

    /// 读入绑定数据并与网格组合成 Skin
    pub fn read_binding<R: Read>(reader: &mut R, name: impl Into<String>, mesh: SkinMesh) -> Result<Self> {
        let mut tag = [0u8; 4];
        reader
            .read_exact(&mut tag)
            .map_err(|e| RigError::Format(format!("Failed to read skin tag: {}", e)))?;
        if &tag != BINDING_TAG {
            return Err(RigError::Format(format!("invalid skin tag: {:?}", tag)));
        }

        let kind = SkinKind::from_u8(read_u8(reader, "skin kind")?)?;
        let count = read_u32(reader, "bone count")? as usize;

        let mut skin = Skin::new(name, kind, mesh);
        skin.set_num_bones(count)?;
        skin.mesh_ref_matrix = read_mat4(reader, "mesh reference matrix")?;
        for index in 0..count {
            skin.bone_names[index] = read_string(reader, "bone name")?;
            skin.ref_matrices[index] = read_mat4(reader, "reference matrix")?;
        }

        log::debug!("[Skin] 读取绑定数据: {} 骨骼", count);
        Ok(skin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::BoneId;
    use crate::skin::VertexInfluences;
    use glam::{Mat4, Vec3};
    use std::io::Cursor;

    fn humanoid(names: &[&str]) -> (Skeleton, Vec<BoneId>) {
        let mut skeleton = Skeleton::new();
        let mut ids = Vec::new();
        let mut parent = None;
        for (i, name) in names.iter().enumerate() {
            let id = skeleton.create_bone(*name, parent, false).unwrap();
            skeleton.transform_mut(id).unwrap().set_position(Vec3::new(0.0, i as f32, 0.0));
            ids.push(id);
            parent = Some(id);
        }
        (skeleton, ids)
    }

    fn mesh() -> SkinMesh {
        SkinMesh::new(vec![Vec3::ZERO], vec![Vec3::Y], vec![VertexInfluences::single(0)]).unwrap()
    }

    #[test]
    fn test_attach_by_name() {
        let (mut source, ids) = humanoid(&["hips", "spine", "head"]);
        let mut skin = Skin::from_skeleton_bind_pose("body", SkinKind::Skinning, mesh(), &mut source, &ids).unwrap();
        skin.initialize().unwrap();

        let (mut target, target_ids) = humanoid(&["hips", "spine", "neck"]);
        let report = skin.attach_to_humanoid_skeleton(&target);

        assert_eq!(report.bound, 2);
        assert_eq!(report.unresolved, vec![(2, "head".to_string())]);
        assert!(!report.is_complete());
        assert_eq!(skin.bone(0), Some(target_ids[0]));
        assert_eq!(skin.bone(2), None);
        assert!(!skin.is_precomputed());

        skin.compute_skin_matrices(&mut target).unwrap();
        assert_eq!(skin.skin_matrix(2), Some(skin.mesh_ref_matrix()));
    }

    #[test]
    fn test_binding_roundtrip_then_attach() {
        let (mut skeleton, ids) = humanoid(&["hips", "spine"]);
        let mut skin = Skin::from_skeleton_bind_pose("body", SkinKind::Rigging, mesh(), &mut skeleton, &ids).unwrap();
        skin.set_mesh_ref_matrix(Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0)));

        let mut buffer = Vec::new();
        skin.write_binding(&mut buffer).unwrap();
        let mut loaded = Skin::read_binding(&mut Cursor::new(buffer), "copy", mesh()).unwrap();

        assert_eq!(loaded.kind(), SkinKind::Rigging);
        assert_eq!(loaded.num_bones(), 2);
        assert_eq!(loaded.bone_name(1), Some("spine"));
        assert_eq!(loaded.ref_matrix(1), skin.ref_matrix(1));
        assert_eq!(loaded.mesh_ref_matrix(), skin.mesh_ref_matrix());
        assert_eq!(loaded.bone(0), None);

        let report = loaded.attach_to_humanoid_skeleton(&skeleton);
        assert!(report.is_complete());
        assert_eq!(loaded.bone(1), Some(ids[1]));
    }

    #[test]
    fn test_read_binding_rejects_bad_input() {
        let result = Skin::read_binding(&mut Cursor::new(b"Mesh".to_vec()), "bad", mesh());
        assert!(matches!(result, Err(RigError::Format(_))));

        let mut truncated = Vec::new();
        truncated.extend_from_slice(BINDING_TAG);
        truncated.push(0);
        truncated.extend_from_slice(&1u32.to_le_bytes());
        let result = Skin::read_binding(&mut Cursor::new(truncated), "bad", mesh());
        assert!(matches!(result, Err(RigError::Format(_))));

        let mut bad_kind = Vec::new();
        bad_kind.extend_from_slice(BINDING_TAG);
        bad_kind.push(9);
        let result = Skin::read_binding(&mut Cursor::new(bad_kind), "bad", mesh());
        assert!(matches!(result, Err(RigError::Format(_))));
    }
}
