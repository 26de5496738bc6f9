//! CPU 顶点蒙皮

use glam::{Mat4, Vec3};
use rayon::prelude::*;

use super::{SkinKind, SkinMesh, VertexInfluences};

/// 对整个网格做 CPU 蒙皮，结果写入 `positions` / `normals`
///
/// 顶点数达到 `parallel_threshold` 时使用 rayon 并行。
pub(crate) fn deform_vertices(
    kind: SkinKind,
    mesh: &SkinMesh,
    matrices: &[Mat4],
    parallel_threshold: usize,
    positions: &mut Vec<Vec3>,
    normals: &mut Vec<Vec3>,
) {
    let vertex_count = mesh.vertex_count();
    let positions_in = &mesh.positions[..vertex_count];
    let normals_in = &mesh.normals[..vertex_count];
    let influences_in = &mesh.influences[..vertex_count];

    if vertex_count >= parallel_threshold {
        let (p, n): (Vec<Vec3>, Vec<Vec3>) = positions_in
            .par_iter()
            .zip(normals_in.par_iter())
            .zip(influences_in.par_iter())
            .map(|((position, normal), influences)| {
                compute_single_vertex(kind, *position, *normal, influences, matrices)
            })
            .unzip();
        *positions = p;
        *normals = n;
        return;
    }

    positions.clear();
    normals.clear();
    positions.reserve(vertex_count);
    normals.reserve(vertex_count);
    for ((position, normal), influences) in positions_in.iter().zip(normals_in).zip(influences_in) {
        let (pos, norm) = compute_single_vertex(kind, *position, *normal, influences, matrices);
        positions.push(pos);
        normals.push(norm);
    }
}

/// 计算单个顶点的蒙皮
fn compute_single_vertex(
    kind: SkinKind,
    position: Vec3,
    normal: Vec3,
    influences: &VertexInfluences,
    matrices: &[Mat4],
) -> (Vec3, Vec3) {
    match kind {
        SkinKind::Rigging => {
            let m = get_matrix(matrices, influences.bones[0]);
            let pos = m.transform_point3(position);
            let norm = m.transform_vector3(normal).normalize_or_zero();
            (pos, norm)
        }
        SkinKind::Skinning => {
            let mut pos = Vec3::ZERO;
            let mut norm = Vec3::ZERO;
            let mut total = 0.0;

            for (bone, &w) in influences.bones.iter().zip(influences.weights.iter()) {
                if w <= 0.0 {
                    continue;
                }
                let m = get_matrix(matrices, *bone);
                pos += m.transform_point3(position) * w;
                norm += m.transform_vector3(normal) * w;
                total += w;
            }

            // 无任何影响的顶点保持原位
            if total <= 0.0 {
                return (position, normal);
            }
            (pos / total, norm.normalize_or_zero())
        }
    }
}

fn get_matrix(matrices: &[Mat4], index: u16) -> Mat4 {
    matrices.get(index as usize).copied().unwrap_or(Mat4::IDENTITY)
}
