//! 姿态调试工具
//!
//! 构建一条三节手臂，绑定一个简单网格，播放几帧摆臂动画，
//! 分别走硬件与软件两条蒙皮路径并输出矩阵和顶点。
//!
//! 用法：`RUST_LOG=debug cargo run --features demo --bin pose_dump`

use std::f32::consts::FRAC_PI_8;

use glam::{Mat4, Vec3};
use rig_engine::{
    Axis, BoneId, Result, Skeleton, Skin, SkinKind, SkinMesh, SkinRenderer, VertexInfluences,
};

const FRAMES: usize = 4;

/// 着色器中骨骼矩阵数组的长度
const MAX_SHADER_BONES: usize = 64;

/// 只输出日志的渲染器
struct LogRenderer {
    frame: usize,
}

impl SkinRenderer for LogRenderer {
    fn max_hardware_bones(&self) -> usize {
        MAX_SHADER_BONES
    }

    fn upload_bone_matrices(&mut self, matrices: &[Mat4]) {
        for (i, m) in matrices.iter().enumerate() {
            log::info!("  [GPU] frame {} bone {}: t = {:?}", self.frame, i, m.w_axis.truncate());
        }
    }

    fn draw_vertices(&mut self, positions: &[Vec3], _normals: &[Vec3], skinned_on_gpu: bool) {
        let path = if skinned_on_gpu { "GPU" } else { "CPU" };
        for (i, p) in positions.iter().enumerate() {
            log::info!("  [{}] frame {} vertex {}: {:?}", path, self.frame, i, p);
        }
    }
}

fn build_arm() -> Result<(Skeleton, Vec<BoneId>)> {
    let mut skeleton = Skeleton::new();
    let shoulder = skeleton.create_bone("shoulder", None, false)?;
    let elbow = skeleton.create_bone("elbow", Some(shoulder), false)?;
    let wrist = skeleton.create_bone("wrist", Some(elbow), true)?;

    for (id, offset) in [(shoulder, Vec3::new(0.0, 1.5, 0.0)), (elbow, Vec3::X), (wrist, Vec3::X)] {
        if let Some(transform) = skeleton.transform_mut(id) {
            transform.set_position(offset);
        }
    }
    Ok((skeleton, vec![shoulder, elbow, wrist]))
}

fn build_mesh() -> Result<SkinMesh> {
    let positions = vec![
        Vec3::new(0.5, 1.5, 0.0),
        Vec3::new(1.0, 1.5, 0.0),
        Vec3::new(1.5, 1.5, 0.0),
        Vec3::new(2.2, 1.5, 0.0),
    ];
    let normals = vec![Vec3::Y; positions.len()];
    let influences = vec![
        VertexInfluences::single(0),
        VertexInfluences::weighted(&[(0, 0.5), (1, 0.5)]),
        VertexInfluences::single(1),
        VertexInfluences::weighted(&[(1, 0.3), (2, 0.7)]),
    ];
    SkinMesh::new(positions, normals, influences)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let (mut skeleton, bones) = build_arm()?;
    let mut skin = Skin::from_skeleton_bind_pose("arm", SkinKind::Skinning, build_mesh()?, &mut skeleton, &bones)?;
    skin.initialize()?;

    let mut renderer = LogRenderer { frame: 0 };
    for frame in 0..FRAMES {
        renderer.frame = frame;
        for &id in &bones[..2] {
            if let Some(transform) = skeleton.transform_mut(id) {
                transform.rotate_axis(Axis::Z, FRAC_PI_8);
            }
        }

        let recomputed = skeleton.update_absolute_matrices();
        log::info!("=== frame {} ({} bones recomputed) ===", frame, recomputed);

        if frame % 2 == 0 {
            skin.enable_skinning(&renderer);
        } else {
            skin.disable_skinning();
        }
        skin.draw(&mut skeleton, &mut renderer)?;
        skin.update(&mut skeleton)?;
        log::info!("  bounds: {:?}", skin.bounds());
    }

    let mut buffer = Vec::new();
    skeleton.write_to(&mut buffer)?;
    skin.write_binding(&mut buffer)?;
    log::info!("serialized skeleton + binding: {} bytes", buffer.len());
    Ok(())
}
