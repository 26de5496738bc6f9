//! 硬件与软件蒙皮路径的一致性

use glam::{Mat4, Quat, Vec3};
use rig_engine::{
    Axis, BoneId, Skeleton, Skin, SkinKind, SkinMesh, SkinRenderer, SkinState, Transform, VertexInfluences,
};

/// 模拟顶点着色器：用上传的矩阵对绑定姿态顶点做加权混合
struct EmulatedGpu {
    influences: Vec<VertexInfluences>,
    rigging: bool,
    bone_matrices: Vec<Mat4>,
    output: Vec<Vec3>,
    gpu_draws: usize,
    cpu_draws: usize,
}

impl EmulatedGpu {
    fn new(mesh: &SkinMesh, rigging: bool) -> Self {
        Self {
            influences: mesh.influences.clone(),
            rigging,
            bone_matrices: Vec::new(),
            output: Vec::new(),
            gpu_draws: 0,
            cpu_draws: 0,
        }
    }

    fn shade(&self, position: Vec3, influences: &VertexInfluences) -> Vec3 {
        if self.rigging {
            return self.bone_matrices[influences.bones[0] as usize].transform_point3(position);
        }
        let mut blended = Mat4::ZERO;
        for (bone, weight) in influences.bones.iter().zip(influences.weights) {
            if weight > 0.0 {
                blended += self.bone_matrices[*bone as usize] * weight;
            }
        }
        blended.transform_point3(position)
    }
}

impl SkinRenderer for EmulatedGpu {
    fn max_hardware_bones(&self) -> usize {
        64
    }

    fn upload_bone_matrices(&mut self, matrices: &[Mat4]) {
        self.bone_matrices = matrices.to_vec();
    }

    fn draw_vertices(&mut self, positions: &[Vec3], _normals: &[Vec3], skinned_on_gpu: bool) {
        if skinned_on_gpu {
            self.gpu_draws += 1;
            self.output = positions
                .iter()
                .zip(&self.influences)
                .map(|(p, inf)| self.shade(*p, inf))
                .collect();
        } else {
            self.cpu_draws += 1;
            self.output = positions.to_vec();
        }
    }
}

fn spine() -> (Skeleton, Vec<BoneId>) {
    let mut skeleton = Skeleton::new();
    let hips = skeleton.create_bone("hips", None, false).unwrap();
    let chest = skeleton.create_bone("chest", Some(hips), false).unwrap();
    let head = skeleton.create_bone("head", Some(chest), true).unwrap();

    *skeleton.transform_mut(hips).unwrap() = Transform::new_first_person();
    skeleton.transform_mut(hips).unwrap().set_position(Vec3::new(0.0, 1.0, 0.0));
    *skeleton.transform_mut(chest).unwrap() = Transform::new_dual_quaternion();
    skeleton.transform_mut(chest).unwrap().set_position(Vec3::new(0.0, 0.5, 0.0));
    skeleton.transform_mut(head).unwrap().set_position(Vec3::new(0.0, 0.5, 0.0));
    (skeleton, vec![hips, chest, head])
}

fn body_mesh() -> SkinMesh {
    let positions: Vec<Vec3> = (0..12).map(|i| Vec3::new(0.2, 0.9 + i as f32 * 0.1, 0.1)).collect();
    let normals = vec![Vec3::Z; positions.len()];
    let influences = (0..12)
        .map(|i| match i {
            0..=3 => VertexInfluences::single(0),
            4..=5 => VertexInfluences::weighted(&[(0, 0.6), (1, 0.4)]),
            6..=8 => VertexInfluences::weighted(&[(1, 0.5), (2, 0.25), (0, 0.25)]),
            _ => VertexInfluences::single(2),
        })
        .collect();
    SkinMesh::new(positions, normals, influences).unwrap()
}

fn animate(skeleton: &mut Skeleton, bones: &[BoneId], frame: usize) {
    let t = frame as f32 * 0.25;
    skeleton.transform_mut(bones[0]).unwrap().rotate_axis(Axis::Y, 0.3);
    skeleton.transform_mut(bones[0]).unwrap().translate(Vec3::new(0.0, 0.0, 0.1));
    skeleton.transform_mut(bones[1]).unwrap().rotate(Quat::from_rotation_x(0.2 + t));
    skeleton.transform_mut(bones[2]).unwrap().rotate_axis(Axis::Z, -0.15);
}

fn assert_close(a: &[Vec3], b: &[Vec3]) {
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b) {
        assert!((*x - *y).length() < 1e-4, "{:?} != {:?}", x, y);
    }
}

fn run_frames(kind: SkinKind) {
    let (mut skeleton, bones) = spine();
    let mesh = body_mesh();
    let mut skin = Skin::from_skeleton_bind_pose("body", kind, mesh.clone(), &mut skeleton, &bones).unwrap();
    let mut gpu = EmulatedGpu::new(&mesh, kind == SkinKind::Rigging);

    // 绑定姿态下两条路径都输出原始顶点
    skin.draw(&mut skeleton, &mut gpu).unwrap();
    assert_eq!(gpu.gpu_draws, 1);
    assert_close(&gpu.output, &mesh.positions);

    for frame in 0..6 {
        animate(&mut skeleton, &bones, frame);

        assert!(skin.disable_skinning());
        skin.draw(&mut skeleton, &mut gpu).unwrap();
        let software = gpu.output.clone();

        assert!(skin.enable_skinning(&gpu));
        skin.draw(&mut skeleton, &mut gpu).unwrap();
        assert_eq!(skin.state(), SkinState::Ready);
        assert_close(&gpu.output, &software);
    }
    assert_eq!(gpu.cpu_draws, 6);
    assert_eq!(gpu.gpu_draws, 7);
}

#[test]
fn hardware_and_software_paths_agree_for_weighted_skin() {
    run_frames(SkinKind::Skinning);
}

#[test]
fn hardware_and_software_paths_agree_for_rigid_skin() {
    run_frames(SkinKind::Rigging);
}

#[test]
fn duplicated_skeleton_drives_skin_after_attach() {
    let (mut skeleton, bones) = spine();
    let mesh = body_mesh();
    let mut skin = Skin::from_skeleton_bind_pose("body", SkinKind::Skinning, mesh.clone(), &mut skeleton, &bones).unwrap();

    let mut copy = skeleton.duplicate();
    let report = skin.attach_to_humanoid_skeleton(&copy);
    assert!(report.is_complete());
    assert_eq!(report.bound, 3);

    // 原骨架上的动画不影响挂接后的 Skin
    animate(&mut skeleton, &bones, 3);
    skin.compute_skin_matrices(&mut copy).unwrap();
    for m in skin.skin_matrices() {
        assert!(m.abs_diff_eq(skin.mesh_ref_matrix(), 1e-5));
    }

    let hips = copy.find_bone("hips").unwrap();
    copy.transform_mut(hips).unwrap().translate(Vec3::new(1.0, 0.0, 0.0));
    skin.compute_skin_matrices(&mut copy).unwrap();
    let moved = skin.skin_matrix(0).unwrap().w_axis.truncate();
    assert!((moved - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-5);
}

#[test]
fn skeleton_serialization_preserves_skinning() {
    let (mut skeleton, bones) = spine();
    animate(&mut skeleton, &bones, 1);
    let mesh = body_mesh();
    let mut skin = Skin::from_skeleton_bind_pose("body", SkinKind::Skinning, mesh, &mut skeleton, &bones).unwrap();

    let mut buffer = Vec::new();
    skeleton.write_to(&mut buffer).unwrap();
    skin.write_binding(&mut buffer).unwrap();

    let mut cursor = std::io::Cursor::new(buffer);
    let mut restored = Skeleton::read_from(&mut cursor).unwrap();
    let mut restored_skin = Skin::read_binding(&mut cursor, "body", body_mesh()).unwrap();
    assert!(restored_skin.attach_to_humanoid_skeleton(&restored).is_complete());

    skin.compute_skin_matrices(&mut skeleton).unwrap();
    restored_skin.compute_skin_matrices(&mut restored).unwrap();
    for (a, b) in skin.skin_matrices().iter().zip(restored_skin.skin_matrices()) {
        assert!(a.abs_diff_eq(*b, 1e-4));
    }
}
