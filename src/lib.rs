//! Rig Engine - 变换、骨骼层次与蒙皮管线
//!
//! 提供实时 3D 引擎中的姿态核心：
//! - 多种可互换的变换表示（矩阵、欧拉加算、第一人称、对偶四元数、空间）
//! - 脏标记驱动的惰性矩阵缓存
//! - 骨骼层次与绝对矩阵组合
//! - 蒙皮（加权）/ 绑定（单骨骼）的 CPU 与 GPU 两条路径

pub mod config;
pub mod io;
pub mod math;
pub mod skeleton;
pub mod skin;
pub mod transform;

pub use config::{get_config, reset_config, set_config, SkinningConfig};
pub use math::DualQuat;
pub use skeleton::{Bone, BoneFlags, BoneId, Skeleton};
pub use skin::{
    AttachReport, BoundingBox, Skin, SkinFlags, SkinKind, SkinMesh, SkinRenderer, SkinState,
    VertexInfluences, MAX_INFLUENCES,
};
pub use transform::{
    Axis, DualQuaternionTransform, EulerAdditiveTransform, MatrixTransform,
    QuaternionAdditiveTransform, SpatialAdditiveTransform, Transform, TransformKind,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Unknown transform kind: {0}")]
    UnknownTransformKind(String),

    #[error("Invalid axis index {0}, expected 0 (X), 1 (Y) or 2 (Z)")]
    InvalidAxis(u8),

    #[error("{kind} does not support {operation}")]
    Unsupported {
        kind: &'static str,
        operation: &'static str,
    },

    #[error("Bone handle is stale or belongs to another skeleton")]
    InvalidBone,

    #[error("Skeleton already has a root bone")]
    RootAlreadyExists,

    #[error("Bone index {index} out of range (bone count {len})")]
    BoneIndexOutOfRange { index: usize, len: usize },

    #[error("Requested {requested} bones, maximum is {max}")]
    TooManyBones { requested: usize, max: usize },

    #[error("Reference matrix {0} is not invertible")]
    SingularReferenceMatrix(usize),

    #[error("Skin has no bind data")]
    MissingBindData,
}

pub type Result<T> = std::result::Result<T, RigError>;
