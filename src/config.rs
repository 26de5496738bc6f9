//! 蒙皮运行时配置
//!
//! 所有参数扁平化，直接在代码中修改默认值即可。

use once_cell::sync::Lazy;
use std::sync::RwLock;

/// 蒙皮配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct SkinningConfig {
    // ========== 骨骼 ==========
    /// 单个 Skin 允许的最大骨骼数，默认 128
    /// 硬件路径下整组矩阵作为 uniform 数组上传，受着色器常量容量限制
    pub max_bones: usize,

    // ========== CPU 蒙皮 ==========
    /// 顶点数达到该值时 CPU 蒙皮改用 rayon 并行，默认 4096
    pub parallel_vertex_threshold: usize,

    // ========== 包围盒 ==========
    /// 静态包围盒相对尺寸的外扩比例，默认 0.25
    /// 用于覆盖动画范围内的最坏情况
    pub bounding_margin: f32,
    /// 新建 Skin 是否每次 update 都从蒙皮后顶点重建包围盒，默认 false
    pub bounding_auto_regen: bool,

    // ========== 路径 ==========
    /// 新建 Skin 是否默认使用硬件蒙皮，默认 true
    pub hardware_skinning_default: bool,

    // ========== 调试 ==========
    /// 是否输出逐帧调试日志，默认 false
    pub debug_log: bool,
}

impl Default for SkinningConfig {
    fn default() -> Self {
        Self {
            max_bones: 128,
            parallel_vertex_threshold: 4096,
            bounding_margin: 0.25,
            bounding_auto_regen: false,
            hardware_skinning_default: true,
            debug_log: false,
        }
    }
}

/// 全局配置实例
static SKINNING_CONFIG: Lazy<RwLock<SkinningConfig>> = Lazy::new(|| {
    RwLock::new(SkinningConfig::default())
});

/// 获取当前配置（只读）
pub fn get_config() -> SkinningConfig {
    SKINNING_CONFIG.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// 手动设置配置（用于运行时调试）
pub fn set_config(config: SkinningConfig) {
    *SKINNING_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = config;
}

/// 重置为默认配置
pub fn reset_config() {
    *SKINNING_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = SkinningConfig::default();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SkinningConfig::default();
        assert_eq!(config.max_bones, 128);
        assert!(!config.bounding_auto_regen);
        assert!(config.hardware_skinning_default);
    }
}
