// ==========================================
// 选举计票系统 - 计票配置
// ==========================================
// 职责: 票包抽样/编号与双重比例求解参数
// 说明: 由 ConfigManager 从 config_kv 表加载，缺省时使用默认值
// ==========================================

use serde::{Deserialize, Serialize};

pub const DEFAULT_BUNDLE_REVIEW_SAMPLE_SIZE: u32 = 10;
pub const DEFAULT_AUTOMATIC_BUNDLE_NUMBERING: bool = true;
pub const DEFAULT_DP_MAX_ITERATIONS: u32 = 1000;
pub const DEFAULT_DP_DIVISOR_SCALE: u32 = 10;

/// rust_decimal 支持的最大小数位
pub const MAX_DECIMAL_SCALE: u32 = 28;

// ==========================================
// TallyConfig
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TallyConfig {
    /// 每个票包需复核的抽样选票数
    pub bundle_review_sample_size: u32,
    /// 票包编号由系统分配；删除后的编号可复用
    pub automatic_bundle_numbering: bool,
    /// 交替缩放迭代上限
    pub dp_max_iterations: u32,
    /// 除数保留的小数位
    pub dp_divisor_scale: u32,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            bundle_review_sample_size: DEFAULT_BUNDLE_REVIEW_SAMPLE_SIZE,
            automatic_bundle_numbering: DEFAULT_AUTOMATIC_BUNDLE_NUMBERING,
            dp_max_iterations: DEFAULT_DP_MAX_ITERATIONS,
            dp_divisor_scale: DEFAULT_DP_DIVISOR_SCALE,
        }
    }
}

impl TallyConfig {
    /// 校验配置取值范围
    pub fn validate(&self) -> Result<(), String> {
        if self.bundle_review_sample_size == 0 {
            return Err("bundle_review_sample_size must be at least 1".to_string());
        }
        if self.dp_max_iterations == 0 {
            return Err("dp_max_iterations must be at least 1".to_string());
        }
        if self.dp_divisor_scale > MAX_DECIMAL_SCALE {
            return Err(format!(
                "dp_divisor_scale must not exceed {}",
                MAX_DECIMAL_SCALE
            ));
        }
        Ok(())
    }
}
