//! Veneer 内核错误类型定义
//!
//! 本模块定义了内核中使用的所有错误类型。

use thiserror::Error;

/// Veneer 内核核心错误类型
#[derive(Error, Debug)]
pub enum CoreError {
    // ==================== 模块管理错误 ====================

    /// 模块 ID 重复注册
    #[error("模块 ID 重复注册: '{0}'")]
    DuplicateModuleId(String),

    /// 模块未找到
    #[error("模块未找到: '{0}'")]
    ModuleNotFound(String),

    /// 模块未激活
    #[error("模块未激活: '{0}'")]
    ModuleNotActive(String),

    /// 模块描述符无效
    #[error("模块描述符无效: {0}")]
    InvalidDescriptor(String),

    /// 模块激活失败
    #[error("模块激活失败: '{module_id}' - {reason}")]
    ActivationFailed {
        module_id: String,
        reason: String,
    },

    /// 模块停用失败
    #[error("模块停用失败: '{module_id}' - {reason}")]
    DeactivationFailed {
        module_id: String,
        reason: String,
    },

    /// 清理动作执行失败
    #[error("清理动作执行失败: '{module_id}' - {reason}")]
    CleanupFailed {
        module_id: String,
        reason: String,
    },

    // ==================== 子选项错误 ====================

    /// 子选项未声明
    #[error("模块 '{module_id}' 未声明子选项: '{name}'")]
    UnknownSuboption {
        module_id: String,
        name: String,
    },

    /// 子选项值无效
    #[error("模块 '{module_id}' 的子选项 '{name}' 值无效: {reason}")]
    InvalidSuboptionValue {
        module_id: String,
        name: String,
        reason: String,
    },

    // ==================== IO 和序列化错误 ====================

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化/反序列化错误
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML 序列化/反序列化错误
    #[error("YAML 错误: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // ==================== 通用错误 ====================

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),

    /// 初始化失败
    #[error("初始化失败: {0}")]
    InitFailed(String),

    /// 操作超时
    #[error("操作超时: {0}")]
    Timeout(String),

    /// 其他错误
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// 内核操作结果类型别名
pub type Result<T> = std::result::Result<T, CoreError>;

/// 错误码常量
pub mod error_code {
    // 模块错误 (MODULE-xxx)
    pub const MODULE_DUPLICATE_ID: &str = "MODULE-001";
    pub const MODULE_NOT_FOUND: &str = "MODULE-002";
    pub const MODULE_ACTIVATION_FAILED: &str = "MODULE-003";
    pub const MODULE_DEACTIVATION_FAILED: &str = "MODULE-004";
    pub const MODULE_CLEANUP_FAILED: &str = "MODULE-005";
    pub const MODULE_NOT_ACTIVE: &str = "MODULE-006";
    pub const MODULE_INVALID_DESCRIPTOR: &str = "MODULE-007";

    // 子选项错误 (OPTION-xxx)
    pub const OPTION_UNKNOWN: &str = "OPTION-001";
    pub const OPTION_INVALID_VALUE: &str = "OPTION-002";

    // 核心错误 (CORE-xxx)
    pub const CORE_INIT_FAILED: &str = "CORE-001";
    pub const CORE_TIMEOUT: &str = "CORE-002";
}

impl CoreError {
    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::DuplicateModuleId(_) => error_code::MODULE_DUPLICATE_ID,
            CoreError::ModuleNotFound(_) => error_code::MODULE_NOT_FOUND,
            CoreError::ModuleNotActive(_) => error_code::MODULE_NOT_ACTIVE,
            CoreError::InvalidDescriptor(_) => error_code::MODULE_INVALID_DESCRIPTOR,
            CoreError::ActivationFailed { .. } => error_code::MODULE_ACTIVATION_FAILED,
            CoreError::DeactivationFailed { .. } => error_code::MODULE_DEACTIVATION_FAILED,
            CoreError::CleanupFailed { .. } => error_code::MODULE_CLEANUP_FAILED,
            CoreError::UnknownSuboption { .. } => error_code::OPTION_UNKNOWN,
            CoreError::InvalidSuboptionValue { .. } => error_code::OPTION_INVALID_VALUE,
            CoreError::InitFailed(_) => error_code::CORE_INIT_FAILED,
            CoreError::Timeout(_) => error_code::CORE_TIMEOUT,
            _ => "UNKNOWN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::DuplicateModuleId("schedule-date-picker".to_string());
        assert!(err.to_string().contains("schedule-date-picker"));
    }

    #[test]
    fn test_error_code() {
        let err = CoreError::DuplicateModuleId("x".to_string());
        assert_eq!(err.error_code(), error_code::MODULE_DUPLICATE_ID);

        let err = CoreError::ActivationFailed {
            module_id: "x".to_string(),
            reason: "boom".to_string(),
        };
        assert_eq!(err.error_code(), error_code::MODULE_ACTIVATION_FAILED);

        let err = CoreError::CleanupFailed {
            module_id: "x".to_string(),
            reason: "boom".to_string(),
        };
        assert_eq!(err.error_code(), error_code::MODULE_CLEANUP_FAILED);
    }

    #[test]
    fn test_unknown_error_code() {
        let err = CoreError::Internal("something".to_string());
        assert_eq!(err.error_code(), "UNKNOWN");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let core_err: CoreError = io_err.into();
        assert!(matches!(core_err, CoreError::Io(_)));
    }

    #[test]
    fn test_suboption_error_message() {
        let err = CoreError::InvalidSuboptionValue {
            module_id: "theme".to_string(),
            name: "accent-color".to_string(),
            reason: "期望颜色值".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("theme"));
        assert!(msg.contains("accent-color"));
    }
}
