//! 日志系统模块
//!
//! 基于 tracing 生态实现内核的日志系统，包括：
//!
//! - 多级别日志支持（TRACE, DEBUG, INFO, WARN, ERROR）
//! - 结构化日志（JSON 格式输出）
//! - 文件日志输出（异步非阻塞）
//! - 日志轮转（每天、每小时）
//! - 日志过滤（按模块、按级别）
//!
//! # 示例
//!
//! ```rust,no_run
//! use veneer_core::utils::logger::{Logger, LoggerConfig, RotationStrategy};
//! use std::path::PathBuf;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = LoggerConfig::builder()
//!         .level("debug")
//!         .file_output(PathBuf::from("./logs"))
//!         .rotation(RotationStrategy::Daily)
//!         .build();
//!
//!     let _guard = Logger::init(config)?;
//!
//!     tracing::info!(module_id = "theme", "模块已激活");
//!     Ok(())
//! }
//! ```

use crate::utils::{CoreError, Result};
use std::io;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

// ============================================================================
// 日志轮转策略
// ============================================================================

/// 日志轮转策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationStrategy {
    /// 不轮转（单个日志文件）
    Never,
    /// 每小时轮转
    Hourly,
    /// 每天轮转（默认）
    #[default]
    Daily,
}

impl RotationStrategy {
    /// 转换为 tracing-appender 的 Rotation 类型
    fn to_rotation(self) -> Rotation {
        match self {
            RotationStrategy::Never => Rotation::NEVER,
            RotationStrategy::Hourly => Rotation::HOURLY,
            RotationStrategy::Daily => Rotation::DAILY,
        }
    }

    /// 从字符串解析轮转策略
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "never" | "none" => RotationStrategy::Never,
            "hourly" | "hour" => RotationStrategy::Hourly,
            _ => RotationStrategy::Daily,
        }
    }
}

impl std::fmt::Display for RotationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RotationStrategy::Never => write!(f, "never"),
            RotationStrategy::Hourly => write!(f, "hourly"),
            RotationStrategy::Daily => write!(f, "daily"),
        }
    }
}

// ============================================================================
// 日志配置
// ============================================================================

/// 日志系统配置
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// 默认日志级别（例如 "trace", "debug", "info", "warn", "error"）
    pub level: String,

    /// 是否使用 JSON 格式输出
    pub json_format: bool,

    /// 是否输出到控制台
    pub console_output: bool,

    /// 文件输出目录（None 表示不输出到文件）
    pub file_output: Option<PathBuf>,

    /// 日志文件名前缀
    pub file_prefix: String,

    /// 日志轮转策略
    pub rotation: RotationStrategy,

    /// 是否显示目标模块
    pub show_target: bool,

    /// 是否显示文件名和行号
    pub show_file_line: bool,

    /// 是否启用 ANSI 颜色（控制台输出）
    pub ansi_colors: bool,

    /// 自定义过滤指令（EnvFilter 格式）
    /// 例如："veneer_core=debug,veneer_core::module=trace"
    pub filter_directives: Option<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            console_output: true,
            file_output: None,
            file_prefix: "veneer-core".to_string(),
            rotation: RotationStrategy::Daily,
            show_target: true,
            show_file_line: false,
            ansi_colors: true,
            filter_directives: None,
        }
    }
}

impl LoggerConfig {
    /// 创建配置构建器
    pub fn builder() -> LoggerConfigBuilder {
        LoggerConfigBuilder::new()
    }

    /// 从内核配置的 LogConfig 创建
    pub fn from_log_config(log_config: &crate::core::config::LogConfig) -> Self {
        Self {
            level: log_config.level.clone(),
            json_format: log_config.json_format,
            file_output: if log_config.file_output {
                log_config.log_dir.clone()
            } else {
                None
            },
            rotation: RotationStrategy::parse(&log_config.rotation),
            ..Default::default()
        }
    }
}

/// 日志配置构建器
#[derive(Debug, Default)]
pub struct LoggerConfigBuilder {
    config: LoggerConfig,
}

impl LoggerConfigBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self {
            config: LoggerConfig::default(),
        }
    }

    /// 设置日志级别
    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    /// 启用 JSON 格式输出
    pub fn json_format(mut self, enable: bool) -> Self {
        self.config.json_format = enable;
        self
    }

    /// 设置控制台输出
    pub fn console_output(mut self, enable: bool) -> Self {
        self.config.console_output = enable;
        self
    }

    /// 设置文件输出目录
    pub fn file_output(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.file_output = Some(dir.into());
        self
    }

    /// 设置日志文件前缀
    pub fn file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.file_prefix = prefix.into();
        self
    }

    /// 设置轮转策略
    pub fn rotation(mut self, strategy: RotationStrategy) -> Self {
        self.config.rotation = strategy;
        self
    }

    /// 显示目标模块
    pub fn show_target(mut self, enable: bool) -> Self {
        self.config.show_target = enable;
        self
    }

    /// 显示文件名和行号
    pub fn show_file_line(mut self, enable: bool) -> Self {
        self.config.show_file_line = enable;
        self
    }

    /// 启用 ANSI 颜色
    pub fn ansi_colors(mut self, enable: bool) -> Self {
        self.config.ansi_colors = enable;
        self
    }

    /// 设置过滤指令
    pub fn filter_directives(mut self, directives: impl Into<String>) -> Self {
        self.config.filter_directives = Some(directives.into());
        self
    }

    /// 构建配置
    pub fn build(self) -> LoggerConfig {
        self.config
    }
}

// ============================================================================
// 日志守卫
// ============================================================================

/// 日志系统守卫
///
/// 持有非阻塞写入器的 WorkerGuard，确保在程序退出前完成日志写入。
pub struct LogGuard {
    _console_guard: Option<WorkerGuard>,
    _file_guard: Option<WorkerGuard>,
}

impl LogGuard {
    fn empty() -> Self {
        Self {
            _console_guard: None,
            _file_guard: None,
        }
    }
}

// ============================================================================
// 日志系统
// ============================================================================

/// 全局日志初始化状态
static LOGGER_INITIALIZED: OnceLock<bool> = OnceLock::new();

/// 日志系统
///
/// 提供日志系统的初始化和管理功能
pub struct Logger;

impl Logger {
    /// 初始化日志系统
    ///
    /// 根据配置初始化 tracing-subscriber，支持控制台和文件输出。
    ///
    /// # Returns
    ///
    /// 返回 `LogGuard`，必须保持活动状态直到程序退出
    ///
    /// # Errors
    ///
    /// 如果日志系统已初始化或配置无效，返回错误
    pub fn init(config: LoggerConfig) -> Result<LogGuard> {
        if LOGGER_INITIALIZED.get().is_some() {
            return Err(CoreError::InitFailed(
                "日志系统已初始化，不能重复初始化".to_string(),
            ));
        }

        let env_filter = Self::create_env_filter(&config);
        let mut guard = LogGuard::empty();

        // 控制台层
        let console_layer = if config.console_output {
            let (non_blocking, console_guard) = tracing_appender::non_blocking(io::stdout());
            guard._console_guard = Some(console_guard);

            if config.json_format {
                Some(
                    fmt::layer()
                        .json()
                        .with_writer(non_blocking)
                        .with_target(config.show_target)
                        .with_file(config.show_file_line)
                        .with_line_number(config.show_file_line)
                        .with_ansi(false)
                        .boxed(),
                )
            } else {
                Some(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_target(config.show_target)
                        .with_file(config.show_file_line)
                        .with_line_number(config.show_file_line)
                        .with_ansi(config.ansi_colors)
                        .boxed(),
                )
            }
        } else {
            None
        };

        // 文件层（文件不使用 ANSI 颜色）
        let file_layer = if let Some(ref log_dir) = config.file_output {
            let file_appender = RollingFileAppender::new(
                config.rotation.to_rotation(),
                log_dir,
                format!("{}.log", config.file_prefix),
            );

            let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);
            guard._file_guard = Some(file_guard);

            if config.json_format {
                Some(
                    fmt::layer()
                        .json()
                        .with_writer(non_blocking)
                        .with_target(config.show_target)
                        .with_ansi(false)
                        .boxed(),
                )
            } else {
                Some(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_target(config.show_target)
                        .with_ansi(false)
                        .boxed(),
                )
            }
        } else {
            None
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| CoreError::InitFailed(format!("日志系统初始化失败: {}", e)))?;

        let _ = LOGGER_INITIALIZED.set(true);
        Ok(guard)
    }

    /// 尝试初始化日志系统（不会失败）
    ///
    /// 如果日志系统已初始化，返回空守卫而不是错误。
    /// 适用于测试或多次调用初始化的场景。
    pub fn try_init(config: LoggerConfig) -> LogGuard {
        Self::init(config).unwrap_or_else(|_| LogGuard::empty())
    }

    /// 使用默认配置初始化日志系统
    pub fn init_default() -> Result<LogGuard> {
        Self::init(LoggerConfig::default())
    }

    /// 创建 EnvFilter
    ///
    /// 优先使用环境变量 RUST_LOG，其次使用配置中的级别与过滤指令
    fn create_env_filter(config: &LoggerConfig) -> EnvFilter {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.level));

        if let Some(ref directives) = config.filter_directives {
            directives
                .split(',')
                .filter_map(|d| d.trim().parse().ok())
                .fold(filter, |f, directive| f.add_directive(directive))
        } else {
            filter
        }
    }
}

// ============================================================================
// 结构化日志字段定义
// ============================================================================

/// 标准日志字段名称
///
/// 提供统一的日志字段命名，便于日志分析和查询
pub mod fields {
    /// 模块 ID 字段
    pub const MODULE_ID: &str = "module_id";
    /// 模块显示名称字段
    pub const MODULE_NAME: &str = "module_name";
    /// 激活实例 ID 字段
    pub const ACTIVATION_ID: &str = "activation_id";
    /// 模块状态字段
    pub const STATE: &str = "state";
    /// 已执行清理动作数量字段
    pub const CLEANUPS: &str = "cleanups";
    /// 错误码字段
    pub const ERROR_CODE: &str = "error_code";
    /// 错误消息字段
    pub const ERROR_MSG: &str = "error_msg";
    /// 耗时字段（毫秒）
    pub const DURATION_MS: &str = "duration_ms";
    /// 版本字段
    pub const VERSION: &str = "version";
}
