//! 内核配置
//!
//! 定义内核的配置结构和加载逻辑。

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否输出到文件
    #[serde(default)]
    pub file_output: bool,

    /// 日志文件目录
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// 是否输出 JSON 格式
    #[serde(default)]
    pub json_format: bool,

    /// 日志轮转策略
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: false,
            log_dir: None,
            json_format: false,
            rotation: default_rotation(),
        }
    }
}

/// 模块管理配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// 启动时是否按描述符默认值启用全部模块
    ///
    /// 关闭后只有 `auto_enable` 列出的模块会被启用
    #[serde(default = "default_enable_all")]
    pub enable_all: bool,

    /// 启动时强制启用的模块 ID 列表（覆盖描述符默认值）
    #[serde(default)]
    pub auto_enable: Vec<String>,

    /// 启动时强制禁用的模块 ID 列表（覆盖描述符默认值）
    #[serde(default)]
    pub auto_disable: Vec<String>,

    /// 等待所有模块激活任务落定的超时时间（毫秒）
    #[serde(default = "default_settle_timeout_ms")]
    pub settle_timeout_ms: u64,
}

fn default_settle_timeout_ms() -> u64 {
    10_000
}

fn default_enable_all() -> bool {
    true
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            enable_all: default_enable_all(),
            auto_enable: vec![],
            auto_disable: vec![],
            settle_timeout_ms: default_settle_timeout_ms(),
        }
    }
}

/// 内核配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// 配置文件路径
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// 日志配置
    #[serde(default)]
    pub logging: LogConfig,

    /// 模块管理配置
    #[serde(default)]
    pub modules: ModuleConfig,

    /// 是否为开发模式
    #[serde(default)]
    pub dev_mode: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            logging: LogConfig::default(),
            modules: ModuleConfig::default(),
            dev_mode: false,
        }
    }
}

impl CoreConfig {
    /// 创建配置构建器
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::new()
    }

    /// 从文件加载配置
    ///
    /// 根据扩展名判断格式：`.json` 按 JSON 解析，其余按 YAML 解析。
    pub async fn from_file(path: impl Into<PathBuf>) -> crate::utils::Result<Self> {
        let path = path.into();
        let content = tokio::fs::read_to_string(&path).await?;

        let mut config: CoreConfig = if path.extension().map(|e| e == "json").unwrap_or(false) {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        config.config_path = Some(path);
        Ok(config)
    }

    /// 合并另一个配置（用于覆盖）
    ///
    /// 只覆盖非默认值的配置项
    pub fn merge(&mut self, other: CoreConfig) {
        if other.logging.level != default_log_level() {
            self.logging.level = other.logging.level;
        }
        if other.logging.file_output {
            self.logging.file_output = true;
            self.logging.log_dir = other.logging.log_dir;
        }
        if other.logging.json_format {
            self.logging.json_format = true;
        }
        if !other.modules.enable_all {
            self.modules.enable_all = false;
        }
        if !other.modules.auto_enable.is_empty() {
            self.modules.auto_enable.extend(other.modules.auto_enable);
        }
        if !other.modules.auto_disable.is_empty() {
            self.modules.auto_disable.extend(other.modules.auto_disable);
        }
        if other.modules.settle_timeout_ms != default_settle_timeout_ms() {
            self.modules.settle_timeout_ms = other.modules.settle_timeout_ms;
        }
        if other.dev_mode {
            self.dev_mode = true;
        }
    }
}

/// 配置构建器
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    config: CoreConfig,
}

impl CoreConfigBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self {
            config: CoreConfig::default(),
        }
    }

    /// 设置配置文件路径
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.config_path = Some(path.into());
        self
    }

    /// 设置日志级别
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// 启用文件日志
    pub fn file_logging(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.config.logging.file_output = true;
        self.config.logging.log_dir = Some(log_dir.into());
        self
    }

    /// 启用 JSON 格式日志
    pub fn json_logging(mut self) -> Self {
        self.config.logging.json_format = true;
        self
    }

    /// 设置启动时是否按默认值启用全部模块
    pub fn enable_all(mut self, enable: bool) -> Self {
        self.config.modules.enable_all = enable;
        self
    }

    /// 添加启动时强制启用的模块
    pub fn auto_enable(mut self, module_id: impl Into<String>) -> Self {
        self.config.modules.auto_enable.push(module_id.into());
        self
    }

    /// 添加启动时强制禁用的模块
    pub fn auto_disable(mut self, module_id: impl Into<String>) -> Self {
        self.config.modules.auto_disable.push(module_id.into());
        self
    }

    /// 设置落定超时时间（毫秒）
    pub fn settle_timeout_ms(mut self, ms: u64) -> Self {
        self.config.modules.settle_timeout_ms = ms;
        self
    }

    /// 启用开发模式
    pub fn dev_mode(mut self) -> Self {
        self.config.dev_mode = true;
        self
    }

    /// 构建配置
    pub fn build(self) -> CoreConfig {
        self.config
    }
}
