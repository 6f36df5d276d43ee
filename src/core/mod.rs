//! 核心配置模块

pub mod config;

pub use config::{CoreConfig, CoreConfigBuilder, LogConfig, ModuleConfig};
