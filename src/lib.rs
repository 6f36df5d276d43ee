//! # Veneer 页面增强内核
//!
//! Veneer 是一个页面增强套件的模块生命周期内核：增强功能以模块为
//! 单位注册到内核，内核负责解析模块的子选项、按启用状态激活模块、
//! 隔离单个模块的失败，并在停用时按登记顺序执行模块积累的清理动作。
//!
//! ## 核心概念
//!
//! - **模块描述符**（[`module::ModuleDescriptor`]）：模块的标识、展示
//!   信息、子选项模式和生命周期入口（`main` 必选，`init`/`unload` 可选）
//! - **模块注册表**（[`module::ModuleRegistry`]）：按注册顺序保存描述符，
//!   维护启用状态，拒绝重复 ID
//! - **生命周期执行器**（[`module::LifecycleRunner`]）：在独立任务中执行
//!   模块入口，`init` 每个进程至多成功一次，失败绝不波及其他模块
//! - **卸载上下文**（[`module::UnloaderContext`]）：每次激活独立的清理
//!   动作累加器，按登记顺序执行，幂等，迟到的登记立即执行
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use veneer_core::{ModuleDescriptor, VeneerCore};
//!
//! #[tokio::main]
//! async fn main() -> veneer_core::Result<()> {
//!     let core = VeneerCore::with_defaults();
//!
//!     let descriptor = ModuleDescriptor::builder("theme", "页面主题")
//!         .main(|_options, ctx| async move {
//!             // 应用增强，登记清理动作
//!             ctx.add_function(|| { /* 还原页面 */ }).await;
//!             Ok(())
//!         })
//!         .build()?;
//!     core.register_module(descriptor).await?;
//!
//!     core.start().await?;
//!     core.settle().await?;
//!     core.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod core;
pub mod module;
pub mod utils;

// ==================== 常用类型重导出 ====================

pub use crate::api::{CoreState, VeneerCore};
pub use crate::core::config::{CoreConfig, CoreConfigBuilder, LogConfig, ModuleConfig};
pub use crate::module::{
    ContextState, InstanceInfo, LifecycleRunner, ModuleDescriptor, ModuleRegistry, ModuleState,
    ModuleSummary, Removable, ResolvedOptions, StoredValues, Suboption, SuboptionKind,
    SuboptionValidator, UnloaderContext,
};
pub use crate::utils::{CoreError, Result};

/// 内核版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_follows_cargo() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
        assert!(!VERSION.is_empty());
    }
}
