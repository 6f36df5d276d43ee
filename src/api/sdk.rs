//! 内核 SDK
//!
//! `VeneerCore` 是宿主程序使用内核的统一入口：注册模块、启动、
//! 启停单个模块、读写子选项存储值、查询实例状态、关闭。

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::core::config::CoreConfig;
use crate::module::descriptor::{InstanceInfo, ModuleDescriptor, ModuleSummary};
use crate::module::registry::{ModuleRegistry, RegistrationHandle};
use crate::module::runner::{LifecycleRunner, StoredValues};
use crate::utils::logger::{LogGuard, Logger, LoggerConfig};
use crate::utils::{CoreError, Result};

// ==================== 内核状态 ====================

/// 内核状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreState {
    /// 已创建，尚未启动
    Initialized,
    /// 运行中
    Running,
    /// 正在关闭
    ShuttingDown,
    /// 已关闭
    Shutdown,
}

impl CoreState {
    /// 是否允许启动
    pub fn can_start(&self) -> bool {
        matches!(self, CoreState::Initialized)
    }

    /// 是否允许关闭
    pub fn can_shutdown(&self) -> bool {
        matches!(self, CoreState::Running)
    }

    /// 是否在运行中
    pub fn is_running(&self) -> bool {
        matches!(self, CoreState::Running)
    }
}

impl std::fmt::Display for CoreState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CoreState::Initialized => "initialized",
            CoreState::Running => "running",
            CoreState::ShuttingDown => "shutting_down",
            CoreState::Shutdown => "shutdown",
        };
        write!(f, "{}", s)
    }
}

// ==================== 内核 SDK ====================

/// Veneer 内核
pub struct VeneerCore {
    /// 内核配置
    config: CoreConfig,
    /// 生命周期执行器（持有注册表）
    runner: LifecycleRunner,
    /// 子选项存储值（模块 ID -> 选项名 -> 值），由宿主持久化层写入
    stored_values: RwLock<StoredValues>,
    /// 内核状态
    state: RwLock<CoreState>,
    /// 启动时间
    started_at: RwLock<Option<DateTime<Utc>>>,
    /// 日志守卫，保持到内核销毁
    log_guard: Mutex<Option<LogGuard>>,
}

impl VeneerCore {
    /// 使用指定配置创建内核
    pub fn new(config: CoreConfig) -> Self {
        Self {
            config,
            runner: LifecycleRunner::new(ModuleRegistry::new()),
            stored_values: RwLock::new(StoredValues::new()),
            state: RwLock::new(CoreState::Initialized),
            started_at: RwLock::new(None),
            log_guard: Mutex::new(None),
        }
    }

    /// 使用默认配置创建内核
    pub fn with_defaults() -> Self {
        Self::new(CoreConfig::default())
    }

    /// 获取内核配置
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// 获取模块注册表
    pub fn registry(&self) -> &ModuleRegistry {
        self.runner.registry()
    }

    /// 获取生命周期执行器
    pub fn runner(&self) -> &LifecycleRunner {
        &self.runner
    }

    /// 获取内核状态
    pub async fn state(&self) -> CoreState {
        *self.state.read().await
    }

    /// 获取启动以来的时长
    pub async fn uptime(&self) -> Option<chrono::Duration> {
        let started_at = self.started_at.read().await;
        started_at.map(|t| Utc::now() - t)
    }

    // ==================== 模块注册与配置 ====================

    /// 注册模块描述符
    pub async fn register_module(
        &self,
        descriptor: ModuleDescriptor,
    ) -> Result<RegistrationHandle> {
        self.runner.registry().register(descriptor).await
    }

    /// 批量载入子选项存储值（来自宿主持久化层）
    pub async fn load_stored_values(&self, values: StoredValues) {
        let mut stored = self.stored_values.write().await;
        *stored = values;
    }

    /// 写入单个子选项存储值
    ///
    /// # Errors
    ///
    /// 模块未注册返回 `ModuleNotFound`，子选项未声明返回
    /// `UnknownSuboption`，值类型不符或未通过校验返回
    /// `InvalidSuboptionValue`。
    pub async fn set_option_value(
        &self,
        module_id: &str,
        name: &str,
        value: Value,
    ) -> Result<()> {
        let descriptor = self
            .runner
            .registry()
            .get_module(module_id)
            .await
            .ok_or_else(|| CoreError::ModuleNotFound(module_id.to_string()))?;

        let suboption = descriptor.find_suboption(name).ok_or_else(|| {
            CoreError::UnknownSuboption {
                module_id: module_id.to_string(),
                name: name.to_string(),
            }
        })?;

        suboption.validate_value(&value).await.map_err(|reason| {
            CoreError::InvalidSuboptionValue {
                module_id: module_id.to_string(),
                name: name.to_string(),
                reason,
            }
        })?;

        let mut stored = self.stored_values.write().await;
        stored
            .entry(module_id.to_string())
            .or_default()
            .insert(name.to_string(), value);
        Ok(())
    }

    /// 读取模块的子选项存储值
    pub async fn option_values(&self, module_id: &str) -> HashMap<String, Value> {
        let stored = self.stored_values.read().await;
        stored.get(module_id).cloned().unwrap_or_default()
    }

    // ==================== 生命周期 ====================

    /// 启动内核
    ///
    /// 初始化日志系统，按配置调整模块启用状态，然后按注册顺序激活
    /// 所有已启用的模块。返回成功派发激活任务的模块数量。
    ///
    /// # Errors
    ///
    /// 内核不处于 `Initialized` 状态时返回 `CoreError::InitFailed`。
    pub async fn start(&self) -> Result<usize> {
        {
            let state = self.state.read().await;
            if !state.can_start() {
                return Err(CoreError::InitFailed(format!(
                    "内核当前状态不允许启动: {}",
                    state
                )));
            }
        }

        {
            let guard = Logger::try_init(LoggerConfig::from_log_config(&self.config.logging));
            let mut log_guard = self.log_guard.lock().await;
            *log_guard = Some(guard);
        }

        info!(
            version = crate::VERSION,
            dev_mode = self.config.dev_mode,
            "Veneer 内核启动"
        );

        self.apply_module_config().await;

        let activated = {
            let stored = self.stored_values.read().await;
            self.runner.activate_all(&stored).await
        };

        {
            let mut state = self.state.write().await;
            *state = CoreState::Running;
        }
        {
            let mut started_at = self.started_at.write().await;
            *started_at = Some(Utc::now());
        }

        info!(count = activated, "内核启动完成");
        Ok(activated)
    }

    /// 按配置调整模块启用状态
    ///
    /// `enable_all` 关闭时先禁用全部模块，再应用 `auto_enable` 和
    /// `auto_disable` 覆盖。未注册的模块 ID 只记录警告。
    async fn apply_module_config(&self) {
        let registry = self.runner.registry();

        if !self.config.modules.enable_all {
            for descriptor in registry.list_modules().await {
                // 全部模块已注册，这里不会失败
                let _ = registry.set_enabled(&descriptor.id, false).await;
            }
        }

        for module_id in &self.config.modules.auto_enable {
            if let Err(e) = registry.set_enabled(module_id, true).await {
                warn!(
                    module_id = %module_id,
                    error_code = e.error_code(),
                    "auto_enable 引用了未注册的模块，忽略"
                );
            }
        }

        for module_id in &self.config.modules.auto_disable {
            if let Err(e) = registry.set_enabled(module_id, false).await {
                warn!(
                    module_id = %module_id,
                    error_code = e.error_code(),
                    "auto_disable 引用了未注册的模块，忽略"
                );
            }
        }
    }

    /// 关闭内核
    ///
    /// 按注册顺序停用所有运行中的模块，并排空初始化阶段积累的卸载
    /// 上下文。返回停用的模块数量。
    ///
    /// # Errors
    ///
    /// 内核不处于 `Running` 状态时返回 `CoreError::Internal`。
    pub async fn shutdown(&self) -> Result<usize> {
        {
            let mut state = self.state.write().await;
            if !state.can_shutdown() {
                return Err(CoreError::Internal(format!(
                    "内核当前状态不允许关闭: {}",
                    state
                )));
            }
            *state = CoreState::ShuttingDown;
        }

        let deactivated = self.runner.shutdown().await;

        {
            let mut state = self.state.write().await;
            *state = CoreState::Shutdown;
        }

        info!(count = deactivated, "内核已关闭");
        Ok(deactivated)
    }

    /// 启用并激活模块
    ///
    /// 内核运行中时立即激活，否则只更新启用状态，留待 `start` 激活。
    pub async fn enable_module(&self, module_id: &str) -> Result<()> {
        self.runner.registry().set_enabled(module_id, true).await?;

        if self.state().await.is_running() {
            let values = self.option_values(module_id).await;
            self.runner.activate(module_id, &values).await?;
        }
        Ok(())
    }

    /// 禁用并停用模块
    ///
    /// 内核运行中时立即停用（模块本就不在运行则静默成功），
    /// 否则只更新启用状态。
    pub async fn disable_module(&self, module_id: &str) -> Result<()> {
        self.runner.registry().set_enabled(module_id, false).await?;

        if self.state().await.is_running() {
            match self.runner.deactivate(module_id).await {
                Ok(()) | Err(CoreError::ModuleNotActive(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    // ==================== 查询 ====================

    /// 按注册顺序列出模块摘要（供宿主配置界面使用）
    pub async fn list_modules(&self) -> Vec<ModuleSummary> {
        self.runner.registry().summaries().await
    }

    /// 查询模块实例信息
    pub async fn module_instance(&self, module_id: &str) -> Option<InstanceInfo> {
        self.runner.instance(module_id).await
    }

    /// 等待所有未落定的激活任务结束，收集各模块的实例信息
    ///
    /// # Errors
    ///
    /// 超过配置的 `settle_timeout_ms` 仍未落定时返回 `CoreError::Timeout`。
    pub async fn settle(&self) -> Result<Vec<InstanceInfo>> {
        let timeout = Duration::from_millis(self.config.modules.settle_timeout_ms);
        tokio::time::timeout(timeout, self.runner.settle())
            .await
            .map_err(|_| {
                CoreError::Timeout(format!(
                    "等待模块激活落定超过 {} 毫秒",
                    self.config.modules.settle_timeout_ms
                ))
            })
    }
}

impl std::fmt::Debug for VeneerCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VeneerCore")
            .field("dev_mode", &self.config.dev_mode)
            .finish_non_exhaustive()
    }
}
