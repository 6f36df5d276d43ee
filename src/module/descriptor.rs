//! 模块描述符
//!
//! 描述符是模块向内核声明自身的唯一方式：标识、展示信息、子选项模式
//! 和生命周期入口（`main` 必选，`init`/`unload` 可选）。描述符注册后
//! 不可变，内核按需克隆共享。

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;

use crate::module::suboption::{ResolvedOptions, Suboption, SuboptionSchema};
use crate::module::unloader::UnloaderContext;
use crate::utils::{is_valid_module_id, Result};

/// 模块主入口类型
///
/// 接收解析完成的选项和本次激活的卸载上下文
pub type MainFn =
    Arc<dyn Fn(ResolvedOptions, Arc<UnloaderContext>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// 模块一次性初始化入口类型
///
/// 与主入口签名相同，但每个进程生命周期内至多成功执行一次
pub type InitFn = MainFn;

/// 模块自定义卸载钩子类型
///
/// 在停用时先于卸载上下文的清理动作执行
pub type UnloadFn = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

// ==================== 模块状态 ====================

/// 模块实例状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleState {
    /// 已注册，尚未激活
    Registered,
    /// 激活任务已派发，入口仍在执行
    Activating,
    /// 主入口正常返回
    Active,
    /// 主入口返回错误或发生崩溃
    Failed,
    /// 已停用
    Deactivated,
}

impl ModuleState {
    /// 是否允许发起激活
    pub fn can_activate(&self) -> bool {
        matches!(
            self,
            ModuleState::Registered | ModuleState::Failed | ModuleState::Deactivated
        )
    }

    /// 是否允许发起停用
    pub fn can_deactivate(&self) -> bool {
        matches!(self, ModuleState::Activating | ModuleState::Active)
    }
}

impl std::fmt::Display for ModuleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ModuleState::Registered => "registered",
            ModuleState::Activating => "activating",
            ModuleState::Active => "active",
            ModuleState::Failed => "failed",
            ModuleState::Deactivated => "deactivated",
        };
        write!(f, "{}", s)
    }
}

// ==================== 实例信息 ====================

/// 模块实例运行信息
#[derive(Debug, Clone, Serialize)]
pub struct InstanceInfo {
    /// 模块 ID
    pub module_id: String,
    /// 本次激活的唯一 ID
    pub activation_id: String,
    /// 当前状态
    pub state: ModuleState,
    /// 激活发起时间
    pub activated_at: DateTime<Utc>,
    /// 激活任务落定时间（成功或失败）
    pub completed_at: Option<DateTime<Utc>>,
    /// 最近一次错误信息
    pub last_error: Option<String>,
}

/// 模块摘要（供宿主配置界面列举模块使用）
#[derive(Debug, Clone, Serialize)]
pub struct ModuleSummary {
    /// 模块 ID
    pub module_id: String,
    /// 显示名称
    pub name: String,
    /// 模块描述
    pub description: Option<String>,
    /// 默认是否启用
    pub default_enabled: bool,
    /// 是否在配置界面显示
    pub show_in_options: bool,
    /// 是否拥有独立的顶层开关
    pub top_level_option: bool,
    /// 子选项模式
    pub suboptions: Vec<SuboptionSchema>,
}

// ==================== 描述符 ====================

/// 模块描述符
#[derive(Clone)]
pub struct ModuleDescriptor {
    /// 模块 ID（全局唯一）
    pub id: String,
    /// 显示名称
    pub name: String,
    /// 模块描述
    pub description: Option<String>,
    /// 子选项声明
    pub suboptions: Vec<Suboption>,
    /// 主入口
    pub main: MainFn,
    /// 一次性初始化入口
    pub init: Option<InitFn>,
    /// 自定义卸载钩子
    pub unload: Option<UnloadFn>,
    /// 默认是否启用
    pub default_enabled: bool,
    /// 是否在配置界面显示
    pub show_in_options: bool,
    /// 是否拥有独立的顶层开关
    pub top_level_option: bool,
}

impl ModuleDescriptor {
    /// 创建描述符构建器
    pub fn builder(id: impl Into<String>, name: impl Into<String>) -> DescriptorBuilder {
        DescriptorBuilder::new(id, name)
    }

    /// 生成模块摘要
    pub fn summary(&self) -> ModuleSummary {
        ModuleSummary {
            module_id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            default_enabled: self.default_enabled,
            show_in_options: self.show_in_options,
            top_level_option: self.top_level_option,
            suboptions: self.suboptions.iter().map(Suboption::schema).collect(),
        }
    }

    /// 查找子选项声明
    pub fn find_suboption(&self, name: &str) -> Option<&Suboption> {
        self.suboptions.iter().find(|s| s.name == name)
    }
}

impl std::fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("description", &self.description)
            .field("suboptions", &self.suboptions.len())
            .field("has_init", &self.init.is_some())
            .field("has_unload", &self.unload.is_some())
            .field("default_enabled", &self.default_enabled)
            .field("show_in_options", &self.show_in_options)
            .field("top_level_option", &self.top_level_option)
            .finish()
    }
}

// ==================== 构建器 ====================

/// 模块描述符构建器
pub struct DescriptorBuilder {
    id: String,
    name: String,
    description: Option<String>,
    suboptions: Vec<Suboption>,
    main: Option<MainFn>,
    init: Option<InitFn>,
    unload: Option<UnloadFn>,
    default_enabled: bool,
    show_in_options: bool,
    top_level_option: bool,
}

impl DescriptorBuilder {
    /// 创建新的构建器
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            suboptions: Vec::new(),
            main: None,
            init: None,
            unload: None,
            default_enabled: true,
            show_in_options: true,
            top_level_option: false,
        }
    }

    /// 设置模块描述
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// 添加子选项声明
    pub fn suboption(mut self, suboption: Suboption) -> Self {
        self.suboptions.push(suboption);
        self
    }

    /// 设置主入口
    pub fn main<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ResolvedOptions, Arc<UnloaderContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.main = Some(Arc::new(move |options, ctx| Box::pin(f(options, ctx))));
        self
    }

    /// 设置一次性初始化入口
    pub fn init<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ResolvedOptions, Arc<UnloaderContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.init = Some(Arc::new(move |options, ctx| Box::pin(f(options, ctx))));
        self
    }

    /// 设置自定义卸载钩子
    pub fn unload<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.unload = Some(Arc::new(move || Box::pin(f())));
        self
    }

    /// 设置默认是否启用
    pub fn default_enabled(mut self, enabled: bool) -> Self {
        self.default_enabled = enabled;
        self
    }

    /// 设置是否在配置界面显示
    pub fn show_in_options(mut self, show: bool) -> Self {
        self.show_in_options = show;
        self
    }

    /// 标记为拥有独立的顶层开关
    pub fn top_level_option(mut self) -> Self {
        self.top_level_option = true;
        self
    }

    /// 构建描述符
    ///
    /// # Errors
    ///
    /// 模块 ID 不合法、名称为空、缺少主入口或子选项名重复时返回
    /// `CoreError::InvalidDescriptor`。
    pub fn build(self) -> Result<ModuleDescriptor> {
        use crate::utils::CoreError;

        if !is_valid_module_id(&self.id) {
            return Err(CoreError::InvalidDescriptor(format!(
                "模块 ID 不合法: '{}'",
                self.id
            )));
        }
        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidDescriptor(format!(
                "模块 '{}' 缺少显示名称",
                self.id
            )));
        }
        let main = self.main.ok_or_else(|| {
            CoreError::InvalidDescriptor(format!("模块 '{}' 缺少主入口", self.id))
        })?;

        for (i, suboption) in self.suboptions.iter().enumerate() {
            if self.suboptions[..i].iter().any(|s| s.name == suboption.name) {
                return Err(CoreError::InvalidDescriptor(format!(
                    "模块 '{}' 的子选项名重复: '{}'",
                    self.id, suboption.name
                )));
            }
        }

        Ok(ModuleDescriptor {
            id: self.id,
            name: self.name,
            description: self.description,
            suboptions: self.suboptions,
            main,
            init: self.init,
            unload: self.unload,
            default_enabled: self.default_enabled,
            show_in_options: self.show_in_options,
            top_level_option: self.top_level_option,
        })
    }
}
