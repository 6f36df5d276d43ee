//! 模块注册表
//!
//! 进程级的模块描述符存储。注册表显式创建、显式传递，不使用全局
//! 单例；克隆注册表共享同一份底层存储。注册顺序被保留，供激活与
//! 枚举时使用。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::module::descriptor::{ModuleDescriptor, ModuleSummary};
use crate::utils::{error_code, CoreError, Result};

/// 注册回执
///
/// 确认注册成功，携带模块 ID 和注册顺序位置
#[derive(Debug, Clone)]
pub struct RegistrationHandle {
    /// 模块 ID
    pub module_id: String,
    /// 注册顺序位置（从 0 开始）
    pub index: usize,
}

/// 模块注册表
#[derive(Clone)]
pub struct ModuleRegistry {
    /// 模块描述符存储（模块 ID -> 描述符）
    modules: Arc<RwLock<HashMap<String, Arc<ModuleDescriptor>>>>,
    /// 注册顺序
    order: Arc<RwLock<Vec<String>>>,
    /// 启用状态（模块 ID -> 是否启用）
    enabled: Arc<RwLock<HashMap<String, bool>>>,
}

impl ModuleRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self {
            modules: Arc::new(RwLock::new(HashMap::new())),
            order: Arc::new(RwLock::new(Vec::new())),
            enabled: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 注册模块描述符
    ///
    /// 启用状态初始化为描述符的 `default_enabled`。
    ///
    /// # Errors
    ///
    /// 模块 ID 已被占用时返回 `CoreError::DuplicateModuleId`。
    pub async fn register(&self, descriptor: ModuleDescriptor) -> Result<RegistrationHandle> {
        let mut modules = self.modules.write().await;
        let mut order = self.order.write().await;
        let mut enabled = self.enabled.write().await;

        if modules.contains_key(&descriptor.id) {
            warn!(
                module_id = %descriptor.id,
                error_code = error_code::MODULE_DUPLICATE_ID,
                "模块 ID 重复注册，拒绝"
            );
            return Err(CoreError::DuplicateModuleId(descriptor.id));
        }

        let module_id = descriptor.id.clone();
        let index = order.len();

        info!(
            module_id = %module_id,
            module_name = %descriptor.name,
            default_enabled = descriptor.default_enabled,
            "模块注册成功"
        );

        enabled.insert(module_id.clone(), descriptor.default_enabled);
        modules.insert(module_id.clone(), Arc::new(descriptor));
        order.push(module_id.clone());

        Ok(RegistrationHandle { module_id, index })
    }

    /// 按注册顺序列出所有模块描述符
    pub async fn list_modules(&self) -> Vec<Arc<ModuleDescriptor>> {
        let modules = self.modules.read().await;
        let order = self.order.read().await;

        order
            .iter()
            .filter_map(|id| modules.get(id).cloned())
            .collect()
    }

    /// 按注册顺序生成模块摘要（供宿主配置界面使用）
    pub async fn summaries(&self) -> Vec<ModuleSummary> {
        self.list_modules()
            .await
            .iter()
            .map(|d| d.summary())
            .collect()
    }

    /// 查找模块描述符
    pub async fn get_module(&self, module_id: &str) -> Option<Arc<ModuleDescriptor>> {
        let modules = self.modules.read().await;
        modules.get(module_id).cloned()
    }

    /// 设置模块启用状态
    ///
    /// # Errors
    ///
    /// 模块不存在时返回 `CoreError::ModuleNotFound`。
    pub async fn set_enabled(&self, module_id: &str, enable: bool) -> Result<()> {
        let modules = self.modules.read().await;
        if !modules.contains_key(module_id) {
            return Err(CoreError::ModuleNotFound(module_id.to_string()));
        }

        let mut enabled = self.enabled.write().await;
        enabled.insert(module_id.to_string(), enable);
        debug!(module_id = %module_id, enabled = enable, "更新模块启用状态");
        Ok(())
    }

    /// 查询模块是否启用
    ///
    /// 未注册的模块视为未启用
    pub async fn is_enabled(&self, module_id: &str) -> bool {
        let enabled = self.enabled.read().await;
        enabled.get(module_id).copied().unwrap_or(false)
    }

    /// 按注册顺序列出所有已启用的模块 ID
    pub async fn enabled_modules(&self) -> Vec<String> {
        let order = self.order.read().await;
        let enabled = self.enabled.read().await;

        order
            .iter()
            .filter(|id| enabled.get(*id).copied().unwrap_or(false))
            .cloned()
            .collect()
    }

    /// 检查模块是否已注册
    pub async fn exists(&self, module_id: &str) -> bool {
        let modules = self.modules.read().await;
        modules.contains_key(module_id)
    }

    /// 获取已注册模块数量
    pub async fn count(&self) -> usize {
        let modules = self.modules.read().await;
        modules.len()
    }

    /// 按条件查找模块（按注册顺序）
    pub async fn find_modules<F>(&self, predicate: F) -> Vec<Arc<ModuleDescriptor>>
    where
        F: Fn(&ModuleDescriptor) -> bool,
    {
        self.list_modules()
            .await
            .into_iter()
            .filter(|d| predicate(d))
            .collect()
    }

    /// 清空注册表（测试辅助）
    pub async fn clear(&self) {
        let mut modules = self.modules.write().await;
        let mut order = self.order.write().await;
        let mut enabled = self.enabled.write().await;

        modules.clear();
        order.clear();
        enabled.clear();
        debug!("注册表已清空");
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: &str) -> ModuleDescriptor {
        ModuleDescriptor::builder(id, format!("模块 {}", id))
            .main(|_options, _ctx| async { Ok(()) })
            .build()
            .unwrap()
    }

    fn disabled_descriptor(id: &str) -> ModuleDescriptor {
        ModuleDescriptor::builder(id, format!("模块 {}", id))
            .default_enabled(false)
            .main(|_options, _ctx| async { Ok(()) })
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_module() {
        let registry = ModuleRegistry::new();
        let handle = registry.register(descriptor("theme")).await.unwrap();

        assert_eq!(handle.module_id, "theme");
        assert_eq!(handle.index, 0);
        assert_eq!(registry.count().await, 1);
        assert!(registry.exists("theme").await);
    }

    #[tokio::test]
    async fn test_register_duplicate_rejected() {
        let registry = ModuleRegistry::new();
        registry.register(descriptor("theme")).await.unwrap();

        let result = registry.register(descriptor("theme")).await;
        assert!(matches!(result, Err(CoreError::DuplicateModuleId(_))));
        // 注册表不受影响
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn test_list_preserves_registration_order() {
        let registry = ModuleRegistry::new();
        registry.register(descriptor("theme")).await.unwrap();
        registry
            .register(descriptor("schedule-date-picker"))
            .await
            .unwrap();
        registry.register(descriptor("quick-links")).await.unwrap();

        let ids: Vec<String> = registry
            .list_modules()
            .await
            .iter()
            .map(|d| d.id.clone())
            .collect();
        assert_eq!(ids, vec!["theme", "schedule-date-picker", "quick-links"]);
    }

    #[tokio::test]
    async fn test_get_module() {
        let registry = ModuleRegistry::new();
        registry.register(descriptor("theme")).await.unwrap();

        let found = registry.get_module("theme").await;
        assert!(found.is_some());
        assert!(registry.get_module("nonexistent").await.is_none());
    }

    #[tokio::test]
    async fn test_enabled_defaults_from_descriptor() {
        let registry = ModuleRegistry::new();
        registry.register(descriptor("theme")).await.unwrap();
        registry
            .register(disabled_descriptor("quick-links"))
            .await
            .unwrap();

        assert!(registry.is_enabled("theme").await);
        assert!(!registry.is_enabled("quick-links").await);
    }

    #[tokio::test]
    async fn test_set_enabled() {
        let registry = ModuleRegistry::new();
        registry.register(descriptor("theme")).await.unwrap();

        registry.set_enabled("theme", false).await.unwrap();
        assert!(!registry.is_enabled("theme").await);

        registry.set_enabled("theme", true).await.unwrap();
        assert!(registry.is_enabled("theme").await);
    }

    #[tokio::test]
    async fn test_set_enabled_unknown_module() {
        let registry = ModuleRegistry::new();
        let result = registry.set_enabled("nonexistent", true).await;
        assert!(matches!(result, Err(CoreError::ModuleNotFound(_))));
    }

    #[tokio::test]
    async fn test_is_enabled_unregistered_is_false() {
        let registry = ModuleRegistry::new();
        assert!(!registry.is_enabled("nonexistent").await);
    }

    #[tokio::test]
    async fn test_enabled_modules_in_order() {
        let registry = ModuleRegistry::new();
        registry.register(descriptor("theme")).await.unwrap();
        registry
            .register(disabled_descriptor("quick-links"))
            .await
            .unwrap();
        registry
            .register(descriptor("schedule-date-picker"))
            .await
            .unwrap();

        let enabled = registry.enabled_modules().await;
        assert_eq!(enabled, vec!["theme", "schedule-date-picker"]);
    }

    #[tokio::test]
    async fn test_find_modules() {
        let registry = ModuleRegistry::new();
        registry.register(descriptor("theme")).await.unwrap();
        registry.register(descriptor("theme-extra")).await.unwrap();
        registry.register(descriptor("quick-links")).await.unwrap();

        let found = registry
            .find_modules(|d| d.id.starts_with("theme"))
            .await;
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn test_clear() {
        let registry = ModuleRegistry::new();
        registry.register(descriptor("theme")).await.unwrap();
        registry.clear().await;

        assert_eq!(registry.count().await, 0);
        assert!(!registry.exists("theme").await);
        assert!(!registry.is_enabled("theme").await);
    }

    #[tokio::test]
    async fn test_clone_shares_storage() {
        let registry = ModuleRegistry::new();
        let cloned = registry.clone();

        registry.register(descriptor("theme")).await.unwrap();
        assert!(cloned.exists("theme").await);
        assert_eq!(cloned.count().await, 1);
    }

    #[tokio::test]
    async fn test_summaries() {
        let registry = ModuleRegistry::new();
        registry.register(descriptor("theme")).await.unwrap();

        let summaries = registry.summaries().await;
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].module_id, "theme");
    }
}
