//! 生命周期执行器
//!
//! 负责模块的激活与停用。每个模块的激活在独立的 tokio 任务中执行：
//! 可选的 `init` 入口每个进程生命周期内至多成功执行一次，随后执行
//! `main`。入口返回错误或崩溃只影响该模块自身，绝不阻塞或取消其他
//! 模块的激活。

use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::module::descriptor::{InstanceInfo, ModuleDescriptor, ModuleState};
use crate::module::registry::ModuleRegistry;
use crate::module::suboption::resolve_options;
use crate::module::unloader::{panic_message, UnloaderContext};
use crate::utils::{generate_activation_id, CoreError, Result};

/// 模块 ID 到存储子选项值的映射（持久化层的内存形态）
pub type StoredValues = HashMap<String, HashMap<String, Value>>;

/// 运行中的模块实例
struct ModuleInstance {
    info: InstanceInfo,
    context: Arc<UnloaderContext>,
}

/// 生命周期执行器
#[derive(Clone)]
pub struct LifecycleRunner {
    /// 模块注册表
    registry: ModuleRegistry,
    /// 模块实例（模块 ID -> 实例）
    instances: Arc<RwLock<HashMap<String, ModuleInstance>>>,
    /// 激活任务句柄（模块 ID -> 句柄）
    handles: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
    /// 本进程内 `init` 已成功执行过的模块 ID
    init_done: Arc<RwLock<HashSet<String>>>,
    /// `init` 阶段的卸载上下文，仅在内核关闭时排空
    init_contexts: Arc<RwLock<HashMap<String, Arc<UnloaderContext>>>>,
}

impl LifecycleRunner {
    /// 创建生命周期执行器
    pub fn new(registry: ModuleRegistry) -> Self {
        Self {
            registry,
            instances: Arc::new(RwLock::new(HashMap::new())),
            handles: Arc::new(Mutex::new(HashMap::new())),
            init_done: Arc::new(RwLock::new(HashSet::new())),
            init_contexts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 获取底层注册表
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// 激活模块
    ///
    /// 解析子选项后在独立任务中执行 `init`（如尚未执行过）和 `main`，
    /// 立即返回本次激活的卸载上下文，不等待入口完成。模块已在激活中
    /// 或已激活时记录警告并返回现有上下文。
    ///
    /// # Errors
    ///
    /// 模块未注册时返回 `CoreError::ModuleNotFound`。
    pub async fn activate(
        &self,
        module_id: &str,
        values: &HashMap<String, Value>,
    ) -> Result<Arc<UnloaderContext>> {
        let descriptor = self
            .registry
            .get_module(module_id)
            .await
            .ok_or_else(|| CoreError::ModuleNotFound(module_id.to_string()))?;

        // 选项解析可能在异步校验器上挂起，必须在拿锁之前完成
        let resolved = resolve_options(module_id, &descriptor.suboptions, values).await;
        let activation_id = generate_activation_id();
        let context = Arc::new(UnloaderContext::new(module_id, &activation_id));

        // 检查与登记持同一把写锁，并发激活同一模块只产生一个实例
        {
            let mut instances = self.instances.write().await;
            if let Some(instance) = instances.get(module_id) {
                if !instance.info.state.can_activate() {
                    warn!(
                        module_id = %module_id,
                        state = %instance.info.state,
                        "模块已在运行，忽略重复激活"
                    );
                    return Ok(instance.context.clone());
                }
            }
            instances.insert(
                module_id.to_string(),
                ModuleInstance {
                    info: InstanceInfo {
                        module_id: module_id.to_string(),
                        activation_id: activation_id.clone(),
                        state: ModuleState::Activating,
                        activated_at: Utc::now(),
                        completed_at: None,
                        last_error: None,
                    },
                    context: context.clone(),
                },
            );
        }

        info!(
            module_id = %module_id,
            module_name = %descriptor.name,
            activation_id = %activation_id,
            "开始激活模块"
        );

        let handle = tokio::spawn(run_activation(
            descriptor,
            resolved,
            context.clone(),
            activation_id,
            self.instances.clone(),
            self.init_done.clone(),
            self.init_contexts.clone(),
        ));

        let mut handles = self.handles.lock().await;
        handles.insert(module_id.to_string(), handle);

        Ok(context)
    }

    /// 按注册顺序激活所有已启用的模块
    ///
    /// 单个模块激活失败只记录警告，不影响其余模块。返回成功派发
    /// 激活任务的模块数量。
    pub async fn activate_all(&self, stored_values: &StoredValues) -> usize {
        let empty = HashMap::new();
        let mut activated = 0;

        for module_id in self.registry.enabled_modules().await {
            let values = stored_values.get(&module_id).unwrap_or(&empty);
            match self.activate(&module_id, values).await {
                Ok(_) => activated += 1,
                Err(e) => {
                    warn!(
                        module_id = %module_id,
                        error_code = e.error_code(),
                        error_msg = %e,
                        "模块激活失败，继续激活其余模块"
                    );
                }
            }
        }

        info!(count = activated, "批量激活完成");
        activated
    }

    /// 停用模块
    ///
    /// 先执行可选的自定义卸载钩子（失败只记录警告），再排空本次激活
    /// 的卸载上下文。实例条目保留为 `Deactivated` 供诊断查询。
    ///
    /// # Errors
    ///
    /// 模块未注册时返回 `CoreError::ModuleNotFound`，模块不在运行中时
    /// 返回 `CoreError::ModuleNotActive`。
    pub async fn deactivate(&self, module_id: &str) -> Result<()> {
        let descriptor = self
            .registry
            .get_module(module_id)
            .await
            .ok_or_else(|| CoreError::ModuleNotFound(module_id.to_string()))?;

        let context = {
            let instances = self.instances.read().await;
            let instance = instances
                .get(module_id)
                .ok_or_else(|| CoreError::ModuleNotActive(module_id.to_string()))?;
            if !instance.info.state.can_deactivate() {
                return Err(CoreError::ModuleNotActive(module_id.to_string()));
            }
            instance.context.clone()
        };

        info!(module_id = %module_id, "开始停用模块");

        if let Some(unload) = &descriptor.unload {
            // 卸载钩子失败不阻止清理动作执行
            let hook_error = match AssertUnwindSafe((unload)()).catch_unwind().await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(panic) => Some(panic_message(panic)),
            };
            if let Some(reason) = hook_error {
                let err = CoreError::DeactivationFailed {
                    module_id: module_id.to_string(),
                    reason,
                };
                warn!(
                    module_id = %module_id,
                    error_code = err.error_code(),
                    error_msg = %err,
                    "卸载钩子失败，继续执行清理动作"
                );
            }
        }

        let cleanups = context.run_all().await;

        {
            let mut instances = self.instances.write().await;
            if let Some(instance) = instances.get_mut(module_id) {
                instance.info.state = ModuleState::Deactivated;
                instance.info.completed_at = Some(Utc::now());
            }
        }

        info!(module_id = %module_id, cleanups = cleanups, "模块停用完成");
        Ok(())
    }

    /// 按注册顺序停用所有运行中的模块
    ///
    /// 单个模块停用失败只记录警告。返回成功停用的模块数量。
    pub async fn deactivate_all(&self) -> usize {
        let mut deactivated = 0;

        for descriptor in self.registry.list_modules().await {
            let running = {
                let instances = self.instances.read().await;
                instances
                    .get(&descriptor.id)
                    .map(|i| i.info.state.can_deactivate())
                    .unwrap_or(false)
            };
            if !running {
                continue;
            }

            match self.deactivate(&descriptor.id).await {
                Ok(()) => deactivated += 1,
                Err(e) => {
                    warn!(
                        module_id = %descriptor.id,
                        error_code = e.error_code(),
                        error_msg = %e,
                        "模块停用失败，继续停用其余模块"
                    );
                }
            }
        }

        info!(count = deactivated, "批量停用完成");
        deactivated
    }

    /// 等待所有未落定的激活任务结束，返回各模块的实例信息
    pub async fn settle(&self) -> Vec<InstanceInfo> {
        let handles: Vec<(String, JoinHandle<()>)> = {
            let mut handles = self.handles.lock().await;
            handles.drain().collect()
        };

        for (module_id, handle) in handles {
            if let Err(e) = handle.await {
                // run_activation 内部已捕获入口崩溃，这里只兜底任务本身的异常
                debug!(module_id = %module_id, error_msg = %e, "激活任务异常结束");
            }
        }

        self.instances().await
    }

    /// 查询模块实例信息
    pub async fn instance(&self, module_id: &str) -> Option<InstanceInfo> {
        let instances = self.instances.read().await;
        instances.get(module_id).map(|i| i.info.clone())
    }

    /// 按注册顺序列出所有模块实例信息
    pub async fn instances(&self) -> Vec<InstanceInfo> {
        let instances = self.instances.read().await;
        let mut infos = Vec::new();
        for descriptor in self.registry.list_modules().await {
            if let Some(instance) = instances.get(&descriptor.id) {
                infos.push(instance.info.clone());
            }
        }
        infos
    }

    /// 关闭执行器
    ///
    /// 停用所有运行中的模块，然后排空 `init` 阶段积累的卸载上下文。
    pub async fn shutdown(&self) -> usize {
        let deactivated = self.deactivate_all().await;

        let contexts: Vec<Arc<UnloaderContext>> = {
            let mut init_contexts = self.init_contexts.write().await;
            init_contexts.drain().map(|(_, ctx)| ctx).collect()
        };
        for context in contexts {
            context.run_all().await;
        }

        deactivated
    }
}

impl std::fmt::Debug for LifecycleRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleRunner").finish_non_exhaustive()
    }
}

/// 单个模块的激活任务体
///
/// 入口的错误和崩溃都在这里落地为实例状态，绝不向外传播。
async fn run_activation(
    descriptor: Arc<ModuleDescriptor>,
    resolved: crate::module::suboption::ResolvedOptions,
    context: Arc<UnloaderContext>,
    activation_id: String,
    instances: Arc<RwLock<HashMap<String, ModuleInstance>>>,
    init_done: Arc<RwLock<HashSet<String>>>,
    init_contexts: Arc<RwLock<HashMap<String, Arc<UnloaderContext>>>>,
) {
    let module_id = descriptor.id.clone();

    if let Some(init) = &descriptor.init {
        let already_done = {
            let done = init_done.read().await;
            done.contains(&module_id)
        };

        if !already_done {
            let init_context = {
                let mut contexts = init_contexts.write().await;
                contexts
                    .entry(module_id.clone())
                    .or_insert_with(|| {
                        Arc::new(UnloaderContext::new(&module_id, &activation_id))
                    })
                    .clone()
            };

            let result = AssertUnwindSafe((init)(resolved.clone(), init_context))
                .catch_unwind()
                .await;
            match result {
                Ok(Ok(())) => {
                    let mut done = init_done.write().await;
                    done.insert(module_id.clone());
                    debug!(module_id = %module_id, "模块初始化完成");
                }
                Ok(Err(e)) => {
                    record_failure(&instances, &descriptor, &activation_id, e.to_string()).await;
                    return;
                }
                Err(panic) => {
                    record_failure(&instances, &descriptor, &activation_id, panic_message(panic))
                        .await;
                    return;
                }
            }
        }
    }

    let result = AssertUnwindSafe((descriptor.main)(resolved, context))
        .catch_unwind()
        .await;
    match result {
        Ok(Ok(())) => {
            let mut instances = instances.write().await;
            if let Some(instance) = instances.get_mut(&descriptor.id) {
                // 激活期间被停用的实例不再改写状态
                if instance.info.state == ModuleState::Activating
                    && instance.info.activation_id == activation_id
                {
                    instance.info.state = ModuleState::Active;
                    instance.info.completed_at = Some(Utc::now());
                    info!(
                        module_id = %descriptor.id,
                        module_name = %descriptor.name,
                        activation_id = %activation_id,
                        "模块激活成功"
                    );
                }
            }
        }
        Ok(Err(e)) => {
            record_failure(&instances, &descriptor, &activation_id, e.to_string()).await;
        }
        Err(panic) => {
            record_failure(&instances, &descriptor, &activation_id, panic_message(panic)).await;
        }
    }
}

/// 记录激活失败
async fn record_failure(
    instances: &Arc<RwLock<HashMap<String, ModuleInstance>>>,
    descriptor: &ModuleDescriptor,
    activation_id: &str,
    reason: String,
) {
    let err = CoreError::ActivationFailed {
        module_id: descriptor.id.clone(),
        reason,
    };
    warn!(
        module_id = %descriptor.id,
        module_name = %descriptor.name,
        activation_id = %activation_id,
        error_code = err.error_code(),
        error_msg = %err,
        "模块激活失败"
    );

    let mut instances = instances.write().await;
    if let Some(instance) = instances.get_mut(&descriptor.id) {
        if instance.info.state == ModuleState::Activating
            && instance.info.activation_id == activation_id
        {
            instance.info.state = ModuleState::Failed;
            instance.info.completed_at = Some(Utc::now());
            instance.info.last_error = Some(err.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::suboption::{Suboption, SuboptionValidator};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    async fn runner_with(descriptors: Vec<ModuleDescriptor>) -> LifecycleRunner {
        let registry = ModuleRegistry::new();
        for descriptor in descriptors {
            registry.register(descriptor).await.unwrap();
        }
        LifecycleRunner::new(registry)
    }

    fn noop_descriptor(id: &str) -> ModuleDescriptor {
        ModuleDescriptor::builder(id, format!("模块 {}", id))
            .main(|_options, _ctx| async { Ok(()) })
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_activate_success() {
        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let descriptor = ModuleDescriptor::builder("theme", "主题")
            .main(move |_options, _ctx| {
                let called = called_clone.clone();
                async move {
                    called.store(true, Ordering::SeqCst);
                    Ok(())
                }
            })
            .build()
            .unwrap();

        let runner = runner_with(vec![descriptor]).await;
        runner.activate("theme", &HashMap::new()).await.unwrap();
        runner.settle().await;

        assert!(called.load(Ordering::SeqCst));
        let info = runner.instance("theme").await.unwrap();
        assert_eq!(info.state, ModuleState::Active);
        assert!(info.completed_at.is_some());
        assert!(info.last_error.is_none());
    }

    #[tokio::test]
    async fn test_activate_unknown_module() {
        let runner = runner_with(vec![]).await;
        let result = runner.activate("nonexistent", &HashMap::new()).await;
        assert!(matches!(result, Err(CoreError::ModuleNotFound(_))));
    }

    #[tokio::test]
    async fn test_main_receives_resolved_options() {
        let seen = Arc::new(StdMutex::new(None));
        let seen_clone = seen.clone();

        let descriptor = ModuleDescriptor::builder("theme", "主题")
            .suboption(Suboption::boolean("dark", "暗色", true))
            .suboption(Suboption::color("accent-color", "主题色", "#1a2b3c"))
            .main(move |options, _ctx| {
                let seen = seen_clone.clone();
                async move {
                    *seen.lock().unwrap() = Some(options);
                    Ok(())
                }
            })
            .build()
            .unwrap();

        let runner = runner_with(vec![descriptor]).await;
        let mut values = HashMap::new();
        values.insert("dark".to_string(), json!(false));

        runner.activate("theme", &values).await.unwrap();
        runner.settle().await;

        let options = seen.lock().unwrap().clone().unwrap();
        assert_eq!(options["dark"], json!(false));
        // 缺失值由默认值补齐
        assert_eq!(options["accent-color"], json!("#1a2b3c"));
    }

    #[tokio::test]
    async fn test_failing_main_does_not_affect_sibling() {
        let sibling_ran = Arc::new(AtomicBool::new(false));
        let sibling_clone = sibling_ran.clone();

        let failing = ModuleDescriptor::builder("broken", "坏模块")
            .main(|_options, _ctx| async { Err(CoreError::Internal("入口失败".to_string())) })
            .build()
            .unwrap();
        let sibling = ModuleDescriptor::builder("healthy", "好模块")
            .main(move |_options, _ctx| {
                let sibling = sibling_clone.clone();
                async move {
                    sibling.store(true, Ordering::SeqCst);
                    Ok(())
                }
            })
            .build()
            .unwrap();

        let runner = runner_with(vec![failing, sibling]).await;
        let activated = runner.activate_all(&StoredValues::new()).await;
        runner.settle().await;

        assert_eq!(activated, 2);
        assert!(sibling_ran.load(Ordering::SeqCst));

        let broken = runner.instance("broken").await.unwrap();
        assert_eq!(broken.state, ModuleState::Failed);
        // 失败信息携带模块 ID 和入口错误
        let last_error = broken.last_error.as_deref().unwrap();
        assert!(last_error.contains("broken"));
        assert!(last_error.contains("入口失败"));

        let healthy = runner.instance("healthy").await.unwrap();
        assert_eq!(healthy.state, ModuleState::Active);
    }

    #[tokio::test]
    async fn test_panicking_main_is_isolated() {
        let descriptor = ModuleDescriptor::builder("panicky", "崩溃模块")
            .main(|_options, _ctx| async { panic!("模块内部崩溃") })
            .build()
            .unwrap();

        let runner = runner_with(vec![descriptor]).await;
        runner.activate("panicky", &HashMap::new()).await.unwrap();
        runner.settle().await;

        let info = runner.instance("panicky").await.unwrap();
        assert_eq!(info.state, ModuleState::Failed);
        assert!(info.last_error.as_deref().unwrap().contains("模块内部崩溃"));
    }

    #[tokio::test]
    async fn test_repeated_activate_returns_existing_context() {
        let runner = runner_with(vec![noop_descriptor("theme")]).await;

        let first = runner.activate("theme", &HashMap::new()).await.unwrap();
        runner.settle().await;
        let second = runner.activate("theme", &HashMap::new()).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    /// 在异步等待点上挂起的测试校验器
    struct SlowValidator;

    #[async_trait]
    impl SuboptionValidator for SlowValidator {
        async fn validate(&self, _value: &str) -> bool {
            tokio::time::sleep(Duration::from_millis(50)).await;
            true
        }
    }

    #[tokio::test]
    async fn test_concurrent_activate_creates_single_context() {
        // 选项解析在异步校验器上挂起时，两个并发激活也只能产生一个实例
        let descriptor = ModuleDescriptor::builder("theme", "主题")
            .suboption(
                Suboption::text("font", "字体", "默认字体")
                    .with_validator(Arc::new(SlowValidator)),
            )
            .main(|_options, _ctx| async { Ok(()) })
            .build()
            .unwrap();
        let runner = runner_with(vec![descriptor]).await;

        let mut values = HashMap::new();
        values.insert("font".to_string(), json!("自定义字体"));

        let (first, second) = tokio::join!(
            runner.activate("theme", &values),
            runner.activate("theme", &values)
        );
        let first = first.unwrap();
        let second = second.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        runner.settle().await;
        assert_eq!(
            runner.instance("theme").await.unwrap().state,
            ModuleState::Active
        );
    }

    #[tokio::test]
    async fn test_init_runs_once_per_process() {
        let init_count = Arc::new(AtomicUsize::new(0));
        let init_clone = init_count.clone();

        let descriptor = ModuleDescriptor::builder("theme", "主题")
            .init(move |_options, _ctx| {
                let count = init_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .main(|_options, _ctx| async { Ok(()) })
            .build()
            .unwrap();

        let runner = runner_with(vec![descriptor]).await;

        runner.activate("theme", &HashMap::new()).await.unwrap();
        runner.settle().await;
        runner.deactivate("theme").await.unwrap();

        runner.activate("theme", &HashMap::new()).await.unwrap();
        runner.settle().await;

        // 重新激活不再执行 init
        assert_eq!(init_count.load(Ordering::SeqCst), 1);
        let info = runner.instance("theme").await.unwrap();
        assert_eq!(info.state, ModuleState::Active);
    }

    #[tokio::test]
    async fn test_failed_init_skips_main() {
        let main_ran = Arc::new(AtomicBool::new(false));
        let main_clone = main_ran.clone();

        let descriptor = ModuleDescriptor::builder("theme", "主题")
            .init(|_options, _ctx| async { Err(CoreError::InitFailed("初始化失败".to_string())) })
            .main(move |_options, _ctx| {
                let main_ran = main_clone.clone();
                async move {
                    main_ran.store(true, Ordering::SeqCst);
                    Ok(())
                }
            })
            .build()
            .unwrap();

        let runner = runner_with(vec![descriptor]).await;
        runner.activate("theme", &HashMap::new()).await.unwrap();
        runner.settle().await;

        assert!(!main_ran.load(Ordering::SeqCst));
        let info = runner.instance("theme").await.unwrap();
        assert_eq!(info.state, ModuleState::Failed);
        // init 未成功，下次激活仍会重试
        runner.activate("theme", &HashMap::new()).await.unwrap();
        runner.settle().await;
    }

    #[tokio::test]
    async fn test_deactivate_runs_unload_then_cleanups() {
        let trace = Arc::new(StdMutex::new(Vec::new()));
        let unload_trace = trace.clone();
        let main_trace = trace.clone();

        let descriptor = ModuleDescriptor::builder("theme", "主题")
            .main(move |_options, ctx| {
                let trace = main_trace.clone();
                async move {
                    ctx.add_function(move || {
                        trace.lock().unwrap().push("cleanup");
                    })
                    .await;
                    Ok(())
                }
            })
            .unload(move || {
                let trace = unload_trace.clone();
                async move {
                    trace.lock().unwrap().push("unload");
                    Ok(())
                }
            })
            .build()
            .unwrap();

        let runner = runner_with(vec![descriptor]).await;
        runner.activate("theme", &HashMap::new()).await.unwrap();
        runner.settle().await;
        runner.deactivate("theme").await.unwrap();

        // 卸载钩子先于清理动作执行
        assert_eq!(*trace.lock().unwrap(), vec!["unload", "cleanup"]);
        let info = runner.instance("theme").await.unwrap();
        assert_eq!(info.state, ModuleState::Deactivated);
    }

    #[tokio::test]
    async fn test_failing_unload_hook_still_drains_context() {
        let cleaned = Arc::new(AtomicBool::new(false));
        let cleaned_clone = cleaned.clone();

        let descriptor = ModuleDescriptor::builder("theme", "主题")
            .main(move |_options, ctx| {
                let cleaned = cleaned_clone.clone();
                async move {
                    ctx.add_function(move || {
                        cleaned.store(true, Ordering::SeqCst);
                    })
                    .await;
                    Ok(())
                }
            })
            .unload(|| async { Err(CoreError::Internal("卸载钩子失败".to_string())) })
            .build()
            .unwrap();

        let runner = runner_with(vec![descriptor]).await;
        runner.activate("theme", &HashMap::new()).await.unwrap();
        runner.settle().await;
        runner.deactivate("theme").await.unwrap();

        assert!(cleaned.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_deactivate_not_active() {
        let runner = runner_with(vec![noop_descriptor("theme")]).await;

        let result = runner.deactivate("theme").await;
        assert!(matches!(result, Err(CoreError::ModuleNotActive(_))));

        let result = runner.deactivate("nonexistent").await;
        assert!(matches!(result, Err(CoreError::ModuleNotFound(_))));
    }

    #[tokio::test]
    async fn test_activate_all_skips_disabled() {
        let enabled = noop_descriptor("theme");
        let disabled = ModuleDescriptor::builder("quick-links", "快捷链接")
            .default_enabled(false)
            .main(|_options, _ctx| async { Ok(()) })
            .build()
            .unwrap();

        let runner = runner_with(vec![enabled, disabled]).await;
        let activated = runner.activate_all(&StoredValues::new()).await;
        runner.settle().await;

        assert_eq!(activated, 1);
        assert!(runner.instance("theme").await.is_some());
        assert!(runner.instance("quick-links").await.is_none());
    }

    #[tokio::test]
    async fn test_deactivate_all() {
        let runner =
            runner_with(vec![noop_descriptor("theme"), noop_descriptor("quick-links")]).await;
        runner.activate_all(&StoredValues::new()).await;
        runner.settle().await;

        let deactivated = runner.deactivate_all().await;
        assert_eq!(deactivated, 2);

        for info in runner.instances().await {
            assert_eq!(info.state, ModuleState::Deactivated);
        }
    }

    #[tokio::test]
    async fn test_settle_reports_in_registration_order() {
        let runner =
            runner_with(vec![noop_descriptor("theme"), noop_descriptor("quick-links")]).await;
        runner.activate_all(&StoredValues::new()).await;

        let infos = runner.settle().await;
        let ids: Vec<&str> = infos.iter().map(|i| i.module_id.as_str()).collect();
        assert_eq!(ids, vec!["theme", "quick-links"]);
    }

    #[tokio::test]
    async fn test_shutdown_drains_init_contexts() {
        let init_cleaned = Arc::new(AtomicBool::new(false));
        let init_clone = init_cleaned.clone();

        let descriptor = ModuleDescriptor::builder("theme", "主题")
            .init(move |_options, ctx| {
                let cleaned = init_clone.clone();
                async move {
                    ctx.add_function(move || {
                        cleaned.store(true, Ordering::SeqCst);
                    })
                    .await;
                    Ok(())
                }
            })
            .main(|_options, _ctx| async { Ok(()) })
            .build()
            .unwrap();

        let runner = runner_with(vec![descriptor]).await;
        runner.activate("theme", &HashMap::new()).await.unwrap();
        runner.settle().await;

        // 普通停用不排空 init 上下文
        runner.deactivate("theme").await.unwrap();
        assert!(!init_cleaned.load(Ordering::SeqCst));

        runner.shutdown().await;
        assert!(init_cleaned.load(Ordering::SeqCst));
    }
}
