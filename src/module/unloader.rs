//! 卸载上下文
//!
//! 每次模块激活都会获得一个独立的 `UnloaderContext`，模块在运行过程中把
//! 需要回收的资源（实现了 [`Removable`] 的句柄）和任意清理函数登记进来。
//! 模块停用或宿主页面上下文被销毁时，内核调用 [`UnloaderContext::run_all`]
//! 按登记顺序执行全部清理动作。
//!
//! 关键约束：
//!
//! - 每个清理动作最多执行一次，执行顺序严格为登记顺序（不做隐式反转）
//! - `run_all` 幂等，第二次调用不再执行任何动作
//! - 单个清理动作失败（panic）被隔离记录，不影响后续动作执行
//! - 上下文关闭后迟到的登记立即执行，避免泄漏在销毁开始后才获取的资源

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::utils::CoreError;

/// 可回收资源能力接口
///
/// 任何暴露单一幂等 `remove` 操作的资源均可登记进卸载上下文，
/// 例如页面节点句柄、事件监听器句柄、观察器句柄。
pub trait Removable: Send {
    /// 释放资源
    ///
    /// 要求幂等：重复调用不应产生副作用
    fn remove(&self);
}

/// 单个清理动作
enum CleanupAction {
    /// 回收一个资源句柄
    Removable(Box<dyn Removable>),
    /// 执行任意清理函数
    Function(Box<dyn FnOnce() + Send>),
}

/// 卸载上下文状态
///
/// 状态只能单向推进：`Open` → `Draining` → `Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// 接受登记，清理尚未执行
    Open,
    /// `run_all` 执行中
    Draining,
    /// 全部清理已尝试执行，后续登记立即执行
    Closed,
}

struct ContextInner {
    state: ContextState,
    actions: Vec<CleanupAction>,
}

/// 卸载上下文
///
/// 见模块级文档。上下文跨任务共享（`Arc<UnloaderContext>`），
/// 内部用互斥锁保证登记与清理的原子性。
pub struct UnloaderContext {
    /// 所属模块 ID
    module_id: String,
    /// 激活实例 ID（用于日志）
    activation_id: String,
    inner: Mutex<ContextInner>,
}

impl UnloaderContext {
    /// 创建新的卸载上下文
    pub fn new(module_id: impl Into<String>, activation_id: impl Into<String>) -> Self {
        Self {
            module_id: module_id.into(),
            activation_id: activation_id.into(),
            inner: Mutex::new(ContextInner {
                state: ContextState::Open,
                actions: Vec::new(),
            }),
        }
    }

    /// 获取所属模块 ID
    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    /// 获取激活实例 ID
    pub fn activation_id(&self) -> &str {
        &self.activation_id
    }

    /// 获取当前状态
    pub async fn state(&self) -> ContextState {
        self.inner.lock().await.state
    }

    /// 上下文是否已开始或完成销毁
    ///
    /// 模块在每个异步等待点之后都应检查此标志，
    /// 已关闭时放弃后续页面修改（挂起的等待降级为空操作）。
    pub async fn is_closed(&self) -> bool {
        !matches!(self.inner.lock().await.state, ContextState::Open)
    }

    /// 尚未执行的清理动作数量
    pub async fn pending_cleanups(&self) -> usize {
        self.inner.lock().await.actions.len()
    }

    /// 登记一个可回收资源
    ///
    /// 上下文已关闭时立即执行 `remove` 而不是静默丢弃
    pub async fn add_removable<R>(&self, resource: R)
    where
        R: Removable + 'static,
    {
        self.push(CleanupAction::Removable(Box::new(resource))).await;
    }

    /// 登记一个清理函数
    ///
    /// 上下文已关闭时立即执行而不是静默丢弃
    pub async fn add_function<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.push(CleanupAction::Function(Box::new(f))).await;
    }

    async fn push(&self, action: CleanupAction) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            ContextState::Open => inner.actions.push(action),
            // run_all 全程持锁，迟到的登记在排空完成后到达这里
            ContextState::Draining | ContextState::Closed => {
                debug!(
                    module_id = %self.module_id,
                    activation_id = %self.activation_id,
                    "上下文已关闭，迟到的清理动作立即执行"
                );
                self.execute(action);
            }
        }
    }

    /// 按登记顺序执行全部清理动作
    ///
    /// 幂等：第一次调用后上下文进入 `Closed`，再次调用不执行任何动作。
    /// 单个动作的失败被记录并跳过，不影响后续动作。
    ///
    /// # Returns
    ///
    /// 本次实际执行的清理动作数量
    pub async fn run_all(&self) -> usize {
        let mut inner = self.inner.lock().await;
        if inner.state != ContextState::Open {
            debug!(
                module_id = %self.module_id,
                activation_id = %self.activation_id,
                "run_all 重复调用，忽略"
            );
            return 0;
        }

        inner.state = ContextState::Draining;
        let actions = std::mem::take(&mut inner.actions);
        let total = actions.len();

        for action in actions {
            self.execute(action);
        }

        inner.state = ContextState::Closed;
        info!(
            module_id = %self.module_id,
            activation_id = %self.activation_id,
            cleanups = total,
            "卸载上下文清理完成"
        );
        total
    }

    /// 执行单个清理动作，panic 被捕获并记录
    fn execute(&self, action: CleanupAction) {
        let result = match action {
            CleanupAction::Removable(resource) => {
                catch_unwind(AssertUnwindSafe(move || resource.remove()))
            }
            CleanupAction::Function(f) => catch_unwind(AssertUnwindSafe(f)),
        };

        if let Err(payload) = result {
            let err = CoreError::CleanupFailed {
                module_id: self.module_id.clone(),
                reason: panic_message(payload),
            };
            warn!(
                module_id = %self.module_id,
                activation_id = %self.activation_id,
                error_code = err.error_code(),
                error_msg = %err,
                "清理动作执行失败，继续执行剩余动作"
            );
        }
    }
}

impl std::fmt::Debug for UnloaderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnloaderContext")
            .field("module_id", &self.module_id)
            .field("activation_id", &self.activation_id)
            .finish()
    }
}

/// 从 panic 负载中提取可读消息
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "未知 panic".to_string()
    }
}
