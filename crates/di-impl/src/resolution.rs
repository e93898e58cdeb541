//! 解析链跟踪
//!
//! 每个线程维护一条正在创建中的 `(提供者, 限定符)` 链。同一线程重入正在
//! 创建的键意味着循环依赖，此时立即失败，而不是在实例锁上自我死锁。

use di_common::{DependencyError, DependencyResult};
use std::cell::RefCell;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct ResolutionFrame {
    provider: Uuid,
    qualifier: Option<String>,
    label: String,
}

thread_local! {
    static RESOLUTION_STACK: RefCell<Vec<ResolutionFrame>> = const { RefCell::new(Vec::new()) };
}

/// 解析守卫
///
/// 创建时把键压入当前线程的解析链，析构时弹出。
#[derive(Debug)]
pub(crate) struct ResolutionGuard {
    depth: usize,
}

impl ResolutionGuard {
    /// 进入一个键的创建过程
    pub(crate) fn enter(
        provider: Uuid,
        qualifier: Option<&str>,
        label: String,
        max_depth: usize,
    ) -> DependencyResult<Self> {
        RESOLUTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();

            if let Some(start) = stack
                .iter()
                .position(|frame| frame.provider == provider && frame.qualifier.as_deref() == qualifier)
            {
                let mut chain: Vec<&str> = stack[start..].iter().map(|f| f.label.as_str()).collect();
                chain.push(&label);
                return Err(DependencyError::CircularDependency {
                    dependency_chain: chain.join(" -> "),
                });
            }

            if stack.len() >= max_depth {
                return Err(DependencyError::misconfigured(format!(
                    "解析深度超过上限 {max_depth}: {}",
                    stack.iter().map(|f| f.label.as_str()).collect::<Vec<_>>().join(" -> ")
                )));
            }

            stack.push(ResolutionFrame {
                provider,
                qualifier: qualifier.map(str::to_string),
                label,
            });
            Ok(Self { depth: stack.len() })
        })
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        RESOLUTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            // 守卫严格按栈顺序释放，这里只截断到进入前的长度
            stack.truncate(self.depth - 1);
        });
    }
}

/// 指定提供者是否正在当前线程上创建实例（任意限定符）
pub(crate) fn in_progress(provider: Uuid) -> bool {
    RESOLUTION_STACK.with(|stack| stack.borrow().iter().any(|frame| frame.provider == provider))
}

/// 当前线程的解析深度
pub(crate) fn current_depth() -> usize {
    RESOLUTION_STACK.with(|stack| stack.borrow().len())
}
