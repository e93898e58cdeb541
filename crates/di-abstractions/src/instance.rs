//! 组件实例容器
//!
//! 每个存活实例对应一个 [`InstanceContainer`]，记录它的限定符、
//! 私有/公开实例、生命周期状态和引用计数。

use crate::descriptor::{AnyComponent, AnyInstance, SharedInstance};
use di_common::{display_qualifier, DependencyError, DependencyResult, LifecycleState};
use std::fmt;

/// 组件实例容器
pub struct InstanceContainer {
    instance_id: Option<String>,
    private_instance: Option<AnyInstance>,
    public_instance: Option<SharedInstance>,
    state: LifecycleState,
    ref_count: usize,
    address: usize,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl InstanceContainer {
    /// 创建未初始化的实例容器
    pub fn new(instance_id: Option<String>) -> Self {
        Self {
            instance_id,
            private_instance: None,
            public_instance: None,
            state: LifecycleState::Uncreated,
            ref_count: 0,
            address: 0,
            created_at: chrono::Utc::now(),
        }
    }

    /// 限定符
    pub fn instance_id(&self) -> Option<&str> {
        self.instance_id.as_deref()
    }

    /// 当前状态
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// 创建时间
    pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.created_at
    }

    /// 前进到下一个状态
    ///
    /// 只允许前进到紧邻的后继状态。
    pub fn advance(&mut self, target: LifecycleState) -> DependencyResult<()> {
        if !self.state.can_advance_to(target) {
            return Err(DependencyError::misconfigured(format!(
                "实例 [{}] 不能从 {} 前进到 {}",
                display_qualifier(&self.instance_id),
                self.state,
                target
            )));
        }
        self.state = target;
        Ok(())
    }

    /// 保存构造出的私有实例并进入 `Instantiated`
    pub fn set_private(&mut self, instance: AnyInstance) -> DependencyResult<()> {
        self.advance(LifecycleState::Instantiated)?;
        self.private_instance = Some(instance);
        Ok(())
    }

    /// 私有实例的可变借用，发布后为 `None`
    pub fn private_mut(&mut self) -> Option<&mut AnyComponent> {
        self.private_instance.as_deref_mut()
    }

    /// 取出私有实例，准备发布
    pub fn take_private(&mut self) -> Option<AnyInstance> {
        self.private_instance.take()
    }

    /// 发布公开实例，之后不可再修改
    pub fn publish(&mut self, instance: SharedInstance, address: usize) -> DependencyResult<()> {
        if self.public_instance.is_some() {
            return Err(DependencyError::misconfigured(format!(
                "实例 [{}] 已发布",
                display_qualifier(&self.instance_id)
            )));
        }
        self.advance(LifecycleState::Published)?;
        self.public_instance = Some(instance);
        self.address = address;
        Ok(())
    }

    /// 公开实例
    pub fn public_instance(&self) -> Option<&SharedInstance> {
        self.public_instance.as_ref()
    }

    /// 是否已发布
    pub fn is_published(&self) -> bool {
        self.public_instance.is_some()
    }

    /// 公开实例地址，未发布时为 0
    pub fn address(&self) -> usize {
        self.address
    }

    /// 未归还的引用数量
    ///
    /// 包括调用方的 request 和其他存活组件创建时取得的依赖引用，
    /// 后者在持有方销毁时归还。
    pub fn ref_count(&self) -> usize {
        self.ref_count
    }

    /// 记录一次 request
    pub fn retain(&mut self) -> usize {
        self.ref_count += 1;
        self.ref_count
    }

    /// 记录一次 release，返回剩余引用数
    pub fn release(&mut self) -> usize {
        self.ref_count = self.ref_count.saturating_sub(1);
        self.ref_count
    }
}

impl fmt::Debug for InstanceContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceContainer")
            .field("instance_id", &self.instance_id)
            .field("state", &self.state)
            .field("ref_count", &self.ref_count)
            .field("published", &self.is_published())
            .field("created_at", &self.created_at)
            .finish()
    }
}
