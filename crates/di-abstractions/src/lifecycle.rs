//! 生命周期管理器抽象接口

use crate::descriptor::ComponentDescriptor;
use crate::instance::InstanceContainer;
use di_common::DependencyResult;

/// 生命周期管理器 trait
///
/// 定义可用的阶段，并按描述符声明的顺序执行生命周期钩子。
/// 容器在调用 [`LifecycleManager::setup_component`] 之前会检查描述符声明的
/// 每个阶段都在 [`LifecycleManager::supported_phases`] 中。
pub trait LifecycleManager: Send + Sync {
    /// 支持的阶段名称
    fn supported_phases(&self) -> Vec<String>;

    /// 是否支持指定阶段
    fn supports(&self, phase: &str) -> bool {
        self.supported_phases().iter().any(|p| p == phase)
    }

    /// 对私有实例依次执行钩子
    ///
    /// 第一个失败的钩子会中止执行并返回 `LifecycleFailed`，已执行的钩子不回滚。
    fn setup_component(
        &self,
        descriptor: &ComponentDescriptor,
        container: &mut InstanceContainer,
    ) -> DependencyResult<()>;
}
