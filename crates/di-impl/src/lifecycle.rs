//! 标准生命周期管理器

use di_abstractions::{ComponentDescriptor, InstanceContainer, LifecycleManager};
use di_common::{ContainerConfig, DependencyError, DependencyResult};
use tracing::debug;

/// 标准生命周期管理器
///
/// 支持的阶段来自配置，钩子按描述符中的声明顺序执行。
#[derive(Debug, Clone)]
pub struct StandardLifecycleManager {
    phases: Vec<String>,
}

impl StandardLifecycleManager {
    /// 创建支持指定阶段的管理器
    pub fn new<S: Into<String>>(phases: impl IntoIterator<Item = S>) -> Self {
        Self {
            phases: phases.into_iter().map(Into::into).collect(),
        }
    }

    /// 从容器配置创建
    pub fn from_config(config: &ContainerConfig) -> Self {
        Self::new(config.supported_phases.iter().cloned())
    }
}

impl Default for StandardLifecycleManager {
    fn default() -> Self {
        Self::from_config(&ContainerConfig::default())
    }
}

impl LifecycleManager for StandardLifecycleManager {
    fn supported_phases(&self) -> Vec<String> {
        self.phases.clone()
    }

    fn setup_component(
        &self,
        descriptor: &ComponentDescriptor,
        container: &mut InstanceContainer,
    ) -> DependencyResult<()> {
        let qualifier = container.instance_id().map(str::to_string);
        let target = container.private_mut().ok_or_else(|| {
            DependencyError::misconfigured(format!(
                "{} 的私有实例不可用，无法执行生命周期",
                descriptor.display_name()
            ))
        })?;

        for hook in descriptor.lifecycle_hooks() {
            hook.invoke(target)
                .map_err(|source| DependencyError::LifecycleFailed {
                    phase: hook.phase().to_string(),
                    specification: descriptor.specification().to_string(),
                    qualifier: qualifier.clone(),
                    source,
                })?;
            debug!("生命周期阶段完成: {} [{}]", descriptor.display_name(), hook.phase());
        }
        Ok(())
    }
}
