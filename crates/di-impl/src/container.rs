//! 组件容器
//!
//! 容器是一个命名作用域，拥有一个管理器，可以嵌套在父容器之下。

use crate::manager::Manager;
use di_abstractions::{ComponentDescriptor, ComponentScanner};
use di_common::{ComponentResult, ConfigResult, ContainerConfig, DependencyResult};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// 组件容器
#[derive(Debug, Clone)]
pub struct Container {
    id: Uuid,
    name: String,
    path: String,
    created_at: chrono::DateTime<chrono::Utc>,
    manager: Arc<Manager>,
}

impl Container {
    /// 使用默认配置创建根容器
    pub fn root(name: impl Into<String>) -> Self {
        Self::with_config(name, ContainerConfig::default())
    }

    /// 使用指定配置创建根容器
    pub fn with_config(name: impl Into<String>, config: ContainerConfig) -> Self {
        let name = name.into();
        let container = Self {
            id: Uuid::new_v4(),
            path: name.clone(),
            created_at: chrono::Utc::now(),
            manager: Arc::new(Manager::new(name.clone(), config)),
            name,
        };
        info!("创建根容器: {} ({})", container.path, container.id);
        container
    }

    /// 校验配置后创建根容器
    pub fn try_with_config(name: impl Into<String>, config: ContainerConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::with_config(name, config))
    }

    /// 创建子容器
    ///
    /// 子容器本地找不到的规格委托给当前容器解析；子容器的注册会遮蔽父容器的同一规格。
    pub fn create_child_container(&self, name: impl Into<String>) -> Self {
        let name = name.into();
        let path = format!("{}.{}", self.path, name);
        let child = Self {
            id: Uuid::new_v4(),
            manager: self.manager.create_child(path.clone()),
            path,
            created_at: chrono::Utc::now(),
            name,
        };
        info!("创建子容器: {} ({})", child.path, child.id);
        child
    }

    /// 容器ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 容器名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 从根容器开始的点分路径
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 创建时间
    pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.created_at
    }

    /// 管理器
    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    /// 注册组件
    pub fn register_component(&self, descriptor: ComponentDescriptor) {
        self.manager.register_component(descriptor);
    }

    /// 注册扫描器产出的组件
    pub fn register_scanner(&self, scanner: &dyn ComponentScanner) -> ComponentResult<usize> {
        self.manager.register_scanner(scanner)
    }

    /// 请求组件实例
    pub fn request_component<I>(&self, qualifier: Option<&str>) -> DependencyResult<Arc<I>>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.manager.request_component::<I>(qualifier)
    }

    /// 是否能解析指定规格
    pub fn has_component<I>(&self) -> bool
    where
        I: ?Sized + 'static,
    {
        self.manager.has_component::<I>()
    }

    /// 释放实例，返回实例是否已被销毁
    pub fn release_component<I>(&self, instance: &Arc<I>) -> DependencyResult<bool>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.manager.release_component(instance)
    }

    /// 销毁本容器缓存的全部实例，不影响父容器和子容器
    pub fn shutdown(&self) -> usize {
        self.manager.shutdown()
    }
}
