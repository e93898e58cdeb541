//! 依赖解析管理器
//!
//! 每个容器拥有一个管理器。管理器按规格保存提供者，本作用域找不到时
//! 沿父链向外查找，第一个匹配的提供者负责创建实例。

use crate::lifecycle::StandardLifecycleManager;
use crate::provider::{ComponentProvider, HeldDependency};
use crate::resolution;
use dashmap::DashMap;
use di_abstractions::{
    downcast_instance, instance_address, ComponentDescriptor, ComponentScanner, LifecycleManager,
    ProxyBuilder, SharedInstance,
};
use di_common::{
    ComponentError, ComponentResult, ContainerConfig, DependencyError, DependencyResult, TypeInfo,
};
use std::any::TypeId;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// 依赖解析管理器
pub struct Manager {
    scope: String,
    config: Arc<ContainerConfig>,
    providers: DashMap<TypeId, Arc<ComponentProvider>>,
    /// 父作用域由其容器持有，子管理器只保留弱引用
    parent: Option<Weak<Manager>>,
    lifecycle: Arc<StandardLifecycleManager>,
}

impl Manager {
    /// 创建根管理器
    pub fn new(scope: impl Into<String>, config: ContainerConfig) -> Self {
        let config = Arc::new(config);
        Self {
            scope: scope.into(),
            lifecycle: Arc::new(StandardLifecycleManager::from_config(&config)),
            config,
            providers: DashMap::new(),
            parent: None,
        }
    }

    /// 创建子管理器，未命中的查找委托给当前管理器
    pub fn create_child(self: &Arc<Self>, scope: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            scope: scope.into(),
            config: Arc::clone(&self.config),
            providers: DashMap::new(),
            parent: Some(Arc::downgrade(self)),
            lifecycle: Arc::clone(&self.lifecycle),
        })
    }

    /// 作用域名称
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// 容器配置
    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// 父管理器，父作用域已被销毁时返回 `None`
    pub fn parent(&self) -> Option<Arc<Manager>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// 注册组件
    ///
    /// 同一作用域内重复注册同一规格时，新的描述符替换旧的。
    pub fn register_component(&self, descriptor: ComponentDescriptor) {
        let specification = descriptor.specification();
        let name = descriptor.display_name();
        let category = descriptor.category().to_string();
        let provider = Arc::new(ComponentProvider::new(descriptor));

        if let Some(previous) = self.providers.insert(specification.id, provider) {
            warn!(
                scope = %self.scope,
                specification = %specification,
                previous = %previous.descriptor().display_name(),
                "同一作用域内重复注册，旧的描述符被替换"
            );
        }
        info!(scope = %self.scope, category = %category, component = %name, "注册组件");
    }

    /// 注册扫描器产出的全部描述符，返回注册数量
    pub fn register_scanner(&self, scanner: &dyn ComponentScanner) -> ComponentResult<usize> {
        let descriptors = scanner.scan()?;
        if descriptors.is_empty() {
            return Err(ComponentError::RegistrationError {
                type_name: scanner.name().to_string(),
                message: "扫描器没有产出任何组件".to_string(),
            });
        }

        let count = descriptors.len();
        for descriptor in descriptors {
            self.register_component(descriptor);
        }
        info!("扫描器 {} 注册了 {} 个组件到作用域 {}", scanner.name(), count, self.scope);
        Ok(count)
    }

    /// 请求组件实例
    ///
    /// `qualifier` 为 `None` 时请求默认实例。
    pub fn request_component<I>(&self, qualifier: Option<&str>) -> DependencyResult<Arc<I>>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let instance = self.request(TypeInfo::of::<I>(), qualifier)?;
        downcast_instance::<I>(&instance)
    }

    /// 按类型擦除的规格请求实例
    ///
    /// 调用方通过 [`Manager::release_component`] 归还实例。
    pub fn request(
        &self,
        specification: TypeInfo,
        qualifier: Option<&str>,
    ) -> DependencyResult<SharedInstance> {
        self.request_held(specification, qualifier)
            .map(|(instance, _)| instance)
    }

    /// 请求实例，并返回归还这次引用所需的句柄
    pub(crate) fn request_held(
        &self,
        specification: TypeInfo,
        qualifier: Option<&str>,
    ) -> DependencyResult<(SharedInstance, Option<HeldDependency>)> {
        let (provider, owner) =
            self.find_provider(specification)
                .ok_or_else(|| DependencyError::NotAvailable {
                    specification: specification.to_string(),
                    qualifier: qualifier.map(str::to_string),
                })?;

        if let Some(owner) = &owner {
            debug!(
                scope = %self.scope,
                owner = %owner.scope,
                specification = %specification,
                "委托上级作用域解析"
            );
        }
        // 依赖从注册所在的作用域解析，避免父作用域的单例捕获子作用域的组件
        let instance = provider.request(qualifier, owner.as_deref().unwrap_or(self))?;
        let held = HeldDependency::new(&provider, &instance);
        Ok((instance, held))
    }

    /// 是否能解析指定规格（不会触发创建）
    pub fn has_component<I>(&self) -> bool
    where
        I: ?Sized + 'static,
    {
        self.has_specification(TypeInfo::of::<I>())
    }

    /// 是否能解析指定规格（不会触发创建）
    pub fn has_specification(&self, specification: TypeInfo) -> bool {
        self.find_provider(specification).is_some()
    }

    /// 释放之前请求到的实例
    ///
    /// 返回实例是否已被销毁。单例只在关闭时销毁；按请求实例在最后一次释放时销毁。
    pub fn release_component<I>(&self, instance: &Arc<I>) -> DependencyResult<bool>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let specification = TypeInfo::of::<I>();
        let address = instance_address(instance);

        let release_in = |manager: &Manager| {
            manager
                .providers
                .get(&specification.id)
                .map(|entry| Arc::clone(entry.value()))
                .and_then(|provider| provider.release(address))
        };
        if let Some(disposed) = release_in(self) {
            return Ok(disposed);
        }
        let mut current = self.parent();
        while let Some(manager) = current {
            if let Some(disposed) = release_in(&manager) {
                return Ok(disposed);
            }
            current = manager.parent();
        }

        warn!(
            scope = %self.scope,
            specification = %specification,
            "释放的实例不属于任何提供者，忽略"
        );
        Ok(false)
    }

    /// 已注册的规格名称（仅本作用域），已排序
    pub fn registered_specifications(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .providers
            .iter()
            .map(|entry| entry.value().descriptor().display_name())
            .collect();
        names.sort();
        names
    }

    /// 本作用域的存活实例数量
    pub fn live_instances(&self) -> usize {
        self.providers_snapshot()
            .iter()
            .map(|provider| provider.live_count())
            .sum()
    }

    /// 销毁本作用域缓存的全部实例，返回销毁数量
    pub fn shutdown(&self) -> usize {
        let disposed: usize = self
            .providers_snapshot()
            .iter()
            .map(|provider| provider.shutdown())
            .sum();
        info!("作用域 {} 已关闭，销毁了 {} 个实例", self.scope, disposed);
        disposed
    }

    /// 为 `requester` 解析一个依赖，失败时包装请求方上下文
    pub(crate) fn resolve_for(
        &self,
        requester: &ComponentDescriptor,
        specification: TypeInfo,
        qualifier: Option<&str>,
    ) -> DependencyResult<(SharedInstance, Option<HeldDependency>)> {
        self.request_held(specification, qualifier)
            .map_err(|source| DependencyError::CreationFailed {
                requester: requester.display_name(),
                specification: specification.to_string(),
                qualifier: qualifier.map(str::to_string),
                source: Box::new(source),
            })
    }

    /// 执行 `descriptor` 生命周期的管理器
    ///
    /// 注册了 `dyn LifecycleManager` 组件时使用它，否则使用按配置构建的标准管理器。
    /// 用完后由调用方归还句柄。
    pub(crate) fn lifecycle_manager_for(
        &self,
        descriptor: &ComponentDescriptor,
    ) -> DependencyResult<(Arc<dyn LifecycleManager>, Option<HeldDependency>)> {
        let specification = TypeInfo::of::<dyn LifecycleManager>();
        if descriptor.specification() == specification || !self.available(specification) {
            let standard: Arc<dyn LifecycleManager> = self.lifecycle.clone();
            return Ok((standard, None));
        }
        let (instance, held) = self.resolve_for(descriptor, specification, None)?;
        match downcast_instance::<dyn LifecycleManager>(&instance) {
            Ok(lifecycle) => Ok((lifecycle, held)),
            Err(e) => {
                held.into_iter().for_each(HeldDependency::release);
                Err(e)
            }
        }
    }

    /// 发布 `descriptor` 实例时使用的代理构建器
    pub(crate) fn proxy_builder_for(
        &self,
        descriptor: &ComponentDescriptor,
    ) -> DependencyResult<Option<(Arc<dyn ProxyBuilder>, Option<HeldDependency>)>> {
        let specification = TypeInfo::of::<dyn ProxyBuilder>();
        if !self.config.enable_proxy_lookup
            || descriptor.specification() == specification
            || !self.available(specification)
        {
            return Ok(None);
        }
        let (instance, held) = self.resolve_for(descriptor, specification, None)?;
        match downcast_instance::<dyn ProxyBuilder>(&instance) {
            Ok(proxy) => Ok(Some((proxy, held))),
            Err(e) => {
                held.into_iter().for_each(HeldDependency::release);
                Err(e)
            }
        }
    }

    /// 协作者已注册且不在当前线程的创建链上
    ///
    /// 协作者自身的依赖发布时不能再去请求协作者。
    fn available(&self, specification: TypeInfo) -> bool {
        self.find_provider(specification)
            .is_some_and(|(provider, _)| !resolution::in_progress(provider.id()))
    }

    /// 沿父链查找提供者，第二项是注册所在的上级作用域（本作用域时为 `None`）
    ///
    /// 已销毁的父作用域按未命中处理。
    pub(crate) fn find_provider(
        &self,
        specification: TypeInfo,
    ) -> Option<(Arc<ComponentProvider>, Option<Arc<Manager>>)> {
        if let Some(entry) = self.providers.get(&specification.id) {
            return Some((Arc::clone(entry.value()), None));
        }
        let mut current = self.parent();
        while let Some(manager) = current {
            let found = manager
                .providers
                .get(&specification.id)
                .map(|entry| Arc::clone(entry.value()));
            if let Some(provider) = found {
                return Some((provider, Some(manager)));
            }
            current = manager.parent();
        }
        None
    }

    fn providers_snapshot(&self) -> Vec<Arc<ComponentProvider>> {
        self.providers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("scope", &self.scope)
            .field("providers", &self.providers.len())
            .field("parent", &self.parent().map(|parent| parent.scope.clone()))
            .finish()
    }
}
