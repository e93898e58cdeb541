//! 组件提供者
//!
//! 每个描述符对应一个提供者，负责实例化策略，并驱动单个实例依次经过
//! 构造、字段注入、setter 注入、生命周期和发布。

use crate::manager::Manager;
use crate::resolution::ResolutionGuard;
use di_abstractions::{
    ComponentDescriptor, ConstructorArgs, InjectionKind, InstanceContainer, SharedInstance,
};
use di_common::{BoxError, DependencyError, DependencyResult, LifecycleState};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 单例槽位：每个限定符一把锁，锁内是已发布的实例
type Slot = Arc<Mutex<Option<LiveInstance>>>;

/// 创建实例时取得的一次依赖引用
///
/// 持有方销毁（或创建失败）时归还给依赖的提供者。
#[derive(Debug)]
pub(crate) struct HeldDependency {
    provider: Weak<ComponentProvider>,
    address: usize,
}

impl HeldDependency {
    pub(crate) fn new(provider: &Arc<ComponentProvider>, instance: &SharedInstance) -> Option<Self> {
        provider
            .descriptor()
            .identity(instance)
            .map(|address| Self {
                provider: Arc::downgrade(provider),
                address,
            })
    }

    /// 归还引用；提供者已被替换或实例已销毁时什么也不做
    pub(crate) fn release(self) {
        if let Some(provider) = self.provider.upgrade() {
            provider.release(self.address);
        }
    }
}

/// 归还一组依赖引用，按取得顺序的逆序
pub(crate) fn release_all(held: Vec<HeldDependency>) {
    for dependency in held.into_iter().rev() {
        dependency.release();
    }
}

/// 已发布的实例及其创建时取得的依赖
#[derive(Debug)]
struct LiveInstance {
    container: InstanceContainer,
    dependencies: Vec<HeldDependency>,
}

/// 组件提供者
pub struct ComponentProvider {
    id: Uuid,
    descriptor: Arc<ComponentDescriptor>,
    /// 单例实例缓存，按限定符分槽
    slots: Mutex<HashMap<Option<String>, Slot>>,
    /// 已发布单例的地址到限定符的索引
    published: Mutex<HashMap<usize, Option<String>>>,
    /// 尚未释放的按请求实例
    live: Mutex<Vec<LiveInstance>>,
}

impl ComponentProvider {
    /// 创建提供者
    pub fn new(descriptor: ComponentDescriptor) -> Self {
        Self {
            id: Uuid::new_v4(),
            descriptor: Arc::new(descriptor),
            slots: Mutex::new(HashMap::new()),
            published: Mutex::new(HashMap::new()),
            live: Mutex::new(Vec::new()),
        }
    }

    /// 提供者ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 描述符
    pub fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }

    /// 请求实例
    ///
    /// 单例策略下同一限定符只创建一次；按请求策略每次都创建新实例。
    /// 创建失败的实例不会被缓存，下次请求从头开始。
    pub fn request(
        &self,
        instance_id: Option<&str>,
        manager: &Manager,
    ) -> DependencyResult<SharedInstance> {
        let config = manager.config();
        // 先登记解析链：同一线程重入正在创建的键时必须立即失败，不能去等自己持有的锁
        let _guard = ResolutionGuard::enter(
            self.id,
            instance_id,
            self.label(instance_id),
            config.max_resolution_depth,
        )?;

        if self.descriptor.policy().retains_instances() {
            return self.request_singleton(instance_id, manager);
        }

        let mut live = self.create(instance_id, manager)?;
        live.container.retain();
        let instance = Self::public_of(&live.container)?;
        self.live.lock().push(live);
        Ok(instance)
    }

    fn request_singleton(
        &self,
        instance_id: Option<&str>,
        manager: &Manager,
    ) -> DependencyResult<SharedInstance> {
        let key = instance_id.map(str::to_string);
        let timeout = manager.config().creation_wait_timeout();

        loop {
            let slot = Arc::clone(
                self.slots
                    .lock()
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(None))),
            );

            let mut entry = slot.try_lock_for(timeout).ok_or_else(|| {
                warn!(
                    specification = %self.descriptor.specification(),
                    qualifier = instance_id.unwrap_or("default"),
                    "等待组件创建超时"
                );
                DependencyError::CreationTimeout {
                    specification: self.descriptor.specification().to_string(),
                    qualifier: key.clone(),
                    waited_ms: manager.config().creation_wait_timeout_ms,
                }
            })?;

            if let Some(live) = entry.as_mut() {
                let remaining = live.container.retain();
                debug!(
                    specification = %self.descriptor.specification(),
                    qualifier = instance_id.unwrap_or("default"),
                    ref_count = remaining,
                    "命中单例缓存"
                );
                return Self::public_of(&live.container);
            }

            // 前一个创建者失败后会把空槽位移出缓存表，拿到旧槽位的等待者重新取槽位
            if !self.is_current_slot(&key, &slot) {
                continue;
            }

            match self.create(instance_id, manager) {
                Ok(mut live) => {
                    live.container.retain();
                    let instance = Self::public_of(&live.container)?;
                    self.published
                        .lock()
                        .insert(live.container.address(), key.clone());
                    *entry = Some(live);
                    return Ok(instance);
                }
                Err(e) => {
                    let mut slots = self.slots.lock();
                    if slots.get(&key).is_some_and(|current| Arc::ptr_eq(current, &slot)) {
                        slots.remove(&key);
                    }
                    return Err(e);
                }
            }
        }
    }

    fn is_current_slot(&self, key: &Option<String>, slot: &Slot) -> bool {
        self.slots
            .lock()
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    /// 依次执行实例化、字段注入、setter 注入、生命周期和发布
    ///
    /// 失败时归还已经取得的依赖引用。
    fn create(&self, instance_id: Option<&str>, manager: &Manager) -> DependencyResult<LiveInstance> {
        let mut container = InstanceContainer::new(instance_id.map(str::to_string));
        let mut held = Vec::new();

        if let Err(e) = self.build(&mut container, &mut held, manager) {
            release_all(held);
            return Err(e);
        }

        info!(
            category = self.descriptor.category(),
            component = %self.descriptor.display_name(),
            qualifier = container.instance_id().unwrap_or("default"),
            dependencies = held.len(),
            "组件实例已发布"
        );
        Ok(LiveInstance {
            container,
            dependencies: held,
        })
    }

    fn build(
        &self,
        container: &mut InstanceContainer,
        held: &mut Vec<HeldDependency>,
        manager: &Manager,
    ) -> DependencyResult<()> {
        self.instantiate(container, held, manager)?;
        self.inject(container, InjectionKind::Field, held, manager)?;
        container.advance(LifecycleState::FieldInjected)?;
        self.inject(container, InjectionKind::Setter, held, manager)?;
        container.advance(LifecycleState::SetterInjected)?;
        self.run_lifecycle(container, manager)?;
        container.advance(LifecycleState::LifecycleComplete)?;
        self.publish(container, manager)
    }

    fn instantiate(
        &self,
        container: &mut InstanceContainer,
        held: &mut Vec<HeldDependency>,
        manager: &Manager,
    ) -> DependencyResult<()> {
        let mut specifications = Vec::new();
        let mut values = Vec::new();
        for dependency in self.descriptor.dependencies_of(InjectionKind::Constructor) {
            let (value, reference) = manager.resolve_for(
                &self.descriptor,
                dependency.specification,
                dependency.instance_id.as_deref(),
            )?;
            held.extend(reference);
            specifications.push(dependency.specification);
            values.push(value);
        }

        let args = ConstructorArgs::new(specifications, values);
        let private = self.descriptor.construct(&args).map_err(|source| {
            DependencyError::InstantiationFailed {
                specification: self.descriptor.specification().to_string(),
                implementation: self.descriptor.implementation().to_string(),
                qualifier: container.instance_id().map(str::to_string),
                source,
            }
        })?;
        container.set_private(private)?;

        debug!(
            component = %self.descriptor.display_name(),
            arguments = args.len(),
            depth = crate::resolution::current_depth(),
            "组件已实例化"
        );
        Ok(())
    }

    fn inject(
        &self,
        container: &mut InstanceContainer,
        kind: InjectionKind,
        held: &mut Vec<HeldDependency>,
        manager: &Manager,
    ) -> DependencyResult<()> {
        for dependency in self.descriptor.dependencies_of(kind) {
            let injection_failed = |source: BoxError| DependencyError::InjectionFailed {
                dependency: dependency.target.name(),
                specification: dependency.specification.to_string(),
                target: self.descriptor.implementation().to_string(),
                source,
            };

            let (value, reference) = manager
                .resolve_for(
                    &self.descriptor,
                    dependency.specification,
                    dependency.instance_id.as_deref(),
                )
                .map_err(|e| injection_failed(e.into()))?;
            held.extend(reference);
            let target = container.private_mut().ok_or_else(|| {
                DependencyError::misconfigured(format!(
                    "{} 的私有实例在注入前已被移走",
                    self.descriptor.display_name()
                ))
            })?;
            dependency
                .target
                .apply(target, value)
                .map_err(injection_failed)?;

            debug!(
                component = %self.descriptor.display_name(),
                target = %dependency.target.name(),
                kind = ?kind,
                "依赖已注入"
            );
        }
        Ok(())
    }

    fn run_lifecycle(
        &self,
        container: &mut InstanceContainer,
        manager: &Manager,
    ) -> DependencyResult<()> {
        let hooks = self.descriptor.lifecycle_hooks();
        if hooks.is_empty() {
            return Ok(());
        }

        let (lifecycle, reference) = manager.lifecycle_manager_for(&self.descriptor)?;
        let result = match hooks.iter().find(|hook| !lifecycle.supports(hook.phase())) {
            Some(hook) => Err(DependencyError::misconfigured(format!(
                "组件 {} 声明的生命周期阶段 '{}' 不受支持，支持的阶段: [{}]",
                self.descriptor.display_name(),
                hook.phase(),
                lifecycle.supported_phases().join(", ")
            ))),
            None => lifecycle.setup_component(&self.descriptor, container),
        };
        release_all(reference.into_iter().collect());
        result
    }

    fn publish(
        &self,
        container: &mut InstanceContainer,
        manager: &Manager,
    ) -> DependencyResult<()> {
        let qualifier = container.instance_id().map(str::to_string);
        let instantiation_failed = |source: BoxError| DependencyError::InstantiationFailed {
            specification: self.descriptor.specification().to_string(),
            implementation: self.descriptor.implementation().to_string(),
            qualifier: qualifier.clone(),
            source,
        };

        let private = container.take_private().ok_or_else(|| {
            DependencyError::misconfigured(format!(
                "{} 没有可发布的私有实例",
                self.descriptor.display_name()
            ))
        })?;
        let mut instance = self
            .descriptor
            .publish(private)
            .map_err(&instantiation_failed)?;

        if let Some((proxy, reference)) = manager.proxy_builder_for(&self.descriptor)? {
            let proxied = proxy.build_proxy(&self.descriptor, instance);
            release_all(reference.into_iter().collect());
            instance = proxied.map_err(&instantiation_failed)?;
            debug!(component = %self.descriptor.display_name(), "已应用代理");
        }

        let address = self.descriptor.identity(&instance).ok_or_else(|| {
            DependencyError::misconfigured(format!(
                "代理返回的实例不满足规格 {}",
                self.descriptor.specification()
            ))
        })?;
        container.publish(instance, address)
    }

    /// 释放之前请求到的实例
    ///
    /// 返回 `None` 表示实例不属于该提供者；`Some(true)` 表示实例已被销毁。
    pub fn release(&self, address: usize) -> Option<bool> {
        if self.descriptor.policy().retains_instances() {
            // 单例只减少引用计数，销毁留到关闭时
            let key = self.published.lock().get(&address).cloned()?;
            let slot = self.slots.lock().get(&key).cloned()?;
            let mut entry = slot.lock();
            let live = entry
                .as_mut()
                .filter(|live| live.container.address() == address)?;
            let remaining = live.container.release();
            debug!(
                specification = %self.descriptor.specification(),
                ref_count = remaining,
                "单例引用已释放"
            );
            return Some(false);
        }

        let mut live = self.live.lock();
        let index = live
            .iter()
            .position(|instance| instance.container.address() == address)?;
        if live[index].container.release() > 0 {
            return Some(false);
        }
        let instance = live.swap_remove(index);
        drop(live);
        self.dispose(instance);
        Some(true)
    }

    /// 销毁钩子
    ///
    /// 调用描述符声明的销毁函数，再归还实例创建时取得的依赖。
    /// 销毁函数失败只记录日志，不向释放方传播。
    fn dispose(&self, instance: LiveInstance) {
        let LiveInstance {
            container,
            dependencies,
        } = instance;
        let qualifier = container.instance_id().unwrap_or("default");

        match container.public_instance().map(|public| self.descriptor.dispose(public)) {
            Some(Err(e)) => warn!(
                component = %self.descriptor.display_name(),
                qualifier,
                error = %e,
                "组件销毁失败"
            ),
            _ => info!(
                category = self.descriptor.category(),
                component = %self.descriptor.display_name(),
                qualifier,
                "组件实例已销毁"
            ),
        }
        release_all(dependencies);
    }

    /// 销毁全部缓存实例，返回销毁数量
    pub fn shutdown(&self) -> usize {
        let slots: Vec<Slot> = self.slots.lock().drain().map(|(_, slot)| slot).collect();
        self.published.lock().clear();
        let live: Vec<LiveInstance> = self.live.lock().drain(..).collect();

        let mut disposed = 0;
        for slot in slots {
            let taken = slot.lock().take();
            if let Some(instance) = taken {
                self.dispose(instance);
                disposed += 1;
            }
        }
        for instance in live {
            self.dispose(instance);
            disposed += 1;
        }
        disposed
    }

    /// 存活实例数量
    pub fn live_count(&self) -> usize {
        // 正在创建的槽位不计入
        let slots: Vec<Slot> = self.slots.lock().values().cloned().collect();
        let singletons = slots
            .iter()
            .filter(|slot| slot.try_lock().is_some_and(|entry| entry.is_some()))
            .count();
        singletons + self.live.lock().len()
    }

    fn label(&self, instance_id: Option<&str>) -> String {
        match instance_id {
            Some(qualifier) => format!("{}[{qualifier}]", self.descriptor.display_name()),
            None => self.descriptor.display_name(),
        }
    }

    fn public_of(container: &InstanceContainer) -> DependencyResult<SharedInstance> {
        container
            .public_instance()
            .cloned()
            .ok_or_else(|| DependencyError::misconfigured("实例尚未发布"))
    }
}

impl std::fmt::Debug for ComponentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentProvider")
            .field("id", &self.id)
            .field("descriptor", &self.descriptor)
            .field("live", &self.live_count())
            .finish()
    }
}
