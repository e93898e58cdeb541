//! 生命周期管理器、代理构建器、释放与关闭
use di_abstractions::{
    downcast_instance, ComponentDescriptor, FnScanner, InstanceContainer, LifecycleManager,
    ProxyBuilder, SharedInstance,
};
use di_common::{BoxError, ContainerConfig, DependencyResult, ErrorKind, InstantiationPolicy};
use di_impl::{Container, StandardLifecycleManager};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

trait Greeter: Send + Sync {
    fn greet(&self) -> String;
}

struct English;

impl Greeter for English {
    fn greet(&self) -> String {
        "hello".to_string()
    }
}

struct Cached {
    warmed: bool,
}

#[test]
fn test_unsupported_phase_is_configuration_error() {
    let container = Container::root("app");
    container.register_component(
        ComponentDescriptor::concrete::<Cached>()
            .lifecycle_hook("warmup", |cached: &mut Cached| {
                cached.warmed = true;
                Ok(())
            })
            .construct_with(|_| Ok(Cached { warmed: false }))
            .build()
            .unwrap(),
    );

    let error = container.request_component::<Cached>(None).err().unwrap();
    assert_eq!(error.kind(), ErrorKind::Misconfigured);
}

#[test]
fn test_configured_phases_extend_standard_manager() {
    let config = ContainerConfig::from_toml_str(
        r#"
        supported_phases = ["initialize", "warmup", "start"]
        "#,
    )
    .unwrap();
    let container = Container::try_with_config("app", config).unwrap();
    container.register_component(
        ComponentDescriptor::concrete::<Cached>()
            .lifecycle_hook("warmup", |cached: &mut Cached| {
                cached.warmed = true;
                Ok(())
            })
            .construct_with(|_| Ok(Cached { warmed: false }))
            .build()
            .unwrap(),
    );

    assert!(container.request_component::<Cached>(None).unwrap().warmed);
}

/// 在标准阶段之外追加 `warmup`，并记录处理过的组件
struct AuditingLifecycleManager {
    standard: StandardLifecycleManager,
    audited: Mutex<Vec<String>>,
}

impl LifecycleManager for AuditingLifecycleManager {
    fn supported_phases(&self) -> Vec<String> {
        self.standard.supported_phases()
    }

    fn setup_component(
        &self,
        descriptor: &ComponentDescriptor,
        container: &mut InstanceContainer,
    ) -> DependencyResult<()> {
        self.audited
            .lock()
            .unwrap()
            .push(descriptor.display_name());
        self.standard.setup_component(descriptor, container)
    }
}

#[test]
fn test_registered_lifecycle_manager_is_used() {
    let container = Container::root("app");
    let auditor = Arc::new(AuditingLifecycleManager {
        standard: StandardLifecycleManager::new(["warmup"]),
        audited: Mutex::new(Vec::new()),
    });
    container.register_component(ComponentDescriptor::instance::<dyn LifecycleManager>(
        auditor.clone(),
    ));
    container.register_component(
        ComponentDescriptor::concrete::<Cached>()
            .lifecycle_hook("warmup", |cached: &mut Cached| {
                cached.warmed = true;
                Ok(())
            })
            .construct_with(|_| Ok(Cached { warmed: false }))
            .build()
            .unwrap(),
    );

    assert!(container.request_component::<Cached>(None).unwrap().warmed);
    assert_eq!(*auditor.audited.lock().unwrap(), vec!["Cached"]);
}

struct Loud {
    inner: Arc<dyn Greeter>,
}

impl Greeter for Loud {
    fn greet(&self) -> String {
        self.inner.greet().to_uppercase()
    }
}

/// 把每个 `dyn Greeter` 包装成大写版本，其他组件原样返回
struct LoudProxy {
    wrapped: AtomicUsize,
}

impl ProxyBuilder for LoudProxy {
    fn build_proxy(
        &self,
        descriptor: &ComponentDescriptor,
        instance: SharedInstance,
    ) -> Result<SharedInstance, BoxError> {
        if !descriptor.specification().is::<dyn Greeter>() {
            return Ok(instance);
        }
        self.wrapped.fetch_add(1, Ordering::SeqCst);
        let inner = downcast_instance::<dyn Greeter>(&instance)?;
        let proxy: Arc<dyn Greeter> = Arc::new(Loud { inner });
        Ok(Arc::new(proxy))
    }
}

#[test]
fn test_proxy_builder_wraps_published_instance() {
    let container = Container::root("app");
    let proxy = Arc::new(LoudProxy {
        wrapped: AtomicUsize::new(0),
    });
    container.register_component(ComponentDescriptor::instance::<dyn ProxyBuilder>(
        proxy.clone(),
    ));
    container.register_component(
        ComponentDescriptor::implementing::<dyn Greeter, English>(|greeter| greeter)
            .construct_with(|_| Ok(English))
            .build()
            .unwrap(),
    );

    let greeter = container.request_component::<dyn Greeter>(None).unwrap();
    assert_eq!(greeter.greet(), "HELLO");
    assert!(Arc::ptr_eq(
        &greeter,
        &container.request_component::<dyn Greeter>(None).unwrap()
    ));
    assert_eq!(proxy.wrapped.load(Ordering::SeqCst), 1);
}

#[test]
fn test_proxy_lookup_can_be_disabled() {
    let config = ContainerConfig {
        enable_proxy_lookup: false,
        ..ContainerConfig::default()
    };
    let container = Container::with_config("app", config);
    container.register_component(ComponentDescriptor::instance::<dyn ProxyBuilder>(Arc::new(
        LoudProxy {
            wrapped: AtomicUsize::new(0),
        },
    )));
    container.register_component(
        ComponentDescriptor::implementing::<dyn Greeter, English>(|greeter| greeter)
            .construct_with(|_| Ok(English))
            .build()
            .unwrap(),
    );

    let greeter = container.request_component::<dyn Greeter>(None).unwrap();
    assert_eq!(greeter.greet(), "hello");
}

struct WrongTypeProxy;

impl ProxyBuilder for WrongTypeProxy {
    fn build_proxy(
        &self,
        _descriptor: &ComponentDescriptor,
        _instance: SharedInstance,
    ) -> Result<SharedInstance, BoxError> {
        Ok(Arc::new(42_u32))
    }
}

#[test]
fn test_proxy_must_preserve_specification() {
    let container = Container::root("app");
    container.register_component(ComponentDescriptor::instance::<dyn ProxyBuilder>(Arc::new(
        WrongTypeProxy,
    )));
    container.register_component(
        ComponentDescriptor::implementing::<dyn Greeter, English>(|greeter| greeter)
            .construct_with(|_| Ok(English))
            .build()
            .unwrap(),
    );

    let error = container.request_component::<dyn Greeter>(None).err().unwrap();
    assert_eq!(error.kind(), ErrorKind::Misconfigured);
}

struct Connection {
    closed: Arc<AtomicUsize>,
}

fn connections(policy: InstantiationPolicy, closed: &Arc<AtomicUsize>) -> ComponentDescriptor {
    let closed = Arc::clone(closed);
    ComponentDescriptor::concrete::<Connection>()
        .policy(policy)
        .construct_with(move |_| {
            Ok(Connection {
                closed: Arc::clone(&closed),
            })
        })
        .on_dispose(|connection: &Connection| {
            connection.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .build()
        .unwrap()
}

#[test]
fn test_per_request_release_disposes() {
    let closed = Arc::new(AtomicUsize::new(0));
    let container = Container::root("app");
    container.register_component(connections(InstantiationPolicy::PerRequest, &closed));

    let first = container.request_component::<Connection>(None).unwrap();
    let second = container.request_component::<Connection>(None).unwrap();
    assert_eq!(container.manager().live_instances(), 2);

    assert!(container.release_component(&first).unwrap());
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    // 重复释放不会再次销毁
    assert!(!container.release_component(&first).unwrap());
    assert_eq!(closed.load(Ordering::SeqCst), 1);

    assert_eq!(container.shutdown(), 1);
    assert_eq!(closed.load(Ordering::SeqCst), 2);
    drop(second);
}

#[test]
fn test_singleton_disposed_only_at_shutdown() {
    let closed = Arc::new(AtomicUsize::new(0));
    let root = Container::root("app");
    root.register_component(connections(InstantiationPolicy::Singleton, &closed));
    let child = root.create_child_container("request");

    let connection = child.request_component::<Connection>(None).unwrap();
    assert!(!child.release_component(&connection).unwrap());
    assert_eq!(closed.load(Ordering::SeqCst), 0);

    // 子容器关闭不影响父容器的单例
    assert_eq!(child.shutdown(), 0);
    assert_eq!(root.shutdown(), 1);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

struct Pooled {
    _connection: Arc<Connection>,
}

#[test]
fn test_per_request_dependencies_released_with_dependent() {
    let closed = Arc::new(AtomicUsize::new(0));
    let container = Container::root("app");
    container.register_component(connections(InstantiationPolicy::PerRequest, &closed));
    container.register_component(
        ComponentDescriptor::concrete::<Pooled>()
            .policy(InstantiationPolicy::PerRequest)
            .constructor_arg::<Connection>(None)
            .construct_with(|args| {
                Ok(Pooled {
                    _connection: args.get::<Connection>(0)?,
                })
            })
            .build()
            .unwrap(),
    );

    for _ in 0..100 {
        let pooled = container.request_component::<Pooled>(None).unwrap();
        assert!(container.release_component(&pooled).unwrap());
    }
    assert_eq!(container.manager().live_instances(), 0);
    assert_eq!(closed.load(Ordering::SeqCst), 100);
}

#[test]
fn test_per_request_collaborators_released_after_use() {
    let container = Container::root("app");
    container.register_component(
        ComponentDescriptor::implementing::<dyn ProxyBuilder, LoudProxy>(|proxy| proxy)
            .policy(InstantiationPolicy::PerRequest)
            .construct_with(|_| {
                Ok(LoudProxy {
                    wrapped: AtomicUsize::new(0),
                })
            })
            .build()
            .unwrap(),
    );
    container.register_component(
        ComponentDescriptor::implementing::<dyn Greeter, English>(|greeter| greeter)
            .policy(InstantiationPolicy::PerRequest)
            .construct_with(|_| Ok(English))
            .build()
            .unwrap(),
    );

    for _ in 0..10 {
        let greeter = container.request_component::<dyn Greeter>(None).unwrap();
        assert_eq!(greeter.greet(), "HELLO");
        assert!(container.release_component(&greeter).unwrap());
    }
    assert_eq!(container.manager().live_instances(), 0);
}

#[test]
fn test_scanner_registers_module() {
    let container = Container::root("app");
    let scanner = FnScanner::new("greeting-module", || {
        Ok(vec![
            ComponentDescriptor::implementing::<dyn Greeter, English>(|greeter| greeter)
                .construct_with(|_| Ok(English))
                .build()
                .map_err(|e| di_common::ComponentError::scan_error(e.to_string()))?,
        ])
    });

    assert_eq!(container.register_scanner(&scanner).unwrap(), 1);
    assert!(container.has_component::<dyn Greeter>());
    assert_eq!(
        container.manager().registered_specifications(),
        vec!["Greeter(English)"]
    );
}
