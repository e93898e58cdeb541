//! 容器解析行为的集中集成测试
use di_abstractions::ComponentDescriptor;
use di_common::{DependencyError, ErrorKind, InstantiationPolicy};
use di_impl::Container;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

trait Greeter: Send + Sync {
    fn greet(&self) -> String;
}

struct English;

impl Greeter for English {
    fn greet(&self) -> String {
        "hello".to_string()
    }
}

struct French;

impl Greeter for French {
    fn greet(&self) -> String {
        "bonjour".to_string()
    }
}

fn english(policy: InstantiationPolicy) -> ComponentDescriptor {
    ComponentDescriptor::implementing::<dyn Greeter, English>(|greeter| greeter)
        .policy(policy)
        .construct_with(|_| Ok(English))
        .build()
        .unwrap()
}

fn french() -> ComponentDescriptor {
    ComponentDescriptor::implementing::<dyn Greeter, French>(|greeter| greeter)
        .construct_with(|_| Ok(French))
        .build()
        .unwrap()
}

#[test]
fn test_singleton_returns_identical_instance() {
    init_tracing();
    let container = Container::root("app");
    container.register_component(english(InstantiationPolicy::Singleton));

    let first = container.request_component::<dyn Greeter>(None).unwrap();
    let second = container.request_component::<dyn Greeter>(None).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.greet(), "hello");
}

#[test]
fn test_per_request_returns_fresh_instances() {
    let container = Container::root("app");
    container.register_component(english(InstantiationPolicy::PerRequest));

    let first = container.request_component::<dyn Greeter>(None).unwrap();
    let second = container.request_component::<dyn Greeter>(None).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
}

#[test]
fn test_qualifiers_never_share_instances() {
    let container = Container::root("app");
    container.register_component(english(InstantiationPolicy::Singleton));

    let a = container.request_component::<dyn Greeter>(Some("a")).unwrap();
    let b = container.request_component::<dyn Greeter>(Some("b")).unwrap();
    let default = container.request_component::<dyn Greeter>(None).unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &default));
    assert!(Arc::ptr_eq(
        &a,
        &container.request_component::<dyn Greeter>(Some("a")).unwrap()
    ));
}

type Log = Arc<Mutex<Vec<String>>>;

fn record(log: &Log, entry: &str) {
    log.lock().unwrap().push(entry.to_string());
}

struct Database;
struct Cache;
struct Clock;

struct Service {
    log: Log,
    database: Arc<Database>,
    cache: Option<Arc<Cache>>,
    clock: Option<Arc<Clock>>,
}

fn logged<T: Send + Sync + 'static>(log: &Log, name: &'static str, value: fn() -> T) -> ComponentDescriptor {
    let log = Arc::clone(log);
    ComponentDescriptor::concrete::<T>()
        .construct_with(move |_| {
            record(&log, &format!("construct {name}"));
            Ok(value())
        })
        .build()
        .unwrap()
}

#[test]
fn test_injection_phases_run_in_order_exactly_once() {
    init_tracing();
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let container = Container::root("app");
    container.register_component(logged(&log, "database", || Database));
    container.register_component(logged(&log, "cache", || Cache));
    container.register_component(logged(&log, "clock", || Clock));

    let service_log = Arc::clone(&log);
    container.register_component(
        ComponentDescriptor::concrete::<Service>()
            .constructor_arg::<Database>(None)
            .field::<Cache, _>("cache", None, |service, cache| {
                record(&service.log, "field cache");
                service.cache = Some(cache);
            })
            .setter::<Clock, _>("set_clock", None, |service, clock| {
                record(&service.log, "setter clock");
                service.clock = Some(clock);
                Ok(())
            })
            .lifecycle_hook("initialize", |service: &mut Service| {
                assert!(service.cache.is_some() && service.clock.is_some());
                record(&service.log, "initialize");
                Ok(())
            })
            .construct_with(move |args| {
                record(&service_log, "construct service");
                Ok(Service {
                    log: Arc::clone(&service_log),
                    database: args.get::<Database>(0)?,
                    cache: None,
                    clock: None,
                })
            })
            .build()
            .unwrap(),
    );

    let service = container.request_component::<Service>(None).unwrap();
    container.request_component::<Service>(None).unwrap();

    assert!(Arc::ptr_eq(
        &service.database,
        &container.request_component::<Database>(None).unwrap()
    ));
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "construct database",
            "construct service",
            "construct cache",
            "field cache",
            "construct clock",
            "setter clock",
            "initialize",
        ]
    );
}

struct CycleA;
struct CycleB;

#[test]
fn test_constructor_cycle_fails_cleanly() {
    let container = Container::root("app");
    container.register_component(
        ComponentDescriptor::concrete::<CycleA>()
            .constructor_arg::<CycleB>(None)
            .construct_with(|_| Ok(CycleA))
            .build()
            .unwrap(),
    );
    container.register_component(
        ComponentDescriptor::concrete::<CycleB>()
            .constructor_arg::<CycleA>(None)
            .construct_with(|_| Ok(CycleB))
            .build()
            .unwrap(),
    );

    let error = container.request_component::<CycleA>(None).err().unwrap();
    assert_eq!(error.kind(), ErrorKind::CreationFailed);
    match error.root_cause() {
        DependencyError::CircularDependency { dependency_chain } => {
            assert_eq!(dependency_chain, "CycleA -> CycleB -> CycleA");
        }
        other => panic!("unexpected root cause: {other}"),
    }
    assert_eq!(
        error.dependency_chain(),
        vec!["CycleA -> CycleB[default]", "CycleB -> CycleA[default]"]
    );
    assert_eq!(container.manager().live_instances(), 0);
}

trait Repository: Send + Sync {
    fn find(&self, id: u32) -> Option<String>;
}

struct MemoryRepository;

impl Repository for MemoryRepository {
    fn find(&self, id: u32) -> Option<String> {
        (id == 1).then(|| "alice".to_string())
    }
}

struct UserService {
    repository: Arc<dyn Repository>,
}

#[test]
fn test_missing_dependency_then_retry() -> anyhow::Result<()> {
    let container = Container::root("app");
    container.register_component(
        ComponentDescriptor::concrete::<UserService>()
            .constructor_arg::<dyn Repository>(Some("primary"))
            .construct_with(|args| {
                Ok(UserService {
                    repository: args.get::<dyn Repository>(0)?,
                })
            })
            .build()?,
    );

    let error = container.request_component::<UserService>(None).err().unwrap();
    match error.root_cause() {
        DependencyError::NotAvailable {
            specification,
            qualifier,
        } => {
            assert_eq!(specification, "Repository");
            assert_eq!(qualifier.as_deref(), Some("primary"));
        }
        other => panic!("unexpected root cause: {other}"),
    }
    assert_eq!(container.manager().live_instances(), 0);

    container.register_component(
        ComponentDescriptor::implementing::<dyn Repository, MemoryRepository>(|repo| repo)
            .construct_with(|_| Ok(MemoryRepository))
            .build()?,
    );
    let service = container.request_component::<UserService>(None)?;
    assert_eq!(service.repository.find(1).as_deref(), Some("alice"));
    Ok(())
}

#[test]
fn test_child_registration_shadows_parent() {
    let root = Container::root("app");
    root.register_component(english(InstantiationPolicy::Singleton));

    let shadowing = root.create_child_container("fr");
    shadowing.register_component(french());
    let sibling = root.create_child_container("plain");

    let from_root = root.request_component::<dyn Greeter>(None).unwrap();
    let from_shadowing = shadowing.request_component::<dyn Greeter>(None).unwrap();
    let from_sibling = sibling.request_component::<dyn Greeter>(None).unwrap();

    assert_eq!(from_shadowing.greet(), "bonjour");
    assert_eq!(from_sibling.greet(), "hello");
    assert!(Arc::ptr_eq(&from_root, &from_sibling));
    assert!(!Arc::ptr_eq(&from_root, &from_shadowing));
}

#[test]
fn test_child_container_does_not_keep_root_alive() {
    let root = Container::root("app");
    root.register_component(english(InstantiationPolicy::Singleton));
    let child = root.create_child_container("request");
    assert!(child.has_component::<dyn Greeter>());

    drop(root);
    let error = child.request_component::<dyn Greeter>(None).err().unwrap();
    assert_eq!(error.kind(), ErrorKind::NotAvailable);
    assert!(!child.release_component(&(Arc::new(English) as Arc<dyn Greeter>)).unwrap());
}

struct Session {
    greeter: Arc<dyn Greeter>,
}

#[test]
fn test_parent_singleton_resolves_from_its_own_scope() {
    let root = Container::root("app");
    root.register_component(english(InstantiationPolicy::Singleton));
    root.register_component(
        ComponentDescriptor::concrete::<Session>()
            .constructor_arg::<dyn Greeter>(None)
            .construct_with(|args| {
                Ok(Session {
                    greeter: args.get::<dyn Greeter>(0)?,
                })
            })
            .build()
            .unwrap(),
    );

    let child = root.create_child_container("fr");
    child.register_component(french());

    // 父作用域的单例不会捕获子作用域的注册
    let session = child.request_component::<Session>(None).unwrap();
    assert_eq!(session.greeter.greet(), "hello");
}

struct Flaky {
    generation: usize,
}

#[test]
fn test_lifecycle_failure_is_never_published() {
    let constructions = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&constructions);
    let container = Container::root("app");
    container.register_component(
        ComponentDescriptor::concrete::<Flaky>()
            .lifecycle_hook("start", |flaky: &mut Flaky| {
                if flaky.generation == 0 {
                    return Err("端口被占用".into());
                }
                Ok(())
            })
            .construct_with(move |_| {
                Ok(Flaky {
                    generation: counter.fetch_add(1, Ordering::SeqCst),
                })
            })
            .build()
            .unwrap(),
    );

    let error = container.request_component::<Flaky>(None).err().unwrap();
    match &error {
        DependencyError::LifecycleFailed { phase, .. } => assert_eq!(phase, "start"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(container.manager().live_instances(), 0);

    let flaky = container.request_component::<Flaky>(None).unwrap();
    assert_eq!(flaky.generation, 1);
    assert_eq!(constructions.load(Ordering::SeqCst), 2);
    assert!(Arc::ptr_eq(
        &flaky,
        &container.request_component::<Flaky>(None).unwrap()
    ));
}

struct Report {
    greeter: Option<Arc<dyn Greeter>>,
}

#[test]
fn test_setter_failure_is_injection_error() {
    let container = Container::root("app");
    container.register_component(english(InstantiationPolicy::Singleton));
    container.register_component(
        ComponentDescriptor::concrete::<Report>()
            .setter::<dyn Greeter, _>("set_greeter", None, |report, greeter| {
                if greeter.greet() != "bonjour" {
                    return Err("只接受法语".into());
                }
                report.greeter = Some(greeter);
                Ok(())
            })
            .construct_with(|_| Ok(Report { greeter: None }))
            .build()
            .unwrap(),
    );

    let error = container.request_component::<Report>(None).err().unwrap();
    match &error {
        DependencyError::InjectionFailed {
            dependency, target, ..
        } => {
            assert_eq!(dependency, "set_greeter");
            assert_eq!(target, "Report");
        }
        other => panic!("unexpected error: {other}"),
    }
}
