//! # 示例应用程序
//!
//! 演示根容器中的单例服务、请求作用域子容器、生命周期钩子和实例释放

use anyhow::Context;
use clap::Parser;
use di_abstractions::ComponentDescriptor;
use di_common::{ContainerConfig, InstantiationPolicy};
use di_impl::Container;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "example-app")]
#[command(about = "组件容器示例应用")]
struct Args {
    /// 容器配置文件路径（不存在时使用默认配置和环境变量）
    #[arg(short, long)]
    config: Option<String>,

    /// 模拟的请求数量
    #[arg(short, long, default_value_t = 3)]
    requests: usize,

    /// 日志级别
    #[arg(long, default_value = "info")]
    log_level: String,
}

trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// 每次读取前进一毫秒的确定性时钟
struct TickingClock {
    ticks: AtomicU64,
}

impl Clock for TickingClock {
    fn now_millis(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::SeqCst)
    }
}

trait OrderRepository: Send + Sync {
    fn save(&self, order: String) -> usize;
    fn count(&self) -> usize;
}

#[derive(Default)]
struct MemoryOrderRepository {
    orders: Mutex<Vec<String>>,
    connected: bool,
}

impl OrderRepository for MemoryOrderRepository {
    fn save(&self, order: String) -> usize {
        if !self.connected {
            warn!("订单仓储尚未初始化");
        }
        let mut orders = self.orders.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        orders.push(order);
        orders.len()
    }

    fn count(&self) -> usize {
        self.orders.lock().map_or(0, |orders| orders.len())
    }
}

/// 请求上下文，每个请求作用域一个
struct RequestContext {
    request_id: String,
    started_at: u64,
}

struct OrderService {
    repository: Arc<dyn OrderRepository>,
    clock: Option<Arc<dyn Clock>>,
    context: Option<Arc<RequestContext>>,
}

impl OrderService {
    fn place(&self, item: &str) -> anyhow::Result<usize> {
        let context = self.context.as_ref().context("请求上下文未注入")?;
        let clock = self.clock.as_ref().context("时钟未注入")?;
        let order = format!(
            "{}:{}@{}+{}",
            context.request_id,
            item,
            context.started_at,
            clock.now_millis() - context.started_at
        );
        Ok(self.repository.save(order))
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(parse_log_level(&args.log_level))
        .init();

    info!("启动组件容器示例应用");

    let config = match &args.config {
        Some(path) => ContainerConfig::load_from(path)
            .with_context(|| format!("加载容器配置失败: {path}"))?,
        None => ContainerConfig::load().context("加载容器配置失败")?,
    };
    let root = Container::try_with_config("app", config)?;
    register_application(&root)?;

    for index in 0..args.requests {
        handle_request(&root, index)?;
    }

    info!(
        "根容器存活实例: {}，已注册: {:?}",
        root.manager().live_instances(),
        root.manager().registered_specifications()
    );
    let disposed = root.shutdown();
    info!("应用已关闭，销毁了 {} 个实例", disposed);
    Ok(())
}

/// 在根容器中注册应用级单例
fn register_application(root: &Container) -> anyhow::Result<()> {
    root.register_component(
        ComponentDescriptor::implementing::<dyn Clock, TickingClock>(|clock| clock)
            .category("infrastructure")
            .construct_with(|_| {
                Ok(TickingClock {
                    ticks: AtomicU64::new(1_000),
                })
            })
            .build()?,
    );

    root.register_component(
        ComponentDescriptor::implementing::<dyn OrderRepository, MemoryOrderRepository>(|repo| repo)
            .category("repository")
            .construct_with(|_| Ok(MemoryOrderRepository::default()))
            .lifecycle_hook("initialize", |repo: &mut MemoryOrderRepository| {
                repo.connected = true;
                Ok(())
            })
            .on_dispose(|repo| {
                info!("订单仓储关闭，共保存 {} 个订单", repo.count());
                Ok(())
            })
            .build()?,
    );
    Ok(())
}

/// 为单个请求创建子容器，解析服务并处理订单
fn handle_request(root: &Container, index: usize) -> anyhow::Result<()> {
    let scope = root.create_child_container(format!("request-{index}"));
    let request_id = format!("req-{index}");

    scope.register_component(
        ComponentDescriptor::concrete::<RequestContext>()
            .constructor_arg::<dyn Clock>(None)
            .construct_with(move |args| {
                Ok(RequestContext {
                    request_id: request_id.clone(),
                    started_at: args.get::<dyn Clock>(0)?.now_millis(),
                })
            })
            .build()?,
    );

    scope.register_component(
        ComponentDescriptor::concrete::<OrderService>()
            .category("service")
            .policy(InstantiationPolicy::PerRequest)
            .constructor_arg::<dyn OrderRepository>(None)
            .field::<dyn Clock, _>("clock", None, |service, clock| service.clock = Some(clock))
            .setter::<RequestContext, _>("set_context", None, |service, context| {
                service.context = Some(context);
                Ok(())
            })
            .lifecycle_hook("start", |service: &mut OrderService| {
                if service.context.is_none() {
                    return Err("服务启动时缺少请求上下文".into());
                }
                Ok(())
            })
            .construct_with(|args| {
                Ok(OrderService {
                    repository: args.get::<dyn OrderRepository>(0)?,
                    clock: None,
                    context: None,
                })
            })
            .build()?,
    );

    let service = scope.request_component::<OrderService>(None)?;
    let saved = service.place("coffee")?;
    info!("请求 {} 处理完成，累计订单 {}", scope.path(), saved);

    if !scope.release_component(&service)? {
        warn!("服务实例仍被引用: {}", scope.path());
    }
    scope.shutdown();
    Ok(())
}

fn parse_log_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
