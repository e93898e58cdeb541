//! # Dependency Injection Abstractions
//!
//! 依赖注入抽象层，定义组件描述和容器协作者的核心接口。
//!
//! ## 核心接口
//!
//! - [`ComponentDescriptor`] - 组件描述符及其构建器
//! - [`InstanceContainer`] - 单个存活实例的状态
//! - [`LifecycleManager`] - 生命周期阶段执行器
//! - [`ProxyBuilder`] - 公开实例包装器
//! - [`ComponentScanner`] - 描述符来源

pub mod descriptor;
pub mod instance;
pub mod lifecycle;
pub mod proxy;
pub mod scanner;

pub use descriptor::*;
pub use instance::*;
pub use lifecycle::*;
pub use proxy::*;
pub use scanner::*;
