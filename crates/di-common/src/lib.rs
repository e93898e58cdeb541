//! # DI Common
//!
//! 组件容器各个 crate 共享的基础类型。
//!
//! ## 核心内容
//!
//! - [`DependencyError`] - 依赖注入错误分类
//! - [`TypeInfo`] - 规格与实现类型的运行时标识
//! - [`LifecycleState`] / [`InstantiationPolicy`] - 实例状态机与实例化策略
//! - [`ContainerConfig`] - 容器配置

pub mod configuration;
pub mod errors;
pub mod lifecycle;
pub mod metadata;

pub use configuration::*;
pub use errors::*;
pub use lifecycle::*;
pub use metadata::*;
