//! # 依赖注入具体实现
//!
//! 提供作用域容器、依赖解析管理器、组件提供者和标准生命周期管理器。
//!
//! ```ignore
//! let root = Container::root("app");
//! root.register_component(
//!     ComponentDescriptor::implementing::<dyn Clock, SystemClock>(|clock| clock)
//!         .construct_with(|_| Ok(SystemClock))
//!         .build()?,
//! );
//! let clock = root.request_component::<dyn Clock>(None)?;
//! ```

pub mod container;
pub mod lifecycle;
pub mod manager;
pub mod provider;
mod resolution;

pub use container::Container;
pub use lifecycle::StandardLifecycleManager;
pub use manager::Manager;
pub use provider::ComponentProvider;

// 便于使用方只依赖本 crate
pub use di_abstractions::*;
pub use di_common::*;
