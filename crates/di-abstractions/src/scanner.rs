//! 组件扫描器抽象接口
//!
//! 描述符可以来自手写的注册模块、代码生成或配置，容器只关心产出的
//! [`ComponentDescriptor`]。

use crate::descriptor::ComponentDescriptor;
use di_common::ComponentResult;

/// 组件扫描器 trait
pub trait ComponentScanner: Send + Sync {
    /// 获取扫描器名称
    fn name(&self) -> &str;

    /// 产出组件描述符
    fn scan(&self) -> ComponentResult<Vec<ComponentDescriptor>>;
}

/// 由闭包产出描述符的扫描器，适合手写的注册模块
pub struct FnScanner<F>
where
    F: Fn() -> ComponentResult<Vec<ComponentDescriptor>> + Send + Sync,
{
    name: String,
    scan_fn: F,
}

impl<F> FnScanner<F>
where
    F: Fn() -> ComponentResult<Vec<ComponentDescriptor>> + Send + Sync,
{
    /// 创建扫描器
    pub fn new(name: impl Into<String>, scan_fn: F) -> Self {
        Self {
            name: name.into(),
            scan_fn,
        }
    }
}

impl<F> ComponentScanner for FnScanner<F>
where
    F: Fn() -> ComponentResult<Vec<ComponentDescriptor>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn scan(&self) -> ComponentResult<Vec<ComponentDescriptor>> {
        (self.scan_fn)()
    }
}
