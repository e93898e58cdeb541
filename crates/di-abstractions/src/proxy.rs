//! 代理构建器抽象接口

use crate::descriptor::{ComponentDescriptor, SharedInstance};
use di_common::BoxError;

/// 代理构建器 trait
///
/// 注册为 `dyn ProxyBuilder` 组件后，容器在发布每个实例之前调用它，
/// 把初始化完成的实例包装成交给调用方的公开实例（例如用于埋点）。
/// 返回值必须仍然保存同一规格的 `Arc<I>`，不需要包装时原样返回即可。
pub trait ProxyBuilder: Send + Sync {
    /// 构建公开实例
    fn build_proxy(
        &self,
        descriptor: &ComponentDescriptor,
        instance: SharedInstance,
    ) -> Result<SharedInstance, BoxError>;
}
