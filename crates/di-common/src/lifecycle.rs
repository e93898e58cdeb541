//! 组件实例生命周期状态与实例化策略

use serde::{Deserialize, Serialize};
use std::fmt;

/// 组件实例化策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstantiationPolicy {
    /// 单例模式 - 每个限定符只创建一个实例，直到容器关闭
    #[default]
    Singleton,
    /// 按请求模式 - 每次请求都创建新实例，引用计数归零时销毁
    PerRequest,
}

impl InstantiationPolicy {
    /// 释放后是否仍保留实例
    pub fn retains_instances(self) -> bool {
        matches!(self, Self::Singleton)
    }
}

/// 组件实例生命周期状态
///
/// 状态严格按声明顺序前进，不允许回退或跳跃。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LifecycleState {
    /// 未创建
    #[default]
    Uncreated,
    /// 已调用构造函数
    Instantiated,
    /// 字段注入完成
    FieldInjected,
    /// setter 注入完成
    SetterInjected,
    /// 生命周期钩子执行完成
    LifecycleComplete,
    /// 已发布给调用方
    Published,
}

impl LifecycleState {
    /// 下一个状态，`Published` 之后没有后继
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Uncreated => Some(Self::Instantiated),
            Self::Instantiated => Some(Self::FieldInjected),
            Self::FieldInjected => Some(Self::SetterInjected),
            Self::SetterInjected => Some(Self::LifecycleComplete),
            Self::LifecycleComplete => Some(Self::Published),
            Self::Published => None,
        }
    }

    /// 是否可以直接前进到目标状态
    pub fn can_advance_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uncreated => "UNCREATED",
            Self::Instantiated => "INSTANTIATED",
            Self::FieldInjected => "FIELD_INJECTED",
            Self::SetterInjected => "SETTER_INJECTED",
            Self::LifecycleComplete => "LIFECYCLE_COMPLETE",
            Self::Published => "PUBLISHED",
        };
        f.write_str(name)
    }
}
