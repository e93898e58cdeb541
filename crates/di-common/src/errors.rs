//! 错误类型定义

use thiserror::Error;

/// 组件代码（构造函数、setter、生命周期钩子、销毁钩子）返回的错误类型
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    #[error("配置解析失败: {source}")]
    ParseError { source: BoxError },

    #[error("配置验证失败: {message}")]
    ValidationError { message: String },
}

/// 依赖注入错误类型
///
/// 每个变体对应一种可区分的失败原因。嵌套依赖的失败通过
/// [`DependencyError::CreationFailed`] 逐层包装，调用方可以用
/// [`DependencyError::root_cause`] 取得最内层的原因。
#[derive(Error, Debug)]
pub enum DependencyError {
    #[error("组件不可用: {specification}[{}]", display_qualifier(.qualifier))]
    NotAvailable {
        specification: String,
        qualifier: Option<String>,
    },

    #[error("循环依赖检测到: {dependency_chain}")]
    CircularDependency { dependency_chain: String },

    #[error("组件实例化失败: {specification} <- {implementation}[{}], 原因: {source}", display_qualifier(.qualifier))]
    InstantiationFailed {
        specification: String,
        implementation: String,
        qualifier: Option<String>,
        source: BoxError,
    },

    #[error("组件注入失败: {target}.{dependency} ({specification}), 原因: {source}")]
    InjectionFailed {
        dependency: String,
        specification: String,
        target: String,
        source: BoxError,
    },

    #[error("依赖创建失败: {requester} -> {specification}[{}], 原因: {source}", display_qualifier(.qualifier))]
    CreationFailed {
        requester: String,
        specification: String,
        qualifier: Option<String>,
        source: Box<DependencyError>,
    },

    #[error("生命周期阶段 '{phase}' 执行失败: {specification}[{}], 原因: {source}", display_qualifier(.qualifier))]
    LifecycleFailed {
        phase: String,
        specification: String,
        qualifier: Option<String>,
        source: BoxError,
    },

    #[error("容器配置错误: {message}")]
    Misconfigured { message: String },

    #[error("等待组件创建超时: {specification}[{}], 已等待 {waited_ms}ms", display_qualifier(.qualifier))]
    CreationTimeout {
        specification: String,
        qualifier: Option<String>,
        waited_ms: u64,
    },
}

/// 错误种类，便于调用方匹配而不关心上下文字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotAvailable,
    CircularDependency,
    InstantiationFailed,
    InjectionFailed,
    CreationFailed,
    LifecycleFailed,
    Misconfigured,
    CreationTimeout,
}

impl DependencyError {
    /// 创建配置错误
    pub fn misconfigured(message: impl Into<String>) -> Self {
        Self::Misconfigured {
            message: message.into(),
        }
    }

    /// 获取错误种类
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotAvailable { .. } => ErrorKind::NotAvailable,
            Self::CircularDependency { .. } => ErrorKind::CircularDependency,
            Self::InstantiationFailed { .. } => ErrorKind::InstantiationFailed,
            Self::InjectionFailed { .. } => ErrorKind::InjectionFailed,
            Self::CreationFailed { .. } => ErrorKind::CreationFailed,
            Self::LifecycleFailed { .. } => ErrorKind::LifecycleFailed,
            Self::Misconfigured { .. } => ErrorKind::Misconfigured,
            Self::CreationTimeout { .. } => ErrorKind::CreationTimeout,
        }
    }

    /// 直接嵌套的依赖注入错误（如果有）
    fn nested(&self) -> Option<&DependencyError> {
        match self {
            Self::CreationFailed { source, .. } => Some(source),
            Self::InstantiationFailed { source, .. }
            | Self::InjectionFailed { source, .. }
            | Self::LifecycleFailed { source, .. } => source.downcast_ref::<DependencyError>(),
            _ => None,
        }
    }

    /// 沿嵌套链找到最内层的依赖注入错误
    pub fn root_cause(&self) -> &DependencyError {
        let mut current = self;
        while let Some(next) = current.nested() {
            current = next;
        }
        current
    }

    /// 收集从最外层请求方到失败点的依赖链
    ///
    /// 每一跳的格式为 `请求方 -> 规格[限定符]`。
    pub fn dependency_chain(&self) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = Some(self);
        while let Some(error) = current {
            if let Self::CreationFailed {
                requester,
                specification,
                qualifier,
                ..
            } = error
            {
                chain.push(format!(
                    "{} -> {}[{}]",
                    requester,
                    specification,
                    display_qualifier(qualifier)
                ));
            }
            current = error.nested();
        }
        chain
    }
}

/// 限定符的显示形式，未限定时显示为 `default`
pub fn display_qualifier(qualifier: &Option<String>) -> &str {
    qualifier.as_deref().unwrap_or("default")
}

/// 组件错误类型
#[derive(Error, Debug)]
pub enum ComponentError {
    #[error("组件扫描失败: {message}")]
    ScanError { message: String },

    #[error("组件注册失败: {type_name}, 原因: {message}")]
    RegistrationError { type_name: String, message: String },
}

impl ComponentError {
    /// 创建扫描错误
    pub fn scan_error(message: impl Into<String>) -> Self {
        Self::ScanError {
            message: message.into(),
        }
    }
}

/// 结果类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type DependencyResult<T> = Result<T, DependencyError>;
pub type ComponentResult<T> = Result<T, ComponentError>;
