//! 容器配置
//!
//! 配置可以来自 TOML 字符串、配置文件以及 `DI_` 前缀的环境变量。

use crate::errors::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// 默认配置文件（不含扩展名）
pub const DEFAULT_CONFIG_PATH: &str = "config/container";

/// 环境变量前缀
pub const ENV_PREFIX: &str = "DI";

/// 容器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// 最大解析深度
    pub max_resolution_depth: usize,
    /// 等待其他调用方完成同一实例创建的超时时间（毫秒）
    pub creation_wait_timeout_ms: u64,
    /// 内置生命周期管理器支持的阶段
    pub supported_phases: Vec<String>,
    /// 发布实例前是否查找已注册的代理构建器
    pub enable_proxy_lookup: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            max_resolution_depth: 64,
            creation_wait_timeout_ms: 5000,
            supported_phases: vec!["initialize".to_string(), "start".to_string()],
            enable_proxy_lookup: true,
        }
    }
}

impl ContainerConfig {
    /// 从 TOML 字符串解析配置
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            source: Box::new(e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 从 JSON 字符串解析配置
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(content).map_err(|e| ConfigError::ParseError {
            source: Box::new(e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 从默认位置加载配置
    ///
    /// 依次叠加 `config/container.{toml,json,yaml}`（可选）和 `DI_` 环境变量。
    pub fn load() -> ConfigResult<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name(DEFAULT_CONFIG_PATH).required(false));
        Self::finish(builder)
    }

    /// 从指定文件加载配置，文件必须存在
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let builder = config::Config::builder().add_source(config::File::from(path));
        Self::finish(builder)
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> ConfigResult<Self> {
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("supported_phases"),
            )
            .build()
            .map_err(|e| ConfigError::ParseError {
                source: Box::new(e),
            })?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| ConfigError::ParseError {
                source: Box::new(e),
            })?;
        config.validate()?;

        debug!(
            max_resolution_depth = config.max_resolution_depth,
            creation_wait_timeout_ms = config.creation_wait_timeout_ms,
            "容器配置加载完成"
        );
        Ok(config)
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_resolution_depth == 0 {
            return Err(ConfigError::ValidationError {
                message: "max_resolution_depth 必须大于 0".to_string(),
            });
        }
        if self.supported_phases.is_empty() {
            return Err(ConfigError::ValidationError {
                message: "supported_phases 不能为空".to_string(),
            });
        }
        if let Some(phase) = self.supported_phases.iter().find(|p| p.trim().is_empty()) {
            return Err(ConfigError::ValidationError {
                message: format!("生命周期阶段名称无效: '{phase}'"),
            });
        }
        Ok(())
    }

    /// 创建等待超时
    pub fn creation_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.creation_wait_timeout_ms)
    }

    /// 设置支持的生命周期阶段
    pub fn with_supported_phases<I, S>(mut self, phases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_phases = phases.into_iter().map(Into::into).collect();
        self
    }

    /// 设置创建等待超时
    pub fn with_creation_wait_timeout(mut self, timeout: Duration) -> Self {
        self.creation_wait_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// 设置最大解析深度
    pub fn with_max_resolution_depth(mut self, depth: usize) -> Self {
        self.max_resolution_depth = depth;
        self
    }
}
