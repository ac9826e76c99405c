//! 文档配置模块
//!
//! 本模块定义了文档引擎的所有配置选项:
//! - 缓冲区配置(初始容量、最大容量、增长倍数)
//! - JSON 编解码配置(最大嵌套深度)
//! - 日志配置
//!
//! 支持从 TOML 文件加载配置。

use crate::error::{TronError, TronResult};
use crate::types::RootKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// 缓冲区允许的最小初始容量
pub const MIN_BUFFER_CAPACITY: usize = 64;

/// 缓冲区允许的最大容量 (偏移量以 u32 存储)
pub const MAX_BUFFER_CAPACITY: usize = u32::MAX as usize;

/// 文档主配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocConfig {
    /// 根节点类型 (默认: object)
    #[serde(default)]
    pub root: RootKind,

    /// 缓冲区配置
    #[serde(default)]
    pub buffer: BufferConfig,

    /// JSON 编解码配置
    #[serde(default)]
    pub json: JsonConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for DocConfig {
    fn default() -> Self {
        Self {
            root: RootKind::default(),
            buffer: BufferConfig::default(),
            json: JsonConfig::default(),
            log: LogConfig::default(),
        }
    }
}

/// 缓冲区配置
///
/// 控制缓冲区的初始大小和增长策略。增长采用几何倍数，
/// 保证追加操作的均摊常数开销。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// 初始容量(字节) (默认: 1024)
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: usize,

    /// 最大容量(字节) (默认: 4 GiB - 1)
    #[serde(default = "default_max_capacity")]
    pub max_capacity: usize,

    /// 每次增长的倍数 (默认: 2)
    #[serde(default = "default_growth_factor")]
    pub growth_factor: usize,
}

fn default_initial_capacity() -> usize { 1024 }
fn default_max_capacity() -> usize { MAX_BUFFER_CAPACITY }
fn default_growth_factor() -> usize { 2 }

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            initial_capacity: default_initial_capacity(),
            max_capacity: default_max_capacity(),
            growth_factor: default_growth_factor(),
        }
    }
}

impl BufferConfig {
    /// 使用指定初始容量创建配置，其余字段取默认值
    pub fn with_initial_capacity(initial_capacity: usize) -> Self {
        Self {
            initial_capacity,
            ..Default::default()
        }
    }

    /// # Brief
    /// 检查缓冲区配置是否自洽
    ///
    /// # Returns
    /// 合法返回 Ok(()), 否则返回 TronError::Validation
    pub fn validate(&self) -> TronResult<()> {
        if self.initial_capacity < MIN_BUFFER_CAPACITY {
            return Err(TronError::Validation(format!(
                "initial_capacity {} is below the minimum of {}",
                self.initial_capacity, MIN_BUFFER_CAPACITY
            )));
        }
        if self.max_capacity > MAX_BUFFER_CAPACITY {
            return Err(TronError::Validation(format!(
                "max_capacity {} exceeds the addressable limit of {}",
                self.max_capacity, MAX_BUFFER_CAPACITY
            )));
        }
        if self.initial_capacity > self.max_capacity {
            return Err(TronError::Validation(format!(
                "initial_capacity {} exceeds max_capacity {}",
                self.initial_capacity, self.max_capacity
            )));
        }
        if self.growth_factor < 2 {
            return Err(TronError::Validation(format!(
                "growth_factor must be at least 2, got {}",
                self.growth_factor
            )));
        }
        Ok(())
    }
}

/// JSON 编解码配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonConfig {
    /// 导入 JSON 文本与值树时的最大嵌套深度 (默认: 128)
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_depth() -> usize { 128 }

impl Default for JsonConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别过滤表达式 (默认: info)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否输出事件的 target
    #[serde(default = "default_with_target")]
    pub with_target: bool,

    /// 以 JSON 行格式输出 (默认: false)
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String { "info".to_string() }
fn default_with_target() -> bool { true }

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            with_target: default_with_target(),
            json: false,
        }
    }
}

impl DocConfig {
    /// 使用指定根类型创建默认配置
    pub fn with_root(root: RootKind) -> Self {
        Self {
            root,
            ..Default::default()
        }
    }

    /// # Brief
    /// 从 TOML 文件加载配置
    ///
    /// # Arguments
    /// * `path` - 配置文件路径
    ///
    /// # Returns
    /// 解析并验证后的配置
    pub fn from_file(path: &Path) -> TronResult<Self> {
        info!("Loading config from {:?}", path);
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// # Brief
    /// 从 TOML 字符串解析配置
    ///
    /// # Arguments
    /// * `content` - TOML 文本
    ///
    /// # Returns
    /// 解析并验证后的配置
    pub fn from_toml_str(content: &str) -> TronResult<Self> {
        let config: DocConfig = toml::from_str(content)
            .map_err(|e| TronError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// # Brief
    /// 将配置序列化为 TOML 字符串
    pub fn to_toml(&self) -> TronResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| TronError::Config(format!("Failed to serialize config: {}", e)))
    }

    pub fn validate(&self) -> TronResult<()> {
        self.buffer.validate()?;
        if self.json.max_depth == 0 {
            return Err(TronError::Validation("json.max_depth must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = DocConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.root, RootKind::Object);
        assert_eq!(config.buffer.initial_capacity, 1024);
        assert_eq!(config.buffer.growth_factor, 2);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = DocConfig::from_toml_str(
            r#"
            root = "array"

            [buffer]
            initial_capacity = 4096
            "#,
        )
        .unwrap();
        assert_eq!(config.root, RootKind::Array);
        assert_eq!(config.buffer.initial_capacity, 4096);
        assert_eq!(config.buffer.max_capacity, MAX_BUFFER_CAPACITY);
        assert_eq!(config.json.max_depth, 128);
    }

    #[test]
    fn test_reject_unknown_root() {
        let err = DocConfig::from_toml_str(r#"root = "table""#).unwrap_err();
        assert!(matches!(err, TronError::Config(_)));

        let err = DocConfig::from_file(Path::new("/nonexistent/tron.toml")).unwrap_err();
        assert!(matches!(err, TronError::Io(_)));
    }

    #[test]
    fn test_reject_inconsistent_buffer() {
        let config = BufferConfig {
            initial_capacity: 8192,
            max_capacity: 1024,
            growth_factor: 2,
        };
        assert!(config.validate().is_err());

        let config = BufferConfig {
            growth_factor: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        assert!(matches!(
            BufferConfig::with_initial_capacity(16).validate(),
            Err(TronError::Validation(_))
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = DocConfig::with_root(RootKind::Array);
        config.buffer.growth_factor = 4;
        config.log.level = "debug".to_string();
        config.log.json = true;
        let text = config.to_toml().unwrap();
        let parsed = DocConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
