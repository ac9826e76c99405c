//! 错误类型定义模块
//!
//! 定义 TRON 公共层的错误类型 TronError 和 Result 别名。

use thiserror::Error;

/// TRON 公共错误类型
///
/// 覆盖配置加载、根类型解析等与文档引擎无关的失败情况。
#[derive(Error, Debug)]
pub enum TronError {
    /// I/O 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 配置错误
    #[error("Config error: {0}")]
    Config(String),

    /// 根类型无效(只允许 object 或 array)
    #[error("Invalid root kind: {0:?} (expected \"object\" or \"array\")")]
    InvalidRootKind(String),

    /// 验证错误
    #[error("Validation error: {0}")]
    Validation(String),
}

/// TRON Result 类型别名
pub type TronResult<T> = Result<T, TronError>;
