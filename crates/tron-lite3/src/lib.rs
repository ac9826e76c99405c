//! # TRON / Lite3 - 偏移寻址的二进制 JSON 文档引擎
//!
//! 整个文档存放在一块连续、可增长的字节缓冲区中，所有值都通过缓冲区内的
//! 整数**偏移量**寻址，而不是指针或句柄：
//!
//! - **偏移稳定**：缓冲区扩容时按原偏移逐字节复制，扩容前得到的偏移在扩容后依然有效
//! - **原地修改**：对象/数组节点可直接在缓冲区内插入、覆盖、追加
//! - **扩容重试**：空间不足时由文档上下文扩容后重新执行同一操作，调用方无感知
//! - **JSON 互转**：与标准 JSON 文本无损互转
//!
//! ## 快速开始
//!
//! ```rust
//! use tron_lite3::{Document, RootKind, ROOT};
//!
//! let mut doc = Document::new(RootKind::Object).unwrap();
//! doc.set_str(ROOT, "name", "alice").unwrap();
//! doc.set_i64(ROOT, "age", 30).unwrap();
//! let address = doc.set_obj(ROOT, "address").unwrap();
//! doc.set_str(address, "city", "nyc").unwrap();
//!
//! assert_eq!(doc.get_str(ROOT, "name").unwrap(), "alice");
//! assert_eq!(doc.get_str(address, "city").unwrap(), "nyc");
//!
//! let bytes = doc.to_bytes();
//! let loaded = Document::from_bytes(&bytes).unwrap();
//! assert_eq!(loaded.get_i64(ROOT, "age").unwrap(), 30);
//! ```

pub mod spec;
pub mod buffer;
pub mod hash;
pub mod value;
pub mod document;
pub mod json;
pub mod snapshot;
mod node;
mod codec;

pub use buffer::Buffer;
pub use codec::{Entries, Items};
pub use document::{BlobRef, Document};
pub use spec::ROOT;
pub use tron_common::{BufferConfig, DocConfig, JsonConfig, RootKind};
pub use value::{Value, ValueRef, ValueType};

use thiserror::Error;
use tron_common::TronError;

/// Lite3 操作的错误类型
///
/// 所有错误都是可恢复的：失败的操作不会改变 `buflen` 或任何节点状态。
#[derive(Error, Debug)]
pub enum Lite3Error {
    /// 缓冲区扩容无法取得内存(或已达到配置的最大容量)
    #[error("Allocation failed: cannot grow buffer to {requested} bytes")]
    AllocationFailed { requested: usize },

    /// 当前容量不足以完成本次写入；文档上下文会扩容后重试
    #[error("Buffer exhausted: need {need} bytes, have {have}")]
    BufferExhausted { need: usize, have: usize },

    /// 偏移越界、未对齐或该处不是节点
    #[error("Invalid offset: {offset} (buflen={buflen})")]
    InvalidOffset { offset: usize, buflen: usize },

    /// 节点或值的类型与请求的类型不符
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// 对象中不存在该键
    #[error("Key not found: {0:?}")]
    KeyNotFound(String),

    /// 数组下标越界
    #[error("Index {index} out of range (len={len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// 分离视图在文档被修改之后使用
    #[error("Stale reference: {0}")]
    StaleReference(String),

    /// JSON 文本或原始缓冲区数据不一致/被截断
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// 嵌套层级过深
    #[error("Nesting too deep: max {0}")]
    NestingTooDeep(usize),

    /// NaN / Infinity 无法用 JSON 表示
    #[error("Cannot encode non-finite float {0} as JSON")]
    NonFiniteFloat(f64),

    /// IO 操作错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 配置错误
    #[error(transparent)]
    Config(#[from] TronError),
}

/// Lite3 操作的 Result 类型别名
pub type Lite3Result<T> = Result<T, Lite3Error>;
