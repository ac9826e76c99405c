//! 值类型定义模块
//!
//! - [`ValueType`]: 对外暴露的八种类型名
//! - [`ValueRef`]: 从缓冲区读出的借用值，字符串/字节切片借用自文档
//! - [`Value`]: 脱离缓冲区的自有值树，用于整体导入/导出

use crate::spec::TypeTag;
use crate::{Lite3Error, Lite3Result};
use compact_str::CompactString;
use indexmap::IndexMap;
use std::fmt;
use std::str::FromStr;

/// 值的类型
///
/// 类型名恰好是这八个: `null, bool, i64, f64, bytes, string, object, array`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Null,
    Bool,
    I64,
    F64,
    Bytes,
    String,
    Object,
    Array,
}

impl ValueType {
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Null => "null",
            ValueType::Bool => "bool",
            ValueType::I64 => "i64",
            ValueType::F64 => "f64",
            ValueType::Bytes => "bytes",
            ValueType::String => "string",
            ValueType::Object => "object",
            ValueType::Array => "array",
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, ValueType::Object | ValueType::Array)
    }

    pub(crate) fn from_tag(tag: TypeTag) -> Self {
        match tag {
            TypeTag::Null => ValueType::Null,
            TypeTag::Bool => ValueType::Bool,
            TypeTag::I64 => ValueType::I64,
            TypeTag::F64 => ValueType::F64,
            TypeTag::Bytes => ValueType::Bytes,
            TypeTag::String => ValueType::String,
            TypeTag::Object => ValueType::Object,
            TypeTag::Array => ValueType::Array,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ValueType {
    type Err = Lite3Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "null" => Ok(ValueType::Null),
            "bool" => Ok(ValueType::Bool),
            "i64" => Ok(ValueType::I64),
            "f64" => Ok(ValueType::F64),
            "bytes" => Ok(ValueType::Bytes),
            "string" => Ok(ValueType::String),
            "object" => Ok(ValueType::Object),
            "array" => Ok(ValueType::Array),
            other => Err(Lite3Error::MalformedInput(format!(
                "unknown value type {:?}",
                other
            ))),
        }
    }
}

/// 缓冲区中的值
///
/// 字符串与字节切片借用自文档缓冲区，借用期间文档不可被修改。
/// 容器以节点偏移的形式返回，可直接用于后续调用。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueRef<'a> {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Bytes(&'a [u8]),
    Str(&'a str),
    Object(usize),
    Array(usize),
}

impl<'a> ValueRef<'a> {
    pub fn value_type(&self) -> ValueType {
        match self {
            ValueRef::Null => ValueType::Null,
            ValueRef::Bool(_) => ValueType::Bool,
            ValueRef::I64(_) => ValueType::I64,
            ValueRef::F64(_) => ValueType::F64,
            ValueRef::Bytes(_) => ValueType::Bytes,
            ValueRef::Str(_) => ValueType::String,
            ValueRef::Object(_) => ValueType::Object,
            ValueRef::Array(_) => ValueType::Array,
        }
    }

    fn mismatch(&self, expected: ValueType) -> Lite3Error {
        Lite3Error::TypeMismatch {
            expected: expected.name(),
            found: self.value_type().name(),
        }
    }

    pub fn as_bool(&self) -> Lite3Result<bool> {
        match self {
            ValueRef::Bool(b) => Ok(*b),
            other => Err(other.mismatch(ValueType::Bool)),
        }
    }

    pub fn as_i64(&self) -> Lite3Result<i64> {
        match self {
            ValueRef::I64(n) => Ok(*n),
            other => Err(other.mismatch(ValueType::I64)),
        }
    }

    pub fn as_f64(&self) -> Lite3Result<f64> {
        match self {
            ValueRef::F64(n) => Ok(*n),
            other => Err(other.mismatch(ValueType::F64)),
        }
    }

    pub fn as_bytes(&self) -> Lite3Result<&'a [u8]> {
        match self {
            ValueRef::Bytes(b) => Ok(b),
            other => Err(other.mismatch(ValueType::Bytes)),
        }
    }

    pub fn as_str(&self) -> Lite3Result<&'a str> {
        match self {
            ValueRef::Str(s) => Ok(s),
            other => Err(other.mismatch(ValueType::String)),
        }
    }

    pub fn as_object(&self) -> Lite3Result<usize> {
        match self {
            ValueRef::Object(ofs) => Ok(*ofs),
            other => Err(other.mismatch(ValueType::Object)),
        }
    }

    pub fn as_array(&self) -> Lite3Result<usize> {
        match self {
            ValueRef::Array(ofs) => Ok(*ofs),
            other => Err(other.mismatch(ValueType::Array)),
        }
    }
}

/// 自有值树
///
/// 对象使用 `IndexMap` 保持插入顺序；写入文档后键顺序由哈希槽位决定，
/// 因此比较两个 `Value` 时只比较键值关联，不比较顺序。
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Bytes(Vec<u8>),
    String(CompactString),
    Object(IndexMap<CompactString, Value>),
    Array(Vec<Value>),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::I64(_) => ValueType::I64,
            Value::F64(_) => ValueType::F64,
            Value::Bytes(_) => ValueType::Bytes,
            Value::String(_) => ValueType::String,
            Value::Object(_) => ValueType::Object,
            Value::Array(_) => ValueType::Array,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn object() -> Self {
        Value::Object(IndexMap::new())
    }

    pub fn array() -> Self {
        Value::Array(Vec::new())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I64(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(CompactString::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(CompactString::from(v))
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<K: Into<CompactString>> FromIterator<(K, Value)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Value::Object(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
