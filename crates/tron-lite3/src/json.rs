//! 文档与 JSON 互转模块
//!
//! JSON 文本经 `serde_json` 解析后写入文档，导出时反向进行。类型映射:
//! - 整数能放进 i64 的写为 `i64`，其余数字写为 `f64`
//! - `bytes` 导出为 Base64 (标准字母表) 字符串，再次导入时是普通字符串
//! - NaN / Infinity 无法表示，导出时返回 `NonFiniteFloat`
//!
//! 导出对象的键按字典序排列。

use crate::document::Document;
use crate::spec::ROOT;
use crate::value::Value;
use crate::{Lite3Error, Lite3Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use compact_str::CompactString;
use serde_json::{Map, Number, Value as JsonValue};
use std::fs;
use std::path::Path;
use tracing::{debug, trace};
use tron_common::DocConfig;

/// # Brief
/// 将自有值树转换为 JSON 值
///
/// # Arguments
/// * `value` - 要转换的值
///
/// # Returns
/// 成功返回 JSON 值；遇到非有限浮点数返回 NonFiniteFloat
pub fn to_json(value: &Value) -> Lite3Result<JsonValue> {
    match value {
        Value::Null => Ok(JsonValue::Null),
        Value::Bool(b) => Ok(JsonValue::Bool(*b)),
        Value::I64(n) => Ok(JsonValue::from(*n)),
        Value::F64(f) => Number::from_f64(*f)
            .map(JsonValue::Number)
            .ok_or(Lite3Error::NonFiniteFloat(*f)),
        Value::Bytes(b) => Ok(JsonValue::String(STANDARD.encode(b))),
        Value::String(s) => Ok(JsonValue::String(s.to_string())),
        Value::Object(map) => {
            let mut obj = Map::new();
            for (k, v) in map {
                obj.insert(k.to_string(), to_json(v)?);
            }
            Ok(JsonValue::Object(obj))
        }
        Value::Array(items) => items
            .iter()
            .map(to_json)
            .collect::<Lite3Result<Vec<_>>>()
            .map(JsonValue::Array),
    }
}

/// 将 JSON 值转换为自有值树
pub fn from_json(json: &JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::I64(i),
            // u64 超出 i64 范围时退化为 f64
            None => Value::F64(n.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(s) => Value::String(CompactString::from(s.as_str())),
        JsonValue::Array(items) => Value::Array(items.iter().map(from_json).collect()),
        JsonValue::Object(obj) => obj
            .iter()
            .map(|(k, v)| (k.as_str(), from_json(v)))
            .collect(),
    }
}

/// # Brief
/// 解析 JSON 文本并构建文档
///
/// # Arguments
/// * `text` - JSON 文本，顶层必须是对象或数组
/// * `config` - 文档配置，根类型由顶层值决定
pub fn decode(text: &str, config: &DocConfig) -> Lite3Result<Document> {
    let json: JsonValue = serde_json::from_str(text)
        .map_err(|e| Lite3Error::MalformedInput(format!("invalid JSON: {}", e)))?;
    if !(json.is_object() || json.is_array()) {
        return Err(Lite3Error::MalformedInput(
            "top-level JSON value must be an object or array".to_string(),
        ));
    }
    let doc = Document::from_value_with_config(&from_json(&json), config)?;
    debug!(
        input_len = text.len(),
        buflen = doc.buflen(),
        root = %doc.root_kind(),
        "decoded JSON document"
    );
    Ok(doc)
}

/// # Brief
/// 将文档中 `ofs` 处的容器编码为 JSON 文本
///
/// # Arguments
/// * `doc` - 文档
/// * `ofs` - 容器节点偏移
/// * `pretty` - 是否缩进输出
pub fn encode(doc: &Document, ofs: usize, pretty: bool) -> Lite3Result<String> {
    let json = to_json(&doc.to_value(ofs)?)?;
    trace!(ofs, pretty, "encoding JSON");
    let text = if pretty {
        serde_json::to_string_pretty(&json)
    } else {
        serde_json::to_string(&json)
    };
    text.map_err(|e| Lite3Error::MalformedInput(format!("JSON encoding failed: {}", e)))
}

impl Document {
    /// 从 JSON 文本创建文档
    pub fn from_json(text: &str) -> Lite3Result<Self> {
        decode(text, &DocConfig::default())
    }

    pub fn from_json_with_config(text: &str, config: &DocConfig) -> Lite3Result<Self> {
        decode(text, config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Lite3Result<Self> {
        decode(&fs::read_to_string(path)?, &DocConfig::default())
    }

    /// 将 `ofs` 处的容器编码为 JSON 文本
    pub fn to_json(&self, ofs: usize, pretty: bool) -> Lite3Result<String> {
        encode(self, ofs, pretty)
    }

    /// 将整个文档编码为紧凑 JSON
    pub fn to_json_string(&self) -> Lite3Result<String> {
        encode(self, ROOT, false)
    }
}
