//! 公共类型定义模块
//!
//! 定义文档根节点的类型 RootKind。

use crate::error::TronError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 文档根节点类型
///
/// 在文档初始化时确定，之后不会改变。只有两种合法取值:
/// - `object`
/// - `array`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RootKind {
    #[default]
    Object,
    Array,
}

impl RootKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RootKind::Object => "object",
            RootKind::Array => "array",
        }
    }
}

impl FromStr for RootKind {
    type Err = TronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "object" => Ok(RootKind::Object),
            "array" => Ok(RootKind::Array),
            other => Err(TronError::InvalidRootKind(other.to_string())),
        }
    }
}

impl fmt::Display for RootKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
