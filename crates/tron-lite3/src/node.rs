//! 节点布局与值单元解码
//!
//! 访问任何容器之前都要先经过 [`Node::load`] / [`Node::expect`] 验证：
//! 偏移必须对齐、整个节点头位于 `[0, buflen)` 内、类型标记为容器、
//! 保留字节为 0，并且槽位表完整落在已提交区域内。

use crate::buffer::{read_slice, read_u32, read_u64};
use crate::spec::{
    slot_size, TypeTag, BLOB_HEADER_SIZE, CELL_SIZE, NODE_ALIGNMENT, NODE_SIZE, OBJ_SLOT_CELL,
};
use crate::value::{ValueRef, ValueType};
use crate::{Lite3Error, Lite3Result};

pub(crate) const HDR_LEN: usize = 4;
pub(crate) const HDR_CAP: usize = 8;
pub(crate) const HDR_TABLE: usize = 12;

/// 已验证的节点头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Node {
    pub ofs: usize,
    pub tag: TypeTag,
    pub len: u32,
    pub cap: u32,
    pub table: usize,
}

impl Node {
    /// 读取并验证任意容器节点
    pub fn load(data: &[u8], ofs: usize) -> Lite3Result<Node> {
        let invalid = || Lite3Error::InvalidOffset {
            offset: ofs,
            buflen: data.len(),
        };
        if ofs % NODE_ALIGNMENT != 0 {
            return Err(invalid());
        }
        let header = read_slice(data, ofs, NODE_SIZE).map_err(|_| invalid())?;
        let tag = match TypeTag::from_u8(header[0]) {
            Some(tag) if tag.is_container() => tag,
            _ => return Err(invalid()),
        };
        if header[1..4] != [0, 0, 0] {
            return Err(invalid());
        }
        let node = Node {
            ofs,
            tag,
            len: read_u32(header, HDR_LEN)?,
            cap: read_u32(header, HDR_CAP)?,
            table: read_u32(header, HDR_TABLE)? as usize,
        };
        node.check_table(data.len())?;
        Ok(node)
    }

    /// 读取节点并要求其类型为 `kind`
    pub fn expect(data: &[u8], ofs: usize, kind: TypeTag) -> Lite3Result<Node> {
        let node = Self::load(data, ofs)?;
        if node.tag != kind {
            return Err(Lite3Error::TypeMismatch {
                expected: ValueType::from_tag(kind).name(),
                found: node.kind().name(),
            });
        }
        Ok(node)
    }

    fn check_table(&self, buflen: usize) -> Lite3Result<()> {
        let corrupt = |why: &str| {
            Lite3Error::MalformedInput(format!("node at offset {}: {}", self.ofs, why))
        };
        if self.len > self.cap {
            return Err(corrupt("len exceeds cap"));
        }
        if self.cap == 0 {
            if self.table != 0 {
                return Err(corrupt("empty node with a slot table"));
            }
            return Ok(());
        }
        if self.tag == TypeTag::Object && !self.cap.is_power_of_two() {
            return Err(corrupt("object capacity is not a power of two"));
        }
        if self.table % NODE_ALIGNMENT != 0 || self.table < self.ofs + NODE_SIZE {
            return Err(corrupt("misplaced slot table"));
        }
        let end = (self.cap as usize)
            .checked_mul(slot_size(self.tag))
            .and_then(|n| n.checked_add(self.table));
        match end {
            Some(end) if end <= buflen => Ok(()),
            _ => Err(corrupt("slot table exceeds buffer")),
        }
    }

    pub fn kind(&self) -> ValueType {
        ValueType::from_tag(self.tag)
    }

    pub fn slot_ofs(&self, index: u32) -> usize {
        self.table + index as usize * slot_size(self.tag)
    }

    /// 第 `index` 个槽位中值单元的偏移
    pub fn cell_ofs(&self, index: u32) -> usize {
        match self.tag {
            TypeTag::Object => self.slot_ofs(index) + OBJ_SLOT_CELL,
            _ => self.slot_ofs(index),
        }
    }
}

/// 未解码的值单元
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RawCell {
    pub tag: TypeTag,
    pub len: u32,
    pub payload: u64,
}

impl RawCell {
    pub fn read(data: &[u8], ofs: usize) -> Lite3Result<RawCell> {
        let raw = read_slice(data, ofs, CELL_SIZE)
            .map_err(|_| corrupt_at("value cell", ofs))?;
        let tag = TypeTag::from_u8(raw[0]).ok_or_else(|| {
            Lite3Error::MalformedInput(format!("invalid type tag {:#04x} at offset {}", raw[0], ofs))
        })?;
        Ok(RawCell {
            tag,
            len: read_u32(raw, 4)?,
            payload: read_u64(raw, 8)?,
        })
    }

    /// 载荷作为缓冲区偏移
    pub fn target(&self) -> usize {
        self.payload as usize
    }

    pub fn decode<'a>(&self, data: &'a [u8]) -> Lite3Result<ValueRef<'a>> {
        Ok(match self.tag {
            TypeTag::Null => ValueRef::Null,
            TypeTag::Bool => ValueRef::Bool(self.payload != 0),
            TypeTag::I64 => ValueRef::I64(self.payload as i64),
            TypeTag::F64 => ValueRef::F64(f64::from_bits(self.payload)),
            TypeTag::Bytes => ValueRef::Bytes(read_blob(data, self.target(), Some(self.len))?),
            TypeTag::String => {
                let bytes = read_blob(data, self.target(), Some(self.len))?;
                ValueRef::Str(utf8(bytes, self.target())?)
            }
            TypeTag::Object => ValueRef::Object(self.target()),
            TypeTag::Array => ValueRef::Array(self.target()),
        })
    }
}

/// # Brief
/// 读取长度前缀数据区
///
/// # Arguments
/// * `data` - 已提交区域
/// * `ofs` - 数据区偏移
/// * `expected` - 值单元中记录的长度，需与前缀一致
pub(crate) fn read_blob(data: &[u8], ofs: usize, expected: Option<u32>) -> Lite3Result<&[u8]> {
    if ofs % NODE_ALIGNMENT != 0 {
        return Err(corrupt_at("misaligned data region", ofs));
    }
    let len = read_u32(data, ofs).map_err(|_| corrupt_at("data region", ofs))?;
    if let Some(expected) = expected {
        if len != expected {
            return Err(Lite3Error::MalformedInput(format!(
                "data region at offset {} has length {}, slot says {}",
                ofs, len, expected
            )));
        }
    }
    read_slice(data, ofs + BLOB_HEADER_SIZE, len as usize)
        .map_err(|_| corrupt_at("data region", ofs))
}

pub(crate) fn utf8(bytes: &[u8], ofs: usize) -> Lite3Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| {
        Lite3Error::MalformedInput(format!("invalid UTF-8 at offset {}: {}", ofs, e))
    })
}

fn corrupt_at(what: &str, ofs: usize) -> Lite3Error {
    Lite3Error::MalformedInput(format!("{} at offset {} is out of bounds", what, ofs))
}
