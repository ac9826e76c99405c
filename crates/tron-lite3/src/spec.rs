//! Lite3 二进制布局常量
//!
//! 所有多字节整数均为小端序。所有分配按 [`NODE_ALIGNMENT`] 对齐，
//! 对齐填充字节一律写入 [`ZERO_MEM_8`]。
//!
//! ```text
//! 节点 (NODE_SIZE = 16)
//!   [0]      类型标记 (TypeTag::Object / TypeTag::Array)
//!   [1..4]   保留, 必须为 0
//!   [4..8]   len    已用槽位数
//!   [8..12]  cap    槽位表容量
//!   [12..16] table  槽位表偏移 (cap == 0 时为 0)
//!
//! 值单元 (CELL_SIZE = 16)
//!   [0]      类型标记
//!   [1..4]   保留, 必须为 0
//!   [4..8]   bytes/string 的长度, 其余类型为 0
//!   [8..16]  载荷: bool / i64 / f64 内联; bytes/string 为数据区偏移; object/array 为节点偏移
//!
//! 对象槽位 (OBJ_SLOT_SIZE = 24)
//!   [0..4]   键哈希
//!   [4..8]   键数据区偏移 (0 表示空桶)
//!   [8..24]  值单元
//!
//! 数组槽位 (ARR_SLOT_SIZE = 16) = 值单元
//!
//! 数据区 (键 / bytes / string)
//!   [0..4]   长度 n
//!   [4..4+n] 数据, 之后补零至对齐边界
//! ```

pub const NODE_SIZE: usize = 16;
pub const NODE_ALIGNMENT: usize = 4;
pub const CELL_SIZE: usize = 16;
pub const OBJ_SLOT_SIZE: usize = 24;
pub const ARR_SLOT_SIZE: usize = CELL_SIZE;
pub const OBJ_SLOT_CELL: usize = 8;
pub const BLOB_HEADER_SIZE: usize = 4;

/// 对象槽位表的初始容量 (必须是 2 的幂)
pub const INITIAL_OBJ_SLOTS: u32 = 8;
/// 数组槽位表的初始容量
pub const INITIAL_ARR_SLOTS: u32 = 4;

/// DJB2 哈希种子。修改即为不兼容的格式变更。
pub const DJB2_HASH_SEED: u32 = 5381;

pub const ZERO_MEM_8: u8 = 0x00;

/// 根节点所在偏移
pub const ROOT: usize = 0;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Null = 0x00,
    Bool = 0x01,
    I64 = 0x02,
    F64 = 0x03,
    Bytes = 0x04,
    String = 0x05,
    Object = 0x06,
    Array = 0x07,
}

impl TypeTag {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Null),
            0x01 => Some(Self::Bool),
            0x02 => Some(Self::I64),
            0x03 => Some(Self::F64),
            0x04 => Some(Self::Bytes),
            0x05 => Some(Self::String),
            0x06 => Some(Self::Object),
            0x07 => Some(Self::Array),
            _ => None,
        }
    }

    pub fn is_container(self) -> bool {
        matches!(self, Self::Object | Self::Array)
    }

    pub fn is_blob(self) -> bool {
        matches!(self, Self::Bytes | Self::String)
    }
}

/// 向上对齐到 [`NODE_ALIGNMENT`]
#[inline]
pub fn align_up(n: usize) -> usize {
    (n + NODE_ALIGNMENT - 1) & !(NODE_ALIGNMENT - 1)
}

/// 存放 `len` 字节数据所需的数据区大小(含长度前缀和对齐填充)
#[inline]
pub fn blob_size(len: usize) -> usize {
    align_up(BLOB_HEADER_SIZE + len)
}

#[inline]
pub fn slot_size(tag: TypeTag) -> usize {
    match tag {
        TypeTag::Object => OBJ_SLOT_SIZE,
        _ => ARR_SLOT_SIZE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip() {
        for byte in 0x00..=0x07 {
            assert_eq!(TypeTag::from_u8(byte).unwrap() as u8, byte);
        }
        assert!(TypeTag::from_u8(0x08).is_none());
        assert!(TypeTag::from_u8(0xFF).is_none());
    }

    #[test]
    fn test_blob_size_is_aligned() {
        assert_eq!(blob_size(0), 4);
        assert_eq!(blob_size(1), 8);
        assert_eq!(blob_size(4), 8);
        assert_eq!(blob_size(5), 12);
        assert_eq!(NODE_SIZE % NODE_ALIGNMENT, 0);
        assert_eq!(OBJ_SLOT_SIZE % NODE_ALIGNMENT, 0);
    }
}
