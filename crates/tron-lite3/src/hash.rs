//! 键哈希
//!
//! 对象槽位使用带种子的 DJB2 哈希定位。哈希值会持久化在槽位中，
//! 因此算法和种子都属于二进制格式的一部分。哈希相等只作为过滤条件，
//! 命中必须再做一次键的逐字节比较。

use crate::spec::DJB2_HASH_SEED;

/// 计算键的 DJB2 哈希 (`h = h * 33 + b`, 32 位回绕)
#[inline]
#[must_use]
pub fn key_hash(key: &[u8]) -> u32 {
    djb2(key, DJB2_HASH_SEED)
}

#[inline]
#[must_use]
pub fn djb2(data: &[u8], seed: u32) -> u32 {
    data.iter().fold(seed, |h, &b| {
        (h << 5).wrapping_add(h).wrapping_add(b as u32)
    })
}
