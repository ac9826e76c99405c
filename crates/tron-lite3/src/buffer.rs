//! 可增长字节缓冲区
//!
//! 缓冲区维护两个尺寸：
//! - `buflen`: 已提交字节的高水位线，文档中所有有效偏移都小于它
//! - `bufsz`: 当前总容量
//!
//! 扩容会重新分配内存并按原偏移复制已有字节，因此**偏移稳定，裸地址不稳定**。
//! 所有分配都在尾部进行并对齐到 [`NODE_ALIGNMENT`]，新分配的字节(包括对齐填充)
//! 一律清零。

use crate::spec::{NODE_ALIGNMENT, ZERO_MEM_8};
use crate::{Lite3Error, Lite3Result};
use tracing::{debug, trace};
use tron_common::config::MIN_BUFFER_CAPACITY;
use tron_common::BufferConfig;

/// 文档缓冲区
#[derive(Debug, Clone)]
pub struct Buffer {
    /// `data.len()` 即 `bufsz`
    data: Vec<u8>,
    len: usize,
    max_capacity: usize,
    growth_factor: usize,
}

impl Buffer {
    /// # Brief
    /// 按配置创建空缓冲区
    ///
    /// # Arguments
    /// * `config` - 缓冲区配置
    ///
    /// # Returns
    /// 容量为 `initial_capacity`、`buflen` 为 0 的缓冲区
    pub fn new(config: &BufferConfig) -> Lite3Result<Self> {
        config.validate()?;
        let mut data = Vec::new();
        data.try_reserve_exact(config.initial_capacity)
            .map_err(|_| Lite3Error::AllocationFailed {
                requested: config.initial_capacity,
            })?;
        data.resize(config.initial_capacity, ZERO_MEM_8);
        Ok(Self {
            data,
            len: 0,
            max_capacity: config.max_capacity,
            growth_factor: config.growth_factor,
        })
    }

    pub fn with_capacity(capacity: usize) -> Lite3Result<Self> {
        Self::new(&BufferConfig::with_initial_capacity(capacity))
    }

    /// # Brief
    /// 接管外部提供的字节作为已提交区域
    ///
    /// # Arguments
    /// * `bytes` - 已提交的数据，`buflen = bytes.len()`
    /// * `config` - 后续扩容使用的配置
    pub fn from_bytes(bytes: &[u8], config: &BufferConfig) -> Lite3Result<Self> {
        config.validate()?;
        if bytes.len() > config.max_capacity {
            return Err(Lite3Error::AllocationFailed {
                requested: bytes.len(),
            });
        }
        let mut data = Vec::new();
        data.try_reserve_exact(bytes.len())
            .map_err(|_| Lite3Error::AllocationFailed {
                requested: bytes.len(),
            })?;
        data.extend_from_slice(bytes);
        Ok(Self {
            data,
            len: bytes.len(),
            max_capacity: config.max_capacity,
            growth_factor: config.growth_factor,
        })
    }

    /// 已提交字节数 (`buflen`)
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 总容量 (`bufsz`)
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn spare(&self) -> usize {
        self.data.len() - self.len
    }

    /// 已提交区域
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// # Brief
    /// 按增长倍数扩大容量，已提交字节保持原偏移
    ///
    /// # Returns
    /// 成功返回 Ok(()); 已达最大容量或内存分配失败返回 AllocationFailed，
    /// 此时缓冲区保持原容量可继续使用
    pub fn grow(&mut self) -> Lite3Result<()> {
        let old = self.data.len();
        let requested = old
            .max(MIN_BUFFER_CAPACITY)
            .saturating_mul(self.growth_factor);
        let target = requested.min(self.max_capacity);
        if target <= old {
            return Err(Lite3Error::AllocationFailed { requested });
        }
        self.data
            .try_reserve_exact(target - old)
            .map_err(|_| Lite3Error::AllocationFailed { requested: target })?;
        self.data.resize(target, ZERO_MEM_8);
        debug!(from = old, to = target, buflen = self.len, "buffer grown");
        Ok(())
    }

    /// 将 `buflen` 前移 `n` 字节
    pub fn commit(&mut self, n: usize) -> Lite3Result<()> {
        self.ensure_spare(n)?;
        self.len += n;
        Ok(())
    }

    pub fn ensure_spare(&self, need: usize) -> Lite3Result<()> {
        let have = self.spare();
        if need > have {
            return Err(Lite3Error::BufferExhausted { need, have });
        }
        Ok(())
    }

    /// 用指定字节填充未提交区域
    pub fn fill_spare(&mut self, byte: u8) {
        let len = self.len;
        self.data[len..].fill(byte);
    }

    /// # Brief
    /// 在尾部分配 `size` 字节(必须已对齐)，清零后提交
    ///
    /// # Returns
    /// 新区域的偏移
    pub(crate) fn alloc(&mut self, size: usize) -> Lite3Result<usize> {
        debug_assert_eq!(size % NODE_ALIGNMENT, 0);
        self.ensure_spare(size)?;
        let ofs = self.len;
        self.data[ofs..ofs + size].fill(ZERO_MEM_8);
        self.commit(size)?;
        trace!(ofs, size, "tail allocation");
        Ok(ofs)
    }

    /// 丢弃 `len` 之后的已提交字节
    pub(crate) fn truncate(&mut self, len: usize) {
        if len < self.len {
            self.len = len;
        }
    }

    pub(crate) fn slice_mut(&mut self, ofs: usize, n: usize) -> Lite3Result<&mut [u8]> {
        let range = checked_range(ofs, n, self.len)?;
        Ok(&mut self.data[range])
    }

    pub(crate) fn write(&mut self, ofs: usize, bytes: &[u8]) -> Lite3Result<()> {
        self.slice_mut(ofs, bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    pub(crate) fn write_u32(&mut self, ofs: usize, value: u32) -> Lite3Result<()> {
        self.write(ofs, &value.to_le_bytes())
    }

    /// 在已提交区域内复制 `n` 字节
    pub(crate) fn copy_within(&mut self, src: usize, dest: usize, n: usize) -> Lite3Result<()> {
        let range = checked_range(src, n, self.len)?;
        checked_range(dest, n, self.len)?;
        self.data.copy_within(range, dest);
        Ok(())
    }
}

fn checked_range(ofs: usize, n: usize, buflen: usize) -> Lite3Result<std::ops::Range<usize>> {
    match ofs.checked_add(n) {
        Some(end) if end <= buflen => Ok(ofs..end),
        _ => Err(Lite3Error::InvalidOffset {
            offset: ofs,
            buflen,
        }),
    }
}

/// 读取已提交区域中的一段字节
#[inline]
pub(crate) fn read_slice(data: &[u8], ofs: usize, n: usize) -> Lite3Result<&[u8]> {
    let range = checked_range(ofs, n, data.len())?;
    Ok(&data[range])
}

#[inline]
pub(crate) fn read_u32(data: &[u8], ofs: usize) -> Lite3Result<u32> {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(read_slice(data, ofs, 4)?);
    Ok(u32::from_le_bytes(buf))
}

#[inline]
pub(crate) fn read_u64(data: &[u8], ofs: usize) -> Lite3Result<u64> {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(read_slice(data, ofs, 8)?);
    Ok(u64::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_empty() {
        let buf = Buffer::with_capacity(256).unwrap();
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.capacity(), 256);
        assert!(buf.as_slice().is_empty());
    }

    #[test]
    fn test_alloc_and_commit() {
        let mut buf = Buffer::with_capacity(64).unwrap();
        let a = buf.alloc(16).unwrap();
        let b = buf.alloc(8).unwrap();
        assert_eq!((a, b), (0, 16));
        assert_eq!(buf.len(), 24);
        buf.commit(8).unwrap();
        assert_eq!(buf.len(), 32);
    }

    #[test]
    fn test_exhaustion_leaves_buffer_untouched() {
        let mut buf = Buffer::with_capacity(64).unwrap();
        buf.alloc(60).unwrap();
        let err = buf.alloc(8).unwrap_err();
        assert!(matches!(err, Lite3Error::BufferExhausted { need: 8, have: 4 }));
        assert_eq!(buf.len(), 60);
    }

    #[test]
    fn test_grow_preserves_offsets() {
        let mut buf = Buffer::with_capacity(64).unwrap();
        let ofs = buf.alloc(8).unwrap();
        buf.write(ofs, b"lite3!!!").unwrap();
        buf.grow().unwrap();
        assert_eq!(buf.capacity(), 128);
        assert_eq!(read_slice(buf.as_slice(), ofs, 8).unwrap(), b"lite3!!!");
    }

    #[test]
    fn test_grow_respects_max_capacity() {
        let config = BufferConfig {
            initial_capacity: 64,
            max_capacity: 100,
            growth_factor: 2,
        };
        let mut buf = Buffer::new(&config).unwrap();
        buf.grow().unwrap();
        assert_eq!(buf.capacity(), 100);
        let err = buf.grow().unwrap_err();
        assert!(matches!(err, Lite3Error::AllocationFailed { .. }));
        assert_eq!(buf.capacity(), 100);
    }

    #[test]
    fn test_alloc_zeroes_dirty_spare() {
        let mut buf = Buffer::with_capacity(64).unwrap();
        buf.fill_spare(0xEE);
        let ofs = buf.alloc(16).unwrap();
        assert!(read_slice(buf.as_slice(), ofs, 16)
            .unwrap()
            .iter()
            .all(|&b| b == ZERO_MEM_8));
    }

    #[test]
    fn test_from_bytes_adopts_data() {
        let buf = Buffer::from_bytes(&[1, 2, 3, 4], &BufferConfig::default()).unwrap();
        assert_eq!(buf.len(), 4);
        assert_eq!(buf.capacity(), 4);
        assert_eq!(read_u32(buf.as_slice(), 0).unwrap(), 0x0403_0201);
    }

    #[test]
    fn test_out_of_range_reads_fail() {
        let buf = Buffer::from_bytes(&[0; 8], &BufferConfig::default()).unwrap();
        assert!(read_u32(buf.as_slice(), 6).is_err());
        assert!(read_u64(buf.as_slice(), usize::MAX).is_err());
    }
}
