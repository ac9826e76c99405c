//! 带校验的文档快照
//!
//! 原始缓冲区字节本身没有任何完整性信息。需要落盘或跨进程传输时，
//! 用 [`seal`] 在外面包一层帧：
//!
//! ```text
//! [0..4]    魔数 "LIT3"
//! [4]       版本
//! [5]       根类型 (0 = object, 1 = array)
//! [6..8]    保留, 为 0
//! [8..12]   载荷长度 (u32 LE)
//! [12..]    载荷 (文档已提交字节)
//! [末尾 8]  xxHash3 校验和, 覆盖 [4..载荷末尾]
//! ```

use crate::document::Document;
use crate::{Lite3Error, Lite3Result};
use bytes::{Buf, BufMut, BytesMut};
use tron_common::{DocConfig, RootKind};
use xxhash_rust::xxh3::xxh3_64;

pub const SNAPSHOT_MAGIC: [u8; 4] = *b"LIT3";
pub const SNAPSHOT_VERSION: u8 = 1;

const HEADER_SIZE: usize = 12;
const CHECKSUM_SIZE: usize = 8;

fn root_byte(root: RootKind) -> u8 {
    match root {
        RootKind::Object => 0,
        RootKind::Array => 1,
    }
}

/// # Brief
/// 将文档封装为带魔数、版本和 xxHash3 校验和的快照
///
/// # Arguments
/// * `doc` - 要封装的文档
///
/// # Returns
/// 快照字节
pub fn seal(doc: &Document) -> Vec<u8> {
    let payload = doc.as_bytes();
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len() + CHECKSUM_SIZE);
    buf.put_slice(&SNAPSHOT_MAGIC);
    buf.put_u8(SNAPSHOT_VERSION);
    buf.put_u8(root_byte(doc.root_kind()));
    buf.put_u16_le(0);
    buf.put_u32_le(payload.len() as u32);
    buf.put_slice(payload);
    let checksum = xxh3_64(&buf[4..]);
    buf.put_u64_le(checksum);
    buf.to_vec()
}

/// 使用默认配置解封快照
pub fn unseal(data: &[u8]) -> Lite3Result<Document> {
    unseal_with_config(data, &DocConfig::default())
}

/// # Brief
/// 校验快照帧并加载其中的文档
///
/// # Arguments
/// * `data` - [`seal`] 产生的字节
/// * `config` - 加载使用的配置
///
/// # Returns
/// 魔数、版本、长度、校验和或根类型任一不符都返回 MalformedInput
pub fn unseal_with_config(data: &[u8], config: &DocConfig) -> Lite3Result<Document> {
    if data.len() < HEADER_SIZE + CHECKSUM_SIZE {
        return Err(Lite3Error::MalformedInput(format!(
            "snapshot too short: {} bytes",
            data.len()
        )));
    }
    let mut header = &data[..HEADER_SIZE];
    let mut magic = [0u8; 4];
    header.copy_to_slice(&mut magic);
    if magic != SNAPSHOT_MAGIC {
        return Err(Lite3Error::MalformedInput("invalid snapshot magic".to_string()));
    }
    let version = header.get_u8();
    if version != SNAPSHOT_VERSION {
        return Err(Lite3Error::MalformedInput(format!(
            "unsupported snapshot version: {}",
            version
        )));
    }
    let root = match header.get_u8() {
        0 => RootKind::Object,
        1 => RootKind::Array,
        other => {
            return Err(Lite3Error::MalformedInput(format!(
                "invalid root kind byte: {}",
                other
            )))
        }
    };
    header.advance(2);
    let payload_len = header.get_u32_le() as usize;
    if data.len() - HEADER_SIZE - CHECKSUM_SIZE != payload_len {
        return Err(Lite3Error::MalformedInput(format!(
            "snapshot payload length {} does not match frame size {}",
            payload_len,
            data.len()
        )));
    }

    let checksum_ofs = HEADER_SIZE + payload_len;
    let mut trailer = &data[checksum_ofs..];
    let stored = trailer.get_u64_le();
    if stored != xxh3_64(&data[4..checksum_ofs]) {
        return Err(Lite3Error::MalformedInput("snapshot checksum mismatch".to_string()));
    }

    let doc = Document::from_bytes_with_config(&data[HEADER_SIZE..checksum_ofs], config)?;
    if doc.root_kind() != root {
        return Err(Lite3Error::MalformedInput(format!(
            "snapshot header says {} root, payload has {}",
            root,
            doc.root_kind()
        )));
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ROOT;

    #[test]
    fn test_seal_unseal() {
        let mut doc = Document::new(RootKind::Array).unwrap();
        doc.arr_append_str(ROOT, "snapshot").unwrap();
        doc.arr_append_i64(ROOT, 7).unwrap();

        let sealed = seal(&doc);
        assert_eq!(&sealed[..4], b"LIT3");
        assert_eq!(sealed.len(), HEADER_SIZE + doc.buflen() + CHECKSUM_SIZE);

        let loaded = unseal(&sealed).unwrap();
        assert_eq!(loaded.root_kind(), RootKind::Array);
        assert_eq!(loaded.as_bytes(), doc.as_bytes());
        assert_eq!(loaded.arr_get_str(ROOT, 0).unwrap(), "snapshot");
    }

    #[test]
    fn test_detects_corruption() {
        let mut doc = Document::new(RootKind::Object).unwrap();
        doc.set_i64(ROOT, "n", 42).unwrap();
        let mut sealed = seal(&doc);
        let mid = sealed.len() / 2;
        sealed[mid] ^= 0xFF;
        assert!(matches!(unseal(&sealed), Err(Lite3Error::MalformedInput(_))));
    }

    #[test]
    fn test_rejects_bad_frame() {
        let doc = Document::new(RootKind::Object).unwrap();
        let sealed = seal(&doc);

        let mut bad_magic = sealed.clone();
        bad_magic[0] = b'X';
        assert!(unseal(&bad_magic).is_err());

        let mut bad_version = sealed.clone();
        bad_version[4] = 9;
        assert!(unseal(&bad_version).is_err());

        assert!(unseal(&sealed[..sealed.len() - 1]).is_err());
        assert!(unseal(&[0u8; 4]).is_err());
    }
}
