//! 值编解码
//!
//! 在节点和偏移之上读写每种值类型。编解码层本身从不扩容：
//! 每个写操作先计算本次需要的全部尾部空间，不足时返回
//! [`Lite3Error::BufferExhausted`] 且不做任何写入，由文档上下文扩容后重试。
//!
//! 对象槽位表是开放寻址哈希表(线性探测，容量为 2 的幂，装载因子上限 3/4)，
//! 键数据区偏移为 0 表示空桶。数组槽位表是按插入顺序排列的稠密表，
//! 写满后在尾部重新分配双倍容量并整体复制，逻辑下标不变。

use crate::buffer::{read_u32, Buffer};
use crate::hash::key_hash;
use crate::node::{read_blob, utf8, Node, RawCell, HDR_CAP, HDR_LEN, HDR_TABLE};
use crate::spec::{
    blob_size, TypeTag, ARR_SLOT_SIZE, CELL_SIZE, INITIAL_ARR_SLOTS, INITIAL_OBJ_SLOTS,
    NODE_SIZE, OBJ_SLOT_CELL, OBJ_SLOT_SIZE,
};
use crate::value::ValueRef;
use crate::{Lite3Error, Lite3Result};

/// 待写入的值
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Input<'a> {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Bytes(&'a [u8]),
    Str(&'a str),
    Object,
    Array,
}

impl Input<'_> {
    /// 写入该值需要的尾部空间
    fn tail_need(&self) -> Lite3Result<usize> {
        match self {
            Input::Bytes(b) => blob_need(b.len()),
            Input::Str(s) => blob_need(s.len()),
            Input::Object | Input::Array => Ok(NODE_SIZE),
            _ => Ok(0),
        }
    }
}

fn blob_need(len: usize) -> Lite3Result<usize> {
    if len > u32::MAX as usize - CELL_SIZE {
        return Err(Lite3Error::AllocationFailed { requested: len });
    }
    Ok(blob_size(len))
}

fn sum_need(parts: &[usize]) -> Lite3Result<usize> {
    parts
        .iter()
        .try_fold(0usize, |acc, &n| acc.checked_add(n))
        .ok_or(Lite3Error::AllocationFailed { requested: usize::MAX })
}

fn doubled(cap: u32, initial: u32) -> Lite3Result<u32> {
    if cap == 0 {
        return Ok(initial);
    }
    cap.checked_mul(2).ok_or(Lite3Error::AllocationFailed {
        requested: usize::MAX,
    })
}

/// 在尾部写入长度前缀数据区
fn write_blob(buf: &mut Buffer, bytes: &[u8]) -> Lite3Result<usize> {
    let ofs = buf.alloc(blob_size(bytes.len()))?;
    buf.write_u32(ofs, bytes.len() as u32)?;
    buf.write(ofs + 4, bytes)?;
    Ok(ofs)
}

/// 在尾部创建一个空容器节点
pub(crate) fn new_node(buf: &mut Buffer, tag: TypeTag) -> Lite3Result<usize> {
    let ofs = buf.alloc(NODE_SIZE)?;
    buf.write(ofs, &[tag as u8])?;
    Ok(ofs)
}

/// # Brief
/// 写入值单元，必要时在尾部分配数据区或子节点
///
/// # Returns
/// 容器返回新节点偏移，其他类型返回 0
fn write_cell(buf: &mut Buffer, cell: usize, input: Input<'_>) -> Lite3Result<usize> {
    let (tag, len, payload, created) = match input {
        Input::Null => (TypeTag::Null, 0, 0, 0),
        Input::Bool(b) => (TypeTag::Bool, 0, b as u64, 0),
        Input::I64(n) => (TypeTag::I64, 0, n as u64, 0),
        Input::F64(f) => (TypeTag::F64, 0, f.to_bits(), 0),
        Input::Bytes(b) => {
            let ofs = write_blob(buf, b)?;
            (TypeTag::Bytes, b.len() as u32, ofs as u64, 0)
        }
        Input::Str(s) => {
            let ofs = write_blob(buf, s.as_bytes())?;
            (TypeTag::String, s.len() as u32, ofs as u64, 0)
        }
        Input::Object => {
            let ofs = new_node(buf, TypeTag::Object)?;
            (TypeTag::Object, 0, ofs as u64, ofs)
        }
        Input::Array => {
            let ofs = new_node(buf, TypeTag::Array)?;
            (TypeTag::Array, 0, ofs as u64, ofs)
        }
    };
    let mut raw = [0u8; CELL_SIZE];
    raw[0] = tag as u8;
    raw[4..8].copy_from_slice(&len.to_le_bytes());
    raw[8..16].copy_from_slice(&payload.to_le_bytes());
    buf.write(cell, &raw)?;
    Ok(created)
}

// ============================================================================
// 对象
// ============================================================================

#[inline]
fn over_load_factor(len: u32, cap: u32) -> bool {
    (len as u64 + 1) * 4 > cap as u64 * 3
}

/// 查找键所在的槽位下标
pub(crate) fn obj_find(data: &[u8], node: &Node, key: &str) -> Lite3Result<Option<u32>> {
    if node.cap == 0 {
        return Ok(None);
    }
    let hash = key_hash(key.as_bytes());
    let mask = node.cap - 1;
    let mut idx = hash & mask;
    for _ in 0..node.cap {
        let slot = node.slot_ofs(idx);
        let key_ofs = read_u32(data, slot + 4)? as usize;
        if key_ofs == 0 {
            return Ok(None);
        }
        if read_u32(data, slot)? == hash && read_blob(data, key_ofs, None)? == key.as_bytes() {
            return Ok(Some(idx));
        }
        idx = (idx + 1) & mask;
    }
    Ok(None)
}

/// 找到哈希 `hash` 对应的第一个空桶
fn probe_empty(data: &[u8], node: &Node, hash: u32) -> Lite3Result<u32> {
    let mask = node.cap - 1;
    let mut idx = hash & mask;
    for _ in 0..node.cap {
        if read_u32(data, node.slot_ofs(idx) + 4)? == 0 {
            return Ok(idx);
        }
        idx = (idx + 1) & mask;
    }
    Err(Lite3Error::MalformedInput(format!(
        "object at offset {} has no free slot",
        node.ofs
    )))
}

/// 在尾部分配新槽位表并重新散列所有已占用槽位
fn obj_rehash(buf: &mut Buffer, node: Node, new_cap: u32) -> Lite3Result<Node> {
    let table = buf.alloc(new_cap as usize * OBJ_SLOT_SIZE)?;
    let grown = Node {
        cap: new_cap,
        table,
        ..node
    };
    for i in 0..node.cap {
        let slot = node.slot_ofs(i);
        if read_u32(buf.as_slice(), slot + 4)? == 0 {
            continue;
        }
        let hash = read_u32(buf.as_slice(), slot)?;
        let idx = probe_empty(buf.as_slice(), &grown, hash)?;
        buf.copy_within(slot, grown.slot_ofs(idx), OBJ_SLOT_SIZE)?;
    }
    buf.write_u32(node.ofs + HDR_CAP, new_cap)?;
    buf.write_u32(node.ofs + HDR_TABLE, table as u32)?;
    Ok(grown)
}

/// 查找键，未命中返回 None
pub(crate) fn obj_lookup(data: &[u8], ofs: usize, key: &str) -> Lite3Result<Option<RawCell>> {
    let node = Node::expect(data, ofs, TypeTag::Object)?;
    match obj_find(data, &node, key)? {
        Some(idx) => Ok(Some(RawCell::read(data, node.cell_ofs(idx))?)),
        None => Ok(None),
    }
}

pub(crate) fn obj_get(data: &[u8], ofs: usize, key: &str) -> Lite3Result<RawCell> {
    obj_lookup(data, ofs, key)?.ok_or_else(|| Lite3Error::KeyNotFound(key.to_string()))
}

/// # Brief
/// 插入或覆盖对象中的键
///
/// # Arguments
/// * `buf` - 文档缓冲区
/// * `ofs` - 对象节点偏移
/// * `key` - 键
/// * `input` - 要写入的值
///
/// # Returns
/// 写入容器时返回新节点偏移，否则返回 0。空间不足返回 BufferExhausted 且缓冲区不变
pub(crate) fn obj_set(buf: &mut Buffer, ofs: usize, key: &str, input: Input<'_>) -> Lite3Result<usize> {
    let node = Node::expect(buf.as_slice(), ofs, TypeTag::Object)?;
    let value_need = input.tail_need()?;

    if let Some(idx) = obj_find(buf.as_slice(), &node, key)? {
        buf.ensure_spare(value_need)?;
        return write_cell(buf, node.cell_ofs(idx), input);
    }

    let new_cap = if over_load_factor(node.len, node.cap) {
        Some(doubled(node.cap, INITIAL_OBJ_SLOTS)?)
    } else {
        None
    };
    let table_need = new_cap.map_or(0, |cap| cap as usize * OBJ_SLOT_SIZE);
    buf.ensure_spare(sum_need(&[blob_need(key.len())?, value_need, table_need])?)?;

    let node = match new_cap {
        Some(cap) => obj_rehash(buf, node, cap)?,
        None => node,
    };
    let hash = key_hash(key.as_bytes());
    let idx = probe_empty(buf.as_slice(), &node, hash)?;
    let key_ofs = write_blob(buf, key.as_bytes())?;
    let slot = node.slot_ofs(idx);
    buf.write_u32(slot, hash)?;
    buf.write_u32(slot + 4, key_ofs as u32)?;
    let created = write_cell(buf, slot + OBJ_SLOT_CELL, input)?;
    buf.write_u32(node.ofs + HDR_LEN, node.len + 1)?;
    Ok(created)
}

// ============================================================================
// 数组
// ============================================================================

pub(crate) fn arr_get(data: &[u8], ofs: usize, index: usize) -> Lite3Result<RawCell> {
    let node = Node::expect(data, ofs, TypeTag::Array)?;
    if index >= node.len as usize {
        return Err(Lite3Error::IndexOutOfRange {
            index,
            len: node.len as usize,
        });
    }
    RawCell::read(data, node.cell_ofs(index as u32))
}

/// # Brief
/// 在数组末尾追加值，槽位表已满时在尾部重新分配双倍容量
///
/// # Returns
/// 追加容器时返回新节点偏移，否则返回 0
pub(crate) fn arr_append(buf: &mut Buffer, ofs: usize, input: Input<'_>) -> Lite3Result<usize> {
    let mut node = Node::expect(buf.as_slice(), ofs, TypeTag::Array)?;
    let value_need = input.tail_need()?;
    let new_cap = if node.len == node.cap {
        Some(doubled(node.cap, INITIAL_ARR_SLOTS)?)
    } else {
        None
    };
    let table_need = new_cap.map_or(0, |cap| cap as usize * ARR_SLOT_SIZE);
    buf.ensure_spare(sum_need(&[value_need, table_need])?)?;

    if let Some(cap) = new_cap {
        let table = buf.alloc(cap as usize * ARR_SLOT_SIZE)?;
        if node.len > 0 {
            buf.copy_within(node.table, table, node.len as usize * ARR_SLOT_SIZE)?;
        }
        buf.write_u32(node.ofs + HDR_CAP, cap)?;
        buf.write_u32(node.ofs + HDR_TABLE, table as u32)?;
        node.cap = cap;
        node.table = table;
    }
    let created = write_cell(buf, node.cell_ofs(node.len), input)?;
    buf.write_u32(node.ofs + HDR_LEN, node.len + 1)?;
    Ok(created)
}

/// 容器中的元素个数
pub(crate) fn count(data: &[u8], ofs: usize) -> Lite3Result<usize> {
    Ok(Node::load(data, ofs)?.len as usize)
}

// ============================================================================
// 遍历
// ============================================================================

/// 对象中所有已占用的槽位: (槽位下标, 键哈希, 键数据区偏移, 值单元)
pub(crate) fn obj_slots(data: &[u8], node: &Node) -> Lite3Result<Vec<(u32, u32, usize, RawCell)>> {
    let mut slots = Vec::with_capacity(node.len as usize);
    for i in 0..node.cap {
        let slot = node.slot_ofs(i);
        let key_ofs = read_u32(data, slot + 4)? as usize;
        if key_ofs != 0 {
            slots.push((i, read_u32(data, slot)?, key_ofs, RawCell::read(data, slot + OBJ_SLOT_CELL)?));
        }
    }
    Ok(slots)
}

/// 对象键值对迭代器，顺序由哈希槽位决定
#[derive(Debug, Clone)]
pub struct Entries<'a> {
    data: &'a [u8],
    node: Node,
    next: u32,
}

impl<'a> Entries<'a> {
    pub(crate) fn new(data: &'a [u8], ofs: usize) -> Lite3Result<Self> {
        Ok(Self {
            data,
            node: Node::expect(data, ofs, TypeTag::Object)?,
            next: 0,
        })
    }
}

fn read_entry<'a>(data: &'a [u8], node: &Node, idx: u32) -> Lite3Result<Option<(&'a str, ValueRef<'a>)>> {
    let slot = node.slot_ofs(idx);
    let key_ofs = read_u32(data, slot + 4)? as usize;
    if key_ofs == 0 {
        return Ok(None);
    }
    let key = utf8(read_blob(data, key_ofs, None)?, key_ofs)?;
    let value = RawCell::read(data, slot + OBJ_SLOT_CELL)?.decode(data)?;
    Ok(Some((key, value)))
}

impl<'a> Iterator for Entries<'a> {
    type Item = Lite3Result<(&'a str, ValueRef<'a>)>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.node.cap {
            let idx = self.next;
            self.next += 1;
            match read_entry(self.data, &self.node, idx) {
                Ok(Some(entry)) => return Some(Ok(entry)),
                Ok(None) => continue,
                Err(e) => {
                    self.next = self.node.cap;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

/// 数组元素迭代器，按下标顺序
#[derive(Debug, Clone)]
pub struct Items<'a> {
    data: &'a [u8],
    node: Node,
    next: u32,
}

impl<'a> Items<'a> {
    pub(crate) fn new(data: &'a [u8], ofs: usize) -> Lite3Result<Self> {
        Ok(Self {
            data,
            node: Node::expect(data, ofs, TypeTag::Array)?,
            next: 0,
        })
    }
}

impl<'a> Iterator for Items<'a> {
    type Item = Lite3Result<ValueRef<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.node.len {
            return None;
        }
        let idx = self.next;
        self.next += 1;
        let item = RawCell::read(self.data, self.node.cell_ofs(idx)).and_then(|c| c.decode(self.data));
        if item.is_err() {
            self.next = self.node.len;
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.node.len - self.next) as usize;
        (left, Some(left))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object_buf(capacity: usize) -> Buffer {
        let mut buf = Buffer::with_capacity(capacity).unwrap();
        new_node(&mut buf, TypeTag::Object).unwrap();
        buf
    }

    fn array_buf(capacity: usize) -> Buffer {
        let mut buf = Buffer::with_capacity(capacity).unwrap();
        new_node(&mut buf, TypeTag::Array).unwrap();
        buf
    }

    #[test]
    fn test_set_and_get_scalar() {
        let mut buf = object_buf(1024);
        obj_set(&mut buf, 0, "n", Input::I64(-7)).unwrap();
        obj_set(&mut buf, 0, "s", Input::Str("hello")).unwrap();
        let data = buf.as_slice();
        assert_eq!(obj_get(data, 0, "n").unwrap().decode(data).unwrap(), ValueRef::I64(-7));
        assert_eq!(obj_get(data, 0, "s").unwrap().decode(data).unwrap(), ValueRef::Str("hello"));
        assert!(matches!(obj_get(data, 0, "x"), Err(Lite3Error::KeyNotFound(_))));
        assert_eq!(count(data, 0).unwrap(), 2);
    }

    #[test]
    fn test_overwrite_keeps_count() {
        let mut buf = object_buf(1024);
        obj_set(&mut buf, 0, "k", Input::Str("first")).unwrap();
        obj_set(&mut buf, 0, "k", Input::Bool(true)).unwrap();
        let data = buf.as_slice();
        assert_eq!(count(data, 0).unwrap(), 1);
        assert_eq!(obj_get(data, 0, "k").unwrap().decode(data).unwrap(), ValueRef::Bool(true));
    }

    #[test]
    fn test_rehash_keeps_all_keys() {
        let mut buf = object_buf(1 << 16);
        for i in 0..100 {
            obj_set(&mut buf, 0, &format!("key{i}"), Input::I64(i)).unwrap();
        }
        let data = buf.as_slice();
        let node = Node::load(data, 0).unwrap();
        assert_eq!(node.len, 100);
        assert!(node.cap >= 128);
        for i in 0..100 {
            let cell = obj_get(data, 0, &format!("key{i}")).unwrap();
            assert_eq!(cell.decode(data).unwrap(), ValueRef::I64(i));
        }
    }

    #[test]
    fn test_colliding_keys_are_distinct() {
        let mut buf = object_buf(1024);
        assert_eq!(key_hash(b"Ab"), key_hash(b"BA"));
        obj_set(&mut buf, 0, "Ab", Input::I64(1)).unwrap();
        obj_set(&mut buf, 0, "BA", Input::I64(2)).unwrap();
        let data = buf.as_slice();
        assert_eq!(obj_get(data, 0, "Ab").unwrap().decode(data).unwrap(), ValueRef::I64(1));
        assert_eq!(obj_get(data, 0, "BA").unwrap().decode(data).unwrap(), ValueRef::I64(2));
    }

    #[test]
    fn test_exhausted_set_is_atomic() {
        let mut buf = object_buf(64);
        let before = buf.as_slice().to_vec();
        let long = "x".repeat(200);
        let err = obj_set(&mut buf, 0, "k", Input::Str(&long)).unwrap_err();
        assert!(matches!(err, Lite3Error::BufferExhausted { .. }));
        assert_eq!(buf.as_slice(), &before[..]);
    }

    #[test]
    fn test_append_relocates_table() {
        let mut buf = array_buf(4096);
        for i in 0..10 {
            arr_append(&mut buf, 0, Input::I64(i * 10)).unwrap();
        }
        let data = buf.as_slice();
        let node = Node::load(data, 0).unwrap();
        assert_eq!((node.len, node.cap), (10, 16));
        for i in 0..10 {
            assert_eq!(
                arr_get(data, 0, i).unwrap().decode(data).unwrap(),
                ValueRef::I64(i as i64 * 10)
            );
        }
        assert!(matches!(
            arr_get(data, 0, 10),
            Err(Lite3Error::IndexOutOfRange { index: 10, len: 10 })
        ));
    }

    #[test]
    fn test_container_kind_checked() {
        let mut buf = array_buf(256);
        let err = obj_set(&mut buf, 0, "k", Input::Null).unwrap_err();
        assert!(matches!(err, Lite3Error::TypeMismatch { expected: "object", found: "array" }));
        assert!(matches!(
            obj_get(buf.as_slice(), 0, "k"),
            Err(Lite3Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_iterators() {
        let mut buf = object_buf(4096);
        let child = obj_set(&mut buf, 0, "list", Input::Array).unwrap();
        arr_append(&mut buf, child, Input::Str("a")).unwrap();
        arr_append(&mut buf, child, Input::F64(1.5)).unwrap();
        obj_set(&mut buf, 0, "flag", Input::Bool(false)).unwrap();

        let data = buf.as_slice();
        let mut keys: Vec<&str> = Entries::new(data, 0)
            .unwrap()
            .map(|e| e.unwrap().0)
            .collect();
        keys.sort_unstable();
        assert_eq!(keys, ["flag", "list"]);

        let items: Vec<ValueRef<'_>> = Items::new(data, child).unwrap().map(|v| v.unwrap()).collect();
        assert_eq!(items, [ValueRef::Str("a"), ValueRef::F64(1.5)]);
    }
}
