//! 文档上下文
//!
//! [`Document`] 拥有缓冲区并对外提供全部读写操作。编解码层遇到空间不足时返回
//! `BufferExhausted` 且不做任何写入，文档上下文负责扩容并重试同一操作，
//! 因此调用方永远看不到这个错误。扩容会移动底层内存，但所有偏移保持有效。
//!
//! 每个文档实例有唯一的 id，每次成功的修改都会推进文档的 generation。
//! 借用返回的 `&str` / `&[u8]` 由借用检查器保证不会跨越修改；脱离借用的
//! [`BlobRef`] 则在使用时比对 id 与 generation，不匹配时返回 `StaleReference`。
//!
//! `max_depth` 只约束外部输入 (JSON 文本、值树) 的导入。引擎自己写出的文档
//! 无论多深都能重新加载和导出，加载校验与导出都用显式栈遍历。

use crate::buffer::Buffer;
use crate::codec::{self, Entries, Input, Items};
use crate::hash::key_hash;
use crate::node::{read_blob, utf8, Node, RawCell};
use crate::spec::{TypeTag, ROOT};
use crate::value::{Value, ValueRef, ValueType};
use crate::{Lite3Error, Lite3Result};
use bytes::Bytes;
use compact_str::CompactString;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace, warn};
use tron_common::{BufferConfig, DocConfig, RootKind};

/// 全局文档 ID 计数器，创建、加载和克隆都会取一个新 ID
static DOCUMENT_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_document_id() -> u64 {
    DOCUMENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// 脱离借用的字符串/字节视图
///
/// 只记录数据区的偏移和长度，以及创建它的文档 id 和当时的 generation。
/// 文档之后发生任何修改，或拿到其他文档上解析，都会失败。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobRef {
    ofs: usize,
    len: usize,
    kind: ValueType,
    document: u64,
    generation: u64,
}

impl BlobRef {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `ValueType::String` 或 `ValueType::Bytes`
    pub fn kind(&self) -> ValueType {
        self.kind
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// 写入位置：对象中的键，或数组末尾
#[derive(Debug, Clone, Copy)]
enum Target<'k> {
    Key(&'k str),
    Append,
}

/// Lite3 文档
#[derive(Debug)]
pub struct Document {
    buf: Buffer,
    root: RootKind,
    id: u64,
    generation: u64,
    max_depth: usize,
}

impl Clone for Document {
    fn clone(&self) -> Self {
        Self {
            buf: self.buf.clone(),
            root: self.root,
            id: next_document_id(),
            generation: self.generation,
            max_depth: self.max_depth,
        }
    }
}

fn root_tag(root: RootKind) -> TypeTag {
    match root {
        RootKind::Object => TypeTag::Object,
        RootKind::Array => TypeTag::Array,
    }
}

impl Document {
    // ========================================================================
    // 创建与加载
    // ========================================================================

    /// 使用默认配置创建空文档
    pub fn new(root: RootKind) -> Lite3Result<Self> {
        Self::with_config(&DocConfig::with_root(root))
    }

    /// 使用指定初始容量创建空文档
    pub fn with_capacity(root: RootKind, capacity: usize) -> Lite3Result<Self> {
        let mut config = DocConfig::with_root(root);
        config.buffer = BufferConfig::with_initial_capacity(capacity);
        Self::with_config(&config)
    }

    /// # Brief
    /// 按配置创建空文档，根节点位于偏移 0
    ///
    /// # Arguments
    /// * `config` - 文档配置，根类型取 `config.root`
    pub fn with_config(config: &DocConfig) -> Lite3Result<Self> {
        config.validate()?;
        let mut buf = Buffer::new(&config.buffer)?;
        codec::new_node(&mut buf, root_tag(config.root))?;
        debug!(
            root = %config.root,
            bufsz = buf.capacity(),
            "document created"
        );
        Ok(Self {
            buf,
            root: config.root,
            id: next_document_id(),
            generation: 0,
            max_depth: config.json.max_depth,
        })
    }

    /// 从原始字节加载文档，根类型由偏移 0 处的节点决定
    pub fn from_bytes(bytes: &[u8]) -> Lite3Result<Self> {
        Self::from_bytes_with_config(bytes, &DocConfig::default())
    }

    /// # Brief
    /// 从原始字节加载文档并做完整的结构校验
    ///
    /// # Arguments
    /// * `bytes` - 之前由 [`Document::as_bytes`] 得到的字节
    /// * `config` - 后续扩容与值树导入使用的配置，`config.root` 被忽略
    ///
    /// # Returns
    /// 校验通过的文档；任何越界、类型标记错误或结构不一致都返回 MalformedInput
    pub fn from_bytes_with_config(bytes: &[u8], config: &DocConfig) -> Lite3Result<Self> {
        config.validate()?;
        if let Err(e) = validate(bytes) {
            warn!(len = bytes.len(), error = %e, "rejected document bytes");
            return Err(e);
        }
        let root = match Node::load(bytes, ROOT)?.tag {
            TypeTag::Array => RootKind::Array,
            _ => RootKind::Object,
        };
        let buf = Buffer::from_bytes(bytes, &config.buffer)?;
        debug!(root = %root, buflen = buf.len(), "document loaded");
        Ok(Self {
            buf,
            root,
            id: next_document_id(),
            generation: 0,
            max_depth: config.json.max_depth,
        })
    }

    /// 从读取器读入全部字节并加载
    pub fn read_from<R: Read>(mut reader: R) -> Lite3Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Lite3Result<Self> {
        Self::read_from(BufReader::new(File::open(path)?))
    }

    /// 将已提交的字节写入写入器
    pub fn write_to<W: Write>(&self, mut writer: W) -> Lite3Result<()> {
        writer.write_all(self.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Lite3Result<()> {
        self.write_to(BufWriter::new(File::create(path)?))
    }

    /// # Brief
    /// 丢弃全部内容，重新以 `root` 为根开始，保留已分配的容量
    pub fn reset(&mut self, root: RootKind) -> Lite3Result<()> {
        self.buf.truncate(0);
        codec::new_node(&mut self.buf, root_tag(root))?;
        self.root = root;
        self.generation += 1;
        debug!(root = %root, bufsz = self.buf.capacity(), "document reset");
        Ok(())
    }

    // ========================================================================
    // 状态
    // ========================================================================

    pub fn root_kind(&self) -> RootKind {
        self.root
    }

    /// 已提交字节数
    pub fn buflen(&self) -> usize {
        self.buf.len()
    }

    /// 当前缓冲区总容量
    pub fn bufsz(&self) -> usize {
        self.buf.capacity()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buf.as_slice()
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buf
    }

    /// 成功修改的次数 (含 reset)
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 本实例的唯一 ID
    pub fn id(&self) -> u64 {
        self.id
    }

    /// 导入 JSON 文本和值树时允许的最大嵌套深度
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// 用 `byte` 填充未提交区域；之后的分配仍然会把对齐填充清零
    pub fn fill_spare(&mut self, byte: u8) {
        self.buf.fill_spare(byte);
    }

    fn data(&self) -> &[u8] {
        self.buf.as_slice()
    }

    /// 执行一次修改，空间不足时扩容并重试
    fn mutate<T>(&mut self, mut op: impl FnMut(&mut Buffer) -> Lite3Result<T>) -> Lite3Result<T> {
        loop {
            match op(&mut self.buf) {
                Ok(v) => {
                    self.generation += 1;
                    return Ok(v);
                }
                Err(Lite3Error::BufferExhausted { need, have }) => {
                    trace!(need, have, "growing buffer before retry");
                    self.buf.grow()?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn insert(&mut self, ofs: usize, target: Target<'_>, input: Input<'_>) -> Lite3Result<usize> {
        self.mutate(|buf| match target {
            Target::Key(key) => codec::obj_set(buf, ofs, key, input),
            Target::Append => codec::arr_append(buf, ofs, input),
        })
    }

    // ========================================================================
    // 对象写入
    // ========================================================================

    pub fn set_null(&mut self, ofs: usize, key: &str) -> Lite3Result<()> {
        self.insert(ofs, Target::Key(key), Input::Null)?;
        Ok(())
    }

    pub fn set_bool(&mut self, ofs: usize, key: &str, value: bool) -> Lite3Result<()> {
        self.insert(ofs, Target::Key(key), Input::Bool(value))?;
        Ok(())
    }

    pub fn set_i64(&mut self, ofs: usize, key: &str, value: i64) -> Lite3Result<()> {
        self.insert(ofs, Target::Key(key), Input::I64(value))?;
        Ok(())
    }

    pub fn set_f64(&mut self, ofs: usize, key: &str, value: f64) -> Lite3Result<()> {
        self.insert(ofs, Target::Key(key), Input::F64(value))?;
        Ok(())
    }

    pub fn set_bytes(&mut self, ofs: usize, key: &str, value: &[u8]) -> Lite3Result<()> {
        self.insert(ofs, Target::Key(key), Input::Bytes(value))?;
        Ok(())
    }

    pub fn set_str(&mut self, ofs: usize, key: &str, value: &str) -> Lite3Result<()> {
        self.insert(ofs, Target::Key(key), Input::Str(value))?;
        Ok(())
    }

    /// # Brief
    /// 在 `key` 处创建空对象；键已存在时旧值被替换
    ///
    /// # Returns
    /// 新对象的节点偏移
    pub fn set_obj(&mut self, ofs: usize, key: &str) -> Lite3Result<usize> {
        self.insert(ofs, Target::Key(key), Input::Object)
    }

    /// 在 `key` 处创建空数组，返回其节点偏移
    pub fn set_arr(&mut self, ofs: usize, key: &str) -> Lite3Result<usize> {
        self.insert(ofs, Target::Key(key), Input::Array)
    }

    /// 将 `key` 的值置为 null，键本身保留
    pub fn delete(&mut self, ofs: usize, key: &str) -> Lite3Result<()> {
        self.set_null(ofs, key)
    }

    // ========================================================================
    // 对象读取
    // ========================================================================

    /// 读取 `key` 的值，容器以节点偏移返回
    pub fn get(&self, ofs: usize, key: &str) -> Lite3Result<ValueRef<'_>> {
        codec::obj_get(self.data(), ofs, key)?.decode(self.data())
    }

    pub fn get_type(&self, ofs: usize, key: &str) -> Lite3Result<ValueType> {
        Ok(ValueType::from_tag(codec::obj_get(self.data(), ofs, key)?.tag))
    }

    /// 键是否存在；值为 null 的键也算存在
    pub fn exists(&self, ofs: usize, key: &str) -> Lite3Result<bool> {
        Ok(codec::obj_lookup(self.data(), ofs, key)?.is_some())
    }

    pub fn get_bool(&self, ofs: usize, key: &str) -> Lite3Result<bool> {
        self.get(ofs, key)?.as_bool()
    }

    pub fn get_i64(&self, ofs: usize, key: &str) -> Lite3Result<i64> {
        self.get(ofs, key)?.as_i64()
    }

    pub fn get_f64(&self, ofs: usize, key: &str) -> Lite3Result<f64> {
        self.get(ofs, key)?.as_f64()
    }

    pub fn get_bytes(&self, ofs: usize, key: &str) -> Lite3Result<&[u8]> {
        self.get(ofs, key)?.as_bytes()
    }

    pub fn get_str(&self, ofs: usize, key: &str) -> Lite3Result<&str> {
        self.get(ofs, key)?.as_str()
    }

    pub fn get_obj(&self, ofs: usize, key: &str) -> Lite3Result<usize> {
        self.get(ofs, key)?.as_object()
    }

    pub fn get_arr(&self, ofs: usize, key: &str) -> Lite3Result<usize> {
        self.get(ofs, key)?.as_array()
    }

    // ========================================================================
    // 数组
    // ========================================================================

    pub fn arr_append_null(&mut self, ofs: usize) -> Lite3Result<()> {
        self.insert(ofs, Target::Append, Input::Null)?;
        Ok(())
    }

    pub fn arr_append_bool(&mut self, ofs: usize, value: bool) -> Lite3Result<()> {
        self.insert(ofs, Target::Append, Input::Bool(value))?;
        Ok(())
    }

    pub fn arr_append_i64(&mut self, ofs: usize, value: i64) -> Lite3Result<()> {
        self.insert(ofs, Target::Append, Input::I64(value))?;
        Ok(())
    }

    pub fn arr_append_f64(&mut self, ofs: usize, value: f64) -> Lite3Result<()> {
        self.insert(ofs, Target::Append, Input::F64(value))?;
        Ok(())
    }

    pub fn arr_append_bytes(&mut self, ofs: usize, value: &[u8]) -> Lite3Result<()> {
        self.insert(ofs, Target::Append, Input::Bytes(value))?;
        Ok(())
    }

    pub fn arr_append_str(&mut self, ofs: usize, value: &str) -> Lite3Result<()> {
        self.insert(ofs, Target::Append, Input::Str(value))?;
        Ok(())
    }

    /// 追加空对象，返回其节点偏移
    pub fn arr_append_obj(&mut self, ofs: usize) -> Lite3Result<usize> {
        self.insert(ofs, Target::Append, Input::Object)
    }

    /// 追加空数组，返回其节点偏移
    pub fn arr_append_arr(&mut self, ofs: usize) -> Lite3Result<usize> {
        self.insert(ofs, Target::Append, Input::Array)
    }

    pub fn arr_get(&self, ofs: usize, index: usize) -> Lite3Result<ValueRef<'_>> {
        codec::arr_get(self.data(), ofs, index)?.decode(self.data())
    }

    pub fn arr_get_type(&self, ofs: usize, index: usize) -> Lite3Result<ValueType> {
        Ok(ValueType::from_tag(codec::arr_get(self.data(), ofs, index)?.tag))
    }

    pub fn arr_get_bool(&self, ofs: usize, index: usize) -> Lite3Result<bool> {
        self.arr_get(ofs, index)?.as_bool()
    }

    pub fn arr_get_i64(&self, ofs: usize, index: usize) -> Lite3Result<i64> {
        self.arr_get(ofs, index)?.as_i64()
    }

    pub fn arr_get_f64(&self, ofs: usize, index: usize) -> Lite3Result<f64> {
        self.arr_get(ofs, index)?.as_f64()
    }

    pub fn arr_get_bytes(&self, ofs: usize, index: usize) -> Lite3Result<&[u8]> {
        self.arr_get(ofs, index)?.as_bytes()
    }

    pub fn arr_get_str(&self, ofs: usize, index: usize) -> Lite3Result<&str> {
        self.arr_get(ofs, index)?.as_str()
    }

    pub fn arr_get_obj(&self, ofs: usize, index: usize) -> Lite3Result<usize> {
        self.arr_get(ofs, index)?.as_object()
    }

    pub fn arr_get_arr(&self, ofs: usize, index: usize) -> Lite3Result<usize> {
        self.arr_get(ofs, index)?.as_array()
    }

    // ========================================================================
    // 遍历
    // ========================================================================

    /// 对象的键数或数组的元素数
    pub fn count(&self, ofs: usize) -> Lite3Result<usize> {
        codec::count(self.data(), ofs)
    }

    /// 遍历对象的键值对，顺序不保证与插入顺序一致
    pub fn entries(&self, ofs: usize) -> Lite3Result<Entries<'_>> {
        Entries::new(self.data(), ofs)
    }

    /// 按下标顺序遍历数组元素
    pub fn items(&self, ofs: usize) -> Lite3Result<Items<'_>> {
        Items::new(self.data(), ofs)
    }

    // ========================================================================
    // 分离视图
    // ========================================================================

    /// 取得对象中字符串/字节值的分离视图
    pub fn blob_ref(&self, ofs: usize, key: &str) -> Lite3Result<BlobRef> {
        self.make_blob_ref(codec::obj_get(self.data(), ofs, key)?)
    }

    /// 取得数组中字符串/字节元素的分离视图
    pub fn arr_blob_ref(&self, ofs: usize, index: usize) -> Lite3Result<BlobRef> {
        self.make_blob_ref(codec::arr_get(self.data(), ofs, index)?)
    }

    fn make_blob_ref(&self, cell: RawCell) -> Lite3Result<BlobRef> {
        if !cell.tag.is_blob() {
            return Err(Lite3Error::TypeMismatch {
                expected: "string or bytes",
                found: ValueType::from_tag(cell.tag).name(),
            });
        }
        cell.decode(self.data())?;
        Ok(BlobRef {
            ofs: cell.target(),
            len: cell.len as usize,
            kind: ValueType::from_tag(cell.tag),
            document: self.id,
            generation: self.generation,
        })
    }

    fn check_fresh(&self, blob: &BlobRef) -> Lite3Result<()> {
        if blob.document != self.id {
            return Err(Lite3Error::StaleReference(format!(
                "taken from document {}, resolved against document {}",
                blob.document, self.id
            )));
        }
        if blob.generation != self.generation {
            return Err(Lite3Error::StaleReference(format!(
                "taken at generation {}, document is at generation {}",
                blob.generation, self.generation
            )));
        }
        Ok(())
    }

    pub fn resolve_bytes(&self, blob: &BlobRef) -> Lite3Result<&[u8]> {
        self.check_fresh(blob)?;
        read_blob(self.data(), blob.ofs, Some(blob.len as u32))
    }

    pub fn resolve_str(&self, blob: &BlobRef) -> Lite3Result<&str> {
        if blob.kind != ValueType::String {
            return Err(Lite3Error::TypeMismatch {
                expected: ValueType::String.name(),
                found: blob.kind.name(),
            });
        }
        utf8(self.resolve_bytes(blob)?, blob.ofs)
    }

    // ========================================================================
    // 值树
    // ========================================================================

    /// # Brief
    /// 由自有值树构建文档
    ///
    /// # Arguments
    /// * `value` - 顶层必须是对象或数组
    pub fn from_value(value: &Value) -> Lite3Result<Self> {
        Self::from_value_with_config(value, &DocConfig::default())
    }

    pub fn from_value_with_config(value: &Value, config: &DocConfig) -> Lite3Result<Self> {
        let mut config = config.clone();
        config.root = match value {
            Value::Object(_) => RootKind::Object,
            Value::Array(_) => RootKind::Array,
            other => {
                return Err(Lite3Error::MalformedInput(format!(
                    "top-level value must be an object or array, got {}",
                    other.value_type()
                )))
            }
        };
        let mut doc = Self::with_config(&config)?;
        doc.fill_container(ROOT, value, 1)?;
        Ok(doc)
    }

    /// # Brief
    /// 把值树写入对象的 `key` 处，容器会被递归创建
    ///
    /// 整棵树的写入不是原子的：中途失败时已写入的部分保留
    pub fn set_value(&mut self, ofs: usize, key: &str, value: &Value) -> Lite3Result<()> {
        self.insert_value(ofs, Target::Key(key), value, 1)
    }

    /// 把值树追加到数组末尾
    pub fn append_value(&mut self, ofs: usize, value: &Value) -> Lite3Result<()> {
        self.insert_value(ofs, Target::Append, value, 1)
    }

    /// 逐个写入 `entries` 中的键值对
    pub fn set_value_map<'k, I>(&mut self, ofs: usize, entries: I) -> Lite3Result<()>
    where
        I: IntoIterator<Item = (&'k str, &'k Value)>,
    {
        for (key, value) in entries {
            self.set_value(ofs, key, value)?;
        }
        Ok(())
    }

    /// 依次追加 `values` 中的每个值
    pub fn append_value_list<'v, I>(&mut self, ofs: usize, values: I) -> Lite3Result<()>
    where
        I: IntoIterator<Item = &'v Value>,
    {
        for value in values {
            self.append_value(ofs, value)?;
        }
        Ok(())
    }

    fn insert_value(&mut self, ofs: usize, target: Target<'_>, value: &Value, depth: usize) -> Lite3Result<()> {
        let input = match value {
            Value::Null => Input::Null,
            Value::Bool(b) => Input::Bool(*b),
            Value::I64(n) => Input::I64(*n),
            Value::F64(n) => Input::F64(*n),
            Value::Bytes(b) => Input::Bytes(b.as_slice()),
            Value::String(s) => Input::Str(s.as_str()),
            Value::Object(_) => Input::Object,
            Value::Array(_) => Input::Array,
        };
        if value.value_type().is_container() && depth > self.max_depth {
            return Err(Lite3Error::NestingTooDeep(self.max_depth));
        }
        let child = self.insert(ofs, target, input)?;
        self.fill_container(child, value, depth)
    }

    fn fill_container(&mut self, ofs: usize, value: &Value, depth: usize) -> Lite3Result<()> {
        match value {
            Value::Object(map) => {
                for (key, item) in map {
                    self.insert_value(ofs, Target::Key(key.as_str()), item, depth + 1)?;
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.insert_value(ofs, Target::Append, item, depth + 1)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// # Brief
    /// 把 `ofs` 处的容器导出为自有值树
    ///
    /// 用显式栈遍历，不受嵌套深度限制
    pub fn to_value(&self, ofs: usize) -> Lite3Result<Value> {
        let mut stack = Vec::new();
        let mut current = self.open(ofs)?;
        loop {
            let value = match current.next().transpose()? {
                Some(ValueRef::Object(child) | ValueRef::Array(child)) => {
                    stack.push(current);
                    current = self.open(child)?;
                    continue;
                }
                Some(ValueRef::Null) => Value::Null,
                Some(ValueRef::Bool(b)) => Value::Bool(b),
                Some(ValueRef::I64(n)) => Value::I64(n),
                Some(ValueRef::F64(n)) => Value::F64(n),
                Some(ValueRef::Bytes(b)) => Value::Bytes(b.to_vec()),
                Some(ValueRef::Str(s)) => Value::String(CompactString::from(s)),
                None => {
                    let done = current.finish();
                    match stack.pop() {
                        Some(parent) => current = parent,
                        None => return Ok(done),
                    }
                    done
                }
            };
            current.push(value);
        }
    }

    fn open(&self, ofs: usize) -> Lite3Result<Pending<'_>> {
        let node = Node::load(self.data(), ofs)?;
        Ok(match node.tag {
            TypeTag::Array => Pending::Array {
                items: self.items(ofs)?,
                list: Vec::with_capacity(node.len as usize),
            },
            _ => Pending::Object {
                entries: self.entries(ofs)?,
                map: IndexMap::with_capacity(node.len as usize),
                key: CompactString::default(),
            },
        })
    }
}

/// 导出过程中尚未完成的容器
enum Pending<'a> {
    Object {
        entries: Entries<'a>,
        map: IndexMap<CompactString, Value>,
        key: CompactString,
    },
    Array {
        items: Items<'a>,
        list: Vec<Value>,
    },
}

impl<'a> Pending<'a> {
    /// 取下一个子值；对象会记下它的键，供随后的 `push` 使用
    fn next(&mut self) -> Option<Lite3Result<ValueRef<'a>>> {
        match self {
            Pending::Object { entries, key, .. } => entries.next().map(|entry| {
                entry.map(|(k, v)| {
                    *key = CompactString::from(k);
                    v
                })
            }),
            Pending::Array { items, .. } => items.next(),
        }
    }

    fn push(&mut self, value: Value) {
        match self {
            Pending::Object { map, key, .. } => {
                map.insert(std::mem::take(key), value);
            }
            Pending::Array { list, .. } => list.push(value),
        }
    }

    fn finish(self) -> Value {
        match self {
            Pending::Object { map, .. } => Value::Object(map),
            Pending::Array { list, .. } => Value::Array(list),
        }
    }
}

// ============================================================================
// 加载校验
// ============================================================================

fn malformed(e: Lite3Error) -> Lite3Error {
    match e {
        Lite3Error::InvalidOffset { offset, buflen } => Lite3Error::MalformedInput(format!(
            "no valid node at offset {} (buflen={})",
            offset, buflen
        )),
        Lite3Error::TypeMismatch { expected, found } => {
            Lite3Error::MalformedInput(format!("expected {}, found {}", expected, found))
        }
        other => other,
    }
}

/// # Brief
/// 从根节点出发校验整棵树
///
/// 子节点必须位于父节点之后且只被引用一次，以此排除环和共享；
/// 键的哈希必须与槽位中记录的一致，且沿探测序列能找回同一个槽位；
/// 字符串必须是合法 UTF-8。用显式栈遍历，不限制嵌套深度
fn validate(data: &[u8]) -> Lite3Result<()> {
    let mut seen = HashSet::from([ROOT]);
    let mut pending = vec![ROOT];
    while let Some(ofs) = pending.pop() {
        for child in validate_node(data, ofs).map_err(malformed)? {
            if child <= ofs {
                return Err(Lite3Error::MalformedInput(format!(
                    "child node at offset {} precedes its parent at {}",
                    child, ofs
                )));
            }
            if !seen.insert(child) {
                return Err(Lite3Error::MalformedInput(format!(
                    "node at offset {} is referenced more than once",
                    child
                )));
            }
            pending.push(child);
        }
    }
    Ok(())
}

/// 校验单个节点，返回它直接引用的子容器偏移
fn validate_node(data: &[u8], ofs: usize) -> Lite3Result<Vec<usize>> {
    let node = Node::load(data, ofs)?;
    let mut cells = Vec::with_capacity(node.len as usize);
    match node.tag {
        TypeTag::Object => {
            for (idx, hash, key_ofs, cell) in codec::obj_slots(data, &node)? {
                let key = utf8(read_blob(data, key_ofs, None)?, key_ofs)?;
                if key_hash(key.as_bytes()) != hash {
                    return Err(Lite3Error::MalformedInput(format!(
                        "key hash mismatch in object at offset {}",
                        ofs
                    )));
                }
                if codec::obj_find(data, &node, key)? != Some(idx) {
                    return Err(Lite3Error::MalformedInput(format!(
                        "key {:?} in object at offset {} is unreachable or duplicated",
                        key, ofs
                    )));
                }
                cells.push(cell);
            }
            if cells.len() != node.len as usize {
                return Err(Lite3Error::MalformedInput(format!(
                    "object at offset {} holds {} keys, header says {}",
                    ofs,
                    cells.len(),
                    node.len
                )));
            }
        }
        _ => {
            for i in 0..node.len {
                cells.push(RawCell::read(data, node.cell_ofs(i))?);
            }
        }
    }
    let mut children = Vec::new();
    for cell in cells {
        cell.decode(data)?;
        if cell.tag.is_container() {
            children.push(cell.target());
        }
    }
    Ok(children)
}
