//! Binary layouts of the metadata messages exchanged between peers.
//!
//! All integers are written in native byte order and no version tag is
//! carried, so both ends of a link must run the same build. Which optional
//! sections follow the kind tag is decided by the kind alone; encode and
//! decode branch on the same [`MessageKind`] predicates.

use bytes::{BufMut, Bytes, BytesMut};

use super::tensor::Tensor;
use crate::types::{Result, StrataError};

/// Message kind tag shared by [`ArrayMeta`] and [`KvStoreMsg`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(i32)]
pub enum MessageKind {
    /// Serialized sampled subgraph.
    NodeFlow = 0,
    /// End of a stream; no payload follows.
    Final = 1,
    /// Initialise a named parameter with ids and values.
    Init = 2,
    /// Write values for ids of a named parameter.
    Push = 3,
    /// Request values for ids of a named parameter.
    Pull = 4,
    /// Values answering a [`MessageKind::Pull`].
    PullResponse = 5,
    /// Synchronisation point; no payload follows.
    Barrier = 6,
    /// Announces a peer's address under its rank.
    IdExchange = 7,
}

impl MessageKind {
    /// Every kind, in tag order.
    pub const ALL: [MessageKind; 8] = [
        MessageKind::NodeFlow,
        MessageKind::Final,
        MessageKind::Init,
        MessageKind::Push,
        MessageKind::Pull,
        MessageKind::PullResponse,
        MessageKind::Barrier,
        MessageKind::IdExchange,
    ];

    /// Wire tag.
    pub fn tag(self) -> i32 {
        self as i32
    }

    /// Whether a [`KvStoreMsg`] may carry this kind.
    pub fn is_kv(self) -> bool {
        self != MessageKind::NodeFlow
    }

    /// Whether the key/value header carries a parameter name.
    pub fn carries_name(self) -> bool {
        matches!(
            self,
            MessageKind::Init
                | MessageKind::Push
                | MessageKind::Pull
                | MessageKind::PullResponse
                | MessageKind::IdExchange
        )
    }

    /// Whether an id tensor follows the key/value header.
    pub fn carries_ids(self) -> bool {
        matches!(
            self,
            MessageKind::Init | MessageKind::Push | MessageKind::Pull | MessageKind::PullResponse
        )
    }

    /// Whether a value tensor follows the id tensor.
    pub fn carries_data(self) -> bool {
        matches!(
            self,
            MessageKind::Init | MessageKind::Push | MessageKind::PullResponse
        )
    }
}

impl TryFrom<i32> for MessageKind {
    type Error = StrataError;

    fn try_from(tag: i32) -> Result<Self> {
        MessageKind::ALL
            .into_iter()
            .find(|k| k.tag() == tag)
            .ok_or_else(|| StrataError::Protocol(format!("unknown message kind {tag}")))
    }
}

/// Describes the tensors that follow a metadata message.
///
/// Layout: `[i32 kind]`, then only when at least one tensor is described
/// `[i32 count][u64 shape_len][i64; shape_len]`, where the shape list holds
/// `ndim` followed by the dimensions for each tensor in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArrayMeta {
    kind: MessageKind,
    shapes: Vec<Vec<i64>>,
}

impl ArrayMeta {
    /// Metadata with no tensors.
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            shapes: Vec::new(),
        }
    }

    /// Records the shape of the next tensor.
    pub fn add_array(&mut self, tensor: &Tensor) {
        self.shapes.push(tensor.shape().to_vec());
    }

    /// Records a shape directly.
    pub fn add_shape(&mut self, shape: Vec<i64>) {
        self.shapes.push(shape);
    }

    /// Message kind.
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Number of tensors described.
    pub fn array_count(&self) -> usize {
        self.shapes.len()
    }

    /// Shape of each described tensor.
    pub fn shapes(&self) -> &[Vec<i64>] {
        &self.shapes
    }

    fn flat_shape_len(&self) -> usize {
        self.shapes.iter().map(|s| s.len() + 1).sum()
    }

    /// Encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        if self.shapes.is_empty() {
            4
        } else {
            4 + 4 + 8 + 8 * self.flat_shape_len()
        }
    }

    /// Serializes to the wire layout.
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_i32_ne(self.kind.tag());
        if !self.shapes.is_empty() {
            let count = i32::try_from(self.shapes.len()).map_err(|_| {
                StrataError::Precondition(format!("{} tensors exceed i32", self.shapes.len()))
            })?;
            buf.put_i32_ne(count);
            buf.put_u64_ne(self.flat_shape_len() as u64);
            for shape in &self.shapes {
                buf.put_i64_ne(shape.len() as i64);
                for &dim in shape {
                    buf.put_i64_ne(dim);
                }
            }
        }
        Ok(buf.freeze())
    }

    /// Parses the wire layout; every byte of `buf` must be consumed.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(buf);
        let kind = MessageKind::try_from(cursor.read_i32()?)?;
        let mut meta = ArrayMeta::new(kind);
        if cursor.is_empty() {
            return Ok(meta);
        }
        let count = cursor.read_i32()?;
        if count <= 0 {
            return Err(StrataError::Protocol(format!(
                "array count {count} with a trailing shape section"
            )));
        }
        let flat_len = cursor.read_u64()?;
        let mut flat_remaining = flat_len;
        for _ in 0..count {
            if flat_remaining == 0 {
                return Err(StrataError::Protocol(
                    "shape list ends before every array is described".into(),
                ));
            }
            let ndim = cursor.read_i64()?;
            let available = (cursor.remaining() / 8) as u64;
            let ndim = u64::try_from(ndim)
                .ok()
                .filter(|&n| n < flat_remaining && n <= available)
                .ok_or_else(|| {
                    StrataError::Protocol(format!("ndim {ndim} overruns the shape list"))
                })?;
            let mut shape = Vec::with_capacity(ndim as usize);
            for _ in 0..ndim {
                shape.push(cursor.read_i64()?);
            }
            flat_remaining -= ndim + 1;
            meta.shapes.push(shape);
        }
        if flat_remaining != 0 {
            return Err(StrataError::Protocol(format!(
                "shape list declares {flat_len} entries but {count} arrays use {}",
                flat_len - flat_remaining
            )));
        }
        cursor.ensure_consumed()?;
        Ok(meta)
    }
}

/// Key/value-store operation.
///
/// Only the header (kind, rank and name) goes through [`KvStoreMsg::encode_header`];
/// the id and value tensors travel as separate raw messages.
#[derive(Clone, Debug, PartialEq)]
pub struct KvStoreMsg {
    /// Operation.
    pub kind: MessageKind,
    /// Rank of the sender.
    pub rank: i32,
    /// Parameter name, for kinds that carry one.
    pub name: Option<String>,
    /// Int64 ids, for kinds that carry them.
    pub id: Option<Tensor>,
    /// Float32 values, for kinds that carry them.
    pub data: Option<Tensor>,
}

impl KvStoreMsg {
    fn bare(kind: MessageKind, rank: i32) -> Self {
        Self {
            kind,
            rank,
            name: None,
            id: None,
            data: None,
        }
    }

    /// End-of-stream notice.
    pub fn final_msg(rank: i32) -> Self {
        Self::bare(MessageKind::Final, rank)
    }

    /// Barrier notice.
    pub fn barrier(rank: i32) -> Self {
        Self::bare(MessageKind::Barrier, rank)
    }

    /// Address announcement; `addr` travels in the name section.
    pub fn id_exchange(rank: i32, addr: impl Into<String>) -> Self {
        Self {
            name: Some(addr.into()),
            ..Self::bare(MessageKind::IdExchange, rank)
        }
    }

    /// Value request for `id` of parameter `name`.
    pub fn pull(rank: i32, name: impl Into<String>, id: Tensor) -> Self {
        Self {
            name: Some(name.into()),
            id: Some(id),
            ..Self::bare(MessageKind::Pull, rank)
        }
    }

    /// Message of kind `kind` carrying a name, ids and values
    /// (Init, Push or PullResponse).
    pub fn with_values(
        kind: MessageKind,
        rank: i32,
        name: impl Into<String>,
        id: Tensor,
        data: Tensor,
    ) -> Result<Self> {
        let msg = Self {
            kind,
            rank,
            name: Some(name.into()),
            id: Some(id),
            data: Some(data),
        };
        msg.validate()?;
        Ok(msg)
    }

    /// Push of `data` for `id` of parameter `name`.
    pub fn push(rank: i32, name: impl Into<String>, id: Tensor, data: Tensor) -> Self {
        Self {
            name: Some(name.into()),
            id: Some(id),
            data: Some(data),
            ..Self::bare(MessageKind::Push, rank)
        }
    }

    /// Checks that exactly the sections implied by the kind are present.
    pub fn validate(&self) -> Result<()> {
        if !self.kind.is_kv() {
            return Err(StrataError::Precondition(format!(
                "{:?} is not a key/value message kind",
                self.kind
            )));
        }
        let sections = [
            ("name", self.kind.carries_name(), self.name.is_some()),
            ("id tensor", self.kind.carries_ids(), self.id.is_some()),
            ("data tensor", self.kind.carries_data(), self.data.is_some()),
        ];
        for (section, expected, present) in sections {
            if expected != present {
                let verb = if expected { "requires" } else { "does not carry" };
                return Err(StrataError::Precondition(format!(
                    "{:?} message {verb} a {section}",
                    self.kind
                )));
            }
        }
        Ok(())
    }

    /// Serializes `[i32 kind][i32 rank]` plus `[u64 len][name bytes]` for
    /// kinds that carry a name.
    pub fn encode_header(&self) -> Result<Bytes> {
        self.validate()?;
        let name = self.name.as_deref().unwrap_or_default();
        let mut buf = BytesMut::with_capacity(8 + 8 + name.len());
        buf.put_i32_ne(self.kind.tag());
        buf.put_i32_ne(self.rank);
        if self.kind.carries_name() {
            buf.put_u64_ne(name.len() as u64);
            buf.put_slice(name.as_bytes());
        }
        Ok(buf.freeze())
    }

    /// Parses a header; tensors are left empty for the caller to attach.
    pub fn decode_header(buf: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(buf);
        let kind = MessageKind::try_from(cursor.read_i32()?)?;
        if !kind.is_kv() {
            return Err(StrataError::Protocol(format!(
                "{kind:?} is not a key/value message kind"
            )));
        }
        let rank = cursor.read_i32()?;
        let mut msg = Self::bare(kind, rank);
        if kind.carries_name() {
            let len = usize::try_from(cursor.read_u64()?)
                .map_err(|_| StrataError::Protocol("name length exceeds usize".into()))?;
            let raw = cursor.read_exact(len)?;
            let name = String::from_utf8(raw.to_vec())
                .map_err(|_| StrataError::Protocol("parameter name is not UTF-8".into()))?;
            msg.name = Some(name);
        }
        cursor.ensure_consumed()?;
        Ok(msg)
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    index: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, index: 0 }
    }

    fn is_empty(&self) -> bool {
        self.index == self.data.len()
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.index
    }

    fn read_exact(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .index
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                StrataError::Protocol(format!(
                    "unexpected end of message: need {len} bytes at offset {} of {}",
                    self.index,
                    self.data.len()
                ))
            })?;
        let start = self.index;
        self.index = end;
        Ok(&self.data[start..end])
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut raw = [0u8; N];
        raw.copy_from_slice(self.read_exact(N)?);
        Ok(raw)
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_ne_bytes(self.read_array()?))
    }

    fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_ne_bytes(self.read_array()?))
    }

    fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_ne_bytes(self.read_array()?))
    }

    fn ensure_consumed(&self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(StrataError::Protocol(format!(
                "{} trailing bytes after a {}-byte message",
                self.data.len() - self.index,
                self.data.len()
            )))
        }
    }
}
