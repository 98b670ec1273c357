//! Archive Codec: type-tagged binary encoding of primitive values.
//!
//! Every primitive is written as one Typed Field: a tag byte naming the
//! primitive followed by its fixed-width little-endian payload. Strings and
//! byte buffers are written as an `int` Typed Field holding the length,
//! followed by the raw bytes.
//!
//! ```text
//! bool  : [0x00][b]
//! short : [0x01][2 bytes]
//! int   : [0x02][4 bytes]
//! float : [0x03][4 bytes]
//! time  : [0x04][8 bytes]
//! long  : [0x05][8 bytes]
//! char  : [0x06][1 byte]
//! str   : [0x02][len: 4 bytes][len bytes]
//! ```
//!
//! There is no magic number, frame length or checksum. Decoding walks an
//! immutable buffer with a cursor; a field that declares more bytes than
//! remain yields [`ArchiveError::TruncatedFrame`].

use thiserror::Error;

/// Type tag preceding every Typed Field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TypeTag {
    /// 1-byte boolean.
    Bool = 0,
    /// 2-byte signed integer.
    Short = 1,
    /// 4-byte signed integer (also used for string/buffer lengths).
    Int = 2,
    /// 4-byte IEEE-754 float.
    Float = 3,
    /// 8-byte time value (seconds since the Unix epoch).
    Time = 4,
    /// 8-byte signed integer.
    Long = 5,
    /// Single byte.
    Char = 6,
}

impl TypeTag {
    /// Convert from the raw tag byte. Returns `None` for unknown values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Bool),
            1 => Some(Self::Short),
            2 => Some(Self::Int),
            3 => Some(Self::Float),
            4 => Some(Self::Time),
            5 => Some(Self::Long),
            6 => Some(Self::Char),
            _ => None,
        }
    }

    /// Payload width in bytes.
    #[inline]
    pub const fn width(self) -> usize {
        match self {
            Self::Bool | Self::Char => 1,
            Self::Short => 2,
            Self::Int | Self::Float => 4,
            Self::Time | Self::Long => 8,
        }
    }
}

/// Errors raised while encoding or decoding an Archive Frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArchiveError {
    /// A field declares more bytes than remain in the buffer.
    #[error("truncated frame: field needs {needed} bytes, {remaining} remaining")]
    TruncatedFrame {
        /// Bytes the field requires.
        needed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },

    /// The tag byte names no known primitive.
    #[error("unknown type tag {0:#04x}")]
    UnknownTag(u8),

    /// The tag byte names a different primitive than the one requested.
    #[error("type tag mismatch: expected {expected:?}, found {found:?}")]
    TagMismatch {
        /// Requested primitive.
        expected: TypeTag,
        /// Primitive found in the buffer.
        found: TypeTag,
    },

    /// A string or buffer length field is negative.
    #[error("invalid length field: {0}")]
    InvalidLength(i32),

    /// A string field holds bytes that are not UTF-8.
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    /// A record carries a different number of values than its kind requires.
    #[error("field count mismatch: expected {expected}, found {found}")]
    FieldCount {
        /// Count required by the record kind.
        expected: usize,
        /// Count found in the buffer.
        found: usize,
    },

    /// Encoding would exceed the writer's size limit.
    #[error("encoded size {needed} exceeds limit {limit}")]
    Overflow {
        /// Size after the rejected write.
        needed: usize,
        /// Writer limit.
        limit: usize,
    },
}

/// Time value carried by a `time` Typed Field: seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct TimeValue(pub i64);

/// Append-only encoder with an optional size limit.
#[derive(Debug, Clone)]
pub struct ArchiveWriter {
    buf: Vec<u8>,
    limit: usize,
}

impl ArchiveWriter {
    /// Create an unbounded writer.
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            limit: usize::MAX,
        }
    }

    /// Create a writer that refuses to grow beyond `limit` bytes.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: Vec::with_capacity(limit.min(4096)),
            limit,
        }
    }

    /// Append one value as a Typed Field.
    #[inline]
    pub fn put<T: Encode + ?Sized>(&mut self, value: &T) -> Result<(), ArchiveError> {
        value.encode(self)
    }

    /// Append an untagged byte (record discriminators and counts).
    pub fn put_raw_u8(&mut self, byte: u8) -> Result<(), ArchiveError> {
        self.put_raw(&[byte])
    }

    /// Append untagged bytes.
    pub fn put_raw(&mut self, bytes: &[u8]) -> Result<(), ArchiveError> {
        let needed = self.buf.len() + bytes.len();
        if needed > self.limit {
            return Err(ArchiveError::Overflow {
                needed,
                limit: self.limit,
            });
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    fn put_field(&mut self, tag: TypeTag, payload: &[u8]) -> Result<(), ArchiveError> {
        debug_assert_eq!(tag.width(), payload.len());
        let needed = self.buf.len() + 1 + payload.len();
        if needed > self.limit {
            return Err(ArchiveError::Overflow {
                needed,
                limit: self.limit,
            });
        }
        self.buf.push(tag as u8);
        self.buf.extend_from_slice(payload);
        Ok(())
    }

    fn put_sized(&mut self, bytes: &[u8]) -> Result<(), ArchiveError> {
        let len = i32::try_from(bytes.len()).map_err(|_| ArchiveError::Overflow {
            needed: bytes.len(),
            limit: i32::MAX as usize,
        })?;
        // Check the whole field up front so a failed write leaves no partial length.
        let needed = self.buf.len() + 1 + TypeTag::Int.width() + bytes.len();
        if needed > self.limit {
            return Err(ArchiveError::Overflow {
                needed,
                limit: self.limit,
            });
        }
        self.put_field(TypeTag::Int, &len.to_le_bytes())?;
        self.put_raw(bytes)
    }

    /// Encoded bytes so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the writer, returning the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Number of encoded bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been encoded.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Discard the encoded bytes, keeping the allocation and limit.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl Default for ArchiveWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Cursor over an immutable encoded buffer.
#[derive(Debug, Clone)]
pub struct ArchiveReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ArchiveReader<'a> {
    /// Start decoding at the beginning of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Decode the next Typed Field as `T`.
    #[inline]
    pub fn get<T: Decode>(&mut self) -> Result<T, ArchiveError> {
        T::decode(self)
    }

    /// Consume one untagged byte.
    pub fn get_raw_u8(&mut self) -> Result<u8, ArchiveError> {
        Ok(self.take(1)?[0])
    }

    /// Consume exactly `n` untagged bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], ArchiveError> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(ArchiveError::TruncatedFrame {
                needed: n,
                remaining,
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Consume a tag byte and its payload, checking the tag is `expected`.
    fn field(&mut self, expected: TypeTag) -> Result<&'a [u8], ArchiveError> {
        let raw = self.get_raw_u8()?;
        let found = TypeTag::from_u8(raw).ok_or(ArchiveError::UnknownTag(raw))?;
        if found != expected {
            return Err(ArchiveError::TagMismatch { expected, found });
        }
        self.take(found.width())
    }

    fn sized(&mut self) -> Result<&'a [u8], ArchiveError> {
        let len: i32 = self.get()?;
        let len = usize::try_from(len).map_err(|_| ArchiveError::InvalidLength(len))?;
        self.take(len)
    }

    /// Bytes not yet consumed.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Whether the whole buffer has been consumed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Current cursor offset from the start of the buffer.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }
}

/// A value that can be appended to an Archive Frame.
pub trait Encode {
    /// Append `self` to `w`.
    fn encode(&self, w: &mut ArchiveWriter) -> Result<(), ArchiveError>;
}

/// A value that can be read back from an Archive Frame.
pub trait Decode: Sized {
    /// Consume one value from `r`.
    fn decode(r: &mut ArchiveReader<'_>) -> Result<Self, ArchiveError>;
}

macro_rules! fixed_width {
    ($ty:ty, $tag:expr) => {
        impl Encode for $ty {
            fn encode(&self, w: &mut ArchiveWriter) -> Result<(), ArchiveError> {
                w.put_field($tag, &self.to_le_bytes())
            }
        }

        impl Decode for $ty {
            fn decode(r: &mut ArchiveReader<'_>) -> Result<Self, ArchiveError> {
                let bytes = r.field($tag)?;
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(bytes);
                Ok(<$ty>::from_le_bytes(raw))
            }
        }
    };
}

fixed_width!(i16, TypeTag::Short);
fixed_width!(i32, TypeTag::Int);
fixed_width!(f32, TypeTag::Float);
fixed_width!(i64, TypeTag::Long);
fixed_width!(u8, TypeTag::Char);

impl Encode for bool {
    fn encode(&self, w: &mut ArchiveWriter) -> Result<(), ArchiveError> {
        w.put_field(TypeTag::Bool, &[u8::from(*self)])
    }
}

impl Decode for bool {
    fn decode(r: &mut ArchiveReader<'_>) -> Result<Self, ArchiveError> {
        Ok(r.field(TypeTag::Bool)?[0] != 0)
    }
}

impl Encode for TimeValue {
    fn encode(&self, w: &mut ArchiveWriter) -> Result<(), ArchiveError> {
        w.put_field(TypeTag::Time, &self.0.to_le_bytes())
    }
}

impl Decode for TimeValue {
    fn decode(r: &mut ArchiveReader<'_>) -> Result<Self, ArchiveError> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(r.field(TypeTag::Time)?);
        Ok(TimeValue(i64::from_le_bytes(raw)))
    }
}

impl Encode for str {
    fn encode(&self, w: &mut ArchiveWriter) -> Result<(), ArchiveError> {
        w.put_sized(self.as_bytes())
    }
}

impl Encode for String {
    fn encode(&self, w: &mut ArchiveWriter) -> Result<(), ArchiveError> {
        self.as_str().encode(w)
    }
}

impl Decode for String {
    fn decode(r: &mut ArchiveReader<'_>) -> Result<Self, ArchiveError> {
        let bytes = r.sized()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ArchiveError::InvalidUtf8)
    }
}

impl Encode for [u8] {
    fn encode(&self, w: &mut ArchiveWriter) -> Result<(), ArchiveError> {
        w.put_sized(self)
    }
}

impl Encode for Vec<u8> {
    fn encode(&self, w: &mut ArchiveWriter) -> Result<(), ArchiveError> {
        self.as_slice().encode(w)
    }
}

impl Decode for Vec<u8> {
    fn decode(r: &mut ArchiveReader<'_>) -> Result<Self, ArchiveError> {
        Ok(r.sized()?.to_vec())
    }
}
