//! Binary frames exchanged by two connected peers.
//!
//! Layout (all integers little-endian `u32`, strings are a `u32` byte
//! length followed by UTF-8):
//!
//! ```text
//! ┌──────┬──────────────────────────────────────────────────────┐
//! │ kind │ fields                                               │
//! ├──────┼──────────────────────────────────────────────────────┤
//! │  1   │ id:str  name:str  length:u32  mimeType:str           │  FileOffer
//! │  2   │ id:str                                               │  FileAccept
//! │  3   │ id:str  offset:u32  length:u32  bytes[length]        │  FileChunk
//! └──────┴──────────────────────────────────────────────────────┘
//! ```
//!
//! There is no checksum and no resynchronisation: the channel delivers
//! whole frames reliably and in order. Bytes after a complete frame are
//! ignored.

use crate::ProtocolError;

/// The one-byte discriminator at the start of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    FileOffer = 1,
    FileAccept = 2,
    FileChunk = 3,
}

impl TryFrom<u8> for FrameKind {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::FileOffer),
            2 => Ok(Self::FileAccept),
            3 => Ok(Self::FileChunk),
            other => Err(ProtocolError::UnknownFrameType(other)),
        }
    }
}

/// A decoded transfer frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// "I have a file for you": announced before any bytes move.
    FileOffer {
        id: String,
        name: String,
        length: u32,
        mime_type: String,
    },

    /// "Send me that file."
    FileAccept { id: String },

    /// One slice of a file starting at `offset`. The wire `length` field
    /// is `bytes.len()`.
    FileChunk {
        id: String,
        offset: u32,
        bytes: Vec<u8>,
    },
}

impl Frame {
    /// Returns the discriminator of this frame.
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::FileOffer { .. } => FrameKind::FileOffer,
            Self::FileAccept { .. } => FrameKind::FileAccept,
            Self::FileChunk { .. } => FrameKind::FileChunk,
        }
    }

    /// Serializes the frame.
    ///
    /// # Errors
    /// Returns [`ProtocolError::TooLarge`] if a string or the chunk
    /// payload does not fit a 32-bit length prefix.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut w = FrameWriter::with_capacity(self.encoded_len_hint());
        w.put_u8(self.kind() as u8);
        match self {
            Self::FileOffer {
                id,
                name,
                length,
                mime_type,
            } => {
                w.put_str(id)?;
                w.put_str(name)?;
                w.put_u32(*length);
                w.put_str(mime_type)?;
            }
            Self::FileAccept { id } => {
                w.put_str(id)?;
            }
            Self::FileChunk { id, offset, bytes } => {
                w.put_str(id)?;
                w.put_u32(*offset);
                w.put_u32(len_u32(bytes.len())?);
                w.put_bytes(bytes);
            }
        }
        Ok(w.into_inner())
    }

    /// Parses one frame from the front of `data`.
    ///
    /// # Errors
    /// [`ProtocolError::Truncated`], [`ProtocolError::UnknownFrameType`],
    /// or [`ProtocolError::InvalidUtf8`] for malformed input.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = FrameReader::new(data);
        let frame = match FrameKind::try_from(r.u8()?)? {
            FrameKind::FileOffer => Self::FileOffer {
                id: r.string()?,
                name: r.string()?,
                length: r.u32()?,
                mime_type: r.string()?,
            },
            FrameKind::FileAccept => Self::FileAccept { id: r.string()? },
            FrameKind::FileChunk => {
                let id = r.string()?;
                let offset = r.u32()?;
                let length = r.u32()? as usize;
                Self::FileChunk {
                    id,
                    offset,
                    bytes: r.bytes(length)?.to_vec(),
                }
            }
        };
        Ok(frame)
    }

    fn encoded_len_hint(&self) -> usize {
        match self {
            Self::FileOffer {
                id,
                name,
                mime_type,
                ..
            } => 1 + 16 + id.len() + name.len() + mime_type.len(),
            Self::FileAccept { id } => 1 + 4 + id.len(),
            Self::FileChunk { id, bytes, .. } => 1 + 12 + id.len() + bytes.len(),
        }
    }
}

fn len_u32(len: usize) -> Result<u32, ProtocolError> {
    u32::try_from(len).map_err(|_| ProtocolError::TooLarge(len))
}

// ---------------------------------------------------------------------------
// Cursor helpers
// ---------------------------------------------------------------------------

struct FrameWriter {
    buf: Vec<u8>,
}

impl FrameWriter {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn put_str(&mut self, value: &str) -> Result<(), ProtocolError> {
        self.put_u32(len_u32(value.len())?);
        self.put_bytes(value.as_bytes());
        Ok(())
    }

    fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

struct FrameReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn bytes(&mut self, needed: usize) -> Result<&'a [u8], ProtocolError> {
        let remaining = self.data.len() - self.pos;
        if needed > remaining {
            return Err(ProtocolError::Truncated { needed, remaining });
        }
        let slice = &self.data[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.bytes(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, ProtocolError> {
        let b = self.bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn string(&mut self) -> Result<String, ProtocolError> {
        let len = self.u32()? as usize;
        let bytes = self.bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
    }
}
