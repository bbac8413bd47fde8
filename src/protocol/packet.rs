//! Custom1 frame codec
//!
//! The Custom1 protocol carries a single framed message per connection. All
//! integers are big-endian. Wire layout:
//!
//! ```text
//! message_id      u16     0x0501 = login
//! packet_length   u16     declared length, not authoritative
//! version         u16
//! reserved1       u16
//! packet_length_4 u32     declared length again, not authoritative
//! field1_len      u16     followed by field1 bytes (login: session ticket)
//! reserved2       u16
//! field2_len      u16     followed by field2 bytes (login: 256 hex chars)
//! field3_len      u16     followed by field3 bytes (reserved)
//! crc32           u32     trailing checksum, parsed but not validated
//! ```
//!
//! The declared lengths are carried through decode/encode untouched; only the
//! per-field length prefixes drive parsing. The frame must account for every
//! received byte: anything left over after the trailer is a decode error.

use bytes::{BufMut, BytesMut};

use crate::error::FrameError;

/// Message id of the Custom1 login request
pub const LOGIN_MESSAGE_ID: u16 = 0x0501;

/// Preflight minimum buffer size checked before any parsing: the 12-byte
/// fixed header plus the field1 length prefix, reserved2, and the field2
/// length prefix. Shorter buffers cannot be anything valid.
pub const MIN_FRAME_LEN: usize = 18;

/// Wire size of a frame with all three fields empty: 12-byte header, three
/// 2-byte length prefixes, reserved2, 4-byte CRC trailer.
pub const EMPTY_FRAME_LEN: usize = 24;

/// A decoded Custom1 frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Custom1Frame {
    pub message_id: u16,
    pub packet_length: u16,
    pub version: u16,
    pub reserved1: u16,
    pub packet_length_4: u32,
    pub field1: Vec<u8>,
    pub reserved2: u16,
    pub field2: Vec<u8>,
    pub field3: Vec<u8>,
    pub crc32: u32,
}

impl Custom1Frame {
    /// Decode a frame from a fully-received buffer.
    ///
    /// Every multi-byte read is bounds-checked; a buffer that ends mid-field
    /// yields [`FrameError::Truncated`] with the offset where decoding
    /// stopped. Leftover bytes after the CRC trailer yield
    /// [`FrameError::FieldLengthMismatch`].
    pub fn decode(data: &[u8]) -> Result<Self, FrameError> {
        if data.len() < MIN_FRAME_LEN {
            return Err(FrameError::Truncated {
                offset: 0,
                needed: MIN_FRAME_LEN - data.len(),
            });
        }

        let mut reader = FrameReader::new(data);

        let message_id = reader.read_u16()?;
        let packet_length = reader.read_u16()?;
        let version = reader.read_u16()?;
        let reserved1 = reader.read_u16()?;
        let packet_length_4 = reader.read_u32()?;

        let field1_len = reader.read_u16()? as usize;
        let field1 = reader.take(field1_len)?.to_vec();

        let reserved2 = reader.read_u16()?;

        let field2_len = reader.read_u16()? as usize;
        let field2 = reader.take(field2_len)?.to_vec();

        let field3_len = reader.read_u16()? as usize;
        let field3 = reader.take(field3_len)?.to_vec();

        let crc32 = reader.read_u32()?;

        let leftover = reader.remaining();
        if leftover > 0 {
            return Err(FrameError::FieldLengthMismatch { leftover });
        }

        Ok(Self {
            message_id,
            packet_length,
            version,
            reserved1,
            packet_length_4,
            field1,
            reserved2,
            field2,
            field3,
            crc32,
        })
    }

    /// Encode the frame back to wire bytes.
    ///
    /// The per-field length prefixes are recomputed from the actual field
    /// sizes, so `decode(encode(f)) == f` for any frame whose fields fit in a
    /// u16 length prefix. The declared `packet_length`/`packet_length_4` and
    /// the CRC trailer are written as-is.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(EMPTY_FRAME_LEN + self.fields_len());

        buf.put_u16(self.message_id);
        buf.put_u16(self.packet_length);
        buf.put_u16(self.version);
        buf.put_u16(self.reserved1);
        buf.put_u32(self.packet_length_4);

        buf.put_u16(self.field1.len() as u16);
        buf.put_slice(&self.field1);

        buf.put_u16(self.reserved2);

        buf.put_u16(self.field2.len() as u16);
        buf.put_slice(&self.field2);

        buf.put_u16(self.field3.len() as u16);
        buf.put_slice(&self.field3);

        buf.put_u32(self.crc32);

        buf.to_vec()
    }

    /// Whether this frame is a login request
    pub fn is_login(&self) -> bool {
        self.message_id == LOGIN_MESSAGE_ID
    }

    /// Total length of the frame on the wire
    pub fn wire_len(&self) -> usize {
        EMPTY_FRAME_LEN + self.fields_len()
    }

    /// CRC-32 over everything except the 4-byte trailer.
    ///
    /// The legacy clients send a trailer the server never verifies; this
    /// helper exists for diagnostics and tests only.
    pub fn body_crc32(&self) -> u32 {
        let encoded = self.encode();
        crc32fast::hash(&encoded[..encoded.len() - 4])
    }

    fn fields_len(&self) -> usize {
        self.field1.len() + self.field2.len() + self.field3.len()
    }
}

/// Bounds-checked big-endian reader over a received buffer
struct FrameReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], FrameError> {
        if self.remaining() < len {
            return Err(FrameError::Truncated {
                offset: self.pos,
                needed: len - self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_u16(&mut self) -> Result<u16, FrameError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, FrameError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}
