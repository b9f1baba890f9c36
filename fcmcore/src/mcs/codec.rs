/// MCS wire framing
///
/// Each frame is `tag (u8) | size (varint) | protobuf payload`. The first frame
/// in each direction is additionally preceded by a single version byte.
use super::{MAX_FRAME_SIZE, MAX_VARINT_LEN, MCS_VERSION, McsTag};
use bytes::{Buf, Bytes, BytesMut};
use log::trace;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("varint overflow: more than {MAX_VARINT_LEN} bytes")]
    VarintOverflow,
    #[error("frame is too large (max: {max}, got: {got})")]
    FrameTooLarge { max: usize, got: u64 },
    #[error("encode: {0}")]
    Encode(#[from] prost::EncodeError),
}

/// Encodes `msg` as a single MCS frame, optionally prefixed by the version byte.
pub fn encode_frame<M: prost::Message>(
    tag: McsTag,
    msg: &M,
    with_version: bool,
) -> Result<Vec<u8>, CodecError> {
    let payload_len = msg.encoded_len();
    let mut data = Vec::with_capacity(2 + prost::length_delimiter_len(payload_len) + payload_len);
    if with_version {
        data.push(MCS_VERSION);
    }
    data.push(tag as u8);
    msg.encode_length_delimited(&mut data)?;
    Ok(data)
}

/// One undecoded stanza.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McsFrame {
    pub tag: u8,
    pub payload: Bytes,
}

impl McsFrame {
    /// The known tag, or the raw byte when the server sent something newer.
    pub fn tag(&self) -> Result<McsTag, u8> {
        McsTag::try_from(self.tag)
    }

    pub fn decode<M: prost::Message + Default>(&self) -> Result<M, prost::DecodeError> {
        M::decode(self.payload.clone())
    }
}

/// Buffers a byte stream and yields complete frames.
pub struct McsDecoder {
    buffer: BytesMut,
    expect_version: bool,
    version: Option<u8>,
}

impl McsDecoder {
    /// A decoder for a fresh connection direction, which starts with a
    /// version byte.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
            expect_version: true,
            version: None,
        }
    }

    /// A decoder for a stream whose version byte was already consumed.
    pub fn without_version() -> Self {
        Self {
            buffer: BytesMut::new(),
            expect_version: false,
            version: None,
        }
    }

    /// The version byte the peer announced, once it has been read.
    pub fn version(&self) -> Option<u8> {
        self.version
    }

    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next complete frame from the buffer.
    ///
    /// Returns `Ok(None)` until enough bytes have arrived. An error means the
    /// stream is desynchronised and the connection should be dropped.
    pub fn decode_frame(&mut self) -> Result<Option<McsFrame>, CodecError> {
        if self.expect_version {
            if self.buffer.is_empty() {
                return Ok(None);
            }
            let version = self.buffer[0];
            self.buffer.advance(1);
            self.expect_version = false;
            self.version = Some(version);
            trace!("<-- MCS version byte: {version}");
        }

        if self.buffer.is_empty() {
            return Ok(None);
        }

        let Some((size, varint_len)) = peek_varint(&self.buffer[1..])? else {
            return Ok(None);
        };
        if size > MAX_FRAME_SIZE as u64 {
            return Err(CodecError::FrameTooLarge {
                max: MAX_FRAME_SIZE,
                got: size,
            });
        }
        let size = size as usize;
        let header_len = 1 + varint_len;
        if self.buffer.len() < header_len + size {
            return Ok(None);
        }

        let tag = self.buffer[0];
        self.buffer.advance(header_len);
        let payload = self.buffer.split_to(size).freeze();
        trace!("<-- Decoded frame: tag {tag}, {size} bytes");
        Ok(Some(McsFrame { tag, payload }))
    }
}

impl Default for McsDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads a base-128 varint from the front of `buf` without consuming it.
/// Returns the value and its encoded length, or `None` if more bytes are needed.
fn peek_varint(buf: &[u8]) -> Result<Option<(u64, usize)>, CodecError> {
    let mut value = 0u64;
    for (i, &b) in buf.iter().take(MAX_VARINT_LEN).enumerate() {
        value |= u64::from(b & 0x7f) << (7 * i);
        if b & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
    }
    if buf.len() >= MAX_VARINT_LEN {
        return Err(CodecError::VarintOverflow);
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::mcs::{AppData, DataMessageStanza, HeartbeatAck, HeartbeatPing};

    #[test]
    fn test_encode_frame_with_version() {
        let ping = HeartbeatPing {
            stream_id: Some(1),
            ..Default::default()
        };
        let encoded = encode_frame(McsTag::HeartbeatPing, &ping, true).unwrap();

        assert_eq!(encoded[0], MCS_VERSION);
        assert_eq!(encoded[1], McsTag::HeartbeatPing as u8);
        assert_eq!(encoded[2] as usize, encoded.len() - 3);
    }

    #[test]
    fn test_encode_empty_message() {
        let encoded = encode_frame(McsTag::HeartbeatAck, &HeartbeatAck::default(), false).unwrap();
        assert_eq!(encoded, vec![McsTag::HeartbeatAck as u8, 0]);
    }

    #[test]
    fn test_decoder_reads_version_then_frames() {
        let ack = encode_frame(McsTag::HeartbeatAck, &HeartbeatAck::default(), true).unwrap();
        let mut decoder = McsDecoder::new();
        decoder.feed(&ack);

        let frame = decoder.decode_frame().unwrap().expect("frame");
        assert_eq!(decoder.version(), Some(MCS_VERSION));
        assert_eq!(frame.tag(), Ok(McsTag::HeartbeatAck));
        assert!(frame.payload.is_empty());
        assert!(decoder.decode_frame().unwrap().is_none());
    }

    #[test]
    fn test_decoder_handles_split_input() {
        let msg = DataMessageStanza {
            from: "sender".to_string(),
            category: "com.example".to_string(),
            persistent_id: Some("0:1234%abcdef".to_string()),
            app_data: vec![AppData {
                key: "k".to_string(),
                value: "x".repeat(300),
            }],
            ..Default::default()
        };
        let bytes = encode_frame(McsTag::DataMessageStanza, &msg, false).unwrap();
        // 300+ byte payload needs a two byte size varint
        assert!(bytes[1] & 0x80 != 0);

        let mut decoder = McsDecoder::without_version();
        for chunk in bytes.chunks(7) {
            assert!(decoder.decode_frame().unwrap().is_none());
            decoder.feed(chunk);
        }
        let frame = decoder.decode_frame().unwrap().expect("frame");
        assert_eq!(frame.tag(), Ok(McsTag::DataMessageStanza));
        let decoded: DataMessageStanza = frame.decode().unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_decoder_multiple_frames_in_one_read() {
        let mut data = encode_frame(McsTag::HeartbeatPing, &HeartbeatPing::default(), true).unwrap();
        data.extend(encode_frame(McsTag::HeartbeatAck, &HeartbeatAck::default(), false).unwrap());

        let mut decoder = McsDecoder::new();
        decoder.feed(&data);
        assert_eq!(
            decoder.decode_frame().unwrap().unwrap().tag(),
            Ok(McsTag::HeartbeatPing)
        );
        assert_eq!(
            decoder.decode_frame().unwrap().unwrap().tag(),
            Ok(McsTag::HeartbeatAck)
        );
        assert!(decoder.decode_frame().unwrap().is_none());
    }

    #[test]
    fn test_unknown_tag_is_still_framed() {
        let mut decoder = McsDecoder::without_version();
        decoder.feed(&[42, 2, 0xAA, 0xBB]);
        let frame = decoder.decode_frame().unwrap().unwrap();
        assert_eq!(frame.tag(), Err(42));
        assert_eq!(&frame.payload[..], &[0xAA, 0xBB]);
    }

    #[test]
    fn test_varint_overflow() {
        let mut decoder = McsDecoder::without_version();
        let mut data = vec![McsTag::DataMessageStanza as u8];
        data.extend([0xFF; 10]);
        decoder.feed(&data);
        assert!(matches!(
            decoder.decode_frame(),
            Err(CodecError::VarintOverflow)
        ));
    }

    #[test]
    fn test_ten_byte_varint_is_accepted_until_size_check() {
        // Nine continuation bytes and a terminator is the longest legal varint.
        let mut decoder = McsDecoder::without_version();
        let mut data = vec![McsTag::DataMessageStanza as u8];
        data.extend([0x80; 9]);
        data.push(0x01);
        decoder.feed(&data);
        assert!(matches!(
            decoder.decode_frame(),
            Err(CodecError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_incomplete_varint_waits() {
        let mut decoder = McsDecoder::without_version();
        decoder.feed(&[McsTag::DataMessageStanza as u8, 0x80, 0x80]);
        assert!(decoder.decode_frame().unwrap().is_none());
    }
}
