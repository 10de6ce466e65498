//! Tokio codec for framed protocol messages

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::correlation::CorrelationId;
use crate::error::ProtocolError;
use crate::frame::{FrameHeader, MAX_PAYLOAD_SIZE};
use crate::message::Message;

/// A complete frame with header and payload
#[derive(Debug, Clone)]
pub struct Frame {
    /// Task this frame belongs to (CONTROL for connection-level frames)
    pub correlation_id: CorrelationId,
    /// The message payload
    pub message: Message,
}

impl Frame {
    /// Create a new frame
    pub fn new(correlation_id: CorrelationId, message: Message) -> Self {
        Self {
            correlation_id,
            message,
        }
    }

    /// Create a control frame (Register, Heartbeat, ...)
    pub fn control(message: Message) -> Self {
        Self::new(CorrelationId::CONTROL, message)
    }
}

/// Codec for encoding/decoding protocol frames
#[derive(Debug, Default)]
pub struct FrameCodec {
    /// Current header being decoded (if any)
    pending_header: Option<FrameHeader>,
}

impl FrameCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self {
            pending_header: None,
        }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Try to decode header if we don't have one
        let header = match self.pending_header.take() {
            Some(h) => h,
            None => match FrameHeader::decode(src)? {
                Some(h) => h,
                None => return Ok(None), // Need more data
            },
        };

        // Check payload length
        let payload_len = header.payload_length as usize;
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        // Check if we have enough data for the payload
        if src.len() < payload_len {
            // Save header and wait for more data
            self.pending_header = Some(header);
            return Ok(None);
        }

        // Extract payload
        let payload_bytes = src.split_to(payload_len).freeze();

        // Deserialize message
        let message: Message = bincode::deserialize(&payload_bytes)?;

        Ok(Some(Frame {
            correlation_id: header.correlation_id,
            message,
        }))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        // Serialize the message
        let payload = bincode::serialize(&frame.message)?;
        let payload_len = payload.len();

        // Check payload size
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        // Encode header
        let header = FrameHeader::new(
            frame.correlation_id,
            frame.message.message_type(),
            payload_len as u32,
        );
        header.encode(dst);

        // Append payload
        dst.extend_from_slice(&payload);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::HEADER_SIZE;
    use crate::task::{TaskKind, TaskResult};

    #[test]
    fn test_codec_command_roundtrip() {
        let mut codec = FrameCodec::new();
        let id = CorrelationId::generate();

        let frame = Frame::new(
            id,
            Message::Command {
                kind: TaskKind::Shell {
                    script: "echo hi".to_string(),
                },
            },
        );

        let mut buf = BytesMut::new();
        codec.encode(frame, &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.correlation_id, id);
        match decoded.message {
            Message::Command {
                kind: TaskKind::Shell { script },
            } => assert_eq!(script, "echo hi"),
            other => panic!("expected Command frame, got {:?}", other),
        }
    }

    #[test]
    fn test_codec_result_roundtrip() {
        let mut codec = FrameCodec::new();
        let id = CorrelationId::generate();
        let result = TaskResult::completed("hi\n".into(), String::new(), 0, 1_700_000_000_000);

        let frame = Frame::new(id, Message::TaskResult(result.clone()));

        let mut buf = BytesMut::new();
        codec.encode(frame, &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.correlation_id, id);
        match decoded.message {
            Message::TaskResult(r) => assert_eq!(r, result),
            other => panic!("expected TaskResult frame, got {:?}", other),
        }
    }

    #[test]
    fn test_codec_partial_read() {
        let mut codec = FrameCodec::new();

        let frame = Frame::control(Message::Heartbeat { timestamp: 12345 });

        let mut full_buf = BytesMut::new();
        codec.encode(frame, &mut full_buf).unwrap();

        // Split the buffer to simulate partial read
        let mut partial = full_buf.split_to(HEADER_SIZE - 1);

        // Should return None (need more data)
        assert!(codec.decode(&mut partial).unwrap().is_none());

        // Add the rest
        partial.extend_from_slice(&full_buf);

        // Now it should decode
        let decoded = codec.decode(&mut partial).unwrap().unwrap();
        if let Message::Heartbeat { timestamp } = decoded.message {
            assert_eq!(timestamp, 12345);
        } else {
            panic!("Expected Heartbeat message");
        }
    }

    #[test]
    fn test_codec_two_frames_in_one_buffer() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        codec
            .encode(Frame::control(Message::Heartbeat { timestamp: 1 }), &mut buf)
            .unwrap();
        codec
            .encode(Frame::control(Message::HeartbeatAck { timestamp: 1 }), &mut buf)
            .unwrap();

        let first = codec.decode(&mut buf).unwrap().unwrap();
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(first.message, Message::Heartbeat { .. }));
        assert!(matches!(second.message, Message::HeartbeatAck { .. }));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }
}
