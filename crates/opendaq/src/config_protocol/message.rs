//! Wire framing for the native config+streaming protocol: a fixed
//! header followed by a versioned JSON payload and, since v4, an
//! optional binary blob.

use serde::{Deserialize, Serialize};

use crate::config::PROTOCOL_VERSION_BINARY_BLOBS;
use crate::error::{Error, Result};

/// First byte of every frame, identifying what follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    Request = 0,
    Reply = 1,
    Notification = 2,
}

impl FrameKind {
    fn from_u8(b: u8) -> Result<Self> {
        match b {
            0 => Ok(FrameKind::Request),
            1 => Ok(FrameKind::Reply),
            2 => Ok(FrameKind::Notification),
            other => Err(Error::Codec(serde_json::Error::io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown frame kind {other}"),
            )))),
        }
    }
}

/// The verb a request names; dispatched by both the server and the
/// mirror-side client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "method", content = "params")]
pub enum RequestPayload {
    Handshake { client_version: u32 },
    GetComponentTreeSnapshot,
    GetPropertyValue { global_id: String, property: String },
    SetPropertyValue { global_id: String, property: String, value: serde_json::Value },
    CallProcedure { global_id: String, property: String, args: Vec<serde_json::Value> },
    CallFunction { global_id: String, property: String, args: Vec<serde_json::Value> },
    AddComponent { parent_global_id: String, local_id: String, kind: String },
    RemoveComponent { parent_global_id: String, local_id: String },
    Subscribe { global_id: String },
    Unsubscribe { global_id: String },
    LockDevice { global_id: String },
    UnlockDevice { global_id: String },
}

impl RequestPayload {
    /// Minimum protocol version this request requires; anything not
    /// named here is available since v1.
    #[must_use]
    pub fn min_version(&self) -> u32 {
        match self {
            RequestPayload::LockDevice { .. } | RequestPayload::UnlockDevice { .. } => {
                crate::config::MIN_VERSION_LOCK_DEVICE
            }
            RequestPayload::AddComponent { .. } | RequestPayload::RemoveComponent { .. } => {
                crate::config::MIN_VERSION_DYNAMIC_COMPONENTS
            }
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReplyPayload {
    Ok(serde_json::Value),
    Error { message: String },
}

/// One complete frame: a kind, a request id correlating replies to
/// requests, the JSON payload, and an optional binary blob (available
/// since [`PROTOCOL_VERSION_BINARY_BLOBS`]; earlier versions inline
/// binary data as base64 within the JSON payload instead).
#[derive(Debug, Clone)]
pub struct Frame {
    pub kind: FrameKind,
    pub request_id: u64,
    pub json: serde_json::Value,
    pub blob: Option<Vec<u8>>,
}

impl Frame {
    /// Encode as `[kind:1][len:4][request_id:8][json][blob?]`.
    pub fn encode(&self, protocol_version: u32) -> Result<Vec<u8>> {
        let json_bytes = serde_json::to_vec(&self.json)?;
        let mut out = Vec::with_capacity(1 + 4 + 8 + json_bytes.len());
        out.push(self.kind as u8);
        let blob_len = if protocol_version >= PROTOCOL_VERSION_BINARY_BLOBS {
            self.blob.as_ref().map_or(0, Vec::len)
        } else {
            0
        };
        let total_len = (json_bytes.len() + blob_len) as u32;
        out.extend_from_slice(&total_len.to_be_bytes());
        out.extend_from_slice(&self.request_id.to_be_bytes());
        out.extend_from_slice(&json_bytes);
        if protocol_version >= PROTOCOL_VERSION_BINARY_BLOBS {
            if let Some(blob) = &self.blob {
                out.extend_from_slice(blob);
            }
        }
        Ok(out)
    }

    /// Decode a frame whose JSON body length is already known (the blob,
    /// if any, is everything after it — callers split that themselves
    /// once the JSON value's trailing byte offset is known).
    pub fn decode_header(bytes: &[u8]) -> Result<(FrameKind, u32, u64, &[u8])> {
        if bytes.len() < 13 {
            return Err(Error::Codec(serde_json::Error::io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "frame header truncated",
            ))));
        }
        let kind = FrameKind::from_u8(bytes[0])?;
        let len = u32::from_be_bytes(bytes[1..5].try_into().unwrap());
        let request_id = u64::from_be_bytes(bytes[5..13].try_into().unwrap());
        Ok((kind, len, request_id, &bytes[13..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trips_through_encode_and_decode_header() {
        let frame = Frame {
            kind: FrameKind::Request,
            request_id: 42,
            json: serde_json::json!({"method": "GetComponentTreeSnapshot"}),
            blob: None,
        };
        let bytes = frame.encode(1).unwrap();
        let (kind, len, request_id, body) = Frame::decode_header(&bytes).unwrap();
        assert_eq!(kind, FrameKind::Request);
        assert_eq!(request_id, 42);
        assert_eq!(len as usize, body.len());
        let decoded: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(decoded, frame.json);
    }

    #[test]
    fn blob_is_omitted_below_the_binary_blob_protocol_version() {
        let frame = Frame {
            kind: FrameKind::Notification,
            request_id: 1,
            json: serde_json::json!(null),
            blob: Some(vec![1, 2, 3]),
        };
        let bytes = frame.encode(PROTOCOL_VERSION_BINARY_BLOBS - 1).unwrap();
        let (_, len, _, body) = Frame::decode_header(&bytes).unwrap();
        assert_eq!(len as usize, body.len());
        assert_eq!(body, b"null");
    }

    #[test]
    fn blob_is_appended_at_or_above_the_binary_blob_protocol_version() {
        let frame = Frame {
            kind: FrameKind::Notification,
            request_id: 1,
            json: serde_json::json!(null),
            blob: Some(vec![1, 2, 3]),
        };
        let bytes = frame.encode(PROTOCOL_VERSION_BINARY_BLOBS).unwrap();
        let (_, len, _, body) = Frame::decode_header(&bytes).unwrap();
        assert_eq!(len as usize, body.len());
        assert_eq!(&body[body.len() - 3..], &[1, 2, 3]);
    }

    #[test]
    fn decode_header_rejects_a_truncated_frame() {
        assert!(Frame::decode_header(&[0u8; 5]).is_err());
    }

    #[test]
    fn decode_header_rejects_an_unknown_frame_kind() {
        let mut bytes = vec![7u8];
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&0u64.to_be_bytes());
        assert!(Frame::decode_header(&bytes).is_err());
    }

    #[test]
    fn min_version_gates_lock_and_dynamic_component_requests() {
        assert_eq!(RequestPayload::LockDevice { global_id: "dev".to_string() }.min_version(), crate::config::MIN_VERSION_LOCK_DEVICE);
        assert_eq!(
            RequestPayload::AddComponent { parent_global_id: "dev".to_string(), local_id: "ch0".to_string(), kind: "Channel".to_string() }
                .min_version(),
            crate::config::MIN_VERSION_DYNAMIC_COMPONENTS
        );
        assert_eq!(RequestPayload::GetComponentTreeSnapshot.min_version(), 1);
    }
}
