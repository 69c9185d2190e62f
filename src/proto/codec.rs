use bytes::Bytes;
use prost::Message;
use thiserror::Error;

/// Wire message types the observer recognizes. Responses are valid
/// traffic but carry no query identity.
pub const MSG_GET_REQ: u8 = 0x09;
pub const MSG_GET_RESP: u8 = 0x0A;
pub const MSG_PUT_REQ: u8 = 0x0B;
pub const MSG_PUT_RESP: u8 = 0x0C;

/// GET request payload schema. Only the two identity fields are modeled;
/// the decoder skips everything else the full schema carries.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetReq {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub bucket: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub key: Option<Vec<u8>>,
}

/// PUT request payload schema, same identity fields as [`GetReq`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PutReq {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub bucket: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub key: Option<Vec<u8>>,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed request payload: {0}")]
    Schema(#[from] prost::DecodeError),

    /// The wire schema marks bucket and key required; their absence means
    /// we are not looking at a real request payload.
    #[error("request payload missing required field {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Put => "put",
        }
    }
}

/// Identity carried by a decoded GET or PUT request.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMessage {
    pub method: Method,
    pub bucket: Bytes,
    pub key: Bytes,
}

/// Decode the query identity out of one carved frame.
///
/// GET/PUT responses and unrecognized types yield `Ok(None)`. A schema
/// failure yields an error the flow listener treats as "drop this frame,
/// keep the current sync state".
pub fn decode(msg_type: u8, payload: &[u8]) -> Result<Option<QueryMessage>, DecodeError> {
    match msg_type {
        MSG_GET_REQ => decode_get(payload).map(Some),
        MSG_PUT_REQ => decode_put(payload).map(Some),
        _ => Ok(None),
    }
}

/// Decode a payload under the GET request schema. Also serves as the
/// final alignment test when a flow synchronizes.
pub fn decode_get(payload: &[u8]) -> Result<QueryMessage, DecodeError> {
    let req = GetReq::decode(payload)?;
    Ok(QueryMessage {
        method: Method::Get,
        bucket: required(req.bucket, "bucket")?,
        key: required(req.key, "key")?,
    })
}

fn decode_put(payload: &[u8]) -> Result<QueryMessage, DecodeError> {
    let req = PutReq::decode(payload)?;
    Ok(QueryMessage {
        method: Method::Put,
        bucket: required(req.bucket, "bucket")?,
        key: required(req.key, "key")?,
    })
}

fn required(field: Option<Vec<u8>>, name: &'static str) -> Result<Bytes, DecodeError> {
    field.map(Bytes::from).ok_or(DecodeError::MissingField(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_payload(bucket: &[u8], key: &[u8]) -> Vec<u8> {
        GetReq {
            bucket: Some(bucket.to_vec()),
            key: Some(key.to_vec()),
        }
        .encode_to_vec()
    }

    fn put_payload(bucket: &[u8], key: &[u8]) -> Vec<u8> {
        PutReq {
            bucket: Some(bucket.to_vec()),
            key: Some(key.to_vec()),
        }
        .encode_to_vec()
    }

    #[test]
    fn decodes_get_request() {
        let msg = decode(MSG_GET_REQ, &get_payload(b"users", b"42"))
            .unwrap()
            .unwrap();
        assert_eq!(msg.method, Method::Get);
        assert_eq!(&msg.bucket[..], b"users");
        assert_eq!(&msg.key[..], b"42");
    }

    #[test]
    fn decodes_put_request() {
        let msg = decode(MSG_PUT_REQ, &put_payload(b"events", b"e-1"))
            .unwrap()
            .unwrap();
        assert_eq!(msg.method, Method::Put);
        assert_eq!(&msg.bucket[..], b"events");
        assert_eq!(&msg.key[..], b"e-1");
    }

    #[test]
    fn responses_carry_no_identity() {
        assert_eq!(decode(MSG_GET_RESP, b"").unwrap(), None);
        assert_eq!(decode(MSG_PUT_RESP, &[0x08, 0x01]).unwrap(), None);
    }

    #[test]
    fn unknown_types_carry_no_identity() {
        assert_eq!(decode(0x00, b"").unwrap(), None);
        assert_eq!(decode(0x2A, b"anything").unwrap(), None);
    }

    #[test]
    fn missing_key_is_a_decode_error() {
        let payload = GetReq {
            bucket: Some(b"users".to_vec()),
            key: None,
        }
        .encode_to_vec();
        assert!(matches!(
            decode_get(&payload),
            Err(DecodeError::MissingField("key"))
        ));
    }

    #[test]
    fn truncated_payload_is_a_decode_error() {
        // Field 1, length-delimited, claims 100 bytes that are not there.
        assert!(matches!(
            decode_get(&[0x0A, 0x64]),
            Err(DecodeError::Schema(_))
        ));
    }

    #[test]
    fn empty_payload_fails_the_required_check() {
        assert!(decode_get(b"").is_err());
    }
}
