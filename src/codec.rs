//! Compressed value envelope.
//!
//! Stored payloads are a typed envelope rather than bare bytes: a one-byte
//! marker distinguishes raw from deflated JSON, so a reader can never
//! confuse the two. Compression is lossless (zlib via flate2) and applies
//! only above a configurable size threshold; small payloads stay raw.

use std::io::{Read, Write};

use bytes::{BufMut, Bytes, BytesMut};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::CacheConfig;
use crate::error::CodecError;

const MARKER_RAW: u8 = 0x00;
const MARKER_DEFLATE: u8 = 0x01;

/// Storage envelope: raw or deflated serialized value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    Raw(Bytes),
    Deflate(Bytes),
}

impl Envelope {
    /// Serialize the envelope to its wire form (marker byte + payload).
    pub fn to_bytes(&self) -> Bytes {
        let (marker, payload) = match self {
            Envelope::Raw(payload) => (MARKER_RAW, payload),
            Envelope::Deflate(payload) => (MARKER_DEFLATE, payload),
        };
        let mut buf = BytesMut::with_capacity(1 + payload.len());
        buf.put_u8(marker);
        buf.extend_from_slice(payload);
        buf.freeze()
    }

    /// Parse an envelope from its wire form.
    pub fn from_bytes(bytes: &Bytes) -> Result<Self, CodecError> {
        let Some((&marker, payload)) = bytes.split_first() else {
            return Err(CodecError::EmptyEnvelope);
        };
        match marker {
            MARKER_RAW => Ok(Envelope::Raw(Bytes::copy_from_slice(payload))),
            MARKER_DEFLATE => Ok(Envelope::Deflate(Bytes::copy_from_slice(payload))),
            marker => Err(CodecError::UnknownMarker { marker }),
        }
    }
}

/// Encodes responses into envelopes and back.
#[derive(Debug, Clone)]
pub struct ValueCodec {
    compression: bool,
    threshold_bytes: usize,
}

impl ValueCodec {
    pub fn new(compression: bool, threshold_bytes: usize) -> Self {
        Self {
            compression,
            threshold_bytes,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.compression, config.compression_threshold_bytes)
    }

    /// Serialize a value into envelope wire bytes.
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Bytes, CodecError> {
        let json = serde_json::to_vec(value).map_err(CodecError::Serialize)?;

        let envelope = if self.compression && json.len() >= self.threshold_bytes {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&json).map_err(CodecError::Compress)?;
            let deflated = encoder.finish().map_err(CodecError::Compress)?;
            Envelope::Deflate(Bytes::from(deflated))
        } else {
            Envelope::Raw(Bytes::from(json))
        };

        Ok(envelope.to_bytes())
    }

    /// Decode envelope wire bytes back into a value.
    pub fn decode<T: DeserializeOwned>(&self, bytes: &Bytes) -> Result<T, CodecError> {
        let json = match Envelope::from_bytes(bytes)? {
            Envelope::Raw(payload) => payload.to_vec(),
            Envelope::Deflate(payload) => {
                let mut decoder = ZlibDecoder::new(payload.as_ref());
                let mut inflated = Vec::new();
                decoder
                    .read_to_end(&mut inflated)
                    .map_err(CodecError::Decompress)?;
                inflated
            }
        };
        serde_json::from_slice(&json).map_err(CodecError::Deserialize)
    }
}
