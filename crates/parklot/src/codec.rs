//! Framed codec for the line-oriented protocol.
//!
//! Uses LinesCodec for framing + serde_json for serialization: one JSON
//! object per newline-terminated line, over any AsyncRead/AsyncWrite.

use std::io;
use std::marker::PhantomData;

use serde::{Serialize, de::DeserializeOwned};
use tokio_util::bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec};

/// Upper bound on a single request/response line.
const MAX_LINE_BYTES: usize = 64 * 1024;

/// Codec that frames messages by newline and serializes with JSON.
///
/// Wraps LinesCodec and adds serde_json serialization. A line that is not
/// valid JSON for `T` surfaces as `InvalidData`.
pub struct JsonLineCodec<T> {
    inner: LinesCodec,
    _phantom: PhantomData<T>,
}

impl<T> Default for JsonLineCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> JsonLineCodec<T> {
    pub fn new() -> Self {
        Self {
            inner: LinesCodec::new_with_max_length(MAX_LINE_BYTES),
            _phantom: PhantomData,
        }
    }
}

fn invalid_data(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

impl<T: DeserializeOwned> Decoder for JsonLineCodec<T> {
    type Item = T;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.inner.decode(src).map_err(invalid_data)? {
            Some(line) => Ok(Some(serde_json::from_str(&line).map_err(invalid_data)?)),
            None => Ok(None),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // A final line without a trailing newline still decodes.
        match self.inner.decode_eof(src).map_err(invalid_data)? {
            Some(line) => Ok(Some(serde_json::from_str(&line).map_err(invalid_data)?)),
            None => Ok(None),
        }
    }
}

impl<T: Serialize> Encoder<T> for JsonLineCodec<T> {
    type Error = io::Error;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_string(&item).map_err(invalid_data)?;
        self.inner.encode(json, dst).map_err(invalid_data)
    }
}
