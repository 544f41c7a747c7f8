//! Length-prefixed JSON framing for the native-messaging pipe.
//!
//! Every message is a 4-byte little-endian `u32` length followed by exactly that
//! many bytes of UTF-8 JSON. [`FrameCodec`] implements `tokio_util`'s
//! [`Decoder`]/[`Encoder`] so it can sit under `FramedRead`/`FramedWrite`; the
//! blocking helpers [`encode_message`] and [`decode_message`] work over any
//! `Read`/`Write`.

use std::io::Read;
use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};
use tokio_util::bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::FrameError;

/// Host -> browser limit (1 MiB).
pub const MAX_TO_BROWSER: usize = 1_048_576;
/// Browser -> host limit (64 MiB).
pub const MAX_FROM_BROWSER: usize = 64 * 1_048_576;

const PREFIX_LEN: usize = 4;

/// Codec for native-messaging frames carrying JSON payloads of type `T`.
///
/// Decoding yields `Result<T, FrameError>` items rather than failing the
/// stream, so one bad frame does not end the session:
///
/// - an incomplete prefix or body yields `Ok(None)` and consumes nothing;
/// - a payload that is not valid JSON for `T` is consumed and yielded as
///   `Some(Err(FrameError::Malformed(_)))`;
/// - a declared length above the inbound cap is yielded once as
///   `Some(Err(FrameError::TooLarge { .. }))` and its body is skipped as it
///   arrives.
pub struct FrameCodec<T> {
    max_inbound: usize,
    skipping: usize,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> Default for FrameCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FrameCodec<T> {
    pub fn new() -> Self {
        Self::with_max_inbound(MAX_FROM_BROWSER)
    }

    pub fn with_max_inbound(max_inbound: usize) -> Self {
        Self {
            max_inbound,
            skipping: 0,
            _phantom: PhantomData,
        }
    }

    fn skip_buffered(&mut self, src: &mut BytesMut) {
        let n = self.skipping.min(src.len());
        src.advance(n);
        self.skipping -= n;
    }
}

#[inline]
fn peek_len(src: &BytesMut) -> usize {
    u32::from_le_bytes([src[0], src[1], src[2], src[3]]) as usize
}

impl<T: DeserializeOwned> Decoder for FrameCodec<T> {
    type Item = Result<T, FrameError>;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.skipping > 0 {
            self.skip_buffered(src);
            if self.skipping > 0 {
                return Ok(None);
            }
        }

        if src.len() < PREFIX_LEN {
            src.reserve(PREFIX_LEN - src.len());
            return Ok(None);
        }

        let len = peek_len(src);
        if len > self.max_inbound {
            tracing::warn!(
                frame_len = len,
                max = self.max_inbound,
                "Skipping oversized inbound frame"
            );
            src.advance(PREFIX_LEN);
            self.skipping = len;
            self.skip_buffered(src);
            return Ok(Some(Err(FrameError::TooLarge {
                len,
                max: self.max_inbound,
            })));
        }

        let total = PREFIX_LEN + len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(PREFIX_LEN);
        let payload = src.split_to(len);
        tracing::trace!(frame_len = len, "Decoded frame");
        Ok(Some(
            serde_json::from_slice(&payload).map_err(FrameError::from),
        ))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(item) => Ok(Some(item)),
            None => {
                // The writer went away mid-frame; there is nobody left to answer.
                if !buf.is_empty() {
                    tracing::debug!(
                        trailing_bytes = buf.len(),
                        "Input closed inside a frame"
                    );
                    buf.clear();
                }
                Ok(None)
            }
        }
    }
}

impl<T, M: Serialize> Encoder<M> for FrameCodec<T> {
    type Error = FrameError;

    fn encode(&mut self, item: M, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_vec(&item)?;
        if json.len() > MAX_TO_BROWSER {
            return Err(FrameError::TooLarge {
                len: json.len(),
                max: MAX_TO_BROWSER,
            });
        }
        dst.reserve(PREFIX_LEN + json.len());
        dst.put_u32_le(json.len() as u32);
        dst.extend_from_slice(&json);
        Ok(())
    }
}

/// Encode any serde-serializable value into one frame:
/// 4-byte little-endian length + JSON bytes.
pub fn encode_message<T: Serialize>(msg: &T) -> Result<Vec<u8>, FrameError> {
    let mut buf = BytesMut::new();
    FrameCodec::<()>::new().encode(msg, &mut buf)?;
    Ok(buf.to_vec())
}

/// Read exactly one frame from a blocking reader and parse its payload.
pub fn decode_message<T: DeserializeOwned, R: Read>(
    reader: &mut R,
    max_size: usize,
) -> Result<T, FrameError> {
    let mut len_buf = [0u8; PREFIX_LEN];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;
    let cap = max_size.min(MAX_FROM_BROWSER);
    if len > cap {
        return Err(FrameError::TooLarge { len, max: cap });
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(serde_json::from_slice(&buf)?)
}
