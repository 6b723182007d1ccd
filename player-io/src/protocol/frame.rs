//! Length-prefixed framing
//!
//! Every message on the TCP stream uses the same envelope in both directions:
//!
//! ```text
//! ┌──────────────────┬──────────────────────────┐
//! │ Length (4 bytes) │ Payload (variable)       │
//! │ Big-endian u32   │ Protobuf                 │
//! └──────────────────┴──────────────────────────┘
//! ```
//!
//! The socket is non-blocking, so a frame may arrive over several reads and
//! several simulation steps. [`FrameDecoder`] keeps the partial header and
//! body between calls and hands out a frame only once all of it is present.

use crate::error::{Error, Result};
use std::mem;

/// Size of the length prefix
pub const HEADER_LEN: usize = 4;

/// Upper bound for the initial body allocation; larger frames grow as bytes arrive
const MAX_PREALLOC: usize = 64 * 1024;

/// Outcome of one [`FrameDecoder::decode_step`] call
#[derive(Debug, Default, PartialEq)]
pub struct DecodeStep {
    /// Complete payload, if the call finished a frame
    pub frame: Option<Vec<u8>>,
    /// Bytes taken from the input slice
    pub consumed: usize,
}

/// Resumable decoder for one in-flight frame
#[derive(Debug, Default)]
pub struct FrameDecoder {
    header: [u8; HEADER_LEN],
    header_filled: usize,
    /// Payload length once the header is complete
    expected: Option<usize>,
    body: Vec<u8>,
    max_len: Option<usize>,
}

impl FrameDecoder {
    /// Decoder without a frame size limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder that rejects headers announcing more than `limit` bytes
    pub fn with_max_len(limit: usize) -> Self {
        Self {
            max_len: Some(limit),
            ..Self::default()
        }
    }

    /// Feed newly arrived bytes.
    ///
    /// Consumes at most one frame worth of input. Call again with
    /// `&available[step.consumed..]` while bytes remain.
    pub fn decode_step(&mut self, available: &[u8]) -> Result<DecodeStep> {
        let mut consumed = 0;

        let expected = match self.expected {
            Some(len) => len,
            None => {
                let take = (HEADER_LEN - self.header_filled).min(available.len());
                self.header[self.header_filled..self.header_filled + take]
                    .copy_from_slice(&available[..take]);
                self.header_filled += take;
                consumed += take;

                if self.header_filled < HEADER_LEN {
                    return Ok(DecodeStep {
                        frame: None,
                        consumed,
                    });
                }

                let len = u32::from_be_bytes(self.header) as usize;
                if let Some(limit) = self.max_len
                    && len > limit
                {
                    self.reset();
                    return Err(Error::FrameTooLarge { len, limit });
                }

                self.header_filled = 0;
                self.expected = Some(len);
                self.body = Vec::with_capacity(len.min(MAX_PREALLOC));
                len
            }
        };

        let rest = &available[consumed..];
        let take = (expected - self.body.len()).min(rest.len());
        self.body.extend_from_slice(&rest[..take]);
        consumed += take;

        if self.body.len() < expected {
            return Ok(DecodeStep {
                frame: None,
                consumed,
            });
        }

        self.expected = None;
        Ok(DecodeStep {
            frame: Some(mem::take(&mut self.body)),
            consumed,
        })
    }

    /// True when no partial header or body is buffered
    pub fn is_idle(&self) -> bool {
        self.expected.is_none() && self.header_filled == 0
    }

    /// Drop any partially received frame
    pub fn reset(&mut self) {
        self.header_filled = 0;
        self.expected = None;
        self.body = Vec::new();
    }
}

/// Prefix `payload` with its big-endian length
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    encode_into(payload, &mut out);
    out
}

/// Append a framed copy of `payload` to `out`
pub fn encode_into(payload: &[u8], out: &mut Vec<u8>) {
    write_header(payload.len(), out);
    out.extend_from_slice(payload);
}

/// Append the length prefix of a `len`-byte payload to `out`
pub fn write_header(len: usize, out: &mut Vec<u8>) {
    out.extend_from_slice(&(len as u32).to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Drive the decoder over `chunks`, collecting every completed frame
    fn feed_chunks<'a>(
        decoder: &mut FrameDecoder,
        chunks: impl IntoIterator<Item = &'a [u8]>,
    ) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        for chunk in chunks {
            let mut offset = 0;
            while offset < chunk.len() {
                let step = decoder.decode_step(&chunk[offset..]).unwrap();
                offset += step.consumed;
                if let Some(frame) = step.frame {
                    frames.push(frame);
                }
            }
        }
        frames
    }

    #[test]
    fn test_encode_prefix() {
        let framed = encode(b"abc");
        assert_eq!(framed, vec![0, 0, 0, 3, b'a', b'b', b'c']);
    }

    #[test]
    fn test_whole_frame() {
        let payload: Vec<u8> = (0..=255).collect();
        let framed = encode(&payload);

        let mut decoder = FrameDecoder::new();
        let step = decoder.decode_step(&framed).unwrap();
        assert_eq!(step.consumed, framed.len());
        assert_eq!(step.frame, Some(payload));
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_chunked_feeding() {
        let payload: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 251) as u8).collect();
        let framed = encode(&payload);

        for chunk_size in [1, 2, 3, 4, 5, 7, 64, 999] {
            let mut decoder = FrameDecoder::new();
            let frames = feed_chunks(&mut decoder, framed.chunks(chunk_size));
            assert_eq!(frames, vec![payload.clone()], "chunk size {}", chunk_size);
            assert!(decoder.is_idle());
        }
    }

    #[test]
    fn test_split_points() {
        let payload = b"split me anywhere".to_vec();
        let framed = encode(&payload);

        for a in 0..framed.len() {
            for b in a..framed.len() {
                let mut decoder = FrameDecoder::new();
                let frames = feed_chunks(
                    &mut decoder,
                    [&framed[..a], &framed[a..b], &framed[b..]],
                );
                assert_eq!(frames, vec![payload.clone()], "split at {} and {}", a, b);
            }
        }
    }

    #[test]
    fn test_partial_header_not_ready() {
        let mut decoder = FrameDecoder::new();
        let step = decoder.decode_step(&[0, 0]).unwrap();
        assert_eq!(step, DecodeStep { frame: None, consumed: 2 });
        assert!(!decoder.is_idle());

        let step = decoder.decode_step(&[0, 2, 9]).unwrap();
        assert_eq!(step, DecodeStep { frame: None, consumed: 3 });

        let step = decoder.decode_step(&[8]).unwrap();
        assert_eq!(step.frame, Some(vec![9, 8]));
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut stream = encode(b"first");
        encode_into(b"", &mut stream);
        encode_into(b"third", &mut stream);

        let mut decoder = FrameDecoder::new();
        let first = decoder.decode_step(&stream).unwrap();
        assert_eq!(first.frame.as_deref(), Some(&b"first"[..]));
        assert_eq!(first.consumed, 9);

        let frames = feed_chunks(&mut decoder, [&stream[first.consumed..]]);
        assert_eq!(frames, vec![Vec::new(), b"third".to_vec()]);
    }

    #[test]
    fn test_oversized_header_rejected() {
        let mut decoder = FrameDecoder::with_max_len(16);
        let err = decoder.decode_step(&encode(&[0u8; 17])).unwrap_err();
        assert!(matches!(err, Error::FrameTooLarge { len: 17, limit: 16 }));
        assert!(decoder.is_idle());

        let ok = decoder.decode_step(&encode(&[1u8; 16])).unwrap();
        assert_eq!(ok.frame, Some(vec![1u8; 16]));
    }

    #[test]
    fn test_reset_discards_partial_frame() {
        let mut decoder = FrameDecoder::new();
        decoder.decode_step(&[0, 0, 0, 10, 1, 2]).unwrap();
        decoder.reset();
        assert!(decoder.is_idle());

        let step = decoder.decode_step(&encode(b"ok")).unwrap();
        assert_eq!(step.frame, Some(b"ok".to_vec()));
    }
}
