use std::io;

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error as ThisError;
use tokio_util::codec::{Decoder, Encoder};

use crate::config::ParseMode;
use crate::frame::{self, ParseError, Reply};

#[derive(Debug, ThisError)]
pub enum CodecError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Turns a connection's accumulated input into commands, one array frame at a time, and appends
/// encoded replies to its pending output.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    mode: ParseMode,
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new(mode: ParseMode, max_frame_size: usize) -> FrameCodec {
        FrameCodec {
            mode,
            max_frame_size,
        }
    }
}

impl Decoder for FrameCodec {
    type Item = Vec<Bytes>;
    type Error = CodecError;

    /// Returns `Ok(None)` while the buffered input is not yet a whole frame. On any other error
    /// the rejected frame is discarded up to the next line that starts with an array marker, or
    /// the whole input if there is none, so a frame that follows a short one is still served.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        if src.len() > self.max_frame_size {
            src.clear();
            return Err(ParseError::FrameTooLarge(self.max_frame_size).into());
        }

        let decoded = match self.mode {
            // Marker-scan parsing can't tell where the frame ends, so it owns the whole input.
            ParseMode::Scan => frame::decode_array(&src[..]).map(|argv| (argv, src.len())),
            ParseMode::Strict => frame::decode_array_strict(&src[..]),
        };

        match decoded {
            Ok((argv, consumed)) => {
                src.advance(consumed);
                Ok(Some(argv))
            }
            Err(ParseError::Incomplete) => Ok(None),
            Err(err) => {
                match frame::next_frame_start(&src[..]) {
                    Some(start) => src.advance(start),
                    None => src.clear(),
                }
                Err(err.into())
            }
        }
    }
}

impl Encoder<Reply> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, reply: Reply, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&reply.serialize());
        Ok(())
    }
}
