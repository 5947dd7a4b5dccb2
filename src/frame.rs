// https://redis.io/docs/reference/protocol-spec

use std::fmt;

use bytes::Bytes;
use thiserror::Error as ThisError;

static CRLF: &[u8; 2] = b"\r\n";

/// Reply sent for every failure on the request path: decode errors, unknown commands, missing
/// arguments and a full store all look the same to the client.
pub static NULL: &[u8; 4] = b"-1\r\n";

/// Longest length field accepted while still waiting for its CRLF (`usize::MAX` has 20 digits,
/// plus an optional sign).
const MAX_LENGTH_DIGITS: usize = 21;

/// Upper bound for the argv preallocation, the element count comes straight from the wire.
const MAX_PREALLOCATED_ELEMENTS: usize = 64;

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum ParseError {
    #[error("not enough data is available to parse an entire frame")]
    Incomplete,
    #[error("protocol error; invalid length field")]
    MalformedLength,
    #[error("protocol error; missing CRLF terminator")]
    Truncated,
    #[error("protocol error; expected bulk string, got marker {:?}", marker(.0))]
    UnexpectedMarker(u8),
    #[error("unsupported frame type {:?}", marker(.0))]
    UnsupportedFrame(u8),
    #[error("frame size exceeds limit of {0} bytes")]
    FrameTooLarge(usize),
}

/// Fixed status replies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Pong,
    Ok,
}

impl Status {
    fn as_str(&self) -> &'static str {
        match self {
            Status::Pong => "PONG",
            Status::Ok => "OK",
        }
    }
}

/// Everything the server can answer with.
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    Simple(Status),
    Bulk(Bytes),
    Null,
}

impl Reply {
    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Reply::Simple(status) => encode_simple(*status),
            Reply::Bulk(bytes) => encode_bulk_string(bytes),
            Reply::Null => NULL.to_vec(),
        }
    }
}

impl From<Reply> for Vec<u8> {
    fn from(reply: Reply) -> Self {
        reply.serialize()
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Simple(status) => write!(f, "+{}", status.as_str()),
            Reply::Bulk(bytes) if bytes.is_empty() => write!(f, "-1"),
            Reply::Bulk(bytes) => write!(f, "{:?}", String::from_utf8_lossy(bytes)),
            Reply::Null => write!(f, "-1"),
        }
    }
}

/// Decodes `$<length>\r\n<data>\r\n` from the start of `src`.
///
/// Returns the payload and the number of bytes the whole encoding occupied.
pub fn decode_bulk_string(src: &[u8]) -> Result<(Bytes, usize), ParseError> {
    match src.first() {
        None => return Err(ParseError::Incomplete),
        Some(b'$') => {}
        Some(&byte) => return Err(ParseError::UnexpectedMarker(byte)),
    }

    let (length, header) = parse_length(src)?;
    let end = header
        .checked_add(length)
        .ok_or(ParseError::MalformedLength)?;
    let frame_end = end
        .checked_add(CRLF.len())
        .ok_or(ParseError::MalformedLength)?;

    if src.len() > end && src[end] != CRLF[0] {
        return Err(ParseError::Truncated);
    }
    if src.len() < frame_end {
        return Err(ParseError::Incomplete);
    }
    if &src[end..frame_end] != CRLF {
        return Err(ParseError::Truncated);
    }

    Ok((Bytes::copy_from_slice(&src[header..end]), frame_end))
}

/// Decodes `*<count>\r\n` followed by `count` bulk strings.
///
/// Every element after the first is found by scanning forward for the next `$` byte, starting
/// right after the previous element's marker. The decoded length is not used to skip the
/// payload, so a payload that contains `$` shifts every later element.
///
/// An array marker at the start of a line, met before the next `$`, begins another frame: the
/// current one declared more elements than it carries and is `Truncated`.
pub fn decode_array(src: &[u8]) -> Result<Vec<Bytes>, ParseError> {
    let (count, mut position) = parse_array_header(src)?;

    let mut elements = Vec::with_capacity(count.min(MAX_PREALLOCATED_ELEMENTS));
    for _ in 0..count {
        let start = (position..src.len())
            .find(|&i| src[i] == b'$' || is_frame_start(src, i))
            .ok_or(ParseError::Incomplete)?;

        if src[start] != b'$' {
            return Err(ParseError::Truncated);
        }

        let (element, _) = decode_bulk_string(&src[start..])?;
        elements.push(element);
        position = start + 1;
    }

    Ok(elements)
}

/// Like [`decode_array`] but consumes exactly the declared lengths, returning the number of bytes
/// the whole array occupied. An array marker where an element should begin makes the frame
/// `Truncated`.
pub fn decode_array_strict(src: &[u8]) -> Result<(Vec<Bytes>, usize), ParseError> {
    let (count, mut position) = parse_array_header(src)?;

    let mut elements = Vec::with_capacity(count.min(MAX_PREALLOCATED_ELEMENTS));
    for _ in 0..count {
        if is_frame_start(src, position) {
            return Err(ParseError::Truncated);
        }

        let (element, consumed) = decode_bulk_string(&src[position..])?;
        elements.push(element);
        position += consumed;
    }

    Ok((elements, position))
}

/// Encodes `value` as `$<len>\r\n<value>\r\n`. An empty value is encoded as the null marker.
pub fn encode_bulk_string(value: &[u8]) -> Vec<u8> {
    if value.is_empty() {
        return NULL.to_vec();
    }

    let length = value.len().to_string();
    let mut bytes = Vec::with_capacity(1 + length.len() + CRLF.len() + value.len() + CRLF.len());
    bytes.push(b'$');
    bytes.extend_from_slice(length.as_bytes());
    bytes.extend_from_slice(CRLF);
    bytes.extend_from_slice(value);
    bytes.extend_from_slice(CRLF);
    bytes
}

pub fn encode_simple(status: Status) -> Vec<u8> {
    let s = status.as_str();
    let mut bytes = Vec::with_capacity(1 + s.len() + CRLF.len());
    bytes.push(b'+');
    bytes.extend_from_slice(s.as_bytes());
    bytes.extend_from_slice(CRLF);
    bytes
}

fn parse_array_header(src: &[u8]) -> Result<(usize, usize), ParseError> {
    match src.first() {
        None => Err(ParseError::Incomplete),
        Some(b'*') => parse_length(src),
        Some(&byte) => Err(ParseError::UnsupportedFrame(byte)),
    }
}

/// Parses the decimal length that follows the marker byte at `src[0]`. Returns the length and
/// the offset right after its CRLF.
fn parse_length(src: &[u8]) -> Result<(usize, usize), ParseError> {
    let line_end = match find_crlf(&src[1..]) {
        Some(index) => 1 + index,
        // Room for the digits and a dangling '\r'.
        None if src.len() - 1 > MAX_LENGTH_DIGITS + 1 => return Err(ParseError::MalformedLength),
        None => return Err(ParseError::Incomplete),
    };

    let length = std::str::from_utf8(&src[1..line_end])
        .ok()
        .and_then(|digits| digits.parse::<usize>().ok())
        .ok_or(ParseError::MalformedLength)?;

    Ok((length, line_end + CRLF.len()))
}

/// Offset of the first array marker that starts a line after `src[0]`, where decoding can pick
/// up again once the frame at the front has been rejected.
pub fn next_frame_start(src: &[u8]) -> Option<usize> {
    (1..src.len()).find(|&i| is_frame_start(src, i))
}

fn is_frame_start(src: &[u8], i: usize) -> bool {
    src.get(i) == Some(&b'*') && (i == 0 || src[i - 1] == b'\n')
}

fn marker(byte: &u8) -> char {
    char::from(*byte)
}

fn find_crlf(src: &[u8]) -> Option<usize> {
    src.windows(2).position(|window| window == CRLF)
}
