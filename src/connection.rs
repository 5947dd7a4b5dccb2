use std::cell::RefCell;
use std::io;
use std::net::SocketAddr;

use bytes::{Buf, BytesMut};
use strum_macros::Display;
use tokio::io::Interest;
use tokio::net::TcpStream;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::codec::{CodecError, FrameCodec};
use crate::commands;
use crate::frame::{ParseError, Reply};
use crate::store::Store;
use crate::Error;

const READ_BUFFER_CAPACITY: usize = 4096;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum State {
    /// Waiting for the socket to become readable.
    Reading,
    /// Waiting for the socket to become writable, with a reply pending.
    Writing,
    Closed,
}

pub struct Connection {
    pub id: Uuid,
    pub client_address: SocketAddr,
    stream: TcpStream,
    state: State,
    codec: FrameCodec,
    // Data is read from the socket into the read buffer. When a frame is parsed, the corresponding
    // data is removed from the buffer.
    buffer: BytesMut,
    // Encoded replies not yet written to the socket.
    pending: BytesMut,
}

impl Connection {
    pub fn new(stream: TcpStream, client_address: SocketAddr, codec: FrameCodec) -> Connection {
        Connection {
            id: Uuid::new_v4(),
            client_address,
            stream,
            state: State::Reading,
            codec,
            buffer: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
            pending: BytesMut::new(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Drives the connection through read, dispatch and write until the peer hangs up. A
    /// transport error ends this connection only; the state is `Closed` either way.
    pub async fn run(&mut self, store: &RefCell<Store>) -> Result<(), Error> {
        let result = self.drive(store).await;
        self.state = State::Closed;
        result
    }

    async fn drive(&mut self, store: &RefCell<Store>) -> Result<(), Error> {
        loop {
            match self.state {
                State::Reading => {
                    // Frames left over from a previous read go first, readiness won't fire
                    // again for bytes we already hold.
                    if self.process_buffered(store)? {
                        continue;
                    }

                    self.stream.ready(Interest::READABLE).await?;
                    self.read()?;
                }
                State::Writing => {
                    self.stream.ready(Interest::WRITABLE).await?;
                    self.write()?;
                }
                State::Closed => return Ok(()),
            }
        }
    }

    /// Decodes at most one buffered frame and queues its reply. Returns `false` once the buffered
    /// input holds nothing more to decode.
    fn process_buffered(&mut self, store: &RefCell<Store>) -> Result<bool, CodecError> {
        let reply = match self.codec.decode(&mut self.buffer) {
            Ok(None) => return Ok(false),
            Ok(Some(argv)) => {
                debug!(command = %commands::render(&argv), "Received command");
                commands::dispatch(argv, &mut store.borrow_mut())
            }
            Err(CodecError::Parse(ParseError::UnsupportedFrame(marker))) => {
                warn!(marker = %char::from(marker), "Ignoring frame that is not an array");
                return Ok(!self.buffer.is_empty());
            }
            Err(e) => {
                debug!(error = %e, "Failed to decode frame");
                Reply::Null
            }
        };

        debug!(reply = %reply, "Queueing reply");
        self.codec.encode(reply, &mut self.pending)?;
        self.state = State::Writing;

        Ok(true)
    }

    fn read(&mut self) -> io::Result<()> {
        self.buffer.reserve(READ_BUFFER_CAPACITY);

        match self.stream.try_read_buf(&mut self.buffer) {
            Ok(0) => {
                debug!("Peer closed the connection");
                self.state = State::Closed;
                Ok(())
            }
            Ok(n) => {
                debug!(bytes = n, "Read from socket");
                Ok(())
            }
            // Readiness can be spurious.
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn write(&mut self) -> io::Result<()> {
        match self.stream.try_write(&self.pending) {
            Ok(0) => Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => {
                self.pending.advance(n);
                if self.pending.is_empty() {
                    self.state = State::Reading;
                }
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Removes the socket from the readiness driver, then closes it.
    pub fn close(self) {
        match self.stream.into_std() {
            Ok(stream) => drop(stream),
            Err(e) => warn!(error = %e, "Failed to deregister connection"),
        }

        info!("Connection closed");
    }
}
