use std::cell::RefCell;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use minidis::codec::FrameCodec;
use minidis::config::{ParseMode, DEFAULT_MAX_FRAME_SIZE};
use minidis::connection::{Connection, State};
use minidis::store::Store;

async fn create_connection(mode: ParseMode) -> Result<(Connection, TcpStream), std::io::Error> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let local_addr = listener.local_addr()?;

    // Connect to the server as a client to complete the setup.
    let client = TcpStream::connect(local_addr).await?;
    let (socket, client_address) = listener.accept().await?;

    let codec = FrameCodec::new(mode, DEFAULT_MAX_FRAME_SIZE);
    Ok((Connection::new(socket, client_address, codec), client))
}

#[tokio::test]
async fn test_new_connection_is_reading() {
    let (conn, client) = create_connection(ParseMode::Scan).await.unwrap();

    assert_eq!(conn.state(), State::Reading);
    assert_eq!(conn.client_address, client.local_addr().unwrap());
}

#[tokio::test]
async fn test_reply_then_peer_shutdown() {
    let (mut conn, mut client) = create_connection(ParseMode::Scan).await.unwrap();
    let store = RefCell::new(Store::new());

    let client_side = async {
        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();

        let mut reply = [0; 7];
        client.read_exact(&mut reply).await.unwrap();

        // Half-close: the server sees a zero-length read.
        client.shutdown().await.unwrap();
        reply
    };

    let (result, reply) = tokio::join!(conn.run(&store), client_side);

    assert!(result.is_ok());
    assert_eq!(&reply, b"+PONG\r\n");
    assert_eq!(conn.state(), State::Closed);

    conn.close();
}

#[tokio::test]
async fn test_set_updates_store() {
    let (mut conn, mut client) = create_connection(ParseMode::Strict).await.unwrap();
    let store = RefCell::new(Store::new());

    let client_side = async {
        client
            .write_all(b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n")
            .await
            .unwrap();

        let mut reply = [0; 5];
        client.read_exact(&mut reply).await.unwrap();

        client.shutdown().await.unwrap();
        reply
    };

    let (result, reply) = tokio::join!(conn.run(&store), client_side);

    assert!(result.is_ok());
    assert_eq!(&reply, b"+OK\r\n");
    assert_eq!(store.borrow().get(b"foo"), Some(Bytes::from("bar")));
}

#[tokio::test]
async fn test_malformed_frame_then_valid_command() {
    let (mut conn, mut client) = create_connection(ParseMode::Scan).await.unwrap();
    let store = RefCell::new(Store::new());

    let client_side = async {
        client.write_all(b"*2\r\n$bad\r\n").await.unwrap();
        let mut null = [0; 4];
        client.read_exact(&mut null).await.unwrap();

        client
            .write_all(b"*2\r\n$4\r\nECHO\r\n$3\r\nhey\r\n")
            .await
            .unwrap();
        let mut echo = [0; 9];
        client.read_exact(&mut echo).await.unwrap();

        client.shutdown().await.unwrap();
        (null, echo)
    };

    let (result, (null, echo)) = tokio::join!(conn.run(&store), client_side);

    assert!(result.is_ok());
    assert_eq!(&null, b"-1\r\n");
    assert_eq!(&echo, b"$3\r\nhey\r\n");
}

#[tokio::test]
async fn test_incomplete_frame_at_shutdown_is_dropped() {
    let (mut conn, mut client) = create_connection(ParseMode::Scan).await.unwrap();
    let store = RefCell::new(Store::new());

    let client_side = async {
        client.write_all(b"*3\r\n$3\r\nSET\r\n$3\r\nfoo").await.unwrap();
        client.shutdown().await.unwrap();

        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        rest
    };

    let server_side = async {
        let result = conn.run(&store).await;
        conn.close();
        result
    };

    let (result, rest) = tokio::join!(server_side, client_side);

    assert!(result.is_ok());
    assert!(rest.is_empty());
    assert!(store.borrow().is_empty());
}
