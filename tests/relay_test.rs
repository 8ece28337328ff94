//! TCP relay byte mirroring and close propagation

use devbox::relay::TcpRelay;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[tokio::test]
async fn test_bytes_arrive_unmodified_in_both_directions() {
    let destination = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let target = destination.local_addr().unwrap();

    let relay = TcpRelay::bind("127.0.0.1:0".parse().unwrap(), target.to_string())
        .await
        .unwrap()
        .spawn();
    let mut client = TcpStream::connect(relay.local_addr().unwrap()).await.unwrap();
    let (mut upstream, _) = destination.accept().await.unwrap();

    let payload: Vec<u8> = (0..256 * 1024).map(|i| (i % 251) as u8).collect();

    let expected = payload.clone();
    let reader = tokio::spawn(async move {
        let mut received = vec![0u8; expected.len()];
        upstream.read_exact(&mut received).await.unwrap();
        assert_eq!(received, expected);
        upstream.write_all(b"pong").await.unwrap();
        upstream
    });

    client.write_all(&payload).await.unwrap();
    let _upstream = reader.await.unwrap();

    let mut reply = [0u8; 4];
    client.read_exact(&mut reply).await.unwrap();
    assert_eq!(&reply, b"pong");
}

#[tokio::test]
async fn test_client_close_closes_destination() {
    let destination = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let target = destination.local_addr().unwrap();

    let relay = TcpRelay::bind("127.0.0.1:0".parse().unwrap(), target.to_string())
        .await
        .unwrap()
        .spawn();
    let client = TcpStream::connect(relay.local_addr().unwrap()).await.unwrap();
    let (mut upstream, _) = destination.accept().await.unwrap();

    drop(client);

    let mut buf = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), upstream.read_to_end(&mut buf))
        .await
        .unwrap();
    assert!(matches!(read, Ok(0) | Err(_)));
}

#[tokio::test]
async fn test_dropping_handle_stops_listener() {
    let destination = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let relay = TcpRelay::bind("127.0.0.1:0".parse().unwrap(), destination.local_addr().unwrap().to_string())
        .await
        .unwrap()
        .spawn();
    let addr = relay.local_addr().unwrap();
    drop(relay);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(TcpStream::connect(addr).await.is_err());
}
