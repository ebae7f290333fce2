use std::{net::SocketAddr, time::Duration};

use futures_util::future::join_all;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use vaultline_common::{
    frame::{read_frame, write_frame},
    CipherChannel, SharedKey, DEFAULT_MAX_FRAME_LEN,
};
use vaultline_server::{RequestProcessor, ReverseProcessor, ServerConfig, VaultlineServer};

async fn spawn_server<P: RequestProcessor>(key: &SharedKey, processor: P) -> SocketAddr {
    let config = ServerConfig::new()
        .with_host("127.0.0.1")
        .with_port(0)
        .with_read_timeout(Some(Duration::from_secs(5)));
    let server = VaultlineServer::new(config, key, processor);
    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { server.serve(listener).await });
    addr
}

async fn exchange(addr: SocketAddr, channel: &CipherChannel, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let frame = channel.encrypt(request.as_bytes()).unwrap();
    write_frame(&mut stream, &frame, DEFAULT_MAX_FRAME_LEN).await.unwrap();

    let reply = read_frame(&mut stream, DEFAULT_MAX_FRAME_LEN)
        .await
        .unwrap()
        .expect("server closed without replying");
    String::from_utf8(channel.decrypt(&reply).unwrap()).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn serves_reference_transform() {
    let key = SharedKey::generate();
    let addr = spawn_server(&key, ReverseProcessor::new()).await;
    let channel = CipherChannel::new(&key);

    let reply = exchange(addr, &channel, "Hello from async client!").await;
    assert_eq!(reply, "Processed: !tneilc cnysa morf olleH");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_get_their_own_replies() {
    let key = SharedKey::generate();
    let addr = spawn_server(&key, ReverseProcessor::new()).await;
    let channel = CipherChannel::new(&key);

    let requests: Vec<String> = (0..32).map(|i| format!("request number {i}")).collect();
    let replies = join_all(requests.iter().map(|r| exchange(addr, &channel, r))).await;

    for (request, reply) in requests.iter().zip(replies) {
        let expected: String = request.chars().rev().collect();
        assert_eq!(reply, format!("Processed: {expected}"));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn corrupted_frame_gets_zero_bytes_back() {
    let key = SharedKey::generate();
    let addr = spawn_server(&key, ReverseProcessor::new()).await;
    let channel = CipherChannel::new(&key);

    let mut frame = channel.encrypt(b"tamper with me").unwrap();
    let last = frame.len() - 1;
    frame[last] ^= 0x01;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    write_frame(&mut stream, &frame, DEFAULT_MAX_FRAME_LEN).await.unwrap();

    let mut returned = Vec::new();
    let read = stream.read_to_end(&mut returned).await;
    // A reset is as good as a clean close: nothing came back either way
    assert!(read.is_err() || returned.is_empty(), "server replied with {returned:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failing_processor_closes_without_reply() {
    let key = SharedKey::generate();
    let refuse = |_: &str| -> anyhow::Result<String> { Err(anyhow::anyhow!("refused")) };
    let addr = spawn_server(&key, refuse).await;
    let channel = CipherChannel::new(&key);

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let frame = channel.encrypt(b"anything").unwrap();
    write_frame(&mut stream, &frame, DEFAULT_MAX_FRAME_LEN).await.unwrap();

    assert!(read_frame(&mut stream, DEFAULT_MAX_FRAME_LEN).await.unwrap_or(None).is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn listener_survives_bad_clients() {
    let key = SharedKey::generate();
    let addr = spawn_server(&key, ReverseProcessor::new()).await;
    let channel = CipherChannel::new(&key);

    // Connect and leave without a word
    let mut silent = TcpStream::connect(addr).await.unwrap();
    silent.shutdown().await.unwrap();
    drop(silent);

    // Garbage that is not even a valid header
    let mut noisy = TcpStream::connect(addr).await.unwrap();
    noisy.write_all(&[0xff; 16]).await.unwrap();
    drop(noisy);

    // Wrong key
    let stranger = CipherChannel::new(&SharedKey::generate());
    let mut foreign = TcpStream::connect(addr).await.unwrap();
    let frame = stranger.encrypt(b"hi").unwrap();
    write_frame(&mut foreign, &frame, DEFAULT_MAX_FRAME_LEN).await.unwrap();
    drop(foreign);

    assert_eq!(exchange(addr, &channel, "still here").await, "Processed: ereh llits");
}
