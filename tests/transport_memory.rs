// tests/transport_memory.rs

use bytes::Bytes;
use tokio::time::{timeout, Duration};

use console_bridge::{
    // ---
    Action,
    Address,
    CallId,
    Command,
    ConsoleConfig,
    ConsoleSession,
    Envelope,
};

#[tokio::test]
async fn memory_subscribe_then_publish_delivers() {
    // ---
    // Arrange
    // ---
    let config = ConsoleConfig::memory("transport");

    let transport = console_bridge::create_memory_transport(&config)
        .await
        .expect("failed to create memory transport");

    let address = Address::from(config.frame_address.as_str());

    let mut sub = transport
        .subscribe(address.clone().into())
        .await
        .expect("subscribe failed");

    let payload = Bytes::from_static(br#"{"action":"input","data":["RETURN 1"],"call_id":0}"#);
    let env = Envelope::new(address.clone(), payload.clone())
        .with_source(Address::from(config.host_address.as_str()));

    // ---
    // Act
    // ---
    transport.publish(env).await.expect("publish failed");

    // ---
    // Assert
    // ---
    let received = timeout(Duration::from_millis(100), sub.inbox.recv())
        .await
        .expect("timed out waiting for message")
        .expect("subscription channel closed unexpectedly");

    assert_eq!(received.payload, payload);
    assert_eq!(received.address, address);
    assert_eq!(
        received.source,
        Some(Address::from(config.host_address.as_str()))
    );
}

#[tokio::test]
async fn session_posts_commands_to_frame_address() {
    // ---
    let config = ConsoleConfig::memory("wire");
    let transport = console_bridge::create_transport(&config)
        .await
        .expect("failed to create transport");

    let mut frame = transport
        .subscribe(config.frame_address.as_str().into())
        .await
        .expect("subscribe failed");

    let session = ConsoleSession::with_transport(transport.clone(), config.clone())
        .await
        .expect("failed to create session");

    session.input("MATCH (n) RETURN n").await.expect("input failed");

    let env = timeout(Duration::from_millis(100), frame.inbox.recv())
        .await
        .expect("timed out waiting for command")
        .expect("frame inbox closed");

    let command: Command = serde_json::from_slice(&env.payload).expect("not a command");
    assert_eq!(command.action, Action::Input);
    assert_eq!(command.call_id, CallId::NONE);
    assert_eq!(command.data, serde_json::json!(["MATCH (n) RETURN n"]));
    assert_eq!(env.source, Some(Address::from(config.host_address.as_str())));

    session.close().await.expect("close failed");
}
