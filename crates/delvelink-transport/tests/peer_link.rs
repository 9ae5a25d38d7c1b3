//! Integration tests for the peer link over real loopback sockets.
//!
//! These exercise the full path: encode → frame → TCP → receive task →
//! inbound queue, including the synthetic-Disconnect failure conversion.

use std::time::Duration;

use delvelink_protocol::Message;
use delvelink_transport::{InboundQueue, PeerLink, PeerListener};

/// Polls the queue until it holds at least `min_len` messages.
async fn wait_for(queue: &InboundQueue, min_len: usize) {
    for _ in 0..200 {
        if queue.len() >= min_len {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("queue never reached {min_len} messages");
}

/// Binds a host listener on an ephemeral port and connects a guest to it.
async fn connected_pair(
) -> (PeerLink, InboundQueue, PeerLink, InboundQueue) {
    let listener = PeerListener::bind(0).await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let host_queue = InboundQueue::new();
    let guest_queue = InboundQueue::new();

    let hq = host_queue.clone();
    let accept =
        tokio::spawn(async move { listener.accept(hq).await.expect("accept") });

    let target = format!("127.0.0.1:{}", addr.port()).parse().unwrap();
    let guest = PeerLink::connect(
        target,
        Duration::from_secs(2),
        guest_queue.clone(),
    )
    .await
    .expect("connect");

    let host = accept.await.expect("accept task");
    (host, host_queue, guest, guest_queue)
}

#[tokio::test]
async fn test_messages_arrive_in_send_order() {
    let (host, _hq, _guest, guest_queue) = connected_pair().await;

    // Ten back-to-back sends; framing must keep them separate and the
    // queue must preserve arrival order.
    for i in 0..10 {
        host.send(&Message::MapMove { x: i, y: -i }).await.unwrap();
    }

    wait_for(&guest_queue, 10).await;
    let drained = guest_queue.drain();
    for (i, msg) in drained.iter().enumerate() {
        assert_eq!(
            *msg,
            Message::MapMove { x: i as i32, y: -(i as i32) }
        );
    }
}

#[tokio::test]
async fn test_both_directions() {
    let (host, host_queue, guest, guest_queue) = connected_pair().await;

    host.send(&Message::GameStart).await.unwrap();
    guest.send(&Message::BattleTurnEnd).await.unwrap();

    wait_for(&guest_queue, 1).await;
    wait_for(&host_queue, 1).await;
    assert_eq!(guest_queue.drain(), vec![Message::GameStart]);
    assert_eq!(host_queue.drain(), vec![Message::BattleTurnEnd]);
}

#[tokio::test]
async fn test_peer_close_becomes_synthetic_disconnect() {
    let (host, _hq, guest, guest_queue) = connected_pair().await;

    // Host hangs up; the guest's receive task must convert the EOF into
    // exactly one queued Disconnect, not an error.
    host.close().await;

    wait_for(&guest_queue, 1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(guest_queue.drain(), vec![Message::Disconnect]);
    assert!(!guest.is_connected());
}

#[tokio::test]
async fn test_send_after_close_is_a_no_op() {
    let (host, _hq, guest, guest_queue) = connected_pair().await;

    guest.close().await;
    assert!(!guest.is_connected());

    // No panic, no error, nothing delivered.
    guest.send(&Message::GameStart).await.unwrap();
    drop(host);
    assert!(guest_queue.is_empty());
}

#[tokio::test]
async fn test_connect_to_closed_port_fails_fast() {
    // Bind-then-drop guarantees an unused port.
    let listener = PeerListener::bind(0).await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let target = format!("127.0.0.1:{}", addr.port()).parse().unwrap();
    let result = PeerLink::connect(
        target,
        Duration::from_secs(2),
        InboundQueue::new(),
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_new_guest_replaces_old_on_accept() {
    let listener = PeerListener::bind(0).await.expect("bind");
    let addr = listener.local_addr().unwrap();
    let host_queue = InboundQueue::new();
    let target: std::net::SocketAddr =
        format!("127.0.0.1:{}", addr.port()).parse().unwrap();

    let hq = host_queue.clone();
    let accept = tokio::spawn(async move {
        let first = listener.accept(hq.clone()).await.expect("accept 1");
        // Session layer drops the stale link when a new guest arrives.
        let second = listener.accept(hq).await.expect("accept 2");
        drop(first);
        second
    });

    let q1 = InboundQueue::new();
    let _guest1 =
        PeerLink::connect(target, Duration::from_secs(2), q1).await.unwrap();
    let q2 = InboundQueue::new();
    let guest2 = PeerLink::connect(target, Duration::from_secs(2), q2.clone())
        .await
        .unwrap();

    let host = accept.await.unwrap();
    host.send(&Message::GameStart).await.unwrap();
    wait_for(&q2, 1).await;
    assert_eq!(q2.drain(), vec![Message::GameStart]);
    drop(guest2);
}
