//! Integration tests for the UDP discovery channel, run over loopback
//! with ephemeral ports so they can't collide with a real session.

use std::time::Duration;

use delvelink_protocol::RoomAdvertisement;
use delvelink_transport::{Advertiser, DiscoveryListener};
use tokio::sync::mpsc;

fn advert(title: &str) -> RoomAdvertisement {
    RoomAdvertisement {
        title: title.into(),
        host_name: "bran".into(),
        is_private: false,
        password: None,
        players: 1,
        max_players: 2,
        addr: "127.0.0.1".into(),
        port: 40021,
    }
}

#[tokio::test]
async fn test_advertisement_reaches_listener() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let listener = DiscoveryListener::start(0, tx).await.expect("listen");

    let target = format!("127.0.0.1:{}", listener.local_port())
        .parse()
        .unwrap();
    let _advertiser = Advertiser::start_with_target(
        advert("crypt run"),
        Duration::from_millis(20),
        target,
        false,
    )
    .await
    .expect("advertise");

    let found = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out")
        .expect("channel closed");
    assert_eq!(found.advert.title, "crypt run");
    assert_eq!(found.advert.players, 1);
}

#[tokio::test]
async fn test_player_count_update_shows_in_later_broadcasts() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let listener = DiscoveryListener::start(0, tx).await.expect("listen");

    let target = format!("127.0.0.1:{}", listener.local_port())
        .parse()
        .unwrap();
    let advertiser = Advertiser::start_with_target(
        advert("crypt run"),
        Duration::from_millis(20),
        target,
        false,
    )
    .await
    .expect("advertise");

    advertiser.set_players(2);

    // Drain broadcasts until the updated count arrives.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let found = tokio::time::timeout_at(deadline, rx.recv())
            .await
            .expect("never saw updated player count")
            .expect("channel closed");
        if found.advert.players == 2 {
            break;
        }
    }
}

#[tokio::test]
async fn test_foreign_datagrams_are_ignored() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let listener = DiscoveryListener::start(0, tx).await.expect("listen");

    let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let target = format!("127.0.0.1:{}", listener.local_port());
    socket.send_to(b"definitely not a room", &target).await.unwrap();
    socket
        .send_to(b"ROOM_DISCOVERY:{broken json", &target)
        .await
        .unwrap();

    // Neither datagram may surface as a discovered room.
    let result =
        tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(result.is_err(), "junk datagram surfaced as a room");
}
