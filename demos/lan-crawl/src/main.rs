//! Minimal LAN lobby on top of the Delvelink sync core.
//!
//! Two terminals on one network:
//!
//! ```text
//! lan-crawl host ash          # open a room named after the player
//! lan-crawl join morgan       # browse, join the first room found, chat
//! ```
//!
//! Typed lines become chat messages. This exercises discovery, the join
//! flow, the session lifecycle (including host migration when the host's
//! terminal dies), and the chat relay; the dungeon itself is left to a
//! real game client.

use std::time::Instant;

use delvelink::{PeerSession, SessionConfig, SessionEvent};
use delvelink_protocol::{PlayerClass, PlayerSnapshot};
use delvelink_session::{JoinStage, RoomProfile};
use delvelink_tick::TickScheduler;
use tokio::io::{AsyncBufReadExt, BufReader};

fn usage() -> ! {
    eprintln!("usage: lan-crawl <host|join> <nickname>");
    std::process::exit(2);
}

fn snapshot(nickname: &str, is_host: bool) -> PlayerSnapshot {
    PlayerSnapshot {
        id: if is_host { 0 } else { 1 },
        nickname: nickname.to_string(),
        class: PlayerClass::Warrior,
        hp: 40,
        max_hp: 40,
        def: 5,
        dex: 12,
        is_host,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lan_crawl=info,delvelink=info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let mode = args.next().unwrap_or_else(|| usage());
    let nickname = args.next().unwrap_or_else(|| usage());

    let is_host = match mode.as_str() {
        "host" => true,
        "join" => false,
        _ => usage(),
    };

    let mut session = PeerSession::new(
        snapshot(&nickname, is_host),
        10,
        SessionConfig::default(),
    );

    if is_host {
        let port = session
            .host_room(
                RoomProfile {
                    title: format!("{nickname}'s crawl"),
                    host_name: nickname.clone(),
                    is_private: false,
                    password: None,
                },
                0,
            )
            .await?;
        println!("hosting \"{nickname}'s crawl\" on port {port}; waiting for a guest");
    } else {
        session.start_discovery().await?;
        println!("searching for rooms...");
    }

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut scheduler = TickScheduler::with_rate(60);
    let mut joined = is_host;

    loop {
        tokio::select! {
            _ = scheduler.wait_for_tick() => {
                let events = session.tick(Instant::now()).await?;
                for event in events {
                    show(&event);
                }
                // guests grab the first room that shows up
                if !joined {
                    if let Some(listing) = session.rooms().into_iter().next() {
                        println!(
                            "joining \"{}\" hosted by {}",
                            listing.advert.title, listing.advert.host_name
                        );
                        let stage = session.begin_join(&listing)?;
                        if stage != JoinStage::ReadyToConnect {
                            eprintln!("room is private, not supported here");
                            break;
                        }
                        session.connect().await?;
                        println!("connected; say hi");
                        joined = true;
                    }
                }
            }
            line = stdin.next_line() => {
                match line? {
                    Some(text) if !text.trim().is_empty() => {
                        session.send_chat(text.trim()).await?;
                    }
                    Some(_) => {}
                    None => break,
                }
            }
        }
    }
    Ok(())
}

fn show(event: &SessionEvent) {
    match event {
        SessionEvent::GuestConnected => println!("* a guest connected"),
        SessionEvent::PeerInfo(player) => {
            println!("* {} is here ({:?})", player.nickname, player.class);
        }
        SessionEvent::Chat { nickname, text } => println!("<{nickname}> {text}"),
        SessionEvent::PeerLeft => println!("* peer left; room stays open"),
        SessionEvent::HostMigrated { port } => {
            println!("* host vanished; you now host the room on port {port}");
        }
        SessionEvent::RoomsChanged => {}
        other => println!("* {other:?}"),
    }
}
