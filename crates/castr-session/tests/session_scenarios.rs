use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use castr_ogg::{PacketAssembler, Page, PageReader};
use castr_proto::info::SAMPLE_RATE;
use castr_proto::{
    command, AdminAction, ClientMessage, ConnectionType, DataFormat, InfoMessage, LoginFlags,
    Mode, ServerMessage,
};
use castr_session::config::SoundEntry;
use castr_session::{
    Credentials, LocalAccounting, MemorySinks, RecordingInfo, RecordingParams, Recorder, Session,
    SessionConfig, SessionExit,
};
use castr_transport::{memory_socket, AcceptedSocket, MemoryClient, Outbound};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

const CHROME: &str = "Mozilla/5.0 (X11; Linux x86_64) Chrome/126.0 Safari/537.36";

const CREDENTIALS: Credentials = Credentials {
    rid: 4242,
    key: 1111,
    master: 2222,
    wskey: 3333,
};

fn test_config() -> SessionConfig {
    let mut config = SessionConfig::default();
    // Memory clients only answer transport pings when drained.
    config.timers.liveness_ms = 100 * 3_600_000;
    config
}

fn show() -> RecordingParams {
    RecordingParams {
        name: "Show".into(),
        ..Default::default()
    }
}

struct Harness {
    sockets: mpsc::UnboundedSender<AcceptedSocket>,
    sinks: MemorySinks,
    accounting: Arc<LocalAccounting>,
    stop: CancellationToken,
    session: JoinHandle<SessionExit>,
    epoch: Instant,
}

impl Harness {
    fn start(config: SessionConfig, params: RecordingParams) -> Self {
        let info = RecordingInfo::new(params, CREDENTIALS, 40_000);
        let sinks = MemorySinks::default();
        let mut recorder = Recorder::new(sinks.sinks());
        recorder.begin(&info).unwrap();

        let accounting = Arc::new(LocalAccounting::new(config.pricing));
        let (sockets, rx) = mpsc::unbounded_channel();
        let epoch = Instant::now();
        let session = Session::new(
            config,
            info,
            recorder,
            accounting.clone(),
            rx,
            TaskTracker::new(),
        );
        let stop = session.stop_token();
        Self {
            sockets,
            sinks,
            accounting,
            stop,
            session: tokio::spawn(session.run()),
            epoch,
        }
    }

    fn connect(&self, origin: &str) -> Client {
        let (socket, inner) = memory_socket(origin, CHROME);
        self.sockets.send(socket).unwrap();
        Client {
            inner,
            closed: false,
        }
    }

    async fn data(&self, origin: &str, nick: &str) -> Client {
        let client = self.connect(origin);
        client.login(CREDENTIALS.key, LoginFlags::new(ConnectionType::Data), nick);
        settle().await;
        client
    }

    async fn master(&self) -> Client {
        let client = self.connect("10.0.0.100");
        client.login(CREDENTIALS.master, LoginFlags::new(ConnectionType::Master), "host");
        settle().await;
        client
    }

    /// Current session time as a granule position.
    fn granule(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64 * 48
    }

    fn data_pages(&self, serial: u32) -> Vec<Page> {
        PageReader::new(&self.sinks.data.contents()[..])
            .map(|page| page.unwrap())
            .filter(|page| page.header.serial == serial)
            .collect()
    }

    fn meta_events(&self) -> Vec<serde_json::Value> {
        let mut assembler = PacketAssembler::new();
        self.data_pages(0)
            .iter()
            .flat_map(|page| assembler.push(page).unwrap())
            .map(|packet| serde_json::from_slice(&packet.data).unwrap())
            .collect()
    }
}

struct Client {
    inner: MemoryClient,
    closed: bool,
}

impl Client {
    fn send(&self, message: ClientMessage) {
        self.inner.send(message.encode());
    }

    fn login(&self, key: u32, flags: LoginFlags, nick: &str) {
        self.send(ClientMessage::Login {
            session_id: CREDENTIALS.rid,
            key,
            flags,
            nick: nick.into(),
        });
    }

    fn data(&self, granule_pos: u64, len: usize) {
        self.send(ClientMessage::Data {
            granule_pos,
            packet: Bytes::from(vec![0x55; len]),
        });
    }

    fn mode(&self, mode: Mode) {
        self.send(ClientMessage::Mode {
            mode: mode.as_u32(),
        });
    }

    /// Everything received so far, keepalive pings left out.
    fn take(&mut self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Some(message) = self.inner.try_recv() {
            match message {
                Outbound::Frame(frame) => match ServerMessage::decode(frame).unwrap() {
                    ServerMessage::Ping => {}
                    other => messages.push(other),
                },
                Outbound::Ping => {
                    self.inner.pong();
                }
                Outbound::Close => self.closed = true,
            }
        }
        messages
    }

    fn infos(&mut self) -> Vec<InfoMessage> {
        self.take()
            .into_iter()
            .filter_map(|message| match message {
                ServerMessage::Info(info) => Some(info),
                _ => None,
            })
            .collect()
    }

    fn is_closed(&mut self) -> bool {
        self.take();
        self.closed
    }
}

/// Let every queued event run without moving the clock meaningfully.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn mode_of(info: &InfoMessage) -> Option<Mode> {
    match info {
        InfoMessage::Mode { mode, .. } => Some(*mode),
        _ => None,
    }
}

#[tokio::test(start_paused = true)]
async fn data_join_greets_and_announces_peers() {
    let harness = Harness::start(test_config(), show());

    let mut alice = harness.data("10.0.0.1", "alice").await;
    let greeting = alice.take();
    assert_eq!(
        greeting[0],
        ServerMessage::Ack {
            acked: command::LOGIN
        }
    );
    assert_eq!(
        &greeting[1..],
        &[
            ServerMessage::Info(InfoMessage::Features("{}".into())),
            ServerMessage::Info(InfoMessage::Id(1)),
            ServerMessage::Info(InfoMessage::Mode {
                mode: Mode::Init,
                anchor_ms: 0.0,
                elapsed_ms: 0.0
            }),
            ServerMessage::Info(InfoMessage::RecName("Show".into())),
        ]
    );

    let mut bob = harness.data("10.0.0.2", "bob").await;
    let infos = bob.infos();
    assert!(infos.contains(&InfoMessage::Id(2)));
    assert!(infos.contains(&InfoMessage::PeerContinuing(1)));
    assert_eq!(alice.infos(), vec![InfoMessage::PeerInitial(2)]);

    let headers: Vec<u32> = PageReader::new(&harness.sinks.header1.contents()[..])
        .map(|page| page.unwrap().header.serial)
        .collect();
    assert_eq!(headers, vec![1, 2]);
    let users = String::from_utf8(harness.sinks.users.contents()).unwrap();
    assert!(users.starts_with("\"0\":{}\n,\"1\":{\"nick\":\"alice\""));
    assert!(users.contains(",\"2\":{\"nick\":\"bob\""));

    bob.inner.disconnect();
    settle().await;
    assert_eq!(alice.infos(), vec![InfoMessage::PeerLost(2)]);
}

#[tokio::test(start_paused = true)]
async fn reconnect_takes_back_the_same_track() {
    let harness = Harness::start(test_config(), show());
    let mut master = harness.master().await;
    let mut alice = harness.data("10.0.0.1", "alice").await;
    master.take();

    alice.inner.disconnect();
    settle().await;
    assert!(master.take().contains(&ServerMessage::User {
        index: 1,
        present: false,
        nick: "alice".into()
    }));

    let mut again = harness.data("10.0.0.1", "alice").await;
    assert!(again.infos().contains(&InfoMessage::Id(1)));
    assert!(master.take().contains(&ServerMessage::User {
        index: 1,
        present: true,
        nick: "alice".into()
    }));
    // No second set of header pages for a rejoin.
    assert_eq!(PageReader::new(&harness.sinks.header1.contents()[..]).count(), 1);
}

#[tokio::test(start_paused = true)]
async fn anonymous_names_follow_the_origin() {
    let harness = Harness::start(test_config(), show());
    let mut master = harness.master().await;

    let mut first = harness.data("10.0.0.1", "").await;
    first.inner.disconnect();
    settle().await;
    harness.data("10.0.0.1", "").await;
    harness.data("10.0.0.2", "").await;

    let nicks: Vec<String> = master
        .take()
        .into_iter()
        .filter_map(|message| match message {
            ServerMessage::User {
                present: true,
                nick,
                ..
            } => Some(nick),
            _ => None,
        })
        .collect();
    assert_eq!(nicks, vec!["Anonymous 1", "Anonymous 1", "Anonymous 2"]);
}

#[tokio::test(start_paused = true)]
async fn track_ceiling_is_refused_with_a_reason() {
    let mut config = test_config();
    config.limits.max_tracks = 1;
    let harness = Harness::start(config, show());

    harness.data("10.0.0.1", "alice").await;
    let mut bob = harness.data("10.0.0.2", "bob").await;
    let replies = bob.take();
    assert!(bob.closed);
    match &replies[..] {
        [ServerMessage::Ack { .. }, ServerMessage::Nack {
            acked,
            reason,
            ..
        }] => {
            assert_eq!(*acked, command::LOGIN);
            assert!(reason.contains("limited to 1"));
        }
        other => panic!("unexpected replies {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn bad_logins_are_closed_without_reply() {
    let harness = Harness::start(test_config(), show());

    let mut wrong_key = harness.connect("10.0.0.1");
    wrong_key.login(9999, LoginFlags::new(ConnectionType::Data), "eve");
    let mut data_key_as_master = harness.connect("10.0.0.2");
    data_key_as_master.login(CREDENTIALS.key, LoginFlags::new(ConnectionType::Master), "eve");
    let mut not_login = harness.connect("10.0.0.3");
    not_login.send(ClientMessage::Text { text: "hi".into() });
    settle().await;

    for client in [&mut wrong_key, &mut data_key_as_master, &mut not_login] {
        assert!(client.take().is_empty());
        assert!(client.closed);
    }
}

#[tokio::test(start_paused = true)]
async fn silent_sockets_time_out() {
    let harness = Harness::start(test_config(), show());
    let mut idle = harness.connect("10.0.0.1");
    settle().await;
    assert!(!idle.is_closed());

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert!(idle.is_closed());
}

#[tokio::test(start_paused = true)]
async fn flac_waits_for_its_sample_rate() {
    let params = RecordingParams {
        format: DataFormat::Flac,
        ..show()
    };
    let harness = Harness::start(test_config(), params);

    let mut alice = harness.data("10.0.0.1", "alice").await;
    alice.take();
    let flac = harness.connect("10.0.0.2");
    flac.login(
        CREDENTIALS.key,
        LoginFlags::new(ConnectionType::Data).with_format(DataFormat::Flac),
        "bob",
    );
    settle().await;
    assert!(alice.infos().is_empty());

    flac.send(ClientMessage::Info {
        key: SAMPLE_RATE,
        value: 44_100,
        extra: Bytes::new(),
    });
    settle().await;
    assert_eq!(alice.infos(), vec![InfoMessage::PeerInitial(2)]);
    let users = String::from_utf8(harness.sinks.users.contents()).unwrap();
    assert!(users.contains("\"format\":\"flac\",\"sampleRate\":44100"));

    let mut flac = flac;
    flac.send(ClientMessage::Info {
        key: SAMPLE_RATE,
        value: 48_000,
        extra: Bytes::new(),
    });
    settle().await;
    assert!(flac.is_closed());
}

#[tokio::test(start_paused = true)]
async fn flac_login_refused_on_opus_recording() {
    let harness = Harness::start(test_config(), show());
    let mut flac = harness.connect("10.0.0.1");
    flac.login(
        CREDENTIALS.key,
        LoginFlags::new(ConnectionType::Data).with_format(DataFormat::Flac),
        "bob",
    );
    settle().await;
    assert!(flac.is_closed());
}

#[tokio::test(start_paused = true)]
async fn data_is_recorded_only_while_recording() {
    let harness = Harness::start(test_config(), show());
    let mut master = harness.master().await;
    let mut alice = harness.data("10.0.0.1", "alice").await;
    alice.take();

    // Ignored before the recording starts.
    alice.data(harness.granule(), 20);
    settle().await;
    assert!(harness.data_pages(1).is_empty());

    tokio::time::sleep(Duration::from_secs(1)).await;
    master.mode(Mode::Recording);
    settle().await;
    let infos = alice.infos();
    assert_eq!(infos.iter().find_map(mode_of), Some(Mode::Recording));
    assert!(infos
        .iter()
        .any(|info| matches!(info, InfoMessage::StartTime(ms) if *ms >= 1000.0)));

    alice.data(harness.granule(), 20);
    settle().await;
    assert_eq!(harness.data_pages(1).len(), 1);

    master.mode(Mode::Paused);
    settle().await;
    alice.data(harness.granule(), 20);
    settle().await;
    assert_eq!(harness.data_pages(1).len(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    master.mode(Mode::Recording);
    settle().await;
    alice.data(harness.granule(), 20);
    settle().await;
    assert_eq!(harness.data_pages(1).len(), 2);

    let events: Vec<String> = harness
        .meta_events()
        .iter()
        .map(|event| event["c"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(events, vec!["start", "pause", "resume"]);
    assert!(!master.is_closed());
}

#[tokio::test(start_paused = true)]
async fn early_and_late_granules_are_clamped() {
    let harness = Harness::start(test_config(), show());
    let master = harness.master().await;
    let alice = harness.data("10.0.0.1", "alice").await;
    master.mode(Mode::Recording);
    settle().await;

    let now = harness.granule();
    alice.data(now + 3_600 * 48_000, 20);
    alice.data(now, 20);
    settle().await;

    let pages = harness.data_pages(1);
    assert_eq!(pages.len(), 2);
    let lookahead = SessionConfig::default().limits.lookahead;
    assert!(pages[0].header.granule_pos <= now + lookahead + 48);
    assert!(pages[0].header.granule_pos > now + lookahead - 48);
    // Never behind the previous packet.
    assert_eq!(pages[1].header.granule_pos, pages[0].header.granule_pos);
}

#[tokio::test(start_paused = true)]
async fn invalid_transition_drops_the_master() {
    let harness = Harness::start(test_config(), show());
    let mut master = harness.master().await;
    master.mode(Mode::Paused);
    settle().await;
    assert!(master.is_closed());

    let mut master = harness.master().await;
    master.send(ClientMessage::Mode { mode: 17 });
    settle().await;
    assert!(master.is_closed());
}

#[tokio::test(start_paused = true)]
async fn flooding_socket_is_dropped() {
    let mut config = test_config();
    config.limits.flood_budget = 1_000;
    let harness = Harness::start(config, show());
    let master = harness.master().await;
    let mut alice = harness.data("10.0.0.1", "alice").await;
    master.mode(Mode::Recording);
    settle().await;

    let now = harness.granule();
    alice.data(now, 600);
    settle().await;
    assert!(!alice.is_closed());
    alice.data(now, 600);
    settle().await;
    assert!(alice.is_closed());
    assert_eq!(harness.data_pages(1).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn chat_is_cleaned_relayed_and_recorded() {
    let harness = Harness::start(test_config(), show());
    let master = harness.master().await;
    let mut alice = harness.data("10.0.0.1", "alice").await;
    let mut bob = harness.data("10.0.0.2", "bob").await;
    master.mode(Mode::Recording);
    settle().await;
    alice.take();
    bob.take();

    alice.send(ClientMessage::Text {
        text: "hi\u{7}\nthere".into(),
    });
    settle().await;
    assert_eq!(
        bob.take(),
        vec![ServerMessage::Text {
            text: "alice: hithere".into()
        }]
    );
    assert!(alice.take().is_empty());

    let events = harness.meta_events();
    assert_eq!(events.last().unwrap()["text"], "alice: hithere");
}

#[tokio::test(start_paused = true)]
async fn malformed_caption_drops_the_sender() {
    let harness = Harness::start(test_config(), show());
    let mut alice = harness.data("10.0.0.1", "alice").await;
    alice.send(ClientMessage::Caption {
        json: "{\"text\":".into(),
    });
    settle().await;
    assert!(alice.is_closed());
}

#[tokio::test(start_paused = true)]
async fn rtc_is_relayed_with_the_sender_index() {
    let harness = Harness::start(test_config(), show());
    let alice = harness.data("10.0.0.1", "alice").await;
    let mut bob = harness.data("10.0.0.2", "bob").await;
    bob.take();

    alice.send(ClientMessage::Rtc {
        peer: 2,
        body: Bytes::from_static(b"{\"sdp\":1}"),
    });
    // Nobody on track 9; silently dropped.
    alice.send(ClientMessage::Ctcp {
        peer: 9,
        body: Bytes::from_static(b"x"),
    });
    settle().await;
    assert_eq!(
        bob.take(),
        vec![ServerMessage::Rtc {
            peer: 1,
            body: Bytes::from_static(b"{\"sdp\":1}")
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn ping_socket_answers_with_session_time() {
    let harness = Harness::start(test_config(), show());
    let mut ping = harness.connect("10.0.0.1");
    ping.login(CREDENTIALS.key, LoginFlags::new(ConnectionType::Ping), "");
    tokio::time::sleep(Duration::from_millis(500)).await;
    ping.send(ClientMessage::Ping { client_time: 12.5 });
    settle().await;

    let replies = ping.take();
    match &replies[..] {
        [ServerMessage::Ack { .. }, ServerMessage::Pong {
            client_time,
            server_time,
        }] => {
            assert_eq!(*client_time, 12.5);
            assert!(*server_time >= 500.0);
        }
        other => panic!("unexpected replies {other:?}"),
    }

    ping.send(ClientMessage::Text { text: "x".into() });
    settle().await;
    assert!(ping.is_closed());
}

#[tokio::test(start_paused = true)]
async fn kick_bans_the_origin_for_a_while() {
    let harness = Harness::start(test_config(), show());
    let mut master = harness.master().await;
    let mut alice = harness.data("10.0.0.1", "alice").await;
    master.take();

    master.send(ClientMessage::Admin {
        target: 1,
        action: AdminAction::Kick,
        argument: Bytes::new(),
    });
    settle().await;
    assert!(alice.is_closed());
    assert!(master.take().contains(&ServerMessage::User {
        index: 1,
        present: false,
        nick: "alice".into()
    }));

    let mut banned = harness.data("10.0.0.1", "alice").await;
    assert!(banned.take().is_empty());
    assert!(banned.closed);

    tokio::time::sleep(Duration::from_secs(61)).await;
    let mut back = harness.data("10.0.0.1", "alice").await;
    assert!(back.infos().contains(&InfoMessage::Id(1)));
}

#[tokio::test(start_paused = true)]
async fn admin_request_carries_the_master_name() {
    let harness = Harness::start(test_config(), show());
    let master = harness.master().await;
    let mut alice = harness.data("10.0.0.1", "alice").await;
    alice.take();

    master.send(ClientMessage::Admin {
        target: 1,
        action: AdminAction::Request,
        argument: Bytes::new(),
    });
    master.send(ClientMessage::Admin {
        target: 1,
        action: AdminAction::Other(7),
        argument: Bytes::from_static(b"arg"),
    });
    settle().await;
    assert_eq!(
        alice.take(),
        vec![
            ServerMessage::Admin {
                target: 1,
                action: AdminAction::Request,
                argument: Bytes::from_static(b"host"),
            },
            ServerMessage::Admin {
                target: 1,
                action: AdminAction::Other(7),
                argument: Bytes::from_static(b"arg"),
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn admin_state_is_forwarded_to_the_named_master() {
    let harness = Harness::start(test_config(), show());
    let mut master = harness.master().await;
    let alice = harness.data("10.0.0.1", "alice").await;
    master.take();

    alice.send(ClientMessage::Info {
        key: castr_proto::info::ADMIN_STATE,
        value: 1,
        extra: Bytes::from_static(b"{\"mute\":true}"),
    });
    settle().await;
    assert!(master.infos().contains(&InfoMessage::AdminState {
        track: 1,
        extra: Bytes::from_static(b"{\"mute\":true}")
    }));
}

#[tokio::test(start_paused = true)]
async fn sounds_are_listed_played_and_replayed_to_joiners() {
    let mut config = test_config();
    config.sounds = vec![SoundEntry {
        id: "applause".into(),
        url: "https://sounds.example/applause.webm".into(),
        name: "Applause".into(),
        duration_secs: 5.0,
    }];
    let harness = Harness::start(config, show());
    let mut master = harness.master().await;
    assert!(master
        .infos()
        .iter()
        .any(|info| matches!(info, InfoMessage::Sounds(list) if list.contains("applause"))));

    let mut alice = harness.data("10.0.0.1", "alice").await;
    alice.take();
    master.send(ClientMessage::Sound {
        play: true,
        id: "applause".into(),
    });
    settle().await;
    assert!(matches!(
        &alice.take()[..],
        [ServerMessage::Sound { play: true, url, .. }] if url.ends_with("applause.webm")
    ));

    let mut bob = harness.data("10.0.0.2", "bob").await;
    assert!(bob
        .take()
        .iter()
        .any(|message| matches!(message, ServerMessage::Sound { play: true, .. })));

    tokio::time::sleep(Duration::from_secs(6)).await;
    let mut carol = harness.data("10.0.0.3", "carol").await;
    assert!(!carol
        .take()
        .iter()
        .any(|message| matches!(message, ServerMessage::Sound { .. })));
}

#[tokio::test(start_paused = true)]
async fn late_master_learns_which_sounds_are_playing() {
    let mut config = test_config();
    config.sounds = vec![SoundEntry {
        id: "applause".into(),
        url: "https://sounds.example/applause.webm".into(),
        name: "Applause".into(),
        duration_secs: 5.0,
    }];
    let harness = Harness::start(config, show());
    let first = harness.master().await;
    first.send(ClientMessage::Sound {
        play: true,
        id: "applause".into(),
    });
    settle().await;

    let mut second = harness.master().await;
    assert!(second.take().iter().any(|message| matches!(
        message,
        ServerMessage::Sound { play: true, url, .. } if url.ends_with("applause.webm")
    )));
}

#[tokio::test(start_paused = true)]
async fn speaking_status_reaches_masters() {
    let harness = Harness::start(test_config(), show());
    let mut master = harness.master().await;
    let alice = harness.data("10.0.0.1", "alice").await;
    master.mode(Mode::Recording);
    settle().await;
    master.take();

    alice.data(harness.granule(), 20);
    settle().await;
    assert!(master.take().contains(&ServerMessage::Speech {
        index: 1,
        speaking: true
    }));

    tokio::time::sleep(Duration::from_millis(1_100)).await;
    assert!(master.take().contains(&ServerMessage::Speech {
        index: 1,
        speaking: false
    }));
}

#[tokio::test(start_paused = true)]
async fn metering_charges_each_interval() {
    let harness = Harness::start(test_config(), show());
    let mut master = harness.master().await;
    let _alice = harness.data("10.0.0.1", "alice").await;
    master.mode(Mode::Recording);
    settle().await;
    master.take();

    tokio::time::sleep(Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(harness.accounting.cost(CREDENTIALS.rid), 60);
    assert!(master
        .infos()
        .contains(&InfoMessage::CreditRate { cost: 60, rate: 60 }));

    // A paused interval does not tick.
    master.mode(Mode::Paused);
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(harness.accounting.cost(CREDENTIALS.rid), 60);
}

#[tokio::test(start_paused = true)]
async fn stop_drains_then_finishes() {
    let harness = Harness::start(test_config(), show());
    let mut master = harness.master().await;
    let alice = harness.data("10.0.0.1", "alice").await;
    master.mode(Mode::Recording);
    settle().await;

    master.mode(Mode::Finished);
    settle().await;
    assert_eq!(
        master.infos().iter().filter_map(mode_of).last(),
        Some(Mode::Buffering)
    );

    // Data keeps the drain going.
    tokio::time::sleep(Duration::from_secs(8)).await;
    alice.data(harness.granule(), 20);
    tokio::time::sleep(Duration::from_secs(8)).await;
    assert!(master.infos().iter().filter_map(mode_of).next().is_none());
    assert_eq!(harness.data_pages(1).len(), 1);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(
        master.infos().iter().filter_map(mode_of).last(),
        Some(Mode::Finished)
    );
}

#[tokio::test(start_paused = true)]
async fn last_participant_leaving_finishes_and_session_exits() {
    let harness = Harness::start(test_config(), show());
    let mut master = harness.master().await;
    let mut alice = harness.data("10.0.0.1", "alice").await;
    master.mode(Mode::Recording);
    settle().await;
    master.take();

    alice.inner.disconnect();
    settle().await;
    assert_eq!(
        master.infos().iter().filter_map(mode_of).last(),
        Some(Mode::Finished)
    );

    master.inner.disconnect();
    let exit = harness.session.await.unwrap();
    assert_eq!(exit, SessionExit::Finished);

    let info = String::from_utf8(harness.sinks.info.contents()).unwrap();
    let lines: Vec<&str> = info.lines().collect();
    assert_eq!(lines.len(), 2);
    let summary: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(summary["mode"], 4);
    assert_eq!(summary["tracks"], 1);
}

#[tokio::test(start_paused = true)]
async fn unstarted_session_is_abandoned() {
    let harness = Harness::start(test_config(), show());
    let exit = harness.session.await.unwrap();
    assert_eq!(exit, SessionExit::Abandoned);
}

#[tokio::test(start_paused = true)]
async fn stop_token_interrupts_and_closes_sockets() {
    let harness = Harness::start(test_config(), show());
    let mut master = harness.master().await;
    master.mode(Mode::Recording);
    settle().await;
    master.take();

    harness.stop.cancel();
    let exit = harness.session.await.unwrap();
    assert_eq!(exit, SessionExit::Interrupted);
    settle().await;
    assert_eq!(
        master.infos().iter().filter_map(mode_of).last(),
        Some(Mode::Finished)
    );
    assert!(master.closed);

    let info = String::from_utf8(harness.sinks.info.contents()).unwrap();
    assert_eq!(info.lines().count(), 2);
}
