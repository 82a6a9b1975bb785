//! End-to-end client lifecycle scenarios: admission, shutdown broadcast,
//! hard timeout, and HTTP-tunnel pair teardown.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use compio::buf::BufResult;
use compio::io::{AsyncReadExt, AsyncWriteExt};
use feng_connection::client::{Client, PairRole, StopReason, TransportKind};
use feng_connection::output::Transport;
use feng_connection::registry::ClientRegistry;
use feng_connection::runner::ClientRunner;
use feng_connection::traits::{
    ReadOutcome, RequestHandler, RtpSession, SourceKind, VirtualHostHandle,
};

struct CountingVhost {
    count: AtomicUsize,
}

impl VirtualHostHandle for CountingVhost {
    fn name(&self) -> &str {
        "default"
    }
    fn connection_opened(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
    fn connection_closed(&self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A handler that closes the connection on any byte that isn't `b'O'`
/// (stand-in for "malformed RTSP request").
struct EchoOrRejectHandler;

impl RequestHandler for EchoOrRejectHandler {
    fn on_readable(&mut self, _client: &mut Client, data: &[u8]) -> ReadOutcome {
        if data.first() == Some(&b'O') {
            ReadOutcome::Response(Bytes::from_static(b"RTSP/1.0 200 OK\r\n\r\n"))
        } else {
            ReadOutcome::FatalError
        }
    }
    fn rtp_sessions(&self) -> &[Arc<dyn RtpSession>] {
        &[]
    }
}

fn local_peer_strs(addr: SocketAddr) -> (String, String) {
    (addr.to_string(), addr.to_string())
}

/// A fake RTP session whose idle time is fixed at construction, so the
/// timeout scenarios below don't race real wall-clock sleeps.
struct FakeSession {
    last_sent: Instant,
    kind: SourceKind,
    bye_sent: Arc<AtomicBool>,
}

impl RtpSession for FakeSession {
    fn last_packet_send_time(&self) -> Instant {
        self.last_sent
    }
    fn source_kind(&self) -> SourceKind {
        self.kind
    }
    fn send_rtcp_bye(&self) {
        self.bye_sent.store(true, Ordering::SeqCst);
    }
}

/// A handler that never produces a response and never errors; it exists
/// purely to carry RTP sessions for `TimeoutMonitor` to sweep.
struct TimeoutProbeHandler {
    sessions: Vec<Arc<dyn RtpSession>>,
}

impl RequestHandler for TimeoutProbeHandler {
    fn on_readable(&mut self, _client: &mut Client, _data: &[u8]) -> ReadOutcome {
        ReadOutcome::NeedMore
    }
    fn rtp_sessions(&self) -> &[Arc<dyn RtpSession>] {
        &self.sessions
    }
}

async fn admit_with_sessions(
    stream: compio::net::TcpStream,
    vhost: Arc<dyn VirtualHostHandle>,
    sessions: Vec<Arc<dyn RtpSession>>,
) -> Client {
    let local = stream.local_addr().unwrap();
    let peer = stream.peer_addr().unwrap();
    let (local_host, peer_host) = local_peer_strs(peer);
    vhost.connection_opened();
    let mut client = Client::new(
        TransportKind::Tcp,
        stream,
        local,
        peer,
        local_host,
        peer_host,
        Transport::new_tcp(None),
        vhost,
    );
    client.set_handler(Box::new(TimeoutProbeHandler { sessions }));
    client
}

async fn admit(
    stream: compio::net::TcpStream,
    vhost: Arc<dyn VirtualHostHandle>,
) -> Client {
    let local = stream.local_addr().unwrap();
    let peer = stream.peer_addr().unwrap();
    let (local_host, peer_host) = local_peer_strs(peer);
    vhost.connection_opened();
    let mut client = Client::new(
        TransportKind::Tcp,
        stream,
        local,
        peer,
        local_host,
        peer_host,
        Transport::new_tcp(None),
        vhost,
    );
    client.set_handler(Box::new(EchoOrRejectHandler));
    client
}

#[compio::test]
async fn malformed_byte_closes_connection_and_decrements_vhost() {
    let (server, mut client_io) = feng_core::test_support::duplex_pair().await.unwrap();
    let vhost_concrete = Arc::new(CountingVhost {
        count: AtomicUsize::new(0),
    });
    let vhost: Arc<dyn VirtualHostHandle> = vhost_concrete.clone();
    let registry = Arc::new(ClientRegistry::new());

    let client = admit(server, vhost).await;
    assert_eq!(vhost_concrete.count.load(Ordering::SeqCst), 1);
    let runner = ClientRunner::new(
        client,
        registry.clone(),
        Duration::from_secs(6),
        Duration::from_secs(12),
    );

    let run_task = compio::runtime::spawn(runner.run());

    // Send a malformed byte (not 'O') -> handler reports FatalError.
    let BufResult(res, _) = client_io.write_all(b"X".to_vec()).await;
    res.unwrap();

    let reason = run_task.await;
    assert_eq!(reason, StopReason::ProtocolError);
    assert!(registry.is_empty());
    assert_eq!(vhost_concrete.count.load(Ordering::SeqCst), 0);
}

#[compio::test]
async fn well_formed_request_gets_a_response() {
    let (server, mut client_io) = feng_core::test_support::duplex_pair().await.unwrap();
    let vhost: Arc<dyn VirtualHostHandle> = Arc::new(CountingVhost {
        count: AtomicUsize::new(0),
    });
    let registry = Arc::new(ClientRegistry::new());

    let client = admit(server, vhost).await;
    let runner = ClientRunner::new(
        client,
        registry.clone(),
        Duration::from_secs(6),
        Duration::from_secs(12),
    );
    let run_task = compio::runtime::spawn(runner.run());

    let BufResult(res, _) = client_io.write_all(b"OPTIONS".to_vec()).await;
    res.unwrap();

    let mut resp = vec![0u8; b"RTSP/1.0 200 OK\r\n\r\n".len()];
    let BufResult(read_res, resp) = client_io.read_exact(resp).await;
    read_res.unwrap();
    assert_eq!(&resp[..], b"RTSP/1.0 200 OK\r\n\r\n");

    drop(client_io);
    let reason = run_task.await;
    assert_eq!(reason, StopReason::Eof);
    assert!(registry.is_empty());
}

#[compio::test]
async fn broadcast_shutdown_stops_every_client() {
    let registry = Arc::new(ClientRegistry::new());
    let vhost: Arc<dyn VirtualHostHandle> = Arc::new(CountingVhost {
        count: AtomicUsize::new(0),
    });

    let mut tasks = Vec::new();
    let mut client_sides = Vec::new();
    for _ in 0..8 {
        let (server, client_io) = feng_core::test_support::duplex_pair().await.unwrap();
        let client = admit(server, vhost.clone()).await;
        let runner = ClientRunner::new(
            client,
            registry.clone(),
            Duration::from_secs(6),
            Duration::from_secs(12),
        );
        tasks.push(compio::runtime::spawn(runner.run()));
        client_sides.push(client_io);
    }

    // Give every task a chance to register before broadcasting shutdown.
    compio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(registry.len(), 8);

    registry.shutdown();

    for task in tasks {
        let reason = task.await;
        assert_eq!(reason, StopReason::Shutdown);
    }
    assert!(registry.is_empty());
}

/// HTTP-tunnel pair teardown asymmetry, exercised directly against
/// `ClientHandle`/`PairRole` without standing up a full HTTP-tunnel
/// negotiation (that negotiation is the RTSP layer's job, out of scope
/// for this crate).
#[compio::test]
async fn http_tunnel_post_side_tears_down_sibling() {
    let registry = Arc::new(ClientRegistry::new());
    let vhost: Arc<dyn VirtualHostHandle> = Arc::new(CountingVhost {
        count: AtomicUsize::new(0),
    });

    let (get_server, _get_client_io) = feng_core::test_support::duplex_pair().await.unwrap();
    let (post_server, post_client_io) = feng_core::test_support::duplex_pair().await.unwrap();

    let mut get_client = admit(get_server, vhost.clone()).await;
    let mut post_client = admit(post_server, vhost.clone()).await;

    let get_handle = get_client.handle();
    let post_handle = post_client.handle();
    get_client.link_pair(post_handle.clone(), PairRole::Get);
    post_client.link_pair(get_handle.clone(), PairRole::Post);

    let get_runner = ClientRunner::new(
        get_client,
        registry.clone(),
        Duration::from_secs(6),
        Duration::from_secs(12),
    );
    let post_runner = ClientRunner::new(
        post_client,
        registry.clone(),
        Duration::from_secs(6),
        Duration::from_secs(12),
    );

    let get_task = compio::runtime::spawn(get_runner.run());
    let post_task = compio::runtime::spawn(post_runner.run());

    compio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(registry.len(), 2);

    // Close the POST side: both tear down.
    drop(post_client_io);

    let post_reason = post_task.await;
    assert_eq!(post_reason, StopReason::Eof);

    let get_reason = get_task.await;
    assert_eq!(get_reason, StopReason::Eof);

    assert!(registry.is_empty());
}

/// HTTP-tunnel pair teardown asymmetry, other direction: closing the GET
/// side frees only the GET client; the POST side stays live and tears
/// itself down on its own disconnect later.
#[compio::test]
async fn http_tunnel_get_side_closing_first_leaves_post_side_live() {
    let registry = Arc::new(ClientRegistry::new());
    let vhost: Arc<dyn VirtualHostHandle> = Arc::new(CountingVhost {
        count: AtomicUsize::new(0),
    });

    let (get_server, get_client_io) = feng_core::test_support::duplex_pair().await.unwrap();
    let (post_server, post_client_io) = feng_core::test_support::duplex_pair().await.unwrap();

    let mut get_client = admit(get_server, vhost.clone()).await;
    let mut post_client = admit(post_server, vhost.clone()).await;

    let get_handle = get_client.handle();
    let post_handle = post_client.handle();
    get_client.link_pair(post_handle.clone(), PairRole::Get);
    post_client.link_pair(get_handle.clone(), PairRole::Post);

    let get_runner = ClientRunner::new(
        get_client,
        registry.clone(),
        Duration::from_secs(6),
        Duration::from_secs(12),
    );
    let post_runner = ClientRunner::new(
        post_client,
        registry.clone(),
        Duration::from_secs(6),
        Duration::from_secs(12),
    );

    let get_task = compio::runtime::spawn(get_runner.run());
    let post_task = compio::runtime::spawn(post_runner.run());

    compio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(registry.len(), 2);

    // Close the GET side only: the GET client frees itself, the POST
    // side is untouched and keeps running.
    drop(get_client_io);

    let get_reason = get_task.await;
    assert_eq!(get_reason, StopReason::Eof);

    compio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(registry.len(), 1);

    // Now the POST side disconnects on its own and frees itself.
    drop(post_client_io);
    let post_reason = post_task.await;
    assert_eq!(post_reason, StopReason::Eof);
    assert!(registry.is_empty());
}

/// End-to-end through the real `ClientRunner` loop and its repeating
/// timer: a LIVE session idle past the soft threshold but under the hard
/// one gets exactly an RTCP BYE and the client stays up.
#[compio::test]
async fn live_session_soft_timeout_emits_bye_and_stays_connected() {
    let registry = Arc::new(ClientRegistry::new());
    let vhost: Arc<dyn VirtualHostHandle> = Arc::new(CountingVhost {
        count: AtomicUsize::new(0),
    });
    let (server, _client_io) = feng_core::test_support::duplex_pair().await.unwrap();

    let bye_sent = Arc::new(AtomicBool::new(false));
    // Already past the 30ms soft threshold but nowhere near a 600ms hard
    // one — a wide soft/hard gap so the repeating sweep (driven at the
    // soft interval) has room for a couple of ticks without ever
    // crossing into hard-timeout territory.
    let session: Arc<dyn RtpSession> = Arc::new(FakeSession {
        last_sent: Instant::now() - Duration::from_millis(40),
        kind: SourceKind::Live,
        bye_sent: bye_sent.clone(),
    });

    let client = admit_with_sessions(server, vhost, vec![session]).await;
    let handle = client.handle();
    let runner = ClientRunner::new(
        client,
        registry.clone(),
        Duration::from_millis(30),
        Duration::from_millis(600),
    );
    let task = compio::runtime::spawn(runner.run());

    // Give the repeating timer (period = live_stream_bye_timeout) a
    // couple of ticks.
    compio::time::sleep(Duration::from_millis(80)).await;
    assert!(bye_sent.load(Ordering::SeqCst));
    assert_eq!(registry.len(), 1);

    handle.signal_stop(StopReason::Shutdown);
    let reason = task.await;
    assert_eq!(reason, StopReason::Shutdown);
}

/// A LIVE session idle past the hard threshold gets the hard kick; the
/// client's loop stops and it is removed from the registry.
#[compio::test]
async fn live_session_hard_timeout_stops_the_loop() {
    let registry = Arc::new(ClientRegistry::new());
    let vhost: Arc<dyn VirtualHostHandle> = Arc::new(CountingVhost {
        count: AtomicUsize::new(0),
    });
    let (server, _client_io) = feng_core::test_support::duplex_pair().await.unwrap();

    let bye_sent = Arc::new(AtomicBool::new(false));
    let session: Arc<dyn RtpSession> = Arc::new(FakeSession {
        last_sent: Instant::now() - Duration::from_millis(65),
        kind: SourceKind::Live,
        bye_sent: bye_sent.clone(),
    });

    let client = admit_with_sessions(server, vhost, vec![session]).await;
    let runner = ClientRunner::new(
        client,
        registry.clone(),
        Duration::from_millis(30),
        Duration::from_millis(60),
    );
    let task = compio::runtime::spawn(runner.run());

    let reason = task.await;
    assert_eq!(reason, StopReason::HardTimeout);
    assert!(bye_sent.load(Ordering::SeqCst));
    assert!(registry.is_empty());
}

/// A STORED session idle past the hard threshold gets the hard kick too,
/// but never an RTCP BYE (that warning is LIVE-only).
#[compio::test]
async fn stored_session_hard_timeout_stops_without_bye() {
    let registry = Arc::new(ClientRegistry::new());
    let vhost: Arc<dyn VirtualHostHandle> = Arc::new(CountingVhost {
        count: AtomicUsize::new(0),
    });
    let (server, _client_io) = feng_core::test_support::duplex_pair().await.unwrap();

    let bye_sent = Arc::new(AtomicBool::new(false));
    let session: Arc<dyn RtpSession> = Arc::new(FakeSession {
        last_sent: Instant::now() - Duration::from_millis(65),
        kind: SourceKind::Stored,
        bye_sent: bye_sent.clone(),
    });

    let client = admit_with_sessions(server, vhost, vec![session]).await;
    let runner = ClientRunner::new(
        client,
        registry.clone(),
        Duration::from_millis(30),
        Duration::from_millis(60),
    );
    let task = compio::runtime::spawn(runner.run());

    let reason = task.await;
    assert_eq!(reason, StopReason::HardTimeout);
    assert!(!bye_sent.load(Ordering::SeqCst));
    assert!(registry.is_empty());
}
