//! Test-only helper for obtaining a connected pair of TCP streams.
//!
//! Gated behind the `test-support` feature so `feng-connection` and
//! `feng-server` can depend on it as a dev-dependency without pulling
//! test-only code into release builds. Mirrors the loopback-`TcpListener`
//! pattern used throughout this workspace's own integration tests rather
//! than fabricating an in-memory transport.

use compio::net::{TcpListener, TcpStream};
use std::io;

/// Bind an ephemeral loopback listener and connect to it, returning the
/// accepted server-side stream and the client-side stream.
///
/// Scenario tests that need "two ends of a connection" (e.g. admitting a
/// client, then driving it as if a peer were writing RTSP requests) use
/// this instead of standing up a full `Listener`.
pub async fn duplex_pair() -> io::Result<(TcpStream, TcpStream)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let connect = TcpStream::connect(addr);
    let accept = listener.accept();

    let (client_res, accept_res) = futures::join!(connect, accept);
    let client = client_res?;
    let (server, _peer_addr) = accept_res?;
    Ok((server, client))
}
