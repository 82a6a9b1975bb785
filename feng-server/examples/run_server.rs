//! Minimal runnable RTSP server: binds a TCP listener and replies `RTSP/1.0
//! 501 Not Implemented` to anything it reads, since request parsing lives
//! outside this crate. Useful for exercising the accept/admit/teardown path
//! end to end without a real RTSP stack attached.
//!
//! Run with `RUST_LOG=info cargo run --example run_server`.

use std::sync::Arc;

use bytes::Bytes;
use feng_connection::client::Client;
use feng_connection::traits::{ReadOutcome, RequestHandler, RtpSession};
use feng_core::options::ConnectionOptions;
use feng_server::core::Core;
use feng_server::listener::Listener;

struct NotImplementedHandler;

impl RequestHandler for NotImplementedHandler {
    fn on_readable(&mut self, _client: &mut Client, _data: &[u8]) -> ReadOutcome {
        ReadOutcome::Response(Bytes::from_static(
            b"RTSP/1.0 501 Not Implemented\r\nCSeq: 1\r\n\r\n",
        ))
    }

    fn rtp_sessions(&self) -> &[Arc<dyn RtpSession>] {
        &[]
    }
}

#[compio::main]
async fn main() -> std::io::Result<()> {
    feng_server::dev_tracing::init_tracing();

    let addr = "0.0.0.0:5540".parse().unwrap();
    let listener = Listener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr(), "feng-server example listening");

    let core = Arc::new(Core::new(ConnectionOptions::default()));
    let handlers: Arc<dyn feng_server::admitter::HandlerFactory> =
        Arc::new(|| -> Box<dyn RequestHandler> { Box::new(NotImplementedHandler) });

    listener.run(core, handlers).await;
    Ok(())
}
