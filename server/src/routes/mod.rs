//! TCP accept loop and per-connection request dispatch.
//!
//! Every accepted socket gets its own task. The task reads exactly one HTTP
//! request and dispatches on the exact path:
//!
//! | Path          | Handler                                   |
//! |---------------|-------------------------------------------|
//! | `/ws`         | [`upgrade::controller`]                   |
//! | `/ws/viewer`  | [`upgrade::viewer`]                       |
//! | anything else | [`assets::serve`] (static file or `404`)  |
//!
//! A failure on one connection never reaches the accept loop.

pub mod assets;
pub mod upgrade;

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::http::{self, HttpError, Status};
use crate::state::AppState;
use crate::ws::{BoxReader, BoxWriter};

/// Pause after a failed `accept` (e.g. out of file descriptors).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// An HTTP/WebSocket front-end bound to one [`AppState`].
pub struct Server {
    state: AppState,
}

impl Server {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Accept connections until `shutdown` resolves, then end the active
    /// session (controller and viewers).
    pub async fn serve(self, listener: TcpListener, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let state = self.state.clone();
                        let span = info_span!("conn", id = %Uuid::new_v4(), %peer);
                        tokio::spawn(handle_stream(state, stream).instrument(span));
                    }
                    Err(e) => {
                        warn!("accept failed: {e}");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }

        if let Some(session) = self.state.slot.current().await {
            info!(session = %session.id(), "closing active session");
            session.controller().close().await;
            session.close_all_viewers().await;
        }
    }
}

/// Serve one request on `stream`, upgrading it if asked to.
pub async fn handle_stream<S>(state: AppState, stream: S)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read, write) = tokio::io::split(stream);
    let mut reader = BufReader::new(read);
    let mut writer: BoxWriter = Box::new(write);

    let request = match http::read_request(&mut reader, state.config.server.max_header_bytes).await
    {
        Ok(request) => request,
        Err(HttpError::Closed) => return,
        Err(e) => {
            debug!("bad request: {e}");
            http::write_text(&mut writer, Status::BadRequest, "bad request\n")
                .await
                .ok();
            return;
        }
    };
    debug!(method = %request.method, path = %request.path, "request");

    // The buffered reader may already hold bytes sent right after the head.
    let reader: BoxReader = Box::new(reader);
    match request.path.as_str() {
        "/ws" => upgrade::controller(&state, &request, reader, writer).await,
        "/ws/viewer" => upgrade::viewer(&state, &request, reader, writer).await,
        path => assets::serve(&state, path, &mut writer).await,
    }
}
