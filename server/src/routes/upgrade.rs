//! WebSocket upgrades on `GET /ws` and `GET /ws/viewer`, with slot arbitration.
//!
//! Checks run in a fixed order, each with its own status:
//!
//! | Check                          | Controller | Viewer |
//! |--------------------------------|------------|--------|
//! | `?password=` for the role      | `403`      | `403`  |
//! | session slot                   | `409` if taken | `409` if empty |
//! | `Upgrade` / `Sec-WebSocket-Key`| `404`      | `404`  |
//!
//! A controller holds the slot lock from the occupancy check until its
//! session is stored, so two concurrent `/ws` requests cannot both succeed.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn, Instrument};

use crate::engine::driver::{self, DriverSettings};
use crate::http::{self, Request, Status};
use crate::sessions::{Role, Session};
use crate::state::AppState;
use crate::ws::{handshake, BoxReader, BoxWriter, Connection};

/// Write an error response; the socket is dropped right after.
async fn reject(writer: &mut BoxWriter, status: Status, message: &str) {
    if let Err(e) = http::write_text(writer, status, message).await {
        debug!("rejection write failed: {e}");
    }
}

/// Upgrade to the controller connection and run the application on it.
///
/// Returns when the controller disconnects, after every viewer has been
/// closed and the slot released.
pub async fn controller(state: &AppState, request: &Request, reader: BoxReader, mut writer: BoxWriter) {
    if !state
        .config
        .auth
        .permits(Role::Controller, request.query_param("password"))
    {
        warn!("controller rejected: invalid password");
        reject(&mut writer, Status::Forbidden, "invalid password\n").await;
        return;
    }

    let server = &state.config.server;
    let (conn, session) = {
        let mut slot = state.slot.lock().await;
        if slot.is_some() {
            info!("controller rejected: slot already taken");
            reject(&mut writer, Status::Conflict, "slot already taken\n").await;
            return;
        }
        let Some(accept) = handshake::accept_for(request) else {
            debug!("controller rejected: not a websocket upgrade");
            reject(&mut writer, Status::NotFound, "not found\n").await;
            return;
        };
        let conn = match Connection::accept(reader, writer, &accept, server.max_frame_size).await {
            Ok(conn) => Arc::new(conn),
            Err(e) => {
                debug!("controller handshake failed: {e}");
                return;
            }
        };
        let session = Arc::new(Session::new(
            Arc::clone(&conn),
            Duration::from_millis(server.viewer_send_timeout_ms),
        ));
        *slot = Some(Arc::clone(&session));
        (conn, session)
    };
    info!(conn = %conn.id(), session = %session.id(), "controller connected");

    if let Err(e) = conn.send_text(&Role::Controller.announcement()).await {
        debug!(conn = %conn.id(), "role message failed: {e}");
    }

    // A panicking page must not skip the teardown below and leak the slot.
    let driver = tokio::spawn(
        driver::run_controller(
            Arc::clone(&conn),
            Arc::clone(&session),
            Arc::clone(&state.pages),
            DriverSettings::from(server),
        )
        .in_current_span(),
    );
    if let Err(e) = driver.await {
        error!(conn = %conn.id(), session = %session.id(), "controller task failed: {e}");
    }

    conn.close().await;
    session.close_all_viewers().await;
    state.slot.release(&session).await;
    info!(conn = %conn.id(), session = %session.id(), "controller disconnected");
}

/// Upgrade to a read-only viewer of the current session.
///
/// Incoming frames are drained and discarded until the connection closes,
/// either from the peer side or because the session ended.
pub async fn viewer(state: &AppState, request: &Request, reader: BoxReader, mut writer: BoxWriter) {
    if !state
        .config
        .auth
        .permits(Role::Viewer, request.query_param("password"))
    {
        warn!("viewer rejected: invalid password");
        reject(&mut writer, Status::Forbidden, "invalid password\n").await;
        return;
    }

    let session = match state.slot.current().await {
        Some(session) if session.is_active().await => session,
        _ => {
            info!("viewer rejected: no controller connected yet");
            reject(&mut writer, Status::Conflict, "no controller connected yet\n").await;
            return;
        }
    };

    let Some(accept) = handshake::accept_for(request) else {
        debug!("viewer rejected: not a websocket upgrade");
        reject(&mut writer, Status::NotFound, "not found\n").await;
        return;
    };
    let conn = match Connection::accept(reader, writer, &accept, state.config.server.max_frame_size)
        .await
    {
        Ok(conn) => Arc::new(conn),
        Err(e) => {
            debug!("viewer handshake failed: {e}");
            return;
        }
    };

    // Announce the role before joining so it precedes any broadcast.
    if let Err(e) = conn.send_text(&Role::Viewer.announcement()).await {
        debug!(conn = %conn.id(), "role message failed: {e}");
        return;
    }
    if !session.add_viewer(Arc::clone(&conn)).await {
        debug!(conn = %conn.id(), "session ended during viewer upgrade");
        conn.close().await;
        return;
    }
    info!(conn = %conn.id(), session = %session.id(), "viewer connected");

    while conn.recv_text().await.is_some() {}

    session.remove_viewer(&conn).await;
    conn.close().await;
    info!(conn = %conn.id(), session = %session.id(), "viewer disconnected");
}
