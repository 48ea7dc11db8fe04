//! The controller/viewer session.
//!
//! At most one [`Session`] exists per server. It is created together with a
//! successful controller upgrade and ends when the controller disconnects,
//! taking every viewer down with it.
//!
//! ## Concurrency
//!
//! The viewer list and the `active` flag live behind one async `Mutex`.
//! [`Session::broadcast`] holds it for the whole fan-out, so a viewer joining
//! or leaving never observes a half-sent broadcast. Viewers whose send fails,
//! stalls, or who are already closed are pruned in the same pass.
//!
//! [`SessionSlot`] is the router-owned `Option<Arc<Session>>`. Controller
//! upgrades hold its lock across the check-and-insert so two concurrent
//! `/ws` requests cannot both win.

pub mod buffer;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

use crate::ws::Connection;

/// Which side of a session a connection plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Controller,
    Viewer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Controller => "controller",
            Self::Viewer => "viewer",
        }
    }

    /// The one-time message sent right after the upgrade.
    pub fn announcement(self) -> String {
        format!(r#"{{"type":"role","role":"{}"}}"#, self.as_str())
    }
}

struct Viewers {
    list: Vec<Arc<Connection>>,
    active: bool,
}

/// One controller plus the viewers mirroring it.
pub struct Session {
    id: Uuid,
    controller: Arc<Connection>,
    viewers: Mutex<Viewers>,
    /// How long a single viewer send may take before the viewer is dropped.
    send_timeout: Duration,
}

impl Session {
    pub fn new(controller: Arc<Connection>, send_timeout: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            controller,
            viewers: Mutex::new(Viewers {
                list: Vec::new(),
                active: true,
            }),
            send_timeout,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn controller(&self) -> &Arc<Connection> {
        &self.controller
    }

    pub async fn is_active(&self) -> bool {
        self.viewers.lock().await.active
    }

    pub async fn viewer_count(&self) -> usize {
        self.viewers.lock().await.list.len()
    }

    /// Attach a viewer. Returns `false` if the session has already ended, in
    /// which case the caller still owns `conn` and should close it.
    pub async fn add_viewer(&self, conn: Arc<Connection>) -> bool {
        let mut viewers = self.viewers.lock().await;
        if !viewers.active {
            return false;
        }
        info!(session = %self.id, viewer = %conn.id(), "viewer joined");
        viewers.list.push(conn);
        true
    }

    pub async fn remove_viewer(&self, conn: &Connection) {
        let mut viewers = self.viewers.lock().await;
        let before = viewers.list.len();
        viewers.list.retain(|v| v.id() != conn.id());
        if viewers.list.len() < before {
            info!(session = %self.id, viewer = %conn.id(), "viewer left");
        }
    }

    /// Send `text` to every viewer, dropping the ones that fail.
    pub async fn broadcast(&self, text: &str) {
        let mut viewers = self.viewers.lock().await;
        if viewers.list.is_empty() {
            return;
        }
        let mut kept = Vec::with_capacity(viewers.list.len());
        for viewer in viewers.list.drain(..) {
            match tokio::time::timeout(self.send_timeout, viewer.send_text(text)).await {
                Ok(Ok(())) if !viewer.is_closed() => kept.push(viewer),
                Ok(Ok(())) => {
                    debug!(session = %self.id, viewer = %viewer.id(), "pruned closed viewer");
                }
                Ok(Err(e)) => {
                    debug!(session = %self.id, viewer = %viewer.id(), "pruned viewer: {e}");
                    self.drop_viewer(&viewer).await;
                }
                Err(_) => {
                    debug!(session = %self.id, viewer = %viewer.id(), "pruned stalled viewer");
                    self.drop_viewer(&viewer).await;
                }
            }
        }
        viewers.list = kept;
    }

    /// Close every viewer and mark the session inactive. Idempotent.
    pub async fn close_all_viewers(&self) {
        let mut viewers = self.viewers.lock().await;
        if !viewers.active {
            return;
        }
        let count = viewers.list.len();
        for viewer in viewers.list.drain(..) {
            self.close_viewer(&viewer).await;
        }
        viewers.active = false;
        info!(session = %self.id, "session ended, closed {count} viewer(s)");
    }
}

impl Session {
    /// Close with the same bound as a send; a peer that stopped reading
    /// must not wedge the session lock.
    async fn close_viewer(&self, viewer: &Connection) {
        tokio::time::timeout(self.send_timeout, viewer.close())
            .await
            .ok();
    }

    /// A failed or timed-out send may have left a torn frame on the wire,
    /// so the socket is shut down without a close frame.
    async fn drop_viewer(&self, viewer: &Connection) {
        tokio::time::timeout(self.send_timeout, viewer.terminate())
            .await
            .ok();
    }
}

/// The router-owned slot holding the current session, if any.
///
/// Cloneable: all clones share the same inner `Arc<Mutex<...>>`.
#[derive(Clone, Default)]
pub struct SessionSlot {
    inner: Arc<Mutex<Option<Arc<Session>>>>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the slot for a check-and-insert.
    pub async fn lock(&self) -> MutexGuard<'_, Option<Arc<Session>>> {
        self.inner.lock().await
    }

    pub async fn current(&self) -> Option<Arc<Session>> {
        self.inner.lock().await.clone()
    }

    /// Empty the slot, but only if it still holds `session`.
    pub async fn release(&self, session: &Arc<Session>) {
        let mut slot = self.inner.lock().await;
        if slot.as_ref().is_some_and(|s| Arc::ptr_eq(s, session)) {
            *slot = None;
        }
    }
}
