//! Per-controller orchestration.
//!
//! Three futures run concurrently for every controller connection, joined in
//! the connection's own task so none of them can outlive it:
//!
//! - **reader**: `recv_text` loop; decodes `key`/`resize`/`mouse` messages
//!   into [`Event`]s for the page. Ends when the connection closes.
//! - **flusher**: every tick, drains the [`OutputBuffer`] and sends the same
//!   text to the controller and to every viewer. Flushes once more and closes
//!   the controller when told to stop.
//! - **driver**: runs the current [`Page`] and follows its [`Outcome`]
//!   through the page stack until the application quits.
//!
//! Whichever of reader or driver finishes first cancels the shared stop
//! token; the flusher then closes the connection, which ends the reader.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Event, Outcome, Page, PageRegistry, RemoteTerminal, BACK};
use crate::config::ServerConfig;
use crate::sessions::buffer::OutputBuffer;
use crate::sessions::Session;
use crate::ws::Connection;

/// Capacity of the reader → page event queue.
const EVENT_QUEUE: usize = 256;

/// `tokio::time::interval` rejects a zero period.
const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(1);

/// Timing and sizing knobs for one controller.
#[derive(Debug, Clone, Copy)]
pub struct DriverSettings {
    pub flush_interval: Duration,
    pub refresh_interval: Duration,
    /// `(rows, cols)` until the client reports its real size.
    pub initial_size: (u16, u16),
}

impl From<&ServerConfig> for DriverSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            flush_interval: Duration::from_millis(config.flush_interval_ms),
            refresh_interval: Duration::from_millis(config.refresh_interval_ms),
            initial_size: (config.default_rows, config.default_cols),
        }
    }
}

/// Messages a controller may send. Anything else is ignored.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ClientMessage {
    Key { key: String },
    Resize { rows: u16, cols: u16 },
    Mouse { row: u16, col: u16 },
}

/// Decode one controller message. Malformed JSON and unknown types yield `None`.
pub fn parse_client_message(text: &str) -> Option<Event> {
    let message = serde_json::from_str::<ClientMessage>(text).ok()?;
    Some(match message {
        ClientMessage::Key { key } => Event::Key(key),
        ClientMessage::Resize { rows, cols } => Event::Resize { rows, cols },
        ClientMessage::Mouse { row, col } => Event::Mouse { row, col },
    })
}

/// Run the application for one controller until it quits or disconnects.
///
/// Returns once the controller connection is closed. Viewer teardown is the
/// caller's job.
pub async fn run_controller(
    conn: Arc<Connection>,
    session: Arc<Session>,
    pages: Arc<PageRegistry>,
    settings: DriverSettings,
) {
    let stop = CancellationToken::new();
    let output = Arc::new(OutputBuffer::new());
    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE);
    let mut term = RemoteTerminal::new(
        Arc::clone(&output),
        events_rx,
        settings.initial_size,
        settings.refresh_interval,
    );

    let driver = async {
        drive_pages(&pages, &mut term, &stop).await;
        stop.cancel();
    };
    let flusher = flush_output(&conn, &session, &output, settings.flush_interval, &stop);
    let reader = read_input(&conn, events_tx, &stop);

    tokio::join!(driver, flusher, reader);
    info!(conn = %conn.id(), session = %session.id(), "controller finished");
}

async fn read_input(conn: &Connection, events: mpsc::Sender<Event>, stop: &CancellationToken) {
    while let Some(text) = conn.recv_text().await {
        let Some(event) = parse_client_message(&text) else {
            debug!(conn = %conn.id(), "ignored client message: {text}");
            continue;
        };
        // The page may have returned with the queue still full.
        tokio::select! {
            sent = events.send(event) => {
                if sent.is_err() {
                    break;
                }
            }
            () = stop.cancelled() => break,
        }
    }
    debug!(conn = %conn.id(), "controller input closed");
    stop.cancel();
}

async fn flush_output(
    conn: &Connection,
    session: &Session,
    output: &OutputBuffer,
    interval: Duration,
    stop: &CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval.max(MIN_FLUSH_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            () = stop.cancelled() => break,
            _ = ticker.tick() => flush_once(conn, session, output).await,
        }
    }
    // Deliver whatever the last page rendered before it returned.
    flush_once(conn, session, output).await;
    conn.close().await;
}

/// Send pending output to the controller and broadcast the same text.
async fn flush_once(conn: &Connection, session: &Session, output: &OutputBuffer) {
    let Some(bytes) = output.take() else {
        return;
    };
    let text = String::from_utf8_lossy(&bytes);
    if let Err(e) = conn.send_text(&text).await {
        debug!(conn = %conn.id(), "controller send failed: {e}");
        conn.close().await;
    }
    session.broadcast(&text).await;
}

async fn drive_pages(pages: &PageRegistry, term: &mut RemoteTerminal, stop: &CancellationToken) {
    let mut stack = PageStack::default();
    let mut current = pages.home();
    loop {
        debug!(page = current.name(), "running page");
        let outcome = tokio::select! {
            outcome = current.run(term) => outcome,
            () = stop.cancelled() => return,
        };
        match stack.next(current, outcome, pages) {
            Some(page) => current = page,
            None => return,
        }
    }
}

/// History of pages left via `SwitchTo`, most recent last.
#[derive(Default)]
struct PageStack {
    history: Vec<Arc<dyn Page>>,
}

impl PageStack {
    /// Apply `outcome` of `current`; `None` means the session is over.
    fn next(
        &mut self,
        current: Arc<dyn Page>,
        outcome: Outcome,
        pages: &PageRegistry,
    ) -> Option<Arc<dyn Page>> {
        match outcome {
            Outcome::Quit => {
                info!(page = current.name(), "application quit");
                None
            }
            Outcome::SwitchTo(name) if name == BACK => {
                let previous = self.history.pop();
                match &previous {
                    Some(page) => info!(from = current.name(), to = page.name(), "back"),
                    None => info!(page = current.name(), "back with empty history"),
                }
                previous
            }
            Outcome::SwitchTo(name) => {
                let Some(page) = pages.find(&name) else {
                    warn!(from = current.name(), "switch to unknown page {name:?}");
                    return None;
                };
                info!(from = current.name(), to = page.name(), "switch");
                self.history.push(current);
                Some(page)
            }
        }
    }
}
