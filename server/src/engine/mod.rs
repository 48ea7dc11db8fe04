//! Boundary between the transport and the rendering engine.
//!
//! A [`Page`] is one screen of the application. The driver hands it a
//! [`RemoteTerminal`] and awaits its [`Outcome`]: either `Quit`, or a request
//! to switch to another page by name ([`BACK`] returns to the previous one).
//!
//! The terminal adapter is all a page ever sees of the network: `write` goes
//! to the connection's output buffer, `poll` yields input events decoded from
//! the controller's messages, and `size` reports the last known dimensions.

pub mod driver;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::sessions::buffer::OutputBuffer;

/// Page name that pops the page stack instead of looking up a page.
pub const BACK: &str = "__BACK__";

/// Input seen by a page through [`RemoteTerminal::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Key(String),
    Resize { rows: u16, cols: u16 },
    Mouse { row: u16, col: u16 },
    /// The refresh interval elapsed with no input; repaint time-driven state.
    Refresh,
    /// The poll timeout elapsed with no input.
    Idle,
    /// The controller is gone; the page should return.
    Quit,
}

/// How a page finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Quit,
    SwitchTo(String),
}

/// One screen of the application.
///
/// Pages are shared between connections, so per-connection state belongs
/// inside `run`.
pub trait Page: Send + Sync {
    fn name(&self) -> &str;

    fn run<'a>(&'a self, term: &'a mut RemoteTerminal) -> BoxFuture<'a, Outcome>;
}

/// Named pages plus the one every controller starts on.
#[derive(Clone)]
pub struct PageRegistry {
    home: Arc<dyn Page>,
    pages: HashMap<String, Arc<dyn Page>>,
}

impl PageRegistry {
    pub fn new(home: impl Page + 'static) -> Self {
        let home: Arc<dyn Page> = Arc::new(home);
        let mut pages = HashMap::new();
        pages.insert(home.name().to_string(), Arc::clone(&home));
        Self { home, pages }
    }

    /// Add a page. A page with the same name is replaced.
    #[must_use]
    pub fn with_page(mut self, page: impl Page + 'static) -> Self {
        self.pages.insert(page.name().to_string(), Arc::new(page));
        self
    }

    pub fn home(&self) -> Arc<dyn Page> {
        Arc::clone(&self.home)
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn Page>> {
        self.pages.get(name).cloned()
    }
}

/// Terminal adapter handed to a running page.
pub struct RemoteTerminal {
    output: Arc<OutputBuffer>,
    events: mpsc::Receiver<Event>,
    rows: u16,
    cols: u16,
    refresh_interval: Duration,
    last_refresh: Instant,
}

impl RemoteTerminal {
    pub fn new(
        output: Arc<OutputBuffer>,
        events: mpsc::Receiver<Event>,
        (rows, cols): (u16, u16),
        refresh_interval: Duration,
    ) -> Self {
        Self {
            output,
            events,
            rows,
            cols,
            refresh_interval,
            last_refresh: Instant::now(),
        }
    }

    /// Queue rendered ANSI text for the next flush.
    pub fn write(&mut self, text: &str) {
        self.output.write(text.as_bytes());
    }

    /// Wait up to `timeout` for input.
    ///
    /// Returns [`Event::Refresh`] instead of [`Event::Idle`] once per refresh
    /// interval, and [`Event::Quit`] after the controller's reader has ended.
    pub async fn poll(&mut self, timeout: Duration) -> Event {
        let event = match tokio::time::timeout(timeout, self.events.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => Event::Quit,
            Err(_) if self.last_refresh.elapsed() >= self.refresh_interval => {
                self.last_refresh = Instant::now();
                Event::Refresh
            }
            Err(_) => Event::Idle,
        };
        if let Event::Resize { rows, cols } = event {
            self.rows = rows;
            self.cols = cols;
        }
        event
    }

    /// `(rows, cols)` as last reported by the controller.
    pub fn size(&self) -> (u16, u16) {
        (self.rows, self.cols)
    }
}
