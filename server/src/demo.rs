//! Two sample pages served by the `termgate` binary.
//!
//! `home` shows the terminal size, the last key and mouse click, and a tick
//! counter driven by `Refresh`. `a` opens `about`, `q` quits. `about` goes
//! back with `b` or Esc.

use std::fmt::Write as _;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::engine::{Event, Outcome, Page, PageRegistry, RemoteTerminal, BACK};

const POLL_TIMEOUT: Duration = Duration::from_millis(250);

const CLEAR: &str = "\x1b[2J\x1b[H";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// `home` plus `about`, starting on `home`.
pub fn pages() -> PageRegistry {
    PageRegistry::new(Home).with_page(About)
}

/// Move the cursor to 1-based `row`, `col`.
fn goto(out: &mut String, row: u16, col: u16) {
    let _ = write!(out, "\x1b[{row};{col}H");
}

pub struct Home;

#[derive(Default)]
struct HomeView {
    last_key: Option<String>,
    last_click: Option<(u16, u16)>,
    ticks: u64,
}

impl HomeView {
    fn render(&self, (rows, cols): (u16, u16)) -> String {
        let mut out = String::from(CLEAR);
        let _ = write!(out, "{BOLD}termgate{RESET} demo");
        goto(&mut out, 3, 1);
        let _ = write!(out, "size   {rows}x{cols}");
        goto(&mut out, 4, 1);
        let _ = write!(out, "key    {}", self.last_key.as_deref().unwrap_or("-"));
        goto(&mut out, 5, 1);
        match self.last_click {
            Some((row, col)) => {
                let _ = write!(out, "click  {row},{col}");
            }
            None => out.push_str("click  -"),
        }
        goto(&mut out, 6, 1);
        let _ = write!(out, "ticks  {}", self.ticks);
        goto(&mut out, rows.max(8), 1);
        let _ = write!(out, "{DIM}[a] about  [q] quit{RESET}");
        out
    }
}

impl Page for Home {
    fn name(&self) -> &str {
        "home"
    }

    fn run<'a>(&'a self, term: &'a mut RemoteTerminal) -> BoxFuture<'a, Outcome> {
        async move {
            let mut view = HomeView::default();
            term.write(&view.render(term.size()));
            loop {
                match term.poll(POLL_TIMEOUT).await {
                    Event::Quit => return Outcome::Quit,
                    Event::Idle => continue,
                    Event::Key(key) if key == "q" => return Outcome::Quit,
                    Event::Key(key) if key == "a" => return Outcome::SwitchTo("about".into()),
                    Event::Key(key) => view.last_key = Some(key),
                    Event::Mouse { row, col } => view.last_click = Some((row, col)),
                    Event::Refresh => view.ticks += 1,
                    Event::Resize { .. } => {}
                }
                term.write(&view.render(term.size()));
            }
        }
        .boxed()
    }
}

pub struct About;

impl About {
    fn render((rows, cols): (u16, u16)) -> String {
        let mut out = String::from(CLEAR);
        let _ = write!(out, "{BOLD}about{RESET}");
        goto(&mut out, 3, 1);
        out.push_str("A server-side terminal app mirrored to every viewer.");
        goto(&mut out, 4, 1);
        let _ = write!(out, "Rendering for {cols} columns.");
        goto(&mut out, rows.max(6), 1);
        let _ = write!(out, "{DIM}[b] back  [q] quit{RESET}");
        out
    }
}

impl Page for About {
    fn name(&self) -> &str {
        "about"
    }

    fn run<'a>(&'a self, term: &'a mut RemoteTerminal) -> BoxFuture<'a, Outcome> {
        async move {
            term.write(&Self::render(term.size()));
            loop {
                match term.poll(POLL_TIMEOUT).await {
                    Event::Quit => return Outcome::Quit,
                    Event::Key(key) => match key.as_str() {
                        "q" => return Outcome::Quit,
                        "b" | "\x1b" => return Outcome::SwitchTo(BACK.into()),
                        _ => {}
                    },
                    Event::Resize { .. } => term.write(&Self::render(term.size())),
                    Event::Mouse { .. } | Event::Refresh | Event::Idle => {}
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use super::*;
    use crate::sessions::buffer::OutputBuffer;

    fn terminal() -> (RemoteTerminal, mpsc::Sender<Event>, Arc<OutputBuffer>) {
        let output = Arc::new(OutputBuffer::new());
        let (tx, rx) = mpsc::channel(16);
        let term = RemoteTerminal::new(Arc::clone(&output), rx, (24, 80), Duration::from_secs(60));
        (term, tx, output)
    }

    fn drain(output: &OutputBuffer) -> String {
        String::from_utf8(output.take().unwrap_or_default()).unwrap()
    }

    #[test]
    fn registry_starts_on_home() {
        let pages = pages();
        assert_eq!(pages.home().name(), "home");
        assert!(pages.find("about").is_some());
    }

    #[tokio::test]
    async fn home_tracks_input_and_switches() {
        let (mut term, tx, output) = terminal();
        tx.send(Event::Key("x".into())).await.unwrap();
        tx.send(Event::Mouse { row: 3, col: 7 }).await.unwrap();
        tx.send(Event::Resize { rows: 30, cols: 100 }).await.unwrap();
        tx.send(Event::Key("a".into())).await.unwrap();

        let outcome = Home.run(&mut term).await;
        assert_eq!(outcome, Outcome::SwitchTo("about".into()));

        let drawn = drain(&output);
        assert!(drawn.contains("size   24x80"));
        assert!(drawn.contains("key    x"));
        assert!(drawn.contains("click  3,7"));
        assert!(drawn.contains("size   30x100"));
    }

    #[tokio::test]
    async fn home_quits_on_q_or_disconnect() {
        let (mut term, tx, _output) = terminal();
        tx.send(Event::Key("q".into())).await.unwrap();
        assert_eq!(Home.run(&mut term).await, Outcome::Quit);

        drop(tx);
        assert_eq!(Home.run(&mut term).await, Outcome::Quit);
    }

    #[tokio::test]
    async fn about_goes_back() {
        let (mut term, tx, output) = terminal();
        tx.send(Event::Key("b".into())).await.unwrap();
        assert_eq!(About.run(&mut term).await, Outcome::SwitchTo(BACK.into()));
        assert!(drain(&output).contains("Rendering for 80 columns."));
    }
}
