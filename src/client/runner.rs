use tokio::{
    sync::{mpsc, watch},
    time::{Instant, sleep_until},
};

use crate::protocol::{ChatMessage, ServerEvent};

use super::{Connectivity, EventSink, Link, LinkTracker, Renderer, Session};

/// What the user did at the keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Line(String),
    /// A keystroke in an unfinished line.
    Typing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    Join(String),
    Clear,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Command {
        let line = line.trim();
        match line.split_once(char::is_whitespace) {
            Some(("/join", room)) if !room.trim().is_empty() => Command::Join(room.trim().to_owned()),
            _ => match line {
                "/clear" => Command::Clear,
                "/quit" | "/exit" => Command::Quit,
                _ => Command::Say(line.to_owned()),
            },
        }
    }
}

/// Drives `session` until the user quits or the input closes.
pub async fn run<S: EventSink, R: Renderer>(
    session: &mut Session<S, R>,
    input: &mut mpsc::UnboundedReceiver<Input>,
    events: &mut mpsc::UnboundedReceiver<ServerEvent>,
    link: &mut watch::Receiver<Link>,
) {
    let mut tracker = LinkTracker::default();
    let mut connected = true;

    // the channel may have connected before the session existed
    let current = *link.borrow_and_update();
    apply(session, &mut tracker, current).await;

    loop {
        let deadline = session.typing_deadline();

        tokio::select! {
            // state changes first so a line typed right after a reconnect goes out live
            biased;

            changed = link.changed(), if connected => {
                if changed.is_err() {
                    connected = false;
                    session.set_connectivity(Connectivity::Offline).await;
                    continue;
                }
                let current = *link.borrow_and_update();
                apply(session, &mut tracker, current).await;
            }
            Some(event) = events.recv() => session.handle(event),
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                session.poll_typing(Instant::now());
            }
            next = input.recv() => {
                let Some(next) = next else {
                    break;
                };
                match next {
                    Input::Typing => session.notify_typing(Instant::now()),
                    Input::Line(line) => match Command::parse(&line) {
                        Command::Say(text) => session.send(&text).await,
                        Command::Join(room) => {
                            let Some(username) = session.identity().map(|i| i.username.clone()) else {
                                continue;
                            };
                            session.join(username, room);
                        }
                        Command::Clear => session.clear_chat(),
                        Command::Quit => break,
                    },
                }
            }
        }
    }
}

async fn apply<S: EventSink, R: Renderer>(session: &mut Session<S, R>, tracker: &mut LinkTracker, link: Link) {
    for state in tracker.signals(link) {
        session.set_connectivity(*state).await;
    }
}

/// Prints the conversation to stdout.
#[derive(Debug, Default)]
pub struct TerminalRenderer {
    typing: Option<String>,
}

impl Renderer for TerminalRenderer {
    fn render(&mut self, message: &ChatMessage, offline: bool) {
        let at = message.timestamp;
        let marker = if offline { " (offline)" } else { "" };
        println!(
            "[{:02}:{:02}] {}: {}{marker}",
            at.hour(),
            at.minute(),
            message.username,
            message.message
        );
    }

    fn notify(&mut self, _message: &ChatMessage) {
        print!("\x07");
    }

    fn clear(&mut self) {
        print!("\x1b[2J\x1b[H");
    }

    fn typing(&mut self, username: Option<&str>) {
        if self.typing.as_deref() == username {
            return;
        }
        self.typing = username.map(str::to_owned);
        if let Some(username) = username {
            println!("{username} is typing...");
        }
    }
}
