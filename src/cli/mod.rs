//! # CLI Adapter
//!
//! Reads lines from stdin, turns them into core `Action`s, runs the
//! returned `Effect`s, and prints whatever changed.
//!
//! Background work (file reads, completions) runs in spawned tasks that
//! report back through one action channel, so the reducer only ever runs
//! on this loop. Reads may finish in any order.
//!
//! This is the only module that writes to stdout; logging goes to a file.

pub mod command;
pub mod render;

use std::io::Write;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};

use crate::cli::command::{Command, HELP, parse_command};
use crate::core::action::{Action, Effect, update};
use crate::core::attachment::{AttachmentId, read_attachment};
use crate::core::auth::AuthGate;
use crate::core::config::ResolvedConfig;
use crate::core::dispatch::Dispatcher;
use crate::core::state::App;
use crate::core::thread_store::ThreadStore;
use crate::inference::{CompletionProvider, OpenRouterProvider};

/// Build the OpenRouter provider from a resolved config.
pub fn build_provider(config: &ResolvedConfig, api_key: &str) -> Arc<dyn CompletionProvider> {
    Arc::new(
        OpenRouterProvider::new(api_key.to_string(), Some(config.base_url.clone()))
            .with_attribution(config.referer.clone(), config.app_title.clone()),
    )
}

/// What the terminal has already shown.
struct Console {
    shown: usize,
    generation: u64,
    status: String,
}

impl Console {
    fn new(app: &App) -> Self {
        Self {
            shown: 0,
            generation: app.generation,
            status: String::new(),
        }
    }

    /// Prints new messages and a changed status line.
    fn flush(&mut self, app: &App) {
        if app.generation != self.generation {
            self.generation = app.generation;
            self.shown = 0;
        }
        for message in app.messages.iter().skip(self.shown) {
            println!("{}", render::render_message(message));
        }
        self.shown = app.messages.len();

        if app.status_message != self.status {
            self.status = app.status_message.clone();
            println!("-- {}", self.status);
        }
    }

    fn reprint(&mut self, app: &App) {
        println!("{}", render::render_history(&app.messages));
        self.shown = app.messages.len();
    }
}

fn prompt(app: &App) {
    let marker = if app.is_loading() { "…" } else { ">" };
    print!("[{}] {} ", app.selected_model().id, marker);
    let _ = std::io::stdout().flush();
}

/// Resolves `/open` and `/delete` targets: a 1-based list position or an id.
pub fn resolve_thread_ref(threads: &ThreadStore, target: &str) -> Option<String> {
    if let Ok(n) = target.parse::<usize>() {
        return n
            .checked_sub(1)
            .and_then(|i| threads.all().get(i))
            .map(|t| t.id.clone());
    }
    threads.contains(target).then(|| target.to_string())
}

/// Turns a command into an action, or handles it locally.
fn to_action(app: &mut App, console: &mut Console, command: Command) -> Option<Action> {
    match command {
        Command::Chat(text) => Some(Action::Submit(text)),
        Command::Attach(paths) => Some(Action::Attach(paths)),
        Command::Detach(id) => Some(Action::RemoveAttachment(AttachmentId::from(id))),
        Command::Model(id) => Some(Action::SelectModel(id)),
        Command::New => Some(Action::NewChat),
        Command::Open(target) => match resolve_thread_ref(&app.threads, &target) {
            Some(id) => Some(Action::SelectThread(id)),
            None => {
                app.status_message = format!("No chat '{target}'");
                None
            }
        },
        Command::Delete(target) => match resolve_thread_ref(&app.threads, &target) {
            Some(id) => Some(Action::DeleteThread(id)),
            None => {
                app.status_message = format!("No chat '{target}'");
                None
            }
        },
        Command::Logout => Some(Action::Logout),
        Command::Quit => Some(Action::Quit),
        Command::Files => {
            println!("{}", render::render_attachments(&app.attachments));
            None
        }
        Command::Models => {
            println!("{}", render::render_models(&app.models, app.selected_model));
            None
        }
        Command::Threads => {
            println!("{}", render::render_threads(app.threads.all(), &app.session));
            None
        }
        Command::History => {
            console.reprint(app);
            None
        }
        Command::Help => {
            println!("{HELP}");
            None
        }
        Command::Invalid(message) => {
            app.status_message = message;
            None
        }
    }
}

/// Starts the I/O an effect asks for. Returns false when the loop should end.
fn run_effect(
    effect: Effect,
    dispatcher: &Arc<Dispatcher>,
    gate: &dyn AuthGate,
    tx: &UnboundedSender<Action>,
) -> bool {
    match effect {
        Effect::None => true,
        Effect::Dispatch(job) => {
            let dispatcher = Arc::clone(dispatcher);
            let tx = tx.clone();
            tokio::spawn(async move {
                let action = job.run(&dispatcher).await;
                if tx.send(action).is_err() {
                    warn!("Failed to deliver completion: receiver dropped");
                }
            });
            true
        }
        Effect::ReadAttachments { jobs, max_bytes } => {
            for (id, path) in jobs {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let result = read_attachment(&path, max_bytes).await;
                    if tx.send(Action::AttachmentRead { id, result }).is_err() {
                        warn!("Failed to deliver attachment {}: receiver dropped", id);
                    }
                });
            }
            true
        }
        Effect::Logout => {
            match gate.logout() {
                Ok(()) => println!("Logged out."),
                Err(e) => println!("Logout failed: {e}"),
            }
            false
        }
        Effect::Quit => false,
    }
}

pub async fn run(mut app: App, gate: Arc<dyn AuthGate>) -> std::io::Result<()> {
    let (tx, mut rx) = unbounded_channel::<Action>();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut console = Console::new(&app);

    println!("{}", app.status_message);
    println!("Type /help for commands.");
    console.status = app.status_message.clone();
    prompt(&app);

    loop {
        let action = tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    let command = parse_command(&line);
                    debug!("Command: {:?}", command);
                    match to_action(&mut app, &mut console, command) {
                        Some(action) => action,
                        None => {
                            console.flush(&app);
                            prompt(&app);
                            continue;
                        }
                    }
                }
                None => {
                    info!("stdin closed");
                    break;
                }
            },
            Some(action) = rx.recv() => action,
        };

        let effect = update(&mut app, action);
        let dispatcher = Arc::clone(&app.dispatcher);
        let keep_going = run_effect(effect, &dispatcher, gate.as_ref(), &tx);
        console.flush(&app);
        if !keep_going {
            break;
        }
        prompt(&app);
    }

    info!("Susu shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::MemoryStorage;
    use crate::inference::Message;

    #[test]
    fn test_resolve_thread_ref_by_position_and_id() {
        let mut threads = ThreadStore::load(Arc::new(MemoryStorage::new()));
        let older = threads
            .create(Message::user_text("a"), Message::assistant("b"), "a")
            .id
            .clone();
        let newer = threads
            .create(Message::user_text("c"), Message::assistant("d"), "c")
            .id
            .clone();

        assert_eq!(resolve_thread_ref(&threads, "1"), Some(newer));
        assert_eq!(resolve_thread_ref(&threads, "2"), Some(older.clone()));
        assert_eq!(resolve_thread_ref(&threads, &older), Some(older));
        assert_eq!(resolve_thread_ref(&threads, "0"), None);
        assert_eq!(resolve_thread_ref(&threads, "3"), None);
        assert_eq!(resolve_thread_ref(&threads, "nope"), None);
    }
}
