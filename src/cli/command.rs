//! Line parsing for the interactive prompt.
//!
//! Anything not starting with `/` is a chat message, sent as typed
//! (surrounding whitespace included; the composer decides what is blank).

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Chat(String),
    Attach(Vec<PathBuf>),
    Detach(u64),
    Files,
    Models,
    Model(String),
    New,
    Threads,
    /// Open a thread by 1-based list position or by id.
    Open(String),
    Delete(String),
    History,
    Logout,
    Help,
    Quit,
    /// Not understood; the payload is the message to show.
    Invalid(String),
}

pub const HELP: &str = "\
Commands:
  /attach <path>...   attach files to the next message (quote paths with spaces)
  /detach <id>        remove a pending attachment
  /files              list pending attachments
  /models             list models
  /model <id>         switch model
  /new                start a new chat
  /threads            list saved chats
  /open <n|id>        open a saved chat
  /delete <n|id>      delete a saved chat
  /history            reprint the current chat
  /logout             forget the verified identity and exit
  /help               show this help
  /quit               exit
Anything else is sent as a message.";

pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim_start();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Command::Chat(line.trim_end_matches(['\r', '\n']).to_string());
    };

    let (name, remainder) = rest
        .trim_end()
        .split_once(char::is_whitespace)
        .unwrap_or((rest.trim_end(), ""));

    if matches!(name, "attach" | "a") {
        return match split_paths(remainder) {
            Ok(paths) if paths.is_empty() => {
                Command::Invalid("usage: /attach <path>...".to_string())
            }
            Ok(paths) => Command::Attach(paths),
            Err(message) => Command::Invalid(message),
        };
    }

    let args: Vec<&str> = remainder.split_whitespace().collect();
    match (name, args.as_slice()) {
        ("detach", [id]) => match id.trim_start_matches('#').parse::<u64>() {
            Ok(id) => Command::Detach(id),
            Err(_) => Command::Invalid(format!("not an attachment id: {id}")),
        },
        ("detach", _) => Command::Invalid("usage: /detach <id>".to_string()),
        ("files", []) => Command::Files,
        ("models", []) => Command::Models,
        ("model", [id]) => Command::Model(id.to_string()),
        ("model", _) => Command::Invalid("usage: /model <id>".to_string()),
        ("new", []) => Command::New,
        ("threads" | "ls", []) => Command::Threads,
        ("open", [target]) => Command::Open(target.to_string()),
        ("open", _) => Command::Invalid("usage: /open <n|id>".to_string()),
        ("delete" | "rm", [target]) => Command::Delete(target.to_string()),
        ("delete" | "rm", _) => Command::Invalid("usage: /delete <n|id>".to_string()),
        ("history", []) => Command::History,
        ("logout", []) => Command::Logout,
        ("help" | "?", []) => Command::Help,
        ("quit" | "exit" | "q", []) => Command::Quit,
        _ => Command::Invalid(format!("unknown command: /{rest}")),
    }
}

/// Splits `/attach` arguments on whitespace. Single or double quotes keep
/// spaces inside one path, as does a backslash before a space.
fn split_paths(input: &str) -> Result<Vec<PathBuf>, String> {
    let mut paths = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_word = true;
            }
            (None, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    paths.push(PathBuf::from(std::mem::take(&mut current)));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if let Some(q) = quote {
        return Err(format!("unterminated {q} in /attach"));
    }
    if in_word {
        paths.push(PathBuf::from(current));
    }
    Ok(paths)
}
