use std::sync::mpsc as std_mpsc;
use std::thread;

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::{Config, DefaultEditor};
use tokio::sync::mpsc;

use crate::models::MessageId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    ToggleSources(MessageId),
    OpenCitation { message: MessageId, rank: u32 },
    Reuse(MessageId),
    Copy(MessageId),
    Drugs,
    Drug(String),
    Help,
    Quit,
}

#[derive(Debug)]
pub enum InputEvent {
    Line(String),
    Closed,
}

fn parse_id(arg: Option<&str>, usage: &str) -> Result<MessageId, String> {
    arg.and_then(|a| a.trim_start_matches('#').parse().ok())
        .ok_or_else(|| format!("Usage: {}", usage))
}

/// Interpret one line of input. Anything not starting with `/` is a question.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Ok(Command::Ask(line.to_string()));
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or("");
    match name {
        "sources" | "s" => Ok(Command::ToggleSources(parse_id(parts.next(), "/sources <n>")?)),
        "open" | "o" => {
            let usage = "/open <n> <rank>";
            let message = parse_id(parts.next(), usage)?;
            let rank = parts
                .next()
                .and_then(|r| r.parse().ok())
                .ok_or_else(|| format!("Usage: {}", usage))?;
            Ok(Command::OpenCitation { message, rank })
        }
        "reuse" | "r" => Ok(Command::Reuse(parse_id(parts.next(), "/reuse <n>")?)),
        "copy" | "c" => Ok(Command::Copy(parse_id(parts.next(), "/copy <n>")?)),
        "drugs" => Ok(Command::Drugs),
        "drug" => {
            let drug = rest.trim_start()["drug".len()..].trim();
            if drug.is_empty() {
                Err("Usage: /drug <name>".to_string())
            } else {
                Ok(Command::Drug(drug.to_string()))
            }
        }
        "help" | "h" | "?" => Ok(Command::Help),
        "quit" | "q" | "exit" => Ok(Command::Quit),
        other => Err(format!("Unknown command: /{} (try /help)", other)),
    }
}

fn editor_config(history_limit: usize) -> rustyline::Result<Config> {
    Ok(Config::builder()
        .max_history_size(history_limit)?
        .auto_add_history(false)
        .build())
}

/// Handle to the blocking line editor thread.
pub struct InputArea {
    prompt_tx: std_mpsc::Sender<String>,
}

impl InputArea {
    /// Start the editor thread. Each `prompt` call asks for one line,
    /// pre-filled with the given text; lines come back on the returned
    /// channel.
    pub fn spawn(history_limit: usize) -> anyhow::Result<(Self, mpsc::Receiver<InputEvent>)> {
        let (prompt_tx, prompt_rx) = std_mpsc::channel::<String>();
        let (line_tx, line_rx) = mpsc::channel(8);

        thread::Builder::new()
            .name("input".to_string())
            .spawn(move || {
                let editor = editor_config(history_limit).and_then(DefaultEditor::with_config);
                let mut editor = match editor {
                    Ok(editor) => editor,
                    Err(e) => {
                        tracing::error!("Failed to open line editor: {}", e);
                        let _ = line_tx.blocking_send(InputEvent::Closed);
                        return;
                    }
                };

                let prompt = format!("{} ", "›".bright_blue().bold());
                while let Ok(initial) = prompt_rx.recv() {
                    let event = match editor.readline_with_initial(&prompt, (&initial, "")) {
                        Ok(line) => {
                            if !line.trim().is_empty() {
                                let _ = editor.add_history_entry(line.as_str());
                            }
                            InputEvent::Line(line)
                        }
                        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                            InputEvent::Closed
                        }
                        Err(e) => {
                            tracing::error!("Failed to read input: {}", e);
                            InputEvent::Closed
                        }
                    };
                    let closed = matches!(event, InputEvent::Closed);
                    if line_tx.blocking_send(event).is_err() || closed {
                        break;
                    }
                }
            })?;

        Ok((Self { prompt_tx }, line_rx))
    }

    pub fn prompt(&self, initial: &str) -> bool {
        self.prompt_tx.send(initial.to_string()).is_ok()
    }
}
