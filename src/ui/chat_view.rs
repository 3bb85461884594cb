use std::io::Write;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use colored::Colorize;

use super::message_widget::{render_row, source_lines};
use super::{ChatView, Notice};
use crate::config::Density;
use crate::providers::DrugCatalog;
use crate::services::chat::ProgressStage;
use crate::services::display::MessageRow;

pub const HELP: &[(&str, &str)] = &[
    ("<question>", "Ask the assistant"),
    ("/sources <n>", "Show or hide the citations of message n"),
    ("/open <n> <rank>", "Open a citation link in the browser"),
    ("/reuse <n>", "Put the text of question n back into the input"),
    ("/copy <n>", "Copy the text of message n to the clipboard"),
    ("/drugs", "List the drugs the assistant knows about"),
    ("/drug <name>", "Show stored information about one drug"),
    ("/help", "Show this help"),
    ("/quit", "Leave the chat"),
];

/// OSC 52 "set clipboard" escape. The terminal emulator does the copying.
pub fn clipboard_sequence(text: &str) -> String {
    format!("\x1b]52;c;{}\x07", STANDARD.encode(text))
}

/// Line-oriented view that appends to a terminal (or any writer).
pub struct TerminalView<W: Write> {
    out: W,
    density: Density,
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W, density: Density) -> Self {
        Self { out, density }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_lines(&mut self, lines: &[String]) {
        for line in lines {
            if let Err(e) = writeln!(self.out, "{}", line) {
                tracing::error!("Failed to write to terminal: {}", e);
                return;
            }
        }
        let _ = self.out.flush();
    }
}

impl<W: Write> ChatView for TerminalView<W> {
    fn show_message(&mut self, row: &MessageRow) {
        let lines = render_row(row, self.density);
        self.write_lines(&lines);
    }

    fn show_sources(&mut self, row: &MessageRow) {
        // Output already printed stays put, so re-emit just the panel.
        match &row.sources {
            Some(panel) => {
                let lines = source_lines(row, panel, self.density);
                self.write_lines(&lines);
            }
            None => self.show_notice(&Notice::Info(format!(
                "Message #{} has no sources.",
                row.id
            ))),
        }
    }

    fn show_progress(&mut self, stage: ProgressStage) {
        let icon = match stage {
            ProgressStage::Retrieving => "🔍",
            ProgressStage::Composing => "🧠",
        };
        let line = format!("{} {}", icon, stage.label()).dimmed().to_string();
        self.write_lines(&[line]);
    }

    fn show_notice(&mut self, notice: &Notice) {
        let line = match notice {
            Notice::Info(text) => text.cyan().to_string(),
            Notice::Error(text) => text.red().to_string(),
        };
        self.write_lines(&[line]);
    }

    fn copy_text(&mut self, text: &str) {
        if let Err(e) = write!(self.out, "{}", clipboard_sequence(text)) {
            tracing::error!("Failed to write to terminal: {}", e);
            return;
        }
        let _ = self.out.flush();
    }

    fn show_drugs(&mut self, catalog: &DrugCatalog) {
        let mut lines = Vec::new();
        if catalog.drugs.is_empty() {
            let message = catalog
                .message
                .clone()
                .unwrap_or_else(|| "No drugs are registered.".to_string());
            lines.push(message.cyan().to_string());
        } else {
            let total = catalog.total_count.unwrap_or(catalog.drugs.len() as u64);
            let mut heading = format!("{} drugs", total);
            if let Some(docs) = catalog.total_documents {
                heading.push_str(&format!(" from {} documents", docs));
            }
            lines.push(heading.bold().to_string());
            lines.extend(catalog.drugs.iter().map(|d| format!("  • {}", d)));
        }
        self.write_lines(&lines);
    }

    fn show_drug_info(&mut self, name: &str, info: &serde_json::Value) {
        let body = serde_json::to_string_pretty(info).unwrap_or_else(|_| info.to_string());
        let mut lines = vec![name.bold().to_string()];
        lines.extend(body.lines().map(|l| format!("  {}", l)));
        self.write_lines(&lines);
    }

    fn show_help(&mut self) {
        let lines: Vec<String> = HELP
            .iter()
            .map(|(cmd, what)| format!("  {:<18} {}", cmd, what))
            .collect();
        self.write_lines(&lines);
    }
}
