use colored::{ColoredString, Colorize};

use crate::config::Density;
use crate::models::Sender;
use crate::services::display::{MessageRow, SourcePanel};
use crate::services::markdown::{render_lines, Span};

fn indent(density: Density) -> &'static str {
    match density {
        Density::Compact => "",
        Density::Comfortable => "  ",
        Density::Spacious => "    ",
    }
}

fn style_span(span: &Span) -> ColoredString {
    let mut styled = span.text.normal();
    if span.style.heading {
        styled = styled.bold().underline();
    }
    if span.style.bold {
        styled = styled.bold();
    }
    if span.style.italic {
        styled = styled.italic();
    }
    if span.style.code {
        styled = styled.yellow();
    }
    if span.style.quote {
        styled = styled.dimmed();
    }
    styled
}

pub fn date_separator(label: &str) -> String {
    format!("──────── {} ────────", label).dimmed().to_string()
}

fn metadata(row: &MessageRow) -> String {
    let mut parts = vec![row.time.clone()];
    if row.rag_badge {
        parts.push("RAG".green().to_string());
    }
    if let Some(elapsed) = &row.processing_time {
        parts.push(elapsed.clone());
    }
    parts.join(" · ")
}

fn header(row: &MessageRow, with_metadata: bool) -> String {
    let id = format!("#{}", row.id).dimmed();
    let who = match row.sender {
        Sender::User => "You".bright_blue().bold(),
        Sender::Bot => "MediMate".green().bold(),
    };
    if with_metadata {
        format!("{} {} · {}", id, who, metadata(row))
    } else {
        format!("{} {}", id, who)
    }
}

fn body(row: &MessageRow, pad: &str) -> Vec<String> {
    match row.sender {
        Sender::User => row
            .text
            .lines()
            .map(|line| format!("{}{}", pad, line))
            .collect(),
        Sender::Bot => render_lines(&row.text)
            .iter()
            .map(|line| {
                let text: String = line.iter().map(|s| style_span(s).to_string()).collect();
                format!("{}{}", pad, text)
            })
            .collect(),
    }
}

/// Lines for a citation panel: the toggle header, then one entry per
/// citation when expanded.
pub fn source_lines(row: &MessageRow, panel: &SourcePanel, density: Density) -> Vec<String> {
    let pad = indent(density);
    let mut lines = vec![format!(
        "{}{} {}",
        pad,
        format!("✓ {}", panel.header()).cyan(),
        format!("(/sources {})", row.id).dimmed()
    )];

    for citation in &panel.citations {
        let name = match &citation.link {
            Some(_) => format!("{} ↗", citation.source).underline(),
            None => citation.source.normal(),
        };
        lines.push(format!(
            "{}  {} {}",
            pad,
            format!("[{}]", citation.rank).on_blue(),
            name
        ));
        lines.push(format!(
            "{}      category: {} · similarity: {}",
            pad, citation.category, citation.similarity
        ));
        if let Some(link) = &citation.link {
            lines.push(format!(
                "{}      {} {}",
                pad,
                link.dimmed(),
                format!("(/open {} {})", row.id, citation.rank).dimmed()
            ));
        }
    }
    lines
}

pub fn render_row(row: &MessageRow, density: Density) -> Vec<String> {
    let pad = indent(density);
    let mut lines = Vec::new();

    if density == Density::Spacious {
        lines.push(String::new());
    }
    if let Some(label) = &row.date_label {
        lines.push(date_separator(label));
    }

    lines.push(header(row, density != Density::Spacious));
    lines.extend(body(row, pad));

    if let Some(panel) = &row.sources {
        lines.extend(source_lines(row, panel, density));
    }
    if density == Density::Spacious {
        lines.push(format!("{}{}", pad, metadata(row).dimmed()));
    }
    if density != Density::Compact {
        lines.push(String::new());
    }
    lines
}
