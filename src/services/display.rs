//! Read-only projection of a `ChatSession` into what a view shows.
//!
//! Nothing here writes back to the session; rows are rebuilt on every render.

use std::fmt::Display;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};

use crate::config::AppConfig;
use crate::models::{Citation, Message, MessageId, Sender};
use crate::services::chat::ChatSession;

/// Model name the backend reports when no retrieval took place.
const FALLBACK_MODEL: &str = "fallback";

#[derive(Debug, Clone)]
pub struct DisplayFormat {
    pub date_format: String,
    pub time_format: String,
}

impl DisplayFormat {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            date_format: config.date_format.clone(),
            time_format: config.time_format.clone(),
        }
    }
}

impl Default for DisplayFormat {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CitationRow {
    pub rank: u32,
    pub source: String,
    pub category: String,
    pub similarity: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourcePanel {
    pub count: usize,
    pub expanded: bool,
    /// Empty while collapsed.
    pub citations: Vec<CitationRow>,
}

impl SourcePanel {
    pub fn header(&self) -> String {
        let noun = if self.count == 1 { "source" } else { "sources" };
        let marker = if self.expanded { "▼" } else { "▶" };
        format!("{} {} {}", self.count, noun, marker)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageRow {
    pub id: MessageId,
    pub sender: Sender,
    pub text: String,
    pub date_label: Option<String>,
    pub time: String,
    pub rag_badge: bool,
    pub processing_time: Option<String>,
    pub sources: Option<SourcePanel>,
    pub reusable: bool,
}

pub fn similarity_percent(similarity: f64) -> String {
    format!("{:.1}%", similarity * 100.0)
}

pub fn format_processing_time(duration: Duration) -> String {
    format!("{:.2}s", duration.as_secs_f64())
}

pub fn shows_rag_badge(model_used: Option<&str>) -> bool {
    matches!(model_used, Some(model) if !model.is_empty() && model != FALLBACK_MODEL)
}

/// "Today", "Yesterday", or the formatted calendar date.
pub fn date_label<Tz>(timestamp: &DateTime<Utc>, tz: &Tz, today: NaiveDate, date_format: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let local = timestamp.with_timezone(tz);
    let date = local.date_naive();
    if date == today {
        "Today".to_string()
    } else if today.pred_opt() == Some(date) {
        "Yesterday".to_string()
    } else {
        local.format(date_format).to_string()
    }
}

/// A label goes above the first message and wherever the calendar date changes.
pub fn starts_new_day<Tz: TimeZone>(current: &Message, previous: Option<&Message>, tz: &Tz) -> bool {
    match previous {
        None => true,
        Some(prev) => {
            current.timestamp.with_timezone(tz).date_naive()
                != prev.timestamp.with_timezone(tz).date_naive()
        }
    }
}

pub fn format_time<Tz>(timestamp: &DateTime<Utc>, tz: &Tz, time_format: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    timestamp.with_timezone(tz).format(time_format).to_string()
}

fn citation_row(citation: &Citation) -> CitationRow {
    CitationRow {
        rank: citation.rank,
        source: citation.source.clone(),
        category: citation.category.clone(),
        similarity: similarity_percent(citation.clamped_similarity()),
        link: citation.link().map(str::to_string),
    }
}

pub struct Projector<'a, Tz: TimeZone> {
    format: &'a DisplayFormat,
    tz: Tz,
    today: NaiveDate,
}

impl<'a> Projector<'a, Local> {
    pub fn local(format: &'a DisplayFormat) -> Self {
        Self::new(format, Local, Local::now().date_naive())
    }
}

impl<'a, Tz> Projector<'a, Tz>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    pub fn new(format: &'a DisplayFormat, tz: Tz, today: NaiveDate) -> Self {
        Self { format, tz, today }
    }

    pub fn rows(&self, session: &ChatSession) -> Vec<MessageRow> {
        let messages = session.conversation().all();
        (0..messages.len())
            .map(|idx| self.project(session, messages, idx))
            .collect()
    }

    pub fn row(&self, session: &ChatSession, id: MessageId) -> Option<MessageRow> {
        let messages = session.conversation().all();
        let idx = session.conversation().position(id)?;
        Some(self.project(session, messages, idx))
    }

    fn project(&self, session: &ChatSession, messages: &[Message], idx: usize) -> MessageRow {
        let message = &messages[idx];
        let previous = idx.checked_sub(1).map(|p| &messages[p]);

        let date_label = starts_new_day(message, previous, &self.tz).then(|| {
            date_label(&message.timestamp, &self.tz, self.today, &self.format.date_format)
        });

        let sources = (message.sender == Sender::Bot && message.has_sources()).then(|| {
            let expanded = session.sources_visible(message.id);
            SourcePanel {
                count: message.sources.len(),
                expanded,
                citations: if expanded {
                    message.sources.iter().map(citation_row).collect()
                } else {
                    Vec::new()
                },
            }
        });

        MessageRow {
            id: message.id,
            sender: message.sender,
            text: message.text.clone(),
            date_label,
            time: format_time(&message.timestamp, &self.tz, &self.format.time_format),
            rag_badge: shows_rag_badge(message.model_used.as_deref()),
            processing_time: message.processing_time.map(format_processing_time),
            sources,
            reusable: message.is_user(),
        }
    }
}
