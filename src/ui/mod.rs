pub mod chat_view;
pub mod input_area;
pub mod message_widget;

pub use chat_view::TerminalView;

use crate::providers::DrugCatalog;
use crate::services::chat::ProgressStage;
use crate::services::display::MessageRow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

/// Presentation layer driven by the app loop. Implementations only read
/// projected rows; they never see the session itself.
pub trait ChatView {
    /// A message was appended; bring it into view.
    fn show_message(&mut self, row: &MessageRow);

    /// A message's citation panel was toggled.
    fn show_sources(&mut self, row: &MessageRow);

    fn show_progress(&mut self, stage: ProgressStage);

    fn show_notice(&mut self, notice: &Notice);

    /// Put text on the user's clipboard.
    fn copy_text(&mut self, text: &str);

    fn show_drugs(&mut self, catalog: &DrugCatalog);

    fn show_drug_info(&mut self, name: &str, info: &serde_json::Value);

    fn show_help(&mut self);
}
