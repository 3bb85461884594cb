use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::models::MessageId;
use crate::providers::{ChatService, DrugCatalog, ProviderError};
use crate::services::chat::{self, ChatSession, ExchangeEvent};
use crate::services::display::{DisplayFormat, Projector};
use crate::services::links;
use crate::ui::input_area::{parse_command, Command, InputArea, InputEvent};
use crate::ui::{ChatView, Notice};

/// Results of auxiliary requests, delivered back to the loop.
#[derive(Debug)]
pub enum AppCmd {
    DrugsLoaded(Result<DrugCatalog, ProviderError>),
    DrugInfoLoaded {
        name: String,
        result: Result<serde_json::Value, ProviderError>,
    },
}

/// Owns the session and is the only place it is mutated.
pub struct App<V: ChatView> {
    session: ChatSession,
    service: Arc<dyn ChatService>,
    view: V,
    format: DisplayFormat,
    stage_delay: Duration,
    rendered_through: MessageId,
    exchange_tx: mpsc::Sender<ExchangeEvent>,
    exchange_rx: mpsc::Receiver<ExchangeEvent>,
    cmd_tx: mpsc::Sender<AppCmd>,
    cmd_rx: mpsc::Receiver<AppCmd>,
}

impl<V: ChatView> App<V> {
    pub fn new(config: &AppConfig, service: Arc<dyn ChatService>, view: V) -> Self {
        let (exchange_tx, exchange_rx) = mpsc::channel(16);
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        Self {
            session: ChatSession::default(),
            service,
            view,
            format: DisplayFormat::from_config(config),
            stage_delay: config.stage_delay(),
            rendered_through: 0,
            exchange_tx,
            exchange_rx,
            cmd_tx,
            cmd_rx,
        }
    }

    #[cfg(test)]
    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    #[cfg(test)]
    pub fn view(&self) -> &V {
        &self.view
    }

    /// Render every message appended since the last render.
    fn scroll_to_newest(&mut self) {
        let Some(newest) = self.session.take_scroll_anchor() else {
            return;
        };
        let projector = Projector::local(&self.format);
        let fresh: Vec<MessageId> = self
            .session
            .conversation()
            .all()
            .iter()
            .map(|m| m.id)
            .filter(|&id| id > self.rendered_through && id <= newest)
            .collect();
        for id in fresh {
            if let Some(row) = projector.row(&self.session, id) {
                self.view.show_message(&row);
            }
        }
        self.rendered_through = newest;
    }

    pub fn show_transcript(&mut self) {
        self.session.take_scroll_anchor();
        let projector = Projector::local(&self.format);
        for row in projector.rows(&self.session) {
            self.rendered_through = row.id;
            self.view.show_message(&row);
        }
    }

    /// Handle one line of input. Returns `false` when the user quits.
    pub fn handle_line(&mut self, line: &str) -> bool {
        let command = match parse_command(line) {
            Ok(command) => command,
            Err(usage) => {
                self.view.show_notice(&Notice::Error(usage));
                return true;
            }
        };

        match command {
            Command::Ask(text) => self.ask(&text),
            Command::ToggleSources(id) => self.toggle_sources(id),
            Command::OpenCitation { message, rank } => self.open_citation(message, rank),
            Command::Reuse(id) => {
                if !self.session.reuse_text(id) {
                    self.view.show_notice(&Notice::Error(format!(
                        "#{} is not one of your questions.",
                        id
                    )));
                }
            }
            Command::Copy(id) => self.copy_message(id),
            Command::Drugs => self.load_drugs(),
            Command::Drug(name) => self.load_drug_info(name),
            Command::Help => self.view.show_help(),
            Command::Quit => return false,
        }
        true
    }

    fn ask(&mut self, text: &str) {
        // Keep the text around in case the submission is rejected.
        self.session.set_input(text.trim());
        let was_busy = self.session.is_busy();

        let Some(submission) = self.session.begin_submit(text, Utc::now()) else {
            if was_busy && !text.trim().is_empty() {
                self.view.show_notice(&Notice::Info(
                    "Still waiting for the previous answer.".to_string(),
                ));
            }
            return;
        };

        self.scroll_to_newest();
        if let Some(pending) = self.session.pending() {
            self.view.show_progress(pending.stage);
        }

        let service = self.service.clone();
        let tx = self.exchange_tx.clone();
        let stage_delay = self.stage_delay;
        tokio::spawn(async move {
            chat::run_exchange(service.as_ref(), submission, stage_delay, &tx).await;
        });
    }

    fn toggle_sources(&mut self, id: MessageId) {
        let has_sources = self
            .session
            .conversation()
            .get(id)
            .map(|m| m.has_sources())
            .unwrap_or(false);
        if !has_sources {
            self.view.show_notice(&Notice::Error(format!(
                "#{} has no sources to show.",
                id
            )));
            return;
        }

        self.session.toggle_sources(id);
        let projector = Projector::local(&self.format);
        if let Some(row) = projector.row(&self.session, id) {
            self.view.show_sources(&row);
        }
    }

    fn open_citation(&mut self, id: MessageId, rank: u32) {
        let link = self
            .session
            .conversation()
            .get(id)
            .and_then(|m| m.sources.iter().find(|c| c.rank == rank))
            .map(|c| c.link().map(str::to_string));

        let notice = match link {
            None => Notice::Error(format!("#{} has no source ranked {}.", id, rank)),
            // Citations without a link are inert.
            Some(None) => Notice::Info(format!("Source {} of #{} has no link.", rank, id)),
            Some(Some(url)) => match links::open_link(&url) {
                Ok(()) => Notice::Info(format!("Opened {}", url)),
                Err(e) => Notice::Error(format!("{:#}", e)),
            },
        };
        self.view.show_notice(&notice);
    }

    fn copy_message(&mut self, id: MessageId) {
        let text = self
            .session
            .conversation()
            .get(id)
            .map(|m| m.text.clone());
        match text {
            Some(text) => {
                self.view.copy_text(&text);
                self.view
                    .show_notice(&Notice::Info(format!("Copied #{} to the clipboard.", id)));
            }
            None => self
                .view
                .show_notice(&Notice::Error(format!("There is no message #{}.", id))),
        }
    }

    fn load_drugs(&mut self) {
        let service = self.service.clone();
        let tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            let result = service.list_drugs().await;
            let _ = tx.send(AppCmd::DrugsLoaded(result)).await;
        });
    }

    fn load_drug_info(&mut self, name: String) {
        let service = self.service.clone();
        let tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            let result = service.drug_info(&name).await;
            let _ = tx.send(AppCmd::DrugInfoLoaded { name, result }).await;
        });
    }

    pub fn apply_exchange_event(&mut self, event: ExchangeEvent) {
        let stage_event = matches!(event, ExchangeEvent::StageAdvanced(_));
        self.session.apply(event, Utc::now());
        if stage_event {
            if let Some(pending) = self.session.pending() {
                self.view.show_progress(pending.stage);
            }
        }
        self.scroll_to_newest();
    }

    pub fn update_cmd(&mut self, cmd: AppCmd) {
        match cmd {
            AppCmd::DrugsLoaded(Ok(catalog)) => self.view.show_drugs(&catalog),
            AppCmd::DrugsLoaded(Err(e)) => {
                tracing::warn!("Failed to load drug list: {}", e);
                self.view
                    .show_notice(&Notice::Error(format!("Could not load the drug list: {}", e)));
            }
            AppCmd::DrugInfoLoaded {
                name,
                result: Ok(info),
            } => self.view.show_drug_info(&name, &info),
            AppCmd::DrugInfoLoaded {
                name,
                result: Err(e),
            } => {
                tracing::warn!(drug = %name, "Failed to load drug info: {}", e);
                self.view.show_notice(&Notice::Error(format!(
                    "Could not load information for {}: {}",
                    name, e
                )));
            }
        }
    }

    /// Wait for the next exchange or auxiliary event and apply it.
    #[cfg(test)]
    pub async fn next_event(&mut self) {
        tokio::select! {
            Some(event) = self.exchange_rx.recv() => self.apply_exchange_event(event),
            Some(cmd) = self.cmd_rx.recv() => self.update_cmd(cmd),
        }
    }

    /// Interactive loop: input lines and backend events interleave here.
    pub async fn run(mut self, history_limit: usize) -> anyhow::Result<()> {
        let (input, mut lines) = InputArea::spawn(history_limit)?;

        self.show_transcript();
        self.view.show_notice(&Notice::Info(
            "Type a question, or /help for commands. In an emergency call your local emergency number."
                .to_string(),
        ));
        input.prompt(self.session.input());

        loop {
            tokio::select! {
                line = lines.recv() => match line {
                    Some(InputEvent::Line(line)) => {
                        if !self.handle_line(&line) {
                            break;
                        }
                        if !input.prompt(self.session.input()) {
                            break;
                        }
                    }
                    Some(InputEvent::Closed) | None => break,
                },
                Some(event) = self.exchange_rx.recv() => self.apply_exchange_event(event),
                Some(cmd) = self.cmd_rx.recv() => self.update_cmd(cmd),
            }
        }

        tracing::info!(
            conversation_id = %self.session.conversation().id,
            messages = self.session.conversation().len(),
            "Chat session ended"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::models::{Citation, Sender};
    use crate::providers::ChatReply;
    use crate::services::chat::ProgressStage;
    use crate::services::display::MessageRow;

    #[derive(Default)]
    struct RecordingView {
        messages: Vec<MessageRow>,
        panels: Vec<MessageRow>,
        stages: Vec<ProgressStage>,
        notices: Vec<Notice>,
        drugs: Vec<DrugCatalog>,
        copied: Vec<String>,
    }

    impl ChatView for RecordingView {
        fn show_message(&mut self, row: &MessageRow) {
            self.messages.push(row.clone());
        }
        fn show_sources(&mut self, row: &MessageRow) {
            self.panels.push(row.clone());
        }
        fn show_progress(&mut self, stage: ProgressStage) {
            self.stages.push(stage);
        }
        fn show_notice(&mut self, notice: &Notice) {
            self.notices.push(notice.clone());
        }
        fn show_drugs(&mut self, catalog: &DrugCatalog) {
            self.drugs.push(catalog.clone());
        }
        fn show_drug_info(&mut self, _name: &str, _info: &serde_json::Value) {}
        fn show_help(&mut self) {}
        fn copy_text(&mut self, text: &str) {
            self.copied.push(text.to_string());
        }
    }

    struct FixedService {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatService for FixedService {
        async fn send_message(&self, message: &str) -> Result<ChatReply, ProviderError> {
            self.calls.lock().unwrap().push(message.to_string());
            Ok(ChatReply {
                text: format!("answer to {}", message),
                sources: vec![Citation {
                    rank: 1,
                    source: "Label".to_string(),
                    url: None,
                    category: "dosage".to_string(),
                    similarity: 0.9,
                }],
                processing_time: None,
                model_used: Some("rag-gpt4".to_string()),
            })
        }

        async fn list_drugs(&self) -> Result<DrugCatalog, ProviderError> {
            Ok(DrugCatalog {
                drugs: vec!["Tylenol".to_string()],
                ..DrugCatalog::default()
            })
        }

        async fn drug_info(&self, _name: &str) -> Result<serde_json::Value, ProviderError> {
            Err(ProviderError::RequestFailed {
                status: 404,
                message: "Not Found".to_string(),
            })
        }
    }

    fn app() -> (App<RecordingView>, Arc<FixedService>) {
        let service = Arc::new(FixedService {
            calls: Mutex::new(Vec::new()),
        });
        let config = AppConfig {
            stage_delay_ms: 500,
            ..AppConfig::default()
        };
        let app = App::new(&config, service.clone(), RecordingView::default());
        (app, service)
    }

    #[tokio::test(start_paused = true)]
    async fn test_question_round_trip_through_the_loop() {
        let (mut app, service) = app();
        app.show_transcript();

        assert!(app.handle_line("Is ibuprofen safe?"));
        assert!(app.session().is_busy());
        assert_eq!(app.view().messages.len(), 2);
        assert_eq!(app.view().messages[1].sender, Sender::User);
        assert_eq!(app.view().stages, vec![ProgressStage::Retrieving]);

        app.next_event().await;
        assert_eq!(
            app.view().stages,
            vec![ProgressStage::Retrieving, ProgressStage::Composing]
        );

        app.next_event().await;
        assert!(!app.session().is_busy());
        assert_eq!(app.view().messages.len(), 3);
        let last = app.view().messages.last().unwrap();
        assert_eq!(last.sender, Sender::Bot);
        assert_eq!(last.text, "answer to Is ibuprofen safe?");
        assert_eq!(*service.calls.lock().unwrap(), vec!["Is ibuprofen safe?"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_question_stays_in_input() {
        let (mut app, service) = app();

        app.handle_line("first");
        app.handle_line("second");
        assert_eq!(app.session().input(), "second");
        assert!(matches!(app.view().notices.last(), Some(Notice::Info(_))));

        app.next_event().await;
        app.next_event().await;
        assert_eq!(app.session().conversation().len(), 3);
        assert_eq!(service.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sources_toggle_and_reuse() {
        let (mut app, _service) = app();
        app.handle_line("dose?");
        app.next_event().await;
        app.next_event().await;

        let user = app.session().conversation().all()[1].id;
        let bot = app.session().conversation().all()[2].id;

        app.handle_line(&format!("/sources {}", bot));
        app.handle_line(&format!("/sources {}", bot));
        let panels: Vec<bool> = app
            .view()
            .panels
            .iter()
            .map(|r| r.sources.as_ref().unwrap().expanded)
            .collect();
        assert_eq!(panels, vec![true, false]);

        app.handle_line(&format!("/sources {}", user));
        assert!(matches!(app.view().notices.last(), Some(Notice::Error(_))));

        app.handle_line(&format!("/reuse {}", user));
        assert_eq!(app.session().input(), "dose?");
        assert_eq!(app.session().conversation().len(), 3);

        app.handle_line(&format!("/open {} 1", bot));
        assert!(matches!(app.view().notices.last(), Some(Notice::Info(t)) if t.contains("no link")));
    }

    #[tokio::test]
    async fn test_drug_commands_report_results() {
        let (mut app, _service) = app();

        app.handle_line("/drugs");
        app.next_event().await;
        assert_eq!(app.view().drugs[0].drugs, vec!["Tylenol"]);

        app.handle_line("/drug Unknownium");
        app.next_event().await;
        assert!(matches!(
            app.view().notices.last(),
            Some(Notice::Error(t)) if t.contains("Unknownium")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_copy_puts_message_text_on_clipboard() {
        let (mut app, _service) = app();
        app.handle_line("dose?");
        app.next_event().await;
        app.next_event().await;

        let bot = app.session().conversation().all()[2].id;
        app.handle_line(&format!("/copy {}", bot));
        assert_eq!(app.view().copied, vec!["answer to dose?"]);
        assert!(matches!(app.view().notices.last(), Some(Notice::Info(t)) if t.contains("Copied")));

        app.handle_line("/copy 99");
        assert_eq!(app.view().copied.len(), 1);
        assert!(matches!(app.view().notices.last(), Some(Notice::Error(_))));
    }

    #[test]
    fn test_quit_and_bad_command() {
        let (mut app, _service) = app();
        assert!(app.handle_line("/nope"));
        assert!(matches!(app.view().notices.last(), Some(Notice::Error(_))));
        assert!(!app.handle_line("/quit"));
    }
}
