use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanStyle {
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
    pub heading: bool,
    pub quote: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub style: SpanStyle,
}

pub type Line = Vec<Span>;

/// Lay out an answer as terminal lines. Links keep their target in
/// parentheses so it can be copied from the terminal.
pub fn render_lines(input: &str) -> Vec<Line> {
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
    let mut ctx = RenderContext::default();
    for event in Parser::new_ext(input, options) {
        ctx.handle_event(event);
    }
    ctx.finish()
}

#[cfg(test)]
fn render_plain(input: &str) -> Vec<String> {
    render_lines(input)
        .into_iter()
        .map(|line| line.into_iter().map(|s| s.text).collect())
        .collect()
}

#[derive(Default)]
struct RenderContext {
    lines: Vec<Line>,
    current: Line,
    style: SpanStyle,
    in_code_block: bool,
    quote_depth: u32,
    // One entry per open list: Some(next number) for ordered lists.
    lists: Vec<Option<u64>>,
    link_url: Option<String>,
    table_cell: usize,
}

impl RenderContext {
    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.handle_start(tag),
            Event::End(tag) => self.handle_end(tag),
            Event::Text(text) => {
                if self.in_code_block {
                    for (i, part) in text.split('\n').enumerate() {
                        if i > 0 {
                            self.break_line();
                        }
                        self.push_text(part);
                    }
                } else {
                    self.push_text(&text);
                }
            }
            Event::Code(code) => {
                let saved = self.style;
                self.style.code = true;
                self.push_text(&code);
                self.style = saved;
            }
            // Answers are plain text as often as Markdown; keep their line breaks.
            Event::SoftBreak => self.break_line(),
            Event::HardBreak => self.break_line(),
            Event::Rule => {
                self.break_line();
                self.push_text("────────");
                self.break_line();
            }
            _ => {}
        }
    }

    fn handle_start(&mut self, tag: Tag) {
        match tag {
            Tag::Heading { .. } => {
                self.break_line();
                self.style.heading = true;
            }
            Tag::Strong => self.style.bold = true,
            Tag::Emphasis => self.style.italic = true,
            Tag::Link { dest_url, .. } => self.link_url = Some(dest_url.to_string()),
            Tag::CodeBlock(kind) => {
                self.break_line();
                self.in_code_block = true;
                self.style.code = true;
                if let CodeBlockKind::Fenced(lang) = kind {
                    let lang = lang.trim();
                    if !lang.is_empty() {
                        self.push_text(&format!("[{}]", lang));
                        self.break_line();
                    }
                }
            }
            Tag::BlockQuote(_) => {
                self.break_line();
                self.quote_depth += 1;
                self.style.quote = true;
            }
            Tag::List(start) => {
                self.break_line();
                self.lists.push(start);
            }
            Tag::TableHead | Tag::TableRow => {
                self.break_line();
                self.table_cell = 0;
            }
            Tag::TableCell => {
                if self.table_cell > 0 {
                    self.push_text(" | ");
                }
                self.table_cell += 1;
            }
            Tag::Item => {
                self.break_line();
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let bullet = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let bullet = format!("{}{}. ", indent, n);
                        *n += 1;
                        bullet
                    }
                    _ => format!("{}• ", indent),
                };
                let saved = self.style;
                self.style = SpanStyle::default();
                self.push_text(&bullet);
                self.style = saved;
            }
            _ => {}
        }
    }

    fn handle_end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                self.break_line();
                if self.lists.is_empty() {
                    self.blank_line();
                }
            }
            TagEnd::Heading(_) => {
                self.style.heading = false;
                self.break_line();
                self.blank_line();
            }
            TagEnd::Strong => self.style.bold = false,
            TagEnd::Emphasis => self.style.italic = false,
            TagEnd::Link => {
                if let Some(url) = self.link_url.take() {
                    self.push_text(&format!(" ({})", url));
                }
            }
            TagEnd::CodeBlock => {
                self.in_code_block = false;
                self.style.code = false;
                // Fenced blocks end with a newline, which already broke the line.
                self.break_line();
                self.blank_line();
            }
            TagEnd::BlockQuote(_) => {
                self.break_line();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.style.quote = self.quote_depth > 0;
            }
            TagEnd::List(_) => {
                self.break_line();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank_line();
                }
            }
            TagEnd::Item | TagEnd::TableHead | TagEnd::TableRow => self.break_line(),
            TagEnd::Table => {
                self.break_line();
                self.blank_line();
            }
            _ => {}
        }
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.current.is_empty() && self.quote_depth > 0 {
            self.current.push(Span {
                text: "│ ".repeat(self.quote_depth as usize),
                style: SpanStyle {
                    quote: true,
                    ..SpanStyle::default()
                },
            });
        }
        match self.current.last_mut() {
            Some(last) if last.style == self.style => last.text.push_str(text),
            _ => self.current.push(Span {
                text: text.to_string(),
                style: self.style,
            }),
        }
    }

    fn break_line(&mut self) {
        if !self.current.is_empty() {
            self.lines.push(std::mem::take(&mut self.current));
        }
    }

    fn blank_line(&mut self) {
        if matches!(self.lines.last(), Some(last) if !last.is_empty()) {
            self.lines.push(Vec::new());
        }
    }

    fn finish(mut self) -> Vec<Line> {
        self.break_line();
        while matches!(self.lines.last(), Some(last) if last.is_empty()) {
            self.lines.pop();
        }
        self.lines
    }
}
