use crossterm::event::KeyCode;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use super::{centered_rect, styles};

/// Single-line editable text with a char cursor.
#[derive(Clone, Debug, Default)]
pub struct TextInput {
    value: String,
    cursor: usize,
    masked: bool,
}

impl TextInput {
    pub fn masked() -> Self {
        Self {
            masked: true,
            ..Self::default()
        }
    }

    pub fn with_value(value: &str) -> Self {
        let mut input = Self::default();
        input.set(value);
        input
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set(&mut self, value: &str) {
        self.value = value.to_string();
        self.cursor = self.value.chars().count();
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    fn byte_index(&self, char_idx: usize) -> usize {
        self.value
            .char_indices()
            .nth(char_idx)
            .map(|(i, _)| i)
            .unwrap_or(self.value.len())
    }

    /// Apply an editing key. Returns false for keys it does not handle.
    pub fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char(c) => {
                let at = self.byte_index(self.cursor);
                self.value.insert(at, c);
                self.cursor += 1;
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    let at = self.byte_index(self.cursor);
                    self.value.remove(at);
                }
            }
            KeyCode::Delete => {
                if self.cursor < self.value.chars().count() {
                    let at = self.byte_index(self.cursor);
                    self.value.remove(at);
                }
            }
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(self.value.chars().count()),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.value.chars().count(),
            _ => return false,
        }
        true
    }

    /// Text as drawn, with a block cursor when focused
    pub fn display(&self, focused: bool) -> Line<'static> {
        let shown: String = if self.masked {
            "•".repeat(self.value.chars().count())
        } else {
            self.value.clone()
        };
        if !focused {
            return Line::from(Span::styled(shown, styles::text()));
        }
        let before: String = shown.chars().take(self.cursor).collect();
        let at: String = shown.chars().skip(self.cursor).take(1).collect();
        let after: String = shown.chars().skip(self.cursor + 1).collect();
        Line::from(vec![
            Span::styled(before, styles::text()),
            Span::styled(if at.is_empty() { " ".to_string() } else { at }, styles::selection()),
            Span::styled(after, styles::text()),
        ])
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoginField {
    #[default]
    Id,
    Password,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoginAction {
    None,
    Submit { id: String, password: String },
    Quit,
}

#[derive(Clone, Debug)]
pub struct LoginForm {
    pub id: TextInput,
    pub password: TextInput,
    pub focus: LoginField,
    pub error: Option<String>,
}

impl Default for LoginForm {
    fn default() -> Self {
        Self {
            id: TextInput::default(),
            password: TextInput::masked(),
            focus: LoginField::Id,
            error: None,
        }
    }
}

impl LoginForm {
    pub fn handle_key(&mut self, code: KeyCode) -> LoginAction {
        match code {
            KeyCode::Esc => return LoginAction::Quit,
            KeyCode::Tab | KeyCode::Down | KeyCode::Up | KeyCode::BackTab => {
                self.focus = match self.focus {
                    LoginField::Id => LoginField::Password,
                    LoginField::Password => LoginField::Id,
                };
            }
            KeyCode::Enter => {
                if self.focus == LoginField::Id && self.password.value().is_empty() {
                    self.focus = LoginField::Password;
                    return LoginAction::None;
                }
                return LoginAction::Submit {
                    id: self.id.value().to_string(),
                    password: self.password.value().to_string(),
                };
            }
            other => {
                let field = match self.focus {
                    LoginField::Id => &mut self.id,
                    LoginField::Password => &mut self.password,
                };
                if field.handle_key(other) {
                    self.error = None;
                }
            }
        }
        LoginAction::None
    }

    /// Keep the id, drop the password after a failed attempt
    pub fn reject(&mut self, message: impl Into<String>) {
        self.password.clear();
        self.focus = LoginField::Password;
        self.error = Some(message.into());
    }
}

pub fn render_login(f: &mut Frame, area: Rect, form: &LoginForm) {
    let rect = centered_rect(area, 44, 11);
    f.render_widget(Clear, rect);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_focused())
        .title(Span::styled(" Router Info Dashboard ", styles::title()));
    let inner = block.inner(rect);
    f.render_widget(block, rect);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(1),
        ])
        .split(inner);

    let label = |text: &'static str, active: bool| {
        Span::styled(text, if active { styles::accent_bold() } else { styles::text_dim() })
    };
    f.render_widget(Paragraph::new(label("ID", form.focus == LoginField::Id)), rows[0]);
    f.render_widget(Paragraph::new(form.id.display(form.focus == LoginField::Id)), rows[1]);
    f.render_widget(
        Paragraph::new(label("Password", form.focus == LoginField::Password)),
        rows[3],
    );
    f.render_widget(
        Paragraph::new(form.password.display(form.focus == LoginField::Password)),
        rows[4],
    );

    let footer = match &form.error {
        Some(err) => Line::from(Span::styled(err.clone(), styles::error())),
        None => Line::from(vec![
            Span::styled("Enter", styles::key_hint()),
            Span::styled(" log in  ", styles::text_dim()),
            Span::styled("Tab", styles::key_hint()),
            Span::styled(" switch  ", styles::text_dim()),
            Span::styled("Esc", styles::key_hint()),
            Span::styled(" quit", styles::text_dim()),
        ]),
    };
    f.render_widget(Paragraph::new(footer), rows[6]);
}

/// One-line input modal with a hint underneath
pub fn render_prompt(f: &mut Frame, area: Rect, title: &str, input: &TextInput, hint: &str) {
    let rect = centered_rect(area, 60, 6);
    f.render_widget(Clear, rect);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_focused())
        .title(format!(" {} ", title));
    let inner = block.inner(rect);
    f.render_widget(block, rect);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Min(1)])
        .split(inner);
    f.render_widget(Paragraph::new(input.display(true)), rows[0]);
    f.render_widget(
        Paragraph::new(Span::styled(hint.to_string(), styles::text_muted())).wrap(Wrap { trim: true }),
        rows[2],
    );
}

/// Yes/no confirmation modal
pub fn render_confirm(f: &mut Frame, area: Rect, title: &str, body: &str) {
    let rect = centered_rect(area, 60, 7);
    f.render_widget(Clear, rect);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::warn())
        .title(format!(" {} ", title));
    let inner = block.inner(rect);
    f.render_widget(block, rect);

    let lines = vec![
        Line::from(Span::styled(body.to_string(), styles::text())),
        Line::from(""),
        Line::from(vec![
            Span::styled("y", styles::key_hint()),
            Span::styled(" confirm  ", styles::text_dim()),
            Span::styled("n/Esc", styles::key_hint()),
            Span::styled(" cancel", styles::text_dim()),
        ]),
    ];
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
}
