//! Terminal user interface for the chat screen.
//!
//! Renders the transcript, the input line, and a status bar with the
//! recording indicator and level meter. Implements [`TranscriptView`] by
//! mutating the transcript model and redrawing, so the session client never
//! touches the terminal directly.

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    layout::Position,
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};
use std::io::{stdout, Stdout};
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

use crate::transcript::{Transcript, TranscriptView, TransientHandle, Turn, TurnOrigin};

/// User input command from the chat screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Nothing actionable happened (no key, or a key consumed by the input line)
    Continue,
    /// Send the typed message (Enter)
    Send(String),
    /// Start or stop voice recording (Ctrl-R)
    ToggleRecording,
    /// Toggle spoken replies (Ctrl-T)
    ToggleVoiceResponse,
    /// Clear chat history (Ctrl-L)
    ClearHistory,
    /// Leave the chat screen (Esc or Ctrl-C)
    Quit,
}

/// Terminal UI for the chat workflow.
pub struct ChatTui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    transcript: Transcript,
    input: Input,
    voice_response_enabled: bool,
    is_recording: bool,
    level: u8,
}

impl ChatTui {
    /// Creates the chat screen and enters alternate screen mode.
    ///
    /// # Errors
    /// - If terminal cannot be initialized
    /// - If raw mode cannot be enabled
    /// - If alternate screen cannot be entered
    pub fn new(voice_response_enabled: bool) -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(ChatTui {
            terminal,
            transcript: Transcript::new(),
            input: Input::default(),
            voice_response_enabled,
            is_recording: false,
            level: 0,
        })
    }

    /// Updates the recording indicator shown in the status bar.
    pub fn set_recording(&mut self, is_recording: bool, level: u8) {
        self.is_recording = is_recording;
        self.level = level;
    }

    /// Updates the voice-response indicator shown in the status bar.
    pub fn set_voice_response(&mut self, enabled: bool) {
        self.voice_response_enabled = enabled;
    }

    /// Polls for one input event and translates it into a command.
    ///
    /// Waits up to 50ms so the caller's loop can refresh the level meter
    /// while recording. Keys that are not bound fall through to the input
    /// line editor.
    ///
    /// # Errors
    /// - If reading terminal events fails
    pub fn handle_input(&mut self) -> anyhow::Result<ChatCommand> {
        if !event::poll(std::time::Duration::from_millis(50))? {
            return Ok(ChatCommand::Continue);
        }

        let raw = event::read()?;
        let Event::Key(key) = raw else {
            return Ok(ChatCommand::Continue);
        };
        if key.kind != KeyEventKind::Press {
            return Ok(ChatCommand::Continue);
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Esc => return Ok(ChatCommand::Quit),
            KeyCode::Char('c') if ctrl => return Ok(ChatCommand::Quit),
            KeyCode::Char('r') if ctrl => return Ok(ChatCommand::ToggleRecording),
            KeyCode::Char('t') if ctrl => return Ok(ChatCommand::ToggleVoiceResponse),
            KeyCode::Char('l') if ctrl => return Ok(ChatCommand::ClearHistory),
            KeyCode::Enter => {
                let message = self.input.value().to_string();
                self.input.reset();
                return Ok(ChatCommand::Send(message));
            }
            _ => {
                self.input.handle_event(&Event::Key(key));
            }
        }

        Ok(ChatCommand::Continue)
    }

    /// Redraws the whole screen.
    ///
    /// # Errors
    /// - If terminal rendering fails
    pub fn draw(&mut self) -> anyhow::Result<()> {
        // Build everything that borrows self before the draw closure
        let size = self.terminal.size()?;
        let transcript_width = size.width.max(4) as usize - 2;
        let transcript_lines = transcript_lines(&self.transcript, transcript_width);
        let status = self.status_line();
        let input_value = self.input.value().to_string();
        let input_width = size.width.saturating_sub(2) as usize;
        let input_scroll = self.input.visual_scroll(input_width.max(1));
        let input_cursor = self.input.visual_cursor();

        self.terminal.draw(|frame| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Min(1),    // transcript
                    Constraint::Length(3), // input
                    Constraint::Length(1), // status bar
                ])
                .split(frame.area());

            // Transcript, pinned to the newest entry
            let visible_height = chunks[0].height as usize;
            let skip = transcript_lines.len().saturating_sub(visible_height);
            let text = Text::from(transcript_lines[skip..].to_vec());
            frame.render_widget(Paragraph::new(text), chunks[0]);

            // Input line
            let input_widget = Paragraph::new(input_value.as_str())
                .scroll((0, input_scroll as u16))
                .block(Block::default().borders(Borders::ALL).title(" Message "));
            frame.render_widget(input_widget, chunks[1]);
            frame.set_cursor_position(Position::new(
                chunks[1].x + 1 + (input_cursor.saturating_sub(input_scroll)) as u16,
                chunks[1].y + 1,
            ));

            // Status bar
            frame.render_widget(Paragraph::new(status.clone()), chunks[2]);
        })?;

        Ok(())
    }

    fn status_line(&self) -> Line<'static> {
        let mut spans: Vec<Span> = Vec::new();

        if self.is_recording {
            spans.push(Span::styled(
                format!(" ● REC {} ", level_meter(self.level)),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ));
        }

        let voice = if self.voice_response_enabled {
            "replies: spoken"
        } else {
            "replies: text"
        };
        spans.push(Span::styled(
            format!(" {voice} "),
            Style::default().fg(Color::DarkGray),
        ));

        spans.push(Span::styled(
            " Enter send · ^R record · ^T voice · ^L clear · Esc quit",
            Style::default().fg(Color::DarkGray),
        ));

        Line::from(spans)
    }

    /// Cleans up terminal state and exits alternate screen mode.
    ///
    /// # Errors
    /// - If terminal mode cannot be disabled
    /// - If cursor cannot be shown
    pub fn cleanup(&mut self) -> anyhow::Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for ChatTui {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

impl TranscriptView for ChatTui {
    fn append(&mut self, turn: Turn) {
        self.transcript.append(turn);
        if let Err(e) = self.draw() {
            tracing::warn!("Failed to render transcript: {e}");
        }
    }

    fn show_transient(&mut self, label: &str) -> TransientHandle {
        let handle = self.transcript.show_transient(label);
        if let Err(e) = self.draw() {
            tracing::warn!("Failed to render transient: {e}");
        }
        handle
    }

    fn remove_transient(&mut self, handle: TransientHandle) {
        self.transcript.remove_transient(handle);
        if let Err(e) = self.draw() {
            tracing::warn!("Failed to render transient removal: {e}");
        }
    }

    fn clear(&mut self) {
        self.transcript.clear();
        if let Err(e) = self.draw() {
            tracing::warn!("Failed to render cleared transcript: {e}");
        }
    }
}

/// Renders the transcript model into styled lines, wrapped to the width.
fn transcript_lines(transcript: &Transcript, width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    for turn in transcript.turns() {
        let (speaker, style) = match turn.origin {
            TurnOrigin::User => (
                "You",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            TurnOrigin::Bot => ("Assistant", Style::default().fg(Color::Green)),
            TurnOrigin::System => (
                "*",
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            ),
            TurnOrigin::Error => (
                "Error",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
        };

        let header = format!("{} {speaker}", turn.timestamp);
        lines.push(Line::from(Span::styled(
            header,
            style.add_modifier(Modifier::DIM),
        )));

        for wrapped in wrap_text(&turn.content, width) {
            lines.push(Line::from(Span::styled(wrapped, style)));
        }
        lines.push(Line::default());
    }

    if let Some(label) = transcript.transient_label() {
        lines.push(Line::from(Span::styled(
            label.to_string(),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

/// Greedy word wrap. Words longer than the width are split hard.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for source_line in text.lines() {
        let mut current = String::new();

        for word in source_line.split_whitespace() {
            if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
                lines.push(std::mem::take(&mut current));
            }

            let mut word = word;
            // Hard-split words that don't fit on a line by themselves
            while word.chars().count() > width {
                let split: String = word.chars().take(width).collect();
                let rest_start = split.len();
                lines.push(split);
                word = &word[rest_start..];
            }

            if current.is_empty() {
                current = word.to_string();
            } else {
                current.push(' ');
                current.push_str(word);
            }
        }

        lines.push(current);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

/// Ten-segment level meter for the status bar, e.g. "[▮▮▮▯▯▯▯▯▯▯]".
fn level_meter(level: u8) -> String {
    const SEGMENTS: usize = 10;

    let filled = (level.min(100) as usize * SEGMENTS) / 100;
    let mut meter = String::with_capacity(SEGMENTS + 2);
    meter.push('[');
    for i in 0..SEGMENTS {
        meter.push(if i < filled { '▮' } else { '▯' });
    }
    meter.push(']');
    meter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_text_respects_width() {
        let lines = wrap_text("the quick brown fox jumps over the lazy dog", 10);
        assert!(lines.iter().all(|l| l.chars().count() <= 10));
        assert_eq!(
            lines.join(" ").split_whitespace().collect::<Vec<_>>().join(" "),
            "the quick brown fox jumps over the lazy dog"
        );
    }

    #[test]
    fn test_wrap_text_hard_splits_long_words() {
        let lines = wrap_text("abcdefghij", 4);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_wrap_text_preserves_explicit_newlines() {
        let lines = wrap_text("one\ntwo", 20);
        assert_eq!(lines, vec!["one", "two"]);
    }

    #[test]
    fn test_level_meter_bounds() {
        assert_eq!(level_meter(0), "[▯▯▯▯▯▯▯▯▯▯]");
        assert_eq!(level_meter(100), "[▮▮▮▮▮▮▮▮▮▮]");
        assert_eq!(level_meter(255), "[▮▮▮▮▮▮▮▮▮▮]");
        assert_eq!(level_meter(50).matches('▮').count(), 5);
    }

    #[test]
    fn test_transcript_lines_include_transient() {
        let mut transcript = Transcript::new();
        transcript.append(Turn::new("hello", TurnOrigin::User));
        transcript.show_transient("Assistant is typing...");

        let lines = transcript_lines(&transcript, 40);
        let rendered: Vec<String> = lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.clone()).collect::<String>())
            .collect();
        assert!(rendered.iter().any(|l| l.contains("hello")));
        assert_eq!(rendered.last().unwrap(), "Assistant is typing...");
    }
}
