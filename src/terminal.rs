// Copyright (C) 2025  Tom Waddington
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Terminal code view
//!
//! A read-only editor drawn with crossterm on the alternate screen, plus a key reader
//! thread that turns key presses into playback signals.

use anyhow::{Context, Result};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::io::{IsTerminal, Stdout, Write};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

use crate::document::{Buffer, Decorations, Document};
use crate::highlight::tokenize_line;
use crate::persona;
use crate::playback::{Editor, Overlay, SPEED_STEP, Signal};
use crate::render::first_visible_line;

const BACKGROUND: Color = Color::Rgb { r: 0x1e, g: 0x1e, b: 0x1e };
const CHROME: Color = Color::Rgb { r: 0x25, g: 0x25, b: 0x26 };
const TITLE: Color = Color::Rgb { r: 0xcc, g: 0xcc, b: 0xcc };
// 50% of rgb(33, 66, 131) over the background
const ACTIVE_LINE: Color = Color::Rgb { r: 0x20, g: 0x30, b: 0x50 };
const LINE_NUMBER: Color = Color::Rgb { r: 0x85, g: 0x85, b: 0x85 };
const LINE_NUMBER_ACTIVE: Color = Color::Rgb { r: 0xd4, g: 0xd4, b: 0xd4 };
const CURSOR: Color = Color::Rgb { r: 0xff, g: 0xff, b: 0xff };
const PROMPT: Color = Color::Rgb { r: 0xdc, g: 0xdc, b: 0xaa };
const EXPLANATION: Color = Color::Rgb { r: 0x9c, g: 0xdc, b: 0xfe };

const DEFAULT_SIZE: (u16, u16) = (80, 24);

fn rgb([r, g, b]: [u8; 3]) -> Color {
    Color::Rgb { r, g, b }
}

// RAII guard for raw mode and the alternate screen - only enabled if stdout is a TTY
struct ScreenGuard {
    enabled: bool,
}

impl ScreenGuard {
    fn new() -> Result<Self> {
        let enabled = if std::io::stdout().is_terminal() {
            terminal::enable_raw_mode().context("Failed to enable raw mode")?;
            let mut stdout = std::io::stdout();
            queue!(stdout, EnterAlternateScreen, Hide).context("Failed to enter alternate screen")?;
            stdout.flush().context("Failed to flush terminal")?;
            true
        } else {
            false
        };
        Ok(ScreenGuard { enabled })
    }
}

impl Drop for ScreenGuard {
    fn drop(&mut self) {
        if self.enabled {
            let mut stdout = std::io::stdout();
            let _ = queue!(stdout, Show, LeaveAlternateScreen);
            let _ = stdout.flush();

            // Drain stdin so pending key presses don't leak into the shell
            while event::poll(Duration::from_millis(0)).unwrap_or(false) {
                let _ = event::read();
            }
            let _ = terminal::disable_raw_mode();
        }
    }
}

/// Map a key press to a playback signal.
pub fn signal_for_key(key: KeyEvent) -> Option<Signal> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    let signal = match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Signal::Stop,
        KeyCode::Esc => Signal::Stop,
        KeyCode::Char(c @ '1'..='4') => Signal::Persona(persona::by_hotkey(c)?),
        KeyCode::Char('+' | '=') => Signal::SpeedDelta(SPEED_STEP),
        KeyCode::Char('-' | '_') => Signal::SpeedDelta(-SPEED_STEP),
        _ => Signal::Continue,
    };
    Some(signal)
}

/// Background thread forwarding key presses as [`Signal`]s until dropped.
pub struct KeyReader {
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl KeyReader {
    pub fn spawn(signals: UnboundedSender<Signal>) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let r = running.clone();
        let handle = thread::spawn(move || {
            while r.load(Ordering::SeqCst) {
                match event::poll(Duration::from_millis(50)) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(_) => break,
                }
                let Ok(Event::Key(key)) = event::read() else {
                    continue;
                };
                if let Some(signal) = signal_for_key(key)
                    && signals.send(signal).is_err()
                {
                    break;
                }
            }
        });
        Self {
            running,
            handle: Some(handle),
        }
    }
}

impl Drop for KeyReader {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Code view drawn on a terminal.
pub struct TerminalEditor<W: Write> {
    out: W,
    buffer: Buffer,
    file_name: String,
    size: Option<(u16, u16)>,
    _guard: Option<ScreenGuard>,
}

impl TerminalEditor<Stdout> {
    /// Take over the terminal until the editor is dropped.
    pub fn open(file_name: impl Into<String>) -> Result<Self> {
        let guard = ScreenGuard::new()?;
        Ok(Self {
            out: std::io::stdout(),
            buffer: Buffer::new(),
            file_name: file_name.into(),
            size: None,
            _guard: Some(guard),
        })
    }
}

impl<W: Write> TerminalEditor<W> {
    /// Draw into any writer at a fixed size.
    pub fn with_writer(out: W, file_name: impl Into<String>, size: (u16, u16)) -> Self {
        Self {
            out,
            buffer: Buffer::new(),
            file_name: file_name.into(),
            size: Some(size),
            _guard: None,
        }
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    fn size(&self) -> (u16, u16) {
        self.size
            .or_else(|| terminal::size().ok())
            .unwrap_or(DEFAULT_SIZE)
    }

    fn draw(&mut self, overlay: &Overlay) -> std::io::Result<()> {
        let (cols, rows) = self.size();
        let width = cols as usize;
        let footer_rows = 1 + usize::from(overlay.explanation.is_some()) + usize::from(overlay.prompt.is_some());
        let code_rows = (rows as usize).saturating_sub(1 + footer_rows).max(1);

        queue!(self.out, ResetColor, Clear(ClearType::All), MoveTo(0, 0))?;

        let mut title = format!(" {} - codetyper", self.file_name);
        if let Some(demo) = &overlay.title {
            title.push_str("  |  ");
            title.push_str(demo);
        }
        queue!(
            self.out,
            SetBackgroundColor(CHROME),
            SetForegroundColor(TITLE),
            Print(fit(&title, width)),
            ResetColor
        )?;

        let lines: Vec<&str> = self.buffer.lines().collect();
        let last = lines.len().saturating_sub(1);
        let active = self.buffer.active_line().min(last);
        let first = first_visible_line(active, code_rows);
        let gutter = (last + 1).to_string().len().max(3);

        for (row, (index, line)) in lines.iter().enumerate().skip(first).take(code_rows).enumerate() {
            let is_active = index == active;
            let background = if is_active { ACTIVE_LINE } else { BACKGROUND };
            let number_color = if is_active { LINE_NUMBER_ACTIVE } else { LINE_NUMBER };

            queue!(
                self.out,
                MoveTo(0, row as u16 + 1),
                SetBackgroundColor(CHROME),
                SetForegroundColor(number_color),
                Print(format!("{:>gutter$} ", index + 1)),
                SetBackgroundColor(background)
            )?;

            let mut used = gutter + 1;
            for token in tokenize_line(line) {
                let room = width.saturating_sub(used);
                if room == 0 {
                    break;
                }
                let shown: String = token.text.replace('\t', "    ").chars().take(room).collect();
                used += shown.chars().count();
                queue!(self.out, SetForegroundColor(rgb(token.class.rgb())), Print(shown))?;
            }

            if index == last && used < width {
                queue!(
                    self.out,
                    SetBackgroundColor(CURSOR),
                    Print(" "),
                    SetBackgroundColor(background)
                )?;
                used += 1;
            }
            if is_active && used < width {
                queue!(self.out, Print(" ".repeat(width - used)))?;
            }
            queue!(self.out, ResetColor)?;
        }

        let mut footer_row = rows.saturating_sub(footer_rows as u16);
        if let Some(explanation) = &overlay.explanation {
            queue!(
                self.out,
                MoveTo(0, footer_row),
                SetForegroundColor(EXPLANATION),
                SetAttribute(Attribute::Italic),
                Print(fit(explanation, width)),
                SetAttribute(Attribute::Reset),
                ResetColor
            )?;
            footer_row += 1;
        }
        if let Some(prompt) = &overlay.prompt {
            queue!(
                self.out,
                MoveTo(0, footer_row),
                SetForegroundColor(PROMPT),
                SetAttribute(Attribute::Bold),
                Print(fit(prompt, width)),
                SetAttribute(Attribute::Reset),
                ResetColor
            )?;
            footer_row += 1;
        }
        queue!(
            self.out,
            MoveTo(0, footer_row),
            SetBackgroundColor(CHROME),
            SetForegroundColor(LINE_NUMBER),
            Print(fit(&format!(" {}", overlay.status), width)),
            ResetColor
        )?;

        self.out.flush()
    }
}

/// Truncate or pad to exactly `width` columns.
fn fit(text: &str, width: usize) -> String {
    let mut s: String = text.chars().take(width).collect();
    let len = s.chars().count();
    s.extend(std::iter::repeat_n(' ', width - len));
    s
}

impl<W: Write> Document for TerminalEditor<W> {
    fn insert_at_end(&mut self, text: &str) {
        self.buffer.insert_at_end(text);
    }

    fn delete_range(&mut self, from: usize, to: usize) {
        self.buffer.delete_range(from, to);
    }

    fn len(&self) -> usize {
        self.buffer.len()
    }

    fn text(&self) -> String {
        self.buffer.text()
    }

    fn last_line(&self) -> usize {
        self.buffer.last_line()
    }
}

impl<W: Write> Decorations for TerminalEditor<W> {
    fn set_active_line(&mut self, line: usize) {
        self.buffer.set_active_line(line);
    }

    fn set_cursor_marker(&mut self, position: usize) {
        self.buffer.set_cursor_marker(position);
    }
}

impl<W: Write> Editor for TerminalEditor<W> {
    fn present(&mut self, overlay: &Overlay) -> Result<()> {
        self.draw(overlay).context("Failed to draw terminal view")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn output(editor: &TerminalEditor<Vec<u8>>) -> String {
        String::from_utf8_lossy(editor.writer()).into_owned()
    }

    #[test]
    fn test_key_mapping() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(signal_for_key(ctrl_c), Some(Signal::Stop));
        assert_eq!(signal_for_key(press(KeyCode::Esc)), Some(Signal::Stop));
        assert_eq!(signal_for_key(press(KeyCode::Char('c'))), Some(Signal::Continue));
        assert_eq!(signal_for_key(press(KeyCode::Enter)), Some(Signal::Continue));
        assert_eq!(
            signal_for_key(press(KeyCode::Char('+'))),
            Some(Signal::SpeedDelta(SPEED_STEP))
        );
        assert_eq!(
            signal_for_key(press(KeyCode::Char('-'))),
            Some(Signal::SpeedDelta(-SPEED_STEP))
        );
        match signal_for_key(press(KeyCode::Char('4'))) {
            Some(Signal::Persona(p)) => assert_eq!(p.name, "tenx"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_key_release_is_ignored() {
        let mut key = press(KeyCode::Char('x'));
        key.kind = KeyEventKind::Release;
        assert_eq!(signal_for_key(key), None);
    }

    #[test]
    fn test_draws_title_code_and_footer() {
        let mut editor = TerminalEditor::with_writer(Vec::new(), "CodeTyper.js", (80, 24));
        editor.insert_at_end("const answer = 42;");
        editor
            .present(&Overlay {
                title: Some("Tiny demo".to_string()),
                explanation: Some("Declare the answer".to_string()),
                prompt: Some("Step 1 of 2 complete. Press any key to continue...".to_string()),
                status: "Regular Developer | 1.0x".to_string(),
            })
            .unwrap();

        let out = output(&editor);
        assert!(out.contains("CodeTyper.js - codetyper  |  Tiny demo"));
        assert!(out.contains("answer"));
        assert!(out.contains("42"));
        assert!(out.contains("  1 "));
        assert!(out.contains("Declare the answer"));
        assert!(out.contains("Step 1 of 2 complete."));
        assert!(out.contains("Regular Developer | 1.0x"));
    }

    #[test]
    fn test_scrolls_to_active_line() {
        let mut editor = TerminalEditor::with_writer(Vec::new(), "CodeTyper.js", (80, 10));
        let text: Vec<String> = (0..100).map(|i| format!("line{i}")).collect();
        editor.insert_at_end(&text.join("\n"));
        let last = editor.last_line();
        editor.set_active_line(last);
        editor.present(&Overlay::default()).unwrap();

        let out = output(&editor);
        assert!(out.contains("line99"));
        assert!(!out.contains("line0"));
    }

    #[test]
    fn test_fit() {
        assert_eq!(fit("abc", 5), "abc  ");
        assert_eq!(fit("abcdef", 3), "abc");
    }
}
