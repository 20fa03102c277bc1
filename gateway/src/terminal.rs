//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Terminal codec
//!
//! A [`Terminal`] sits between application code and one connected client. Text
//! goes in with inline markup (see [`dialtone_common::markup`]) and comes out
//! as bytes for the selected [`Emulation`]; keystrokes come back as canonical
//! bytes and are edited into lines.
//!
//! Output is buffered and sent on [`Terminal::flush`], on any input call, and at
//! the end of paged output. A failed write marks the connection dead and later
//! output is discarded, so callers never have to handle write errors.

pub mod detect;
pub mod editor;
pub mod pager;
pub mod poller;
pub mod protocol;
pub mod wrap;

use crate::telnet::protocol::{TelnetCommand, TelnetFilter};
use bytes::{BufMut, BytesMut};
use dialtone_common::{Color, SessionContext, markup};
use editor::{EditAction, LineEditor};
use flagset::{FlagSet, flags};
use pager::Pager;
use poller::KeyPoller;
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use wrap::{WrapMode, WrapOptions, WrappedLine};

pub use pager::{PagerOutcome, PromptResponse};
pub use poller::PolledKey;
pub use protocol::{Emulation, Protocol, Rendered, Style};

pub type TerminalReader = Box<dyn AsyncRead + Send + Unpin>;
pub type TerminalWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Completion callback for tab completion
pub type Completer<'a> = &'a (dyn Fn(&str) -> Option<String> + Sync);

pub const DEFAULT_COLUMNS: u16 = 80;
pub const DEFAULT_ROWS: u16 = 24;
pub const DEFAULT_FOREGROUND: Color = Color::Gray;
pub const DEFAULT_BACKGROUND: Color = Color::Black;

/// Buffered output is sent early once it grows past this many bytes
const FLUSH_THRESHOLD: usize = 8 * 1024;

const READ_BUFFER_SIZE: usize = 512;

flags! {
    /// Options for [`Terminal::output`]
    pub enum OutputFlags: u8 {
        /// Never stop at page boundaries
        NoPause,
        /// Keep leading whitespace on wrapped lines
        NoTrim,
        /// Prompt once more after the last line
        PauseAtEnd,
        /// Break lines at the exact width instead of at spaces
        NoWordWrap,
        /// Break lines only at newlines
        NewlinesOnly,
    }

    /// Options for [`Terminal::input_line`]
    pub enum InputFlags: u8 {
        /// Echo a mask instead of the typed characters
        Password,
        /// Accept certain punctuation keys as a complete line
        SingleKeyCommands,
        /// Tab asks the completer for a replacement line
        Autocomplete,
        /// A bare line feed inserts a newline instead of being ignored
        AllowNewline,
        /// Do not echo the line terminator
        NoLineEcho,
        /// Cursor-up recalls the previous line
        RecallLastLine,
    }
}

/// Errors returned by terminal input
#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("Connection closed")]
    Disconnected,

    #[error("Session logged out")]
    LoggedOut,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Key poller failed: {0}")]
    Poller(String),
}

/// Emulation, colors and geometry of a terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalState {
    pub emulation: Emulation,
    pub foreground: Color,
    pub background: Color,
    pub columns: u16,
    pub rows: u16,
}

impl Default for TerminalState {
    fn default() -> Self {
        Self {
            emulation: Emulation::default(),
            foreground: DEFAULT_FOREGROUND,
            background: DEFAULT_BACKGROUND,
            columns: DEFAULT_COLUMNS,
            rows: DEFAULT_ROWS,
        }
    }
}

/// One connected client terminal
pub struct Terminal {
    protocol: &'static dyn Protocol,
    state: TerminalState,
    reader: Option<TerminalReader>,
    writer: TerminalWriter,
    output: BytesMut,
    backlog: VecDeque<u8>,
    filter: TelnetFilter,
    session: Arc<dyn SessionContext>,
    poller: Option<KeyPoller>,
    last_tick: u64,
    last_line: Option<String>,
    after_return: bool,
    connected: bool,
}

impl Terminal {
    pub fn new<R, W>(
        emulation: Emulation,
        reader: R,
        writer: W,
        session: Arc<dyn SessionContext>,
    ) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            protocol: emulation.protocol(),
            state: TerminalState {
                emulation,
                ..TerminalState::default()
            },
            reader: Some(Box::new(reader)),
            writer: Box::new(writer),
            output: BytesMut::with_capacity(4096),
            backlog: VecDeque::new(),
            filter: TelnetFilter::new(),
            session,
            poller: None,
            last_tick: 0,
            last_line: None,
            after_return: false,
            connected: true,
        }
    }

    pub fn state(&self) -> &TerminalState {
        &self.state
    }

    pub fn emulation(&self) -> Emulation {
        self.state.emulation
    }

    pub fn protocol(&self) -> &'static dyn Protocol {
        self.protocol
    }

    /// Switch emulation; colors return to their defaults without emitting anything
    ///
    /// A running key poller keeps decoding with the previous emulation until it
    /// is restarted.
    pub fn set_emulation(&mut self, emulation: Emulation) {
        tracing::debug!(from = %self.state.emulation, to = %emulation, "Switching emulation");
        self.protocol = emulation.protocol();
        self.state.emulation = emulation;
        self.state.foreground = DEFAULT_FOREGROUND;
        self.state.background = DEFAULT_BACKGROUND;
    }

    pub fn columns(&self) -> u16 {
        self.state.columns
    }

    pub fn rows(&self) -> u16 {
        self.state.rows
    }

    /// Update the screen size; zero dimensions are ignored
    pub fn set_size(&mut self, columns: u16, rows: u16) {
        if columns > 0 {
            self.state.columns = columns;
        }
        if rows > 0 {
            self.state.rows = rows;
        }
    }

    pub fn session(&self) -> &Arc<dyn SessionContext> {
        &self.session
    }

    /// Whether the connection is still usable
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_some()
    }

    pub fn last_line(&self) -> Option<&str> {
        self.last_line.as_deref()
    }

    // ---------------------------------------------------------------
    // Output
    // ---------------------------------------------------------------

    /// Buffer data bytes, doubling any IAC so it is not read as a command
    fn queue(&mut self, bytes: &[u8]) {
        let iac = TelnetCommand::IAC.to_byte();
        for chunk in bytes.split_inclusive(|&b| b == iac) {
            self.output.extend_from_slice(chunk);
            if chunk.last() == Some(&iac) {
                self.output.put_u8(iac);
            }
        }
    }

    /// Write bytes already in the terminal's native encoding
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.queue(bytes);
    }

    /// Buffer a raw telnet command
    pub fn queue_command(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
    }

    fn encode_text(&self, text: &str) -> (Vec<u8>, bool) {
        let rendered = self.protocol.replace_inline_colors(text, &self.state);
        let transformed = self.protocol.transform_text(&rendered.text);
        (
            self.protocol.encode(&transformed, &self.state),
            rendered.recolored,
        )
    }

    /// Native bytes for text without markup, as they would be typed
    fn encode_plain(&self, text: &str) -> Vec<u8> {
        let transformed = self.protocol.transform_text(text);
        self.protocol.encode(&transformed, &self.state)
    }

    /// Bytes `text` renders to, before telnet escaping
    pub fn render(&self, text: &str) -> Vec<u8> {
        self.encode_text(text).0
    }

    /// Write markup text
    ///
    /// If inline markup leaves a different color active, the current foreground
    /// is restored afterwards.
    pub fn write(&mut self, text: &str) {
        let (bytes, recolored) = self.encode_text(text);
        self.queue(&bytes);
        if recolored {
            self.queue(self.protocol.foreground(self.state.foreground));
        }
    }

    pub fn write_line(&mut self, text: &str) {
        self.write(text);
        self.newline();
    }

    pub fn newline(&mut self) {
        self.style(Style::Newline);
    }

    pub fn style(&mut self, style: Style) {
        self.queue(self.protocol.style(style));
    }

    pub fn clear_screen(&mut self) {
        self.style(Style::ClearScreen);
    }

    pub fn bell(&mut self) {
        self.style(Style::Bell);
    }

    fn erase(&mut self, count: usize) {
        for _ in 0..count {
            self.style(Style::Backspace);
        }
    }

    /// Change the foreground, emitting nothing if it is already active
    pub fn set_foreground(&mut self, color: Color) {
        if color != self.state.foreground {
            self.queue(self.protocol.foreground(color));
            self.state.foreground = color;
        }
    }

    /// Change the background, emitting nothing if it is already active
    pub fn set_background(&mut self, color: Color) {
        if color != self.state.background {
            self.queue(self.protocol.background(color));
            self.state.background = color;
        }
    }

    /// Apply colors until the returned scope is dropped
    pub fn with_colors(&mut self, background: Color, foreground: Color) -> ColorScope<'_> {
        let saved_background = self.state.background;
        let saved_foreground = self.state.foreground;
        self.set_background(background);
        self.set_foreground(foreground);
        ColorScope {
            terminal: self,
            background: saved_background,
            foreground: saved_foreground,
        }
    }

    fn restore_colors(&mut self, background: Color, foreground: Color) {
        self.queue(self.protocol.background(background));
        self.queue(self.protocol.foreground(foreground));
        self.state.background = background;
        self.state.foreground = foreground;
    }

    /// Send buffered output, returning whether the connection is still alive
    pub async fn flush(&mut self) -> bool {
        if self.output.is_empty() {
            return self.connected;
        }
        let pending = self.output.split().freeze();
        if !self.connected {
            return false;
        }
        if let Err(e) = self.writer.write_all(&pending).await {
            tracing::debug!("Write failed, dropping connection: {}", e);
            self.connected = false;
            return false;
        }
        if let Err(e) = self.writer.flush().await {
            tracing::debug!("Flush failed, dropping connection: {}", e);
            self.connected = false;
        }
        self.connected
    }

    // ---------------------------------------------------------------
    // Paged output
    // ---------------------------------------------------------------

    /// Write text, pausing between pages when it is longer than the screen
    pub async fn output(
        &mut self,
        text: &str,
        flags: impl Into<FlagSet<OutputFlags>>,
    ) -> PagerOutcome {
        self.page(text, flags.into(), None).await
    }

    /// Like [`Terminal::output`], ending with a newline unless output was cut short
    pub async fn output_line(
        &mut self,
        text: &str,
        flags: impl Into<FlagSet<OutputFlags>>,
    ) -> PagerOutcome {
        let outcome = self.page(text, flags.into(), None).await;
        if outcome != PagerOutcome::Completed {
            return outcome;
        }
        self.newline();
        match self.flush().await {
            true => PagerOutcome::Completed,
            false => PagerOutcome::Disconnected,
        }
    }

    /// Page through text starting `percent` of the way in
    pub async fn output_from(
        &mut self,
        text: &str,
        flags: impl Into<FlagSet<OutputFlags>>,
        percent: u8,
    ) -> PagerOutcome {
        self.page(text, flags.into(), Some(percent)).await
    }

    async fn page(
        &mut self,
        text: &str,
        flags: FlagSet<OutputFlags>,
        start_percent: Option<u8>,
    ) -> PagerOutcome {
        if !self.connected || self.session.is_logged_out() {
            return PagerOutcome::Disconnected;
        }

        let columns = usize::from(self.state.columns);
        let fits = start_percent.is_none()
            && !flags.contains(OutputFlags::PauseAtEnd)
            && markup::visible_len(text) <= columns
            && text.lines().count() <= pager::page_rows(self.state.rows);
        if fits {
            self.write(text);
            return match self.flush().await {
                true => PagerOutcome::Completed,
                false => PagerOutcome::Disconnected,
            };
        }

        let mode = if flags.contains(OutputFlags::NewlinesOnly) {
            WrapMode::NewlinesOnly
        } else if flags.contains(OutputFlags::NoWordWrap) {
            WrapMode::Character
        } else {
            WrapMode::Word
        };
        let options = WrapOptions {
            width: columns.saturating_sub(1).max(1),
            mode,
            trim: !flags.contains(OutputFlags::NoTrim),
        };
        let mut lines = wrap::wrap(text, &options);

        let paused = !flags.contains(OutputFlags::NoPause);
        let pause_at_end = paused && flags.contains(OutputFlags::PauseAtEnd);
        if pause_at_end {
            lines.push(WrappedLine::new(pager::END_OF_OUTPUT));
        }
        let start = start_percent.map_or(0, |percent| pager::start_line(lines.len(), percent));
        let mut pager = match paused {
            true => Pager::new(lines.len(), self.state.rows, start, pause_at_end),
            false => Pager::unpaused(lines.len(), start),
        };
        tracing::trace!(lines = lines.len(), start, "Paging output");

        while let Some(index) = pager.next_line() {
            if self.session.is_logged_out() {
                return PagerOutcome::Disconnected;
            }
            self.write(&lines[index].text);
            self.newline();

            if !pager.should_pause() {
                if self.output.len() >= FLUSH_THRESHOLD && !self.flush().await {
                    return PagerOutcome::Disconnected;
                }
                continue;
            }

            let response = match self.more_prompt(pager.percent()).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::debug!("Paging interrupted: {}", e);
                    return PagerOutcome::Disconnected;
                }
            };
            match response {
                PromptResponse::Yes => pager.resume(),
                PromptResponse::No => {
                    self.flush().await;
                    return PagerOutcome::Aborted;
                }
                PromptResponse::Continuous => pager.set_continuous(),
                PromptResponse::PageUp => pager.page_up(),
                PromptResponse::Search => {
                    if let Err(e) = self.search_prompt(&mut pager, &lines).await {
                        tracing::debug!("Search interrupted: {}", e);
                        return PagerOutcome::Disconnected;
                    }
                }
            }
        }

        match self.flush().await {
            true => PagerOutcome::Completed,
            false => PagerOutcome::Disconnected,
        }
    }

    async fn more_prompt(&mut self, percent: usize) -> Result<PromptResponse, TerminalError> {
        let prompt = markup::reverse(&format!("-- More ({}%) [Y,n,c,u,/] --", percent));
        let visible = markup::visible_len(&prompt);
        self.write(&prompt);

        let key = self.input_key().await?;
        let erase = self.protocol.erase_line(visible);
        self.queue(&erase);

        if key == '\u{1b}' {
            // Drop the rest of an escape sequence
            self.backlog.clear();
        }
        Ok(PromptResponse::from_key(key))
    }

    async fn search_prompt(
        &mut self,
        pager: &mut Pager,
        lines: &[WrappedLine],
    ) -> Result<(), TerminalError> {
        self.write("Search for: ");
        let Some(term) = self.read_line(FlagSet::default(), None).await? else {
            pager.resume();
            return Ok(());
        };

        if pager.search(lines, &term).is_some() {
            return Ok(());
        }
        match pager.keyword().map(str::to_string) {
            Some(keyword) => {
                self.write_line(&format!("No more occurrences of '{}'.", keyword));
                pager.page_up();
            }
            None => pager.resume(),
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Input
    // ---------------------------------------------------------------

    /// Read one key
    pub async fn input_key(&mut self) -> Result<char, TerminalError> {
        let byte = self.next_byte().await?;
        Ok(self.decode_key(byte))
    }

    fn decode_key(&self, byte: u8) -> char {
        if byte.is_ascii_control() {
            return char::from(byte);
        }
        self.protocol.decode(&[byte]).chars().next().unwrap_or('?')
    }

    /// Read an edited line; `Ok(None)` means the interrupt key cancelled it
    pub async fn input_line(
        &mut self,
        flags: impl Into<FlagSet<InputFlags>>,
    ) -> Result<Option<String>, TerminalError> {
        self.read_line(flags.into(), None).await
    }

    /// Read an edited line, offering tab completion through `completer`
    pub async fn input_line_with(
        &mut self,
        flags: impl Into<FlagSet<InputFlags>>,
        completer: Completer<'_>,
    ) -> Result<Option<String>, TerminalError> {
        self.read_line(flags.into(), Some(completer)).await
    }

    /// Show a prompt and read a line
    pub async fn prompt(
        &mut self,
        prompt: &str,
        flags: impl Into<FlagSet<InputFlags>>,
    ) -> Result<Option<String>, TerminalError> {
        self.write(prompt);
        self.read_line(flags.into(), None).await
    }

    async fn read_line(
        &mut self,
        flags: FlagSet<InputFlags>,
        completer: Option<Completer<'_>>,
    ) -> Result<Option<String>, TerminalError> {
        let mut editor = LineEditor::new(flags, self.protocol.is_utf8(), self.after_return);
        self.after_return = false;

        loop {
            let byte = self.next_byte().await?;
            match editor.feed(byte) {
                EditAction::Nothing => {}
                EditAction::Echo(echo) => self.queue(&[echo]),
                EditAction::Erase(count) => self.erase(count),
                EditAction::Newline => self.newline(),
                EditAction::Complete => {
                    let current = self.protocol.decode(editor.buffer());
                    if let Some(replacement) = completer.and_then(|complete| complete(&current)) {
                        let bytes = self.encode_plain(&replacement);
                        self.replace_line(&mut editor, bytes);
                    }
                }
                EditAction::Recall => {
                    if let Some(last) = self.last_line.clone() {
                        let bytes = self.encode_plain(&last);
                        self.replace_line(&mut editor, bytes);
                    }
                }
                action @ (EditAction::Submit | EditAction::Shortcut(_)) => {
                    if let EditAction::Shortcut(key) = action {
                        self.queue(&[key]);
                    }
                    if !flags.contains(InputFlags::NoLineEcho) {
                        self.newline();
                    }
                    self.flush().await;
                    self.after_return = editor.after_return();

                    let line = self.protocol.decode(&editor.take());
                    if !line.is_empty() && !flags.contains(InputFlags::Password) {
                        self.last_line = Some(line.clone());
                    }
                    return Ok(Some(line));
                }
                EditAction::Cancel => {
                    self.write("^C");
                    self.newline();
                    self.flush().await;
                    return Ok(None);
                }
                EditAction::Logout => {
                    tracing::info!("Repeated escape ended the session");
                    self.flush().await;
                    self.session.force_logout();
                    return Err(TerminalError::LoggedOut);
                }
            }
        }
    }

    fn replace_line(&mut self, editor: &mut LineEditor, bytes: Vec<u8>) {
        let erase = editor.replace(bytes);
        self.erase(erase);
        let echo = editor.echo_bytes();
        self.queue(&echo);
    }

    /// Next canonical input byte, flushing output before blocking
    async fn next_byte(&mut self) -> Result<u8, TerminalError> {
        loop {
            if self.session.is_logged_out() {
                return Err(TerminalError::LoggedOut);
            }
            if let Some(byte) = self.backlog.pop_front() {
                return Ok(byte);
            }
            if self.poller.is_some() {
                return self.next_polled_byte().await;
            }
            let raw = self.read_chunk().await?;
            self.ingest(&raw);
        }
    }

    async fn next_polled_byte(&mut self) -> Result<u8, TerminalError> {
        self.flush().await;
        let logout = self.session.logout_token().clone();
        let tick = self.last_tick;
        let poller = self.poller.as_mut().ok_or(TerminalError::Disconnected)?;

        match poller.next_after(tick, &logout).await {
            Ok(PolledKey {
                key: Some(key),
                sequence,
                tick,
            }) => {
                self.last_tick = tick;
                self.backlog.extend(sequence);
                Ok(key)
            }
            Ok(_) | Err(TerminalError::Disconnected) => {
                self.connected = false;
                Err(TerminalError::Disconnected)
            }
            Err(e) => Err(e),
        }
    }

    /// Read raw bytes, giving up when the session logs out
    async fn read_chunk(&mut self) -> Result<Vec<u8>, TerminalError> {
        if !self.flush().await {
            return Err(TerminalError::Disconnected);
        }
        let logout = self.session.logout_token().clone();
        let reader = self.reader.as_mut().ok_or(TerminalError::Disconnected)?;
        let mut buffer = [0u8; READ_BUFFER_SIZE];

        let read = tokio::select! {
            _ = logout.cancelled() => return Err(TerminalError::LoggedOut),
            read = reader.read(&mut buffer) => read,
        };
        match read {
            Ok(0) => {
                tracing::debug!("Connection closed by peer");
                self.connected = false;
                Err(TerminalError::Disconnected)
            }
            Ok(n) => Ok(buffer[..n].to_vec()),
            Err(e) => {
                self.connected = false;
                Err(TerminalError::Io(e))
            }
        }
    }

    /// Filter telnet commands, canonicalize and queue input bytes
    fn ingest(&mut self, raw: &[u8]) {
        let data = self.filter.feed(raw);
        if let Some((columns, rows)) = self.filter.take_window_size() {
            self.set_size(columns, rows);
        }
        let mut canonical = self.protocol.interpret_input(&data);
        self.protocol.remove_invalid_input(&mut canonical);
        self.backlog
            .extend(canonical.into_iter().filter(|&byte| byte != 0));
        self.session.reset_idle_timer();
    }

    // ---------------------------------------------------------------
    // Key polling
    // ---------------------------------------------------------------

    /// Hand the read half to a background task that publishes each key
    ///
    /// Does nothing if polling is already running.
    pub fn start_polling(&mut self) {
        if self.poller.is_some() {
            return;
        }
        let Some(reader) = self.reader.take() else {
            return;
        };
        let filter = std::mem::take(&mut self.filter);
        self.poller = Some(KeyPoller::spawn(
            reader,
            filter,
            self.protocol,
            Arc::clone(&self.session),
        ));
        self.last_tick = 0;
    }

    /// Stop polling and take the read half back
    ///
    /// Safe to call when not polling or after the connection has closed.
    pub async fn abort_polling(&mut self) {
        let Some(poller) = self.poller.take() else {
            return;
        };
        match poller.stop().await {
            Ok(exit) => {
                self.reader = Some(exit.reader);
                self.filter = exit.filter;
                if let Some((columns, rows)) = self.filter.take_window_size() {
                    self.set_size(columns, rows);
                }
                if !exit.connected {
                    self.connected = false;
                }
            }
            Err(e) => {
                tracing::error!("{}", e);
                self.connected = false;
            }
        }
    }

    /// Observe polled keys, for example to broadcast them to other sessions
    pub fn key_watch(&self) -> Option<watch::Receiver<PolledKey>> {
        self.poller.as_ref().map(KeyPoller::subscribe)
    }

    /// Flush, stop polling and shut the write half down
    pub async fn close(&mut self) {
        self.flush().await;
        self.abort_polling().await;
        if self.connected {
            if let Err(e) = self.writer.shutdown().await {
                tracing::debug!("Shutdown failed: {}", e);
            }
        }
        self.connected = false;
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        if let Some(poller) = &self.poller {
            poller.cancel();
        }
    }
}

/// Colors applied by [`Terminal::with_colors`], restored on drop
pub struct ColorScope<'a> {
    terminal: &'a mut Terminal,
    background: Color,
    foreground: Color,
}

impl Deref for ColorScope<'_> {
    type Target = Terminal;

    fn deref(&self) -> &Terminal {
        self.terminal
    }
}

impl DerefMut for ColorScope<'_> {
    fn deref_mut(&mut self) -> &mut Terminal {
        self.terminal
    }
}

impl Drop for ColorScope<'_> {
    fn drop(&mut self) {
        self.terminal
            .restore_colors(self.background, self.foreground);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use tokio_test::io::{Builder, Mock};
    use tracing_test::traced_test;

    fn mock_terminal(emulation: Emulation, mock: Mock) -> Terminal {
        let (reader, writer) = tokio::io::split(mock);
        Terminal::new(emulation, reader, writer, Arc::new(Session::new("mock")))
    }

    #[tokio::test]
    async fn test_echo_sent_in_one_write() {
        let mock = Builder::new().read(b"hi\r").write(b"hi\r\n").build();
        let mut terminal = mock_terminal(Emulation::Ascii, mock);

        let line = terminal.input_line(FlagSet::<InputFlags>::default()).await.unwrap();
        assert_eq!(line, Some("hi".to_string()));
        assert_eq!(terminal.last_line(), Some("hi"));
    }

    #[tokio::test]
    async fn test_line_feed_after_return_is_ignored() {
        let mock = Builder::new()
            .read(b"one\r\ntwo\r")
            .write(b"one\r\n")
            .write(b"two\r\n")
            .build();
        let mut terminal = mock_terminal(Emulation::Ascii, mock);

        assert_eq!(
            terminal.input_line(FlagSet::<InputFlags>::default()).await.unwrap(),
            Some("one".to_string())
        );
        assert_eq!(
            terminal.input_line(FlagSet::<InputFlags>::default()).await.unwrap(),
            Some("two".to_string())
        );
    }

    #[tokio::test]
    async fn test_single_key_command() {
        let mock = Builder::new().read(b"?").write(b"?\r\n").build();
        let mut terminal = mock_terminal(Emulation::Ascii, mock);

        let line = terminal.input_line(InputFlags::SingleKeyCommands).await.unwrap();
        assert_eq!(line, Some("?".to_string()));
    }

    #[tokio::test]
    async fn test_foreground_change_is_written_once() {
        let mock = Builder::new().write(b"\x1b[1;31mab").build();
        let mut terminal = mock_terminal(Emulation::Ansi, mock);

        terminal.set_foreground(Color::Red);
        terminal.write("a");
        terminal.set_foreground(Color::Red);
        terminal.write("b");
        assert!(terminal.flush().await);
    }

    #[tokio::test]
    async fn test_ascii_styles_write_nothing() {
        let mock = Builder::new().write(b"plain").build();
        let mut terminal = mock_terminal(Emulation::Ascii, mock);

        terminal.set_foreground(Color::Red);
        terminal.clear_screen();
        terminal.write("plain");
        assert!(terminal.flush().await);
    }

    #[tokio::test]
    async fn test_color_scope_restores_on_error() {
        async fn styled_key(terminal: &mut Terminal) -> Result<char, TerminalError> {
            let mut scope = terminal.with_colors(Color::Blue, Color::White);
            scope.write("? ");
            scope.input_key().await
        }

        let (client, server) = tokio::io::duplex(1024);
        let (reader, writer) = tokio::io::split(server);
        let mut terminal = Terminal::new(Emulation::Ansi, reader, writer, Arc::new(Session::new("test")));
        drop(client);

        assert!(styled_key(&mut terminal).await.is_err());
        assert_eq!(terminal.state().foreground, DEFAULT_FOREGROUND);
        assert_eq!(terminal.state().background, DEFAULT_BACKGROUND);
    }

    #[tokio::test]
    async fn test_zero_size_is_ignored() {
        let mock = Builder::new().build();
        let mut terminal = mock_terminal(Emulation::Ascii, mock);

        terminal.set_size(0, 30);
        assert_eq!((terminal.columns(), terminal.rows()), (DEFAULT_COLUMNS, 30));
        terminal.set_size(100, 0);
        assert_eq!((terminal.columns(), terminal.rows()), (100, 30));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_repeated_escape_is_logged() {
        let mock = Builder::new().read(b"\x1b\x1b\x1b").build();
        let mut terminal = mock_terminal(Emulation::Ascii, mock);

        let result = terminal.input_line(FlagSet::<InputFlags>::default()).await;
        assert!(matches!(result, Err(TerminalError::LoggedOut)));
        assert!(terminal.session().is_logged_out());
        assert!(logs_contain("Repeated escape ended the session"));
    }
}
