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

//! Gateway shell command system
//!
//! A small command loop that exercises the terminal codec: colors, paging,
//! key polling and emulation switching.

use crate::terminal::{
    Emulation, InputFlags, OutputFlags, PagerOutcome, Terminal, TerminalError,
};
use dialtone_common::Color;
use dialtone_common::markup::{self, MarkupColor};
use flagset::FlagSet;

const PROMPT: &str = "\u{1}11\u{1}dialtone\u{1}-1\u{1}> ";

const COMMANDS: [&str; 10] = [
    "clear", "colors", "exit", "help", "keys", "logout", "page", "quit", "size", "term",
];

/// Shell command result
#[derive(Debug, PartialEq, Eq)]
pub enum ShellResult {
    /// Command executed successfully with output
    Success(String),
    /// Command failed with error message
    Error(String),
    /// Request to quit/disconnect
    Quit,
    /// Continue processing
    Continue,
}

/// Shell command handler
pub struct Shell<'a> {
    terminal: &'a mut Terminal,
}

impl<'a> Shell<'a> {
    /// Create a new shell instance
    pub fn new(terminal: &'a mut Terminal) -> Self {
        Self { terminal }
    }

    /// Read and execute commands until the user quits or the session ends
    pub async fn run(&mut self) -> Result<(), TerminalError> {
        self.banner();
        let flags =
            InputFlags::SingleKeyCommands | InputFlags::Autocomplete | InputFlags::RecallLastLine;

        loop {
            self.terminal.write(PROMPT);
            let Some(line) = self.terminal.input_line_with(flags, &complete_command).await? else {
                continue;
            };

            match self.execute(&line).await? {
                ShellResult::Success(text) => {
                    let outcome = self
                        .terminal
                        .output(&text, FlagSet::<OutputFlags>::default())
                        .await;
                    if outcome == PagerOutcome::Disconnected {
                        return Err(TerminalError::Disconnected);
                    }
                }
                ShellResult::Error(message) => {
                    self.terminal.write_line(&markup::colored(Color::Red, &message));
                }
                ShellResult::Quit => {
                    self.terminal.write_line("Goodbye.");
                    self.terminal.flush().await;
                    return Ok(());
                }
                ShellResult::Continue => {}
            }
        }
    }

    fn banner(&mut self) {
        let emulation = self.terminal.emulation();
        let mut terminal = self.terminal.with_colors(Color::Black, Color::White);
        terminal.newline();
        terminal.write_line("Welcome to Dialtone");
        drop(terminal);
        self.terminal.write_line(&format!(
            "Terminal: {} at {}x{}. Type {} for commands.",
            emulation,
            self.terminal.columns(),
            self.terminal.rows(),
            markup::colored(Color::Yellow, "help")
        ));
    }

    /// Execute a command
    pub async fn execute(&mut self, input: &str) -> Result<ShellResult, TerminalError> {
        let input = input.trim();

        if input.is_empty() {
            return Ok(ShellResult::Continue);
        }

        let parts: Vec<&str> = input.split_whitespace().collect();
        let command = parts[0].to_lowercase();
        let args = &parts[1..];

        let result = match command.as_str() {
            "help" | "?" => self.cmd_help(),
            "clear" => self.cmd_clear(),
            "colors" => self.cmd_colors(),
            "page" => self.cmd_page(args).await,
            "keys" => self.cmd_keys().await?,
            "term" => self.cmd_term(args),
            "size" => self.cmd_size(args),
            "quit" | "exit" | "logout" => ShellResult::Quit,
            _ => ShellResult::Error(format!(
                "Unknown command: {}. Type 'help' for available commands.",
                command
            )),
        };
        Ok(result)
    }

    /// Help command - show available commands
    fn cmd_help(&self) -> ShellResult {
        let help_text = r#"
=== Dialtone Commands ===

  help, ?            - Show this help message
  clear              - Clear the screen
  colors             - Show the color palette
  page [percent]     - Read the bulletin, optionally starting part way in
  keys               - Echo keys as they are pressed, q to stop
  term [emulation]   - Show or change the terminal emulation
  size [cols rows]   - Show or change the screen size
  quit, exit         - Disconnect
"#;
        ShellResult::Success(help_text.to_string())
    }

    fn cmd_clear(&mut self) -> ShellResult {
        self.terminal.clear_screen();
        ShellResult::Continue
    }

    /// Colors command - one line per palette entry
    fn cmd_colors(&mut self) -> ShellResult {
        for color in Color::ALL {
            let background = match color {
                Color::Black => Color::Gray,
                _ => Color::Black,
            };
            let mut terminal = self.terminal.with_colors(background, color);
            terminal.write(&format!("{:>2} {:<12}", color.code(), color.name()));
            drop(terminal);
            self.terminal.newline();
        }
        let sample = format!(
            "Inline: {}red{} {}green{} {}",
            markup::color_marker(Color::Red),
            markup::color_marker(MarkupColor::Current),
            markup::color_marker(Color::Green),
            markup::color_marker(MarkupColor::Current),
            markup::reverse("reverse")
        );
        self.terminal.write_line(&sample);
        ShellResult::Continue
    }

    /// Page command - the bulletin, with paging and search
    async fn cmd_page(&mut self, args: &[&str]) -> ShellResult {
        let text = bulletin();
        let outcome = match args.first() {
            Some(percent) => match percent.trim_end_matches('%').parse::<u8>() {
                Ok(percent) if percent <= 100 => {
                    self.terminal
                        .output_from(&text, OutputFlags::PauseAtEnd, percent)
                        .await
                }
                _ => return ShellResult::Error("Usage: page [0-100]".to_string()),
            },
            None => self.terminal.output(&text, OutputFlags::PauseAtEnd).await,
        };
        tracing::debug!(?outcome, "Bulletin paging finished");
        ShellResult::Continue
    }

    /// Keys command - poll keys in the background and echo them
    async fn cmd_keys(&mut self) -> Result<ShellResult, TerminalError> {
        self.terminal.write_line("Press keys to see their codes, q to stop.");
        self.terminal.start_polling();

        if let Some(mut keys) = self.terminal.key_watch() {
            tokio::spawn(async move {
                while keys.changed().await.is_ok() {
                    let key = keys.borrow_and_update().clone();
                    tracing::trace!(key = ?key.key, tick = key.tick, "Key observed");
                }
            });
        }

        let result = loop {
            let key = match self.terminal.input_key().await {
                Ok(key) => key,
                Err(e) => break Err(e),
            };
            if key.eq_ignore_ascii_case(&'q') {
                break Ok(ShellResult::Continue);
            }
            self.terminal.write_line(&format!("key {:?} (U+{:04X})", key, u32::from(key)));
            self.terminal.flush().await;
        };

        self.terminal.abort_polling().await;
        result
    }

    /// Term command - show or change the emulation
    fn cmd_term(&mut self, args: &[&str]) -> ShellResult {
        let Some(name) = args.first() else {
            let names: Vec<&str> = Emulation::ALL.iter().map(|e| e.name()).collect();
            return ShellResult::Success(format!(
                "Terminal emulation is {}. Available: {}",
                self.terminal.emulation(),
                names.join(", ")
            ));
        };
        match name.parse::<Emulation>() {
            Ok(emulation) => {
                self.terminal.set_emulation(emulation);
                tracing::info!(%emulation, "Emulation changed by user");
                ShellResult::Success(format!("Terminal emulation set to {}.", emulation))
            }
            Err(e) => ShellResult::Error(e),
        }
    }

    /// Size command - show or change the screen size
    fn cmd_size(&mut self, args: &[&str]) -> ShellResult {
        match args {
            [] => ShellResult::Success(format!(
                "Screen is {} columns by {} rows.",
                self.terminal.columns(),
                self.terminal.rows()
            )),
            [columns, rows] => match (columns.parse::<u16>(), rows.parse::<u16>()) {
                (Ok(columns), Ok(rows)) if columns > 0 && rows > 0 => {
                    self.terminal.set_size(columns, rows);
                    ShellResult::Success(format!(
                        "Screen set to {} columns by {} rows.",
                        columns, rows
                    ))
                }
                _ => ShellResult::Error("Usage: size <columns> <rows>".to_string()),
            },
            _ => ShellResult::Error("Usage: size <columns> <rows>".to_string()),
        }
    }
}

/// Complete a command name from a unique prefix
pub fn complete_command(input: &str) -> Option<String> {
    let prefix = input.trim_start().to_lowercase();
    if prefix.is_empty() || prefix.contains(' ') {
        return None;
    }
    let mut matches = COMMANDS.iter().filter(|command| command.starts_with(&prefix));
    match (matches.next(), matches.next()) {
        (Some(command), None) => Some(command.to_string()),
        _ => None,
    }
}

/// The system bulletin shown by `page`
pub fn bulletin() -> String {
    let heading = |text: &str| markup::colored(Color::Cyan, text);
    let mut text = String::new();

    text.push_str(&heading("=== Dialtone System Bulletin ==="));
    text.push_str("\n\n");
    text.push_str(
        "Welcome, caller. This board answers on a single line, so please keep your \
         sessions short during the evening rush and log off when you are done. Idle \
         callers are disconnected automatically.\n\n",
    );
    text.push_str(&heading("--- House Rules ---"));
    text.push('\n');
    let rules = [
        "Be courteous to other callers and to the sysop.",
        "No pirated software in the file areas.",
        "Use real words in message subjects.",
        "Keep ANSI art in the art board.",
        "Do not flood the chat with repeated lines.",
        "One account per person.",
        "Report broken downloads to the sysop.",
        "Upload at least one file for every ten you download.",
    ];
    for (number, rule) in rules.iter().enumerate() {
        text.push_str(&format!("{:>3}. {}\n", number + 1, rule));
    }
    text.push('\n');
    text.push_str(&heading("--- Message Boards ---"));
    text.push('\n');
    let boards = [
        ("General", "Anything goes, within the house rules"),
        ("Retro", "Commodore, Atari and other 8-bit machines"),
        ("Networking", "Modems, telnet and packet radio"),
        ("Games", "Door games, high scores and strategy"),
        ("Art", "ANSI, PETSCII and ATASCII artwork"),
        ("Trading", "Buy, sell and swap hardware"),
        ("Sysop", "Questions and feedback for the sysop"),
    ];
    for (name, description) in boards {
        text.push_str(&format!(
            "  {}{:<12}{} {}\n",
            markup::color_marker(Color::Yellow),
            name,
            markup::color_marker(MarkupColor::Current),
            description
        ));
    }
    text.push('\n');
    text.push_str(&heading("--- Recent News ---"));
    text.push('\n');
    for week in 1..=30 {
        text.push_str(&format!(
            "Week {:>2}: The file areas were reindexed and {} new uploads were added. \
             Thanks to everyone who contributed this week.\n",
            week,
            week * 3 + 4
        ));
    }
    text.push('\n');
    text.push_str(&markup::reverse(" End of bulletin. Type help for commands. "));
    text
}
