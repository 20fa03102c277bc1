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

//! End-to-end terminal behavior over an in-memory duplex pipe

use dialtone_common::{Color, SessionContext};
use dialtone_gateway::session::Session;
use dialtone_gateway::terminal::{
    Emulation, InputFlags, OutputFlags, PagerOutcome, Terminal, TerminalError,
};
use flagset::FlagSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};
use tokio::sync::mpsc;

fn connect(emulation: Emulation) -> (Terminal, DuplexStream, Arc<Session>) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let (client, server) = duplex(256 * 1024);
    let (reader, writer) = tokio::io::split(server);
    let session = Arc::new(Session::new("127.0.0.1:50000"));
    let terminal = Terminal::new(emulation, reader, writer, session.clone());
    (terminal, client, session)
}

/// Drop the terminal and collect everything it sent
async fn received(terminal: Terminal, mut client: DuplexStream) -> String {
    drop(terminal);
    let mut output = Vec::new();
    client.read_to_end(&mut output).await.unwrap();
    String::from_utf8_lossy(&output).into_owned()
}

fn numbered_lines(count: usize) -> String {
    (0..count)
        .map(|i| format!("line {:03}\n", i))
        .collect()
}

fn no_flags() -> FlagSet<InputFlags> {
    FlagSet::default()
}

#[tokio::test]
async fn test_hundred_characters_wrap_to_two_lines_with_one_prompt() {
    let (mut terminal, mut client, _session) = connect(Emulation::Ascii);
    client.write_all(b"y").await.unwrap();

    let text = "x".repeat(100);
    let outcome = terminal.output(&text, OutputFlags::PauseAtEnd).await;
    assert_eq!(outcome, PagerOutcome::Completed);

    let output = received(terminal, client).await;
    assert_eq!(output.matches("-- More (").count(), 1);
    let expected = format!("{}\r\n{}\r\n-- End --\r\n", "x".repeat(79), "x".repeat(21));
    assert!(output.starts_with(&expected), "unexpected output: {:?}", output);
}

#[tokio::test]
async fn test_short_text_streams_without_prompt() {
    let (mut terminal, client, _session) = connect(Emulation::Ascii);
    let outcome = terminal.output("hello", FlagSet::<OutputFlags>::default()).await;
    assert_eq!(outcome, PagerOutcome::Completed);
    assert_eq!(received(terminal, client).await, "hello");
}

#[tokio::test]
async fn test_output_line_ends_with_newline() {
    let (mut terminal, client, _session) = connect(Emulation::Ascii);
    let outcome = terminal.output_line("hello", FlagSet::<OutputFlags>::default()).await;
    assert_eq!(outcome, PagerOutcome::Completed);
    assert_eq!(received(terminal, client).await, "hello\r\n");
}

#[tokio::test]
async fn test_pager_stops_after_page_rows() {
    let (mut terminal, mut client, _session) = connect(Emulation::Ascii);
    client.write_all(b"n").await.unwrap();

    let outcome = terminal.output(&numbered_lines(60), FlagSet::<OutputFlags>::default()).await;
    assert_eq!(outcome, PagerOutcome::Aborted);

    let output = received(terminal, client).await;
    assert!(output.contains("line 020"));
    assert!(!output.contains("line 021"));
    assert_eq!(output.matches("-- More (").count(), 1);
}

#[tokio::test]
async fn test_pager_resumes_at_next_line() {
    let (mut terminal, mut client, _session) = connect(Emulation::Ascii);
    client.write_all(b"yn").await.unwrap();

    let outcome = terminal.output(&numbered_lines(60), FlagSet::<OutputFlags>::default()).await;
    assert_eq!(outcome, PagerOutcome::Aborted);

    let output = received(terminal, client).await;
    for i in 0..42 {
        assert_eq!(output.matches(&format!("line {:03}", i)).count(), 1, "line {}", i);
    }
    assert!(!output.contains("line 042"));
}

#[tokio::test]
async fn test_pager_continuous_shows_everything() {
    let (mut terminal, mut client, _session) = connect(Emulation::Ascii);
    client.write_all(b"c").await.unwrap();

    let outcome = terminal.output(&numbered_lines(60), FlagSet::<OutputFlags>::default()).await;
    assert_eq!(outcome, PagerOutcome::Completed);

    let output = received(terminal, client).await;
    assert!(output.contains("line 059"));
    assert_eq!(output.matches("-- More (").count(), 1);
}

#[tokio::test]
async fn test_no_pause_never_prompts() {
    let (mut terminal, client, _session) = connect(Emulation::Ascii);
    let outcome = terminal.output(&numbered_lines(60), OutputFlags::NoPause).await;
    assert_eq!(outcome, PagerOutcome::Completed);

    let output = received(terminal, client).await;
    assert!(output.contains("line 059"));
    assert!(!output.contains("-- More"));
}

#[tokio::test]
async fn test_page_up_at_top_restarts_document() {
    let (mut terminal, mut client, _session) = connect(Emulation::Ascii);
    client.write_all(b"uun").await.unwrap();

    let outcome = terminal.output(&numbered_lines(60), FlagSet::<OutputFlags>::default()).await;
    assert_eq!(outcome, PagerOutcome::Aborted);

    let output = received(terminal, client).await;
    assert_eq!(output.matches("line 000").count(), 3);
    assert!(!output.contains("line 021"));
}

#[tokio::test]
async fn test_output_from_percent() {
    let (mut terminal, mut client, _session) = connect(Emulation::Ascii);
    client.write_all(b"n").await.unwrap();

    let outcome = terminal
        .output_from(&numbered_lines(100), FlagSet::<OutputFlags>::default(), 50)
        .await;
    assert_eq!(outcome, PagerOutcome::Aborted);

    let output = received(terminal, client).await;
    assert!(!output.contains("line 049"));
    assert!(output.contains("line 050"));
}

#[tokio::test]
async fn test_search_resumes_before_match() {
    let (mut terminal, mut client, _session) = connect(Emulation::Ascii);
    client.write_all(b"/NEEDLE\rn").await.unwrap();

    let mut text = numbered_lines(60);
    text = text.replace("line 040", "line 040 needle");
    let outcome = terminal.output(&text, FlagSet::<OutputFlags>::default()).await;
    assert_eq!(outcome, PagerOutcome::Aborted);

    let output = received(terminal, client).await;
    assert!(output.contains("Search for: "));
    assert!(!output.contains("line 021"));
    assert!(!output.contains("line 037"));
    assert!(output.contains("line 038"));
    assert!(output.contains("line 040 needle"));
}

#[tokio::test]
async fn test_search_for_shown_text_reports_no_more() {
    let (mut terminal, mut client, _session) = connect(Emulation::Ascii);
    client.write_all(b"/line 005\rn").await.unwrap();

    let outcome = terminal.output(&numbered_lines(60), FlagSet::<OutputFlags>::default()).await;
    assert_eq!(outcome, PagerOutcome::Aborted);

    let output = received(terminal, client).await;
    assert!(output.contains("No more occurrences of 'line 005'."));
    assert_eq!(output.matches("line 000").count(), 2);
}

#[tokio::test]
async fn test_escape_at_prompt_aborts() {
    let (mut terminal, mut client, _session) = connect(Emulation::Ansi);
    client.write_all(b"\x1b[A").await.unwrap();

    let outcome = terminal.output(&numbered_lines(60), FlagSet::<OutputFlags>::default()).await;
    assert_eq!(outcome, PagerOutcome::Aborted);

    // The rest of the cursor sequence was discarded with the prompt
    client.write_all(b"k").await.unwrap();
    assert_eq!(terminal.input_key().await.unwrap(), 'k');
}

#[tokio::test]
async fn test_ansi_inline_current_color() {
    let (mut terminal, _client, _session) = connect(Emulation::Ansi);
    terminal.set_foreground(Color::Yellow);
    let rendered = terminal.render("Hi \u{1}-1\u{1}World");
    assert_eq!(rendered, b"Hi \x1b[1;33mWorld".to_vec());
}

#[tokio::test]
async fn test_inline_color_restores_foreground() {
    let (mut terminal, client, _session) = connect(Emulation::Ansi);
    terminal.write("\u{1}12\u{1}alert");
    terminal.flush().await;

    let output = received(terminal, client).await;
    assert_eq!(output, "\x1b[1;31malert\x1b[22;37m");
}

#[tokio::test]
async fn test_color_scope_restores_on_drop() {
    let (mut terminal, _client, _session) = connect(Emulation::Ansi);
    {
        let mut scope = terminal.with_colors(Color::Blue, Color::White);
        scope.write("inside");
        assert_eq!(scope.state().foreground, Color::White);
        assert_eq!(scope.state().background, Color::Blue);
    }
    assert_eq!(terminal.state().foreground, Color::Gray);
    assert_eq!(terminal.state().background, Color::Black);
}

#[tokio::test]
async fn test_backspace_on_empty_line_is_silent() {
    let (mut terminal, mut client, _session) = connect(Emulation::Ascii);
    client.write_all(b"\x08\x08a\r").await.unwrap();

    assert_eq!(
        terminal.input_line(no_flags()).await.unwrap(),
        Some("a".to_string())
    );
    assert_eq!(received(terminal, client).await, "a\r\n");
}

#[tokio::test]
async fn test_backspace_erases_last_character() {
    let (mut terminal, mut client, _session) = connect(Emulation::Ascii);
    client.write_all(b"ab\x7fc\r").await.unwrap();

    assert_eq!(
        terminal.input_line(no_flags()).await.unwrap(),
        Some("ac".to_string())
    );
    assert_eq!(received(terminal, client).await, "ab\x08 \x08c\r\n");
}

#[tokio::test]
async fn test_interrupt_cancels_line() {
    let (mut terminal, mut client, _session) = connect(Emulation::Ascii);
    client.write_all(b"partial\x03next\r").await.unwrap();

    assert_eq!(terminal.input_line(no_flags()).await.unwrap(), None);
    assert_eq!(
        terminal.input_line(no_flags()).await.unwrap(),
        Some("next".to_string())
    );
}

#[tokio::test]
async fn test_password_is_masked() {
    let (mut terminal, mut client, _session) = connect(Emulation::Ascii);
    client.write_all(b"secret\r").await.unwrap();

    assert_eq!(
        terminal.input_line(InputFlags::Password).await.unwrap(),
        Some("secret".to_string())
    );
    assert_eq!(terminal.last_line(), None);
    assert_eq!(received(terminal, client).await, "******\r\n");
}

#[tokio::test]
async fn test_recall_last_line() {
    let (mut terminal, mut client, _session) = connect(Emulation::Ansi);
    client.write_all(b"look\r\x1b[A\r").await.unwrap();

    let flags = InputFlags::RecallLastLine;
    assert_eq!(terminal.input_line(flags).await.unwrap(), Some("look".to_string()));
    assert_eq!(terminal.input_line(flags).await.unwrap(), Some("look".to_string()));
}

#[tokio::test]
async fn test_tab_completion() {
    let (mut terminal, mut client, _session) = connect(Emulation::Ascii);
    client.write_all(b"wh\t\r").await.unwrap();

    let complete = |prefix: &str| "whisper".starts_with(prefix).then(|| "whisper".to_string());
    assert_eq!(
        terminal
            .input_line_with(InputFlags::Autocomplete, &complete)
            .await
            .unwrap(),
        Some("whisper".to_string())
    );
}

#[tokio::test]
async fn test_three_escapes_log_out() {
    let (mut terminal, mut client, session) = connect(Emulation::Ascii);
    client.write_all(b"\x1b\x1b\x1b").await.unwrap();

    let result = terminal.input_line(no_flags()).await;
    assert!(matches!(result, Err(TerminalError::LoggedOut)));
    assert!(session.is_logged_out());
}

#[tokio::test]
async fn test_forced_logout_unblocks_read() {
    let (mut terminal, _client, session) = connect(Emulation::Ascii);
    let logout = session.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        logout.force_logout();
    });

    let result = terminal.input_key().await;
    assert!(matches!(result, Err(TerminalError::LoggedOut)));
}

#[tokio::test]
async fn test_input_resets_idle_clock() {
    let (mut terminal, mut client, session) = connect(Emulation::Ascii);
    let before = session.last_activity();
    tokio::time::sleep(Duration::from_millis(5)).await;
    client.write_all(b"k").await.unwrap();

    terminal.input_key().await.unwrap();
    assert!(session.last_activity() > before);
}

#[tokio::test]
async fn test_polling_start_and_abort_are_idempotent() {
    let (mut terminal, mut client, _session) = connect(Emulation::Ascii);

    terminal.start_polling();
    terminal.start_polling();
    assert!(terminal.is_polling());
    assert!(terminal.key_watch().is_some());

    client.write_all(b"k").await.unwrap();
    assert_eq!(terminal.input_key().await.unwrap(), 'k');

    terminal.abort_polling().await;
    terminal.abort_polling().await;
    assert!(!terminal.is_polling());
    assert!(terminal.key_watch().is_none());

    client.write_all(b"z").await.unwrap();
    assert_eq!(terminal.input_key().await.unwrap(), 'z');
}

#[tokio::test]
async fn test_polled_keys_arrive_in_order() {
    let (mut terminal, mut client, _session) = connect(Emulation::Ascii);
    terminal.start_polling();

    for key in [b'a', b'b', b'c'] {
        client.write_all(&[key]).await.unwrap();
        assert_eq!(terminal.input_key().await.unwrap(), char::from(key));
    }
    terminal.abort_polling().await;
}

/// Type each chunk as its own keypress, pausing so the poller sees them apart
fn type_slowly(
    mut client: DuplexStream,
    chunks: &'static [&'static [u8]],
) -> tokio::task::JoinHandle<DuplexStream> {
    tokio::spawn(async move {
        for chunk in chunks {
            tokio::time::sleep(Duration::from_millis(30)).await;
            client.write_all(chunk).await.unwrap();
        }
        client
    })
}

#[tokio::test]
async fn test_cursor_keys_while_polling_do_not_log_out() {
    let (mut terminal, client, session) = connect(Emulation::Ansi);
    terminal.start_polling();

    let typist = type_slowly(
        client,
        &[b"\x1b[A", b"\x1b[A", b"\x1b[A", b"h", b"i", b"\r"],
    );
    let line = terminal.input_line(no_flags()).await.unwrap();
    assert_eq!(line, Some("hi".to_string()));
    assert!(!session.is_logged_out());

    terminal.abort_polling().await;
    drop(typist.await.unwrap());
}

#[tokio::test]
async fn test_recall_while_polling() {
    let (mut terminal, mut client, _session) = connect(Emulation::Ansi);
    client.write_all(b"look\r").await.unwrap();
    let flags = InputFlags::RecallLastLine;
    assert_eq!(terminal.input_line(flags).await.unwrap(), Some("look".to_string()));

    terminal.start_polling();
    let typist = type_slowly(client, &[b"\x1b[A", b"\r"]);
    assert_eq!(terminal.input_line(flags).await.unwrap(), Some("look".to_string()));

    terminal.abort_polling().await;
    drop(typist.await.unwrap());
}

#[tokio::test]
async fn test_key_watch_sees_consumed_keys() {
    let (mut terminal, mut client, _session) = connect(Emulation::Ascii);
    terminal.start_polling();

    let mut keys = terminal.key_watch().unwrap();
    let (observed_tx, mut observed_rx) = mpsc::unbounded_channel();
    let observer = tokio::spawn(async move {
        while keys.changed().await.is_ok() {
            let key = keys.borrow_and_update().clone();
            if observed_tx.send((key.key, key.tick)).is_err() {
                break;
            }
        }
    });

    let mut consumed = Vec::new();
    let mut observed = Vec::new();
    for key in [b'x', b'y', b'z'] {
        client.write_all(&[key]).await.unwrap();
        consumed.push(terminal.input_key().await.unwrap());
        observed.push(observed_rx.recv().await.unwrap());
    }
    terminal.abort_polling().await;
    observer.await.unwrap();

    assert_eq!(consumed, vec!['x', 'y', 'z']);
    let observed_keys: Vec<char> = observed
        .iter()
        .map(|(key, _)| char::from(key.unwrap()))
        .collect();
    assert_eq!(observed_keys, consumed);
    assert!(observed.windows(2).all(|pair| pair[0].1 < pair[1].1));
}

#[tokio::test]
async fn test_abort_polling_after_disconnect() {
    let (mut terminal, client, _session) = connect(Emulation::Ascii);
    terminal.start_polling();
    drop(client);

    assert!(matches!(
        terminal.input_key().await,
        Err(TerminalError::Disconnected)
    ));
    terminal.abort_polling().await;
    assert!(!terminal.is_polling());
    assert!(!terminal.is_connected());
}

#[tokio::test]
async fn test_outgoing_iac_is_doubled() {
    let (mut terminal, client, _session) = connect(Emulation::Atascii);
    terminal.write_bytes(&[0x41, 0xFF, 0x42]);
    terminal.flush().await;

    drop(terminal);
    let mut client = client;
    let mut output = Vec::new();
    client.read_to_end(&mut output).await.unwrap();
    assert_eq!(output, vec![0x41, 0xFF, 0xFF, 0x42]);
}

#[tokio::test]
async fn test_incoming_telnet_commands_are_filtered() {
    let (mut terminal, mut client, _session) = connect(Emulation::Ascii);
    client
        .write_all(&[255, 251, 31, b'q', 255, 250, 31, 0, 132, 0, 50, 255, 240, b'r'])
        .await
        .unwrap();

    assert_eq!(terminal.input_key().await.unwrap(), 'q');
    assert_eq!(terminal.input_key().await.unwrap(), 'r');
    assert_eq!((terminal.columns(), terminal.rows()), (132, 50));
}

#[tokio::test]
async fn test_write_failure_marks_connection_dead() {
    let (mut terminal, client, _session) = connect(Emulation::Ascii);
    drop(client);

    terminal.write_line("anyone there?");
    assert!(!terminal.flush().await);
    assert!(!terminal.is_connected());
    assert_eq!(
        terminal.output(&numbered_lines(60), FlagSet::<OutputFlags>::default()).await,
        PagerOutcome::Disconnected
    );
}

#[tokio::test]
async fn test_petscii_line_input_is_decoded() {
    let (mut terminal, mut client, _session) = connect(Emulation::Petscii);
    // Unshifted PETSCII letters arrive as uppercase codes
    client.write_all(b"HELLO\r").await.unwrap();

    assert_eq!(
        terminal.input_line(no_flags()).await.unwrap(),
        Some("hello".to_string())
    );
}

#[tokio::test]
async fn test_set_emulation_resets_colors() {
    let (mut terminal, _client, _session) = connect(Emulation::Ansi);
    terminal.set_foreground(Color::Red);
    terminal.set_emulation(Emulation::Petscii);
    assert_eq!(terminal.emulation(), Emulation::Petscii);
    assert_eq!(terminal.state().foreground, Color::Gray);
}
