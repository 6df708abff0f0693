use async_trait::async_trait;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use futures::StreamExt;
use std::io::Write;
use std::time::Duration;
use tracing::warn;

use crate::replicate::report::ExecutionReport;
use crate::workflow::{Confirm, Confirmation};

/// Single-keypress approval on the controlling terminal.
pub struct TerminalConfirmation;

#[async_trait]
impl Confirm for TerminalConfirmation {
    async fn await_confirmation(&self, preview: &ExecutionReport, timeout: Duration) -> Confirmation {
        println!("{preview}");
        print!(
            "{} issues would be created. Execute? [y/o = yes, n/x = no] ({}s) ",
            preview.planned(),
            timeout.as_secs()
        );
        let _ = std::io::stdout().flush();

        let _raw = match RawMode::enable() {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "no interactive terminal; pass --yes to execute without confirmation");
                println!();
                return Confirmation::No;
            }
        };
        let answer = tokio::time::timeout(timeout, read_answer())
            .await
            .unwrap_or(Confirmation::TimedOut);
        println!();
        answer
    }
}

/// Restores cooked mode on drop, including when the caller's timeout cancels us.
struct RawMode;

impl RawMode {
    fn enable() -> std::io::Result<Self> {
        enable_raw_mode()?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

async fn read_answer() -> Confirmation {
    let mut reader = EventStream::new();
    while let Some(event) = reader.next().await {
        match event {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                if let Some(answer) = key_to_answer(key) {
                    return answer;
                }
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
    Confirmation::No
}

fn key_to_answer(key: KeyEvent) -> Option<Confirmation> {
    // Ctrl+C in raw mode never reaches the signal handler
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Confirmation::No);
    }
    match key.code {
        KeyCode::Char('y' | 'Y' | 'o' | 'O') => Some(Confirmation::Yes),
        KeyCode::Char('n' | 'N' | 'x' | 'X') | KeyCode::Esc => Some(Confirmation::No),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn yes_and_no_keys() {
        assert_eq!(key_to_answer(key(KeyCode::Char('y'))), Some(Confirmation::Yes));
        assert_eq!(key_to_answer(key(KeyCode::Char('o'))), Some(Confirmation::Yes));
        assert_eq!(key_to_answer(key(KeyCode::Char('x'))), Some(Confirmation::No));
        assert_eq!(key_to_answer(key(KeyCode::Esc)), Some(Confirmation::No));
    }

    #[test]
    fn other_keys_keep_waiting() {
        assert_eq!(key_to_answer(key(KeyCode::Char('q'))), None);
        assert_eq!(key_to_answer(key(KeyCode::Enter)), None);
    }

    #[test]
    fn ctrl_c_cancels() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(key_to_answer(ctrl_c), Some(Confirmation::No));
    }
}
