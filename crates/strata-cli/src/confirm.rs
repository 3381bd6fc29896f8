//! Interactive confirmation on the terminal.

use std::io::Write;

use strata_core::apply::{ConfirmationRequest, Confirmer, Decision};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

/// Asks `Y/[N]` questions on stderr and reads answers from stdin.
///
/// Ctrl-C while waiting answers [`Decision::Cancel`]; end of input declines.
pub struct StdinConfirmer {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl StdinConfirmer {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }
}

impl Default for StdinConfirmer {
    fn default() -> Self {
        Self::new()
    }
}

/// `y` / `yes` (any case) approves; anything else declines.
pub fn parse_answer(line: &str) -> Decision {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Decision::Approve,
        _ => Decision::Decline,
    }
}

fn prompt_for(request: &ConfirmationRequest) -> String {
    match request {
        ConfirmationRequest::Revision { .. } => format!("{request}\nContinue? Y/[N]: "),
        ConfirmationRequest::Plan { .. } => format!("{request}\nApply revisions? Y/[N]: "),
    }
}

#[async_trait::async_trait]
impl Confirmer for StdinConfirmer {
    async fn confirm(&self, request: &ConfirmationRequest) -> Decision {
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "{}", prompt_for(request));
        let _ = stderr.flush();

        let mut lines = self.lines.lock().await;
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(answer)) => parse_answer(&answer),
                Ok(None) => Decision::Decline,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to read confirmation");
                    Decision::Decline
                }
            },
            _ = tokio::signal::ctrl_c() => {
                let _ = writeln!(stderr);
                Decision::Cancel
            }
        }
    }
}
