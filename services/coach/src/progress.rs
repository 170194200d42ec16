//! services/coach/src/progress.rs
//!
//! Incremental terminal output for a running feedback session.

use photo_coach_core::FeedbackState;
use std::io::Write;
use tokio::sync::watch;

/// Writes each new piece of text as the session state advances.
///
/// `printed` is the text already on screen when the receiver was subscribed.
/// Returns the writer once the turn completes or the session is dropped.
pub async fn print_progress<W: Write>(
    mut states: watch::Receiver<FeedbackState>,
    mut printed: String,
    mut out: W,
) -> W {
    while states.changed().await.is_ok() {
        let state = states.borrow_and_update().clone();
        let text = match &state {
            FeedbackState::Streaming(text) | FeedbackState::Complete(text) => text.as_str(),
            FeedbackState::Error(_) | FeedbackState::Idle | FeedbackState::Loading => continue,
        };

        match text.strip_prefix(printed.as_str()) {
            Some(suffix) => {
                let _ = write!(out, "{}", suffix);
            }
            None => {
                let _ = write!(out, "\n{}", text);
            }
        }
        let _ = out.flush();
        printed = text.to_string();

        if state.is_complete() {
            let _ = writeln!(out);
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(buffer: Vec<u8>) -> String {
        String::from_utf8(buffer).unwrap()
    }

    #[tokio::test]
    async fn turn_finished_before_first_poll_is_still_printed() {
        let (sender, states) = watch::channel(FeedbackState::Idle);
        sender.send_replace(FeedbackState::Loading);
        sender.send_replace(FeedbackState::Streaming("Nice".into()));
        sender.send_replace(FeedbackState::Complete("Nice light.".into()));
        drop(sender);

        let out = print_progress(states, String::new(), Vec::new()).await;
        assert_eq!(output(out), "Nice light.\n");
    }

    #[tokio::test]
    async fn followup_prints_only_the_new_part() {
        let (sender, states) = watch::channel(FeedbackState::Complete("Prior.".into()));
        let printer = tokio::spawn(print_progress(states, "Prior.".into(), Vec::new()));

        sender.send_replace(FeedbackState::Streaming("Prior.\n\n---\n\n**Q:** Why?\n\nBe".into()));
        tokio::task::yield_now().await;
        sender.send_replace(FeedbackState::Complete(
            "Prior.\n\n---\n\n**Q:** Why?\n\nBecause.".into(),
        ));
        drop(sender);

        let out = printer.await.unwrap();
        assert_eq!(output(out), "\n\n---\n\n**Q:** Why?\n\nBecause.\n");
    }

    #[tokio::test]
    async fn error_only_turn_prints_nothing() {
        let (sender, states) = watch::channel(FeedbackState::Idle);
        sender.send_replace(FeedbackState::Error("Invalid response from API.".into()));
        drop(sender);

        let out = print_progress(states, String::new(), Vec::new()).await;
        assert_eq!(output(out), "");
    }
}
