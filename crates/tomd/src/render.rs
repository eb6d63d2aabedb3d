//! Console rendering of engine events and parsing of stdin commands

use tom_core::{EngineEvent, ProgressEvent, SessionKind, StateChangeEvent, TransitionCause};
use tom_util::{format_clock_time, format_countdown};

/// Commands accepted on stdin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Advance,
    Status,
    Quit,
    Help,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        match line.trim().to_ascii_lowercase().as_str() {
            "" | "a" | "advance" | "skip" | "n" | "next" => Command::Advance,
            "s" | "status" => Command::Status,
            "q" | "quit" | "exit" => Command::Quit,
            "h" | "help" | "?" => Command::Help,
            other => Command::Unknown(other.to_string()),
        }
    }
}

pub const HELP: &str = "commands: [enter]/advance/skip, status, quit, help";

/// Greeting shown when a work session begins, by rounds already completed
pub fn work_message(round_counter: u32) -> &'static str {
    match round_counter {
        0 => "First session of the cycle. Pick one task and start.",
        1 => "Second session. Keep the momentum going.",
        2 => "Halfway there. Stay on it.",
        _ => "Last stretch before the long break.",
    }
}

pub fn describe_state(kind: SessionKind, round_counter: u32) -> String {
    match kind {
        SessionKind::Ready => "ready (advance to start a session)".to_string(),
        SessionKind::Working => format!("working, round {}", round_counter + 1),
        SessionKind::ShortBreak => format!("short break after {round_counter} round(s)"),
        SessionKind::LongBreak => format!("long break after {round_counter} round(s)"),
    }
}

/// Turns events into console lines.
///
/// Progress is throttled to one line per displayed minute.
#[derive(Debug, Default)]
pub struct TextRenderer {
    last_progress: Option<(SessionKind, u32, u64)>,
}

impl TextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, event: &EngineEvent) -> Option<String> {
        match event {
            EngineEvent::SessionStarted { at } => {
                Some(format!("[{}] session started", format_clock_time(at)))
            }
            EngineEvent::StateChanged(change) => {
                self.last_progress = None;
                Some(render_state_change(change))
            }
            EngineEvent::Progress(progress) => self.render_progress(progress),
            EngineEvent::Faulted { message } => Some(format!("engine fault: {message}")),
        }
    }

    fn render_progress(&mut self, progress: &ProgressEvent) -> Option<String> {
        let minute = progress.remaining.as_secs().div_ceil(60);
        let key = (progress.kind, progress.round_counter, minute);
        if self.last_progress == Some(key) {
            return None;
        }
        self.last_progress = Some(key);
        Some(format!(
            "  {} {} left ({:.0}%)",
            progress.kind,
            format_countdown(progress.remaining),
            progress.ratio() * 100.0
        ))
    }
}

fn render_state_change(change: &StateChangeEvent) -> String {
    let how = match change.cause {
        TransitionCause::Completed => "",
        TransitionCause::Advanced => " (skipped ahead)",
    };
    let mut line = format!(
        "[{}] {}{}",
        format_clock_time(&change.at),
        describe_state(change.kind, change.round_counter),
        how
    );
    if change.kind == SessionKind::Working {
        line.push_str("\n  ");
        line.push_str(work_message(change.round_counter));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn progress(remaining_secs: u64) -> EngineEvent {
        let total = Duration::from_secs(25 * 60);
        EngineEvent::Progress(ProgressEvent::new(
            SessionKind::Working,
            0,
            total - Duration::from_secs(remaining_secs),
            total,
        ))
    }

    #[test]
    fn parse_commands() {
        assert_eq!(Command::parse(""), Command::Advance);
        assert_eq!(Command::parse("  Skip \n"), Command::Advance);
        assert_eq!(Command::parse("status"), Command::Status);
        assert_eq!(Command::parse("q"), Command::Quit);
        assert_eq!(Command::parse("?"), Command::Help);
        assert_eq!(Command::parse("pause"), Command::Unknown("pause".into()));
    }

    #[test]
    fn progress_throttled_per_minute() {
        let mut renderer = TextRenderer::new();
        assert!(renderer.render(&progress(25 * 60)).is_some());
        // Still shows 25 minutes
        assert!(renderer.render(&progress(24 * 60 + 30)).is_none());
        assert!(renderer.render(&progress(24 * 60 + 1)).is_none());
        assert!(renderer.render(&progress(24 * 60)).is_some());
        assert!(renderer.render(&progress(23 * 60 + 59)).is_none());
        assert!(renderer.render(&progress(23 * 60)).is_some());
    }

    #[test]
    fn state_change_resets_throttle_and_greets_work() {
        let mut renderer = TextRenderer::new();
        renderer.render(&progress(60));

        let line = renderer
            .render(&EngineEvent::StateChanged(StateChangeEvent {
                kind: SessionKind::Working,
                round_counter: 2,
                cause: TransitionCause::Advanced,
                at: tom_util::now(),
            }))
            .unwrap();
        assert!(line.contains("working, round 3 (skipped ahead)"));
        assert!(line.contains(work_message(2)));

        assert!(renderer.render(&progress(60)).is_some());
    }

    #[test]
    fn work_messages_saturate() {
        assert_eq!(work_message(3), work_message(7));
        assert_ne!(work_message(0), work_message(1));
    }
}
