//! User-facing notifications. Displaying them is up to the shell; every
//! notice is also written to the log.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use log::{error, info, warn};

cfg_if::cfg_if! {
    if #[cfg(target_arch = "wasm32")] {
        pub use web_time::Instant;
    } else {
        pub use std::time::Instant;
    }
}

/// How long a notice stays on display unless a newer one replaces it.
pub const NOTICE_DURATION: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        write!(f, "[{tag}] {}", self.message)
    }
}

/// Pending notices, oldest first.
#[derive(Debug, Default)]
pub struct Notices {
    queue: VecDeque<Notice>,
}

impl Notices {
    pub fn push(&mut self, level: NoticeLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            NoticeLevel::Success => info!("{message}"),
            NoticeLevel::Warning => warn!("{message}"),
            NoticeLevel::Error => error!("{message}"),
        }
        self.queue.push_back(Notice { level, message });
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(NoticeLevel::Success, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(NoticeLevel::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(NoticeLevel::Error, message);
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn latest(&self) -> Option<&Notice> {
        self.queue.back()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Notice> + '_ {
        self.queue.drain(..)
    }
}

/// The notice on display and when it went up.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    shown: Option<(Notice, Instant)>,
}

impl NoticeBoard {
    /// Show the newest of `notices`, if any, from `now`.
    pub fn post(&mut self, notices: impl IntoIterator<Item = Notice>, now: Instant) {
        if let Some(notice) = notices.into_iter().last() {
            self.shown = Some((notice, now));
        }
    }

    pub fn current(&self, now: Instant) -> Option<&Notice> {
        self.shown
            .as_ref()
            .filter(|(_, since)| now.saturating_duration_since(*since) < NOTICE_DURATION)
            .map(|(notice, _)| notice)
    }
}

/// `<app> - <status>`, followed by the notice on display.
pub fn window_title(app: &str, status: &str, notice: Option<&Notice>) -> String {
    match notice {
        Some(notice) => format!("{app} - {status} - {}", notice.message),
        None => format!("{app} - {status}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_order() {
        let mut notices = Notices::default();
        notices.success("saved");
        notices.warning("nothing to copy");
        notices.error("failed");
        assert_eq!(notices.latest().map(|n| n.level), Some(NoticeLevel::Error));

        let drained: Vec<_> = notices.drain().map(|n| n.to_string()).collect();
        assert_eq!(drained, ["[ok] saved", "[warning] nothing to copy", "[error] failed"]);
        assert!(notices.is_empty());
    }

    #[test]
    fn board_keeps_notice_until_it_expires() {
        let start = Instant::now();
        let mut board = NoticeBoard::default();
        let mut notices = Notices::default();
        notices.warning("OCR is already processing");
        board.post(notices.drain(), start);

        // Later frames with nothing new keep the notice up.
        board.post(notices.drain(), start + Duration::from_millis(16));
        let shown = board.current(start + Duration::from_secs(2)).map(|n| n.message.as_str());
        assert_eq!(shown, Some("OCR is already processing"));
        assert!(board.current(start + NOTICE_DURATION).is_none());
    }

    #[test]
    fn newer_notice_replaces_shown_one() {
        let start = Instant::now();
        let mut board = NoticeBoard::default();
        let mut notices = Notices::default();
        notices.error("Failed to load image: bad header");
        board.post(notices.drain(), start);

        let later = start + Duration::from_secs(2);
        notices.success("Undo");
        notices.success("Redo");
        board.post(notices.drain(), later);
        let shown = board.current(later + Duration::from_secs(2)).map(|n| n.message.as_str());
        assert_eq!(shown, Some("Redo"));
    }

    #[test]
    fn title_includes_notice_when_shown() {
        let notice = Notice { level: NoticeLevel::Error, message: "No text to copy".into() };
        assert_eq!(window_title("OCR Canvas", "Brush 8 px", None), "OCR Canvas - Brush 8 px");
        assert_eq!(
            window_title("OCR Canvas", "Brush 8 px", Some(&notice)),
            "OCR Canvas - Brush 8 px - No text to copy"
        );
    }
}
