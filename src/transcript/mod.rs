//! Transcript data model and rendering capability.
//!
//! A transcript is the append-only ordered sequence of turns shown to the
//! user. The session client talks to it through the [`TranscriptView`] trait
//! so it carries no dependency on any particular rendering technology; the
//! chat TUI wraps the plain [`Transcript`] model and redraws on mutation.

use chrono::Local;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOrigin {
    /// Typed by the user
    User,
    /// Reply from the assistant backend
    Bot,
    /// Locally generated notice (e.g. history cleared)
    System,
    /// Failure notice, rendered in the error style
    Error,
}

/// One rendered message unit.
///
/// Immutable once appended; removed only by a full history clear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub content: String,
    pub origin: TurnOrigin,
    /// Human-readable local wall clock time at creation
    pub timestamp: String,
}

impl Turn {
    /// Creates a turn stamped with the current local time.
    pub fn new(content: impl Into<String>, origin: TurnOrigin) -> Self {
        Self {
            content: content.into(),
            origin,
            timestamp: Local::now().format("%H:%M:%S").to_string(),
        }
    }
}

/// Identity of a transient entry returned by [`TranscriptView::show_transient`].
///
/// Handles are unique per show call, which is what makes stale removals
/// detectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransientHandle(u64);

/// Rendering capability the session client draws on.
///
/// Implementations must keep the transcript append-only and scrolled to the
/// newest entry. `remove_transient` must tolerate a handle that was already
/// removed or superseded: removal is a no-op in that case, never an error.
pub trait TranscriptView {
    /// Appends a turn at the end of the transcript.
    fn append(&mut self, turn: Turn);

    /// Shows a transient label (the typing indicator) below the transcript.
    ///
    /// Only one transient is displayed at a time; showing a new one replaces
    /// the previous and invalidates its handle.
    fn show_transient(&mut self, label: &str) -> TransientHandle;

    /// Removes a transient previously shown. No-op if the handle is stale.
    fn remove_transient(&mut self, handle: TransientHandle);

    /// Removes all turns and any transient.
    fn clear(&mut self);
}

/// Plain in-memory transcript model.
///
/// Holds the turns and the single optional transient. This is the state the
/// chat TUI renders from, and it implements [`TranscriptView`] directly so
/// tests can exercise the protocol without a terminal.
#[derive(Debug, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
    transient: Option<(TransientHandle, String)>,
    next_handle: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// All turns in arrival order.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The currently displayed transient label, if any.
    pub fn transient_label(&self) -> Option<&str> {
        self.transient.as_ref().map(|(_, label)| label.as_str())
    }
}

impl TranscriptView for Transcript {
    fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    fn show_transient(&mut self, label: &str) -> TransientHandle {
        let handle = TransientHandle(self.next_handle);
        self.next_handle += 1;
        self.transient = Some((handle, label.to_string()));
        handle
    }

    fn remove_transient(&mut self, handle: TransientHandle) {
        // Tolerate stale handles: only remove the transient we were asked about
        if self.transient.as_ref().map(|(h, _)| *h) == Some(handle) {
            self.transient = None;
        }
    }

    fn clear(&mut self) {
        self.turns.clear();
        self.transient = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_arrival_order() {
        let mut transcript = Transcript::new();
        transcript.append(Turn::new("first", TurnOrigin::User));
        transcript.append(Turn::new("second", TurnOrigin::Bot));

        let contents: Vec<&str> = transcript
            .turns()
            .iter()
            .map(|t| t.content.as_str())
            .collect();
        assert_eq!(contents, vec!["first", "second"]);
    }

    #[test]
    fn test_transient_show_and_remove() {
        let mut transcript = Transcript::new();
        let handle = transcript.show_transient("Assistant is typing...");
        assert_eq!(transcript.transient_label(), Some("Assistant is typing..."));

        transcript.remove_transient(handle);
        assert_eq!(transcript.transient_label(), None);
    }

    #[test]
    fn test_stale_transient_removal_is_noop() {
        let mut transcript = Transcript::new();
        let old = transcript.show_transient("first");
        let _new = transcript.show_transient("second");

        // Removing the superseded handle must not clear the current transient
        transcript.remove_transient(old);
        assert_eq!(transcript.transient_label(), Some("second"));

        // Removing twice is equally harmless
        transcript.remove_transient(old);
        assert_eq!(transcript.transient_label(), Some("second"));
    }

    #[test]
    fn test_clear_removes_turns_and_transient() {
        let mut transcript = Transcript::new();
        transcript.append(Turn::new("hello", TurnOrigin::User));
        transcript.show_transient("typing");

        transcript.clear();
        assert!(transcript.turns().is_empty());
        assert_eq!(transcript.transient_label(), None);
    }
}
