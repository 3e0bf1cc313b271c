//! Per-field input history, navigated with the up and down arrow keys.
//!
//! Slot 0 is reserved for the line currently being edited: the first upward
//! step snapshots the live edit there, and stepping all the way back down
//! restores it. Indices 1.. hold past submissions, most recent first.

pub(crate) struct HistoryBuffer {
    entries: Vec<String>,
    /// 0 while not browsing, otherwise an index into `entries`.
    pointer: usize,
    /// Navigation is a no-op until the past entries have arrived.
    loaded: bool,
}

impl HistoryBuffer {
    pub(crate) fn new() -> Self {
        Self {
            entries: vec![String::new()],
            pointer: 0,
            loaded: false,
        }
    }

    /// A buffer whose past entries are already known, most recent first.
    pub(crate) fn from_entries(past: Vec<String>) -> Self {
        let mut buffer = Self::new();
        buffer.replace_entries(past);
        buffer
    }

    /// Installs the past entries fetched from the server, most recent
    /// first. The live edit in slot 0 is preserved.
    pub(crate) fn replace_entries(&mut self, past: Vec<String>) {
        let live = std::mem::take(&mut self.entries[0]);
        self.entries = std::iter::once(live).chain(past).collect();
        self.loaded = true;
        if self.pointer >= self.entries.len() {
            self.pointer = 0;
        }
    }

    /// Records a successfully submitted line as the most recent entry and
    /// leaves browsing mode.
    pub(crate) fn record_submission(&mut self, text: String) {
        self.entries.insert(1, text);
        self.pointer = 0;
    }

    /// Steps to an older entry. The first step away from the live edit
    /// snapshots `current` into slot 0. At the oldest entry this is a no-op.
    pub(crate) fn move_up(&mut self, current: &str) -> Option<&str> {
        if !self.loaded {
            return None;
        }
        if self.pointer == 0 {
            self.entries[0] = current.to_owned();
        }
        if self.pointer + 1 >= self.entries.len() {
            return None;
        }
        self.pointer += 1;
        Some(&self.entries[self.pointer])
    }

    /// Steps to a newer entry; reaching slot 0 restores the live edit.
    pub(crate) fn move_down(&mut self) -> Option<&str> {
        if self.pointer == 0 {
            return None;
        }
        self.pointer -= 1;
        Some(&self.entries[self.pointer])
    }

    /// Called when the user picks a past line directly from a listing,
    /// bypassing up/down navigation: snapshots the live edit if not already
    /// browsing and moves the pointer to the picked entry so that
    /// subsequent downward steps walk back toward the live edit.
    pub(crate) fn capture_before_overwrite(&mut self, current: &str, index: usize) {
        if self.pointer == 0 {
            self.entries[0] = current.to_owned();
        }
        self.pointer = index.min(self.entries.len() - 1);
    }

    /// Any non-navigation keystroke leaves browsing mode. Slot 0 keeps
    /// whatever snapshot it holds; the next upward step overwrites it.
    pub(crate) fn reset_navigation(&mut self) {
        self.pointer = 0;
    }

    #[cfg(test)]
    fn live_edit(&self) -> &str {
        &self.entries[0]
    }

    #[cfg(test)]
    fn pointer(&self) -> usize {
        self.pointer
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::HistoryBuffer;

    fn loaded(past: &[&str]) -> HistoryBuffer {
        HistoryBuffer::from_entries(past.iter().map(|e| String::from(*e)).collect())
    }

    #[test]
    fn navigation_is_gated_until_loaded() {
        let mut buffer = HistoryBuffer::new();
        assert_eq!(buffer.move_up("typing"), None);
        assert_eq!(buffer.move_down(), None);
        buffer.replace_entries(vec![String::from("old")]);
        assert_eq!(buffer.move_up("typing"), Some("old"));
    }

    #[test]
    fn first_move_up_snapshots_the_live_edit() {
        let mut buffer = loaded(&["newest", "older"]);
        assert_eq!(buffer.move_up("half-typed"), Some("newest"));
        assert_eq!(buffer.move_up("newest"), Some("older"));
        assert_eq!(buffer.move_down(), Some("newest"));
        assert_eq!(buffer.move_down(), Some("half-typed"));
        assert_eq!(buffer.pointer(), 0);
    }

    #[test]
    fn move_up_stops_at_the_oldest_entry() {
        let mut buffer = loaded(&["only"]);
        assert_eq!(buffer.move_up("live"), Some("only"));
        assert_eq!(buffer.move_up("only"), None);
        assert_eq!(buffer.pointer(), 1);
    }

    #[test]
    fn move_up_with_no_past_entries_still_snapshots() {
        let mut buffer = loaded(&[]);
        assert_eq!(buffer.move_up("live"), None);
        assert_eq!(buffer.pointer(), 0);
        assert_eq!(buffer.live_edit(), "live");
    }

    #[test]
    fn move_down_from_live_edit_is_a_no_op() {
        let mut buffer = loaded(&["a", "b"]);
        assert_eq!(buffer.move_down(), None);
    }

    #[test]
    fn record_submission_becomes_the_most_recent_entry() {
        let mut buffer = loaded(&["old"]);
        buffer.record_submission(String::from("new"));
        assert_eq!(buffer.move_up(""), Some("new"));
        assert_eq!(buffer.move_up("new"), Some("old"));
    }

    #[test]
    fn picking_a_listing_line_keeps_the_downward_order() {
        let mut buffer = loaded(&["newest", "middle", "oldest"]);
        buffer.capture_before_overwrite("live", 2);
        assert_eq!(buffer.move_down(), Some("newest"));
        assert_eq!(buffer.move_down(), Some("live"));
    }

    #[test]
    fn picking_while_browsing_keeps_the_earlier_snapshot() {
        let mut buffer = loaded(&["newest", "oldest"]);
        assert_eq!(buffer.move_up("first"), Some("newest"));
        buffer.capture_before_overwrite("newest", 2);
        assert_eq!(buffer.move_down(), Some("newest"));
        assert_eq!(buffer.move_down(), Some("first"));
    }

    #[test]
    fn reset_leaves_the_stale_snapshot_in_slot_zero() {
        // Matches the observed behavior: the pointer resets on any other
        // keystroke but slot 0 keeps the last snapshot until the next
        // upward step overwrites it.
        let mut buffer = loaded(&["past"]);
        buffer.move_up("snapshot");
        buffer.reset_navigation();
        assert_eq!(buffer.pointer(), 0);
        assert_eq!(buffer.live_edit(), "snapshot");
        assert_eq!(buffer.move_down(), None);
    }

    #[test]
    fn replacing_entries_preserves_the_live_edit_and_pointer() {
        let mut buffer = loaded(&["a", "b", "c"]);
        buffer.move_up("kept");
        buffer.replace_entries(vec![String::from("x")]);
        // An in-bounds pointer survives the reload; browsing continues
        // against the new list.
        assert_eq!(buffer.pointer(), 1);
        assert_eq!(buffer.live_edit(), "kept");
        assert_eq!(buffer.move_down(), Some("kept"));
        assert_eq!(buffer.move_up("kept"), Some("x"));
    }

    #[test]
    fn replacing_with_fewer_entries_reins_in_the_pointer() {
        let mut buffer = loaded(&["a", "b", "c"]);
        buffer.move_up("live");
        buffer.move_up("a");
        buffer.move_up("b");
        buffer.replace_entries(vec![String::from("x")]);
        assert_eq!(buffer.pointer(), 0);
        assert_eq!(buffer.move_up("typed"), Some("x"));
    }

    proptest! {
        #[test]
        fn pointer_stays_in_bounds(
            past in proptest::collection::vec("[a-z]{0,8}", 0..8),
            steps in proptest::collection::vec(any::<bool>(), 0..64),
        ) {
            let mut buffer = HistoryBuffer::from_entries(past);
            for up in steps {
                if up {
                    buffer.move_up("live");
                } else {
                    buffer.move_down();
                }
                prop_assert!(buffer.pointer() < buffer.len());
            }
        }

        #[test]
        fn walking_down_restores_the_first_snapshot(
            past in proptest::collection::vec("[a-z]{0,8}", 1..8),
            ups in 1usize..16,
        ) {
            let mut buffer = HistoryBuffer::from_entries(past);
            buffer.move_up("snapshot");
            for _ in 1..ups {
                buffer.move_up("whatever");
            }
            let mut last = None;
            while let Some(entry) = buffer.move_down() {
                last = Some(entry.to_owned());
            }
            prop_assert_eq!(last.as_deref(), Some("snapshot"));
        }
    }
}
