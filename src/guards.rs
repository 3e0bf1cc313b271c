//! Named capability flags shared between the page's event handlers.
//!
//! Each operation that must not overlap with input editing owns one flag;
//! independent operations toggle their own flag without disturbing the
//! others. While any flag is set the edit field swallows everything but
//! Tab.

use std::cell::Cell;

#[derive(Default)]
pub(crate) struct UiGuards {
    /// A delete-marked interaction is underway.
    pub(crate) delete_in_progress: Cell<bool>,
    /// The set of "use" checkboxes is being edited (constraints page).
    pub(crate) use_edit_in_progress: Cell<bool>,
    /// A checking request is in flight for this field.
    pub(crate) submit_in_flight: Cell<bool>,
}

impl UiGuards {
    pub(crate) fn any_active(&self) -> bool {
        self.delete_in_progress.get()
            || self.use_edit_in_progress.get()
            || self.submit_in_flight.get()
    }
}

#[cfg(test)]
mod test {
    use super::UiGuards;

    #[test]
    fn flags_are_independent() {
        let guards = UiGuards::default();
        assert!(!guards.any_active());
        guards.delete_in_progress.set(true);
        guards.submit_in_flight.set(true);
        guards.delete_in_progress.set(false);
        assert!(guards.any_active());
        guards.submit_in_flight.set(false);
        assert!(!guards.any_active());
    }
}
