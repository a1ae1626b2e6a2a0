//! Document-view interface consumed by the core.
//!
//! The GUI widget itself is out of scope; the core only needs something
//! that can hold text and a caret and report whether it has unsaved work.

/// What the session drives and queries after every applied operation: set
/// the text to `render()`, set the caret to `caret_from_anchor()`.
pub trait DocumentView: Send {
    fn get_text(&self) -> String;
    fn set_text(&mut self, text: &str);
    fn caret_position(&self) -> usize;
    fn set_caret(&mut self, pos: usize);

    /// True if the view holds local edits the user has not saved. Consulted
    /// before a snapshot load would discard them.
    fn is_dirty(&self) -> bool;
    fn mark_clean(&mut self);
}

/// What to do about unsaved local work when a join or snapshot load would
/// otherwise overwrite it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsavedWorkDecision {
    Save,
    Discard,
    Cancel,
}

/// An in-memory `DocumentView` with no backing widget, used by the demo
/// binary and by tests that drive a [`crate::session::Session`] headlessly.
#[derive(Debug, Default)]
pub struct BufferView {
    text: String,
    caret: usize,
    dirty: bool,
}

impl BufferView {
    pub fn new() -> Self {
        BufferView::default()
    }
}

impl DocumentView for BufferView {
    fn get_text(&self) -> String {
        self.text.clone()
    }

    fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
    }

    fn caret_position(&self) -> usize {
        self.caret
    }

    fn set_caret(&mut self, pos: usize) {
        self.caret = pos;
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn mark_clean(&mut self) {
        self.dirty = false;
    }
}
