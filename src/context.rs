//! Composition context shared by the key-event processors.
//!
//! The `Context` owns the raw input buffer with its caret, the segment list
//! carrying display metadata (tags, prompt), boolean session options, and
//! the commit-text field the host consumes after each key event. The
//! processors mutate it in place; there is no rollback, so a processor that
//! inserts transient state (such as the chord placeholder segment) is
//! responsible for removing it again.

use ahash::{AHashMap, AHashSet};

/// Display metadata tags attached to a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentTag {
    /// Synthetic zero-width placeholder segment, not real user input.
    Phony,
    /// Segment currently carrying a live chord prompt.
    ChordPrompt,
    /// The user has paged through this segment's candidate menu.
    Paging,
}

/// A contiguous span of the input buffer with display metadata.
///
/// The segment extends from `start` to the end of the buffer (only the
/// trailing segment is ever mutated by the processors here).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    /// Byte offset where the segment begins in the input buffer.
    pub start: usize,
    /// Prompt text displayed alongside the segment.
    pub prompt: String,
    tags: AHashSet<SegmentTag>,
}

impl Segment {
    pub fn new(start: usize) -> Self {
        Self {
            start,
            prompt: String::new(),
            tags: AHashSet::new(),
        }
    }

    pub fn has_tag(&self, tag: SegmentTag) -> bool {
        self.tags.contains(&tag)
    }

    pub fn add_tag(&mut self, tag: SegmentTag) {
        self.tags.insert(tag);
    }

    pub fn remove_tag(&mut self, tag: SegmentTag) {
        self.tags.remove(&tag);
    }
}

/// Session state owned by the surrounding composition engine.
#[derive(Debug, Clone, Default)]
pub struct Context {
    input: String,
    caret: usize,
    segments: Vec<Segment>,
    options: AHashMap<String, bool>,
    menu_visible: bool,

    /// Text to commit directly to the application; the host consumes and
    /// clears this after each key event.
    pub commit_text: String,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// The raw input buffer.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Caret position as a byte offset into the input buffer.
    pub fn caret_pos(&self) -> usize {
        self.caret
    }

    /// True while there is uncommitted input.
    pub fn is_composing(&self) -> bool {
        !self.input.is_empty()
    }

    /// Whether a candidate menu is currently visible.
    pub fn has_menu(&self) -> bool {
        self.menu_visible
    }

    pub fn set_menu_visible(&mut self, visible: bool) {
        self.menu_visible = visible;
    }

    /// Insert text at the caret. Creates a trailing segment if none exists,
    /// so that prompt text has somewhere to attach.
    pub fn push_input(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let start = self.caret;
        self.input.insert_str(self.caret, text);
        self.caret += text.len();
        if self.segments.is_empty() {
            self.segments.push(Segment::new(start));
        }
    }

    /// Remove `len` bytes immediately before the caret. Segments left
    /// beyond the end of the shortened input are dropped.
    pub fn pop_input(&mut self, len: usize) {
        if len == 0 || len > self.caret {
            return;
        }
        let from = self.caret - len;
        if !self.input.is_char_boundary(from) {
            return;
        }
        self.input.replace_range(from..self.caret, "");
        self.caret = from;
        let end = self.input.len();
        self.segments.retain(|seg| seg.start < end);
    }

    /// The trailing segment, if any.
    pub fn last_segment(&self) -> Option<&Segment> {
        self.segments.last()
    }

    pub fn last_segment_mut(&mut self) -> Option<&mut Segment> {
        self.segments.last_mut()
    }

    /// Read a boolean session option; unset options read as false.
    pub fn get_option(&self, name: &str) -> bool {
        self.options.get(name).copied().unwrap_or(false)
    }

    pub fn set_option(&mut self, name: &str, value: bool) {
        self.options.insert(name.to_string(), value);
    }

    pub fn toggle_option(&mut self, name: &str) {
        let value = self.get_option(name);
        self.options.insert(name.to_string(), !value);
    }

    /// Append text to the pending commit.
    pub fn commit_str(&mut self, text: &str) {
        self.commit_text.push_str(text);
    }

    /// Take the pending commit text, leaving it empty.
    pub fn take_commit(&mut self) -> String {
        std::mem::take(&mut self.commit_text)
    }

    /// Clear input, caret, segments and menu state. Options and pending
    /// commit text survive (the host consumes commit text itself).
    pub fn clear(&mut self) {
        self.input.clear();
        self.caret = 0;
        self.segments.clear();
        self.menu_visible = false;
    }
}
