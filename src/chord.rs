//! Chord composition.
//!
//! The chord composer tracks partially-overlapping key presses over the
//! configured alphabet and turns each press-overlap-release gesture into
//! one serialized chord code. Keys accumulate into the chord from the
//! first press; the gesture finalizes when every pressed key has been
//! released, at which point the formatted output is handed back to the
//! dispatcher for replay as synthesized key events. A live prompt shows
//! the chord in progress, attached to the trailing composition segment
//! (inserting a zero-width placeholder segment when nothing is being
//! composed yet).

use crate::algebra::Pipeline;
use crate::config::SchemaConfig;
use crate::context::{Context, SegmentTag};
use crate::key_event::{KeyCode, KeyEvent};
use ahash::AHashSet;
use tracing::error;

/// Zero-width placeholder inserted so a prompt segment exists while the
/// chord is composed over an otherwise empty buffer. U+FEFF renders better
/// than U+200B on some platforms.
pub const PLACEHOLDER: &str = "\u{FEFF}";

/// Outcome of feeding one key event to the composer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChordResult {
    /// Event consumed; it must not propagate further.
    Accepted,
    /// Event not handled; later processors may take it.
    Noop,
    /// Gesture finalized; the carried output text should be replayed as
    /// synthesized key events under the composer's pass-through guard.
    Finished(String),
}

/// Stenotype-style chord accumulator.
pub struct ChordComposer {
    alphabet: String,
    delimiter: String,
    algebra: Pipeline,
    output_format: Pipeline,
    prompt_format: Pipeline,
    /// Keys physically held right now; shrinks on release.
    pressed: AHashSet<char>,
    /// Keys accumulated since the last idle state; only cleared wholesale.
    chord: AHashSet<char>,
    /// Re-entrancy guard raised while chord output is replayed.
    pass_through: bool,
}

impl ChordComposer {
    /// Build a composer from schema configuration and mark the session as
    /// chord-typing so other components can tell.
    pub fn new(config: &SchemaConfig, ctx: &mut Context) -> Self {
        let chord = &config.chord_composer;
        ctx.set_option("_chord_typing", true);
        Self {
            alphabet: chord.alphabet.clone(),
            delimiter: config.speller.delimiter.clone(),
            algebra: Pipeline::load(&chord.algebra),
            output_format: Pipeline::load(&chord.output_format),
            prompt_format: Pipeline::load(&chord.prompt_format),
            pressed: AHashSet::new(),
            chord: AHashSet::new(),
            pass_through: false,
        }
    }

    /// Raise or drop the replay guard. While raised, the composer ignores
    /// everything, so synthesized events cannot re-enter chord detection.
    pub fn set_pass_through(&mut self, on: bool) {
        self.pass_through = on;
    }

    /// Feed one key event through the composer.
    pub fn process_key_event(&mut self, ev: &KeyEvent, ctx: &mut Context) -> ChordResult {
        if self.pass_through {
            return ChordResult::Noop;
        }
        let composing = !self.chord.is_empty();
        if ev.is_modified() {
            self.clear_chord(ctx);
            return if composing {
                ChordResult::Accepted
            } else {
                ChordResult::Noop
            };
        }
        if !composing && ev.code == KeyCode::BackSpace && !ev.release {
            if self.delete_last_syllable(ctx) {
                return ChordResult::Accepted;
            }
        }
        let ch = match ev.code {
            KeyCode::Char(ch) if self.alphabet.contains(ch) => ch,
            _ => {
                self.clear_chord(ctx);
                return if composing {
                    ChordResult::Accepted
                } else {
                    ChordResult::Noop
                };
            }
        };
        // alphabet key: always consumed
        if ev.release {
            if self.pressed.remove(&ch) && self.pressed.is_empty() {
                return ChordResult::Finished(self.finish_chord(ctx));
            }
        } else {
            self.pressed.insert(ch);
            if self.chord.insert(ch) {
                self.update_chord(ctx);
            }
        }
        ChordResult::Accepted
    }

    /// Serialize the accumulated chord by scanning the alphabet in its
    /// fixed order, making the code independent of press order, then
    /// normalize it through the algebra pipeline.
    fn serialize_chord(&self) -> String {
        let code: String = self
            .alphabet
            .chars()
            .filter(|ch| self.chord.contains(ch))
            .collect();
        self.algebra.apply(&code)
    }

    fn update_chord(&mut self, ctx: &mut Context) {
        let prompt = self.prompt_format.apply(&self.serialize_chord());
        if ctx.last_segment().is_none() {
            // insert an invisible placeholder segment so that is_composing
            // reads true and the prompt has a segment to attach to
            ctx.push_input(PLACEHOLDER);
            match ctx.last_segment_mut() {
                Some(segment) => segment.add_tag(SegmentTag::Phony),
                None => {
                    error!("failed to attach chord prompt: no composition segment");
                    return;
                }
            }
        }
        if let Some(segment) = ctx.last_segment_mut() {
            segment.add_tag(SegmentTag::ChordPrompt);
            segment.prompt = prompt;
        }
    }

    fn finish_chord(&mut self, ctx: &mut Context) -> String {
        let code = self.output_format.apply(&self.serialize_chord());
        self.clear_chord(ctx);
        code
    }

    /// Drop the gesture and any visible trace of it: the placeholder
    /// segment is removed from the buffer entirely, a real segment merely
    /// loses its prompt.
    pub fn clear_chord(&mut self, ctx: &mut Context) {
        self.pressed.clear();
        self.chord.clear();
        let (start, phony, has_prompt) = match ctx.last_segment() {
            Some(segment) => (
                segment.start,
                segment.has_tag(SegmentTag::Phony),
                segment.has_tag(SegmentTag::ChordPrompt),
            ),
            None => return,
        };
        if phony && &ctx.input()[start..] == PLACEHOLDER {
            ctx.pop_input(ctx.caret_pos() - start);
        } else if has_prompt {
            if let Some(segment) = ctx.last_segment_mut() {
                segment.prompt.clear();
                segment.remove_tag(SegmentTag::ChordPrompt);
            }
        }
    }

    /// Delete backward from the caret to the nearest preceding delimiter
    /// within the current segment, always deleting at least one character.
    fn delete_last_syllable(&self, ctx: &mut Context) -> bool {
        let input = ctx.input();
        let start = ctx.last_segment().map(|seg| seg.start).unwrap_or(0);
        let caret = ctx.caret_pos();
        if input.is_empty() || caret <= start {
            return false;
        }
        let mut deleted_bytes = 0;
        let mut deleted = 0;
        for ch in input[start..caret].chars().rev() {
            if deleted > 0 && self.delimiter.contains(ch) {
                break;
            }
            deleted += 1;
            deleted_bytes += ch.len_utf8();
        }
        ctx.pop_input(deleted_bytes);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaConfig;

    fn composer(ctx: &mut Context) -> ChordComposer {
        let config = SchemaConfig::from_toml_str(
            r#"
            [chord_composer]
            alphabet = "stkpwhr"
            prompt_format = ["xform/(.+)/[$1]/"]

            [speller]
            delimiter = " "
            "#,
        )
        .unwrap();
        ChordComposer::new(&config, ctx)
    }

    fn down(ch: char) -> KeyEvent {
        KeyEvent::down(KeyCode::Char(ch))
    }

    fn up(ch: char) -> KeyEvent {
        KeyEvent::up(KeyCode::Char(ch))
    }

    #[test]
    fn test_sets_chord_typing_option() {
        let mut ctx = Context::new();
        let _ = composer(&mut ctx);
        assert!(ctx.get_option("_chord_typing"));
    }

    #[test]
    fn test_serialization_is_press_order_independent() {
        for order in [['t', 's', 'k'], ['k', 't', 's'], ['s', 'k', 't']] {
            let mut ctx = Context::new();
            let mut chord = composer(&mut ctx);
            for ch in order {
                assert_eq!(chord.process_key_event(&down(ch), &mut ctx), ChordResult::Accepted);
            }
            for ch in order.iter().rev() {
                let result = chord.process_key_event(&up(*ch), &mut ctx);
                if *ch == order[0] {
                    assert_eq!(result, ChordResult::Finished("stk".to_string()));
                } else {
                    assert_eq!(result, ChordResult::Accepted);
                }
            }
        }
    }

    #[test]
    fn test_partial_release_does_not_finalize() {
        let mut ctx = Context::new();
        let mut chord = composer(&mut ctx);
        chord.process_key_event(&down('s'), &mut ctx);
        chord.process_key_event(&down('t'), &mut ctx);
        assert_eq!(chord.process_key_event(&up('t'), &mut ctx), ChordResult::Accepted);
        // s is still held, so the chord keeps accumulating
        chord.process_key_event(&down('p'), &mut ctx);
        chord.process_key_event(&up('p'), &mut ctx);
        let result = chord.process_key_event(&up('s'), &mut ctx);
        assert_eq!(result, ChordResult::Finished("stp".to_string()));
    }

    #[test]
    fn test_prompt_attaches_to_placeholder_segment() {
        let mut ctx = Context::new();
        let mut chord = composer(&mut ctx);
        chord.process_key_event(&down('s'), &mut ctx);
        assert!(ctx.is_composing());
        let seg = ctx.last_segment().unwrap();
        assert!(seg.has_tag(SegmentTag::Phony));
        assert!(seg.has_tag(SegmentTag::ChordPrompt));
        assert_eq!(seg.prompt, "[s]");
        assert_eq!(ctx.input(), PLACEHOLDER);

        chord.process_key_event(&down('t'), &mut ctx);
        assert_eq!(ctx.last_segment().unwrap().prompt, "[st]");
    }

    #[test]
    fn test_finalize_removes_placeholder() {
        let mut ctx = Context::new();
        let mut chord = composer(&mut ctx);
        chord.process_key_event(&down('s'), &mut ctx);
        let result = chord.process_key_event(&up('s'), &mut ctx);
        assert_eq!(result, ChordResult::Finished("s".to_string()));
        assert!(!ctx.is_composing());
        assert!(ctx.last_segment().is_none());
    }

    #[test]
    fn test_prompt_on_real_segment_cleared_in_place() {
        let mut ctx = Context::new();
        let mut chord = composer(&mut ctx);
        ctx.push_input("ni");
        chord.process_key_event(&down('s'), &mut ctx);
        let seg = ctx.last_segment().unwrap();
        assert!(!seg.has_tag(SegmentTag::Phony));
        assert_eq!(seg.prompt, "[s]");

        chord.clear_chord(&mut ctx);
        let seg = ctx.last_segment().unwrap();
        assert_eq!(seg.prompt, "");
        assert!(!seg.has_tag(SegmentTag::ChordPrompt));
        assert_eq!(ctx.input(), "ni");
    }

    #[test]
    fn test_modifier_clears_gesture() {
        let mut ctx = Context::new();
        let mut chord = composer(&mut ctx);
        let ctrl_s = KeyEvent::with_mods(KeyCode::Char('s'), crate::key_event::Modifiers::CONTROL);
        // no gesture in progress: not handled
        assert_eq!(chord.process_key_event(&ctrl_s, &mut ctx), ChordResult::Noop);

        chord.process_key_event(&down('s'), &mut ctx);
        assert_eq!(chord.process_key_event(&ctrl_s, &mut ctx), ChordResult::Accepted);
        // gesture discarded: releasing s finalizes nothing
        assert_eq!(chord.process_key_event(&up('s'), &mut ctx), ChordResult::Accepted);
    }

    #[test]
    fn test_non_alphabet_key_clears() {
        let mut ctx = Context::new();
        let mut chord = composer(&mut ctx);
        assert_eq!(chord.process_key_event(&down('x'), &mut ctx), ChordResult::Noop);

        chord.process_key_event(&down('s'), &mut ctx);
        assert_eq!(chord.process_key_event(&down('x'), &mut ctx), ChordResult::Accepted);
        assert!(ctx.last_segment().is_none());
    }

    #[test]
    fn test_clear_chord_is_idempotent() {
        let mut ctx = Context::new();
        let mut chord = composer(&mut ctx);
        ctx.push_input("ni");
        chord.process_key_event(&down('s'), &mut ctx);
        chord.clear_chord(&mut ctx);
        let before = ctx.last_segment().cloned();
        chord.clear_chord(&mut ctx);
        assert_eq!(ctx.last_segment().cloned(), before);
        assert_eq!(ctx.input(), "ni");
    }

    #[test]
    fn test_pass_through_ignores_everything() {
        let mut ctx = Context::new();
        let mut chord = composer(&mut ctx);
        chord.set_pass_through(true);
        assert_eq!(chord.process_key_event(&down('s'), &mut ctx), ChordResult::Noop);
        assert_eq!(chord.process_key_event(&up('s'), &mut ctx), ChordResult::Noop);
        chord.set_pass_through(false);
        assert_eq!(chord.process_key_event(&down('s'), &mut ctx), ChordResult::Accepted);
    }

    #[test]
    fn test_delete_last_syllable() {
        let mut ctx = Context::new();
        let mut chord = composer(&mut ctx);
        ctx.push_input("ni hao");
        let backspace = KeyEvent::down(KeyCode::BackSpace);
        assert_eq!(chord.process_key_event(&backspace, &mut ctx), ChordResult::Accepted);
        assert_eq!(ctx.input(), "ni ");

        // immediately preceding char is the delimiter itself: still deletes it
        assert_eq!(chord.process_key_event(&backspace, &mut ctx), ChordResult::Accepted);
        assert_eq!(ctx.input(), "");

        // empty buffer: nothing to delete, key falls through
        assert_eq!(chord.process_key_event(&backspace, &mut ctx), ChordResult::Noop);
    }

    #[test]
    fn test_backspace_during_gesture_clears_chord() {
        let mut ctx = Context::new();
        let mut chord = composer(&mut ctx);
        ctx.push_input("ni");
        chord.process_key_event(&down('s'), &mut ctx);
        let backspace = KeyEvent::down(KeyCode::BackSpace);
        // gesture in progress: BackSpace is a disqualifying key, not deletion
        assert_eq!(chord.process_key_event(&backspace, &mut ctx), ChordResult::Accepted);
        assert_eq!(ctx.input(), "ni");
    }
}
