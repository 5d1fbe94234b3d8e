//! Key-event dispatch.
//!
//! The dispatcher routes each raw key event through the key binder and then
//! the chord composer, and owns the two places where synthesized events
//! re-enter the pipeline: `Send` redirects and chord-output replay. Both
//! run under the respective component's re-entrancy guard, raised before
//! the synthetic dispatch and dropped after it, so physical events never
//! interleave with a replay and neither component recurses into itself.
//! Redirect depth beyond one is not supported.

use crate::chord::{ChordComposer, ChordResult};
use crate::config::{PresetSource, SchemaConfig};
use crate::context::Context;
use crate::key_binder::{BindingAction, KeyBinder};
use crate::key_event::{KeyEvent, KeySequence};
use crate::switcher::{SchemaSwitcher, SELECT_NEXT};
use tracing::warn;

/// Whether a key event was consumed by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessResult {
    /// The event was handled and must not propagate further.
    Accepted,
    /// The event was not handled; the host should process it normally.
    Noop,
}

/// Orchestrates the key-event processors over one shared context.
pub struct Dispatcher {
    ctx: Context,
    key_binder: KeyBinder,
    chord: ChordComposer,
    switcher: Option<Box<dyn SchemaSwitcher>>,
}

impl Dispatcher {
    /// Build the full pipeline from one schema configuration.
    pub fn new(config: &SchemaConfig, presets: &dyn PresetSource) -> Self {
        let mut ctx = Context::new();
        let chord = ChordComposer::new(config, &mut ctx);
        let key_binder = KeyBinder::new(config, presets);
        Self {
            ctx,
            key_binder,
            chord,
            switcher: None,
        }
    }

    /// Attach the schema-switching collaborator. Without one, `select`
    /// bindings degrade to no-ops.
    pub fn with_switcher(mut self, switcher: Box<dyn SchemaSwitcher>) -> Self {
        self.switcher = Some(switcher);
        self
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }

    pub fn switcher(&self) -> Option<&dyn SchemaSwitcher> {
        self.switcher.as_deref()
    }

    /// Process one key event to completion, including any synthesized
    /// events it triggers.
    pub fn process_key_event(&mut self, ev: KeyEvent) -> ProcessResult {
        if let Some(action) = self.key_binder.process_key_event(&ev, &mut self.ctx) {
            self.perform(action);
            return ProcessResult::Accepted;
        }
        match self.chord.process_key_event(&ev, &mut self.ctx) {
            ChordResult::Accepted => ProcessResult::Accepted,
            ChordResult::Noop => ProcessResult::Noop,
            ChordResult::Finished(output) => {
                self.replay(&output);
                ProcessResult::Accepted
            }
        }
    }

    fn perform(&mut self, action: BindingAction) {
        match action {
            BindingAction::Send(target) => {
                self.key_binder.set_redirecting(true);
                let _ = self.process_key_event(target);
                self.key_binder.set_redirecting(false);
            }
            BindingAction::Toggle(option) => self.ctx.toggle_option(&option),
            BindingAction::Select(schema) => {
                if let Some(switcher) = self.switcher.as_deref_mut() {
                    if schema == SELECT_NEXT {
                        switcher.select_next_schema();
                    } else {
                        switcher.apply_schema(&schema);
                    }
                }
            }
        }
    }

    /// Replay finalized chord output as synthesized key events. Events the
    /// pipeline cannot interpret commit their literal character instead.
    fn replay(&mut self, output: &str) {
        let Some(sequence) = KeySequence::parse(output) else {
            warn!(output, "chord output is not a valid key sequence");
            return;
        };
        self.chord.set_pass_through(true);
        for ev in &sequence {
            if self.process_key_event(*ev) == ProcessResult::Noop {
                if let Some(ch) = ev.literal() {
                    let mut buf = [0u8; 4];
                    self.ctx.commit_str(ch.encode_utf8(&mut buf));
                }
            }
        }
        self.chord.set_pass_through(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NoPresets;
    use crate::key_event::KeyCode;
    use crate::switcher::Switcher;

    fn dispatcher(toml: &str) -> Dispatcher {
        let config = SchemaConfig::from_toml_str(toml).unwrap();
        Dispatcher::new(&config, &NoPresets)
    }

    fn press_and_release(d: &mut Dispatcher, chs: &[char]) {
        for &ch in chs {
            d.process_key_event(KeyEvent::down(KeyCode::Char(ch)));
        }
        for &ch in chs.iter().rev() {
            d.process_key_event(KeyEvent::up(KeyCode::Char(ch)));
        }
    }

    #[test]
    fn test_chord_output_commits_literally() {
        let mut d = dispatcher(
            r#"
            [chord_composer]
            alphabet = "stkpwhr"
            "#,
        );
        press_and_release(&mut d, &['t', 's']);
        assert_eq!(d.context_mut().take_commit(), "st");
    }

    #[test]
    fn test_output_format_applies_before_replay() {
        let mut d = dispatcher(
            r#"
            [chord_composer]
            alphabet = "stkpwhr"
            output_format = ["xlit/st/ST/"]
            "#,
        );
        press_and_release(&mut d, &['s', 't']);
        assert_eq!(d.context_mut().take_commit(), "ST");
    }

    #[test]
    fn test_replayed_events_do_not_reenter_chord() {
        // output chars are inside the alphabet; without the pass-through
        // guard the replay would start a second gesture
        let mut d = dispatcher(
            r#"
            [chord_composer]
            alphabet = "stkpwhr"
            "#,
        );
        press_and_release(&mut d, &['s']);
        assert_eq!(d.context_mut().take_commit(), "s");
        assert!(!d.context().is_composing());
    }

    #[test]
    fn test_send_redirect() {
        let mut d = dispatcher(
            r#"
            [chord_composer]
            alphabet = "stkpwhr"

            [[key_binder.bindings]]
            when = "always"
            accept = "q"
            send = "s"
            "#,
        );
        // q redirects to s, which the chord composer consumes
        let result = d.process_key_event(KeyEvent::down(KeyCode::Char('q')));
        assert_eq!(result, ProcessResult::Accepted);
        assert!(d.context().is_composing());
    }

    #[test]
    fn test_toggle_action() {
        let mut d = dispatcher(
            r#"
            [[key_binder.bindings]]
            when = "always"
            accept = "Control+period"
            toggle = "ascii_punct"
            "#,
        );
        let trigger = KeyEvent::parse("Control+period").unwrap();
        assert!(!d.context().get_option("ascii_punct"));
        assert_eq!(d.process_key_event(trigger), ProcessResult::Accepted);
        assert!(d.context().get_option("ascii_punct"));
        d.process_key_event(trigger);
        assert!(!d.context().get_option("ascii_punct"));
    }

    #[test]
    fn test_select_actions_drive_switcher() {
        let config = SchemaConfig::from_toml_str(
            r#"
            [[key_binder.bindings]]
            when = "always"
            accept = "Control+grave"
            select = ".next"

            [[key_binder.bindings]]
            when = "always"
            accept = "Control+1"
            select = "zhuyin"
            "#,
        )
        .unwrap();
        let switcher = Switcher::new(vec!["steno".to_string(), "zhuyin".to_string()]);
        let mut d = Dispatcher::new(&config, &NoPresets).with_switcher(Box::new(switcher));

        d.process_key_event(KeyEvent::parse("Control+grave").unwrap());
        assert_eq!(d.switcher().unwrap().current_schema(), "zhuyin");

        d.process_key_event(KeyEvent::parse("Control+grave").unwrap());
        assert_eq!(d.switcher().unwrap().current_schema(), "steno");

        d.process_key_event(KeyEvent::parse("Control+1").unwrap());
        assert_eq!(d.switcher().unwrap().current_schema(), "zhuyin");
    }

    #[test]
    fn test_select_without_switcher_is_noop() {
        let mut d = dispatcher(
            r#"
            [[key_binder.bindings]]
            when = "always"
            accept = "Control+grave"
            select = ".next"
            "#,
        );
        // handled, but nothing to switch
        let result = d.process_key_event(KeyEvent::parse("Control+grave").unwrap());
        assert_eq!(result, ProcessResult::Accepted);
    }

    #[test]
    fn test_invalid_output_sequence_suppresses_replay() {
        // the unterminated brace makes the output unparseable; nothing is
        // replayed or committed, but the gesture still ends cleanly
        let mut d = dispatcher(
            r#"
            [chord_composer]
            alphabet = "stkpwhr"
            output_format = ["xform/^s$/s{/"]
            "#,
        );
        d.process_key_event(KeyEvent::down(KeyCode::Char('s')));
        let result = d.process_key_event(KeyEvent::up(KeyCode::Char('s')));
        assert_eq!(result, ProcessResult::Accepted);
        assert_eq!(d.context().commit_text, "");
        assert!(!d.context().is_composing());

        // the composer is idle again and a fresh gesture works
        d.process_key_event(KeyEvent::down(KeyCode::Char('t')));
        d.process_key_event(KeyEvent::up(KeyCode::Char('t')));
        assert_eq!(d.context_mut().take_commit(), "t");
    }

    #[test]
    fn test_unhandled_key_reports_noop() {
        let mut d = dispatcher(
            r#"
            [chord_composer]
            alphabet = "stkpwhr"
            "#,
        );
        let result = d.process_key_event(KeyEvent::down(KeyCode::Char('x')));
        assert_eq!(result, ProcessResult::Noop);
    }
}
