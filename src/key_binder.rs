//! Condition-gated key bindings.
//!
//! The key binder holds a priority-ordered table of remapping and action
//! rules loaded from two config passes (imported preset, then the schema's
//! own list). Each incoming key-down is first offered to the period
//! reinterpretation heuristic, then matched against the table bucket for
//! its trigger key under the session conditions currently in effect.

use crate::config::{BindingEntry, KeyBinderConfig, PresetSource, SchemaConfig};
use crate::context::{Context, SegmentTag};
use crate::key_event::{KeyCode, KeyEvent};
use ahash::{AHashMap, AHashSet};
use tracing::{debug, error, warn};

/// Session-state categories gating binding eligibility, ordered from most
/// to least specific. Buckets are scanned in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BindingCondition {
    /// The trailing composition segment carries the paging tag.
    Paging,
    /// A candidate menu is visible and ascii_mode is off.
    HasMenu,
    /// The input buffer is non-empty.
    Composing,
    /// Unconditionally eligible.
    Always,
}

impl BindingCondition {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "paging" => Some(Self::Paging),
            "has_menu" => Some(Self::HasMenu),
            "composing" => Some(Self::Composing),
            "always" => Some(Self::Always),
            _ => None,
        }
    }
}

/// The closed set of actions a binding can perform. Executed by the
/// dispatcher, which owns the collaborators the actions need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingAction {
    /// Redirect: dispatch this key event in place of the trigger.
    Send(KeyEvent),
    /// Flip a named boolean session option.
    Toggle(String),
    /// Activate a schema by id, or `".next"` for the next enabled one.
    Select(String),
}

/// One loaded binding rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBinding {
    pub condition: BindingCondition,
    pub action: BindingAction,
}

/// Conditions currently true for the session, computed per event.
#[derive(Debug, Clone)]
pub struct BindingConditions(AHashSet<BindingCondition>);

impl BindingConditions {
    pub fn from_context(ctx: &Context) -> Self {
        let mut set = AHashSet::new();
        set.insert(BindingCondition::Always);
        if ctx.is_composing() {
            set.insert(BindingCondition::Composing);
        }
        if ctx.has_menu() && !ctx.get_option("ascii_mode") {
            set.insert(BindingCondition::HasMenu);
        }
        if let Some(segment) = ctx.last_segment() {
            if segment.has_tag(SegmentTag::Paging) {
                set.insert(BindingCondition::Paging);
            }
        }
        Self(set)
    }

    pub fn contains(&self, condition: BindingCondition) -> bool {
        self.0.contains(&condition)
    }
}

/// Trigger-keyed binding table, each bucket sorted ascending by condition.
#[derive(Debug, Clone, Default)]
pub struct KeyBindings {
    table: AHashMap<KeyEvent, Vec<KeyBinding>>,
}

impl KeyBindings {
    /// Append a binding list in file order, skipping malformed entries.
    pub fn load_bindings(&mut self, entries: &[BindingEntry]) {
        for (i, entry) in entries.iter().enumerate() {
            match Self::parse_entry(entry) {
                Some((key, binding)) => self.bind(key, binding),
                None => warn!(index = i, "invalid key binding, skipped"),
            }
        }
    }

    fn parse_entry(entry: &BindingEntry) -> Option<(KeyEvent, KeyBinding)> {
        let condition = BindingCondition::from_name(entry.when.as_deref()?)?;
        let key = KeyEvent::parse(entry.accept.as_deref()?)?;
        let action = if let Some(target) = entry.send.as_deref() {
            BindingAction::Send(KeyEvent::parse(target)?)
        } else if let Some(option) = entry.toggle.as_deref() {
            BindingAction::Toggle(option.to_string())
        } else if let Some(schema) = entry.select.as_deref() {
            BindingAction::Select(schema.to_string())
        } else {
            return None;
        };
        Some((key, KeyBinding { condition, action }))
    }

    /// Insert before the first existing binding whose condition is not
    /// lower. Among bindings of equal condition, later insertions scan
    /// first, which is what lets schema bindings override imported presets.
    fn bind(&mut self, key: KeyEvent, binding: KeyBinding) {
        let bucket = self.table.entry(key).or_default();
        let at = bucket.partition_point(|b| b.condition < binding.condition);
        bucket.insert(at, binding);
    }

    pub fn get(&self, key: &KeyEvent) -> Option<&[KeyBinding]> {
        self.table.get(key).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Key binder processor: table lookup plus the period-reinterpretation
/// heuristic.
pub struct KeyBinder {
    bindings: KeyBindings,
    /// Guard against re-entry while a Send redirect is dispatched.
    redirecting: bool,
    /// Most recent unmodified key-down character, for the heuristic.
    last_key: Option<char>,
}

impl KeyBinder {
    /// Load the binder from schema configuration: the imported preset list
    /// first (if any), then the schema's own bindings.
    pub fn new(config: &SchemaConfig, presets: &dyn PresetSource) -> Self {
        let mut bindings = KeyBindings::default();
        Self::load_config(&mut bindings, &config.key_binder, presets);
        Self {
            bindings,
            redirecting: false,
            last_key: None,
        }
    }

    fn load_config(
        bindings: &mut KeyBindings,
        config: &KeyBinderConfig,
        presets: &dyn PresetSource,
    ) {
        if let Some(name) = config.import_preset.as_deref() {
            match presets.load_preset(name) {
                Some(preset) => bindings.load_bindings(&preset.bindings),
                None => error!(preset = name, "error importing preset key bindings"),
            }
        }
        // schema bindings load second and override presets of equal tier
        bindings.load_bindings(&config.bindings);
    }

    /// Raise or drop the redirect guard; while raised the binder no-ops.
    pub fn set_redirecting(&mut self, on: bool) {
        self.redirecting = on;
    }

    /// Look up the action for a key event, mutating the input buffer if the
    /// period heuristic fires.
    ///
    /// Returns the matched binding's action for the dispatcher to execute,
    /// or `None` when the event should pass through (including after a
    /// heuristic insertion, which deliberately lets the triggering key
    /// continue through the pipeline).
    pub fn process_key_event(&mut self, ev: &KeyEvent, ctx: &mut Context) -> Option<BindingAction> {
        if self.redirecting || self.bindings.is_empty() {
            return None;
        }
        if self.reinterpret_paging_key(ev, ctx) {
            return None;
        }
        let bucket = self.bindings.get(ev)?;
        let conditions = BindingConditions::from_context(ctx);
        bucket
            .iter()
            .find(|binding| conditions.contains(binding.condition))
            .map(|binding| binding.action.clone())
    }

    /// One-key lookahead for the overloaded period key: a period followed
    /// by a lowercase letter is retroactively committed as literal
    /// punctuation instead of the paging command it is bound to.
    fn reinterpret_paging_key(&mut self, ev: &KeyEvent, ctx: &mut Context) -> bool {
        if ev.release {
            return false;
        }
        let ch = match ev.code {
            KeyCode::Char(c) if !ev.is_modified() => Some(c),
            _ => None,
        };
        // repeated punctuation breaks the run so it cannot re-trigger
        if ch == Some('.') && matches!(self.last_key, Some('.') | Some(',')) {
            self.last_key = None;
            return false;
        }
        let mut reinterpreted = false;
        if self.last_key == Some('.') && matches!(ch, Some('a'..='z')) {
            let input = ctx.input();
            if !input.is_empty() && !input.ends_with('.') {
                debug!(successor = ?ch, "reinterpreted period key");
                ctx.push_input(".");
                reinterpreted = true;
            }
        }
        self.last_key = ch;
        reinterpreted
    }
}
