//! libchord
//!
//! Key-event interpretation core for a modular input method engine: turns a
//! raw stream of key-down/key-up events into synthesized stenotype-style
//! chord codes, remapped key events, or session-state changes, before any
//! linguistic composition happens.
//!
//! Public API:
//! - `Dispatcher` - routes raw events through the processors and owns
//!   synthesized-event replay
//! - `ChordComposer` - chord accumulation, serialization and live prompt
//! - `KeyBinder` - condition-gated, priority-ordered key remapping table
//! - `Pipeline` - ordered textual rewrite rules (spelling algebra)
//! - `Context` - input buffer, caret, tagged segments and session options
//! - `SchemaConfig` - TOML schema configuration with binding presets
//! - `Switcher` - schema activation and recency tracking

pub mod key_event;
pub use key_event::{KeyCode, KeyEvent, KeySequence, Modifiers};

pub mod context;
pub use context::{Context, Segment, SegmentTag};

pub mod algebra;
pub use algebra::{AlgebraRule, Pipeline};

pub mod config;
pub use config::{
    BindingEntry, ChordConfig, FilePresets, KeyBinderConfig, NoPresets, PresetSource, SchemaConfig,
    SchemaListEntry, SpellerConfig,
};

pub mod chord;
pub use chord::{ChordComposer, ChordResult, PLACEHOLDER};

pub mod key_binder;
pub use key_binder::{
    BindingAction, BindingCondition, BindingConditions, KeyBinder, KeyBinding, KeyBindings,
};

pub mod switcher;
pub use switcher::{SchemaSwitcher, Switcher, SwitcherUserState, SELECT_NEXT};

pub mod dispatcher;
pub use dispatcher::{Dispatcher, ProcessResult};
