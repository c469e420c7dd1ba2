//! Clip, effect and transition types for the timeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of media a clip places on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipKind {
    #[default]
    Video,
    Audio,
    Image,
    Text,
}

/// Kind of effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    /// A filter expression, e.g. `sepia(0.5)`.
    Filter,
    /// A color adjustment. Reserved: contributes nothing to the effective style yet.
    Color,
}

/// Effect parameter: a filter expression or a plain number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EffectValue {
    Text(String),
    Number(f64),
}

impl fmt::Display for EffectValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for EffectValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for EffectValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for EffectValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// An effect applied to a clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    /// Unique effect ID
    pub id: Uuid,
    pub kind: EffectKind,
    /// Human label
    pub name: String,
    pub value: EffectValue,
}

impl Effect {
    /// Create an effect with a fresh ID.
    pub fn new(kind: EffectKind, name: impl Into<String>, value: impl Into<EffectValue>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            name: name.into(),
            value: value.into(),
        }
    }

    /// Shorthand for a filter effect.
    pub fn filter(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self::new(EffectKind::Filter, name, EffectValue::Text(expression.into()))
    }
}

/// Visual blend used when playback crosses into a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    Fade,
    Slide,
    Zoom,
    Wipe,
    Glitch,
    None,
}

impl TransitionKind {
    /// The kinds that actually animate something.
    pub const VISIBLE: [TransitionKind; 5] = [
        TransitionKind::Fade,
        TransitionKind::Slide,
        TransitionKind::Zoom,
        TransitionKind::Wipe,
        TransitionKind::Glitch,
    ];

    /// Lower-case name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Fade => "fade",
            Self::Slide => "slide",
            Self::Zoom => "zoom",
            Self::Wipe => "wipe",
            Self::Glitch => "glitch",
            Self::None => "none",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Incoming transition attached to a clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub kind: TransitionKind,
    /// Duration in seconds
    pub duration: f64,
}

impl Transition {
    pub fn new(kind: TransitionKind, duration: f64) -> Self {
        Self { kind, duration }
    }
}

/// A clip on the timeline.
///
/// Times are in seconds. `start` is the timeline position, `offset` the
/// trim-in point inside the source media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    /// Unique clip ID (unique across all tracks)
    pub id: Uuid,
    pub kind: ClipKind,
    /// Opaque, already-resolved media reference
    pub src: String,
    /// Timeline start
    pub start: f64,
    /// Duration on timeline
    pub duration: f64,
    /// Source in point
    pub offset: f64,
    /// Owning track (back-reference only)
    pub track_id: Uuid,
    /// Clip name (displayed in UI)
    pub name: String,
    /// Effects, composed in list order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<Effect>,
    /// Transition from the previous clip into this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<Transition>,
}

impl Clip {
    /// Timeline end (exclusive).
    #[inline]
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// True when `time` falls in `[start, start + duration)`.
    #[inline]
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end()
    }

    /// Source out point.
    pub fn source_out(&self) -> f64 {
        self.offset + self.duration
    }

    /// Merge the set fields of a patch into this clip.
    pub fn apply_patch(&mut self, patch: ClipPatch) {
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(src) = patch.src {
            self.src = src;
        }
        if let Some(start) = patch.start {
            self.start = start;
        }
        if let Some(duration) = patch.duration {
            self.duration = duration;
        }
        if let Some(offset) = patch.offset {
            self.offset = offset;
        }
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(effects) = patch.effects {
            self.effects = effects;
        }
        if let Some(transition) = patch.transition {
            self.transition = transition;
        }
    }
}

/// Partial clip used to create a new clip; unset fields take defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipDraft {
    pub kind: Option<ClipKind>,
    pub src: Option<String>,
    pub start: Option<f64>,
    pub duration: Option<f64>,
    pub offset: Option<f64>,
    pub name: Option<String>,
    pub effects: Vec<Effect>,
    pub transition: Option<Transition>,
}

impl ClipDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: ClipKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn src(mut self, src: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self
    }

    pub fn start(mut self, start: f64) -> Self {
        self.start = Some(start);
        self
    }

    pub fn duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn offset(mut self, offset: f64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Partial update for an existing clip; only `Some` fields are written.
///
/// `transition: Some(None)` clears the incoming transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipPatch {
    pub kind: Option<ClipKind>,
    pub src: Option<String>,
    pub start: Option<f64>,
    pub duration: Option<f64>,
    pub offset: Option<f64>,
    pub name: Option<String>,
    pub effects: Option<Vec<Effect>>,
    pub transition: Option<Option<Transition>>,
}

impl ClipPatch {
    /// Patch that only sets the incoming transition.
    pub fn transition(transition: Transition) -> Self {
        Self {
            transition: Some(Some(transition)),
            ..Self::default()
        }
    }

    /// Patch that only moves the clip.
    pub fn start(start: f64) -> Self {
        Self {
            start: Some(start),
            ..Self::default()
        }
    }
}
