//! Five-fret note/chord timing-judgement engine.
//!
//! The chart model is built once at load time from the chart-loading
//! collaborator's raw data; the [`FiveFretEngine`] then converts a stream
//! of discrete, timestamped input edges into hits, misses, sustain scoring,
//! streak/multiplier, and starpower/solo bookkeeping. Rendering, audio,
//! parsing and persistence live in external collaborators.

pub mod chart;
pub mod engine;
pub mod settings;

pub use chart::note::{Fret, NoteFlag, NoteKind, RawNote};
pub use chart::shape::{ChordShape, FretState};
pub use chart::{Chart, RawChart};
pub use engine::five_fret::FiveFretEngine;
pub use engine::input::{GuitarButton, InputEvent};
pub use engine::judgment::{FcType, Grade, JudgeGrade, JudgedHit, Judgement};
pub use engine::results::{Results, ResultsPayload};
pub use engine::sustain::{Sustain, SustainFretData};
pub use engine::Engine;
pub use settings::{EngineFlags, EngineSettings};
