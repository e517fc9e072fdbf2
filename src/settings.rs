use bitflags::bitflags;

// All windows and leniencies are in seconds of chart time.

/// Symmetric hit-window half-width around a chord's nominal time.
pub const HIT_WINDOW_S: f32 = 0.070;
/// How long an unmatched strum stays armed before it becomes an overstrum.
pub const STRUM_LENIENCY_S: f32 = 0.060;
/// Grace period after a tap/hopo hit during which a strum is forgiven.
pub const HOPO_LENIENCY_S: f32 = 0.080;
/// Slack when resolving a sustain fret at its natural end.
pub const SUSTAIN_END_LENIENCY_S: f32 = 0.010;

bitflags! {
    /// Engine policy switches.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct EngineFlags: u32 {
        /// A strum may hit a later in-window chord past unhit earlier ones.
        const CAN_CHORD_SKIP = 1 << 0;
        /// Chord-skip marks the skipped chords as missed.
        const PUNISH_CHORD_SKIP = 1 << 1;
        /// Pre-fretted taps/hopos auto-hit when their window opens.
        const INFINITE_FRONT_END = 1 << 2;
        /// A chord sustain drops as a unit; otherwise disjoint frets drop
        /// individually.
        const LINKED_DISJOINTS = 1 << 3;
    }
}

/// Timing tolerances and policy flags for one engine instance.
#[derive(Copy, Clone, Debug)]
pub struct EngineSettings {
    pub hit_window: f32,
    /// Early-side window for the infinite-front-end auto-hit.
    pub front_end_window: f32,
    pub strum_leniency: f32,
    pub hopo_leniency: f32,
    pub sustain_end_leniency: f32,
    pub flags: EngineFlags,
}

impl EngineSettings {
    #[inline(always)]
    pub fn default_five_fret() -> Self {
        Self {
            hit_window: HIT_WINDOW_S,
            front_end_window: HIT_WINDOW_S,
            strum_leniency: STRUM_LENIENCY_S,
            hopo_leniency: HOPO_LENIENCY_S,
            sustain_end_leniency: SUSTAIN_END_LENIENCY_S,
            flags: EngineFlags::CAN_CHORD_SKIP
                | EngineFlags::PUNISH_CHORD_SKIP
                | EngineFlags::LINKED_DISJOINTS,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::default_five_fret()
    }
}
