use crate::chart::events::ChartEvent;

// Parse-time-only lanes. Force/tap never survive into playable notes; they
// become the owning chord's flag during chart post-processing.
pub const LANE_FORCED: u8 = 5;
pub const LANE_TAP: u8 = 6;
pub const LANE_OPEN: u8 = 7;

/// Playable lane of a note: one of the five fret slots, or the open strum.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Fret {
    Green,
    Red,
    Yellow,
    Blue,
    Orange,
    Open,
}

impl Fret {
    /// Maps a chart lane to a playable fret. Lanes 5 and 6 are flag lanes,
    /// not frets, and map to `None`; so does anything out of range.
    #[inline(always)]
    pub fn from_lane(lane: u8) -> Option<Self> {
        match lane {
            0 => Some(Fret::Green),
            1 => Some(Fret::Red),
            2 => Some(Fret::Yellow),
            3 => Some(Fret::Blue),
            4 => Some(Fret::Orange),
            LANE_OPEN => Some(Fret::Open),
            _ => None,
        }
    }

    /// Shape slot index for this fret; `None` for the open lane.
    #[inline(always)]
    pub fn slot(self) -> Option<usize> {
        match self {
            Fret::Green => Some(0),
            Fret::Red => Some(1),
            Fret::Yellow => Some(2),
            Fret::Blue => Some(3),
            Fret::Orange => Some(4),
            Fret::Open => None,
        }
    }
}

/// Chord-level override carried by lanes 5/6. Tap wins when both are
/// present on the same tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum NoteFlag {
    #[default]
    None,
    Forced,
    Tap,
}

/// Final classification of a chord after the HOPO pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NoteKind {
    /// Requires a strum input.
    Strum,
    /// Hittable without a strum while the streak is alive.
    Hopo,
    /// Always hittable without a strum.
    Tap,
}

/// A raw chart note as delivered by the chart-loading collaborator:
/// tick-addressed, lane 0..=7, with flag lanes still present.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RawNote {
    pub tick: u32,
    pub lane: u8,
    pub tick_length: u32,
}

/// A playable note owned by exactly one [`Chart`](crate::chart::Chart).
///
/// Chart data (`tick`, `tick_length`, `fret`, `time`, `length`) is immutable
/// after construction. Runtime state is a tombstone: a note transitions at
/// most once from unresolved to hit or missed and is never removed from the
/// arena.
#[derive(Clone, Debug)]
pub struct Note {
    pub tick: u32,
    pub tick_length: u32,
    pub fret: Fret,
    pub time: f32,
    pub length: f32,
    pub hit: bool,
    pub missed: bool,
    pub hit_time: Option<f32>,
}

impl Note {
    #[inline(always)]
    pub fn end_time(&self) -> f32 {
        self.time + self.length
    }

    #[inline(always)]
    pub fn is_resolved(&self) -> bool {
        self.hit || self.missed
    }
}

impl ChartEvent for Note {
    #[inline(always)]
    fn tick(&self) -> u32 {
        self.tick
    }

    #[inline(always)]
    fn time(&self) -> f32 {
        self.time
    }
}
