use smallvec::SmallVec;

use crate::chart::events::ChartEvent;
use crate::chart::note::{NoteFlag, NoteKind};
use crate::chart::shape::ChordShape;

/// Proximity cutoff for natural hammer-ons, in ticks: a 66/192 fraction of
/// a beat, matching the classic chart convention.
#[inline(always)]
pub fn hopo_cutoff_ticks(resolution: u32) -> u32 {
    resolution * 66 / 192
}

/// One or more notes sharing a tick, played as a unit.
///
/// Members are indices into the owning chart's note arena and are never
/// empty. `flag` is fixed once lanes 5/6 have been folded in; `kind` is
/// recomputed by [`classify_hopos`] as a pure function of flags, shapes and
/// tick distances.
#[derive(Clone, Debug)]
pub struct Chord {
    pub tick: u32,
    pub time: f32,
    /// Longest member note length.
    pub length: f32,
    pub notes: SmallVec<[usize; 5]>,
    pub flag: NoteFlag,
    pub kind: NoteKind,
    /// Exact fret requirement: member slots pressed, the rest released.
    /// The all-released shape marks an open chord.
    pub shape: ChordShape,
    /// Lowest member fret slot; `None` for open chords.
    pub lowest_fret: Option<usize>,
}

impl Chord {
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.notes.len()
    }

    #[inline(always)]
    pub fn is_open(&self) -> bool {
        self.lowest_fret.is_none()
    }

    #[inline(always)]
    pub fn end_time(&self) -> f32 {
        self.time + self.length
    }
}

impl ChartEvent for Chord {
    #[inline(always)]
    fn tick(&self) -> u32 {
        self.tick
    }

    #[inline(always)]
    fn time(&self) -> f32 {
        self.time
    }
}

/// Walks consecutive chord pairs and assigns each chord's final kind.
///
/// The kind is derived from immutable inputs only (tap/force flags, exact
/// shapes, tick distances), so reapplying the pass cannot change the
/// result. Rules, in order:
/// - a tap flag always wins;
/// - a shape that exactly repeats the previous chord's shape is never a
///   hammer-on, whatever the flags say;
/// - within the proximity cutoff the chord is a natural hammer-on and the
///   force flag inverts that; beyond it only the force flag makes one.
///
/// The first chord has no predecessor and counts as beyond the cutoff.
pub fn classify_hopos(chords: &mut [Chord], resolution: u32) {
    let cutoff = hopo_cutoff_ticks(resolution);
    let mut prev: Option<(u32, ChordShape)> = None;
    for chord in chords.iter_mut() {
        let same_shape = prev.is_some_and(|(_, shape)| shape == chord.shape);
        let near = prev.is_some_and(|(tick, _)| chord.tick - tick <= cutoff);
        chord.kind = match chord.flag {
            NoteFlag::Tap => NoteKind::Tap,
            flag => {
                let forced = flag == NoteFlag::Forced;
                if !same_shape && (near != forced) {
                    NoteKind::Hopo
                } else {
                    NoteKind::Strum
                }
            }
        };
        prev = Some((chord.tick, chord.shape));
    }
}

#[cfg(test)]
mod tests {
    use smallvec::smallvec;

    use super::{Chord, classify_hopos, hopo_cutoff_ticks};
    use crate::chart::note::{NoteFlag, NoteKind};
    use crate::chart::shape::ChordShape;

    fn chord(tick: u32, slot: usize, flag: NoteFlag) -> Chord {
        Chord {
            tick,
            time: tick as f32 / 384.0,
            length: 0.0,
            notes: smallvec![0],
            flag,
            kind: NoteKind::Strum,
            shape: ChordShape::from_fret(slot),
            lowest_fret: Some(slot),
        }
    }

    #[test]
    fn cutoff_is_66_ticks_at_default_resolution() {
        assert_eq!(hopo_cutoff_ticks(192), 66);
        assert_eq!(hopo_cutoff_ticks(480), 165);
    }

    #[test]
    fn near_different_shape_becomes_hopo() {
        let mut chords = vec![
            chord(0, 0, NoteFlag::None),
            chord(48, 1, NoteFlag::None),
            chord(480, 2, NoteFlag::None),
        ];
        classify_hopos(&mut chords, 192);
        assert_eq!(chords[0].kind, NoteKind::Strum);
        assert_eq!(chords[1].kind, NoteKind::Hopo);
        assert_eq!(chords[2].kind, NoteKind::Strum, "beyond the cutoff stays a strum");
    }

    #[test]
    fn force_flag_inverts_proximity() {
        let mut chords = vec![
            chord(0, 0, NoteFlag::None),
            chord(48, 1, NoteFlag::Forced),
            chord(480, 2, NoteFlag::Forced),
        ];
        classify_hopos(&mut chords, 192);
        assert_eq!(chords[1].kind, NoteKind::Strum, "forcing a natural hopo cancels it");
        assert_eq!(chords[2].kind, NoteKind::Hopo, "forcing a distant chord makes one");
    }

    #[test]
    fn repeated_shape_is_never_a_hopo() {
        let mut chords = vec![
            chord(0, 0, NoteFlag::None),
            chord(48, 0, NoteFlag::None),
            chord(96, 0, NoteFlag::Forced),
        ];
        classify_hopos(&mut chords, 192);
        assert_eq!(chords[1].kind, NoteKind::Strum);
        assert_eq!(chords[2].kind, NoteKind::Strum);
    }

    #[test]
    fn first_chord_counts_as_distant() {
        let mut forced = vec![chord(0, 0, NoteFlag::Forced)];
        classify_hopos(&mut forced, 192);
        assert_eq!(forced[0].kind, NoteKind::Hopo);

        let mut plain = vec![chord(0, 0, NoteFlag::None)];
        classify_hopos(&mut plain, 192);
        assert_eq!(plain[0].kind, NoteKind::Strum);
    }

    #[test]
    fn tap_flag_wins_and_pass_is_idempotent() {
        let mut chords = vec![
            chord(0, 0, NoteFlag::Tap),
            chord(48, 1, NoteFlag::None),
            chord(96, 1, NoteFlag::Forced),
            chord(600, 2, NoteFlag::Forced),
        ];
        classify_hopos(&mut chords, 192);
        assert_eq!(chords[0].kind, NoteKind::Tap);
        let first: Vec<NoteKind> = chords.iter().map(|c| c.kind).collect();
        classify_hopos(&mut chords, 192);
        let second: Vec<NoteKind> = chords.iter().map(|c| c.kind).collect();
        assert_eq!(first, second, "reclassification must not change any kind");
    }
}
