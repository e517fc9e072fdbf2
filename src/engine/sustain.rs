use log::warn;
use smallvec::SmallVec;

use crate::chart::Chart;
use crate::chart::note::{Fret, NoteKind};
use crate::chart::shape::{ChordShape, FretState};

/// Per-fret lifecycle record inside a [`Sustain`].
///
/// `drop` is the resolution timestamp, `None` while the fret is still
/// live. `dropped` distinguishes a broken fret from one that ran out
/// cleanly; `finish_sustain` leaves it unset.
#[derive(Clone, Debug)]
pub struct SustainFretData {
    /// Index of the member note in the chart arena.
    pub note: usize,
    pub fret: Fret,
    /// Natural end of this fret's hold, in chart seconds.
    pub end: f32,
    pub drop: Option<f32>,
    pub dropped: bool,
}

/// The held portion of a hit chord, created only when the chord's length is
/// nonzero. Fret records are a subset of the originating chord's frets and
/// resolve independently; the sustain finalizes once every fret has a drop
/// time, and that transition is one-way.
#[derive(Clone, Debug)]
pub struct Sustain {
    /// Index of the originating chord.
    pub chord: usize,
    /// Start of the hold, the chord's nominal time.
    pub start: f32,
    pub kind: NoteKind,
    pub frets: SmallVec<[SustainFretData; 5]>,
    finished: bool,
}

impl Sustain {
    pub fn new(chart: &Chart, chord_index: usize) -> Self {
        let chord = &chart.chords[chord_index];
        let frets = chord
            .notes
            .iter()
            .map(|&ni| {
                let note = &chart.notes[ni];
                SustainFretData {
                    note: ni,
                    fret: note.fret,
                    end: note.end_time(),
                    drop: None,
                    dropped: false,
                }
            })
            .collect();
        Self {
            chord: chord_index,
            start: chord.time,
            kind: chord.kind,
            frets,
            finished: false,
        }
    }

    #[inline(always)]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// True unless every member note shares an identical length.
    pub fn is_disjoint(&self) -> bool {
        self.frets
            .iter()
            .any(|fd| fd.end.to_bits() != self.frets[0].end.to_bits())
    }

    #[inline(always)]
    pub fn is_single(&self) -> bool {
        self.frets.len() == 1
    }

    /// Lowest member fret slot; `None` for open sustains.
    pub fn lowest_fret_slot(&self) -> Option<usize> {
        self.frets.iter().filter_map(|fd| fd.fret.slot()).min()
    }

    /// Frets still unresolved at `t` (drop unset, natural end not reached).
    pub fn active_fret_count(&self, t: f32) -> usize {
        self.frets
            .iter()
            .filter(|fd| fd.drop.is_none() && fd.end >= t)
            .count()
    }

    /// Whether the given shape slot is being held for this sustain at `t`.
    pub fn holds_slot(&self, slot: usize, t: f32) -> bool {
        self.frets.iter().any(|fd| {
            fd.fret.slot() == Some(slot) && fd.drop.is_none() && fd.end >= t
        })
    }

    /// Break the targeted frets (all when `frets` is `None`) at `time`.
    /// Already-resolved frets are skipped.
    pub fn drop_sustain(&mut self, time: f32, frets: Option<&[Fret]>) {
        self.resolve(time, frets, true);
    }

    /// Resolve the targeted frets cleanly at `time`: sets the drop time but
    /// not the `dropped` flag.
    pub fn finish_sustain(&mut self, time: f32, frets: Option<&[Fret]>) {
        self.resolve(time, frets, false);
    }

    fn resolve(&mut self, time: f32, targets: Option<&[Fret]>, broken: bool) {
        match targets {
            None => {
                for fd in &mut self.frets {
                    if fd.drop.is_none() {
                        fd.drop = Some(time);
                        fd.dropped = broken;
                    }
                }
            }
            Some(targets) => {
                for &fret in targets {
                    let Some(fd) = self.frets.iter_mut().find(|fd| fd.fret == fret) else {
                        // Out-of-band target; tolerated, not fatal.
                        warn!("Sustain for chord {} has no fret {fret:?}", self.chord);
                        continue;
                    };
                    if fd.drop.is_none() {
                        fd.drop = Some(time);
                        fd.dropped = broken;
                    }
                }
            }
        }
        self.refresh_finished();
    }

    /// Cleanly resolve every fret whose natural end has passed, crediting
    /// it at that end rather than at the observation time.
    pub fn finish_ended_frets(&mut self, t: f32, leniency: f32) {
        for fd in &mut self.frets {
            if fd.drop.is_none() && fd.end <= t + leniency {
                fd.drop = Some(fd.end);
            }
        }
        self.refresh_finished();
    }

    fn refresh_finished(&mut self) {
        if !self.finished {
            self.finished = self.frets.iter().all(|fd| fd.drop.is_some());
        }
    }

    /// The fretting this sustain requires at `t`.
    ///
    /// Anchor-eligible slots (single-note or tap sustain, below the lowest
    /// member fret) are `DontCare`; member frets still live at `t` are
    /// `Pressed`; everything else is `Released`. A resolved fret no longer
    /// constrains the shape.
    pub fn get_shape_at_time(&self, t: f32) -> ChordShape {
        let mut shape = ChordShape::OPEN;
        if (self.is_single() || self.kind == NoteKind::Tap)
            && let Some(lowest) = self.lowest_fret_slot()
        {
            for slot in 0..lowest {
                shape.set_slot(slot, FretState::DontCare);
            }
        }
        for fd in &self.frets {
            if let Some(slot) = fd.fret.slot()
                && fd.drop.is_none()
                && fd.end >= t
            {
                shape.set_slot(slot, FretState::Pressed);
            }
        }
        shape
    }
}

#[cfg(test)]
mod tests {
    use super::Sustain;
    use crate::chart::note::{Fret, RawNote};
    use crate::chart::shape::{ChordShape, FretState};
    use crate::chart::{Chart, RawChart};

    fn chart(notes: &[(u32, u8, u32)]) -> Chart {
        Chart::new(RawChart {
            resolution: 192,
            notes: notes
                .iter()
                .map(|&(tick, lane, tick_length)| RawNote { tick, lane, tick_length })
                .collect(),
            bpm_changes: vec![(0, 120.0)],
            ..Default::default()
        })
    }

    #[test]
    fn disjoint_means_unequal_lengths() {
        let even = chart(&[(0, 0, 384), (0, 1, 384)]);
        assert!(!Sustain::new(&even, 0).is_disjoint());
        let uneven = chart(&[(0, 0, 384), (0, 1, 192)]);
        assert!(Sustain::new(&uneven, 0).is_disjoint());
        let single = chart(&[(0, 2, 384)]);
        assert!(!Sustain::new(&single, 0).is_disjoint());
    }

    #[test]
    fn drop_and_finish_differ_only_in_the_broken_flag() {
        let c = chart(&[(0, 0, 384), (0, 1, 384)]);
        let mut broken = Sustain::new(&c, 0);
        broken.drop_sustain(0.4, None);
        assert!(broken.is_finished());
        assert!(broken.frets.iter().all(|fd| fd.dropped && fd.drop == Some(0.4)));

        let mut clean = Sustain::new(&c, 0);
        clean.finish_sustain(1.0, None);
        assert!(clean.is_finished());
        assert!(clean.frets.iter().all(|fd| !fd.dropped && fd.drop == Some(1.0)));
    }

    #[test]
    fn resolution_is_one_way_and_skips_already_dropped_frets() {
        let c = chart(&[(0, 0, 384), (0, 1, 192)]);
        let mut s = Sustain::new(&c, 0);
        s.drop_sustain(0.2, Some(&[Fret::Red]));
        assert!(!s.is_finished());
        s.finish_sustain(0.9, None);
        assert!(s.is_finished());
        let red = s.frets.iter().find(|fd| fd.fret == Fret::Red).unwrap();
        assert_eq!(red.drop, Some(0.2), "an already-dropped fret keeps its drop time");
        assert!(red.dropped);
        // Targeting a fret the sustain does not own is tolerated.
        s.drop_sustain(1.5, Some(&[Fret::Orange]));
        assert!(s.is_finished());
    }

    #[test]
    fn shape_anchors_below_a_single_sustained_fret() {
        let c = chart(&[(0, 2, 384)]);
        let s = Sustain::new(&c, 0);
        let shape = s.get_shape_at_time(0.5);
        assert_eq!(shape.slot(0), FretState::DontCare);
        assert_eq!(shape.slot(1), FretState::DontCare);
        assert_eq!(shape.slot(2), FretState::Pressed);
        assert_eq!(shape.slot(3), FretState::Released);
        assert_eq!(shape.slot(4), FretState::Released);
        // Past the natural end nothing is required.
        assert!(s.get_shape_at_time(1.5).matches(ChordShape::OPEN));
    }

    #[test]
    fn chord_sustains_require_exact_fretting() {
        let c = chart(&[(0, 0, 384), (0, 1, 384)]);
        let s = Sustain::new(&c, 0);
        let shape = s.get_shape_at_time(0.5);
        assert_eq!(shape.slot(0), FretState::Pressed);
        assert_eq!(shape.slot(1), FretState::Pressed);
        assert_eq!(shape.slot(2), FretState::Released);
    }

    #[test]
    fn ended_frets_finish_at_their_natural_end() {
        let c = chart(&[(0, 0, 192), (0, 1, 384)]);
        let mut s = Sustain::new(&c, 0);
        s.finish_ended_frets(0.52, 0.01);
        let green = s.frets.iter().find(|fd| fd.fret == Fret::Green).unwrap();
        assert_eq!(green.drop, Some(0.5), "credit stops at the natural end");
        assert!(!green.dropped);
        assert!(!s.is_finished());
        s.finish_ended_frets(1.01, 0.01);
        assert!(s.is_finished());
    }
}
