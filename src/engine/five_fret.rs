use std::collections::VecDeque;
use std::sync::Arc;

use log::{debug, info, warn};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::chart::Chart;
use crate::chart::note::{Fret, NoteKind};
use crate::chart::shape::{ChordShape, FretState, NUM_FRETS};
use crate::engine::Engine;
use crate::engine::input::{GuitarButton, InputEvent};
use crate::engine::judgment::{
    FcType, Grade, JudgeGrade, JudgedHit, Judgement, accuracy_weight, classify_offset_s,
    default_judgements, grade_for_accuracy,
};
use crate::engine::results::Results;
use crate::engine::sustain::Sustain;
use crate::settings::{EngineFlags, EngineSettings};

/// Base points per member note of a hit chord, before the multiplier.
const BASE_NOTE_SCORE: u32 = 50;
/// Sustain points earned per quarter note held.
const SUSTAIN_POINTS_PER_BEAT: f32 = 25.0;
/// Meter gained by completing an active, unbroken starpower phase.
const STARPOWER_PHASE_GAIN: f32 = 0.25;
const MAX_MULTIPLIER: u32 = 4;

/// The five-fret judgment state machine.
///
/// The host advances it once per tick with the current chart time after
/// queueing that tick's input edges. Events drain in FIFO order, which is
/// also time order; chart time never moves backwards. Chords resolve
/// front-to-back through an index cursor over the pre-sorted chord arena,
/// so "already resolved" is a tombstone check, never a list removal.
pub struct FiveFretEngine {
    chart: Chart,
    settings: EngineSettings,
    judgements: Vec<Judgement>,

    input_queue: VecDeque<InputEvent>,
    /// Cursor to the first unresolved chord.
    current: usize,
    active_sustains: Vec<Sustain>,

    /// Rolling live fretting, updated synchronously on every fret edge.
    last_chord_shape: ChordShape,
    /// Shape consumed by the most recent no-strum tap/hopo hit; cleared the
    /// instant the live fretting stops matching it. Open means "nothing
    /// consumed".
    tap_shape: ChordShape,
    last_fret_time: f32,
    /// Time of the most recent strum that has not yet hit anything. It is
    /// consumed by a matching fret change within the strum leniency or
    /// expires into an overstrum.
    last_strum_time: Option<f32>,
    last_tap_hit_time: Option<f32>,
    /// High-water mark of time already resolved.
    processed_time: f32,

    sp_index: usize,
    sp_active: bool,
    sp_phase_broken: bool,
    sp_meter: f32,

    solo_index: usize,
    solo_active: bool,
    solo_hits: u32,
    solo_attempts: u32,

    score: u32,
    streak: u32,
    max_streak: u32,
    hits: u32,
    misses: u32,
    overstrums: u32,
    acc_weight_sum: f32,
    judgement_counts: FxHashMap<JudgeGrade, u32>,
    history: Vec<JudgedHit>,
    latest_judgement: Option<JudgeGrade>,
    latest_judgement_time: f32,
}

impl FiveFretEngine {
    pub fn new(chart: Chart, settings: EngineSettings) -> Self {
        let judgements = default_judgements(settings.hit_window);
        info!(
            "FiveFretEngine ready: {} chords, hit window {:.0}ms.",
            chart.chords.len(),
            settings.hit_window * 1000.0
        );
        Self {
            chart,
            settings,
            judgements,
            input_queue: VecDeque::new(),
            current: 0,
            active_sustains: Vec::new(),
            last_chord_shape: ChordShape::OPEN,
            tap_shape: ChordShape::OPEN,
            last_fret_time: f32::NEG_INFINITY,
            last_strum_time: None,
            last_tap_hit_time: None,
            processed_time: f32::NEG_INFINITY,
            sp_index: 0,
            sp_active: false,
            sp_phase_broken: false,
            sp_meter: 0.0,
            solo_index: 0,
            solo_active: false,
            solo_hits: 0,
            solo_attempts: 0,
            score: 0,
            streak: 0,
            max_streak: 0,
            hits: 0,
            misses: 0,
            overstrums: 0,
            acc_weight_sum: 0.0,
            judgement_counts: FxHashMap::default(),
            history: Vec::new(),
            latest_judgement: None,
            latest_judgement_time: 0.0,
        }
    }

    // --- Observers ------------------------------------------------------

    #[inline(always)]
    pub fn chart(&self) -> &Chart {
        &self.chart
    }

    #[inline(always)]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    #[inline(always)]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[inline(always)]
    pub fn streak(&self) -> u32 {
        self.streak
    }

    #[inline(always)]
    pub fn max_streak(&self) -> u32 {
        self.max_streak
    }

    #[inline(always)]
    pub fn multiplier(&self) -> u32 {
        (self.streak / 10 + 1).min(MAX_MULTIPLIER)
    }

    #[inline(always)]
    pub fn hits(&self) -> u32 {
        self.hits
    }

    #[inline(always)]
    pub fn misses(&self) -> u32 {
        self.misses
    }

    #[inline(always)]
    pub fn overstrums(&self) -> u32 {
        self.overstrums
    }

    /// Strikeline highlight state, one flag per fret slot.
    pub fn keystate(&self) -> [bool; NUM_FRETS] {
        std::array::from_fn(|i| self.last_chord_shape.is_pressed(i))
    }

    #[inline(always)]
    pub fn star_power_meter(&self) -> f32 {
        self.sp_meter
    }

    #[inline(always)]
    pub fn star_power_active(&self) -> bool {
        self.sp_active
    }

    #[inline(always)]
    pub fn solo_hits(&self) -> u32 {
        self.solo_hits
    }

    #[inline(always)]
    pub fn solo_attempts(&self) -> u32 {
        self.solo_attempts
    }

    #[inline(always)]
    pub fn latest_judgement(&self) -> Option<JudgeGrade> {
        self.latest_judgement
    }

    #[inline(always)]
    pub fn latest_judgement_time(&self) -> f32 {
        self.latest_judgement_time
    }

    #[inline(always)]
    pub fn last_fret_time(&self) -> f32 {
        self.last_fret_time
    }

    #[inline(always)]
    pub fn processed_time(&self) -> f32 {
        self.processed_time
    }

    pub fn judgement_counts(&self) -> &FxHashMap<JudgeGrade, u32> {
        &self.judgement_counts
    }

    pub fn history(&self) -> &[JudgedHit] {
        &self.history
    }

    /// Mean accuracy weight over resolved chords; 1.0 before anything has
    /// resolved.
    pub fn accuracy(&self) -> f32 {
        let resolved = self.hits + self.misses;
        if resolved == 0 {
            1.0
        } else {
            self.acc_weight_sum / resolved as f32
        }
    }

    pub fn grade(&self) -> Grade {
        grade_for_accuracy(self.accuracy())
    }

    pub fn fc_type(&self) -> FcType {
        if self.misses == 0 && self.overstrums == 0 {
            FcType::FullCombo
        } else {
            FcType::Clear
        }
    }

    // --- Time advancement -----------------------------------------------

    /// Resolve everything chronologically due up to `t`: expired armed
    /// strums, sustain frets past their natural ends, pre-fretted
    /// auto-hits, overdue front-chord misses, and phase cursors.
    fn process_to_time(&mut self, t: f32) {
        let t = t.max(self.processed_time);

        if let Some(t0) = self.last_strum_time
            && t > t0 + self.settings.strum_leniency
        {
            self.last_strum_time = None;
            self.overstrum(t0 + self.settings.strum_leniency);
        }

        let mut i = 0;
        while i < self.active_sustains.len() {
            self.active_sustains[i].finish_ended_frets(t, self.settings.sustain_end_leniency);
            if self.active_sustains[i].is_finished() {
                let s = self.active_sustains.swap_remove(i);
                self.commit_sustain(&s);
            } else {
                i += 1;
            }
        }

        if self.settings.flags.contains(EngineFlags::INFINITE_FRONT_END) {
            while let Some(ci) = self.front_chord() {
                let (chord_time, kind) = {
                    let c = &self.chart.chords[ci];
                    (c.time, c.kind)
                };
                if chord_time > t + self.settings.front_end_window {
                    break;
                }
                let eligible = match kind {
                    NoteKind::Tap => true,
                    NoteKind::Hopo => self.streak > 0,
                    NoteKind::Strum => false,
                };
                if !eligible
                    || !self.tap_shape.is_open()
                    || !self.ghost_shape(t).matches(self.required_shape(ci))
                {
                    break;
                }
                self.tap_shape = self.last_chord_shape;
                self.last_tap_hit_time = Some(t);
                self.hit_chord(ci, t);
            }
        }

        while let Some(ci) = self.front_chord() {
            if self.chart.chords[ci].time + self.settings.hit_window >= t {
                break;
            }
            self.miss_chord(ci);
        }

        self.advance_phases(t);
        self.processed_time = t;
    }

    /// Starpower and solo phase cursors are driven purely by event
    /// timestamps, independent of chord boundaries.
    fn advance_phases(&mut self, t: f32) {
        loop {
            let Some(ev) = self.chart.starpower.get(self.sp_index) else { break };
            let (start, end) = (ev.time, ev.end_time());
            if !self.sp_active {
                if start > t {
                    break;
                }
                self.sp_active = true;
                self.sp_phase_broken = false;
            } else if end <= t {
                if !self.sp_phase_broken {
                    self.sp_meter = (self.sp_meter + STARPOWER_PHASE_GAIN).min(1.0);
                    info!("Starpower phase {} complete, meter {:.2}", self.sp_index, self.sp_meter);
                }
                self.sp_active = false;
                self.sp_index += 1;
            } else {
                break;
            }
        }
        loop {
            let Some(ev) = self.chart.solos.get(self.solo_index) else { break };
            let (start, end) = (ev.time, ev.end_time());
            if !self.solo_active {
                if start > t {
                    break;
                }
                self.solo_active = true;
                self.solo_hits = 0;
                self.solo_attempts = 0;
            } else if end <= t {
                info!("Solo {} complete: {}/{}", self.solo_index, self.solo_hits, self.solo_attempts);
                self.solo_active = false;
                self.solo_index += 1;
            } else {
                break;
            }
        }
    }

    // --- Input handling -------------------------------------------------

    fn on_fret_change(&mut self, slot: usize, pressed: bool, time: f32) {
        self.last_chord_shape.update_fret(slot, pressed);
        self.last_fret_time = time;

        // A tap consumption is invalidated the moment the fretting moves
        // away from the consumed shape.
        if !self.tap_shape.is_open() && !self.last_chord_shape.matches(self.tap_shape) {
            self.tap_shape = ChordShape::OPEN;
        }

        self.update_sustains_on_fret_change(time);

        let Some(ci) = self.front_chord() else { return };
        let (chord_time, kind) = {
            let c = &self.chart.chords[ci];
            (c.time, c.kind)
        };
        if (time - chord_time).abs() > self.settings.hit_window {
            return;
        }
        if !self.ghost_shape(time).matches(self.required_shape(ci)) {
            return;
        }

        // An armed strum claims the chord first.
        if let Some(t0) = self.last_strum_time
            && time - t0 <= self.settings.strum_leniency
        {
            self.last_strum_time = None;
            self.hit_chord(ci, time);
            return;
        }

        let no_strum_ok = match kind {
            NoteKind::Tap => true,
            // A hopo needs a live streak, except at the very front of the
            // chart where there is nothing to have streaked on.
            NoteKind::Hopo => self.streak > 0 || ci == 0,
            NoteKind::Strum => false,
        };
        if no_strum_ok && self.tap_shape.is_open() {
            self.tap_shape = self.last_chord_shape;
            self.last_tap_hit_time = Some(time);
            self.hit_chord(ci, time);
        }
    }

    fn on_strum(&mut self, time: f32) {
        // A second strum expires any armed one first.
        if let Some(t0) = self.last_strum_time.take() {
            self.overstrum((t0 + self.settings.strum_leniency).min(time));
        }

        let front = self
            .front_chord()
            .filter(|&ci| (time - self.chart.chords[ci].time).abs() <= self.settings.hit_window);
        let Some(ci) = front else {
            // Forgive a strum right on the heels of a leniently hit
            // tap/hopo.
            if self
                .last_tap_hit_time
                .is_some_and(|t0| time - t0 <= self.settings.hopo_leniency)
            {
                return;
            }
            self.overstrum(time);
            return;
        };
        let ghost = self.ghost_shape(time);
        if ghost.matches(self.required_shape(ci)) {
            self.hit_chord(ci, time);
            return;
        }

        if self.settings.flags.contains(EngineFlags::CAN_CHORD_SKIP) {
            let mut j = ci + 1;
            while j < self.chart.chords.len()
                && self.chart.chords[j].time - time <= self.settings.hit_window
            {
                if !self.chart.chord_is_resolved(j) && ghost.matches(self.required_shape(j)) {
                    if self.settings.flags.contains(EngineFlags::PUNISH_CHORD_SKIP) {
                        for k in ci..j {
                            if !self.chart.chord_is_resolved(k) {
                                self.miss_chord(k);
                            }
                        }
                    }
                    self.hit_chord(j, time);
                    return;
                }
                j += 1;
            }
        }

        // An in-window chord without matching fretting: arm the strum and
        // let a fret change consume it within the leniency.
        self.last_strum_time = Some(time);
    }

    /// Sustain upkeep on a fret edge: break what the player let go of,
    /// ghost individually-anchored frets that were over-pressed.
    fn update_sustains_on_fret_change(&mut self, time: f32) {
        let live = self.last_chord_shape;
        let linked = self.settings.flags.contains(EngineFlags::LINKED_DISJOINTS);
        // Fretting the next chord on top of a sustain is not over-pressing.
        let extending = self.fretting_extends_front(time);

        let mut i = 0;
        while i < self.active_sustains.len() {
            let req = self.active_sustains[i].get_shape_at_time(time);
            if !live.contains(req) {
                if linked || !self.active_sustains[i].is_disjoint() {
                    let mut s = self.active_sustains.swap_remove(i);
                    s.drop_sustain(time, None);
                    debug!("Sustain for chord {} broken at {time:.3}s", s.chord);
                    self.commit_sustain(&s);
                    continue;
                }
                // Unlinked disjoints: only the released frets drop.
                let released: SmallVec<[Fret; 5]> = self.active_sustains[i]
                    .frets
                    .iter()
                    .filter(|fd| fd.drop.is_none() && fd.end >= time)
                    .filter(|fd| {
                        fd.fret.slot().is_some_and(|slot| {
                            req.slot(slot) == FretState::Pressed
                                && live.slot(slot) != FretState::Pressed
                        })
                    })
                    .map(|fd| fd.fret)
                    .collect();
                self.active_sustains[i].drop_sustain(time, Some(&released));
            } else {
                let anchored = self.active_sustains[i].is_single()
                    || self.active_sustains[i].kind == NoteKind::Tap;
                if anchored && !extending {
                    // A fret pressed above an anchored sustain ghosts it.
                    let offending: SmallVec<[Fret; 5]> = self.active_sustains[i]
                        .frets
                        .iter()
                        .filter(|fd| fd.drop.is_none() && fd.end >= time)
                        .filter(|fd| {
                            fd.fret.slot().is_some_and(|slot| {
                                (slot + 1..NUM_FRETS).any(|hi| {
                                    live.slot(hi) == FretState::Pressed
                                        && req.slot(hi) == FretState::Released
                                })
                            })
                        })
                        .map(|fd| fd.fret)
                        .collect();
                    if !offending.is_empty() {
                        if offending.len() >= self.active_sustains[i].active_fret_count(time) {
                            // Nothing satisfiable remains; end it as a unit.
                            self.active_sustains[i].finish_sustain(time, None);
                        } else {
                            self.active_sustains[i].drop_sustain(time, Some(&offending));
                        }
                    }
                }
            }
            if self.active_sustains[i].is_finished() {
                let s = self.active_sustains.swap_remove(i);
                self.commit_sustain(&s);
                continue;
            }
            i += 1;
        }
    }

    fn fretting_extends_front(&mut self, time: f32) -> bool {
        let Some(ci) = self.front_chord() else { return false };
        let chord_time = self.chart.chords[ci].time;
        (time - chord_time).abs() <= self.settings.hit_window
            && self.ghost_shape(time).matches(self.required_shape(ci))
    }

    /// The live fretting with every slot held solely for a sustain masked
    /// to `DontCare`, so holding a sustain never blocks the next chord.
    fn ghost_shape(&self, time: f32) -> ChordShape {
        let mut ghost = self.last_chord_shape;
        for s in &self.active_sustains {
            for slot in 0..NUM_FRETS {
                if ghost.slot(slot) == FretState::Pressed && s.holds_slot(slot, time) {
                    ghost.set_slot(slot, FretState::DontCare);
                }
            }
        }
        ghost
    }

    /// The fretting a chord demands: member slots pressed, the rest
    /// released; open chords demand the all-released shape. Single notes
    /// and tap/hopo chords anchor the slots below their lowest lane.
    fn required_shape(&self, ci: usize) -> ChordShape {
        let c = &self.chart.chords[ci];
        let mut shape = c.shape;
        if let Some(lowest) = c.lowest_fret {
            let anchored = c.size() == 1 || matches!(c.kind, NoteKind::Tap | NoteKind::Hopo);
            if anchored {
                for slot in 0..lowest {
                    shape.set_slot(slot, FretState::DontCare);
                }
            }
        }
        shape
    }

    /// First unresolved chord, advancing the cursor past tombstones.
    fn front_chord(&mut self) -> Option<usize> {
        while self.current < self.chart.chords.len() && self.chart.chord_is_resolved(self.current) {
            self.current += 1;
        }
        (self.current < self.chart.chords.len()).then_some(self.current)
    }

    // --- Resolution -----------------------------------------------------

    fn hit_chord(&mut self, ci: usize, time: f32) {
        let chord_time = self.chart.chords[ci].time;
        self.advance_phases(chord_time);
        if !self.chart.set_chord_hit(ci, time) {
            return;
        }
        let (size, length) = {
            let c = &self.chart.chords[ci];
            (c.size() as u32, c.length)
        };
        self.streak += 1;
        self.max_streak = self.max_streak.max(self.streak);
        self.hits += 1;
        self.score += BASE_NOTE_SCORE * size * self.multiplier();

        let offset = time - chord_time;
        let grade = classify_offset_s(offset, &self.judgements);
        self.acc_weight_sum += accuracy_weight(grade, &self.judgements);
        *self.judgement_counts.entry(grade).or_insert(0) += 1;
        self.history.push(JudgedHit { time, offset_s: Some(offset), grade });
        self.latest_judgement = Some(grade);
        self.latest_judgement_time = time;
        self.note_solo_resolution(chord_time, true);

        if length > 0.0 {
            self.active_sustains.push(Sustain::new(&self.chart, ci));
        }
        debug!(
            "HIT chord {ci} ({grade:?}) offset_ms={:.2} streak={}",
            offset * 1000.0,
            self.streak
        );
    }

    fn miss_chord(&mut self, ci: usize) {
        let chord_time = self.chart.chords[ci].time;
        self.advance_phases(chord_time);
        if !self.chart.set_chord_missed(ci) {
            return;
        }
        self.streak = 0;
        self.misses += 1;
        // A miss inside the active phase forfeits its meter gain.
        if self.sp_active {
            self.sp_phase_broken = true;
        }
        *self.judgement_counts.entry(JudgeGrade::Miss).or_insert(0) += 1;
        self.history.push(JudgedHit { time: chord_time, offset_s: None, grade: JudgeGrade::Miss });
        self.latest_judgement = Some(JudgeGrade::Miss);
        self.latest_judgement_time = chord_time;
        self.note_solo_resolution(chord_time, false);
        debug!("MISS chord {ci} at {chord_time:.3}s");
    }

    fn note_solo_resolution(&mut self, chord_time: f32, hit: bool) {
        if self.solo_active
            && let Some(ev) = self.chart.solos.get(self.solo_index)
            && ev.contains_time(chord_time)
        {
            self.solo_attempts += 1;
            if hit {
                self.solo_hits += 1;
            }
        }
    }

    fn overstrum(&mut self, time: f32) {
        debug!("OVERSTRUM at {time:.3}s, streak {} lost", self.streak);
        self.overstrums += 1;
        let mut drained = std::mem::take(&mut self.active_sustains);
        for s in &mut drained {
            s.drop_sustain(time, None);
            self.commit_sustain(s);
        }
        self.streak = 0;
    }

    // --- Sustain scoring ------------------------------------------------

    /// Raw (pre-multiplier, un-rounded) sustain score: per fret, the held
    /// fraction of the note times its tick length, at 25 points per
    /// quarter note.
    pub fn get_sustain_score(&self, s: &Sustain) -> f32 {
        let mut raw = 0.0_f32;
        for fd in &s.frets {
            let note = &self.chart.notes[fd.note];
            if note.length <= 0.0 {
                continue;
            }
            let Some(drop) = fd.drop else { continue };
            let held = ((drop - note.time) / note.length).clamp(0.0, 1.0);
            raw += held * note.tick_length as f32 * SUSTAIN_POINTS_PER_BEAT
                / self.chart.resolution as f32;
        }
        raw
    }

    fn commit_sustain(&mut self, s: &Sustain) {
        if !s.is_finished() {
            warn!("Committing an unfinished sustain for chord {}", s.chord);
        }
        let points = self.get_sustain_score(s).ceil() as u32 * self.multiplier();
        self.score += points;
        debug!("Sustain for chord {} banked {points} points", s.chord);
    }
}

impl Engine for FiveFretEngine {
    fn update(&mut self, chart_time: f32) {
        while let Some(ev) = self.input_queue.pop_front() {
            self.process_to_time(ev.time);
            match ev.button.fret_slot() {
                Some(slot) => self.on_fret_change(slot, ev.pressed, ev.time),
                None => {
                    if ev.pressed {
                        self.on_strum(ev.time);
                    }
                }
            }
        }
        self.process_to_time(chart_time);
    }

    fn on_button_press(&mut self, button: GuitarButton, time: f32) {
        self.input_queue.push_back(InputEvent { time, button, pressed: true });
    }

    fn on_button_release(&mut self, button: GuitarButton, time: f32) {
        self.input_queue.push_back(InputEvent { time, button, pressed: false });
    }

    fn generate_results(&self) -> Results {
        Results {
            chart: Arc::new(self.chart.clone()),
            hit_window: self.settings.hit_window,
            judgements: self.judgements.clone(),
            history: self.history.clone(),
            score: self.score,
            hits: self.hits,
            misses: self.misses,
            overstrums: self.overstrums,
            accuracy: self.accuracy(),
            grade: self.grade(),
            fc_type: self.fc_type(),
            streak: self.streak,
            max_streak: self.max_streak,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FiveFretEngine;
    use crate::chart::note::RawNote;
    use crate::chart::{Chart, RawChart};
    use crate::engine::Engine;
    use crate::engine::input::GuitarButton;
    use crate::engine::judgment::{FcType, JudgeGrade};
    use crate::settings::{EngineFlags, EngineSettings};

    fn chart_from(notes: &[(u32, u8, u32)]) -> Chart {
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

    fn engine(notes: &[(u32, u8, u32)]) -> FiveFretEngine {
        FiveFretEngine::new(chart_from(notes), EngineSettings::default_five_fret())
    }

    #[test]
    fn scenario_a_strum_then_hopo() {
        // Green strum at t=0.0, forced red hopo one beat later at t=0.5.
        let mut eng = engine(&[(0, 0, 0), (192, 1, 0), (192, 5, 0)]);
        eng.on_button_press(GuitarButton::Green, 0.0);
        eng.on_button_press(GuitarButton::StrumDown, 0.0);
        eng.update(0.1);
        assert_eq!(eng.score(), 50);
        assert_eq!(eng.streak(), 1);
        assert!(eng.chart().chord_is_hit(0));

        eng.on_button_release(GuitarButton::Green, 0.5);
        eng.on_button_press(GuitarButton::Red, 0.5);
        eng.update(0.6);
        assert_eq!(eng.score(), 100, "the hopo lands without a strum");
        assert_eq!(eng.streak(), 2);
        assert_eq!(eng.max_streak(), 2);
        assert_eq!(eng.misses(), 0);
    }

    #[test]
    fn scenario_b_silent_chart_misses_everything() {
        let mut eng = engine(&[(0, 0, 0), (192, 1, 0), (192, 5, 0)]);
        eng.update(0.58);
        assert_eq!(eng.misses(), 2);
        assert_eq!(eng.score(), 0);
        assert_eq!(eng.streak(), 0);
        assert_eq!(eng.max_streak(), 0);
        assert!(eng.chart().chord_is_missed(0) && eng.chart().chord_is_missed(1));
        assert_eq!(eng.chart().chord_hit_time(0), Some(f32::INFINITY));

        // Misses are final: later input cannot revive the chords.
        eng.on_button_press(GuitarButton::Green, 0.6);
        eng.update(0.7);
        assert_eq!(eng.hits(), 0);
        assert!(eng.chart().chord_is_missed(0));
        assert_eq!(eng.latest_judgement(), Some(JudgeGrade::Miss));
    }

    #[test]
    fn scenario_c_full_sustain_scores_fifty() {
        // One green note, two beats long: tick_length 384, one second.
        let mut eng = engine(&[(0, 0, 384)]);
        eng.on_button_press(GuitarButton::Green, 0.0);
        eng.on_button_press(GuitarButton::StrumDown, 0.0);
        eng.update(0.1);
        assert_eq!(eng.score(), 50);
        eng.update(1.02);
        assert_eq!(eng.score(), 100, "full hold banks ceil(50.0) * 1");
    }

    #[test]
    fn sustain_score_is_monotonic_in_held_duration() {
        let mut scores = Vec::new();
        for release_at in [0.2_f32, 0.5, 0.9] {
            let mut eng = engine(&[(0, 0, 384)]);
            eng.on_button_press(GuitarButton::Green, 0.0);
            eng.on_button_press(GuitarButton::StrumDown, 0.0);
            eng.update(0.1);
            eng.on_button_release(GuitarButton::Green, release_at);
            eng.update(1.2);
            scores.push(eng.score());
        }
        assert!(scores[0] < scores[1] && scores[1] < scores[2], "longer holds never score less: {scores:?}");
        assert_eq!(scores[2], 50 + 45, "0.9s of a 1.0s hold is 45 of 50 points");
    }

    #[test]
    fn overstrum_grace_after_tap_hit() {
        let mut eng = engine(&[(192, 0, 0), (192, 6, 0)]);
        eng.on_button_press(GuitarButton::Green, 0.5);
        eng.update(0.51);
        assert_eq!(eng.streak(), 1, "tap hits without a strum");

        // Inside the hopo leniency the strum is forgiven.
        eng.on_button_press(GuitarButton::StrumDown, 0.55);
        eng.update(0.56);
        assert_eq!(eng.overstrums(), 0);
        assert_eq!(eng.streak(), 1);

        // Past it, an identical strum is punished.
        eng.on_button_press(GuitarButton::StrumUp, 0.70);
        eng.update(0.71);
        assert_eq!(eng.overstrums(), 1);
        assert_eq!(eng.streak(), 0);
        assert_eq!(eng.fc_type(), FcType::Clear);
    }

    #[test]
    fn armed_strum_is_consumed_by_late_fretting() {
        let mut eng = engine(&[(192, 0, 0)]);
        eng.on_button_press(GuitarButton::Red, 0.45);
        eng.on_button_press(GuitarButton::StrumDown, 0.46);
        eng.on_button_release(GuitarButton::Red, 0.48);
        eng.on_button_press(GuitarButton::Green, 0.48);
        eng.update(0.5);
        assert_eq!(eng.hits(), 1, "the armed strum claims the corrected fretting");
        assert_eq!(eng.overstrums(), 0);
        assert_eq!(eng.streak(), 1);
    }

    #[test]
    fn armed_strum_expires_into_an_overstrum() {
        let mut eng = engine(&[(192, 0, 0)]);
        eng.on_button_press(GuitarButton::Red, 0.45);
        eng.on_button_press(GuitarButton::StrumDown, 0.46);
        eng.update(0.8);
        assert_eq!(eng.overstrums(), 1, "exactly one punishment for the armed strum");
        assert_eq!(eng.misses(), 1, "the chord still times out");
        assert_eq!(eng.hits(), 0);
    }

    #[test]
    fn chord_skip_hits_the_matching_later_chord_and_punishes() {
        // Green at 0.5s and red 20 ticks later, both inside the window of a
        // strum at the red chord's time.
        let mut eng = engine(&[(192, 0, 0), (212, 1, 0)]);
        eng.on_button_press(GuitarButton::Red, 0.54);
        eng.on_button_press(GuitarButton::StrumDown, 0.552);
        eng.update(0.6);
        assert!(eng.chart().chord_is_missed(0), "the skipped chord is punished");
        assert!(eng.chart().chord_is_hit(1));
        assert_eq!(eng.streak(), 1);
        assert_eq!(eng.misses(), 1);
    }

    #[test]
    fn tap_consumption_blocks_a_second_hit_until_refretted() {
        // Two green taps an eighth note apart.
        let mut eng = engine(&[(0, 0, 0), (0, 6, 0), (96, 0, 0), (96, 6, 0)]);
        eng.on_button_press(GuitarButton::Green, 0.0);
        eng.update(0.05);
        assert_eq!(eng.hits(), 1, "holding the consumed shape must not hit the second tap");

        eng.on_button_release(GuitarButton::Green, 0.24);
        eng.on_button_press(GuitarButton::Green, 0.25);
        eng.update(0.3);
        assert_eq!(eng.hits(), 2, "re-fretting clears the consumption");
        assert_eq!(eng.streak(), 2);
    }

    #[test]
    fn infinite_front_end_auto_hits_a_prefretted_tap() {
        let mut settings = EngineSettings::default_five_fret();
        settings.flags |= EngineFlags::INFINITE_FRONT_END;
        let mut eng = FiveFretEngine::new(chart_from(&[(192, 0, 0), (192, 6, 0)]), settings);
        eng.on_button_press(GuitarButton::Green, 0.30);
        eng.update(0.35);
        assert_eq!(eng.hits(), 0, "outside the front-end window nothing fires");
        eng.update(0.45);
        assert_eq!(eng.hits(), 1, "the window opening auto-hits the held shape");
        assert_eq!(eng.streak(), 1);
    }

    #[test]
    fn starpower_phase_completion_fills_the_meter() {
        let mut chart_raw = RawChart {
            resolution: 192,
            notes: vec![RawNote { tick: 0, lane: 0, tick_length: 0 }, RawNote {
                tick: 192,
                lane: 0,
                tick_length: 0,
            }],
            bpm_changes: vec![(0, 120.0)],
            ..Default::default()
        };
        chart_raw.starpower = vec![(0, 576)];
        let mut eng =
            FiveFretEngine::new(Chart::new(chart_raw.clone()), EngineSettings::default_five_fret());
        eng.on_button_press(GuitarButton::Green, 0.0);
        eng.on_button_press(GuitarButton::StrumDown, 0.0);
        eng.update(0.1);
        eng.on_button_press(GuitarButton::StrumDown, 0.5);
        eng.update(2.0);
        assert_eq!(eng.hits(), 2);
        assert!((eng.star_power_meter() - 0.25).abs() < f32::EPSILON);

        // The same phase with a miss inside it grants nothing.
        let mut broken =
            FiveFretEngine::new(Chart::new(chart_raw), EngineSettings::default_five_fret());
        broken.update(2.0);
        assert_eq!(broken.misses(), 2);
        assert_eq!(broken.star_power_meter(), 0.0);
    }

    #[test]
    fn solo_counters_track_hits_and_attempts() {
        let mut chart_raw = RawChart {
            resolution: 192,
            notes: vec![RawNote { tick: 0, lane: 0, tick_length: 0 }, RawNote {
                tick: 192,
                lane: 1,
                tick_length: 0,
            }],
            bpm_changes: vec![(0, 120.0)],
            ..Default::default()
        };
        chart_raw.solos = vec![(0, 384)];
        let mut eng =
            FiveFretEngine::new(Chart::new(chart_raw), EngineSettings::default_five_fret());
        eng.on_button_press(GuitarButton::Green, 0.0);
        eng.on_button_press(GuitarButton::StrumDown, 0.0);
        eng.update(0.9);
        assert_eq!(eng.solo_hits(), 1);
        assert_eq!(eng.solo_attempts(), 2, "the timed-out chord counts as an attempt");
    }

    #[test]
    fn hit_and_miss_are_idempotent() {
        let mut eng = engine(&[(0, 0, 0)]);
        eng.hit_chord(0, 0.01);
        let (score, streak, hits) = (eng.score(), eng.streak(), eng.hits());
        eng.hit_chord(0, 0.02);
        eng.miss_chord(0);
        assert_eq!(eng.score(), score);
        assert_eq!(eng.streak(), streak);
        assert_eq!(eng.hits(), hits);
        assert_eq!(eng.misses(), 0);
    }

    #[test]
    fn overstrum_breaks_active_sustains() {
        let mut eng = engine(&[(0, 0, 384)]);
        eng.on_button_press(GuitarButton::Green, 0.0);
        eng.on_button_press(GuitarButton::StrumDown, 0.0);
        eng.update(0.1);
        eng.on_button_press(GuitarButton::StrumDown, 0.5);
        eng.update(0.6);
        assert_eq!(eng.overstrums(), 1);
        assert_eq!(eng.streak(), 0);
        // Half a hold banked at the broken multiplier.
        assert_eq!(eng.score(), 50 + 25);
        // Nothing further accrues after the break.
        eng.update(1.2);
        assert_eq!(eng.score(), 75);
    }

    #[test]
    fn hopo_extends_over_a_held_sustain() {
        // Green sustain, then a nearby red that classifies as a natural
        // hopo; fretting red over the held green must hit it and keep the
        // sustain alive.
        let mut eng = engine(&[(0, 0, 384), (48, 1, 0)]);
        eng.on_button_press(GuitarButton::Green, 0.0);
        eng.on_button_press(GuitarButton::StrumDown, 0.0);
        eng.update(0.05);
        assert_eq!(eng.hits(), 1);
        eng.on_button_press(GuitarButton::Red, 0.125);
        eng.update(0.2);
        assert_eq!(eng.hits(), 2, "the sustained green must not block the red hopo");
        eng.update(1.1);
        assert_eq!(eng.score(), 50 + 50 + 50, "the green sustain still pays out in full");
    }

    #[test]
    fn multiplier_ramps_at_ten_and_caps_at_four() {
        let notes: Vec<(u32, u8, u32)> = (0..45).map(|i| (i * 192, 0, 0)).collect();
        let mut eng = engine(&notes);
        eng.on_button_press(GuitarButton::Green, 0.0);
        for i in 0..45_u32 {
            let t = i as f32 * 0.5;
            eng.on_button_press(GuitarButton::StrumDown, t);
            eng.update(t + 0.01);
        }
        assert_eq!(eng.streak(), 45);
        assert_eq!(eng.multiplier(), 4);
        // 9 hits at 1x, then 10 at 2x, 10 at 3x, and 16 at 4x.
        let expected = 9 * 50 + 10 * 100 + 10 * 150 + 16 * 200;
        assert_eq!(eng.score(), expected);
    }

    #[test]
    fn disjoint_sustain_policy_follows_the_flag() {
        // Green held two beats, red one beat, hit together.
        let notes = [(0, 0, 384), (0, 1, 192)];
        let press = |eng: &mut FiveFretEngine| {
            eng.on_button_press(GuitarButton::Green, 0.0);
            eng.on_button_press(GuitarButton::Red, 0.0);
            eng.on_button_press(GuitarButton::StrumDown, 0.0);
            eng.update(0.1);
            eng.on_button_release(GuitarButton::Red, 0.3);
            eng.update(1.2);
        };

        let mut linked = engine(&notes);
        press(&mut linked);
        // Both frets break at 0.3: red 0.3/0.5 of 25, green 0.3/1.0 of 50,
        // on top of the 100-point two-note chord.
        assert_eq!(linked.score(), 100 + 30);

        let mut settings = EngineSettings::default_five_fret();
        settings.flags -= EngineFlags::LINKED_DISJOINTS;
        let mut unlinked = FiveFretEngine::new(chart_from(&notes), settings);
        press(&mut unlinked);
        // Only red breaks early; green rides out its full two beats.
        assert_eq!(unlinked.score(), 100 + 65);
    }

    #[test]
    fn results_snapshot_serializes() {
        let mut eng = engine(&[(0, 0, 0), (192, 1, 0)]);
        eng.on_button_press(GuitarButton::Green, 0.0);
        eng.on_button_press(GuitarButton::StrumDown, 0.0);
        eng.update(0.8);
        let results = eng.generate_results();
        assert_eq!(results.hits, 1);
        assert_eq!(results.misses, 1);
        assert_eq!(results.history.len(), 2);
        assert_eq!(results.fc_type, FcType::Clear);
        let json = results.to_json().expect("payload must serialize");
        assert!(json.contains("\"score\""));
        assert!(json.contains("\"history\""));
    }
}
