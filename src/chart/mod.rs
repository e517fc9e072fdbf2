pub mod chord;
pub mod events;
pub mod note;
pub mod shape;
pub mod tempo;

use log::{info, warn};
use smallvec::SmallVec;

use crate::chart::chord::{Chord, classify_hopos};
use crate::chart::events::{
    Beat, BeatKind, BpmChange, Section, SoloEvent, StarpowerEvent, TimeSignature, last_at_time,
};
use crate::chart::note::{Fret, LANE_FORCED, LANE_OPEN, LANE_TAP, Note, NoteFlag, NoteKind, RawNote};
use crate::chart::shape::ChordShape;
use crate::chart::tempo::TempoMap;

/// Everything the chart-loading collaborator hands over, tick-addressed and
/// not yet post-processed. Lanes 5/6 may still be present in `notes`.
#[derive(Clone, Debug, Default)]
pub struct RawChart {
    /// Ticks per quarter note; 0 selects the default of 192.
    pub resolution: u32,
    pub notes: Vec<RawNote>,
    /// (tick, bpm)
    pub bpm_changes: Vec<(u32, f32)>,
    /// (tick, numerator, denominator)
    pub time_signatures: Vec<(u32, u32, u32)>,
    /// (tick, name)
    pub sections: Vec<(u32, String)>,
    /// (tick, tick_length)
    pub starpower: Vec<(u32, u32)>,
    /// (tick, tick_length)
    pub solos: Vec<(u32, u32)>,
}

/// A fully post-processed chart: the note arena, tick-grouped chords, and
/// time-resolved event streams, everything sorted in non-decreasing time
/// order. Built once at load time; the engine never re-sorts or removes,
/// it only flips per-note tombstones.
#[derive(Clone, Debug)]
pub struct Chart {
    pub resolution: u32,
    pub tempo: TempoMap,
    pub notes: Vec<Note>,
    pub chords: Vec<Chord>,
    pub bpm_changes: Vec<BpmChange>,
    pub time_signatures: Vec<TimeSignature>,
    pub sections: Vec<Section>,
    pub beats: Vec<Beat>,
    pub starpower: Vec<StarpowerEvent>,
    pub solos: Vec<SoloEvent>,
}

impl Chart {
    pub fn new(raw: RawChart) -> Self {
        let resolution = if raw.resolution == 0 {
            tempo::DEFAULT_RESOLUTION
        } else {
            raw.resolution
        };
        let tempo = TempoMap::new(resolution, &raw.bpm_changes);

        let mut raw_notes = raw.notes;
        raw_notes.sort_by_key(|n| (n.tick, n.lane));

        let mut notes: Vec<Note> = Vec::with_capacity(raw_notes.len());
        let mut chords: Vec<Chord> = Vec::new();
        let mut group_start = 0;
        while group_start < raw_notes.len() {
            let tick = raw_notes[group_start].tick;
            let mut group_end = group_start;
            while group_end < raw_notes.len() && raw_notes[group_end].tick == tick {
                group_end += 1;
            }
            build_chord(&raw_notes[group_start..group_end], &tempo, &mut notes, &mut chords);
            group_start = group_end;
        }

        classify_hopos(&mut chords, resolution);

        let bpm_changes = raw
            .bpm_changes
            .iter()
            .map(|&(tick, bpm)| BpmChange { tick, time: tempo.seconds_at_tick(tick), bpm })
            .collect();
        let mut time_signatures: Vec<TimeSignature> = raw
            .time_signatures
            .iter()
            .map(|&(tick, numerator, denominator)| TimeSignature {
                tick,
                time: tempo.seconds_at_tick(tick),
                numerator,
                denominator,
            })
            .collect();
        time_signatures.sort_by_key(|ts| ts.tick);
        let mut sections: Vec<Section> = raw
            .sections
            .into_iter()
            .map(|(tick, name)| Section { tick, time: tempo.seconds_at_tick(tick), name })
            .collect();
        sections.sort_by_key(|s| s.tick);
        let mut starpower: Vec<StarpowerEvent> = raw
            .starpower
            .iter()
            .map(|&(tick, tick_length)| span_event(&tempo, tick, tick_length))
            .map(|(tick, time, tick_length, time_length)| StarpowerEvent {
                tick,
                time,
                tick_length,
                time_length,
            })
            .collect();
        starpower.sort_by_key(|e| e.tick);
        let mut solos: Vec<SoloEvent> = raw
            .solos
            .iter()
            .map(|&(tick, tick_length)| span_event(&tempo, tick, tick_length))
            .map(|(tick, time, tick_length, time_length)| SoloEvent {
                tick,
                time,
                tick_length,
                time_length,
            })
            .collect();
        solos.sort_by_key(|e| e.tick);

        let end_tick = chart_end_tick(&notes, &starpower, &solos, resolution);
        let beats = build_beats(&tempo, &time_signatures, end_tick);

        info!(
            "Chart built: {} notes in {} chords, {} beats, {} starpower phases, {} solos.",
            notes.len(),
            chords.len(),
            beats.len(),
            starpower.len(),
            solos.len()
        );

        Self {
            resolution,
            tempo,
            notes,
            chords,
            bpm_changes,
            time_signatures,
            sections,
            beats,
            starpower,
            solos,
        }
    }

    // --- Chord runtime state -------------------------------------------
    //
    // Hit/miss state lives on the member notes; chords keep them in
    // agreement. Both setters are idempotent no-ops once resolved.

    #[inline(always)]
    pub fn chord_is_hit(&self, ci: usize) -> bool {
        self.notes[self.chords[ci].notes[0]].hit
    }

    #[inline(always)]
    pub fn chord_is_missed(&self, ci: usize) -> bool {
        self.notes[self.chords[ci].notes[0]].missed
    }

    #[inline(always)]
    pub fn chord_is_resolved(&self, ci: usize) -> bool {
        self.notes[self.chords[ci].notes[0]].is_resolved()
    }

    #[inline(always)]
    pub fn chord_hit_time(&self, ci: usize) -> Option<f32> {
        self.notes[self.chords[ci].notes[0]].hit_time
    }

    pub(crate) fn set_chord_hit(&mut self, ci: usize, time: f32) -> bool {
        if self.chord_is_resolved(ci) {
            return false;
        }
        for &ni in &self.chords[ci].notes {
            let note = &mut self.notes[ni];
            note.hit = true;
            note.hit_time = Some(time);
        }
        true
    }

    pub(crate) fn set_chord_missed(&mut self, ci: usize) -> bool {
        if self.chord_is_resolved(ci) {
            return false;
        }
        for &ni in &self.chords[ci].notes {
            let note = &mut self.notes[ni];
            note.missed = true;
            note.hit_time = Some(f32::INFINITY);
        }
        true
    }

    // --- Lookups --------------------------------------------------------

    pub fn section_at_time(&self, t: f32) -> Option<&Section> {
        last_at_time(&self.sections, t)
    }

    pub fn bpm_at_time(&self, t: f32) -> Option<&BpmChange> {
        last_at_time(&self.bpm_changes, t)
    }

    pub fn time_signature_at_time(&self, t: f32) -> Option<&TimeSignature> {
        last_at_time(&self.time_signatures, t)
    }

    pub fn beat_at_time(&self, t: f32) -> Option<&Beat> {
        last_at_time(&self.beats, t)
    }

    pub fn starpower_at_time(&self, t: f32) -> Option<&StarpowerEvent> {
        last_at_time(&self.starpower, t)
    }

    pub fn solo_at_time(&self, t: f32) -> Option<&SoloEvent> {
        last_at_time(&self.solos, t)
    }

    pub fn chord_index_at_time(&self, t: f32) -> Option<usize> {
        self.chords.partition_point(|c| c.time <= t).checked_sub(1)
    }

    pub fn note_index_at_time(&self, t: f32) -> Option<usize> {
        self.notes.partition_point(|n| n.time <= t).checked_sub(1)
    }
}

#[inline(always)]
fn span_event(tempo: &TempoMap, tick: u32, tick_length: u32) -> (u32, f32, u32, f32) {
    let time = tempo.seconds_at_tick(tick);
    let time_length = tempo.seconds_at_tick(tick + tick_length) - time;
    (tick, time, tick_length, time_length)
}

/// Builds one chord from the raw notes sharing a tick: folds lanes 5/6 into
/// the chord flag, appends playable member notes to the arena, and derives
/// the exact shape.
fn build_chord(group: &[RawNote], tempo: &TempoMap, notes: &mut Vec<Note>, chords: &mut Vec<Chord>) {
    let tick = group[0].tick;
    let time = tempo.seconds_at_tick(tick);

    let mut flag = NoteFlag::None;
    let mut members: SmallVec<[usize; 5]> = SmallVec::new();
    let mut shape = ChordShape::OPEN;
    let mut lowest_fret: Option<usize> = None;
    let mut length = 0.0_f32;
    let mut seen_lanes = [false; 8];

    for rn in group {
        let fret = match Fret::from_lane(rn.lane) {
            Some(fret) => fret,
            None if rn.lane == LANE_TAP => {
                flag = NoteFlag::Tap;
                continue;
            }
            None if rn.lane == LANE_FORCED => {
                // Tap overrides forced when both are present.
                if flag != NoteFlag::Tap {
                    flag = NoteFlag::Forced;
                }
                continue;
            }
            None => panic!("unrecognized note lane {} at tick {tick}", rn.lane),
        };
        if seen_lanes[rn.lane as usize] {
            warn!("Duplicate lane {} at tick {tick}; keeping the first.", rn.lane);
            continue;
        }
        seen_lanes[rn.lane as usize] = true;
        let note_length = tempo.seconds_at_tick(rn.tick + rn.tick_length) - time;
        members.push(notes.len());
        notes.push(Note {
            tick,
            tick_length: rn.tick_length,
            fret,
            time,
            length: note_length,
            hit: false,
            missed: false,
            hit_time: None,
        });
        length = length.max(note_length);
        if let Some(slot) = fret.slot() {
            shape.update_fret(slot, true);
            lowest_fret = Some(lowest_fret.map_or(slot, |low| low.min(slot)));
        }
    }

    if members.is_empty() {
        // Flag lanes with nothing to apply to. Tolerated, nothing to play.
        warn!("Orphan flag at tick {tick} with no playable notes.");
        return;
    }
    if seen_lanes[LANE_OPEN as usize] && lowest_fret.is_some() {
        warn!("Open note sharing tick {tick} with fretted notes; treating as fretted.");
    }

    chords.push(Chord {
        tick,
        time,
        length,
        notes: members,
        flag,
        kind: NoteKind::Strum,
        shape,
        lowest_fret,
    });
}

fn chart_end_tick(
    notes: &[Note],
    starpower: &[StarpowerEvent],
    solos: &[SoloEvent],
    resolution: u32,
) -> u32 {
    let mut end = resolution * 4;
    for n in notes {
        end = end.max(n.tick + n.tick_length);
    }
    for e in starpower {
        end = end.max(e.tick + e.tick_length);
    }
    for e in solos {
        end = end.max(e.tick + e.tick_length);
    }
    end
}

/// Emits bar/beat markers for the highway collaborator, honoring
/// time-signature changes. Defaults to 4/4 when the chart declares none.
fn build_beats(tempo: &TempoMap, time_signatures: &[TimeSignature], end_tick: u32) -> Vec<Beat> {
    let resolution = tempo.resolution();
    let mut beats = Vec::new();
    let mut seg_idx = 0;
    let mut tick = 0_u32;
    let mut beat_in_measure = 0_u32;
    let mut numerator = 4_u32;
    let mut denominator = 4_u32;

    while tick <= end_tick {
        while seg_idx < time_signatures.len() && time_signatures[seg_idx].tick <= tick {
            let ts = &time_signatures[seg_idx];
            numerator = ts.numerator.max(1);
            denominator = ts.denominator.max(1);
            beat_in_measure = 0;
            seg_idx += 1;
        }
        let kind = if beat_in_measure == 0 { BeatKind::Bar } else { BeatKind::Beat };
        beats.push(Beat { tick, time: tempo.seconds_at_tick(tick), kind });

        let step = (resolution * 4 / denominator).max(1);
        let next_ts_tick = time_signatures
            .get(seg_idx)
            .map(|ts| ts.tick)
            .filter(|&t| t > tick);
        let mut next = tick + step;
        if let Some(ts_tick) = next_ts_tick
            && next > ts_tick
        {
            next = ts_tick;
        }
        beat_in_measure = (beat_in_measure + 1) % numerator;
        tick = next;
    }
    beats
}
