use log::{info, warn};

pub const DEFAULT_RESOLUTION: u32 = 192;
const DEFAULT_BPM: f32 = 120.0;

#[derive(Copy, Clone, Debug)]
struct TempoAnchor {
    tick: u32,
    seconds: f32,
    bpm: f32,
}

/// Tick-to-seconds conversion over the chart's BPM changes.
///
/// Anchor seconds are computed once at construction; lookups are a binary
/// search for the nearest anchor at or before the query, plus linear
/// interpolation at that anchor's BPM.
#[derive(Clone, Debug)]
pub struct TempoMap {
    resolution: u32,
    anchors: Vec<TempoAnchor>,
}

impl TempoMap {
    pub fn new(resolution: u32, bpm_changes: &[(u32, f32)]) -> Self {
        assert!(resolution > 0, "chart resolution must be nonzero");

        let mut changes: Vec<(u32, f32)> = bpm_changes
            .iter()
            .copied()
            .filter(|&(tick, bpm)| {
                let ok = bpm.is_finite() && bpm > 0.0;
                if !ok {
                    warn!("Ignoring unusable BPM {bpm} at tick {tick}");
                }
                ok
            })
            .collect();
        changes.sort_by_key(|&(tick, _)| tick);
        changes.dedup_by_key(|&mut (tick, _)| tick);

        if changes.first().is_none_or(|&(tick, _)| tick > 0) {
            let bpm = changes.first().map_or(DEFAULT_BPM, |&(_, bpm)| bpm);
            changes.insert(0, (0, bpm));
        }

        let mut anchors = Vec::with_capacity(changes.len());
        let mut seconds = 0.0_f32;
        let mut last_tick = 0_u32;
        let mut last_bpm = changes[0].1;
        for &(tick, bpm) in &changes {
            seconds += (tick - last_tick) as f32 * seconds_per_tick(last_bpm, resolution);
            anchors.push(TempoAnchor { tick, seconds, bpm });
            last_tick = tick;
            last_bpm = bpm;
        }

        info!("TempoMap built with {} anchors at {resolution} ticks per beat.", anchors.len());
        Self { resolution, anchors }
    }

    #[inline(always)]
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    fn anchor_at_tick(&self, tick: u32) -> TempoAnchor {
        let idx = self.anchors.partition_point(|a| a.tick <= tick);
        // An anchor always exists at tick 0.
        self.anchors[idx - 1]
    }

    pub fn seconds_at_tick(&self, tick: u32) -> f32 {
        let a = self.anchor_at_tick(tick);
        a.seconds + (tick - a.tick) as f32 * seconds_per_tick(a.bpm, self.resolution)
    }

    pub fn tick_at_seconds(&self, seconds: f32) -> u32 {
        if seconds <= 0.0 {
            return 0;
        }
        let idx = self.anchors.partition_point(|a| a.seconds <= seconds);
        let a = self.anchors[idx - 1];
        let ticks = (seconds - a.seconds) / seconds_per_tick(a.bpm, self.resolution);
        a.tick + ticks as u32
    }

    pub fn bpm_at_tick(&self, tick: u32) -> f32 {
        self.anchor_at_tick(tick).bpm
    }
}

#[inline(always)]
fn seconds_per_tick(bpm: f32, resolution: u32) -> f32 {
    60.0 / (bpm * resolution as f32)
}
