//! Chart event streams and their nearest-less-or-equal lookups.
//!
//! Every stream is sorted once at chart construction; lookups are a
//! `partition_point` binary search returning the last event whose key is at
//! or before the query, or `None` when nothing precedes it.

/// Anything addressable on both the tick and seconds timelines.
pub trait ChartEvent {
    fn tick(&self) -> u32;
    fn time(&self) -> f32;
}

pub fn last_at_time<E: ChartEvent>(events: &[E], time: f32) -> Option<&E> {
    let idx = events.partition_point(|e| e.time() <= time);
    idx.checked_sub(1).map(|i| &events[i])
}

pub fn last_at_tick<E: ChartEvent>(events: &[E], tick: u32) -> Option<&E> {
    let idx = events.partition_point(|e| e.tick() <= tick);
    idx.checked_sub(1).map(|i| &events[i])
}

#[derive(Clone, Debug)]
pub struct BpmChange {
    pub tick: u32,
    pub time: f32,
    pub bpm: f32,
}

#[derive(Clone, Debug)]
pub struct TimeSignature {
    pub tick: u32,
    pub time: f32,
    pub numerator: u32,
    pub denominator: u32,
}

#[derive(Clone, Debug)]
pub struct Section {
    pub tick: u32,
    pub time: f32,
    pub name: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BeatKind {
    /// First beat of a measure.
    Bar,
    Beat,
}

#[derive(Clone, Debug)]
pub struct Beat {
    pub tick: u32,
    pub time: f32,
    pub kind: BeatKind,
}

#[derive(Clone, Debug)]
pub struct StarpowerEvent {
    pub tick: u32,
    pub time: f32,
    pub tick_length: u32,
    pub time_length: f32,
}

impl StarpowerEvent {
    #[inline(always)]
    pub fn end_time(&self) -> f32 {
        self.time + self.time_length
    }
}

#[derive(Clone, Debug)]
pub struct SoloEvent {
    pub tick: u32,
    pub time: f32,
    pub tick_length: u32,
    pub time_length: f32,
}

impl SoloEvent {
    #[inline(always)]
    pub fn end_time(&self) -> f32 {
        self.time + self.time_length
    }

    #[inline(always)]
    pub fn contains_time(&self, t: f32) -> bool {
        t >= self.time && t <= self.end_time()
    }
}

macro_rules! impl_chart_event {
    ($($ty:ty),+) => {
        $(impl ChartEvent for $ty {
            #[inline(always)]
            fn tick(&self) -> u32 { self.tick }
            #[inline(always)]
            fn time(&self) -> f32 { self.time }
        })+
    };
}

impl_chart_event!(BpmChange, TimeSignature, Section, Beat, StarpowerEvent, SoloEvent);
