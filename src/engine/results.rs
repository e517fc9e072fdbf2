use std::sync::Arc;

use serde::Serialize;

use crate::chart::Chart;
use crate::engine::judgment::{
    FcType, Grade, JudgedHit, Judgement, OffsetStats, compute_offset_stats,
};

/// End-of-song snapshot handed to the results screen and the score
/// persistence collaborator.
#[derive(Clone, Debug)]
pub struct Results {
    pub chart: Arc<Chart>,
    pub hit_window: f32,
    pub judgements: Vec<Judgement>,
    pub history: Vec<JudgedHit>,
    pub score: u32,
    pub hits: u32,
    pub misses: u32,
    pub overstrums: u32,
    pub accuracy: f32,
    pub grade: Grade,
    pub fc_type: FcType,
    pub streak: u32,
    pub max_streak: u32,
}

/// The serializable portion of [`Results`]: everything except the chart
/// reference, which the persistence layer identifies by its own key.
#[derive(Clone, Debug, Serialize)]
pub struct ResultsPayload {
    pub hit_window: f32,
    pub judgements: Vec<Judgement>,
    pub history: Vec<JudgedHit>,
    pub score: u32,
    pub hits: u32,
    pub misses: u32,
    pub overstrums: u32,
    pub accuracy: f32,
    pub grade: Grade,
    pub fc_type: FcType,
    pub streak: u32,
    pub max_streak: u32,
    pub offset_stats: OffsetStats,
}

impl Results {
    pub fn payload(&self) -> ResultsPayload {
        ResultsPayload {
            hit_window: self.hit_window,
            judgements: self.judgements.clone(),
            history: self.history.clone(),
            score: self.score,
            hits: self.hits,
            misses: self.misses,
            overstrums: self.overstrums,
            accuracy: self.accuracy,
            grade: self.grade,
            fc_type: self.fc_type,
            streak: self.streak,
            max_streak: self.max_streak,
            offset_stats: compute_offset_stats(&self.history),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.payload())
    }
}
