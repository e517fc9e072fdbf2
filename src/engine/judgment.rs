use serde::Serialize;

/// Named accuracy bucket for a judged chord.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum JudgeGrade {
    Perfect,
    Great,
    Good,
    Miss,
}

/// One row of the judgement table: the outer edge of the window (absolute
/// offset, seconds) and the weight it contributes to accuracy.
#[derive(Copy, Clone, Debug, Serialize)]
pub struct Judgement {
    pub grade: JudgeGrade,
    pub window_s: f32,
    pub accuracy_weight: f32,
}

/// Default five-fret table. The outermost window always spans the full hit
/// window so every hit classifies.
pub fn default_judgements(hit_window: f32) -> Vec<Judgement> {
    vec![
        Judgement { grade: JudgeGrade::Perfect, window_s: 0.025, accuracy_weight: 1.0 },
        Judgement { grade: JudgeGrade::Great, window_s: 0.045, accuracy_weight: 0.85 },
        Judgement { grade: JudgeGrade::Good, window_s: hit_window, accuracy_weight: 0.6 },
    ]
}

/// Classify a signed hit offset (seconds) against the table. Callers ensure
/// the offset is inside the hit window; anything past the last row still
/// takes the last row's grade.
#[inline(always)]
pub fn classify_offset_s(offset_s: f32, table: &[Judgement]) -> JudgeGrade {
    let abs = offset_s.abs();
    for j in table {
        if abs <= j.window_s {
            return j.grade;
        }
    }
    table.last().map_or(JudgeGrade::Good, |j| j.grade)
}

#[inline(always)]
pub fn accuracy_weight(grade: JudgeGrade, table: &[Judgement]) -> f32 {
    table
        .iter()
        .find(|j| j.grade == grade)
        .map_or(0.0, |j| j.accuracy_weight)
}

/// Letter grade ladder over the 0..=1 accuracy value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Grade {
    SS,
    S,
    A,
    B,
    C,
    D,
    F,
}

pub fn grade_for_accuracy(accuracy: f32) -> Grade {
    if accuracy >= 0.95 {
        Grade::SS
    } else if accuracy >= 0.90 {
        Grade::S
    } else if accuracy >= 0.80 {
        Grade::A
    } else if accuracy >= 0.70 {
        Grade::B
    } else if accuracy >= 0.60 {
        Grade::C
    } else if accuracy >= 0.50 {
        Grade::D
    } else {
        Grade::F
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum FcType {
    FullCombo,
    Clear,
}

/// One entry of the judgement history: when the chord resolved, the signed
/// offset for hits (`None` for misses), and the grade.
#[derive(Copy, Clone, Debug, Serialize)]
pub struct JudgedHit {
    pub time: f32,
    pub offset_s: Option<f32>,
    pub grade: JudgeGrade,
}

/// Offset statistics over the non-miss judgement history, in milliseconds.
#[derive(Copy, Clone, Debug, Default, Serialize)]
pub struct OffsetStats {
    pub mean_abs_ms: f32,
    pub mean_ms: f32,
    pub stddev_ms: f32,
    pub max_abs_ms: f32,
    pub count: usize,
}

pub fn compute_offset_stats(history: &[JudgedHit]) -> OffsetStats {
    let mut sum_abs = 0.0_f32;
    let mut sum_signed = 0.0_f32;
    let mut max_abs = 0.0_f32;
    let mut count: usize = 0;

    for h in history {
        let Some(offset) = h.offset_s else { continue };
        let ms = offset * 1000.0;
        let abs = ms.abs();
        sum_abs += abs;
        sum_signed += ms;
        if abs > max_abs {
            max_abs = abs;
        }
        count += 1;
    }

    if count == 0 {
        return OffsetStats::default();
    }

    let mean_ms = sum_signed / count as f32;
    let mean_abs_ms = sum_abs / count as f32;

    // Sample standard deviation of the signed offsets.
    let stddev_ms = if count > 1 {
        let mut sum_diff_sq = 0.0_f32;
        for h in history {
            if let Some(offset) = h.offset_s {
                let d = offset * 1000.0 - mean_ms;
                sum_diff_sq += d * d;
            }
        }
        (sum_diff_sq / (count as f32 - 1.0)).sqrt()
    } else {
        0.0
    };

    OffsetStats { mean_abs_ms, mean_ms, stddev_ms, max_abs_ms: max_abs, count }
}
