//! Health scoring
//!
//! This module rescales each pillar metric to 0-100 and combines them with the
//! configured weights into one composite Health Score.
//! - IDI is min/max normalized across all regions (needs the full set first)
//! - UBI is scored by distance from the ideal biometric share
//! - YIR is capped so extreme over-performance earns no extra credit
//! - GCI and TCS map linearly

use crate::config::{ScoreWeights, ScoringParams};
use crate::types::{PillarMetrics, PillarScores, RegionPillars};

/// Observed IDI range across regions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdiRange {
    pub min: f64,
    pub max: f64,
}

impl IdiRange {
    /// Reduce over every region; `None` when there are no regions
    pub fn from_pillars(pillars: &[RegionPillars]) -> Option<Self> {
        pillars.iter().map(|p| p.metrics.idi).fold(None, |range, idi| {
            Some(match range {
                None => IdiRange { min: idi, max: idi },
                Some(r) => IdiRange {
                    min: r.min.min(idi),
                    max: r.max.max(idi),
                },
            })
        })
    }
}

/// Scorer for converting pillar metrics to pillar scores and a Health Score
pub struct HealthScorer<'a> {
    weights: &'a ScoreWeights,
    params: &'a ScoringParams,
    idi_range: IdiRange,
}

impl<'a> HealthScorer<'a> {
    pub fn new(weights: &'a ScoreWeights, params: &'a ScoringParams, idi_range: IdiRange) -> Self {
        Self {
            weights,
            params,
            idi_range,
        }
    }

    /// Rescale every pillar to 0-100
    pub fn pillar_scores(&self, metrics: &PillarMetrics) -> PillarScores {
        PillarScores {
            idi: self.idi_score(metrics.idi),
            ubi: self.ubi_score(metrics.ubi),
            yir: self.yir_score(metrics.yir),
            gci: to_percent(1.0 - metrics.gci),
            tcs: to_percent(metrics.tcs),
        }
    }

    /// Weighted combination of pillar scores, in [0, 100]
    pub fn health_score(&self, scores: &PillarScores) -> f64 {
        let w = self.weights;
        let combined = w.idi * scores.idi
            + w.gci * scores.gci
            + w.tcs * scores.tcs
            + w.yir * scores.yir
            + w.ubi * scores.ubi;
        combined.clamp(0.0, 100.0)
    }

    /// Pillar scores and Health Score in one call
    pub fn score(&self, metrics: &PillarMetrics) -> (PillarScores, f64) {
        let scores = self.pillar_scores(metrics);
        let health = self.health_score(&scores);
        (scores, health)
    }

    /// Lower IDI (smaller deficit) scores higher
    fn idi_score(&self, idi: f64) -> f64 {
        let IdiRange { min, max } = self.idi_range;
        let position = (idi - min) / (max - min + self.params.idi_epsilon);
        to_percent(1.0 - position)
    }

    fn ubi_score(&self, ubi: f64) -> f64 {
        let ideal = self.params.ubi_ideal;
        to_percent(1.0 - (ubi - ideal).abs() / ideal)
    }

    fn yir_score(&self, yir: f64) -> f64 {
        let cap = self.params.yir_cap;
        to_percent(yir.min(cap) / cap)
    }
}

/// Map a 0-1 fraction to a clamped 0-100 score
fn to_percent(fraction: f64) -> f64 {
    (100.0 * fraction).clamp(0.0, 100.0)
}
