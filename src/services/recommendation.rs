//! Surfer-facing recommendation from difficulty and wave quality.

use crate::services::analyzer::{SurfDifficulty, WaveQuality};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    AllSurfers,
    ExperiencedSurfers,
    NotRecommended,
}

impl Recommendation {
    pub fn as_str(self) -> &'static str {
        match self {
            Recommendation::AllSurfers => "Great conditions for all surfers",
            Recommendation::ExperiencedSurfers => "Good conditions for experienced surfers",
            Recommendation::NotRecommended => "Not recommended for surfing",
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn recommend(difficulty: SurfDifficulty, quality: WaveQuality) -> Recommendation {
    let good_waves = matches!(quality, WaveQuality::Excellent | WaveQuality::Good);
    match (difficulty, good_waves) {
        (SurfDifficulty::Low, true) => Recommendation::AllSurfers,
        (_, true) => Recommendation::ExperiencedSurfers,
        (_, false) => Recommendation::NotRecommended,
    }
}
