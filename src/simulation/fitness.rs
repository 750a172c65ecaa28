use serde::{Deserialize, Serialize};

use crate::simulation::evolution::FutureScenario;

/// Heuristic fitness: likelihood scaled up, bonuses for projected states
/// that read as high or moderate impact, a penalty for distant horizons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessWeights {
    pub likelihood_scale: f64,
    pub high_bonus: f64,
    pub moderate_bonus: f64,
    pub long_horizon_penalty: f64,
    pub horizon_limit_days: i64,
    pub high_markers: Vec<String>,
    pub moderate_markers: Vec<String>,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            likelihood_scale: 100.0,
            high_bonus: 20.0,
            moderate_bonus: 10.0,
            long_horizon_penalty: 10.0,
            horizon_limit_days: 365,
            high_markers: vec!["High".to_string(), "Surge".to_string()],
            moderate_markers: vec!["Moderate".to_string()],
        }
    }
}

impl FitnessWeights {
    /// Never negative.
    pub fn score(&self, scenario: &FutureScenario) -> f64 {
        let state = scenario.projected_state.as_str();
        let mut score = scenario.likelihood * self.likelihood_scale;
        if self.high_markers.iter().any(|marker| state.contains(marker.as_str())) {
            score += self.high_bonus;
        }
        if self
            .moderate_markers
            .iter()
            .any(|marker| state.contains(marker.as_str()))
        {
            score += self.moderate_bonus;
        }
        if scenario.horizon_days() > self.horizon_limit_days {
            score -= self.long_horizon_penalty;
        }
        score.max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn scenario(state: &str, likelihood: f64, horizon: i64) -> FutureScenario {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        FutureScenario {
            scenario_id: "s".to_string(),
            base_date: base,
            target_date: base + Duration::days(horizon),
            trigger_event: "t".to_string(),
            projected_state: state.to_string(),
            likelihood,
            key_drivers: Vec::new(),
            fitness_score: 0.0,
        }
    }

    #[test]
    fn bonuses_stack_on_scaled_likelihood() {
        let weights = FitnessWeights::default();
        assert!((weights.score(&scenario("quiet", 0.5, 90)) - 50.0).abs() < 1e-9);
        assert!((weights.score(&scenario("High volatility", 0.5, 90)) - 70.0).abs() < 1e-9);
        assert!((weights.score(&scenario("Moderate drift", 0.5, 90)) - 60.0).abs() < 1e-9);
    }

    #[test]
    fn long_horizon_penalty_never_goes_negative() {
        let weights = FitnessWeights::default();
        assert!((weights.score(&scenario("quiet", 0.5, 400)) - 40.0).abs() < 1e-9);
        assert_eq!(weights.score(&scenario("quiet", 0.05, 400)), 0.0);
    }
}
