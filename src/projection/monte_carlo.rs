/// # Monte Carlo projection
///
/// Geometric random walk driven by Box–Muller normal samples with the
/// history's return mean and deviation. The projection is the per-step mean
/// across all simulated paths, not any single path. Paths share no state, so
/// the unseeded variant fans out over rayon; a seeded run stays sequential
/// for reproducibility.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::f64::consts::TAU;
use thiserror::Error;

use crate::projection::linear::project_linear;
use crate::utilities::data_loader::{source_type, Candles};

pub const DEFAULT_SIMULATIONS: usize = 10_000;
pub const DEFAULT_STEPS: usize = 30;

#[derive(Debug, Clone)]
pub enum MonteCarloData<'a> {
    Candles {
        candles: &'a Candles,
        source: &'a str,
    },
    Slice(&'a [f64]),
}

#[derive(Debug, Clone)]
pub struct MonteCarloParams {
    pub steps: Option<usize>,
    pub simulations: Option<usize>,
    /// Pins the run to a sequential seeded RNG; None uses thread entropy.
    pub seed: Option<u64>,
}

impl Default for MonteCarloParams {
    fn default() -> Self {
        Self {
            steps: Some(DEFAULT_STEPS),
            simulations: Some(DEFAULT_SIMULATIONS),
            seed: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonteCarloInput<'a> {
    pub data: MonteCarloData<'a>,
    pub params: MonteCarloParams,
}

impl<'a> MonteCarloInput<'a> {
    pub fn from_candles(candles: &'a Candles, source: &'a str, params: MonteCarloParams) -> Self {
        Self {
            data: MonteCarloData::Candles { candles, source },
            params,
        }
    }

    pub fn from_slice(slice: &'a [f64], params: MonteCarloParams) -> Self {
        Self {
            data: MonteCarloData::Slice(slice),
            params,
        }
    }

    pub fn with_default_candles(candles: &'a Candles) -> Self {
        Self::from_candles(candles, "close", MonteCarloParams::default())
    }

    pub fn get_steps(&self) -> usize {
        self.params.steps.unwrap_or(DEFAULT_STEPS)
    }

    pub fn get_simulations(&self) -> usize {
        self.params.simulations.unwrap_or(DEFAULT_SIMULATIONS)
    }
}

#[derive(Debug, Clone)]
pub struct MonteCarloOutput {
    pub values: Vec<f64>,
}

#[derive(Debug, Error)]
pub enum MonteCarloError {
    #[error("monte_carlo: Empty data provided for projection.")]
    EmptyData,
    #[error("monte_carlo: Requested steps must be at least 1.")]
    ZeroSteps,
    #[error("monte_carlo: Simulation count must be at least 1.")]
    ZeroSimulations,
}

#[inline]
pub fn monte_carlo(input: &MonteCarloInput) -> Result<MonteCarloOutput, MonteCarloError> {
    let data: &[f64] = match &input.data {
        MonteCarloData::Candles { candles, source } => source_type(candles, source),
        MonteCarloData::Slice(slice) => slice,
    };
    let steps = input.get_steps();
    let simulations = input.get_simulations();
    if steps == 0 {
        return Err(MonteCarloError::ZeroSteps);
    }
    if simulations == 0 {
        return Err(MonteCarloError::ZeroSimulations);
    }
    if data.is_empty() {
        return Err(MonteCarloError::EmptyData);
    }
    if data.len() < 2 {
        // Not enough history for a return distribution.
        return Ok(MonteCarloOutput {
            values: project_linear(data, steps, 30),
        });
    }

    let returns: Vec<f64> = data
        .windows(2)
        .map(|w| if w[0] != 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect();
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let var = returns
        .iter()
        .map(|&r| (r - mean) * (r - mean))
        .sum::<f64>()
        / returns.len() as f64;
    let std_dev = var.sqrt();
    let start = *data.last().unwrap();

    let sums = match input.params.seed {
        Some(seed) => {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut acc = vec![0.0; steps];
            for _ in 0..simulations {
                accumulate_path(&mut rng, start, mean, std_dev, &mut acc);
            }
            acc
        }
        None => (0..simulations)
            .into_par_iter()
            .fold(
                || vec![0.0; steps],
                |mut acc, _| {
                    let mut rng = rand::thread_rng();
                    accumulate_path(&mut rng, start, mean, std_dev, &mut acc);
                    acc
                },
            )
            .reduce(
                || vec![0.0; steps],
                |mut a, b| {
                    for (x, y) in a.iter_mut().zip(b.iter()) {
                        *x += y;
                    }
                    a
                },
            ),
    };

    let values = sums
        .into_iter()
        .map(|s| (s / simulations as f64).max(0.0))
        .collect();
    Ok(MonteCarloOutput { values })
}

fn accumulate_path<R: Rng>(rng: &mut R, start: f64, mean: f64, std_dev: f64, acc: &mut [f64]) {
    let mut price = start;
    for slot in acc.iter_mut() {
        let shock = mean + std_dev * box_muller(rng);
        price = (price * (1.0 + shock)).max(0.0);
        *slot += price;
    }
}

/// One standard normal sample from two uniforms.
fn box_muller<R: Rng>(rng: &mut R) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>(); // (0, 1]
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utilities::data_loader::read_candles_from_csv;

    const FIXTURE: &str = "src/data/synthetic_ohlcv_daily.csv";

    #[test]
    fn test_zero_volatility_stays_put() {
        let data = [10.0, 10.0, 10.0, 10.0, 10.0];
        let params = MonteCarloParams {
            steps: Some(3),
            simulations: Some(1000),
            seed: None,
        };
        let input = MonteCarloInput::from_slice(&data, params);
        let output = monte_carlo(&input).expect("Failed Monte Carlo projection");
        assert_eq!(output.values, vec![10.0, 10.0, 10.0]);
    }

    #[test]
    fn test_length_and_non_negativity() {
        let candles = read_candles_from_csv(FIXTURE).expect("Failed to load test candles");
        let params = MonteCarloParams {
            steps: Some(12),
            simulations: Some(500),
            seed: Some(42),
        };
        let input = MonteCarloInput::from_candles(&candles, "close", params);
        let output = monte_carlo(&input).expect("Failed Monte Carlo projection");
        assert_eq!(output.values.len(), 12);
        for &v in &output.values {
            assert!(v.is_finite() && v >= 0.0, "Invalid projected price {}", v);
        }
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let candles = read_candles_from_csv(FIXTURE).expect("Failed to load test candles");
        let params = MonteCarloParams {
            steps: Some(8),
            simulations: Some(400),
            seed: Some(7),
        };
        let a = monte_carlo(&MonteCarloInput::from_candles(&candles, "close", params.clone()))
            .expect("first run");
        let b = monte_carlo(&MonteCarloInput::from_candles(&candles, "close", params))
            .expect("second run");
        assert_eq!(a.values, b.values);
    }

    #[test]
    fn test_mean_tracks_drift() {
        // Steady 1% growth: the expected path keeps climbing.
        let data: Vec<f64> = (0..40).map(|i| 100.0 * 1.01f64.powi(i)).collect();
        let params = MonteCarloParams {
            steps: Some(5),
            simulations: Some(4000),
            seed: Some(99),
        };
        let input = MonteCarloInput::from_slice(&data, params);
        let output = monte_carlo(&input).expect("Failed Monte Carlo projection");
        let last = *data.last().unwrap();
        assert!(
            output.values[0] > last * 0.995,
            "Expected upward drift, got {} from {}",
            output.values[0],
            last
        );
        for pair in output.values.windows(2) {
            assert!(pair[1] > pair[0] * 0.99, "Drift collapsed: {:?}", pair);
        }
    }

    #[test]
    fn test_single_point_falls_back_to_linear() {
        let data = [42.0];
        let params = MonteCarloParams {
            steps: Some(4),
            simulations: Some(100),
            seed: None,
        };
        let input = MonteCarloInput::from_slice(&data, params);
        let output = monte_carlo(&input).expect("Failed Monte Carlo projection");
        assert_eq!(output.values, vec![42.0, 42.0, 42.0, 42.0]);
    }

    #[test]
    fn test_error_cases() {
        let empty: [f64; 0] = [];
        let input = MonteCarloInput::from_slice(&empty, MonteCarloParams::default());
        assert!(matches!(monte_carlo(&input), Err(MonteCarloError::EmptyData)));

        let data = [1.0, 2.0, 3.0];
        let params = MonteCarloParams {
            steps: Some(0),
            simulations: Some(10),
            seed: None,
        };
        let input = MonteCarloInput::from_slice(&data, params);
        assert!(matches!(monte_carlo(&input), Err(MonteCarloError::ZeroSteps)));
    }
}
