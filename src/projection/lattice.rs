/// # Lattice projection
///
/// The harmonic lattice strategy. Each projected step runs a five-pass inner
/// refinement blending z/l/p lattice terms across the stabilized primes with
/// locked-point influence, then passes through the continuity clamps (first
/// step within 5% of the last close, each later step within 8% of its
/// predecessor, everything inside the 0.5x..2x band). An outer loop watches
/// the finished projection for residual oscillation or a boundary price jump
/// and redoes the projection with a re-prioritized prime ordering or a
/// re-stabilized model until neither triggers or the pass budget runs out.
///
/// When both the jump and the oscillation check fire in the same pass, the
/// jump wins: the model is fully re-stabilized and the oscillation
/// re-ordering is discarded.
use thiserror::Error;

use crate::projection::harmonic::{l, p, recursive_lattice_layer, z};
use crate::projection::linear::project_linear;
use crate::projection::stabilization::{
    recursive_stabilization, StabilizedModel, DEFAULT_MAX_ITERATIONS,
};
use crate::utilities::data_loader::{source_type, Candles};

pub const MIN_HISTORY: usize = 12;
pub const DEFAULT_STEPS: usize = 30;
pub const DEFAULT_MAX_RECURSIONS: u32 = 15;

const INNER_ITERATIONS: usize = 5;
const LAYER_DEPTH_START: u32 = 2;
const LAYER_MAX_DEPTH: u32 = 7;
const FIRST_STEP_TOLERANCE: f64 = 0.05;
const STEP_TOLERANCE: f64 = 0.08;
const LOWER_BAND: f64 = 0.5;
const UPPER_BAND: f64 = 2.0;
const BLEND_NEW: f64 = 0.6;
const BLEND_OLD: f64 = 0.4;
const LOCKED_WINDOW: usize = 5;
const LOCKED_DECAY: f64 = 10.0;
const OSCILLATION_SIMILARITY: f64 = 0.15;
const BOUNDARY_JUMP: f64 = 0.03;
const EARLY_STEP_JUMP: f64 = 0.06;
const EARLY_STEP_SPAN: usize = 4;

#[derive(Debug, Clone)]
pub enum LatticeData<'a> {
    Candles {
        candles: &'a Candles,
        source: &'a str,
    },
    Slice(&'a [f64]),
}

#[derive(Debug, Clone, Default)]
pub struct LatticeParams {
    pub steps: Option<usize>,
    pub max_recursions: Option<u32>,
    /// Previously persisted per-symbol state; None starts fresh.
    pub model: Option<StabilizedModel>,
}

#[derive(Debug, Clone)]
pub struct LatticeInput<'a> {
    pub data: LatticeData<'a>,
    pub params: LatticeParams,
}

impl<'a> LatticeInput<'a> {
    pub fn from_candles(candles: &'a Candles, source: &'a str, params: LatticeParams) -> Self {
        Self {
            data: LatticeData::Candles { candles, source },
            params,
        }
    }

    pub fn from_slice(slice: &'a [f64], params: LatticeParams) -> Self {
        Self {
            data: LatticeData::Slice(slice),
            params,
        }
    }

    pub fn with_default_candles(candles: &'a Candles) -> Self {
        Self::from_candles(candles, "close", LatticeParams::default())
    }

    pub fn get_steps(&self) -> usize {
        self.params.steps.unwrap_or(DEFAULT_STEPS)
    }

    pub fn get_max_recursions(&self) -> u32 {
        self.params.max_recursions.unwrap_or(DEFAULT_MAX_RECURSIONS)
    }
}

#[derive(Debug, Clone)]
pub struct LatticeOutput {
    pub values: Vec<f64>,
    /// Updated state the caller must persist and hand back next call.
    pub model: StabilizedModel,
}

#[derive(Debug, Error)]
pub enum LatticeError {
    #[error("lattice: Empty data provided for projection.")]
    EmptyData,
    #[error("lattice: Requested steps must be at least 1.")]
    ZeroSteps,
}

#[inline]
pub fn lattice(input: &LatticeInput) -> Result<LatticeOutput, LatticeError> {
    let history: &[f64] = match &input.data {
        LatticeData::Candles { candles, source } => source_type(candles, source),
        LatticeData::Slice(slice) => slice,
    };
    let steps = input.get_steps();
    if steps == 0 {
        return Err(LatticeError::ZeroSteps);
    }
    if history.is_empty() {
        return Err(LatticeError::EmptyData);
    }

    let mut model = input.params.model.clone().unwrap_or_default();
    model.normalize();
    // A model persisted against a longer series can carry locked points past
    // this window's end; a stale index can never influence the projection.
    let horizon_len = history.len();
    model.locked_points.retain(|lp| lp.index < horizon_len);

    if history.len() < MIN_HISTORY {
        return Ok(LatticeOutput {
            values: project_linear(history, steps, 30),
            model,
        });
    }

    model = recursive_stabilization(history, model, DEFAULT_MAX_ITERATIONS);

    let last_price = *history.last().unwrap();
    let volatility = return_volatility(history);
    let max_recursions = input.get_max_recursions().max(1);
    let mut effective_primes = model.primes.clone();
    let mut pass = 0;

    let values = loop {
        let projection = project_once(history, steps, &model, &effective_primes, volatility);
        pass += 1;
        if pass >= max_recursions {
            break projection;
        }
        let jump = detect_price_jump(last_price, &projection);
        let dominant = projection_oscillation(&projection);
        if jump {
            // Jump takes precedence: throw away the spectrum so the
            // controller runs a full refinement pass.
            model.last_oscillations = None;
            model.signal_stability = 0.0;
            model = recursive_stabilization(history, model, DEFAULT_MAX_ITERATIONS);
            effective_primes = model.primes.clone();
        } else if let Some(period) = dominant {
            reprioritize_primes(&mut effective_primes, period);
        } else {
            break projection;
        }
    };

    // Degenerate numerics (for example a volatility estimate poisoned by an
    // extreme price ratio) degrade to the linear fallback instead of
    // surfacing non-finite values.
    if values.iter().any(|v| !v.is_finite()) {
        return Ok(LatticeOutput {
            values: project_linear(history, steps, 30),
            model,
        });
    }

    Ok(LatticeOutput { values, model })
}

fn return_volatility(history: &[f64]) -> f64 {
    if history.len() < 2 {
        return 0.0;
    }
    let returns: Vec<f64> = history
        .windows(2)
        .map(|w| if w[0] != 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect();
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let var = returns
        .iter()
        .map(|&r| (r - mean) * (r - mean))
        .sum::<f64>()
        / returns.len() as f64;
    var.sqrt()
}

/// Squash an unbounded lattice term onto (-1, 1).
fn soft(x: f64) -> f64 {
    if x.is_nan() {
        return 0.0;
    }
    if x.is_infinite() {
        return x.signum();
    }
    x / (1.0 + x.abs())
}

fn project_once(
    history: &[f64],
    steps: usize,
    model: &StabilizedModel,
    primes: &[u64],
    volatility: f64,
) -> Vec<f64> {
    let last_price = *history.last().unwrap();
    let lower = last_price * LOWER_BAND;
    let upper = last_price * UPPER_BAND;
    let hist_len = history.len();

    let locked_start = model.locked_points.len().saturating_sub(LOCKED_WINDOW);
    let locked = &model.locked_points[locked_start..];

    let mut values = Vec::with_capacity(steps);
    let mut prev_price = last_price;

    for step in 1..=steps {
        let mut candidate = prev_price;
        for inner in 0..INNER_ITERATIONS {
            let mut weighted = 0.0;
            let mut weight_sum = 0.0;
            for (dim, &prime) in primes.iter().enumerate() {
                let d = dim.min(11);
                let k = prime as i64;
                let lambda_source = if model.coprimes.is_empty() {
                    prime
                } else {
                    model.coprimes[dim % model.coprimes.len()]
                };
                let lambda = lambda_source as f64 / 31.0;

                let zv = z(step);
                let lv = l(step, d, k, lambda, history);
                let pv = p(step, d, k, history);
                let layer = recursive_lattice_layer(
                    step,
                    d,
                    k,
                    lambda,
                    LAYER_DEPTH_START,
                    LAYER_MAX_DEPTH,
                    primes,
                );

                let raw = zv + soft(lv) + soft(pv) * layer;
                let weight = 1.0 / (dim as f64 + 1.0);
                weighted += weight * soft(raw);
                weight_sum += weight;
            }
            let drift = if weight_sum > 0.0 {
                weighted / weight_sum
            } else {
                0.0
            };
            let mut next = prev_price * (1.0 + drift * volatility);

            // Pull toward historically significant levels; influence decays
            // exponentially with index distance.
            let target_index = hist_len - 1 + step;
            let mut pull = 0.0;
            let mut pull_weight = 0.0;
            for lp in locked {
                let distance = (target_index - lp.index) as f64;
                let w = (-distance / LOCKED_DECAY).exp();
                pull += w * lp.price;
                pull_weight += w;
            }
            if pull_weight > 0.0 {
                next = (next + pull) / (1.0 + pull_weight);
            }

            if inner > 0 {
                next = BLEND_NEW * next + BLEND_OLD * candidate;
            }
            candidate = next;
        }

        let (anchor, tolerance) = if step == 1 {
            (last_price, FIRST_STEP_TOLERANCE)
        } else {
            (prev_price, STEP_TOLERANCE)
        };
        candidate = candidate.clamp(anchor * (1.0 - tolerance), anchor * (1.0 + tolerance));
        candidate = candidate.clamp(lower, upper).max(0.0);

        values.push(candidate);
        prev_price = candidate;
    }
    values
}

/// Autocorrelation-style similarity over the projection's own step changes.
/// Returns the dominant lag when the best similarity clears the threshold.
fn projection_oscillation(values: &[f64]) -> Option<f64> {
    if values.len() < 8 {
        return None;
    }
    let changes: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let energy: f64 = changes.iter().map(|&c| c * c).sum();
    if energy == 0.0 {
        return None;
    }
    let mut best_similarity = 0.0;
    let mut best_lag = 0;
    for lag in 2..=changes.len() / 2 {
        let mut corr = 0.0;
        for i in lag..changes.len() {
            corr += changes[i] * changes[i - lag];
        }
        let similarity = corr / energy;
        if similarity > best_similarity {
            best_similarity = similarity;
            best_lag = lag;
        }
    }
    if best_similarity > OSCILLATION_SIMILARITY {
        Some(best_lag as f64)
    } else {
        None
    }
}

fn detect_price_jump(last_price: f64, values: &[f64]) -> bool {
    if values.is_empty() {
        return false;
    }
    if last_price > 0.0 && ((values[0] - last_price) / last_price).abs() > BOUNDARY_JUMP {
        return true;
    }
    for i in 1..values.len().min(EARLY_STEP_SPAN) {
        if values[i - 1] > 0.0 && ((values[i] - values[i - 1]) / values[i - 1]).abs() > EARLY_STEP_JUMP
        {
            return true;
        }
    }
    false
}

/// Stable re-ordering of the prime basis toward the primes nearest the
/// dominant detected period.
fn reprioritize_primes(primes: &mut [u64], period: f64) {
    let target = period.round().max(1.0) as i64;
    primes.sort_by_key(|&p| (p as i64 - target).abs());
}
