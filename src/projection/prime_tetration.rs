/// # Prime tetration projection
///
/// One projected line per prime triad. Each triad's exponent tower
/// `p2^p3 mod 2^70` drives an exact modular amplitude mod `2^72`, mapped onto
/// `(-1, 1)` and walked forward through the lattice `z` oscillator:
/// `delta = beta * amplitude * z(n)`, applied multiplicatively and quantized
/// to Q8 fixed point at every step. Lines are deliberately not clamped to a
/// price band; diverging lines read as projection risk on the chart.
use thiserror::Error;

use crate::projection::harmonic::z;
use crate::utilities::data_loader::{source_type, Candles};
use crate::utilities::modular::{
    amplitude_from_triad, amplitude_to_symmetric, from_q8, to_q8, truncated_amplitude,
};
use crate::utilities::primes::{first_primes, PRIME_DEPTH_STOPS};

pub use crate::utilities::modular::Triad;

pub const DEFAULT_BASE: u64 = 3;
pub const DEFAULT_DEPTH: u64 = 31;
pub const DEFAULT_LINES: usize = 11;
pub const DEFAULT_BETA: f64 = 0.01;
pub const DEFAULT_HORIZON: usize = 30;

pub const MIN_LINES: usize = 11;
pub const MAX_LINES: usize = 13;

#[derive(Debug, Clone)]
pub enum PrimeTetrationData<'a> {
    Candles {
        candles: &'a Candles,
        source: &'a str,
    },
    Slice(&'a [f64]),
}

#[derive(Debug, Clone)]
pub struct PrimeTetrationParams {
    /// Amplitude base, 2 or 3.
    pub base: Option<u64>,
    /// Prime depth selector, one of PRIME_DEPTH_STOPS.
    pub depth: Option<u64>,
    /// Number of parallel lines, 11..=13.
    pub lines: Option<usize>,
    pub beta: Option<f64>,
    pub horizon: Option<usize>,
}

impl Default for PrimeTetrationParams {
    fn default() -> Self {
        Self {
            base: Some(DEFAULT_BASE),
            depth: Some(DEFAULT_DEPTH),
            lines: Some(DEFAULT_LINES),
            beta: Some(DEFAULT_BETA),
            horizon: Some(DEFAULT_HORIZON),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrimeTetrationInput<'a> {
    pub data: PrimeTetrationData<'a>,
    pub params: PrimeTetrationParams,
}

impl<'a> PrimeTetrationInput<'a> {
    pub fn from_candles(
        candles: &'a Candles,
        source: &'a str,
        params: PrimeTetrationParams,
    ) -> Self {
        Self {
            data: PrimeTetrationData::Candles { candles, source },
            params,
        }
    }

    pub fn from_slice(slice: &'a [f64], params: PrimeTetrationParams) -> Self {
        Self {
            data: PrimeTetrationData::Slice(slice),
            params,
        }
    }

    pub fn with_default_candles(candles: &'a Candles) -> Self {
        Self::from_candles(candles, "close", PrimeTetrationParams::default())
    }

    pub fn get_base(&self) -> u64 {
        self.params.base.unwrap_or(DEFAULT_BASE)
    }

    pub fn get_depth(&self) -> u64 {
        self.params.depth.unwrap_or(DEFAULT_DEPTH)
    }

    pub fn get_lines(&self) -> usize {
        self.params.lines.unwrap_or(DEFAULT_LINES)
    }

    pub fn get_beta(&self) -> f64 {
        self.params.beta.unwrap_or(DEFAULT_BETA)
    }

    pub fn get_horizon(&self) -> usize {
        self.params.horizon.unwrap_or(DEFAULT_HORIZON)
    }
}

/// One projected line plus its walk diagnostics.
#[derive(Debug, Clone)]
pub struct TetrationLine {
    pub triad: Triad,
    pub base: u64,
    pub truncated_amplitude: u64,
    pub values: Vec<f64>,
    pub zero_crossings: usize,
    pub turning_points: usize,
}

#[derive(Debug, Clone)]
pub struct PrimeTetrationOutput {
    pub lines: Vec<TetrationLine>,
    pub last_price_q8: i64,
    pub beta: f64,
    pub horizon: usize,
}

#[derive(Debug, Error)]
pub enum PrimeTetrationError {
    #[error("prime_tetration: Empty data provided for projection.")]
    EmptyData,
    #[error("prime_tetration: Base must be 2 or 3, got {base}.")]
    InvalidBase { base: u64 },
    #[error("prime_tetration: Depth {depth} is not in the allowed stop list.")]
    InvalidDepth { depth: u64 },
    #[error("prime_tetration: Line count must be 11..=13, got {lines}.")]
    InvalidLineCount { lines: usize },
    #[error("prime_tetration: Beta must be positive and finite, got {beta}.")]
    InvalidBeta { beta: f64 },
    #[error("prime_tetration: Horizon must be at least 1.")]
    ZeroHorizon,
}

/// Consecutive prime triples from the first-500 sieve, centered on the
/// depth's index and clamped to valid offsets.
fn build_triads(depth: u64, count: usize) -> Vec<Triad> {
    let primes = first_primes();
    let center = primes
        .iter()
        .position(|&p| p == depth)
        .unwrap_or(0) as isize;
    let max_offset = (primes.len() - 3) as isize;
    let start = center - (count as isize) / 2;
    (0..count)
        .map(|i| {
            let offset = (start + i as isize).clamp(0, max_offset) as usize;
            Triad {
                p1: primes[offset],
                p2: primes[offset + 1],
                p3: primes[offset + 2],
            }
        })
        .collect()
}

#[inline]
pub fn prime_tetration(
    input: &PrimeTetrationInput,
) -> Result<PrimeTetrationOutput, PrimeTetrationError> {
    let data: &[f64] = match &input.data {
        PrimeTetrationData::Candles { candles, source } => source_type(candles, source),
        PrimeTetrationData::Slice(slice) => slice,
    };
    let base = input.get_base();
    let depth = input.get_depth();
    let lines = input.get_lines();
    let beta = input.get_beta();
    let horizon = input.get_horizon();

    if data.is_empty() {
        return Err(PrimeTetrationError::EmptyData);
    }
    if base != 2 && base != 3 {
        return Err(PrimeTetrationError::InvalidBase { base });
    }
    if !PRIME_DEPTH_STOPS.contains(&depth) {
        return Err(PrimeTetrationError::InvalidDepth { depth });
    }
    if !(MIN_LINES..=MAX_LINES).contains(&lines) {
        return Err(PrimeTetrationError::InvalidLineCount { lines });
    }
    if !(beta.is_finite() && beta > 0.0) {
        return Err(PrimeTetrationError::InvalidBeta { beta });
    }
    if horizon == 0 {
        return Err(PrimeTetrationError::ZeroHorizon);
    }

    let last_price = *data.last().unwrap();
    let line_results = build_triads(depth, lines)
        .into_iter()
        .map(|triad| walk_line(base, triad, beta, last_price, horizon))
        .collect();

    Ok(PrimeTetrationOutput {
        lines: line_results,
        last_price_q8: to_q8(last_price),
        beta,
        horizon,
    })
}

fn walk_line(base: u64, triad: Triad, beta: f64, last_price: f64, horizon: usize) -> TetrationLine {
    let amplitude = amplitude_from_triad(base, &triad);
    let symmetric = amplitude_to_symmetric(&amplitude);

    let mut values = Vec::with_capacity(horizon);
    let mut price = last_price;
    let mut zero_crossings = 0;
    let mut turning_points = 0;
    let mut prev_z: Option<f64> = None;
    let mut prev_delta: Option<f64> = None;

    for n in 1..=horizon {
        let zv = z(n);
        let delta = beta * symmetric * zv;
        price = (price * (1.0 + delta)).max(0.0);
        price = from_q8(to_q8(price));
        values.push(price);

        if let Some(pz) = prev_z {
            if pz != 0.0 && zv != 0.0 && pz.signum() != zv.signum() {
                zero_crossings += 1;
            }
        }
        if let Some(pd) = prev_delta {
            if pd != 0.0 && delta != 0.0 && pd.signum() != delta.signum() {
                turning_points += 1;
            }
        }
        prev_z = Some(zv);
        prev_delta = Some(delta);
    }

    TetrationLine {
        triad,
        base,
        truncated_amplitude: truncated_amplitude(&amplitude),
        values,
        zero_crossings,
        turning_points,
    }
}
