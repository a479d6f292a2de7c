/// # Linear projection fallback
///
/// Ordinary least-squares fit over the last 30 (or fewer) points, extrapolated
/// forward and floored at zero. Every other strategy degrades to this one when
/// history is too short, so it must succeed for any non-empty series: a single
/// point or a degenerate fit yields a flat line.
use crate::utilities::data_loader::{source_type, Candles};
use thiserror::Error;

pub const DEFAULT_LOOKBACK: usize = 30;
pub const DEFAULT_STEPS: usize = 30;

#[derive(Debug, Clone)]
pub enum LinearData<'a> {
    Candles {
        candles: &'a Candles,
        source: &'a str,
    },
    Slice(&'a [f64]),
}

#[derive(Debug, Clone)]
pub struct LinearParams {
    pub steps: Option<usize>,
    pub lookback: Option<usize>,
}

impl Default for LinearParams {
    fn default() -> Self {
        Self {
            steps: Some(DEFAULT_STEPS),
            lookback: Some(DEFAULT_LOOKBACK),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LinearInput<'a> {
    pub data: LinearData<'a>,
    pub params: LinearParams,
}

impl<'a> LinearInput<'a> {
    pub fn from_candles(candles: &'a Candles, source: &'a str, params: LinearParams) -> Self {
        Self {
            data: LinearData::Candles { candles, source },
            params,
        }
    }

    pub fn from_slice(slice: &'a [f64], params: LinearParams) -> Self {
        Self {
            data: LinearData::Slice(slice),
            params,
        }
    }

    pub fn with_default_candles(candles: &'a Candles) -> Self {
        Self::from_candles(candles, "close", LinearParams::default())
    }

    pub fn get_steps(&self) -> usize {
        self.params.steps.unwrap_or(DEFAULT_STEPS)
    }

    pub fn get_lookback(&self) -> usize {
        self.params.lookback.unwrap_or(DEFAULT_LOOKBACK)
    }
}

#[derive(Debug, Clone)]
pub struct LinearOutput {
    pub values: Vec<f64>,
}

#[derive(Debug, Error)]
pub enum LinearError {
    #[error("linear: Empty data provided for projection.")]
    EmptyData,
    #[error("linear: Requested steps must be at least 1.")]
    ZeroSteps,
}

#[inline]
pub fn linear(input: &LinearInput) -> Result<LinearOutput, LinearError> {
    let data: &[f64] = match &input.data {
        LinearData::Candles { candles, source } => source_type(candles, source),
        LinearData::Slice(slice) => slice,
    };
    let steps = input.get_steps();
    if steps == 0 {
        return Err(LinearError::ZeroSteps);
    }
    if data.is_empty() {
        return Err(LinearError::EmptyData);
    }
    Ok(LinearOutput {
        values: project_linear(data, steps, input.get_lookback()),
    })
}

/// Internal fallback entry used by the other strategies. Never fails for
/// non-empty data and always returns exactly `steps` values.
pub(crate) fn project_linear(data: &[f64], steps: usize, lookback: usize) -> Vec<f64> {
    let window_len = data.len().min(lookback.max(1));
    let window = &data[data.len() - window_len..];
    let n = window_len as f64;

    let mut slope = 0.0;
    let mut intercept = *window.last().unwrap_or(&0.0);
    if window_len >= 2 {
        let sum_x = (0..window_len).map(|x| x as f64).sum::<f64>();
        let sum_x_sqr = (0..window_len).map(|x| (x as f64) * (x as f64)).sum::<f64>();
        let divisor = n * sum_x_sqr - sum_x * sum_x;
        if divisor != 0.0 {
            let mut sum_y = 0.0;
            let mut sum_xy = 0.0;
            for (x, &y) in window.iter().enumerate() {
                sum_y += y;
                sum_xy += x as f64 * y;
            }
            slope = (n * sum_xy - sum_x * sum_y) / divisor;
            intercept = (sum_y - slope * sum_x) / n;
        }
    }

    (1..=steps)
        .map(|s| {
            let x = (window_len - 1 + s) as f64;
            (intercept + slope * x).max(0.0)
        })
        .collect()
}
