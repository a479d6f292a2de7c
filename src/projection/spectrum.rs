/// # Spectral oscillation detector
///
/// Recursive radix-2 FFT over the zero-mean, peak-normalized price-change
/// signal, zero-padded to the next power of two. Frequency bins in the first
/// half of the spectrum become candidate periods; periods inside `[2, N/2]`
/// with magnitude above 0.1 are ranked by magnitude and the top five are
/// reported.
use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

pub const MIN_POINTS: usize = 8;
const MAGNITUDE_THRESHOLD: f64 = 0.1;
const MAX_ENTRIES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub fn magnitude(self) -> f64 {
        (self.re * self.re + self.im * self.im).sqrt()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OscillationEntry {
    pub period: f64,
    pub frequency: f64,
    pub strength: f64,
}

/// Recursive radix-2 FFT. Length must be a power of two (callers zero-pad).
pub fn fft(signal: &[Complex]) -> Vec<Complex> {
    let n = signal.len();
    if n <= 1 {
        return signal.to_vec();
    }
    let even: Vec<Complex> = signal.iter().step_by(2).copied().collect();
    let odd: Vec<Complex> = signal.iter().skip(1).step_by(2).copied().collect();
    let even_fft = fft(&even);
    let odd_fft = fft(&odd);

    let mut out = vec![Complex { re: 0.0, im: 0.0 }; n];
    for k in 0..n / 2 {
        let angle = -TAU * k as f64 / n as f64;
        let (sin, cos) = angle.sin_cos();
        let t = Complex {
            re: cos * odd_fft[k].re - sin * odd_fft[k].im,
            im: cos * odd_fft[k].im + sin * odd_fft[k].re,
        };
        out[k] = Complex {
            re: even_fft[k].re + t.re,
            im: even_fft[k].im + t.im,
        };
        out[k + n / 2] = Complex {
            re: even_fft[k].re - t.re,
            im: even_fft[k].im - t.im,
        };
    }
    out
}

/// Detect dominant oscillation periods in a price history. Fewer than 8
/// points, or no bin clearing the magnitude threshold, yields an empty list
/// ("no oscillations") rather than an error.
pub fn detect_oscillations(history: &[f64]) -> Vec<OscillationEntry> {
    if history.len() < MIN_POINTS {
        return Vec::new();
    }

    let mut changes: Vec<f64> = history.windows(2).map(|w| w[1] - w[0]).collect();
    let signal_len = changes.len();
    let mean = changes.iter().sum::<f64>() / signal_len as f64;
    for v in changes.iter_mut() {
        *v -= mean;
    }
    let peak = changes.iter().fold(0.0f64, |acc, &v| acc.max(v.abs()));
    if peak > 0.0 {
        for v in changes.iter_mut() {
            *v /= peak;
        }
    }

    let padded_len = signal_len.next_power_of_two();
    let mut signal: Vec<Complex> = changes
        .iter()
        .map(|&re| Complex { re, im: 0.0 })
        .collect();
    signal.resize(padded_len, Complex { re: 0.0, im: 0.0 });

    let spectrum = fft(&signal);

    let mut entries: Vec<OscillationEntry> = Vec::new();
    for k in 0..padded_len / 2 {
        let frequency = k as f64 / padded_len as f64;
        let period = if frequency == 0.0 {
            signal_len as f64
        } else {
            1.0 / frequency
        };
        let strength = spectrum[k].magnitude();
        if period >= 2.0 && period <= (padded_len / 2) as f64 && strength > MAGNITUDE_THRESHOLD {
            entries.push(OscillationEntry {
                period,
                frequency,
                strength,
            });
        }
    }

    entries.sort_by(|a, b| b.strength.partial_cmp(&a.strength).unwrap_or(std::cmp::Ordering::Equal));
    entries.truncate(MAX_ENTRIES);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_history(len: usize, period: f64, amplitude: f64) -> Vec<f64> {
        (0..len)
            .map(|i| 100.0 + amplitude * (TAU * i as f64 / period).sin())
            .collect()
    }

    #[test]
    fn test_fft_impulse_is_flat() {
        let mut signal = vec![Complex { re: 0.0, im: 0.0 }; 8];
        signal[0].re = 1.0;
        let spectrum = fft(&signal);
        for bin in spectrum {
            assert!((bin.magnitude() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_fft_pure_tone_energy() {
        // cos(2*pi*k0*i/N) concentrates in bins k0 and N - k0.
        let n = 32;
        let k0 = 4;
        let signal: Vec<Complex> = (0..n)
            .map(|i| Complex {
                re: (TAU * k0 as f64 * i as f64 / n as f64).cos(),
                im: 0.0,
            })
            .collect();
        let spectrum = fft(&signal);
        assert!((spectrum[k0].magnitude() - n as f64 / 2.0).abs() < 1e-9);
        assert!((spectrum[n - k0].magnitude() - n as f64 / 2.0).abs() < 1e-9);
        assert!(spectrum[1].magnitude() < 1e-9);
    }

    #[test]
    fn test_detects_known_period() {
        let history = sine_history(33, 8.0, 5.0);
        let entries = detect_oscillations(&history);
        assert!(!entries.is_empty(), "Expected oscillations in a sinusoid");
        let dominant = &entries[0];
        assert!(
            (dominant.period - 8.0).abs() <= 1.0,
            "Dominant period {} not within 1 of 8",
            dominant.period
        );
    }

    #[test]
    fn test_entries_ranked_and_capped() {
        // Two tones, the longer-period one stronger.
        let history: Vec<f64> = (0..65)
            .map(|i| {
                100.0
                    + 6.0 * (TAU * i as f64 / 16.0).sin()
                    + 2.0 * (TAU * i as f64 / 4.0).sin()
            })
            .collect();
        let entries = detect_oscillations(&history);
        assert!(entries.len() >= 2);
        assert!(entries.len() <= 5, "Entry cap exceeded");
        for pair in entries.windows(2) {
            assert!(
                pair[0].strength >= pair[1].strength,
                "Entries not sorted by strength"
            );
        }
        for e in &entries {
            assert!(e.period >= 2.0);
            assert!(e.strength >= 0.0);
        }
    }

    #[test]
    fn test_short_history_reports_nothing() {
        let history = [100.0, 101.0, 100.5, 101.5, 100.0, 102.0, 101.0];
        assert!(detect_oscillations(&history).is_empty());
    }

    #[test]
    fn test_flat_history_reports_nothing() {
        let history = [100.0; 32];
        assert!(detect_oscillations(&history).is_empty());
    }
}
