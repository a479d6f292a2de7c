/// # Harmonic lattice functions
///
/// The 12-dimensional cosine lattice behind the lattice projection strategy.
/// Every envelope term follows the same tetration-scaled exponential pattern:
/// compute `tetration(b, 31)`, derive `scale = ln(tetrated) / (ln(b) * 31)`,
/// multiply the theta/exponent term by `scale`, and raise `b` back to the
/// scaled exponent. `p` uses base 12, `l` and the recursive layer use base 3.
use std::f64::consts::{PI, TAU};

use crate::utilities::primes::{is_prime, PHI, TETRATION_DEPTH};
use crate::utilities::tetration::tetration;

pub const GOLDEN_RATIO: f64 = 1.618033988749895;
const DEFAULT_OMEGA: f64 = 144000.0;

/// Mean cosine over the 12 lattice frequencies at step `n`. Range `[-1, 1]`.
pub fn z(n: usize) -> f64 {
    let angle = (n as f64 - 1.0) * (TAU / 12.0);
    let sum: f64 = PHI.iter().map(|&phi| (angle * phi as f64).cos()).sum();
    sum / PHI.len() as f64
}

pub fn theta(_n: usize, k: f64, lambda: f64, omega: f64, _psi: f64) -> f64 {
    let omega = if omega == 0.0 { DEFAULT_OMEGA } else { omega };
    k * PI * (1.0 - (lambda / omega) * GOLDEN_RATIO)
}

/// Shared envelope scale: `ln(tetration(b, 31)) / (ln(b) * 31)`.
pub fn tetration_scale(base: f64) -> f64 {
    tetration(base, TETRATION_DEPTH).ln() / (base.ln() * TETRATION_DEPTH as f64)
}

pub fn variance(history: &[f64]) -> f64 {
    if history.len() < 2 {
        return 0.0;
    }
    let mean = history.iter().sum::<f64>() / history.len() as f64;
    history.iter().map(|&x| (x - mean) * (x - mean)).sum::<f64>() / history.len() as f64
}

/// Entropy proxy from history variance, scaled by the dimension share.
pub fn entropy(d: usize, history: &[f64]) -> f64 {
    (variance(history).max(1.0).log2() + 1.0) * ((d as f64 + 1.0) / 12.0)
}

/// `log2(primeCount / entropy)` over the first `d + 1` lattice frequencies.
pub fn gamma(d: usize, history: &[f64]) -> f64 {
    let prime_count = PHI
        .iter()
        .take(d + 1)
        .filter(|&&phi| is_prime(phi))
        .count() as f64;
    (prime_count.max(1.0) / entropy(d, history).max(1.0)).log2()
}

/// `tetration(3, 31)^lambda mod 7`.
pub fn nu(lambda: f64) -> f64 {
    tetration(3.0, TETRATION_DEPTH).powf(lambda) % 7.0
}

pub fn mobius_sign(k: i64) -> f64 {
    if k % 2 == 0 {
        1.0
    } else {
        -1.0
    }
}

fn cosine_product(n: usize, d: usize) -> f64 {
    let angle = n as f64 * TAU / 12.0;
    PHI.iter()
        .take(d + 1)
        .map(|&phi| (angle * phi as f64 / 12.0).cos())
        .product()
}

/// Base-12 lattice term: tetration-scaled envelope times the cosine product
/// over dimensions `0..=d`.
pub fn p(n: usize, d: usize, k: i64, _history: &[f64]) -> f64 {
    let scale = tetration_scale(12.0);
    let th = theta(n, k as f64, 0.0, 0.0, 0.0);
    let envelope = 12f64.powf((th / (12.0 * PI)) * scale);
    envelope * cosine_product(n, d)
}

/// Base-3 lattice term: adds the Möbius sign, `nu`, and `gamma` factors on
/// top of the `p`-style envelope.
pub fn l(n: usize, d: usize, k: i64, lambda: f64, history: &[f64]) -> f64 {
    let scale = tetration_scale(3.0);
    let th = theta(n, k as f64, lambda, 0.0, 0.0);
    let envelope = 3f64.powf((th / (12.0 * PI)) * scale);
    mobius_sign(k) * nu(lambda) * gamma(d, history) * envelope * cosine_product(n, d)
}

/// Self-similar lattice layer. Each layer contributes `2^-depth` times its
/// own envelope/cosine product, multiplied by the next deeper layer. Depth is
/// threaded explicitly; recursion stops past `max_depth`.
pub fn recursive_lattice_layer(
    n: usize,
    d: usize,
    k: i64,
    lambda: f64,
    depth: u32,
    max_depth: u32,
    primes: &[u64],
) -> f64 {
    if depth > max_depth {
        return 1.0;
    }
    let scale = tetration_scale(3.0);
    let th = theta(n, k as f64, lambda, 0.0, 0.0);
    let envelope = 3f64.powf(scale * (th / (12.0 * PI * depth as f64)).cos());
    let angle = n as f64 * TAU / 12.0;
    let mut layer = envelope;
    for &prime in primes.iter().take(d + 1) {
        layer *= (angle * prime as f64 / (12.0 * depth as f64)).cos();
    }
    2f64.powi(-(depth as i32))
        * layer
        * recursive_lattice_layer(n, d, k, lambda, depth + 1, max_depth, primes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_z_range_and_first_step() {
        // Step 1 puts every cosine at angle 0.
        assert!((z(1) - 1.0).abs() < 1e-12);
        for n in 1..200 {
            let v = z(n);
            assert!(v.abs() <= 1.0 + 1e-12, "z({}) = {} out of range", n, v);
        }
    }

    #[test]
    fn test_theta_defaults_omega() {
        let with_default = theta(1, 2.0, 100.0, 0.0, 0.0);
        let explicit = theta(1, 2.0, 100.0, 144000.0, 0.0);
        assert!((with_default - explicit).abs() < 1e-12);
        // lambda = 0 reduces to k*pi.
        assert!((theta(1, 3.0, 0.0, 0.0, 0.0) - 3.0 * PI).abs() < 1e-12);
    }

    #[test]
    fn test_tetration_scale_finite() {
        for &base in [3.0, 12.0].iter() {
            let s = tetration_scale(base);
            assert!(s.is_finite() && s > 0.0, "scale({}) = {}", base, s);
        }
        // Base 12 hits the 700 log clamp: 700 / (ln(12) * 31).
        let expected = 700.0 / (12f64.ln() * 31.0);
        assert!((tetration_scale(12.0) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_gamma_flat_history_is_prime_count_log() {
        let flat = [100.0; 12];
        // Zero variance drives the entropy floor to 1, leaving log2(primeCount).
        let d = 3; // first 4 entries of PHI: 3, 7, 31, 12 -> three primes
        assert!((gamma(d, &flat) - 3f64.log2()).abs() < 1e-12);
    }

    #[test]
    fn test_nu_bounded_by_modulus() {
        for &lambda in [0.0, 0.25, 0.5, 0.75, 1.0].iter() {
            let v = nu(lambda);
            assert!((0.0..7.0).contains(&v), "nu({}) = {}", lambda, v);
        }
    }

    #[test]
    fn test_mobius_sign() {
        assert_eq!(mobius_sign(0), 1.0);
        assert_eq!(mobius_sign(3), -1.0);
        assert_eq!(mobius_sign(8), 1.0);
    }

    #[test]
    fn test_p_and_l_finite() {
        let history: Vec<f64> = (0..24).map(|i| 100.0 + (i as f64).sin()).collect();
        for n in 1..20 {
            for d in 0..12 {
                let pv = p(n, d, 7, &history);
                let lv = l(n, d, 7, 0.5, &history);
                assert!(pv.is_finite(), "p({}, {}) not finite", n, d);
                assert!(lv.is_finite(), "l({}, {}) not finite", n, d);
            }
        }
    }

    #[test]
    fn test_recursive_layer_bounded_and_deterministic() {
        let primes = [3u64, 7, 11, 13, 17, 19];
        for n in 1..15 {
            let a = recursive_lattice_layer(n, 5, 7, 0.5, 2, 7, &primes);
            let b = recursive_lattice_layer(n, 5, 7, 0.5, 2, 7, &primes);
            assert_eq!(a, b);
            assert!(a.is_finite());
            // Depth-2 leading factor caps the whole product.
            assert!(a.abs() <= 0.25 * 3f64.powf(tetration_scale(3.0)));
        }
        // Past max_depth the layer is the multiplicative identity.
        assert_eq!(
            recursive_lattice_layer(3, 5, 7, 0.5, 8, 7, &primes),
            1.0
        );
    }
}
