/// # Fixed-point and modular arithmetic primitives
///
/// Exact big-integer arithmetic backing the prime tetration model. Amplitudes
/// live modulo `2^72` (64 result bits plus 8 guard bits); exponents are
/// reduced modulo `2^70`, the Carmichael bound for odd residues mod `2^72`.
/// Projected prices are quantized to Q8 fixed point (1 unit = 1/256).
use num_bigint::{BigInt, BigUint};
use num_traits::{One, Signed, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};

/// Three consecutive primes seeding one projection line. `p1` identifies the
/// line; `p2^p3` forms the exponent tower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triad {
    pub p1: u64,
    pub p2: u64,
    pub p3: u64,
}

/// Total amplitude width: 64 result bits + 8 guard bits.
pub const AMPLITUDE_BITS: u64 = 72;
/// Guard bits discarded when mapping an amplitude to the unit interval.
pub const GUARD_BITS: u64 = 8;
/// Exponent reduction width: λ(2^72) = 2^70 for odd bases.
pub const EXPONENT_BITS: u64 = 70;

pub fn amplitude_modulus() -> BigUint {
    BigUint::one() << AMPLITUDE_BITS
}

pub fn exponent_modulus() -> BigUint {
    BigUint::one() << EXPONENT_BITS
}

/// Square-and-multiply modular exponentiation. Negative bases are normalized
/// into `[0, modulus)` first.
pub fn mod_pow(base: &BigInt, exponent: &BigUint, modulus: &BigUint) -> BigUint {
    let modulus_int = BigInt::from(modulus.clone());
    let mut normalized = base % &modulus_int;
    if normalized.is_negative() {
        normalized += &modulus_int;
    }
    let base_uint = normalized
        .to_biguint()
        .unwrap_or_else(BigUint::zero);
    base_uint.modpow(exponent, modulus)
}

/// Modular amplitude of one triad: `E = p2^p3 mod 2^70`, then
/// `A = base^(E + 2^70) mod 2^72`. The `+ 2^70` keeps the exponent on the
/// correct residue branch of the cyclic group of odd residues mod `2^72`.
pub fn amplitude_from_triad(base: u64, triad: &Triad) -> BigUint {
    let exp_mod = exponent_modulus();
    let tower = mod_pow(
        &BigInt::from(triad.p2),
        &BigUint::from(triad.p3),
        &exp_mod,
    );
    let effective = tower + exp_mod;
    mod_pow(&BigInt::from(base), &effective, &amplitude_modulus())
}

/// Drop the guard bits and map the remaining 64-bit value symmetrically onto
/// `(-1, 1)`.
pub fn amplitude_to_symmetric(amplitude: &BigUint) -> f64 {
    let truncated = amplitude >> GUARD_BITS;
    let u = truncated.to_u64().unwrap_or(u64::MAX);
    (u as f64 / 2f64.powi(64)) * 2.0 - 1.0
}

/// The truncated 64-bit amplitude (guard bits removed), for diagnostics.
pub fn truncated_amplitude(amplitude: &BigUint) -> u64 {
    (amplitude >> GUARD_BITS).to_u64().unwrap_or(u64::MAX)
}

/// Truncate (not round) to an integer count of 1/256ths.
pub fn to_q8(x: f64) -> i64 {
    (x * 256.0).trunc() as i64
}

pub fn from_q8(q: i64) -> f64 {
    q as f64 / 256.0
}
