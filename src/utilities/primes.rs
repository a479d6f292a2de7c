use std::sync::OnceLock;

/// The 12-element harmonic frequency set. Carried verbatim from the lattice
/// model definition: 12 is intentionally composite and 31 appears twice.
pub const PHI: [u64; 12] = [3, 7, 31, 12, 19, 5, 11, 13, 17, 23, 29, 31];

/// Tetration depth used by every tetration-scaled harmonic term.
pub const TETRATION_DEPTH: i32 = 31;

/// Allowed prime-depth selectors for the prime tetration model.
pub const PRIME_DEPTH_STOPS: [u64; 10] = [11, 13, 17, 29, 31, 47, 59, 61, 97, 101];

/// Coprime padding set used when stabilization derives fewer than six.
pub const COPRIME_PAD: [u64; 6] = [7, 11, 13, 17, 19, 23];

const FIRST_PRIMES_COUNT: usize = 500;
// The 500th prime is 3571.
const SIEVE_LIMIT: usize = 3600;

static FIRST_PRIMES: OnceLock<Vec<u64>> = OnceLock::new();

/// First 500 primes via a sieve of Eratosthenes, computed once.
pub fn first_primes() -> &'static [u64] {
    FIRST_PRIMES.get_or_init(|| {
        let mut composite = vec![false; SIEVE_LIMIT + 1];
        let mut primes = Vec::with_capacity(FIRST_PRIMES_COUNT);
        for n in 2..=SIEVE_LIMIT {
            if composite[n] {
                continue;
            }
            primes.push(n as u64);
            if primes.len() == FIRST_PRIMES_COUNT {
                break;
            }
            let mut m = n * n;
            while m <= SIEVE_LIMIT {
                composite[m] = true;
                m += n;
            }
        }
        primes
    })
}

pub fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n < 4 {
        return true;
    }
    if n % 2 == 0 {
        return false;
    }
    let mut d = 3u64;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Prime factorization with multiplicity, ascending.
pub fn prime_factors(mut n: u64) -> Vec<u64> {
    let mut factors = Vec::new();
    let mut d = 2u64;
    while d * d <= n {
        while n % d == 0 {
            factors.push(d);
            n /= d;
        }
        d += 1;
    }
    if n > 1 {
        factors.push(n);
    }
    factors
}
