/// Iterated exponentiation `base^^depth`.
///
/// Depths of 10 and above are evaluated in the log domain, iterating
/// `log = ln(base) * log` and clamping at 700 before exponentiating back
/// (exp(700) sits just under f64::MAX). Shallower depths iterate
/// `result = base^result` directly and short-circuit to a sentinel once the
/// result leaves the safe-integer range.
const LOG_CLAMP: f64 = 700.0;
const SAFE_INTEGER_MAX: f64 = 9007199254740991.0; // 2^53 - 1

pub fn tetration(base: f64, depth: i32) -> f64 {
    if depth <= 0 {
        return 1.0;
    }
    if depth == 1 {
        return base;
    }
    if base <= 0.0 {
        return 0.0;
    }
    if base == 1.0 {
        return 1.0;
    }

    if depth >= 10 {
        let log_base = base.ln();
        let mut running_log = log_base;
        for _ in 1..depth {
            running_log *= log_base;
            if running_log > LOG_CLAMP {
                running_log = LOG_CLAMP;
                break;
            }
        }
        return running_log.exp();
    }

    let mut result = base;
    for _ in 1..depth {
        result = base.powf(result);
        if !result.is_finite() || result > SAFE_INTEGER_MAX {
            return f64::MAX;
        }
    }
    result
}
