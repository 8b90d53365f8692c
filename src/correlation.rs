//! Normalized complex cross-correlation with a multi-resolution lag search.
//!
//! Finding the relative delay between two receivers means scanning a few
//! hundred candidate lags over signals of up to 50k samples. A brute-force
//! scan at full resolution is wasteful, so the search runs in three stages:
//! a coarse pass over signals decimated by 8, a medium pass at half
//! resolution around the coarse peak, and a fine pass at full resolution.
//! Decimation drops samples without an anti-alias filter; that is acceptable
//! here because the peak is always refined at full resolution, and the
//! search range of each stage covers the quantization error of the previous
//! one.

use num_complex::{Complex32, Complex64};

use crate::error::{Error, Result};
use crate::processor::CancelToken;

/// Upper bound on the number of samples fed into the search.
pub const MAX_CORRELATION_LEN: usize = 50_000;

/// Minimum signal length the search accepts.
pub const MIN_CORRELATION_LEN: usize = 1_000;

/// Minimum length of a decimated signal.
const MIN_DECIMATED_LEN: usize = 100;

const COARSE_DECIMATION: usize = 8;
const MEDIUM_DECIMATION: usize = 2;
/// Medium-stage search radius in decimated samples (covers the coarse grid
/// spacing with margin).
const MEDIUM_RADIUS: i64 = 16;
/// Fine-stage search radius in full-resolution samples.
const FINE_RADIUS: i64 = 8;

/// Outcome of the multi-resolution search.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationPeak {
    /// Best lag in full-resolution samples. Positive when `b` lags `a`.
    pub lag: i64,
    /// Signed correlation value at the best lag.
    pub value: f64,
    /// `|value|`; what "best" was judged by.
    pub magnitude: f64,
}

impl CorrelationPeak {
    /// Measurement confidence derived from the peak, clamped to `[0, 1]`.
    pub fn confidence(&self) -> f64 {
        self.magnitude.min(1.0)
    }
}

/// Run the coarse/medium/fine lag search between two signals.
///
/// At most [`MAX_CORRELATION_LEN`] samples of each signal are used. The
/// search covers lags up to a tenth of the correlation length in either
/// direction. Cancellation is observed between stages.
pub fn correlate(a: &[Complex32], b: &[Complex32], cancel: &CancelToken) -> Result<CorrelationPeak> {
    let corr_len = a.len().min(b.len()).min(MAX_CORRELATION_LEN);
    if corr_len < MIN_CORRELATION_LEN {
        return Err(Error::InsufficientSamples {
            available: corr_len,
            required: MIN_CORRELATION_LEN,
        });
    }
    let a = &a[..corr_len];
    let b = &b[..corr_len];
    let max_lag = (corr_len / 10) as i64;

    // Coarse: decimate by 8, roughly one hundred probes across the full
    // lag range.
    let a_coarse = decimate(a, COARSE_DECIMATION);
    let b_coarse = decimate(b, COARSE_DECIMATION);
    ensure_decimated_len(a_coarse.len().min(b_coarse.len()))?;
    let coarse_range = max_lag / COARSE_DECIMATION as i64;
    let coarse_step = (coarse_range / 50).max(1);
    let (coarse_lag, coarse_value) = search(
        &a_coarse,
        &b_coarse,
        -coarse_range,
        coarse_range,
        coarse_step,
    );
    let coarse_lag = coarse_lag * COARSE_DECIMATION as i64;
    log::debug!("coarse peak {coarse_value:.4} at lag {coarse_lag}");
    cancel.check()?;

    // Medium: half resolution around the coarse estimate.
    let a_medium = decimate(a, MEDIUM_DECIMATION);
    let b_medium = decimate(b, MEDIUM_DECIMATION);
    ensure_decimated_len(a_medium.len().min(b_medium.len()))?;
    let center = coarse_lag / MEDIUM_DECIMATION as i64;
    let (medium_lag, _) = search(
        &a_medium,
        &b_medium,
        center - MEDIUM_RADIUS,
        center + MEDIUM_RADIUS,
        1,
    );
    let medium_lag = medium_lag * MEDIUM_DECIMATION as i64;
    cancel.check()?;

    // Fine: full resolution around the medium estimate.
    let (lag, value) = search(a, b, medium_lag - FINE_RADIUS, medium_lag + FINE_RADIUS, 1);
    log::debug!("fine peak {value:.4} at lag {lag}");

    Ok(CorrelationPeak {
        lag,
        value,
        magnitude: value.abs(),
    })
}

/// Normalized cross-correlation of `a` against `b` at an integer lag.
///
/// Accumulation runs in `Complex64`. The self-product sums (`s11`, `s22`)
/// square the complex values without conjugation, so the denominator is not
/// a textbook complex variance; the real part of the normalized product is
/// what downstream peak detection keys on, and the collector's processing
/// chain depends on this exact form. Degenerate inputs (empty overlap, zero
/// or non-finite variance) return 0.
pub fn normalized_correlation(a: &[Complex32], b: &[Complex32], lag: i64) -> f64 {
    let len = a.len().min(b.len());
    let start_a = (-lag).max(0) as usize;
    let start_b = lag.max(0) as usize;
    let offset = start_a.max(start_b);
    if offset >= len {
        return 0.0;
    }
    let n = len - offset;

    let mut s1 = Complex64::new(0.0, 0.0);
    let mut s2 = Complex64::new(0.0, 0.0);
    let mut s11 = Complex64::new(0.0, 0.0);
    let mut s22 = Complex64::new(0.0, 0.0);
    let mut sp = Complex64::new(0.0, 0.0);

    for i in 0..n {
        let x = widen(a[start_a + i]);
        let y = widen(b[start_b + i]);
        s1 += x;
        s2 += y;
        s11 += x * x;
        s22 += y * y;
        sp += x * y.conj();
    }

    let count = n as f64;
    let mean_a = s1 / count;
    let mean_b = s2 / count;
    let numerator = sp - mean_a * mean_b.conj() * count;
    let var_a = s11 - mean_a * mean_a.conj() * count;
    let var_b = s22 - mean_b * mean_b.conj() * count;

    let denom_sq = var_a.re * var_b.re;
    if !(denom_sq > 0.0) {
        return 0.0;
    }
    let value = numerator.re / denom_sq.sqrt();
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Scan lags `from..=to` in `step` increments, keeping the largest `|corr|`.
///
/// Returns the best lag and the signed correlation there.
fn search(a: &[Complex32], b: &[Complex32], from: i64, to: i64, step: i64) -> (i64, f64) {
    let mut best_lag = from;
    let mut best_value = normalized_correlation(a, b, from);
    let mut lag = from + step;
    while lag <= to {
        let value = normalized_correlation(a, b, lag);
        if value.abs() > best_value.abs() {
            best_lag = lag;
            best_value = value;
        }
        lag += step;
    }
    (best_lag, best_value)
}

/// Keep every `factor`-th sample, starting with the first.
fn decimate(signal: &[Complex32], factor: usize) -> Vec<Complex32> {
    signal.iter().step_by(factor).copied().collect()
}

fn ensure_decimated_len(len: usize) -> Result<()> {
    if len < MIN_DECIMATED_LEN {
        return Err(Error::InsufficientSamples {
            available: len,
            required: MIN_DECIMATED_LEN,
        });
    }
    Ok(())
}

fn widen(sample: Complex32) -> Complex64 {
    Complex64::new(sample.re as f64, sample.im as f64)
}
