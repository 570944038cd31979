/*
 * Weft Binary Ephemeris Engine
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Chebyshev-T series evaluation and least-squares fitting.
//!
//! [`eval_cheb`] uses a three-register Clenshaw workspace and always
//! evaluates in `f64` regardless of the on-disk coefficient width, since
//! coefficients are stored as `f32` but the reader evaluates in double
//! precision.

use crate::errors::FitError;
use nalgebra::{DMatrix, DVector};

/// Evaluates `sum_n coeffs[n] * T_n(x)` via the Clenshaw recurrence.
///
/// `x` must lie in `[-1, 1]`; callers are responsible for clamping (the
/// affine mapping from an instant into a block's coverage interval is done
/// by the reader before calling this function). This function never fails:
/// an empty coefficient slice evaluates to `0.0`.
pub fn eval_cheb(coeffs: &[f64], x: f64) -> f64 {
    if coeffs.is_empty() {
        return 0.0;
    }
    let degree = coeffs.len() - 1;
    let mut w = [0.0_f64; 3];

    for j in (2..=degree + 1).rev() {
        w[2] = w[1];
        w[1] = w[0];
        w[0] = coeffs[j - 1] + 2.0 * x * w[1] - w[2];
    }

    coeffs[0] + x * w[0] - w[1]
}

/// Least-squares fit of a degree-`degree` truncated Chebyshev-T series to
/// irregularly spaced `(x, y)` samples on `[-1, 1]`.
///
/// Builds the `T_n(x_i)` design matrix and solves the normal equations
/// `(AᵀA) c = Aᵀy` via nalgebra's LU decomposition. Requires at least
/// `degree + 1` samples.
pub fn fit(samples: &[(f64, f64)], degree: usize) -> Result<Vec<f64>, FitError> {
    let need = degree + 1;
    if samples.len() < need {
        return Err(FitError::InsufficientSamples {
            degree,
            need,
            got: samples.len(),
        });
    }

    let n = samples.len();
    let mut a = DMatrix::<f64>::zeros(n, need);
    let mut b = DVector::<f64>::zeros(n);

    for (row, (x, y)) in samples.iter().enumerate() {
        a[(row, 0)] = 1.0;
        if need > 1 {
            a[(row, 1)] = *x;
            let (mut t_prev2, mut t_prev1) = (1.0_f64, *x);
            for col in 2..need {
                let t_col = 2.0 * x * t_prev1 - t_prev2;
                a[(row, col)] = t_col;
                t_prev2 = t_prev1;
                t_prev1 = t_col;
            }
        }
        b[row] = *y;
    }

    let ata = a.transpose() * &a;
    let atb = a.transpose() * &b;

    ata.lu()
        .solve(&atb)
        .map(|c| c.iter().copied().collect())
        .ok_or(FitError::SingularSystem)
}

/// Walks `y` and adds `±span` whenever consecutive samples jump by more than
/// `span / 2`, producing a continuous signal suitable for fitting a wrapping
/// quantity (e.g. an angle that crosses 0/360).
pub fn unwrap_angles(y: &[f64], min: f64, max: f64) -> Vec<f64> {
    let span = max - min;
    let mut out = Vec::with_capacity(y.len());
    let mut offset = 0.0;
    let mut prev: Option<f64> = None;

    for &raw in y {
        let mut adjusted = raw + offset;
        if let Some(p) = prev {
            let diff = adjusted - p;
            if diff > span / 2.0 {
                offset -= span;
                adjusted -= span;
            } else if diff < -span / 2.0 {
                offset += span;
                adjusted += span;
            }
        }
        out.push(adjusted);
        prev = Some(adjusted);
    }

    out
}

#[cfg(test)]
mod chebyshev_ut {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn eval_constant() {
        assert_relative_eq!(eval_cheb(&[3.0], 0.7), 3.0);
    }

    #[test]
    fn eval_linear() {
        // c0 * T0(x) + c1 * T1(x) = c0 + c1 * x
        assert_relative_eq!(eval_cheb(&[1.0, 2.0], 0.5), 1.0 + 2.0 * 0.5);
    }

    #[test]
    fn eval_quadratic_matches_t2() {
        // T2(x) = 2x^2 - 1
        let x = 0.3;
        let expected = 2.0 * x * x - 1.0;
        assert_relative_eq!(eval_cheb(&[0.0, 0.0, 1.0], x), expected, epsilon = 1e-12);
    }

    #[test]
    fn fit_recovers_exact_polynomial() {
        // y = 1 - 2x + 3*T2(x), sampled densely and refit exactly (degree == source).
        let coeffs_truth = [1.0, -2.0, 3.0];
        let samples: Vec<(f64, f64)> = (0..50)
            .map(|i| {
                let x = -1.0 + 2.0 * (i as f64) / 49.0;
                (x, eval_cheb(&coeffs_truth, x))
            })
            .collect();

        let fitted = fit(&samples, 2).unwrap();
        for (a, b) in fitted.iter().zip(coeffs_truth.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-8);
        }
    }

    #[test]
    fn fit_rejects_too_few_samples() {
        let samples = [(0.0, 1.0), (0.5, 2.0)];
        assert_eq!(
            fit(&samples, 4),
            Err(FitError::InsufficientSamples {
                degree: 4,
                need: 5,
                got: 2
            })
        );
    }

    #[test]
    fn unwrap_removes_discontinuities() {
        // A steady 15 deg/hour rotation wraps at 360; unwrap should make it monotonic.
        let wrapped: Vec<f64> = (0..48).map(|h| (h as f64 * 15.0) % 360.0).collect();
        let unwrapped = unwrap_angles(&wrapped, 0.0, 360.0);
        for w in unwrapped.windows(2) {
            assert!(w[1] > w[0]);
        }
        assert_relative_eq!(unwrapped[0], 0.0);
        assert_relative_eq!(unwrapped[47], 47.0 * 15.0);
    }
}
