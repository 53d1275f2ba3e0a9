//! Numerical routines shared by the cast and transect analyses.
//!
//! Everything in this module is a pure function over its inputs, so callers are free to
//! parallelize across independent casts. Missing values are IEEE NaN throughout; every
//! routine either skips NaN observations or lets NaN propagate, as documented per function.

use itertools::izip;
use nalgebra::{DMatrix, DVector};
use ndarray::Array2;

use crate::error::{AnalysisError, Result};

/// Gravitational acceleration in m/s².
pub const G: f64 = 9.8;

/// Angular velocity of the Earth in rad/s.
pub const OMEGA: f64 = 2.0 * std::f64::consts::PI / 86_400.0;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS: f64 = 6.371e6;

/// Coriolis parameter 2Ω·sin(φ) for a latitude in degrees.
#[inline]
pub fn coriolis_parameter(lat_deg: f64) -> f64 {
    2.0 * OMEGA * lat_deg.to_radians().sin()
}

/// First derivative dy/dx on a non-uniform grid, NaN-aware.
///
/// Uses the second-order non-uniform centered stencil where both neighbors are finite,
/// falls back to a one-sided difference at the ends and next to missing values, and
/// returns NaN where no stencil applies. The result has the same length as the input.
pub fn diff1(ys: &[f64], xs: &[f64]) -> Vec<f64> {
    debug_assert_eq!(ys.len(), xs.len());
    let n = ys.len();

    let finite = |i: usize| ys[i].is_finite() && xs[i].is_finite();

    (0..n)
        .map(|i| {
            let has_prev = i > 0 && finite(i - 1);
            let has_next = i + 1 < n && finite(i + 1);
            if !finite(i) {
                return f64::NAN;
            }

            if has_prev && has_next {
                let hl = xs[i] - xs[i - 1];
                let hr = xs[i + 1] - xs[i];
                (hl * hl * ys[i + 1] - hr * hr * ys[i - 1] + (hr * hr - hl * hl) * ys[i])
                    / (hl * hr * (hl + hr))
            } else if has_next {
                (ys[i + 1] - ys[i]) / (xs[i + 1] - xs[i])
            } else if has_prev {
                (ys[i] - ys[i - 1]) / (xs[i] - xs[i - 1])
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Forward difference operator on a uniform grid with spacing `h`.
///
/// The operator maps a vector of `n` samples to its `n - 1` interval slopes. It is banded
/// with two diagonals; profiles run to a few thousand samples at most, so it is assembled
/// densely rather than in a compressed sparse format.
pub fn forward_difference_matrix(n: usize, h: f64) -> DMatrix<f64> {
    let mut d = DMatrix::zeros(n - 1, n);
    for i in 0..n - 1 {
        d[(i, i)] = -1.0 / h;
        d[(i, i + 1)] = 1.0 / h;
    }
    d
}

/// Centered difference derivative along the station axis of a transect matrix.
///
/// `mat` is (level × station) and `xs` holds the along-track coordinate of each station,
/// which need not be uniformly spaced. Columns next to a missing neighbor fall back to a
/// one-sided difference; where no stencil applies the result is NaN. Same shape as `mat`.
pub fn diff2_along(mat: &Array2<f64>, xs: &[f64]) -> Array2<f64> {
    let (nrows, ncols) = mat.dim();
    debug_assert_eq!(ncols, xs.len());

    let mut out = Array2::from_elem((nrows, ncols), f64::NAN);
    for i in 0..nrows {
        for j in 0..ncols {
            let center = mat[(i, j)];
            let left = if j > 0 { mat[(i, j - 1)] } else { f64::NAN };
            let right = if j + 1 < ncols { mat[(i, j + 1)] } else { f64::NAN };

            out[(i, j)] = if left.is_finite() && right.is_finite() {
                (right - left) / (xs[j + 1] - xs[j - 1])
            } else if right.is_finite() && center.is_finite() {
                (right - center) / (xs[j + 1] - xs[j])
            } else if left.is_finite() && center.is_finite() {
                (center - left) / (xs[j] - xs[j - 1])
            } else {
                f64::NAN
            };
        }
    }
    out
}

/// Forward difference derivative evaluated *between* the stations of a transect matrix.
///
/// The result has one fewer column than `mat`; column `j` is the slope between stations
/// `j` and `j + 1`.
pub fn diff2_inner(mat: &Array2<f64>, xs: &[f64]) -> Array2<f64> {
    let (nrows, ncols) = mat.dim();
    debug_assert_eq!(ncols, xs.len());
    debug_assert!(ncols >= 2);

    let mut out = Array2::from_elem((nrows, ncols - 1), f64::NAN);
    for j in 0..ncols - 1 {
        let dx = xs[j + 1] - xs[j];
        for i in 0..nrows {
            out[(i, j)] = (mat[(i, j + 1)] - mat[(i, j)]) / dx;
        }
    }
    out
}

/// Smooth a series with a Gaussian kernel of standard deviation `sigma` samples.
///
/// The kernel is truncated at four standard deviations and the series is reflected at its
/// ends. A window containing a NaN produces a NaN output sample.
pub fn gaussian_smooth(ys: &[f64], sigma: f64) -> Vec<f64> {
    let n = ys.len();
    if n == 0 || sigma <= 0.0 {
        return ys.to_vec();
    }

    let radius = (4.0 * sigma).ceil() as isize;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|k| (-0.5 * (k as f64 / sigma).powi(2)).exp())
        .collect();
    let norm: f64 = weights.iter().sum();

    let reflect = |idx: isize| -> usize {
        let n = n as isize;
        let mut i = idx;
        // reflect about the array edges until in range
        loop {
            if i < 0 {
                i = -i - 1;
            } else if i >= n {
                i = 2 * n - i - 1;
            } else {
                return i as usize;
            }
        }
    };

    (0..n as isize)
        .map(|i| {
            let mut acc = 0.0;
            for (k, w) in (-radius..=radius).zip(weights.iter()) {
                let y = ys[reflect(i + k)];
                if !y.is_finite() {
                    return f64::NAN;
                }
                acc += w * y;
            }
            acc / norm
        })
        .collect()
}

/// Integrate vertical shear into absolute velocity, column by column.
///
/// `dudz` and `depth` are (level × station) matrices of equal shape. Each column is
/// integrated with the trapezoid rule upward from its deepest mutually finite level,
/// where the velocity is referenced to zero. Levels below the reference or interrupted
/// by missing values stay NaN.
pub fn integrate_shear(dudz: &Array2<f64>, depth: &Array2<f64>) -> Array2<f64> {
    let (nrows, ncols) = dudz.dim();
    debug_assert_eq!(dudz.dim(), depth.dim());

    let mut u = Array2::from_elem((nrows, ncols), f64::NAN);
    for j in 0..ncols {
        let bottom = (0..nrows)
            .rev()
            .find(|&i| dudz[(i, j)].is_finite() && depth[(i, j)].is_finite());
        let bottom = match bottom {
            Some(b) => b,
            None => continue,
        };

        u[(bottom, j)] = 0.0;
        for i in (0..bottom).rev() {
            let terms = [dudz[(i, j)], dudz[(i + 1, j)], depth[(i, j)], depth[(i + 1, j)]];
            if terms.iter().all(|v| v.is_finite()) && u[(i + 1, j)].is_finite() {
                let dz = depth[(i + 1, j)] - depth[(i, j)];
                u[(i, j)] = u[(i + 1, j)] + 0.5 * (dudz[(i, j)] + dudz[(i + 1, j)]) * dz;
            }
        }
    }
    u
}

/// Great-circle distance in meters between two (longitude, latitude) points in degrees.
pub fn great_circle_distance(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Natural cubic smoothing spline in the Reinsch form.
///
/// Minimizes the residual sum of squares plus `smoothing` times the integrated squared
/// curvature. A smoothing strength of zero interpolates the data; larger values give a
/// stiffer fit. Knots must be strictly increasing and all values finite.
pub struct SmoothingSpline {
    xs: Vec<f64>,
    fitted: Vec<f64>,
    second_derivs: Vec<f64>,
}

impl SmoothingSpline {
    /// Fit the spline to `(xs, ys)` with the given smoothing strength.
    pub fn fit(xs: &[f64], ys: &[f64], smoothing: f64) -> Result<Self> {
        debug_assert_eq!(xs.len(), ys.len());
        let n = xs.len();
        if n < 2 {
            return Err(AnalysisError::NoValidData);
        }
        crate::interpolation::check_monotonic(xs, "spline knots")?;

        if n == 2 {
            // a straight line has no curvature to penalize
            return Ok(SmoothingSpline {
                xs: xs.to_vec(),
                fitted: ys.to_vec(),
                second_derivs: vec![0.0; 2],
            });
        }

        let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();

        // Q^T maps knot values to scaled second differences at the interior knots.
        let m = n - 2;
        let mut qt = DMatrix::zeros(m, n);
        for k in 0..m {
            qt[(k, k)] = 1.0 / h[k];
            qt[(k, k + 1)] = -1.0 / h[k] - 1.0 / h[k + 1];
            qt[(k, k + 2)] = 1.0 / h[k + 1];
        }

        let mut r = DMatrix::zeros(m, m);
        for k in 0..m {
            r[(k, k)] = (h[k] + h[k + 1]) / 3.0;
            if k + 1 < m {
                r[(k, k + 1)] = h[k + 1] / 6.0;
                r[(k + 1, k)] = h[k + 1] / 6.0;
            }
        }

        let y = DVector::from_column_slice(ys);
        let lhs = &r + smoothing * (&qt * qt.transpose());
        let rhs = &qt * &y;
        let gamma = lhs
            .cholesky()
            .ok_or(AnalysisError::NoValidData)?
            .solve(&rhs);

        let fitted_vec = &y - smoothing * (qt.transpose() * &gamma);

        let mut second_derivs = vec![0.0; n];
        for k in 0..m {
            second_derivs[k + 1] = gamma[k];
        }

        Ok(SmoothingSpline {
            xs: xs.to_vec(),
            fitted: fitted_vec.iter().cloned().collect(),
            second_derivs,
        })
    }

    /// Fitted values at the knots.
    pub fn fitted(&self) -> &[f64] {
        &self.fitted
    }

    /// First derivative of the spline evaluated at every knot.
    pub fn derivative_at_knots(&self) -> Vec<f64> {
        let n = self.xs.len();
        let (xs, a, m) = (&self.xs, &self.fitted, &self.second_derivs);

        (0..n)
            .map(|i| {
                if i + 1 < n {
                    let h = xs[i + 1] - xs[i];
                    (a[i + 1] - a[i]) / h - h / 6.0 * (2.0 * m[i] + m[i + 1])
                } else {
                    let h = xs[i] - xs[i - 1];
                    (a[i] - a[i - 1]) / h + h / 6.0 * (2.0 * m[i] + m[i - 1])
                }
            })
            .collect()
    }
}

/// Eigenpairs of a symmetric matrix sorted by ascending eigenvalue magnitude.
///
/// Profiles are small enough that a dense symmetric decomposition is cheaper and more
/// robust than an iterative sparse solver; this is also a natural parallelization point
/// when many casts are analyzed at once.
pub fn smallest_magnitude_eigenpairs(mat: DMatrix<f64>, k: usize) -> Vec<(f64, DVector<f64>)> {
    let eig = mat.symmetric_eigen();

    let mut order: Vec<usize> = (0..eig.eigenvalues.len()).collect();
    order.sort_by(|&a, &b| {
        eig.eigenvalues[a]
            .abs()
            .partial_cmp(&eig.eigenvalues[b].abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    order
        .into_iter()
        .take(k)
        .map(|i| (eig.eigenvalues[i], eig.eigenvectors.column(i).into_owned()))
        .collect()
}

/// Check that a set of grid increments is uniform to within floating-point tolerance.
pub(crate) fn uniform_spacing(increments: &[f64]) -> Option<f64> {
    let first = *increments.first()?;
    let tol = 1.0e-6 * first.abs().max(1.0e-12);
    if increments.iter().all(|&h| (h - first).abs() <= tol) {
        Some(first)
    } else {
        None
    }
}

/// Cumulative along-track distance for a sequence of (longitude, latitude) coordinates.
pub(crate) fn cumulative_distance(coords: &[(f64, f64)]) -> Vec<f64> {
    if coords.is_empty() {
        return Vec::new();
    }

    let mut cumulative = Vec::with_capacity(coords.len());
    let mut total = 0.0;
    cumulative.push(total);
    for (a, b) in izip!(coords.iter(), coords.iter().skip(1)) {
        total += great_circle_distance(a.0, a.1, b.0, b.1);
        cumulative.push(total);
    }
    cumulative
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::array;

    fn approx_equal(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_diff1_linear() {
        let xs = [0.0, 1.0, 3.0, 6.0, 10.0];
        let ys: Vec<f64> = xs.iter().map(|x| 2.0 * x + 1.0).collect();
        for d in diff1(&ys, &xs) {
            assert!(approx_equal(d, 2.0, 1e-12));
        }
    }

    #[test]
    fn test_diff1_skips_missing() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [0.0, f64::NAN, 4.0, 6.0];
        let d = diff1(&ys, &xs);
        assert!(d[1].is_nan());
        // neighbors of the gap fall back to one-sided slopes
        assert!(approx_equal(d[2], 2.0, 1e-12));
    }

    #[test]
    fn test_forward_difference_matrix() {
        let d = forward_difference_matrix(4, 2.0);
        let v = DVector::from_column_slice(&[1.0, 3.0, 5.0, 7.0]);
        let s = &d * &v;
        assert_eq!(s.len(), 3);
        for x in s.iter() {
            assert!(approx_equal(*x, 1.0, 1e-12));
        }
    }

    #[test]
    fn test_diff2_inner_shape_and_values() {
        let mat = array![[1.0, 2.0, 4.0], [10.0, 20.0, 40.0]];
        let xs = [0.0, 1.0, 3.0];
        let d = diff2_inner(&mat, &xs);
        assert_eq!(d.dim(), (2, 2));
        assert!(approx_equal(d[(0, 0)], 1.0, 1e-12));
        assert!(approx_equal(d[(0, 1)], 1.0, 1e-12));
        assert!(approx_equal(d[(1, 1)], 10.0, 1e-12));
    }

    #[test]
    fn test_diff2_along_centered_and_edges() {
        let mat = array![[0.0, 1.0, 4.0]];
        let xs = [0.0, 1.0, 2.0];
        let d = diff2_along(&mat, &xs);
        assert!(approx_equal(d[(0, 0)], 1.0, 1e-12)); // forward at the left edge
        assert!(approx_equal(d[(0, 1)], 2.0, 1e-12)); // centered
        assert!(approx_equal(d[(0, 2)], 3.0, 1e-12)); // backward at the right edge
    }

    #[test]
    fn test_integrate_shear_constant() {
        // constant shear of 0.01 1/s over 100 m should give 1 m/s at the surface
        let dudz = Array2::from_elem((11, 1), 0.01);
        let depth = Array2::from_shape_fn((11, 1), |(i, _)| 10.0 * i as f64);
        let u = integrate_shear(&dudz, &depth);
        assert!(approx_equal(u[(10, 0)], 0.0, 1e-12));
        assert!(approx_equal(u[(0, 0)], 1.0, 1e-9));
    }

    #[test]
    fn test_great_circle_distance() {
        // one degree of longitude at the equator
        let d = great_circle_distance(0.0, 0.0, 1.0, 0.0);
        assert!(approx_equal(d, EARTH_RADIUS * 1f64.to_radians(), 1.0));
        assert_eq!(great_circle_distance(5.0, 5.0, 5.0, 5.0), 0.0);
    }

    #[test]
    fn test_smoothing_spline_reproduces_line() {
        let xs: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 3.0 * x - 2.0).collect();
        let spl = SmoothingSpline::fit(&xs, &ys, 0.5).unwrap();
        for (y, f) in izip!(&ys, spl.fitted()) {
            assert!(approx_equal(*y, *f, 1e-8));
        }
        for d in spl.derivative_at_knots() {
            assert!(approx_equal(d, 3.0, 1e-8));
        }
    }

    #[test]
    fn test_gaussian_smooth_preserves_constant() {
        let ys = vec![4.0; 16];
        for v in gaussian_smooth(&ys, 2.0) {
            assert!(approx_equal(v, 4.0, 1e-12));
        }
    }

    #[test]
    fn test_smallest_magnitude_eigenpairs() {
        let mat = DMatrix::from_diagonal(&DVector::from_column_slice(&[-9.0, 1.0, -4.0, 0.1]));
        let pairs = smallest_magnitude_eigenpairs(mat, 2);
        assert!(approx_equal(pairs[0].0, 0.1, 1e-12));
        assert!(approx_equal(pairs[1].0, 1.0, 1e-12));
    }

    #[test]
    fn test_uniform_spacing() {
        assert!(uniform_spacing(&[2.0, 2.0, 2.0]).is_some());
        assert!(uniform_spacing(&[2.0, 2.1, 2.0]).is_none());
    }
}
