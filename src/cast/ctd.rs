//! Specialization of `Cast` for conductivity-temperature-depth profiles, and the derived
//! quantities that need salinity and temperature to exist.

use std::ops::{Deref, DerefMut};

use itertools::izip;
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use ndarray::Array2;

use crate::{
    cast::Cast,
    error::{AnalysisError, Result},
    numerics::{
        coriolis_parameter, forward_difference_matrix, smallest_magnitude_eigenpairs,
        uniform_spacing, SmoothingSpline, G,
    },
    seawater,
};

/// Baroclinic vertical modes of a stratified profile.
///
/// Radii and eigenfunctions are ordered gravest mode first; the barotropic mode is
/// excluded. `depths` holds the vertical levels the eigenfunctions are evaluated on.
#[derive(Debug, Clone)]
pub struct BaroclinicModes {
    /// Deformation radius of each mode in meters, decreasing.
    pub deformation_radii: Vec<f64>,
    /// Eigenfunctions, one column per mode, on the `depths` levels.
    pub modes: Array2<f64>,
    /// Depth in meters of each eigenfunction row.
    pub depths: Vec<f64>,
}

/// Specialization of `Cast` guaranteed to have salinity and temperature fields keyed by
/// pressure.
///
/// # Examples
///
/// ```rust
/// use cast_analysis::CtdCast;
///
/// let mut cast = CtdCast::new(
///     vec![0.0, 10.0, 20.0, 30.0],
///     vec![35.0, 35.0, 35.0, 35.0],
///     vec![10.0, 10.0, 10.0, 10.0],
/// )
/// .unwrap()
/// .with_coords(0.0, 0.0);
///
/// let rhokey = cast.add_density().unwrap();
/// assert_eq!(rhokey, "rho");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CtdCast {
    cast: Cast,
}

impl CtdCast {
    /// Create a CTD cast from parallel pressure, salinity and temperature vectors.
    ///
    /// Pressure is in dbar, practical salinity is unitless and temperature is in-situ °C.
    pub fn new(pressure: Vec<f64>, salinity: Vec<f64>, temperature: Vec<f64>) -> Result<Self> {
        let cast = Cast::new("pres", pressure)
            .with_field("sal", salinity)?
            .with_field("temp", temperature)?;
        Ok(CtdCast { cast })
    }

    /// Validate that a generic cast carries the required fields, and wrap it.
    pub fn from_cast(cast: Cast) -> Result<Self> {
        cast.require("pres", &["sal", "temp"])?;
        Ok(CtdCast { cast })
    }

    /// Builder method to set the geographic coordinates.
    pub fn with_coords(mut self, lon: f64, lat: f64) -> Self {
        self.cast = self.cast.with_coords(lon, lat);
        self
    }

    /// Builder method to attach a scalar property.
    pub fn with_property<P: Into<crate::cast::Property>>(mut self, name: &str, value: P) -> Self {
        self.cast = self.cast.with_property(name, value);
        self
    }

    /// Builder method to register an additional vector field, e.g. an oxygen tracer.
    pub fn with_field(mut self, name: &str, values: Vec<f64>) -> Result<Self> {
        self.cast = self.cast.with_field(name, values)?;
        Ok(self)
    }

    /// Unwrap into the generic cast, e.g. to move it into a collection.
    pub fn into_cast(self) -> Cast {
        self.cast
    }

    /// Add in-situ density to the fields, and return the field name.
    pub fn add_density(&mut self) -> Result<String> {
        self.cast.derive_density("sal", "temp")
    }

    /// Use pressure and density to calculate depth in meters, and return the field name.
    ///
    /// If in-situ density is already in a field, `rhokey` can be provided to avoid
    /// recalculating it. Leading missing densities are back-filled from the first valid
    /// value before the hydrostatic integration; a missing density further down leaves
    /// all deeper depths missing.
    pub fn add_depth(&mut self, rhokey: Option<&str>) -> Result<String> {
        self.cast.derive_depth(rhokey, "sal", "temp")
    }

    /// Calculate the squared buoyancy frequency, and return the field name.
    ///
    /// Density is fit against pressure with a smoothing spline over the finite subset
    /// and differentiated; `smoothing` is the roughness penalty (smaller values give a
    /// noisier result).
    pub fn add_buoyancy_frequency(&mut self, rhokey: Option<&str>, smoothing: f64) -> Result<String> {
        self.cast.derive_buoyancy_frequency(rhokey, smoothing, "sal", "temp")
    }

    /// Calculate the baroclinic normal modes from linear quasigeostrophy and the
    /// vertical stratification.
    ///
    /// Returns the first `nmodes` deformation radii and their eigenfunctions. `ztop` is
    /// the depth at which to cut off the profile to avoid surface effects. The profile
    /// must be uniformly gridded in depth below the cutoff. Squared buoyancy frequency
    /// and depth fields are derived first when not already present.
    pub fn baroclinic_modes(&mut self, nmodes: usize, ztop: f64) -> Result<BaroclinicModes> {
        let lat = self
            .cast
            .coords()
            .ok_or(AnalysisError::MissingCoordinates)?
            .lat;

        let n2key = if self.cast.has_field("N2") {
            "N2".to_owned()
        } else {
            self.cast.derive_buoyancy_frequency(None, 0.2, "sal", "temp")?
        };
        let depthkey = if self.cast.has_field("depth") {
            "depth".to_owned()
        } else {
            self.cast.derive_depth(None, "sal", "temp")?
        };

        let mask = self.cast.nan_mask_for(&[n2key.as_str(), depthkey.as_str()])?;
        let n2_full = self.cast.field(&n2key)?;
        let dep_full = self.cast.field(&depthkey)?;

        let mut n2 = Vec::new();
        let mut dep = Vec::new();
        for (bad, &b, &d) in izip!(&mask, n2_full, dep_full) {
            if !bad {
                n2.push(b);
                dep.push(d);
            }
        }

        // cut off the near-surface levels
        let itop = dep
            .iter()
            .position(|&d| d > ztop)
            .ok_or(AnalysisError::NoValidData)?;
        let n2 = &n2[itop..];
        let dep = &dep[itop..];
        let m = dep.len();
        if m < nmodes + 2 {
            return Err(AnalysisError::NoValidData);
        }

        let increments: Vec<f64> = dep.windows(2).map(|w| w[1] - w[0]).collect();
        let h = uniform_spacing(&increments).ok_or(AnalysisError::NonUniformGrid)?;

        let f = coriolis_parameter(lat);
        let mut fweight: Vec<f64> = n2.iter().map(|&n2v| f * f / n2v).collect();
        fweight[0] = 0.0;
        fweight[m - 1] = 0.0;

        // conservative form of d/dz(f²/N² d/dz); exactly self-adjoint
        let d = forward_difference_matrix(m, h);
        let w = DVector::from_iterator(
            m - 1,
            (0..m - 1).map(|i| 0.5 * (fweight[i] + fweight[i + 1])),
        );
        let l = d.transpose() * DMatrix::from_diagonal(&w) * &d;

        let pairs = smallest_magnitude_eigenpairs(l, nmodes + 1);

        // the first pair is the barotropic mode at eigenvalue zero
        let mut deformation_radii = Vec::with_capacity(nmodes);
        let mut modes = Array2::zeros((m, nmodes));
        for (k, (lambda, vector)) in pairs.into_iter().skip(1).enumerate() {
            deformation_radii.push(1.0 / lambda.abs().sqrt());
            for i in 0..m {
                modes[(i, k)] = vector[i];
            }
        }

        Ok(BaroclinicModes {
            deformation_radii,
            modes,
            depths: dep.to_vec(),
        })
    }

    /// Compute water mass fractions based on conservative tracers.
    ///
    /// `sources` gives the tracer values of exactly three prototype water masses, in the
    /// order of `tracers` (default use: salinity then temperature). Each valid
    /// observation is decomposed by a 3×3 mixing system of the two tracers plus mass
    /// conservation; observations with a missing tracer stay missing in all three
    /// returned fraction vectors.
    pub fn water_fractions(
        &self,
        sources: &[(f64, f64)],
        tracers: (&str, &str),
    ) -> Result<(Vec<f64>, Vec<f64>, Vec<f64>)> {
        if sources.len() != 3 {
            return Err(AnalysisError::SourceWaterCount(sources.len()));
        }
        let tr1 = self.cast.field(tracers.0)?;
        let tr2 = self.cast.field(tracers.1)?;

        #[rustfmt::skip]
        let a = Matrix3::new(
            sources[0].0, sources[1].0, sources[2].0,
            sources[0].1, sources[1].1, sources[2].1,
            1.0,          1.0,          1.0,
        );
        if a.determinant().abs() < 1.0e-12 {
            return Err(AnalysisError::DegenerateSources);
        }
        let lu = a.lu();

        let n = self.cast.len();
        let mut m1 = vec![f64::NAN; n];
        let mut m2 = vec![f64::NAN; n];
        let mut m3 = vec![f64::NAN; n];
        for i in 0..n {
            if tr1[i].is_finite() && tr2[i].is_finite() {
                let b = Vector3::new(tr1[i], tr2[i], 1.0);
                let x = lu.solve(&b).ok_or(AnalysisError::DegenerateSources)?;
                m1[i] = x[0];
                m2[i] = x[1];
                m3[i] = x[2];
            }
        }
        Ok((m1, m2, m3))
    }
}

impl Deref for CtdCast {
    type Target = Cast;

    fn deref(&self) -> &Cast {
        &self.cast
    }
}

impl DerefMut for CtdCast {
    fn deref_mut(&mut self) -> &mut Cast {
        &mut self.cast
    }
}

impl From<CtdCast> for Cast {
    fn from(cast: CtdCast) -> Cast {
        cast.cast
    }
}

// The derivations live on `Cast` so that transect-level routines can apply them to the
// casts of a collection with configurable field keys; the typed wrappers above guarantee
// at construction that the default keys resolve.
impl Cast {
    pub(crate) fn derive_density(&mut self, salkey: &str, tempkey: &str) -> Result<String> {
        let rho: Vec<f64> = {
            let sal = self.field(salkey)?;
            let temp = self.field(tempkey)?;
            let pres = self.primary();
            izip!(sal, temp, pres)
                .map(|(&s, &t, &p)| seawater::density_from_practical(s, t, p))
                .collect::<Result<_>>()?
        };
        self.add_field("rho", rho, false)
    }

    pub(crate) fn derive_depth(
        &mut self,
        rhokey: Option<&str>,
        salkey: &str,
        tempkey: &str,
    ) -> Result<String> {
        let rhokey = match rhokey {
            Some(k) => {
                self.field(k)?;
                k.to_owned()
            }
            None => self.derive_density(salkey, tempkey)?,
        };

        let depth = {
            let mut rho = self.field(&rhokey)?.to_vec();

            // back-fill leading missing densities from the first valid value
            let first = rho
                .iter()
                .position(|v| v.is_finite())
                .ok_or(AnalysisError::NoValidData)?;
            let fill = rho[first];
            for v in &mut rho[..first] {
                *v = fill;
            }

            let pres = self.primary();
            let mut depth = Vec::with_capacity(rho.len());
            let mut total = 0.0;
            for (i, (&p, &r)) in izip!(pres, &rho).enumerate() {
                let dp = if i == 0 { p } else { p - pres[i - 1] };
                // dbar to Pa, then hydrostatic balance
                total += dp * 1.0e4 / (r * G);
                depth.push(total);
            }
            depth
        };
        self.add_field("depth", depth, false)
    }

    pub(crate) fn derive_buoyancy_frequency(
        &mut self,
        rhokey: Option<&str>,
        smoothing: f64,
        salkey: &str,
        tempkey: &str,
    ) -> Result<String> {
        let rhokey = match rhokey {
            Some(k) => {
                self.field(k)?;
                k.to_owned()
            }
            None => self.derive_density(salkey, tempkey)?,
        };

        let n2 = {
            let mask = self.nan_mask_for(&[rhokey.as_str(), self.primary_key()])?;
            let rho = self.field(&rhokey)?;
            let pres = self.primary();

            let mut xs = Vec::new();
            let mut ys = Vec::new();
            for (bad, &p, &r) in izip!(&mask, pres, rho) {
                if !bad {
                    xs.push(p);
                    ys.push(r);
                }
            }
            if xs.len() < 2 {
                return Err(AnalysisError::NoValidData);
            }

            let spline = SmoothingSpline::fit(&xs, &ys, smoothing)?;
            let drho_dp = spline.derivative_at_knots();

            let mut n2 = vec![f64::NAN; self.len()];
            let mut k = 0;
            for (i, bad) in mask.iter().enumerate() {
                if !bad {
                    n2[i] = G / ys[k] * drho_dp[k];
                    k += 1;
                }
            }
            n2
        };
        self.add_field("N2", n2, false)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn simple_ctd() -> CtdCast {
        CtdCast::new(
            vec![0.0, 10.0, 20.0, 30.0],
            vec![35.0; 4],
            vec![10.0; 4],
        )
        .unwrap()
        .with_coords(0.0, 0.0)
    }

    #[test]
    fn test_add_density_names_and_values() {
        let mut cast = simple_ctd();
        let key = cast.add_density().unwrap();
        assert_eq!(key, "rho");

        let rho = cast.field("rho").unwrap();
        assert!(rho.iter().all(|r| *r > 1020.0 && *r < 1035.0));

        // a second derivation must not clobber the first
        let key2 = cast.add_density().unwrap();
        assert_eq!(key2, "rho_2");
    }

    #[test]
    fn test_add_depth_is_monotonic() {
        let mut cast = simple_ctd();
        let key = cast.add_depth(None).unwrap();
        let depth = cast.field(&key).unwrap();
        assert!(depth.windows(2).all(|w| w[1] > w[0]));
        // 10 dbar is close to 10 m of seawater
        assert!((depth[1] - 10.0).abs() < 0.5);
    }

    #[test]
    fn test_add_depth_backfills_leading_missing_density() {
        let mut cast = CtdCast::new(
            vec![0.0, 10.0, 20.0, 30.0],
            vec![f64::NAN, 35.0, 35.0, 35.0],
            vec![f64::NAN, 10.0, 10.0, 10.0],
        )
        .unwrap();

        let key = cast.add_depth(None).unwrap();
        let depth = cast.field(&key).unwrap();
        assert!(depth.iter().all(|d| d.is_finite()));
        assert!(depth.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_buoyancy_frequency_of_stable_column() {
        // density rising with pressure at 0.02 kg/m³ per dbar
        let n = 50;
        let pres: Vec<f64> = (0..n).map(|i| 10.0 * i as f64).collect();
        let rho: Vec<f64> = pres.iter().map(|p| 1025.0 + 0.02 * p).collect();

        let mut cast = CtdCast::new(pres, vec![35.0; n], vec![10.0; n]).unwrap();
        cast.set_field("rho_obs", rho).unwrap();

        let key = cast.add_buoyancy_frequency(Some("rho_obs"), 0.2).unwrap();
        assert_eq!(key, "N2");
        let n2 = cast.field("N2").unwrap();
        let expected = G / 1025.0 * 0.02;
        for v in n2 {
            assert!((v - expected).abs() < 0.1 * expected, "N2 = {}", v);
        }
    }

    #[test]
    fn test_baroclinic_modes_radii_decrease() {
        // uniform 10 m grid, stratification decaying with depth
        let n = 101;
        let depth: Vec<f64> = (0..n).map(|i| 10.0 * i as f64).collect();
        let n2: Vec<f64> = depth.iter().map(|d| 1.0e-4 * (-d / 500.0).exp()).collect();

        let mut cast = CtdCast::new(
            depth.clone(),
            vec![35.0; n],
            vec![10.0; n],
        )
        .unwrap()
        .with_coords(-30.0, 45.0);
        cast.set_field("depth", depth).unwrap();
        cast.set_field("N2", n2).unwrap();

        let modes = cast.baroclinic_modes(3, 5.0).unwrap();
        assert_eq!(modes.deformation_radii.len(), 3);
        assert_eq!(modes.modes.ncols(), 3);
        assert!(modes
            .deformation_radii
            .iter()
            .all(|r| r.is_finite() && *r > 0.0));
        assert!(modes
            .deformation_radii
            .windows(2)
            .all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_baroclinic_modes_require_uniform_grid() {
        let depth = vec![0.0, 10.0, 25.0, 30.0, 40.0, 50.0, 60.0, 70.0];
        let n = depth.len();
        let mut cast = CtdCast::new(depth.clone(), vec![35.0; n], vec![10.0; n])
            .unwrap()
            .with_coords(-30.0, 45.0);
        cast.set_field("depth", depth).unwrap();
        cast.set_field("N2", vec![1.0e-5; n]).unwrap();

        assert!(matches!(
            cast.baroclinic_modes(2, 5.0),
            Err(AnalysisError::NonUniformGrid)
        ));
    }

    #[test]
    fn test_water_fractions_recover_known_mixture() {
        let sources = [(34.0, 2.0), (35.0, 10.0), (34.5, -1.0)];
        let weights = [0.5, 0.3, 0.2];

        let sal = vec![
            weights[0] * 34.0 + weights[1] * 35.0 + weights[2] * 34.5,
            f64::NAN,
        ];
        let temp = vec![
            weights[0] * 2.0 + weights[1] * 10.0 + weights[2] * -1.0,
            5.0,
        ];

        let cast = CtdCast::new(vec![0.0, 10.0], sal, temp).unwrap();
        let (m1, m2, m3) = cast.water_fractions(&sources, ("sal", "temp")).unwrap();

        assert!((m1[0] - 0.5).abs() < 1e-9);
        assert!((m2[0] - 0.3).abs() < 1e-9);
        assert!((m3[0] - 0.2).abs() < 1e-9);
        assert!(m1[1].is_nan() && m2[1].is_nan() && m3[1].is_nan());
    }

    #[test]
    fn test_water_fractions_require_three_sources() {
        let cast = simple_ctd();
        assert!(matches!(
            cast.water_fractions(&[(34.0, 2.0), (35.0, 10.0)], ("sal", "temp")),
            Err(AnalysisError::SourceWaterCount(2))
        ));
    }
}
