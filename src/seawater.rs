//! Thin adapter over the [gsw](https://crates.io/crates/gsw) implementation of TEOS-10.
//!
//! The equation of state is treated as authoritative; nothing in this crate reimplements
//! it. NaN observations are passed over rather than handed to the library, so missing
//! values stay missing in every derived field.

use crate::error::{AnalysisError, Result};

/// Ratio between absolute (reference-composition) salinity and practical salinity.
const SA_PER_SP: f64 = 35.165_04 / 35.0;

/// Absolute salinity in g/kg from practical salinity.
///
/// Uses the reference-salinity scaling; the regional anomaly correction needs a
/// climatology lookup that is out of scope for an in-memory analysis library, and its
/// magnitude is below the noise floor of shipboard practical salinity.
#[inline]
pub fn absolute_salinity(sp: f64) -> f64 {
    sp * SA_PER_SP
}

/// Conservative temperature in °C from in-situ temperature.
///
/// `sa` is absolute salinity in g/kg, `t` the in-situ temperature in °C and `p` the sea
/// pressure in dbar.
pub fn conservative_temperature(sa: f64, t: f64, p: f64) -> Result<f64> {
    gsw::conversions::ct_from_t(sa, t, p).map_err(|e| AnalysisError::Seawater(format!("{:?}", e)))
}

/// In-situ density in kg/m³ from absolute salinity, conservative temperature and pressure.
pub fn in_situ_density(sa: f64, ct: f64, p: f64) -> Result<f64> {
    gsw::volume::rho(sa, ct, p).map_err(|e| AnalysisError::Seawater(format!("{:?}", e)))
}

/// In-situ density from a single practical-salinity / in-situ-temperature / pressure
/// observation. A NaN anywhere in the input yields a NaN sample instead of an error.
pub fn density_from_practical(sp: f64, t: f64, p: f64) -> Result<f64> {
    if !(sp.is_finite() && t.is_finite() && p.is_finite()) {
        return Ok(f64::NAN);
    }
    let sa = absolute_salinity(sp);
    let ct = conservative_temperature(sa, t, p)?;
    in_situ_density(sa, ct, p)
}
