//! Specialization of `Cast` for lowered-ADCP velocity profiles.

use std::ops::{Deref, DerefMut};

use crate::{
    cast::Cast,
    error::Result,
    numerics::{diff1, gaussian_smooth},
};

/// Specialization of `Cast` for velocity profiles. Requires *u* and *v* fields keyed by
/// depth.
#[derive(Debug, Clone, PartialEq)]
pub struct LadcpCast {
    cast: Cast,
}

impl LadcpCast {
    /// Create a velocity cast from parallel depth, eastward and northward velocity
    /// vectors (meters and m/s).
    pub fn new(depth: Vec<f64>, u: Vec<f64>, v: Vec<f64>) -> Result<Self> {
        let cast = Cast::new("z", depth).with_field("u", u)?.with_field("v", v)?;
        Ok(LadcpCast { cast })
    }

    /// Validate that a generic cast carries the required fields, and wrap it.
    pub fn from_cast(cast: Cast) -> Result<Self> {
        cast.require("z", &["u", "v"])?;
        Ok(LadcpCast { cast })
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

    /// Unwrap into the generic cast, e.g. to move it into a collection.
    pub fn into_cast(self) -> Cast {
        self.cast
    }

    /// Compute the vertical shear of *u* and *v*, and return both field names.
    ///
    /// If `sigma` is given, the velocities are smoothed with a Gaussian filter of that
    /// width (in samples) before differentiating.
    pub fn add_shear(&mut self, sigma: Option<f64>) -> Result<(String, String)> {
        let (dudz, dvdz) = {
            let z = self.cast.primary();
            let u = self.cast.field("u")?;
            let v = self.cast.field("v")?;

            let (u, v) = match sigma {
                Some(s) => (gaussian_smooth(u, s), gaussian_smooth(v, s)),
                None => (u.to_vec(), v.to_vec()),
            };
            (diff1(&u, z), diff1(&v, z))
        };

        let ukey = self.cast.add_field("dudz", dudz, false)?;
        let vkey = self.cast.add_field("dvdz", dvdz, false)?;
        Ok((ukey, vkey))
    }
}

impl Deref for LadcpCast {
    type Target = Cast;

    fn deref(&self) -> &Cast {
        &self.cast
    }
}

impl DerefMut for LadcpCast {
    fn deref_mut(&mut self) -> &mut Cast {
        &mut self.cast
    }
}

impl From<LadcpCast> for Cast {
    fn from(cast: LadcpCast) -> Cast {
        cast.cast
    }
}
