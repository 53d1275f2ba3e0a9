//! Specialization of `Cast` for expendable-bathythermograph temperature profiles.

use std::ops::{Deref, DerefMut};

use crate::{cast::Cast, error::Result};

/// Specialization of `Cast` with a temperature field keyed by depth.
#[derive(Debug, Clone, PartialEq)]
pub struct XbtCast {
    cast: Cast,
}

impl XbtCast {
    /// Create a temperature cast from parallel depth and temperature vectors.
    pub fn new(depth: Vec<f64>, temperature: Vec<f64>) -> Result<Self> {
        let cast = Cast::new("z", depth).with_field("temp", temperature)?;
        Ok(XbtCast { cast })
    }

    /// Validate that a generic cast carries the required fields, and wrap it.
    pub fn from_cast(cast: Cast) -> Result<Self> {
        cast.require("z", &["temp"])?;
        Ok(XbtCast { cast })
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
}

impl Deref for XbtCast {
    type Target = Cast;

    fn deref(&self) -> &Cast {
        &self.cast
    }
}

impl DerefMut for XbtCast {
    fn deref_mut(&mut self) -> &mut Cast {
        &mut self.cast
    }
}

impl From<XbtCast> for Cast {
    fn from(cast: XbtCast) -> Cast {
        cast.cast
    }
}
