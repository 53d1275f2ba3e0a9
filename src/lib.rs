#![warn(missing_docs)]
//! Functions and data types for analyzing oceanographic CTD casts and cruise transects.
//!
//! A [`Cast`] is a single vertical profile: named measurement vectors co-registered
//! against a monotonic vertical coordinate, plus scalar metadata and a geographic
//! coordinate. Typed variants ([`CtdCast`], [`XbtCast`], [`LadcpCast`]) guarantee the
//! fields their derivations need. A [`CastCollection`] is an ordered transect of casts
//! with collection-level derived quantities: along-track distance, stacked matrices,
//! thermal-wind shear and absolute geostrophic velocity.
//!
//! Missing values are IEEE NaN throughout. Derived fields are always added under
//! collision-avoided names, so an analysis never silently replaces measured data.
//!
//! ```rust
//! use cast_analysis::CtdCast;
//!
//! let mut cast = CtdCast::new(
//!     vec![0.0, 10.0, 20.0, 30.0],   // pressure, dbar
//!     vec![35.0, 35.0, 35.0, 35.0],  // practical salinity
//!     vec![10.0, 10.0, 10.0, 10.0],  // in-situ temperature, °C
//! )
//! .unwrap()
//! .with_coords(0.0, 0.0);
//!
//! let rhokey = cast.add_density().unwrap();
//! let depthkey = cast.add_depth(Some(rhokey.as_str())).unwrap();
//! assert!(cast.field(&depthkey).unwrap().windows(2).all(|w| w[1] > w[0]));
//! ```

//
// API
//
pub use crate::{
    bathymetry::Bathymetry,
    cast::{BaroclinicModes, Cast, Coordinates, CtdCast, LadcpCast, Property, Value, XbtCast},
    collection::{CastCollection, Stacked, ThermalWindOptions},
    error::{AnalysisError, Result},
    interpolation::{force_monotonic, linear_interpolate},
    records::{from_record, to_record, Entity, Record, RecordKind},
};

pub mod bathymetry;
pub mod interpolation;
pub mod numerics;
pub mod seawater;

//
// Internal use only
//

// Modules
mod cast;
mod collection;
mod error;
mod records;

#[cfg(test)]
mod test_data;
