//! Data type and methods to store a single vertical profile of oceanographic measurements.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDateTime;

use crate::{
    error::{AnalysisError, Result},
    interpolation::{self, linear_interpolate},
};

pub use self::{ctd::BaroclinicModes, ctd::CtdCast, ladcp::LadcpCast, xbt::XbtCast};

/// Geographic coordinates of an observation in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    /// Longitude in degrees east.
    pub lon: f64,
    /// Latitude in degrees north.
    pub lat: f64,
}

/// Scalar metadata attached to a cast.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    /// A floating point scalar, e.g. a seafloor depth.
    Float(f64),
    /// An integer scalar, e.g. a station number.
    Int(i64),
    /// Free text, e.g. a ship or cruise identifier.
    Text(String),
    /// A timestamp, e.g. the cast occupation time.
    Time(NaiveDateTime),
}

impl From<f64> for Property {
    fn from(v: f64) -> Self {
        Property::Float(v)
    }
}

impl From<i64> for Property {
    fn from(v: i64) -> Self {
        Property::Int(v)
    }
}

impl From<&str> for Property {
    fn from(v: &str) -> Self {
        Property::Text(v.to_owned())
    }
}

impl From<NaiveDateTime> for Property {
    fn from(v: NaiveDateTime) -> Self {
        Property::Time(v)
    }
}

/// The result of a by-name lookup, which may resolve to a vector field or a scalar property.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    /// The name resolved to a co-registered vector field.
    Field(&'a [f64]),
    /// The name resolved to a scalar property.
    Property(&'a Property),
}

/// A Cast is a set of referenced measurements associated with a single coordinate.
///
/// Vector water properties are stored as named fields, all registered against the same
/// vertical coordinate (the *primary key*, usually pressure). Scalar metadata lives in a
/// separate property map. Missing values are IEEE NaN.
///
/// # Examples
///
/// ```rust
/// use cast_analysis::Cast;
///
/// let cast = Cast::new("pres", vec![0.0, 10.0, 20.0])
///     .with_field("temp", vec![8.0, 7.5, 7.1]).unwrap()
///     .with_coords(-48.0, 60.0);
///
/// assert_eq!(cast.len(), 3);
/// assert_eq!(cast.fields(), ["pres", "temp"]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Cast {
    primary_key: String,
    fields: Vec<String>,
    data: HashMap<String, Vec<f64>>,
    properties: HashMap<String, Property>,
    coords: Option<Coordinates>,
    len: usize,
}

impl Cast {
    /// Create a new cast from its vertical coordinate field.
    ///
    /// `primary_key` names the vertical measure, usually pressure (`"pres"`) but
    /// possibly depth (`"z"`).
    pub fn new(primary_key: &str, values: Vec<f64>) -> Self {
        let len = values.len();
        let mut data = HashMap::new();
        data.insert(primary_key.to_owned(), values);

        Cast {
            primary_key: primary_key.to_owned(),
            fields: vec![primary_key.to_owned()],
            data,
            properties: HashMap::new(),
            coords: None,
            len,
        }
    }

    /// Builder method to register a vector field.
    ///
    /// The vector must match the cast length or a `ShapeMismatch` error is returned.
    pub fn with_field(mut self, name: &str, values: Vec<f64>) -> Result<Self> {
        self.set_field(name, values)?;
        Ok(self)
    }

    /// Builder method to attach a scalar property.
    pub fn with_property<P: Into<Property>>(mut self, name: &str, value: P) -> Self {
        self.set_property(name, value);
        self
    }

    /// Builder method to set the geographic coordinates.
    pub fn with_coords(mut self, lon: f64, lat: f64) -> Self {
        self.coords = Some(Coordinates { lon, lat });
        self
    }

    /// Number of observations in the profile.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the profile holds no observations.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Ordered field names; the primary key is always first.
    #[inline]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Name of the vertical coordinate field.
    #[inline]
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// The vertical coordinate vector itself.
    #[inline]
    pub fn primary(&self) -> &[f64] {
        &self.data[&self.primary_key]
    }

    /// Geographic coordinates, if the cast has any.
    #[inline]
    pub fn coords(&self) -> Option<Coordinates> {
        self.coords
    }

    /// Whether a vector field with this name exists.
    #[inline]
    pub fn has_field(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Whether a scalar property with this name exists.
    #[inline]
    pub fn has_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Look up a vector field by name.
    pub fn field(&self, key: &str) -> Result<&[f64]> {
        self.data
            .get(key)
            .map(|v| v.as_slice())
            .ok_or_else(|| AnalysisError::KeyNotFound(key.to_owned()))
    }

    /// Names of all scalar properties, in no particular order.
    pub fn property_keys(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(|k| k.as_str())
    }

    /// Look up a scalar property by name.
    pub fn property(&self, key: &str) -> Result<&Property> {
        self.properties
            .get(key)
            .ok_or_else(|| AnalysisError::KeyNotFound(key.to_owned()))
    }

    /// Look up a name that may be either a field or a property.
    pub fn get(&self, key: &str) -> Result<Value<'_>> {
        if let Some(v) = self.data.get(key) {
            Ok(Value::Field(v))
        } else if let Some(p) = self.properties.get(key) {
            Ok(Value::Property(p))
        } else {
            Err(AnalysisError::KeyNotFound(key.to_owned()))
        }
    }

    /// All `(field, value)` pairs at observation `index`, in field order.
    ///
    /// Profiles are immutable in the index dimension; there is deliberately no
    /// by-index setter.
    pub fn row(&self, index: usize) -> Result<Vec<(&str, f64)>> {
        if index >= self.len {
            return Err(AnalysisError::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        Ok(self
            .fields
            .iter()
            .map(|name| (name.as_str(), self.data[name][index]))
            .collect())
    }

    /// Write a vector field, replacing any field of the same name.
    ///
    /// The vector length must match the cast length; scalars belong in
    /// [`set_property`](Cast::set_property).
    pub fn set_field(&mut self, key: &str, values: Vec<f64>) -> Result<()> {
        if values.len() != self.len {
            return Err(AnalysisError::ShapeMismatch {
                key: key.to_owned(),
                got: values.len(),
                expected: self.len,
            });
        }
        if !self.data.contains_key(key) {
            self.fields.push(key.to_owned());
        }
        self.data.insert(key.to_owned(), values);
        Ok(())
    }

    /// Write a scalar property, replacing any property of the same name.
    pub fn set_property<P: Into<Property>>(&mut self, key: &str, value: P) {
        self.properties.insert(key.to_owned(), value.into());
    }

    /// Add a vector field under `name`, avoiding collisions with existing fields.
    ///
    /// If `name` is taken and `overwrite` is false, `name_2`, `name_3`, ... are tried
    /// until an unused identifier is found. Returns the name finally used. Every derived
    /// field in this crate is added through this method, so a derivation never silently
    /// clobbers caller data.
    pub fn add_field(&mut self, name: &str, values: Vec<f64>, overwrite: bool) -> Result<String> {
        let mut key = name.to_owned();
        if !overwrite {
            let mut i = 2;
            while self.data.contains_key(&key) {
                key = format!("{}_{}", name, i);
                i += 1;
            }
        }
        self.set_field(&key, values)?;
        Ok(key)
    }

    /// Mask of observations with at least one missing value among all fields.
    pub fn nan_mask(&self) -> Vec<bool> {
        (0..self.len)
            .map(|i| self.fields.iter().any(|k| !self.data[k][i].is_finite()))
            .collect()
    }

    /// Mask of observations with at least one missing value among the named fields.
    pub fn nan_mask_for(&self, fields: &[&str]) -> Result<Vec<bool>> {
        let vectors: Vec<&[f64]> = fields
            .iter()
            .map(|&k| self.field(k))
            .collect::<Result<_>>()?;

        Ok((0..self.len)
            .map(|i| vectors.iter().any(|v| !v[i].is_finite()))
            .collect())
    }

    /// Number of observations with no missing value in any field.
    pub fn valid_count(&self) -> usize {
        self.nan_mask().iter().filter(|&&bad| !bad).count()
    }

    /// Number of observations with no missing value in any of the named fields.
    pub fn valid_count_for(&self, fields: &[&str]) -> Result<usize> {
        Ok(self
            .nan_mask_for(fields)?
            .iter()
            .filter(|&&bad| !bad)
            .count())
    }

    /// Append `n` fill-valued observations to every field.
    pub fn extend(&mut self, n: usize, fill: f64) -> Result<()> {
        if n == 0 {
            return Err(AnalysisError::EmptyExtension);
        }
        for values in self.data.values_mut() {
            values.extend(std::iter::repeat(fill).take(n));
        }
        self.len += n;
        Ok(())
    }

    /// Interpolate field `target` as a function of field `reference` at the `query` values.
    ///
    /// The reference must be strictly increasing. It is reasonable to want to interpolate
    /// against density or sigma, which are monotonic only up to measurement noise; pass
    /// `force` to coerce the reference into monotonic form first. Query values outside
    /// the reference range clamp to the end values.
    pub fn interpolate(
        &self,
        target: &str,
        reference: &str,
        query: &[f64],
        force: bool,
    ) -> Result<Vec<f64>> {
        let ys = self.field(target)?;
        let xs = self.field(reference)?;
        if ys.is_empty() {
            return Err(AnalysisError::NoValidData);
        }

        let (left, right) = (ys[0], ys[ys.len() - 1]);
        match interpolation::check_monotonic(xs, reference) {
            Ok(()) => Ok(linear_interpolate(query, xs, ys, left, right)),
            Err(_) if force => {
                let coerced = interpolation::force_monotonic(xs);
                Ok(linear_interpolate(query, &coerced, ys, left, right))
            }
            Err(e) => Err(e),
        }
    }

    /// Re-interpolate the cast at the specified primary-key levels, returning a new cast.
    ///
    /// Every non-primary field is linearly interpolated against the old primary key;
    /// values outside the original range become missing.
    pub fn regrid(&self, levels: &[f64]) -> Result<Cast> {
        let old_primary = self.primary();
        interpolation::check_monotonic(old_primary, &self.primary_key)?;

        let mut ret = self.clone();
        ret.len = levels.len();
        for key in &self.fields {
            if key != &self.primary_key {
                let regridded =
                    linear_interpolate(levels, old_primary, &self.data[key], f64::NAN, f64::NAN);
                ret.data.insert(key.clone(), regridded);
            }
        }
        ret.data.insert(self.primary_key.clone(), levels.to_vec());
        Ok(ret)
    }

    /// Validate that a cast carries the fields a specialized variant requires.
    pub(crate) fn require(&self, primary: &str, required: &[&str]) -> Result<()> {
        if self.primary_key != primary {
            return Err(AnalysisError::KeyNotFound(primary.to_owned()));
        }
        for &key in required {
            self.field(key)?;
        }
        Ok(())
    }
}

impl fmt::Display for Cast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys = self.fields.join(", ");
        match self.coords {
            Some(c) => write!(f, "cast ({}) at ({:.3}, {:.3})", keys, c.lon, c.lat),
            None => write!(f, "cast ({}) at (?, ?)", keys),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use itertools::izip;

    fn test_cast() -> Cast {
        Cast::new("pres", vec![0.0, 10.0, 20.0, 30.0])
            .with_field("temp", vec![10.0, 9.0, 8.0, f64::NAN])
            .unwrap()
            .with_field("sal", vec![34.0, 34.2, 34.4, 34.6])
            .unwrap()
            .with_property("station", 7i64)
            .with_coords(-48.0, 60.0)
    }

    #[test]
    fn test_fields_in_insertion_order() {
        let cast = test_cast();
        assert_eq!(cast.fields(), ["pres", "temp", "sal"]);
        assert_eq!(cast.primary_key(), "pres");
    }

    #[test]
    fn test_all_fields_share_cast_length() {
        let cast = test_cast();
        for key in cast.fields() {
            assert_eq!(cast.field(key).unwrap().len(), cast.len());
        }
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let res = Cast::new("pres", vec![0.0, 10.0]).with_field("temp", vec![1.0]);
        assert!(matches!(
            res,
            Err(AnalysisError::ShapeMismatch { got: 1, expected: 2, .. })
        ));
    }

    #[test]
    fn test_row_and_out_of_range() {
        let cast = test_cast();
        let row = cast.row(1).unwrap();
        assert_eq!(row, vec![("pres", 10.0), ("temp", 9.0), ("sal", 34.2)]);

        assert!(matches!(
            cast.row(4),
            Err(AnalysisError::IndexOutOfRange { index: 4, len: 4 })
        ));
    }

    #[test]
    fn test_get_resolves_fields_and_properties() {
        let cast = test_cast();
        assert!(matches!(cast.get("sal"), Ok(Value::Field(_))));
        assert!(matches!(cast.get("station"), Ok(Value::Property(_))));
        assert!(matches!(
            cast.get("oxygen"),
            Err(AnalysisError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_add_field_avoids_collisions() {
        let mut cast = test_cast();
        let first = cast.add_field("rho", vec![0.0; 4], false).unwrap();
        let second = cast.add_field("rho", vec![1.0; 4], false).unwrap();
        assert_eq!(first, "rho");
        assert_eq!(second, "rho_2");

        let replaced = cast.add_field("rho", vec![2.0; 4], true).unwrap();
        assert_eq!(replaced, "rho");
        assert_eq!(cast.field("rho").unwrap()[0], 2.0);
    }

    #[test]
    fn test_nan_mask_and_valid_count() {
        let cast = test_cast();
        assert_eq!(cast.nan_mask(), vec![false, false, false, true]);
        assert_eq!(cast.valid_count(), 3);
        assert_eq!(cast.valid_count_for(&["sal"]).unwrap(), 4);
        assert_eq!(cast.valid_count_for(&["temp"]).unwrap(), 3);
    }

    #[test]
    fn test_extend() {
        let mut cast = test_cast();
        cast.extend(2, f64::NAN).unwrap();
        assert_eq!(cast.len(), 6);
        assert!(cast.field("sal").unwrap()[4].is_nan());
        assert!(matches!(cast.extend(0, 0.0), Err(AnalysisError::EmptyExtension)));
    }

    #[test]
    fn test_interpolate_requires_monotonic_reference() {
        let cast = Cast::new("pres", vec![0.0, 10.0, 20.0])
            .with_field("sigma", vec![25.0, 24.0, 26.0])
            .unwrap();

        assert!(matches!(
            cast.interpolate("pres", "sigma", &[25.5], false),
            Err(AnalysisError::NonMonotonic(_))
        ));

        let vals = cast.interpolate("pres", "sigma", &[25.5], true).unwrap();
        assert_eq!(vals.len(), 1);
        assert!(vals[0].is_finite());
    }

    #[test]
    fn test_regrid_round_trip() {
        let cast = test_cast();
        let fine = cast.regrid(&[0.0, 5.0, 10.0, 15.0, 20.0, 25.0, 30.0]).unwrap();
        assert_eq!(fine.len(), 7);

        let back = fine.regrid(&[0.0, 10.0, 20.0, 30.0]).unwrap();
        for (orig, rt) in izip!(cast.field("sal").unwrap(), back.field("sal").unwrap()) {
            assert!((orig - rt).abs() < 1e-9);
        }
    }

    #[test]
    fn test_regrid_out_of_range_is_missing() {
        let cast = test_cast();
        let wide = cast.regrid(&[-10.0, 0.0, 30.0, 50.0]).unwrap();
        let sal = wide.field("sal").unwrap();
        assert!(sal[0].is_nan());
        assert!((sal[1] - 34.0).abs() < 1e-12);
        assert!(sal[3].is_nan());
    }

    #[test]
    fn test_structural_equality() {
        // NaN-free profiles, NaN compares unequal even against itself
        let make = || {
            Cast::new("pres", vec![0.0, 10.0])
                .with_field("temp", vec![10.0, 9.0])
                .unwrap()
                .with_property("station", 7i64)
                .with_coords(-48.0, 60.0)
        };
        let a = make();
        let mut b = make();
        assert_eq!(a, b);
        b.set_property("station", 8i64);
        assert_ne!(a, b);
    }
}

mod ctd;
mod ladcp;
mod xbt;
