//! An ordered collection of casts forming a spatial transect, and the derived quantities
//! that only make sense across stations.

use std::fmt;
use std::iter::FromIterator;
use std::ops::{Add, Index, Range};

use itertools::izip;
use ndarray::Array2;

use crate::{
    bathymetry::Bathymetry,
    cast::{Cast, CtdCast, Property},
    error::{AnalysisError, Result},
    numerics::{self, diff2_along, diff2_inner, integrate_shear, G, OMEGA},
};

/// The result of stacking a name across every cast of a collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Stacked<'a> {
    /// The name resolved to a field in every cast: a (level × station) matrix, with
    /// missing-value padding for casts shorter than the longest.
    Matrix(Array2<f64>),
    /// The name resolved to a property in every cast, in station order.
    Properties(Vec<&'a Property>),
}

/// Field-name configuration for the thermal wind calculations.
///
/// The keys exist so that derived fields never silently clobber caller data; with
/// `overwrite` false the usual `name_2`, `name_3`, ... suffix policy applies.
#[derive(Debug, Clone)]
pub struct ThermalWindOptions {
    /// Temperature key used when density has to be derived.
    pub tempkey: String,
    /// Salinity key used when density has to be derived.
    pub salkey: String,
    /// Existing in-situ density key, or `None` to derive density per cast.
    pub rhokey: Option<String>,
    /// Key for the vertical shear field written to each cast.
    pub dudzkey: String,
    /// Key for the velocity field written to each cast.
    pub ukey: String,
    /// Property key for the seafloor depth carried onto midpoint casts.
    pub bottomkey: String,
    /// Whether derived fields may replace existing fields of the same name.
    pub overwrite: bool,
}

impl Default for ThermalWindOptions {
    fn default() -> Self {
        ThermalWindOptions {
            tempkey: "temp".to_owned(),
            salkey: "sal".to_owned(),
            rhokey: None,
            dudzkey: "dudz".to_owned(),
            ukey: "u".to_owned(),
            bottomkey: "depth".to_owned(),
            overwrite: false,
        }
    }
}

/// A CastCollection is an indexable, ordered collection of `Cast` instances.
///
/// Order is along-transect station order and is semantically significant. The collection
/// owns its casts; operations that must not disturb the input (`defray`,
/// `thermal_wind_inner`) work on deep copies and return new collections.
///
/// # Examples
///
/// ```rust
/// use cast_analysis::{Cast, CastCollection};
///
/// let a = Cast::new("pres", vec![0.0, 10.0]).with_coords(-48.0, 60.0);
/// let b = Cast::new("pres", vec![0.0, 10.0]).with_coords(-47.5, 60.1);
/// let coll = CastCollection::new(vec![a, b]);
///
/// assert_eq!(coll.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CastCollection {
    casts: Vec<Cast>,
}

impl CastCollection {
    /// Create a collection from casts in station order.
    pub fn new(casts: Vec<Cast>) -> Self {
        CastCollection { casts }
    }

    /// Number of casts in the collection.
    #[inline]
    pub fn len(&self) -> usize {
        self.casts.len()
    }

    /// Whether the collection holds no casts.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.casts.is_empty()
    }

    /// The cast at a station index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Cast> {
        self.casts.get(index)
    }

    /// Mutable access to the cast at a station index.
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Cast> {
        self.casts.get_mut(index)
    }

    /// Iterate the casts in station order.
    pub fn iter(&self) -> std::slice::Iter<'_, Cast> {
        self.casts.iter()
    }

    /// Iterate the casts mutably in station order.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Cast> {
        self.casts.iter_mut()
    }

    /// Append a cast (or a typed variant) to the end of the transect.
    pub fn push<C: Into<Cast>>(&mut self, cast: C) {
        self.casts.push(cast.into());
    }

    /// A new collection over a station range, cloning the casts in it.
    pub fn slice(&self, range: Range<usize>) -> CastCollection {
        CastCollection {
            casts: self.casts[range].to_vec(),
        }
    }

    /// Resolve a name against every cast at once.
    ///
    /// A field in every cast stacks into a matrix; a property in every cast yields the
    /// scalars in station order; anything else is a `KeyNotFoundInAllCasts` error.
    pub fn stacked(&self, key: &str) -> Result<Stacked<'_>> {
        if self.casts.iter().all(|c| c.has_field(key)) {
            Ok(Stacked::Matrix(self.as_array(key)?))
        } else {
            let props = self
                .casts
                .iter()
                .map(|c| {
                    c.property(key)
                        .map_err(|_| AnalysisError::KeyNotFoundInAllCasts(key.to_owned()))
                })
                .collect::<Result<_>>()?;
            Ok(Stacked::Properties(props))
        }
    }

    /// Stack a field across all casts into a (level × station) matrix.
    ///
    /// Casts shorter than the longest are padded with missing values. Rows are aligned
    /// by index only; casts on differing grids must be brought onto a common grid with
    /// `regrid`/`defray` first.
    pub fn as_array(&self, key: &str) -> Result<Array2<f64>> {
        let mut columns = Vec::with_capacity(self.casts.len());
        for cast in &self.casts {
            let col = cast
                .field(key)
                .map_err(|_| AnalysisError::KeyNotFoundInAllCasts(key.to_owned()))?;
            columns.push(col);
        }

        let nrows = columns.iter().map(|c| c.len()).max().unwrap_or(0);
        let mut arr = Array2::from_elem((nrows, columns.len()), f64::NAN);
        for (j, col) in columns.iter().enumerate() {
            for (i, &v) in col.iter().enumerate() {
                arr[(i, j)] = v;
            }
        }
        Ok(arr)
    }

    /// A property value from every cast, in station order.
    pub fn property_values(&self, key: &str) -> Result<Vec<&Property>> {
        self.casts
            .iter()
            .map(|c| {
                c.property(key)
                    .map_err(|_| AnalysisError::KeyNotFoundInAllCasts(key.to_owned()))
            })
            .collect()
    }

    /// The first cast whose property `key` equals `value`.
    pub fn cast_where(&self, key: &str, value: &Property) -> Option<&Cast> {
        self.casts
            .iter()
            .find(|c| c.property(key).ok() == Some(value))
    }

    /// All casts whose property `key` is one of `values`, as a new collection.
    pub fn casts_where(&self, key: &str, values: &[Property]) -> CastCollection {
        CastCollection {
            casts: self
                .casts
                .iter()
                .filter(|c| match c.property(key) {
                    Ok(p) => values.contains(p),
                    Err(_) => false,
                })
                .cloned()
                .collect(),
        }
    }

    /// Pad all casts to the same length with a fill value, and return a copy.
    ///
    /// Does not correct differing pressure bins, which require explicit interpolation.
    pub fn defray(&self, fill: f64) -> Result<CastCollection> {
        let n = self.casts.iter().map(Cast::len).max().unwrap_or(0);
        let mut casts = Vec::with_capacity(self.casts.len());
        for cast in &self.casts {
            let mut cast = cast.clone();
            if cast.len() < n {
                let dif = n - cast.len();
                cast.extend(dif, fill)?;
            }
            casts.push(cast);
        }
        Ok(CastCollection { casts })
    }

    /// Cumulative great-circle distance from the first station, in meters.
    ///
    /// The first entry is zero and the sequence is non-decreasing. Every cast must carry
    /// coordinates.
    pub fn along_track_distance(&self) -> Result<Vec<f64>> {
        let coords = self
            .casts
            .iter()
            .map(|c| {
                c.coords()
                    .map(|cc| (cc.lon, cc.lat))
                    .ok_or(AnalysisError::MissingCoordinates)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(numerics::cumulative_distance(&coords))
    }

    /// Attach a seafloor depth property to every cast from a bathymetry collaborator.
    ///
    /// A cast without coordinates gets a missing-value placeholder and a warning rather
    /// than aborting the whole attachment.
    pub fn attach_bathymetry<B: Bathymetry + ?Sized>(&mut self, bathymetry: &B) {
        for cast in &mut self.casts {
            match cast.coords() {
                Some(c) => {
                    let depth = bathymetry.depth_at(c.lon, c.lat);
                    cast.set_property("depth", depth);
                }
                None => {
                    log::warn!("cast has no coordinates, bathymetric depth set to missing");
                    cast.set_property("depth", f64::NAN);
                }
            }
        }
    }

    /// Compute profile-orthogonal velocity shear using hydrostatic thermal wind, writing
    /// shear and velocity fields back onto each cast.
    ///
    /// In-situ density is computed per cast unless `options.rhokey` names an existing
    /// field; if the automatically derived density names diverge between casts the
    /// computation aborts. Casts without a `depth` field get one as a side effect. The
    /// velocity is referenced to zero at the deepest valid level of each station.
    pub fn thermal_wind(&mut self, options: &ThermalWindOptions) -> Result<()> {
        if self.casts.len() < 2 {
            return Err(AnalysisError::NoValidData);
        }

        let rhokey = self.resolve_density_key(options)?;
        let rho = self.as_array(&rhokey)?;

        for cast in &mut self.casts {
            if !cast.has_field("depth") {
                cast.derive_depth(Some(rhokey.as_str()), &options.salkey, &options.tempkey)?;
            }
        }

        let x = self.along_track_distance()?;
        let drho = diff2_along(&rho, &x);
        let sinphi = self.latitude_sines()?;

        let (m, n) = rho.dim();
        let mut dudz = Array2::from_elem((m, n), f64::NAN);
        for j in 0..n {
            let f = 2.0 * OMEGA * sinphi[j];
            for i in 0..m {
                dudz[(i, j)] = G / rho[(i, j)] * drho[(i, j)] / f;
            }
        }

        let depth = self.as_array("depth")?;
        let u = integrate_shear(&dudz, &depth);

        for (j, cast) in self.casts.iter_mut().enumerate() {
            let len = cast.len();
            let mut shear = dudz.column(j).to_vec();
            shear.truncate(len);
            cast.add_field(&options.dudzkey, shear, options.overwrite)?;

            let mut vel = u.column(j).to_vec();
            vel.truncate(len);
            cast.add_field(&options.ukey, vel, options.overwrite)?;
        }
        Ok(())
    }

    /// Thermal wind evaluated *between* stations, on a new collection of midpoint casts.
    ///
    /// Synthesizes a cast between each pair of adjacent stations: pressure, temperature
    /// and salinity are taken from whichever neighbor has more valid samples, while
    /// coordinates and the `bottomkey` property (when both neighbors carry it) are
    /// averaged. Shear and velocity are written onto the new casts; the input collection
    /// is not mutated. The returned collection is one station shorter than the input.
    pub fn thermal_wind_inner(&self, options: &ThermalWindOptions) -> Result<CastCollection> {
        if self.casts.len() < 2 {
            return Err(AnalysisError::NoValidData);
        }

        // work on a copy so derived density never touches the caller's casts
        let mut work = self.clone();
        let rhokey = work.resolve_density_key(options)?;
        let rho = work.as_array(&rhokey)?;
        let x = work.along_track_distance()?;

        let valid = |v: &[f64]| v.iter().filter(|x| x.is_finite()).count();

        let mut midcasts: Vec<Cast> = Vec::with_capacity(work.len() - 1);
        for (left, right) in izip!(work.casts.iter(), work.casts.iter().skip(1)) {
            let c1 = left.coords().ok_or(AnalysisError::MissingCoordinates)?;
            let c2 = right.coords().ok_or(AnalysisError::MissingCoordinates)?;

            let prefer_denser = |a: &[f64], b: &[f64]| -> Vec<f64> {
                if valid(a) > valid(b) {
                    a.to_vec()
                } else {
                    b.to_vec()
                }
            };
            let p = prefer_denser(left.primary(), right.primary());
            let s = prefer_denser(
                left.field(&options.salkey)?,
                right.field(&options.salkey)?,
            );
            let t = prefer_denser(
                left.field(&options.tempkey)?,
                right.field(&options.tempkey)?,
            );

            let mut mid = CtdCast::new(p, s, t)?
                .with_coords(0.5 * (c1.lon + c2.lon), 0.5 * (c1.lat + c2.lat));
            mid.add_depth(None)?;

            if let (Ok(Property::Float(a)), Ok(Property::Float(b))) = (
                left.property(&options.bottomkey),
                right.property(&options.bottomkey),
            ) {
                mid.set_property(&options.bottomkey, 0.5 * (a + b));
            }
            midcasts.push(mid.into_cast());
        }

        let mut coll = CastCollection::new(midcasts);

        let drho = diff2_inner(&rho, &x);
        let sinphi = coll.latitude_sines()?;
        let (m, inner) = drho.dim();

        let mut dudz = Array2::from_elem((m, inner), f64::NAN);
        for j in 0..inner {
            let f = 2.0 * OMEGA * sinphi[j];
            for i in 0..m {
                let rhoavg = 0.5 * (rho[(i, j)] + rho[(i, j + 1)]);
                dudz[(i, j)] = G / rhoavg * drho[(i, j)] / f;
            }
        }

        // depth matrix on the same grid as the shear; midpoint casts may be shorter
        let mut depth = Array2::from_elem((m, inner), f64::NAN);
        for (j, cast) in coll.iter().enumerate() {
            for (i, &d) in cast.field("depth")?.iter().enumerate() {
                depth[(i, j)] = d;
            }
        }
        let u = integrate_shear(&dudz, &depth);

        for (j, cast) in coll.iter_mut().enumerate() {
            let len = cast.len();
            let mut shear = dudz.column(j).to_vec();
            shear.truncate(len);
            cast.add_field(&options.dudzkey, shear, options.overwrite)?;

            let mut vel = u.column(j).to_vec();
            vel.truncate(len);
            cast.add_field(&options.ukey, vel, options.overwrite)?;
        }
        Ok(coll)
    }

    fn resolve_density_key(&mut self, options: &ThermalWindOptions) -> Result<String> {
        match &options.rhokey {
            Some(key) => Ok(key.clone()),
            None => {
                let mut first: Option<String> = None;
                for cast in &mut self.casts {
                    let key = cast.derive_density(&options.salkey, &options.tempkey)?;
                    match &first {
                        None => first = Some(key),
                        Some(f) if *f != key => {
                            return Err(AnalysisError::DivergentFieldKeys(f.clone(), key));
                        }
                        _ => {}
                    }
                }
                first.ok_or(AnalysisError::NoValidData)
            }
        }
    }

    fn latitude_sines(&self) -> Result<Vec<f64>> {
        self.casts
            .iter()
            .map(|c| {
                c.coords()
                    .map(|cc| cc.lat.to_radians().sin())
                    .ok_or(AnalysisError::MissingCoordinates)
            })
            .collect()
    }
}

impl Index<usize> for CastCollection {
    type Output = Cast;

    fn index(&self, index: usize) -> &Cast {
        &self.casts[index]
    }
}

impl FromIterator<Cast> for CastCollection {
    fn from_iter<I: IntoIterator<Item = Cast>>(iter: I) -> Self {
        CastCollection {
            casts: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for CastCollection {
    type Item = Cast;
    type IntoIter = std::vec::IntoIter<Cast>;

    fn into_iter(self) -> Self::IntoIter {
        self.casts.into_iter()
    }
}

impl<'a> IntoIterator for &'a CastCollection {
    type Item = &'a Cast;
    type IntoIter = std::slice::Iter<'a, Cast>;

    fn into_iter(self) -> Self::IntoIter {
        self.casts.iter()
    }
}

impl Add for CastCollection {
    type Output = CastCollection;

    fn add(mut self, other: CastCollection) -> CastCollection {
        self.casts.extend(other.casts);
        self
    }
}

impl Add<Cast> for CastCollection {
    type Output = CastCollection;

    fn add(mut self, other: Cast) -> CastCollection {
        self.casts.push(other);
        self
    }
}

impl Add for Cast {
    type Output = CastCollection;

    fn add(self, other: Cast) -> CastCollection {
        CastCollection {
            casts: vec![self, other],
        }
    }
}

impl fmt::Display for CastCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CastCollection with {} casts:", self.casts.len())?;
        for (i, cast) in self.casts.iter().take(10).enumerate() {
            writeln!(f, "  {:3} {}", i + 1, cast)?;
        }
        if self.casts.len() > 10 {
            writeln!(f, "  (...)")?;
        }
        Ok(())
    }
}
