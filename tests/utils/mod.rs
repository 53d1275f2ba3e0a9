#![allow(dead_code)] // not every test binary uses every helper

use cast_analysis::{Cast, CastCollection, CtdCast};

/// A CTD cast of `n` levels on a 10 dbar grid at longitude `lon` (latitude 45°N), with
/// constant salinity `sal` and a temperature profile cooling with depth.
pub fn ctd_cast(n: usize, lon: f64, sal: f64) -> CtdCast {
    let pres: Vec<f64> = (0..n).map(|i| 10.0 * i as f64).collect();
    let salinity = vec![sal; n];
    let temp: Vec<f64> = pres.iter().map(|p| 12.0 - 0.01 * p).collect();

    CtdCast::new(pres, salinity, temp)
        .unwrap()
        .with_coords(lon, 45.0)
}

/// A transect of CTD casts on matching pressure grids, at increasing longitude and with
/// salinity increasing along the track.
pub fn transect(stations: usize, n: usize) -> CastCollection {
    (0..stations)
        .map(|j| Cast::from(ctd_cast(n, -48.0 + 0.5 * j as f64, 34.0 + 0.3 * j as f64)))
        .collect()
}

pub fn approx_equal(tgt: f64, guess: f64, tol: f64) -> bool {
    assert!(tol > 0.0);

    (tgt - guess).abs() <= tol
}
