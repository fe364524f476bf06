//! Geometric lunar longitude from the truncated ELP2000-85 series.
//!
//! Mean elements and the 60 principal longitude terms follow Meeus,
//! *Astronomical Algorithms* (2nd ed.), ch. 47. Typical error is about
//! 10″, well inside the 3°20′ Pada width.

use super::normalize_360;

/// One periodic term: multiples of D, M, M′, F and the sine coefficient
/// in micro-degrees.
struct LongitudeTerm {
    d: i8,
    m: i8,
    mp: i8,
    f: i8,
    coeff: i32,
}

const fn term(d: i8, m: i8, mp: i8, f: i8, coeff: i32) -> LongitudeTerm {
    LongitudeTerm { d, m, mp, f, coeff }
}

/// Meeus table 47.A, longitude column.
const LONGITUDE_TERMS: [LongitudeTerm; 60] = [
    term(0, 0, 1, 0, 6_288_774),
    term(2, 0, -1, 0, 1_274_027),
    term(2, 0, 0, 0, 658_314),
    term(0, 0, 2, 0, 213_618),
    term(0, 1, 0, 0, -185_116),
    term(0, 0, 0, 2, -114_332),
    term(2, 0, -2, 0, 58_793),
    term(2, -1, -1, 0, 57_066),
    term(2, 0, 1, 0, 53_322),
    term(2, -1, 0, 0, 45_758),
    term(0, 1, -1, 0, -40_923),
    term(1, 0, 0, 0, -34_720),
    term(0, 1, 1, 0, -30_383),
    term(2, 0, 0, -2, 15_327),
    term(0, 0, 1, 2, -12_528),
    term(0, 0, 1, -2, 10_980),
    term(4, 0, -1, 0, 10_675),
    term(0, 0, 3, 0, 10_034),
    term(4, 0, -2, 0, 8_548),
    term(2, 1, -1, 0, -7_888),
    term(2, 1, 0, 0, -6_766),
    term(1, 0, -1, 0, -5_163),
    term(1, 1, 0, 0, 4_987),
    term(2, -1, 1, 0, 4_036),
    term(2, 0, 2, 0, 3_994),
    term(4, 0, 0, 0, 3_861),
    term(2, 0, -3, 0, 3_665),
    term(0, 1, -2, 0, -2_689),
    term(2, 0, -1, 2, -2_602),
    term(2, -1, -2, 0, 2_390),
    term(1, 0, 1, 0, -2_348),
    term(2, -2, 0, 0, 2_236),
    term(0, 1, 2, 0, -2_120),
    term(0, 2, 0, 0, -2_069),
    term(2, -2, -1, 0, 2_048),
    term(2, 0, 1, -2, -1_773),
    term(2, 0, 0, 2, -1_595),
    term(4, -1, -1, 0, 1_215),
    term(0, 0, 2, 2, -1_110),
    term(3, 0, -1, 0, -892),
    term(2, 1, 1, 0, -810),
    term(4, -1, -2, 0, 759),
    term(0, 2, -1, 0, -713),
    term(2, 2, -1, 0, -700),
    term(2, 1, -2, 0, 691),
    term(2, -1, 0, -2, 596),
    term(4, 0, 1, 0, 549),
    term(0, 0, 4, 0, 537),
    term(4, -1, 0, 0, 520),
    term(1, 0, -2, 0, -487),
    term(2, 1, 0, -2, -399),
    term(0, 0, 2, -2, -381),
    term(1, 1, 1, 0, 351),
    term(3, 0, -2, 0, -340),
    term(4, 0, -3, 0, 330),
    term(2, -1, 2, 0, 327),
    term(0, 2, 1, 0, -323),
    term(1, 1, -1, 0, 299),
    term(2, 0, 3, 0, 294),
    term(2, 0, -1, -2, 0),
];

/// Evaluate `c0 + c1·T + c2·T² + c3·T³ + c4·T⁴`.
fn polynomial(coeffs: &[f64; 5], t: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, c| acc * t + c)
}

/// Moon's mean longitude L′.
const MEAN_LONGITUDE: [f64; 5] = [
    218.316_447_7,
    481_267.881_234_21,
    -0.001_578_6,
    1.0 / 538_841.0,
    -1.0 / 65_194_000.0,
];

/// Mean elongation D.
const MEAN_ELONGATION: [f64; 5] = [
    297.850_192_1,
    445_267.111_403_4,
    -0.001_881_9,
    1.0 / 545_868.0,
    -1.0 / 113_065_000.0,
];

/// Sun's mean anomaly M.
const SUN_MEAN_ANOMALY: [f64; 5] = [
    357.529_109_2,
    35_999.050_290_9,
    -0.000_153_6,
    1.0 / 24_490_000.0,
    0.0,
];

/// Moon's mean anomaly M′.
const MOON_MEAN_ANOMALY: [f64; 5] = [
    134.963_396_4,
    477_198.867_505_5,
    0.008_741_4,
    1.0 / 69_699.0,
    -1.0 / 14_712_000.0,
];

/// Moon's argument of latitude F.
const ARGUMENT_OF_LATITUDE: [f64; 5] = [
    93.272_095_0,
    483_202.017_523_3,
    -0.003_653_9,
    -1.0 / 3_526_000.0,
    1.0 / 863_310_000.0,
];

/// Mean lunar elements at an epoch, in degrees [0, 360).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanElements {
    /// Mean longitude L′.
    pub mean_longitude: f64,
    /// Mean elongation D.
    pub elongation: f64,
    /// Sun's mean anomaly M.
    pub sun_anomaly: f64,
    /// Moon's mean anomaly M′.
    pub moon_anomaly: f64,
    /// Argument of latitude F.
    pub argument_of_latitude: f64,
}

impl MeanElements {
    /// Mean elements at `t` Julian centuries (TT) since J2000.0.
    pub fn at(t: f64) -> Self {
        Self {
            mean_longitude: normalize_360(polynomial(&MEAN_LONGITUDE, t)),
            elongation: normalize_360(polynomial(&MEAN_ELONGATION, t)),
            sun_anomaly: normalize_360(polynomial(&SUN_MEAN_ANOMALY, t)),
            moon_anomaly: normalize_360(polynomial(&MOON_MEAN_ANOMALY, t)),
            argument_of_latitude: normalize_360(polynomial(&ARGUMENT_OF_LATITUDE, t)),
        }
    }
}

/// Geometric ecliptic longitude of the Moon, mean equinox of date.
///
/// `t` is Julian centuries of TT since J2000.0. Returns degrees in [0, 360).
pub fn moon_tropical_longitude(t: f64) -> f64 {
    let el = MeanElements::at(t);

    // Eccentricity of Earth's orbit scales terms involving M.
    let e = 1.0 - 0.002_516 * t - 0.000_007_4 * t * t;

    let mut sigma_l = 0.0_f64;
    for term in &LONGITUDE_TERMS {
        let arg = term.d as f64 * el.elongation
            + term.m as f64 * el.sun_anomaly
            + term.mp as f64 * el.moon_anomaly
            + term.f as f64 * el.argument_of_latitude;
        let scale = e.powi(term.m.unsigned_abs() as i32);
        sigma_l += term.coeff as f64 * scale * arg.to_radians().sin();
    }

    // Venus, Jupiter and flattening terms.
    let a1 = normalize_360(119.75 + 131.849 * t);
    let a2 = normalize_360(53.09 + 479_264.290 * t);
    sigma_l += 3958.0 * a1.to_radians().sin()
        + 1962.0 * (el.mean_longitude - el.argument_of_latitude).to_radians().sin()
        + 318.0 * a2.to_radians().sin();

    normalize_360(el.mean_longitude + sigma_l / 1_000_000.0)
}
