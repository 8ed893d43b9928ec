//! Inverse of the standard normal CDF.
//!
//! Two interchangeable strategies: a numeric inverse that bisects a
//! high-precision CDF, and Acklam's closed-form rational approximation.

use serde::{Deserialize, Serialize};

const P_MIN: f64 = 1e-12;
const P_MAX: f64 = 1.0 - 1e-12;

pub trait InverseNormalCdf: Send + Sync {
    /// `Φ⁻¹(p)` for `p` in (0, 1); inputs outside are clamped.
    fn quantile(&self, p: f64) -> f64;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InverseNormalKind {
    #[default]
    Numeric,
    Rational,
}

impl InverseNormalKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "numeric" | "library" | "bisection" => Some(Self::Numeric),
            "rational" | "acklam" | "closed-form" => Some(Self::Rational),
            _ => None,
        }
    }

    pub fn select(self) -> Box<dyn InverseNormalCdf> {
        match self {
            Self::Numeric => Box::new(NumericInverse::default()),
            Self::Rational => Box::new(RationalInverse),
        }
    }
}

/// Complementary error function (Numerical Recipes `erfcc`, fractional error
/// below 1.2e-7 everywhere).
pub fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let ans = t * (-z * z - 1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98
                                + t * (1.488_515_87 + t * (-0.822_152_23 + t * 0.170_872_77)))))))))
        .exp();
    if x >= 0.0 { ans } else { 2.0 - ans }
}

pub fn normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

#[derive(Debug, Clone, Copy)]
pub struct NumericInverse {
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for NumericInverse {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 200,
        }
    }
}

impl InverseNormalCdf for NumericInverse {
    fn quantile(&self, p: f64) -> f64 {
        let p = clamp_p(p);
        let (mut lo, mut hi) = (-9.0_f64, 9.0_f64);
        for _ in 0..self.max_iterations {
            let mid = 0.5 * (lo + hi);
            if normal_cdf(mid) < p {
                lo = mid;
            } else {
                hi = mid;
            }
            if hi - lo < self.tolerance {
                break;
            }
        }
        0.5 * (lo + hi)
    }

    fn name(&self) -> &'static str {
        "numeric"
    }
}

/// Acklam's rational approximation, relative error about 1.15e-9.
#[derive(Debug, Clone, Copy, Default)]
pub struct RationalInverse;

const A: [f64; 6] = [
    -3.969_683_028_665_376e1,
    2.209_460_984_245_205e2,
    -2.759_285_104_469_687e2,
    1.383_577_518_672_690e2,
    -3.066_479_806_614_716e1,
    2.506_628_277_459_239,
];
const B: [f64; 5] = [
    -5.447_609_879_822_406e1,
    1.615_858_368_580_409e2,
    -1.556_989_798_598_866e2,
    6.680_131_188_771_972e1,
    -1.328_068_155_288_572e1,
];
const C: [f64; 6] = [
    -7.784_894_002_430_293e-3,
    -3.223_964_580_411_365e-1,
    -2.400_758_277_161_838,
    -2.549_732_539_343_734,
    4.374_664_141_464_968,
    2.938_163_982_698_783,
];
const D: [f64; 4] = [
    7.784_695_709_041_462e-3,
    3.224_671_290_700_398e-1,
    2.445_134_137_142_996,
    3.754_408_661_907_416,
];
const P_LOW: f64 = 0.02425;

impl InverseNormalCdf for RationalInverse {
    fn quantile(&self, p: f64) -> f64 {
        let p = clamp_p(p);
        if p < P_LOW {
            let q = (-2.0 * p.ln()).sqrt();
            tail(q)
        } else if p <= 1.0 - P_LOW {
            let q = p - 0.5;
            let r = q * q;
            (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
                / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
        } else {
            let q = (-2.0 * (1.0 - p).ln()).sqrt();
            -tail(q)
        }
    }

    fn name(&self) -> &'static str {
        "rational"
    }
}

fn tail(q: f64) -> f64 {
    (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
        / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
}

fn clamp_p(p: f64) -> f64 {
    if p.is_nan() { 0.5 } else { p.clamp(P_MIN, P_MAX) }
}
