//! # Feature Extraction and Regime Classification
//!
//! Reads the diagnostic points of a voltammogram from the `(time, potential, current)`
//! sequences: cathodic and anodic peaks, the half-wave point (steepest rise of the current),
//! Nicholson's `Ep/2 = E1/2 - 28/n` mV point and the calibration residual
//! `Eλ - Ep/2 + 141/n` (Bard, eq. 6.2.21 and table 6.5.2).
//!
//! The kinetic regime is decided from Λ and k0 (Bard p. 239):
//!
//! | Condition | Regime |
//! |-----------|--------|
//! | Λ ≥ 15 and k0 ≥ 0.3·√v | Reversible |
//! | 10^(-2(1+α)) ≤ Λ ≤ 15 and 2·10⁻⁵·√v ≤ k0 ≤ 0.3·√v | Quasireversible |
//! | 10^(-2(1+α)) ≤ Λ ≤ 15 | Not quasireversible |
//! | Λ ≤ 10^(-2(1+α)) and k0 ≤ 2·10⁻⁵·√v | Totally irreversible |
//! | otherwise | Out of zone |
use super::CyclicVoltammetry::CVError;
use super::cv_params::{DerivedQuantities, SimulationParameters};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Nicholson's reversal offset Eλ - Ep/2, mV·n
pub const NICHOLSON_OFFSET_MV: f64 = 141.0;
/// Ep/2 - E1/2, mV·n (Bard eq. 6.2.21)
pub const HALF_PEAK_OFFSET_MV: f64 = 28.0;
/// Randles-Sevcik constant at 25 °C
pub const RANDLES_SEVCIK: f64 = 2.69e5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regime {
    Reversible,
    Quasireversible,
    NotQuasireversible,
    TotallyIrreversible,
    OutOfZone,
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Regime::Reversible => "Reversible (nernstian)",
            Regime::Quasireversible => "Quasireversible",
            Regime::NotQuasireversible => "Not quasireversible",
            Regime::TotallyIrreversible => "Totally irreversible",
            Regime::OutOfZone => "Out of zone boundaries for LSV",
        };
        write!(f, "{}", name)
    }
}

/// First match wins, all bounds are inclusive
#[allow(non_snake_case)]
pub fn classify_regime(Lambda: f64, k0: f64, v: f64, alpha: f64) -> Regime {
    let sqrt_v = v.sqrt();
    let lambda_low = 10f64.powf(-2.0 * (1.0 + alpha));
    let k_high = 0.3 * sqrt_v;
    let k_low = 2e-5 * sqrt_v;

    if Lambda >= 15.0 && k0 >= k_high {
        Regime::Reversible
    } else if Lambda <= 15.0 && Lambda >= lambda_low {
        if k0 <= k_high && k0 >= k_low {
            Regime::Quasireversible
        } else {
            Regime::NotQuasireversible
        }
    } else if Lambda <= lambda_low && k0 <= k_low {
        Regime::TotallyIrreversible
    } else {
        Regime::OutOfZone
    }
}

/// Scalar features of one voltammogram. Potentials in V, currents in mA, times in s unless
/// the name says mV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(non_snake_case)]
pub struct CVFeatures {
    /// cathodic peak current (maximum)
    pub ipc: f64,
    pub Epc: f64,
    pub tpc: f64,
    /// anodic peak current (minimum)
    pub ipa: f64,
    pub Epa: f64,
    pub tpa: f64,
    /// half-wave point: steepest rise of the current
    pub EpHALF: f64,
    pub IpHALF: f64,
    pub tpHALF: f64,
    /// Ep/2 from E1/2, mV
    pub EpONEHALF_mV: f64,
    /// sample of the cathodic sweep closest to Ep/2
    pub EONEHALF: f64,
    pub IpONEHALF: f64,
    pub tpONEHALF: f64,
    /// Randles-Sevcik peak current of a reversible wave, mA
    pub ipeak_RS: f64,
    /// Epa - Epc, mV
    pub Edif_mV: f64,
    /// reversal potential, mV
    pub revPot_mV: f64,
    /// Eλ - Epc, mV
    pub difference_mV: f64,
    /// Eλ - Ep/2, mV
    pub difference2_mV: f64,
    /// difference2 + 141/n, mV
    pub residual_mV: f64,
}

impl CVFeatures {
    pub fn is_converged(&self, sensitivity: f64) -> bool {
        self.residual_mV.abs() <= sensitivity
    }
}

fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, value) in values.iter().enumerate() {
        if *value > values[best] {
            best = i;
        }
    }
    best
}

fn argmin(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, value) in values.iter().enumerate() {
        if *value < values[best] {
            best = i;
        }
    }
    best
}

fn nearest(values: &[f64], target: f64) -> usize {
    let mut best = 0;
    for (i, value) in values.iter().enumerate() {
        if (value - target).abs() < (values[best] - target).abs() {
            best = i;
        }
    }
    best
}

fn extraction_error(reason: &str) -> CVError {
    CVError::Extraction(format!(
        "{}: try increasing the number of steps or reconsider the value of psi",
        reason
    ))
}

/// Extract peak, half-wave and calibration features from aligned sequences
#[allow(non_snake_case)]
pub fn extract_features(
    time: &[f64],
    eta: &[f64],
    current: &[f64],
    params: &SimulationParameters,
    derived: &DerivedQuantities,
) -> Result<CVFeatures, CVError> {
    if current.is_empty() {
        return Err(extraction_error("current sequence is empty"));
    }
    if time.len() != current.len() || eta.len() != current.len() {
        return Err(CVError::Extraction(format!(
            "sequences are not aligned: time {}, potential {}, current {}",
            time.len(),
            eta.len(),
            current.len()
        )));
    }
    if current.iter().any(|i| !i.is_finite()) {
        return Err(extraction_error("current sequence contains non-finite values"));
    }
    if current.len() < 4 {
        return Err(extraction_error("current sequence is too short"));
    }
    let n = params.n as f64;

    let ic = argmax(current);
    let ia = argmin(current);
    let ipc = current[ic];
    let ipa = current[ia];
    if ipc == ipa {
        return Err(extraction_error("current is constant, no peak found"));
    }

    let derivative: Vec<f64> = current.windows(2).map(|w| w[1] - w[0]).collect();
    let ih = argmax(&derivative);
    let EpHALF = eta[ih];

    let EpONEHALF_mV = EpHALF * 1000.0 - HALF_PEAK_OFFSET_MV / n;
    let cathodic_sweep = &eta[..eta.len() / 2];
    let i_half = nearest(cathodic_sweep, EpONEHALF_mV / 1000.0);

    let ipeak_RS = RANDLES_SEVCIK
        * n.powf(1.5)
        * params.area
        * params.D.sqrt()
        * params.C_bulk
        * derived.v.sqrt()
        * 1000.0;

    let Epa = eta[ia];
    let Epc = eta[ic];
    let revPot_mV = params.Ef * 1000.0;
    let difference2_mV = revPot_mV - EpONEHALF_mV;

    Ok(CVFeatures {
        ipc,
        Epc,
        tpc: time[ic],
        ipa,
        Epa,
        tpa: time[ia],
        EpHALF,
        IpHALF: current[ih],
        tpHALF: time[ih],
        EpONEHALF_mV,
        EONEHALF: eta[i_half],
        IpONEHALF: current[i_half],
        tpONEHALF: time[i_half],
        ipeak_RS,
        Edif_mV: (Epa - Epc) * 1000.0,
        revPot_mV,
        difference_mV: revPot_mV - Epc * 1000.0,
        difference2_mV,
        residual_mV: difference2_mV + NICHOLSON_OFFSET_MV / n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_classification_boundary_is_reversible() {
        let v: f64 = 32.7;
        let k0 = 0.3 * v.sqrt();
        assert_eq!(classify_regime(15.0, k0, v, 0.5), Regime::Reversible);
    }

    #[test]
    fn test_classification_table() {
        let v: f64 = 100.0; // √v = 10
        // quasireversible band: 2e-4 <= k0 <= 3
        assert_eq!(classify_regime(1.0, 0.2, v, 0.5), Regime::Quasireversible);
        assert_eq!(classify_regime(15.0, 3.0 - 1e-9, v, 0.5), Regime::Quasireversible);
        assert_eq!(classify_regime(1.0, 5.0, v, 0.5), Regime::NotQuasireversible);
        assert_eq!(classify_regime(1.0, 1e-5, v, 0.5), Regime::NotQuasireversible);
        // Λ lower bound is 1e-3 for α = 0.5
        assert_eq!(classify_regime(2e-3, 0.2, v, 0.5), Regime::Quasireversible);
        assert_eq!(classify_regime(1e-4, 1e-4, v, 0.5), Regime::TotallyIrreversible);
        assert_eq!(classify_regime(1e-4, 1.0, v, 0.5), Regime::OutOfZone);
        assert_eq!(classify_regime(20.0, 1.0, v, 0.5), Regime::OutOfZone);
        assert_eq!(classify_regime(20.0, 3.5, v, 0.5), Regime::Reversible);
    }

    #[test]
    fn test_regime_display() {
        assert_eq!(Regime::Reversible.to_string(), "Reversible (nernstian)");
        assert_eq!(Regime::OutOfZone.to_string(), "Out of zone boundaries for LSV");
    }

    fn synthetic() -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let time: Vec<f64> = (0..8).map(|i| i as f64 * 0.1).collect();
        let eta = vec![0.2, 0.1, 0.0, -0.1, -0.2, -0.1, 0.0, 0.1];
        let current = vec![0.0, 0.1, 0.5, 0.7, 0.4, 0.0, -0.3, -0.3];
        (time, eta, current)
    }

    #[test]
    fn test_extract_synthetic_features() {
        let (time, eta, current) = synthetic();
        let params = SimulationParameters::default();
        let derived = params.derive(1.0).unwrap();
        let f = extract_features(&time, &eta, &current, &params, &derived).unwrap();

        assert_eq!(f.ipc, 0.7);
        assert_eq!(f.Epc, -0.1);
        assert_relative_eq!(f.tpc, 0.3);
        // first occurrence of the minimum
        assert_eq!(f.ipa, -0.3);
        assert_eq!(f.Epa, 0.0);
        assert_relative_eq!(f.tpa, 0.6);
        // steepest rise between samples 1 and 2
        assert_eq!(f.EpHALF, 0.1);
        assert_eq!(f.IpHALF, 0.1);
        assert_relative_eq!(f.EpONEHALF_mV, 72.0, epsilon = 1e-9);
        // nearest potential to 72 mV within the first half
        assert_eq!(f.EONEHALF, 0.1);
        assert_eq!(f.IpONEHALF, 0.1);
        assert_relative_eq!(f.Edif_mV, 100.0, epsilon = 1e-9);
        assert_relative_eq!(f.revPot_mV, -200.0);
        assert_relative_eq!(f.difference2_mV, -272.0, epsilon = 1e-9);
        assert_relative_eq!(f.residual_mV, -131.0, epsilon = 1e-9);
        assert!(!f.is_converged(1.0));
    }

    #[test]
    fn test_randles_sevcik_reference() {
        let (time, eta, current) = synthetic();
        let params = SimulationParameters::default();
        let derived = params.derive(1.0).unwrap();
        let f = extract_features(&time, &eta, &current, &params, &derived).unwrap();
        let expected = 2.69e5 * 4.0 * (1e-5f64).sqrt() * 1e-6 * derived.v.sqrt() * 1000.0;
        assert_relative_eq!(f.ipeak_RS, expected, max_relative = 1e-12);
    }

    #[test]
    fn test_degenerate_current() {
        let params = SimulationParameters::default();
        let derived = params.derive(1.0).unwrap();
        let empty: Vec<f64> = Vec::new();
        match extract_features(&empty, &empty, &empty, &params, &derived) {
            Err(CVError::Extraction(msg)) => assert!(msg.contains("increasing the number of steps")),
            other => panic!("Expected Extraction error, got {:?}", other),
        }

        let time = vec![0.0, 1.0, 2.0, 3.0, 4.0];
        let eta = vec![0.2, 0.1, 0.0, 0.1, 0.2];
        let flat = vec![0.5; 5];
        assert!(matches!(
            extract_features(&time, &eta, &flat, &params, &derived),
            Err(CVError::Extraction(_))
        ));

        let short = vec![0.5; 4];
        assert!(matches!(
            extract_features(&time, &eta, &short, &params, &derived),
            Err(CVError::Extraction(_))
        ));
    }
}
