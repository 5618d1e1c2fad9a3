//! # Excitation Waveform
//!
//! Builds the triangular potential program of a CV experiment: a linear ramp from `Ei` towards
//! the reversal potential, joined at the seam with a linear ramp back. Together with the
//! potentials the waveform stores the normalized overpotential `f·η` and the Butler-Volmer
//! rate constants for every sample (Bard, B.4.11 and B.4.12).
use super::CyclicVoltammetry::CVError;
use super::cv_params::{DerivedQuantities, SimulationParameters};
use serde::{Deserialize, Serialize};

/// Sampled excitation signal, `steps + 1` points long
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waveform {
    /// time, s
    pub time: Vec<f64>,
    /// applied overpotential, V
    pub eta: Vec<f64>,
    /// f·η
    pub eta_norm: Vec<f64>,
    /// forward (reduction) rate constant, cm/s
    pub kf: Vec<f64>,
    /// backward (oxidation) rate constant, cm/s
    pub kb: Vec<f64>,
}

impl Waveform {
    pub fn build(params: &SimulationParameters, derived: &DerivedQuantities) -> Result<Self, CVError> {
        let steps = params.steps;
        if steps == 0 {
            return Err(CVError::InvalidConfiguration(
                "waveform needs at least one step".to_string(),
            ));
        }
        let len = steps + 1;
        let v = derived.v;
        let time: Vec<f64> = (0..len).map(|i| i as f64 * derived.delt).collect();
        let seam = seam_index(steps);
        let t_seam = time[seam];
        let eta: Vec<f64> = time
            .iter()
            .enumerate()
            .map(|(i, t)| {
                if i < seam {
                    params.Ei - v * t
                } else {
                    params.Ei - 2.0 * v * t_seam + v * t
                }
            })
            .collect();

        let n = params.n as f64;
        let alpha = params.alpha;
        let eta_norm: Vec<f64> = eta.iter().map(|e| e * derived.f).collect();
        let kf: Vec<f64> = eta_norm
            .iter()
            .map(|e| params.k0 * (-alpha * n * e).exp())
            .collect();
        let kb: Vec<f64> = eta_norm
            .iter()
            .map(|e| params.k0 * ((1.0 - alpha) * n * e).exp())
            .collect();

        if kf.iter().chain(kb.iter()).any(|k| !k.is_finite()) {
            return Err(CVError::InvalidConfiguration(
                "rate constants overflow over the potential window".to_string(),
            ));
        }

        Ok(Self {
            time,
            eta,
            eta_norm,
            kf,
            kb,
        })
    }

    pub fn len(&self) -> usize {
        self.eta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eta.is_empty()
    }
}

/// Index at which the scan direction changes: the return ramp starts here
pub fn seam_index(steps: usize) -> usize {
    (steps + 1) / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn waveform_for(psi: f64, steps: usize) -> (Waveform, DerivedQuantities, SimulationParameters) {
        let mut params = SimulationParameters::default();
        params.steps = steps;
        let derived = params.derive(psi).unwrap();
        let waveform = Waveform::build(&params, &derived).unwrap();
        (waveform, derived, params)
    }

    #[test]
    fn test_length_and_start() {
        for steps in [3, 4, 49, 50, 51, 200] {
            for psi in [0.1, 1.0, 20.0] {
                let (w, _, params) = waveform_for(psi, steps);
                assert_eq!(w.len(), steps + 1);
                assert_eq!(w.time.len(), steps + 1);
                assert_eq!(w.kf.len(), steps + 1);
                assert_eq!(w.kb.len(), steps + 1);
                assert_eq!(w.eta[0], params.Ei);
                assert_eq!(w.time[0], 0.0);
            }
        }
    }

    #[test]
    fn test_seam_is_continuous() {
        for steps in [4, 5, 50, 51] {
            let (w, d, _) = waveform_for(1.0, steps);
            let slope = d.v * d.delt;
            for i in 1..w.len() {
                let jump = (w.eta[i] - w.eta[i - 1]).abs();
                assert!(jump <= slope * (1.0 + 1e-9), "jump {} at {}", jump, i);
            }
            // the potential turns at the seam
            let seam = seam_index(steps);
            assert!(w.eta[seam] <= w.eta[seam - 1]);
            assert!(w.eta[seam + 1] > w.eta[seam]);
        }
    }

    #[test]
    fn test_turning_point_near_reversal_potential() {
        let (w, d, params) = waveform_for(1.0, 50);
        let lowest = w.eta.iter().cloned().fold(f64::INFINITY, f64::min);
        assert!((lowest - params.Ef).abs() <= d.v * d.delt);
    }

    #[test]
    fn test_rate_constants() {
        let (w, d, params) = waveform_for(1.0, 50);
        for i in 0..w.len() {
            assert_relative_eq!(w.eta_norm[i], w.eta[i] * d.f, max_relative = 1e-12);
            // kf·kb = k0² for α = 0.5 and n = 1
            assert_relative_eq!(w.kf[i] * w.kb[i], params.k0.powi(2), max_relative = 1e-9);
        }
        // reduction is favoured at negative overpotential
        let seam = seam_index(50);
        assert!(w.kf[seam] > w.kb[seam]);
        assert!(w.kf[0] < w.kb[0]);
    }
}
