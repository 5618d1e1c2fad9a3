//! # Simulation Parameters
//!
//! Physical constants, kinetic and numerical parameters of a CV run and the quantities derived
//! from them for a given ψ (scan rate, Λ, duration, time and space steps).
//!
//! The parameter set is plain data: it can be created with `Default`, deserialized from JSON
//! (missing fields fall back to defaults) and must pass `check_task()` before a run.
use super::CyclicVoltammetry::CVError;
use log::debug;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::Path;

/// Faraday constant, C/mol
pub const FARADAY: f64 = 9.64853e4;
/// Ideal gas constant, J/(mol·K)
pub const R_GAS: f64 = 8.31447;
/// Room temperature, K
pub const T_ROOM: f64 = 298.15;
/// Upper bound of `Dm` for which the explicit diffusion update is stable
pub const DM_STABILITY_LIMIT: f64 = 0.5;

/// All inputs of one simulation. Only `Ef` changes during calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(non_snake_case)]
pub struct SimulationParameters {
    /// Faraday constant (C/mol)
    pub F: f64,
    /// Gas constant (J/mol/K)
    pub R: f64,
    /// Temperature (K)
    pub T: f64,
    /// Transfer coefficient
    pub alpha: f64,
    /// Standard rate constant (cm/s)
    pub k0: f64,
    /// Diffusion coefficient of A and B (cm²/s)
    pub D: f64,
    /// Bulk concentration of A (mol/cm³)
    pub C_bulk: f64,
    /// Number of electrons
    pub n: u32,
    /// Electrode area (cm²)
    pub area: f64,
    /// Number of time steps, also the spatial size of the grid
    pub steps: usize,
    /// Model diffusion coefficient
    pub Dm: f64,
    /// Initial potential (V)
    pub Ei: f64,
    /// Reversal potential (V)
    pub Ef: f64,
    /// Calibration tolerance on the residual (mV)
    pub sensitivity: f64,
    /// Step of the reversal potential correction (V)
    pub ef_step: f64,
    /// Maximum number of simulations per ψ
    pub max_iterations: usize,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            F: FARADAY,
            R: R_GAS,
            T: T_ROOM,
            alpha: 0.5,
            k0: 0.2,
            D: 1e-5,
            C_bulk: 1e-6,
            n: 1,
            area: 4.0,
            steps: 50,
            Dm: 0.45,
            Ei: 0.2,
            Ef: -0.2,
            sensitivity: 1.0,
            ef_step: 0.001,
            max_iterations: 500,
        }
    }
}

/// Quantities computed from ψ and the parameter set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[allow(non_snake_case)]
pub struct DerivedQuantities {
    pub psi: f64,
    /// Normalized Faraday constant F/(RT), 1/V
    pub f: f64,
    /// Scan rate, V/s
    pub v: f64,
    /// Charge transfer to mass transfer ratio
    pub Lambda: f64,
    /// Duration of the experiment, s
    pub tk: f64,
    /// Time step, s
    pub delt: f64,
    /// Space step, cm
    pub delx: f64,
    /// ψ recovered from the scan rate
    pub psi_check: f64,
    /// Dm recovered from D, Δt and Δx
    pub Dm_check: f64,
}

impl SimulationParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalized Faraday constant F/(RT)
    pub fn f_norm(&self) -> f64 {
        self.F / (self.R * self.T)
    }

    pub fn from_json_str(json: &str) -> Result<Self, CVError> {
        let params: SimulationParameters = serde_json::from_str(json)?;
        params.check_task()?;
        Ok(params)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CVError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Validate the parameter set
    pub fn check_task(&self) -> Result<(), CVError> {
        let positive = [
            ("F", self.F),
            ("R", self.R),
            ("T", self.T),
            ("k0", self.k0),
            ("D", self.D),
            ("C_bulk", self.C_bulk),
            ("area", self.area),
            ("sensitivity", self.sensitivity),
            ("ef_step", self.ef_step),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(CVError::InvalidConfiguration(format!(
                    "{} must be positive and finite, got {}",
                    name, value
                )));
            }
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(CVError::InvalidConfiguration(format!(
                "alpha must lie in (0, 1), got {}",
                self.alpha
            )));
        }
        if self.n == 0 {
            return Err(CVError::InvalidConfiguration(
                "number of electrons must be at least 1".to_string(),
            ));
        }
        if self.steps < 3 {
            return Err(CVError::InvalidConfiguration(format!(
                "at least 3 steps are required, got {}",
                self.steps
            )));
        }
        if self.max_iterations == 0 {
            return Err(CVError::InvalidConfiguration(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        check_dm(self.Dm)?;
        check_window(self.Ei, self.Ef)?;
        Ok(())
    }

    /// Compute scan rate, Λ and the grid steps for a given ψ
    pub fn derive(&self, psi: f64) -> Result<DerivedQuantities, CVError> {
        if !(psi.is_finite() && psi > 0.0) {
            return Err(CVError::InvalidConfiguration(format!(
                "psi must be positive, got {}",
                psi
            )));
        }
        check_window(self.Ei, self.Ef)?;
        let f = self.f_norm();
        let v = (self.k0 / psi).powi(2) / (PI * self.D * f);
        if !(v.is_finite() && v > 0.0) {
            return Err(CVError::InvalidConfiguration(format!(
                "scan rate is not finite for psi = {}: v = {}",
                psi, v
            )));
        }
        #[allow(non_snake_case)]
        let Lambda = self.k0 / (self.D * f * v).sqrt();
        let tk = 2.0 * (self.Ei - self.Ef) / v;
        let delt = tk / self.steps as f64;
        let delx = (self.D * delt / self.Dm).sqrt();
        if !(delx.is_finite() && delx > 0.0) {
            return Err(CVError::InvalidConfiguration(format!(
                "space step is not finite: delx = {}",
                delx
            )));
        }
        let derived = DerivedQuantities {
            psi,
            f,
            v,
            Lambda,
            tk,
            delt,
            delx,
            psi_check: self.k0 / (PI * self.D * f * v).sqrt(),
            Dm_check: self.D * delt / delx.powi(2),
        };
        debug!(
            "psi = {}: v = {:.6e} V/s, Lambda = {:.4}, delt = {:.3e} s, delx = {:.3e} cm",
            psi, v, Lambda, delt, delx
        );
        Ok(derived)
    }
}

/// The explicit scheme needs 0 < Dm <= 0.5
pub fn check_dm(dm: f64) -> Result<(), CVError> {
    if dm > 0.0 && dm <= DM_STABILITY_LIMIT {
        Ok(())
    } else {
        Err(CVError::UnstableScheme { dm })
    }
}

fn check_window(ei: f64, ef: f64) -> Result<(), CVError> {
    if ei.is_finite() && ef.is_finite() && ei > ef {
        Ok(())
    } else {
        Err(CVError::InvalidConfiguration(format!(
            "initial potential must be above the reversal potential: Ei = {}, Ef = {}",
            ei, ef
        )))
    }
}
