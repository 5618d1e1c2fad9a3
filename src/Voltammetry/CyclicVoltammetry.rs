//! # Cyclic Voltammetry Task
//!
//! Calibration loop and multi-ψ driver.
//!
//! ## Main Structures
//!
//! - **`RunResult`**: aligned `(time, potential, current)` sequences of one simulation plus the
//!   extracted features
//! - **`CalibrationContext`**: mutable state of one ψ (current reversal potential, iteration
//!   count). It owns a copy of the parameters, the shared base set is never touched
//! - **`CalibratedRun`**: accepted run with its kinetic regime
//! - **`CVTask`**: list of ψ values with a base parameter set; every ψ is resolved on its own,
//!   so one failure never stops the others
//!
//! ## Calibration
//!
//! Each pass builds the waveform, runs the solver and extracts the features. The run is accepted
//! when `|Eλ - Ep/2 + 141/n| <= sensitivity`. Otherwise `Eλ` moves by `ef_step` against the sign
//! of the residual and the pass is repeated. After `max_iterations` passes the run with the
//! smallest `|residual|` is returned inside `CVError::NotConverged` (the earliest one on ties).
use super::cv_features::{CVFeatures, Regime, classify_regime, extract_features};
use super::cv_params::{DerivedQuantities, SimulationParameters};
use super::diffusion_solver::DiffusionSolver;
use super::waveform::Waveform;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CVError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Unstable explicit scheme: Dm = {dm} must lie in (0, 0.5]")]
    UnstableScheme { dm: f64 },
    #[error("Feature extraction failed: {0}")]
    Extraction(String),
    #[error(
        "Calibration for psi = {psi} did not converge after {iterations} iterations, best residual {residual_mv:.3} mV"
    )]
    NotConverged {
        psi: f64,
        iterations: usize,
        residual_mv: f64,
        best_effort: Box<RunResult>,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One simulated voltammogram. `time`, `potential` and `current` have the same length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub psi: f64,
    /// zero-based calibration pass that produced this run
    pub iteration: usize,
    /// parameters of this run, `Ef` included
    pub params: SimulationParameters,
    pub derived: DerivedQuantities,
    /// s
    pub time: Vec<f64>,
    /// V
    pub potential: Vec<f64>,
    /// mA
    pub current: Vec<f64>,
    pub features: CVFeatures,
}

impl RunResult {
    /// Single pass: waveform, solver, features
    pub fn simulate(
        psi: f64,
        params: &SimulationParameters,
        iteration: usize,
    ) -> Result<Self, CVError> {
        let derived = params.derive(psi)?;
        let waveform = Waveform::build(params, &derived)?;
        let output = DiffusionSolver::new(params, &derived).solve(&waveform)?;

        let len = output.current.len();
        let time = waveform.time[..len].to_vec();
        let potential = waveform.eta[..len].to_vec();
        let current = output.current;
        let features = extract_features(&time, &potential, &current, params, &derived)?;

        Ok(Self {
            psi,
            iteration,
            params: params.clone(),
            derived,
            time,
            potential,
            current,
            features,
        })
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn residual_mv(&self) -> f64 {
        self.features.residual_mV
    }

    pub fn regime(&self) -> Regime {
        classify_regime(
            self.derived.Lambda,
            self.params.k0,
            self.derived.v,
            self.params.alpha,
        )
    }

    /// diagnostic record of the pass
    pub fn log_iteration(&self) {
        let f = &self.features;
        debug!(
            "psi = {} iteration {}: Ei = {} mV, Ef = {} mV, v = {:.4e} V/s, Lambda = {:.4}, delt = {:.3e} s, delx = {:.3e} cm",
            self.derived.psi_check,
            self.iteration,
            (self.params.Ei * 1000.0) as i64,
            (self.params.Ef * 1000.0) as i64,
            self.derived.v,
            self.derived.Lambda,
            self.derived.delt,
            self.derived.delx
        );
        debug!(
            "ipc = {:.4e} mA at {:.1} mV, ipa = {:.4e} mA at {:.1} mV, residual = {:.3} mV",
            f.ipc,
            f.Epc * 1000.0,
            f.ipa,
            f.Epa * 1000.0,
            f.residual_mV
        );
    }
}

/// Accepted run of one ψ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedRun {
    pub run: RunResult,
    pub regime: Regime,
    /// number of simulations performed
    pub iterations: usize,
}

/// Mutable state of the calibration of a single ψ
#[derive(Debug, Clone)]
pub struct CalibrationContext {
    psi: f64,
    params: SimulationParameters,
    initial_ef: f64,
    iteration: usize,
}

impl CalibrationContext {
    pub fn new(psi: f64, base: &SimulationParameters) -> Result<Self, CVError> {
        base.check_task()?;
        base.derive(psi)?;
        Ok(Self {
            psi,
            params: base.clone(),
            initial_ef: base.Ef,
            iteration: 0,
        })
    }

    pub fn psi(&self) -> f64 {
        self.psi
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Reversal potential of the next pass
    pub fn reversal_potential(&self) -> f64 {
        self.params.Ef
    }

    pub fn initial_reversal_potential(&self) -> f64 {
        self.initial_ef
    }

    /// Run one pass with the current reversal potential
    pub fn simulate(&mut self) -> Result<RunResult, CVError> {
        let run = RunResult::simulate(self.psi, &self.params, self.iteration)?;
        self.iteration += 1;
        run.log_iteration();
        Ok(run)
    }

    /// Move the reversal potential one step towards a zero residual
    pub fn nudge(&mut self, residual_mv: f64) {
        if residual_mv > 0.0 {
            self.params.Ef -= self.params.ef_step;
        } else {
            self.params.Ef += self.params.ef_step;
        }
    }

    /// Restore the initial reversal potential
    pub fn reset(&mut self) {
        self.params.Ef = self.initial_ef;
        self.iteration = 0;
    }

    /// Repeat passes until the residual is within tolerance or the cap is reached. The initial
    /// reversal potential is restored afterwards, so the context can be calibrated again.
    pub fn calibrate(&mut self) -> Result<CalibratedRun, CVError> {
        let sensitivity = self.params.sensitivity;
        let max_iterations = self.params.max_iterations;
        let mut best: Option<RunResult> = None;
        loop {
            let run = match self.simulate() {
                Ok(run) => run,
                Err(e) => {
                    self.reset();
                    return Err(e);
                }
            };
            let residual = run.residual_mv();
            if run.features.is_converged(sensitivity) {
                let regime = run.regime();
                info!(
                    "psi = {} converged after {} iterations at Ef = {:.4} V: {}",
                    self.psi, self.iteration, run.params.Ef, regime
                );
                let iterations = self.iteration;
                self.reset();
                return Ok(CalibratedRun {
                    run,
                    regime,
                    iterations,
                });
            }
            self.nudge(residual);
            if best
                .as_ref()
                .is_none_or(|b| residual.abs() < b.residual_mv().abs())
            {
                best = Some(run);
            }
            if self.iteration >= max_iterations {
                if let Some(best_run) = best.take() {
                    let best_residual = best_run.residual_mv();
                    warn!(
                        "psi = {}: residual still outside ±{} mV after {} iterations, best {:.3} mV at Ef = {:.4} V",
                        self.psi, sensitivity, self.iteration, best_residual, best_run.params.Ef
                    );
                    let iterations = self.iteration;
                    self.reset();
                    return Err(CVError::NotConverged {
                        psi: self.psi,
                        iterations,
                        residual_mv: best_residual,
                        best_effort: Box::new(best_run),
                    });
                }
            }
        }
    }
}

/// Calibrate a single ψ against a base parameter set
pub fn calibrate_psi(psi: f64, base: &SimulationParameters) -> Result<CalibratedRun, CVError> {
    let mut context = CalibrationContext::new(psi, base)?;
    context.calibrate()
}

/// Outcome for one requested ψ
#[derive(Debug)]
pub struct PsiOutcome {
    pub psi: f64,
    pub result: Result<CalibratedRun, CVError>,
}

impl PsiOutcome {
    /// Accepted run, or the best-effort run of a calibration that did not converge
    pub fn run(&self) -> Option<&RunResult> {
        match &self.result {
            Ok(calibrated) => Some(&calibrated.run),
            Err(CVError::NotConverged { best_effort, .. }) => Some(best_effort),
            Err(_) => None,
        }
    }
}

/// Set of ψ values simulated with the same base parameters
#[derive(Debug, Clone)]
pub struct CVTask {
    pub problem_name: Option<String>,
    pub params: SimulationParameters,
    pub psi: Vec<f64>,
}

impl Default for CVTask {
    fn default() -> Self {
        Self {
            problem_name: None,
            params: SimulationParameters::default(),
            psi: vec![0.1, 1.0, 20.0],
        }
    }
}

impl CVTask {
    pub fn new(params: SimulationParameters, psi: Vec<f64>) -> Self {
        Self {
            problem_name: None,
            params,
            psi,
        }
    }

    pub fn set_problem_name(&mut self, name: &str) {
        self.problem_name = Some(name.to_string());
    }

    /// Title line for the reports of this task
    pub fn header(&self) -> String {
        let psi: Vec<String> = self.psi.iter().map(|p| p.to_string()).collect();
        match &self.problem_name {
            Some(name) => format!("{} (psi: {})", name, psi.join(", ")),
            None => format!("CV task (psi: {})", psi.join(", ")),
        }
    }

    pub fn check_task(&self) -> Result<(), CVError> {
        if self.psi.is_empty() {
            return Err(CVError::InvalidConfiguration(
                "no psi values given".to_string(),
            ));
        }
        self.params.check_task()
    }

    /// Resolve every ψ in order; errors stay with their ψ
    pub fn run_all(&self) -> Vec<PsiOutcome> {
        let mut outcomes = Vec::with_capacity(self.psi.len());
        for &psi in &self.psi {
            info!("casting psi = {}", psi);
            let result = calibrate_psi(psi, &self.params);
            match &result {
                Ok(calibrated) => info!(
                    "psi = {}: {} (Edif = {:.1} mV)",
                    psi, calibrated.regime, calibrated.run.features.Edif_mV
                ),
                Err(e) => warn!("psi = {}: {}", psi, e),
            }
            outcomes.push(PsiOutcome { psi, result });
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_simulate_aligned_sequences() {
        let params = SimulationParameters::default();
        let run = RunResult::simulate(1.0, &params, 0).unwrap();
        assert_eq!(run.len(), params.steps);
        assert_eq!(run.time.len(), run.current.len());
        assert_eq!(run.potential.len(), run.current.len());
        assert_eq!(run.potential[0], params.Ei);
        assert_eq!(run.iteration, 0);
    }

    #[test]
    fn test_nudge_direction() {
        let params = SimulationParameters::default();
        let mut ctx = CalibrationContext::new(1.0, &params).unwrap();
        ctx.nudge(-55.0);
        assert_relative_eq!(ctx.reversal_potential(), -0.199, epsilon = 1e-12);
        ctx.nudge(3.0);
        ctx.nudge(3.0);
        assert_relative_eq!(ctx.reversal_potential(), -0.201, epsilon = 1e-12);
        ctx.reset();
        assert_eq!(ctx.reversal_potential(), params.Ef);
        assert_eq!(ctx.initial_reversal_potential(), params.Ef);
    }

    #[test]
    fn test_context_counts_iterations() {
        let params = SimulationParameters::default();
        let mut ctx = CalibrationContext::new(1.0, &params).unwrap();
        assert_eq!(ctx.iteration(), 0);
        let first = ctx.simulate().unwrap();
        let second = ctx.simulate().unwrap();
        assert_eq!(ctx.iteration(), 2);
        assert_eq!(first.iteration, 0);
        assert_eq!(second.iteration, 1);
        assert_eq!(first.current, second.current);
    }

    #[test]
    fn test_context_rejects_bad_input() {
        let params = SimulationParameters::default();
        assert!(matches!(
            CalibrationContext::new(-1.0, &params),
            Err(CVError::InvalidConfiguration(_))
        ));
        let mut unstable = SimulationParameters::default();
        unstable.Dm = 0.7;
        assert!(matches!(
            CalibrationContext::new(1.0, &unstable),
            Err(CVError::UnstableScheme { .. })
        ));
    }

    #[test]
    fn test_iteration_cap() {
        let mut params = SimulationParameters::default();
        params.max_iterations = 5;
        match calibrate_psi(1.0, &params) {
            Err(CVError::NotConverged {
                psi,
                iterations,
                residual_mv,
                best_effort,
            }) => {
                assert_eq!(psi, 1.0);
                assert_eq!(iterations, 5);
                assert!(residual_mv.abs() > params.sensitivity);
                assert_eq!(best_effort.iteration, 4);
                assert_eq!(best_effort.len(), params.steps);
            }
            other => panic!("Expected NotConverged, got {:?}", other),
        }
    }

    #[test]
    fn test_calibrate_restores_reversal_potential() {
        let mut params = SimulationParameters::default();
        params.max_iterations = 3;
        let mut ctx = CalibrationContext::new(1.0, &params).unwrap();
        assert!(ctx.calibrate().is_err());
        assert_eq!(ctx.reversal_potential(), params.Ef);
        assert_eq!(ctx.iteration(), 0);
    }

    #[test]
    fn test_error_messages() {
        let e = CVError::UnstableScheme { dm: 0.6 };
        assert!(e.to_string().contains("0.6"));
        let e = CVError::Extraction("current sequence is empty".to_string());
        assert_eq!(
            e.to_string(),
            "Feature extraction failed: current sequence is empty"
        );
    }

    #[test]
    fn test_task_requires_psi() {
        let task = CVTask::new(SimulationParameters::default(), vec![]);
        assert!(task.check_task().is_err());
        let task = CVTask::default();
        assert!(task.check_task().is_ok());
        assert_eq!(task.psi, vec![0.1, 1.0, 20.0]);
    }

    #[test]
    fn test_task_header() {
        let mut task = CVTask::default();
        assert_eq!(task.header(), "CV task (psi: 0.1, 1, 20)");
        task.set_problem_name("ferrocene");
        assert_eq!(task.problem_name.as_deref(), Some("ferrocene"));
        assert_eq!(task.header(), "ferrocene (psi: 0.1, 1, 20)");
    }
}
