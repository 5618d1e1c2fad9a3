//! # Diffusion-Reaction Solver
//!
//! Explicit finite-difference integration of Fick's second law for species A and B
//! (Bard, appendix B). The concentration grid is indexed `[time step][space box]`; box 0 is the
//! electrode surface. At each step only the boxes reached by diffusion are updated: the active
//! window grows as `ceil(4.2·√k)` (Bard p. 793) and is bounded by the grid size.
//!
//! The surface flux follows from the linearized kinetic boundary condition
//!
//! ```text
//! J = -(kf·A[1] - kb·B[1]) / (1 + kf·Δx/D + kb·Δx/D)
//! A[0] = A[1] + J·Δx/D
//! B[0] = B[1] - J·Δx/D
//! ```
//!
//! (Brown, J. Chem. Educ. 2015, 92, 1490). Cathodic current is positive.
//!
//! Precondition: `0 < Dm <= 0.5`. The solver fails fast with `CVError::UnstableScheme` if the
//! bound is violated.
use super::CyclicVoltammetry::CVError;
use super::cv_params::{DerivedQuantities, SimulationParameters, check_dm};
use super::waveform::Waveform;
use nalgebra::DMatrix;

/// Factor folded into the current: A/m² to mA/cm²
const CURRENT_UNIT_FACTOR: f64 = 0.1;

/// Fractional concentration profiles of both species, rows are time steps and columns are
/// spatial boxes. Each matrix owns its storage.
#[derive(Debug, Clone, PartialEq)]
#[allow(non_snake_case)]
pub struct ConcentrationGrid {
    pub A: DMatrix<f64>,
    pub B: DMatrix<f64>,
}

impl ConcentrationGrid {
    /// uniform A at bulk concentration, no B
    pub fn new(size: usize, c_bulk: f64) -> Self {
        Self {
            A: DMatrix::from_element(size, size, c_bulk),
            B: DMatrix::zeros(size, size),
        }
    }

    pub fn size(&self) -> usize {
        self.A.nrows()
    }

    /// (min, max) over both species
    pub fn bounds(&self) -> (f64, f64) {
        let min = self.A.min().min(self.B.min());
        let max = self.A.max().max(self.B.max());
        (min, max)
    }
}

/// Number of spatial boxes taking part in the update at time step `k`
pub fn active_window(k: usize, size: usize) -> usize {
    let jmax = (4.2 * (k as f64).sqrt()).ceil() as usize;
    jmax.min(size)
}

/// Flux and current produced by one run of the solver
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutput {
    /// surface flux, mol/(cm²·s)
    pub flux: Vec<f64>,
    /// current, mA
    pub current: Vec<f64>,
}

pub struct DiffusionSolver<'a> {
    params: &'a SimulationParameters,
    derived: &'a DerivedQuantities,
}

impl<'a> DiffusionSolver<'a> {
    pub fn new(params: &'a SimulationParameters, derived: &'a DerivedQuantities) -> Self {
        Self { params, derived }
    }

    /// Run the solver and drop the grid
    pub fn solve(&self, waveform: &Waveform) -> Result<SolverOutput, CVError> {
        let (output, _grid) = self.solve_with_grid(waveform)?;
        Ok(output)
    }

    /// Run the solver and return the concentration grid as well
    #[allow(non_snake_case)]
    pub fn solve_with_grid(
        &self,
        waveform: &Waveform,
    ) -> Result<(SolverOutput, ConcentrationGrid), CVError> {
        let p = self.params;
        check_dm(p.Dm)?;
        let steps = p.steps;
        if steps < 3 {
            return Err(CVError::InvalidConfiguration(format!(
                "solver needs at least 3 steps, got {}",
                steps
            )));
        }
        if waveform.len() < steps {
            return Err(CVError::InvalidConfiguration(format!(
                "waveform has {} samples, solver needs {}",
                waveform.len(),
                steps
            )));
        }

        let Dm = p.Dm;
        let ratio = self.derived.delx / p.D;
        let mut grid = ConcentrationGrid::new(steps, p.C_bulk);
        let mut flux = vec![0.0; steps];

        for k in 0..steps - 1 {
            let jmax = active_window(k, steps);
            for j in 1..jmax.saturating_sub(1) {
                let a = &grid.A;
                let new_a = a[(k, j)] + Dm * (a[(k, j - 1)] - 2.0 * a[(k, j)] + a[(k, j + 1)]);
                let b = &grid.B;
                let new_b = b[(k, j)] + Dm * (b[(k, j - 1)] - 2.0 * b[(k, j)] + b[(k, j + 1)]);
                grid.A[(k + 1, j)] = new_a;
                grid.B[(k + 1, j)] = new_b;
            }

            let kf = waveform.kf[k + 1];
            let kb = waveform.kb[k + 1];
            let a1 = grid.A[(k + 1, 1)];
            let b1 = grid.B[(k + 1, 1)];
            let j_surface = -(kf * a1 - kb * b1) / (1.0 + kf * ratio + kb * ratio);
            flux[k + 1] = j_surface;
            grid.A[(k + 1, 0)] = a1 + j_surface * ratio;
            grid.B[(k + 1, 0)] = b1 - j_surface * ratio;
        }

        let factor = -(p.n as f64) * p.F * p.area * CURRENT_UNIT_FACTOR;
        let current: Vec<f64> = flux.iter().map(|j| factor * j).collect();
        Ok((SolverOutput { flux, current }, grid))
    }
}
