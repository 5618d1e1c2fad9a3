//! # Cyclic Voltammetry Module
//!
//! This module simulates cyclic voltammetry (CV) of a one-electron redox couple `A + e <=> B`
//! by an explicit finite-difference solution of the diffusion equations for both species with a
//! kinetic (Butler-Volmer) flux boundary condition at the electrode surface.
//!
//! ## Nomenclature
//!
//! | Symbol | Description | Units |
//! |--------|-------------|-------|
//! | `ψ` | Dimensionless intrinsic rate parameter | - |
//! | `Λ` | Ratio of charge transfer rate to mass transfer rate | - |
//! | `k0` | Standard heterogeneous rate constant | cm/s |
//! | `D` | Diffusion coefficient (equal for A and B) | cm²/s |
//! | `α` | Transfer coefficient | - |
//! | `v` | Scan rate | V/s |
//! | `f` | Normalized Faraday constant `F/(RT)` | 1/V |
//! | `Dm` | Model diffusion coefficient `D·Δt/Δx²` | - |
//! | `Ei`, `Ef` | Initial and reversal potentials | V |
//!
//! ## Governing Equations
//!
//! ```text
//! v   = (k0/ψ)² / (π·D·f)
//! Λ   = k0 / (D·f·v)^(1/2)
//! C[k+1][j] = C[k][j] + Dm·(C[k][j-1] - 2·C[k][j] + C[k][j+1])
//! J   = -(kf·A[1] - kb·B[1]) / (1 + kf·Δx/D + kb·Δx/D)
//! A[0] = A[1] + J·Δx/D,  B[0] = B[1] - J·Δx/D
//! kf  = k0·exp(-α·n·f·η),  kb = k0·exp((1-α)·n·f·η)
//! ```
//!
//! ## Workflow
//!
//! For every ψ the calibration loop builds the waveform, runs the solver, extracts the peak
//! features and compares `Eλ - Ep/2` with Nicholson's `-141/n` mV. If the residual is out of
//! tolerance the reversal potential is moved by one millivolt and the run is repeated, up to an
//! explicit iteration cap. An accepted run is classified into a kinetic regime (Bard p. 239).
//!
//! ## Stability
//!
//! The explicit scheme is stable for `Dm <= 0.5`. The solver checks this bound and refuses to
//! run otherwise, it never adjusts `Dm` by itself.

pub mod CyclicVoltammetry;
pub mod cv_features;
pub mod cv_output;
pub mod cv_params;
pub mod diffusion_solver;
pub mod waveform;
