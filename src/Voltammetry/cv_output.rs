//! # Output of CV runs
//!
//! Console tables for finished runs and the data handed over to an external plotting layer:
//! three views (potential-current, time-current, time-potential) with the annotated feature
//! points. Drawing itself happens outside this crate.
use super::CyclicVoltammetry::{CVError, CalibratedRun, PsiOutcome, RunResult};
use prettytable::{Table, row};
use serde::{Deserialize, Serialize};

/// Labelled point on a plot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub label: String,
    pub x: f64,
    pub y: f64,
}

impl Annotation {
    fn new(label: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            label: label.into(),
            x,
            y,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotView {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// potential axis is drawn decreasing to the right
    pub invert_x: bool,
    pub annotations: Vec<Annotation>,
}

/// Everything the plotting layer needs for one ψ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotData {
    pub psi: f64,
    pub converged: bool,
    pub regime: Option<String>,
    pub views: Vec<PlotView>,
}

impl RunResult {
    pub fn plot_views(&self) -> Vec<PlotView> {
        let f = &self.features;
        let cv = PlotView {
            title: format!("CV with psi of: {}", self.psi),
            x_label: "Potential (V)".to_string(),
            y_label: "Current (mA)".to_string(),
            x: self.potential.clone(),
            y: self.current.clone(),
            invert_x: true,
            annotations: vec![
                Annotation::new(format!("Epa = {} mV", (f.Epa * 1000.0) as i64), f.Epa, f.ipa),
                Annotation::new(format!("Epc = {} mV", (f.Epc * 1000.0) as i64), f.Epc, f.ipc),
                Annotation::new("E1/2", f.EpHALF, f.IpHALF),
                Annotation::new(
                    format!("Epc1/2 = {} mV", f.EpONEHALF_mV as i64),
                    f.EpONEHALF_mV / 1000.0,
                    f.IpONEHALF,
                ),
            ],
        };
        let transient = PlotView {
            title: format!("Peak Splitting: Epa-Epc = {} (mV)", f.Edif_mV as i64),
            x_label: "Time (s)".to_string(),
            y_label: "Current (mA)".to_string(),
            x: self.time.clone(),
            y: self.current.clone(),
            invert_x: false,
            annotations: vec![
                Annotation::new("ipa", f.tpa, f.ipa),
                Annotation::new("ipc", f.tpc, f.ipc),
                Annotation::new(
                    format!("Epc/2 = {} mV", (f.EpHALF * 1000.0) as i64),
                    f.tpHALF,
                    f.IpHALF,
                ),
            ],
        };
        let program = PlotView {
            title: format!(
                "Potential regime. Elambda - Ep1/2 = {} (mV)",
                f.difference2_mV as i64
            ),
            x_label: "Time (s)".to_string(),
            y_label: "Applied Potential (V)".to_string(),
            x: self.time.clone(),
            y: self.potential.clone(),
            invert_x: false,
            annotations: Vec::new(),
        };
        vec![cv, transient, program]
    }

    pub fn pretty_print(&self) {
        let d = &self.derived;
        let p = &self.params;
        let f = &self.features;

        println!("\n----- MODEL AND EXPERIMENTAL PARAMS ----");
        let mut table = Table::new();
        table.add_row(row!["Parameter", "Value", "Units"]);
        table.add_row(row!["psi", format!("{:.6}", d.psi_check), "-"]);
        table.add_row(row!["Scan rate (v)", format!("{:.6e}", d.v), "V/s"]);
        table.add_row(row!["Lambda", format!("{:.6}", d.Lambda), "-"]);
        table.add_row(row!["tk", format!("{:.6e}", d.tk), "s"]);
        table.add_row(row!["k0", format!("{:.6}", p.k0), "cm/s"]);
        table.add_row(row!["delx", format!("{:.6e}", d.delx), "cm"]);
        table.add_row(row!["delt", format!("{:.6e}", d.delt), "s"]);
        table.add_row(row!["Dm from other coeffs", format!("{:.4}", d.Dm_check), "-"]);
        table.printstd();

        println!("----- POTENTIAL AND CURRENT PARAMS ----");
        let mut table = Table::new();
        table.add_row(row!["Quantity", "Value", "Units"]);
        table.add_row(row!["Reversal potential", format!("{:.1}", f.revPot_mV), "mV"]);
        table.add_row(row!["ipa", format!("{:.6e}", f.ipa), "mA"]);
        table.add_row(row!["ipc", format!("{:.6e}", f.ipc), "mA"]);
        table.add_row(row!["ipeak (Randles-Sevcik)", format!("{:.6e}", f.ipeak_RS), "mA"]);
        table.add_row(row!["Epa", format!("{}", (f.Epa * 1000.0) as i64), "mV"]);
        table.add_row(row!["Epc", format!("{}", (f.Epc * 1000.0) as i64), "mV"]);
        table.add_row(row!["Edif", format!("{:.2}", f.Edif_mV), "mV"]);
        table.add_row(row!["Ep1/2", format!("{:.2}", f.EpONEHALF_mV), "mV"]);
        table.add_row(row!["Elambda - Ep1/2", format!("{:.2}", f.difference2_mV), "mV"]);
        table.add_row(row![
            "Ei / Ef",
            format!("{} / {}", (p.Ei * 1000.0) as i64, (p.Ef * 1000.0) as i64),
            "mV"
        ]);
        table.printstd();
    }
}

impl CalibratedRun {
    pub fn plot_data(&self) -> PlotData {
        PlotData {
            psi: self.run.psi,
            converged: true,
            regime: Some(self.regime.to_string()),
            views: self.run.plot_views(),
        }
    }

    pub fn pretty_print(&self) {
        println!(
            "############################ CASTING PSI: {} ############################",
            self.run.derived.psi_check
        );
        println!("{}", self.regime);
        println!("iterations: {}", self.iterations);
        self.run.pretty_print();
    }
}

impl PsiOutcome {
    /// Plot payload of an accepted run or of a best-effort run
    pub fn plot_data(&self) -> Option<PlotData> {
        match &self.result {
            Ok(calibrated) => Some(calibrated.plot_data()),
            Err(_) => self.run().map(|run| PlotData {
                psi: run.psi,
                converged: false,
                regime: None,
                views: run.plot_views(),
            }),
        }
    }
}

/// One row per ψ: status, regime and main features
pub fn summary_table(outcomes: &[PsiOutcome]) -> Table {
    let mut table = Table::new();
    table.add_row(row![
        "psi", "Status", "Regime", "Iterations", "Ef (mV)", "ipc (mA)", "ipa (mA)", "Edif (mV)"
    ]);
    for outcome in outcomes {
        match &outcome.result {
            Ok(c) => {
                let f = &c.run.features;
                table.add_row(row![
                    outcome.psi,
                    "converged",
                    c.regime.to_string(),
                    c.iterations,
                    format!("{:.1}", f.revPot_mV),
                    format!("{:.4e}", f.ipc),
                    format!("{:.4e}", f.ipa),
                    format!("{:.1}", f.Edif_mV)
                ]);
            }
            Err(CVError::NotConverged {
                iterations,
                best_effort,
                ..
            }) => {
                let f = &best_effort.features;
                table.add_row(row![
                    outcome.psi,
                    "not converged",
                    "-",
                    iterations,
                    format!("{:.1}", f.revPot_mV),
                    format!("{:.4e}", f.ipc),
                    format!("{:.4e}", f.ipa),
                    format!("{:.1}", f.Edif_mV)
                ]);
            }
            Err(e) => {
                table.add_row(row![outcome.psi, "failed", e.to_string(), "-", "-", "-", "-", "-"]);
            }
        }
    }
    table
}

/// JSON array with the plot payload of every ψ that produced a run
pub fn plot_data_json(outcomes: &[PsiOutcome]) -> Result<String, CVError> {
    let data: Vec<PlotData> = outcomes.iter().filter_map(|o| o.plot_data()).collect();
    Ok(serde_json::to_string_pretty(&data)?)
}
