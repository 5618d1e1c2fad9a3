use crate::Voltammetry::CyclicVoltammetry::{CVError, CVTask, PsiOutcome};
use crate::Voltammetry::cv_output::{plot_data_json, summary_table};
use crate::Voltammetry::cv_params::SimulationParameters;
use std::io::{self, Write};
use std::path::Path;

/// Options given on the command line
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CliOptions {
    pub psi: Vec<f64>,
    pub config: Option<String>,
    pub max_iterations: Option<usize>,
    pub json: bool,
}

pub const USAGE: &str = "usage: CyVolt [--psi <psi>...] [--config <file.json>] [--max-iter <N>] [--json]
  without arguments an interactive menu is started";

/// `--psi 0.1 1 20 --config params.json --max-iter 200 --json`
pub fn parse_args(args: &[String]) -> Result<CliOptions, String> {
    let mut options = CliOptions::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--psi" => {
                i += 1;
                while i < args.len() && !args[i].starts_with("--") {
                    let psi: f64 = args[i]
                        .parse()
                        .map_err(|_| format!("invalid psi value: {}", args[i]))?;
                    options.psi.push(psi);
                    i += 1;
                }
                continue;
            }
            "--config" => {
                let path = args
                    .get(i + 1)
                    .ok_or_else(|| "--config needs a file name".to_string())?;
                options.config = Some(path.clone());
                i += 1;
            }
            "--max-iter" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| "--max-iter needs a number".to_string())?;
                let max_iterations: usize = value
                    .parse()
                    .map_err(|_| format!("invalid number of iterations: {}", value))?;
                options.max_iterations = Some(max_iterations);
                i += 1;
            }
            "--json" => options.json = true,
            other => return Err(format!("unknown argument: {}\n{}", other, USAGE)),
        }
        i += 1;
    }
    Ok(options)
}

impl CliOptions {
    /// Parameters from the config file (or defaults) with command line overrides applied
    pub fn task(&self) -> Result<CVTask, CVError> {
        let mut params = match &self.config {
            Some(path) => SimulationParameters::from_file(path)?,
            None => SimulationParameters::default(),
        };
        if let Some(max_iterations) = self.max_iterations {
            params.max_iterations = max_iterations;
        }
        let mut task = CVTask {
            params,
            ..CVTask::default()
        };
        if !self.psi.is_empty() {
            task.psi = self.psi.clone();
        }
        if let Some(name) = self
            .config
            .as_deref()
            .and_then(|path| Path::new(path).file_stem())
        {
            task.set_problem_name(&name.to_string_lossy());
        }
        task.check_task()?;
        Ok(task)
    }
}

pub fn run_from_args(args: &[String]) -> Result<(), String> {
    let options = parse_args(args)?;
    let task = options.task().map_err(|e| e.to_string())?;
    let outcomes = task.run_all();
    if options.json {
        let json = plot_data_json(&outcomes).map_err(|e| e.to_string())?;
        println!("{}", json);
    } else {
        report(&task.header(), &outcomes);
    }
    Ok(())
}

fn report(header: &str, outcomes: &[PsiOutcome]) {
    for outcome in outcomes {
        match &outcome.result {
            Ok(calibrated) => calibrated.pretty_print(),
            Err(CVError::NotConverged { best_effort, .. }) => {
                println!("\npsi = {}: best effort run, not converged", outcome.psi);
                best_effort.pretty_print();
            }
            Err(e) => println!("\npsi = {}: {}", outcome.psi, e),
        }
    }
    println!("\n----- SUMMARY: {} ----", header);
    summary_table(outcomes).printstd();
}

pub fn run_interactive_menu() {
    loop {
        show_main_menu();
        let choice = match get_user_input() {
            Ok(choice) => choice,
            Err(e) => {
                println!("Error: {}", e);
                break;
            }
        };

        match choice.trim() {
            "1" => {
                let task = CVTask::default();
                report(&task.header(), &task.run_all());
            }
            "2" => {
                if let Err(e) = run_entered_psi() {
                    println!("Error: {}", e);
                }
            }
            "3" => show_default_parameters(),
            "0" => {
                println!("Goodbye!");
                break;
            }
            _ => println!("Invalid choice. Please try again."),
        }
    }
}
/* colors
Blue (\x1b[34m) - header
Yellow (\x1b[33m) - menu options
Cyan (\x1b[36m) - prompt
*/
fn show_main_menu() {
    println!(
        "\x1b[34m\n CyVolt: cyclic voltammetry of a one-step redox couple\n
    explicit finite differences, Nicholson calibration of the reversal potential \n \x1b[0m"
    );
    println!("\x1b[33m1. Run default psi set (0.1, 1, 20)\x1b[0m");
    println!("\x1b[33m2. Enter psi values\x1b[0m");
    println!("\x1b[33m3. Show default parameters\x1b[0m");
    println!("\x1b[33m0. Exit\x1b[0m");
    print!("\x1b[36mEnter your choice: \x1b[0m");
    let _ = io::stdout().flush();
}

fn get_user_input() -> Result<String, String> {
    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .map_err(|e| format!("Failed to read input: {}", e))?;
    Ok(input)
}

fn run_entered_psi() -> Result<(), String> {
    print!("Enter psi values separated by spaces: ");
    let _ = io::stdout().flush();
    let input = get_user_input()?;
    let psi = parse_psi_list(&input)?;
    let task = CVTask::new(SimulationParameters::default(), psi);
    task.check_task().map_err(|e| e.to_string())?;
    report(&task.header(), &task.run_all());
    Ok(())
}

fn parse_psi_list(input: &str) -> Result<Vec<f64>, String> {
    let psi = input
        .split_whitespace()
        .map(|s| s.parse::<f64>().map_err(|_| format!("invalid psi value: {}", s)))
        .collect::<Result<Vec<f64>, String>>()?;
    if psi.is_empty() {
        return Err("no psi values given".to_string());
    }
    Ok(psi)
}

fn show_default_parameters() {
    let params = SimulationParameters::default();
    match serde_json::to_string_pretty(&params) {
        Ok(json) => println!("{}", json),
        Err(e) => println!("Error: {}", e),
    }
}
