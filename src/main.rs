use CyVolt::cli::cli_main::{run_from_args, run_interactive_menu};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

pub fn main() {
    if let Err(e) = TermLogger::init(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ) {
        eprintln!("logger was not initialized: {}", e);
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        run_interactive_menu();
        return;
    }
    if let Err(e) = run_from_args(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
