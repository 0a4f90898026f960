use airq_processor::cli::{args::Args, commands};
use clap::Parser;
use std::process;

fn main() {
    let args = Args::parse();

    // No subcommand: print an overview instead of an error
    if args.command.is_none() {
        show_help_and_commands();
        process::exit(0);
    }

    match commands::run(args) {
        Ok(_stats) => {
            // Stats were already reported by the command
            process::exit(0);
        }
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}

/// Overview shown when the binary is invoked without a subcommand
fn show_help_and_commands() {
    println!("airq-processor - Brazilian Air Quality Data Pipeline");
    println!("====================================================");
    println!();
    println!("Standardizes hourly measurements from Brazilian state monitoring");
    println!("networks and evaluates them against the CONAMA 506/2024 standards.");
    println!();
    println!("USAGE:");
    println!("    airq-processor <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    standardize       Standardize raw state CSV exports into Parquet");
    println!("    violations        Aggregate and flag CONAMA limit exceedances");
    println!("    synchronicity     Spatial synchronicity radii of violation events");
    println!("    trend-series      Completeness-gated monthly series for trend tests");
    println!("    seasonality       Markham seasonality indices and monthly summaries");
    println!("    operating-range   First/last valid measurement per station");
    println!("    help              Show this help message or help for a command");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help        Show help information");
    println!("    -V, --version     Show version information");
    println!("    -q, --quiet       Suppress progress bars and summaries");
    println!("        --log-level   Log level (error, warn, info, debug, trace)");
    println!();
    println!("EXAMPLES:");
    println!("    airq-processor standardize -i raw_data -c coords.csv -o standardized");
    println!("    airq-processor violations -i standardized -l limits.csv -o violations");
    println!("    airq-processor synchronicity -i violations -o sc --window-hours 24");
    println!();
    println!("Run 'airq-processor help <command>' for details on a command.");
}
