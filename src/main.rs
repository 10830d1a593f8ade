use cairo_linker::cli::{Args, OutputFormat};
use cairo_linker::pipeline;
use clap::Parser;
use colored::Colorize;
use log::error;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = args.to_config();

    let outcome = pipeline::run(&args.roots, &config)?;

    let rendered = match args.format {
        OutputFormat::Json => outcome.report.to_json()?,
        OutputFormat::Yaml => outcome.report.to_yaml()?,
    };
    println!("{rendered}");

    if outcome.exit_code != 0 {
        error!("{}", "run completed with unresolved errors".red());
    }

    std::process::exit(outcome.exit_code);
}
