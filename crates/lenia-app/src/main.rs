use anyhow::Result;
use clap::Parser;
use lenia_app::{Cli, RunReport, execute};
use lenia_core::Classification;
use owo_colors::OwoColorize;

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let report = execute(&cli)?;
    if cli.print_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn print_report(report: &RunReport) {
    let tag = report.result.classification.as_str();
    let tag = match report.result.classification {
        Classification::Died => tag.red().to_string(),
        Classification::Lived => tag.green().to_string(),
        Classification::Unstable => tag.yellow().to_string(),
        Classification::TimedOut => tag.magenta().to_string(),
    };
    println!(
        "{} {}D run: {} after {} frames (peak {} cells, peak mass {:.3})",
        "lenia".bold().cyan(),
        report.dimension,
        tag,
        report.result.actual_frame_count,
        report.peak_cells,
        report.peak_mass
    );
    if let Some(dir) = &report.output_dir {
        println!("{} {}", "frames:".dimmed(), dir.display());
    }
}
