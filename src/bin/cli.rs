//! RepoJudge CLI
//!
//! Run a one-shot analysis locally (no server, no database) or submit a
//! CSV batch to a running server.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::sync::Arc;

use repojudge::pipeline::{NullProgress, PipelineRunner};
use repojudge::Config;

#[derive(Parser)]
#[command(name = "repojudge", version, about = "Repository quality scorecard")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze one repository (URL or local path) and print the report
    Analyze {
        /// Repository URL or local working-copy path
        target: String,

        /// Print the full report as JSON instead of the summary table
        #[arg(long)]
        json: bool,
    },

    /// Submit a CSV of submissions (teamName, repoUrl) to a running server
    SubmitBatch {
        /// Path to the CSV file
        csv: std::path::PathBuf,

        /// Server base URL
        #[arg(long, default_value = "http://localhost:8000")]
        server: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Analyze { target, json } => analyze(&target, json).await,
        Command::SubmitBatch { csv, server } => submit_batch(&csv, &server).await,
    }
}

async fn analyze(target: &str, as_json: bool) -> anyhow::Result<()> {
    let config = Config::from_env();
    let runner = PipelineRunner::new(config, Arc::new(NullProgress));

    println!("{} {}", "Analyzing".cyan().bold(), target);
    let report = runner.run(target).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let total = repojudge::calculate_total_score(&report.scores);
    println!();
    println!("{}", "Scores".bold().underline());
    let rows = [
        ("Originality", report.scores.originality),
        ("Quality", report.scores.quality),
        ("Security", report.scores.security),
        ("Effort", report.scores.effort),
        ("Implementation", report.scores.implementation),
        ("Engineering", report.scores.engineering),
        ("Organization", report.scores.organization),
        ("Documentation", report.scores.documentation),
    ];
    for (label, value) in rows {
        println!("  {:<16} {}", label, format_score(value));
    }
    println!("  {:<16} {}", "Total".bold(), format_score(total));

    if let Some(stack) = &report.stack {
        println!();
        println!("{} {}", "Stack:".bold(), stack.join(", "));
    }
    if let Some(judge) = &report.judge {
        println!("{} {}", "Verdict:".bold(), judge.verdict);
    }
    if !report.files.is_empty() {
        println!();
        println!("{}", "Flagged files".bold().underline());
        for file in report.files.iter().take(10) {
            println!(
                "  {:<40} risk {:>5.1}%  ai {:>5.1}%  plag {:>5.1}%",
                file.name, file.risk_pct, file.ai_pct, file.plag_pct
            );
        }
    }
    Ok(())
}

fn format_score(value: f64) -> colored::ColoredString {
    let text = format!("{value:>6.1}");
    if value >= 75.0 {
        text.green()
    } else if value >= 40.0 {
        text.yellow()
    } else {
        text.red()
    }
}

async fn submit_batch(csv_path: &std::path::Path, server: &str) -> anyhow::Result<()> {
    let bytes = std::fs::read(csv_path)?;
    let file_name = csv_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "batch.csv".to_string());

    let part = reqwest::multipart::Part::bytes(bytes)
        .file_name(file_name)
        .mime_str("text/csv")?;
    let form = reqwest::multipart::Form::new().part("file", part);

    let response = reqwest::Client::new()
        .post(format!("{server}/api/batch-upload"))
        .multipart(form)
        .send()
        .await?;

    let status = response.status();
    let body: serde_json::Value = response.json().await?;
    if status.is_success() {
        println!("{} {}", "Batch accepted:".green().bold(), body);
    } else {
        println!("{} {} {}", "Batch rejected:".red().bold(), status, body);
    }
    Ok(())
}
