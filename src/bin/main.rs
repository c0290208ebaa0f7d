use clap::Parser;
use finops_agent_router::{build_components, AppConfig, ReportOutcome};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "finops", about = "Route one financial question to the specialist responders")]
struct Cli {
    /// The question, e.g. "VaR for $50,000 portfolio"
    query: String,

    /// Print the full report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout stays clean for the report
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    let components = build_components(&config)?;

    info!(query = %cli.query, "Running query");
    let report = components.orchestrator.handle(&cli.query).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("\n=== FINOPS REPORT ===");
        println!(
            "Agents: {}",
            report
                .domains_invoked
                .iter()
                .map(|d| d.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!("Outcome: {:?}\n", report.outcome());
        if report.combined_text.is_empty() {
            for error in &report.errors {
                println!("{}", error);
            }
        } else {
            println!("{}", report.combined_text);
        }
    }

    if report.outcome() == ReportOutcome::Failed {
        std::process::exit(1);
    }
    Ok(())
}
