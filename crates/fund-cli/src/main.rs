//! Command-line interface for fund-pipeline
//!
//! ```bash
//! # Point at a running backend
//! export FUND_PIPELINE_HTTP_URL="http://localhost:8000"
//! export FUND_PIPELINE_WS_URL="ws://localhost:8000"
//!
//! # Inspect the parameters a saved mandate payload yields
//! cargo run -p fund-cli -- normalize criteria.json
//!
//! # Run all three stages from a mandate PDF
//! cargo run -p fund-cli -- run --mandate fund.pdf --out reports/
//! ```

mod table;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use fund_pipeline::{
    MandateClient, MandateCriteria, PipelineConfig, PipelineRunner, Stage, StageResult,
    StageStatus, WizardAction, write_risk_csv,
};
use fund_utils::LogFormat;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "fund-cli")]
#[command(about = "Run the sourcing, screening and risk analysis pipeline", long_about = None)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the parameter sets found in a saved mandate payload
    Normalize {
        /// JSON payload, e.g. a saved parsing result
        payload: PathBuf,
    },
    /// Run every stage with default selections and export the risk CSV
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Mandate PDF to upload and parse
    #[arg(long, conflicts_with = "criteria", required_unless_present = "criteria")]
    mandate: Option<PathBuf>,

    /// Query sent with the mandate
    #[arg(long, requires = "mandate")]
    query: Option<String>,

    /// Already parsed criteria payload
    #[arg(long)]
    criteria: Option<PathBuf>,

    /// Directory for the risk analysis CSV
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    fund_utils::init_tracing_with(format, "warn,fund_pipeline=info,fund_cli=info");

    match cli.command {
        Commands::Normalize { payload } => {
            let criteria = load_criteria(&payload)?;
            print_mandate(&criteria);
            Ok(())
        }
        Commands::Run(args) => run(args).await,
    }
}

fn load_criteria(path: &Path) -> anyhow::Result<MandateCriteria> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let payload = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    Ok(MandateCriteria::from_payload(payload))
}

fn print_mandate(criteria: &MandateCriteria) {
    println!("Fund: {}", criteria.fund_name().unwrap_or("-"));
    println!("Size: {}", criteria.fund_size().unwrap_or("-"));

    let initial = criteria.initial_parameters();
    for stage in Stage::ALL {
        println!("\n{stage} parameters");
        println!("{}", table::parameters(initial.for_stage(stage)));
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = PipelineConfig::from_env()?;

    let criteria = match (&args.mandate, &args.criteria) {
        (Some(pdf), _) => MandateClient::new(config.clone())?
            .intake(pdf, args.query.as_deref())
            .await
            .with_context(|| format!("failed to parse mandate {}", pdf.display()))?,
        (None, Some(path)) => load_criteria(path)?,
        (None, None) => bail!("either --mandate or --criteria is required"),
    };
    print_mandate(&criteria);

    let mut runner = PipelineRunner::new(config, criteria.initial_parameters());
    let outcome = run_stages(&mut runner, &args.out).await;
    runner.shutdown().await;
    outcome
}

async fn run_stages(runner: &mut PipelineRunner, out: &Path) -> anyhow::Result<()> {
    for stage in Stage::ALL {
        info!(stage = %stage, "running stage");
        runner.dispatch(WizardAction::Primary).await?;
        drive_interruptible(runner).await;

        match runner.session().status(stage) {
            StageStatus::Completed => {}
            StageStatus::NoResults => bail!("{stage} returned no results"),
            StageStatus::Failed(reason) => bail!("{stage} failed: {reason}"),
            StageStatus::Idle | StageStatus::Running => bail!("{stage} was interrupted"),
        }

        print_stage(runner, stage);
        if !stage.is_last() {
            runner.dispatch(WizardAction::Next).await?;
        }
    }

    if let Some(risk) = runner
        .session()
        .result(Stage::RiskAnalysis)
        .and_then(StageResult::as_risk)
    {
        std::fs::create_dir_all(out)
            .with_context(|| format!("failed to create {}", out.display()))?;
        let today = chrono::Local::now().date_naive();
        let path = write_risk_csv(out, risk, today)?;
        println!("\nRisk analysis written to {}", path.display());
    }
    Ok(())
}

/// Drive the live session; Ctrl-C cancels it
async fn drive_interruptible(runner: &mut PipelineRunner) {
    let Some(token) = runner.cancellation_token() else {
        return;
    };
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
    runner.drive().await;
    watcher.abort();
}

fn print_stage(runner: &PipelineRunner, stage: Stage) {
    let Some(result) = runner.session().result(stage) else {
        return;
    };
    println!("\n{stage}");
    match result {
        StageResult::Sourcing(r) => println!("{}", table::companies(&r.qualified)),
        StageResult::Screening(r) => {
            for line in &r.agent_thinking {
                println!("  > {}", line.lines().next().unwrap_or_default());
            }
            println!("{}", table::companies(&r.company_details));
        }
        StageResult::RiskAnalysis(r) => {
            println!("{}", table::risk(r));
            println!(
                "{} of {} companies passed, {} failed",
                r.summary.passed,
                r.summary.total,
                r.summary.failed()
            );
        }
    }
}
