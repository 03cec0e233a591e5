use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use underwriter_core::{
    render_report, BusinessType, CaseRepository, Classification, Eligibility, FileCaseRepository,
    HeuristicNarrativeProvider, OutputFormat, Report, UnderwritingCase, Underwriter,
    UnderwritingConfig,
};

#[derive(Parser, Debug)]
#[command(
    name = "underwriter",
    author,
    version,
    about = "Restaurant insurance underwriting risk engine"
)]
struct Cli {
    /// Directory containing the case files (business.json, reviews.json, images.json)
    #[arg(
        long = "case-dir",
        value_name = "DIR",
        default_value = "./cases/sample",
        global = true
    )]
    case_dir: PathBuf,

    /// Optional configuration file (YAML, TOML or JSON) overriding the built-in tables
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full pipeline and print the underwriting report
    Assess {
        /// Emit the report as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
        /// Attach a narrative (executive summary, findings, coverage recommendations)
        #[arg(long)]
        with_narrative: bool,
    },
    /// Print the class-code decision with per-family scores
    Classify {
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration as YAML
    ShowConfig,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let command = cli.command.unwrap_or(Commands::Assess {
        json: false,
        with_narrative: false,
    });
    match command {
        Commands::Assess {
            json,
            with_narrative,
        } => assess(&cli.case_dir, config, json, with_narrative).await?,
        Commands::Classify { json } => classify(&cli.case_dir, config, json).await?,
        Commands::ShowConfig => print!("{}", serde_yaml::to_string(&config)?),
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<UnderwritingConfig> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path).required(true));
    }
    let settings = builder
        .add_source(
            config::Environment::with_prefix("UNDERWRITER")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("failed to load configuration sources")?;
    let config: UnderwritingConfig = settings
        .try_deserialize()
        .context("failed to parse underwriting configuration")?;
    config
        .validate()
        .context("underwriting configuration is invalid")?;
    Ok(config)
}

async fn load_case(case_dir: &Path) -> Result<UnderwritingCase> {
    debug!(case_dir = %case_dir.display(), "loading case");
    let repo = FileCaseRepository::new(case_dir);
    repo.load_case()
        .await
        .with_context(|| format!("failed to load case from {}", case_dir.display()))
}

async fn assess(
    case_dir: &Path,
    config: UnderwritingConfig,
    json: bool,
    with_narrative: bool,
) -> Result<()> {
    let case = load_case(case_dir).await?;
    let underwriter = Underwriter::new(config)?;
    let report = if with_narrative {
        underwriter
            .underwrite_enriched(&case, &HeuristicNarrativeProvider)
            .await
    } else {
        underwriter.underwrite(&case)
    };

    if json {
        println!("{}", render_report(&report, OutputFormat::Json)?);
        return Ok(());
    }
    println!("{}", verdict_banner(&report));
    println!();
    print!("{}", render_report(&report, OutputFormat::Human)?);
    Ok(())
}

fn verdict_banner(report: &Report) -> String {
    let risk = &report.risk_assessment;
    let text = format!(
        "{} • {} risk • class {}",
        risk.eligibility, risk.risk_level, risk.primary_class_code
    );
    match risk.eligibility {
        Eligibility::Eligible => text.green().bold().to_string(),
        Eligibility::NeedsReview => text.yellow().bold().to_string(),
        Eligibility::Ineligible => text.red().bold().to_string(),
    }
}

async fn classify(case_dir: &Path, config: UnderwritingConfig, json: bool) -> Result<()> {
    let case = load_case(case_dir).await?;
    let classification = Underwriter::new(config)?.classify(&case);
    if json {
        println!("{}", serde_json::to_string_pretty(&classification)?);
        return Ok(());
    }
    print_classification(&case.business.name, &classification);
    Ok(())
}

fn print_classification(name: &str, classification: &Classification) {
    println!(
        "{} {} ({}) for {}",
        "Class code".bold(),
        classification.class_code,
        classification.class_code.description(),
        name
    );
    let scores = &classification.scores;
    println!(
        "  Scores: nightclub {} • bar {} • fast food {} • restaurant {}",
        scores.nightclub, scores.bar, scores.fast_food, scores.restaurant
    );
    if let Some(demoted) = classification.demoted_from {
        println!(
            "  Demoted from {} (score {} below its minimum)",
            business_type_label(demoted),
            classification.winning_score
        );
    }
}

fn business_type_label(business_type: BusinessType) -> &'static str {
    match business_type {
        BusinessType::Nightclub => "nightclub",
        BusinessType::Bar => "bar",
        BusinessType::FastFood => "fast food",
        BusinessType::Restaurant => "restaurant",
    }
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tokio=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
