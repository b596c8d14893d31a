use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use owo_colors::OwoColorize;
use paradox_core::{
    AggregateReport, Cohort, SentencePolicy, SimulationConfig, TrialOutcome, run_single_trial,
    run_trial_aggregate,
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "paradox",
    version,
    about = "Monte Carlo simulator of cumulative incarceration for two cohorts arrested at different rates"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one trial and print the per-year cumulative sentence series.
    Single {
        #[command(flatten)]
        params: SimulationArgs,
    },
    /// Run many trials and print per-year means with standard deviations.
    Aggregate {
        #[command(flatten)]
        params: SimulationArgs,
        /// Number of independent trials to aggregate.
        #[arg(long, default_value_t = paradox_core::DEFAULT_TRIALS)]
        trials: usize,
    },
}

#[derive(Args, Debug)]
struct SimulationArgs {
    /// Comparison-cohort arrest rate as a percentage (0-100).
    #[arg(long, default_value_t = 1.0)]
    comparison_rate: f64,
    /// Target-cohort arrest rate as a percentage (0-100).
    #[arg(long, default_value_t = 7.0)]
    target_rate: f64,
    /// Sentence in years for a first offense (0-10).
    #[arg(long, default_value_t = 0.0)]
    first: f64,
    /// Sentence in years for a second offense (0-10).
    #[arg(long, default_value_t = 0.5)]
    second: f64,
    /// Sentence in years for a third or later offense (0-10).
    #[arg(long, default_value_t = 3.0)]
    third: f64,
    /// Number of people in each cohort.
    #[arg(long, default_value_t = paradox_core::DEFAULT_POPULATION_SIZE)]
    population: usize,
    /// Number of simulated years per trial.
    #[arg(long, default_value_t = paradox_core::DEFAULT_HORIZON)]
    horizon: u32,
    /// RNG seed for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,
    /// Emit results as JSON instead of tables.
    #[arg(long)]
    json: bool,
}

impl SimulationArgs {
    /// Rates arrive as percentages; the core works in fractions.
    fn to_config(&self) -> SimulationConfig {
        SimulationConfig {
            comparison_rate: self.comparison_rate / 100.0,
            target_rate: self.target_rate / 100.0,
            policy: SentencePolicy {
                first: self.first,
                second: self.second,
                third: self.third,
            },
            population_size: self.population,
            horizon: self.horizon,
            rng_seed: self.seed,
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Single { params } => run_single(&params),
        Command::Aggregate { params, trials } => run_aggregate(&params, trials),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn run_single(params: &SimulationArgs) -> Result<()> {
    let config = params.to_config();
    info!(
        population = config.population_size,
        horizon = config.horizon,
        "running single trial"
    );
    let outcome = run_single_trial(&config).context("invalid simulation configuration")?;

    if params.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    print_series_table(&outcome);
    print_cohort_summary(&outcome.comparison);
    print_cohort_summary(&outcome.target);
    Ok(())
}

fn run_aggregate(params: &SimulationArgs, trials: usize) -> Result<()> {
    let config = params.to_config();
    info!(
        trials,
        population = config.population_size,
        horizon = config.horizon,
        "running trial aggregate"
    );
    let report =
        run_trial_aggregate(&config, trials).context("invalid simulation configuration")?;
    let ratio = report.disparity_ratio();

    if params.json {
        let payload = serde_json::json!({
            "report": report,
            "disparity_ratio": ratio.as_ref().ok(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    print_stats_table(&report);
    match ratio {
        Ok(ratio) => {
            println!();
            println!(
                "For every year served by the {} cohort, the {} cohort serves {} years.",
                "comparison".blue().bold(),
                "target".red().bold(),
                format!("{ratio:.1}").bold()
            );
        }
        Err(err) => {
            warn!(%err, "disparity ratio unavailable");
            println!();
            println!("{} {err}", "disparity ratio unavailable:".yellow().bold());
        }
    }
    Ok(())
}

fn print_series_table(outcome: &TrialOutcome) {
    println!(
        "{:>4}  {:>12}  {:>12}",
        "YEAR".bold().cyan(),
        "COMPARISON".bold().cyan(),
        "TARGET".bold().cyan()
    );
    println!("{}", "-".repeat(32).dimmed());
    let rows = outcome
        .comparison_series
        .iter()
        .zip(&outcome.target_series)
        .enumerate();
    for (idx, (comparison, target)) in rows {
        println!("{:>4}  {comparison:>12}  {target:>12}", idx + 1);
    }
}

fn print_cohort_summary(cohort: &Cohort) {
    let arrested = cohort.members().iter().filter(|p| p.arrests > 0).count();
    let arrests: u64 = cohort
        .members()
        .iter()
        .map(|p| u64::from(p.arrests))
        .sum();
    println!(
        "{} cohort: {arrested}/{} people arrested at least once, {arrests} arrests, {} sentence-years served",
        cohort.label().as_str().bold(),
        cohort.len(),
        cohort.total_sentence_served()
    );
}

fn print_stats_table(report: &AggregateReport) {
    println!(
        "{:>4}  {:>20}  {:>20}",
        "YEAR".bold().cyan(),
        "COMPARISON mean±sd".bold().cyan(),
        "TARGET mean±sd".bold().cyan()
    );
    println!("{}", "-".repeat(48).dimmed());
    let rows = report
        .comparison
        .means
        .iter()
        .zip(&report.comparison.std_devs)
        .zip(report.target.means.iter().zip(&report.target.std_devs))
        .enumerate();
    for (idx, ((c_mean, c_sd), (t_mean, t_sd))) in rows {
        println!(
            "{:>4}  {:>20}  {:>20}",
            idx + 1,
            format!("{c_mean:.1} ± {c_sd:.1}"),
            format!("{t_mean:.1} ± {t_sd:.1}")
        );
    }
    println!("({} trials)", report.trials);
}
