//! Core engine for the sentencing-disparity Monte Carlo simulation.
//!
//! Two cohorts of identical size are subjected to different per-year arrest
//! rates under a shared sentence-escalation policy. A [`Trial`] advances both
//! cohorts year by year and records cumulative sentence-years served;
//! [`run_trial_aggregate`] replicates trials to estimate the per-year mean and
//! spread of those series.

use rand::{Rng, SeedableRng, rngs::SmallRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Default number of people per cohort (one 10×10 grid's worth).
pub const DEFAULT_POPULATION_SIZE: usize = 100;
/// Default number of simulated years per trial.
pub const DEFAULT_HORIZON: u32 = 20;
/// Default trial count for aggregate runs.
pub const DEFAULT_TRIALS: usize = 1_000;

/// Upper bound accepted for any configured sentence duration, in years.
const MAX_SENTENCE_YEARS: f64 = 10.0;

/// Identifies which of the two simulated cohorts a value refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CohortLabel {
    /// Baseline cohort arrested at the lower rate.
    Comparison,
    /// Cohort subjected to the elevated arrest rate.
    Target,
}

impl CohortLabel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Comparison => "comparison",
            Self::Target => "target",
        }
    }
}

impl fmt::Display for CohortLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised when validating simulation parameters.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// An arrest rate fell outside the unit interval.
    #[error("{cohort} cohort arrest rate {rate} is outside [0, 1]")]
    RateOutOfRange { cohort: CohortLabel, rate: f64 },
    /// A sentence duration fell outside the accepted range.
    #[error("{offense} offense sentence of {years} years is outside [0, 10]")]
    DurationOutOfRange { offense: &'static str, years: f64 },
    #[error("population size must be at least 1")]
    EmptyPopulation,
    #[error("horizon must be at least 1 year")]
    ZeroHorizon,
    #[error("trial count must be at least 1")]
    ZeroTrials,
}

/// Errors raised when deriving the disparity ratio from an aggregate report.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DisparityError {
    /// The comparison cohort served no sentence-years, so the ratio is undefined.
    #[error("comparison cohort mean at the final year is zero; disparity ratio is undefined")]
    ZeroBaseline,
    #[error("aggregate report contains no recorded years")]
    EmptySeries,
}

/// Unit-square placement handed to external renderers; inert in the simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    fn random(rng: &mut SmallRng) -> Self {
        Self {
            x: rng.random::<f32>(),
            y: rng.random::<f32>(),
        }
    }
}

/// Per-person simulation state.
///
/// `sentence_remaining` is a float because configured durations may be
/// fractional (e.g. half a year); it may dip below zero after a decrement and
/// counts as inactive once it is no longer positive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    /// Cumulative arrest count, non-decreasing within a trial.
    pub arrests: u32,
    /// Whole years served so far, non-decreasing within a trial.
    pub sentence_served: u32,
    /// Years left on the current sentence; ≤ 0 means no active sentence.
    pub sentence_remaining: f64,
    /// Presentation-only placement retained for external rendering.
    pub position: Position,
}

impl Person {
    fn spawn(rng: &mut SmallRng) -> Self {
        Self {
            position: Position::random(rng),
            ..Self::default()
        }
    }

    /// A person can be arrested only while no sentence is active.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        self.sentence_remaining <= 0.0
    }

    fn record_arrest(&mut self, policy: &SentencePolicy) {
        self.arrests += 1;
        self.sentence_remaining = policy.sentence_for(self.arrests);
    }
}

/// Maps a cumulative arrest count to the sentence assigned for that arrest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentencePolicy {
    /// Sentence in years for a first offense.
    pub first: f64,
    /// Sentence in years for a second offense.
    pub second: f64,
    /// Sentence in years for a third or later offense.
    pub third: f64,
}

impl Default for SentencePolicy {
    fn default() -> Self {
        Self {
            first: 0.0,
            second: 0.5,
            third: 3.0,
        }
    }
}

impl SentencePolicy {
    /// Sentence length for the arrest that produced `arrest_count`.
    ///
    /// Only meaningful for counts ≥ 1; arrests are the sole caller.
    #[must_use]
    pub fn sentence_for(&self, arrest_count: u32) -> f64 {
        match arrest_count {
            0 | 1 => self.first,
            2 => self.second,
            _ => self.third,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (offense, years) in [
            ("first", self.first),
            ("second", self.second),
            ("third", self.third),
        ] {
            if !years.is_finite() || !(0.0..=MAX_SENTENCE_YEARS).contains(&years) {
                return Err(ConfigError::DurationOutOfRange { offense, years });
            }
        }
        Ok(())
    }
}

/// Static configuration for a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Comparison-cohort arrest rate as a fraction in [0, 1].
    pub comparison_rate: f64,
    /// Target-cohort arrest rate as a fraction in [0, 1].
    pub target_rate: f64,
    /// Sentence durations applied to both cohorts.
    pub policy: SentencePolicy,
    /// Number of people in each cohort.
    pub population_size: usize,
    /// Number of simulated years per trial.
    pub horizon: u32,
    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            comparison_rate: 0.01,
            target_rate: 0.07,
            policy: SentencePolicy::default(),
            population_size: DEFAULT_POPULATION_SIZE,
            horizon: DEFAULT_HORIZON,
            rng_seed: None,
        }
    }
}

impl SimulationConfig {
    /// Validates every parameter, rejecting out-of-range values outright.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (cohort, rate) in [
            (CohortLabel::Comparison, self.comparison_rate),
            (CohortLabel::Target, self.target_rate),
        ] {
            if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
                return Err(ConfigError::RateOutOfRange { cohort, rate });
            }
        }
        self.policy.validate()?;
        if self.population_size == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        if self.horizon == 0 {
            return Err(ConfigError::ZeroHorizon);
        }
        Ok(())
    }

    /// Arrest rate for the given cohort.
    #[must_use]
    pub const fn rate_for(&self, label: CohortLabel) -> f64 {
        match label {
            CohortLabel::Comparison => self.comparison_rate,
            CohortLabel::Target => self.target_rate,
        }
    }

    /// Returns the configured RNG seed, generating one from entropy if absent.
    fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}

/// Fixed-size cohort of people, mutated in place as the trial advances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cohort {
    label: CohortLabel,
    members: Vec<Person>,
}

impl Cohort {
    fn new(label: CohortLabel, size: usize, rng: &mut SmallRng) -> Self {
        Self {
            label,
            members: (0..size).map(|_| Person::spawn(rng)).collect(),
        }
    }

    #[must_use]
    pub const fn label(&self) -> CohortLabel {
        self.label
    }

    #[must_use]
    pub fn members(&self) -> &[Person] {
        &self.members
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Number of members with no active sentence.
    #[must_use]
    pub fn eligible_count(&self) -> usize {
        self.members.iter().filter(|p| p.is_eligible()).count()
    }

    /// Sum of whole years served across the cohort.
    #[must_use]
    pub fn total_sentence_served(&self) -> u64 {
        self.members
            .iter()
            .map(|p| u64::from(p.sentence_served))
            .sum()
    }

    /// One year's arrests: `round(rate × eligible)` distinct members drawn
    /// uniformly without replacement from the eligible pool.
    ///
    /// Returns the number of arrests made.
    fn apply_arrests(&mut self, rate: f64, policy: &SentencePolicy, rng: &mut SmallRng) -> usize {
        let mut pool: Vec<usize> = (0..self.members.len())
            .filter(|&idx| self.members[idx].is_eligible())
            .collect();
        let expected = ((pool.len() as f64) * rate).round() as usize;
        let quota = expected.min(pool.len());
        for _ in 0..quota {
            let pick = rng.random_range(0..pool.len());
            let idx = pool.swap_remove(pick);
            self.members[idx].record_arrest(policy);
        }
        quota
    }

    /// One year's sentence decay: every active sentence serves a year.
    fn advance_sentences(&mut self) {
        for person in &mut self.members {
            if person.sentence_remaining > 0.0 {
                person.sentence_served += 1;
                person.sentence_remaining -= 1.0;
            }
        }
    }
}

/// One simulated year. Year 0 is the pre-simulation state.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Year(pub u32);

impl Year {
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Events recorded by a single [`Trial::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearSummary {
    /// The year just completed (1-based).
    pub year: Year,
    /// Arrests made in the comparison cohort this year.
    pub comparison_arrests: usize,
    /// Arrests made in the target cohort this year.
    pub target_arrests: usize,
    /// Cumulative sentence-years served by the comparison cohort.
    pub comparison_total: u64,
    /// Cumulative sentence-years served by the target cohort.
    pub target_total: u64,
}

/// Final state and recorded series of one completed trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialOutcome {
    /// Cumulative sentence-years per year for the comparison cohort.
    pub comparison_series: Vec<u64>,
    /// Cumulative sentence-years per year for the target cohort.
    pub target_series: Vec<u64>,
    /// Comparison cohort at the end of the trial, for external rendering.
    pub comparison: Cohort,
    /// Target cohort at the end of the trial, for external rendering.
    pub target: Cohort,
}

impl TrialOutcome {
    /// Recorded series for the given cohort.
    #[must_use]
    pub fn series(&self, label: CohortLabel) -> &[u64] {
        match label {
            CohortLabel::Comparison => &self.comparison_series,
            CohortLabel::Target => &self.target_series,
        }
    }
}

/// One in-flight trial: both cohorts plus the series recorded so far.
///
/// Arrests are applied before sentence decay within each year, so a sentence
/// assigned this year serves its first year immediately. Changing that order
/// changes every downstream number.
pub struct Trial {
    config: SimulationConfig,
    year: Year,
    rng: SmallRng,
    comparison: Cohort,
    target: Cohort,
    comparison_series: Vec<u64>,
    target_series: Vec<u64>,
}

impl fmt::Debug for Trial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trial")
            .field("year", &self.year)
            .field("population_size", &self.config.population_size)
            .field("horizon", &self.config.horizon)
            .finish()
    }
}

impl Trial {
    /// Builds a trial with freshly initialized cohorts.
    ///
    /// Validates the configuration first; nothing is simulated on invalid
    /// input.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let rng = config.seeded_rng();
        Ok(Self::with_rng(config, rng))
    }

    /// Builds a trial around an externally seeded RNG. The caller has already
    /// validated the configuration.
    fn with_rng(config: SimulationConfig, mut rng: SmallRng) -> Self {
        let comparison = Cohort::new(CohortLabel::Comparison, config.population_size, &mut rng);
        let target = Cohort::new(CohortLabel::Target, config.population_size, &mut rng);
        let horizon = config.horizon as usize;
        Self {
            config,
            year: Year::zero(),
            rng,
            comparison,
            target,
            comparison_series: Vec::with_capacity(horizon),
            target_series: Vec::with_capacity(horizon),
        }
    }

    /// Advances the trial by one year: arrests for both cohorts, then
    /// sentence decay for both, then the cumulative totals are recorded.
    pub fn step(&mut self) -> YearSummary {
        let comparison_arrests = self.comparison.apply_arrests(
            self.config.comparison_rate,
            &self.config.policy,
            &mut self.rng,
        );
        let target_arrests =
            self.target
                .apply_arrests(self.config.target_rate, &self.config.policy, &mut self.rng);

        self.comparison.advance_sentences();
        self.target.advance_sentences();

        self.year = self.year.next();
        let comparison_total = self.comparison.total_sentence_served();
        let target_total = self.target.total_sentence_served();
        self.comparison_series.push(comparison_total);
        self.target_series.push(target_total);

        YearSummary {
            year: self.year,
            comparison_arrests,
            target_arrests,
            comparison_total,
            target_total,
        }
    }

    /// Whether the configured horizon has been reached.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.year.0 >= self.config.horizon
    }

    /// Runs the trial to its horizon and yields the outcome.
    #[must_use]
    pub fn run(mut self) -> TrialOutcome {
        while !self.is_complete() {
            self.step();
        }
        TrialOutcome {
            comparison_series: self.comparison_series,
            target_series: self.target_series,
            comparison: self.comparison,
            target: self.target,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// The most recently completed year.
    #[must_use]
    pub const fn year(&self) -> Year {
        self.year
    }

    /// Cohort state as of the last completed year.
    #[must_use]
    pub const fn cohort(&self, label: CohortLabel) -> &Cohort {
        match label {
            CohortLabel::Comparison => &self.comparison,
            CohortLabel::Target => &self.target,
        }
    }

    /// Series recorded so far for the given cohort.
    #[must_use]
    pub fn series_so_far(&self, label: CohortLabel) -> &[u64] {
        match label {
            CohortLabel::Comparison => &self.comparison_series,
            CohortLabel::Target => &self.target_series,
        }
    }
}

/// Runs one complete trial with freshly initialized cohorts.
pub fn run_single_trial(config: &SimulationConfig) -> Result<TrialOutcome, ConfigError> {
    Trial::new(config.clone()).map(Trial::run)
}

/// Per-year mean and population standard deviation across a group of trials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub means: Vec<f64>,
    pub std_devs: Vec<f64>,
}

impl SeriesStats {
    /// Computes per-year statistics across `series`, all of equal length.
    ///
    /// The standard deviation uses the population form (denominator = trial
    /// count), so a single trial yields zeros.
    #[must_use]
    pub fn from_trials(series: &[Vec<u64>]) -> Self {
        let horizon = series.first().map_or(0, Vec::len);
        let count = series.len() as f64;
        let mut means = vec![0.0; horizon];
        let mut std_devs = vec![0.0; horizon];
        for t in 0..horizon {
            let mean = series.iter().map(|s| s[t] as f64).sum::<f64>() / count;
            let variance = series
                .iter()
                .map(|s| {
                    let diff = s[t] as f64 - mean;
                    diff * diff
                })
                .sum::<f64>()
                / count;
            means[t] = mean;
            std_devs[t] = variance.sqrt();
        }
        Self { means, std_devs }
    }
}

/// Aggregate statistics across many independent trials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub comparison: SeriesStats,
    pub target: SeriesStats,
    /// Number of trials aggregated.
    pub trials: usize,
}

impl AggregateReport {
    /// Per-cohort statistics.
    #[must_use]
    pub const fn stats(&self, label: CohortLabel) -> &SeriesStats {
        match label {
            CohortLabel::Comparison => &self.comparison,
            CohortLabel::Target => &self.target,
        }
    }

    /// Ratio of target to comparison mean cumulative sentence-years at the
    /// final year.
    ///
    /// A zero comparison baseline is reported as an error rather than an
    /// infinite ratio.
    pub fn disparity_ratio(&self) -> Result<f64, DisparityError> {
        let (Some(&target_mean), Some(&comparison_mean)) =
            (self.target.means.last(), self.comparison.means.last())
        else {
            return Err(DisparityError::EmptySeries);
        };
        if comparison_mean == 0.0 {
            return Err(DisparityError::ZeroBaseline);
        }
        Ok(target_mean / comparison_mean)
    }
}

/// Derives a per-trial RNG seed. The odd multiplier keeps distinct trial
/// indices on distinct streams; index 0 reproduces the base seed so a
/// one-trial aggregate matches [`run_single_trial`] under the same seed.
fn trial_seed(base: u64, index: usize) -> u64 {
    base ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Runs `trials` independent trials and aggregates their series.
///
/// Trials share no mutable state, so they fan out across the rayon pool;
/// results are collected in trial order.
pub fn run_trial_aggregate(
    config: &SimulationConfig,
    trials: usize,
) -> Result<AggregateReport, ConfigError> {
    if trials == 0 {
        return Err(ConfigError::ZeroTrials);
    }
    config.validate()?;

    let base_seed = config.rng_seed.unwrap_or_else(rand::random);
    let (comparison_series, target_series): (Vec<Vec<u64>>, Vec<Vec<u64>>) = (0..trials)
        .into_par_iter()
        .map(|index| {
            let rng = SmallRng::seed_from_u64(trial_seed(base_seed, index));
            let outcome = Trial::with_rng(config.clone(), rng).run();
            (outcome.comparison_series, outcome.target_series)
        })
        .unzip();

    Ok(AggregateReport {
        comparison: SeriesStats::from_trials(&comparison_series),
        target: SeriesStats::from_trials(&target_series),
        trials,
    })
}
