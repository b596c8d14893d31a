use paradox_core::{
    CohortLabel, DisparityError, SentencePolicy, SimulationConfig, Trial, run_single_trial,
    run_trial_aggregate,
};

fn seeded_config(seed: u64) -> SimulationConfig {
    SimulationConfig {
        comparison_rate: 0.05,
        target_rate: 0.35,
        policy: SentencePolicy {
            first: 1.0,
            second: 2.0,
            third: 4.0,
        },
        population_size: 64,
        horizon: 20,
        rng_seed: Some(seed),
    }
}

#[test]
fn seeded_aggregate_is_deterministic() {
    let config = seeded_config(0xDEAD_BEEF);
    let first = run_trial_aggregate(&config, 32).expect("first report");
    let second = run_trial_aggregate(&config, 32).expect("second report");
    assert_eq!(first, second);
}

#[test]
fn per_year_invariants_hold_across_a_full_trial() {
    let config = seeded_config(0x5EED);
    let mut trial = Trial::new(config.clone()).expect("trial");
    let mut served_before: Vec<u32> = vec![0; config.population_size];
    let mut arrests_before: Vec<u32> = vec![0; config.population_size];

    while !trial.is_complete() {
        let eligible_before: Vec<bool> = trial
            .cohort(CohortLabel::Target)
            .members()
            .iter()
            .map(|p| p.is_eligible())
            .collect();

        trial.step();

        for (idx, person) in trial.cohort(CohortLabel::Target).members().iter().enumerate() {
            // Served time never shrinks and arrests only land on members who
            // were eligible when the year began.
            assert!(person.sentence_served >= served_before[idx]);
            if person.arrests > arrests_before[idx] {
                assert_eq!(person.arrests, arrests_before[idx] + 1);
                assert!(eligible_before[idx]);
            }
            served_before[idx] = person.sentence_served;
            arrests_before[idx] = person.arrests;
        }
    }
}

#[test]
fn aggregate_means_stay_within_physical_bounds() {
    let config = seeded_config(0xAB1E);
    let report = run_trial_aggregate(&config, 64).expect("report");
    let ceiling = (config.population_size as f64) * f64::from(config.horizon);

    for stats in [&report.comparison, &report.target] {
        assert_eq!(stats.means.len(), 20);
        assert_eq!(stats.std_devs.len(), 20);
        let mut previous = 0.0;
        for (&mean, &sd) in stats.means.iter().zip(&stats.std_devs) {
            assert!(mean >= previous, "means are cumulative");
            assert!(mean <= ceiling);
            assert!(sd >= 0.0);
            previous = mean;
        }
    }
}

#[test]
fn higher_arrest_rate_dominates_in_aggregate() {
    let report = run_trial_aggregate(&seeded_config(0x90D), 64).expect("report");
    let target_final = *report.target.means.last().expect("target mean");
    let comparison_final = *report.comparison.means.last().expect("comparison mean");
    assert!(target_final > comparison_final);
    let ratio = report.disparity_ratio().expect("ratio");
    assert!(ratio > 1.0);
}

#[test]
fn one_trial_aggregate_reproduces_that_trial() {
    let config = seeded_config(0x7EA);
    let report = run_trial_aggregate(&config, 1).expect("report");
    let outcome = run_single_trial(&config).expect("outcome");

    let expected: Vec<f64> = outcome.comparison_series.iter().map(|&v| v as f64).collect();
    assert_eq!(report.comparison.means, expected);
    assert!(report.comparison.std_devs.iter().all(|&sd| sd == 0.0));
}

#[test]
fn degenerate_baseline_surfaces_as_an_error() {
    let config = SimulationConfig {
        comparison_rate: 0.0,
        rng_seed: Some(12),
        ..seeded_config(12)
    };
    let report = run_trial_aggregate(&config, 8).expect("report");
    assert_eq!(report.disparity_ratio(), Err(DisparityError::ZeroBaseline));
}
