use std::env;

use surplus_diverter::diagnostics::RateLimitedReporter;
use surplus_diverter::trigger::LoggingActuator;
use surplus_diverter::{Diverter, DiverterConfig, SampleSource, SyntheticSource};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("Starting surplus diverter");
    let config = DiverterConfig::from_env()?;

    // Simulation inputs: net surplus to inject and how long to run for.
    // RUN_SECONDS unset means run until interrupted, as a live unit would.
    let surplus_watts: f64 = env::var("SURPLUS_WATTS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(100.0);
    let run_seconds: Option<f64> = env::var("RUN_SECONDS").ok().and_then(|v| v.parse().ok());

    println!(
        "Simulating {surplus_watts}W surplus at {} cycles/s, bucket capacity {}J",
        config.cycles_per_second, config.bucket_capacity_joules
    );

    let mut source = SyntheticSource::new(&config, surplus_watts);
    if let Some(seconds) = run_seconds {
        source = source.for_duration(&config, seconds);
    }

    // report_every_cycles = 0 disables status lines entirely
    let reporter = RateLimitedReporter::new(config.report_every_cycles);
    let mut diverter = Diverter::new(config, LoggingActuator::default(), reporter)?;

    while let Some(pair) = source.next_pair() {
        diverter.process_sample(pair)?;
    }

    println!(
        "Source exhausted after {} cycles, bucket at {:.1}J",
        diverter.cycles_seen(),
        diverter.bucket().level()
    );
    Ok(())
}
