use anyhow::{Result, anyhow};
use dispatchcrab::{Clock, ExecutionPlan, ManualClock, RateModel, Throttle, TokioClock};
use dispatchcrab_cli::actor::ThrottleActor;
use dispatchcrab_cli::config::{Config, RangeSpec};
use dispatchcrab_cli::provider::SimulatedProvider;
use dispatchcrab_cli::types::{Output, PlanSummary, QuotaSummary, RenderBound, RunSummary};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinSet;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration from environment variables and CLI arguments
    let config = Config::from_env_and_args()?;

    // Initialize logging; stdout is reserved for the plan
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("dispatchcrab={}", config.log_level).parse()?)
                .add_directive(format!("dispatchcrab_cli={}", config.log_level).parse()?),
        )
        .init();

    tracing::info!(
        provider = ?config.provider,
        rate_per_minute = config.rate.rate_per_minute(),
        max_per_day = config.throttle.max_per_day,
        "DispatchCrab starting"
    );

    match config.range {
        RangeSpec::Count { start, count, step } => {
            let (start, end) = RangeSpec::count_bounds(start, count)?;
            run(&config, start, end, step).await
        }
        RangeSpec::Days {
            start,
            days,
            step_days,
        } => {
            let (start, end) = RangeSpec::day_bounds(start, days)?;
            let step = Duration::from_secs(step_days.saturating_mul(dispatchcrab::DAY.as_secs()));
            run(&config, start, end, step).await
        }
    }
}

async fn run<T: RenderBound>(config: &Config, start: T, end: T, step: T::Step) -> Result<()> {
    let plan = dispatchcrab::plan(start, end, step, &config.rate)?;
    let summary = PlanSummary::new(&plan, &RateModel::derive(&config.rate));

    let mut output = Output {
        plan: summary,
        runs: None,
        quota: None,
    };

    if config.run.execute {
        let (runs, quota) = if config.run.simulate {
            execute(config, plan, ManualClock::new(SystemTime::now())).await?
        } else {
            execute(config, plan, TokioClock).await?
        };
        output.runs = Some(runs);
        output.quota = Some(quota);
    }

    if config.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{output}");
    }

    let stopped = output
        .runs
        .iter()
        .flatten()
        .filter(|run| !run.complete)
        .count();
    if stopped > 0 {
        return Err(anyhow!("{stopped} job(s) stopped before finishing the plan"));
    }
    Ok(())
}

async fn execute<T, C>(
    config: &Config,
    plan: ExecutionPlan<T>,
    clock: C,
) -> Result<(Vec<RunSummary>, QuotaSummary)>
where
    T: RenderBound,
    C: Clock + 'static,
{
    // One actor owns the throttle; every job shares its quota
    let throttle = Throttle::with_clock(config.throttle, clock);
    let handle = ThrottleActor::spawn(config.buffer_size, throttle);
    let plan = Arc::new(plan);
    let run_config = config.run;

    let mut jobs = JoinSet::new();
    for job in 1..=run_config.jobs {
        let mut handle = handle.clone();
        let plan = Arc::clone(&plan);

        jobs.spawn(async move {
            tracing::info!(job, mode = ?run_config.mode, "Starting dispatch job");
            let mut provider =
                SimulatedProvider::new(run_config.fail_every, run_config.stop_on_failure);
            let report = dispatchcrab::Dispatcher::new(&mut handle, run_config.mode)
                .run(plan.as_ref(), &mut provider)
                .await;
            RunSummary::new(job, &report)
        });
    }

    let mut runs = Vec::with_capacity(run_config.jobs);
    while let Some(result) = jobs.join_next().await {
        match result {
            Ok(summary) => {
                if summary.complete {
                    tracing::info!(job = summary.job, "Dispatch job completed");
                } else {
                    tracing::warn!(job = summary.job, "Dispatch job stopped early");
                }
                runs.push(summary);
            }
            Err(e) => {
                tracing::error!("Dispatch job panicked: {}", e);
                return Err(anyhow!("Dispatch job panicked"));
            }
        }
    }
    runs.sort_by_key(|run| run.job);

    let quota = QuotaSummary::from(handle.stats().await?);
    Ok((runs, quota))
}
