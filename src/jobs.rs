//! Job selection and execution.
//!
//! A job is one pass over the email list against one configured portal:
//! open a browser, sign in, collect devices, write the report. Selected jobs
//! run concurrently, each in its own browser session, staggered by a random
//! delay so they do not hit the portal at the same moment.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use rand::Rng;
use rand::seq::SliceRandom;
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep};
use tracing::{error, info, instrument, warn};

use crate::config::{Config, JobSpec};
use crate::driver::Driver;
use crate::locators::account_badge;
use crate::pages::{collect_devices, sign_in};
use crate::report::{DeviceTable, write_device_report};
use crate::screenshot::Screenshots;
use crate::session::Session;
use crate::types::DeviceRecord;
use crate::webdriver::{BrowserType, WebDriverSession};

/// What a finished job produced
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobOutcome {
    pub job: String,
    pub records: usize,
    /// Report path, when any device was collected
    pub report: Option<PathBuf>,
}

/// Jobs whose name contains `filter`, ignoring case
pub fn select_jobs<'a>(jobs: &'a [JobSpec], filter: &str) -> Vec<&'a JobSpec> {
    let filter = filter.trim().to_lowercase();
    jobs.iter()
        .filter(|job| job.name.to_lowercase().contains(&filter))
        .collect()
}

/// Random browser from the configured list
pub fn pick_browser<R: Rng + ?Sized>(browsers: &[BrowserType], rng: &mut R) -> Option<BrowserType> {
    browsers.choose(rng).copied()
}

/// Stagger delay: uniform between a random start in 0..=10 s and a random
/// upper bound drawn from `range`
pub fn stagger_delay<R: Rng + ?Sized>(range: [u64; 2], rng: &mut R) -> Duration {
    let start = (rng.r#gen::<f64>() * 10.0).round();
    let stop = rng.gen_range(range[0]..=range[1]) as f64;
    let seconds = if stop > start {
        rng.gen_range(start..stop)
    } else {
        start
    };
    Duration::from_secs_f64(seconds)
}

/// Sign in and collect devices for every email on an open session
pub async fn collect_with_session<D: Driver>(
    session: &mut Session<D>,
    config: &Config,
    emails: &[String],
) -> Result<Vec<DeviceRecord>> {
    let credential = config.credential(&config.login_user)?;
    let landmark = account_badge(&credential.email);
    sign_in(session, credential, Some(&landmark), None).await?;

    let records = collect_devices(session, emails, &config.retry_policy()).await?;
    Ok(records)
}

/// Write the report for `records`; nothing is written when empty
pub fn write_report(config: &Config, records: &[DeviceRecord]) -> Result<Option<PathBuf>> {
    if records.is_empty() {
        info!("No devices collected, skipping report");
        return Ok(None);
    }
    let table = DeviceTable::from_records(records, &config.column_names_mapping, &config.os_to_exclude);
    let path = config.device_list_path();
    write_device_report(&table, &path, true)
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    Ok(Some(path))
}

/// Run `job` once, rerunning it up to `job_reruns` times on failure
#[instrument(skip_all, fields(job = %job.name))]
pub async fn run_job(
    config: Arc<Config>,
    job: JobSpec,
    emails: Arc<Vec<String>>,
    browser: BrowserType,
) -> Result<JobOutcome> {
    let mut attempt = 0;
    loop {
        match run_job_once(&config, &job, &emails, browser).await {
            Ok(outcome) => return Ok(outcome),
            Err(e) if attempt < config.job_reruns => {
                attempt += 1;
                warn!(
                    "Job {} failed: {:#}. Rerun {}/{} in {}s",
                    job.name,
                    e,
                    attempt,
                    config.job_reruns,
                    config.job_reruns_delay
                );
                sleep(config.job_reruns_delay()).await;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn run_job_once(
    config: &Config,
    job: &JobSpec,
    emails: &[String],
    browser: BrowserType,
) -> Result<JobOutcome> {
    let started = Instant::now();
    let driver = WebDriverSession::connect(
        browser,
        config.webdriver_url.as_deref(),
        config.browser_headless,
        &config.download_path(),
    )
    .await?;

    let mut session = Session::new(
        driver,
        config.catalog()?,
        job.url.clone(),
        Screenshots::new(config.screenshots_path()),
    )
    .with_default_timeout(config.browser_timeout())
    .with_poll_interval(config.poll_interval());

    let collected = collect_with_session(&mut session, config, emails).await;
    if collected.is_err() {
        session.capture(&format!("{} call failed", job.name)).await;
    }
    if let Err(e) = session.close().await {
        warn!("Failed to close browser session: {}", e);
    }

    let records = collected?;
    let report = write_report(config, &records)?;
    info!(
        "Job {} finished with {} device(s) in {} ms",
        job.name,
        records.len(),
        started.elapsed().as_millis()
    );
    Ok(JobOutcome {
        job: job.name.clone(),
        records: records.len(),
        report,
    })
}

/// Run every job matching `filter` concurrently.
///
/// All jobs are awaited; the first failure is returned after the rest have
/// finished.
pub async fn run_jobs(
    config: Arc<Config>,
    filter: &str,
    emails: Vec<String>,
    browser: Option<BrowserType>,
) -> Result<Vec<JobOutcome>> {
    let selected: Vec<JobSpec> = select_jobs(&config.job_list, filter)
        .into_iter()
        .cloned()
        .collect();
    if selected.is_empty() {
        return Err(anyhow!("No configured job matches '{}'", filter));
    }

    let browser = match browser {
        Some(browser) => browser,
        None => pick_browser(&config.browser_list, &mut rand::thread_rng())
            .ok_or_else(|| anyhow!("browser_list is empty"))?,
    };
    info!("Using {} to run {} job(s)", browser, selected.len());

    let emails = Arc::new(emails);
    let stagger = selected.len() > 1;
    let mut tasks = JoinSet::new();
    for job in selected {
        let delay = if stagger {
            stagger_delay(config.sleep_time_range, &mut rand::thread_rng())
        } else {
            Duration::ZERO
        };
        let config = Arc::clone(&config);
        let emails = Arc::clone(&emails);
        tasks.spawn(async move {
            if !delay.is_zero() {
                info!("Random sleeping {:.5} seconds before {}", delay.as_secs_f64(), job.name);
                sleep(delay).await;
            }
            run_job(config, job, emails, browser).await
        });
    }

    let mut outcomes = Vec::new();
    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        match joined.context("Job task panicked")? {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                error!("Job failed: {:#}", e);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(outcomes),
    }
}
