//! Scheduled strategic-analysis execution.
//!
//! The job itself is pure (see `depotrack-analysis`); this module feeds it a
//! consistent snapshot, writes its report, and drives it on a schedule:
//! - cadence: daily at a fixed time (the classic nightly run) or a fixed
//!   interval for tests/dev
//! - event-trigger: `handle.trigger()` requests an off-schedule run,
//!   coalesced if one is already pending
//! - failures: logged with their phase and retried with bounded exponential
//!   backoff; a failed run never leaves partial analysis rows behind

use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use tracing::{info, warn};

use depotrack_analysis::{
    AnalysisError, AnalysisParams, AnalysisReport, AnalysisSnapshot, MovementRecord,
    SnapshotReader, StrategicAnalysisJob,
};
use depotrack_catalog::CatalogStore;

use crate::analysis_store::AnalysisStore;
use crate::clock::Clock;
use crate::ledger_store::LedgerStore;

/// Snapshot source over the catalog and ledger stores.
///
/// Products and locations are enumerated from the catalog so entities without
/// movements still get analysis rows; the movement log is read in one call,
/// giving the pass a consistent view as of its start.
#[derive(Debug)]
pub struct LedgerSnapshotSource<C, L> {
    catalog: C,
    store: L,
}

impl<C, L> LedgerSnapshotSource<C, L> {
    pub fn new(catalog: C, store: L) -> Self {
        Self { catalog, store }
    }
}

impl<C, L> SnapshotReader for LedgerSnapshotSource<C, L>
where
    C: CatalogStore,
    L: LedgerStore,
{
    fn snapshot(&self) -> Result<AnalysisSnapshot, AnalysisError> {
        let products = self.catalog.products().iter().map(|p| p.id()).collect();
        let locations = self.catalog.locations().iter().map(|l| l.id()).collect();
        let movements = self
            .store
            .movements()
            .map_err(|e| AnalysisError::Snapshot(e.to_string()))?
            .into_iter()
            .map(|m| MovementRecord {
                product_id: m.product_id,
                location_id: m.location_id,
                quantity: m.quantity,
                recorded_at: m.recorded_at,
            })
            .collect();

        Ok(AnalysisSnapshot {
            products,
            locations,
            movements,
        })
    }
}

/// Run one full analysis pass: snapshot, analyze, store.
///
/// Reads the movement log, never mutates it. Any failure aborts the whole
/// run; the previous run's rows stay in place.
pub fn run_analysis_once<R, S>(
    reader: &R,
    store: &S,
    now: DateTime<Utc>,
    params: AnalysisParams,
) -> Result<AnalysisReport, AnalysisError>
where
    R: SnapshotReader + ?Sized,
    S: AnalysisStore + ?Sized,
{
    let snapshot = reader.snapshot()?;
    let report = StrategicAnalysisJob::new(snapshot)
        .with_params(params)
        .run(now)?;
    store
        .replace(&report)
        .map_err(|e| AnalysisError::Store(e.to_string()))?;

    info!(
        products = report.products.len(),
        locations = report.locations.len(),
        "strategic analysis pass complete"
    );
    Ok(report)
}

/// When to run the analysis pass.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AnalysisSchedule {
    /// Fixed interval between runs (tests/dev).
    Every(Duration),
    /// Once per day at the given UTC time of day.
    DailyAt(NaiveTime),
}

impl AnalysisSchedule {
    /// Default nightly cadence.
    pub fn nightly() -> Self {
        Self::DailyAt(NaiveTime::from_hms_opt(3, 5, 0).expect("valid time of day"))
    }

    /// The first run instant strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            AnalysisSchedule::Every(interval) => now + *interval,
            AnalysisSchedule::DailyAt(time) => {
                let today = now.date_naive().and_time(*time).and_utc();
                if today > now {
                    today
                } else {
                    today + Duration::days(1)
                }
            }
        }
    }
}

/// Config for the background analysis runner.
#[derive(Debug, Clone)]
pub struct StrategicAnalysisRunner {
    pub schedule: AnalysisSchedule,
    pub params: AnalysisParams,
    pub max_retries: u32,
    pub base_backoff: StdDuration,
}

impl Default for StrategicAnalysisRunner {
    fn default() -> Self {
        Self {
            schedule: AnalysisSchedule::nightly(),
            params: AnalysisParams::default(),
            max_retries: 5,
            base_backoff: StdDuration::from_secs(1),
        }
    }
}

/// Handle for the running analysis runner (shutdown + trigger hook).
#[derive(Debug)]
pub struct RunnerHandle {
    shutdown: mpsc::Sender<()>,
    trigger: mpsc::SyncSender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl RunnerHandle {
    /// Request an off-schedule run.
    ///
    /// Backpressure: triggers are coalesced (bounded queue). If a run is
    /// already pending, this becomes a no-op.
    pub fn trigger(&self) {
        let _ = self.trigger.try_send(());
    }

    /// Gracefully stop the runner thread.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

impl StrategicAnalysisRunner {
    /// Spawn the background runner.
    ///
    /// - Schedule: per `self.schedule`, evaluated against the injected clock
    /// - Event-trigger: call `handle.trigger()` for an off-schedule run
    /// - Failures: logged + retried with bounded exponential backoff; never
    ///   propagate out of the thread
    pub fn spawn<R, S>(
        &self,
        name: &'static str,
        reader: Arc<R>,
        store: Arc<S>,
        clock: Arc<dyn Clock>,
    ) -> RunnerHandle
    where
        R: SnapshotReader + 'static,
        S: AnalysisStore + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let (trigger_tx, trigger_rx) = mpsc::sync_channel::<()>(1);

        let cfg = self.clone();
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || runner_loop(name, cfg, shutdown_rx, trigger_rx, reader, store, clock))
            .expect("failed to spawn strategic analysis runner thread");

        RunnerHandle {
            shutdown: shutdown_tx,
            trigger: trigger_tx,
            join: Some(join),
        }
    }
}

fn runner_loop<R, S>(
    name: &'static str,
    cfg: StrategicAnalysisRunner,
    shutdown_rx: mpsc::Receiver<()>,
    trigger_rx: mpsc::Receiver<()>,
    reader: Arc<R>,
    store: Arc<S>,
    clock: Arc<dyn Clock>,
) where
    R: SnapshotReader + 'static,
    S: AnalysisStore + 'static,
{
    info!(runner = name, "strategic analysis runner started");

    let mut next_run = cfg.schedule.next_after(clock.now());
    let mut pending = false;
    let mut failures: u32 = 0;
    let mut backoff_until: Option<DateTime<Utc>> = None;

    loop {
        // Shutdown has priority.
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        let now = clock.now();
        if now >= next_run {
            pending = true;
            // Keep a stable cadence even if we were delayed.
            while next_run <= now {
                next_run = cfg.schedule.next_after(next_run);
            }
        }

        // Event-trigger: non-blocking drain to coalesce multiple triggers.
        while trigger_rx.try_recv().is_ok() {
            pending = true;
        }

        // Backoff gate.
        if let Some(until) = backoff_until {
            if clock.now() < until {
                thread::sleep(StdDuration::from_millis(50));
                continue;
            }
            backoff_until = None;
        }

        if !pending {
            thread::sleep(StdDuration::from_millis(250));
            continue;
        }

        pending = false;

        match run_analysis_once(reader.as_ref(), store.as_ref(), clock.now(), cfg.params) {
            Ok(_) => {
                failures = 0;
            }
            Err(e) => {
                warn!(runner = name, error = %e, "strategic analysis run failed");
                failures += 1;
                if failures <= cfg.max_retries {
                    pending = true;
                    backoff_until = Some(
                        clock.now()
                            + Duration::from_std(backoff(cfg.base_backoff, failures))
                                .unwrap_or_else(|_| Duration::seconds(60)),
                    );
                } else {
                    // Give up until the next scheduled cycle.
                    failures = 0;
                }
            }
        }
    }

    info!(runner = name, "strategic analysis runner stopped");
}

fn backoff(base: StdDuration, attempt: u32) -> StdDuration {
    // Exponential backoff: base * 2^(attempt-1), capped.
    let pow = 1u32 << attempt.saturating_sub(1).min(10);
    let ms = base.as_millis().saturating_mul(pow as u128);
    StdDuration::from_millis(ms.min(60_000) as u64)
}
