use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use futures_util::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use routerdash_core::api::{ApiError, DashboardApi, DeviceDirectory, MetricsFetcher};
use routerdash_core::reducer::{DashboardEvent, Effect, EventEnvelope, Mutation};
use routerdash_core::state::FetchKind;

/// Sends events to the reducer with monotonically increasing ids.
#[derive(Clone, Debug)]
pub struct Emitter {
    tx: mpsc::UnboundedSender<EventEnvelope>,
    next_id: Arc<AtomicU64>,
}

impl Emitter {
    pub fn new(tx: mpsc::UnboundedSender<EventEnvelope>) -> Self {
        Self {
            tx,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn emit(&self, event: DashboardEvent) {
        let env = EventEnvelope {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            at: SystemTime::now(),
            event,
        };
        // receiver gone means the UI is shutting down
        let _ = self.tx.send(env);
    }
}

/// The single auto-refresh timer. Replacing or dropping it aborts the task.
#[derive(Debug, Default)]
pub struct RefreshTimer {
    handle: Option<JoinHandle<()>>,
}

impl RefreshTimer {
    pub fn reschedule(&mut self, period: Option<Duration>, emitter: &Emitter) {
        self.cancel();
        let Some(period) = period else {
            return;
        };
        info!(secs = period.as_secs(), "auto-refresh scheduled");
        let emitter = emitter.clone();
        self.handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                emitter.emit(DashboardEvent::RefreshRequested);
            }
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("auto-refresh cancelled");
        }
    }

    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Backend access shared by every spawned effect task
#[derive(Clone)]
struct Worker {
    directory: DeviceDirectory,
    fetcher: MetricsFetcher,
    emitter: Emitter,
    export_dir: PathBuf,
}

fn mutation_outcome(mutation: Mutation, msisdn: &str, result: Result<(), ApiError>) -> Result<(), Option<String>> {
    result.map_err(|e| {
        warn!(?mutation, %msisdn, error = %e, "device mutation failed");
        e.detail().map(str::to_string)
    })
}

impl Worker {
    fn failed(&self, kind: FetchKind, token: u64, error: ApiError) -> bool {
        warn!(?kind, token, error = %error, "fetch failed");
        self.emitter.emit(DashboardEvent::FetchFailed {
            kind,
            token,
            reason: error.to_string(),
        });
        false
    }

    /// Run one effect and report its outcome as an event. Returns false on failure.
    async fn execute(&self, effect: Effect) -> bool {
        match effect {
            Effect::LoadDevices {
                token,
                include_dormant,
                select,
            } => match self.directory.list(include_dormant).await {
                Ok(devices) => {
                    self.emitter.emit(DashboardEvent::DevicesLoaded {
                        token,
                        devices,
                        select,
                    });
                    true
                }
                Err(e) => self.failed(FetchKind::Devices, token, e),
            },
            Effect::FetchSeries {
                token,
                msisdn,
                mode,
                range,
            } => match self.fetcher.series(&msisdn, mode, &range).await {
                Ok(rows) => {
                    self.emitter.emit(DashboardEvent::SeriesLoaded { token, rows });
                    true
                }
                Err(e) => self.failed(FetchKind::Series, token, e),
            },
            Effect::FetchAllRssi {
                token,
                devices,
                mode,
                range,
            } => {
                let series = self.fetcher.all_device_series(&devices, mode, &range).await;
                debug!(requested = devices.len(), with_data = series.len(), "all-device rssi fetched");
                // per-device failures are already dropped from the result
                self.emitter.emit(DashboardEvent::AllRssiLoaded { token, series });
                true
            }
            Effect::FetchTable { token, query } => match self.fetcher.table(&query).await {
                Ok(page) => {
                    self.emitter.emit(DashboardEvent::TableLoaded { token, page });
                    true
                }
                Err(e) => self.failed(FetchKind::Table, token, e),
            },
            Effect::SaveAlias { msisdn, alias } => {
                let result = self.directory.set_alias(&msisdn, &alias).await;
                let result = mutation_outcome(Mutation::Alias, &msisdn, result);
                let ok = result.is_ok();
                self.emitter.emit(DashboardEvent::MutationFinished {
                    mutation: Mutation::Alias,
                    msisdn,
                    result,
                });
                ok
            }
            Effect::MarkDormant { msisdn } => {
                let result = self.directory.set_dormant(&msisdn).await;
                let result = mutation_outcome(Mutation::Dormant, &msisdn, result);
                let ok = result.is_ok();
                self.emitter.emit(DashboardEvent::MutationFinished {
                    mutation: Mutation::Dormant,
                    msisdn,
                    result,
                });
                ok
            }
            Effect::Activate { msisdn } => {
                let result = self.directory.activate(&msisdn).await;
                let result = mutation_outcome(Mutation::Activate, &msisdn, result);
                let ok = result.is_ok();
                self.emitter.emit(DashboardEvent::MutationFinished {
                    mutation: Mutation::Activate,
                    msisdn,
                    result,
                });
                ok
            }
            Effect::ExportCsv {
                msisdn,
                range,
                order,
            } => {
                let result = self.export(&msisdn, &range, order).await;
                if let Err(reason) = &result {
                    warn!(%msisdn, %reason, "csv export failed");
                }
                let ok = result.is_ok();
                self.emitter.emit(DashboardEvent::ExportFinished { result });
                ok
            }
            Effect::Refresh { .. } | Effect::RescheduleTimer { .. } => {
                debug!("nested control effect ignored");
                true
            }
        }
    }

    async fn export(
        &self,
        msisdn: &str,
        range: &routerdash_core::model::DateRange,
        order: routerdash_core::model::SortOrder,
    ) -> Result<String, String> {
        let bytes = self
            .fetcher
            .export_csv(msisdn, range, order)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "no device selected".to_string())?;
        let path = self.export_dir.join(export_file_name(msisdn, range));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| format!("{}: {}", path.display(), e))?;
        info!(path = %path.display(), bytes = bytes.len(), "csv exported");
        Ok(path.display().to_string())
    }
}

pub fn export_file_name(msisdn: &str, range: &routerdash_core::model::DateRange) -> String {
    format!("records_{}_{}_{}.csv", msisdn, range.start_str(), range.end_str())
}

/// Turns reducer effects into spawned backend calls.
pub struct EffectRunner {
    worker: Worker,
    timer: RefreshTimer,
}

impl EffectRunner {
    pub fn new(api: Arc<dyn DashboardApi>, emitter: Emitter, export_dir: PathBuf) -> Self {
        Self {
            worker: Worker {
                directory: DeviceDirectory::new(api.clone()),
                fetcher: MetricsFetcher::new(api),
                emitter,
                export_dir,
            },
            timer: RefreshTimer::default(),
        }
    }

    pub fn dispatch(&mut self, effect: Effect) {
        match effect {
            Effect::RescheduleTimer { period } => {
                self.timer.reschedule(period, &self.worker.emitter);
            }
            Effect::Refresh { effects } => {
                let worker = self.worker.clone();
                tokio::spawn(async move {
                    let outcomes = join_all(effects.into_iter().map(|e| worker.execute(e))).await;
                    let ok = outcomes.iter().all(|ok| *ok);
                    worker.emitter.emit(DashboardEvent::RefreshCompleted { ok });
                });
            }
            other => {
                let worker = self.worker.clone();
                tokio::spawn(async move {
                    worker.execute(other).await;
                });
            }
        }
    }

    pub fn dispatch_all(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            self.dispatch(effect);
        }
    }

    /// Stop the timer; in-flight fetches finish into a closed channel
    pub fn shutdown(&mut self) {
        self.timer.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use routerdash_core::fake::FakeApi;
    use routerdash_core::model::{ChartMode, DateRange};

    fn channel() -> (Emitter, mpsc::UnboundedReceiver<EventEnvelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Emitter::new(tx), rx)
    }

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2025, 1, 14).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_each_period_and_cancels() {
        let (emitter, mut rx) = channel();
        let mut timer = RefreshTimer::default();
        timer.reschedule(Some(Duration::from_secs(5)), &emitter);

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        let env = rx.try_recv().unwrap();
        assert!(matches!(env.event, DashboardEvent::RefreshRequested));

        timer.reschedule(None, &emitter);
        assert!(!timer.is_active());
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces_old_timer() {
        let (emitter, mut rx) = channel();
        let mut timer = RefreshTimer::default();
        timer.reschedule(Some(Duration::from_secs(5)), &emitter);
        timer.reschedule(Some(Duration::from_secs(60)), &emitter);

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(rx.try_recv().is_err());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());

        drop(timer);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_refresh_reports_results_then_completion() {
        let (emitter, mut rx) = channel();
        let mut runner = EffectRunner::new(Arc::new(FakeApi::new()), emitter, std::env::temp_dir());
        runner.dispatch(Effect::Refresh {
            effects: vec![
                Effect::LoadDevices {
                    token: 1,
                    include_dormant: false,
                    select: None,
                },
                Effect::FetchSeries {
                    token: 2,
                    msisdn: "01000000001".into(),
                    mode: ChartMode::Raw,
                    range: range(),
                },
            ],
        });

        let mut seen = Vec::new();
        while let Some(env) = rx.recv().await {
            let done = matches!(env.event, DashboardEvent::RefreshCompleted { .. });
            seen.push(env.event);
            if done {
                break;
            }
        }
        assert_eq!(seen.len(), 3);
        assert!(matches!(seen.last(), Some(DashboardEvent::RefreshCompleted { ok: true })));
        assert!(seen.iter().any(|e| matches!(e, DashboardEvent::DevicesLoaded { token: 1, .. })));
        assert!(seen.iter().any(|e| matches!(e, DashboardEvent::SeriesLoaded { token: 2, .. })));
    }

    #[tokio::test]
    async fn test_refresh_with_failed_fetch_reports_not_ok() {
        let fake = Arc::new(FakeApi::new());
        fake.fail_series_for("01000000001");
        let (emitter, mut rx) = channel();
        let mut runner = EffectRunner::new(fake, emitter, std::env::temp_dir());
        runner.dispatch(Effect::Refresh {
            effects: vec![Effect::FetchSeries {
                token: 3,
                msisdn: "01000000001".into(),
                mode: ChartMode::Raw,
                range: range(),
            }],
        });

        let first = rx.recv().await.unwrap().event;
        assert!(matches!(first, DashboardEvent::FetchFailed { token: 3, .. }));
        let last = rx.recv().await.unwrap().event;
        assert!(matches!(last, DashboardEvent::RefreshCompleted { ok: false }));
    }

    #[tokio::test]
    async fn test_failed_fetch_and_rejected_mutation() {
        let fake = Arc::new(FakeApi::new());
        fake.fail_series_for("01000000002");
        fake.reject_mutations(Some("alias too long"));
        let (emitter, mut rx) = channel();
        let mut runner = EffectRunner::new(fake, emitter, std::env::temp_dir());

        runner.dispatch(Effect::FetchSeries {
            token: 7,
            msisdn: "01000000002".into(),
            mode: ChartMode::Raw,
            range: range(),
        });
        let env = rx.recv().await.unwrap();
        assert!(matches!(
            env.event,
            DashboardEvent::FetchFailed {
                kind: FetchKind::Series,
                token: 7,
                ..
            }
        ));

        runner.dispatch(Effect::SaveAlias {
            msisdn: "01000000001".into(),
            alias: "x".repeat(200),
        });
        match rx.recv().await.unwrap().event {
            DashboardEvent::MutationFinished { result, .. } => {
                assert_eq!(result, Err(Some("alias too long".to_string())));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_export_writes_file() {
        let dir = std::env::temp_dir().join(format!("routerdash-export-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let (emitter, mut rx) = channel();
        let mut runner = EffectRunner::new(Arc::new(FakeApi::new()), emitter, dir.clone());

        runner.dispatch(Effect::ExportCsv {
            msisdn: "01000000001".into(),
            range: range(),
            order: routerdash_core::model::SortOrder::Asc,
        });
        match rx.recv().await.unwrap().event {
            DashboardEvent::ExportFinished { result: Ok(path) } => {
                let text = std::fs::read_to_string(&path).unwrap();
                assert!(text.starts_with("ts_kst,"));
                assert!(path.ends_with("records_01000000001_2025-01-14_2025-01-15.csv"));
            }
            other => panic!("unexpected event {:?}", other),
        }
        let _ = std::fs::remove_dir_all(&dir);
    }
}
