use anyhow::{bail, Context, Result};
use chrono::Local;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::mapper;
use crate::model::{CellLog, CellLogRow, LocationReading};
use crate::sensors::{Platform, PermissionScope, RawLocation, SensorError};
use crate::storage;

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Cadence of the location subscription.
    pub interval: Duration,
    pub output_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            interval: Duration::from_millis(1000),
            output_dir: PathBuf::from("cell_recorder_sessions"),
        }
    }
}

/// Per-session sample counters, shared with the status line.
#[derive(Debug, Default)]
pub struct SessionCounters {
    pub ticks: AtomicU64,
    pub kept: AtomicU64,
    pub dropped: AtomicU64,
}

/// One recording run: Idle until [`start`], Active until [`stop`].
///
/// The in-memory row collection is appended to only by the consumer task
/// while Active and read back only after both tasks have finished, so a
/// plain mutex is enough to keep appends whole.
pub struct RecordingSession {
    platform: Arc<dyn Platform>,
    config: SessionConfig,
    rows: Arc<Mutex<Vec<CellLogRow>>>,
    counters: Arc<SessionCounters>,
    shutdown: Option<watch::Sender<bool>>,
    tasks: Option<(JoinHandle<()>, JoinHandle<()>)>,
}

impl RecordingSession {
    pub fn new(platform: Arc<dyn Platform>, config: SessionConfig) -> Self {
        RecordingSession {
            platform,
            config,
            rows: Arc::new(Mutex::new(Vec::new())),
            counters: Arc::new(SessionCounters::default()),
            shutdown: None,
            tasks: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.tasks.is_some()
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn counters(&self) -> &SessionCounters {
        &self.counters
    }

    /// Idle -> Active. Requires at least one location permission scope;
    /// without one the session stays Idle.
    pub fn start(&mut self) -> Result<()> {
        if self.tasks.is_some() {
            bail!("recording session already active");
        }
        if !self.location_permitted(true) {
            self.platform
                .notify("background location capture is not permitted");
            bail!("location permission not granted");
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        // Small buffer on purpose: the consumer keeps only the most recent
        // fix, so backed-up updates are stale by definition.
        let (fix_tx, fix_rx) = mpsc::channel::<RawLocation>(16);

        let producer = tokio::spawn(location_loop(
            self.platform.clone(),
            fix_tx,
            self.config.interval,
            shutdown_rx.clone(),
        ));
        let consumer = tokio::spawn(sample_loop(
            self.platform.clone(),
            fix_rx,
            self.rows.clone(),
            self.counters.clone(),
            shutdown_rx,
        ));

        self.shutdown = Some(shutdown_tx);
        self.tasks = Some((producer, consumer));
        log::info!("recording session started");
        Ok(())
    }

    /// Active -> Idle. Tears down the subscription, writes the accumulated
    /// rows out, clears them from memory. Safe to call when already Idle
    /// (returns Ok(None)). A failed write is notified and surfaced, never
    /// retried; the session is Idle either way.
    pub async fn stop(&mut self) -> Result<Option<PathBuf>> {
        let Some((producer, consumer)) = self.tasks.take() else {
            return Ok(None);
        };
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        // No tick is aborted mid-flight: the tasks observe shutdown only
        // between ticks.
        let _ = producer.await;
        let _ = consumer.await;

        let logs = std::mem::take(&mut *self.rows.lock().unwrap());
        let log = CellLog { logs };
        match storage::write_log(&self.config.output_dir, &log, Local::now().naive_local()) {
            Ok(path) => {
                self.platform.notify("session file saved");
                log::info!("wrote {} rows to {}", log.logs.len(), path.display());
                Ok(Some(path))
            }
            Err(e) => {
                self.platform.notify("failed to save the session file");
                Err(e).context("saving recording session")
            }
        }
    }

    fn location_permitted(&self, include_background: bool) -> bool {
        self.platform.has_permission(PermissionScope::FineLocation)
            || self.platform.has_permission(PermissionScope::CoarseLocation)
            || (include_background
                && self
                    .platform
                    .has_permission(PermissionScope::BackgroundLocation))
    }
}

/// Location subscription: polls the platform on a fixed cadence and pushes
/// fixes downstream. A full channel drops the new fix; the consumer keeps
/// the most recent one anyway.
async fn location_loop(
    platform: Arc<dyn Platform>,
    tx: mpsc::Sender<RawLocation>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                match platform.read_location() {
                    Ok(fix) => {
                        let _ = tx.try_send(fix);
                    }
                    Err(e) => log::debug!("no location fix: {e}"),
                }
            }
        }
    }
}

/// One tick per delivered fix: keep only the newest buffered fix, re-check
/// permission, snapshot the cell list, append one row. Every failure mode
/// skips the sample and keeps the session alive.
async fn sample_loop(
    platform: Arc<dyn Platform>,
    mut rx: mpsc::Receiver<RawLocation>,
    rows: Arc<Mutex<Vec<CellLogRow>>>,
    counters: Arc<SessionCounters>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let mut fix = tokio::select! {
            _ = shutdown.changed() => break,
            fix = rx.recv() => match fix {
                Some(fix) => fix,
                None => break,
            },
        };
        // Stale buffered updates are discarded, not queued.
        while let Ok(newer) = rx.try_recv() {
            fix = newer;
        }
        counters.ticks.fetch_add(1, Ordering::Relaxed);

        // Defensive re-check; a mid-session revocation drops the tick.
        if !(platform.has_permission(PermissionScope::FineLocation)
            || platform.has_permission(PermissionScope::CoarseLocation))
        {
            platform.notify("location permission is not granted");
            counters.dropped.fetch_add(1, Ordering::Relaxed);
            continue;
        }

        match platform.read_cell_info() {
            Ok(raws) => match mapper::map_cell_info_list(&raws) {
                Ok(cells) => {
                    let row = CellLogRow {
                        location: LocationReading {
                            altitude: fix.altitude,
                            longitude: fix.longitude,
                        },
                        cell_info_list: cells,
                        datetime: Local::now().naive_local(),
                    };
                    rows.lock().unwrap().push(row);
                    counters.kept.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    log::warn!("{e}");
                    platform.notify("could not read cell info");
                    counters.dropped.fetch_add(1, Ordering::Relaxed);
                }
            },
            Err(SensorError::Unsupported(e)) => {
                log::warn!("{e}");
                platform.notify("cell info is not supported on this device");
                counters.dropped.fetch_add(1, Ordering::Relaxed);
            }
            Err(SensorError::Failed(e)) => {
                log::warn!("{e}");
                platform.notify("could not read cell info");
                counters.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Single-shot current reading, independent of any active session. Uses
/// the cached last known fix and writes nowhere.
pub fn snapshot(platform: &dyn Platform) -> Result<CellLogRow> {
    if !(platform.has_permission(PermissionScope::FineLocation)
        || platform.has_permission(PermissionScope::CoarseLocation)
        || platform.has_permission(PermissionScope::BackgroundLocation))
    {
        platform.notify("location permission is not granted");
        bail!("location permission not granted");
    }
    let fix = platform
        .last_location()
        .context("reading last known location")?;
    let raws = match platform.read_cell_info() {
        Ok(raws) => raws,
        Err(e) => {
            platform.notify("could not read cell info");
            return Err(e).context("reading cell info");
        }
    };
    let cells = match mapper::map_cell_info_list(&raws) {
        Ok(cells) => cells,
        Err(e) => {
            platform.notify("could not read cell info");
            return Err(e).context("mapping cell info");
        }
    };
    Ok(CellLogRow {
        location: LocationReading {
            altitude: fix.altitude,
            longitude: fix.longitude,
        },
        cell_info_list: cells,
        datetime: Local::now().naive_local(),
    })
}
