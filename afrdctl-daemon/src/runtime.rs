use std::future::Future;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::{io_err, ControlError};
use crate::layout::{Hz, StatusSnapshot};
use crate::process::{PrivilegedShell, ProcessController, SuShell};
use crate::status::StatusChannel;

/// Why the supervisor relaunched the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RestartReason {
    /// No status on the very first poll.
    FirstRun,
    /// The running daemon publishes a different version than expected.
    VersionMismatch { running: String, expected: String },
    /// The status region stayed unavailable until its detector gave up.
    StatusUnavailable,
    /// The status region is readable but no daemon process owns it.
    NotRunning,
}

/// Time a relaunched daemon gets to write its PID file before the liveness
/// check applies again.
pub const RESTART_GRACE: Duration = Duration::from_secs(10);

/// Outcome of one poll.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    /// A new status generation was decoded.
    pub changed: bool,
    pub restarted: Option<RestartReason>,
    /// New refresh rate worth announcing.
    pub rate_change: Option<Hz>,
    pub snapshot: Option<StatusSnapshot>,
}

/// Remembers the last rate/blackout pair to report rate switches once.
#[derive(Debug, Clone, Default)]
struct RateWatch {
    last: Option<(Hz, bool)>,
}

impl RateWatch {
    fn observe(&mut self, hz: Hz, blackened: bool) -> Option<Hz> {
        if self.last == Some((hz, blackened)) {
            return None;
        }
        // The first observation is the daemon starting up, not a switch.
        let first = self.last.is_none();
        self.last = Some((hz, blackened));
        (!first && !blackened).then_some(hz)
    }
}

/// Keeps the daemon alive and reports what it publishes.
#[derive(Debug)]
pub struct Supervisor<S = SuShell> {
    channel: StatusChannel,
    controller: ProcessController<S>,
    expected_version: Option<String>,
    first_run: bool,
    last_restart: Option<Instant>,
    rate: RateWatch,
}

impl<S: PrivilegedShell> Supervisor<S> {
    pub fn new(controller: ProcessController<S>, expected_version: Option<String>) -> Self {
        let channel = StatusChannel::new(&controller.paths().status_region);
        Self {
            channel,
            controller,
            expected_version,
            first_run: true,
            last_restart: None,
            rate: RateWatch::default(),
        }
    }

    pub fn channel(&self) -> &StatusChannel {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut StatusChannel {
        &mut self.channel
    }

    pub fn controller(&self) -> &ProcessController<S> {
        &self.controller
    }

    /// One poll: refresh the status, relaunch the daemon if needed and
    /// detect refresh-rate switches.
    pub fn tick(&mut self) -> TickReport {
        self.tick_at(Instant::now())
    }

    /// [`tick`](Self::tick) observed at `now`.
    pub fn tick_at(&mut self, now: Instant) -> TickReport {
        if !self.channel.is_open() {
            self.channel.open();
        }
        let changed = self.channel.refresh();

        let restarted = self.check_daemon(now);

        let rate_change = if self.channel.is_open() {
            self.channel
                .snapshot()
                .and_then(|snap| self.rate.observe(snap.current_hz, snap.blackened))
        } else {
            None
        };

        TickReport {
            changed,
            restarted,
            rate_change,
            snapshot: self.channel.snapshot().cloned(),
        }
    }

    fn check_daemon(&mut self, now: Instant) -> Option<RestartReason> {
        let first_run = std::mem::replace(&mut self.first_run, false);

        let reason = if self.channel.is_open() {
            let snapshot = self.channel.snapshot()?;
            let running = snapshot.version();
            match self.expected_version.as_deref() {
                Some(expected) if running != expected => {
                    tracing::info!(%running, %expected, "restarting daemon because of wrong version");
                    RestartReason::VersionMismatch {
                        running,
                        expected: expected.to_string(),
                    }
                }
                _ if self.in_grace(now) || self.controller.is_running() => return None,
                _ => {
                    // A crashed daemon leaves its last generation behind.
                    tracing::info!(version = %running, "restarting daemon because it is not running");
                    RestartReason::NotRunning
                }
            }
        } else if first_run {
            RestartReason::FirstRun
        } else if self.channel.failures().give_up() {
            tracing::info!("restarting daemon because its status stayed unavailable");
            RestartReason::StatusUnavailable
        } else {
            return None;
        };

        self.channel.close();
        if let Err(err) = self.controller.restart() {
            tracing::error!(error = %err, "daemon restart failed");
        }
        // Let the channel retry against the fresh instance.
        self.channel.failures_mut().success();
        self.last_restart = Some(now);
        Some(reason)
    }

    fn in_grace(&self, now: Instant) -> bool {
        self.last_restart
            .is_some_and(|at| now.saturating_duration_since(at) < RESTART_GRACE)
    }

    /// Poll every `interval` until `shutdown` resolves, handing each report
    /// to `on_tick`. The first poll happens immediately.
    pub async fn run_until<F, T>(&mut self, interval: Duration, shutdown: F, mut on_tick: T)
    where
        F: Future<Output = ()>,
        T: FnMut(&TickReport),
    {
        let mut interval = tokio::time::interval(interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    let report = self.tick();
                    on_tick(&report);
                }
            }
        }
    }

    /// Poll until ctrl-c.
    pub async fn run<T>(&mut self, interval: Duration, on_tick: T) -> Result<(), ControlError>
    where
        T: FnMut(&TickReport),
    {
        let mut signal_error = None;
        let shutdown = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("received ctrl-c, stopping supervisor"),
                Err(err) => signal_error = Some(err),
            }
        };
        self.run_until(interval, shutdown, on_tick).await;
        match signal_error {
            Some(err) => Err(io_err("ctrl-c", err)),
            None => Ok(()),
        }
    }
}

/// Install tracing and drive `supervisor` on a single-threaded runtime until ctrl-c.
pub fn start_blocking<S, T>(
    supervisor: &mut Supervisor<S>,
    interval: Duration,
    on_tick: T,
) -> Result<(), ControlError>
where
    S: PrivilegedShell,
    T: FnMut(&TickReport),
{
    init_tracing();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(supervisor.run(interval, on_tick))
}

/// `RUST_LOG`-driven subscriber on stderr, `info` when unset.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_watch_skips_first_and_blackened() {
        let mut watch = RateWatch::default();
        assert_eq!(watch.observe(Hz::from_hz(60), false), None);
        assert_eq!(watch.observe(Hz::from_hz(60), false), None);
        assert_eq!(watch.observe(Hz::from_hz(24), true), None);
        assert_eq!(watch.observe(Hz::from_hz(24), false), Some(Hz::from_hz(24)));
        assert_eq!(watch.observe(Hz::from_hz(24), false), None);
        assert_eq!(watch.observe(Hz::from_hz(50), false), Some(Hz::from_hz(50)));
    }
}
