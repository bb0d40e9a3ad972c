use crate::error::CoreError;
use crate::service_control::MasterSwitch;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::time::{sleep, Duration, Instant};

const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug)]
struct Grant {
    active: bool,
    deadline: Option<Instant>,
    /// Bumped on every transition; a countdown only acts if its epoch is still current.
    epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantStatus {
    pub active: bool,
    /// `None` while inactive or active without a deadline
    pub remaining: Option<Duration>,
}

/// Published once per countdown that ran out while still current.
#[derive(Debug, Clone)]
pub struct GrantExpired {
    pub epoch: u64,
    pub outcome: Result<(), CoreError>,
}

/// Owns the single time-boxed grant and the countdowns that end it.
///
/// Superseded countdowns are never cancelled. They notice the epoch change at their next poll
/// and exit without side effects, so any number of them may be sleeping at once.
pub struct GrantTimer {
    inner: Arc<TimerInner>,
}

struct TimerInner {
    /// Held for a whole transition, switch command included. Always taken before `grant`.
    transitions: Mutex<()>,
    /// Only held to read or write fields, never across an Executor call.
    grant: Mutex<Grant>,
    switch: MasterSwitch,
    events: broadcast::Sender<GrantExpired>,
    poll_interval: Duration,
    runtime: Handle,
}

fn deadline_after(duration: Duration) -> Result<Instant, CoreError> {
    Instant::now()
        .checked_add(duration)
        .ok_or(CoreError::InvalidDuration {
            seconds: duration.as_secs(),
        })
}

impl GrantTimer {
    /// Must be called from within a Tokio runtime; countdowns are spawned onto it.
    pub fn new(switch: MasterSwitch, poll_interval: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(TimerInner {
                transitions: Mutex::new(()),
                grant: Mutex::new(Grant {
                    active: false,
                    deadline: None,
                    epoch: 0,
                }),
                switch,
                events,
                poll_interval,
                runtime: Handle::current(),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GrantExpired> {
        self.inner.events.subscribe()
    }

    /// Opens the guarded port, for `duration` or until disabled.
    pub fn enable(&self, duration: Option<Duration>) -> Result<(), CoreError> {
        let _transition = self.inner.transitions.lock();

        let deadline = duration.map(deadline_after).transpose()?;

        self.inner.switch.enable()?;

        let mut grant = self.inner.grant.lock();
        grant.active = true;
        grant.epoch += 1;
        grant.deadline = deadline;
        let epoch = grant.epoch;
        drop(grant);

        match (duration, deadline) {
            (Some(duration), Some(deadline)) => {
                log::info!(
                    "Access enabled for {}s (epoch {})",
                    duration.as_secs(),
                    epoch
                );
                self.start_countdown(epoch, deadline);
            }
            _ => log::info!("Access enabled without time limit (epoch {})", epoch),
        }

        Ok(())
    }

    /// Moves the deadline of an active grant to `duration` from now.
    pub fn extend(&self, duration: Duration) -> Result<(), CoreError> {
        let _transition = self.inner.transitions.lock();

        if !self.inner.grant.lock().active {
            return Err(CoreError::GrantInactive);
        }

        let deadline = deadline_after(duration)?;

        let mut grant = self.inner.grant.lock();
        grant.epoch += 1;
        grant.deadline = Some(deadline);
        let epoch = grant.epoch;
        drop(grant);

        log::info!(
            "Access deadline reset to {}s from now (epoch {})",
            duration.as_secs(),
            epoch
        );
        self.start_countdown(epoch, deadline);

        Ok(())
    }

    pub fn disable(&self) -> Result<(), CoreError> {
        let _transition = self.inner.transitions.lock();

        self.inner.switch.disable()?;

        let mut grant = self.inner.grant.lock();
        grant.active = false;
        grant.deadline = None;
        grant.epoch += 1;
        log::info!("Access disabled (epoch {})", grant.epoch);

        Ok(())
    }

    pub fn status(&self) -> GrantStatus {
        let grant = self.inner.grant.lock();
        GrantStatus {
            active: grant.active,
            remaining: grant
                .deadline
                .map(|deadline| deadline.saturating_duration_since(Instant::now())),
        }
    }

    fn start_countdown(&self, epoch: u64, deadline: Instant) {
        self.inner
            .runtime
            .spawn(run_countdown(self.inner.clone(), epoch, deadline));
    }
}

impl TimerInner {
    fn current_epoch(&self) -> u64 {
        self.grant.lock().epoch
    }

    /// Disables access if `epoch` is still current. The transition lock is held across the
    /// disable command so no other transition can slip in between the check and the switch.
    ///
    /// Returns `None` for a superseded countdown.
    fn expire(&self, epoch: u64) -> Option<Result<(), CoreError>> {
        let _transition = self.transitions.lock();

        if self.current_epoch() != epoch {
            return None;
        }

        let outcome = self.switch.disable();
        match &outcome {
            Ok(()) => {
                let mut grant = self.grant.lock();
                grant.active = false;
                grant.deadline = None;
                grant.epoch += 1;
                log::info!("Access grant expired, access disabled");
            }
            Err(e) => log::error!("Access grant expired, but disabling access failed: {}", e),
        }

        Some(outcome)
    }

    fn notify(&self, event: GrantExpired) {
        // Only fails if nobody subscribed; the disable already happened either way
        if self.events.send(event).is_err() {
            log::warn!(
                "{}",
                CoreError::Notification("no subscriber is listening".to_string())
            );
        }
    }
}

async fn run_countdown(inner: Arc<TimerInner>, epoch: u64, deadline: Instant) {
    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }

        sleep((deadline - now).min(inner.poll_interval)).await;

        let current_epoch = inner.current_epoch();
        if current_epoch != epoch {
            log::debug!(
                "Countdown for epoch {} superseded by epoch {}",
                epoch,
                current_epoch
            );
            return;
        }
    }

    let expiring = inner.clone();
    let outcome = match inner
        .runtime
        .spawn_blocking(move || expiring.expire(epoch))
        .await
    {
        Ok(Some(outcome)) => outcome,
        Ok(None) => {
            log::debug!("Countdown for epoch {} superseded at deadline", epoch);
            return;
        }
        Err(e) => {
            log::error!("Grant expiry for epoch {} did not complete: {}", epoch, e);
            return;
        }
    };

    inner.notify(GrantExpired { epoch, outcome });
}
