//! The order-request poller.
//!
//! One task owns all poll state. Checks run in spawned tasks and report back
//! over a channel; `is_checking` keeps at most one of them in flight. Alerts
//! fire at most once per detected increase of the pending count.

pub mod state;

use core::time::Duration;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use url::Url;

use crate::ajax::{DynPendingSource, PendingSnapshot};
use crate::audio::AudioAlert;
use crate::config::PollerSettings;
use crate::error::PollError;
use crate::notifier::{self, DynNotifier};
use crate::surface::{DynSurface, TitleCounter};

pub use state::{PollState, Verdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Check,
    Play,
    Unlock,
    /// The user is looking again: clear the counter and re-arm the baseline.
    Focus,
}

/// Manual triggers offered to whatever UI drives the poller.
pub trait PollerControl {
    fn check_now(&self);
    fn play(&self);
    fn unlock(&self);
    fn focus(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerStatus {
    pub notification_count: u32,
    pub has_baseline: bool,
    pub last_total_pending: Option<u64>,
    pub last_check_time: i64,
    pub is_checking: bool,
    pub checks_completed: u64,
}

pub struct Poller {
    settings: PollerSettings,
    source: Arc<DynPendingSource>,
    audio: Arc<AudioAlert>,
    surface: Arc<DynSurface>,
    notifier: Arc<DynNotifier>,
    requests_page: Url,
    title: TitleCounter,
    state: PollState,
    notification_count: u32,
    checks_completed: u64,
    last_modal_at: Option<Instant>,
    status: watch::Sender<PollerStatus>,
}

impl Poller {
    pub fn new(
        settings: PollerSettings,
        source: Arc<DynPendingSource>,
        audio: Arc<AudioAlert>,
        surface: Arc<DynSurface>,
        notifier: Arc<DynNotifier>,
        requests_page: Url,
    ) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX));

        let state = PollState::new(now);
        let (status, _) = watch::channel(status_of(&state, 0, 0));

        Self {
            title: TitleCounter::new(&settings.title),
            settings,
            source,
            audio,
            surface,
            notifier,
            requests_page,
            state,
            notification_count: 0,
            checks_completed: 0,
            last_modal_at: None,
            status,
        }
    }

    /// Spawns the poll loop. The first check runs after the startup delay.
    pub fn start(self) -> PollerHandle {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let status = self.status.subscribe();
        let shutdown = Arc::new(Notify::new());

        let task = tokio::spawn(self.run(commands_tx.clone(), commands_rx, Arc::clone(&shutdown)));

        PollerHandle {
            commands: commands_tx,
            status,
            shutdown,
            task,
        }
    }

    async fn run(
        mut self,
        commands_tx: UnboundedSender<Command>,
        mut commands: UnboundedReceiver<Command>,
        shutdown: Arc<Notify>,
    ) {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();

        self.surface.set_title(&self.title.render(0));
        schedule(&commands_tx, self.settings.startup_delay, Command::Check);

        let interval = self.settings.interval;
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        log::info!("Checking for new order requests every {}s", interval.as_secs());

        loop {
            tokio::select! {
                () = shutdown.notified() => break,
                _ = ticker.tick() => self.check_new_requests(&done_tx),
                Some(command) = commands.recv() => self.handle(command, &done_tx),
                Some(result) = done_rx.recv() => self.complete(result, &commands_tx),
            }
        }

        log::info!("Poller stopped");
    }

    fn handle(&mut self, command: Command, done: &UnboundedSender<Result<PendingSnapshot, PollError>>) {
        match command {
            Command::Check => self.check_new_requests(done),
            Command::Play => self.spawn_play(),
            Command::Unlock => {
                let audio = Arc::clone(&self.audio);
                let surface = Arc::clone(&self.surface);
                tokio::spawn(async move {
                    audio.try_unlock().await;
                    surface.sound_prompt(audio.sound_blocked().await);
                });
            }
            Command::Focus => self.focus(),
        }
    }

    fn check_new_requests(&mut self, done: &UnboundedSender<Result<PendingSnapshot, PollError>>) {
        if self.state.is_checking {
            log::debug!("Check already in flight, skipping");
            return;
        }

        self.state.is_checking = true;
        self.publish();

        let source = Arc::clone(&self.source);
        let last_check = self.state.last_check_time;
        let details = self.settings.show_requests;
        let done = done.clone();

        tokio::spawn(async move {
            let result = source.fetch(last_check, details).await;
            let _ = done.send(result);
        });
    }

    fn complete(
        &mut self,
        result: Result<PendingSnapshot, PollError>,
        commands: &UnboundedSender<Command>,
    ) {
        self.state.is_checking = false;
        self.checks_completed += 1;

        match result {
            Ok(snapshot) => self.apply(&snapshot),
            Err(e) if e.is_retryable() => {
                log::warn!(
                    "Pending check failed: {e}; retrying in {}s",
                    self.settings.retry_delay.as_secs()
                );
                schedule(commands, self.settings.retry_delay, Command::Check);
            }
            Err(e) => log::debug!("Ignoring check response: {e}"),
        }

        self.publish();
    }

    fn apply(&mut self, snapshot: &PendingSnapshot) {
        match self.state.observe(snapshot) {
            Verdict::Baseline => {
                if let Some(total) = snapshot.total_pending {
                    log::info!("{total} order request(s) pending");
                }
            }
            Verdict::Quiet => {}
            Verdict::Alert => self.alert(snapshot),
        }
    }

    fn alert(&mut self, snapshot: &PendingSnapshot) {
        self.notification_count += 1;

        self.spawn_play();
        self.surface.set_title(&self.title.render(self.notification_count));

        if self.settings.show_requests && !snapshot.requests.is_empty() {
            self.surface.prepend_requests(&snapshot.requests);
        }

        let now = Instant::now();
        let modal_due = self
            .last_modal_at
            .is_none_or(|last| now.duration_since(last) >= self.settings.modal_throttle);

        if modal_due {
            self.last_modal_at = Some(now);

            let pending = snapshot.total_pending.unwrap_or(snapshot.count);
            let (title, body) = notifier::alert_message(pending, self.requests_page.as_str());
            log::info!("{}", body.lines().next().unwrap_or_default());

            let notifier = Arc::clone(&self.notifier);
            tokio::spawn(async move { notifier.notify(&title, &body).await });
        }
    }

    fn focus(&mut self) {
        self.notification_count = 0;
        self.surface.set_title(&self.title.render(0));
        self.state.reset_baseline();
        self.publish();
        log::debug!("Focus regained, baseline cleared");
    }

    fn spawn_play(&self) {
        let audio = Arc::clone(&self.audio);
        let surface = Arc::clone(&self.surface);

        tokio::spawn(async move {
            audio.play().await;
            surface.sound_prompt(audio.sound_blocked().await);
        });
    }

    fn publish(&self) {
        self.status.send_replace(status_of(
            &self.state,
            self.notification_count,
            self.checks_completed,
        ));
    }
}

fn status_of(state: &PollState, notification_count: u32, checks_completed: u64) -> PollerStatus {
    PollerStatus {
        notification_count,
        has_baseline: state.has_baseline,
        last_total_pending: state.last_total_pending,
        last_check_time: state.last_check_time,
        is_checking: state.is_checking,
        checks_completed,
    }
}

/// One-shot timer posting `command`. Never cancelled.
fn schedule(commands: &UnboundedSender<Command>, delay: Duration, command: Command) {
    let commands = commands.clone();

    tokio::spawn(async move {
        time::sleep(delay).await;
        let _ = commands.send(command);
    });
}

pub struct PollerHandle {
    commands: UnboundedSender<Command>,
    status: watch::Receiver<PollerStatus>,
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn status(&self) -> PollerStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollerStatus> {
        self.status.clone()
    }

    pub async fn stop(self) {
        self.shutdown.notify_one();

        if let Err(e) = self.task.await {
            log::error!("Poller task failed: {e}");
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            log::warn!("Poller is not running");
        }
    }
}

impl PollerControl for PollerHandle {
    fn check_now(&self) {
        self.send(Command::Check);
    }

    fn play(&self) {
        self.send(Command::Play);
    }

    fn unlock(&self) {
        self.send(Command::Unlock);
    }

    fn focus(&self) {
        self.send(Command::Focus);
    }
}
