//! Actor that owns one [`TrackerState`] and executes its effects on tokio.
//!
//! The [`JobTracker`] handle sends commands into the actor's inbox; results of
//! network calls and timers come back through a second inbox. Both feed the
//! pure [`update`] function, so every transition is a plain message. The
//! latest [`TrackerView`] is published on a watch channel and replaced
//! wholesale after each transition.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use ingest_core::{
    update, Effect, Generation, JobId, Msg, PollSettings, TrackerState, TrackerView,
};
use ingest_logging::{ingest_debug, ingest_error};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::JobApi;

enum TrackerCommand {
    Start(JobId),
    Cancel,
    Reset,
    /// Acknowledged once every earlier command has been applied.
    Flush(oneshot::Sender<()>),
}

/// Handle to a tracker actor. Dropping it stops the actor and its timer.
pub struct JobTracker {
    cmd_tx: mpsc::UnboundedSender<TrackerCommand>,
    view_rx: watch::Receiver<TrackerView>,
}

impl JobTracker {
    /// Spawns the actor on the current tokio runtime.
    pub fn spawn(api: Arc<dyn JobApi>, settings: PollSettings) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(TrackerView::default());
        let actor = TrackerActor::new(api, settings, view_tx);
        tokio::spawn(actor.run(cmd_rx));
        Self { cmd_tx, view_rx }
    }

    /// Track `job_id`, superseding any other job. No-op if that job is
    /// already being polled.
    pub fn start_polling(&self, job_id: impl Into<JobId>) {
        let _ = self.cmd_tx.send(TrackerCommand::Start(job_id.into()));
    }

    /// Ask the server to cancel the active job. The outcome is observed by
    /// the next poll.
    pub fn cancel_job(&self) {
        let _ = self.cmd_tx.send(TrackerCommand::Cancel);
    }

    /// Forget the active job and stop polling.
    pub fn reset(&self) {
        let _ = self.cmd_tx.send(TrackerCommand::Reset);
    }

    pub fn view(&self) -> TrackerView {
        self.view_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackerView> {
        self.view_rx.clone()
    }

    /// Resolves once all commands sent so far are applied.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.cmd_tx.send(TrackerCommand::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Resolves with the first view that is not polling.
    pub async fn wait_for_idle(&self) -> TrackerView {
        self.flush().await;
        let mut view_rx = self.view_rx.clone();
        let view = match view_rx.wait_for(|view| !view.is_polling).await {
            Ok(view) => view.clone(),
            Err(_) => self.view(),
        };
        view
    }
}

/// Cancellation token of the polling loop that currently owns the timer.
#[derive(Default)]
struct LoopTimer {
    current: Option<(Generation, CancellationToken)>,
}

impl LoopTimer {
    fn token(&mut self, generation: Generation) -> CancellationToken {
        if let Some((owner, token)) = &self.current {
            if *owner == generation {
                return token.clone();
            }
        }
        self.release_all();
        let token = CancellationToken::new();
        self.current = Some((generation, token.clone()));
        token
    }

    fn release(&mut self, generation: Generation) {
        if matches!(&self.current, Some((owner, _)) if *owner == generation) {
            self.release_all();
        }
    }

    fn release_all(&mut self) {
        if let Some((_, token)) = self.current.take() {
            token.cancel();
        }
    }
}

impl Drop for LoopTimer {
    fn drop(&mut self) {
        self.release_all();
    }
}

struct TrackerActor {
    api: Arc<dyn JobApi>,
    state: TrackerState,
    view_tx: watch::Sender<TrackerView>,
    event_tx: mpsc::UnboundedSender<Msg>,
    event_rx: mpsc::UnboundedReceiver<Msg>,
    timer: LoopTimer,
}

impl TrackerActor {
    fn new(
        api: Arc<dyn JobApi>,
        settings: PollSettings,
        view_tx: watch::Sender<TrackerView>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            api,
            state: TrackerState::new(settings),
            view_tx,
            event_tx,
            event_rx,
            timer: LoopTimer::default(),
        }
    }

    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<TrackerCommand>) {
        loop {
            let msg = tokio::select! {
                command = cmd_rx.recv() => match command {
                    Some(TrackerCommand::Start(job_id)) => Msg::StartPolling { job_id },
                    Some(TrackerCommand::Cancel) => Msg::CancelRequested,
                    Some(TrackerCommand::Reset) => Msg::Reset,
                    Some(TrackerCommand::Flush(ack)) => {
                        let _ = ack.send(());
                        continue;
                    }
                    None => break,
                },
                Some(event) = self.event_rx.recv() => event,
            };
            self.dispatch(msg);
        }
        self.timer.release_all();
        ingest_debug!("Tracker handle dropped; actor stopped");
    }

    fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        if state.consume_dirty() {
            self.view_tx.send_replace(state.view());
        }
        self.state = state;
        for effect in effects {
            self.execute(effect);
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::FetchStatus { job_id, generation } => {
                let api = Arc::clone(&self.api);
                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    let fetch = AssertUnwindSafe(api.fetch_status(&job_id)).catch_unwind();
                    let result = match fetch.await {
                        Ok(result) => result.map_err(|err| err.to_string()),
                        Err(_) => {
                            ingest_error!("Status request for job {} panicked", job_id);
                            Err("status request aborted".to_string())
                        }
                    };
                    let _ = event_tx.send(Msg::StatusFetched { generation, result });
                });
            }
            Effect::ScheduleTick { generation, delay } => {
                let token = self.timer.token(generation);
                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = token.cancelled() => {}
                        _ = tokio::time::sleep(delay) => {
                            let _ = event_tx.send(Msg::Tick { generation });
                        }
                    }
                });
            }
            Effect::RequestCancel { job_id, generation } => {
                let api = Arc::clone(&self.api);
                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    let cancel = AssertUnwindSafe(api.cancel_job(&job_id)).catch_unwind();
                    let result = match cancel.await {
                        Ok(result) => result.map_err(|err| err.to_string()),
                        Err(_) => Err("cancel request aborted".to_string()),
                    };
                    let _ = event_tx.send(Msg::CancelFinished {
                        job_id,
                        generation,
                        result,
                    });
                });
            }
            Effect::TearDown { generation } => self.timer.release(generation),
        }
    }
}
