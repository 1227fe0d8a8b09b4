//! Single owner of a validator's ceremony state
//!
//! The [`CeremonyActor`] holds the [`DkgState`] and processes commands one at
//! a time, so event application and task execution never interleave. Other
//! components talk to it through a cloneable [`CeremonyHandle`].

use alloy_primitives::Address;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::error::{Result, TaskError};
use crate::runner::{TaskOutcome, TaskRunner};
use crate::state::{DkgEvent, DkgState};
use crate::task::{DkgTask, TaskContext};

const COMMAND_BUFFER: usize = 256;

/// Outcome of a queued task, delivered when the actor finishes it
pub type PendingOutcome = oneshot::Receiver<TaskOutcome>;

/// Messages understood by the actor
pub enum CeremonyCommand {
    /// Fold a chain event into the state
    ApplyEvent {
        event: DkgEvent,
        reply: oneshot::Sender<bool>,
    },

    /// Clone of the current state
    Snapshot { reply: oneshot::Sender<DkgState> },

    /// Drive a task through its lifecycle against the state
    RunTask {
        task: Box<dyn DkgTask>,
        reply: oneshot::Sender<TaskOutcome>,
    },

    /// Drop the current round and start from a `RegistrationOpened` event
    NewRound {
        event: DkgEvent,
        reply: oneshot::Sender<Result<()>>,
    },

    Shutdown,
}

/// Owns one validator's state
pub struct CeremonyActor {
    state: DkgState,
    ctx: TaskContext,
    round_cancel: CancellationToken,
    receiver: mpsc::Receiver<CeremonyCommand>,
}

impl CeremonyActor {
    /// Actor and handle for `account`, not yet running
    pub fn new(account: Address, ctx: TaskContext) -> (Self, CeremonyHandle) {
        let (sender, receiver) = mpsc::channel(COMMAND_BUFFER);
        let round_cancel = ctx.cancel.child_token();
        let actor = Self {
            state: DkgState::new(account),
            ctx,
            round_cancel,
            receiver,
        };
        (actor, CeremonyHandle { sender })
    }

    /// Start the actor on the runtime
    pub fn spawn(account: Address, ctx: TaskContext) -> (CeremonyHandle, JoinHandle<()>) {
        let (actor, handle) = Self::new(account, ctx);
        let span = info_span!(parent: &actor.ctx.span, "ceremony", account = %account);
        let join = tokio::spawn(actor.run().instrument(span));
        (handle, join)
    }

    /// Process commands until shutdown or every handle is dropped
    pub async fn run(mut self) {
        debug!("Ceremony actor started");
        while let Some(command) = self.receiver.recv().await {
            match command {
                CeremonyCommand::ApplyEvent { event, reply } => {
                    let applied = self.apply_event(&event);
                    let _ = reply.send(applied);
                }
                CeremonyCommand::Snapshot { reply } => {
                    let _ = reply.send(self.state.clone());
                }
                CeremonyCommand::RunTask { mut task, reply } => {
                    let outcome = self.run_task(task.as_mut()).await;
                    let _ = reply.send(outcome);
                }
                CeremonyCommand::NewRound { event, reply } => {
                    let _ = reply.send(self.new_round(&event));
                }
                CeremonyCommand::Shutdown => break,
            }
        }
        self.round_cancel.cancel();
        debug!("Ceremony actor stopped");
    }

    fn apply_event(&mut self, event: &DkgEvent) -> bool {
        let newer_round = event.is_registration_opened()
            && self.state.nonce != 0
            && event.nonce() > self.state.nonce;
        if newer_round {
            return self.new_round(event).is_ok();
        }
        self.state.apply(event)
    }

    fn new_round(&mut self, event: &DkgEvent) -> Result<()> {
        if !event.is_registration_opened() {
            return Err(TaskError::CanNotContinue(format!(
                "a round starts with RegistrationOpened, got {}",
                event.name()
            )));
        }
        if self.state.nonce != 0 && event.nonce() <= self.state.nonce {
            return Err(TaskError::CanNotContinue(format!(
                "round {} is not newer than round {}",
                event.nonce(),
                self.state.nonce
            )));
        }

        info!(
            previous = self.state.nonce,
            nonce = event.nonce(),
            "Starting new round"
        );
        self.round_cancel.cancel();
        self.round_cancel = self.ctx.cancel.child_token();
        self.state = DkgState::new(self.state.account);
        self.state.apply(event);
        Ok(())
    }

    async fn run_task(&mut self, task: &mut dyn DkgTask) -> TaskOutcome {
        let ctx = self.ctx.clone().with_cancel(self.round_cancel.clone());
        TaskRunner::new(ctx).drive(task, &mut self.state).await
    }
}

/// Cloneable access to a running [`CeremonyActor`]
#[derive(Clone)]
pub struct CeremonyHandle {
    sender: mpsc::Sender<CeremonyCommand>,
}

impl CeremonyHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> CeremonyCommand,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(command(reply))
            .await
            .map_err(|_| stopped())?;
        response.await.map_err(|_| stopped())
    }

    /// Apply `event`; `false` when the state ignored it
    pub async fn apply_event(&self, event: DkgEvent) -> Result<bool> {
        self.request(|reply| CeremonyCommand::ApplyEvent { event, reply })
            .await
    }

    /// Apply events in order, returning how many were used
    pub async fn apply_events(&self, events: impl IntoIterator<Item = DkgEvent>) -> Result<usize> {
        let mut applied = 0;
        for event in events {
            if self.apply_event(event).await? {
                applied += 1;
            }
        }
        Ok(applied)
    }

    pub async fn snapshot(&self) -> Result<DkgState> {
        self.request(|reply| CeremonyCommand::Snapshot { reply }).await
    }

    /// Queue `event` behind the commands already sent, without waiting
    pub async fn post_event(&self, event: DkgEvent) -> Result<()> {
        let (reply, _) = oneshot::channel();
        self.sender
            .send(CeremonyCommand::ApplyEvent { event, reply })
            .await
            .map_err(|_| stopped())
    }

    /// Drive `task` on the actor and wait for the outcome
    pub async fn run_task(&self, task: Box<dyn DkgTask>) -> Result<TaskOutcome> {
        self.request(|reply| CeremonyCommand::RunTask { task, reply })
            .await
    }

    /// Queue `task`; the outcome arrives on the returned receiver
    pub async fn enqueue_task(&self, task: Box<dyn DkgTask>) -> Result<PendingOutcome> {
        let (reply, outcome) = oneshot::channel();
        self.sender
            .send(CeremonyCommand::RunTask { task, reply })
            .await
            .map_err(|_| stopped())?;
        Ok(outcome)
    }

    pub async fn new_round(&self, event: DkgEvent) -> Result<()> {
        self.request(|reply| CeremonyCommand::NewRound { event, reply })
            .await?
    }

    pub async fn shutdown(&self) {
        if self.sender.send(CeremonyCommand::Shutdown).await.is_err() {
            warn!("Ceremony actor already stopped");
        }
    }
}

fn stopped() -> TaskError {
    TaskError::CanNotContinue("ceremony actor stopped".to_string())
}
