//! Local ceremony driver
//!
//! One [`CeremonyActor`] per validator shares an [`InMemoryEthDkg`] contract.
//! The driver owns the block clock: every tick it collects finished tasks,
//! forwards new contract events to all actors, and queues the tasks whose
//! windows just opened. Windows are derived from an observer state that only
//! sees public events, so every validator gets the same schedule.

use alloy_primitives::Address;
use ark_bn254::G2Affine;
use ethdkg_crypto::g2_to_bytes;
use ethdkg_math::MIN_PARTICIPANTS;
use ethdkg_tasks::{
    CeremonyActor, CeremonyHandle, DkgState, DkgTask, EthDkgChain, InMemoryEthDkg,
    PendingOutcome, Schedule, TaskContext, TaskKind, TaskOutcome, TaskWindow,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Span};

use crate::config::NodeConfig;
use crate::error::Result;

/// Builds a replacement task for one validator
pub type TaskFactory = Arc<dyn Fn(TaskWindow) -> Box<dyn DkgTask> + Send + Sync>;

/// Deterministic address of the `position`-th local validator (1-based)
pub fn validator_address(position: u64) -> Address {
    let mut bytes = [0u8; 20];
    bytes[12..].copy_from_slice(&position.to_be_bytes());
    Address::from(bytes)
}

/// Runs ceremony rounds between local validators
pub struct LocalCeremony {
    config: NodeConfig,
    accounts: Vec<Address>,
    overrides: HashMap<(Address, TaskKind), TaskFactory>,
    span: Span,
}

impl LocalCeremony {
    pub fn new(config: NodeConfig) -> Result<Self> {
        config.validate()?;
        let accounts = (1..=config.validator_count as u64)
            .map(validator_address)
            .collect();
        Ok(Self {
            config,
            accounts,
            overrides: HashMap::new(),
            span: Span::current(),
        })
    }

    /// Validator accounts in registration order
    pub fn accounts(&self) -> &[Address] {
        &self.accounts
    }

    /// Parent span for every actor and task
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Run `factory`'s task instead of the standard one for `account`
    pub fn with_override(mut self, account: Address, kind: TaskKind, factory: TaskFactory) -> Self {
        self.overrides.insert((account, kind), factory);
        self
    }

    fn build_task(&self, account: Address, kind: TaskKind, window: TaskWindow) -> Box<dyn DkgTask> {
        match self.overrides.get(&(account, kind)) {
            Some(factory) => factory(window),
            None => kind.build(window),
        }
    }

    /// Run rounds until one completes or `max_rounds` is reached
    pub async fn run(self) -> Result<CeremonyReport> {
        let chain = Arc::new(InMemoryEthDkg::new(
            self.accounts.clone(),
            self.config.phase_length,
            self.config.confirmation_length,
        ));
        let cancel = CancellationToken::new();

        let mut actors = Vec::with_capacity(self.accounts.len());
        let mut joins = Vec::with_capacity(self.accounts.len());
        for account in &self.accounts {
            let ctx = TaskContext::new(chain.clone(), self.config.tasks.clone())
                .with_span(self.span.clone())
                .with_cancel(cancel.child_token());
            let (handle, join) = CeremonyActor::spawn(*account, ctx);
            actors.push((*account, handle));
            joins.push(join);
        }

        let mut rounds = Vec::new();
        let mut cursor = 0;
        for attempt in 1..=self.config.max_rounds {
            let pool = chain.validator_addresses().await?;
            if pool.len() < MIN_PARTICIPANTS {
                warn!(pool = pool.len(), "Validator pool too small for another round");
                break;
            }

            chain.initialize_round().await;
            let round = self.drive_round(&chain, &actors, &pool, &mut cursor).await?;
            let complete = round.complete;
            rounds.push(round);
            if complete {
                break;
            }
            warn!(attempt, "Round did not complete");
        }

        for (_, handle) in &actors {
            handle.shutdown().await;
        }
        cancel.cancel();
        for join in joins {
            if let Err(e) = join.await {
                warn!(error = %e, "Ceremony actor panicked");
            }
        }

        Ok(CeremonyReport { rounds })
    }

    async fn drive_round(
        &self,
        chain: &InMemoryEthDkg,
        actors: &[(Address, CeremonyHandle)],
        pool: &[Address],
        cursor: &mut usize,
    ) -> Result<RoundReport> {
        let mut observer = DkgState::new(Address::ZERO);
        let mut dispatched: HashSet<(TaskKind, u64)> = HashSet::new();
        let mut pending: Vec<(Address, PendingOutcome)> = Vec::new();
        let mut outcomes = Vec::new();
        let first_block = chain.current_height().await?;

        loop {
            collect_finished(&mut pending, &mut outcomes);
            deliver_events(chain, actors, &mut observer, cursor).await?;
            if observer.complete {
                break;
            }

            let height = chain.current_height().await?;
            let schedule = Schedule::for_round(&observer)?;
            for (kind, window) in schedule.windows_at(height) {
                if !dispatched.insert((kind, window.start)) {
                    continue;
                }
                debug!(task = %kind, start = window.start, end = window.end, "Window opened");
                for (account, handle) in actors.iter().filter(|(a, _)| pool.contains(a)) {
                    let task = self.build_task(*account, kind, window);
                    pending.push((*account, handle.enqueue_task(task).await?));
                }
            }

            let upcoming = schedule.iter().any(|task| task.end > height);
            if !upcoming && pending.is_empty() {
                warn!(
                    nonce = observer.nonce,
                    phase = %observer.phase,
                    height,
                    "No task windows left"
                );
                break;
            }
            if height - first_block >= self.config.max_blocks {
                warn!(nonce = observer.nonce, height, "Round exceeded its block budget");
                break;
            }

            sleep(self.config.block_time()).await;
            chain.advance_blocks(1).await;
        }

        for (account, outcome) in pending {
            match outcome.await {
                Ok(outcome) => outcomes.push((account, outcome)),
                Err(_) => warn!(%account, "Ceremony actor dropped a task"),
            }
        }
        deliver_events(chain, actors, &mut observer, cursor).await?;

        let mut states = Vec::with_capacity(actors.len());
        for (_, handle) in actors {
            states.push(handle.snapshot().await?);
        }

        let report = RoundReport {
            nonce: observer.nonce,
            complete: observer.complete,
            master_public_key: observer.master_public_key,
            pool: chain.validator_addresses().await?,
            bad_participants: chain.bad_participants().await?,
            states,
            outcomes,
        };
        info!(
            nonce = report.nonce,
            complete = report.complete,
            bad_participants = report.bad_participants,
            "Round finished"
        );
        Ok(report)
    }
}

/// Forward events emitted since `cursor` to the observer and every actor
async fn deliver_events(
    chain: &InMemoryEthDkg,
    actors: &[(Address, CeremonyHandle)],
    observer: &mut DkgState,
    cursor: &mut usize,
) -> Result<()> {
    let events = chain.events_since(*cursor).await;
    *cursor += events.len();
    for event in events {
        observer.apply(&event);
        for (_, handle) in actors {
            handle.post_event(event.clone()).await?;
        }
    }
    Ok(())
}

fn collect_finished(
    pending: &mut Vec<(Address, PendingOutcome)>,
    outcomes: &mut Vec<(Address, TaskOutcome)>,
) {
    let mut running = Vec::with_capacity(pending.len());
    for (account, mut receiver) in pending.drain(..) {
        match receiver.try_recv() {
            Ok(outcome) => {
                debug!(%account, task = %outcome.kind, success = outcome.success, "Task outcome");
                outcomes.push((account, outcome));
            }
            Err(TryRecvError::Empty) => running.push((account, receiver)),
            Err(TryRecvError::Closed) => warn!(%account, "Ceremony actor dropped a task"),
        }
    }
    *pending = running;
}

/// Everything observed during one round
pub struct RoundReport {
    pub nonce: u64,

    /// The validator set was completed on-chain
    pub complete: bool,

    pub master_public_key: Option<G2Affine>,

    /// Validator pool when the round ended
    pub pool: Vec<Address>,

    /// Participants penalized during the round
    pub bad_participants: u64,

    /// Final state of every actor, in account order
    pub states: Vec<DkgState>,

    pub outcomes: Vec<(Address, TaskOutcome)>,
}

impl RoundReport {
    pub fn state_of(&self, account: Address) -> Option<&DkgState> {
        self.states.iter().find(|state| state.account == account)
    }

    /// Outcomes of every `kind` task
    pub fn outcomes_of(&self, kind: TaskKind) -> impl Iterator<Item = &(Address, TaskOutcome)> {
        self.outcomes
            .iter()
            .filter(move |(_, outcome)| outcome.kind == kind)
    }

    /// Number of `kind` tasks that achieved their effect
    pub fn successes(&self, kind: TaskKind) -> usize {
        self.outcomes_of(kind)
            .filter(|(_, outcome)| outcome.success)
            .count()
    }

    pub fn summary(&self) -> RoundSummary {
        let mut successful_tasks = BTreeMap::new();
        for (_, outcome) in &self.outcomes {
            if outcome.success {
                *successful_tasks.entry(outcome.kind.to_string()).or_insert(0) += 1;
            }
        }
        RoundSummary {
            nonce: self.nonce,
            complete: self.complete,
            master_public_key: self
                .master_public_key
                .map(|key| hex::encode(g2_to_bytes(&key))),
            validators: self.pool.clone(),
            bad_participants: self.bad_participants,
            successful_tasks,
        }
    }
}

/// Result of a [`LocalCeremony`] run
pub struct CeremonyReport {
    /// Rounds in the order they ran
    pub rounds: Vec<RoundReport>,
}

impl CeremonyReport {
    /// Whether the last round completed
    pub fn complete(&self) -> bool {
        self.final_round().map_or(false, |round| round.complete)
    }

    pub fn final_round(&self) -> Option<&RoundReport> {
        self.rounds.last()
    }

    pub fn summary(&self) -> CeremonySummary {
        CeremonySummary {
            complete: self.complete(),
            rounds: self.rounds.iter().map(RoundReport::summary).collect(),
        }
    }
}

/// Printable digest of a round
#[derive(Debug, Clone, Serialize)]
pub struct RoundSummary {
    pub nonce: u64,
    pub complete: bool,

    /// Hex of the EVM encoding of the master public key
    pub master_public_key: Option<String>,

    pub validators: Vec<Address>,
    pub bad_participants: u64,

    /// Successful tasks per kind
    pub successful_tasks: BTreeMap<String, usize>,
}

/// Printable digest of a ceremony
#[derive(Debug, Clone, Serialize)]
pub struct CeremonySummary {
    pub complete: bool,
    pub rounds: Vec<RoundSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_config(validator_count: usize) -> NodeConfig {
        let mut config = NodeConfig {
            validator_count,
            phase_length: 12,
            confirmation_length: 2,
            block_time_ms: 100,
            ..NodeConfig::default()
        };
        config.tasks.retry_delay_ms = 30;
        config.tasks.max_retries = 4;
        config.tasks.desperation_delay = 0;
        config
    }

    #[test]
    fn test_validator_addresses_are_distinct() {
        let first = validator_address(1);
        assert_eq!(first, Address::with_last_byte(1));
        assert_ne!(validator_address(256), validator_address(1));
        assert_eq!(validator_address(256).0[18], 1);
    }

    #[test]
    fn test_rejects_small_committee() {
        assert!(LocalCeremony::new(quick_config(3)).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceremony_completes() {
        let ceremony = LocalCeremony::new(quick_config(4)).unwrap();
        let accounts = ceremony.accounts().to_vec();
        let report = ceremony.run().await.unwrap();

        assert!(report.complete());
        assert_eq!(report.rounds.len(), 1);
        let round = &report.rounds[0];
        assert_eq!(round.nonce, 1);
        assert_eq!(round.bad_participants, 0);
        assert_eq!(round.successes(TaskKind::Register), 4);
        assert_eq!(round.successes(TaskKind::MpkSubmission), 1);
        assert!(round.master_public_key.is_some());

        for account in &accounts {
            let state = round.state_of(*account).unwrap();
            assert!(state.complete);
            assert_eq!(state.master_public_key, round.master_public_key);
        }

        let summary = report.summary();
        assert!(summary.complete);
        assert_eq!(summary.rounds[0].validators.len(), 4);
        assert_eq!(summary.rounds[0].successful_tasks.get("register"), Some(&4));
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"complete\":true"));
    }
}
