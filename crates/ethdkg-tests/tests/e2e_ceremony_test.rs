//! End-to-end ceremony tests for ETHDKG
//!
//! These tests run every validator as its own actor against the in-memory
//! contract, from registration through completion, with a paused clock so
//! block production and retries advance deterministically.

use alloy_primitives::Address;
use async_trait::async_trait;
use std::sync::Arc;

use ethdkg_crypto::{g2_mul, sign, verify, Fr};
use ethdkg_math::INITIAL_MESSAGE;
use ethdkg_node::{LocalCeremony, NodeConfig, TaskFactory};
use ethdkg_tasks::{
    general_should_retry, require_phase, submit_and_wait, CeremonySnapshot, DkgCall, DkgState,
    DkgTask, Phase, TaskContext, TaskError, TaskKind, TaskWindow,
};

fn ceremony_config(validator_count: usize) -> NodeConfig {
    let mut config = NodeConfig {
        validator_count,
        phase_length: 20,
        confirmation_length: 2,
        block_time_ms: 100,
        max_blocks: 500,
        max_rounds: 2,
        ..NodeConfig::default()
    };
    config.tasks.retry_delay_ms = 30;
    config.tasks.max_retries = 5;
    config.tasks.desperation_delay = 0;
    config
}

/// Publishes a self-consistent gpkj that is not derived from the shares
struct ForgedGpkjTask {
    window: TaskWindow,
    success: bool,
}

#[async_trait]
impl DkgTask for ForgedGpkjTask {
    fn kind(&self) -> TaskKind {
        TaskKind::GpkjSubmission
    }

    fn window(&self) -> TaskWindow {
        self.window
    }

    async fn initialize(
        &mut self,
        _ctx: &TaskContext,
        snapshot: CeremonySnapshot<'_>,
    ) -> ethdkg_tasks::Result<()> {
        let state = snapshot.current()?;
        require_phase(state, &[Phase::GPKJSubmission])?;

        let forged = Fr::from(0x0bad_5eed_u64);
        state.group_private_key = Some(forged);
        state.group_public_key = Some(g2_mul(&forged));
        state.group_signature = Some(sign(INITIAL_MESSAGE, &forged)?);
        Ok(())
    }

    async fn do_work(&mut self, ctx: &TaskContext, state: &mut DkgState) -> ethdkg_tasks::Result<()> {
        let (Some(gpkj), Some(signature)) = (state.group_public_key, state.group_signature) else {
            return Err(TaskError::MissingData("forged keys".to_string()));
        };
        submit_and_wait(ctx, state.account, DkgCall::SubmitGpkj { gpkj, signature }).await?;
        self.success = true;
        Ok(())
    }

    async fn should_retry(&self, ctx: &TaskContext, state: &DkgState) -> bool {
        !self.success && general_should_retry(ctx, state, &self.window).await
    }

    fn success(&self) -> bool {
        self.success
    }
}

/// Five honest validators complete in a single round
#[tokio::test(start_paused = true)]
async fn test_honest_ceremony() {
    // ==========================================
    // STEP 1: Run the ceremony
    // ==========================================
    let ceremony = LocalCeremony::new(ceremony_config(5)).unwrap();
    let accounts: Vec<Address> = ceremony.accounts().to_vec();
    let report = ceremony.run().await.unwrap();

    assert!(report.complete());
    assert_eq!(report.rounds.len(), 1);
    let round = &report.rounds[0];
    assert_eq!(round.nonce, 1);
    assert_eq!(round.bad_participants, 0);
    assert_eq!(round.pool, accounts);

    // ==========================================
    // STEP 2: Every phase task succeeded where it had work to do
    // ==========================================
    for kind in [
        TaskKind::Register,
        TaskKind::ShareDistribution,
        TaskKind::KeyShareSubmission,
        TaskKind::GpkjSubmission,
        TaskKind::DisputeShareDistribution,
        TaskKind::DisputeGpkj,
    ] {
        assert_eq!(round.successes(kind), 5, "{} did not succeed everywhere", kind);
    }

    // Single-submitter tasks: one leader acted, the rest stood down cleanly
    for kind in [TaskKind::MpkSubmission, TaskKind::Completion] {
        assert_eq!(round.successes(kind), 1, "{} leaders", kind);
        for (account, outcome) in round.outcomes_of(kind) {
            assert!(
                matches!(outcome.last_error, None | Some(TaskError::NotLeading)),
                "{} on {}: {:?}",
                kind,
                account,
                outcome
            );
        }
    }

    // ==========================================
    // STEP 3: All validators agree on the group key
    // ==========================================
    let master_public_key = round.master_public_key.unwrap();
    for account in &accounts {
        let state = round.state_of(*account).unwrap();
        assert!(state.complete);
        assert_eq!(state.phase, Phase::Completion);
        assert_eq!(state.master_public_key, Some(master_public_key));
        assert!(state.bad_shares.is_empty());
        assert_eq!(state.honest_validators.len(), 5);
        assert!(state.dishonest_validators.is_empty());

        // Each gpkj signs the initial message under its own key
        let gpkj = state.group_public_key.unwrap();
        let signature = state.group_signature.unwrap();
        assert!(verify(INITIAL_MESSAGE, &signature, &gpkj).unwrap());
    }

    // ==========================================
    // STEP 4: Summary
    // ==========================================
    let summary = report.summary();
    assert!(summary.complete);
    assert_eq!(summary.rounds.len(), 1);
    assert_eq!(summary.rounds[0].successful_tasks.get("mpk-submission"), Some(&1));
    assert_eq!(
        summary.rounds[0].master_public_key.as_ref().map(String::len),
        Some(256)
    );
}

/// A forged gpkj is disputed, the forger removed, and the next round completes
#[tokio::test(start_paused = true)]
async fn test_forged_gpkj_is_disputed() {
    // ==========================================
    // STEP 1: Validator 5 will publish a forged gpkj
    // ==========================================
    let ceremony = LocalCeremony::new(ceremony_config(5)).unwrap();
    let accounts: Vec<Address> = ceremony.accounts().to_vec();
    let forger = accounts[4];

    let factory: TaskFactory = Arc::new(|window: TaskWindow| -> Box<dyn DkgTask> {
        Box::new(ForgedGpkjTask {
            window,
            success: false,
        })
    });
    let report = ceremony
        .with_override(forger, TaskKind::GpkjSubmission, factory)
        .run()
        .await
        .unwrap();

    // ==========================================
    // STEP 2: First round stops with the forger penalized
    // ==========================================
    assert_eq!(report.rounds.len(), 2);
    let first = &report.rounds[0];
    assert!(!first.complete);
    assert_eq!(first.bad_participants, 1);
    assert_eq!(first.pool.len(), 4);
    assert!(!first.pool.contains(&forger));

    for account in &accounts[..4] {
        let state = first.state_of(*account).unwrap();
        assert_eq!(state.dishonest_validators, vec![forger]);
        assert_eq!(state.honest_validators.len(), 4);
        assert!(!state.complete);
    }
    assert_eq!(first.successes(TaskKind::Completion), 0);

    // ==========================================
    // STEP 3: Second round completes without the forger
    // ==========================================
    let second = &report.rounds[1];
    assert!(report.complete());
    assert_eq!(second.nonce, 2);
    assert_eq!(second.bad_participants, 0);
    assert_eq!(second.pool, accounts[..4].to_vec());
    assert_eq!(second.successes(TaskKind::Register), 4);
    assert!(second
        .outcomes
        .iter()
        .all(|(account, _)| *account != forger));

    let master_public_key = second.master_public_key.unwrap();
    for account in &accounts[..4] {
        let state = second.state_of(*account).unwrap();
        assert_eq!(state.nonce, 2);
        assert!(state.complete);
        assert_eq!(state.number_of_validators, 4);
        assert_eq!(state.master_public_key, Some(master_public_key));
    }
    assert_ne!(first.master_public_key, Some(master_public_key));
}

/// A committee below the minimum is rejected before any round starts
#[test]
fn test_small_committee_rejected() {
    assert!(LocalCeremony::new(ceremony_config(3)).is_err());
}
