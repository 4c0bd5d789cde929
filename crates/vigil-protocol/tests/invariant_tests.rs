mod common;

use common::{account, tokens, Harness};
use vigil_protocol::escrow::TASK_CUSTODY_DOMAIN;
use vigil_protocol::{
    ArbitrationVote, DisputePhase, ParticipantRole, ProtocolConfig, ProtocolError, Salt,
    SealedVote, SelectionPolicy, TaskState,
};
use vigil_types::{AccountAddress, DAY};

/// Funds leave a task's custody once, whatever is attempted afterwards.
#[tokio::test]
async fn test_single_release_per_task() {
    let h = Harness::new().await;
    h.register_verifiers(3).await;

    println!("\n=== Single release ===");

    let (completed, _) = h.verified_task().await;
    let refunded = h.create_task(30, 5 * DAY).await;

    h.advance(7 * DAY);
    h.protocol.complete_task(completed).await.unwrap();
    h.protocol.refund(refunded).await.unwrap();

    for _ in 0..3 {
        assert!(h.protocol.complete_task(completed).await.is_err());
        assert!(h.protocol.refund(completed).await.is_err());
        assert!(h.protocol.refund(refunded).await.is_err());
        assert!(h
            .protocol
            .mark_failed(h.requester, refunded, "again")
            .await
            .is_err());
    }

    let custody = AccountAddress::derive(TASK_CUSTODY_DOMAIN, completed.value());
    assert_eq!(h.ledger.total_outflow(custody).await, tokens(50));
    assert_eq!(h.balance(custody).await, tokens(0));
    println!("✓ Completed task released its payout once");

    let custody = AccountAddress::derive(TASK_CUSTODY_DOMAIN, refunded.value());
    assert_eq!(h.ledger.total_outflow(custody).await, tokens(30));
    println!("✓ Refunded task released its payout once");

    for task in h.protocol.tasks().await {
        assert!(task.escrowed.is_zero(), "{} still holds funds", task.task_id);
    }
}

/// "Before" transitions fail at the deadline, "after" transitions fail before it.
#[tokio::test]
async fn test_deadline_monotonicity() {
    let h = Harness::new().await;
    h.register_verifiers(3).await;
    h.register_arbitrators(3).await;

    let task_id = h.create_task(50, 2 * DAY).await;
    h.protocol
        .assign_worker(h.requester, task_id, h.worker)
        .await
        .unwrap();

    // Refund needs the deadline to have passed
    h.advance(2 * DAY - 1);
    assert!(matches!(
        h.protocol.refund(task_id).await,
        Err(ProtocolError::DeadlineNotReached { .. })
    ));
    h.protocol
        .mark_requested(h.worker, task_id, "last second")
        .await
        .unwrap();

    h.advance(1);
    assert!(matches!(
        h.protocol.mark_responded(h.worker, task_id, "at deadline").await,
        Err(ProtocolError::DeadlineExceeded { .. })
    ));
    assert!(matches!(
        h.protocol
            .submit_evidence(h.worker, task_id, "bafy-late", "late")
            .await,
        Err(ProtocolError::DeadlineExceeded { .. })
    ));
    h.protocol.refund(task_id).await.unwrap();

    // Dispute window: open strictly before its end
    let (verified, _) = h.verified_task().await;
    let window_end = h
        .protocol
        .task(verified)
        .await
        .unwrap()
        .dispute_window_end
        .unwrap();
    h.clock.set(window_end);
    assert!(matches!(
        h.protocol
            .initiate_dispute(h.requester, verified, "late appeal", tokens(50))
            .await,
        Err(ProtocolError::DisputeWindowClosed { .. })
    ));
    h.protocol.complete_task(verified).await.unwrap();
}

#[tokio::test]
async fn test_verification_vote_rejected_at_session_deadline() {
    let h = Harness::new().await;
    h.register_verifiers(3).await;
    let task_id = h.responded_task().await;

    let session = h.protocol.start_verification_session(task_id).await.unwrap();
    assert!(matches!(
        h.protocol.complete_verification(task_id).await,
        Err(ProtocolError::DeadlineNotReached { .. })
    ));

    h.clock.set(session.deadline);
    let vote = h
        .protocol
        .cast_verification_vote(session.draw.members[0], task_id, true)
        .await;
    assert!(matches!(vote, Err(ProtocolError::DeadlineExceeded { .. })));

    // Zero votes close as not approved
    let closed = h.protocol.complete_verification(task_id).await.unwrap();
    assert_eq!(closed.status.approved(), Some(false));
    assert_eq!(h.protocol.task(task_id).await.unwrap().state, TaskState::Responded);
}

/// A reveal that does not hash to the commitment is rejected and not tallied.
#[tokio::test]
async fn test_commit_reveal_integrity() {
    let h = Harness::new().await;
    h.register_verifiers(3).await;
    h.register_arbitrators(3).await;
    let (task_id, _) = h.verified_task().await;

    let dispute = h
        .protocol
        .initiate_dispute(h.requester, task_id, "evidence is forged", tokens(50))
        .await
        .unwrap();
    let panel = dispute.panel().to_vec();
    let sealed: Vec<SealedVote> = panel
        .iter()
        .map(|_| SealedVote::new(ArbitrationVote::Override, "photo metadata mismatch"))
        .collect();

    // Revealing before the commit phase ends is the wrong phase
    assert!(matches!(
        h.protocol
            .reveal_vote(
                panel[0],
                dispute.dispute_id,
                sealed[0].vote,
                &sealed[0].justification,
                &sealed[0].salt,
            )
            .await,
        Err(ProtocolError::WrongPhase { .. })
    ));

    for (arbitrator, vote) in panel.iter().zip(&sealed) {
        h.protocol
            .commit_vote(
                *arbitrator,
                dispute.dispute_id,
                vote.commitment(dispute.dispute_id, *arbitrator),
            )
            .await
            .unwrap();
    }
    assert_eq!(
        h.protocol.dispute(dispute.dispute_id).await.unwrap().phase,
        DisputePhase::Reveal
    );

    let wrong_salt = h
        .protocol
        .reveal_vote(
            panel[0],
            dispute.dispute_id,
            ArbitrationVote::Override,
            "photo metadata mismatch",
            &Salt::from_phrase("guess"),
        )
        .await;
    assert!(matches!(wrong_salt, Err(ProtocolError::CommitmentMismatch { .. })));

    let flipped_vote = h
        .protocol
        .reveal_vote(
            panel[0],
            dispute.dispute_id,
            ArbitrationVote::Uphold,
            &sealed[0].justification,
            &sealed[0].salt,
        )
        .await;
    assert!(matches!(flipped_vote, Err(ProtocolError::CommitmentMismatch { .. })));

    let edited_justification = h
        .protocol
        .reveal_vote(
            panel[0],
            dispute.dispute_id,
            sealed[0].vote,
            "something else",
            &sealed[0].salt,
        )
        .await;
    assert!(matches!(
        edited_justification,
        Err(ProtocolError::CommitmentMismatch { .. })
    ));

    let view = h.protocol.dispute(dispute.dispute_id).await.unwrap();
    assert_eq!(view.revealed_count(), 0);

    // A stranger cannot reveal at all
    let outsider = h
        .protocol
        .reveal_vote(
            account("outsider"),
            dispute.dispute_id,
            sealed[0].vote,
            &sealed[0].justification,
            &sealed[0].salt,
        )
        .await;
    assert!(matches!(outsider, Err(ProtocolError::NotPanelMember { .. })));

    let receipt = h
        .protocol
        .reveal_vote(
            panel[0],
            dispute.dispute_id,
            sealed[0].vote,
            &sealed[0].justification,
            &sealed[0].salt,
        )
        .await
        .unwrap();
    assert!(receipt.resolution.is_none());
    assert_eq!(
        h.protocol.dispute(dispute.dispute_id).await.unwrap().override_votes,
        1
    );
    assert!(matches!(
        h.protocol
            .reveal_vote(
                panel[0],
                dispute.dispute_id,
                sealed[0].vote,
                &sealed[0].justification,
                &sealed[0].salt,
            )
            .await,
        Err(ProtocolError::AlreadyRevealed { .. })
    ));
}

#[tokio::test]
async fn test_partial_commits_move_to_reveal_at_commit_deadline() {
    let h = Harness::new().await;
    h.register_verifiers(3).await;
    h.register_arbitrators(3).await;
    let (task_id, _) = h.verified_task().await;

    let dispute = h
        .protocol
        .initiate_dispute(h.worker, task_id, "requester is stalling", tokens(10))
        .await
        .unwrap();
    let panel = dispute.panel().to_vec();
    let sealed = SealedVote::new(ArbitrationVote::Uphold, "work was done");
    h.protocol
        .commit_vote(
            panel[0],
            dispute.dispute_id,
            sealed.commitment(dispute.dispute_id, panel[0]),
        )
        .await
        .unwrap();
    assert!(matches!(
        h.protocol.resolve_dispute(dispute.dispute_id).await,
        Err(ProtocolError::DeadlineNotReached { .. })
    ));

    // The commit phase closes at its deadline even with missing commitments
    h.clock.set(dispute.commit_deadline);
    assert!(matches!(
        h.protocol.commit_vote(panel[1], dispute.dispute_id, [7u8; 32]).await,
        Err(ProtocolError::WrongPhase { .. })
    ));

    // The only committed vote is revealed, so the dispute settles right away
    let receipt = h
        .protocol
        .reveal_vote(
            panel[0],
            dispute.dispute_id,
            sealed.vote,
            &sealed.justification,
            &sealed.salt,
        )
        .await
        .unwrap();
    let resolution = receipt.resolution.unwrap();
    assert_eq!(resolution.task_id, task_id);
    assert_eq!(resolution.decision, vigil_protocol::DisputeDecision::UpholdOriginal);
    assert_eq!(resolution.rewards, vec![(panel[0], tokens(10))]);
    assert!(matches!(
        h.protocol.resolve_dispute(dispute.dispute_id).await,
        Err(ProtocolError::DisputeResolved(_))
    ));

    // One appeal per task
    assert!(matches!(
        h.protocol
            .initiate_dispute(h.requester, task_id, "second try", tokens(10))
            .await,
        Err(ProtocolError::DisputeAlreadyRaised(_))
    ));
}

#[tokio::test]
async fn test_inconclusive_appeal_slashes_nobody() {
    let h = Harness::new().await;
    h.register_verifiers(3).await;
    h.register_arbitrators(3).await;
    let (task_id, panel) = h.verified_task().await;

    let dispute = h
        .protocol
        .initiate_dispute(h.requester, task_id, "unclear", tokens(10))
        .await
        .unwrap();

    // Nobody commits; after both deadlines anyone may force resolution
    h.clock.set(dispute.reveal_deadline);
    let resolution = h.protocol.resolve_dispute(dispute.dispute_id).await.unwrap();
    assert_eq!(resolution.decision, vigil_protocol::DisputeDecision::Inconclusive);
    assert!(resolution.slashed_verifiers.is_empty());
    assert!(resolution.rewards.is_empty());
    for verifier in panel {
        assert!(!h.protocol.verifier(verifier).await.unwrap().slashed);
    }
    assert!(matches!(
        h.protocol.resolve_dispute(dispute.dispute_id).await,
        Err(ProtocolError::DisputeResolved(_))
    ));
    assert_eq!(h.protocol.task(task_id).await.unwrap().state, TaskState::Verified);
}

/// Slashes never exceed the stake and never repeat until re-registration.
#[tokio::test]
async fn test_slash_bound_and_reregistration() {
    let h = Harness::new().await;
    h.register_verifiers(3).await;
    h.register_arbitrators(3).await;
    let (task_id, _) = h.verified_task().await;

    let dispute = h
        .protocol
        .initiate_dispute(h.requester, task_id, "nothing changed", tokens(50))
        .await
        .unwrap();
    h.vote_dispute(
        &dispute,
        &[
            ArbitrationVote::Override,
            ArbitrationVote::Override,
            ArbitrationVote::Override,
        ],
    )
    .await;
    let resolved = h.protocol.dispute(dispute.dispute_id).await.unwrap();
    assert!(!resolved.slashed_verifiers.is_empty());

    for record in &resolved.slashed_verifiers {
        assert_eq!(record.role, ParticipantRole::Verifier);
        assert!(record.amount <= tokens(100));
        let member = h.protocol.verifier(record.account).await.unwrap();
        assert_eq!(member.slash_count, 1);
        assert_eq!(member.stake, record.remaining_stake);
    }

    // The overturned worker re-enters too, so a fresh task can reach verification
    h.protocol
        .reregister_worker(h.worker, tokens(25))
        .await
        .unwrap();

    // Slashed verifiers are ineligible: not enough candidates for a new panel
    let next = h.responded_task().await;
    assert!(matches!(
        h.protocol.start_verification_session(next).await,
        Err(ProtocolError::InsufficientEligible { .. })
    ));

    // Re-entry needs the stake topped back up to the minimum
    let slashed = resolved.slashed_verifiers[0].account;
    assert!(matches!(
        h.protocol.reregister_verifier(slashed, tokens(10)).await,
        Err(ProtocolError::BelowMinimum { .. })
    ));
    let back = h
        .protocol
        .reregister_verifier(slashed, tokens(50))
        .await
        .unwrap();
    assert!(!back.slashed);
    assert_eq!(back.stake, tokens(100));
    assert_eq!(back.reputation, 50);
    assert_eq!(back.slash_count, 1);

    let unslashed = h
        .protocol
        .verifiers()
        .await
        .into_iter()
        .find(|v| !v.slashed && v.account != slashed);
    if let Some(member) = unslashed {
        assert!(matches!(
            h.protocol.reregister_verifier(member.account, tokens(10)).await,
            Err(ProtocolError::NotSlashed { .. })
        ));
    }
}

#[tokio::test]
async fn test_task_creation_guards() {
    let h = Harness::new().await;
    let config = h.protocol.config().factory.clone();

    let mut request = vigil_protocol::CreateTask {
        target: h.target,
        subject: vigil_types::SubjectCommitment::commit(b"subject"),
        payout: tokens(1),
        duration: 10 * DAY,
        worker: None,
    };
    assert!(matches!(
        h.protocol.create_task(h.requester, request.clone()).await,
        Err(ProtocolError::BelowMinimum { what: "payout", .. })
    ));

    request.payout = tokens(50);
    request.duration = config.max_duration + 1;
    assert!(matches!(
        h.protocol.create_task(h.requester, request.clone()).await,
        Err(ProtocolError::DurationOutOfBounds { .. })
    ));

    request.duration = 10 * DAY;
    h.registry.set_active(h.target, false).await.unwrap();
    assert!(matches!(
        h.protocol.create_task(h.requester, request.clone()).await,
        Err(ProtocolError::TargetInactive(_))
    ));
    h.registry.set_active(h.target, true).await.unwrap();

    request.worker = Some(h.requester);
    assert_eq!(
        h.protocol.create_task(h.requester, request.clone()).await.unwrap_err(),
        ProtocolError::WorkerIsRequester
    );

    // Payout and fee are pulled together
    request.worker = Some(h.worker);
    let fee_collector = h.protocol.accounts().fee_collector;
    let before = h.balance(h.requester).await;
    let task = h.protocol.create_task(h.requester, request).await.unwrap();
    let fee = tokens(50).bps(config.platform_fee_bps).unwrap();
    assert_eq!(task.worker, Some(h.worker));
    assert_eq!(h.balance(fee_collector).await, fee);
    assert_eq!(
        h.balance(h.requester).await,
        before.saturating_sub(tokens(50)).saturating_sub(fee)
    );

    // An unfunded requester leaves no task behind
    let broke = account("broke");
    let failed = h
        .protocol
        .create_task(
            broke,
            vigil_protocol::CreateTask {
                target: h.target,
                subject: vigil_types::SubjectCommitment::commit(b"x"),
                payout: tokens(50),
                duration: 10 * DAY,
                worker: None,
            },
        )
        .await;
    assert!(matches!(failed, Err(ProtocolError::Ledger(_))));
    assert!(h.protocol.tasks_by_requester(broke).await.is_empty());
}

#[tokio::test]
async fn test_worker_selection_policies() {
    let mut config = ProtocolConfig::default();
    config.factory.selection_policy = SelectionPolicy::HighestStake;
    let h = Harness::with_config(config).await;

    let whale = account("whale");
    h.fund(whale, tokens(1_000)).await;
    h.protocol.register_worker(whale, tokens(400)).await.unwrap();

    let task_id = h.create_task(50, 10 * DAY).await;
    assert_eq!(h.protocol.available_tasks().await.len(), 1);
    let chosen = h
        .protocol
        .auto_assign_worker(h.requester, task_id)
        .await
        .unwrap();
    assert_eq!(chosen, whale);
    assert!(h.protocol.available_tasks().await.is_empty());
    assert_eq!(h.protocol.tasks_by_worker(whale).await.len(), 1);

    // Round robin walks the eligible workers in registration order
    let h = Harness::new().await;
    let second = account("second-worker");
    h.fund(second, tokens(1_000)).await;
    h.protocol.register_worker(second, tokens(50)).await.unwrap();

    let mut picks = Vec::new();
    for _ in 0..4 {
        let task_id = h.create_task(50, 10 * DAY).await;
        picks.push(
            h.protocol
                .auto_assign_worker(h.requester, task_id)
                .await
                .unwrap(),
        );
    }
    assert_eq!(picks, vec![h.worker, second, h.worker, second]);

    // Only the requester may pick for their task
    let task_id = h.create_task(50, 10 * DAY).await;
    assert!(matches!(
        h.protocol.auto_assign_worker(second, task_id).await,
        Err(ProtocolError::Unauthorized { .. })
    ));
    h.protocol.self_assign(second, task_id).await.unwrap();
    assert_eq!(
        h.protocol.self_assign(h.worker, task_id).await.unwrap_err(),
        ProtocolError::WorkerAlreadyAssigned(task_id)
    );
}
