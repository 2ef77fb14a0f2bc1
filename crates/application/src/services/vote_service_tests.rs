//! 投票准入控制单元测试。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use domain::{Ballot, DomainError, PollId, RepositoryError, SessionId};

use crate::error::ApplicationError;
use crate::events::PollEvent;
use crate::memory::InMemoryBallotRepository;
use crate::repository::BallotRepository;
use crate::services::vote_service::SubmitVoteRequest;
use crate::test_support::{fixture_options, TestContext};

fn assert_domain_err(result: Result<Ballot, ApplicationError>, expected: DomainError) {
    match result {
        Err(ApplicationError::Domain(err)) => assert_eq!(err, expected),
        other => panic!("expected {:?}, got {:?}", expected, other),
    }
}

#[tokio::test]
async fn accepted_vote_is_persisted_and_updates_the_tally() {
    let ctx = TestContext::new();
    let poll = ctx.create_poll(fixture_options(), 60).await;
    let mut events = ctx.broadcaster.subscribe();

    let ballot = ctx.vote(poll.id, "a", "session-1").await.unwrap();
    assert_eq!(ballot.poll_id, poll.id);
    assert_eq!(ballot.option_id.as_str(), "a");

    let results = ctx.poll_service.poll_with_results(poll.id).await.unwrap();
    assert_eq!(results.total_votes, 1);
    assert_eq!(results.results[0].votes, 1);
    assert_eq!(results.results[0].percentage, 100);
    assert_eq!(results.results[1].votes, 0);
    assert_eq!(results.results[1].percentage, 0);

    match events.recv().await.unwrap() {
        PollEvent::ResultsUpdated { poll: updated } => {
            assert_eq!(updated.id, poll.id);
            assert_eq!(updated.total_votes, 1);
        }
        other => panic!("expected poll.results-updated, got {:?}", other),
    }
}

#[tokio::test]
async fn second_vote_by_same_participant_is_rejected() {
    let ctx = TestContext::new();
    let poll = ctx.create_poll(fixture_options(), 60).await;

    ctx.vote(poll.id, "a", "session-1").await.unwrap();
    assert_domain_err(
        ctx.vote(poll.id, "b", "session-1").await,
        DomainError::AlreadyVoted,
    );

    // 计票不受被拒绝的提交影响
    let results = ctx.poll_service.poll_with_results(poll.id).await.unwrap();
    assert_eq!(results.total_votes, 1);
}

#[tokio::test]
async fn vote_without_active_poll_is_rejected() {
    let ctx = TestContext::new();
    let result = ctx
        .vote_service
        .submit_vote(SubmitVoteRequest {
            poll_id: uuid::Uuid::new_v4(),
            option_id: "a".to_string(),
            participant_id: "session-1".to_string(),
            participant_name: "Asha".to_string(),
        })
        .await;
    assert_domain_err(result, DomainError::NoActivePoll);
}

#[tokio::test]
async fn vote_for_superseded_poll_is_rejected() {
    let ctx = TestContext::new();
    let first = ctx.create_poll(fixture_options(), 60).await;
    let _second = ctx.create_poll(fixture_options(), 60).await;

    assert_domain_err(
        ctx.vote(first.id, "a", "session-1").await,
        DomainError::PollNotActive,
    );
}

#[tokio::test]
async fn vote_after_expiry_is_rejected() {
    let ctx = TestContext::new();
    let poll = ctx.create_poll(fixture_options(), 30).await;

    ctx.clock.advance(ChronoDuration::seconds(31));
    assert_domain_err(
        ctx.vote(poll.id, "a", "session-1").await,
        DomainError::PollExpired,
    );
}

#[tokio::test]
async fn unknown_option_is_rejected() {
    let ctx = TestContext::new();
    let poll = ctx.create_poll(fixture_options(), 60).await;

    assert_domain_err(
        ctx.vote(poll.id, "z", "session-1").await,
        DomainError::InvalidOption,
    );
}

#[tokio::test]
async fn missing_participant_identity_is_rejected() {
    let ctx = TestContext::new();
    let poll = ctx.create_poll(fixture_options(), 60).await;

    let blank_id = ctx
        .vote_service
        .submit_vote(SubmitVoteRequest {
            poll_id: poll.id.into(),
            option_id: "a".to_string(),
            participant_id: "   ".to_string(),
            participant_name: "Asha".to_string(),
        })
        .await;
    assert_domain_err(blank_id, DomainError::InvalidParticipant);

    let blank_name = ctx
        .vote_service
        .submit_vote(SubmitVoteRequest {
            poll_id: poll.id.into(),
            option_id: "a".to_string(),
            participant_id: "session-1".to_string(),
            participant_name: "".to_string(),
        })
        .await;
    assert_domain_err(blank_name, DomainError::InvalidParticipant);
}

/// 预检查失明的存储替身：`find_one` 永远返回 None，
/// 模拟漏过进程内检查、只能靠唯一约束兜底的竞争。
struct BlindBallotRepository {
    inner: InMemoryBallotRepository,
}

#[async_trait]
impl BallotRepository for BlindBallotRepository {
    async fn create(&self, ballot: Ballot) -> Result<Ballot, RepositoryError> {
        self.inner.create(ballot).await
    }

    async fn find_one(
        &self,
        _poll_id: PollId,
        _session_id: &SessionId,
    ) -> Result<Option<Ballot>, RepositoryError> {
        Ok(None)
    }

    async fn list_for_poll(&self, poll_id: PollId) -> Result<Vec<Ballot>, RepositoryError> {
        self.inner.list_for_poll(poll_id).await
    }
}

#[tokio::test]
async fn constraint_violation_is_translated_to_already_voted() {
    let ctx = TestContext::with_ballot_repository(Arc::new(BlindBallotRepository {
        inner: InMemoryBallotRepository::new(),
    }));
    let poll = ctx.create_poll(fixture_options(), 60).await;

    ctx.vote(poll.id, "a", "session-1").await.unwrap();
    // 预检查没拦住，唯一约束报冲突，对外仍是 AlreadyVoted
    assert_domain_err(
        ctx.vote(poll.id, "b", "session-1").await,
        DomainError::AlreadyVoted,
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_for_one_participant_admit_at_most_one() {
    let ctx = Arc::new(TestContext::new());
    let poll = ctx.create_poll(fixture_options(), 60).await;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let ctx = Arc::clone(&ctx);
        let poll_id = poll.id;
        handles.push(tokio::spawn(async move {
            ctx.vote(poll_id, "a", "session-1").await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(ApplicationError::Domain(DomainError::AlreadyVoted))
            | Err(ApplicationError::Domain(DomainError::SubmissionInProgress)) => {}
            Err(other) => panic!("unexpected rejection {:?}", other),
        }
    }
    assert_eq!(successes, 1);

    let results = ctx.poll_service.poll_with_results(poll.id).await.unwrap();
    assert_eq!(results.total_votes, 1);
}

#[tokio::test]
async fn has_voted_reflects_persisted_ballots() {
    let ctx = TestContext::new();
    let poll = ctx.create_poll(fixture_options(), 60).await;
    let session = SessionId::parse("session-1").unwrap();

    assert!(!ctx.vote_service.has_voted(poll.id, &session).await.unwrap());
    ctx.vote(poll.id, "a", "session-1").await.unwrap();
    assert!(ctx.vote_service.has_voted(poll.id, &session).await.unwrap());
}
