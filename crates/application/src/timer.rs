//! 计时器权威。
//!
//! 服务端倒计时是投票到期的唯一事实来源。同一时刻只有一个倒计时
//! 在走，句柄被计时器独占持有，`start` 先取消旧任务再启动新任务，
//! 主持人快速连续创建投票也不会留下两个计时器。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use domain::{PollId, Timestamp};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{
    clock::Clock,
    error::ApplicationError,
    events::{EventBroadcaster, PollEvent},
    services::poll_service::PollService,
};

pub struct TimerAuthority {
    poll_service: Arc<PollService>,
    broadcaster: Arc<dyn EventBroadcaster>,
    clock: Arc<dyn Clock>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TimerAuthority {
    pub fn new(
        poll_service: Arc<PollService>,
        broadcaster: Arc<dyn EventBroadcaster>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            poll_service,
            broadcaster,
            clock,
            handle: Mutex::new(None),
        }
    }

    /// 为指定投票启动倒计时。绝对到期时间由持久化的 `started_at`
    /// 推出，而不是当前时钟，进程重启后续跑不会多给时间。
    pub fn start(&self, poll_id: PollId, duration_secs: i64, started_at: Timestamp) {
        let expires_at = started_at + ChronoDuration::seconds(duration_secs);
        let poll_service = Arc::clone(&self.poll_service);
        let broadcaster = Arc::clone(&self.broadcaster);
        let clock = Arc::clone(&self.clock);

        let mut handle = self
            .handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // 先取消旧倒计时，再启动新的
        if let Some(previous) = handle.take() {
            previous.abort();
        }

        *handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let remaining = (expires_at - clock.now()).num_seconds().max(0);

                if let Err(err) = broadcaster
                    .publish(PollEvent::TimerTick {
                        poll_id,
                        remaining_time: remaining,
                    })
                    .await
                {
                    tracing::warn!(poll_id = %poll_id, error = %err, "failed to publish timer tick");
                }

                if remaining <= 0 {
                    // 终态事件由生命周期服务在首次成功迁移时发出，
                    // 与手动结束竞争时以先提交者为准。
                    match poll_service.end_poll(poll_id).await {
                        Ok(_) => break,
                        Err(err) => {
                            tracing::warn!(
                                poll_id = %poll_id,
                                error = %err,
                                "failed to close expired poll, retrying on next tick"
                            );
                        }
                    }
                }
            }
        }));
    }

    /// 进程启动时恢复。持久化的活跃投票若未过期则续跑倒计时，
    /// 已过期则立即关闭，不等下一个 tick。
    pub async fn resume(&self) -> Result<(), ApplicationError> {
        let Some(poll) = self.poll_service.active_poll().await? else {
            return Ok(());
        };

        let now = self.clock.now();
        if poll.is_expired(now) {
            tracing::info!(poll_id = %poll.id, "active poll already expired at startup, closing");
            self.poll_service.end_poll(poll.id).await?;
        } else {
            tracing::info!(
                poll_id = %poll.id,
                remaining = poll.remaining_time(now),
                "resuming countdown for persisted poll"
            );
            self.start(poll.id, poll.duration_secs, poll.started_at);
        }
        Ok(())
    }
}

impl Drop for TimerAuthority {
    fn drop(&mut self) {
        let mut handle = self
            .handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(task) = handle.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;
    use tokio::time::{advance, timeout, Duration};

    use crate::events::PollEvent;
    use crate::test_support::{fixture_options, TestContext};

    #[tokio::test(start_paused = true)]
    async fn resume_restores_remaining_from_persisted_start() {
        let ctx = TestContext::new();
        // 持久化的投票在 50 秒前开始，时长 60 秒
        ctx.seed_active_poll(fixture_options(), 60, ChronoDuration::seconds(50))
            .await;

        let mut events = ctx.broadcaster.subscribe();
        ctx.timer.resume().await.unwrap();

        match events.recv().await.unwrap() {
            PollEvent::TimerTick { remaining_time, .. } => assert_eq!(remaining_time, 10),
            other => panic!("expected timer tick, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn expired_poll_is_closed_immediately_on_resume() {
        let ctx = TestContext::new();
        let poll_id = ctx
            .seed_active_poll(fixture_options(), 60, ChronoDuration::seconds(90))
            .await;

        let mut events = ctx.broadcaster.subscribe();
        ctx.timer.resume().await.unwrap();

        match events.recv().await.unwrap() {
            PollEvent::PollEnded { poll } => {
                assert_eq!(poll.id, poll_id);
                assert!(!poll.is_active);
            }
            other => panic!("expected poll.ended, got {:?}", other),
        }

        let stored = ctx.poll_service.poll_with_results(poll_id).await.unwrap();
        assert!(!stored.is_active);
        assert!(stored.ended_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_closes_poll_and_emits_terminal_event_once() {
        let ctx = TestContext::new();
        let snapshot = ctx.create_poll(fixture_options(), 30).await;
        let mut events = ctx.broadcaster.subscribe();

        ctx.timer
            .start(snapshot.id, snapshot.duration_secs, snapshot.started_at);

        // 第一个 tick 立刻到来，报整个窗口
        match events.recv().await.unwrap() {
            PollEvent::TimerTick { remaining_time, .. } => assert_eq!(remaining_time, 30),
            other => panic!("expected timer tick, got {:?}", other),
        }

        // 时间走过到期点
        ctx.clock.advance(ChronoDuration::seconds(31));
        advance(Duration::from_secs(31)).await;

        let mut ended = 0;
        loop {
            match timeout(Duration::from_secs(5), events.recv()).await {
                Ok(Ok(PollEvent::TimerTick { remaining_time, .. })) => {
                    assert!(remaining_time >= 0);
                }
                Ok(Ok(PollEvent::PollEnded { poll })) => {
                    assert_eq!(poll.id, snapshot.id);
                    ended += 1;
                }
                Ok(Ok(other)) => panic!("unexpected event {:?}", other),
                // 倒计时结束后事件流沉寂
                _ => break,
            }
        }
        assert_eq!(ended, 1);

        let stored = ctx.poll_service.poll_with_results(snapshot.id).await.unwrap();
        assert!(!stored.is_active);
    }

    #[tokio::test(start_paused = true)]
    async fn starting_a_new_countdown_cancels_the_previous_one() {
        let ctx = TestContext::new();
        let first = ctx.create_poll(fixture_options(), 60).await;
        let second = ctx.create_poll(fixture_options(), 60).await;

        ctx.timer.start(first.id, first.duration_secs, first.started_at);
        ctx.timer
            .start(second.id, second.duration_secs, second.started_at);

        let mut events = ctx.broadcaster.subscribe();
        for _ in 0..3 {
            match timeout(Duration::from_secs(5), events.recv()).await {
                Ok(Ok(PollEvent::TimerTick { poll_id, .. })) => assert_eq!(poll_id, second.id),
                Ok(Ok(other)) => panic!("unexpected event {:?}", other),
                other => panic!("expected timer tick, got {:?}", other),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn manual_end_before_expiry_wins_and_expiry_becomes_noop() {
        let ctx = TestContext::new();
        let snapshot = ctx.create_poll(fixture_options(), 30).await;
        ctx.timer
            .start(snapshot.id, snapshot.duration_secs, snapshot.started_at);

        // 主持人提前手动结束
        let ended = ctx.poll_service.end_poll(snapshot.id).await.unwrap();
        assert!(!ended.is_active);

        let mut events = ctx.broadcaster.subscribe();
        ctx.clock.advance(ChronoDuration::seconds(31));
        advance(Duration::from_secs(31)).await;

        // 到期路径不再发布第二个终态事件
        let mut ended_events = 0;
        loop {
            match timeout(Duration::from_secs(5), events.recv()).await {
                Ok(Ok(PollEvent::PollEnded { .. })) => ended_events += 1,
                Ok(Ok(_)) => {}
                _ => break,
            }
        }
        assert_eq!(ended_events, 0);
    }
}
