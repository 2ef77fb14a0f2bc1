//! 主应用程序入口
//!
//! 装配存储、服务与计时器，启动 Axum Web 服务。

use std::sync::Arc;

use application::{
    ChatService, ChatServiceDependencies, LocalEventBroadcaster, PollService,
    PollServiceDependencies, SessionService, SessionServiceDependencies, SystemClock,
    TimerAuthority, VoteService, VoteServiceDependencies,
};
use config::AppConfig;
use infrastructure::{
    create_pg_pool, PgBallotRepository, PgChatMessageRepository, PgPollRepository,
    PgSessionRepository,
};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let app_config = AppConfig::from_env_with_defaults();
    app_config.validate()?;

    tracing::info!(
        "连接数据库: {}",
        app_config.database.url.split('@').next_back().unwrap_or("unknown")
    );

    let pg_pool = create_pg_pool(
        &app_config.database.url,
        app_config.database.max_connections,
    )
    .await?;

    // 运行迁移
    sqlx::migrate!("../../migrations").run(&pg_pool).await?;

    let poll_repository = Arc::new(PgPollRepository::new(pg_pool.clone()));
    let ballot_repository = Arc::new(PgBallotRepository::new(pg_pool.clone()));
    let session_repository = Arc::new(PgSessionRepository::new(pg_pool.clone()));
    let chat_repository = Arc::new(PgChatMessageRepository::new(pg_pool));

    let clock: Arc<dyn application::Clock> = Arc::new(SystemClock);
    let broadcaster = Arc::new(LocalEventBroadcaster::new(app_config.broadcast.capacity));

    let poll_service = Arc::new(PollService::new(PollServiceDependencies {
        poll_repository,
        ballot_repository: ballot_repository.clone(),
        clock: clock.clone(),
        broadcaster: broadcaster.clone(),
    }));

    let vote_service = Arc::new(VoteService::new(VoteServiceDependencies {
        poll_service: poll_service.clone(),
        ballot_repository,
        clock: clock.clone(),
        broadcaster: broadcaster.clone(),
    }));

    let session_service = Arc::new(SessionService::new(SessionServiceDependencies {
        session_repository,
        clock: clock.clone(),
        broadcaster: broadcaster.clone(),
    }));

    let chat_service = Arc::new(ChatService::new(ChatServiceDependencies {
        chat_repository,
        clock: clock.clone(),
        broadcaster: broadcaster.clone(),
    }));

    let timer = Arc::new(TimerAuthority::new(
        poll_service.clone(),
        broadcaster.clone(),
        clock,
    ));

    // 重启后恢复：持久化的活跃投票按原始开始时间续跑倒计时，
    // 已过期的立即关闭
    timer.resume().await?;

    let state = AppState::new(
        poll_service,
        vote_service,
        session_service,
        chat_service,
        timer,
        broadcaster,
    );

    let app = router(state);
    let address = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!("投票服务器启动在 http://{}", address);
    axum::serve(listener, app).await?;

    Ok(())
}
