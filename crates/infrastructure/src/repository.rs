use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use uuid::Uuid;

use application::repository::{
    BallotRepository, ChatMessageRepository, PollRepository, SessionRepository,
};
use domain::{
    Ballot, BallotId, ChatMessage, ChatMessageId, OptionId, Participant, ParticipantName, Poll,
    PollId, PollOption, RepositoryError, SenderRole, SessionId, Timestamp,
};

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    RepositoryError::storage(err.to_string())
}

/// 唯一约束冲突单独映射，其余一律视为存储错误。
fn map_insert_err(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict;
        }
    }
    map_sqlx_err(err)
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

#[derive(Debug, FromRow)]
struct PollRecord {
    id: Uuid,
    question: String,
    options: serde_json::Value,
    duration_secs: i64,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    is_active: bool,
}

impl TryFrom<PollRecord> for Poll {
    type Error = RepositoryError;

    fn try_from(value: PollRecord) -> Result<Self, Self::Error> {
        let options: Vec<PollOption> = serde_json::from_value(value.options)
            .map_err(|err| invalid_data(err.to_string()))?;

        Ok(Poll {
            id: PollId::from(value.id),
            question: value.question,
            options,
            duration_secs: value.duration_secs,
            started_at: value.started_at,
            ended_at: value.ended_at,
            is_active: value.is_active,
        })
    }
}

#[derive(Debug, FromRow)]
struct BallotRecord {
    id: Uuid,
    poll_id: Uuid,
    option_id: String,
    session_id: String,
    participant_name: String,
    cast_at: DateTime<Utc>,
}

impl TryFrom<BallotRecord> for Ballot {
    type Error = RepositoryError;

    fn try_from(value: BallotRecord) -> Result<Self, Self::Error> {
        let option_id =
            OptionId::parse(value.option_id).map_err(|err| invalid_data(err.to_string()))?;
        let session_id =
            SessionId::parse(value.session_id).map_err(|err| invalid_data(err.to_string()))?;
        let participant_name = ParticipantName::parse(value.participant_name)
            .map_err(|err| invalid_data(err.to_string()))?;

        Ok(Ballot {
            id: BallotId::from(value.id),
            poll_id: PollId::from(value.poll_id),
            option_id,
            session_id,
            participant_name,
            cast_at: value.cast_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ParticipantRecord {
    session_id: String,
    name: String,
    connection_id: Uuid,
    is_removed: bool,
    joined_at: DateTime<Utc>,
}

impl TryFrom<ParticipantRecord> for Participant {
    type Error = RepositoryError;

    fn try_from(value: ParticipantRecord) -> Result<Self, Self::Error> {
        let session_id =
            SessionId::parse(value.session_id).map_err(|err| invalid_data(err.to_string()))?;
        let name =
            ParticipantName::parse(value.name).map_err(|err| invalid_data(err.to_string()))?;

        Ok(Participant {
            session_id,
            name,
            connection_id: value.connection_id,
            is_removed: value.is_removed,
            joined_at: value.joined_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ChatMessageRecord {
    id: Uuid,
    sender_id: String,
    sender_name: String,
    sender_role: String,
    content: String,
    sent_at: DateTime<Utc>,
}

impl TryFrom<ChatMessageRecord> for ChatMessage {
    type Error = RepositoryError;

    fn try_from(value: ChatMessageRecord) -> Result<Self, Self::Error> {
        let sender_role = match value.sender_role.as_str() {
            "presenter" => SenderRole::Presenter,
            "student" => SenderRole::Student,
            other => return Err(invalid_data(format!("unknown sender role: {}", other))),
        };

        Ok(ChatMessage {
            id: ChatMessageId::from(value.id),
            sender_id: value.sender_id,
            sender_name: value.sender_name,
            sender_role,
            content: value.content,
            sent_at: value.sent_at,
        })
    }
}

fn sender_role_str(role: SenderRole) -> &'static str {
    match role {
        SenderRole::Presenter => "presenter",
        SenderRole::Student => "student",
    }
}

pub struct PgPollRepository {
    pool: PgPool,
}

impl PgPollRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PollRepository for PgPollRepository {
    async fn create(&self, poll: Poll) -> Result<Poll, RepositoryError> {
        let options =
            serde_json::to_value(&poll.options).map_err(|err| invalid_data(err.to_string()))?;

        let record = sqlx::query_as::<_, PollRecord>(
            r#"
            INSERT INTO polls (id, question, options, duration_secs, started_at, ended_at, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, question, options, duration_secs, started_at, ended_at, is_active
            "#,
        )
        .bind(Uuid::from(poll.id))
        .bind(&poll.question)
        .bind(options)
        .bind(poll.duration_secs)
        .bind(poll.started_at)
        .bind(poll.ended_at)
        .bind(poll.is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(map_insert_err)?;

        Poll::try_from(record)
    }

    async fn find_active(&self) -> Result<Option<Poll>, RepositoryError> {
        let record = sqlx::query_as::<_, PollRecord>(
            r#"
            SELECT id, question, options, duration_secs, started_at, ended_at, is_active
            FROM polls WHERE is_active LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Poll::try_from).transpose()
    }

    async fn find_by_id(&self, id: PollId) -> Result<Option<Poll>, RepositoryError> {
        let record = sqlx::query_as::<_, PollRecord>(
            r#"
            SELECT id, question, options, duration_secs, started_at, ended_at, is_active
            FROM polls WHERE id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Poll::try_from).transpose()
    }

    async fn find_latest(&self) -> Result<Option<Poll>, RepositoryError> {
        let record = sqlx::query_as::<_, PollRecord>(
            r#"
            SELECT id, question, options, duration_secs, started_at, ended_at, is_active
            FROM polls ORDER BY started_at DESC LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Poll::try_from).transpose()
    }

    async fn update_activation(
        &self,
        id: PollId,
        active: bool,
        ended_at: Option<Timestamp>,
    ) -> Result<Option<Poll>, RepositoryError> {
        // 只有状态真正变化的那次提交能拿到行；并发的结束尝试
        // 第一个提交者胜出，其余拿到 None。
        let record = sqlx::query_as::<_, PollRecord>(
            r#"
            UPDATE polls
            SET is_active = $2,
                ended_at = CASE WHEN $2 THEN ended_at ELSE COALESCE(ended_at, $3) END
            WHERE id = $1 AND is_active <> $2
            RETURNING id, question, options, duration_secs, started_at, ended_at, is_active
            "#,
        )
        .bind(Uuid::from(id))
        .bind(active)
        .bind(ended_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Poll::try_from).transpose()
    }

    async fn list_ended(&self, limit: u32) -> Result<Vec<Poll>, RepositoryError> {
        let records = sqlx::query_as::<_, PollRecord>(
            r#"
            SELECT id, question, options, duration_secs, started_at, ended_at, is_active
            FROM polls WHERE NOT is_active
            ORDER BY started_at DESC LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Poll::try_from).collect()
    }
}

pub struct PgBallotRepository {
    pool: PgPool,
}

impl PgBallotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BallotRepository for PgBallotRepository {
    async fn create(&self, ballot: Ballot) -> Result<Ballot, RepositoryError> {
        let record = sqlx::query_as::<_, BallotRecord>(
            r#"
            INSERT INTO ballots (id, poll_id, option_id, session_id, participant_name, cast_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, poll_id, option_id, session_id, participant_name, cast_at
            "#,
        )
        .bind(Uuid::from(ballot.id))
        .bind(Uuid::from(ballot.poll_id))
        .bind(ballot.option_id.as_str())
        .bind(ballot.session_id.as_str())
        .bind(ballot.participant_name.as_str())
        .bind(ballot.cast_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_insert_err)?;

        Ballot::try_from(record)
    }

    async fn find_one(
        &self,
        poll_id: PollId,
        session_id: &SessionId,
    ) -> Result<Option<Ballot>, RepositoryError> {
        let record = sqlx::query_as::<_, BallotRecord>(
            r#"
            SELECT id, poll_id, option_id, session_id, participant_name, cast_at
            FROM ballots WHERE poll_id = $1 AND session_id = $2
            "#,
        )
        .bind(Uuid::from(poll_id))
        .bind(session_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Ballot::try_from).transpose()
    }

    async fn list_for_poll(&self, poll_id: PollId) -> Result<Vec<Ballot>, RepositoryError> {
        let records = sqlx::query_as::<_, BallotRecord>(
            r#"
            SELECT id, poll_id, option_id, session_id, participant_name, cast_at
            FROM ballots WHERE poll_id = $1 ORDER BY cast_at
            "#,
        )
        .bind(Uuid::from(poll_id))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Ballot::try_from).collect()
    }
}

pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn find(&self, session_id: &SessionId) -> Result<Option<Participant>, RepositoryError> {
        let record = sqlx::query_as::<_, ParticipantRecord>(
            r#"
            SELECT session_id, name, connection_id, is_removed, joined_at
            FROM participants WHERE session_id = $1
            "#,
        )
        .bind(session_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Participant::try_from).transpose()
    }

    async fn upsert(&self, participant: Participant) -> Result<Participant, RepositoryError> {
        let record = sqlx::query_as::<_, ParticipantRecord>(
            r#"
            INSERT INTO participants (session_id, name, connection_id, is_removed, joined_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (session_id)
            DO UPDATE SET name = EXCLUDED.name, connection_id = EXCLUDED.connection_id
            RETURNING session_id, name, connection_id, is_removed, joined_at
            "#,
        )
        .bind(participant.session_id.as_str())
        .bind(participant.name.as_str())
        .bind(participant.connection_id)
        .bind(participant.is_removed)
        .bind(participant.joined_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Participant::try_from(record)
    }

    async fn mark_removed(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<Participant>, RepositoryError> {
        let record = sqlx::query_as::<_, ParticipantRecord>(
            r#"
            UPDATE participants SET is_removed = TRUE
            WHERE session_id = $1
            RETURNING session_id, name, connection_id, is_removed, joined_at
            "#,
        )
        .bind(session_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Participant::try_from).transpose()
    }

    async fn list_active(&self) -> Result<Vec<Participant>, RepositoryError> {
        let records = sqlx::query_as::<_, ParticipantRecord>(
            r#"
            SELECT session_id, name, connection_id, is_removed, joined_at
            FROM participants WHERE NOT is_removed ORDER BY joined_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Participant::try_from).collect()
    }
}

pub struct PgChatMessageRepository {
    pool: PgPool,
}

impl PgChatMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatMessageRepository for PgChatMessageRepository {
    async fn append(&self, message: ChatMessage) -> Result<ChatMessage, RepositoryError> {
        let record = sqlx::query_as::<_, ChatMessageRecord>(
            r#"
            INSERT INTO chat_messages (id, sender_id, sender_name, sender_role, content, sent_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, sender_id, sender_name, sender_role, content, sent_at
            "#,
        )
        .bind(Uuid::from(message.id))
        .bind(&message.sender_id)
        .bind(&message.sender_name)
        .bind(sender_role_str(message.sender_role))
        .bind(&message.content)
        .bind(message.sent_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_insert_err)?;

        ChatMessage::try_from(record)
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<ChatMessage>, RepositoryError> {
        let records = sqlx::query_as::<_, ChatMessageRecord>(
            r#"
            SELECT id, sender_id, sender_name, sender_role, content, sent_at
            FROM chat_messages ORDER BY sent_at DESC LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(ChatMessage::try_from).collect()
    }
}
