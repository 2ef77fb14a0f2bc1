//! 会话名册。
//!
//! 注册是幂等的 upsert：已知且未被移除的会话只替换显示名和连接
//! 句柄；被移除标记一旦置位即永久生效，此后任何注册尝试都被拒绝。

use std::sync::Arc;

use domain::{DomainError, Participant, ParticipantName, SessionId};
use uuid::Uuid;

use crate::{
    clock::Clock,
    error::ApplicationError,
    events::{EventBroadcaster, PollEvent},
    repository::SessionRepository,
};

#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub session_id: String,
    pub name: String,
    pub connection_id: Uuid,
}

pub struct SessionServiceDependencies {
    pub session_repository: Arc<dyn SessionRepository>,
    pub clock: Arc<dyn Clock>,
    pub broadcaster: Arc<dyn EventBroadcaster>,
}

pub struct SessionService {
    deps: SessionServiceDependencies,
}

impl SessionService {
    pub fn new(deps: SessionServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn register(
        &self,
        request: RegisterRequest,
    ) -> Result<Participant, ApplicationError> {
        let session_id = SessionId::parse(request.session_id)?;
        let name = ParticipantName::parse(request.name)?;

        let participant = match self.deps.session_repository.find(&session_id).await? {
            Some(mut existing) => {
                if existing.is_removed {
                    return Err(DomainError::ParticipantRemoved.into());
                }
                existing.reconnect(name, request.connection_id);
                self.deps.session_repository.upsert(existing).await?
            }
            None => {
                let participant = Participant::register(
                    session_id,
                    name,
                    request.connection_id,
                    self.deps.clock.now(),
                );
                self.deps.session_repository.upsert(participant).await?
            }
        };

        tracing::info!(session_id = %participant.session_id, "participant registered");
        self.publish_roster().await?;
        Ok(participant)
    }

    /// 将参与者从会话中移除（踢出）。标记永久生效。
    pub async fn remove(&self, session_id: &str) -> Result<Participant, ApplicationError> {
        let session_id = SessionId::parse(session_id)?;
        let removed = self
            .deps
            .session_repository
            .mark_removed(&session_id)
            .await?
            .ok_or(DomainError::ParticipantNotFound)?;

        tracing::info!(session_id = %session_id, "participant removed");
        self.deps
            .broadcaster
            .publish(PollEvent::ParticipantRemoved { session_id })
            .await?;
        self.publish_roster().await?;
        Ok(removed)
    }

    pub async fn find(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<Participant>, ApplicationError> {
        Ok(self.deps.session_repository.find(session_id).await?)
    }

    /// 当前未被移除的参与者名册。
    pub async fn roster(&self) -> Result<Vec<Participant>, ApplicationError> {
        Ok(self.deps.session_repository.list_active().await?)
    }

    async fn publish_roster(&self) -> Result<(), ApplicationError> {
        let participants = self.roster().await?;
        self.deps
            .broadcaster
            .publish(PollEvent::RosterUpdated { participants })
            .await?;
        Ok(())
    }
}
