use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value_objects::{ParticipantName, SessionId, Timestamp};

/// 已注册的参与者。会话标识由客户端持有，刷新或重连后不变；
/// 连接句柄在每次重新注册时被替换。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub session_id: SessionId,
    pub name: ParticipantName,
    /// 当前 WebSocket 连接的句柄
    pub connection_id: Uuid,
    /// 一旦置位即永久生效，后续任何注册尝试都会被拒绝
    pub is_removed: bool,
    pub joined_at: Timestamp,
}

impl Participant {
    pub fn register(
        session_id: SessionId,
        name: ParticipantName,
        connection_id: Uuid,
        joined_at: Timestamp,
    ) -> Self {
        Self {
            session_id,
            name,
            connection_id,
            is_removed: false,
            joined_at,
        }
    }

    /// 重连：仅替换显示名和连接句柄，保留加入时间和移除标记。
    pub fn reconnect(&mut self, name: ParticipantName, connection_id: Uuid) {
        self.name = name;
        self.connection_id = connection_id;
    }

    pub fn mark_removed(&mut self) {
        self.is_removed = true;
    }
}
