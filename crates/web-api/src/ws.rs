//! WebSocket 扇出/恢复网关。
//!
//! 每个新连接先收到一次性恢复回放（当前/最近投票、名册、聊天
//! 回溯），之后通过事件订阅与所有连接方保持一致。每个客户端请求
//! 恰好得到一个应答帧；状态变更通过事件通道到达所有连接，投递为
//! 至少一次。被移除的会话在连接时收到移除信号而不是常规状态。

use std::sync::{Arc, Mutex};

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use application::{
    services::{
        CreatePollRequest, PollOptionInput, RegisterRequest, SendChatRequest, SubmitVoteRequest,
        DEFAULT_BACKLOG_LIMIT, DEFAULT_HISTORY_LIMIT,
    },
    ApplicationError, PollEvent, PollWithResults,
};
use domain::{Ballot, ChatMessage, Participant, PollId, SenderRole, SessionId};

use crate::{error::classify, state::AppState};

/// 客户端请求帧
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    CreatePoll {
        question: String,
        options: Vec<OptionPayload>,
        duration: i64,
    },
    EndPoll {
        poll_id: Uuid,
    },
    SubmitVote {
        poll_id: Uuid,
        option_id: String,
        participant_id: String,
        participant_name: String,
    },
    Register {
        session_id: String,
        name: String,
    },
    RemoveParticipant {
        session_id: String,
    },
    Chat {
        sender_id: String,
        sender_name: String,
        sender_role: SenderRole,
        content: String,
    },
    CheckVote {
        poll_id: Uuid,
        participant_id: String,
    },
    GetHistory {
        limit: Option<u32>,
    },
    GetCurrentState {
        participant_id: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
pub struct OptionPayload {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// 服务端应答帧。广播事件以 `PollEvent` 原样序列化转发，
/// 与应答帧通过 `event` / `type` 字段区分。
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerReply {
    PollState {
        poll: Option<PollWithResults>,
    },
    Roster {
        participants: Vec<Participant>,
    },
    ChatHistory {
        messages: Vec<ChatMessage>,
    },
    /// 该会话已被移除
    Removed,
    PollCreated {
        poll: PollWithResults,
    },
    PollEnded {
        poll: PollWithResults,
    },
    Registered {
        participant: Participant,
        active_poll: Option<PollWithResults>,
        has_voted: bool,
    },
    VoteAccepted {
        ballot: Ballot,
    },
    VoteStatus {
        has_voted: bool,
    },
    ChatAccepted {
        message: ChatMessage,
    },
    ParticipantRemoved {
        participant: Participant,
    },
    History {
        polls: Vec<PollWithResults>,
    },
    CurrentState {
        poll: Option<PollWithResults>,
        has_voted: bool,
    },
    Error {
        code: &'static str,
        message: String,
    },
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    session_id: Option<String>,
}

pub async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.session_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, presented_session: Option<String>) {
    let connection_id = Uuid::new_v4();
    tracing::debug!(%connection_id, "client connected");

    let (mut sink, mut incoming) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    // 出站写入任务：顺序排空队列
    let write_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(WsMessage::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    // 重连的已知会话若已被移除，只发送移除信号，不回放常规状态
    let known_session = presented_session.and_then(|raw| SessionId::parse(raw).ok());
    if let Some(session_id) = &known_session {
        match state.session_service.find(session_id).await {
            Ok(Some(participant)) if participant.is_removed => {
                send_reply(&tx, &ServerReply::Removed);
                drop(tx);
                let _ = write_task.await;
                return;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to look up session on connect");
            }
            _ => {}
        }
    }

    // 事件订阅要先于恢复回放建立，回放之后的变更不会漏掉
    let events = state.broadcaster.subscribe();

    if let Err(err) = send_recovery_burst(&state, &tx).await {
        let (_, code, message) = classify(&err);
        send_reply(&tx, &ServerReply::Error { code, message });
    }

    // 本连接注册的会话标识，用于翻译移除信号
    let registered_session = Arc::new(Mutex::new(known_session));

    let forward_task = tokio::spawn(forward_events(
        events,
        tx.clone(),
        registered_session.clone(),
    ));

    while let Some(Ok(message)) = incoming.next().await {
        match message {
            WsMessage::Text(text) => {
                handle_client_frame(&state, &tx, &registered_session, connection_id, text.as_str())
                    .await;
            }
            WsMessage::Close(_) => break,
            // Ping/Pong 由 axum 自动应答
            _ => {}
        }
    }

    forward_task.abort();
    drop(tx);
    let _ = write_task.await;
    tracing::debug!(%connection_id, "client disconnected");
}

/// 一次性恢复回放：三项各恰好一次。
async fn send_recovery_burst(
    state: &AppState,
    tx: &mpsc::UnboundedSender<String>,
) -> Result<(), ApplicationError> {
    let poll = state.poll_service.latest_with_results().await?;
    send_reply(tx, &ServerReply::PollState { poll });

    let participants = state.session_service.roster().await?;
    send_reply(tx, &ServerReply::Roster { participants });

    let messages = state.chat_service.recent(DEFAULT_BACKLOG_LIMIT).await?;
    send_reply(tx, &ServerReply::ChatHistory { messages });

    Ok(())
}

/// 把事件通道泵入本连接。`participant.removed` 命中本连接注册的
/// 会话时，补发移除信号并停止转发。
async fn forward_events(
    mut events: broadcast::Receiver<PollEvent>,
    tx: mpsc::UnboundedSender<String>,
    registered_session: Arc<Mutex<Option<SessionId>>>,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let own_removal = match &event {
                    PollEvent::ParticipantRemoved { session_id } => {
                        let registered = registered_session
                            .lock()
                            .unwrap_or_else(|poisoned| poisoned.into_inner());
                        registered.as_ref() == Some(session_id)
                    }
                    _ => false,
                };

                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if tx.send(json).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to serialize event payload");
                        continue;
                    }
                }

                if own_removal {
                    send_reply(&tx, &ServerReply::Removed);
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event subscriber lagging, events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn handle_client_frame(
    state: &AppState,
    tx: &mpsc::UnboundedSender<String>,
    registered_session: &Arc<Mutex<Option<SessionId>>>,
    connection_id: Uuid,
    text: &str,
) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(err) => {
            send_reply(
                tx,
                &ServerReply::Error {
                    code: "INVALID_MESSAGE",
                    message: err.to_string(),
                },
            );
            return;
        }
    };

    match dispatch(state, registered_session, connection_id, message).await {
        Ok(reply) => send_reply(tx, &reply),
        Err(err) => {
            let (_, code, message) = classify(&err);
            send_reply(tx, &ServerReply::Error { code, message });
        }
    }
}

async fn dispatch(
    state: &AppState,
    registered_session: &Arc<Mutex<Option<SessionId>>>,
    connection_id: Uuid,
    message: ClientMessage,
) -> Result<ServerReply, ApplicationError> {
    match message {
        ClientMessage::CreatePoll {
            question,
            options,
            duration,
        } => {
            let snapshot = state
                .poll_service
                .create_poll(CreatePollRequest {
                    question,
                    options: options
                        .into_iter()
                        .map(|option| PollOptionInput {
                            id: option.id,
                            text: option.text,
                            is_correct: option.is_correct,
                        })
                        .collect(),
                    duration_secs: duration,
                })
                .await?;
            // 生命周期先持久化并激活，计时器随后接管倒计时
            state
                .timer
                .start(snapshot.id, snapshot.duration_secs, snapshot.started_at);
            Ok(ServerReply::PollCreated { poll: snapshot })
        }

        ClientMessage::EndPoll { poll_id } => {
            let snapshot = state.poll_service.end_poll(PollId::from(poll_id)).await?;
            Ok(ServerReply::PollEnded { poll: snapshot })
        }

        ClientMessage::SubmitVote {
            poll_id,
            option_id,
            participant_id,
            participant_name,
        } => {
            let ballot = state
                .vote_service
                .submit_vote(SubmitVoteRequest {
                    poll_id,
                    option_id,
                    participant_id,
                    participant_name,
                })
                .await?;
            Ok(ServerReply::VoteAccepted { ballot })
        }

        ClientMessage::Register { session_id, name } => {
            let participant = state
                .session_service
                .register(RegisterRequest {
                    session_id,
                    name,
                    connection_id,
                })
                .await?;

            {
                let mut registered = registered_session
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                *registered = Some(participant.session_id.clone());
            }

            // 注册应答带上当前投票视图和投票状态，刷新后的客户端
            // 据此恢复，不会重复投票
            let active_poll = match state.poll_service.active_poll().await? {
                Some(poll) => Some(state.poll_service.poll_with_results(poll.id).await?),
                None => None,
            };
            let has_voted = match &active_poll {
                Some(poll) => {
                    state
                        .vote_service
                        .has_voted(poll.id, &participant.session_id)
                        .await?
                }
                None => false,
            };

            Ok(ServerReply::Registered {
                participant,
                active_poll,
                has_voted,
            })
        }

        ClientMessage::RemoveParticipant { session_id } => {
            let participant = state.session_service.remove(&session_id).await?;
            Ok(ServerReply::ParticipantRemoved { participant })
        }

        ClientMessage::Chat {
            sender_id,
            sender_name,
            sender_role,
            content,
        } => {
            let message = state
                .chat_service
                .send(SendChatRequest {
                    sender_id,
                    sender_name,
                    sender_role,
                    content,
                })
                .await?;
            Ok(ServerReply::ChatAccepted { message })
        }

        ClientMessage::CheckVote {
            poll_id,
            participant_id,
        } => {
            let has_voted = match SessionId::parse(participant_id) {
                Ok(session) => {
                    state
                        .vote_service
                        .has_voted(PollId::from(poll_id), &session)
                        .await?
                }
                Err(_) => false,
            };
            Ok(ServerReply::VoteStatus { has_voted })
        }

        ClientMessage::GetHistory { limit } => {
            let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).min(100);
            let polls = state.poll_service.history(limit).await?;
            Ok(ServerReply::History { polls })
        }

        ClientMessage::GetCurrentState { participant_id } => {
            let poll = state.poll_service.latest_with_results().await?;
            let session = participant_id.and_then(|raw| SessionId::parse(raw).ok());
            let has_voted = match (&poll, session) {
                (Some(poll), Some(session)) => {
                    state.vote_service.has_voted(poll.id, &session).await?
                }
                _ => false,
            };
            Ok(ServerReply::CurrentState { poll, has_voted })
        }
    }
}

fn send_reply(tx: &mpsc::UnboundedSender<String>, reply: &ServerReply) {
    match serde_json::to_string(reply) {
        Ok(json) => {
            let _ = tx.send(json);
        }
        Err(err) => tracing::warn!(error = %err, "failed to serialize websocket payload"),
    }
}
