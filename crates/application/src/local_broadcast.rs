// 进程内事件广播器
use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::events::{BroadcastError, EventBroadcaster, PollEvent};

#[derive(Clone)]
pub struct LocalEventBroadcaster {
    sender: broadcast::Sender<PollEvent>,
}

impl LocalEventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PollEvent> {
        self.sender.subscribe()
    }
}

impl Default for LocalEventBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EventBroadcaster for LocalEventBroadcaster {
    async fn publish(&self, event: PollEvent) -> Result<(), BroadcastError> {
        // 没有订阅者不算失败：计时器在无人连接时照常走表
        let _ = self.sender.send(event);
        Ok(())
    }
}
