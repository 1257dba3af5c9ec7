use crate::channel::{ChannelHandler, ChannelMessage, ChannelRef, Payload, SharedHandler};
use crate::error::RemotingError;

/// 在业务 Handler 之前物化延迟负载的包装器。
///
/// # 教案式说明
/// - **意图 (Why)**：放在派发策略内侧，使解析发生在策略选定的执行上下文，而非接收字节的 I/O 线程。
/// - **契约 (What)**：
///   - 仅 `received` 且负载为 [`Payload::Deferred`] 时触发解码，其余事件原样转发；
///   - 解码失败时不调用内层 `received`，改为以 [`RemotingError::Decode`] 调用内层 `caught`，
///     失败只影响这一条消息，通道与其他在途消息不受影响。
pub struct DecodeHandler {
    inner: SharedHandler,
}

impl DecodeHandler {
    pub fn new(inner: SharedHandler) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &SharedHandler {
        &self.inner
    }
}

impl ChannelHandler for DecodeHandler {
    fn connected(&self, channel: &ChannelRef) -> Result<(), RemotingError> {
        self.inner.connected(channel)
    }

    fn disconnected(&self, channel: &ChannelRef) -> Result<(), RemotingError> {
        self.inner.disconnected(channel)
    }

    fn sent(&self, channel: &ChannelRef, message: ChannelMessage) -> Result<(), RemotingError> {
        self.inner.sent(channel, message)
    }

    fn received(&self, channel: &ChannelRef, message: ChannelMessage) -> Result<(), RemotingError> {
        if let Payload::Deferred(gate) = message.payload()
            && let Err(err) = gate.decode_erased()
        {
            tracing::debug!(channel = %channel.id(), error = %err, "dropping undecodable message");
            return self.inner.caught(channel, RemotingError::Decode(err));
        }
        self.inner.received(channel, message)
    }

    fn caught(&self, channel: &ChannelRef, error: RemotingError) -> Result<(), RemotingError> {
        self.inner.caught(channel, error)
    }
}
