//! 通道与通道事件处理契约。
//!
//! # 教案式导航
//! - **定位（Where）**：传输实现在 I/O 线程上感知到连接建立、断开、收发与异常后，
//!   统一通过 [`ChannelHandler`] 向上投递；派发策略包装该 trait 决定事件落在哪个执行上下文。
//! - **约束（What）**：所有方法都以拥有型参数接收消息与错误，使包装器可以把事件整体移交给线程池。

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;

use crate::decode::Decodeable;
use crate::error::RemotingError;

/// 通道在进程内的稳定标识。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

impl ChannelId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 传输实现暴露给 Handler 的最小通道视图。
pub trait Channel: Send + Sync + fmt::Debug + 'static {
    fn id(&self) -> ChannelId;

    fn remote_address(&self) -> Option<SocketAddr>;

    fn is_connected(&self) -> bool;
}

/// 在 Handler 之间共享的通道引用。
pub type ChannelRef = Arc<dyn Channel>;

/// 事件处理器的共享引用；派发策略输入与输出都是该类型。
pub type SharedHandler = Arc<dyn ChannelHandler>;

/// 入站消息的语义类别，派发策略据此决定是否移交线程池。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Request,
    Response,
    Heartbeat,
}

/// 消息体：原始字节，或尚未物化的延迟解码门。
#[derive(Clone)]
pub enum Payload {
    Raw(Bytes),
    Deferred(Arc<dyn Decodeable>),
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Raw(bytes) => f.debug_tuple("Raw").field(&bytes.len()).finish(),
            Payload::Deferred(gate) => f
                .debug_struct("Deferred")
                .field("decoded", &gate.is_decoded())
                .finish(),
        }
    }
}

/// 经过分帧、可路由但未必完成解析的消息。
#[derive(Clone, Debug)]
pub struct ChannelMessage {
    kind: MessageKind,
    payload: Payload,
}

impl ChannelMessage {
    pub fn new(kind: MessageKind, payload: Payload) -> Self {
        Self { kind, payload }
    }

    pub fn raw(kind: MessageKind, bytes: Bytes) -> Self {
        Self::new(kind, Payload::Raw(bytes))
    }

    pub fn deferred(kind: MessageKind, gate: Arc<dyn Decodeable>) -> Self {
        Self::new(kind, Payload::Deferred(gate))
    }

    pub fn heartbeat() -> Self {
        Self::raw(MessageKind::Heartbeat, Bytes::new())
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

/// 通道事件类别，用于策略决策与日志字段。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelEvent {
    Connected,
    Disconnected,
    Sent,
    Received,
    Caught,
}

impl ChannelEvent {
    pub const fn as_str(self) -> &'static str {
        match self {
            ChannelEvent::Connected => "connected",
            ChannelEvent::Disconnected => "disconnected",
            ChannelEvent::Sent => "sent",
            ChannelEvent::Received => "received",
            ChannelEvent::Caught => "caught",
        }
    }
}

impl fmt::Display for ChannelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 通道事件处理合约。
///
/// # 教案式说明
/// - **意图 (Why)**：I/O 线程不得被业务逻辑阻塞，派发层需要能把任意事件连同参数整体移交到别的执行上下文，
///   因此所有参数都是拥有型或可廉价克隆的 `Arc`。
/// - **契约 (What)**：
///   - 实现必须 `Send + Sync + 'static`，同一实例会被多个线程并发调用；
///   - 返回 `Err` 表示该事件处理失败，不代表通道不可用；是否关闭通道由传输实现决定。
/// - **风险 (Trade-offs)**：派发到线程池后，返回值只能被记录日志，无法回传给 I/O 线程。
pub trait ChannelHandler: Send + Sync + 'static {
    fn connected(&self, channel: &ChannelRef) -> Result<(), RemotingError>;

    fn disconnected(&self, channel: &ChannelRef) -> Result<(), RemotingError>;

    fn sent(&self, channel: &ChannelRef, message: ChannelMessage) -> Result<(), RemotingError>;

    fn received(&self, channel: &ChannelRef, message: ChannelMessage) -> Result<(), RemotingError>;

    fn caught(&self, channel: &ChannelRef, error: RemotingError) -> Result<(), RemotingError>;
}
