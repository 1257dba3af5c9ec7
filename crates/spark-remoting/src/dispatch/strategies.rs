//! 内建派发策略。
//!
//! 每个策略只是一张“事件 → 执行车道”的路由表，真正的转发由 [`RoutedHandler`] 统一完成。

use std::sync::Arc;

use super::{DispatchContext, Dispatcher};
use crate::address::EndpointAddress;
use crate::channel::{
    ChannelEvent, ChannelHandler, ChannelMessage, ChannelRef, MessageKind, SharedHandler,
};
use crate::error::RemotingError;
use crate::executor::{EventExecutor, SerialExecutor};

/// 事件的执行车道。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lane {
    /// 在收到事件的 I/O 上下文内联执行。
    Inline,
    /// 投递到共享线程池。
    Shared,
    /// 投递到本 Handler 独占的串行车道。
    Ordered,
}

/// `kind` 仅在 `Received`/`Sent` 事件上存在。
type RoutePolicy = fn(ChannelEvent, Option<MessageKind>) -> Lane;

/// 全部事件（发送完成除外）进入共享线程池。默认策略。
#[derive(Clone, Copy, Debug, Default)]
pub struct AllDispatcher;

impl AllDispatcher {
    pub const NAME: &'static str = "all";

    fn route(event: ChannelEvent, _kind: Option<MessageKind>) -> Lane {
        match event {
            ChannelEvent::Sent => Lane::Inline,
            _ => Lane::Shared,
        }
    }
}

impl Dispatcher for AllDispatcher {
    fn dispatch(
        &self,
        handler: SharedHandler,
        _address: &EndpointAddress,
        context: &DispatchContext,
    ) -> SharedHandler {
        RoutedHandler::shared(Self::NAME, handler, context, Self::route)
    }
}

/// 所有事件直接在 I/O 上下文执行，不做包装。
#[derive(Clone, Copy, Debug, Default)]
pub struct DirectDispatcher;

impl DirectDispatcher {
    pub const NAME: &'static str = "direct";
}

impl Dispatcher for DirectDispatcher {
    fn dispatch(
        &self,
        handler: SharedHandler,
        _address: &EndpointAddress,
        _context: &DispatchContext,
    ) -> SharedHandler {
        handler
    }
}

/// 只有收到的消息体进入线程池；连接生命周期、异常与发送完成都内联处理。
#[derive(Clone, Copy, Debug, Default)]
pub struct MessageOnlyDispatcher;

impl MessageOnlyDispatcher {
    pub const NAME: &'static str = "message";

    fn route(event: ChannelEvent, _kind: Option<MessageKind>) -> Lane {
        match event {
            ChannelEvent::Received => Lane::Shared,
            _ => Lane::Inline,
        }
    }
}

impl Dispatcher for MessageOnlyDispatcher {
    fn dispatch(
        &self,
        handler: SharedHandler,
        _address: &EndpointAddress,
        context: &DispatchContext,
    ) -> SharedHandler {
        RoutedHandler::shared(Self::NAME, handler, context, Self::route)
    }
}

/// 只有请求进入线程池；响应与心跳在 I/O 上下文内完成唤醒即可。
#[derive(Clone, Copy, Debug, Default)]
pub struct ExecutionDispatcher;

impl ExecutionDispatcher {
    pub const NAME: &'static str = "execution";

    fn route(event: ChannelEvent, kind: Option<MessageKind>) -> Lane {
        match (event, kind) {
            (ChannelEvent::Received, Some(MessageKind::Request)) => Lane::Shared,
            _ => Lane::Inline,
        }
    }
}

impl Dispatcher for ExecutionDispatcher {
    fn dispatch(
        &self,
        handler: SharedHandler,
        _address: &EndpointAddress,
        context: &DispatchContext,
    ) -> SharedHandler {
        RoutedHandler::shared(Self::NAME, handler, context, Self::route)
    }
}

/// 连接建立/断开经由串行车道严格有序执行，消息与异常进入共享线程池。
///
/// 串行车道按包装实例划分：每次 `dispatch` 产生一条新车道，复用共享线程池的线程。
#[derive(Clone, Copy, Debug, Default)]
pub struct ConnectionOrderedDispatcher;

impl ConnectionOrderedDispatcher {
    pub const NAME: &'static str = "connection";

    fn route(event: ChannelEvent, _kind: Option<MessageKind>) -> Lane {
        match event {
            ChannelEvent::Connected | ChannelEvent::Disconnected => Lane::Ordered,
            ChannelEvent::Sent => Lane::Inline,
            ChannelEvent::Received | ChannelEvent::Caught => Lane::Shared,
        }
    }
}

impl Dispatcher for ConnectionOrderedDispatcher {
    fn dispatch(
        &self,
        handler: SharedHandler,
        _address: &EndpointAddress,
        context: &DispatchContext,
    ) -> SharedHandler {
        let ordered = SerialExecutor::new(Arc::clone(context.shared_executor()));
        Arc::new(RoutedHandler {
            strategy: Self::NAME,
            inner: handler,
            shared: Arc::clone(context.shared_executor()),
            ordered: Some(ordered),
            policy: Self::route,
        })
    }
}

/// 按路由表把事件转交给对应车道的通用包装器。
///
/// # 教案式说明
/// - **契约 (What)**：
///   - 内联车道的返回值原样交还调用方；
///   - 线程池车道只报告“是否成功提交”，Handler 自身的失败以 `warn` 级日志记录；
///   - 包装器只持有内层 Handler 的 `Arc`，从不修改它。
struct RoutedHandler {
    strategy: &'static str,
    inner: SharedHandler,
    shared: Arc<dyn EventExecutor>,
    ordered: Option<SerialExecutor>,
    policy: RoutePolicy,
}

impl RoutedHandler {
    fn shared(
        strategy: &'static str,
        inner: SharedHandler,
        context: &DispatchContext,
        policy: RoutePolicy,
    ) -> SharedHandler {
        Arc::new(Self {
            strategy,
            inner,
            shared: Arc::clone(context.shared_executor()),
            ordered: None,
            policy,
        })
    }

    fn route<F>(
        &self,
        event: ChannelEvent,
        kind: Option<MessageKind>,
        channel: &ChannelRef,
        call: F,
    ) -> Result<(), RemotingError>
    where
        F: FnOnce(&dyn ChannelHandler, &ChannelRef) -> Result<(), RemotingError> + Send + 'static,
    {
        match (self.policy)(event, kind) {
            Lane::Inline => call(self.inner.as_ref(), channel),
            Lane::Shared => self.submit(self.shared.as_ref(), event, channel, call),
            Lane::Ordered => match &self.ordered {
                Some(lane) => self.submit(lane, event, channel, call),
                None => self.submit(self.shared.as_ref(), event, channel, call),
            },
        }
    }

    fn submit<F>(
        &self,
        executor: &dyn EventExecutor,
        event: ChannelEvent,
        channel: &ChannelRef,
        call: F,
    ) -> Result<(), RemotingError>
    where
        F: FnOnce(&dyn ChannelHandler, &ChannelRef) -> Result<(), RemotingError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let channel = Arc::clone(channel);
        let strategy = self.strategy;
        executor.execute(
            event,
            Box::new(move || {
                if let Err(err) = call(inner.as_ref(), &channel) {
                    tracing::warn!(
                        dispatcher = strategy,
                        event = %event,
                        channel = %channel.id(),
                        error = %err,
                        "channel handler failed on dispatched context"
                    );
                }
            }),
        )
    }
}

impl ChannelHandler for RoutedHandler {
    fn connected(&self, channel: &ChannelRef) -> Result<(), RemotingError> {
        self.route(ChannelEvent::Connected, None, channel, |handler, channel| {
            handler.connected(channel)
        })
    }

    fn disconnected(&self, channel: &ChannelRef) -> Result<(), RemotingError> {
        self.route(ChannelEvent::Disconnected, None, channel, |handler, channel| {
            handler.disconnected(channel)
        })
    }

    fn sent(&self, channel: &ChannelRef, message: ChannelMessage) -> Result<(), RemotingError> {
        let kind = message.kind();
        self.route(ChannelEvent::Sent, Some(kind), channel, move |handler, channel| {
            handler.sent(channel, message)
        })
    }

    fn received(&self, channel: &ChannelRef, message: ChannelMessage) -> Result<(), RemotingError> {
        let kind = message.kind();
        self.route(
            ChannelEvent::Received,
            Some(kind),
            channel,
            move |handler, channel| handler.received(channel, message),
        )
    }

    fn caught(&self, channel: &ChannelRef, error: RemotingError) -> Result<(), RemotingError> {
        self.route(ChannelEvent::Caught, None, channel, move |handler, channel| {
            handler.caught(channel, error)
        })
    }
}
