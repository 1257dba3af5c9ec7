//! 派发策略集成测试：通过回调所在线程名判断事件落在哪个执行上下文。

mod support;

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use proptest::prelude::*;
use spark_remoting::address::keys;
use spark_remoting::{
    ChannelEvent, ChannelHandler, ChannelMessage, ChannelRef, DispatchContext, DispatcherRegistry,
    EndpointAddress, EventExecutor, MessageKind, RemotingError, SharedHandler,
    TokioBlockingExecutor,
};
use support::{POOL_THREAD, RecordingHandler, channel, named_pool, next, thread_name};

fn endpoint() -> EndpointAddress {
    EndpointAddress::new("spark", "127.0.0.1", 20880)
}

fn request() -> ChannelMessage {
    ChannelMessage::raw(MessageKind::Request, Bytes::from_static(b"req"))
}

fn response() -> ChannelMessage {
    ChannelMessage::raw(MessageKind::Response, Bytes::from_static(b"resp"))
}

#[test]
fn default_strategy_moves_events_off_the_io_thread() {
    let pool = named_pool(POOL_THREAD);
    let registry = DispatcherRegistry::new(Arc::new(TokioBlockingExecutor::new(
        pool.handle().clone(),
    )));
    let (recorder, rx) = RecordingHandler::new();
    let handler = registry
        .dispatch(recorder, &endpoint())
        .expect("default strategy");
    let ch = channel(1);

    handler.connected(&ch).expect("submitted");
    assert_eq!(next(&rx).thread, POOL_THREAD);

    handler.received(&ch, request()).expect("submitted");
    let observed = next(&rx);
    assert_eq!(observed.kind, Some(MessageKind::Request));
    assert_eq!(observed.thread, POOL_THREAD);

    handler.received(&ch, ChannelMessage::heartbeat()).expect("submitted");
    assert_eq!(next(&rx).thread, POOL_THREAD);

    handler.disconnected(&ch).expect("submitted");
    assert_eq!(next(&rx).thread, POOL_THREAD);

    handler.sent(&ch, response()).expect("inline");
    let sent = next(&rx);
    assert_eq!(sent.event, ChannelEvent::Sent);
    assert_eq!(sent.thread, thread_name(), "sent completes on the caller");
}

#[test]
fn direct_strategy_returns_the_base_handler() {
    let pool = named_pool(POOL_THREAD);
    let registry = DispatcherRegistry::new(Arc::new(TokioBlockingExecutor::new(
        pool.handle().clone(),
    )));
    let (recorder, rx) = RecordingHandler::new();
    let base: SharedHandler = recorder;
    let address = endpoint().with_parameter(keys::DISPATCHER, "direct");

    let handler = registry
        .dispatch(Arc::clone(&base), &address)
        .expect("direct strategy");
    assert!(Arc::ptr_eq(&handler, &base));

    handler.received(&channel(2), request()).expect("inline");
    assert_eq!(next(&rx).thread, thread_name());
}

#[test]
fn message_strategy_keeps_lifecycle_inline() {
    let pool = named_pool(POOL_THREAD);
    let registry = DispatcherRegistry::new(Arc::new(TokioBlockingExecutor::new(
        pool.handle().clone(),
    )));
    let (recorder, rx) = RecordingHandler::new();
    let address = endpoint().with_parameter(keys::DISPATCHER, "message");
    let handler = registry.dispatch(recorder, &address).expect("message strategy");
    let ch = channel(3);

    handler.connected(&ch).expect("inline");
    assert_eq!(next(&rx).thread, thread_name());

    handler.received(&ch, response()).expect("submitted");
    assert_eq!(next(&rx).thread, POOL_THREAD);

    handler
        .caught(&ch, RemotingError::handler("peer reset"))
        .expect("inline");
    let caught = next(&rx);
    assert_eq!(caught.thread, thread_name());
    assert_eq!(caught.error.as_deref(), Some("handler failure: peer reset"));
}

#[test]
fn execution_strategy_only_offloads_requests() {
    let pool = named_pool(POOL_THREAD);
    let registry = DispatcherRegistry::new(Arc::new(TokioBlockingExecutor::new(
        pool.handle().clone(),
    )));
    let (recorder, rx) = RecordingHandler::new();
    let address = endpoint().with_parameter(keys::DISPATCHER, "execution");
    let handler = registry.dispatch(recorder, &address).expect("execution strategy");
    let ch = channel(4);

    handler.received(&ch, response()).expect("inline");
    assert_eq!(next(&rx).thread, thread_name());

    handler.received(&ch, request()).expect("submitted");
    assert_eq!(next(&rx).thread, POOL_THREAD);
}

#[test]
fn legacy_alias_selects_strategy_when_primary_key_absent() {
    let pool = named_pool(POOL_THREAD);
    let registry = DispatcherRegistry::new(Arc::new(TokioBlockingExecutor::new(
        pool.handle().clone(),
    )));
    let (recorder, rx) = RecordingHandler::new();
    let address = endpoint().with_parameter(keys::DISPATCHER_LEGACY_TYPO, "direct");
    let handler = registry.dispatch(recorder, &address).expect("alias resolves");

    handler.connected(&channel(5)).expect("inline");
    assert_eq!(next(&rx).thread, thread_name());
}

#[test]
fn primary_key_takes_priority_over_aliases() {
    let address = endpoint()
        .with_parameter(keys::DISPATCHER, "message")
        .with_parameter(keys::DISPATCHER_LEGACY_HANDLER, "direct");
    assert_eq!(DispatcherRegistry::requested_name(&address), Some("message"));
}

#[test]
fn unknown_strategy_fails_resolution() {
    let pool = named_pool(POOL_THREAD);
    let registry = DispatcherRegistry::new(Arc::new(TokioBlockingExecutor::new(
        pool.handle().clone(),
    )));
    let (recorder, _rx) = RecordingHandler::new();
    let address = endpoint().with_parameter(keys::DISPATCHER, "round-robin");

    let err = registry
        .dispatch(recorder, &address)
        .err()
        .expect("misconfiguration surfaces");
    assert!(matches!(err, RemotingError::UnknownDispatcher { ref name, .. } if name == "round-robin"));
}

/// 把收到的消息转交给专属执行器，其余事件内联。
struct OffloadReceived {
    inner: SharedHandler,
    executor: Arc<dyn EventExecutor>,
}

impl ChannelHandler for OffloadReceived {
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
        let inner = Arc::clone(&self.inner);
        let channel = Arc::clone(channel);
        self.executor.execute(
            ChannelEvent::Received,
            Box::new(move || {
                let _ = inner.received(&channel, message);
            }),
        )
    }

    fn caught(&self, channel: &ChannelRef, error: RemotingError) -> Result<(), RemotingError> {
        self.inner.caught(channel, error)
    }
}

#[test]
fn custom_strategy_is_resolved_by_name() {
    let pool = named_pool(POOL_THREAD);
    let lane = named_pool("custom-lane");
    let registry = DispatcherRegistry::new(Arc::new(TokioBlockingExecutor::new(
        pool.handle().clone(),
    )));
    let lane_executor: Arc<dyn EventExecutor> =
        Arc::new(TokioBlockingExecutor::new(lane.handle().clone()));
    registry.register(
        "custom",
        Arc::new(
            move |handler: SharedHandler, _: &EndpointAddress, _: &DispatchContext| -> SharedHandler {
                Arc::new(OffloadReceived {
                    inner: handler,
                    executor: Arc::clone(&lane_executor),
                })
            },
        ),
    );

    let (recorder, rx) = RecordingHandler::new();
    let address = endpoint().with_parameter(keys::DISPATCHER_LEGACY_HANDLER, "custom");
    let handler = registry.dispatch(recorder, &address).expect("custom strategy");

    handler.received(&channel(6), request()).expect("submitted");
    assert_eq!(next(&rx).thread, "custom-lane");
}

#[test]
fn connection_strategy_preserves_lifecycle_order_across_channels() {
    let pool = named_pool(POOL_THREAD);
    let registry = DispatcherRegistry::new(Arc::new(TokioBlockingExecutor::new(
        pool.handle().clone(),
    )));
    let (recorder, rx) = RecordingHandler::new();
    let address = endpoint().with_parameter(keys::DISPATCHER, "connection");
    let handler = registry.dispatch(recorder, &address).expect("connection strategy");

    let mut expected = Vec::new();
    for id in 0..32 {
        let ch = channel(id);
        handler.connected(&ch).expect("queued");
        handler.disconnected(&ch).expect("queued");
        expected.push((ChannelEvent::Connected, id));
        expected.push((ChannelEvent::Disconnected, id));
    }

    let observed: Vec<(ChannelEvent, u64)> = (0..expected.len())
        .map(|_| next(&rx))
        .inspect(|observation| assert_eq!(observation.thread, POOL_THREAD))
        .map(|observation| (observation.event, observation.channel.get()))
        .collect();
    assert_eq!(observed, expected);
}

/// 第一次 `received` 在线程池上阻塞，直到测试放行。
struct StallingHandler {
    entered: Barrier,
    release: Barrier,
}

impl ChannelHandler for StallingHandler {
    fn connected(&self, _channel: &ChannelRef) -> Result<(), RemotingError> {
        Ok(())
    }

    fn disconnected(&self, _channel: &ChannelRef) -> Result<(), RemotingError> {
        Ok(())
    }

    fn sent(&self, _channel: &ChannelRef, _message: ChannelMessage) -> Result<(), RemotingError> {
        Ok(())
    }

    fn received(&self, _channel: &ChannelRef, _message: ChannelMessage) -> Result<(), RemotingError> {
        self.entered.wait();
        self.release.wait();
        Ok(())
    }

    fn caught(&self, _channel: &ChannelRef, _error: RemotingError) -> Result<(), RemotingError> {
        Ok(())
    }
}

#[test]
fn saturated_pool_rejects_back_to_the_io_caller() {
    let pool = named_pool(POOL_THREAD);
    let executor = TokioBlockingExecutor::new(pool.handle().clone()).with_capacity(1);
    let registry = DispatcherRegistry::new(Arc::new(executor.clone()));
    let stalling = Arc::new(StallingHandler {
        entered: Barrier::new(2),
        release: Barrier::new(2),
    });
    let handler = registry
        .dispatch(stalling.clone(), &endpoint())
        .expect("default strategy");
    let ch = channel(9);

    handler.received(&ch, request()).expect("first task fits");
    stalling.entered.wait();
    assert_eq!(executor.in_flight(), 1);

    let err = handler
        .received(&ch, request())
        .expect_err("capacity exhausted");
    match err {
        RemotingError::ExecutorRejected { event, .. } => assert_eq!(event, ChannelEvent::Received),
        other => panic!("unexpected error: {other}"),
    }

    stalling.release.wait();
    let deadline = Instant::now() + Duration::from_secs(5);
    while executor.in_flight() > 0 {
        assert!(Instant::now() < deadline, "in-flight slot never returned");
        thread::sleep(Duration::from_millis(5));
    }
}

proptest! {
    #[test]
    fn first_non_blank_key_wins(
        values in proptest::collection::vec(
            proptest::option::of(prop_oneof![
                Just(""),
                Just("direct"),
                Just("message"),
                Just("execution"),
            ]),
            3,
        )
    ) {
        let mut address = endpoint();
        for (key, value) in keys::DISPATCHER_LOOKUP_ORDER.iter().zip(&values) {
            if let Some(value) = value {
                address = address.with_parameter(*key, *value);
            }
        }
        let expected = values.iter().flatten().copied().find(|value| !value.is_empty());

        prop_assert_eq!(DispatcherRegistry::requested_name(&address), expected);
    }
}
