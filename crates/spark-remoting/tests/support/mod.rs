//! 集成测试共享桩：可观察执行线程的 Handler、最小通道实现与具名线程池。
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use spark_remoting::{
    Channel, ChannelEvent, ChannelHandler, ChannelId, ChannelMessage, ChannelRef, MessageKind,
    RemotingError,
};
use tokio::runtime::{Builder, Runtime};

pub const POOL_THREAD: &str = "dispatch-pool";

#[derive(Debug)]
pub struct TestChannel {
    id: ChannelId,
}

impl Channel for TestChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn remote_address(&self) -> Option<SocketAddr> {
        Some(SocketAddr::from(([127, 0, 0, 1], 40_000 + self.id.get() as u16)))
    }

    fn is_connected(&self) -> bool {
        true
    }
}

pub fn channel(id: u64) -> ChannelRef {
    Arc::new(TestChannel {
        id: ChannelId::new(id),
    })
}

/// 一次 Handler 调用的观察记录。
#[derive(Clone, Debug)]
pub struct Observation {
    pub event: ChannelEvent,
    pub channel: ChannelId,
    pub kind: Option<MessageKind>,
    pub error: Option<String>,
    pub thread: String,
}

pub fn thread_name() -> String {
    std::thread::current()
        .name()
        .unwrap_or("<unnamed>")
        .to_owned()
}

/// 把每次回调连同执行线程名发送给测试线程。
pub struct RecordingHandler {
    tx: Sender<Observation>,
}

impl RecordingHandler {
    pub fn new() -> (Arc<Self>, Receiver<Observation>) {
        let (tx, rx) = mpsc::channel();
        (Arc::new(Self { tx }), rx)
    }

    fn record(
        &self,
        event: ChannelEvent,
        channel: &ChannelRef,
        kind: Option<MessageKind>,
        error: Option<String>,
    ) -> Result<(), RemotingError> {
        let observation = Observation {
            event,
            channel: channel.id(),
            kind,
            error,
            thread: thread_name(),
        };
        self.tx
            .send(observation)
            .map_err(|err| RemotingError::handler(err.to_string()))
    }
}

impl ChannelHandler for RecordingHandler {
    fn connected(&self, channel: &ChannelRef) -> Result<(), RemotingError> {
        self.record(ChannelEvent::Connected, channel, None, None)
    }

    fn disconnected(&self, channel: &ChannelRef) -> Result<(), RemotingError> {
        self.record(ChannelEvent::Disconnected, channel, None, None)
    }

    fn sent(&self, channel: &ChannelRef, message: ChannelMessage) -> Result<(), RemotingError> {
        self.record(ChannelEvent::Sent, channel, Some(message.kind()), None)
    }

    fn received(&self, channel: &ChannelRef, message: ChannelMessage) -> Result<(), RemotingError> {
        self.record(ChannelEvent::Received, channel, Some(message.kind()), None)
    }

    fn caught(&self, channel: &ChannelRef, error: RemotingError) -> Result<(), RemotingError> {
        self.record(ChannelEvent::Caught, channel, None, Some(error.to_string()))
    }
}

pub fn named_pool(name: &str) -> Runtime {
    Builder::new_multi_thread()
        .worker_threads(1)
        .max_blocking_threads(4)
        .thread_name(name)
        .build()
        .expect("build runtime")
}

pub fn next(rx: &Receiver<Observation>) -> Observation {
    rx.recv_timeout(Duration::from_secs(5))
        .expect("handler callback within 5s")
}
