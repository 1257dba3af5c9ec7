//! 测试桩集合：内存连接句柄、记录型注册中心代理与脚本化恢复。
//!
//! 单元测试与 `tests/` 下的集成测试共用这些实现，避免各自维护一份行为略有差异的 Mock。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use spark_remoting::EndpointAddress;

use crate::error::RegistryError;
use crate::service::{ConnectionHandle, ListenerRef, NotifyListener, Recoverable, RegistryService};

/// 可用性可由测试直接拨动的连接句柄。
#[derive(Debug)]
pub struct StubConnection {
    address: EndpointAddress,
    available: AtomicBool,
    destroys: AtomicUsize,
    fail_destroy: AtomicBool,
}

impl StubConnection {
    pub fn new(address: EndpointAddress, available: bool) -> Self {
        Self {
            address,
            available: AtomicBool::new(available),
            destroys: AtomicUsize::new(0),
            fail_destroy: AtomicBool::new(false),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// 让后续 `destroy` 调用返回错误（句柄仍会被标记为不可用）。
    pub fn fail_destroy(&self) {
        self.fail_destroy.store(true, Ordering::SeqCst);
    }

    pub fn destroys(&self) -> usize {
        self.destroys.load(Ordering::SeqCst)
    }
}

impl ConnectionHandle for StubConnection {
    fn address(&self) -> &EndpointAddress {
        &self.address
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn destroy(&self) -> Result<(), RegistryError> {
        self.destroys.fetch_add(1, Ordering::SeqCst);
        self.available.store(false, Ordering::SeqCst);
        if self.fail_destroy.load(Ordering::SeqCst) {
            return Err(RegistryError::Teardown {
                step: "connection",
                detail: "stub connection refused to close".to_owned(),
            });
        }
        Ok(())
    }
}

/// 前 `failures` 次恢复失败，之后把句柄拨为可用。
#[derive(Debug)]
pub struct ScriptedRecovery {
    handle: Arc<StubConnection>,
    failures_left: AtomicUsize,
    calls: AtomicUsize,
    delay: Duration,
}

impl ScriptedRecovery {
    pub fn new(handle: Arc<StubConnection>, failures: usize) -> Self {
        Self {
            handle,
            failures_left: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    /// 每次恢复前阻塞 `delay`，用于放大并发窗口。
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Recoverable for ScriptedRecovery {
    fn address(&self) -> &EndpointAddress {
        self.handle.address()
    }

    fn recover(&self) -> Result<(), RegistryError> {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(RegistryError::Recovery {
                address: self.handle.address().address(),
                detail: format!("scripted failure on attempt {attempt}"),
            });
        }
        self.handle.set_available(true);
        Ok(())
    }
}

/// 把收到的调用记录在内存中的注册中心代理。
#[derive(Debug, Default)]
pub struct RecordingService {
    registered: Mutex<Vec<EndpointAddress>>,
    subscriptions: Mutex<Vec<(EndpointAddress, ListenerRef)>>,
    calls: Mutex<Vec<&'static str>>,
    lookup: Mutex<Vec<EndpointAddress>>,
    failing: AtomicBool,
}

impl RecordingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为 `true` 时所有调用返回 [`RegistryError::Service`]。
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_lookup(&self, addresses: Vec<EndpointAddress>) {
        *self.lookup.lock() = addresses;
    }

    pub fn registered(&self) -> Vec<EndpointAddress> {
        self.registered.lock().clone()
    }

    pub fn is_subscribed(&self, target: &EndpointAddress, listener: &ListenerRef) -> bool {
        self.subscriptions
            .lock()
            .iter()
            .any(|(t, l)| t == target && l == listener)
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| **call == operation)
            .count()
    }

    fn enter(&self, operation: &'static str) -> Result<(), RegistryError> {
        self.calls.lock().push(operation);
        if self.failing.load(Ordering::SeqCst) {
            return Err(RegistryError::service(operation, "registry session expired"));
        }
        Ok(())
    }
}

impl RegistryService for RecordingService {
    fn register(&self, target: &EndpointAddress) -> Result<(), RegistryError> {
        self.enter("register")?;
        let mut registered = self.registered.lock();
        if !registered.contains(target) {
            registered.push(target.clone());
        }
        Ok(())
    }

    fn unregister(&self, target: &EndpointAddress) -> Result<(), RegistryError> {
        self.enter("unregister")?;
        self.registered.lock().retain(|existing| existing != target);
        Ok(())
    }

    fn subscribe(
        &self,
        target: &EndpointAddress,
        listener: &ListenerRef,
    ) -> Result<(), RegistryError> {
        self.enter("subscribe")?;
        if !self.is_subscribed(target, listener) {
            self.subscriptions
                .lock()
                .push((target.clone(), listener.clone()));
        }
        Ok(())
    }

    fn unsubscribe(
        &self,
        target: &EndpointAddress,
        listener: &ListenerRef,
    ) -> Result<(), RegistryError> {
        self.enter("unsubscribe")?;
        self.subscriptions
            .lock()
            .retain(|(t, l)| !(t == target && l == listener));
        Ok(())
    }

    fn lookup(&self, _target: &EndpointAddress) -> Result<Vec<EndpointAddress>, RegistryError> {
        self.enter("lookup")?;
        Ok(self.lookup.lock().clone())
    }
}

/// 记录每次通知内容的监听器。
#[derive(Debug, Default)]
pub struct RecordingListener {
    notifications: Mutex<Vec<Vec<EndpointAddress>>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notifications(&self) -> Vec<Vec<EndpointAddress>> {
        self.notifications.lock().clone()
    }
}

impl NotifyListener for RecordingListener {
    fn notify(&self, addresses: &[EndpointAddress]) {
        self.notifications.lock().push(addresses.to_vec());
    }
}
