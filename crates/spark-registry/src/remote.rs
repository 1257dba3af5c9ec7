//! 注册中心客户端门面。
//!
//! # 教案式说明
//! - **意图 (Why)**：业务侧只需要一个对象完成注册、订阅与查询，不应感知连接何时断开、
//!   何时恢复；断线期间的调用照常受理，由失败队列在恢复后补发。
//! - **契约 (What)**：
//!   - 构造时读取 `reconnect.period` 与 `check` 并立即启动后台重连定时器；
//!   - 每次定时触发执行 [`RemoteRegistry::connect`]，随后在可用时重放失败队列；
//!   - [`RemoteRegistry::destroy`] 可重复调用且永不失败，各拆除步骤互不影响。
//! - **实现 (How)**：共享状态放在 `RegistryInner` 中，定时器仅持有其弱引用，
//!   门面被丢弃后定时触发自然变为空操作。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use spark_remoting::EndpointAddress;
use tracing::{debug, info, warn};

use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::failback::FailbackRegistry;
use crate::health::HealthMonitor;
use crate::recovery::RecoveryCoordinator;
use crate::service::{ConnectionHandle, ListenerRef, Recoverable, RegistryService};
use crate::timer::ReconnectTimer;

pub struct RemoteRegistry {
    inner: Arc<RegistryInner>,
    timer: ReconnectTimer,
}

struct RegistryInner {
    address: EndpointAddress,
    config: RegistryConfig,
    monitor: Arc<HealthMonitor>,
    coordinator: RecoveryCoordinator,
    failback: Arc<FailbackRegistry>,
    destroyed: AtomicBool,
}

impl RemoteRegistry {
    /// 以 [`FailbackRegistry`] 自身作为恢复实现构造门面。
    pub fn new(
        handle: Arc<dyn ConnectionHandle>,
        service: Arc<dyn RegistryService>,
    ) -> Result<Self, RegistryError> {
        let failback = Arc::new(FailbackRegistry::new(handle.address().clone(), service));
        let recovery: Arc<dyn Recoverable> = failback.clone();
        Self::assemble(handle, failback, recovery)
    }

    /// 使用外部提供的恢复实现，注册操作仍经由内部失败队列转发给 `service`。
    pub fn with_recovery(
        handle: Arc<dyn ConnectionHandle>,
        service: Arc<dyn RegistryService>,
        recovery: Arc<dyn Recoverable>,
    ) -> Result<Self, RegistryError> {
        let failback = Arc::new(FailbackRegistry::new(handle.address().clone(), service));
        Self::assemble(handle, failback, recovery)
    }

    fn assemble(
        handle: Arc<dyn ConnectionHandle>,
        failback: Arc<FailbackRegistry>,
        recovery: Arc<dyn Recoverable>,
    ) -> Result<Self, RegistryError> {
        let address = handle.address().clone();
        let config = RegistryConfig::from_address(&address)?;
        let monitor = Arc::new(HealthMonitor::new(Some(handle)));
        let coordinator = RecoveryCoordinator::new(Arc::clone(&monitor), recovery, config);

        let inner = Arc::new(RegistryInner {
            address,
            config,
            monitor,
            coordinator,
            failback,
            destroyed: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&inner);
        let timer = ReconnectTimer::start(config.reconnect_period(), move || tick(&weak))?;
        info!(
            registry = %inner.address.address(),
            period_ms = config.reconnect_period().as_millis() as u64,
            check = config.check(),
            "registry client started"
        );
        Ok(Self { inner, timer })
    }

    pub fn address(&self) -> &EndpointAddress {
        &self.inner.address
    }

    pub fn config(&self) -> RegistryConfig {
        self.inner.config
    }

    pub fn failback(&self) -> &Arc<FailbackRegistry> {
        &self.inner.failback
    }

    pub fn is_available(&self) -> bool {
        self.inner.monitor.is_available()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    /// 确保注册中心可用；语义见 [`RecoveryCoordinator::connect`]。销毁后为空操作。
    pub fn connect(&self) -> Result<(), RegistryError> {
        self.inner.connect()
    }

    pub fn register(&self, target: &EndpointAddress) -> Result<(), RegistryError> {
        self.inner.ensure_alive()?;
        self.inner.failback.register(target)
    }

    pub fn unregister(&self, target: &EndpointAddress) -> Result<(), RegistryError> {
        self.inner.ensure_alive()?;
        self.inner.failback.unregister(target)
    }

    pub fn subscribe(
        &self,
        target: &EndpointAddress,
        listener: &ListenerRef,
    ) -> Result<(), RegistryError> {
        self.inner.ensure_alive()?;
        self.inner.failback.subscribe(target, listener)
    }

    pub fn unsubscribe(
        &self,
        target: &EndpointAddress,
        listener: &ListenerRef,
    ) -> Result<(), RegistryError> {
        self.inner.ensure_alive()?;
        self.inner.failback.unsubscribe(target, listener)
    }

    pub fn lookup(&self, target: &EndpointAddress) -> Result<Vec<EndpointAddress>, RegistryError> {
        self.inner.ensure_alive()?;
        self.inner.failback.lookup(target)
    }

    /// 释放注册、停止定时器、销毁连接句柄并关闭定时器运行时。
    ///
    /// 每一步失败都只记录 warn，不影响后续步骤；重复调用直接返回。
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::AcqRel) {
            debug!(registry = %self.inner.address.address(), "registry already destroyed");
            return;
        }
        let registry = self.inner.address.address();

        self.inner.failback.release();
        self.timer.cancel();
        match self.inner.monitor.take() {
            Some(handle) => {
                if let Err(err) = handle.destroy() {
                    warn!(registry = %registry, error = %err, "failed to destroy registry connection");
                }
            }
            None => debug!(registry = %registry, "no registry connection to destroy"),
        }
        self.timer.shutdown();
        info!(registry = %registry, "registry client destroyed");
    }
}

impl RegistryInner {
    fn connect(&self) -> Result<(), RegistryError> {
        if self.destroyed.load(Ordering::Acquire) {
            return Ok(());
        }
        self.coordinator.connect()
    }

    fn ensure_alive(&self) -> Result<(), RegistryError> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(RegistryError::Destroyed {
                address: self.address.address(),
            });
        }
        Ok(())
    }
}

fn tick(inner: &Weak<RegistryInner>) -> Result<(), RegistryError> {
    let Some(inner) = inner.upgrade() else {
        return Ok(());
    };
    inner.connect()?;
    if inner.monitor.is_available() && !inner.destroyed.load(Ordering::Acquire) {
        inner.failback.retry_failed();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::test_stubs::{RecordingService, ScriptedRecovery, StubConnection};

    fn registry_address() -> EndpointAddress {
        EndpointAddress::new("zookeeper", "127.0.0.1", 2181)
            .with_parameter("reconnect.period", "3600000")
            .with_parameter("check", "false")
    }

    #[tracing_test::traced_test]
    #[test]
    fn destroy_continues_past_connection_failure() {
        let handle = Arc::new(StubConnection::new(registry_address(), true));
        handle.fail_destroy();
        let registry =
            RemoteRegistry::new(handle.clone(), Arc::new(RecordingService::new())).expect("registry");

        registry.destroy();
        assert_eq!(handle.destroys(), 1);
        assert!(registry.is_destroyed());
        assert!(logs_contain("failed to destroy registry connection"));
        assert!(logs_contain("registry client destroyed"));
    }

    #[test]
    fn operations_after_destroy_are_rejected() {
        let handle = Arc::new(StubConnection::new(registry_address(), true));
        let registry =
            RemoteRegistry::new(handle, Arc::new(RecordingService::new())).expect("registry");
        registry.destroy();

        let err = registry
            .register(&EndpointAddress::new("spark", "10.0.0.1", 20880))
            .expect_err("destroyed");
        assert!(matches!(err, RegistryError::Destroyed { .. }));
        registry.connect().expect("connect after destroy is a no-op");
        assert!(!registry.is_available());
    }

    #[test]
    fn invalid_period_fails_construction() {
        let address = EndpointAddress::new("zookeeper", "127.0.0.1", 2181)
            .with_parameter("reconnect.period", "0");
        let handle = Arc::new(StubConnection::new(address, true));
        let result = RemoteRegistry::new(handle, Arc::new(RecordingService::new()));
        assert!(matches!(result, Err(RegistryError::InvalidConfig { .. })));
    }

    #[test]
    fn on_demand_connect_uses_custom_recovery() {
        let handle = Arc::new(StubConnection::new(registry_address(), false));
        let recovery = Arc::new(ScriptedRecovery::new(handle.clone(), 0));
        let registry = RemoteRegistry::with_recovery(
            handle,
            Arc::new(RecordingService::new()),
            recovery.clone(),
        )
        .expect("registry");
        assert_eq!(registry.config().reconnect_period(), Duration::from_secs(3600));

        registry.connect().expect("connect");
        assert!(registry.is_available());
        assert_eq!(recovery.calls(), 1);
        registry.destroy();
    }
}
