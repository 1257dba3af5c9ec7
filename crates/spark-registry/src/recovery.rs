//! 断线重连协调器。
//!
//! # 教案式说明
//! - **意图 (Why)**：定时器与业务线程都可能在同一时刻发现注册中心不可用并发起恢复；
//!   恢复会回放全部注册与订阅，重复执行既浪费又可能在远端产生重复写。
//! - **契约 (What)**：并发调用 [`RecoveryCoordinator::connect`] 时，底层 `recover()` 至多执行一次，
//!   其余调用方阻塞等待后观察到可用状态直接返回。
//! - **实现 (How)**：无锁快速路径检查可用性；未命中时获取互斥锁并再次检查（双重检查），
//!   只有仍不可用才调用 `recover()`。

use std::sync::Arc;

use parking_lot::Mutex;
use spark_remoting::EndpointAddress;
use tracing::{error, info};

use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::health::HealthMonitor;
use crate::service::Recoverable;

pub struct RecoveryCoordinator {
    address: EndpointAddress,
    monitor: Arc<HealthMonitor>,
    recovery: Arc<dyn Recoverable>,
    config: RegistryConfig,
    lock: Mutex<()>,
}

impl RecoveryCoordinator {
    pub fn new(
        monitor: Arc<HealthMonitor>,
        recovery: Arc<dyn Recoverable>,
        config: RegistryConfig,
    ) -> Self {
        Self {
            address: recovery.address().clone(),
            monitor,
            recovery,
            config,
            lock: Mutex::new(()),
        }
    }

    /// 确保注册中心可用，必要时执行一次恢复。
    ///
    /// 恢复失败时：`check = true` 原样返回错误；`check = false` 记录 error 日志后返回 `Ok(())`，
    /// 交由下一次定时重连处理。
    pub fn connect(&self) -> Result<(), RegistryError> {
        match self.reconnect() {
            Ok(()) => Ok(()),
            Err(err) if self.config.check() => Err(err),
            Err(err) => {
                error!(
                    registry = %self.address.address(),
                    error = %err,
                    "failed to connect to registry, retrying on next tick"
                );
                Ok(())
            }
        }
    }

    fn reconnect(&self) -> Result<(), RegistryError> {
        if self.monitor.is_available() {
            return Ok(());
        }
        info!(registry = %self.address.address(), "registry unavailable, reconnecting");

        let _guard = self.lock.lock();
        if self.monitor.is_available() {
            return Ok(());
        }
        self.recovery.recover()?;
        info!(registry = %self.address.address(), "registry recovery finished");
        Ok(())
    }
}
