use std::sync::Arc;

use parking_lot::RwLock;

use crate::service::ConnectionHandle;

/// 持有当前连接句柄并回答“注册中心是否可用”。
///
/// 句柄最多一个；被 [`HealthMonitor::take`] 取走后，监视器永远报告不可用。
pub struct HealthMonitor {
    handle: RwLock<Option<Arc<dyn ConnectionHandle>>>,
}

impl HealthMonitor {
    pub fn new(handle: Option<Arc<dyn ConnectionHandle>>) -> Self {
        Self {
            handle: RwLock::new(handle),
        }
    }

    /// 无句柄时返回 `false`，否则透传句柄的可用性。
    pub fn is_available(&self) -> bool {
        self.handle
            .read()
            .as_ref()
            .is_some_and(|handle| handle.is_available())
    }

    /// 取走句柄，交给调用方销毁。
    pub fn take(&self) -> Option<Arc<dyn ConnectionHandle>> {
        self.handle.write().take()
    }
}
