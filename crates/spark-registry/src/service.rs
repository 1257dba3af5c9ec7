//! 注册中心协作方契约：远程代理、连接句柄、订阅监听器与基础恢复能力。
//!
//! 这些 trait 描述的都是外部实现；本 crate 只消费它们，不关心注册报文如何真正送达协调服务。

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use spark_remoting::EndpointAddress;

use crate::error::RegistryError;

/// 订阅数据变化时被回调的监听器。
pub trait NotifyListener: Send + Sync + 'static {
    fn notify(&self, addresses: &[EndpointAddress]);
}

/// 监听器引用；相等性与哈希按指针身份计算。
///
/// # 教案式说明
/// - **意图 (Why)**：同一个目标可以被多个监听器订阅，订阅的唯一性由“目标 + 监听器身份”决定，
///   而不是监听器的内容。
/// - **契约 (What)**：克隆得到的 `ListenerRef` 与原值相等；两个独立分配的监听器即便行为相同也不相等。
#[derive(Clone)]
pub struct ListenerRef(Arc<dyn NotifyListener>);

impl ListenerRef {
    pub fn new(listener: Arc<dyn NotifyListener>) -> Self {
        Self(listener)
    }

    pub fn notify(&self, addresses: &[EndpointAddress]) {
        self.0.notify(addresses)
    }

    pub fn get(&self) -> &Arc<dyn NotifyListener> {
        &self.0
    }

    fn identity(&self) -> *const () {
        Arc::as_ptr(&self.0).cast::<()>()
    }
}

impl<L: NotifyListener> From<Arc<L>> for ListenerRef {
    fn from(listener: Arc<L>) -> Self {
        Self(listener)
    }
}

impl PartialEq for ListenerRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ListenerRef {}

impl Hash for ListenerRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Debug for ListenerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ListenerRef").field(&self.identity()).finish()
    }
}

/// 远程注册中心服务代理。
///
/// - **契约 (What)**：所有调用都是同步的，可能执行阻塞网络 I/O；失败以 [`RegistryError`] 返回，
///   由调用方决定是否重试。
/// - **约定**：`unsubscribe` 对从未订阅过的监听器应视为空操作。
pub trait RegistryService: Send + Sync + 'static {
    fn register(&self, target: &EndpointAddress) -> Result<(), RegistryError>;

    fn unregister(&self, target: &EndpointAddress) -> Result<(), RegistryError>;

    fn subscribe(
        &self,
        target: &EndpointAddress,
        listener: &ListenerRef,
    ) -> Result<(), RegistryError>;

    fn unsubscribe(
        &self,
        target: &EndpointAddress,
        listener: &ListenerRef,
    ) -> Result<(), RegistryError>;

    fn lookup(&self, target: &EndpointAddress) -> Result<Vec<EndpointAddress>, RegistryError>;
}

/// 指向注册中心端点的连接句柄（已建立或建立中）。
///
/// - `is_available` 必须无副作用、可并发调用；
/// - `destroy` 幂等，重复调用不应报错。
pub trait ConnectionHandle: Send + Sync + 'static {
    fn address(&self) -> &EndpointAddress;

    fn is_available(&self) -> bool;

    fn destroy(&self) -> Result<(), RegistryError>;
}

/// 基础注册抽象提供的恢复能力：重建连接并回放此前的注册与订阅。
pub trait Recoverable: Send + Sync + 'static {
    fn address(&self) -> &EndpointAddress;

    fn recover(&self) -> Result<(), RegistryError>;
}
