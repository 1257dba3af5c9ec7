//! # failback 模块说明
//!
//! ## 角色定位（Why）
//! - 注册中心断线期间，业务仍会发起注册、注销、订阅与退订；这些调用失败后不能丢失，
//!   也不能让调用方自己重试。
//! - 重连成功后需要把“期望状态”完整回放给新会话，否则提供者会从目录中消失。
//!
//! ## 核心结构（What）
//! - 期望状态账本：`registered` 与 `subscribed`，记录调用方最后一次表达的意图；
//! - 失败队列：四个集合分别记录尚未送达的注册、注销、订阅与退订；
//! - [`FailbackRegistry::recover`]：按账本回放全部注册与订阅；
//! - [`FailbackRegistry::retry_failed`]：重放失败队列，返回仍未送达的数量。
//!
//! ## 并发约束（How）
//! - 账本使用 `DashMap`/`DashSet` 分片存储，回放前先拍快照，远程调用期间不持有分片锁；
//! - 对同一目标的新意图会先清掉与之相反的失败记录，保证失败队列只保留最后一次意图；
//! - `recover`/`retry_failed` 在回放期间持有 `closed` 读锁，`release` 取写锁后才关闭账本，
//!   因此拆除完成后不会再有进行中的回放把注册写回远端。

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashSet;
use parking_lot::RwLock;
use spark_remoting::EndpointAddress;
use tracing::{debug, warn};

use crate::error::RegistryError;
use crate::service::{ListenerRef, Recoverable, RegistryService};

/// 一条订阅：目标地址与监听器身份的组合。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Subscription {
    target: EndpointAddress,
    listener: ListenerRef,
}

impl Subscription {
    pub fn new(target: EndpointAddress, listener: ListenerRef) -> Self {
        Self { target, listener }
    }

    pub fn target(&self) -> &EndpointAddress {
        &self.target
    }

    pub fn listener(&self) -> &ListenerRef {
        &self.listener
    }
}

/// 带失败回放的基础注册抽象。
pub struct FailbackRegistry {
    address: EndpointAddress,
    service: Arc<dyn RegistryService>,
    registered: DashSet<EndpointAddress>,
    subscribed: DashSet<Subscription>,
    failed_registered: DashSet<EndpointAddress>,
    failed_unregistered: DashSet<EndpointAddress>,
    failed_subscribed: DashSet<Subscription>,
    failed_unsubscribed: DashSet<Subscription>,
    closed: RwLock<bool>,
}

impl FailbackRegistry {
    pub fn new(address: EndpointAddress, service: Arc<dyn RegistryService>) -> Self {
        Self {
            address,
            service,
            registered: DashSet::new(),
            subscribed: DashSet::new(),
            failed_registered: DashSet::new(),
            failed_unregistered: DashSet::new(),
            failed_subscribed: DashSet::new(),
            failed_unsubscribed: DashSet::new(),
            closed: RwLock::new(false),
        }
    }

    pub fn service(&self) -> &Arc<dyn RegistryService> {
        &self.service
    }

    /// `release` 之后为 `true`，回放随之停止。
    pub fn is_closed(&self) -> bool {
        *self.closed.read()
    }

    /// 记录注册意图并转发；失败时进入失败队列并原样返回错误。
    pub fn register(&self, target: &EndpointAddress) -> Result<(), RegistryError> {
        self.registered.insert(target.clone());
        self.failed_registered.remove(target);
        self.failed_unregistered.remove(target);
        self.service.register(target).inspect_err(|err| {
            debug!(target = %target, error = %err, "register failed, queued for retry");
            self.failed_registered.insert(target.clone());
        })
    }

    pub fn unregister(&self, target: &EndpointAddress) -> Result<(), RegistryError> {
        self.registered.remove(target);
        self.failed_registered.remove(target);
        self.failed_unregistered.remove(target);
        self.service.unregister(target).inspect_err(|err| {
            debug!(target = %target, error = %err, "unregister failed, queued for retry");
            self.failed_unregistered.insert(target.clone());
        })
    }

    pub fn subscribe(
        &self,
        target: &EndpointAddress,
        listener: &ListenerRef,
    ) -> Result<(), RegistryError> {
        let subscription = Subscription::new(target.clone(), listener.clone());
        self.subscribed.insert(subscription.clone());
        self.failed_subscribed.remove(&subscription);
        self.failed_unsubscribed.remove(&subscription);
        self.service.subscribe(target, listener).inspect_err(|err| {
            debug!(target = %target, error = %err, "subscribe failed, queued for retry");
            self.failed_subscribed.insert(subscription.clone());
        })
    }

    /// 退订一个监听器；从未订阅过的组合是空操作，不会触达远程代理。
    pub fn unsubscribe(
        &self,
        target: &EndpointAddress,
        listener: &ListenerRef,
    ) -> Result<(), RegistryError> {
        let subscription = Subscription::new(target.clone(), listener.clone());
        let known = self.subscribed.remove(&subscription).is_some();
        let pending = self.failed_subscribed.remove(&subscription).is_some();
        if !known && !pending {
            debug!(target = %target, "unsubscribe ignored for unknown listener");
            return Ok(());
        }
        self.failed_unsubscribed.remove(&subscription);
        self.service.unsubscribe(target, listener).inspect_err(|err| {
            debug!(target = %target, error = %err, "unsubscribe failed, queued for retry");
            self.failed_unsubscribed.insert(subscription.clone());
        })
    }

    pub fn lookup(&self, target: &EndpointAddress) -> Result<Vec<EndpointAddress>, RegistryError> {
        self.service.lookup(target)
    }

    pub fn registered(&self) -> Vec<EndpointAddress> {
        let mut targets: Vec<_> = self.registered.iter().map(|t| t.key().clone()).collect();
        targets.sort();
        targets
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.subscribed.iter().map(|s| s.key().clone()).collect()
    }

    pub fn is_subscribed(&self, target: &EndpointAddress, listener: &ListenerRef) -> bool {
        self.subscribed
            .contains(&Subscription::new(target.clone(), listener.clone()))
    }

    /// 失败队列中尚未送达的操作数。
    pub fn pending_failures(&self) -> usize {
        self.failed_registered.len()
            + self.failed_unregistered.len()
            + self.failed_subscribed.len()
            + self.failed_unsubscribed.len()
    }

    /// 重放失败队列；成功的条目被移除，返回剩余数量。账本关闭后为空操作。
    pub fn retry_failed(&self) -> usize {
        let closed = self.closed.read();
        if *closed {
            return 0;
        }
        self.retry_each(&self.failed_registered, "register", same_target, |target| {
            self.service.register(target)
        });
        self.retry_each(&self.failed_unregistered, "unregister", same_target, |target| {
            self.service.unregister(target)
        });
        self.retry_each(
            &self.failed_subscribed,
            "subscribe",
            Subscription::target,
            |subscription| {
                self.service
                    .subscribe(subscription.target(), subscription.listener())
            },
        );
        self.retry_each(
            &self.failed_unsubscribed,
            "unsubscribe",
            Subscription::target,
            |subscription| {
                self.service
                    .unsubscribe(subscription.target(), subscription.listener())
            },
        );
        let pending = self.pending_failures();
        if pending > 0 {
            debug!(registry = %self.address.address(), pending, "failed registry operations remain queued");
        }
        pending
    }

    fn retry_each<T, F>(
        &self,
        failed: &DashSet<T>,
        operation: &'static str,
        target_of: fn(&T) -> &EndpointAddress,
        call: F,
    ) where
        T: Clone + Eq + Hash,
        F: Fn(&T) -> Result<(), RegistryError>,
    {
        for entry in snapshot(failed) {
            match call(&entry) {
                Ok(()) => {
                    failed.remove(&entry);
                }
                Err(err) => debug!(
                    operation,
                    target = %target_of(&entry),
                    error = %err,
                    "retrying failed registry operation did not succeed"
                ),
            }
        }
    }

    /// 注销全部注册、退订全部订阅并清空账本；单项失败只记录 warn。
    ///
    /// 会等待进行中的回放结束；之后 `recover` 与 `retry_failed` 不再触达远程代理。
    pub fn release(&self) {
        let mut closed = self.closed.write();
        if *closed {
            return;
        }
        *closed = true;
        for target in snapshot(&self.registered) {
            if let Err(err) = self.service.unregister(&target) {
                warn!(target = %target, error = %err, "failed to unregister during teardown");
            }
        }
        for subscription in snapshot(&self.subscribed) {
            if let Err(err) = self
                .service
                .unsubscribe(subscription.target(), subscription.listener())
            {
                warn!(target = %subscription.target(), error = %err, "failed to unsubscribe during teardown");
            }
        }
        self.registered.clear();
        self.subscribed.clear();
        self.failed_registered.clear();
        self.failed_unregistered.clear();
        self.failed_subscribed.clear();
        self.failed_unsubscribed.clear();
    }
}

impl Recoverable for FailbackRegistry {
    fn address(&self) -> &EndpointAddress {
        &self.address
    }

    /// 回放全部注册与订阅。回放失败的条目进入失败队列，返回第一个错误。
    fn recover(&self) -> Result<(), RegistryError> {
        let closed = self.closed.read();
        if *closed {
            return Ok(());
        }
        let mut first_error = None;
        for target in snapshot(&self.registered) {
            match self.service.register(&target) {
                Ok(()) => {
                    self.failed_registered.remove(&target);
                }
                Err(err) => {
                    self.failed_registered.insert(target);
                    first_error.get_or_insert(err);
                }
            }
        }
        for subscription in snapshot(&self.subscribed) {
            match self
                .service
                .subscribe(subscription.target(), subscription.listener())
            {
                Ok(()) => {
                    self.failed_subscribed.remove(&subscription);
                }
                Err(err) => {
                    self.failed_subscribed.insert(subscription);
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            None => Ok(()),
            Some(err) => Err(RegistryError::Recovery {
                address: self.address.address(),
                detail: err.to_string(),
            }),
        }
    }
}

fn same_target(target: &EndpointAddress) -> &EndpointAddress {
    target
}

fn snapshot<T: Clone + Eq + Hash>(set: &DashSet<T>) -> Vec<T> {
    set.iter().map(|entry| entry.key().clone()).collect()
}
