#![deny(unsafe_code)]
//! # spark-registry
//!
//! ## 设计目标（Why）
//! - 为服务目录提供一个能自愈的客户端：连接断开时业务调用照常受理，后台按固定周期重连，
//!   恢复后回放全部注册与订阅；
//! - 并发发现断线的多个调用方只触发一次恢复。
//!
//! ## 模块划分（What）
//! - [`remote`]：门面 [`RemoteRegistry`]；
//! - [`recovery`]：双重检查的重连协调器；
//! - [`failback`]：期望状态账本与失败队列；
//! - [`health`]：连接句柄可用性；
//! - [`timer`]：固定延迟的后台重连定时器；
//! - [`service`]：远程代理、连接句柄与监听器契约；
//! - [`config`]/[`error`]：配置解析与错误域；
//! - [`test_stubs`]：供测试复用的内存实现。

pub mod config;
pub mod error;
pub mod failback;
pub mod health;
pub mod recovery;
pub mod remote;
pub mod service;
pub mod test_stubs;
pub mod timer;

pub use config::{DEFAULT_RECONNECT_PERIOD_MS, RegistryConfig};
pub use error::RegistryError;
pub use failback::{FailbackRegistry, Subscription};
pub use health::HealthMonitor;
pub use recovery::RecoveryCoordinator;
pub use remote::RemoteRegistry;
pub use service::{ConnectionHandle, ListenerRef, NotifyListener, Recoverable, RegistryService};
pub use timer::{RECONNECT_THREAD_NAME, ReconnectTimer};
