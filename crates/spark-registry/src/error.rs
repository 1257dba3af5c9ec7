//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 注册中心客户端的失败分为四类：瞬时连接失败、配置错误、代理调用失败与拆除失败；
//!   它们的传播策略截然不同，必须在类型上可区分。
//!
//! ## 传播约定（What）
//! - `Recovery`：只在 `check = true` 时由 `connect()` 同步抛出，否则被记录并等待下一次定时重试；
//! - `Service`：门面操作原样向调用方传播，不做吞没；
//! - `Teardown`：只用于日志，`destroy()` 永不向外抛出；
//! - `InvalidConfig`/`Address`：构造期即失败。

use std::io;

use spark_remoting::AddressError;
use thiserror::Error;

/// 注册中心客户端错误域。
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry `{address}` is unavailable")]
    Unavailable { address: String },

    #[error("registry call `{operation}` failed: {detail}")]
    Service {
        operation: &'static str,
        detail: String,
    },

    #[error("failed to recover registry `{address}`: {detail}")]
    Recovery { address: String, detail: String },

    #[error("teardown step `{step}` failed: {detail}")]
    Teardown { step: &'static str, detail: String },

    #[error("registry `{address}` has been destroyed")]
    Destroyed { address: String },

    #[error("invalid registry configuration `{key}`: {detail}")]
    InvalidConfig { key: &'static str, detail: String },

    #[error("failed to start reconnect timer")]
    Timer(#[source] io::Error),

    #[error(transparent)]
    Address(#[from] AddressError),
}

impl RegistryError {
    pub fn service(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::Service {
            operation,
            detail: detail.into(),
        }
    }
}
