use std::time::Duration;

use spark_remoting::EndpointAddress;
use spark_remoting::address::keys;

use crate::error::RegistryError;

/// 未配置 `reconnect.period` 时的重连周期（毫秒）。
pub const DEFAULT_RECONNECT_PERIOD_MS: u64 = 3_000;

/// 从注册中心地址参数中解析出的客户端配置。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegistryConfig {
    reconnect_period: Duration,
    check: bool,
}

impl RegistryConfig {
    pub fn new(reconnect_period: Duration, check: bool) -> Result<Self, RegistryError> {
        if reconnect_period.is_zero() {
            return Err(RegistryError::InvalidConfig {
                key: keys::RECONNECT_PERIOD,
                detail: "reconnect period must be positive".to_owned(),
            });
        }
        Ok(Self {
            reconnect_period,
            check,
        })
    }

    /// 读取 `reconnect.period`（毫秒，缺省 3000）与 `check`（缺省 `true`）。
    ///
    /// 非数字、非布尔或为零的取值在构造期即报错，不会静默回落到默认值。
    pub fn from_address(address: &EndpointAddress) -> Result<Self, RegistryError> {
        let period_ms = address.u64_parameter(keys::RECONNECT_PERIOD, DEFAULT_RECONNECT_PERIOD_MS)?;
        let check = address.bool_parameter(keys::CHECK, true)?;
        Self::new(Duration::from_millis(period_ms), check)
    }

    pub fn reconnect_period(&self) -> Duration {
        self.reconnect_period
    }

    /// 为 `true` 时，`connect()` 的恢复失败会同步抛给调用方。
    pub fn check(&self) -> bool {
        self.check
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            reconnect_period: Duration::from_millis(DEFAULT_RECONNECT_PERIOD_MS),
            check: true,
        }
    }
}
