//! 端点地址：注册中心与传输端点共享的不可变描述符。
//!
//! # 教案式导航
//! - **定位（Where）**：`spark-registry` 从地址参数读取重连周期与 `check` 开关，
//!   派发策略注册表从同一组参数解析策略名；因此地址类型放在最底层的 remoting crate。
//! - **约束（What）**：地址一经构造即不可变，`with_parameter` 返回新值；空字符串参数视同缺省。
//! - **边界（Trade-offs）**：完整的 URL 文本解析不在本 crate 的职责内，调用方负责构造。

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// 框架约定的参数键。
pub mod keys {
    /// 注册中心重连检测周期（毫秒）。
    pub const RECONNECT_PERIOD: &str = "reconnect.period";
    /// 连接失败时是否向调用方抛出错误。
    pub const CHECK: &str = "check";
    /// 事件派发策略名。
    pub const DISPATCHER: &str = "dispatcher";
    /// 历史拼写错误遗留的别名，保留以兼容旧配置。
    pub const DISPATCHER_LEGACY_TYPO: &str = "dispather";
    /// 更早期的策略键名。
    pub const DISPATCHER_LEGACY_HANDLER: &str = "channel.handler";

    /// 派发策略名的查找顺序，首个非空值生效。
    pub const DISPATCHER_LOOKUP_ORDER: [&str; 3] =
        [DISPATCHER, DISPATCHER_LEGACY_TYPO, DISPATCHER_LEGACY_HANDLER];
}

/// 参数解析失败。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("parameter `{key}` has invalid value `{value}`: {reason}")]
pub struct AddressError {
    pub key: String,
    pub value: String,
    pub reason: String,
}

/// `EndpointAddress` 描述一个注册中心或传输端点。
///
/// # 教案式说明
/// - **意图 (Why)**：重连、派发等横切策略都以“地址上的字符串参数”作为配置面，
///   需要一个可哈希、可排序、可安全跨线程共享的值类型来承载。
/// - **契约 (What)**：
///   - `protocol`/`host`/`port`/`path` 为定位信息；
///   - `parameters` 以 `BTreeMap` 保存，保证 `Display` 与 `Hash` 的输出稳定；
///   - 所有读取方法都不修改自身。
/// - **风险 (Trade-offs)**：每次 `with_parameter` 都会克隆参数表，适合配置期使用，
///   不适合在热路径上反复构造。
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointAddress {
    protocol: String,
    host: String,
    port: u16,
    path: String,
    parameters: BTreeMap<String, String>,
}

impl EndpointAddress {
    /// 创建不带路径与参数的地址。
    pub fn new(protocol: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
            port,
            path: String::new(),
            parameters: BTreeMap::new(),
        }
    }

    /// 返回携带指定路径的新地址。
    pub fn with_path(&self, path: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.path = path.into();
        next
    }

    /// 返回追加（或覆盖）一个参数后的新地址。
    pub fn with_parameter(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.parameters.insert(key.into(), value.into());
        next
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// `host:port` 形式，用于日志字段。
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    /// 读取参数；空字符串视为未配置。
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// 读取参数并在缺省时回退到 `default`。
    pub fn parameter_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.parameter(key).unwrap_or(default)
    }

    /// 读取布尔参数。
    ///
    /// - 仅接受 `true`/`false`（大小写不敏感）；其他取值返回 [`AddressError`]，
    ///   避免拼写错误被静默当作默认值。
    pub fn bool_parameter(&self, key: &str, default: bool) -> Result<bool, AddressError> {
        match self.parameter(key) {
            None => Ok(default),
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(AddressError {
                    key: key.to_owned(),
                    value: raw.to_owned(),
                    reason: "expected `true` or `false`".to_owned(),
                }),
            },
        }
    }

    /// 读取无符号整数参数，存在但无法解析时返回错误。
    pub fn u64_parameter(&self, key: &str, default: u64) -> Result<u64, AddressError> {
        match self.parameter(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<u64>().map_err(|err| AddressError {
                key: key.to_owned(),
                value: raw.to_owned(),
                reason: err.to_string(),
            }),
        }
    }

    /// 按顺序查找第一个非空参数，返回命中的键与值。
    pub fn first_parameter<'a>(&'a self, keys: &[&'a str]) -> Option<(&'a str, &'a str)> {
        keys.iter()
            .find_map(|key| self.parameter(key).map(|value| (*key, value)))
    }
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.protocol, self.host, self.port)?;
        if !self.path.is_empty() {
            write!(f, "/{}", self.path.trim_start_matches('/'))?;
        }
        let mut separator = '?';
        for (key, value) in &self.parameters {
            write!(f, "{separator}{key}={value}")?;
            separator = '&';
        }
        Ok(())
    }
}
