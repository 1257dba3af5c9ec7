//! 事件派发策略注册表。
//!
//! # 教案式导航
//! - **定位（Where）**：传输实现拿到业务 Handler 后，经由 [`DispatcherRegistry::dispatch`]
//!   按地址参数选定策略并包装，得到的新 Handler 决定每类事件落在 I/O 线程、共享线程池还是串行车道。
//! - **扩展（How）**：策略以名字注册，新增策略只需 [`DispatcherRegistry::register`]，
//!   不必修改既有策略；闭包也可直接作为策略注册。
//! - **约束（What）**：
//!   - 未配置策略名时使用默认的 `all` 策略；
//!   - 显式配置了未注册的名字属于配置错误，立即失败，绝不静默回退；
//!   - 查找路径无锁：策略表通过 `ArcSwap` 整体发布，注册时复制并替换。

mod strategies;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::address::{EndpointAddress, keys};
use crate::channel::SharedHandler;
use crate::decode::DecodeHandler;
use crate::error::RemotingError;
use crate::executor::EventExecutor;

pub use strategies::{
    AllDispatcher, ConnectionOrderedDispatcher, DirectDispatcher, ExecutionDispatcher,
    MessageOnlyDispatcher,
};

/// 默认策略名：所有事件（发送完成除外）进入共享线程池。
pub const DEFAULT_DISPATCHER: &str = AllDispatcher::NAME;

/// 策略包装时可用的共享资源。
#[derive(Clone)]
pub struct DispatchContext {
    shared: Arc<dyn EventExecutor>,
}

impl DispatchContext {
    pub fn new(shared: Arc<dyn EventExecutor>) -> Self {
        Self { shared }
    }

    /// 共享线程池。
    pub fn shared_executor(&self) -> &Arc<dyn EventExecutor> {
        &self.shared
    }
}

impl fmt::Debug for DispatchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchContext").finish_non_exhaustive()
    }
}

/// 派发策略：`(handler, address) -> handler` 的纯变换。
///
/// # 教案式说明
/// - **意图 (Why)**：I/O 线程绝不能阻塞在业务逻辑上，派发层是唯一强制这一点的接缝；
///   以命名策略的形式暴露，部署方可以在时延与有序性之间取舍而不触碰传输代码。
/// - **契约 (What)**：
///   - 实现必须无状态或只持有不可变配置，可被多个线程同时调用；
///   - 不得修改传入的 Handler，只能返回包装后的新 Handler（或原样返回）。
pub trait Dispatcher: Send + Sync + 'static {
    fn dispatch(
        &self,
        handler: SharedHandler,
        address: &EndpointAddress,
        context: &DispatchContext,
    ) -> SharedHandler;
}

impl<F> Dispatcher for F
where
    F: Fn(SharedHandler, &EndpointAddress, &DispatchContext) -> SharedHandler
        + Send
        + Sync
        + 'static,
{
    fn dispatch(
        &self,
        handler: SharedHandler,
        address: &EndpointAddress,
        context: &DispatchContext,
    ) -> SharedHandler {
        self(handler, address, context)
    }
}

type StrategyTable = HashMap<String, Arc<dyn Dispatcher>>;

/// 命名派发策略的注册表。
///
/// # 教案式说明
/// - **逻辑 (How)**：
///   1. 构造时登记全部内建策略（`all`、`direct`、`message`、`execution`、`connection`）；
///   2. 解析时依次检查 `dispatcher`、`dispather`、`channel.handler` 三个键，首个非空值生效；
///   3. 三个键都缺省时使用 [`DEFAULT_DISPATCHER`]；命中未注册的名字则返回
///      [`RemotingError::UnknownDispatcher`]。
/// - **风险 (Trade-offs)**：注册需要复制整张表，适合启动期注册、运行期只读的使用方式。
pub struct DispatcherRegistry {
    strategies: ArcSwap<StrategyTable>,
    context: DispatchContext,
}

impl DispatcherRegistry {
    /// 创建登记了全部内建策略的注册表。
    pub fn new(shared: Arc<dyn EventExecutor>) -> Self {
        let mut table: StrategyTable = HashMap::new();
        table.insert(AllDispatcher::NAME.to_owned(), Arc::new(AllDispatcher));
        table.insert(DirectDispatcher::NAME.to_owned(), Arc::new(DirectDispatcher));
        table.insert(
            MessageOnlyDispatcher::NAME.to_owned(),
            Arc::new(MessageOnlyDispatcher),
        );
        table.insert(
            ExecutionDispatcher::NAME.to_owned(),
            Arc::new(ExecutionDispatcher),
        );
        table.insert(
            ConnectionOrderedDispatcher::NAME.to_owned(),
            Arc::new(ConnectionOrderedDispatcher),
        );
        Self {
            strategies: ArcSwap::from_pointee(table),
            context: DispatchContext::new(shared),
        }
    }

    /// 注册（或替换）命名策略，返回被替换的旧策略。
    pub fn register(
        &self,
        name: impl Into<String>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Option<Arc<dyn Dispatcher>> {
        let name = name.into();
        let previous = self.strategies.rcu(|current| {
            let mut next = StrategyTable::clone(current);
            next.insert(name.clone(), Arc::clone(&dispatcher));
            next
        });
        let replaced = previous.get(&name).cloned();
        if replaced.is_some() {
            tracing::info!(dispatcher = %name, "replaced registered dispatcher");
        } else {
            tracing::debug!(dispatcher = %name, "registered dispatcher");
        }
        replaced
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.load().contains_key(name)
    }

    /// 已注册策略名，按字典序排列。
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.strategies.load().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn context(&self) -> &DispatchContext {
        &self.context
    }

    /// 地址上显式请求的策略名（按兼容键顺序取首个非空值）。
    pub fn requested_name(address: &EndpointAddress) -> Option<&str> {
        address
            .first_parameter(&keys::DISPATCHER_LOOKUP_ORDER)
            .map(|(_, name)| name.trim())
    }

    /// 解析地址对应的策略。
    pub fn resolve(&self, address: &EndpointAddress) -> Result<Arc<dyn Dispatcher>, RemotingError> {
        let table = self.strategies.load();
        let name = Self::requested_name(address).unwrap_or(DEFAULT_DISPATCHER);
        match table.get(name) {
            Some(dispatcher) => {
                tracing::debug!(dispatcher = name, endpoint = %address.address(), "resolved dispatcher");
                Ok(Arc::clone(dispatcher))
            }
            None => {
                let mut available: Vec<&str> = table.keys().map(String::as_str).collect();
                available.sort_unstable();
                Err(RemotingError::UnknownDispatcher {
                    name: name.to_owned(),
                    available: available.join(", "),
                })
            }
        }
    }

    /// 解析策略并包装 Handler。
    pub fn dispatch(
        &self,
        handler: SharedHandler,
        address: &EndpointAddress,
    ) -> Result<SharedHandler, RemotingError> {
        let dispatcher = self.resolve(address)?;
        Ok(dispatcher.dispatch(handler, address, &self.context))
    }
}

impl fmt::Debug for DispatcherRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherRegistry")
            .field("strategies", &self.names())
            .finish()
    }
}

/// 装配标准入站链：先派发，再在选定的执行上下文内物化延迟负载。
pub fn wrap_channel_handler(
    registry: &DispatcherRegistry,
    handler: SharedHandler,
    address: &EndpointAddress,
) -> Result<SharedHandler, RemotingError> {
    registry.dispatch(Arc::new(DecodeHandler::new(handler)), address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::InlineExecutor;

    fn registry() -> DispatcherRegistry {
        DispatcherRegistry::new(Arc::new(InlineExecutor))
    }

    fn endpoint() -> EndpointAddress {
        EndpointAddress::new("spark", "127.0.0.1", 20880)
    }

    #[test]
    fn builtin_strategies_are_registered() {
        assert_eq!(
            registry().names(),
            vec!["all", "connection", "direct", "execution", "message"]
        );
    }

    #[test]
    fn absent_name_resolves_to_default() {
        let registry = registry();
        let address = endpoint().with_parameter(keys::DISPATCHER, "");
        assert!(DispatcherRegistry::requested_name(&address).is_none());
        assert!(registry.resolve(&address).is_ok());
    }

    #[test]
    fn unknown_name_is_a_configuration_error() {
        let address = endpoint().with_parameter(keys::DISPATCHER_LEGACY_HANDLER, "fanout");
        let err = registry()
            .resolve(&address)
            .err()
            .expect("unregistered strategy must not fall back");
        match err {
            RemotingError::UnknownDispatcher { name, available } => {
                assert_eq!(name, "fanout");
                assert!(available.contains("all"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tracing_test::traced_test]
    #[test]
    fn register_returns_the_replaced_strategy() {
        let registry = registry();
        let passthrough = |handler: SharedHandler, _: &EndpointAddress, _: &DispatchContext| handler;

        assert!(registry.register("passthrough", Arc::new(passthrough)).is_none());
        assert!(registry.contains("passthrough"));
        assert!(registry.register("passthrough", Arc::new(passthrough)).is_some());
        assert!(logs_contain("replaced registered dispatcher"));
    }
}
