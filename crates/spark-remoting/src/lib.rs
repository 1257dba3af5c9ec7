#![deny(unsafe_code)]

//! # spark-remoting
//!
//! ## 定位与职责（Why）
//! - 为注册中心客户端与各传输实现提供共享的底层契约：端点地址、通道事件处理、事件执行器；
//! - 把“哪个执行上下文处理哪个事件”收敛为可命名、可扩展的派发策略，保证 I/O 线程不被业务逻辑阻塞；
//! - 通过延迟解码门，让 I/O 线程只做分帧校验，把结构化解析推迟到派发后的线程。
//!
//! ## 架构嵌入（Where）
//! - `address`：不可变端点描述与参数读取；
//! - `channel`：`ChannelHandler` 契约与消息模型；
//! - `executor`：线程池接缝与串行车道；
//! - `dispatch`：命名策略注册表与内建策略；
//! - `decode`：延迟解码门与解码包装器；
//! - `error`：`thiserror` 风格的错误域。
//!
//! ## Feature 策略（Trade-offs）
//! - `runtime-tokio`（默认）提供基于 Tokio 阻塞线程池的 [`TokioBlockingExecutor`](executor::TokioBlockingExecutor)；
//!   关闭后仍保留全部契约，调用方自带执行器即可。

pub mod address;
pub mod channel;
pub mod decode;
pub mod dispatch;
pub mod error;
pub mod executor;

pub use address::{AddressError, EndpointAddress};
pub use channel::{
    Channel, ChannelEvent, ChannelHandler, ChannelId, ChannelMessage, ChannelRef, MessageKind,
    Payload, SharedHandler,
};
pub use decode::{DecodeGate, DecodeHandler, Decodeable, FrameHeader, PayloadDecoder};
pub use dispatch::{
    DEFAULT_DISPATCHER, DispatchContext, Dispatcher, DispatcherRegistry, wrap_channel_handler,
};
pub use error::{DecodeError, RemotingError};
pub use executor::{EventExecutor, EventTask, InlineExecutor, SerialExecutor};
#[cfg(feature = "runtime-tokio")]
pub use executor::TokioBlockingExecutor;
