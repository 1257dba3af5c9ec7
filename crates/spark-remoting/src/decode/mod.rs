//! 延迟解码：I/O 线程只做分帧校验，结构化解析推迟到派发策略选定的执行上下文。
//!
//! - [`DecodeGate`] 持有原始字节，`decode` 至多执行一次真实解析并记住结果或失败；
//! - [`Decodeable`] 是对象安全的擦除视图，使 [`ChannelMessage`](crate::channel::ChannelMessage)
//!   无需泛型即可携带任意解码门；
//! - [`DecodeHandler`] 在把消息交给业务 Handler 前完成物化。

mod gate;
mod handler;

pub use gate::{DecodeGate, Decodeable, FrameHeader, PayloadDecoder};
pub use handler::DecodeHandler;
