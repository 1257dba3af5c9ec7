//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义传输侧的错误语义：配置错误、执行器拒绝、解码失败与 I/O 失败需要被调用方区分处理；
//! - 解码失败单独成型（[`DecodeError`]），保证其作用域只限于单条消息，不与通道级 I/O 错误混淆。
//!
//! ## 设计要求（What）
//! - 所有错误类型派生 `thiserror::Error`；
//! - [`DecodeError`] 实现 `Clone`，以便延迟解码门在重复调用时返回同一份失败。

use std::io;

use thiserror::Error;

use crate::channel::ChannelEvent;

/// 负载解码失败。
///
/// # 教案式说明
/// - **意图 (Why)**：延迟解码门需要把第一次解析的失败原样“记住”，后续调用直接重放，
///   因而错误本身必须可克隆、且不携带不可克隆的底层来源。
/// - **契约 (What)**：
///   - `Truncated`：帧声明的长度与实际收到的字节数不一致；
///   - `Malformed`：结构化解析阶段发现格式错误；
///   - `Validation`：解析前的轻量校验未通过（魔数、版本、校验和等）。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("malformed payload: {reason}")]
    Malformed { reason: String },
    #[error("payload failed validation: {reason}")]
    Validation { reason: String },
}

impl DecodeError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }
}

/// 传输层错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：区分“配置期即可发现的问题”（未知派发策略）与运行期问题（执行器拒绝、解码、I/O），
///   让上层在装配阶段快速失败，而在运行期只影响单个事件。
/// - **契约 (What)**：`UnknownDispatcher` 携带已注册的策略名，便于运维直接看出拼写错误。
#[derive(Debug, Error)]
pub enum RemotingError {
    #[error("unknown dispatcher `{name}` (registered: {available})")]
    UnknownDispatcher { name: String, available: String },

    #[error("executor rejected `{event}` event: {reason}")]
    ExecutorRejected { event: ChannelEvent, reason: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("channel i/o failure: {0}")]
    Io(#[from] io::Error),

    #[error("handler failure: {detail}")]
    Handler { detail: String },
}

impl RemotingError {
    pub fn handler(detail: impl Into<String>) -> Self {
        Self::Handler {
            detail: detail.into(),
        }
    }

    /// 是否为单条消息范围内的解码失败。
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}
