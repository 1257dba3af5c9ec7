use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;

use crate::channel::MessageKind;
use crate::error::DecodeError;

/// 分帧阶段即可得到的最小元数据，足以完成路由与派发。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    request_id: u64,
    kind: MessageKind,
    body_len: usize,
}

impl FrameHeader {
    pub fn new(request_id: u64, kind: MessageKind, body_len: usize) -> Self {
        Self {
            request_id,
            kind,
            body_len,
        }
    }

    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn body_len(&self) -> usize {
        self.body_len
    }
}

/// 负载解码器：把一帧原始字节物化为结构化消息。
///
/// # 教案式说明
/// - **意图 (Why)**：把“便宜的校验”和“昂贵的解析”拆成两个入口，前者在 I/O 线程内联执行，
///   后者留给派发策略选定的线程。
/// - **契约 (What)**：
///   - `check_frame` 不得分配大对象或做完整解析；默认实现只核对声明长度与实际长度；
///   - `decode` 可以任意耗时，但必须是确定性的：同样的输入得到同样的结果；
///   - 两者的失败都以 [`DecodeError`] 表达，与 I/O 错误分离。
pub trait PayloadDecoder: Send + Sync + 'static {
    type Output: Send + Sync + 'static;

    fn check_frame(&self, header: &FrameHeader, body: &[u8]) -> Result<(), DecodeError> {
        if header.body_len() == body.len() {
            Ok(())
        } else {
            Err(DecodeError::Truncated {
                expected: header.body_len(),
                actual: body.len(),
            })
        }
    }

    fn decode(&self, header: &FrameHeader, body: &Bytes) -> Result<Self::Output, DecodeError>;
}

/// 持有未解析字节的一次性物化门。
///
/// # 教案式说明
/// - **意图 (Why)**：接收线程只承担分帧成本，解析成本随消息一起被派发走；
///   同一条消息可能被多个环节查看，必须保证解析只发生一次。
/// - **逻辑 (How)**：
///   1. [`DecodeGate::frame`] 在构造时运行 `check_frame`，校验失败则根本不产生门；
///   2. [`DecodeGate::decode`] 借助 `OnceLock::get_or_init` 记住“值或错误”，
///      并发调用者会等待首个调用者完成，而不会重复解析；
///   3. 失败被原样保存，后续调用返回其克隆。
/// - **契约 (What)**：解析函数对每个实例至多执行一次。
pub struct DecodeGate<D: PayloadDecoder> {
    header: FrameHeader,
    raw: Bytes,
    decoder: D,
    outcome: OnceLock<Result<D::Output, DecodeError>>,
}

impl<D: PayloadDecoder> DecodeGate<D> {
    /// 校验分帧并构造解码门。
    pub fn frame(header: FrameHeader, raw: Bytes, decoder: D) -> Result<Self, DecodeError> {
        decoder.check_frame(&header, &raw)?;
        Ok(Self {
            header,
            raw,
            decoder,
            outcome: OnceLock::new(),
        })
    }

    /// 物化消息；重复调用返回首次的结果或失败。
    pub fn decode(&self) -> Result<&D::Output, DecodeError> {
        let outcome = self
            .outcome
            .get_or_init(|| self.decoder.decode(&self.header, &self.raw));
        match outcome {
            Ok(value) => Ok(value),
            Err(err) => Err(err.clone()),
        }
    }

    /// 已物化时返回结果，不触发解析。
    pub fn get(&self) -> Option<Result<&D::Output, DecodeError>> {
        self.outcome.get().map(|outcome| match outcome {
            Ok(value) => Ok(value),
            Err(err) => Err(err.clone()),
        })
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// 擦除为对象安全视图，以便放入 [`ChannelMessage`](crate::channel::ChannelMessage)。
    pub fn into_shared(self) -> Arc<dyn Decodeable> {
        Arc::new(self)
    }
}

impl<D: PayloadDecoder> fmt::Debug for DecodeGate<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeGate")
            .field("header", &self.header)
            .field("raw_len", &self.raw.len())
            .field("decoded", &self.outcome.get().is_some())
            .finish()
    }
}

/// 解码门的擦除视图。
pub trait Decodeable: Send + Sync + 'static {
    /// 触发（或复用）物化，只报告成败。
    fn decode_erased(&self) -> Result<(), DecodeError>;

    fn is_decoded(&self) -> bool;

    fn as_any(&self) -> &dyn Any;
}

impl<D: PayloadDecoder> Decodeable for DecodeGate<D> {
    fn decode_erased(&self) -> Result<(), DecodeError> {
        self.decode().map(|_| ())
    }

    fn is_decoded(&self) -> bool {
        self.outcome.get().is_some()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn Decodeable {
    /// 还原为具体的解码门类型。
    pub fn downcast_ref<D: PayloadDecoder>(&self) -> Option<&DecodeGate<D>> {
        self.as_any().downcast_ref::<DecodeGate<D>>()
    }
}
