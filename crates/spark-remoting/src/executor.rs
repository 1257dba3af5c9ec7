//! 事件执行器：派发策略与具体线程池之间的接缝。
//!
//! # 教案式导航
//! - **定位（Where）**：线程池本身不在本 crate 的职责内；这里只定义“提交一个事件任务”的契约，
//!   并给出两个适配：基于 Tokio 阻塞线程池的共享执行器，以及保证提交顺序的串行执行器。
//! - **约束（What）**：`execute` 只负责接收任务，不等待执行完成；拒绝时返回
//!   [`RemotingError::ExecutorRejected`]，由 I/O 线程自行决定降级方式。

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::channel::ChannelEvent;
use crate::error::RemotingError;

/// 提交给执行器的事件任务。
pub type EventTask = Box<dyn FnOnce() + Send + 'static>;

/// 事件执行上下文。
pub trait EventExecutor: Send + Sync + 'static {
    /// 提交一个任务；`event` 仅用于诊断与拒绝时的错误信息。
    fn execute(&self, event: ChannelEvent, task: EventTask) -> Result<(), RemotingError>;
}

/// 在调用线程上立即执行任务，等价于不派发。
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineExecutor;

impl EventExecutor for InlineExecutor {
    fn execute(&self, _event: ChannelEvent, task: EventTask) -> Result<(), RemotingError> {
        task();
        Ok(())
    }
}

#[cfg(feature = "runtime-tokio")]
pub use self::tokio_pool::TokioBlockingExecutor;

#[cfg(feature = "runtime-tokio")]
mod tokio_pool {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::runtime::Handle;

    use super::{EventExecutor, EventTask};
    use crate::channel::ChannelEvent;
    use crate::error::RemotingError;

    /// 基于 Tokio 阻塞线程池的共享执行器。
    ///
    /// # 教案式说明
    /// - **意图 (Why)**：Handler 逻辑通常是同步且可能阻塞的，放进 `spawn_blocking` 的专用线程池
    ///   既不会占用 I/O 线程，也不会饿死异步 worker。
    /// - **契约 (What)**：
    ///   - `new` 不限制在途任务数；`with_capacity(n)` 在在途任务达到 `n` 时拒绝新任务；
    ///   - 在途计数在任务结束（包括 panic）时归还。
    /// - **风险 (Trade-offs)**：计数是软上限，Tokio 阻塞池自身的线程上限仍由运行时构建参数决定。
    #[derive(Clone, Debug)]
    pub struct TokioBlockingExecutor {
        handle: Handle,
        capacity: Option<usize>,
        in_flight: Arc<AtomicUsize>,
    }

    impl TokioBlockingExecutor {
        pub fn new(handle: Handle) -> Self {
            Self {
                handle,
                capacity: None,
                in_flight: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// 使用当前上下文的运行时句柄；不在 Tokio 上下文内时返回错误。
        pub fn current() -> Result<Self, RemotingError> {
            Handle::try_current()
                .map(Self::new)
                .map_err(|err| RemotingError::handler(format!("no tokio runtime: {err}")))
        }

        pub fn with_capacity(mut self, capacity: usize) -> Self {
            self.capacity = Some(capacity);
            self
        }

        /// 当前在途任务数。
        pub fn in_flight(&self) -> usize {
            self.in_flight.load(Ordering::Acquire)
        }
    }

    impl EventExecutor for TokioBlockingExecutor {
        fn execute(&self, event: ChannelEvent, task: EventTask) -> Result<(), RemotingError> {
            let previous = self.in_flight.fetch_add(1, Ordering::AcqRel);
            if let Some(capacity) = self.capacity
                && previous >= capacity
            {
                self.in_flight.fetch_sub(1, Ordering::AcqRel);
                return Err(RemotingError::ExecutorRejected {
                    event,
                    reason: format!("{capacity} tasks already in flight"),
                });
            }

            let slot = InFlightSlot(Arc::clone(&self.in_flight));
            self.handle.spawn_blocking(move || {
                let _slot = slot;
                task();
            });
            Ok(())
        }
    }

    struct InFlightSlot(Arc<AtomicUsize>);

    impl Drop for InFlightSlot {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

/// 将提交给它的任务按提交顺序、一次一个地转交给底层执行器。
///
/// # 教案式说明
/// - **意图 (Why)**：连接建立与断开事件需要严格有序，否则上层可能先看到断开再看到建立；
///   用一条串行“车道”复用共享线程池即可，不必为此单独维护线程。
/// - **逻辑 (How)**：
///   1. 任务先进入内部队列；
///   2. 若当前没有排空任务在运行，则向底层执行器提交一个排空任务；
///   3. 排空任务逐个弹出并执行，队列清空后退出；
///   4. 单个任务 panic 会被捕获并记录，不会中断车道；
///   5. 底层执行器拒绝排空任务时，只撤回本次提交的任务；期间被其他线程排入的任务在调用线程上排空。
/// - **契约 (What)**：同一 `SerialExecutor`（及其克隆）上的任务绝不并发，且按提交顺序执行。
#[derive(Clone)]
pub struct SerialExecutor {
    inner: Arc<dyn EventExecutor>,
    lane: Arc<Mutex<SerialLane>>,
}

#[derive(Default)]
struct SerialLane {
    next_seq: u64,
    draining: bool,
    queue: VecDeque<(u64, ChannelEvent, EventTask)>,
}

impl SerialExecutor {
    pub fn new(inner: Arc<dyn EventExecutor>) -> Self {
        Self {
            inner,
            lane: Arc::new(Mutex::new(SerialLane::default())),
        }
    }

    /// 尚未执行的任务数。
    pub fn pending(&self) -> usize {
        self.lane.lock().queue.len()
    }

    fn drain(lane: &Mutex<SerialLane>) {
        loop {
            let next = {
                let mut guard = lane.lock();
                match guard.queue.pop_front() {
                    Some(entry) => entry,
                    None => {
                        guard.draining = false;
                        return;
                    }
                }
            };
            let (_, event, task) = next;
            if catch_unwind(AssertUnwindSafe(task)).is_err() {
                tracing::warn!(event = %event, "serial lane task panicked");
            }
        }
    }
}

impl EventExecutor for SerialExecutor {
    fn execute(&self, event: ChannelEvent, task: EventTask) -> Result<(), RemotingError> {
        let (seq, start_drain) = {
            let mut guard = self.lane.lock();
            let seq = guard.next_seq;
            guard.next_seq = guard.next_seq.wrapping_add(1);
            guard.queue.push_back((seq, event, task));
            let start = !guard.draining;
            guard.draining = true;
            (seq, start)
        };
        if !start_drain {
            return Ok(());
        }

        let lane = Arc::clone(&self.lane);
        let submitted = self
            .inner
            .execute(event, Box::new(move || SerialExecutor::drain(&lane)));
        if let Err(err) = submitted {
            let stranded = {
                let mut guard = self.lane.lock();
                guard.queue.retain(|(queued, _, _)| *queued != seq);
                if guard.queue.is_empty() {
                    guard.draining = false;
                }
                guard.draining
            };
            // 其他提交者已拿到 Ok 的任务不能无人执行，只能在当前线程排空。
            if stranded {
                tracing::warn!(event = %event, error = %err, "serial lane drain rejected, draining queued tasks inline");
                SerialExecutor::drain(&self.lane);
            }
            return Err(err);
        }
        Ok(())
    }
}
