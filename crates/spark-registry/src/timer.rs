//! 固定延迟的重连定时器。
//!
//! # 教案式说明
//! - **意图 (Why)**：重连尝试需要在后台周期执行，且前一次尝试未结束时不得开始下一次。
//! - **契约 (What)**：首次触发在启动后一个周期；之后每次触发距上一次 `tick` 返回一个周期（固定延迟）。
//!   `tick` 返回的错误或其 panic 只记录日志，不会终止后续调度。
//! - **实现 (How)**：独占一个单工作线程的 Tokio 运行时；`tick` 可能阻塞，因此通过 `spawn_blocking`
//!   执行并等待其完成后再进入下一轮睡眠。

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::RegistryError;

/// 重连定时器线程名。
pub const RECONNECT_THREAD_NAME: &str = "spark-registry-reconnect";

pub struct ReconnectTimer {
    period: Duration,
    state: Mutex<Option<TimerState>>,
}

struct TimerState {
    runtime: Runtime,
    task: JoinHandle<()>,
}

impl ReconnectTimer {
    pub fn start<F>(period: Duration, tick: F) -> Result<Self, RegistryError>
    where
        F: Fn() -> Result<(), RegistryError> + Send + Sync + 'static,
    {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(1)
            .thread_name(RECONNECT_THREAD_NAME)
            .enable_time()
            .build()
            .map_err(RegistryError::Timer)?;

        let tick = Arc::new(tick);
        let task = runtime.spawn(async move {
            loop {
                tokio::time::sleep(period).await;
                let tick = Arc::clone(&tick);
                match tokio::task::spawn_blocking(move || tick()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        error!(error = %err, "unexpected error during scheduled registry reconnect");
                    }
                    Err(join) if join.is_panic() => {
                        error!(error = %join, "scheduled registry reconnect panicked");
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            period,
            state: Mutex::new(Some(TimerState { runtime, task })),
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// 停止后续触发；正在执行的 `tick` 会跑完。返回调用前定时器是否仍在运行。
    pub fn cancel(&self) -> bool {
        match self.state.lock().as_ref() {
            Some(state) => {
                let running = !state.task.is_finished();
                state.task.abort();
                running
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state
            .lock()
            .as_ref()
            .is_some_and(|state| !state.task.is_finished())
    }

    /// 取消调度并关闭运行时，最多等待一个周期让进行中的 `tick` 结束。可重复调用。
    ///
    /// 在异步上下文中调用时无法阻塞等待，运行时改为后台关闭。
    pub fn shutdown(&self) {
        let Some(state) = self.state.lock().take() else {
            return;
        };
        state.task.abort();
        if Handle::try_current().is_ok() {
            warn!("reconnect timer shut down from async context without waiting");
            state.runtime.shutdown_background();
        } else {
            state.runtime.shutdown_timeout(self.period);
            debug!("reconnect timer shut down");
        }
    }
}

impl Drop for ReconnectTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
