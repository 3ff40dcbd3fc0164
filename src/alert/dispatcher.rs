// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 警报分发器 (Alert Dispatcher)
//! 职责: 帧循环投递警报 → 有界队列 → 工作线程执行 AlertSink
//!
//! 队列满时丢弃并计数, 帧循环永不阻塞。工作线程内的错误和 panic 都在这里捕获。

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::{debug, error, warn};

use super::{AlertDispatch, AlertSink, ZoneAlert};
use crate::error::{AlertError, SentinelError};

/// 警报统计快照
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AlertCounters {
    /// 成功入队
    pub submitted: u64,
    /// 执行成功
    pub played: u64,
    /// 执行失败 (错误或 panic)
    pub failed: u64,
    /// 队列满/已关闭而丢弃
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct AlertStats {
    submitted: AtomicU64,
    played: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl AlertStats {
    fn snapshot(&self) -> AlertCounters {
        AlertCounters {
            submitted: self.submitted.load(Ordering::Relaxed),
            played: self.played.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

pub struct AlertDispatcher {
    tx: Option<Sender<ZoneAlert>>,
    workers: Vec<JoinHandle<()>>,
    stats: Arc<AlertStats>,
}

impl AlertDispatcher {
    /// 创建分发器并启动 `workers` 个工作线程
    pub fn new(
        sink: Arc<dyn AlertSink>,
        workers: usize,
        queue_capacity: usize,
    ) -> Result<Self, SentinelError> {
        if workers == 0 || queue_capacity == 0 {
            return Err(SentinelError::Config(format!(
                "警报线程数与队列容量必须大于0 (workers={}, queue={})",
                workers, queue_capacity
            )));
        }

        let (tx, rx) = crossbeam_channel::bounded(queue_capacity);
        let stats = Arc::new(AlertStats::default());

        let mut handles = Vec::with_capacity(workers);
        for i in 0..workers {
            let rx = rx.clone();
            let sink = Arc::clone(&sink);
            let stats = Arc::clone(&stats);
            let handle = std::thread::Builder::new()
                .name(format!("alert-worker-{}", i))
                .spawn(move || worker_loop(rx, sink, stats))?;
            handles.push(handle);
        }
        debug!("🔔 警报分发器启动: {} 个工作线程, 队列容量 {}", workers, queue_capacity);

        Ok(Self {
            tx: Some(tx),
            workers: handles,
            stats,
        })
    }

    pub fn stats(&self) -> AlertCounters {
        self.stats.snapshot()
    }

    /// 关闭队列并等待已入队的警报执行完毕
    pub fn shutdown(mut self) -> AlertCounters {
        self.tx.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("❌ 警报工作线程异常退出");
            }
        }
        self.stats.snapshot()
    }
}

impl AlertDispatch for AlertDispatcher {
    fn dispatch(&self, alert: ZoneAlert) {
        let Some(tx) = &self.tx else {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };
        match tx.try_send(alert) {
            Ok(()) => {
                self.stats.submitted.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(alert)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("⚠️ 警报队列已满, 丢弃人员 ID {} 的警报", alert.track_id);
            }
            Err(TrySendError::Disconnected(alert)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("⚠️ 警报线程已退出, 丢弃人员 ID {} 的警报", alert.track_id);
            }
        }
    }
}

impl Drop for AlertDispatcher {
    fn drop(&mut self) {
        // 只关闭队列, 不等待正在播放的警报
        self.tx.take();
    }
}

fn worker_loop(rx: Receiver<ZoneAlert>, sink: Arc<dyn AlertSink>, stats: Arc<AlertStats>) {
    while let Ok(alert) = rx.recv() {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| sink.play(&alert)))
            .unwrap_or_else(|payload| Err(AlertError::Panicked(panic_message(&payload))));

        match outcome {
            Ok(()) => {
                stats.played.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                error!("❌ 警报失败 (人员 ID {}): {}", alert.track_id, e);
            }
        }
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("unknown panic")
    }
}
