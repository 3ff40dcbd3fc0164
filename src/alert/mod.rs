// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 警报系统 (Alert System)
///
/// - AlertDispatch: 帧循环看到的分发接口 (永不阻塞)
/// - AlertDispatcher: 有界队列 + 小型工作线程池
/// - AlertSink: 实际的警报动作 (播放声音 / 写日志)
pub mod dispatcher;
#[cfg(feature = "audio")]
pub mod sound;

use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::info;

use crate::detection::TrackId;
use crate::error::AlertError;

pub use dispatcher::{AlertCounters, AlertDispatcher};
#[cfg(feature = "audio")]
pub use sound::SoundAlert;

/// 区域进入警报
#[derive(Clone, Debug, PartialEq)]
pub struct ZoneAlert {
    pub track_id: TrackId,
    pub frame_id: u64,
    pub centroid: (i32, i32),
    pub timestamp: DateTime<Local>,
}

impl ZoneAlert {
    pub fn new(track_id: TrackId, frame_id: u64, centroid: (i32, i32)) -> Self {
        Self {
            track_id,
            frame_id,
            centroid,
            timestamp: Local::now(),
        }
    }
}

/// 警报分发接口
///
/// 由帧循环线程调用, 实现必须立即返回; 失败只能在内部记录, 不得传回调用方。
pub trait AlertDispatch: Send {
    fn dispatch(&self, alert: ZoneAlert);
}

impl<T: AlertDispatch + Sync + ?Sized> AlertDispatch for Arc<T> {
    fn dispatch(&self, alert: ZoneAlert) {
        (**self).dispatch(alert)
    }
}

/// 警报动作, 在工作线程中执行, 允许阻塞
pub trait AlertSink: Send + Sync {
    fn play(&self, alert: &ZoneAlert) -> Result<(), AlertError>;
}

/// 仅写日志的警报 (未启用音频时使用)
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlert;

impl AlertSink for LogAlert {
    fn play(&self, alert: &ZoneAlert) -> Result<(), AlertError> {
        info!(
            "🔔 警报: 人员 ID {} | 帧 #{} | 中心点 {:?} | {}",
            alert.track_id,
            alert.frame_id,
            alert.centroid,
            alert.timestamp.format("%Y-%m-%d %H:%M:%S%.3f")
        );
        Ok(())
    }
}
