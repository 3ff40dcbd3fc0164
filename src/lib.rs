// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod alert; // 警报分发与播放
pub mod config; // 运行配置
pub mod detection; // 检测/追踪/区域监控
pub mod error; // 错误类型
pub mod input; // 视频输入
#[cfg(feature = "onnx")]
pub mod models; // 模型实现
pub mod output; // 标注与输出
pub mod pipeline; // 逐帧流水线

pub use crate::alert::{AlertDispatch, AlertDispatcher, AlertSink, LogAlert, ZoneAlert};
pub use crate::config::{Args, Device, MonitorConfig};
pub use crate::detection::{Detection, Detector, Tracker, Zone, ZoneLedger, ZoneMonitor};
pub use crate::error::{AlertError, SentinelError};
pub use crate::pipeline::{EndReason, Pipeline, PipelineState, RunSummary, StopSignal};

use crate::detection::tracker::compute_iou;
use tracing_subscriber::EnvFilter;

/// 初始化日志 (RUST_LOG, 默认 info); 重复调用无副作用
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .try_init();
}

/// 按类别的贪心 NMS, 保留分数高者
pub fn non_max_suppression(xs: &mut Vec<Detection>, iou_threshold: f32) {
    xs.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            if xs[prev_index].class_id != xs[index].class_id {
                continue;
            }
            let iou = compute_iou(&xs[prev_index].to_bbox(), &xs[index].to_bbox());
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}
