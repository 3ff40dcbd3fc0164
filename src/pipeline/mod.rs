// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 视频处理流水线 (Video Processing Pipeline)
///
/// 单线程逐帧处理, 严格按顺序:
/// 停止检查 → 取帧 → 检测 → 过滤 → 追踪 → 区域监控 → 标注 → 输出
///
/// 只有警报播放在独立线程中执行 (见 `alert`)。
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::alert::AlertDispatch;
use crate::config::MonitorConfig;
use crate::detection::{filter_detections, Detector, TrackId, Tracker, Zone, ZoneMonitor};
use crate::input::FrameSource;
use crate::output::{Annotator, FrameSink};

/// 进度日志间隔 (秒)
const PROGRESS_INTERVAL_SECS: f64 = 5.0;

/// 协作式停止信号, 每帧检查一次
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndReason {
    SourceExhausted,
    StopRequested,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Running,
    Ended(EndReason),
}

/// 运行结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub alerts: usize,
    pub alerted_ids: Vec<TrackId>,
    pub end_reason: EndReason,
}

pub struct Pipeline<S: FrameSource, D: Detector, T: Tracker> {
    source: S,
    detector: D,
    tracker: T,
    monitor: ZoneMonitor,
    annotator: Annotator,
    sinks: Vec<Box<dyn FrameSink>>,
    target_class: usize,
    conf_threshold: f32,
    stop: StopSignal,
    state: PipelineState,
    released: bool,

    // 统计
    frames: u64,
    detector_errors: u64,
    window_frames: u64,
    last: Instant,
}

impl<S: FrameSource, D: Detector, T: Tracker> Pipeline<S, D, T> {
    /// 区域按视频源的帧尺寸计算, 整个运行期间不变
    pub fn new(
        source: S,
        detector: D,
        tracker: T,
        dispatcher: Box<dyn AlertDispatch>,
        config: &MonitorConfig,
    ) -> Self {
        let (width, height) = source.dimensions();
        let zone = Zone::from_frame(width, height, &config.zone);
        info!(
            "🚪 出口区域: ({}, {})-({}, {}) | 帧尺寸 {}x{}",
            zone.x1, zone.y1, zone.x2, zone.y2, width, height
        );

        Self {
            source,
            detector,
            tracker,
            monitor: ZoneMonitor::new(zone, dispatcher),
            annotator: Annotator::default(),
            sinks: Vec::new(),
            target_class: config.target_class,
            conf_threshold: config.conf_threshold,
            stop: StopSignal::new(),
            state: PipelineState::Running,
            released: false,
            frames: 0,
            detector_errors: 0,
            window_frames: 0,
            last: Instant::now(),
        }
    }

    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = annotator;
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn add_sink(&mut self, sink: Box<dyn FrameSink>) {
        info!("📤 输出: {}", sink.name());
        self.sinks.push(sink);
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn monitor(&self) -> &ZoneMonitor {
        &self.monitor
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn detector_errors(&self) -> u64 {
        self.detector_errors
    }

    /// 处理一帧; 结束后再次调用直接返回结束状态
    pub fn step(&mut self) -> PipelineState {
        if let PipelineState::Ended(_) = self.state {
            return self.state;
        }

        if self.stop.is_stop_requested() {
            return self.end(EndReason::StopRequested);
        }

        let Some(frame) = self.source.next_frame() else {
            return self.end(EndReason::SourceExhausted);
        };
        self.frames += 1;
        self.window_frames += 1;

        // 检测失败按本帧无检测处理, 不重试
        let raw = match self.detector.detect(&frame) {
            Ok(raw) => raw,
            Err(e) => {
                self.detector_errors += 1;
                warn!("⚠️ 帧 #{} 检测失败, 按无检测处理: {:#}", frame.frame_id, e);
                Vec::new()
            }
        };
        let detections = filter_detections(raw, self.target_class, self.conf_threshold);

        let tracks = self.tracker.update(&detections, &frame);
        let report = self.monitor.observe(frame.frame_id, tracks);

        if !self.sinks.is_empty() {
            let annotated = self.annotator.annotate(&frame.image, &report);
            self.sinks.retain_mut(|sink| match sink.write(&annotated) {
                Ok(()) => true,
                Err(e) => {
                    error!("❌ 输出 {} 写入失败, 已停用: {:#}", sink.name(), e);
                    if let Err(e) = sink.finish() {
                        error!("❌ 输出 {} 关闭失败: {:#}", sink.name(), e);
                    }
                    false
                }
            });
        }

        self.log_progress();
        self.state
    }

    /// 运行到视频结束或收到停止信号
    pub fn run(&mut self) -> RunSummary {
        info!("▶️ 开始处理 | {}", self.detector.summary());
        let end_reason = loop {
            if let PipelineState::Ended(reason) = self.step() {
                break reason;
            }
        };

        let summary = RunSummary {
            frames: self.frames,
            alerts: self.monitor.ledger().len(),
            alerted_ids: self.monitor.ledger().ids(),
            end_reason,
        };
        info!(
            "🏁 处理完成: {} 帧 | 警报 {} 次 {:?} | 检测失败 {} 帧",
            summary.frames, summary.alerts, summary.alerted_ids, self.detector_errors
        );
        summary
    }

    fn end(&mut self, reason: EndReason) -> PipelineState {
        match reason {
            EndReason::SourceExhausted => info!("⏹️ 视频结束"),
            EndReason::StopRequested => info!("⏹️ 收到停止请求"),
        }
        self.state = PipelineState::Ended(reason);
        self.release();
        self.state
    }

    /// 关闭所有输出和视频源, 可重复调用
    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        for mut sink in self.sinks.drain(..) {
            if let Err(e) = sink.finish() {
                error!("❌ 输出 {} 关闭失败: {:#}", sink.name(), e);
            }
        }
        self.source.close();
    }

    fn log_progress(&mut self) {
        let elapsed = self.last.elapsed().as_secs_f64();
        if elapsed < PROGRESS_INTERVAL_SECS {
            return;
        }
        info!(
            "📊 帧 #{} | {:.1} fps | {} | 已报警 {}",
            self.frames,
            self.window_frames as f64 / elapsed,
            self.tracker.stats(),
            self.monitor.ledger().len()
        );
        self.window_frames = 0;
        self.last = Instant::now();
    }
}

impl<S: FrameSource, D: Detector, T: Tracker> Drop for Pipeline<S, D, T> {
    fn drop(&mut self) {
        self.release();
    }
}
