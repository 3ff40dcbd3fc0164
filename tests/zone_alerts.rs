// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 流水线集成测试: 假视频源 / 假检测器 / 脚本化追踪器 / 记录型警报

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use image::RgbImage;
use zone_sentinel::alert::{AlertDispatch, AlertDispatcher, AlertSink, ZoneAlert};
use zone_sentinel::detection::{
    BBox, ByteTracker, Detection, Detector, TrackState, TrackedObject, Tracker, VideoFrame,
};
use zone_sentinel::error::AlertError;
use zone_sentinel::input::FrameSource;
use zone_sentinel::output::FrameSink;
use zone_sentinel::{EndReason, MonitorConfig, Pipeline, PipelineState, StopSignal};

// ========== 假组件 ==========

struct FakeSource {
    width: u32,
    height: u32,
    remaining: u64,
    next_id: u64,
    closed: Arc<AtomicBool>,
}

impl FakeSource {
    fn new(frames: u64) -> (Self, Arc<AtomicBool>) {
        let closed = Arc::new(AtomicBool::new(false));
        let source = Self {
            width: 100,
            height: 100,
            remaining: frames,
            next_id: 0,
            closed: closed.clone(),
        };
        (source, closed)
    }
}

impl FrameSource for FakeSource {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn fps(&self) -> f64 {
        25.0
    }

    fn next_frame(&mut self) -> Option<VideoFrame> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.next_id += 1;
        Some(VideoFrame::new(self.next_id, RgbImage::new(self.width, self.height)))
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// 每帧返回相同检测; `fail_on` 中的帧号返回错误
struct FakeDetector {
    detections: Vec<Detection>,
    fail_on: Vec<u64>,
}

impl Detector for FakeDetector {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Vec<Detection>> {
        if self.fail_on.contains(&frame.frame_id) {
            return Err(anyhow!("inference failed on frame {}", frame.frame_id));
        }
        Ok(self.detections.clone())
    }
}

/// 按脚本逐帧返回轨迹, 忽略检测输入
struct ScriptedTracker {
    script: VecDeque<Vec<TrackedObject>>,
    current: Vec<TrackedObject>,
}

impl ScriptedTracker {
    fn new(script: Vec<Vec<TrackedObject>>) -> Self {
        Self {
            script: script.into(),
            current: Vec::new(),
        }
    }
}

impl Tracker for ScriptedTracker {
    fn update(&mut self, _detections: &[Detection], _frame: &VideoFrame) -> &[TrackedObject] {
        self.current = self.script.pop_front().unwrap_or_default();
        &self.current
    }

    fn track_count(&self) -> usize {
        self.current.len()
    }
}

#[derive(Default)]
struct Recording {
    alerts: Mutex<Vec<ZoneAlert>>,
}

impl Recording {
    fn ids(&self) -> Vec<u32> {
        self.alerts.lock().unwrap().iter().map(|a| a.track_id).collect()
    }
}

impl AlertDispatch for Recording {
    fn dispatch(&self, alert: ZoneAlert) {
        self.alerts.lock().unwrap().push(alert);
    }
}

#[derive(Default)]
struct SinkLog {
    written: AtomicUsize,
    finished: AtomicUsize,
}

struct RecordingSink {
    log: Arc<SinkLog>,
    fail_after: Option<usize>,
    stop_after: Option<(usize, StopSignal)>,
}

impl RecordingSink {
    fn new(log: Arc<SinkLog>) -> Self {
        Self {
            log,
            fail_after: None,
            stop_after: None,
        }
    }
}

impl FrameSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn write(&mut self, frame: &RgbImage) -> Result<()> {
        assert_eq!(frame.dimensions(), (100, 100));
        let written = self.log.written.load(Ordering::SeqCst);
        if let Some(limit) = self.fail_after {
            if written >= limit {
                return Err(anyhow!("disk full"));
            }
        }
        let written = self.log.written.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((limit, stop)) = &self.stop_after {
            if written >= *limit {
                stop.request_stop();
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.log.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn confirmed(id: u32, ltrb: [f32; 4]) -> TrackedObject {
    TrackedObject {
        id,
        bbox: BBox {
            x1: ltrb[0],
            y1: ltrb[1],
            x2: ltrb[2],
            y2: ltrb[3],
            confidence: 0.9,
            class_id: 0,
        },
        state: TrackState::Confirmed,
        hits: 3,
        frames_lost: 0,
    }
}

fn person(l: f32, t: f32, r: f32, b: f32, conf: f32) -> Detection {
    Detection::from_ltrb(l, t, r, b, conf, 0)
}

const INSIDE: [f32; 4] = [60.0, 60.0, 70.0, 70.0];
const OUTSIDE: [f32; 4] = [0.0, 0.0, 10.0, 10.0];

// ========== 测试 ==========

#[test]
fn scenario_alerts_once_and_releases_everything() {
    let (source, closed) = FakeSource::new(4);
    let detector = FakeDetector {
        detections: Vec::new(),
        fail_on: Vec::new(),
    };
    let tracker = ScriptedTracker::new(vec![
        vec![confirmed(5, INSIDE)],
        vec![confirmed(5, INSIDE)],
        vec![confirmed(5, OUTSIDE)],
        vec![confirmed(5, INSIDE)],
    ]);
    let recording = Arc::new(Recording::default());
    let sink_log = Arc::new(SinkLog::default());

    let mut pipeline = Pipeline::new(
        source,
        detector,
        tracker,
        Box::new(recording.clone()),
        &MonitorConfig::default(),
    );
    pipeline.add_sink(Box::new(RecordingSink::new(sink_log.clone())));
    assert_eq!(pipeline.monitor().zone().x1, 40);
    assert_eq!(pipeline.monitor().zone().x2, 95);

    let summary = pipeline.run();
    assert_eq!(summary.frames, 4);
    assert_eq!(summary.alerts, 1);
    assert_eq!(summary.alerted_ids, vec![5]);
    assert_eq!(summary.end_reason, EndReason::SourceExhausted);
    assert_eq!(recording.ids(), vec![5]);
    assert_eq!(recording.alerts.lock().unwrap()[0].frame_id, 1);

    assert_eq!(sink_log.written.load(Ordering::SeqCst), 4);
    assert_eq!(sink_log.finished.load(Ordering::SeqCst), 1);
    assert!(closed.load(Ordering::SeqCst));
    assert_eq!(pipeline.state(), PipelineState::Ended(EndReason::SourceExhausted));
    // 结束后再次调用不再取帧
    assert_eq!(pipeline.step(), PipelineState::Ended(EndReason::SourceExhausted));
}

#[test]
fn stop_before_first_frame() {
    let (source, closed) = FakeSource::new(10);
    let detector = FakeDetector {
        detections: Vec::new(),
        fail_on: Vec::new(),
    };
    let stop = StopSignal::new();
    let sink_log = Arc::new(SinkLog::default());
    let mut pipeline = Pipeline::new(
        source,
        detector,
        ByteTracker::default(),
        Box::new(Arc::new(Recording::default())),
        &MonitorConfig::default(),
    )
    .with_stop_signal(stop.clone());
    pipeline.add_sink(Box::new(RecordingSink::new(sink_log.clone())));

    stop.request_stop();
    let summary = pipeline.run();
    assert_eq!(summary.frames, 0);
    assert_eq!(summary.end_reason, EndReason::StopRequested);
    assert_eq!(sink_log.finished.load(Ordering::SeqCst), 1);
    assert!(closed.load(Ordering::SeqCst));
}

#[test]
fn stop_is_checked_once_per_frame() {
    let (source, _closed) = FakeSource::new(10);
    let detector = FakeDetector {
        detections: Vec::new(),
        fail_on: Vec::new(),
    };
    let mut pipeline = Pipeline::new(
        source,
        detector,
        ByteTracker::default(),
        Box::new(Arc::new(Recording::default())),
        &MonitorConfig::default(),
    );
    let sink_log = Arc::new(SinkLog::default());
    let mut sink = RecordingSink::new(sink_log.clone());
    sink.stop_after = Some((3, pipeline.stop_signal()));
    pipeline.add_sink(Box::new(sink));

    let summary = pipeline.run();
    assert_eq!(summary.frames, 3);
    assert_eq!(summary.end_reason, EndReason::StopRequested);
    assert_eq!(sink_log.finished.load(Ordering::SeqCst), 1);
}

#[test]
fn detector_error_counts_as_empty_frame() {
    let (source, _closed) = FakeSource::new(5);
    let detector = FakeDetector {
        detections: vec![person(60.0, 60.0, 70.0, 70.0, 0.9)],
        fail_on: vec![2],
    };
    let recording = Arc::new(Recording::default());
    let mut pipeline = Pipeline::new(
        source,
        detector,
        ByteTracker::default(),
        Box::new(recording.clone()),
        &MonitorConfig::default(),
    );

    let summary = pipeline.run();
    assert_eq!(summary.frames, 5);
    assert_eq!(pipeline.detector_errors(), 1);
    // 第2帧丢失使未确认轨迹1被删除, 轨迹2在第5帧确认
    assert_eq!(summary.alerted_ids, vec![2]);
    assert_eq!(recording.ids(), vec![2]);
}

#[test]
fn only_confident_people_reach_the_tracker() {
    let (source, _closed) = FakeSource::new(6);
    let detector = FakeDetector {
        detections: vec![
            // 置信度等于阈值: 过滤
            person(60.0, 60.0, 70.0, 70.0, 0.4),
            // 非人员类别: 过滤
            Detection::from_ltrb(50.0, 50.0, 80.0, 80.0, 0.95, 2),
        ],
        fail_on: Vec::new(),
    };
    let recording = Arc::new(Recording::default());
    let mut pipeline = Pipeline::new(
        source,
        detector,
        ByteTracker::default(),
        Box::new(recording.clone()),
        &MonitorConfig::default(),
    );

    let summary = pipeline.run();
    assert_eq!(summary.alerts, 0);
    assert!(recording.ids().is_empty());
}

#[test]
fn failing_sink_is_disabled_not_fatal() {
    let (source, _closed) = FakeSource::new(6);
    let detector = FakeDetector {
        detections: Vec::new(),
        fail_on: Vec::new(),
    };
    let mut pipeline = Pipeline::new(
        source,
        detector,
        ByteTracker::default(),
        Box::new(Arc::new(Recording::default())),
        &MonitorConfig::default(),
    );
    let broken = Arc::new(SinkLog::default());
    let mut sink = RecordingSink::new(broken.clone());
    sink.fail_after = Some(2);
    pipeline.add_sink(Box::new(sink));
    let healthy = Arc::new(SinkLog::default());
    pipeline.add_sink(Box::new(RecordingSink::new(healthy.clone())));

    let summary = pipeline.run();
    assert_eq!(summary.frames, 6);
    assert_eq!(broken.written.load(Ordering::SeqCst), 2);
    assert_eq!(broken.finished.load(Ordering::SeqCst), 1);
    assert_eq!(healthy.written.load(Ordering::SeqCst), 6);
    assert_eq!(healthy.finished.load(Ordering::SeqCst), 1);
}

struct SlowFailingSink;

impl AlertSink for SlowFailingSink {
    fn play(&self, _alert: &ZoneAlert) -> Result<(), AlertError> {
        std::thread::sleep(Duration::from_millis(500));
        Err(AlertError::Device("no speaker".into()))
    }
}

#[test]
fn slow_failing_alert_does_not_stall_frames() {
    let dispatcher = Arc::new(AlertDispatcher::new(Arc::new(SlowFailingSink), 1, 4).unwrap());
    let (source, _closed) = FakeSource::new(8);
    let detector = FakeDetector {
        detections: vec![person(60.0, 60.0, 70.0, 70.0, 0.9)],
        fail_on: Vec::new(),
    };
    let mut pipeline = Pipeline::new(
        source,
        detector,
        ByteTracker::default(),
        Box::new(Arc::clone(&dispatcher)),
        &MonitorConfig::default(),
    );

    let start = Instant::now();
    let summary = pipeline.run();
    assert!(start.elapsed() < Duration::from_millis(400));
    assert_eq!(summary.frames, 8);
    assert_eq!(summary.alerted_ids, vec![1]);
    assert!(pipeline.monitor().ledger().contains(1));

    drop(pipeline);
    let dispatcher = Arc::try_unwrap(dispatcher).ok().unwrap();
    let counters = dispatcher.shutdown();
    assert_eq!(counters.submitted, 1);
    assert_eq!(counters.failed, 1);
    assert_eq!(counters.played, 0);
}
