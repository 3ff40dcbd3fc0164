// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 出口区域警报 (Zone Sentinel)
///
/// 视频 → YOLO 人员检测 → ByteTrack 追踪 → 出口区域判定 → 每人一次警报
///
/// 线程:
/// 1. 解码线程: FFmpeg 解码 (有界通道)
/// 2. 流水线:   检测/追踪/区域判定/标注 (单线程顺序处理)
/// 3. 警报线程: 播放警报音 (小型线程池)
/// 4. 主线程:   预览窗口 (可选)
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use zone_sentinel::alert::{AlertDispatcher, AlertSink};
use zone_sentinel::detection::{ByteTracker, Detector, Tracker};
use zone_sentinel::input::{FrameSource, VideoDecoder};
use zone_sentinel::models::YoloDetector;
use zone_sentinel::output::{Annotator, VideoEncoder};
use zone_sentinel::{init_logging, Args, MonitorConfig, Pipeline, RunSummary, StopSignal};

fn main() {
    init_logging();
    let args = Args::parse();
    if let Err(e) = run(&args) {
        error!("❌ {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    info!("🚀 出口区域警报启动");

    let mut config = match &args.config {
        Some(path) => MonitorConfig::load(path)?,
        None => MonitorConfig::default(),
    };
    config.apply_args(args);
    config.validate()?;
    config.print_summary();

    // 启动阶段的错误都是致命的
    let source = VideoDecoder::open(&args.input)?;
    let (width, height) = source.dimensions();
    let fps = source.fps();

    let detector = YoloDetector::new(
        &args.model,
        args.device,
        config.input_size,
        config.conf_threshold,
        config.nms_iou_threshold,
    )?;
    let tracker = ByteTracker::new(config.tracker.clone());

    let dispatcher = Arc::new(AlertDispatcher::new(
        alert_sink(args),
        config.alert.workers,
        config.alert.queue_capacity,
    )?);

    let stop = StopSignal::new();
    let mut pipeline = Pipeline::new(
        source,
        detector,
        tracker,
        Box::new(Arc::clone(&dispatcher)),
        &config,
    )
    .with_annotator(Annotator::with_font_file(&args.font))
    .with_stop_signal(stop.clone());

    if !args.no_output {
        pipeline.add_sink(Box::new(VideoEncoder::create(&args.output, width, height, fps)?));
    }

    let summary = run_pipeline(pipeline, args, stop)?;

    let counters = dispatcher.stats();
    info!(
        "🔔 警报统计: 入队 {} | 播放 {} | 失败 {} | 丢弃 {}",
        counters.submitted, counters.played, counters.failed, counters.dropped
    );
    info!(
        "✅ 结束 ({:?}): {} 帧, {} 人触发警报 {:?}",
        summary.end_reason, summary.frames, summary.alerts, summary.alerted_ids
    );
    Ok(())
}

#[cfg(feature = "audio")]
fn alert_sink(args: &Args) -> Arc<dyn AlertSink> {
    use zone_sentinel::alert::SoundAlert;

    if !args.sound.exists() {
        tracing::warn!("⚠️ 警报音 {} 不存在, 警报将只记录错误", args.sound.display());
    }
    info!("🔊 警报音: {}", args.sound.display());
    Arc::new(SoundAlert::new(&args.sound))
}

#[cfg(not(feature = "audio"))]
fn alert_sink(_args: &Args) -> Arc<dyn AlertSink> {
    info!("🔕 未启用 audio 特性, 警报只写日志");
    Arc::new(zone_sentinel::alert::LogAlert)
}

/// 有窗口时流水线放到工作线程, 窗口占用主线程
#[cfg(feature = "display")]
fn run_pipeline<S, D, T>(
    mut pipeline: Pipeline<S, D, T>,
    args: &Args,
    stop: StopSignal,
) -> Result<RunSummary>
where
    S: FrameSource + Send + 'static,
    D: Detector + Send + 'static,
    T: Tracker + Send + 'static,
{
    use zone_sentinel::output::{run_window, DisplaySink};

    if args.headless {
        return Ok(pipeline.run());
    }

    let (display, frames) = DisplaySink::channel();
    pipeline.add_sink(Box::new(display));
    let worker = std::thread::Builder::new()
        .name("pipeline".into())
        .spawn(move || pipeline.run())?;

    run_window("Zone Sentinel", frames, stop.clone());
    // 窗口关闭后流水线也停止
    stop.request_stop();

    worker
        .join()
        .map_err(|_| anyhow::anyhow!("流水线线程异常退出"))
}

#[cfg(not(feature = "display"))]
fn run_pipeline<S, D, T>(
    mut pipeline: Pipeline<S, D, T>,
    _args: &Args,
    _stop: StopSignal,
) -> Result<RunSummary>
where
    S: FrameSource,
    D: Detector,
    T: Tracker,
{
    Ok(pipeline.run())
}
