// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 视频文件解码器
//! FFmpeg decode thread → RGB24 frames → bounded channel
//!
//! 通道满时解码线程阻塞等待, 帧循环按顺序拉取, 不丢帧。

use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::stream_info::{find_video_stream_info, StreamInfo};
use ez_ffmpeg::{AVMediaType, FfmpegContext, Frame, Input};
use image::RgbImage;
use tracing::{debug, error, info, warn};

use super::FrameSource;
use crate::detection::VideoFrame;
use crate::error::{Result, SentinelError};

/// 解码通道容量
const FRAME_QUEUE: usize = 4;
/// 容器未给出帧率时使用
const FALLBACK_FPS: f64 = 30.0;

enum DecodeEvent {
    Frame(RgbImage),
    Failed(String),
}

/// FFmpeg 帧过滤器: RGB24 帧 → RgbImage → 通道
struct RgbGrabber {
    tx: Sender<DecodeEvent>,
    count: u64,
    dropped: u64,
    last: Instant,
}

impl RgbGrabber {
    fn new(tx: Sender<DecodeEvent>) -> Self {
        Self {
            tx,
            count: 0,
            dropped: 0,
            last: Instant::now(),
        }
    }
}

impl FrameFilter for RgbGrabber {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> std::result::Result<(), String> {
        debug!("✅ 解码线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> std::result::Result<Option<Frame>, String> {
        // SAFETY: 帧由 FFmpeg 持有, 在本次回调期间有效
        let Some(image) = (unsafe { copy_rgb24(&frame) }) else {
            self.dropped += 1;
            if self.dropped <= 10 {
                warn!("⚠️ 丢弃帧: 空帧/损坏帧 (已丢弃 {})", self.dropped);
            }
            return Ok(None);
        };

        // 阻塞发送, 接收端关闭则停止解码
        if self.tx.send(DecodeEvent::Frame(image)).is_err() {
            return Err("frame receiver closed".to_string());
        }
        self.count += 1;

        if self.last.elapsed().as_secs_f64() >= 5.0 {
            let fps = self.count as f64 / self.last.elapsed().as_secs_f64();
            debug!("📺 解码统计: {:.1}fps | 丢弃 {}", fps, self.dropped);
            self.last = Instant::now();
            self.count = 0;
        }

        Ok(Some(frame))
    }
}

/// 拷贝 RGB24 帧数据 (按 linesize 逐行去除填充)
///
/// # Safety
/// `frame` 必须是有效的 RGB24 AVFrame。
unsafe fn copy_rgb24(frame: &Frame) -> Option<RgbImage> {
    if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
        return None;
    }
    let raw = &*frame.as_ptr();
    let w = usize::try_from(raw.width).ok()?;
    let h = usize::try_from(raw.height).ok()?;
    let stride = usize::try_from(raw.linesize[0]).ok()?;
    let data = raw.data[0];
    if w == 0 || h == 0 || data.is_null() || stride < w * 3 {
        return None;
    }

    let mut buf = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let line = std::slice::from_raw_parts(data.add(row * stride), w * 3);
        buf.extend_from_slice(line);
    }
    RgbImage::from_raw(w as u32, h as u32, buf)
}

fn decode_loop(path: String, tx: Sender<DecodeEvent>) {
    let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
    let pipe = pipe.filter("rgb24", Box::new(RgbGrabber::new(tx.clone())));
    let out = create_null_output().add_frame_pipeline(pipe);

    let ctx = match FfmpegContext::builder()
        .input(Input::new(path.as_str()))
        .filter_descs(["format=rgb24"].into())
        .output(out)
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            let _ = tx.send(DecodeEvent::Failed(format!("构建失败: {}", e)));
            return;
        }
    };

    let sch = match ctx.start() {
        Ok(s) => s,
        Err(e) => {
            let _ = tx.send(DecodeEvent::Failed(format!("启动失败: {}", e)));
            return;
        }
    };
    drop(tx);

    if let Err(e) = sch.wait() {
        // 接收端主动关闭时也会走到这里
        debug!("解码结束: {}", e);
    }
    debug!("📹 解码线程退出: {}", path);
}

/// 视频文件解码器
pub struct VideoDecoder {
    path: String,
    rx: Option<Receiver<DecodeEvent>>,
    worker: Option<JoinHandle<()>>,
    pending: Option<RgbImage>,
    width: u32,
    height: u32,
    fps: f64,
    next_id: u64,
}

impl VideoDecoder {
    /// 打开视频并解码第一帧以确定尺寸
    pub fn open(path: &str) -> Result<Self> {
        let source_err = |reason: String| SentinelError::SourceOpen {
            path: path.to_string(),
            reason,
        };

        let fps = match find_video_stream_info(path) {
            Ok(Some(StreamInfo::Video { fps, .. })) if fps.is_finite() && fps > 0.0 => fps,
            Ok(Some(_)) | Ok(None) => {
                warn!("⚠️ 无法读取帧率, 使用默认 {} fps", FALLBACK_FPS);
                FALLBACK_FPS
            }
            Err(e) => return Err(source_err(e.to_string())),
        };

        let (tx, rx) = crossbeam_channel::bounded(FRAME_QUEUE);
        let owned = path.to_string();
        let worker = std::thread::Builder::new()
            .name("video-decoder".into())
            .spawn(move || decode_loop(owned, tx))?;

        let first = match rx.recv() {
            Ok(DecodeEvent::Frame(image)) => image,
            Ok(DecodeEvent::Failed(reason)) => return Err(source_err(reason)),
            Err(_) => return Err(source_err("视频没有可解码的帧".to_string())),
        };
        let (width, height) = first.dimensions();
        info!("🎬 视频源: {} | {}x{} @ {:.2}fps", path, width, height, fps);

        Ok(Self {
            path: path.to_string(),
            rx: Some(rx),
            worker: Some(worker),
            pending: Some(first),
            width,
            height,
            fps,
            next_id: 0,
        })
    }
}

impl FrameSource for VideoDecoder {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn next_frame(&mut self) -> Option<VideoFrame> {
        let image = match self.pending.take() {
            Some(image) => image,
            None => match self.rx.as_ref()?.recv() {
                Ok(DecodeEvent::Frame(image)) => image,
                Ok(DecodeEvent::Failed(reason)) => {
                    error!("❌ 解码失败: {}", reason);
                    return None;
                }
                Err(_) => return None,
            },
        };
        self.next_id += 1;
        Some(VideoFrame::new(self.next_id, image))
    }

    fn close(&mut self) {
        // 先关闭通道, 阻塞在 send 上的解码线程随之退出
        self.pending.take();
        if self.rx.take().is_none() {
            return;
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("❌ 解码线程异常退出: {}", self.path);
            }
        }
        info!("📹 视频源已关闭: {} ({} 帧)", self.path, self.next_id);
    }
}

impl Drop for VideoDecoder {
    fn drop(&mut self) {
        self.close();
    }
}
