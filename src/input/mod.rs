// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 视频输入系统 (Video Input System)
///
/// - FrameSource: 按顺序拉取帧的接口
/// - VideoDecoder: FFmpeg 解码线程 → 有界通道 (需要 `ffmpeg` 特性)
#[cfg(feature = "ffmpeg")]
pub mod decoder;

#[cfg(feature = "ffmpeg")]
pub use decoder::VideoDecoder;

use crate::detection::VideoFrame;

/// 帧来源
///
/// `next_frame` 按解码顺序返回帧, 返回 `None` 表示视频流结束。
pub trait FrameSource {
    /// 帧尺寸 (宽, 高)
    fn dimensions(&self) -> (u32, u32);

    fn fps(&self) -> f64;

    fn next_frame(&mut self) -> Option<VideoFrame>;

    /// 释放底层资源, 可重复调用
    fn close(&mut self);
}
