// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 视频输出系统 (Video Output System)
///
/// - Annotator:    区域/目标框/标签绘制
/// - VideoEncoder: 标注帧 → 视频文件 (需要 `ffmpeg` 特性)
/// - DisplaySink:  标注帧 → 预览窗口 (需要 `display` 特性)
pub mod annotate;
#[cfg(feature = "display")]
pub mod display;
#[cfg(feature = "ffmpeg")]
pub mod encoder;

pub use annotate::Annotator;
#[cfg(feature = "display")]
pub use display::{run_window, DisplaySink};
#[cfg(feature = "ffmpeg")]
pub use encoder::VideoEncoder;

use image::RgbImage;

/// 标注帧的去向
pub trait FrameSink: Send {
    fn name(&self) -> &str;

    fn write(&mut self, frame: &RgbImage) -> anyhow::Result<()>;

    /// 刷新并关闭输出, 流水线结束时调用一次
    fn finish(&mut self) -> anyhow::Result<()>;
}
