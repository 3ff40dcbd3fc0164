// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 视频编码输出
//! 标注帧 (RGB24) → 有界通道 → FFmpeg rawvideo 输入 → MPEG-4 文件

use std::thread::JoinHandle;

use anyhow::{anyhow, bail, Context};
use crossbeam_channel::{Receiver, Sender};
use ez_ffmpeg::{FfmpegContext, Input, Output};
use image::RgbImage;
use tracing::{debug, info};

use super::FrameSink;
use crate::error::{Result, SentinelError};

const ENCODE_QUEUE: usize = 8;
/// FFERRTAG('E','O','F',' ')
const AVERROR_EOF: i32 = -541_478_725;
const VIDEO_CODEC: &str = "mpeg4";

/// 读回调: 从通道按字节流读出原始帧
struct RawFrameReader {
    rx: Receiver<Vec<u8>>,
    current: Vec<u8>,
    offset: usize,
}

impl RawFrameReader {
    fn read(&mut self, buf: &mut [u8]) -> i32 {
        while self.offset >= self.current.len() {
            match self.rx.recv() {
                Ok(frame) => {
                    self.current = frame;
                    self.offset = 0;
                }
                // 发送端关闭 = 输出结束
                Err(_) => return AVERROR_EOF,
            }
        }
        let n = buf.len().min(self.current.len() - self.offset).min(i32::MAX as usize);
        buf[..n].copy_from_slice(&self.current[self.offset..self.offset + n]);
        self.offset += n;
        n as i32
    }
}

fn encode_loop(
    path: String,
    width: u32,
    height: u32,
    fps: f64,
    rx: Receiver<Vec<u8>>,
) -> std::result::Result<(), String> {
    let mut reader = RawFrameReader {
        rx,
        current: Vec::new(),
        offset: 0,
    };
    let size = format!("{}x{}", width, height);
    let rate = format!("{}", fps);

    let input = Input::new_by_read_callback(move |buf: &mut [u8]| reader.read(buf))
        .set_format("rawvideo")
        .set_input_opts(
            [
                ("video_size", size.as_str()),
                ("pixel_format", "rgb24"),
                ("framerate", rate.as_str()),
            ]
            .into(),
        );
    let output = Output::from(path.as_str()).set_video_codec(VIDEO_CODEC);

    let ctx = FfmpegContext::builder()
        .input(input)
        .output(output)
        .build()
        .map_err(|e| format!("构建失败: {}", e))?;
    let sch = ctx.start().map_err(|e| format!("启动失败: {}", e))?;
    debug!("🎞️ 编码线程启动: {}", path);
    sch.wait().map_err(|e| format!("编码失败: {}", e))
}

/// 视频文件输出
pub struct VideoEncoder {
    name: String,
    width: u32,
    height: u32,
    tx: Option<Sender<Vec<u8>>>,
    worker: Option<JoinHandle<std::result::Result<(), String>>>,
    frames: u64,
}

impl VideoEncoder {
    pub fn create(path: &str, width: u32, height: u32, fps: f64) -> Result<Self> {
        let sink_err = |reason: String| SentinelError::SinkOpen {
            sink: path.to_string(),
            reason,
        };
        if width == 0 || height == 0 {
            return Err(sink_err(format!("非法尺寸 {}x{}", width, height)));
        }
        // 启动前确认路径可写
        std::fs::File::create(path).map_err(|e| sink_err(e.to_string()))?;

        let (tx, rx) = crossbeam_channel::bounded(ENCODE_QUEUE);
        let owned = path.to_string();
        let worker = std::thread::Builder::new()
            .name("video-encoder".into())
            .spawn(move || encode_loop(owned, width, height, fps, rx))?;

        info!("💾 输出视频: {} | {}x{} @ {:.2}fps ({})", path, width, height, fps, VIDEO_CODEC);
        Ok(Self {
            name: path.to_string(),
            width,
            height,
            tx: Some(tx),
            worker: Some(worker),
            frames: 0,
        })
    }

    fn join_worker(&mut self) -> anyhow::Result<()> {
        match self.worker.take() {
            Some(worker) => worker
                .join()
                .map_err(|_| anyhow!("编码线程异常退出"))?
                .map_err(|e| anyhow!(e)),
            None => Ok(()),
        }
    }
}

impl FrameSink for VideoEncoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, frame: &RgbImage) -> anyhow::Result<()> {
        if frame.dimensions() != (self.width, self.height) {
            bail!(
                "帧尺寸 {:?} 与输出尺寸 {}x{} 不一致",
                frame.dimensions(),
                self.width,
                self.height
            );
        }
        let tx = self.tx.as_ref().context("输出已关闭")?;
        if tx.send(frame.as_raw().clone()).is_err() {
            // 编码线程已退出, 取回它的错误
            self.tx.take();
            self.join_worker()?;
            bail!("编码线程已退出");
        }
        self.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        if self.tx.take().is_none() && self.worker.is_none() {
            return Ok(());
        }
        self.join_worker()
            .with_context(|| format!("输出视频 {} 未正常结束", self.name))?;
        info!("💾 输出视频完成: {} ({} 帧)", self.name, self.frames);
        Ok(())
    }
}

impl Drop for VideoEncoder {
    fn drop(&mut self) {
        self.tx.take();
        let _ = self.join_worker();
    }
}
