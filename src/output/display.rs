// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 预览窗口 (macroquad)
//! 窗口运行在主线程, 流水线通过 try_send 投递最新帧; 按 q 请求停止。

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use image::RgbImage;
use macroquad::prelude::*;
use tracing::info;

use super::FrameSink;
use crate::pipeline::StopSignal;

/// 窗口帧通道容量, 满时丢弃新帧
const DISPLAY_QUEUE: usize = 2;

pub struct DisplaySink {
    tx: Sender<RgbImage>,
    skipped: u64,
}

impl DisplaySink {
    /// 创建窗口输出及其接收端, 接收端交给 `run_window`
    pub fn channel() -> (Self, Receiver<RgbImage>) {
        let (tx, rx) = crossbeam_channel::bounded(DISPLAY_QUEUE);
        (Self { tx, skipped: 0 }, rx)
    }
}

impl FrameSink for DisplaySink {
    fn name(&self) -> &str {
        "display"
    }

    fn write(&mut self, frame: &RgbImage) -> anyhow::Result<()> {
        match self.tx.try_send(frame.clone()) {
            Ok(()) => Ok(()),
            // 窗口刷新慢时跳过显示, 处理不受影响
            Err(TrySendError::Full(_)) => {
                self.skipped += 1;
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => anyhow::bail!("预览窗口已关闭"),
        }
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        info!("🖥️ 预览结束 (跳过显示 {} 帧)", self.skipped);
        Ok(())
    }
}

fn to_rgba(frame: &RgbImage) -> Vec<u8> {
    frame
        .pixels()
        .flat_map(|p| [p.0[0], p.0[1], p.0[2], 255])
        .collect()
}

/// 在当前 (主) 线程运行预览窗口, 直到按 q、关闭或流水线结束
pub fn run_window(title: &str, frames: Receiver<RgbImage>, stop: StopSignal) {
    let conf = Conf {
        window_title: title.to_string(),
        window_width: 1280,
        window_height: 720,
        ..Default::default()
    };

    macroquad::Window::from_config(conf, async move {
        let mut texture: Option<Texture2D> = None;
        loop {
            if is_key_pressed(KeyCode::Q) {
                info!("⏹️ 按下 q, 请求停止");
                stop.request_stop();
                break;
            }

            // 只保留最新一帧
            let mut latest = None;
            let mut finished = false;
            loop {
                match frames.try_recv() {
                    Ok(frame) => latest = Some(frame),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        finished = true;
                        break;
                    }
                }
            }
            if finished && latest.is_none() {
                break;
            }

            if let Some(frame) = latest {
                let (w, h) = frame.dimensions();
                let bytes = to_rgba(&frame);
                let rebuild = texture
                    .as_ref()
                    .map_or(true, |t| t.width() != w as f32 || t.height() != h as f32);
                if rebuild {
                    let t = Texture2D::from_rgba8(w as u16, h as u16, &bytes);
                    t.set_filter(FilterMode::Linear);
                    texture = Some(t);
                } else if let Some(t) = &texture {
                    t.update(&Image {
                        bytes,
                        width: w as u16,
                        height: h as u16,
                    });
                }
            }

            clear_background(BLACK);
            if let Some(t) = &texture {
                draw_texture_ex(
                    t,
                    0.0,
                    0.0,
                    WHITE,
                    DrawTextureParams {
                        dest_size: Some(vec2(screen_width(), screen_height())),
                        ..Default::default()
                    },
                );
            }
            next_frame().await;
        }
    });
}
