// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! YOLO 检测模型 (YOLOv8 / YOLO11 输出格式)
//!
//! 输入: [1, 3, S, S] RGB / 255, 等比缩放贴左上角, 其余填充灰色
//! 输出: [1, 4 + nc, N], 每列为 (cx, cy, w, h, 各类别分数)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{imageops, RgbImage};
use ndarray::{s, Array, Axis, IxDyn};
use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use tracing::{info, warn};

use crate::config::Device;
use crate::detection::{Detection, Detector, VideoFrame};
use crate::error::SentinelError;
use crate::non_max_suppression;

const CXYWH_OFFSET: usize = 4;
const PAD_VALUE: f32 = 144.0 / 255.0;

pub struct YoloDetector {
    session: Session,
    model_path: PathBuf,
    provider: &'static str,
    input_size: u32,
    conf: f32,
    iou: f32,
}

impl YoloDetector {
    /// 加载模型; `conf` 为解码阶段的最低分数, 类别/阈值过滤在流水线中完成
    pub fn new(
        model_path: &Path,
        device: Device,
        input_size: u32,
        conf: f32,
        iou: f32,
    ) -> crate::error::Result<Self> {
        if !model_path.exists() {
            return Err(SentinelError::Model {
                path: model_path.to_path_buf(),
                reason: "文件不存在".to_string(),
            });
        }
        let (session, provider) =
            build_session(model_path, device).map_err(|e| SentinelError::Model {
                path: model_path.to_path_buf(),
                reason: format!("{:#}", e),
            })?;
        info!("🧠 模型: {} | 使用设备: {}", model_path.display(), provider);

        Ok(Self {
            session,
            model_path: model_path.to_path_buf(),
            provider,
            input_size,
            conf,
            iou,
        })
    }

    pub fn provider(&self) -> &str {
        self.provider
    }

    fn ratio(&self, w0: f32, h0: f32) -> f32 {
        let size = self.input_size as f32;
        (size / w0).min(size / h0)
    }

    fn preprocess(&self, image: &RgbImage) -> Array<f32, IxDyn> {
        let size = self.input_size as usize;
        let mut xs = Array::from_elem((1, 3, size, size), PAD_VALUE).into_dyn();

        let (w0, h0) = image.dimensions();
        let r = self.ratio(w0 as f32, h0 as f32);
        let w_new = ((w0 as f32 * r).round() as u32).clamp(1, self.input_size);
        let h_new = ((h0 as f32 * r).round() as u32).clamp(1, self.input_size);
        let resized = imageops::resize(image, w_new, h_new, imageops::FilterType::Triangle);

        for (x, y, rgb) in resized.enumerate_pixels() {
            let x = x as usize;
            let y = y as usize;
            let [r, g, b] = rgb.0;
            xs[[0, 0, y, x]] = f32::from(r) / 255.0;
            xs[[0, 1, y, x]] = f32::from(g) / 255.0;
            xs[[0, 2, y, x]] = f32::from(b) / 255.0;
        }
        xs
    }

    fn postprocess(&self, preds: &Array<f32, IxDyn>, w0: f32, h0: f32) -> Result<Vec<Detection>> {
        anyhow::ensure!(
            preds.ndim() == 3 && preds.shape()[1] > CXYWH_OFFSET,
            "模型输出形状不支持: {:?}",
            preds.shape()
        );
        let ratio = self.ratio(w0, h0);
        let nc = preds.shape()[1] - CXYWH_OFFSET;

        let mut detections = Vec::new();
        let anchor = preds.index_axis(Axis(0), 0);
        for pred in anchor.axis_iter(Axis(1)) {
            let bbox = pred.slice(s![0..CXYWH_OFFSET]);
            let clss = pred.slice(s![CXYWH_OFFSET..CXYWH_OFFSET + nc]);

            let Some((class_id, &confidence)) = clss
                .iter()
                .enumerate()
                .reduce(|max, x| if x.1 > max.1 { x } else { max })
            else {
                continue;
            };
            if confidence < self.conf {
                continue;
            }

            let cx = bbox[0] / ratio;
            let cy = bbox[1] / ratio;
            let w = bbox[2] / ratio;
            let h = bbox[3] / ratio;
            let x = (cx - w / 2.0).clamp(0.0, w0);
            let y = (cy - h / 2.0).clamp(0.0, h0);
            detections.push(Detection::new(x, y, w, h, confidence, class_id));
        }

        non_max_suppression(&mut detections, self.iou);
        Ok(detections)
    }
}

/// 实际使用的执行设备
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Provider {
    Cuda,
    Cpu,
}

impl Provider {
    fn name(self) -> &'static str {
        match self {
            Provider::Cuda => "CUDA",
            Provider::Cpu => "CPU",
        }
    }
}

/// 按请求的设备和 CUDA 可用性决定执行设备
fn choose_provider(device: Device, cuda_available: bool) -> Provider {
    match device {
        Device::Cpu => Provider::Cpu,
        Device::Cuda | Device::Auto if cuda_available => Provider::Cuda,
        Device::Cuda | Device::Auto => Provider::Cpu,
    }
}

fn cpu_session(model_path: &Path) -> ort::Result<Session> {
    Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .commit_from_file(model_path)
}

/// CUDA 注册失败必须报错, 否则 ort 只打警告并静默回退到 CPU
fn cuda_session(model_path: &Path) -> ort::Result<Session> {
    Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_execution_providers([CUDAExecutionProvider::default().build().error_on_failure()])?
        .commit_from_file(model_path)
}

fn build_session(model_path: &Path, device: Device) -> Result<(Session, &'static str)> {
    let cuda_available = device != Device::Cpu
        && CUDAExecutionProvider::default()
            .is_available()
            .unwrap_or(false);
    if device == Device::Cuda && !cuda_available {
        warn!("⚠️ 请求了 CUDA 但当前环境不可用, 改用 CPU");
    }

    match choose_provider(device, cuda_available) {
        Provider::Cpu => Ok((cpu_session(model_path)?, Provider::Cpu.name())),
        Provider::Cuda => match cuda_session(model_path) {
            Ok(session) => Ok((session, Provider::Cuda.name())),
            Err(e) => {
                warn!("⚠️ CUDA 初始化失败, 改用 CPU: {}", e);
                Ok((cpu_session(model_path)?, Provider::Cpu.name()))
            }
        },
    }
}

impl Detector for YoloDetector {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Vec<Detection>> {
        let (w0, h0) = frame.image.dimensions();
        let input = Value::from_array(self.preprocess(&frame.image))?;
        let outputs = self.session.run(ort::inputs![input])?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("提取模型输出失败")?;
        let dims: Vec<usize> = shape.as_ref().iter().map(|&x| x as usize).collect();
        let preds = Array::from_shape_vec(IxDyn(&dims), data.to_vec())?;

        self.postprocess(&preds, w0 as f32, h0 as f32)
    }

    fn summary(&self) -> String {
        format!(
            "YOLO {} | {} | 输入 {}x{} | NMS IOU {:.2}",
            self.model_path.display(),
            self.provider,
            self.input_size,
            self.input_size,
            self.iou
        )
    }
}
