// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 检测器接口 (Detector)
//! 职责: 单帧 → 原始检测框; 再按目标类别和置信度过滤

use anyhow::Result;

use super::types::{Detection, VideoFrame};

/// 目标检测器 Trait
///
/// 实现只需保证: 输入一帧, 输出该帧的全部原始检测 (像素坐标, 置信度, 类别)。
pub trait Detector {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Vec<Detection>>;

    /// 打印检测器信息
    fn summary(&self) -> String {
        String::from("detector")
    }
}

/// 检测过滤: 仅保留目标类别且置信度严格大于阈值的检测
pub fn filter_detections(
    raw: Vec<Detection>,
    target_class: usize,
    threshold: f32,
) -> Vec<Detection> {
    raw.into_iter()
        .filter(|d| d.class_id == target_class && d.confidence > threshold)
        .collect()
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Vec<Detection>> {
        (**self).detect(frame)
    }

    fn summary(&self) -> String {
        (**self).summary()
    }
}
