// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测系统数据结构定义
/// Data structures for the zone detection system
use image::RgbImage;

// ========== 公共常量 ==========

/// COCO 类别: 0 = person
pub const PERSON_CLASS_ID: usize = 0;

/// 人员检测置信度阈值 (严格大于)
pub const DEFAULT_CONF_THRESHOLD: f32 = 0.4;

/// 跟踪ID
pub type TrackId = u32;

// ========== 数据结构 ==========

/// 原始检测 (检测器 → 跟踪器), 像素坐标 xywh
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    pub class_id: usize,
}

impl Detection {
    pub fn new(x: f32, y: f32, width: f32, height: f32, confidence: f32, class_id: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence,
            class_id,
        }
    }

    /// 由 (left, top, right, bottom) 构建
    pub fn from_ltrb(l: f32, t: f32, r: f32, b: f32, confidence: f32, class_id: usize) -> Self {
        Self::new(l, t, r - l, b - t, confidence, class_id)
    }

    pub fn to_bbox(&self) -> BBox {
        BBox {
            x1: self.x,
            y1: self.y,
            x2: self.x + self.width,
            y2: self.y + self.height,
            confidence: self.confidence,
            class_id: self.class_id,
        }
    }
}

/// 边界框 (left, top, right, bottom)
#[derive(Clone, Debug, PartialEq)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: usize,
}

impl BBox {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// 像素整数坐标 (向零截断)
    pub fn to_ltrb(&self) -> [i32; 4] {
        [
            self.x1 as i32,
            self.y1 as i32,
            self.x2 as i32,
            self.y2 as i32,
        ]
    }
}

/// 已解码帧 (解码线程 → 主循环)
#[derive(Clone, Debug)]
pub struct VideoFrame {
    pub frame_id: u64, // 帧序号, 从1开始
    pub image: RgbImage,
}

impl VideoFrame {
    pub fn new(frame_id: u64, image: RgbImage) -> Self {
        Self { frame_id, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
