// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 多目标跟踪公共组件
//! Common components for multi-object tracking
//!
//! 区域警报只读取跟踪结果 (ID / 确认状态 / 当前框), 不创建也不销毁轨迹。

use super::types::{BBox, Detection, TrackId, VideoFrame};

// ========== 轨迹 ==========

/// 轨迹生命周期
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TrackState {
    /// 新建轨迹, 尚未达到确认帧数
    #[default]
    Tentative,
    /// 已确认, 可以参与区域判定
    Confirmed,
}

/// 跟踪对象 (统一的跟踪结果)
#[derive(Clone, Debug)]
pub struct TrackedObject {
    /// 唯一跟踪ID
    pub id: TrackId,

    /// 当前边界框 (滤波平滑后)
    pub bbox: BBox,

    pub state: TrackState,

    /// 连续匹配成功的帧数
    pub hits: u32,

    /// 连续丢失帧数
    pub frames_lost: u32,
}

impl TrackedObject {
    pub fn is_confirmed(&self) -> bool {
        self.state == TrackState::Confirmed
    }

    /// 当前框 (left, top, right, bottom) 像素坐标
    pub fn to_ltrb(&self) -> [i32; 4] {
        self.bbox.to_ltrb()
    }
}

// ========== 卡尔曼滤波器 ==========

/// 卡尔曼参数
#[derive(Clone, Copy, Debug)]
pub struct KalmanParams {
    /// 过程噪声 (0.1-1.0, 越小越平滑)
    pub process_noise: f32,
    /// 观测噪声 (越大越平滑)
    pub observation_noise: f32,
    /// 每帧速度保留比例
    pub velocity_decay: f32,
    /// 静止阈值 (像素/帧)
    pub stationary_threshold: f32,
}

impl Default for KalmanParams {
    fn default() -> Self {
        Self {
            process_noise: 0.1,
            observation_noise: 0.5,
            velocity_decay: 0.95,
            stationary_threshold: 2.0,
        }
    }
}

/// 中心点+尺寸的匀速模型, 协方差简化为对角阵
#[derive(Clone, Copy, Debug, Default)]
struct BoxState {
    cx: f32,
    cy: f32,
    w: f32,
    h: f32,
}

impl BoxState {
    fn from_bbox(bbox: &BBox) -> Self {
        Self {
            cx: (bbox.x1 + bbox.x2) / 2.0,
            cy: (bbox.y1 + bbox.y2) / 2.0,
            w: bbox.width(),
            h: bbox.height(),
        }
    }

    fn to_bbox(self, confidence: f32, class_id: usize) -> BBox {
        let w = self.w.max(1.0);
        let h = self.h.max(1.0);
        BBox {
            x1: self.cx - w / 2.0,
            y1: self.cy - h / 2.0,
            x2: self.cx + w / 2.0,
            y2: self.cy + h / 2.0,
            confidence,
            class_id,
        }
    }
}

#[derive(Clone, Debug)]
pub struct KalmanBoxFilter {
    pos: BoxState,
    vel: BoxState,
    /// [位置4项, 速度4项] 的方差
    p: [f32; 8],
    params: KalmanParams,
    stationary_count: u32,
}

impl KalmanBoxFilter {
    pub fn new(bbox: &BBox, params: KalmanParams) -> Self {
        Self {
            pos: BoxState::from_bbox(bbox),
            vel: BoxState::default(),
            p: [10.0; 8],
            params,
            stationary_count: 0,
        }
    }

    /// 预测下一帧 (匀速模型 + 速度衰减, 静止目标衰减更强)
    pub fn predict(&mut self) {
        let speed = self.vel.cx.hypot(self.vel.cy);
        let stationary = speed < self.params.stationary_threshold;

        let (pos_decay, size_decay) = if stationary {
            self.stationary_count += 1;
            let d = if self.stationary_count > 3 {
                0.7
            } else {
                self.params.velocity_decay
            };
            (d, d)
        } else {
            self.stationary_count = 0;
            (self.params.velocity_decay, 0.98)
        };

        self.vel.cx *= pos_decay;
        self.vel.cy *= pos_decay;
        self.vel.w *= size_decay;
        self.vel.h *= size_decay;

        self.pos.cx += self.vel.cx;
        self.pos.cy += self.vel.cy;
        self.pos.w += self.vel.w;
        self.pos.h += self.vel.h;

        let q = self.params.process_noise * if stationary { 0.5 } else { 1.0 };
        self.p.iter_mut().for_each(|p| *p += q);
    }

    /// 融合观测, 按残差大小自适应调整观测噪声
    pub fn update(&mut self, bbox: &BBox) {
        let obs = BoxState::from_bbox(bbox);
        let residual = [
            obs.cx - self.pos.cx,
            obs.cy - self.pos.cy,
            obs.w - self.pos.w,
            obs.h - self.pos.h,
        ];

        let residual_norm = residual[0].hypot(residual[1]);
        let small_move = residual_norm < self.params.stationary_threshold;
        let r = if small_move {
            self.params.observation_noise * 0.3
        } else if residual_norm < 10.0 {
            self.params.observation_noise
        } else {
            self.params.observation_noise * 3.0
        };

        let mut gain = [0.0f32; 8];
        for i in 0..8 {
            let noise = if i < 4 { r } else { r * 10.0 };
            gain[i] = self.p[i] / (self.p[i] + noise);
        }

        self.pos.cx += gain[0] * residual[0];
        self.pos.cy += gain[1] * residual[1];
        self.pos.w += gain[2] * residual[2];
        self.pos.h += gain[3] * residual[3];

        let velocity_gain = if small_move { 0.3 } else { 1.0 };
        self.vel.cx += gain[4] * residual[0] * velocity_gain;
        self.vel.cy += gain[5] * residual[1] * velocity_gain;
        self.vel.w += gain[6] * residual[2] * velocity_gain;
        self.vel.h += gain[7] * residual[3] * velocity_gain;

        for (p, k) in self.p.iter_mut().zip(gain) {
            *p *= 1.0 - k;
        }

        if !small_move {
            self.stationary_count = 0;
        }
    }

    /// 当前状态的边界框
    pub fn state_bbox(&self, confidence: f32, class_id: usize) -> BBox {
        self.pos.to_bbox(confidence, class_id)
    }
}

// ========== 跟踪器统一接口 ==========

/// 多目标跟踪器 Trait
///
/// 每帧以完整的检测集合调用一次; 轨迹的创建、确认与删除完全由实现负责。
pub trait Tracker {
    /// 更新跟踪器, 返回当前所有轨迹 (包括未确认的)
    fn update(&mut self, detections: &[Detection], frame: &VideoFrame) -> &[TrackedObject];

    /// 获取当前跟踪数量
    fn track_count(&self) -> usize;

    /// 进度日志中的统计信息
    fn stats(&self) -> String {
        format!("跟踪: {} 条", self.track_count())
    }
}

// ========== 工具函数 ==========

/// 计算两个边界框的IOU (Intersection over Union)
pub fn compute_iou(a: &BBox, b: &BBox) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let intersection = (x2 - x1) * (y2 - y1);
    let union = a.area() + b.area() - intersection;
    if union <= 0.0 {
        return 0.0;
    }
    intersection / union
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x1: f32, y1: f32, x2: f32, y2: f32) -> BBox {
        BBox {
            x1,
            y1,
            x2,
            y2,
            confidence: 1.0,
            class_id: 0,
        }
    }

    #[test]
    fn test_iou() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        assert_eq!(compute_iou(&a, &a), 1.0);
        assert_eq!(compute_iou(&a, &bbox(20.0, 20.0, 30.0, 30.0)), 0.0);
        let half = compute_iou(&a, &bbox(5.0, 0.0, 15.0, 10.0));
        assert!((half - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_kalman_static_box_is_stable() {
        let b = bbox(60.0, 60.0, 70.0, 70.0);
        let mut kf = KalmanBoxFilter::new(&b, KalmanParams::default());
        for _ in 0..20 {
            kf.predict();
            kf.update(&b);
        }
        let s = kf.state_bbox(1.0, 0);
        assert!((s.x1 - 60.0).abs() < 0.5);
        assert!((s.y2 - 70.0).abs() < 0.5);
    }

    #[test]
    fn test_kalman_follows_moving_box() {
        let mut kf = KalmanBoxFilter::new(&bbox(0.0, 0.0, 10.0, 10.0), KalmanParams::default());
        for step in 1..=30 {
            let dx = step as f32 * 5.0;
            kf.predict();
            kf.update(&bbox(dx, 0.0, dx + 10.0, 10.0));
        }
        let s = kf.state_bbox(1.0, 0);
        assert!((s.x1 - 150.0).abs() < 10.0, "x1 = {}", s.x1);
    }

    /// 只实现必需方法的追踪器, 使用默认统计
    struct Echo(Vec<TrackedObject>);

    impl Tracker for Echo {
        fn update(&mut self, _detections: &[Detection], _frame: &VideoFrame) -> &[TrackedObject] {
            &self.0
        }

        fn track_count(&self) -> usize {
            self.0.len()
        }
    }

    #[test]
    fn test_default_stats_reports_track_count() {
        let track = TrackedObject {
            id: 7,
            bbox: bbox(0.0, 0.0, 10.0, 10.0),
            state: TrackState::Tentative,
            hits: 1,
            frames_lost: 0,
        };
        let tracker = Echo(vec![track.clone(), TrackedObject { id: 8, ..track }]);
        assert_eq!(tracker.stats(), "跟踪: 2 条");
    }
}
