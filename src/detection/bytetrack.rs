// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! ByteTrack 算法实现 (单轮 IOU 关联)
//! ByteTrack: Simple and effective multi-object tracking
//!
//! 核心思想:
//! 1. 所有轨迹先用卡尔曼滤波预测
//! 2. 已过滤的检测框与全部轨迹按 IOU 贪心匹配
//! 3. 新轨迹连续命中 `n_init` 帧后才确认; 未确认轨迹一旦丢失立即删除
//! 4. 已确认轨迹丢失超过 `max_age` 帧后删除
//!
//! 检测的类别/置信度筛选由调用方完成, 追踪器不再按分数分组。

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tracker::{
    compute_iou, KalmanBoxFilter, KalmanParams, TrackState, TrackedObject, Tracker,
};
use super::types::{Detection, TrackId, VideoFrame};

/// ByteTrack 参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ByteTrackConfig {
    /// 确认轨迹所需的连续命中帧数
    pub n_init: u32,
    /// 已确认轨迹最大允许丢失帧数
    pub max_age: u32,
    /// 匹配 IOU 阈值
    pub iou_threshold: f32,
    /// 卡尔曼观测噪声
    pub kalman_obs_noise: f32,
    /// 卡尔曼过程噪声
    pub kalman_process_noise: f32,
}

impl Default for ByteTrackConfig {
    fn default() -> Self {
        Self {
            n_init: 3,
            max_age: 30,
            iou_threshold: 0.3,
            kalman_obs_noise: 0.5,
            kalman_process_noise: 0.1,
        }
    }
}

/// 内部轨迹: 对外快照 + 卡尔曼滤波器
#[derive(Clone, Debug)]
struct ByteTrack {
    object: TrackedObject,
    kalman: KalmanBoxFilter,
}

impl ByteTrack {
    fn new(id: TrackId, det: &Detection, params: KalmanParams, n_init: u32) -> Self {
        let bbox = det.to_bbox();
        let kalman = KalmanBoxFilter::new(&bbox, params);
        let state = if n_init <= 1 {
            TrackState::Confirmed
        } else {
            TrackState::Tentative
        };
        Self {
            object: TrackedObject {
                id,
                bbox: kalman.state_bbox(det.confidence, det.class_id),
                state,
                hits: 1,
                frames_lost: 0,
            },
            kalman,
        }
    }

    fn predict(&mut self) {
        self.kalman.predict();
        self.object.bbox = self
            .kalman
            .state_bbox(self.object.bbox.confidence, self.object.bbox.class_id);
    }

    fn update(&mut self, det: &Detection, n_init: u32) {
        self.kalman.update(&det.to_bbox());
        self.object.bbox = self.kalman.state_bbox(det.confidence, det.class_id);
        self.object.frames_lost = 0;
        self.object.hits += 1;
        if self.object.state == TrackState::Tentative && self.object.hits >= n_init {
            self.object.state = TrackState::Confirmed;
            debug!("✅ 轨迹确认: ID {}", self.object.id);
        }
    }

    fn mark_lost(&mut self) {
        self.object.frames_lost += 1;
        self.object.hits = 0;
    }
}

/// ByteTrack 追踪器
pub struct ByteTracker {
    config: ByteTrackConfig,
    kalman_params: KalmanParams,
    tracks: Vec<ByteTrack>,
    /// 对外快照, 每帧重建
    snapshot: Vec<TrackedObject>,
    /// 下一个分配的ID
    next_id: TrackId,
}

impl ByteTracker {
    pub fn new(config: ByteTrackConfig) -> Self {
        let kalman_params = KalmanParams {
            process_noise: config.kalman_process_noise,
            observation_noise: config.kalman_obs_noise,
            ..KalmanParams::default()
        };
        Self {
            config,
            kalman_params,
            tracks: Vec::new(),
            snapshot: Vec::new(),
            next_id: 1,
        }
    }

    /// IOU 贪心匹配, 返回 (检测索引, 轨迹索引)
    fn match_detections_to_tracks(&self, detections: &[Detection]) -> Vec<(usize, usize)> {
        if detections.is_empty() || self.tracks.is_empty() {
            return Vec::new();
        }

        let mut candidates = Vec::new();
        for (det_idx, det) in detections.iter().enumerate() {
            let det_box = det.to_bbox();
            for (track_idx, track) in self.tracks.iter().enumerate() {
                let iou = compute_iou(&det_box, &track.object.bbox);
                if iou >= self.config.iou_threshold {
                    candidates.push((iou, det_idx, track_idx));
                }
            }
        }

        // IOU 从高到低
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut used_det = vec![false; detections.len()];
        let mut used_track = vec![false; self.tracks.len()];
        let mut assignments = Vec::new();
        for (_, det_idx, track_idx) in candidates {
            if !used_det[det_idx] && !used_track[track_idx] {
                used_det[det_idx] = true;
                used_track[track_idx] = true;
                assignments.push((det_idx, track_idx));
            }
        }
        assignments
    }
}

impl Default for ByteTracker {
    fn default() -> Self {
        Self::new(ByteTrackConfig::default())
    }
}

impl Tracker for ByteTracker {
    fn update(&mut self, detections: &[Detection], _frame: &VideoFrame) -> &[TrackedObject] {
        // 1. 所有轨迹先预测
        for track in &mut self.tracks {
            track.predict();
        }

        // 2. 单轮 IOU 匹配
        let mut det_matched = vec![false; detections.len()];
        let mut track_matched = vec![false; self.tracks.len()];
        for (det_idx, track_idx) in self.match_detections_to_tracks(detections) {
            det_matched[det_idx] = true;
            track_matched[track_idx] = true;
            self.tracks[track_idx].update(&detections[det_idx], self.config.n_init);
        }

        // 3. 未匹配的轨迹 → 标记丢失
        for (track, matched) in self.tracks.iter_mut().zip(&track_matched) {
            if !matched {
                track.mark_lost();
            }
        }

        // 4. 删除: 丢失的未确认轨迹 + 丢失太久的已确认轨迹
        let max_age = self.config.max_age;
        self.tracks.retain(|t| match t.object.state {
            TrackState::Tentative => t.object.frames_lost == 0,
            TrackState::Confirmed => t.object.frames_lost <= max_age,
        });

        // 5. 未匹配的检测 → 新建轨迹
        for (det, matched) in detections.iter().zip(&det_matched) {
            if !matched {
                let track =
                    ByteTrack::new(self.next_id, det, self.kalman_params, self.config.n_init);
                self.tracks.push(track);
                self.next_id += 1;
            }
        }

        self.snapshot = self.tracks.iter().map(|t| t.object.clone()).collect();
        &self.snapshot
    }

    fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// 获取跟踪统计信息
    fn stats(&self) -> String {
        let confirmed = self
            .tracks
            .iter()
            .filter(|t| t.object.is_confirmed())
            .count();
        format!(
            "跟踪: {} 条 (已确认 {}) | 总ID: {}",
            self.tracks.len(),
            confirmed,
            self.next_id - 1
        )
    }
}
