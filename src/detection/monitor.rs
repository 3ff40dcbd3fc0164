// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 区域进入监控 (Zone monitor)
//! 职责: 已确认轨迹 → 区域判定 → 台账 → 警报分发
//!
//! 只读取追踪器给出的轨迹, 不创建也不删除轨迹。未确认轨迹不参与判定。

use tracing::warn;

use super::ledger::ZoneLedger;
use super::tracker::TrackedObject;
use super::types::TrackId;
use super::zone::{centroid, Zone};
use crate::alert::{AlertDispatch, ZoneAlert};

/// 单条已确认轨迹的本帧状态
#[derive(Clone, Debug, PartialEq)]
pub struct TrackReport {
    pub id: TrackId,
    pub ltrb: [i32; 4],
    pub centroid: (i32, i32),
    pub in_zone: bool,
    /// 本帧触发了警报
    pub alerted_now: bool,
}

/// 单帧监控结果, 供标注使用
#[derive(Clone, Debug, PartialEq)]
pub struct FrameReport {
    pub frame_id: u64,
    pub zone: Zone,
    pub tracks: Vec<TrackReport>,
    pub new_alerts: Vec<TrackId>,
}

pub struct ZoneMonitor {
    zone: Zone,
    ledger: ZoneLedger,
    dispatcher: Box<dyn AlertDispatch>,
}

impl ZoneMonitor {
    pub fn new(zone: Zone, dispatcher: Box<dyn AlertDispatch>) -> Self {
        Self {
            zone,
            ledger: ZoneLedger::new(),
            dispatcher,
        }
    }

    /// 处理一帧的轨迹列表
    pub fn observe(&mut self, frame_id: u64, tracks: &[TrackedObject]) -> FrameReport {
        let mut reports = Vec::with_capacity(tracks.len());
        let mut new_alerts = Vec::new();

        for track in tracks.iter().filter(|t| t.is_confirmed()) {
            let ltrb = track.to_ltrb();
            let center = centroid(ltrb);
            let inside = self.zone.contains_point(center);

            // 先登记再分发: 警报失败也视为已使用
            let alerted_now = self.ledger.should_alert(track.id, inside);
            if alerted_now {
                warn!("⚠️ 警报! 人员 ID {} 进入出口区域 (帧 #{})", track.id, frame_id);
                self.dispatcher.dispatch(ZoneAlert::new(track.id, frame_id, center));
                new_alerts.push(track.id);
            }

            reports.push(TrackReport {
                id: track.id,
                ltrb,
                centroid: center,
                in_zone: inside,
                alerted_now,
            });
        }

        FrameReport {
            frame_id,
            zone: self.zone,
            tracks: reports,
            new_alerts,
        }
    }

    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    pub fn ledger(&self) -> &ZoneLedger {
        &self.ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::tracker::TrackState;
    use crate::detection::types::BBox;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<ZoneAlert>>,
    }

    impl Recording {
        fn ids(&self) -> Vec<TrackId> {
            self.calls.lock().unwrap().iter().map(|a| a.track_id).collect()
        }
    }

    impl AlertDispatch for Recording {
        fn dispatch(&self, alert: ZoneAlert) {
            self.calls.lock().unwrap().push(alert);
        }
    }

    /// 分发时阻塞并失败的实现, 用来验证调用方不受影响
    struct SlowFailing;

    impl AlertDispatch for SlowFailing {
        fn dispatch(&self, alert: ZoneAlert) {
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(300));
                panic!("playback device missing for {}", alert.track_id);
            });
        }
    }

    fn track(id: TrackId, ltrb: [f32; 4], state: TrackState) -> TrackedObject {
        TrackedObject {
            id,
            bbox: BBox {
                x1: ltrb[0],
                y1: ltrb[1],
                x2: ltrb[2],
                y2: ltrb[3],
                confidence: 0.9,
                class_id: 0,
            },
            state,
            hits: 3,
            frames_lost: 0,
        }
    }

    fn confirmed(id: TrackId, ltrb: [f32; 4]) -> TrackedObject {
        track(id, ltrb, TrackState::Confirmed)
    }

    fn monitor(zone: Zone) -> (ZoneMonitor, Arc<Recording>) {
        let recording = Arc::new(Recording::default());
        (ZoneMonitor::new(zone, Box::new(recording.clone())), recording)
    }

    const INSIDE: [f32; 4] = [60.0, 60.0, 70.0, 70.0];
    const OUTSIDE: [f32; 4] = [0.0, 0.0, 10.0, 10.0];

    #[test]
    fn test_scenario_single_alert_for_lifetime() {
        let zone = Zone::from_frame(100, 100, &Default::default());
        assert_eq!(zone, Zone::new(40, 40, 95, 95));
        let (mut monitor, recording) = monitor(zone);

        let report = monitor.observe(1, &[confirmed(5, INSIDE)]);
        assert_eq!(report.new_alerts, vec![5]);
        assert_eq!(report.tracks[0].centroid, (65, 65));
        assert_eq!(monitor.ledger().ids(), vec![5]);
        assert_eq!(recording.ids(), vec![5]);

        let report = monitor.observe(2, &[confirmed(5, INSIDE)]);
        assert!(report.new_alerts.is_empty());
        assert!(report.tracks[0].in_zone);

        let report = monitor.observe(3, &[confirmed(5, OUTSIDE)]);
        assert!(!report.tracks[0].in_zone);

        let report = monitor.observe(4, &[confirmed(5, INSIDE)]);
        assert!(report.new_alerts.is_empty());

        assert_eq!(recording.ids(), vec![5]);
        assert_eq!(monitor.ledger().ids(), vec![5]);
        assert_eq!(recording.calls.lock().unwrap()[0].frame_id, 1);
    }

    #[test]
    fn test_edge_triggered_over_dwell() {
        let (mut monitor, recording) = monitor(Zone::new(10, 10, 90, 90));
        for frame in 1..=10 {
            monitor.observe(frame, &[confirmed(1, [40.0, 40.0, 60.0, 60.0])]);
        }
        assert_eq!(recording.ids(), vec![1]);
    }

    #[test]
    fn test_no_realert_on_reentry() {
        let (mut monitor, recording) = monitor(Zone::new(10, 10, 90, 90));
        monitor.observe(1, &[confirmed(1, [40.0, 40.0, 60.0, 60.0])]);
        monitor.observe(2, &[confirmed(1, OUTSIDE)]);
        monitor.observe(3, &[confirmed(1, [40.0, 40.0, 60.0, 60.0])]);
        assert_eq!(recording.ids(), vec![1]);
    }

    #[test]
    fn test_independent_identities() {
        let (mut monitor, recording) = monitor(Zone::new(10, 10, 90, 90));
        let both = [
            confirmed(1, [20.0, 20.0, 40.0, 40.0]),
            confirmed(2, [50.0, 50.0, 70.0, 70.0]),
        ];
        let report = monitor.observe(1, &both);
        assert_eq!(report.new_alerts, vec![1, 2]);
        assert_eq!(recording.ids(), vec![1, 2]);
        assert_eq!(monitor.ledger().ids(), vec![1, 2]);
    }

    #[test]
    fn test_tentative_tracks_are_ignored() {
        let (mut monitor, recording) = monitor(Zone::new(10, 10, 90, 90));
        for frame in 1..=5 {
            let tentative = track(7, [40.0, 40.0, 60.0, 60.0], TrackState::Tentative);
            let report = monitor.observe(frame, &[tentative]);
            assert!(report.tracks.is_empty());
        }
        assert!(recording.ids().is_empty());
        assert!(monitor.ledger().is_empty());
    }

    #[test]
    fn test_slow_failing_dispatch_does_not_stall_frames() {
        let mut monitor = ZoneMonitor::new(Zone::new(10, 10, 90, 90), Box::new(SlowFailing));
        let start = Instant::now();
        monitor.observe(1, &[confirmed(3, [40.0, 40.0, 60.0, 60.0])]);
        let report = monitor.observe(2, &[confirmed(4, [40.0, 40.0, 60.0, 60.0])]);
        assert!(start.elapsed() < Duration::from_millis(200));
        assert_eq!(report.new_alerts, vec![4]);
        assert!(monitor.ledger().contains(3));
        assert!(monitor.ledger().contains(4));
    }

    #[test]
    fn test_boundary_centroid_is_outside() {
        let (mut monitor, recording) = monitor(Zone::new(10, 10, 90, 90));
        // 中心点 (10, 50) 正好落在左边界
        let report = monitor.observe(1, &[confirmed(1, [5.0, 45.0, 15.0, 55.0])]);
        assert_eq!(report.tracks[0].centroid, (10, 50));
        assert!(!report.tracks[0].in_zone);
        assert!(recording.ids().is_empty());
    }
}
