// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 区域警报台账 (Zone membership ledger)
//!
//! 记录已经触发过警报的跟踪ID。只增不减: 同一ID离开后再次进入不会重复报警。

use std::collections::HashSet;

use super::types::TrackId;

#[derive(Debug, Default, Clone)]
pub struct ZoneLedger {
    alerted: HashSet<TrackId>,
}

impl ZoneLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 边沿触发判定: 仅在首次进入区域时返回 true, 并在同一次调用中登记该ID
    pub fn should_alert(&mut self, track_id: TrackId, currently_in_zone: bool) -> bool {
        if !currently_in_zone {
            return false;
        }
        self.alerted.insert(track_id)
    }

    pub fn contains(&self, track_id: TrackId) -> bool {
        self.alerted.contains(&track_id)
    }

    pub fn len(&self) -> usize {
        self.alerted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerted.is_empty()
    }

    /// 按ID排序的已报警列表
    pub fn ids(&self) -> Vec<TrackId> {
        let mut ids: Vec<TrackId> = self.alerted.iter().copied().collect();
        ids.sort_unstable();
        ids
    }
}
