// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测系统 (Detection System)
///
/// - Detector: 目标检测接口与过滤
/// - Tracker:  目标追踪 (ByteTrack)
/// - Zone:     关注区域几何判定
/// - Ledger:   区域警报台账
/// - Monitor:  逐帧区域进入状态机
pub mod bytetrack;
pub mod detector;
pub mod ledger;
pub mod monitor;
pub mod tracker;
pub mod types;
pub mod zone;

pub use bytetrack::{ByteTrackConfig, ByteTracker};
pub use detector::{filter_detections, Detector};
pub use ledger::ZoneLedger;
pub use monitor::{FrameReport, TrackReport, ZoneMonitor};
pub use tracker::{TrackState, TrackedObject, Tracker};
pub use types::{BBox, Detection, TrackId, VideoFrame};
pub use zone::{centroid, in_zone, Zone, ZoneFractions};
