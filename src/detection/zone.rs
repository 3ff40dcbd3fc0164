// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 关注区域 (Zone of interest)
//!
//! 视频开始时根据帧尺寸计算一次, 整个视频流期间不变。
//! 判定规则: 目标框中心点严格位于矩形内部 (落在边界上不算进入)。

use serde::{Deserialize, Serialize};

/// 区域相对帧尺寸的比例
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZoneFractions {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Default for ZoneFractions {
    fn default() -> Self {
        Self {
            x1: 0.4,
            y1: 0.4,
            x2: 0.95,
            y2: 0.95,
        }
    }
}

impl ZoneFractions {
    pub fn validate(&self) -> Result<(), String> {
        let in_range = |v: f64| (0.0..=1.0).contains(&v);
        if ![self.x1, self.y1, self.x2, self.y2].into_iter().all(in_range) {
            return Err(format!("区域比例必须位于 [0, 1]: {:?}", self));
        }
        if self.x1 >= self.x2 || self.y1 >= self.y2 {
            return Err(format!("区域左上角必须小于右下角: {:?}", self));
        }
        Ok(())
    }
}

/// 轴对齐矩形区域 (像素坐标)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Zone {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Zone {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// 由帧尺寸和比例计算区域 (向零截断)
    pub fn from_frame(width: u32, height: u32, fractions: &ZoneFractions) -> Self {
        let w = f64::from(width);
        let h = f64::from(height);
        Self {
            x1: (w * fractions.x1) as i32,
            y1: (h * fractions.y1) as i32,
            x2: (w * fractions.x2) as i32,
            y2: (h * fractions.y2) as i32,
        }
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    /// 严格内部判定
    pub fn contains_point(&self, (cx, cy): (i32, i32)) -> bool {
        self.x1 < cx && cx < self.x2 && self.y1 < cy && cy < self.y2
    }
}

/// 框中心点, 整除向下取整
pub fn centroid(ltrb: [i32; 4]) -> (i32, i32) {
    let [l, t, r, b] = ltrb;
    (l + (r - l).div_euclid(2), t + (b - t).div_euclid(2))
}

/// 目标框 (left, top, right, bottom) 的中心点是否在区域内
pub fn in_zone(ltrb: [i32; 4], zone: &Zone) -> bool {
    zone.contains_point(centroid(ltrb))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 以给定中心点构造 2x2 框
    fn box_at(cx: i32, cy: i32) -> [i32; 4] {
        [cx - 1, cy - 1, cx + 1, cy + 1]
    }

    #[test]
    fn test_boundary_is_outside() {
        let zone = Zone::new(10, 10, 90, 90);
        assert!(!in_zone(box_at(10, 50), &zone));
        assert!(!in_zone(box_at(90, 50), &zone));
        assert!(!in_zone(box_at(50, 10), &zone));
        assert!(!in_zone(box_at(50, 90), &zone));
        assert!(in_zone(box_at(50, 50), &zone));
    }

    #[test]
    fn test_just_inside_boundary() {
        let zone = Zone::new(10, 10, 90, 90);
        assert!(in_zone(box_at(11, 11), &zone));
        assert!(in_zone(box_at(89, 89), &zone));
    }

    #[test]
    fn test_centroid_floors_odd_extent() {
        // (60 + 11/2) → 65
        assert_eq!(centroid([60, 60, 71, 71]), (65, 65));
        assert_eq!(centroid([0, 0, 10, 10]), (5, 5));
        // 负坐标向下取整
        assert_eq!(centroid([-3, -3, 0, 0]), (-2, -2));
    }

    #[test]
    fn test_zone_from_frame() {
        let zone = Zone::from_frame(100, 100, &ZoneFractions::default());
        assert_eq!(zone, Zone::new(40, 40, 95, 95));

        let zone = Zone::from_frame(1920, 1080, &ZoneFractions::default());
        assert_eq!(zone, Zone::new(768, 432, 1824, 1026));
        assert_eq!(zone.width(), 1056);
    }

    #[test]
    fn test_fractions_validate() {
        assert!(ZoneFractions::default().validate().is_ok());
        let inverted = ZoneFractions {
            x1: 0.9,
            ..ZoneFractions::default()
        };
        assert!(inverted.validate().is_err());
        let out_of_range = ZoneFractions {
            y2: 1.5,
            ..ZoneFractions::default()
        };
        assert!(out_of_range.validate().is_err());
    }
}
