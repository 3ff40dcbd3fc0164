// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 帧标注
//! 红色: 出口区域及标签; 绿色: 已确认人员框及 ID

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::{info, warn};

use crate::detection::FrameReport;

const ZONE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LABEL_TEXT: Rgb<u8> = Rgb([255, 255, 255]);
const ZONE_LABEL: &str = "EXIT ZONE";

pub struct Annotator {
    font: Option<FontArc>,
    scale: PxScale,
    zone_thickness: i32,
    box_thickness: i32,
}

impl Default for Annotator {
    fn default() -> Self {
        Self {
            font: None,
            scale: PxScale::from(20.0),
            zone_thickness: 3,
            box_thickness: 2,
        }
    }
}

impl Annotator {
    /// 加载字体; 失败时只画框不画文字
    pub fn with_font_file(path: &Path) -> Self {
        let font = match std::fs::read(path) {
            Ok(bytes) => match FontArc::try_from_vec(bytes) {
                Ok(font) => {
                    info!("🔤 标注字体: {}", path.display());
                    Some(font)
                }
                Err(e) => {
                    warn!("⚠️ 字体无效 {}: {}, 标签将不显示", path.display(), e);
                    None
                }
            },
            Err(e) => {
                warn!("⚠️ 字体加载失败 {}: {}, 标签将不显示", path.display(), e);
                None
            }
        };
        Self {
            font,
            ..Self::default()
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// 在帧副本上绘制区域和所有已确认轨迹
    pub fn annotate(&self, image: &RgbImage, report: &FrameReport) -> RgbImage {
        let mut canvas = image.clone();

        let zone = report.zone;
        draw_thick_rect(
            &mut canvas,
            [zone.x1, zone.y1, zone.x2, zone.y2],
            self.zone_thickness,
            ZONE_COLOR,
        );
        self.draw_label(&mut canvas, zone.x1, zone.y1, ZONE_LABEL, ZONE_COLOR);

        for track in &report.tracks {
            let [l, t, ..] = track.ltrb;
            draw_thick_rect(&mut canvas, track.ltrb, self.box_thickness, BOX_COLOR);
            self.draw_label(&mut canvas, l, t, &format!("Person ID {}", track.id), BOX_COLOR);
        }

        canvas
    }

    /// 标签画在 (x, y) 上方, 贴顶时画在框内
    fn draw_label(&self, canvas: &mut RgbImage, x: i32, y: i32, text: &str, background: Rgb<u8>) {
        let Some(font) = &self.font else {
            return;
        };
        let (tw, th) = text_size(self.scale, font, text);
        if tw == 0 || th == 0 {
            return;
        }
        let pad = 2;
        let top = if y - th as i32 - 2 * pad >= 0 {
            y - th as i32 - 2 * pad
        } else {
            y
        };
        draw_filled_rect_mut(
            canvas,
            Rect::at(x, top).of_size(tw + 2 * pad as u32, th + 2 * pad as u32),
            background,
        );
        draw_text_mut(canvas, LABEL_TEXT, x + pad, top + pad, self.scale, font, text);
    }
}

/// 由内向外画 `thickness` 层空心矩形
fn draw_thick_rect(canvas: &mut RgbImage, ltrb: [i32; 4], thickness: i32, color: Rgb<u8>) {
    let [l, t, r, b] = ltrb;
    for i in 0..thickness.max(1) {
        let w = r - l + 2 * i;
        let h = b - t + 2 * i;
        if w <= 0 || h <= 0 {
            continue;
        }
        draw_hollow_rect_mut(canvas, Rect::at(l - i, t - i).of_size(w as u32, h as u32), color);
    }
}
