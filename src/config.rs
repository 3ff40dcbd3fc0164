// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 运行配置
//! - Args: 命令行参数 (clap)
//! - MonitorConfig: 监控参数, 通过JSON文件调整; 命令行参数优先

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::detection::types::{DEFAULT_CONF_THRESHOLD, PERSON_CLASS_ID};
use crate::detection::{ByteTrackConfig, ZoneFractions};
use crate::error::{Result, SentinelError};

/// 推理设备
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Device {
    /// 有 CUDA 则用 CUDA, 否则 CPU
    Auto,
    Cpu,
    Cuda,
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "出口区域人员进入警报", long_about = None)]
pub struct Args {
    /// 输入视频
    #[arg(short, long, default_value = "supermercado.mp4")]
    pub input: String,

    /// 输出标注视频
    #[arg(short, long, default_value = "output_supermercado.mp4")]
    pub output: String,

    /// 不写输出视频
    #[arg(long)]
    pub no_output: bool,

    /// YOLO ONNX 模型
    #[arg(short, long, default_value = "yolo11n.onnx")]
    pub model: PathBuf,

    /// 警报音 (WAV)
    #[arg(short, long, default_value = "alerta.wav")]
    pub sound: PathBuf,

    /// 监控参数JSON文件, 不存在时写入默认值
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 推理设备
    #[arg(long, value_enum, default_value_t = Device::Auto)]
    pub device: Device,

    /// 检测置信度阈值 (严格大于)
    #[arg(long)]
    pub conf: Option<f32>,

    /// 不打开预览窗口
    #[arg(long)]
    pub headless: bool,

    /// 标签字体 (TTF/OTF)
    #[arg(long, default_value = "assets/DejaVuSans.ttf")]
    pub font: PathBuf,

    /// 警报工作线程数
    #[arg(long)]
    pub alert_workers: Option<usize>,
}

/// 警报队列参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 16,
        }
    }
}

/// 监控参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    // === 区域 ===
    pub zone: ZoneFractions,

    // === 检测 ===
    pub target_class: usize,      // 目标类别 (COCO person = 0)
    pub conf_threshold: f32,      // 置信度阈值, 严格大于
    pub nms_iou_threshold: f32,   // NMS IOU阈值
    pub input_size: u32,          // 模型输入尺寸

    // === 追踪 / 警报 ===
    pub tracker: ByteTrackConfig,
    pub alert: AlertConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            zone: ZoneFractions::default(),
            target_class: PERSON_CLASS_ID,
            conf_threshold: DEFAULT_CONF_THRESHOLD,
            nms_iou_threshold: 0.45,
            input_size: 640,
            tracker: ByteTrackConfig::default(),
            alert: AlertConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// 从JSON文件加载配置; 文件不存在时写入默认配置
    pub fn load(path: &Path) -> Result<Self> {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("📝 配置文件不存在, 创建默认配置: {}", path.display());
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    warn!("⚠️ 保存默认配置失败: {}", e);
                }
                return Ok(config);
            }
            Err(e) => return Err(e.into()),
        };

        let config: Self = serde_json::from_str(&json)
            .map_err(|e| SentinelError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        info!("✅ 配置已从 {} 加载", path.display());
        Ok(config)
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| SentinelError::Config(e.to_string()))?;
        fs::write(path, json)?;
        info!("💾 配置已保存到 {}", path.display());
        Ok(())
    }

    /// 命令行参数覆盖文件配置
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(conf) = args.conf {
            self.conf_threshold = conf;
        }
        if let Some(workers) = args.alert_workers {
            self.alert.workers = workers;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.zone.validate().map_err(SentinelError::Config)?;
        if !(0.0..1.0).contains(&self.conf_threshold) {
            return Err(SentinelError::Config(format!(
                "置信度阈值必须位于 [0, 1): {}",
                self.conf_threshold
            )));
        }
        if self.input_size == 0 || self.tracker.n_init == 0 {
            return Err(SentinelError::Config(
                "input_size 和 tracker.n_init 必须大于0".to_string(),
            ));
        }
        if self.alert.workers == 0 || self.alert.queue_capacity == 0 {
            return Err(SentinelError::Config(
                "alert.workers 和 alert.queue_capacity 必须大于0".to_string(),
            ));
        }
        Ok(())
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        info!(
            "🎛️ 区域: ({:.2}, {:.2})-({:.2}, {:.2}) | 类别 {} | 置信度 > {:.2}",
            self.zone.x1,
            self.zone.y1,
            self.zone.x2,
            self.zone.y2,
            self.target_class,
            self.conf_threshold
        );
        info!(
            "🎛️ 追踪: n_init {} | max_age {} | 警报线程 {} | 队列 {}",
            self.tracker.n_init, self.tracker.max_age, self.alert.workers, self.alert.queue_capacity
        );
    }
}
