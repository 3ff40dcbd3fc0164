// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 错误类型
//! Error types

use std::path::PathBuf;

use thiserror::Error;

/// 启动阶段错误 (致命, 在进入帧循环之前返回)
#[derive(Debug, Error)]
pub enum SentinelError {
    #[error("无法打开视频源 {path}: {reason}")]
    SourceOpen { path: String, reason: String },

    #[error("无法打开输出 {sink}: {reason}")]
    SinkOpen { sink: String, reason: String },

    #[error("模型加载失败 {path}: {reason}")]
    Model { path: PathBuf, reason: String },

    #[error("配置无效: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// 单次警报失败 (可恢复, 在分发边界被捕获)
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("警报音文件不存在: {0}")]
    SoundMissing(PathBuf),

    #[error("警报音解码失败: {0}")]
    Decode(String),

    #[error("音频设备不可用: {0}")]
    Device(String),

    #[error("音频流错误: {0}")]
    Stream(String),

    #[error("警报处理异常退出: {0}")]
    Panicked(String),
}

pub type Result<T, E = SentinelError> = std::result::Result<T, E>;
