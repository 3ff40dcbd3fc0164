// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 声音警报
//! WAV (hound) → 默认输出设备 (cpal)
//!
//! 每次播放使用独立的播放线程: 工作线程只等到音频流启动,
//! 多个警报音可以重叠播放。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, warn};

use super::{AlertSink, ZoneAlert};
use crate::error::AlertError;

/// 播放超时余量
const PLAYBACK_SLACK: Duration = Duration::from_millis(500);
/// 等待音频流启动的上限
const START_TIMEOUT: Duration = Duration::from_secs(2);

type StartResult = Result<(), AlertError>;

/// 已解码的音频片段 (交错采样, [-1, 1])
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Clip {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl Clip {
    fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }

    /// 最近邻重采样到设备采样率与声道数
    pub(crate) fn resample(&self, rate: u32, channels: u16) -> Vec<f32> {
        let src_channels = usize::from(self.channels.max(1));
        let dst_channels = usize::from(channels.max(1));
        if self.sample_rate == 0 || rate == 0 {
            return Vec::new();
        }
        let src_frames = self.frames();
        let scaled = src_frames as u64 * u64::from(rate) / u64::from(self.sample_rate);
        let dst_frames = scaled as usize;

        let mut out = Vec::with_capacity(dst_frames * dst_channels);
        for i in 0..dst_frames {
            let src = ((i as u64 * u64::from(self.sample_rate)) / u64::from(rate)) as usize;
            let src = src.min(src_frames.saturating_sub(1));
            for c in 0..dst_channels {
                // 单声道复制到所有声道, 多余声道取最后一个
                let sc = c.min(src_channels - 1);
                out.push(self.samples[src * src_channels + sc]);
            }
        }
        out
    }
}

pub(crate) fn load_wav(path: &Path) -> Result<Clip, AlertError> {
    if !path.exists() {
        return Err(AlertError::SoundMissing(path.to_path_buf()));
    }
    let reader = hound::WavReader::open(path).map_err(|e| AlertError::Decode(e.to_string()))?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>(),
        hound::SampleFormat::Int => {
            let max = (1_i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<Result<Vec<_>, _>>()
        }
    }
    .map_err(|e| AlertError::Decode(e.to_string()))?;

    Ok(Clip {
        samples,
        channels: spec.channels,
        sample_rate: spec.sample_rate,
    })
}

/// WAV 警报音
#[derive(Clone, Debug)]
pub struct SoundAlert {
    path: PathBuf,
}

impl SoundAlert {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// 正在播放的音频流及其结束信号
struct Playing {
    stream: Stream,
    done: Receiver<()>,
    duration: Duration,
}

/// 打开默认输出设备并开始播放
fn start_stream(clip: &Clip) -> Result<Playing, AlertError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| AlertError::Device("没有默认输出设备".to_string()))?;
    let supported = device
        .default_output_config()
        .map_err(|e| AlertError::Device(e.to_string()))?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();

    let buffer = Arc::new(clip.resample(config.sample_rate.0, config.channels));
    let frames = buffer.len() as f64 / f64::from(config.channels.max(1));
    let duration = Duration::from_secs_f64(frames / f64::from(config.sample_rate.0.max(1)));
    let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);

    let stream_result = match sample_format {
        SampleFormat::F32 => {
            let buffer = Arc::clone(&buffer);
            let mut pos = 0;
            device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for out in data.iter_mut() {
                        *out = buffer.get(pos).copied().unwrap_or(0.0);
                        pos += 1;
                    }
                    if pos >= buffer.len() {
                        let _ = done_tx.try_send(());
                    }
                },
                move |err| error!("❌ 音频流错误: {}", err),
                None,
            )
        }
        SampleFormat::I16 => {
            let buffer = Arc::clone(&buffer);
            let mut pos = 0;
            device.build_output_stream(
                &config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    for out in data.iter_mut() {
                        let s = buffer.get(pos).copied().unwrap_or(0.0).clamp(-1.0, 1.0);
                        *out = (s * f32::from(i16::MAX)) as i16;
                        pos += 1;
                    }
                    if pos >= buffer.len() {
                        let _ = done_tx.try_send(());
                    }
                },
                move |err| error!("❌ 音频流错误: {}", err),
                None,
            )
        }
        other => {
            return Err(AlertError::Device(format!("不支持的采样格式 {:?}", other)));
        }
    };

    let stream = stream_result.map_err(|e| AlertError::Stream(e.to_string()))?;
    stream.play().map_err(|e| AlertError::Stream(e.to_string()))?;
    Ok(Playing {
        stream,
        done: done_rx,
        duration,
    })
}

/// 在新线程中执行播放任务, 等到任务报告启动结果后返回
///
/// 任务必须在开始出声 (或失败) 时通过 `Sender` 报告一次; 之后可以继续运行到播放结束。
fn spawn_playback<F>(job: F) -> Result<(), AlertError>
where
    F: FnOnce(Sender<StartResult>) + Send + 'static,
{
    let (started_tx, started_rx) = crossbeam_channel::bounded(1);
    std::thread::Builder::new()
        .name("alert-playback".into())
        .spawn(move || job(started_tx))
        .map_err(|e| AlertError::Stream(e.to_string()))?;

    match started_rx.recv_timeout(START_TIMEOUT) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(AlertError::Stream("音频流启动超时".to_string())),
        Err(RecvTimeoutError::Disconnected) => {
            Err(AlertError::Stream("播放线程在启动前退出".to_string()))
        }
    }
}

impl AlertSink for SoundAlert {
    fn play(&self, alert: &ZoneAlert) -> Result<(), AlertError> {
        let clip = load_wav(&self.path)?;
        debug!(
            "🔊 播放警报音 {} (人员 ID {}, {} 声道 {} Hz)",
            self.path.display(),
            alert.track_id,
            clip.channels,
            clip.sample_rate
        );
        // cpal 的 Stream 不能跨线程移动, 在播放线程内创建
        spawn_playback(move |started| {
            let playing = match start_stream(&clip) {
                Ok(playing) => playing,
                Err(e) => {
                    let _ = started.send(Err(e));
                    return;
                }
            };
            let _ = started.send(Ok(()));

            if playing.done.recv_timeout(playing.duration + PLAYBACK_SLACK).is_err() {
                warn!("⚠️ 警报音播放超时");
            }
            // 让设备缓冲区播完
            std::thread::sleep(Duration::from_millis(50));
            drop(playing.stream);
        })
    }
}
