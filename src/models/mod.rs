// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 模型实现
///
/// - YoloDetector: YOLOv8/YOLO11 ONNX 检测模型 (ONNX Runtime)
pub mod yolo;

pub use yolo::YoloDetector;
