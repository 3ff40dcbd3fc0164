// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

// 构建脚本: Windows MSVC 下为 ez-ffmpeg 补充链接库
use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // 未启用 ffmpeg 特性时无需额外链接
    if env::var_os("CARGO_FEATURE_FFMPEG").is_none() {
        return;
    }

    // 按目标平台判断, 交叉编译时宿主平台不可靠
    let os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let target_env = env::var("CARGO_CFG_TARGET_ENV").unwrap_or_default();
    if os != "windows" || target_env != "msvc" {
        return;
    }

    for lib in [
        "libmfx",   // Intel QSV 硬件编解码
        "libx264",  // x264 编码器
        "oleaut32", // OLE 自动化
        "vfw32",    // VFW
        "secur32",  // Secure Channel
    ] {
        println!("cargo:rustc-link-lib=dylib={}", lib);
    }
}
