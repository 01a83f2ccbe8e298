// 该文件是 Yunjian （云检） 项目的一部分。
// src/frame.rs - 原始相机帧定义
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

/// 采集层固定的目标分辨率宽度
pub const TARGET_WIDTH: u32 = 640;
/// 采集层固定的目标分辨率高度
pub const TARGET_HEIGHT: u32 = 480;

/// 平面 YUV 4:2:0 原始帧。
///
/// 相机子系统按平面顺序交付数据：亮度平面在前，两个色度平面在后。
/// 帧由管线独占持有；无论成功、丢弃还是出错，每条路径都必须恰好释放一次，
/// 否则相机的帧缓冲池会被耗尽。释放语义由 `Drop` 表达，池化的相机可以
/// 通过 `with_release` 挂接回收回调。
pub struct RawFrame {
  /// 亮度平面（Y），逐行 width x height
  luma: Vec<u8>,
  /// 第一色度平面（按交付顺序），每维下采样 2 倍
  chroma_a: Vec<u8>,
  /// 第二色度平面（按交付顺序），每维下采样 2 倍
  chroma_b: Vec<u8>,
  width: u32,
  height: u32,
  /// 取景方向校正角度，取值 0/90/180/270
  rotation_degrees: u32,
  /// 采集时间戳（毫秒）
  timestamp_ms: u64,
  /// 缓冲池回收回调，至多调用一次
  release: Option<Box<dyn FnOnce() + Send>>,
}

impl RawFrame {
  pub fn new(
    luma: Vec<u8>,
    chroma_a: Vec<u8>,
    chroma_b: Vec<u8>,
    width: u32,
    height: u32,
    rotation_degrees: u32,
    timestamp_ms: u64,
  ) -> Self {
    Self {
      luma,
      chroma_a,
      chroma_b,
      width,
      height,
      rotation_degrees,
      timestamp_ms,
      release: None,
    }
  }

  /// 挂接缓冲池回收回调，帧被释放时恰好调用一次
  pub fn with_release(mut self, release: impl FnOnce() + Send + 'static) -> Self {
    self.release = Some(Box::new(release));
    self
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn rotation_degrees(&self) -> u32 {
    self.rotation_degrees
  }

  pub fn timestamp_ms(&self) -> u64 {
    self.timestamp_ms
  }

  /// 帧是否带有图像数据（相机偶尔会交付空帧）
  pub fn has_image_data(&self) -> bool {
    !self.luma.is_empty()
  }

  pub fn luma(&self) -> &[u8] {
    &self.luma
  }

  pub fn chroma_a(&self) -> &[u8] {
    &self.chroma_a
  }

  pub fn chroma_b(&self) -> &[u8] {
    &self.chroma_b
  }
}

impl Drop for RawFrame {
  fn drop(&mut self) {
    if let Some(release) = self.release.take() {
      release();
    }
  }
}

impl std::fmt::Debug for RawFrame {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RawFrame")
      .field("width", &self.width)
      .field("height", &self.height)
      .field("rotation_degrees", &self.rotation_degrees)
      .field("timestamp_ms", &self.timestamp_ms)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;
  use std::sync::atomic::{AtomicUsize, Ordering};

  fn gray_frame(timestamp_ms: u64) -> RawFrame {
    let luma = vec![128u8; (TARGET_WIDTH * TARGET_HEIGHT) as usize];
    let chroma = vec![128u8; (TARGET_WIDTH * TARGET_HEIGHT / 4) as usize];
    RawFrame::new(
      luma,
      chroma.clone(),
      chroma,
      TARGET_WIDTH,
      TARGET_HEIGHT,
      0,
      timestamp_ms,
    )
  }

  #[test]
  fn release_hook_runs_exactly_once() {
    let released = Arc::new(AtomicUsize::new(0));
    let counter = released.clone();
    let frame = gray_frame(0).with_release(move || {
      counter.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(released.load(Ordering::SeqCst), 0);
    drop(frame);
    assert_eq!(released.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn empty_frame_has_no_image_data() {
    let frame = RawFrame::new(Vec::new(), Vec::new(), Vec::new(), 640, 480, 0, 42);
    assert!(!frame.has_image_data());
    assert_eq!(frame.timestamp_ms(), 42);
  }
}
