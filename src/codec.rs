// 该文件是 Yunjian （云检） 项目的一部分。
// src/codec.rs - 帧格式转换与压缩编码
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

use image::codecs::jpeg::JpegEncoder;
use image::{ImageBuffer, Rgb, RgbImage, imageops};
use thiserror::Error;
use tracing::debug;

use crate::frame::RawFrame;

/// 上传用 JPEG 的固定压缩质量
pub const JPEG_QUALITY: u8 = 85;

#[derive(Error, Debug)]
pub enum CodecError {
  #[error("帧没有图像数据")]
  NoImageData,
  #[error("{plane} 平面长度不匹配: 期望 {expected}, 实际 {actual}")]
  PlaneSizeMismatch {
    plane: &'static str,
    expected: usize,
    actual: usize,
  },
  #[error("不支持的旋转角度: {0}")]
  UnsupportedRotation(u32),
  #[error("JPEG 编码失败: {0}")]
  Encode(#[from] image::ImageError),
}

/// 将平面 YUV 帧重组为交错 RGB 图像。
///
/// 色度平面按相机交付顺序的逆序采样（第二平面为 Cr 在前的 NV21 约定）；
/// 若按直觉顺序采样，红蓝两通道会互换。
pub fn to_rgb_image(frame: &RawFrame) -> Result<RgbImage, CodecError> {
  if !frame.has_image_data() {
    return Err(CodecError::NoImageData);
  }

  let w = frame.width() as usize;
  let h = frame.height() as usize;
  let cw = w.div_ceil(2);
  let ch = h.div_ceil(2);

  check_plane("亮度", frame.luma(), w * h)?;
  check_plane("色度A", frame.chroma_a(), cw * ch)?;
  check_plane("色度B", frame.chroma_b(), cw * ch)?;

  // 交错重组：第二色度平面先行（相对平面交付顺序交换）
  let mut vu = vec![0u8; cw * ch * 2];
  for (i, pair) in vu.chunks_exact_mut(2).enumerate() {
    pair[0] = frame.chroma_b()[i];
    pair[1] = frame.chroma_a()[i];
  }

  let luma = frame.luma();
  let image = ImageBuffer::from_fn(frame.width(), frame.height(), |x, y| {
    let (x, y) = (x as usize, y as usize);
    let yv = luma[y * w + x] as f32;
    let uv_index = ((y / 2) * cw + (x / 2)) * 2;
    let cr = vu[uv_index] as f32 - 128.0;
    let cb = vu[uv_index + 1] as f32 - 128.0;

    let r = yv + 1.402_f32 * cr;
    let g = yv - 0.344_136_f32 * cb - 0.714_136_f32 * cr;
    let b = yv + 1.772_f32 * cb;

    Rgb([clamp_to_u8(r), clamp_to_u8(g), clamp_to_u8(b)])
  });

  Ok(image)
}

fn check_plane(plane: &'static str, data: &[u8], expected: usize) -> Result<(), CodecError> {
  if data.len() != expected {
    return Err(CodecError::PlaneSizeMismatch {
      plane,
      expected,
      actual: data.len(),
    });
  }
  Ok(())
}

fn clamp_to_u8(value: f32) -> u8 {
  value.round().clamp(0.0, 255.0) as u8
}

/// 按取景方向校正图像
fn apply_rotation(image: RgbImage, rotation_degrees: u32) -> Result<RgbImage, CodecError> {
  match rotation_degrees {
    0 => Ok(image),
    90 => Ok(imageops::rotate90(&image)),
    180 => Ok(imageops::rotate180(&image)),
    270 => Ok(imageops::rotate270(&image)),
    other => Err(CodecError::UnsupportedRotation(other)),
  }
}

/// 把一帧原始图像编码为可上传的 JPEG 字节。
///
/// 失败对管线非致命，仅表示该帧不产生结果；中间缓冲在所有路径上随作用域释放。
pub fn encode_jpeg(frame: &RawFrame) -> Result<Vec<u8>, CodecError> {
  let rgb = to_rgb_image(frame)?;
  let rotated = apply_rotation(rgb, frame.rotation_degrees())?;

  let mut jpeg = Vec::new();
  let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
  encoder.encode_image(&rotated)?;

  debug!(
    "帧编码完成: {}x{} 旋转 {} 度, {} 字节",
    rotated.width(),
    rotated.height(),
    frame.rotation_degrees(),
    jpeg.len()
  );
  Ok(jpeg)
}
