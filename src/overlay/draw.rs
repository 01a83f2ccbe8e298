// 该文件是 Yunjian （云检） 项目的一部分。
// src/overlay/draw.rs - 检测结果叠加渲染
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

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{debug, warn};

use crate::overlay::transform::{TransformParameters, place_label};
use crate::result::{DetectedObject, DetectionResult};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_HEIGHT: f32 = 24.0;
const LABEL_CHAR_WIDTH: f32 = 11.0; // 每字符平均宽度（粗略估计）
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]); // 白色文本

/// 检测结果叠加渲染器。
///
/// 渲染器跨调用保持两份持久状态：当前目标列表与上次设置的变换参数。
/// 每次设置结果都整体替换两者；`clear` 只清空目标列表，变换记忆保留。
/// 状态不支持并发修改，调用方须在单一执行上下文中使用。
pub struct OverlayRenderer {
  objects: Vec<DetectedObject>,
  params: TransformParameters,
  view_width: u32,
  view_height: u32,
  font: Option<FontArc>,
  font_scale: PxScale,
}

impl Default for OverlayRenderer {
  fn default() -> Self {
    Self::new()
  }
}

impl OverlayRenderer {
  pub fn new() -> Self {
    Self {
      objects: Vec::new(),
      params: TransformParameters::default(),
      view_width: 0,
      view_height: 0,
      font: None,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
    }
  }

  /// 加载标签字体；未加载字体时只绘制框与标签背景
  pub fn with_font_bytes(mut self, font_data: &[u8]) -> Result<Self, ab_glyph::InvalidFont> {
    self.font = Some(FontArc::try_from_vec(font_data.to_vec())?);
    Ok(self)
  }

  /// 视图尺寸变更（布局、旋转等）。旧式模式下显示尺寸尚未就绪时
  /// 采用新的视图尺寸。
  pub fn resize(&mut self, view_width: u32, view_height: u32) {
    self.view_width = view_width;
    self.view_height = view_height;
    if self.params.legacy && (self.params.display_width == 0 || self.params.display_height == 0) {
      self.params.display_width = view_width;
      self.params.display_height = view_height;
      debug!("视图尺寸变更后更新显示尺寸: {}x{}", view_width, view_height);
    }
  }

  /// 设置检测结果并显式给定变换参数（推荐路径）
  pub fn set_detection_result(
    &mut self,
    result: Option<&DetectionResult>,
    original_width: u32,
    original_height: u32,
    display_width: u32,
    display_height: u32,
    offset_x: u32,
    offset_y: u32,
  ) {
    self.apply_result(
      result,
      TransformParameters::explicit(
        original_width,
        original_height,
        display_width,
        display_height,
        offset_x,
        offset_y,
      ),
    );
  }

  /// 旧式静态图入口：显示参数由当前视图尺寸推导
  pub fn set_detection_result_legacy(
    &mut self,
    result: Option<&DetectionResult>,
    image_width: u32,
    image_height: u32,
  ) {
    self.apply_result(
      result,
      TransformParameters::derived_for_image(
        image_width,
        image_height,
        self.view_width,
        self.view_height,
      ),
    );
  }

  /// 旧式实时相机入口：原始与显示尺寸都由当前视图尺寸推导
  pub fn set_detection_result_live(&mut self, result: Option<&DetectionResult>) {
    self.apply_result(
      result,
      TransformParameters::derived_from_view_size(self.view_width, self.view_height),
    );
  }

  fn apply_result(&mut self, result: Option<&DetectionResult>, params: TransformParameters) {
    if let Some(result) = result
      && !result.is_success()
    {
      // 失败结果没有可渲染的语义：上一帧叠加与变换记忆原样保留
      warn!("忽略失败的检测结果: {:?}", result.error);
      return;
    }

    self.objects = result
      .and_then(|r| r.detected_objects.clone())
      .unwrap_or_default();
    self.params = params;
    debug!(
      "设置检测结果: {} 个目标, {}",
      self.objects.len(),
      self.transformation_info()
    );
  }

  /// 只清空目标列表；变换参数穿过 clear 保留。幂等。
  pub fn clear(&mut self) {
    self.objects.clear();
  }

  pub fn object_count(&self) -> usize {
    self.objects.len()
  }

  pub fn params(&self) -> TransformParameters {
    self.params
  }

  /// 当前变换参数的调试描述
  pub fn transformation_info(&self) -> String {
    format!(
      "original({}x{}), display({}x{}), offset({},{}), legacy={}",
      self.params.original_width,
      self.params.original_height,
      self.params.display_width,
      self.params.display_height,
      self.params.offset_x,
      self.params.offset_y,
      self.params.legacy
    )
  }

  /// 把当前目标列表画到画布上。
  ///
  /// 列表为空或尺寸维度未就绪时为空操作。目标按列表顺序绘制，
  /// 重叠时后者覆盖前者，不做进一步排序。
  pub fn render(&self, canvas: &mut RgbImage) {
    if self.objects.is_empty() || !self.params.is_renderable() {
      return;
    }

    let (view_width, view_height) = canvas.dimensions();
    for object in &self.objects {
      let Some(bbox) = &object.bbox else {
        warn!("跳过缺少包围盒的目标: {}", object.label);
        continue;
      };
      let Some(rect) = self.params.map_box(bbox, view_width, view_height) else {
        debug!("跳过无效框: {}", object.label);
        continue;
      };

      let color = color_for_label(&object.label);
      self.draw_box_outline(canvas, rect.left, rect.top, rect.right, rect.bottom, color);
      self.draw_label(canvas, object, &rect, color, view_width as f32);
    }
  }

  fn draw_box_outline(
    &self,
    canvas: &mut RgbImage,
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
    color: Rgb<u8>,
  ) {
    let x = left.round() as i32;
    let y = top.round() as i32;
    let width = (right - left).round().max(1.0) as u32;
    let height = (bottom - top).round().max(1.0) as u32;

    draw_hollow_rect_mut(canvas, Rect::at(x, y).of_size(width, height), color);
    // 内嵌第二个边框以加粗
    if width > 2 && height > 2 {
      let inner = Rect::at(x + 1, y + 1).of_size(width - 2, height - 2);
      draw_hollow_rect_mut(canvas, inner, color);
    }
  }

  fn draw_label(
    &self,
    canvas: &mut RgbImage,
    object: &DetectedObject,
    rect: &crate::overlay::MappedRect,
    color: Rgb<u8>,
    view_width: f32,
  ) {
    let text = format!("{} {}", object.label, object.confidence_as_percentage());
    let text_width = text.len() as f32 * LABEL_CHAR_WIDTH;
    let label = place_label(rect, text_width, LABEL_TEXT_HEIGHT, view_width);

    let width = (label.right - label.left).round().max(1.0) as u32;
    let height = (label.bottom - label.top).round().max(1.0) as u32;
    let background = Rect::at(label.left.round() as i32, label.top.round() as i32).of_size(width, height);
    draw_filled_rect_mut(canvas, background, color);

    if let Some(font) = &self.font {
      draw_text_mut(
        canvas,
        TEXT_COLOR,
        label.left.round() as i32 + LABEL_TEXT_VERTICAL_PADDING,
        label.top.round() as i32 + LABEL_TEXT_VERTICAL_PADDING,
        self.font_scale,
        font,
        &text,
      );
    }
  }
}

/// 由标签内容生成确定性颜色。
///
/// 同一标签在任何会话、任何进程中得到同一颜色：种子只来自标签内容
/// （FNV-1a 64 位散列），不依赖运行时状态。颜色取 HSV 空间的高饱和
/// 高亮度区间，保证在常见画面背景上足够醒目。
pub fn color_for_label(label: &str) -> Rgb<u8> {
  let mut rng = StdRng::seed_from_u64(fnv1a64(label.as_bytes()));
  let hue = rng.r#gen::<f32>() * 360.0;
  let saturation = 0.8 + rng.r#gen::<f32>() * 0.2;
  let value = 0.8 + rng.r#gen::<f32>() * 0.2;
  hsv_to_rgb(hue, saturation, value)
}

/// FNV-1a 64 位散列：跨平台位形稳定
fn fnv1a64(bytes: &[u8]) -> u64 {
  const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
  const PRIME: u64 = 0x0000_0100_0000_01b3;

  let mut hash = OFFSET_BASIS;
  for byte in bytes {
    hash ^= *byte as u64;
    hash = hash.wrapping_mul(PRIME);
  }
  hash
}

/// HSV 转 RGB
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = if h < 60.0 {
    (c, x, 0.0)
  } else if h < 120.0 {
    (x, c, 0.0)
  } else if h < 180.0 {
    (0.0, c, x)
  } else if h < 240.0 {
    (0.0, x, c)
  } else if h < 300.0 {
    (x, 0.0, c)
  } else {
    (c, 0.0, x)
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::result::BoundingBox;

  fn success_result(objects: Vec<DetectedObject>) -> DetectionResult {
    DetectionResult {
      detected_objects: Some(objects),
      ..Default::default()
    }
  }

  fn person_at(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> DetectedObject {
    DetectedObject::new(
      "person",
      Some(0.9),
      BoundingBox::new(x_min, y_min, x_max, y_max),
    )
  }

  #[test]
  fn color_is_deterministic_across_instances() {
    // 两个独立来源、两次独立调用得到同一颜色
    let first = color_for_label("person");
    let second = color_for_label("person");
    assert_eq!(first, second);
    assert_ne!(color_for_label("person"), color_for_label("car"));
  }

  #[test]
  fn clear_is_idempotent_and_keeps_transform() {
    let mut renderer = OverlayRenderer::new();
    renderer.set_detection_result(
      Some(&success_result(vec![person_at(0.0, 0.0, 50.0, 50.0)])),
      100,
      100,
      100,
      100,
      0,
      0,
    );
    let params = renderer.params();

    renderer.clear();
    assert_eq!(renderer.object_count(), 0);
    assert_eq!(renderer.params(), params);

    renderer.clear();
    assert_eq!(renderer.object_count(), 0);
    assert_eq!(renderer.params(), params);
  }

  #[test]
  fn failed_result_leaves_overlay_untouched() {
    let mut renderer = OverlayRenderer::new();
    renderer.set_detection_result(
      Some(&success_result(vec![person_at(0.0, 0.0, 50.0, 50.0)])),
      100,
      100,
      100,
      100,
      0,
      0,
    );

    let failed = DetectionResult {
      error: Some("timeout".to_string()),
      detected_objects: None,
      ..Default::default()
    };
    renderer.set_detection_result(Some(&failed), 1, 1, 1, 1, 0, 0);

    assert_eq!(renderer.object_count(), 1);
    assert_eq!(renderer.params().original_width, 100);
  }

  #[test]
  fn render_is_noop_without_dimensions() {
    let mut renderer = OverlayRenderer::new();
    renderer.set_detection_result(
      Some(&success_result(vec![person_at(0.0, 0.0, 50.0, 50.0)])),
      0,
      0,
      0,
      0,
      0,
      0,
    );

    let mut canvas = RgbImage::new(64, 64);
    renderer.render(&mut canvas);
    assert!(canvas.pixels().all(|p| *p == Rgb([0, 0, 0])));
  }

  #[test]
  fn render_draws_outline_in_label_color() {
    let mut renderer = OverlayRenderer::new();
    renderer.set_detection_result(
      Some(&success_result(vec![person_at(10.0, 40.0, 60.0, 90.0)])),
      100,
      100,
      100,
      100,
      0,
      0,
    );

    let mut canvas = RgbImage::new(100, 100);
    renderer.render(&mut canvas);
    assert_eq!(*canvas.get_pixel(30, 40), color_for_label("person"));
  }

  #[test]
  fn later_object_paints_over_earlier() {
    let mut renderer = OverlayRenderer::new();
    let objects = vec![
      DetectedObject::new("cat", Some(0.8), BoundingBox::new(20.0, 40.0, 80.0, 90.0)),
      DetectedObject::new("dog", Some(0.7), BoundingBox::new(20.0, 40.0, 80.0, 90.0)),
    ];
    renderer.set_detection_result(Some(&success_result(objects)), 100, 100, 100, 100, 0, 0);

    let mut canvas = RgbImage::new(100, 100);
    renderer.render(&mut canvas);
    assert_eq!(*canvas.get_pixel(50, 40), color_for_label("dog"));
  }

  #[test]
  fn invalid_object_does_not_affect_others() {
    let mut renderer = OverlayRenderer::new();
    let objects = vec![
      DetectedObject {
        label: "ghost".to_string(),
        confidence: None,
        bbox: None,
      },
      person_at(10.0, 40.0, 60.0, 90.0),
    ];
    renderer.set_detection_result(Some(&success_result(objects)), 100, 100, 100, 100, 0, 0);

    let mut canvas = RgbImage::new(100, 100);
    renderer.render(&mut canvas);
    assert_eq!(*canvas.get_pixel(30, 40), color_for_label("person"));
  }

  #[test]
  fn live_entry_derives_parameters_from_view_size() {
    let mut renderer = OverlayRenderer::new();
    renderer.resize(640, 480);
    renderer.set_detection_result_live(Some(&success_result(vec![person_at(
      0.0, 0.0, 64.0, 48.0,
    )])));

    let params = renderer.params();
    assert!(params.legacy);
    assert_eq!(params.original_width, 640);
    assert_eq!(params.display_width, 640);
    assert_eq!(params.display_height, 480);
    assert_eq!((params.offset_x, params.offset_y), (0, 0));
  }

  #[test]
  fn legacy_entry_falls_back_to_image_size_before_layout() {
    let mut renderer = OverlayRenderer::new();
    renderer.set_detection_result_legacy(
      Some(&success_result(vec![person_at(0.0, 0.0, 10.0, 10.0)])),
      320,
      240,
    );

    let params = renderer.params();
    assert!(params.legacy);
    assert_eq!(params.display_width, 320);
    assert_eq!(params.display_height, 240);
  }

  #[test]
  fn none_result_clears_objects_but_sets_parameters() {
    let mut renderer = OverlayRenderer::new();
    renderer.set_detection_result(
      Some(&success_result(vec![person_at(0.0, 0.0, 50.0, 50.0)])),
      100,
      100,
      100,
      100,
      0,
      0,
    );
    renderer.set_detection_result(None, 200, 100, 200, 100, 0, 0);

    assert_eq!(renderer.object_count(), 0);
    assert_eq!(renderer.params().original_width, 200);
  }
}
