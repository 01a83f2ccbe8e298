// 该文件是 Yunjian （云检） 项目的一部分。
// src/overlay/transform.rs - 坐标变换
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

use crate::result::BoundingBox;

/// 标签背景的内边距（像素）
pub const TEXT_PADDING_PX: f32 = 10.0;

/// 模型空间到视图空间的仿射变换参数。
///
/// 每次设置检测结果时整体替换，从不部分修改。legacy 标志只记录参数的
/// 来历（由视图尺寸推导而非显式给出），两种模式走同一条算术路径。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransformParameters {
  /// 模型输入图像宽度
  pub original_width: u32,
  /// 模型输入图像高度
  pub original_height: u32,
  /// 显示区域宽度（经调用方按信箱布局折算后）
  pub display_width: u32,
  /// 显示区域高度
  pub display_height: u32,
  /// 显示区域的水平偏移
  pub offset_x: u32,
  /// 显示区域的垂直偏移
  pub offset_y: u32,
  /// 参数是否由视图尺寸推导（旧式调用路径）
  pub legacy: bool,
}

impl TransformParameters {
  /// 显式给定全部变换参数（推荐路径）
  pub fn explicit(
    original_width: u32,
    original_height: u32,
    display_width: u32,
    display_height: u32,
    offset_x: u32,
    offset_y: u32,
  ) -> Self {
    Self {
      original_width,
      original_height,
      display_width,
      display_height,
      offset_x,
      offset_y,
      legacy: false,
    }
  }

  /// 旧式静态图路径：显示尺寸取当前视图尺寸（视图未布局时退回图像尺寸）
  pub fn derived_for_image(image_width: u32, image_height: u32, view_width: u32, view_height: u32) -> Self {
    Self {
      original_width: image_width,
      original_height: image_height,
      display_width: if view_width > 0 { view_width } else { image_width },
      display_height: if view_height > 0 { view_height } else { image_height },
      offset_x: 0,
      offset_y: 0,
      legacy: true,
    }
  }

  /// 旧式实时相机路径：原始与显示尺寸都取当前视图尺寸，变换塌缩为 1:1
  pub fn derived_from_view_size(view_width: u32, view_height: u32) -> Self {
    Self {
      original_width: view_width,
      original_height: view_height,
      display_width: view_width,
      display_height: view_height,
      offset_x: 0,
      offset_y: 0,
      legacy: true,
    }
  }

  /// 四个尺寸维度是否都已就绪。未就绪是正常的瞬态（例如首次布局前），
  /// 渲染按空操作处理，不是错误。
  pub fn is_renderable(&self) -> bool {
    self.original_width > 0
      && self.original_height > 0
      && self.display_width > 0
      && self.display_height > 0
  }

  /// 把模型空间的框映射到视图空间。
  ///
  /// 两轴独立缩放，本步骤不保持纵横比；需要信箱布局的调用方应在
  /// 构造参数时折算 display 尺寸。坐标缺失、参数未就绪或裁剪后
  /// 退化的框返回 None，不绘制。
  pub fn map_box(&self, bbox: &BoundingBox, view_width: u32, view_height: u32) -> Option<MappedRect> {
    if !self.is_renderable() {
      return None;
    }
    let (x_min, y_min, x_max, y_max) =
      (bbox.x_min?, bbox.y_min?, bbox.x_max?, bbox.y_max?);

    let scale_x = self.display_width as f32 / self.original_width as f32;
    let scale_y = self.display_height as f32 / self.original_height as f32;

    let left = x_min * scale_x + self.offset_x as f32;
    let top = y_min * scale_y + self.offset_y as f32;
    let right = x_max * scale_x + self.offset_x as f32;
    let bottom = y_max * scale_y + self.offset_y as f32;

    // 裁剪到视图范围
    let (view_w, view_h) = (view_width as f32, view_height as f32);
    let left = left.clamp(0.0, view_w);
    let top = top.clamp(0.0, view_h);
    let right = right.clamp(0.0, view_w);
    let bottom = bottom.clamp(0.0, view_h);

    // 零面积守卫
    if right <= left || bottom <= top {
      return None;
    }

    Some(MappedRect {
      left,
      top,
      right,
      bottom,
    })
  }
}

/// 视图空间中的像素矩形
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MappedRect {
  pub left: f32,
  pub top: f32,
  pub right: f32,
  pub bottom: f32,
}

impl MappedRect {
  pub fn width(&self) -> f32 {
    self.right - self.left
  }

  pub fn height(&self) -> f32 {
    self.bottom - self.top
  }
}

/// 标签背景矩形
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelRect {
  pub left: f32,
  pub top: f32,
  pub right: f32,
  pub bottom: f32,
}

/// 计算标签背景的摆放位置。
///
/// 规则按固定顺序应用：默认锚在框顶之上；越出视图上缘则翻到框底之下；
/// 越出右缘则整体左移溢出量；左移后左缘为负则钉在 0 并按未移位的
/// 标签宽度重算右缘。
pub fn place_label(
  rect: &MappedRect,
  text_width: f32,
  text_height: f32,
  view_width: f32,
) -> LabelRect {
  let mut left = rect.left;
  let mut top = rect.top - text_height - TEXT_PADDING_PX;
  let mut right = left + text_width + TEXT_PADDING_PX * 2.0;
  let mut bottom = rect.top;

  if top < 0.0 {
    top = rect.bottom;
    bottom = top + text_height + TEXT_PADDING_PX;
  }
  if right > view_width {
    let shift = right - view_width;
    left -= shift;
    right -= shift;
  }
  if left < 0.0 {
    left = 0.0;
    right = text_width + TEXT_PADDING_PX * 2.0;
  }

  LabelRect {
    left,
    top,
    right,
    bottom,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn full_frame_box_maps_to_full_display_area() {
    let params = TransformParameters::explicit(1920, 1080, 800, 450, 40, 75);
    let bbox = BoundingBox::new(0.0, 0.0, 1920.0, 1080.0);
    let rect = params.map_box(&bbox, 900, 600).unwrap();

    assert_eq!(rect.left, 40.0);
    assert_eq!(rect.top, 75.0);
    assert_eq!(rect.right, 840.0);
    assert_eq!(rect.bottom, 525.0);
  }

  #[test]
  fn identity_scale_static_image_scenario() {
    // 1920x1080 全幅显示，无缩放无偏移；框按像素坐标给出
    let params = TransformParameters::explicit(1920, 1080, 1920, 1080, 0, 0);
    let bbox = BoundingBox::new(0.1 * 1920.0, 0.2 * 1080.0, 0.6 * 1920.0, 0.8 * 1080.0);
    let rect = params.map_box(&bbox, 1920, 1080).unwrap();

    assert_eq!(rect.left, 192.0);
    assert_eq!(rect.top, 216.0);
    assert_eq!(rect.right, 1152.0);
    assert_eq!(rect.bottom, 864.0);
  }

  #[test]
  fn letterboxed_display_scenario() {
    let params = TransformParameters::explicit(1920, 1080, 800, 450, 0, 75);
    let bbox = BoundingBox::new(960.0, 540.0, 1920.0, 1080.0);

    let rect = params.map_box(&bbox, 800, 600).unwrap();
    assert_eq!(rect.left, 400.0);
    assert_eq!(rect.top, 300.0);
    assert_eq!(rect.right, 800.0);
    assert_eq!(rect.bottom, 525.0);

    // 视图高度不足时裁剪到视图下缘
    let clipped = params.map_box(&bbox, 800, 500).unwrap();
    assert_eq!(clipped.bottom, 500.0);
  }

  #[test]
  fn legacy_view_size_parameters_collapse_to_identity() {
    let params = TransformParameters::derived_from_view_size(640, 480);
    assert!(params.legacy);

    let bbox = BoundingBox::new(10.0, 20.0, 100.0, 200.0);
    let rect = params.map_box(&bbox, 640, 480).unwrap();
    assert_eq!(rect.left, 10.0);
    assert_eq!(rect.top, 20.0);
    assert_eq!(rect.right, 100.0);
    assert_eq!(rect.bottom, 200.0);
  }

  #[test]
  fn missing_coordinate_rejects_before_mapping() {
    let params = TransformParameters::explicit(100, 100, 100, 100, 0, 0);
    let bbox = BoundingBox {
      x_min: Some(1.0),
      y_min: None,
      x_max: Some(2.0),
      y_max: Some(2.0),
    };
    assert!(params.map_box(&bbox, 100, 100).is_none());
  }

  #[test]
  fn degenerate_box_is_rejected() {
    let params = TransformParameters::explicit(100, 100, 100, 100, 0, 0);
    assert!(
      params
        .map_box(&BoundingBox::new(50.0, 10.0, 50.0, 20.0), 100, 100)
        .is_none()
    );
    assert!(
      params
        .map_box(&BoundingBox::new(60.0, 10.0, 50.0, 20.0), 100, 100)
        .is_none()
    );
  }

  #[test]
  fn box_outside_view_collapses_after_clamp() {
    let params = TransformParameters::explicit(100, 100, 100, 100, 0, 0);
    // 框完全落在视图右侧之外，裁剪后 left == right
    let bbox = BoundingBox::new(150.0, 10.0, 180.0, 20.0);
    assert!(params.map_box(&bbox, 100, 100).is_none());
  }

  #[test]
  fn zero_dimensions_are_not_renderable() {
    let params = TransformParameters::explicit(0, 1080, 800, 450, 0, 0);
    assert!(!params.is_renderable());
    let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
    assert!(params.map_box(&bbox, 800, 600).is_none());
  }

  #[test]
  fn label_sits_above_box_by_default() {
    let rect = MappedRect {
      left: 100.0,
      top: 100.0,
      right: 200.0,
      bottom: 200.0,
    };
    let label = place_label(&rect, 60.0, 20.0, 640.0);

    assert_eq!(label.left, 100.0);
    assert_eq!(label.top, 100.0 - 20.0 - TEXT_PADDING_PX);
    assert_eq!(label.right, 100.0 + 60.0 + TEXT_PADDING_PX * 2.0);
    assert_eq!(label.bottom, 100.0);
  }

  #[test]
  fn label_flips_below_box_near_top_edge() {
    let rect = MappedRect {
      left: 100.0,
      top: 5.0,
      right: 200.0,
      bottom: 80.0,
    };
    let label = place_label(&rect, 60.0, 20.0, 640.0);

    assert_eq!(label.top, 80.0);
    assert_eq!(label.bottom, 80.0 + 20.0 + TEXT_PADDING_PX);
  }

  #[test]
  fn label_shifts_left_at_right_edge() {
    let rect = MappedRect {
      left: 600.0,
      top: 100.0,
      right: 640.0,
      bottom: 200.0,
    };
    let label = place_label(&rect, 60.0, 20.0, 640.0);

    assert_eq!(label.right, 640.0);
    assert_eq!(label.left, 640.0 - 60.0 - TEXT_PADDING_PX * 2.0);
  }

  #[test]
  fn label_clamps_to_left_edge_in_narrow_view() {
    let rect = MappedRect {
      left: 10.0,
      top: 100.0,
      right: 60.0,
      bottom: 200.0,
    };
    // 视图过窄：右移后左缘为负，钉回 0 并按未移位宽度重算右缘
    let label = place_label(&rect, 100.0, 20.0, 80.0);

    assert_eq!(label.left, 0.0);
    assert_eq!(label.right, 100.0 + TEXT_PADDING_PX * 2.0);
  }
}
