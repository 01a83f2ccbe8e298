// 该文件是 Yunjian （云检） 项目的一部分。
// src/result.rs - 检测结果数据模型
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

use serde::{Deserialize, Serialize};

/// 模型空间中的包围盒。
///
/// 坐标系由检测器决定（像素或归一化分数），调用方不得假设 [0,1] 归一化。
/// 四个坐标各自可缺省，任一缺省即视为无效框。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BoundingBox {
  #[serde(rename = "xmin")]
  pub x_min: Option<f32>,
  #[serde(rename = "ymin")]
  pub y_min: Option<f32>,
  #[serde(rename = "xmax")]
  pub x_max: Option<f32>,
  #[serde(rename = "ymax")]
  pub y_max: Option<f32>,
}

impl BoundingBox {
  pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
    Self {
      x_min: Some(x_min),
      y_min: Some(y_min),
      x_max: Some(x_max),
      y_max: Some(y_max),
    }
  }

  /// 四个坐标是否齐全
  pub fn is_valid(&self) -> bool {
    self.x_min.is_some() && self.y_min.is_some() && self.x_max.is_some() && self.y_max.is_some()
  }
}

/// 单个检测目标，构造后不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
  pub label: String,
  /// 置信度，取值 [0,1]，可缺省
  pub confidence: Option<f32>,
  #[serde(rename = "box")]
  pub bbox: Option<BoundingBox>,
}

impl DetectedObject {
  pub fn new(label: impl Into<String>, confidence: Option<f32>, bbox: BoundingBox) -> Self {
    Self {
      label: label.into(),
      confidence,
      bbox: Some(bbox),
    }
  }

  /// 标签文本中使用的百分比形式置信度
  pub fn confidence_as_percentage(&self) -> String {
    match self.confidence {
      Some(c) => format!("{:.0}%", c * 100.0),
      None => "--".to_string(),
    }
  }
}

/// 一次检测请求的完整结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
  /// 服务端回传的源图像地址（如有）
  #[serde(default)]
  pub image_url: Option<String>,
  /// 检测目标列表，保持服务端给出的顺序；失败结果中可为空
  #[serde(default)]
  pub detected_objects: Option<Vec<DetectedObject>>,
  /// 错误描述，缺省或为空即视为成功
  #[serde(default)]
  pub error: Option<String>,
  /// 服务端处理耗时（毫秒）
  #[serde(default)]
  pub processing_time_ms: Option<u64>,
}

impl DetectionResult {
  /// 结果是否成功。失败结果的 `detected_objects` 没有语义，禁止渲染。
  pub fn is_success(&self) -> bool {
    match &self.error {
      None => true,
      Some(e) => e.is_empty(),
    }
  }

  /// 目标数量（失败或空结果为 0）
  pub fn object_count(&self) -> usize {
    self.detected_objects.as_ref().map_or(0, |objects| objects.len())
  }
}
