// 该文件是 Yunjian （云检） 项目的一部分。
// src/bin/annotate.rs - 单张图片检测与标注
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

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;
use url::Url;

use yunjian::FromUrl;
use yunjian::client::{DetectionClient, HttpDetectionClient};
use yunjian::overlay::OverlayRenderer;

/// 单张图片检测与标注参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测服务地址
  #[arg(long, value_name = "ENDPOINT")]
  pub endpoint: Url,
  /// 输入图片路径
  #[arg(long, value_name = "INPUT")]
  pub input: PathBuf,
  /// 标注结果输出路径
  #[arg(long, value_name = "OUTPUT")]
  pub output: PathBuf,
  /// 标签字体文件路径（可选；缺省时只绘制框与标签背景）
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("检测服务地址: {}", args.endpoint);
  info!("输入图片: {}", args.input.display());
  info!("输出路径: {}", args.output.display());

  let client = HttpDetectionClient::from_url(&args.endpoint)?;
  let result = client
    .submit_file(&args.input)
    .context("检测请求失败")?;
  if !result.is_success() {
    bail!("检测服务返回错误: {:?}", result.error);
  }
  info!(
    "检测完成: {} 个目标, 服务端耗时 {:?} ms",
    result.object_count(),
    result.processing_time_ms
  );

  let mut canvas = image::open(&args.input)
    .context("无法读取输入图片")?
    .to_rgb8();
  let (width, height) = canvas.dimensions();

  let mut renderer = OverlayRenderer::new();
  if let Some(font_path) = &args.font {
    let font_data = std::fs::read(font_path).context("无法读取字体文件")?;
    renderer = renderer
      .with_font_bytes(&font_data)
      .map_err(|e| anyhow::anyhow!("字体解析失败: {}", e))?;
  }

  // 坐标已在图像空间，变换取恒等
  renderer.resize(width, height);
  renderer.set_detection_result(Some(&result), width, height, width, height, 0, 0);
  renderer.render(&mut canvas);

  canvas.save(&args.output).context("无法保存标注结果")?;
  info!("标注结果已保存: {}", args.output.display());

  Ok(())
}
