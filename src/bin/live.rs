// 该文件是 Yunjian （云检） 项目的一部分。
// src/bin/live.rs - 目录帧流实时检测
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

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Parser;
use image::RgbImage;
use tracing::{info, warn};
use url::Url;

use yunjian::FromUrl;
use yunjian::client::HttpDetectionClient;
use yunjian::frame::RawFrame;
use yunjian::overlay::OverlayRenderer;
use yunjian::pipeline::{
  CameraSource, LiveError, LiveListener, LiveSession, MIN_PROCESS_INTERVAL_MS,
};
use yunjian::result::DetectionResult;

/// 目录帧流实时检测参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测服务地址
  #[arg(long, value_name = "ENDPOINT")]
  pub endpoint: Url,
  /// 帧图片目录（循环播放，模拟相机）
  #[arg(long, value_name = "FRAMES")]
  pub frames: PathBuf,
  /// 标注帧输出目录
  #[arg(long, value_name = "OUTPUT")]
  pub output: PathBuf,
  /// 最小处理间隔（毫秒）
  #[arg(long, value_name = "MS", default_value_t = MIN_PROCESS_INTERVAL_MS)]
  pub interval_ms: u64,
  /// 模拟相机出帧间隔（毫秒）
  #[arg(long, value_name = "MS", default_value_t = 100)]
  pub frame_gap_ms: u64,
}

/// 时间戳到源图片路径的近期映射，相机写入、回调查询
type RecentFrames = Arc<Mutex<HashMap<u64, PathBuf>>>;

/// 循环播放目录图片的相机替身
struct DirectoryCamera {
  paths: Vec<PathBuf>,
  cursor: usize,
  frame_gap: Duration,
  started: Instant,
  recent: RecentFrames,
}

impl DirectoryCamera {
  fn open(dir: &PathBuf, frame_gap: Duration, recent: RecentFrames) -> Result<Self> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
      .with_context(|| format!("无法读取帧目录 {}", dir.display()))?
      .filter_map(|entry| entry.ok().map(|e| e.path()))
      .filter(|p| {
        matches!(
          p.extension().and_then(|e| e.to_str()),
          Some("jpg" | "jpeg" | "png" | "bmp")
        )
      })
      .collect();
    paths.sort();
    if paths.is_empty() {
      bail!("帧目录为空: {}", dir.display());
    }
    info!("帧目录已打开: {} 帧", paths.len());
    Ok(Self {
      paths,
      cursor: 0,
      frame_gap,
      started: Instant::now(),
      recent,
    })
  }
}

impl CameraSource for DirectoryCamera {
  fn next_frame(&mut self) -> Result<Option<RawFrame>> {
    thread::sleep(self.frame_gap);

    let path = self.paths[self.cursor].clone();
    self.cursor = (self.cursor + 1) % self.paths.len();

    let rgb = image::open(&path)
      .with_context(|| format!("无法读取帧 {}", path.display()))?
      .to_rgb8();
    let timestamp_ms = self.started.elapsed().as_millis() as u64;

    let mut recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
    if recent.len() > 32 {
      recent.clear();
    }
    recent.insert(timestamp_ms, path);
    drop(recent);

    Ok(Some(rgb_to_planar_frame(&rgb, timestamp_ms)))
  }
}

/// 把 RGB 图像转为平面 YUV 4:2:0 帧（BT.601 全量程，2x2 色度平均）
fn rgb_to_planar_frame(rgb: &RgbImage, timestamp_ms: u64) -> RawFrame {
  let (width, height) = rgb.dimensions();
  let (w, h) = (width as usize, height as usize);
  let cw = w.div_ceil(2);
  let ch = h.div_ceil(2);

  let mut luma = vec![0u8; w * h];
  let mut cb_plane = vec![0u8; cw * ch];
  let mut cr_plane = vec![0u8; cw * ch];

  for y in 0..h {
    for x in 0..w {
      let image::Rgb([r, g, b]) = *rgb.get_pixel(x as u32, y as u32);
      let (r, g, b) = (r as f32, g as f32, b as f32);
      luma[y * w + x] = (0.299 * r + 0.587 * g + 0.114 * b).round().clamp(0.0, 255.0) as u8;
    }
  }
  for cy in 0..ch {
    for cx in 0..cw {
      let (mut cb_sum, mut cr_sum, mut count) = (0.0f32, 0.0f32, 0.0f32);
      for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
        let (x, y) = (cx * 2 + dx, cy * 2 + dy);
        if x < w && y < h {
          let image::Rgb([r, g, b]) = *rgb.get_pixel(x as u32, y as u32);
          let (r, g, b) = (r as f32, g as f32, b as f32);
          cb_sum += 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
          cr_sum += 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
          count += 1.0;
        }
      }
      cb_plane[cy * cw + cx] = (cb_sum / count).round().clamp(0.0, 255.0) as u8;
      cr_plane[cy * cw + cx] = (cr_sum / count).round().clamp(0.0, 255.0) as u8;
    }
  }

  RawFrame::new(luma, cb_plane, cr_plane, width, height, 0, timestamp_ms)
}

/// 把每次完成的结果画回源帧并落盘
struct AnnotatingListener {
  output: PathBuf,
  recent: RecentFrames,
}

impl AnnotatingListener {
  fn annotate(&self, result: &DetectionResult, frame_timestamp_ms: u64) -> Result<PathBuf> {
    let source = self
      .recent
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .remove(&frame_timestamp_ms)
      .with_context(|| format!("帧 {} 的源图片已不可追溯", frame_timestamp_ms))?;

    let mut canvas = image::open(&source)
      .with_context(|| format!("无法读取帧 {}", source.display()))?
      .to_rgb8();
    let (width, height) = canvas.dimensions();

    let mut renderer = OverlayRenderer::new();
    renderer.resize(width, height);
    renderer.set_detection_result(Some(result), width, height, width, height, 0, 0);
    renderer.render(&mut canvas);

    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S%.3f");
    let path = self.output.join(format!("detect-{}.png", stamp));
    canvas
      .save(&path)
      .with_context(|| format!("无法保存标注帧 {}", path.display()))?;
    Ok(path)
  }
}

impl LiveListener for AnnotatingListener {
  fn on_result(&self, result: DetectionResult, frame_timestamp_ms: u64) {
    info!(
      "帧 {}: 检测到 {} 个目标",
      frame_timestamp_ms,
      result.object_count()
    );
    if let Some(objects) = &result.detected_objects {
      for object in objects {
        info!("  - {} {}", object.label, object.confidence_as_percentage());
      }
    }

    match self.annotate(&result, frame_timestamp_ms) {
      Ok(path) => info!("标注帧已保存: {}", path.display()),
      Err(e) => warn!("标注帧 {} 失败: {}", frame_timestamp_ms, e),
    }
  }

  fn on_error(&self, error: &LiveError, frame_timestamp_ms: u64) {
    warn!("帧 {} 处理失败: {}", frame_timestamp_ms, error);
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("检测服务地址: {}", args.endpoint);
  info!("帧目录: {}", args.frames.display());
  info!("输出目录: {}", args.output.display());
  info!("最小处理间隔: {} ms", args.interval_ms);

  std::fs::create_dir_all(&args.output).context("无法创建输出目录")?;

  let recent: RecentFrames = Arc::new(Mutex::new(HashMap::new()));
  let camera = DirectoryCamera::open(
    &args.frames,
    Duration::from_millis(args.frame_gap_ms),
    recent.clone(),
  )?;
  let client = Arc::new(HttpDetectionClient::from_url(&args.endpoint)?);
  let listener = Arc::new(AnnotatingListener {
    output: args.output.clone(),
    recent,
  });

  let session = Arc::new(LiveSession::start_with_interval(
    camera,
    client,
    listener,
    args.interval_ms,
  ));

  let ctrlc_session = session.clone();
  ctrlc::set_handler(move || {
    info!("收到中断信号, 正在停止会话...");
    ctrlc_session.stop();
  })
  .context("无法注册中断信号处理")?;

  while session.is_running() {
    thread::sleep(Duration::from_millis(100));
  }

  info!("会话已结束");
  Ok(())
}
