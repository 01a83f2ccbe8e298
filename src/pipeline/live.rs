// 该文件是 Yunjian （云检） 项目的一部分。
// src/pipeline/live.rs - 实时检测会话
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

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::client::{ClientError, DetectionClient};
use crate::codec::{self, CodecError};
use crate::pipeline::{CameraSource, FrameThrottler, MIN_PROCESS_INTERVAL_MS};
use crate::result::DetectionResult;

#[derive(Error, Debug)]
pub enum LiveError {
  /// 单帧编码失败，非致命
  #[error("帧编码失败: {0}")]
  Codec(#[from] CodecError),
  /// 单帧传输失败，非致命
  #[error("检测请求失败: {0}")]
  Client(#[from] ClientError),
  /// 相机绑定失败，对会话致命
  #[error("相机采集失败: {0}")]
  Camera(String),
}

/// 实时检测回调。
///
/// 完成按到达顺序交付（后写者胜），不按时间戳重排；需要帧级同步的调用方
/// 应自行利用每次回调携带的采集时间戳。回调方负责把渲染调用转交到
/// 自己的 UI 执行上下文，渲染器状态不支持并发修改。
pub trait LiveListener: Send + Sync {
  fn on_result(&self, result: DetectionResult, frame_timestamp_ms: u64);
  fn on_error(&self, error: &LiveError, frame_timestamp_ms: u64);
}

/// 实时检测会话。
///
/// 帧交付跑在专用的单工作线程上；检测请求是唯一的异步边界，
/// 派发后立即归还控制权，完成经由 `LiveListener` 回调。
/// 节流器的在途标志保证任意时刻至多一个请求在途。
pub struct LiveSession {
  stopped: Arc<AtomicBool>,
  throttler: Arc<FrameThrottler>,
}

impl LiveSession {
  /// 以默认帧间隔启动会话
  pub fn start(
    source: impl CameraSource + 'static,
    client: Arc<dyn DetectionClient>,
    listener: Arc<dyn LiveListener>,
  ) -> Self {
    Self::start_with_interval(source, client, listener, MIN_PROCESS_INTERVAL_MS)
  }

  pub fn start_with_interval(
    mut source: impl CameraSource + 'static,
    client: Arc<dyn DetectionClient>,
    listener: Arc<dyn LiveListener>,
    min_interval_ms: u64,
  ) -> Self {
    let stopped = Arc::new(AtomicBool::new(false));
    let throttler = Arc::new(FrameThrottler::new(min_interval_ms));

    let worker_stopped = stopped.clone();
    let worker_throttler = throttler.clone();
    let worker = move || {
      info!("实时会话启动, 帧间隔 {} ms", min_interval_ms);

      while !worker_stopped.load(Ordering::SeqCst) {
        let frame = match source.next_frame() {
          Ok(Some(frame)) => frame,
          Ok(None) => {
            info!("相机流结束, 会话停止");
            break;
          }
          Err(e) => {
            // 会话级失败：报告一次后转入停止态，须由调用方显式重启
            error!("相机采集失败: {}", e);
            worker_stopped.store(true, Ordering::SeqCst);
            listener.on_error(&LiveError::Camera(e.to_string()), 0);
            break;
          }
        };

        let timestamp_ms = frame.timestamp_ms();
        let Some(guard) = worker_throttler.try_admit(timestamp_ms) else {
          // 静默丢帧，帧随作用域释放回缓冲池
          continue;
        };

        let jpeg = match codec::encode_jpeg(&frame) {
          Ok(jpeg) => jpeg,
          Err(e) => {
            warn!("帧 {} 编码失败: {}", timestamp_ms, e);
            listener.on_error(&LiveError::Codec(e), timestamp_ms);
            drop(guard); // 清除在途标志，下一有效帧可准入
            continue;
          }
        };
        drop(frame); // 上传前即归还帧缓冲

        // 派发后立即返回取下一帧；完成线程持有守卫直到请求了结
        let client = client.clone();
        let listener = listener.clone();
        let request_stopped = worker_stopped.clone();
        thread::spawn(move || {
          let outcome = client.submit(&jpeg);
          if request_stopped.load(Ordering::SeqCst) {
            debug!("会话已停止, 丢弃帧 {} 的完成结果", timestamp_ms);
            drop(guard);
            return;
          }
          match outcome {
            Ok(result) => listener.on_result(result, timestamp_ms),
            Err(e) => listener.on_error(&LiveError::Client(e), timestamp_ms),
          }
          drop(guard);
        });
      }

      // 相机流自然结束不触发停止态：在途完成照常交付，直到调用方显式停止
      debug!("帧交付线程退出");
    };
    thread::Builder::new()
      .name("yunjian-frames".to_string())
      .spawn(worker)
      .expect("无法创建帧交付线程");

    Self { stopped, throttler }
  }

  /// 停止会话：不再准入新帧，工作线程随之释放相机绑定并重置管线状态。
  /// 在途请求任其完成或失败，结果被丢弃；不做阻塞等待。重复调用安全。
  pub fn stop(&self) {
    if self.stopped.swap(true, Ordering::SeqCst) {
      return;
    }
    self.throttler.reset();
    info!("实时会话停止");
  }

  pub fn is_running(&self) -> bool {
    !self.stopped.load(Ordering::SeqCst)
  }
}

impl Drop for LiveSession {
  fn drop(&mut self) {
    self.stop();
  }
}
