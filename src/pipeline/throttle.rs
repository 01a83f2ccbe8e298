// 该文件是 Yunjian （云检） 项目的一部分。
// src/pipeline/throttle.rs - 帧节流器
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

use std::sync::{Arc, Mutex};

use tracing::debug;

/// 默认最小帧间隔：每 500 毫秒至多处理一帧（约 2 FPS）
pub const MIN_PROCESS_INTERVAL_MS: u64 = 500;

/// 每个实时会话的管线状态。
///
/// 准入的检查置位与完成清零是仅有的两处修改点，共用同一把锁。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineState {
  /// 最近一次准入帧的采集时间戳（毫秒），尚无准入帧时为 None
  pub last_processed_timestamp_ms: Option<u64>,
  /// 已准入帧的检测请求是否尚未完成
  pub processing_in_flight: bool,
}

/// 帧节流器：限制逐帧重活的速率并阻止在途工作重叠。
///
/// 丢帧是静默的设计行为——相机帧率本就高于处理能力，拒绝不构成错误。
pub struct FrameThrottler {
  min_interval_ms: u64,
  state: Arc<Mutex<PipelineState>>,
}

impl FrameThrottler {
  pub fn new(min_interval_ms: u64) -> Self {
    Self {
      min_interval_ms,
      state: Arc::new(Mutex::new(PipelineState::default())),
    }
  }

  /// 判定采集时间戳为 `timestamp_ms` 的帧是否准入。
  ///
  /// 检查与置位在同一锁区间内完成：并发交付下不可能有两帧都通过检查。
  /// 准入即返回在途守卫，守卫在对应请求完成（成功或失败）时恰好清零一次。
  pub fn try_admit(&self, timestamp_ms: u64) -> Option<InFlightGuard> {
    let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

    if state.processing_in_flight {
      debug!("丢帧（在途处理未完成）: {}", timestamp_ms);
      return None;
    }
    if let Some(last) = state.last_processed_timestamp_ms
      && timestamp_ms.saturating_sub(last) < self.min_interval_ms
    {
      debug!("丢帧（距上次处理过近）: {}", timestamp_ms);
      return None;
    }

    state.processing_in_flight = true;
    state.last_processed_timestamp_ms = Some(timestamp_ms);
    Some(InFlightGuard {
      state: self.state.clone(),
    })
  }

  /// 会话停止时重置管线状态
  pub fn reset(&self) {
    let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
    *state = PipelineState::default();
  }

  pub fn snapshot(&self) -> PipelineState {
    *self.state.lock().unwrap_or_else(|e| e.into_inner())
  }
}

impl Default for FrameThrottler {
  fn default() -> Self {
    Self::new(MIN_PROCESS_INTERVAL_MS)
  }
}

/// 在途处理守卫。
///
/// 由完成对应请求的一方持有到最后；释放时清除在途标志，
/// 包括下游出错提前退出的路径。
pub struct InFlightGuard {
  state: Arc<Mutex<PipelineState>>,
}

impl Drop for InFlightGuard {
  fn drop(&mut self) {
    let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
    state.processing_in_flight = false;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn throttles_to_min_interval() {
    // 帧到达于 0/100/400/600 毫秒，间隔 500：仅 0 与 600 准入
    let throttler = FrameThrottler::new(500);
    let mut admitted = Vec::new();

    for t in [0u64, 100, 400, 600] {
      if let Some(guard) = throttler.try_admit(t) {
        admitted.push(t);
        drop(guard); // 即刻完成
      }
    }

    assert_eq!(admitted, vec![0, 600]);
  }

  #[test]
  fn in_flight_blocks_admission_until_completed() {
    let throttler = FrameThrottler::new(500);
    let guard = throttler.try_admit(0).expect("首帧应当准入");

    // 间隔已满足，但在途请求未完成
    assert!(throttler.try_admit(1000).is_none());

    drop(guard);
    assert!(throttler.try_admit(1000).is_some());
  }

  #[test]
  fn admitted_frames_never_closer_than_interval() {
    let throttler = FrameThrottler::new(500);
    let mut admitted = Vec::new();

    for t in (0u64..3000).step_by(100) {
      if let Some(guard) = throttler.try_admit(t) {
        admitted.push(t);
        drop(guard);
      }
    }

    for pair in admitted.windows(2) {
      assert!(pair[1] - pair[0] >= 500, "准入间隔过近: {:?}", pair);
    }
  }

  #[test]
  fn rejection_leaves_state_untouched() {
    let throttler = FrameThrottler::new(500);
    drop(throttler.try_admit(0));

    let before = throttler.snapshot();
    assert!(throttler.try_admit(100).is_none());
    assert_eq!(throttler.snapshot(), before);
  }

  #[test]
  fn reset_clears_session_state() {
    let throttler = FrameThrottler::new(500);
    let _guard = throttler.try_admit(0).unwrap();

    throttler.reset();
    assert_eq!(throttler.snapshot(), PipelineState::default());

    // 重置后首帧立即准入
    assert!(throttler.try_admit(0).is_some());
  }

  #[test]
  fn backwards_timestamp_is_rejected() {
    let throttler = FrameThrottler::new(500);
    drop(throttler.try_admit(1000).unwrap());
    assert!(throttler.try_admit(700).is_none());
  }
}
