// 该文件是 Yunjian （云检） 项目的一部分。
// src/pipeline/mod.rs - 实时帧管线模块
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

mod live;
mod throttle;

pub use live::{LiveError, LiveListener, LiveSession};
pub use throttle::{FrameThrottler, InFlightGuard, MIN_PROCESS_INTERVAL_MS, PipelineState};

use anyhow::Result;

use crate::frame::RawFrame;

/// 相机采集边界。
///
/// 相机硬件绑定不在本库范围内；实现方负责交付带时间戳的原始帧，
/// 帧所有权随返回值一并移交，由管线保证每帧恰好释放一次。
pub trait CameraSource: Send {
  /// 取下一帧。`Ok(None)` 表示流结束；`Err` 对会话致命。
  fn next_frame(&mut self) -> Result<Option<RawFrame>>;
}
