// 该文件是 Yunjian （云检） 项目的一部分。
// src/client.rs - 检测服务客户端边界
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

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::FromUrl;
use crate::result::DetectionResult;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum ClientError {
  #[error("检测服务地址必须使用 http/https 方案, 实际为 '{0}'")]
  SchemeMismatch(String),
  #[error("检测请求失败: {0}")]
  Request(String),
  #[error("检测服务返回空响应")]
  EmptyResponse,
  #[error("响应解析失败: {0}")]
  Parse(#[from] serde_json::Error),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
}

/// 检测服务边界。
///
/// 管线不解释 HTTP 状态码：非 2xx、传输失败与空响应体在这里统一折叠为
/// 一次普通的请求失败。带 `error` 字段的响应是合法的失败结果，原样返回。
pub trait DetectionClient: Send + Sync {
  fn submit(&self, jpeg: &[u8]) -> Result<DetectionResult, ClientError>;

  /// 便捷入口：读取文件后提交
  fn submit_file(&self, path: &Path) -> Result<DetectionResult, ClientError> {
    let bytes = std::fs::read(path)?;
    self.submit(&bytes)
  }
}

/// 基于阻塞 HTTP 的默认客户端实现
pub struct HttpDetectionClient {
  agent: ureq::Agent,
  endpoint: Url,
}

impl FromUrl for HttpDetectionClient {
  type Error = ClientError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != "http" && url.scheme() != "https" {
      return Err(ClientError::SchemeMismatch(url.scheme().to_string()));
    }

    let agent = ureq::AgentBuilder::new()
      .timeout(REQUEST_TIMEOUT)
      .build();

    info!("检测客户端已创建: {}", url);
    Ok(Self {
      agent,
      endpoint: url.clone(),
    })
  }
}

impl DetectionClient for HttpDetectionClient {
  fn submit(&self, jpeg: &[u8]) -> Result<DetectionResult, ClientError> {
    debug!("提交检测请求: {} 字节", jpeg.len());

    let response = self
      .agent
      .post(self.endpoint.as_str())
      .set("Content-Type", "image/jpeg")
      .send_bytes(jpeg)
      .map_err(|e| ClientError::Request(e.to_string()))?;

    let body = response
      .into_string()
      .map_err(|e| ClientError::Request(e.to_string()))?;
    if body.trim().is_empty() {
      return Err(ClientError::EmptyResponse);
    }

    let result: DetectionResult = serde_json::from_str(&body)?;
    debug!(
      "检测响应: {} 个目标, 服务端耗时 {:?} ms",
      result.object_count(),
      result.processing_time_ms
    );
    Ok(result)
  }
}
