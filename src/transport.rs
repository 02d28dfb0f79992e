// 该文件是 Gangwan （港湾视觉） 项目的一部分。
// src/transport.rs - 推理请求传输
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

use std::future::Future;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::input::UploadFile;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum TransportError {
  #[error("HTTP 请求错误: {0}")]
  Http(#[from] reqwest::Error),
  #[error("{0}")]
  Other(String),
}

/// 一次推理调用的出站请求。带文件时以 multipart 表单上传，否则无请求体。
#[derive(Debug, Clone)]
pub struct OutboundRequest {
  pub url: Url,
  pub file: Option<UploadFile>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
  pub status: u16,
  /// 状态码对应的原因短语
  pub reason: Option<String>,
  /// 读取失败时为 `None`
  pub body: Option<String>,
}

impl TransportResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// 发送推理请求的通道。返回时响应体应已完整读取。
pub trait Transport: Send + Sync {
  fn post(
    &self,
    request: OutboundRequest,
  ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
  client: reqwest::Client,
}

impl Default for ReqwestTransport {
  fn default() -> Self {
    Self::new()
  }
}

impl ReqwestTransport {
  pub fn new() -> Self {
    let client = reqwest::Client::builder()
      .timeout(REQUEST_TIMEOUT)
      .build()
      .unwrap_or_else(|e| {
        warn!("创建 HTTP 客户端失败，使用默认配置: {}", e);
        reqwest::Client::new()
      });
    Self { client }
  }

  pub fn with_client(client: reqwest::Client) -> Self {
    Self { client }
  }

  /// 下载远程图像，用于本地绘制结果
  pub async fn fetch(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
    let response = self.client.get(url.clone()).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
  }
}

impl Transport for ReqwestTransport {
  async fn post(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
    let mut builder = self.client.post(request.url);
    if let Some(file) = request.file {
      debug!("以 multipart 上传文件: {}", file.file_name);
      let part = Part::bytes(file.bytes)
        .file_name(file.file_name)
        .mime_str(file.mime)?;
      builder = builder.multipart(Form::new().part("file", part));
    }

    let response = builder.send().await?;
    let status = response.status();
    let body = match response.text().await {
      Ok(body) => Some(body),
      Err(e) => {
        warn!("读取响应体失败: {}", e);
        None
      }
    };

    Ok(TransportResponse {
      status: status.as_u16(),
      reason: status.canonical_reason().map(str::to_string),
      body,
    })
  }
}
