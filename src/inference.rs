// 该文件是 Gangwan （港湾视觉） 项目的一部分。
// src/inference.rs - 推理服务调用
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

use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  cancel::CancellationToken,
  input::ImageSource,
  key::ApiKeySources,
  normalize::{NormalizedInferenceResult, Normalizer},
  service::{InferenceServiceConfig, RoboflowService},
  transport::{OutboundRequest, Transport, TransportError},
};

#[derive(Error, Debug)]
pub enum InferenceError {
  #[error("未检测到 ROBO_API_KEY")]
  MissingApiKey,
  #[error("请选择测试样本或上传图片")]
  NoSample,
  #[error("推理服务地址无效: {0}")]
  InvalidEndpoint(String),
  #[error("远程推理请求失败: {status} {message}")]
  RequestFailed { status: u16, message: String },
  #[error("远程推理请求失败: {0}")]
  Transport(#[from] TransportError),
  #[error("远程推理返回的不是合法 JSON: {0}")]
  MalformedResponse(String),
  #[error("{0} 推理尚未实现")]
  NotImplemented(String),
  #[error("推理请求已取消")]
  Cancelled,
}

/// 错误分类，供界面决定如何展示
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// 配置问题，未发出任何网络请求
  Configuration,
  /// 网络或服务端拒绝
  Transport,
  /// 服务端有响应但内容无法解析
  MalformedResponse,
  /// 服务类型没有实现
  Unsupported,
  /// 调用方主动取消
  Cancelled,
}

impl InferenceError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      InferenceError::MissingApiKey | InferenceError::NoSample | InferenceError::InvalidEndpoint(_) => {
        ErrorKind::Configuration
      }
      InferenceError::RequestFailed { .. } | InferenceError::Transport(_) => ErrorKind::Transport,
      InferenceError::MalformedResponse(_) => ErrorKind::MalformedResponse,
      InferenceError::NotImplemented(_) => ErrorKind::Unsupported,
      InferenceError::Cancelled => ErrorKind::Cancelled,
    }
  }

  pub fn is_cancelled(&self) -> bool {
    self.kind() == ErrorKind::Cancelled
  }
}

/// 一次推理调用的参数
#[derive(Debug, Clone)]
pub struct InferenceRequest<'a> {
  pub service: &'a InferenceServiceConfig,
  pub image: Option<ImageSource>,
  /// 显式传入的密钥，优先于全局配置
  pub api_key: Option<String>,
  pub cancel: Option<CancellationToken>,
}

impl<'a> InferenceRequest<'a> {
  pub fn new(service: &'a InferenceServiceConfig) -> Self {
    Self {
      service,
      image: None,
      api_key: None,
      cancel: None,
    }
  }

  pub fn image(mut self, image: ImageSource) -> Self {
    self.image = Some(image);
    self
  }

  pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
    self.api_key = Some(api_key.into());
    self
  }

  pub fn cancel(mut self, cancel: CancellationToken) -> Self {
    self.cancel = Some(cancel);
    self
  }
}

/// 推理客户端：发出请求并把响应交给归一化器
pub struct InferenceClient<T> {
  transport: T,
  keys: ApiKeySources,
  normalizer: Normalizer,
}

impl<T: Transport> InferenceClient<T> {
  pub fn new(transport: T, keys: ApiKeySources) -> Self {
    Self::with_normalizer(transport, keys, Normalizer::default())
  }

  pub fn with_normalizer(transport: T, keys: ApiKeySources, normalizer: Normalizer) -> Self {
    Self {
      transport,
      keys,
      normalizer,
    }
  }

  pub fn transport(&self) -> &T {
    &self.transport
  }

  pub fn normalizer(&self) -> &Normalizer {
    &self.normalizer
  }

  pub async fn run(
    &self,
    request: &InferenceRequest<'_>,
  ) -> Result<NormalizedInferenceResult, InferenceError> {
    match request.service {
      InferenceServiceConfig::Roboflow(service) => self.run_roboflow(service, request).await,
      InferenceServiceConfig::WebOnnx(service) => {
        warn!("服务 {} 为 Web ONNX 推理，尚未实现", service.id);
        Err(InferenceError::NotImplemented("Web ONNX".to_string()))
      }
    }
  }

  async fn run_roboflow(
    &self,
    service: &RoboflowService,
    request: &InferenceRequest<'_>,
  ) -> Result<NormalizedInferenceResult, InferenceError> {
    let api_key = self
      .keys
      .resolve(request.api_key.as_deref())
      .ok_or(InferenceError::MissingApiKey)?;
    let outbound = build_roboflow_request(service, api_key, request.image.as_ref())?;

    if request.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
      return Err(InferenceError::Cancelled);
    }

    info!("调用推理服务: {} ({})", service.name, service.endpoint);
    let started = Instant::now();
    let response = match &request.cancel {
      Some(cancel) => tokio::select! {
        biased;
        _ = cancel.cancelled() => {
          warn!("推理请求已取消");
          return Err(InferenceError::Cancelled);
        }
        response = self.transport.post(outbound) => response?,
      },
      None => self.transport.post(outbound).await?,
    };
    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
    debug!("推理服务响应: HTTP {}, 耗时 {:.1} ms", response.status, duration_ms);

    if !response.is_success() {
      let message = response
        .body
        .or(response.reason)
        .unwrap_or_default();
      return Err(InferenceError::RequestFailed {
        status: response.status,
        message,
      });
    }

    let body = response
      .body
      .ok_or_else(|| InferenceError::MalformedResponse("响应体不可读".to_string()))?;
    let payload: serde_json::Value =
      serde_json::from_str(&body).map_err(|e| InferenceError::MalformedResponse(e.to_string()))?;

    let result = self
      .normalizer
      .normalize_roboflow(payload, service, Some(duration_ms));
    info!(
      "推理完成: {} 个结果, 耗时 {:.1} ms",
      result.predictions.len(),
      duration_ms
    );
    Ok(result)
  }
}

/// 构造 Roboflow 请求：密钥与已设置的参数放入查询串，
/// 文件以 multipart 上传，否则图像地址作为查询参数。
/// 服务地址中已有的同名参数会被覆盖，其余参数原样保留。
pub fn build_roboflow_request(
  service: &RoboflowService,
  api_key: &str,
  image: Option<&ImageSource>,
) -> Result<OutboundRequest, InferenceError> {
  let mut url: Url = service.endpoint.clone();
  if url.cannot_be_a_base() {
    return Err(InferenceError::InvalidEndpoint(url.to_string()));
  }

  let mut params: Vec<(&str, String)> = vec![("api_key", api_key.to_string())];
  if let Some(options) = &service.options {
    params.extend(options.query_pairs());
  }

  let file = match image {
    Some(ImageSource::File(file)) => Some(file.clone()),
    Some(ImageSource::Url(image_url)) => {
      params.push((service.image_param(), image_url.to_string()));
      None
    }
    None => return Err(InferenceError::NoSample),
  };

  let kept: Vec<(String, String)> = url
    .query_pairs()
    .into_owned()
    .filter(|(key, _)| params.iter().all(|(name, _)| *name != key.as_str()))
    .collect();
  url
    .query_pairs_mut()
    .clear()
    .extend_pairs(kept)
    .extend_pairs(params);

  Ok(OutboundRequest { url, file })
}
