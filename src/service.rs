// 该文件是 Gangwan （港湾视觉） 项目的一部分。
// src/service.rs - 推理服务描述与服务目录
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

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

const DEFAULT_IMAGE_PARAM: &str = "image";

/// 推理运行方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceRuntime {
  /// 调用远程 HTTP 微服务
  Microservice,
  /// 端侧（浏览器/设备）执行
  Edge,
}

impl std::fmt::Display for InferenceRuntime {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      InferenceRuntime::Microservice => write!(f, "microservice"),
      InferenceRuntime::Edge => write!(f, "edge"),
    }
  }
}

/// Roboflow 推理参数，未设置的项不会出现在请求中
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoboflowOptions {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub confidence: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub overlap: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub format: Option<String>,
}

impl RoboflowOptions {
  /// 按固定顺序列出已设置的查询参数
  pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::with_capacity(3);
    if let Some(confidence) = self.confidence {
      pairs.push(("confidence", confidence.to_string()));
    }
    if let Some(overlap) = self.overlap {
      pairs.push(("overlap", overlap.to_string()));
    }
    if let Some(format) = &self.format {
      pairs.push(("format", format.clone()));
    }
    pairs
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoboflowService {
  pub id: String,
  pub name: String,
  pub runtime: InferenceRuntime,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub endpoint: Url,
  pub version: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub doc_url: Option<Url>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image_param: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub options: Option<RoboflowOptions>,
}

impl RoboflowService {
  /// 图像 URL 所使用的查询参数名
  pub fn image_param(&self) -> &str {
    self.image_param.as_deref().unwrap_or(DEFAULT_IMAGE_PARAM)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebOnnxService {
  pub id: String,
  pub name: String,
  pub runtime: InferenceRuntime,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub model_url: Option<Url>,
}

/// 推理服务描述，以 `type` 字段区分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InferenceServiceConfig {
  #[serde(rename = "roboflow")]
  Roboflow(RoboflowService),
  #[serde(rename = "web-onnx")]
  WebOnnx(WebOnnxService),
}

impl InferenceServiceConfig {
  pub fn id(&self) -> &str {
    match self {
      InferenceServiceConfig::Roboflow(service) => &service.id,
      InferenceServiceConfig::WebOnnx(service) => &service.id,
    }
  }

  pub fn name(&self) -> &str {
    match self {
      InferenceServiceConfig::Roboflow(service) => &service.name,
      InferenceServiceConfig::WebOnnx(service) => &service.name,
    }
  }

  pub fn runtime(&self) -> InferenceRuntime {
    match self {
      InferenceServiceConfig::Roboflow(service) => service.runtime,
      InferenceServiceConfig::WebOnnx(service) => service.runtime,
    }
  }

  pub fn type_tag(&self) -> &'static str {
    match self {
      InferenceServiceConfig::Roboflow(_) => "roboflow",
      InferenceServiceConfig::WebOnnx(_) => "web-onnx",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
  Image,
  Video,
}

/// 推理测试样本，附带离线基线指标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceSample {
  pub id: String,
  pub name: String,
  #[serde(rename = "type")]
  pub kind: SampleKind,
  pub thumbnail: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub detections: u32,
  #[serde(default)]
  pub confidence: f64,
  #[serde(default)]
  pub latency: f64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub media_url: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input_hint: Option<String>,
}

impl InferenceSample {
  /// 样本图像地址，优先使用原始媒体，其次缩略图
  pub fn image_url(&self) -> &str {
    self.media_url.as_deref().unwrap_or(&self.thumbnail)
  }
}

#[derive(Error, Debug)]
pub enum CatalogError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("服务目录解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
  #[error("当前模型未配置推理服务")]
  NoService,
  #[error("未找到推理服务: {0}")]
  ServiceNotFound(String),
  #[error("未找到测试样本: {0}")]
  SampleNotFound(String),
}

/// 模型的推理配置：可用服务与测试样本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceCatalog {
  pub default_model_version: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default_service_id: Option<String>,
  #[serde(default)]
  pub services: Vec<InferenceServiceConfig>,
  #[serde(default)]
  pub samples: Vec<InferenceSample>,
}

impl InferenceCatalog {
  pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
    let path = path.as_ref();
    info!("加载推理服务目录: {}", path.display());
    let data = std::fs::read_to_string(path)?;
    let catalog: InferenceCatalog = serde_json::from_str(&data)?;
    debug!(
      "服务数量: {}, 样本数量: {}",
      catalog.services.len(),
      catalog.samples.len()
    );
    Ok(catalog)
  }

  /// 选择推理服务：显式指定 > 默认服务 > 第一个服务
  pub fn select_service(&self, id: Option<&str>) -> Result<&InferenceServiceConfig, CatalogError> {
    if self.services.is_empty() {
      return Err(CatalogError::NoService);
    }

    match id.or(self.default_service_id.as_deref()) {
      Some(id) => self
        .services
        .iter()
        .find(|service| service.id() == id)
        .ok_or_else(|| CatalogError::ServiceNotFound(id.to_string())),
      None => Ok(&self.services[0]),
    }
  }

  /// 选择测试样本：显式指定 > 第一个样本；没有样本时返回 `None`
  pub fn select_sample(&self, id: Option<&str>) -> Result<Option<&InferenceSample>, CatalogError> {
    match id {
      Some(id) => self
        .samples
        .iter()
        .find(|sample| sample.id == id)
        .map(Some)
        .ok_or_else(|| CatalogError::SampleNotFound(id.to_string())),
      None => Ok(self.samples.first()),
    }
  }
}
