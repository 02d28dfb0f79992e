// 该文件是 Gangwan （港湾视觉） 项目的一部分。
// src/output/json_record.rs - JSON 结果记录
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

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  normalize::NormalizedInferenceResult,
  output::{Render, decoded_path},
};

#[derive(Error, Debug)]
pub enum JsonRecordError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("路径解码错误: {0}")]
  PathDecodeError(#[from] std::string::FromUtf8Error),
  #[error("序列化错误: {0}")]
  SerializeError(#[from] serde_json::Error),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Record<'a> {
  recorded_at: String,
  result: &'a NormalizedInferenceResult,
}

/// 带记录时间的 JSON 文本
pub fn record_json(result: &NormalizedInferenceResult) -> Result<String, serde_json::Error> {
  serde_json::to_string_pretty(&Record {
    recorded_at: Utc::now().to_rfc3339(),
    result,
  })
}

pub(crate) fn write_record(path: &Path, result: &NormalizedInferenceResult) -> Result<(), JsonRecordError> {
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)?;
  }
  std::fs::write(path, record_json(result)?)?;
  Ok(())
}

pub struct JsonRecordOutput {
  path: PathBuf,
}

impl FromUrlWithScheme for JsonRecordOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonRecordOutput {
  type Error = JsonRecordError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonRecordError::SchemeMismatch(uri.scheme().to_string()));
    }
    Ok(JsonRecordOutput {
      path: decoded_path(uri)?,
    })
  }
}

impl<F: ?Sized> Render<F, NormalizedInferenceResult> for JsonRecordOutput {
  type Error = JsonRecordError;

  fn render_result(&self, _frame: &F, result: &NormalizedInferenceResult) -> Result<(), Self::Error> {
    write_record(&self.path, result)?;
    info!("保存推理结果到文件: {}", self.path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::normalize::ImageSize;
  use crate::service::InferenceRuntime;

  fn result() -> NormalizedInferenceResult {
    NormalizedInferenceResult {
      provider: "Roboflow".into(),
      runtime: InferenceRuntime::Microservice,
      duration_ms: Some(42.0),
      image: ImageSize { width: 640.0, height: 480.0 },
      predictions: Vec::new(),
      raw: serde_json::json!({ "predictions": [] }),
    }
  }

  #[test]
  fn record_wraps_result_with_timestamp() {
    let text = record_json(&result()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert!(value["recordedAt"].is_string());
    assert_eq!(value["result"]["provider"], "Roboflow");
    assert_eq!(value["result"]["image"]["width"], 640.0);
  }

  #[test]
  fn writes_to_url_path() {
    let dir = std::env::temp_dir().join(format!("gangwan-json-{}", std::process::id()));
    let path = dir.join("nested").join("result.json");
    let url = Url::parse(&format!("json://{}", path.display())).unwrap();
    let output = JsonRecordOutput::from_url(&url).unwrap();
    let frame: &[u8] = &[];
    output.render_result(frame, &result()).unwrap();
    assert!(path.exists());
    std::fs::remove_dir_all(&dir).unwrap();
  }
}
