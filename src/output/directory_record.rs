// 该文件是 Gangwan （港湾视觉） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use chrono::{Datelike, Utc};
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  FromUrl, FromUrlWithScheme,
  normalize::NormalizedInferenceResult,
  output::{
    Render, decoded_path,
    draw::{Draw, DrawError},
    json_record::{JsonRecordError, write_record},
    save_image_file::{SaveImageFileError, draw_on_frame, save_image},
  },
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("图像保存错误: {0}")]
  SaveImageError(#[from] SaveImageFileError),
  #[error("记录写入错误: {0}")]
  RecordError(#[from] JsonRecordError),
  #[error("绘制参数错误: {0}")]
  DrawError(#[from] DrawError),
  #[error("路径解码错误: {0}")]
  PathDecodeError(#[from] std::string::FromUtf8Error),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 按日期分目录保存叠加图像与 JSON 记录：`<dir>/YYYY/MM/DD/HH-MM-SS-XXXX.{png,json}`。
/// 默认跳过没有结果的推理，`?always` 时总是保存。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: Draw,
  frame_counter: Mutex<u16>,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: decoded_path(uri)?,
      draw: Draw::from_query(uri)?,
      frame_counter: Mutex::new(0),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_id(&self) -> u16 {
    let mut counter = self
      .frame_counter
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner());
    *counter = counter.wrapping_add(1);
    *counter
  }

  fn frame_path(&self) -> Result<PathBuf, std::io::Error> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl Render<[u8], NormalizedInferenceResult> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &[u8], result: &NormalizedInferenceResult) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      debug!("没有推理结果，跳过记录");
      return Ok(());
    }

    let path = self.frame_path()?;
    let image = draw_on_frame(&self.draw, frame, result)?;
    save_image(&path, &image)?;
    write_record(&path.with_extension("json"), result)?;
    info!("记录推理结果: {}", path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::normalize::ImageSize;
  use crate::service::InferenceRuntime;
  use image::{ImageFormat, RgbImage};
  use std::io::Cursor;
  use url::Url;

  fn empty_result() -> NormalizedInferenceResult {
    NormalizedInferenceResult {
      provider: "test".into(),
      runtime: InferenceRuntime::Microservice,
      duration_ms: None,
      image: ImageSize { width: 8.0, height: 8.0 },
      predictions: Vec::new(),
      raw: serde_json::Value::Null,
    }
  }

  fn png_bytes() -> Vec<u8> {
    let mut bytes = Vec::new();
    RgbImage::new(8, 8)
      .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
      .unwrap();
    bytes
  }

  fn files_under(dir: &std::path::Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
      let Ok(entries) = std::fs::read_dir(&current) else {
        continue;
      };
      for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
          stack.push(path);
        } else {
          files.push(path);
        }
      }
    }
    files
  }

  #[test]
  fn skips_empty_results_unless_always() {
    let dir = std::env::temp_dir().join(format!("gangwan-folder-{}", std::process::id()));

    let output = DirectoryRecordOutput::from_url(&Url::parse(&format!("folder://{}", dir.display())).unwrap()).unwrap();
    output.render_result(png_bytes().as_slice(), &empty_result()).unwrap();
    assert!(files_under(&dir).is_empty());

    let always = DirectoryRecordOutput::from_url(&Url::parse(&format!("folder://{}?always", dir.display())).unwrap()).unwrap();
    always.render_result(png_bytes().as_slice(), &empty_result()).unwrap();
    let files = files_under(&dir);
    assert_eq!(files.len(), 2);
    assert!(files.iter().any(|f| f.extension().is_some_and(|e| e == "png")));
    assert!(files.iter().any(|f| f.extension().is_some_and(|e| e == "json")));

    std::fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  fn frame_ids_increase() {
    let output = DirectoryRecordOutput::from_url(&Url::parse("folder:///tmp/gangwan-ids").unwrap()).unwrap();
    assert_eq!(output.frame_id(), 1);
    assert_eq!(output.frame_id(), 2);
  }
}
