// 该文件是 Gangwan （港湾视觉） 项目的一部分。
// src/output.rs - 输出定义
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

use crate::FromUrl;
use crate::FromUrlWithScheme;
use crate::normalize::NormalizedInferenceResult;
use thiserror::Error;
use url::Url;

/// 将推理结果输出到某处。`Frame` 为编码后的原始图像字节。
pub trait Render<Frame: ?Sized, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

pub mod viewport;
pub use self::viewport::{DisplayRect, Viewport};

mod json_record;
pub use self::json_record::{JsonRecordError, JsonRecordOutput, record_json};

#[cfg(feature = "save_image_file")]
pub mod draw;

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("JSON 记录输出错误: {0}")]
  JsonRecordError(#[from] JsonRecordError),
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  JsonRecordOutput(JsonRecordOutput),
  #[cfg(feature = "save_image_file")]
  SaveImageFileOutput(SaveImageFileOutput),
  #[cfg(feature = "directory_record")]
  DirectoryRecordOutput(DirectoryRecordOutput),
}

impl OutputWrapper {
  /// 是否需要原始图像才能输出
  pub fn needs_image(&self) -> bool {
    match self {
      OutputWrapper::JsonRecordOutput(_) => false,
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(_) => true,
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(_) => true,
    }
  }
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      JsonRecordOutput::SCHEME => {
        let output = JsonRecordOutput::from_url(url)?;
        Ok(OutputWrapper::JsonRecordOutput(output))
      }
      #[cfg(feature = "save_image_file")]
      SaveImageFileOutput::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveImageFileOutput(output))
      }
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => {
        let output = DirectoryRecordOutput::from_url(url)?;
        Ok(OutputWrapper::DirectoryRecordOutput(output))
      }
      other => Err(OutputError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Render<[u8], NormalizedInferenceResult> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &[u8], result: &NormalizedInferenceResult) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::JsonRecordOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
    }
  }
}

/// 把输出 URL 中的路径解码为本地路径
pub(crate) fn decoded_path(url: &Url) -> Result<std::path::PathBuf, std::string::FromUtf8Error> {
  Ok(std::path::PathBuf::from(urlencoding::decode(url.path())?.into_owned()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn picks_output_by_scheme() {
    let json = OutputWrapper::from_url(&Url::parse("json:///tmp/result.json").unwrap()).unwrap();
    assert!(matches!(json, OutputWrapper::JsonRecordOutput(_)));
    assert!(!json.needs_image());

    assert!(matches!(
      OutputWrapper::from_url(&Url::parse("rtsp://host/stream").unwrap()),
      Err(OutputError::SchemeMismatch(_))
    ));
  }

  #[cfg(feature = "save_image_file")]
  #[test]
  fn image_output_needs_image() {
    let image = OutputWrapper::from_url(&Url::parse("image:///tmp/out.png").unwrap()).unwrap();
    assert!(image.needs_image());
  }
}
