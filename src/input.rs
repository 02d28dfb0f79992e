// 该文件是 Gangwan （港湾视觉） 项目的一部分。
// src/input.rs - 推理图像输入
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

use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

mod read_image_file;
pub use self::read_image_file::{UploadFile, UploadFileError};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("图像文件输入错误: {0}")]
  UploadFileError(#[from] UploadFileError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("URL 解析错误: {0}")]
  UrlError(#[from] url::ParseError),
}

/// 推理图像来源：远程地址或本地上传文件
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
  Url(Url),
  File(UploadFile),
}

impl ImageSource {
  /// 解析命令行或样本中的地址
  pub fn parse(input: &str) -> Result<Self, InputError> {
    let url = Url::parse(input)?;
    Self::from_url(&url)
  }

  pub fn describe(&self) -> String {
    match self {
      ImageSource::Url(url) => url.to_string(),
      ImageSource::File(file) => format!("{} ({} 字节)", file.file_name, file.bytes.len()),
    }
  }
}

impl FromUrl for ImageSource {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      "http" | "https" => Ok(ImageSource::Url(url.clone())),
      UploadFile::SCHEME | "file" => Ok(ImageSource::File(UploadFile::from_url(url)?)),
      other => Err(InputError::SchemeMismatch(other.to_string())),
    }
  }
}
