// 该文件是 Gangwan （港湾视觉） 项目的一部分。
// src/input/read_image_file.rs - 本地图像文件上传
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

use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

#[derive(Error, Debug)]
pub enum UploadFileError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("路径解码错误: {0}")]
  PathDecodeError(#[from] std::string::FromUtf8Error),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 以 multipart 方式上传的图像文件
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
  pub path: PathBuf,
  pub file_name: String,
  pub mime: &'static str,
  pub bytes: Vec<u8>,
}

impl FromUrlWithScheme for UploadFile {
  const SCHEME: &'static str = "image";
}

impl FromUrl for UploadFile {
  type Error = UploadFileError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME && url.scheme() != "file" {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(UploadFileError::SchemeMismatch(url.scheme().to_string()));
    }

    let path = urlencoding::decode(url.path())?;
    UploadFile::read(&*path)
  }
}

impl UploadFile {
  pub fn read(path: impl AsRef<Path>) -> Result<Self, UploadFileError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    debug!("读取图像文件: {} ({} 字节)", path.display(), bytes.len());
    Ok(Self::from_bytes(path, bytes))
  }

  pub fn from_bytes(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
    let path = path.into();
    let file_name = path
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_else(|| "upload".to_string());
    let mime = guess_mime(&path);
    Self {
      path,
      file_name,
      mime,
      bytes,
    }
  }
}

fn guess_mime(path: &Path) -> &'static str {
  let extension = path
    .extension()
    .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    .unwrap_or_default();
  match extension.as_str() {
    "jpg" | "jpeg" => "image/jpeg",
    "png" => "image/png",
    "bmp" => "image/bmp",
    "gif" => "image/gif",
    "webp" => "image/webp",
    _ => "application/octet-stream",
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn file_name_and_mime_from_path() {
    let file = UploadFile::from_bytes("/data/samples/Yard 01.JPG", vec![1, 2, 3]);
    assert_eq!(file.file_name, "Yard 01.JPG");
    assert_eq!(file.mime, "image/jpeg");
    assert_eq!(file.bytes, vec![1, 2, 3]);
  }

  #[test]
  fn unknown_extension_is_octet_stream() {
    let file = UploadFile::from_bytes("/data/blob", Vec::new());
    assert_eq!(file.mime, "application/octet-stream");
    assert_eq!(file.file_name, "blob");
  }

  #[test]
  fn reads_percent_encoded_path() {
    let dir = std::env::temp_dir().join(format!("gangwan-upload-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("gate sample.png");
    std::fs::write(&path, b"png-bytes").unwrap();

    let url = Url::from_file_path(&path).unwrap();
    let file = UploadFile::from_url(&url).unwrap();
    assert_eq!(file.bytes, b"png-bytes");
    assert_eq!(file.mime, "image/png");
    assert_eq!(file.file_name, "gate sample.png");

    std::fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  fn rejects_other_schemes() {
    let url = Url::parse("https://example.com/a.png").unwrap();
    assert!(matches!(
      UploadFile::from_url(&url),
      Err(UploadFileError::SchemeMismatch(_))
    ));
  }
}
