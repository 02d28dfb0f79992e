// 该文件是 Gangwan （港湾视觉） 项目的一部分。
// src/output/save_image_file.rs - 保存叠加结果的图像文件
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

use image::RgbImage;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  normalize::NormalizedInferenceResult,
  output::{
    Render, decoded_path,
    draw::{Draw, DrawError},
  },
};

pub struct SaveImageFileOutput {
  path: PathBuf,
  draw: Draw,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("绘制参数错误: {0}")]
  DrawError(#[from] DrawError),
  #[error("路径解码错误: {0}")]
  PathDecodeError(#[from] std::string::FromUtf8Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(SaveImageFileOutput {
      path: decoded_path(uri)?,
      draw: Draw::from_query(uri)?,
    })
  }
}

/// 解码原始图像并绘制结果
pub(crate) fn draw_on_frame(
  draw: &Draw,
  frame: &[u8],
  result: &NormalizedInferenceResult,
) -> Result<RgbImage, image::ImageError> {
  let mut image = image::load_from_memory(frame)?.to_rgb8();
  draw.draw_result_on_image(&mut image, result);
  Ok(image)
}

pub(crate) fn save_image(path: &Path, image: &RgbImage) -> Result<(), SaveImageFileError> {
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)?;
  }
  image.save(path)?;
  Ok(())
}

impl Render<[u8], NormalizedInferenceResult> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &[u8], result: &NormalizedInferenceResult) -> Result<(), Self::Error> {
    let image = draw_on_frame(&self.draw, frame, result)?;
    save_image(&self.path, &image)?;
    info!("保存图像到文件: {}", self.path.display());
    Ok(())
  }
}
