// 该文件是 Gangwan （港湾视觉） 项目的一部分。
// src/output/draw.rs - 推理结果可视化
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

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut, draw_text_mut};
use imageproc::rect::Rect;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::{
  color::Color,
  normalize::{InferencePrediction, NormalizedInferenceResult, Point, PredictionKind},
  output::viewport::{DisplayRect, Viewport},
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 18.0;
const LABEL_TEXT_HEIGHT: i32 = 28;
const LABEL_MIN_WIDTH: u32 = 80;
const LABEL_CHAR_WIDTH: f32 = 10.0; // 每字符平均宽度（粗略估计）
const LABEL_TEXT_PADDING: i32 = 6;
const BOX_THICKNESS: u32 = 4;
const SEGMENT_THICKNESS: u32 = 2;

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("字体文件读取错误: {0}")]
  FontIoError(#[from] std::io::Error),
  #[error("字体无效: {0}")]
  InvalidFont(String),
  #[error("参数无效: {0}")]
  InvalidParam(String),
}

pub struct Draw {
  font_size: f32,
  label_text_height: i32,
  label_char_width: f32,
  box_thickness: u32,
  segment_thickness: u32,
  font: Option<FontVec>,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font_size: LABEL_FONT_SIZE,
      label_text_height: LABEL_TEXT_HEIGHT,
      label_char_width: LABEL_CHAR_WIDTH,
      box_thickness: BOX_THICKNESS,
      segment_thickness: SEGMENT_THICKNESS,
      font: None,
    }
  }
}

impl Draw {
  /// 从输出 URL 的查询参数读取绘制选项：`font`、`thickness`
  pub fn from_query(url: &Url) -> Result<Self, DrawError> {
    let mut draw = Draw::default();
    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "font" => draw = draw.with_font_file(value.as_ref())?,
        "thickness" => {
          let thickness: u32 = value
            .parse()
            .map_err(|_| DrawError::InvalidParam(format!("thickness={}", value)))?;
          draw.box_thickness = thickness.max(1);
        }
        other => debug!("忽略未知绘制参数: {}", other),
      }
    }
    Ok(draw)
  }

  pub fn with_font_file(mut self, path: impl AsRef<std::path::Path>) -> Result<Self, DrawError> {
    let data = std::fs::read(path)?;
    let font = FontVec::try_from_vec(data).map_err(|e| DrawError::InvalidFont(e.to_string()))?;
    self.font = Some(font);
    Ok(self)
  }

  pub fn box_thickness(&self) -> u32 {
    self.box_thickness
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  /// 在图像上绘制全部结果，坐标按图像实际尺寸等比例映射
  pub fn draw_result_on_image(&self, image: &mut RgbImage, result: &NormalizedInferenceResult) {
    if image.width() == 0 || image.height() == 0 {
      warn!("图像尺寸为零，跳过绘制");
      return;
    }
    let viewport = Viewport::new(result.image, image.width() as f64, image.height() as f64);
    for prediction in &result.predictions {
      match (prediction.kind, &prediction.points, &prediction.bbox) {
        (PredictionKind::Segment, Some(points), _) if points.len() > 2 => {
          self.draw_segment(image, &viewport, points, prediction)
        }
        (_, _, Some(bbox)) => {
          let rect = viewport.map_box(bbox);
          self.draw_box(image, rect, prediction);
        }
        _ => warn!("结果 {} 没有可绘制的位置信息", prediction.id),
      }
    }
  }

  fn draw_box(&self, image: &mut RgbImage, rect: DisplayRect, prediction: &InferencePrediction) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    let color = rgb(prediction.color);

    let x_min = (rect.x.floor() as i32).clamp(0, w - 1);
    let y_min = (rect.y.floor() as i32).clamp(0, h - 1);
    let x_max = ((rect.x + rect.width).ceil() as i32).clamp(0, w - 1);
    let y_max = ((rect.y + rect.height).ceil() as i32).clamp(0, h - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    // 由外向内逐层绘制边框
    for t in 0..self.box_thickness as i32 {
      let (left, top, right, bottom) = (x_min + t, y_min + t, x_max - t, y_max - t);
      if left >= right || top >= bottom {
        break;
      }
      for x in left..=right {
        image.put_pixel(x as u32, top as u32, color);
        image.put_pixel(x as u32, bottom as u32, color);
      }
      for y in top..=bottom {
        image.put_pixel(left as u32, y as u32, color);
        image.put_pixel(right as u32, y as u32, color);
      }
    }

    self.draw_label(image, x_min, (y_min - self.label_text_height).max(0), prediction);
  }

  fn draw_segment(
    &self,
    image: &mut RgbImage,
    viewport: &Viewport,
    points: &[Point],
    prediction: &InferencePrediction,
  ) {
    let color = rgb(prediction.color);
    let mapped: Vec<(f32, f32)> = points
      .iter()
      .map(|p| {
        let p = viewport.map_point(*p);
        (p.x as f32, p.y as f32)
      })
      .collect();

    for (i, start) in mapped.iter().enumerate() {
      let end = mapped[(i + 1) % mapped.len()];
      for t in 0..self.segment_thickness {
        let offset = t as f32;
        draw_line_segment_mut(
          image,
          (start.0 + offset, start.1),
          (end.0 + offset, end.1),
          color,
        );
      }
    }

    let (x, y) = mapped[0];
    self.draw_label(image, x as i32, y as i32, prediction);
  }

  fn draw_label(&self, image: &mut RgbImage, x: i32, y: i32, prediction: &InferencePrediction) {
    let Some(font) = &self.font else {
      return;
    };

    let label = format!("{} {:.1}%", prediction.label, prediction.confidence * 100.0);
    let text_width = (label.chars().count() as f32 * self.label_char_width) as u32;

    let label_x = x.clamp(0, image.width() as i32 - 1);
    let label_y = y.clamp(0, image.height() as i32 - 1);
    let max_width = (image.width() as i32 - label_x).max(0) as u32;
    let label_width = text_width.max(LABEL_MIN_WIDTH).min(max_width);
    let label_height = self.label_text_height as u32;

    if label_width == 0 {
      return;
    }

    let rect = Rect::at(label_x, label_y).of_size(label_width, label_height);
    draw_filled_rect_mut(image, rect, rgb(prediction.color));
    draw_text_mut(
      image,
      Rgb([255u8, 255u8, 255u8]),
      label_x + LABEL_TEXT_PADDING,
      label_y + (self.label_text_height - self.font_size as i32) / 2,
      PxScale::from(self.font_size),
      font,
      &label,
    );
  }
}

fn rgb(color: Color) -> Rgb<u8> {
  Rgb(color.0)
}
