// 该文件是 Gangwan （港湾视觉） 项目的一部分。
// src/output/viewport.rs - 结果坐标到显示坐标的映射
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

use crate::normalize::{BoundingBox, ImageSize, Point};

/// 显示坐标系中的矩形，`x`/`y` 为左上角
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRect {
  pub x: f64,
  pub y: f64,
  pub width: f64,
  pub height: f64,
}

/// 按比例把结果坐标（以 `result.image` 为坐标空间）映射到任意尺寸的显示面。
/// 同一结果可以在多个尺寸下渲染，结果本身不做缩放。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
  scale_x: f64,
  scale_y: f64,
}

impl Viewport {
  pub fn new(space: ImageSize, display_width: f64, display_height: f64) -> Self {
    Self {
      scale_x: scale(display_width, space.width),
      scale_y: scale(display_height, space.height),
    }
  }

  pub fn scale(&self) -> (f64, f64) {
    (self.scale_x, self.scale_y)
  }

  pub fn map_point(&self, point: Point) -> Point {
    Point {
      x: point.x * self.scale_x,
      y: point.y * self.scale_y,
    }
  }

  /// 中心点表示的框转换为显示坐标下以左上角表示的矩形
  pub fn map_box(&self, bbox: &BoundingBox) -> DisplayRect {
    let top_left = self.map_point(bbox.top_left());
    DisplayRect {
      x: top_left.x,
      y: top_left.y,
      width: bbox.width * self.scale_x,
      height: bbox.height * self.scale_y,
    }
  }
}

// 坐标空间无效时不缩放
fn scale(display: f64, space: f64) -> f64 {
  if space.is_finite() && space > 0.0 && display.is_finite() {
    display / space
  } else {
    1.0
  }
}
