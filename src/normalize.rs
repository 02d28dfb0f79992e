// 该文件是 Gangwan （港湾视觉） 项目的一部分。
// src/normalize.rs - 推理结果归一化
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

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{
  color::{Color, LabelColors},
  service::{InferenceRuntime, RoboflowService},
};

/// 响应中缺失图像尺寸时使用的占位尺寸
pub const DEFAULT_IMAGE_WIDTH: f64 = 1920.0;
pub const DEFAULT_IMAGE_HEIGHT: f64 = 1080.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
  pub x: f64,
  pub y: f64,
}

/// 轴对齐矩形，`x`/`y` 为中心点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
  pub x: f64,
  pub y: f64,
  pub width: f64,
  pub height: f64,
}

impl BoundingBox {
  pub fn top_left(&self) -> Point {
    Point {
      x: self.x - self.width / 2.0,
      y: self.y - self.height / 2.0,
    }
  }

  pub fn bottom_right(&self) -> Point {
    Point {
      x: self.x + self.width / 2.0,
      y: self.y + self.height / 2.0,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionKind {
  Box,
  Segment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferencePrediction {
  pub id: String,
  pub label: String,
  /// 无法解析时为 NaN，序列化为 `null`，读回时还原为 NaN
  #[serde(deserialize_with = "nan_if_null")]
  pub confidence: f64,
  #[serde(rename = "type")]
  pub kind: PredictionKind,
  pub color: Color,
  #[serde(rename = "box", default, skip_serializing_if = "Option::is_none")]
  pub bbox: Option<BoundingBox>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub points: Option<Vec<Point>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageSize {
  pub width: f64,
  pub height: f64,
}

/// 渲染层依赖的唯一结果结构，与供应商的响应格式无关
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedInferenceResult {
  pub provider: String,
  pub runtime: InferenceRuntime,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub duration_ms: Option<f64>,
  pub image: ImageSize,
  pub predictions: Vec<InferencePrediction>,
  #[serde(default)]
  pub raw: Value,
}

impl NormalizedInferenceResult {
  pub fn is_empty(&self) -> bool {
    self.predictions.is_empty()
  }

  /// 平均置信度，没有结果时为 0
  pub fn mean_confidence(&self) -> f64 {
    if self.predictions.is_empty() {
      return 0.0;
    }
    self.predictions.iter().map(|p| p.confidence).sum::<f64>() / self.predictions.len() as f64
  }

  /// 各标签的结果数量，按标签排序
  pub fn label_counts(&self) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for prediction in &self.predictions {
      *counts.entry(prediction.label.as_str()).or_insert(0) += 1;
    }
    counts
  }
}

/// 将供应商响应翻译为 [`NormalizedInferenceResult`]，持有标签颜色映射
#[derive(Debug, Default)]
pub struct Normalizer {
  colors: LabelColors,
}

impl Normalizer {
  pub fn new(colors: LabelColors) -> Self {
    Self { colors }
  }

  pub fn colors(&self) -> &LabelColors {
    &self.colors
  }

  pub fn normalize_roboflow(
    &self,
    payload: Value,
    service: &RoboflowService,
    duration_ms: Option<f64>,
  ) -> NormalizedInferenceResult {
    let first = payload
      .get("predictions")
      .and_then(|p| p.get(0))
      .unwrap_or(&Value::Null);
    let dimension = |key: &str, default: f64| {
      payload
        .get("image")
        .and_then(|image| number(image.get(key)))
        .or_else(|| number(payload.get(key)))
        .or_else(|| number(first.get(key)))
        .unwrap_or(default)
    };
    let image = ImageSize {
      width: dimension("width", DEFAULT_IMAGE_WIDTH),
      height: dimension("height", DEFAULT_IMAGE_HEIGHT),
    };

    let predictions: Vec<InferencePrediction> = match payload.get("predictions") {
      Some(Value::Array(items)) => items
        .iter()
        .enumerate()
        .map(|(index, item)| self.normalize_prediction(item, index))
        .collect(),
      _ => Vec::new(),
    };

    debug!(
      "归一化完成: {} 个结果, 图像尺寸 {}x{}",
      predictions.len(),
      image.width,
      image.height
    );

    NormalizedInferenceResult {
      provider: service.name.clone(),
      runtime: service.runtime,
      duration_ms,
      image,
      predictions,
      raw: payload,
    }
  }

  fn normalize_prediction(&self, item: &Value, index: usize) -> InferencePrediction {
    let label = text(item.get("class"))
      .or_else(|| text(item.get("label")))
      .unwrap_or_else(|| format!("object-{}", index + 1));

    let confidence = match item.get("confidence") {
      None => 0.0,
      Some(value) => coerce_number(value),
    };

    let bbox = match (
      number(item.get("x")),
      number(item.get("y")),
      number(item.get("width")),
      number(item.get("height")),
    ) {
      (Some(x), Some(y), Some(width), Some(height)) => Some(BoundingBox {
        x,
        y,
        width,
        height,
      }),
      _ => None,
    };

    let points = item.get("points").and_then(decode_points);
    let kind = match &points {
      Some(points) if points.len() > 2 => PredictionKind::Segment,
      _ => PredictionKind::Box,
    };

    InferencePrediction {
      id: text(item.get("id")).unwrap_or_else(|| format!("{}-{}", label, index)),
      color: self.colors.color_for(&label),
      label,
      confidence,
      kind,
      bbox,
      points,
    }
  }
}

fn nan_if_null<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
  Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

fn number(value: Option<&Value>) -> Option<f64> {
  value.and_then(Value::as_f64)
}

/// 非空值转为字符串；字符串原样保留
fn text(value: Option<&Value>) -> Option<String> {
  match value? {
    Value::Null => None,
    Value::String(s) => Some(s.clone()),
    other => Some(other.to_string()),
  }
}

/// 宽松的数值转换：字符串去除首尾空白后解析，空串、`null` 为 0，布尔值为 1/0，其余为 NaN
fn coerce_number(value: &Value) -> f64 {
  match value {
    Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
    Value::Null => 0.0,
    Value::Bool(b) => f64::from(u8::from(*b)),
    Value::String(s) => {
      let s = s.trim();
      if s.is_empty() {
        0.0
      } else {
        s.parse().unwrap_or(f64::NAN)
      }
    }
    Value::Array(_) | Value::Object(_) => f64::NAN,
  }
}

/// 解析点列表。按顺序尝试三种格式，第一种结构匹配的生效：
///
/// 1. 坐标对序列 `[[x, y], ...]`
/// 2. 扁平序列 `[x0, y0, x1, y1, ...]`，长度必须为偶数
/// 3. 平行序列对象 `{ "x": [...], "y": [...] }`，两者长度相等
///
/// 空输入或无法识别的结构返回 `None`，永远不会返回空列表。
pub fn decode_points(raw: &Value) -> Option<Vec<Point>> {
  match raw {
    Value::Array(items) => match items.first()? {
      Value::Array(_) => items.iter().map(pair_point).collect(),
      Value::Number(_) => {
        if items.len() % 2 != 0 {
          return None;
        }
        let flat: Option<Vec<f64>> = items.iter().map(Value::as_f64).collect();
        Some(
          flat?
            .chunks_exact(2)
            .map(|xy| Point { x: xy[0], y: xy[1] })
            .collect(),
        )
      }
      _ => None,
    },
    Value::Object(map) => {
      let xs = map.get("x")?.as_array()?;
      let ys = map.get("y")?.as_array()?;
      if xs.is_empty() || xs.len() != ys.len() {
        return None;
      }
      xs.iter()
        .zip(ys)
        .map(|(x, y)| {
          Some(Point {
            x: x.as_f64()?,
            y: y.as_f64()?,
          })
        })
        .collect()
    }
    _ => None,
  }
}

fn pair_point(pair: &Value) -> Option<Point> {
  match pair.as_array()?.as_slice() {
    [x, y, ..] => Some(Point {
      x: x.as_f64()?,
      y: y.as_f64()?,
    }),
    _ => None,
  }
}
