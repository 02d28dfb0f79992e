// 该文件是 Gangwan （港湾视觉） 项目的一部分。
// src/color.rs - 标签颜色分配
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

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

/// RGB 颜色，序列化为 `#rrggbb`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(pub [u8; 3]);

impl Color {
  pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
    Color([r, g, b])
  }

  pub fn parse_hex(hex: &str) -> Option<Self> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
      return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Color([channel(0)?, channel(2)?, channel(4)?]))
  }
}

impl std::fmt::Display for Color {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let [r, g, b] = self.0;
    write!(f, "#{:02x}{:02x}{:02x}", r, g, b)
  }
}

impl Serialize for Color {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for Color {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let hex = String::deserialize(deserializer)?;
    Color::parse_hex(&hex)
      .ok_or_else(|| serde::de::Error::custom(format!("无效的颜色值: {}", hex)))
  }
}

/// 默认调色板
pub const PALETTE: [Color; 9] = [
  Color::rgb(0xf8, 0x71, 0x71),
  Color::rgb(0xfb, 0x92, 0x3c),
  Color::rgb(0xfb, 0xbf, 0x24),
  Color::rgb(0x34, 0xd3, 0x99),
  Color::rgb(0x60, 0xa5, 0xfa),
  Color::rgb(0xa7, 0x8b, 0xfa),
  Color::rgb(0xf4, 0x72, 0xb6),
  Color::rgb(0xf9, 0x73, 0x16),
  Color::rgb(0x2d, 0xd4, 0xbf),
];

/// 标签到颜色的映射。
///
/// 标签首次出现时按已分配数量对调色板取模分配颜色，之后一直复用；
/// 映射只增不减，调色板用尽后不同标签可能共用同一颜色。
#[derive(Debug)]
pub struct LabelColors {
  palette: Vec<Color>,
  assigned: Mutex<HashMap<String, Color>>,
}

impl Default for LabelColors {
  fn default() -> Self {
    Self::with_palette(PALETTE.to_vec())
  }
}

impl LabelColors {
  /// 使用自定义调色板，空调色板回退为默认调色板
  pub fn with_palette(palette: Vec<Color>) -> Self {
    let palette = if palette.is_empty() {
      PALETTE.to_vec()
    } else {
      palette
    };
    Self {
      palette,
      assigned: Mutex::new(HashMap::new()),
    }
  }

  pub fn color_for(&self, label: &str) -> Color {
    let mut assigned = self
      .assigned
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(color) = assigned.get(label) {
      return *color;
    }
    let color = self.palette[assigned.len() % self.palette.len()];
    debug!("为标签 {} 分配颜色 {}", label, color);
    assigned.insert(label.to_string(), color);
    color
  }

  pub fn palette(&self) -> &[Color] {
    &self.palette
  }

  /// 已分配颜色的标签数量
  pub fn len(&self) -> usize {
    self
      .assigned
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
      .len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
