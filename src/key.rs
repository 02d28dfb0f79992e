// 该文件是 Gangwan （港湾视觉） 项目的一部分。
// src/key.rs - 推理服务密钥解析
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

use tracing::debug;

/// 运行时读取密钥所用的环境变量名
pub const API_KEY_ENV: &str = "ROBO_API_KEY";

/// 编译期嵌入密钥所用的环境变量名
pub const BUILD_API_KEY_ENV: &str = "GANGWAN_ROBO_API_KEY";

/// 全局密钥来源。请求中显式传入的密钥优先级最高，见 [`ApiKeySources::resolve`]。
#[derive(Debug, Clone, Default)]
pub struct ApiKeySources {
  runtime: Option<String>,
  build: Option<String>,
}

impl ApiKeySources {
  pub fn new(runtime: Option<String>, build: Option<String>) -> Self {
    Self {
      runtime: non_empty(runtime),
      build: non_empty(build),
    }
  }

  /// 运行时读取 [`API_KEY_ENV`]，编译期读取 [`BUILD_API_KEY_ENV`]
  pub fn from_env() -> Self {
    Self::new(
      std::env::var(API_KEY_ENV).ok(),
      option_env!("GANGWAN_ROBO_API_KEY").map(str::to_string),
    )
  }

  /// 不含任何全局密钥
  pub fn none() -> Self {
    Self::default()
  }

  /// 按 显式指定 > 运行时 > 编译期 的顺序解析密钥
  pub fn resolve<'a>(&'a self, explicit: Option<&'a str>) -> Option<&'a str> {
    if let Some(key) = explicit.filter(|key| !key.is_empty()) {
      debug!("使用显式传入的密钥");
      return Some(key);
    }
    if let Some(key) = self.runtime.as_deref() {
      debug!("使用运行时配置的密钥");
      return Some(key);
    }
    self.build.as_deref().inspect(|_| debug!("使用编译期配置的密钥"))
  }
}

fn non_empty(key: Option<String>) -> Option<String> {
  key.filter(|key| !key.trim().is_empty())
}
