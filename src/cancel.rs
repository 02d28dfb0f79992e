// 该文件是 Gangwan （港湾视觉） 项目的一部分。
// src/cancel.rs - 取消信号
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

use std::sync::Arc;

use tokio::sync::watch;

/// 可克隆的取消信号，所有克隆共享同一状态
#[derive(Debug, Clone)]
pub struct CancellationToken {
  sender: Arc<watch::Sender<bool>>,
}

impl Default for CancellationToken {
  fn default() -> Self {
    Self::new()
  }
}

impl CancellationToken {
  pub fn new() -> Self {
    let (sender, _) = watch::channel(false);
    Self {
      sender: Arc::new(sender),
    }
  }

  pub fn cancel(&self) {
    self.sender.send_replace(true);
  }

  pub fn is_cancelled(&self) -> bool {
    *self.sender.borrow()
  }

  /// 等待直到取消
  pub async fn cancelled(&self) {
    let mut receiver = self.sender.subscribe();
    // 发送端由 self 持有，不会提前关闭
    let _ = receiver.wait_for(|cancelled| *cancelled).await;
  }
}
