// 该文件是 Gangwan （港湾视觉） 项目的一部分。
// src/main.rs - 推理演练场命令行
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

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use url::Url;

use gangwan::{
  FromUrl,
  cancel::CancellationToken,
  inference::{InferenceClient, InferenceError, InferenceRequest},
  input::ImageSource,
  key::{API_KEY_ENV, ApiKeySources},
  output::{OutputWrapper, Render},
  service::InferenceCatalog,
  transport::ReqwestTransport,
};

/// Gangwan 推理演练场参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 推理服务目录（JSON）
  #[arg(long, value_name = "FILE")]
  pub catalog: PathBuf,

  /// 推理服务 ID，缺省时使用目录中的默认服务
  #[arg(long, value_name = "ID")]
  pub service: Option<String>,

  /// 测试样本 ID，缺省时使用第一个样本
  #[arg(long, value_name = "ID")]
  pub sample: Option<String>,

  /// 输入图像，优先于样本
  /// 支持格式:
  /// - 远程图像: https://...
  /// - 本地上传: image:///path/to/file.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Option<Url>,

  /// 输出路径，可重复
  /// 支持格式:
  /// - 叠加图像: image:///path/to/out.png?font=/path/to/font.ttf
  /// - 日期目录: folder:///path/to/dir?always
  /// - JSON 记录: json:///path/to/result.json
  #[arg(long, value_name = "OUTPUT")]
  pub output: Vec<Url>,

  /// 推理服务密钥，优先于环境变量 ROBO_API_KEY
  #[arg(long, value_name = "KEY")]
  pub api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  let catalog = InferenceCatalog::load(&args.catalog)?;
  let service = catalog.select_service(args.service.as_deref())?;
  info!("推理服务: {} ({}, {})", service.name(), service.type_tag(), service.runtime());
  info!("模型版本: {}", catalog.default_model_version);

  let image = match &args.input {
    Some(url) => Some(ImageSource::from_url(url)?),
    None => match catalog.select_sample(args.sample.as_deref())? {
      Some(sample) => {
        info!("测试样本: {} ({})", sample.name, sample.id);
        Some(ImageSource::parse(sample.image_url()).context("样本图像地址无效")?)
      }
      None => None,
    },
  };
  if let Some(image) = &image {
    info!("输入来源: {}", image.describe());
  }

  let outputs = args
    .output
    .iter()
    .map(OutputWrapper::from_url)
    .collect::<Result<Vec<_>, _>>()?;

  let cancel = CancellationToken::new();
  {
    let cancel = cancel.clone();
    ctrlc::set_handler(move || {
      info!("收到中断信号，取消推理...");
      cancel.cancel();
    })
    .context("无法设置 Ctrl-C 处理函数")?;
  }

  let client = InferenceClient::new(ReqwestTransport::new(), ApiKeySources::from_env());
  let mut request = InferenceRequest::new(service).cancel(cancel);
  request.image = image;
  request.api_key = args.api_key.clone();

  let result = match client.run(&request).await {
    Ok(result) => result,
    Err(e) if e.is_cancelled() => {
      warn!("推理已取消");
      return Ok(());
    }
    Err(e) => {
      error!("推理失败: {}", e);
      if matches!(e, InferenceError::MissingApiKey) {
        info!("可通过 --api-key 或环境变量 {} 配置密钥", API_KEY_ENV);
      }
      return Err(e.into());
    }
  };

  info!(
    "共 {} 个结果, 平均置信度 {:.1}%, 耗时 {:.1} ms",
    result.predictions.len(),
    result.mean_confidence() * 100.0,
    result.duration_ms.unwrap_or_default()
  );
  for (label, count) in result.label_counts() {
    info!("  - {}: {}", label, count);
  }
  for prediction in &result.predictions {
    info!(
      "  [{}] {} {:.1}% {:?}",
      prediction.id,
      prediction.label,
      prediction.confidence * 100.0,
      prediction.kind
    );
  }

  if outputs.is_empty() {
    println!("{}", serde_json::to_string_pretty(&result)?);
    return Ok(());
  }

  let frame = if outputs.iter().any(OutputWrapper::needs_image) {
    match &request.image {
      Some(ImageSource::File(file)) => file.bytes.clone(),
      Some(ImageSource::Url(url)) => client.transport().fetch(url).await?,
      None => Vec::new(),
    }
  } else {
    Vec::new()
  };

  for output in &outputs {
    output.render_result(frame.as_slice(), &result)?;
  }

  Ok(())
}
