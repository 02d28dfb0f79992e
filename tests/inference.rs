// 该文件是 Gangwan （港湾视觉） 项目的一部分。
// tests/inference.rs - 推理调用端到端测试
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

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use gangwan::{
  cancel::CancellationToken,
  inference::{ErrorKind, InferenceClient, InferenceError, InferenceRequest},
  input::{ImageSource, UploadFile},
  key::ApiKeySources,
  normalize::{DEFAULT_IMAGE_HEIGHT, DEFAULT_IMAGE_WIDTH, PredictionKind},
  service::InferenceServiceConfig,
  transport::{OutboundRequest, Transport, TransportError, TransportResponse},
};
use serde_json::json;
use url::Url;

/// 记录调用次数并返回预设响应的传输层
struct SpyTransport {
  calls: AtomicUsize,
  requests: Mutex<Vec<OutboundRequest>>,
  response: Result<TransportResponse, String>,
  delay: Option<Duration>,
}

impl SpyTransport {
  fn responding(status: u16, body: Option<&str>) -> Self {
    Self {
      calls: AtomicUsize::new(0),
      requests: Mutex::new(Vec::new()),
      response: Ok(TransportResponse {
        status,
        reason: Some(reason(status).to_string()),
        body: body.map(str::to_string),
      }),
      delay: None,
    }
  }

  fn json(payload: serde_json::Value) -> Self {
    Self::responding(200, Some(&payload.to_string()))
  }

  fn failing(message: &str) -> Self {
    Self {
      calls: AtomicUsize::new(0),
      requests: Mutex::new(Vec::new()),
      response: Err(message.to_string()),
      delay: None,
    }
  }

  fn delayed(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  fn last_request(&self) -> OutboundRequest {
    self.requests.lock().unwrap().last().cloned().expect("没有请求")
  }
}

fn reason(status: u16) -> &'static str {
  match status {
    200 => "OK",
    404 => "Not Found",
    500 => "Internal Server Error",
    _ => "Unknown",
  }
}

impl Transport for SpyTransport {
  async fn post(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.requests.lock().unwrap().push(request);
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    self.response.clone().map_err(TransportError::Other)
  }
}

fn roboflow() -> InferenceServiceConfig {
  serde_json::from_value(json!({
    "type": "roboflow",
    "id": "rf-container",
    "name": "Roboflow 集装箱检测",
    "runtime": "microservice",
    "endpoint": "https://detect.roboflow.com/container-det/3",
    "version": "3",
    "options": { "confidence": 40, "overlap": 30, "format": "json" }
  }))
  .unwrap()
}

fn web_onnx() -> InferenceServiceConfig {
  serde_json::from_value(json!({
    "type": "web-onnx",
    "id": "onnx-edge",
    "name": "Web ONNX",
    "runtime": "edge",
    "modelUrl": "https://example.com/model.onnx"
  }))
  .unwrap()
}

fn sample_url() -> ImageSource {
  ImageSource::Url(Url::parse("https://example.com/yard.jpg").unwrap())
}

fn keyed() -> ApiKeySources {
  ApiKeySources::new(Some("runtime-key".into()), None)
}

fn query(url: &Url) -> Vec<(String, String)> {
  url.query_pairs().into_owned().collect()
}

#[tokio::test]
async fn web_onnx_is_not_implemented() {
  let client = InferenceClient::new(SpyTransport::json(json!({})), keyed());
  let service = web_onnx();
  let request = InferenceRequest::new(&service).image(sample_url());

  let err = client.run(&request).await.unwrap_err();
  assert!(matches!(err, InferenceError::NotImplemented(_)));
  assert_eq!(err.kind(), ErrorKind::Unsupported);
  assert!(err.to_string().contains("尚未实现"));
  assert_eq!(client.transport().calls(), 0);
}

#[tokio::test]
async fn missing_key_fails_before_network() {
  let client = InferenceClient::new(SpyTransport::json(json!({})), ApiKeySources::none());
  let service = roboflow();
  let request = InferenceRequest::new(&service).image(sample_url());

  let err = client.run(&request).await.unwrap_err();
  assert!(matches!(err, InferenceError::MissingApiKey));
  assert_eq!(err.kind(), ErrorKind::Configuration);
  assert_eq!(client.transport().calls(), 0);
}

#[tokio::test]
async fn missing_image_fails_before_network() {
  let client = InferenceClient::new(SpyTransport::json(json!({})), keyed());
  let service = roboflow();
  let request = InferenceRequest::new(&service);

  let err = client.run(&request).await.unwrap_err();
  assert!(matches!(err, InferenceError::NoSample));
  assert_eq!(client.transport().calls(), 0);
}

#[tokio::test]
async fn server_error_reports_status_and_body() {
  let client = InferenceClient::new(SpyTransport::responding(500, Some("server error")), keyed());
  let service = roboflow();
  let request = InferenceRequest::new(&service).image(sample_url());

  let err = client.run(&request).await.unwrap_err();
  let message = err.to_string();
  assert!(message.contains("500"), "{}", message);
  assert!(message.contains("server error"), "{}", message);
  assert_eq!(err.kind(), ErrorKind::Transport);
  assert_eq!(client.transport().calls(), 1);
}

#[tokio::test]
async fn unreadable_error_body_falls_back_to_reason() {
  let client = InferenceClient::new(SpyTransport::responding(404, None), keyed());
  let service = roboflow();
  let request = InferenceRequest::new(&service).image(sample_url());

  let err = client.run(&request).await.unwrap_err();
  assert!(matches!(
    &err,
    InferenceError::RequestFailed { status: 404, message } if message == "Not Found"
  ));
}

#[tokio::test]
async fn network_failure_is_a_transport_error() {
  let client = InferenceClient::new(SpyTransport::failing("connection refused"), keyed());
  let service = roboflow();
  let request = InferenceRequest::new(&service).image(sample_url());

  let err = client.run(&request).await.unwrap_err();
  assert!(matches!(err, InferenceError::Transport(_)));
  assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn garbled_body_is_malformed_response() {
  let client = InferenceClient::new(SpyTransport::responding(200, Some("<html>oops</html>")), keyed());
  let service = roboflow();
  let request = InferenceRequest::new(&service).image(sample_url());

  let err = client.run(&request).await.unwrap_err();
  assert!(matches!(err, InferenceError::MalformedResponse(_)));
  assert_eq!(err.kind(), ErrorKind::MalformedResponse);
}

#[tokio::test]
async fn box_payload_without_image_size_uses_default() {
  let payload = json!({
    "predictions": [{ "x": 10, "y": 10, "width": 4, "height": 4, "confidence": 0.9, "class": "box" }]
  });
  let client = InferenceClient::new(SpyTransport::json(payload.clone()), keyed());
  let service = roboflow();
  let request = InferenceRequest::new(&service).image(sample_url());

  let result = client.run(&request).await.unwrap();
  // 第一个结果自带 width/height，作为图像尺寸的回退来源
  assert_eq!(result.image.width, 4.0);
  assert_eq!(result.image.height, 4.0);
  assert_eq!(result.predictions.len(), 1);
  let prediction = &result.predictions[0];
  assert_eq!(prediction.kind, PredictionKind::Box);
  assert_eq!(prediction.label, "box");
  assert_eq!(prediction.id, "box-0");
  assert_eq!(prediction.confidence, 0.9);
  let top_left = prediction.bbox.unwrap().top_left();
  assert_eq!((top_left.x, top_left.y), (8.0, 8.0));
  assert_eq!(result.provider, "Roboflow 集装箱检测");
  assert!(result.duration_ms.is_some());
  assert_eq!(result.raw, payload);
}

#[tokio::test]
async fn payload_without_any_size_defaults_to_1080p() {
  let payload = json!({ "predictions": [{ "confidence": 0.9, "class": "box", "points": [[0, 0], [4, 0], [4, 4]] }] });
  let client = InferenceClient::new(SpyTransport::json(payload), keyed());
  let service = roboflow();
  let request = InferenceRequest::new(&service).image(sample_url());

  let result = client.run(&request).await.unwrap();
  assert_eq!(result.image.width, DEFAULT_IMAGE_WIDTH);
  assert_eq!(result.image.height, DEFAULT_IMAGE_HEIGHT);
  assert_eq!(result.predictions[0].kind, PredictionKind::Segment);
  assert!(result.predictions[0].bbox.is_none());
}

#[tokio::test]
async fn url_request_carries_key_options_and_image() {
  let client = InferenceClient::new(SpyTransport::json(json!({ "predictions": [] })), keyed());
  let service = roboflow();
  let request = InferenceRequest::new(&service)
    .image(sample_url())
    .api_key("explicit-key");

  client.run(&request).await.unwrap();
  let sent = client.transport().last_request();
  assert!(sent.file.is_none());
  assert_eq!(sent.url.path(), "/container-det/3");
  assert_eq!(
    query(&sent.url),
    vec![
      ("api_key".to_string(), "explicit-key".to_string()),
      ("confidence".to_string(), "40".to_string()),
      ("overlap".to_string(), "30".to_string()),
      ("format".to_string(), "json".to_string()),
      ("image".to_string(), "https://example.com/yard.jpg".to_string()),
    ]
  );
}

#[tokio::test]
async fn file_request_is_multipart_without_image_param() {
  let client = InferenceClient::new(SpyTransport::json(json!({ "predictions": [] })), keyed());
  let service = roboflow();
  let file = UploadFile::from_bytes("/samples/gate.jpg", vec![0xff, 0xd8, 0xff]);
  let request = InferenceRequest::new(&service).image(ImageSource::File(file.clone()));

  client.run(&request).await.unwrap();
  let sent = client.transport().last_request();
  assert_eq!(sent.file, Some(file));
  assert!(query(&sent.url).iter().all(|(k, _)| k != "image"));
  assert!(query(&sent.url).contains(&("api_key".to_string(), "runtime-key".to_string())));
}

#[tokio::test]
async fn cancelled_before_send_never_hits_network() {
  let client = InferenceClient::new(SpyTransport::json(json!({})), keyed());
  let service = roboflow();
  let cancel = CancellationToken::new();
  cancel.cancel();
  let request = InferenceRequest::new(&service).image(sample_url()).cancel(cancel);

  let err = client.run(&request).await.unwrap_err();
  assert!(err.is_cancelled());
  assert_eq!(client.transport().calls(), 0);
}

#[tokio::test]
async fn cancellation_interrupts_in_flight_call() {
  let transport = SpyTransport::json(json!({ "predictions": [] })).delayed(Duration::from_secs(30));
  let client = InferenceClient::new(transport, keyed());
  let service = roboflow();
  let cancel = CancellationToken::new();
  let request = InferenceRequest::new(&service)
    .image(sample_url())
    .cancel(cancel.clone());

  let canceller = async {
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();
  };
  let (outcome, _) = tokio::time::timeout(Duration::from_secs(5), async {
    tokio::join!(client.run(&request), canceller)
  })
  .await
  .expect("取消未能中断请求");

  let err = outcome.unwrap_err();
  assert!(err.is_cancelled());
  assert_eq!(err.kind(), ErrorKind::Cancelled);
  assert_eq!(client.transport().calls(), 1);
}

#[tokio::test]
async fn colors_persist_across_calls() {
  let client = InferenceClient::new(
    SpyTransport::json(json!({ "predictions": [{ "class": "container" }, { "class": "truck" }] })),
    keyed(),
  );
  let service = roboflow();
  let request = InferenceRequest::new(&service).image(sample_url());

  let first = client.run(&request).await.unwrap();
  let second = client.run(&request).await.unwrap();
  assert_eq!(first.predictions[0].color, second.predictions[0].color);
  assert_eq!(first.predictions[1].color, second.predictions[1].color);
  assert_ne!(first.predictions[0].color, first.predictions[1].color);
  assert_eq!(client.normalizer().colors().len(), 2);
}
