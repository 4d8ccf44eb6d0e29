//! Mandate intake
//!
//! A fund mandate PDF is uploaded over HTTP, then parsed by a streaming
//! session whose terminal event carries the extracted criteria. The criteria
//! seed the wizard's initial parameter sets.

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::model::{ParameterSet, StreamingEvent, TerminalSpec};
use crate::normalize::{MandateSection, ParameterChain};
use crate::stream::{SessionId, SessionUpdate, StreamingClient, WsConnector};
use crate::wizard::InitialParameters;

/// Terminal frame of a mandate parsing session
pub const MANDATE_TERMINAL: TerminalSpec = TerminalSpec {
    event_type: "analysis_complete",
    payload_field: "criteria",
};

/// Upload endpoint response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub status: String,
    pub filename: String,
    pub query: String,
    #[serde(default)]
    pub message: String,
}

/// Extracted mandate criteria
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MandateCriteria {
    payload: Value,
}

impl MandateCriteria {
    /// Wrap a saved payload. Parameters are looked up under
    /// `criteria.mandate`, `criteria` or at the top level.
    pub fn from_payload(payload: Value) -> Self {
        Self { payload }
    }

    fn from_terminal(event: &StreamingEvent) -> Self {
        let criteria = event
            .field(MANDATE_TERMINAL.payload_field)
            .cloned()
            .unwrap_or(Value::Null);
        Self::from_payload(json!({ "criteria": criteria }))
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn parameters(&self, section: MandateSection) -> ParameterSet {
        ParameterChain::for_section(section).normalize(&self.payload)
    }

    pub fn initial_parameters(&self) -> InitialParameters {
        InitialParameters {
            sourcing: self.parameters(MandateSection::Sourcing),
            screening: self.parameters(MandateSection::Screening),
            risk: self.parameters(MandateSection::Risk),
        }
    }

    pub fn fund_name(&self) -> Option<&str> {
        self.text_field("fund_name")
    }

    pub fn fund_size(&self) -> Option<&str> {
        self.text_field("fund_size")
    }

    fn text_field(&self, field: &str) -> Option<&str> {
        ParameterChain::for_field(field)
            .resolve(&self.payload)
            .and_then(|(_, value)| value.as_str())
            .filter(|s| !s.trim().is_empty())
    }
}

/// Client for the upload and parse endpoints
pub struct MandateClient {
    config: PipelineConfig,
    http: reqwest::Client,
    streaming: StreamingClient,
}

impl MandateClient {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let streaming = StreamingClient::new(Arc::new(WsConnector::new(config.connect_timeout)))
            .with_idle_timeout(config.idle_timeout);
        Self::with_streaming(config, streaming)
    }

    pub fn with_streaming(config: PipelineConfig, streaming: StreamingClient) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            config,
            http,
            streaming,
        })
    }

    /// Upload a mandate PDF. `query` falls back to the configured default.
    pub async fn upload(&self, path: &Path, query: Option<&str>) -> Result<UploadReceipt> {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| name.ends_with(".pdf"))
            .ok_or_else(|| {
                PipelineError::validation(format!("{} is not a PDF file", path.display()))
            })?
            .to_string();

        let bytes = tokio::fs::read(path).await?;
        let query = query.unwrap_or(&self.config.default_query);
        let url = self.config.upload_url();
        info!(url = %url, file = %filename, size = bytes.len(), "uploading mandate");

        let part = Part::bytes(bytes)
            .file_name(filename)
            .mime_str("application/pdf")?;
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(&url)
            .query(&[("query", query)])
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::transport(format!(
                "upload to {url} failed with {status}: {body}"
            )));
        }

        let receipt: UploadReceipt = response.json().await?;
        debug!(filename = %receipt.filename, message = %receipt.message, "mandate uploaded");
        Ok(receipt)
    }

    /// Parse an uploaded mandate into criteria
    pub async fn parse(&self, receipt: &UploadReceipt) -> Result<MandateCriteria> {
        let id = SessionId::new();
        let url = self.config.mandate_parse_url(id);
        let request = json!({ "pdf_name": receipt.filename, "query": receipt.query });

        let mut handle = self
            .streaming
            .open_with_id(id, &url, MANDATE_TERMINAL, &request)
            .await?;

        while let Some(update) = handle.next_update().await {
            match update {
                SessionUpdate::Event(event) => {
                    if let Some(text) = event.narrative() {
                        debug!(session_id = %id, event_type = %event.event_type, "{text}");
                    }
                }
                SessionUpdate::Dropped(_) => {}
                SessionUpdate::Terminal(event) => {
                    let criteria = MandateCriteria::from_terminal(&event);
                    info!(
                        session_id = %id,
                        fund = criteria.fund_name().unwrap_or("unnamed"),
                        "mandate parsed"
                    );
                    return Ok(criteria);
                }
                SessionUpdate::Failed(e) => return Err(e),
                SessionUpdate::Cancelled => {
                    return Err(PipelineError::transport("mandate parsing cancelled"));
                }
            }
        }
        Err(PipelineError::transport(
            "mandate session ended without criteria",
        ))
    }

    /// Upload then parse
    pub async fn intake(&self, path: &Path, query: Option<&str>) -> Result<MandateCriteria> {
        let receipt = self.upload(path, query).await?;
        self.parse(&receipt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Parameter;
    use crate::stream::testing::{Script, ScriptedConnector};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn criteria_payload() -> Value {
        json!({
            "mandate": {
                "fund_name": "ABC Fund",
                "fund_size": "500 million USD",
                "sourcing_parameters": {"country": "US", "sector": "Technology", "industry": ""},
                "screening_parameters": {"revenue": "> 10M", "net_income": "positive"},
                "risk_parameters": {"governance_quality": "strong board"}
            }
        })
    }

    #[test]
    fn test_initial_parameters_from_nested_criteria() {
        let criteria = MandateCriteria::from_payload(json!({ "criteria": criteria_payload() }));
        let initial = criteria.initial_parameters();

        assert_eq!(initial.sourcing.len(), 3);
        assert_eq!(
            initial.screening.as_slice(),
            &[
                Parameter::new("Revenue", "> 10M"),
                Parameter::new("Net Income", "positive"),
            ]
        );
        assert_eq!(initial.risk.as_slice()[0].key, "Governance Quality");
        assert_eq!(criteria.fund_name(), Some("ABC Fund"));
        assert_eq!(criteria.fund_size(), Some("500 million USD"));
    }

    #[test]
    fn test_flat_payload_and_missing_fields() {
        let criteria = MandateCriteria::from_payload(json!({
            "sourcing_parameters": ["Tech", "Health"],
            "fund_name": ""
        }));
        let initial = criteria.initial_parameters();

        assert_eq!(initial.sourcing.len(), 2);
        assert!(initial.screening.is_empty());
        assert_eq!(criteria.fund_name(), None);
    }

    fn client(scripts: Vec<Script>, http_base: &str) -> MandateClient {
        let config = PipelineConfig::builder()
            .http_base_url(http_base)
            .build()
            .unwrap();
        let streaming = StreamingClient::new(Arc::new(ScriptedConnector::queue(scripts)));
        MandateClient::with_streaming(config, streaming).unwrap()
    }

    #[tokio::test]
    async fn test_parse_returns_criteria() {
        let terminal = json!({
            "type": "analysis_complete",
            "status": "success",
            "criteria": criteria_payload(),
        });
        let script = Script::frames([
            r#"{"type":"session_start","message":"Mandate Parsing Agent initialized"}"#.to_string(),
            r#"{"type":"llm_thinking","message":"analyzing"}"#.to_string(),
            terminal.to_string(),
        ]);
        let probe = script.probe();
        let client = client(vec![script], "http://localhost:8000");

        let receipt = UploadReceipt {
            status: "success".to_string(),
            filename: "fund.pdf".to_string(),
            query: "Generate mandate criteria".to_string(),
            message: String::new(),
        };
        let criteria = client.parse(&receipt).await.unwrap();

        assert_eq!(criteria.fund_name(), Some("ABC Fund"));
        assert_eq!(
            probe.sent(),
            vec![r#"{"pdf_name":"fund.pdf","query":"Generate mandate criteria"}"#.to_string()]
        );
        assert!(probe.urls()[0].starts_with("ws://localhost:8000/api/ws/parse-mandate/option2/"));
    }

    #[tokio::test]
    async fn test_parse_failure_surfaces_remote_error() {
        let script = Script::frames([
            r#"{"type":"analysis_complete","status":"error","error":"LLM timeout"}"#,
            r#"{"type":"session_complete","status":"success"}"#,
        ]);
        let client = client(vec![script], "http://localhost:8000");
        let receipt = UploadReceipt {
            status: "success".to_string(),
            filename: "fund.pdf".to_string(),
            query: "q".to_string(),
            message: String::new(),
        };

        let err = client.parse(&receipt).await.unwrap_err();
        assert!(matches!(err, PipelineError::Remote(msg) if msg == "LLM timeout"));
    }

    #[tokio::test]
    async fn test_upload_rejects_non_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mandate.docx");
        std::fs::write(&path, b"not a pdf").unwrap();

        let client = client(Vec::new(), "http://localhost:8000");
        let err = client.upload(&path, None).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    /// Answers one multipart request with `status` and `body`, returning the raw request
    async fn one_shot_server(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let task = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0_u8; 4096];
            while !raw.ends_with(b"--\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&raw).to_string()
        });

        (format!("http://{addr}"), task)
    }

    #[tokio::test]
    async fn test_upload_sends_multipart_file() {
        let (base, server) = one_shot_server(
            "200 OK",
            r#"{"status":"success","filename":"fund.pdf","query":"Generate mandate criteria","message":"File received: fund.pdf"}"#,
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fund.pdf");
        std::fs::write(&path, b"%PDF-1.4 test").unwrap();

        let client = client(Vec::new(), &base);
        let receipt = client.upload(&path, None).await.unwrap();
        assert_eq!(receipt.filename, "fund.pdf");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/parse-mandate-upload?query=Generate"));
        assert!(request.contains(r#"name="file"; filename="fund.pdf""#));
        assert!(request.contains("%PDF-1.4 test"));
    }

    #[tokio::test]
    async fn test_upload_error_status_is_transport_error() {
        let (base, _server) = one_shot_server("400 Bad Request", r#"{"detail":"Only PDF files allowed"}"#).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fund.pdf");
        std::fs::write(&path, b"%PDF").unwrap();

        let client = client(Vec::new(), &base);
        let err = client.upload(&path, Some("custom")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Transport(msg) if msg.contains("400")));
    }
}
