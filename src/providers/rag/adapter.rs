use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use url::Url;

use super::models::*;
use crate::models::Citation;
use crate::providers::traits::ChatService;
use crate::providers::types::{ChatReply, DrugCatalog, ProviderError};

/// HTTP client for the RAG backend.
pub struct RagClient {
    client: Client,
    base_url: Url,
}

impl RagClient {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, ProviderError> {
        if base_url.cannot_be_a_base() {
            return Err(ProviderError::NetworkError(format!(
                "Base URL cannot carry a path: {}",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn parse_error_message(status: StatusCode, body: &str) -> String {
        if let Ok(parsed) = serde_json::from_str::<RagErrorResponse>(body) {
            return match parsed.detail {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
        }
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    }

    async fn check_status(response: Response) -> Result<Response, ProviderError> {
        let status = response.status();
        tracing::debug!(status = status.as_u16(), url = %response.url(), "RAG response");

        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ServerFault {
                status: status.as_u16(),
                body,
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed {
                status: status.as_u16(),
                message: Self::parse_error_message(status, &body),
            });
        }

        Ok(response)
    }

    fn convert_sources(sources: Option<Vec<RagSource>>) -> Vec<Citation> {
        sources
            .unwrap_or_default()
            .into_iter()
            .map(|s| Citation {
                rank: s.rank,
                source: s.source,
                url: s.url.filter(|u| !u.trim().is_empty()),
                category: s.category,
                similarity: s.similarity,
            })
            .collect()
    }
}

#[async_trait]
impl ChatService for RagClient {
    async fn send_message(&self, message: &str) -> Result<ChatReply, ProviderError> {
        let url = self.endpoint(&["api", "chat"]);
        tracing::debug!(url = %url, "RAG request: POST");

        let response = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .json(&RagChatRequest { message })
            .send()
            .await?;

        let response = Self::check_status(response).await?;

        let body: RagChatResponse = response.json().await?;

        let processing_time = body
            .processing_time
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok());

        Ok(ChatReply {
            text: body.response,
            sources: Self::convert_sources(body.sources),
            processing_time,
            model_used: body.model_used,
        })
    }

    async fn list_drugs(&self) -> Result<DrugCatalog, ProviderError> {
        let url = self.endpoint(&["api", "drugs"]);
        tracing::debug!(url = %url, "RAG request: GET");

        let response = self.client.get(url).send().await?;
        let response = Self::check_status(response).await?;
        let list: RagDrugList = response.json().await?;

        // The backend reports its own failures in a 200 body.
        if let Some(error) = list.error {
            return Err(ProviderError::RequestFailed {
                status: StatusCode::OK.as_u16(),
                message: error,
            });
        }

        Ok(DrugCatalog {
            drugs: list.drugs,
            total_count: list.total_count,
            total_documents: list.total_documents,
            message: list.message,
        })
    }

    async fn drug_info(&self, name: &str) -> Result<serde_json::Value, ProviderError> {
        let url = self.endpoint(&["api", "drugs", name]);
        tracing::debug!(url = %url, "RAG request: GET");

        let response = self.client.get(url).send().await?;
        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;

    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let body_len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + body_len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Serve one canned HTTP response and hand back the raw request.
    async fn serve_once(status: &'static str, body: &'static str) -> (Url, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
            let _ = tx.send(request);
        });

        (Url::parse(&format!("http://{}", addr)).unwrap(), rx)
    }

    fn client(base: Url) -> RagClient {
        RagClient::new(base, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_send_message_parses_answer_and_sources() {
        let body = r#"{
            "response": "Take them at least 4 hours apart.",
            "sources": [
                {"rank": 1, "source": "Tylenol label", "category": "interaction", "similarity": 0.873, "url": "https://example.com/t"},
                {"rank": 2, "source": "Advil label", "category": "dosage", "similarity": 0.61, "url": ""}
            ],
            "search_results": [],
            "processing_time": 1.25,
            "model_used": "rag-gpt4"
        }"#;
        let (base, request_rx) = serve_once("200 OK", body).await;

        let reply = client(base).send_message("Tylenol and Advil?").await.unwrap();
        assert_eq!(reply.text, "Take them at least 4 hours apart.");
        assert_eq!(reply.sources.len(), 2);
        assert_eq!(reply.sources[0].link(), Some("https://example.com/t"));
        assert_eq!(reply.sources[1].url, None);
        assert_eq!(reply.processing_time, Some(Duration::from_millis(1250)));
        assert_eq!(reply.model_used.as_deref(), Some("rag-gpt4"));

        let request = request_rx.await.unwrap();
        assert!(request.starts_with("POST /api/chat HTTP/1.1"));
        assert!(request.contains(r#"{"message":"Tylenol and Advil?"}"#));
    }

    #[tokio::test]
    async fn test_send_message_minimal_body() {
        let (base, _rx) = serve_once("200 OK", r#"{"response": "ok"}"#).await;
        let reply = client(base).send_message("hi").await.unwrap();
        assert_eq!(reply.text, "ok");
        assert!(reply.sources.is_empty());
        assert!(reply.processing_time.is_none());
        assert!(reply.model_used.is_none());
    }

    #[tokio::test]
    async fn test_server_error_is_server_fault() {
        let (base, _rx) = serve_once("500 Internal Server Error", r#"{"detail": "boom"}"#).await;
        let err = client(base).send_message("hi").await.unwrap_err();
        assert!(matches!(err, ProviderError::ServerFault { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_client_error_is_request_failed() {
        let (base, _rx) = serve_once("422 Unprocessable Entity", r#"{"detail": "message is required"}"#).await;
        let err = client(base).send_message("hi").await.unwrap_err();
        match err {
            ProviderError::RequestFailed { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "message is required");
            }
            other => panic!("Expected RequestFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_response() {
        let (base, _rx) = serve_once("200 OK", r#"{"answer": "wrong shape"}"#).await;
        let err = client(base).send_message("hi").await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_unanswered_request_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _ = read_request(&mut stream).await;
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let base = Url::parse(&format!("http://{}", addr)).unwrap();
        let client = RagClient::new(base, Duration::from_millis(100)).unwrap();
        let err = client.send_message("slow?").await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let base = Url::parse(&format!("http://{}", addr)).unwrap();
        let err = client(base).send_message("anyone?").await.unwrap_err();
        assert!(matches!(err, ProviderError::NetworkError(_)));
    }

    #[tokio::test]
    async fn test_list_drugs() {
        let (base, request_rx) = serve_once(
            "200 OK",
            r#"{"drugs": ["Advil", "Tylenol"], "total_count": 2, "total_documents": 40}"#,
        )
        .await;
        let catalog = client(base).list_drugs().await.unwrap();
        assert_eq!(catalog.drugs, vec!["Advil", "Tylenol"]);
        assert_eq!(catalog.total_count, Some(2));
        assert_eq!(catalog.total_documents, Some(40));
        assert!(request_rx.await.unwrap().starts_with("GET /api/drugs HTTP/1.1"));
    }

    #[tokio::test]
    async fn test_list_drugs_error_body() {
        let (base, _rx) = serve_once("200 OK", r#"{"error": "index not loaded"}"#).await;
        let err = client(base).list_drugs().await.unwrap_err();
        assert!(err.to_string().contains("index not loaded"));
    }

    #[tokio::test]
    async fn test_drug_info_encodes_name() {
        let (base, request_rx) = serve_once("200 OK", r#"{"name": "Tylenol ER"}"#).await;
        let info = client(base).drug_info("Tylenol ER").await.unwrap();
        assert_eq!(info["name"], "Tylenol ER");
        assert!(request_rx
            .await
            .unwrap()
            .starts_with("GET /api/drugs/Tylenol%20ER HTTP/1.1"));
    }

    #[test]
    fn test_endpoint_respects_base_path() {
        let base = Url::parse("https://rag.example.com/medimate/").unwrap();
        let client = client(base);
        assert_eq!(
            client.endpoint(&["api", "chat"]).as_str(),
            "https://rag.example.com/medimate/api/chat"
        );
    }
}
