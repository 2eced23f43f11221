//! JSON request/response envelopes exchanged with the browser extension.
//!
//! Requests are tagged by `type`; responses carry a `success` flag plus either `data` or an
//! `error` message (and its machine-readable `kind`).

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::http::HttpClient;
use crate::{ErrorKind, FetchOptions, Result, Transcript, fetch_transcript};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    Ping,
    FetchTranscript {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lang: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl<T> Response<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            kind: None,
        }
    }

    /// Acknowledgement with no payload
    pub fn ack() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            kind: None,
        }
    }

    #[cfg(test)]
    pub fn into_result(self) -> std::result::Result<Option<T>, String> {
        if self.success {
            Ok(self.data)
        } else {
            Err(self.error.unwrap_or_else(|| "unknown error".to_string()))
        }
    }
}

impl<T> From<Result<T>> for Response<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Response::ok(data),
            Err(e) => Response {
                success: false,
                data: None,
                error: Some(e.to_string()),
                kind: Some(e.kind()),
            },
        }
    }
}

/// Serve a single extension request
pub async fn handle_request<C: HttpClient + ?Sized>(client: &C, request: Request) -> Response<Transcript> {
    match request {
        Request::Ping => Response::ack(),
        Request::FetchTranscript { url, lang } => {
            debug!("FETCH_TRANSCRIPT {url} lang={lang:?}");
            let result = fetch_transcript(client, &url, &FetchOptions { lang }).await;
            if let Err(e) = &result {
                warn!("FETCH_TRANSCRIPT {url} failed: {e}");
            }
            result.into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CoreError;
    use crate::http::testing::MockHttp;

    #[test]
    fn test_parse_requests() {
        let ping: Request = serde_json::from_str(r#"{"type":"PING"}"#).unwrap();
        assert_eq!(ping, Request::Ping);

        let fetch: Request =
            serde_json::from_str(r#"{"type":"FETCH_TRANSCRIPT","url":"https://youtu.be/dQw4w9WgXcQ"}"#).unwrap();
        assert_eq!(
            fetch,
            Request::FetchTranscript {
                url: "https://youtu.be/dQw4w9WgXcQ".to_string(),
                lang: None,
            }
        );
    }

    #[test]
    fn test_ack_serializes_bare_success() {
        let resp: Response<Transcript> = Response::ack();
        assert_eq!(serde_json::to_string(&resp).unwrap(), r#"{"success":true}"#);
    }

    #[test]
    fn test_error_response_shape() {
        let resp: Response<Transcript> = Err(CoreError::RateLimited).into();
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": false,
                "error": "Too many requests to YouTube from this IP. Captcha solving required.",
                "kind": "rate_limited",
            })
        );
    }

    #[test]
    fn test_into_result() {
        let ok: Response<u32> = Response::ok(7);
        assert_eq!(ok.into_result(), Ok(Some(7)));

        let failed: Response<u32> = serde_json::from_str(r#"{"success":false,"error":"boom"}"#).unwrap();
        assert_eq!(failed.into_result(), Err("boom".to_string()));
    }

    #[tokio::test]
    async fn test_handle_fetch_invalid_url() {
        let client = MockHttp::new();
        let resp = handle_request(
            &client,
            Request::FetchTranscript {
                url: "https://example.com/".to_string(),
                lang: None,
            },
        )
        .await;
        assert!(!resp.success);
        assert_eq!(resp.kind, Some(ErrorKind::InvalidIdentifier));
        assert!(resp.data.is_none());
    }

    #[tokio::test]
    async fn test_handle_fetch_success() {
        let id = "dQw4w9WgXcQ";
        let page = crate::youtube::tests::sample_page(&crate::youtube::tests::tracks_json(&[("en", "https://t/en")]));
        let client = MockHttp::new()
            .respond(&crate::youtube::watch_url(id), 200, &page)
            .respond("https://t/en", 200, r#"<text start="0" dur="1">hi</text>"#);

        let resp = handle_request(
            &client,
            Request::FetchTranscript {
                url: id.to_string(),
                lang: Some("en".to_string()),
            },
        )
        .await;

        assert!(resp.success);
        let transcript = resp.data.unwrap();
        assert_eq!(transcript.video_id, id);
        assert_eq!(transcript.formatted_text, "Hi.");
    }
}
