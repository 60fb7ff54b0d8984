//! Single-attempt Helix calls.
//!
//! [`HelixApi`] takes the access token as an argument and reports one
//! [`CallOutcome`] per call. It never refreshes; [`super::HelixClient`]
//! wraps it for that.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::{
    BanData, BanRequest, DataEnvelope, HelixErrorBody, HelixUser, SubscriptionInfo,
    SubscriptionRequest,
};
use crate::error::ApiError;
use crate::retry::CallOutcome;
use crate::traits::{Headers, HttpClient, HttpError, Response};

/// Default Helix base URL.
pub const HELIX_API_URL: &str = "https://api.twitch.tv/helix";

#[derive(Clone)]
pub struct HelixApi {
    http: Arc<dyn HttpClient>,
    base_url: String,
    client_id: String,
}

impl HelixApi {
    pub fn new(http: Arc<dyn HttpClient>, client_id: impl Into<String>) -> Self {
        Self {
            http,
            base_url: HELIX_API_URL.to_string(),
            client_id: client_id.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn headers(&self, token: &str) -> Headers {
        let mut headers = Headers::new();
        headers.insert("Authorization".to_string(), format!("Bearer {}", token));
        headers.insert("Client-Id".to_string(), self.client_id.clone());
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers
    }

    /// GET /users, for `login` or for the token's own account.
    pub async fn fetch_user(&self, token: &str, login: Option<&str>) -> CallOutcome<Option<HelixUser>> {
        let url = match login {
            Some(login) => format!("{}/users?login={}", self.base_url, urlencoding::encode(login)),
            None => format!("{}/users", self.base_url),
        };
        let response = self.http.get(&url, &self.headers(token)).await;
        classify(response, |r| {
            decode::<DataEnvelope<HelixUser>>(r).map(|env| env.data.into_iter().next())
        })
    }

    /// POST /eventsub/subscriptions. Success is 202 Accepted.
    pub async fn create_subscription(
        &self,
        token: &str,
        request: &SubscriptionRequest,
    ) -> CallOutcome<SubscriptionInfo> {
        let url = format!("{}/eventsub/subscriptions", self.base_url);
        let body = match serde_json::to_string(request) {
            Ok(body) => body,
            Err(e) => return CallOutcome::Failed(ApiError::Decode(e.to_string())),
        };
        let response = self.http.post(&url, &body, &self.headers(token)).await;
        classify(response, |r| {
            decode::<DataEnvelope<SubscriptionInfo>>(r)?
                .data
                .into_iter()
                .next()
                .ok_or_else(|| ApiError::Decode("subscription response had no data".to_string()))
        })
    }

    /// DELETE /moderation/chat. Success is 204 No Content.
    pub async fn delete_chat_message(
        &self,
        token: &str,
        broadcaster_id: &str,
        moderator_id: &str,
        message_id: &str,
    ) -> CallOutcome<()> {
        let url = format!(
            "{}/moderation/chat?broadcaster_id={}&moderator_id={}&message_id={}",
            self.base_url,
            urlencoding::encode(broadcaster_id),
            urlencoding::encode(moderator_id),
            urlencoding::encode(message_id)
        );
        let response = self.http.delete(&url, &self.headers(token)).await;
        classify(response, |_| Ok(()))
    }

    /// POST /moderation/bans. A `duration` makes it a timeout.
    pub async fn ban_user(
        &self,
        token: &str,
        broadcaster_id: &str,
        moderator_id: &str,
        user_id: &str,
        duration_secs: Option<u32>,
        reason: Option<&str>,
    ) -> CallOutcome<()> {
        let url = format!(
            "{}/moderation/bans?broadcaster_id={}&moderator_id={}",
            self.base_url,
            urlencoding::encode(broadcaster_id),
            urlencoding::encode(moderator_id)
        );
        let request = BanRequest {
            data: BanData {
                user_id,
                duration: duration_secs,
                reason,
            },
        };
        let body = match serde_json::to_string(&request) {
            Ok(body) => body,
            Err(e) => return CallOutcome::Failed(ApiError::Decode(e.to_string())),
        };
        let response = self.http.post(&url, &body, &self.headers(token)).await;
        classify(response, |_| Ok(()))
    }
}

fn decode<T: DeserializeOwned>(response: &Response) -> Result<T, ApiError> {
    response
        .json()
        .map_err(|e| ApiError::Decode(e.to_string()))
}

/// Map a response to an outcome: 2xx through `parse`, 401 to
/// [`CallOutcome::AuthInvalid`], everything else to an [`ApiError`].
fn classify<T>(
    response: Result<Response, HttpError>,
    parse: impl FnOnce(&Response) -> Result<T, ApiError>,
) -> CallOutcome<T> {
    let response = match response {
        Ok(response) => response,
        Err(e) => return CallOutcome::Failed(ApiError::Transport(e.to_string())),
    };

    match response.status {
        200..=299 => match parse(&response) {
            Ok(value) => CallOutcome::Success(value),
            Err(err) => CallOutcome::Failed(err),
        },
        401 => CallOutcome::AuthInvalid,
        status => {
            let body: HelixErrorBody = response.json().unwrap_or_default();
            let message = body
                .message
                .or(body.error)
                .unwrap_or_else(|| response.text_lossy());
            debug!(status, message = %message, "Helix call failed");
            let mut err = ApiError::from_status(status, message);
            if let ApiError::RateLimited {
                retry_after_secs, ..
            } = &mut err
            {
                *retry_after_secs = retry_after(&response);
            }
            CallOutcome::Failed(err)
        }
    }
}

/// Seconds until the rate-limit bucket refills, from `Ratelimit-Reset`
/// (a Unix timestamp).
fn retry_after(response: &Response) -> Option<u64> {
    let reset: i64 = response.header("Ratelimit-Reset")?.trim().parse().ok()?;
    let now = chrono::Utc::now().timestamp();
    Some(reset.saturating_sub(now).max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockHttpClient, MockResponse};
    use bytes::Bytes;

    const BASE: &str = "https://api.test/helix";

    fn api(http: &MockHttpClient) -> HelixApi {
        HelixApi::new(Arc::new(http.clone()), "cid").with_base_url(BASE)
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let http = MockHttpClient::new();
        let api = api(&http);
        let url = format!("{}/moderation/chat", BASE);

        let label = |outcome: &CallOutcome<()>| match outcome {
            CallOutcome::Success(()) => "OK",
            CallOutcome::AuthInvalid => "AUTH_INVALID",
            CallOutcome::Failed(err) => err.error_code(),
        };

        let cases = [
            (204, "OK"),
            (401, "AUTH_INVALID"),
            (400, "API_BAD_REQUEST"),
            (403, "API_FORBIDDEN"),
            (404, "API_NOT_FOUND"),
            (409, "API_CONFLICT"),
            (429, "API_RATE_LIMITED"),
            (500, "API_SERVER_ERROR"),
            (503, "API_SERVER_ERROR"),
        ];

        for (status, expected) in cases {
            http.set_response(&url, MockResponse::status(status, ""));
            let outcome = api.delete_chat_message("tok", "1", "2", "m").await;
            assert_eq!(label(&outcome), expected, "status {}", status);
        }
    }

    #[tokio::test]
    async fn test_error_message_from_body() {
        let http = MockHttpClient::new();
        http.set_default_response(MockResponse::status(
            403,
            r#"{"error":"Forbidden","status":403,"message":"The user is not one of the broadcaster's moderators."}"#,
        ));

        match api(&http).ban_user("tok", "1", "2", "3", None, None).await {
            CallOutcome::Failed(ApiError::Forbidden { message }) => {
                assert!(message.contains("not one of the broadcaster's moderators"))
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_reset_header() {
        let http = MockHttpClient::new();
        let mut headers = Headers::new();
        let reset = chrono::Utc::now().timestamp() + 30;
        headers.insert("Ratelimit-Reset".to_string(), reset.to_string());
        http.set_default_response(MockResponse::Success(Response::with_headers(
            429,
            headers,
            Bytes::new(),
        )));

        match api(&http).ban_user("tok", "1", "2", "3", Some(60), None).await {
            CallOutcome::Failed(ApiError::RateLimited {
                retry_after_secs: Some(secs),
                ..
            }) => assert!((28..=30).contains(&secs)),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transport_error() {
        let http = MockHttpClient::new();
        http.set_default_response(MockResponse::Error(HttpError::Timeout("30s".to_string())));

        let outcome = api(&http).fetch_user("tok", None).await;
        assert!(matches!(outcome, CallOutcome::Failed(ApiError::Transport(_))));
    }

    #[tokio::test]
    async fn test_fetch_user_by_login_sends_headers() {
        let http = MockHttpClient::new();
        http.set_response(
            &format!("{}/users", BASE),
            MockResponse::status(
                200,
                r#"{"data":[{"id":"5","login":"some_user","display_name":"Some_User","created_at":"2024-05-01T00:00:00Z"}]}"#,
            ),
        );

        let outcome = api(&http).fetch_user("tok", Some("some_user")).await;
        match outcome {
            CallOutcome::Success(Some(user)) => assert_eq!(user.id, "5"),
            other => panic!("unexpected outcome: {:?}", other),
        }

        let request = &http.get_requests()[0];
        assert_eq!(request.url, format!("{}/users?login=some_user", BASE));
        assert_eq!(request.headers.get("Client-Id").map(String::as_str), Some("cid"));
        assert_eq!(
            request.headers.get("Authorization").map(String::as_str),
            Some("Bearer tok")
        );
    }

    #[tokio::test]
    async fn test_fetch_unknown_user_is_none() {
        let http = MockHttpClient::new();
        http.set_default_response(MockResponse::status(200, r#"{"data":[]}"#));
        let outcome = api(&http).fetch_user("tok", Some("ghost")).await;
        assert_eq!(outcome, CallOutcome::Success(None));
    }

    #[tokio::test]
    async fn test_create_subscription_accepted() {
        let http = MockHttpClient::new();
        http.set_default_response(MockResponse::status(
            202,
            r#"{"data":[{"id":"sub-1","status":"enabled","type":"channel.chat.message","version":"1","cost":0}],"total":1,"total_cost":0,"max_total_cost":10}"#,
        ));

        let request = SubscriptionRequest::chat_messages("100", "200", "sess");
        let outcome = api(&http).create_subscription("tok", &request).await;
        match outcome {
            CallOutcome::Success(info) => assert_eq!(info.id, "sub-1"),
            other => panic!("unexpected outcome: {:?}", other),
        }

        let body: serde_json::Value =
            serde_json::from_str(http.get_requests()[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["transport"]["session_id"], "sess");
    }
}
