use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, redirect, Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use shared::{
    domain::{CommentId, EventId},
    error::{ApiException, ErrorBody},
    protocol::{
        AddCommentRequest, AddCommentResponse, CommentPageResponse, EventSummary,
        LikeCommentRequest, LikeEventRequest, RedirectPayload, SuccessResponse,
        UpsertEventRequest,
    },
};
use tracing::{debug, error, info};
use url::Url;

pub mod board;
pub mod cache;
pub mod comments;
pub mod config;
pub mod error;
pub mod navigation;
pub mod views;

pub use board::EventBoard;
pub use cache::{FetchCache, DEFAULT_CACHE_TTL};
pub use comments::{Comment, CommentPage, CommentStore, CommentThread, FetchMode};
pub use config::{load_settings, ClientSettings};
pub use error::ClientError;
pub use navigation::{Navigator, RecordingNavigator, TracingNavigator};

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Query parameter that keeps intermediaries from serving a stale GET.
pub const CACHE_BUST_PARAM: &str = "dummy";

const EVENT_ROUTE: &str = "event";
const EVENT_LIKE_ROUTE: &str = "event/like";
const EVENT_COMMENT_ROUTE: &str = "event/comment";
const EVENT_COMMENTS_ROUTE: &str = "event/comments";
const COMMENT_LIKE_ROUTE: &str = "event/comment/like";

/// Typed operations of the events API.
///
/// `Ok(None)` means the server answered with a redirect; the navigator has
/// already been told and there is no payload for the caller.
#[async_trait]
pub trait EventsApi: Send + Sync {
    async fn list_events(&self) -> Result<Option<Vec<EventSummary>>>;
    async fn upsert_event(&self, request: &UpsertEventRequest) -> Result<Option<EventSummary>>;
    async fn like_event(&self, event_id: &EventId) -> Result<Option<SuccessResponse>>;
    async fn get_comments(
        &self,
        event_id: &EventId,
        cursor: Option<&str>,
    ) -> Result<Option<CommentPage>>;
    async fn add_comment(&self, request: &AddCommentRequest)
        -> Result<Option<AddCommentResponse>>;
    async fn like_comment(&self, comment_id: &CommentId) -> Result<Option<SuccessResponse>>;
}

pub struct EventsClient {
    http: Client,
    base_url: Url,
    cache: FetchCache<Option<Value>>,
    navigator: Arc<dyn Navigator>,
}

impl EventsClient {
    pub fn new(settings: &ClientSettings) -> Result<Self> {
        Self::with_navigator(settings, Arc::new(TracingNavigator))
    }

    pub fn with_navigator(settings: &ClientSettings, navigator: Arc<dyn Navigator>) -> Result<Self> {
        let base_url = Url::parse(&config::normalize_api_url(&settings.api_url))?;
        // Redirects stay visible: the API signals them with a 302 body.
        let http = Client::builder()
            .redirect(redirect::Policy::none())
            .build()?;
        Ok(Self {
            http,
            base_url,
            cache: FetchCache::new(settings.cache_ttl()),
            navigator,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn cache(&self) -> &FetchCache<Option<Value>> {
        &self.cache
    }

    fn route_url(&self, route: &str) -> Result<Url> {
        Ok(self.base_url.join(route.trim_start_matches('/'))?)
    }

    /// GET through the fetch cache. Concurrent calls for the same route
    /// within the cache TTL share one request.
    pub async fn get(&self, route: &str) -> Result<Option<Value>> {
        let url = self.route_url(route)?;
        let key = url.to_string();
        let http = self.http.clone();
        let navigator = Arc::clone(&self.navigator);

        let result = self
            .cache
            .get_or_fetch(&key, move || {
                let request_url = with_cache_buster(url);
                async move { fetch_json(&http, request_url, navigator.as_ref()).await }
            })
            .await;

        if let Err(err) = &result {
            error!(route, "fetch error: {err}");
        }
        result
    }

    /// POST a JSON body. A successful write invalidates every cached GET so
    /// the follow-up refresh sees the server's new state.
    pub async fn post<B>(&self, route: &str, body: &B) -> Result<Option<Value>>
    where
        B: Serialize + ?Sized + Sync,
    {
        let result = self.post_uncached(route, body).await;
        match &result {
            Ok(_) => self.cache.invalidate_all().await,
            Err(err) => error!(route, "an error occurred: {err}"),
        }
        result
    }

    async fn post_uncached<B>(&self, route: &str, body: &B) -> Result<Option<Value>>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = self.route_url(route)?;
        let response = self.http.post(url).json(body).send().await?;
        let status = response.status();

        if status == StatusCode::FOUND {
            follow_redirect(response, self.navigator.as_ref()).await?;
            return Ok(None);
        }

        if !status.is_success() {
            let bytes = response.bytes().await?;
            return Err(match serde_json::from_slice::<ErrorBody>(&bytes) {
                Ok(body) => ApiException::new(status.as_u16(), &body).into(),
                Err(_) => ClientError::Http {
                    status: status.as_u16(),
                },
            });
        }

        read_json(response).await.map(Some)
    }
}

#[async_trait]
impl EventsApi for EventsClient {
    async fn list_events(&self) -> Result<Option<Vec<EventSummary>>> {
        decode(self.get(EVENT_ROUTE).await?)
    }

    async fn upsert_event(&self, request: &UpsertEventRequest) -> Result<Option<EventSummary>> {
        decode(self.post(EVENT_ROUTE, request).await?)
    }

    async fn like_event(&self, event_id: &EventId) -> Result<Option<SuccessResponse>> {
        let request = LikeEventRequest {
            uqid: event_id.clone(),
        };
        decode(self.post(EVENT_LIKE_ROUTE, &request).await?)
    }

    async fn get_comments(
        &self,
        event_id: &EventId,
        cursor: Option<&str>,
    ) -> Result<Option<CommentPage>> {
        let route = comments_route(event_id, cursor);
        let response: Option<CommentPageResponse> = decode(self.get(&route).await?)?;
        Ok(response.map(|response| CommentPage::from_response(event_id, response)))
    }

    async fn add_comment(
        &self,
        request: &AddCommentRequest,
    ) -> Result<Option<AddCommentResponse>> {
        decode(self.post(EVENT_COMMENT_ROUTE, request).await?)
    }

    async fn like_comment(&self, comment_id: &CommentId) -> Result<Option<SuccessResponse>> {
        let request = LikeCommentRequest {
            comment_uqid: comment_id.clone(),
        };
        debug!(comment_id = %comment_id, "sending like comment request");
        decode(self.post(COMMENT_LIKE_ROUTE, &request).await?)
    }
}

/// `event/comments?uqid=<id>[&cursor=<token>]`
pub fn comments_route(event_id: &EventId, cursor: Option<&str>) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query.append_pair("uqid", event_id.as_str());
    if let Some(cursor) = cursor.filter(|cursor| !cursor.is_empty()) {
        query.append_pair("cursor", cursor);
    }
    format!("{EVENT_COMMENTS_ROUTE}?{}", query.finish())
}

fn with_cache_buster(mut url: Url) -> Url {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    url.query_pairs_mut()
        .append_pair(CACHE_BUST_PARAM, &millis.to_string());
    url
}

async fn fetch_json(http: &Client, url: Url, navigator: &dyn Navigator) -> Result<Option<Value>> {
    let response = http
        .get(url)
        .header(CONTENT_TYPE, "application/json")
        .send()
        .await?;
    let status = response.status();

    if status == StatusCode::FOUND {
        follow_redirect(response, navigator).await?;
        return Ok(None);
    }
    if !status.is_success() {
        return Err(ClientError::Http {
            status: status.as_u16(),
        });
    }

    read_json(response).await.map(Some)
}

async fn follow_redirect(response: Response, navigator: &dyn Navigator) -> Result<()> {
    let status = response.status().as_u16();
    let bytes = response.bytes().await?;
    let payload: RedirectPayload = serde_json::from_slice(&bytes)
        .map_err(|_| ClientError::MalformedRedirect { status })?;
    let target = payload
        .target()
        .ok_or(ClientError::MalformedRedirect { status })?;
    info!(destination = target, "following redirect from response body");
    navigator.navigate(target);
    Ok(())
}

async fn read_json(response: Response) -> Result<Value> {
    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

fn decode<T: DeserializeOwned>(value: Option<Value>) -> Result<Option<T>> {
    value
        .map(serde_json::from_value)
        .transpose()
        .map_err(ClientError::from)
}

#[cfg(test)]
#[path = "tests/mock_server.rs"]
mod mock_server;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
