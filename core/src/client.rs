//! API client and session manager for the trip journal service.
//!
//! # Design
//! `JournalClient` holds the base URL, a transport, and the session token.
//! Every endpoint is split into a pure `build_*` method that produces an
//! `HttpRequest` and an async method that executes it and classifies the
//! response through `parse_json` / `parse_empty`. Callers that want to drive
//! I/O themselves can use the `build_*` and `parse_*` halves directly.
//!
//! The token is read when a request is built and written by
//! `register`, `login`, `logout`, and by any 401 response. Concurrent calls
//! are not coordinated; a stale 401 may clear a token set by a newer login.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{
    HttpMethod, HttpRequest, HttpResponse, ACCEPT, APPLICATION_JSON, AUTHORIZATION, CONTENT_TYPE,
    FORM_URLENCODED,
};
use crate::session::{AuthWatcher, Session};
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{
    Event, EventCreate, EventId, EventUpdate, Media, MediaCreate, MediaId, Token, Trip,
    TripCreate, TripId, TripUpdate,
};

/// Bytes left literal in form values: RFC 3986 unreserved characters only.
/// Space becomes `%20` and `+` becomes `%2B`.
const FORM_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Public,
    Authorized,
}

#[derive(Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

/// Async client for the trip journal REST API.
#[derive(Debug)]
pub struct JournalClient<T = ReqwestTransport> {
    base_url: Url,
    transport: T,
    session: Session,
}

impl JournalClient<ReqwestTransport> {
    /// Client for `base_url` using a default `reqwest` transport.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_transport(base_url, ReqwestTransport::default())
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::from_config(config).map_err(ApiError::Underlying)?;
        Self::with_transport(&config.base_url, transport)
    }
}

impl<T: Transport> JournalClient<T> {
    pub fn with_transport(base_url: &str, transport: T) -> Result<Self, ApiError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            transport,
            session: Session::new(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    pub fn token(&self) -> Option<Token> {
        self.session.token()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Observe the authenticated signal; see [`AuthWatcher::changed`].
    pub fn subscribe(&self) -> AuthWatcher {
        self.session.subscribe()
    }

    /// Forget the held token. No request is sent.
    pub fn logout(&self) {
        self.session.clear();
        tracing::info!("logged out");
    }

    // -----------------------------------------------------------------------
    // Auth
    // -----------------------------------------------------------------------

    pub async fn register(&self, username: &str, password: &str) -> Result<Token, ApiError> {
        let request = self.build_register(username, password)?;
        let token: Token = self.send(request).await?;
        self.session.set(token.clone());
        tracing::info!("registered and logged in");
        Ok(token)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Token, ApiError> {
        let request = self.build_login(username, password)?;
        let token: Token = self.send(request).await?;
        self.session.set(token.clone());
        tracing::info!("logged in");
        Ok(token)
    }

    pub fn build_register(&self, username: &str, password: &str) -> Result<HttpRequest, ApiError> {
        self.json_request(
            HttpMethod::Post,
            "/register",
            Access::Public,
            &Credentials { username, password },
        )
    }

    /// `POST /token` with an OAuth2 password-grant form body.
    pub fn build_login(&self, username: &str, password: &str) -> Result<HttpRequest, ApiError> {
        let mut request = self.request(HttpMethod::Post, "/token", Access::Public)?;
        request
            .headers
            .push((CONTENT_TYPE.to_string(), FORM_URLENCODED.to_string()));
        request.body = Some(format!(
            "grant_type=&username={}&password={}",
            utf8_percent_encode(username, FORM_VALUE),
            utf8_percent_encode(password, FORM_VALUE),
        ));
        Ok(request)
    }

    // -----------------------------------------------------------------------
    // Trips
    // -----------------------------------------------------------------------

    pub async fn create_trip(&self, input: &TripCreate) -> Result<Trip, ApiError> {
        self.send(self.build_create_trip(input)?).await
    }

    pub async fn trips(&self) -> Result<Vec<Trip>, ApiError> {
        self.send(self.build_list_trips()?).await
    }

    pub async fn trip(&self, id: TripId) -> Result<Trip, ApiError> {
        self.send(self.build_get_trip(id)?).await
    }

    pub async fn update_trip(&self, id: TripId, input: &TripUpdate) -> Result<Trip, ApiError> {
        self.send(self.build_update_trip(id, input)?).await
    }

    pub async fn delete_trip(&self, id: TripId) -> Result<(), ApiError> {
        self.send_without_body(self.build_delete_trip(id)?).await
    }

    pub fn build_create_trip(&self, input: &TripCreate) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, "/trips", Access::Authorized, input)
    }

    pub fn build_list_trips(&self) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Get, "/trips", Access::Authorized)
    }

    pub fn build_get_trip(&self, id: TripId) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Get, &format!("/trips/{id}"), Access::Authorized)
    }

    pub fn build_update_trip(
        &self,
        id: TripId,
        input: &TripUpdate,
    ) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Put, &format!("/trips/{id}"), Access::Authorized, input)
    }

    pub fn build_delete_trip(&self, id: TripId) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Delete, &format!("/trips/{id}"), Access::Authorized)
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    pub async fn create_event(&self, input: &EventCreate) -> Result<Event, ApiError> {
        self.send(self.build_create_event(input)?).await
    }

    pub async fn update_event(&self, id: EventId, input: &EventUpdate) -> Result<Event, ApiError> {
        self.send(self.build_update_event(id, input)?).await
    }

    pub async fn delete_event(&self, id: EventId) -> Result<(), ApiError> {
        self.send_without_body(self.build_delete_event(id)?).await
    }

    pub fn build_create_event(&self, input: &EventCreate) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, "/events", Access::Authorized, input)
    }

    pub fn build_update_event(
        &self,
        id: EventId,
        input: &EventUpdate,
    ) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Put, &format!("/events/{id}"), Access::Authorized, input)
    }

    pub fn build_delete_event(&self, id: EventId) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Delete, &format!("/events/{id}"), Access::Authorized)
    }

    // -----------------------------------------------------------------------
    // Media
    // -----------------------------------------------------------------------

    pub async fn create_media(&self, input: &MediaCreate) -> Result<Media, ApiError> {
        self.send(self.build_create_media(input)?).await
    }

    pub async fn delete_media(&self, id: MediaId) -> Result<(), ApiError> {
        self.send_without_body(self.build_delete_media(id)?).await
    }

    pub fn build_create_media(&self, input: &MediaCreate) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, "/media", Access::Authorized, input)
    }

    pub fn build_delete_media(&self, id: MediaId) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Delete, &format!("/media/{id}"), Access::Authorized)
    }

    // -----------------------------------------------------------------------
    // Response classification
    // -----------------------------------------------------------------------

    /// Classify `response` and decode its JSON body.
    ///
    /// A 401 clears the held token before `Unauthorized` is returned.
    pub fn parse_json<R: DeserializeOwned>(&self, response: HttpResponse) -> Result<R, ApiError> {
        self.check_status(&response)?;
        serde_json::from_str(&response.body).map_err(ApiError::Decoding)
    }

    /// Classify `response` and discard its body.
    pub fn parse_empty(&self, response: HttpResponse) -> Result<(), ApiError> {
        self.check_status(&response)
    }

    fn check_status(&self, response: &HttpResponse) -> Result<(), ApiError> {
        let status = response.status;
        if !(100..=599).contains(&status) {
            return Err(ApiError::InvalidResponse);
        }
        if (200..300).contains(&status) {
            return Ok(());
        }
        if status == 401 {
            if self.session.clear() {
                tracing::warn!("server rejected session token; logged out");
            }
            return Err(ApiError::Unauthorized);
        }
        Err(ApiError::HttpStatus(status))
    }

    // -----------------------------------------------------------------------
    // Request plumbing
    // -----------------------------------------------------------------------

    async fn send<R: DeserializeOwned>(&self, request: HttpRequest) -> Result<R, ApiError> {
        let response = self.perform(request).await?;
        self.parse_json(response)
    }

    async fn send_without_body(&self, request: HttpRequest) -> Result<(), ApiError> {
        let response = self.perform(request).await?;
        self.parse_empty(response)
    }

    async fn perform(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let method = request.method.as_str();
        let url = request.url.clone();
        tracing::debug!(method, %url, "sending request");

        let response = self.transport.execute(request).await.map_err(|e| {
            tracing::debug!(method, %url, error = %e, "transport failed");
            ApiError::Underlying(e)
        })?;

        tracing::debug!(method, %url, status = response.status, "received response");
        Ok(response)
    }

    fn request(
        &self,
        method: HttpMethod,
        path: &str,
        access: Access,
    ) -> Result<HttpRequest, ApiError> {
        let url = self.base_url.join(path).map_err(|_| ApiError::InvalidUrl)?;

        let mut headers = vec![(ACCEPT.to_string(), APPLICATION_JSON.to_string())];

        if access == Access::Authorized {
            let token = self.session.token().ok_or(ApiError::Unauthorized)?;
            if let Some(value) = token.authorization_value() {
                headers.push((AUTHORIZATION.to_string(), value));
            }
        }

        Ok(HttpRequest {
            method,
            url: url.into(),
            headers,
            body: None,
        })
    }

    fn json_request<B: Serialize>(
        &self,
        method: HttpMethod,
        path: &str,
        access: Access,
        body: &B,
    ) -> Result<HttpRequest, ApiError> {
        let mut request = self.request(method, path, access)?;
        let body = serde_json::to_string(body).map_err(|e| ApiError::Underlying(Box::new(e)))?;
        request
            .headers
            .push((CONTENT_TYPE.to_string(), APPLICATION_JSON.to_string()));
        request.body = Some(body);
        Ok(request)
    }
}

/// Endpoint paths are absolute-path references, so they replace any path
/// the base URL carries: `https://host/api` + `/trips` is `https://host/trips`.
fn parse_base_url(raw: &str) -> Result<Url, ApiError> {
    let url = Url::parse(raw.trim()).map_err(|_| ApiError::InvalidUrl)?;
    if url.cannot_be_a_base() {
        return Err(ApiError::InvalidUrl);
    }
    Ok(url)
}
