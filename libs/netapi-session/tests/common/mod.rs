#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

//! Scripted transport and recording handler shared by the session tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use http::{HeaderMap, HeaderValue, StatusCode};
use netapi_session::{
    AuthHeaders, ConnectionOptions, ErrorDisposition, PlatformHandler, PlatformRegistry,
    PlayContext, SessionConnection, SessionError, default_http_error_policy,
};
use netapi_transport::{
    HttpStatusError, HttpTransport, ResponseMeta, TransportError, TransportRequest,
    TransportResponse,
};
use netapi_utils::SecretString;
use parking_lot::Mutex;

pub const PLATFORM: &str = "fake";

type Outcome = Result<TransportResponse, TransportError>;

/// Transport that replays a script of outcomes and records every request.
/// An exhausted script answers `200` with an empty body.
#[derive(Default)]
pub struct FakeTransport {
    script: Mutex<VecDeque<Outcome>>,
    requests: Mutex<Vec<TransportRequest>>,
    resets: AtomicUsize,
}

fn meta(url: &str, status: StatusCode, headers: HeaderMap) -> ResponseMeta {
    ResponseMeta::new(url, status, headers)
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_ok(&self, body: &'static str) {
        self.push_response(StatusCode::OK, HeaderMap::new(), body);
    }

    pub fn push_ok_with_token(&self, token: &'static str, body: &'static str) {
        let mut headers = HeaderMap::new();
        headers.insert("x-auth-token", HeaderValue::from_static(token));
        self.push_response(StatusCode::OK, headers, body);
    }

    pub fn push_response(&self, status: StatusCode, headers: HeaderMap, body: &'static str) {
        let response = TransportResponse::new(meta("http://fake/", status, headers), body);
        self.script.lock().push_back(Ok(response));
    }

    pub fn push_status(&self, status: StatusCode, body: &'static str) {
        let error = HttpStatusError::new(meta("http://fake/", status, HeaderMap::new()), body);
        self.script.lock().push_back(Err(error.into()));
    }

    pub fn push_statuses(&self, status: StatusCode, count: usize) {
        for _ in 0..count {
            self.push_status(status, "");
        }
    }

    pub fn push_network_error(&self) {
        self.script
            .lock()
            .push_back(Err(TransportError::network("http://fake/", "connection refused")));
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_request(&self) -> TransportRequest {
        self.requests.lock().last().cloned().expect("no request sent")
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

impl HttpTransport for FakeTransport {
    fn request(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError> {
        self.requests.lock().push(request.clone());
        match self.script.lock().pop_front() {
            Some(Ok(response)) => Ok(TransportResponse::new(
                meta(&request.url, response.meta.status, response.meta.headers),
                response.body,
            )),
            Some(Err(TransportError::Status(error))) => Err(HttpStatusError::new(
                meta(&request.url, error.status(), error.headers().clone()),
                error.body().clone(),
            )
            .into()),
            Some(Err(other)) => Err(other),
            None => Ok(TransportResponse::new(
                meta(&request.url, StatusCode::OK, HeaderMap::new()),
                "",
            )),
        }
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

/// How [`RecordingHandler`] answers HTTP errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Default,
    AlwaysRetry,
    Fail,
    Substitute,
}

/// Handler counting every hook call.
///
/// `login` installs `X-Auth-Token: <login_token>` when a token is set;
/// `update_auth` picks up an `X-Auth-Token` response header.
pub struct RecordingHandler {
    pub logins: AtomicUsize,
    pub logouts: AtomicUsize,
    pub errors_handled: AtomicUsize,
    pub become_calls: Mutex<Vec<bool>>,
    pub login_args: Mutex<Vec<(String, Option<String>)>>,
    policy: Mutex<Policy>,
    fail_login: AtomicBool,
    fail_logout: AtomicBool,
    login_token: Mutex<Option<String>>,
}

impl Default for RecordingHandler {
    fn default() -> Self {
        Self {
            logins: AtomicUsize::new(0),
            logouts: AtomicUsize::new(0),
            errors_handled: AtomicUsize::new(0),
            become_calls: Mutex::new(Vec::new()),
            login_args: Mutex::new(Vec::new()),
            policy: Mutex::new(Policy::Default),
            fail_login: AtomicBool::new(false),
            fail_logout: AtomicBool::new(false),
            login_token: Mutex::new(None),
        }
    }
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_policy(policy: Policy) -> Arc<Self> {
        let handler = Self::default();
        *handler.policy.lock() = policy;
        Arc::new(handler)
    }

    pub fn issue_token_on_login(&self, token: &str) {
        *self.login_token.lock() = Some(token.to_owned());
    }

    pub fn fail_login(&self, fail: bool) {
        self.fail_login.store(fail, Ordering::SeqCst);
    }

    pub fn fail_logout(&self, fail: bool) {
        self.fail_logout.store(fail, Ordering::SeqCst);
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }

    pub fn errors_handled(&self) -> usize {
        self.errors_handled.load(Ordering::SeqCst)
    }
}

impl PlatformHandler for RecordingHandler {
    fn name(&self) -> &str {
        PLATFORM
    }

    fn set_become(&self, context: &PlayContext) {
        self.become_calls.lock().push(context.become_enabled);
    }

    fn login(
        &self,
        session: &mut SessionConnection,
        username: &str,
        password: Option<&SecretString>,
    ) -> Result<(), SessionError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        self.login_args.lock().push((
            username.to_owned(),
            password.map(|p| p.expose().to_owned()),
        ));
        if self.fail_login.load(Ordering::SeqCst) {
            return Err(SessionError::platform(PLATFORM, "bad credentials"));
        }
        if let Some(token) = self.login_token.lock().clone() {
            session.set_auth(AuthHeaders::single("X-Auth-Token", token));
        }
        Ok(())
    }

    fn logout(&self, _session: &mut SessionConnection) -> Result<(), SessionError> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        if self.fail_logout.load(Ordering::SeqCst) {
            return Err(SessionError::platform(PLATFORM, "logout refused"));
        }
        Ok(())
    }

    fn handle_http_error(
        &self,
        session: &mut SessionConnection,
        error: &HttpStatusError,
    ) -> Result<ErrorDisposition, SessionError> {
        self.errors_handled.fetch_add(1, Ordering::SeqCst);
        let policy = *self.policy.lock();
        match policy {
            Policy::Default => default_http_error_policy(self, session, error),
            Policy::AlwaysRetry => Ok(ErrorDisposition::Retry),
            Policy::Fail => Ok(ErrorDisposition::Fail),
            Policy::Substitute => Ok(ErrorDisposition::Substitute(error.to_response())),
        }
    }

    fn update_auth(&self, meta: &ResponseMeta, _body: &[u8]) -> Option<AuthHeaders> {
        meta.header("X-Auth-Token")
            .map(|token| AuthHeaders::single("X-Auth-Token", token))
    }
}

pub fn options() -> ConnectionOptions {
    ConnectionOptions {
        host: "10.0.0.1".to_owned(),
        network_os: Some(PLATFORM.to_owned()),
        remote_user: Some("admin".to_owned()),
        password: Some(SecretString::new("hunter2")),
        ..ConnectionOptions::default()
    }
}

pub fn registry_with(handler: Arc<RecordingHandler>) -> Arc<PlatformRegistry> {
    let mut registry = PlatformRegistry::with_builtin();
    registry.register_handler(PLATFORM, handler);
    Arc::new(registry)
}

pub fn connection(
    options: ConnectionOptions,
    handler: &Arc<RecordingHandler>,
    transport: &Arc<FakeTransport>,
) -> SessionConnection {
    SessionConnection::new(
        options,
        registry_with(Arc::clone(handler)),
        Arc::clone(transport) as Arc<dyn HttpTransport>,
    )
}
