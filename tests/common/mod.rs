#![allow(dead_code)]

// Shared helpers for integration tests.
//
// The HTTP helpers use `tower_cookies::Cookie` parsing/encoding to match what the middleware
// emits in `Set-Cookie` and what browsers send back in `Cookie`. The fakes stand in for the
// cookie transport and the store when a test needs to observe or break them.
use std::{
    convert::Infallible,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use axum::body::Body;
use http::{HeaderMap, Request, Response, header};
use http_body_util::BodyExt as _;
use time::Duration;
use tower_cookies::{Cookie, Cookies};
use tower_sessions_ticket_store::{
    CookieBuilder, CookieError, DEFAULT_COOKIE_NAME, MemoryStore, Store, StoreError,
    TicketSession,
};

pub async fn save_handler<S: Store, B: CookieBuilder>(
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    // Load the current session if there is one, bump a counter, and save it back.
    let session = req
        .extensions()
        .get::<TicketSession<S, B>>()
        .cloned()
        .expect("request includes TicketSession extension");

    let mut state = session.load().await.unwrap_or_default();
    let n: u32 = state.get("n").expect("session get succeeds").unwrap_or(0);
    state.insert("n", n + 1).expect("session insert succeeds");
    session.save(&mut state).await.expect("session saves");

    Ok(Response::new(Body::from((n + 1).to_string())))
}

pub async fn load_handler<S: Store, B: CookieBuilder>(
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    // Report the counter, or "none" when the request has no valid session.
    let session = req
        .extensions()
        .get::<TicketSession<S, B>>()
        .cloned()
        .expect("request includes TicketSession extension");

    let body = match session.load().await {
        Ok(state) => state
            .get::<u32>("n")
            .expect("session get succeeds")
            .map(|n| n.to_string())
            .unwrap_or_else(|| "empty".to_string()),
        Err(err) if err.is_invalid_session() => "none".to_string(),
        Err(err) => panic!("unexpected backend error: {err}"),
    };

    Ok(Response::new(Body::from(body)))
}

#[cfg(feature = "signed")]
pub fn make_signed_layer(
    config: tower_sessions_ticket_store::CookieSessionConfig,
    expiry: tower_sessions_ticket_store::Expiry,
) -> (
    tower_cookies::Key,
    tower_sessions_ticket_store::SessionManagerLayer<
        MemoryStore,
        tower_sessions_ticket_store::SessionCookieBuilder,
    >,
) {
    // Create a signed-cookie session layer and return both the key and the layer for tests that
    // need to inspect/unsign cookie values.
    let key = tower_cookies::Key::generate();
    let builder =
        tower_sessions_ticket_store::SessionCookieBuilder::signed(key.clone()).with_config(config);
    let manager =
        tower_sessions_ticket_store::Manager::new(MemoryStore::new(), builder).with_expiry(expiry);
    (
        key,
        tower_sessions_ticket_store::SessionManagerLayer::new(manager),
    )
}

pub async fn body_string(body: Body) -> String {
    // Collect an Axum body into a UTF-8 string for assertions.
    let bytes = body
        .collect()
        .await
        .expect("body collects successfully")
        .to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

pub fn get_session_cookie(res: &Response<Body>) -> Cookie<'static> {
    get_session_cookie_from_headers(res.headers())
}

pub fn get_session_cookie_from_headers(headers: &HeaderMap) -> Cookie<'static> {
    let set_cookie = headers
        .get(header::SET_COOKIE)
        .expect("response includes set-cookie header");
    let set_cookie = set_cookie
        .to_str()
        .expect("set-cookie header is valid utf-8");
    Cookie::parse_encoded(set_cookie)
        .expect("set-cookie parses successfully")
        .into_owned()
}

pub fn cookie_header_value(cookie: &Cookie<'_>) -> String {
    cookie.encoded().to_string()
}

pub fn tamper_cookie_value(cookie: &mut Cookie<'_>) {
    let mut value = cookie.value().to_string();
    let last = value
        .pop()
        .expect("cookie value has at least one character");
    let replacement = if last == 'A' { 'B' } else { 'A' };
    value.push(replacement);
    cookie.set_value(value);
}

pub fn assert_max_age_seconds_close(cookie: &Cookie<'_>, expected_seconds: i64) {
    // Max-Age is computed relative to "now", so assertions allow a small amount of clock drift.
    let actual_seconds = cookie
        .max_age()
        .expect("session cookie has max-age")
        .whole_seconds();
    assert!((actual_seconds - expected_seconds).abs() <= 1);
}

/// What the fake cookie transport reports for the incoming request.
#[derive(Debug, Clone)]
pub enum Incoming {
    Missing,
    Invalid,
    Value(String),
}

#[derive(Debug)]
struct FakeJar {
    incoming: Mutex<Incoming>,
    written: Mutex<Option<(String, Duration)>>,
    encodes: AtomicUsize,
    clears: AtomicUsize,
    fail_encode: AtomicBool,
    fail_clear: AtomicBool,
}

/// In-memory cookie transport that records every call.
#[derive(Debug, Clone)]
pub struct FakeCookieBuilder {
    jar: Arc<FakeJar>,
}

impl FakeCookieBuilder {
    pub fn new() -> Self {
        Self {
            jar: Arc::new(FakeJar {
                incoming: Mutex::new(Incoming::Missing),
                written: Mutex::new(None),
                encodes: AtomicUsize::new(0),
                clears: AtomicUsize::new(0),
                fail_encode: AtomicBool::new(false),
                fail_clear: AtomicBool::new(false),
            }),
        }
    }

    pub fn set_incoming(&self, incoming: Incoming) {
        *self.jar.incoming.lock().expect("fake jar lock") = incoming;
    }

    /// Simulate the browser sending back whatever was last written.
    pub fn send_back_written(&self) {
        let value = self.written_value().expect("a cookie was written");
        self.set_incoming(Incoming::Value(value));
    }

    pub fn written_value(&self) -> Option<String> {
        self.written().map(|(value, _)| value)
    }

    pub fn written(&self) -> Option<(String, Duration)> {
        self.jar.written.lock().expect("fake jar lock").clone()
    }

    pub fn encodes(&self) -> usize {
        self.jar.encodes.load(Ordering::SeqCst)
    }

    pub fn clears(&self) -> usize {
        self.jar.clears.load(Ordering::SeqCst)
    }

    pub fn fail_encode(&self) {
        self.jar.fail_encode.store(true, Ordering::SeqCst);
    }

    pub fn fail_clear(&self) {
        self.jar.fail_clear.store(true, Ordering::SeqCst);
    }
}

impl CookieBuilder for FakeCookieBuilder {
    fn cookie_name(&self) -> &str {
        DEFAULT_COOKIE_NAME
    }

    fn decode(&self, _: &Cookies) -> Result<String, CookieError> {
        match &*self.jar.incoming.lock().expect("fake jar lock") {
            Incoming::Missing => Err(CookieError::Missing),
            Incoming::Invalid => Err(CookieError::Invalid),
            Incoming::Value(value) => Ok(value.clone()),
        }
    }

    fn encode(&self, _: &Cookies, value: String, max_age: Duration) -> Result<(), CookieError> {
        self.jar.encodes.fetch_add(1, Ordering::SeqCst);
        if self.jar.fail_encode.load(Ordering::SeqCst) {
            return Err(CookieError::Other("cookie jar unavailable".into()));
        }
        *self.jar.written.lock().expect("fake jar lock") = Some((value, max_age));
        Ok(())
    }

    fn clear(&self, _: &Cookies) -> Result<(), CookieError> {
        self.jar.clears.fetch_add(1, Ordering::SeqCst);
        if self.jar.fail_clear.load(Ordering::SeqCst) {
            return Err(CookieError::Other("cookie jar unavailable".into()));
        }
        *self.jar.written.lock().expect("fake jar lock") = None;
        Ok(())
    }
}

/// [`MemoryStore`] wrapper whose operations can be made to fail like an unreachable backend.
#[derive(Debug, Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_save: AtomicBool,
    pub fail_load: AtomicBool,
    pub fail_clear: AtomicBool,
    pub saves: AtomicUsize,
}

fn unavailable() -> StoreError {
    StoreError::Backend("connection refused".into())
}

#[async_trait]
impl Store for FlakyStore {
    async fn save(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.save(key, value, ttl).await
    }

    async fn load(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.load(key).await
    }

    async fn clear(&self, key: &str) -> Result<(), StoreError> {
        if self.fail_clear.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.clear(key).await
    }

    async fn verify_connection(&self) -> Result<(), StoreError> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }
}
