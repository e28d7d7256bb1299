use std::net::SocketAddr;

use axum::{Extension, Router, http::StatusCode, routing::get};
use time::Duration;
use tower_sessions_ticket_store::{
    CookieSessionConfig, Expiry, Key, Manager, MemoryStore, SameSite, SessionCookieBuilder,
    SessionManagerLayer, TicketSession,
};

type Session = TicketSession<MemoryStore, SessionCookieBuilder>;

async fn index(Extension(session): Extension<Session>) -> Result<String, StatusCode> {
    // A missing or broken cookie starts a fresh session; store outages are real errors.
    let mut state = match session.load().await {
        Ok(state) => state,
        Err(err) if err.is_invalid_session() => Default::default(),
        Err(_) => return Err(StatusCode::SERVICE_UNAVAILABLE),
    };
    let n: usize = state
        .get("n")
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .unwrap_or(0);
    state
        .insert("n", n + 1)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    session
        .save(&mut state)
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;
    Ok(format!("n={n}"))
}

async fn logout(Extension(session): Extension<Session>) -> StatusCode {
    match session.clear().await {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(_) => StatusCode::BAD_REQUEST,
    }
}

#[tokio::main]
async fn main() {
    let key = Key::generate();
    let cookie_config = CookieSessionConfig::default()
        // Default: "_session_ticket"
        .with_name("session")
        // Default: true
        .with_http_only(true)
        // Default: SameSite::Lax
        .with_same_site(SameSite::Strict)
        // Default: true (set to false for local HTTP development)
        .with_secure(false)
        // Default: "/"
        .with_path("/")
        // Default: None
        .without_domain()
        // Default: 4096
        .with_max_cookie_bytes(4096);
    let builder = SessionCookieBuilder::signed(key).with_config(cookie_config);
    let manager = Manager::new(MemoryStore::new(), builder)
        // Default: Expiry::FromCreation(7 days)
        .with_expiry(Expiry::OnInactivity(Duration::hours(1)));

    manager
        .verify_connection()
        .await
        .expect("session store is reachable");

    let app = Router::new()
        .route("/", get(index))
        .route("/logout", get(logout))
        .layer(SessionManagerLayer::new(manager));

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("tcp listener binds successfully");
    let local_addr = listener.local_addr().expect("local address is available");
    println!("listening at http://{local_addr}");

    axum::serve(listener, app)
        .await
        .expect("server runs successfully");
}
