use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use http::{Request, Response};
use tower_cookies::{CookieManager, Cookies};
use tower_layer::Layer;
use tower_service::Service;

use crate::{
    builder::CookieBuilder,
    error::Result,
    manager::Manager,
    state::SessionState,
    store::Store,
};

/// Request-scoped handle to the session manager, inserted into request extensions.
pub struct TicketSession<S, B> {
    manager: Manager<S, B>,
    cookies: Cookies,
}

impl<S, B> Clone for TicketSession<S, B> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            cookies: self.cookies.clone(),
        }
    }
}

impl<S: Store, B: CookieBuilder> TicketSession<S, B> {
    pub async fn load(&self) -> Result<SessionState> {
        self.manager.load(&self.cookies).await
    }

    pub async fn save(&self, state: &mut SessionState) -> Result<()> {
        self.manager.save(&self.cookies, state).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.manager.clear(&self.cookies).await
    }

    pub fn manager(&self) -> &Manager<S, B> {
        &self.manager
    }
}

pub struct SessionManagerLayer<S, B> {
    manager: Manager<S, B>,
}

impl<S, B> Clone for SessionManagerLayer<S, B> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
        }
    }
}

impl<S: Store, B: CookieBuilder> SessionManagerLayer<S, B> {
    pub fn new(manager: Manager<S, B>) -> Self {
        Self { manager }
    }
}

pub struct SessionManagerService<I, S, B> {
    inner: I,
    manager: Manager<S, B>,
}

impl<I: Clone, S, B> Clone for SessionManagerService<I, S, B> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            manager: self.manager.clone(),
        }
    }
}

impl<I, S, B> Layer<I> for SessionManagerLayer<S, B> {
    type Service = CookieManager<SessionManagerService<I, S, B>>;

    fn layer(&self, inner: I) -> Self::Service {
        CookieManager::new(SessionManagerService {
            inner,
            manager: self.manager.clone(),
        })
    }
}

impl<ReqBody, ResBody, I, S, B> Service<Request<ReqBody>> for SessionManagerService<I, S, B>
where
    I: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    I::Future: Send,
    ReqBody: Send + 'static,
    ResBody: Default + Send,
    S: Store,
    B: CookieBuilder,
{
    type Response = I::Response;
    type Error = I::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let manager = self.manager.clone();

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let Some(cookies) = req.extensions().get::<Cookies>().cloned() else {
                tracing::error!("request is missing the cookie jar");
                let mut res = Response::default();
                *res.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
                return Ok(res);
            };

            req.extensions_mut()
                .insert(TicketSession { manager, cookies });

            inner.call(req).await
        })
    }
}
