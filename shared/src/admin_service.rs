use crate::http::make_boxed_error_response;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

/// Serves `/health` (liveness) and `/ready` (readiness) for orchestrators.
///
/// Readiness is whatever `is_ready` reports at the time of the request.
pub struct AdminService<F, E> {
    is_ready: F,
    _error: PhantomData<fn() -> E>,
}

impl<F, E> AdminService<F, E>
where
    F: Fn() -> bool,
{
    pub fn new(is_ready: F) -> Self {
        Self {
            is_ready,
            _error: PhantomData,
        }
    }
}

impl<F, E> Service<Request<Incoming>> for AdminService<F, E>
where
    F: Fn() -> bool + Send + Sync + 'static,
    E: Send + 'static,
{
    type Response = Response<BoxBody<Bytes, E>>;
    type Error = E;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let is_ready = (self.is_ready)();

        Box::pin(async move {
            let ok_body = || Full::new(Bytes::from("ok\n")).map_err(|e| match e {}).boxed();

            if req.method() != Method::GET {
                return Ok(make_boxed_error_response(StatusCode::METHOD_NOT_ALLOWED));
            }

            let res = match req.uri().path() {
                "/health" => Response::new(ok_body()),
                "/ready" => match is_ready {
                    true => Response::new(ok_body()),
                    false => make_boxed_error_response(StatusCode::SERVICE_UNAVAILABLE),
                },
                _ => make_boxed_error_response(StatusCode::NOT_FOUND),
            };
            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::serve_listener;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::net::TcpListener;

    async fn spawn_admin(ready: Arc<AtomicBool>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let service =
            AdminService::<_, std::io::Error>::new(move || ready.load(Ordering::Relaxed));

        tokio::spawn(serve_listener(listener, service));

        format!("http://{addr}")
    }

    #[tokio::test]
    async fn health_is_always_ok() {
        let base = spawn_admin(Arc::new(AtomicBool::new(false))).await;

        let response = reqwest::get(format!("{base}/health")).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), "ok\n");
    }

    #[tokio::test]
    async fn ready_follows_flag() {
        let ready = Arc::new(AtomicBool::new(false));
        let base = spawn_admin(ready.clone()).await;

        let response = reqwest::get(format!("{base}/ready")).await.unwrap();
        assert_eq!(response.status(), 503);

        ready.store(true, Ordering::Relaxed);
        let response = reqwest::get(format!("{base}/ready")).await.unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let base = spawn_admin(Arc::new(AtomicBool::new(true))).await;

        let response = reqwest::get(format!("{base}/metrics")).await.unwrap();
        assert_eq!(response.status(), 404);
        assert_eq!(response.text().await.unwrap(), "Not Found\n");
    }

    #[tokio::test]
    async fn non_get_is_not_allowed() {
        let base = spawn_admin(Arc::new(AtomicBool::new(true))).await;
        let client = reqwest::Client::new();

        for route in ["/health", "/ready"] {
            let response = client.post(format!("{base}{route}")).send().await.unwrap();
            assert_eq!(response.status(), 405);
            assert_eq!(response.text().await.unwrap(), "Method Not Allowed\n");
        }
    }
}
