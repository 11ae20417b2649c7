mod v1;

use crate::state::State;
use crate::{Error, StatusCodeError};

use std::convert::Infallible;
use std::net::SocketAddr;
use std::pin::Pin;
use std::str::FromStr;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::Future;
use hyper::header::{
    HeaderValue, IntoHeaderName, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_LENGTH, CONTENT_TYPE,
};
use hyper::http::request::Parts;
use hyper::server::conn::Http;
use hyper::service::Service;
use hyper::{Body, HeaderMap, Method, StatusCode, Uri};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::net::TcpSocket;
use tokio::time::Instant;

/// The largest request body accepted.
const MAX_BODY_LENGTH: u64 = 16384;

pub type Result = std::result::Result<Response, Error>;

pub async fn bind(addr: SocketAddr, state: State) -> std::result::Result<(), Error> {
    let mut shutdown_rx = state.shutdown_rx.clone();

    let service = RootService { state };

    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };

    if let Err(err) = socket.set_reuseaddr(true) {
        log::warn!("Failed to set SO_REUSEADDR flag: {}", err);
    }

    socket.bind(addr)?;
    let listener = socket.listen(1024)?;
    log::info!("Listening on {}", addr);

    loop {
        tokio::select! {
            res = listener.accept() => {
                let (stream, addr) = match res {
                    Ok((stream, addr)) => (stream, addr),
                    Err(err) => {
                        log::warn!("Failed to accept connection: {:?}", err);
                        continue;
                    }
                };
                log::debug!("Accepting new connection from {:?}", addr);

                let service = service.clone();
                let mut shutdown_rx = shutdown_rx.clone();
                tokio::task::spawn(async move {
                    let mut conn = Http::new()
                        .http1_keep_alive(true)
                        .serve_connection(stream, service);

                    let mut conn = Pin::new(&mut conn);

                    tokio::select! {
                        res = &mut conn => {
                            if let Err(err) = res {
                                log::warn!("Http error: {:?}", err);
                            }
                        }
                        _ = shutdown_rx.changed() => {
                            log::debug!("Shutting down connection");
                            conn.graceful_shutdown();
                        }
                    }
                });
            }
            _ = shutdown_rx.changed() => {
                log::debug!("Shutting down http server");
                return Ok(());
            }
        }
    }
}

#[derive(Clone, Debug)]
struct RootService {
    state: State,
}

impl Service<hyper::Request<Body>> for RootService {
    type Response = hyper::Response<Body>;
    type Error = Infallible;
    type Future = RootServiceFuture;

    fn poll_ready(&mut self, _cx: &mut Context) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    #[inline]
    fn call(&mut self, req: hyper::Request<Body>) -> Self::Future {
        RootServiceFuture::new(req, self.state.clone())
    }
}

struct RootServiceFuture(BoxFuture<'static, std::result::Result<hyper::Response<Body>, Infallible>>);

impl RootServiceFuture {
    fn new(req: hyper::Request<Body>, state: State) -> Self {
        Self(Box::pin(service_root(req, state)))
    }
}

impl Future for RootServiceFuture {
    type Output = std::result::Result<hyper::Response<Body>, Infallible>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        self.0.as_mut().poll(cx)
    }
}

async fn service_root(
    req: hyper::Request<Body>,
    state: State,
) -> std::result::Result<hyper::Response<Body>, Infallible> {
    log::trace!("Head: {} {}", req.method(), req.uri());
    log::trace!("Headers: {:?}", req.headers());

    let req = Request::new(req, state);

    let origin = req.headers().get("Origin").cloned();

    let res = match check_body_length(&req) {
        Ok(()) => {
            let path = String::from(req.uri().path());
            let mut uri = RequestUri::new(&path);

            match uri.take_str() {
                Some("v1") => v1::route(req, uri).await,
                _ => Err(Error::NotFound),
            }
        }
        Err(err) => Err(err),
    };

    let mut resp = match res {
        Ok(resp) => resp,
        Err(err) => error_response(err),
    };

    if let Some(origin) = origin {
        resp = resp.header(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }

    resp = resp.header(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("content-type"),
    );

    Ok(resp.build())
}

/// Rejects POST requests without a valid "Content-Length" header or with a body that is
/// too large.
fn check_body_length(req: &Request) -> std::result::Result<(), Error> {
    if req.method() != Method::POST {
        return Ok(());
    }

    let length = req.content_length()?;
    if length > MAX_BODY_LENGTH {
        return Err(StatusCodeError::payload_too_large().into());
    }

    Ok(())
}

fn error_response(err: Error) -> Response {
    let resp = Response::ok();

    match err {
        Error::NotFound => resp.status(StatusCode::NOT_FOUND).body("Not Found"),
        Error::BadRequest => resp.status(StatusCode::BAD_REQUEST).body("Bad Request"),
        Error::StatusCodeError(err) => resp.status(err.code).json(&ErrorResponse {
            code: err.code.as_u16(),
            message: err.message,
        }),
        Error::Validation(err) => {
            let code = err.status();

            log::debug!("Rejected request: {}", err);

            resp.status(code).json(&ErrorResponse {
                code: code.as_u16(),
                message: err.to_string(),
            })
        }
        err => {
            log::error!("{:?}", err);

            resp.status(StatusCode::INTERNAL_SERVER_ERROR)
                .body("Internal Server Error")
        }
    }
}

#[derive(Debug)]
pub struct Request {
    pub parts: Parts,
    pub body: Option<Body>,
    state: State,
}

impl Request {
    #[inline]
    fn new(req: hyper::Request<Body>, state: State) -> Self {
        let (parts, body) = req.into_parts();

        Self {
            parts,
            body: Some(body),
            state,
        }
    }

    #[inline]
    pub fn state(&self) -> &State {
        &self.state
    }

    #[inline]
    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap<HeaderValue> {
        &self.parts.headers
    }

    #[inline]
    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    /// Returns the value of the query parameter `key`, if present.
    pub fn query(&self, key: &str) -> Option<&str> {
        query_value(self.uri().query()?, key)
    }

    pub async fn json<T>(&mut self) -> std::result::Result<T, Error>
    where
        T: DeserializeOwned,
    {
        const DUR: Duration = Duration::new(30, 0);

        let deadline = Instant::now() + DUR;

        let body = self.body.take().ok_or_else(StatusCodeError::bad_request)?;

        let bytes = tokio::select! {
            res = hyper::body::to_bytes(body) => {
                res?
            }
            _ = tokio::time::sleep_until(deadline) => {
                log::info!("Client failed to transmit body in {}s, dropping connection", DUR.as_secs());
                return Err(StatusCodeError::request_timeout().into());
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(value),
            Err(err) => Err(StatusCodeError::new(StatusCode::BAD_REQUEST, err).into()),
        }
    }

    /// Returns the value of the "Content-Length" header. If the header is not present or has an
    /// invalid value an error is returned.
    pub fn content_length(&self) -> std::result::Result<u64, Error> {
        let value = self
            .headers()
            .get(CONTENT_LENGTH)
            .ok_or_else(StatusCodeError::length_required)?;

        match value.to_str().map(str::parse::<u64>) {
            Ok(Ok(length)) => Ok(length),
            _ => {
                log::debug!("Invalid \"Content-Length\" header: {:?}", value);

                Err(StatusCodeError::bad_request().into())
            }
        }
    }
}

fn query_value<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, value)| value)
}

#[derive(Copy, Clone, Debug)]
pub struct RequestUri<'a> {
    path: &'a str,
}

impl<'a> RequestUri<'a> {
    pub fn new(mut path: &'a str) -> Self {
        if let Some(rem) = path.strip_prefix('/') {
            path = rem;
        }

        Self { path }
    }

    pub fn take(&mut self) -> Option<UriPart<'a>> {
        let part = self.take_str()?;

        Some(UriPart { part })
    }

    pub fn take_str(&mut self) -> Option<&'a str> {
        if self.path.is_empty() {
            None
        } else {
            Some(match self.path.split_once('/') {
                Some((part, rem)) => {
                    self.path = rem;
                    part
                }
                None => {
                    let path = self.path;
                    self.path = "";
                    path
                }
            })
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct UriPart<'a> {
    part: &'a str,
}

impl<'a> UriPart<'a> {
    pub fn parse<T>(&self) -> std::result::Result<T, Error>
    where
        T: FromStr,
    {
        match self.part.parse() {
            Ok(v) => Ok(v),
            Err(_) => Err(Error::BadRequest),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
}

impl Response {
    /// 200 OK
    pub fn ok() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Body::empty(),
        }
    }

    /// 204 No Content
    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            headers: HeaderMap::new(),
            body: Body::empty(),
        }
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn body<T>(mut self, body: T) -> Self
    where
        T: Into<Body>,
    {
        self.body = body.into();
        self
    }

    pub fn json<T>(mut self, body: &T) -> Self
    where
        T: Serialize,
    {
        match serde_json::to_vec(body) {
            Ok(buf) => {
                self.body = Body::from(buf);
                self.header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            }
            Err(err) => {
                log::error!("Failed to serialize response body: {}", err);

                self.status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body("Internal Server Error")
            }
        }
    }

    pub fn header<K>(mut self, key: K, value: HeaderValue) -> Self
    where
        K: IntoHeaderName,
    {
        self.headers.append(key, value);
        self
    }

    fn build(self) -> hyper::Response<Body> {
        let mut resp = hyper::Response::new(self.body);
        *resp.status_mut() = self.status;
        *resp.headers_mut() = self.headers;
        resp
    }
}

/// Checks the request method and runs the specified path. If no matching method is found
/// an method_not_allowed error is returned.
#[macro_export]
macro_rules! method {
    ($req:expr, {$($method:expr => $branch:expr),* $(,)?}) => {
        match $req.method() {
            $(
                method if method == $method => $branch,
            )*
            method if method == hyper::Method::OPTIONS => {
                use $crate::http::Response;
                use hyper::header::{HeaderValue, ALLOW, ACCESS_CONTROL_ALLOW_METHODS};

                let allow = [$($method.as_str()),*].join(",");

                let mut resp = Response::no_content();
                if let Ok(allow) = HeaderValue::from_str(&allow) {
                    resp = resp
                        .header(ALLOW, allow.clone())
                        .header(ACCESS_CONTROL_ALLOW_METHODS, allow);
                }

                Ok(resp)
            }
            _ => Err($crate::StatusCodeError::method_not_allowed().into()),
        }
    };
}

#[cfg(test)]
mod tests {
    use hyper::StatusCode;

    use super::{error_response, query_value, RequestUri};
    use crate::model::CategoryState;
    use crate::{Error, StatusCodeError, ValidationError};

    #[test]
    fn test_request_uri() {
        let mut uri = RequestUri::new("/v1/tournaments/3/fixture");
        assert_eq!(uri.take_str(), Some("v1"));
        assert_eq!(uri.take_str(), Some("tournaments"));
        assert_eq!(uri.take().unwrap().parse::<u64>().unwrap(), 3);
        assert_eq!(uri.take_str(), Some("fixture"));
        assert_eq!(uri.take_str(), None);

        let mut uri = RequestUri::new("/");
        assert_eq!(uri.take_str(), None);

        let mut uri = RequestUri::new("/v1/tournaments/abc");
        uri.take_str();
        uri.take_str();
        assert!(matches!(
            uri.take().unwrap().parse::<u64>(),
            Err(Error::BadRequest)
        ));
    }

    #[test]
    fn test_query_value() {
        assert_eq!(query_value("category=4", "category"), Some("4"));
        assert_eq!(query_value("a=1&category=7&b=2", "category"), Some("7"));
        assert_eq!(query_value("categories=7", "category"), None);
        assert_eq!(query_value("category", "category"), None);
        assert_eq!(query_value("", "category"), None);
    }

    #[test]
    fn test_error_response() {
        let resp = error_response(Error::NotFound).build();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = error_response(
            ValidationError::InvalidCategoryState(CategoryState::Published).into(),
        )
        .build();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = error_response(ValidationError::NoCourts.into()).build();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = error_response(
            ValidationError::Schedule(tournament_fixture_core::Error::InvalidSlotLength).into(),
        )
        .build();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = error_response(StatusCodeError::payload_too_large().into()).build();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let resp = error_response(Error::InvalidColumn("state")).build();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
