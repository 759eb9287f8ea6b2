use std::{
    borrow::Cow,
    collections::HashSet,
    future::Future,
    marker::PhantomData,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll},
    time::Instant,
};

use bytes::Bytes;
use futures_core::ready;
use pin_project_lite::pin_project;
use regex::Regex;

use actix_service::{Service, Transform};
use actix_utils::future::{Ready, ready};
use actix_web::body::{BodySize, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header::{self, HeaderMap, HeaderName};
use actix_web::{Error, Result};

use crate::entry::{LoggingEntry, MISSING, path_with_query};
use crate::wrapper::{AccessLogSink, AccessRecord};

const DEFAULT_LOG_TARGET: &str = "actix_web_middleware_clf::logger";

/// Middleware writing one common log format record per request.
///
/// Records are emitted once the response body has been fully sent (or the
/// connection dropped it), at `error` level for 5xx responses, `warn` for
/// 4xx and `info` for everything else.
///
/// # Examples
/// ```rust
/// use actix_web::App;
/// use actix_web_middleware_clf::AccessLogger;
///
/// let app = App::new()
///     .wrap(AccessLogger::default());
/// ```
pub struct AccessLogger(Rc<Inner>);

struct Inner {
    sink: Box<dyn AccessLogSink>,
    exclude: HashSet<String>,
    exclude_regex: Vec<Regex>,
    log_target: Cow<'static, str>,
    real_ip: bool,
}

impl AccessLogger {
    /// Create `AccessLogger` middleware writing records to `sink`.
    pub fn new<T: AccessLogSink + 'static>(sink: T) -> AccessLogger {
        AccessLogger(Rc::new(Inner {
            sink: Box::new(sink),
            exclude: HashSet::new(),
            exclude_regex: Vec::new(),
            log_target: Cow::Borrowed(DEFAULT_LOG_TARGET),
            real_ip: false,
        }))
    }

    fn inner_mut(&mut self) -> &mut Inner {
        Rc::get_mut(&mut self.0).expect("AccessLogger configured after being shared")
    }

    /// Ignore and do not log access info for specified path.
    pub fn exclude<T: Into<String>>(mut self, path: T) -> Self {
        self.inner_mut().exclude.insert(path.into());
        self
    }

    /// Ignore and do not log access info for paths that match regex.
    ///
    /// # Panics
    /// Panics if `path` is not a valid regular expression. See
    /// [`try_exclude_regex`](AccessLogger::try_exclude_regex).
    pub fn exclude_regex<T: Into<String>>(self, path: T) -> Self {
        match self.try_exclude_regex(path) {
            Ok(logger) => logger,
            Err(err) => panic!("invalid exclude pattern: {err}"),
        }
    }

    /// Like [`exclude_regex`](AccessLogger::exclude_regex), returning the
    /// compilation error instead of panicking.
    pub fn try_exclude_regex<T: Into<String>>(mut self, path: T) -> Result<Self, regex::Error> {
        let re = Regex::new(&path.into())?;
        self.inner_mut().exclude_regex.push(re);
        Ok(self)
    }

    /// Sets the logging target to `target`.
    ///
    /// By default, the log target is `actix_web_middleware_clf::logger`.
    ///
    /// # Examples
    /// Using `.log_target("http_access")` would have this effect on request logs:
    /// ```diff
    /// - [2015-10-21T07:28:00Z INFO  actix_web_middleware_clf::logger] 127.0.0.1:50312 - - [21/Oct/2015:07:28:00 +0000] "GET / HTTP/1.1" 200 88 "-" "dmc/1.0" 1.985ms
    /// + [2015-10-21T07:28:00Z INFO  http_access] 127.0.0.1:50312 - - [21/Oct/2015:07:28:00 +0000] "GET / HTTP/1.1" 200 88 "-" "dmc/1.0" 1.985ms
    ///                               ^^^^^^^^^^^
    /// ```
    pub fn log_target(mut self, target: impl Into<Cow<'static, str>>) -> Self {
        self.inner_mut().log_target = target.into();
        self
    }

    /// Take `clientIP` from the `Forwarded` / `X-Forwarded-For` headers when
    /// present instead of the socket peer address.
    ///
    /// Only enable this behind a proxy that sets those headers; clients can
    /// forge them otherwise.
    pub fn real_ip(mut self, enabled: bool) -> Self {
        self.inner_mut().real_ip = enabled;
        self
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.0.exclude.contains(path) || self.0.exclude_regex.iter().any(|r| r.is_match(path))
    }
}

#[cfg(feature = "log")]
impl Default for AccessLogger {
    /// Create `AccessLogger` middleware writing to the `log` facade.
    fn default() -> Self {
        AccessLogger::new(crate::wrapper::rust_log::LogSink)
    }
}

impl<S, B> Transform<S, ServiceRequest> for AccessLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    B: MessageBody,
{
    type Response = ServiceResponse<ObservedBody<B>>;
    type Error = Error;
    type Transform = AccessLoggerMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AccessLoggerMiddlewareService {
            service,
            logger: AccessLogger(Rc::clone(&self.0)),
        }))
    }
}

/// Request data captured before the inner service runs.
struct PendingEntry {
    start: Instant,
    client_ip: String,
    method: String,
    path: String,
    proto: &'static str,
    referer: String,
    user_agent: String,
    inner: Rc<Inner>,
}

impl PendingEntry {
    fn capture(req: &ServiceRequest, inner: Rc<Inner>) -> Self {
        let client_ip = if inner.real_ip {
            req.connection_info()
                .realip_remote_addr()
                .map(str::to_string)
        } else {
            req.peer_addr().map(|addr| addr.to_string())
        };

        PendingEntry {
            start: Instant::now(),
            client_ip: client_ip.unwrap_or_else(|| MISSING.to_string()),
            method: req.method().to_string(),
            path: path_with_query(req.uri().path(), req.uri().query()),
            proto: proto(req.version()),
            referer: header_value(req.headers(), &header::REFERER),
            user_agent: header_value(req.headers(), &header::USER_AGENT),
            inner,
        }
    }

    fn finish(self, status: u16, size: u64) {
        let entry = LoggingEntry::new(
            status,
            self.start.elapsed(),
            self.client_ip,
            self.method,
            self.path,
            self.proto.to_string(),
            self.referer,
            size,
            self.user_agent,
        );
        let duration_pretty = entry.duration_pretty();
        let message = entry.message();

        self.inner.sink.emit(&AccessRecord {
            target: self.inner.log_target.as_ref(),
            severity: entry.severity(),
            entry: &entry,
            duration_pretty: &duration_pretty,
            message: &message,
        });
    }
}

fn proto(version: actix_http::Version) -> &'static str {
    match version {
        actix_http::Version::HTTP_09 => "HTTP/0.9",
        actix_http::Version::HTTP_10 => "HTTP/1.0",
        actix_http::Version::HTTP_11 => "HTTP/1.1",
        actix_http::Version::HTTP_2 => "HTTP/2.0",
        actix_http::Version::HTTP_3 => "HTTP/3.0",
        _ => "unknown",
    }
}

/// Header value as text; empty when absent or not visible ASCII.
fn header_value(headers: &HeaderMap, name: &HeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pin_project! {
    /// Response body wrapper recording status and bytes sent.
    ///
    /// Chunks are forwarded untouched. The access record is emitted when the
    /// body is dropped.
    pub struct ObservedBody<B> {
        #[pin]
        body: B,
        pending: Option<PendingEntry>,
        status: u16,
        size: u64,
    }

    impl<B> PinnedDrop for ObservedBody<B> {
        fn drop(this: Pin<&mut Self>) {
            let this = this.project();
            if let Some(pending) = this.pending.take() {
                pending.finish(*this.status, *this.size);
            }
        }
    }
}

impl<B> ObservedBody<B> {
    /// Status code of the response carrying this body.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Bytes handed to the server so far.
    pub fn bytes_written(&self) -> u64 {
        self.size
    }
}

impl<B: MessageBody> MessageBody for ObservedBody<B> {
    type Error = B::Error;

    #[inline]
    fn size(&self) -> BodySize {
        self.body.size()
    }

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Bytes, Self::Error>>> {
        let this = self.project();

        match ready!(this.body.poll_next(cx)) {
            Some(Ok(chunk)) => {
                *this.size = this.size.saturating_add(chunk.len() as u64);
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(err)) => Poll::Ready(Some(Err(err))),
            None => Poll::Ready(None),
        }
    }
}

/// Logger middleware service.
pub struct AccessLoggerMiddlewareService<S> {
    logger: AccessLogger,
    service: S,
}

impl<S, B> Service<ServiceRequest> for AccessLoggerMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    B: MessageBody,
{
    type Response = ServiceResponse<ObservedBody<B>>;
    type Error = Error;
    type Future = AccessLoggerResponse<S, B>;

    actix_service::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let pending = if self.logger.is_excluded(req.path()) {
            None
        } else {
            Some(PendingEntry::capture(&req, Rc::clone(&self.logger.0)))
        };

        AccessLoggerResponse {
            fut: self.service.call(req),
            pending,
            _phantom: PhantomData,
        }
    }
}

pin_project! {
    pub struct AccessLoggerResponse<S, B>
    where
        B: MessageBody,
        S: Service<ServiceRequest>,
    {
        #[pin]
        fut: S::Future,
        pending: Option<PendingEntry>,
        _phantom: PhantomData<B>,
    }
}

impl<S, B> Future for AccessLoggerResponse<S, B>
where
    B: MessageBody,
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
{
    type Output = Result<ServiceResponse<ObservedBody<B>>, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        let res = match ready!(this.fut.poll(cx)) {
            Ok(res) => res,
            Err(err) => return Poll::Ready(Err(err)),
        };

        #[cfg(feature = "log")]
        if let Some(error) = res.response().error() {
            log::debug!("Error in response: {:?}", error);
        }

        let status = res.status().as_u16();
        let pending = this.pending.take();

        Poll::Ready(Ok(res.map_body(move |_, body| ObservedBody {
            body,
            pending,
            status,
            size: 0,
        })))
    }
}
