use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use axum::http::{header::LOCATION, HeaderValue, Request, Response, StatusCode, Uri};
use once_cell::sync::Lazy;
use regex::Regex;
use tower::{Layer, Service};

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

static LEGACY_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^/events/([a-z]+)-(\d{4})$").expect("valid legacy events path regex")
});

/// Permanently redirects old `/events/<month>-<year>` calendar URLs to
/// `/events/<year>/<MM>`.
#[derive(Clone, Default)]
pub struct LegacyEventsRedirectLayer;

impl<S> Layer<S> for LegacyEventsRedirectLayer {
    type Service = LegacyEventsRedirect<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LegacyEventsRedirect { inner }
    }
}

#[derive(Clone)]
pub struct LegacyEventsRedirect<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for LegacyEventsRedirect<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    ResBody: Default,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = LegacyRedirectFuture<S::Future, ResBody>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        if let Some(location) = legacy_location(request.uri()) {
            if let Ok(value) = HeaderValue::from_str(&location) {
                tracing::debug!(from = %request.uri(), to = %location, "Redirecting legacy events URL");
                let mut response = Response::new(ResBody::default());
                *response.status_mut() = StatusCode::MOVED_PERMANENTLY;
                response.headers_mut().insert(LOCATION, value);
                return LegacyRedirectFuture::Redirect {
                    response: Some(response),
                };
            }
        }

        LegacyRedirectFuture::Inner {
            future: self.inner.call(request),
        }
    }
}

#[pin_project::pin_project(project = LegacyRedirectProj)]
pub enum LegacyRedirectFuture<F, B> {
    Redirect {
        response: Option<Response<B>>,
    },
    Inner {
        #[pin]
        future: F,
    },
}

impl<F, B, E> Future for LegacyRedirectFuture<F, B>
where
    F: Future<Output = Result<Response<B>, E>>,
{
    type Output = Result<Response<B>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project() {
            LegacyRedirectProj::Redirect { response } => Poll::Ready(Ok(response
                .take()
                .expect("redirect future polled after completion"))),
            LegacyRedirectProj::Inner { future } => future.poll(cx),
        }
    }
}

fn legacy_location(uri: &Uri) -> Option<String> {
    let captures = LEGACY_PATH_RE.captures(uri.path())?;
    let month_name = captures.get(1)?.as_str().to_lowercase();
    let year = captures.get(2)?.as_str();
    let month = MONTHS.iter().position(|m| *m == month_name)? + 1;

    let path = format!("/events/{year}/{month:02}");
    Some(match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(path: &str) -> Option<String> {
        legacy_location(&path.parse::<Uri>().unwrap())
    }

    #[test]
    fn maps_month_names_to_numbers() {
        assert_eq!(
            location("/events/october-2025").as_deref(),
            Some("/events/2025/10")
        );
        assert_eq!(
            location("/events/January-2024").as_deref(),
            Some("/events/2024/01")
        );
    }

    #[test]
    fn keeps_the_query_string() {
        assert_eq!(
            location("/events/may-2026?view=list").as_deref(),
            Some("/events/2026/05?view=list")
        );
    }

    #[test]
    fn ignores_other_paths() {
        assert_eq!(location("/events/spooky-2025"), None);
        assert_eq!(location("/events/2025/10"), None);
        assert_eq!(location("/events/by-day"), None);
        assert_eq!(
            location("/events/0b9c1c2e-61b3-4bb2-9e0d-8c3b6f0f1a11"),
            None
        );
    }
}
