//! W3C Trace Context and Baggage propagation over HTTP headers.
//!
//! Inbound headers come from an untrusted peer: missing or malformed
//! `traceparent`/`baggage` values yield an empty context instead of an error.

use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::Context;
use opentelemetry_http::{HeaderExtractor, HeaderInjector};
use reqwest::header::HeaderMap;

/// Injects `cx` into outgoing request headers.
pub fn inject<P>(propagator: &P, cx: &Context, headers: &mut HeaderMap)
where
    P: TextMapPropagator + ?Sized,
{
    propagator.inject_context(cx, &mut HeaderInjector(headers));
}

/// Extracts the caller's context from incoming request headers.
pub fn extract<P>(propagator: &P, headers: &HeaderMap) -> Context
where
    P: TextMapPropagator + ?Sized,
{
    propagator.extract(&HeaderExtractor(headers))
}
