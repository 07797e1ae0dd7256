use crate::domain::HttpRequest;
use axum::extract::ConnectInfo;
use axum::http::header::{CONTENT_LENGTH, HOST, REFERER, USER_AGENT};
use axum::http::{HeaderMap, Request, Response};
use std::net::SocketAddr;

const FORWARDED_FOR: &str = "x-forwarded-for";
const FORWARDED_PROTO: &str = "x-forwarded-proto";
const FORWARDED_HOST: &str = "x-forwarded-host";

/// The request half of a request summary, taken before the handler runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestSnapshot {
    pub method: String,
    pub url: String,
    pub request_size: Option<u64>,
    pub user_agent: Option<String>,
    pub remote_ip: Option<String>,
    pub referer: Option<String>,
    pub protocol: String,
}

impl RequestSnapshot {
    pub fn capture<B>(request: &Request<B>) -> Self {
        let headers = request.headers();
        let connect_ip = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Self {
            method: request.method().to_string(),
            url: full_url(request),
            request_size: content_length(headers),
            user_agent: header_text(headers, USER_AGENT.as_str()),
            remote_ip: forwarded_for(headers).or(connect_ip),
            referer: header_text(headers, REFERER.as_str()),
            protocol: format!("{:?}", request.version()),
        }
    }

    /// Completes the summary with what the response reports.
    pub fn finish<B>(self, response: &Response<B>) -> HttpRequest {
        HttpRequest {
            request_method: Some(self.method),
            request_url: Some(self.url),
            request_size: self.request_size,
            status: Some(response.status().as_u16()),
            response_size: content_length(response.headers()),
            user_agent: self.user_agent,
            remote_ip: self.remote_ip,
            referer: self.referer,
            protocol: Some(self.protocol),
            ..HttpRequest::default()
        }
    }
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

/// The client hop of `X-Forwarded-For`.
fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    let chain = headers.get(FORWARDED_FOR)?.to_str().ok()?;
    let first = chain.split(',').next()?.trim();
    (!first.is_empty()).then(|| first.to_string())
}

fn full_url<B>(request: &Request<B>) -> String {
    let headers = request.headers();
    let uri = request.uri();

    let scheme = header_text(headers, FORWARDED_PROTO)
        .or_else(|| uri.scheme_str().map(str::to_string))
        .unwrap_or_else(|| "http".to_string());
    let host = header_text(headers, FORWARDED_HOST)
        .or_else(|| header_text(headers, HOST.as_str()))
        .or_else(|| uri.authority().map(ToString::to_string));
    let path = uri.path_and_query().map_or("/", |pq| pq.as_str());

    match host {
        Some(host) => format!("{scheme}://{host}{path}"),
        None => path.to_string(),
    }
}
