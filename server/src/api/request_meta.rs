use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use super::server::AppState;
use crate::submission::RequestMetadata;

pub const COUNTRY_HEADER: &str = "x-appengine-country";
pub const REGION_HEADER: &str = "x-appengine-region";
pub const CITY_HEADER: &str = "x-appengine-city";
pub const CITY_LAT_LONG_HEADER: &str = "x-appengine-citylatlong";

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Accepts `1.2.3.4`, `::1`, `1.2.3.4:5678` and `[::1]:5678`.
fn parse_ip(value: &str) -> Option<IpAddr> {
    let value = value.trim();
    value
        .parse::<IpAddr>()
        .ok()
        .or_else(|| value.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}

/// Client IP as reported by a reverse proxy: the first `X-Forwarded-For` hop,
/// then `X-Real-IP`.
fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(parse_ip);

    forwarded_for.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .and_then(parse_ip)
    })
}

impl RequestMetadata {
    pub fn from_headers(headers: &HeaderMap, peer: Option<IpAddr>, trust_forwarded_for: bool) -> Self {
        let forwarded = if trust_forwarded_for {
            forwarded_ip(headers)
        } else {
            None
        };

        let source_ip = forwarded
            .or(peer)
            .map(|ip| ip.to_canonical().to_string())
            .unwrap_or_default();

        Self {
            country: header_value(headers, COUNTRY_HEADER),
            region: header_value(headers, REGION_HEADER),
            city: header_value(headers, CITY_HEADER),
            city_lat_long: header_value(headers, CITY_LAT_LONG_HEADER),
            source_ip,
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for RequestMetadata {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        Ok(RequestMetadata::from_headers(
            &parts.headers,
            peer,
            state.trust_forwarded_for,
        ))
    }
}
