//! Page Loader — attaches a page-context executor to an extraction channel.
//!
//! A page supplied inline is attached immediately. A page given only by URL is fetched in the
//! background and attached once the body has arrived, so requests made while it loads find no
//! listener and are retried by the orchestrator.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{redirect, Client, Url};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::extraction::channel::{ExtractionChannel, ListenerHandle, PageExecutor};
use crate::extraction::document::PageSnapshot;
use crate::extraction::field_extractor::FieldExtractor;

const MAX_REDIRECTS: usize = 5;

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid page URL: {0}")]
    InvalidUrl(String),

    #[error("refusing to fetch {0}: host is not publicly routable")]
    NonPublicHost(String),
}

/// Checks that `raw` is an http(s) URL whose host resolves only to public addresses.
///
/// Called before a page is fetched on a caller's behalf, so the service cannot be pointed at
/// itself, the local network or cloud metadata endpoints.
pub async fn check_public_url(raw: &str) -> Result<Url, LoadError> {
    let url = Url::parse(raw).map_err(|e| LoadError::InvalidUrl(format!("{raw}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::InvalidUrl(format!(
            "{raw}: only http and https are supported"
        )));
    }
    let host = url
        .host_str()
        .ok_or_else(|| LoadError::InvalidUrl(format!("{raw}: missing host")))?;
    let port = url.port_or_known_default().unwrap_or(80);

    // IPv6 literals come back bracketed
    let literal = host.trim_start_matches('[').trim_end_matches(']');
    let addrs: Vec<IpAddr> = match literal.parse::<IpAddr>() {
        Ok(ip) => vec![ip],
        Err(_) => tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| LoadError::InvalidUrl(format!("{raw}: cannot resolve host: {e}")))?
            .map(|addr| addr.ip())
            .collect(),
    };

    if addrs.is_empty() || !addrs.iter().all(is_public_ip) {
        return Err(LoadError::NonPublicHost(host.to_string()));
    }
    Ok(url)
}

/// Redirect policy for page fetches: bounded hops, and no hops to non-public IP literals
/// or `localhost`.
pub fn redirect_policy() -> redirect::Policy {
    redirect::Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        let blocked = match attempt.url().host_str() {
            Some(host) => {
                let literal = host.trim_start_matches('[').trim_end_matches(']');
                literal.eq_ignore_ascii_case("localhost")
                    || literal
                        .parse::<IpAddr>()
                        .is_ok_and(|ip| !is_public_ip(&ip))
            }
            None => true,
        };
        if blocked {
            attempt.stop()
        } else {
            attempt.follow()
        }
    })
}

pub fn is_public_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_public_v4(&v4),
            None => is_public_v6(v6),
        },
    }
}

fn is_public_v4(ip: &Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    let shared = a == 100 && (64..128).contains(&b); // 100.64.0.0/10
    !(ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_multicast()
        || ip.is_documentation()
        || shared
        || a == 0)
}

fn is_public_v6(ip: &Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    let unique_local = first & 0xfe00 == 0xfc00; // fc00::/7
    let link_local = first & 0xffc0 == 0xfe80; // fe80::/10
    !(ip.is_loopback() || ip.is_unspecified() || ip.is_multicast() || unique_local || link_local)
}

/// Downloads a page body as a snapshot.
pub async fn fetch_page(client: &Client, url: &str) -> Result<PageSnapshot, LoadError> {
    let response = client
        .get(url)
        .header(USER_AGENT, BROWSER_USER_AGENT)
        .header(ACCEPT, "text/html,application/xhtml+xml")
        .send()
        .await?
        .error_for_status()?;

    let final_url = response.url().to_string();
    let html = response.text().await?;
    Ok(PageSnapshot::new(final_url, html))
}

/// An executor attachment that lives as long as this value.
pub enum PageLoad {
    Attached(ListenerHandle),
    Loading(JoinHandle<()>),
}

impl PageLoad {
    pub fn inline(
        channel: &ExtractionChannel,
        snapshot: PageSnapshot,
        extractor: Arc<FieldExtractor>,
    ) -> Self {
        PageLoad::Attached(channel.register(PageExecutor::from_snapshot(snapshot, extractor)))
    }

    pub fn fetch(
        channel: &ExtractionChannel,
        client: Client,
        url: String,
        extractor: Arc<FieldExtractor>,
    ) -> Self {
        let channel = channel.clone();
        PageLoad::Loading(tokio::spawn(async move {
            let snapshot = match fetch_page(&client, &url).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!("Failed to load {url}: {e}");
                    return;
                }
            };
            info!("Loaded {} ({} bytes)", snapshot.url, snapshot.html.len());

            let _listener = channel.register(PageExecutor::from_snapshot(snapshot, extractor));
            // Stay attached until the owner drops this load.
            std::future::pending::<()>().await;
        }))
    }
}

impl Drop for PageLoad {
    fn drop(&mut self) {
        if let PageLoad::Loading(task) = self {
            task.abort();
        }
    }
}
