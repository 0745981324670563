use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, warn};

use super::text::{html_to_text, truncate_chars, DEFAULT_MAX_OUTPUT_CHARS};
use super::{Tool, ToolError, ToolInput};

pub const READ_WEBPAGE: &str = "read_webpage";

/// Fetches a page and reduces it to plain text
pub struct ReadWebpageTool {
    client: reqwest::Client,
    max_chars: usize,
    allow_private_hosts: bool,
}

impl ReadWebpageTool {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self {
            client,
            max_chars: DEFAULT_MAX_OUTPUT_CHARS,
            allow_private_hosts: false,
        })
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    /// Permit loopback, link-local and private-network hosts. Off by default:
    /// the URL comes from model output.
    pub fn allow_private_hosts(mut self, allow: bool) -> Self {
        self.allow_private_hosts = allow;
        self
    }
}

fn parse_url(input: &ToolInput) -> Result<url::Url, ToolError> {
    let raw = input
        .arg("url")
        .ok_or_else(|| ToolError::InvalidInput("expected a URL".to_string()))?;
    let url = url::Url::parse(raw.trim())
        .map_err(|e| ToolError::InvalidInput(format!("invalid URL '{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ToolError::InvalidInput(format!("unsupported URL scheme '{}'", other))),
    }
}

const BLOCKED_HOSTS: &[&str] = &["localhost", "metadata.google.internal", "metadata.google"];
const INTERNAL_SUFFIXES: &[&str] = &[".local", ".internal", ".localhost", ".lan"];

/// Reject URLs that point at internal hosts, by name or by resolved address
async fn validate_public_url(url: &url::Url) -> Result<(), ToolError> {
    let blocked = |what: String| ToolError::InvalidInput(format!("access to {} is blocked", what));

    let host = match url.host() {
        Some(url::Host::Ipv4(ip)) => return check_ip(IpAddr::V4(ip)).map_err(blocked),
        Some(url::Host::Ipv6(ip)) => return check_ip(IpAddr::V6(ip)).map_err(blocked),
        Some(url::Host::Domain(domain)) => domain.to_ascii_lowercase(),
        None => return Err(ToolError::InvalidInput("URL has no host".to_string())),
    };
    if BLOCKED_HOSTS.contains(&host.as_str()) || INTERNAL_SUFFIXES.iter().any(|s| host.ends_with(s)) {
        return Err(blocked(format!("internal host '{}'", host)));
    }

    // Unresolvable hosts are left to the request, which reports them as unavailable
    let port = url.port_or_known_default().unwrap_or(80);
    if let Ok(addrs) = tokio::net::lookup_host((host.as_str(), port)).await {
        for addr in addrs {
            check_ip(addr.ip()).map_err(|e| blocked(format!("'{}', which resolves to {}", host, e)))?;
        }
    }
    Ok(())
}

fn check_ip(ip: IpAddr) -> Result<(), String> {
    if is_private_ip(ip) {
        Err(format!("private address {}", ip))
    } else {
        Ok(())
    }
}

fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private()
                || ipv4.is_loopback()
                || ipv4.is_link_local()
                || ipv4.is_broadcast()
                || ipv4.is_documentation()
                || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => {
            if let Some(mapped) = ipv6.to_ipv4_mapped() {
                return is_private_ip(IpAddr::V4(mapped));
            }
            let first = ipv6.segments()[0];
            ipv6.is_loopback()
                || ipv6.is_unspecified()
                || (first & 0xfe00) == 0xfc00 // unique local
                || (first & 0xffc0) == 0xfe80 // link-local
        }
    }
}

#[async_trait]
impl Tool for ReadWebpageTool {
    fn name(&self) -> &str {
        READ_WEBPAGE
    }

    fn description(&self) -> &str {
        "Read webpage content. Input: the page URL. Returns the page's text."
    }

    async fn invoke(&self, input: ToolInput) -> Result<String, ToolError> {
        let url = parse_url(&input)?;
        if !self.allow_private_hosts {
            if let Err(e) = validate_public_url(&url).await {
                warn!(url = %url, error = %e, "refusing to fetch page");
                return Err(e);
            }
        }
        debug!(url = %url, "fetching page");

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Unavailable(format!("HTTP {} for {}", status, url)));
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("html"))
            .unwrap_or(false);
        let body = response.bytes().await?;
        let body = String::from_utf8_lossy(&body);

        if is_html || body.trim_start().starts_with('<') {
            Ok(html_to_text(&body, self.max_chars))
        } else {
            Ok(truncate_chars(body.trim(), self.max_chars))
        }
    }
}
