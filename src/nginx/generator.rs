// src/nginx/generator.rs
use crate::registry::BackendRecord;

/// What the proxy should forward to, derived from the healthy set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamPlan<'a> {
    /// Nothing is healthy; serve 404 so the proxy still has valid config.
    Unavailable,
    /// Proxy everything to one URL.
    Single(&'a str),
    /// Balance across two or more followers, in input order.
    Balanced(Vec<&'a str>),
}

/// Followers are preferred; the first healthy leader is only used when no
/// follower is healthy.
pub fn plan(backends: &[BackendRecord]) -> UpstreamPlan<'_> {
    let mut leaders: Vec<&str> = Vec::new();
    let mut followers: Vec<&str> = Vec::new();
    for backend in backends.iter().filter(|b| b.is_healthy) {
        if backend.is_leader {
            leaders.push(&backend.url);
        } else {
            followers.push(&backend.url);
        }
    }

    match (followers.len(), leaders.first()) {
        (0, None) => UpstreamPlan::Unavailable,
        (0, Some(leader)) => UpstreamPlan::Single(*leader),
        (1, _) => UpstreamPlan::Single(followers[0]),
        _ => UpstreamPlan::Balanced(followers),
    }
}

pub fn render(plan: &UpstreamPlan<'_>) -> String {
    match plan {
        UpstreamPlan::Unavailable => UNAVAILABLE_CONFIG.to_string(),
        UpstreamPlan::Single(url) => single_host_config(url),
        UpstreamPlan::Balanced(urls) => load_balancing_config(urls),
    }
}

/// Render proxy configuration for the current healthy set.
pub fn generate(backends: &[BackendRecord]) -> String {
    render(&plan(backends))
}

/// Network location of a URL (`host[:port]`, userinfo kept), as written.
pub fn upstream_host(url: &str) -> &str {
    let rest = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    &rest[..end]
}

const UNAVAILABLE_CONFIG: &str = "
server {
  listen 80;
  location / {
    return 404;
  }
}
";

fn single_host_config(url: &str) -> String {
    format!(
        "
server {{
  listen 80;
  location / {{
    proxy_pass {};
  }}
}}
",
        url
    )
}

fn load_balancing_config(urls: &[&str]) -> String {
    let servers = urls
        .iter()
        .map(|url| format!("  server {};", upstream_host(url)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "
upstream service {{
{}
}}

server {{
  listen 80;

  location / {{
    proxy_pass http://service;
    proxy_redirect off;
    proxy_next_upstream error timeout;
  }}
}}
",
        servers
    )
}
