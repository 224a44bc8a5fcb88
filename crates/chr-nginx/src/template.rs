//! Site file rendering.
//!
//! `render` is pure: the same mode and parameters always produce the same
//! text apart from the `# Generated:` line. Moving a domain from pending
//! to active replaces the whole file, so nothing from the pending template
//! can survive into the active one.
//!
//! The active template carries a fixed policy:
//! - TLSv1.2 and TLSv1.3 only, fixed ECDHE/AEAD cipher list
//! - HSTS without `includeSubDomains` and without `preload`
//! - `server_tokens off` and `X-Powered-By` stripped from upstream responses
//! - session cache named `CHR` so it cannot collide with other sites' caches
//! - ACME HTTP-01 challenges are never redirected

use std::path::{Path, PathBuf};

use chr_core::ConfigMode;
use chr_core::layout::{FULLCHAIN_FILE, PRIVKEY_FILE};
use chrono::{DateTime, SecondsFormat, Utc};

pub const ACME_CHALLENGE_PATH: &str = "/.well-known/acme-challenge/";
pub const SESSION_CACHE: &str = "shared:CHR:10m";
pub const TLS_PROTOCOLS: &str = "TLSv1.2 TLSv1.3";
pub const TLS_CIPHERS: &str = "ECDHE-ECDSA-AES128-GCM-SHA256:ECDHE-RSA-AES128-GCM-SHA256:\
ECDHE-ECDSA-AES256-GCM-SHA384:ECDHE-RSA-AES256-GCM-SHA384:\
ECDHE-ECDSA-CHACHA20-POLY1305:ECDHE-RSA-CHACHA20-POLY1305";
pub const HSTS_VALUE: &str = "max-age=63072000";

/// Inputs to a site file.
#[derive(Debug, Clone, Copy)]
pub struct SiteParams<'a> {
    pub domain: &'a str,
    pub upstream: &'a str,
    /// Root certificate directory; the domain's subdirectory is derived.
    pub cert_dir: &'a Path,
}

/// Certificate files referenced by the active template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertPaths {
    pub fullchain: PathBuf,
    pub privkey: PathBuf,
}

pub fn cert_paths(domain: &str, cert_dir: &Path) -> CertPaths {
    let base = cert_dir.join(domain);
    CertPaths {
        fullchain: base.join(FULLCHAIN_FILE),
        privkey: base.join(PRIVKEY_FILE),
    }
}

/// Render a site file stamped with the current time.
pub fn render(mode: ConfigMode, params: &SiteParams<'_>) -> String {
    render_at(mode, params, Utc::now())
}

/// Render a site file with an explicit generation time.
pub fn render_at(mode: ConfigMode, params: &SiteParams<'_>, generated_at: DateTime<Utc>) -> String {
    let header = header(mode, generated_at);
    match mode {
        ConfigMode::Pending => format!("{header}{}", pending_body(params)),
        ConfigMode::Active => format!("{header}{}", active_body(params)),
    }
}

fn header(mode: ConfigMode, generated_at: DateTime<Utc>) -> String {
    let marker = match mode {
        ConfigMode::Pending => "PENDING",
        ConfigMode::Active => "ACTIVE",
    };
    format!(
        "# chr-agent: {marker}\n\
         # Managed by chr-agent. Local edits are overwritten.\n\
         # Generated: {}\n\n",
        generated_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

fn forwarded_headers(indent: &str) -> String {
    [
        "proxy_set_header  Host              $host;",
        "proxy_set_header  X-Real-IP         $remote_addr;",
        "proxy_set_header  X-Forwarded-For   $proxy_add_x_forwarded_for;",
        "proxy_set_header  X-Forwarded-Proto $scheme;",
    ]
    .iter()
    .map(|line| format!("{indent}{line}\n"))
    .collect()
}

fn challenge_location(upstream: &str) -> String {
    format!(
        "    location {ACME_CHALLENGE_PATH} {{\n\
         \x20       proxy_pass        {upstream};\n\
         {headers}\
         \x20   }}\n",
        headers = forwarded_headers("        "),
    )
}

fn proxy_location(upstream: &str, hide_powered_by: bool) -> String {
    let mut out = format!(
        "    location / {{\n\
         \x20       proxy_pass              {upstream};\n\
         \x20       proxy_http_version      1.1;\n\
         \x20       proxy_set_header        Upgrade           $http_upgrade;\n\
         \x20       proxy_set_header        Connection        \"upgrade\";\n"
    );
    out.push_str(&forwarded_headers("        "));
    if hide_powered_by {
        out.push_str("        proxy_hide_header       X-Powered-By;\n");
    }
    out.push_str(
        "        proxy_read_timeout      60s;\n\
         \x20       proxy_send_timeout      60s;\n\
         \x20       proxy_connect_timeout   10s;\n",
    );
    out.push_str("    }\n");
    out
}

fn pending_body(params: &SiteParams<'_>) -> String {
    format!(
        "server {{\n\
         \x20   listen 80;\n\
         \x20   listen [::]:80;\n\
         \x20   server_name {domain};\n\
         \x20   server_tokens off;\n\n\
         {challenge}\n\
         {proxy}\
         }}\n",
        domain = params.domain,
        challenge = challenge_location(params.upstream),
        proxy = proxy_location(params.upstream, false),
    )
}

fn active_body(params: &SiteParams<'_>) -> String {
    let paths = cert_paths(params.domain, params.cert_dir);
    format!(
        "server {{\n\
         \x20   listen 80;\n\
         \x20   listen [::]:80;\n\
         \x20   server_name {domain};\n\
         \x20   server_tokens off;\n\n\
         {challenge}\n\
         \x20   location / {{\n\
         \x20       return 308 https://$host$request_uri;\n\
         \x20   }}\n\
         }}\n\n\
         server {{\n\
         \x20   listen 443 ssl;\n\
         \x20   listen [::]:443 ssl;\n\
         \x20   http2 on;\n\
         \x20   server_name {domain};\n\
         \x20   server_tokens off;\n\n\
         \x20   ssl_certificate      {fullchain};\n\
         \x20   ssl_certificate_key  {privkey};\n\n\
         \x20   ssl_protocols              {TLS_PROTOCOLS};\n\
         \x20   ssl_ciphers                {TLS_CIPHERS};\n\
         \x20   ssl_prefer_server_ciphers  off;\n\n\
         \x20   ssl_session_cache    {SESSION_CACHE};\n\
         \x20   ssl_session_timeout  1d;\n\
         \x20   ssl_session_tickets  off;\n\n\
         \x20   ssl_stapling         on;\n\
         \x20   ssl_stapling_verify  on;\n\
         \x20   resolver             1.1.1.1 8.8.8.8 valid=300s;\n\
         \x20   resolver_timeout     5s;\n\n\
         \x20   add_header  Strict-Transport-Security  \"{HSTS_VALUE}\"            always;\n\
         \x20   add_header  X-Content-Type-Options     \"nosniff\"                     always;\n\
         \x20   add_header  X-Frame-Options            \"SAMEORIGIN\"                  always;\n\
         \x20   add_header  Referrer-Policy            \"no-referrer-when-downgrade\"  always;\n\n\
         {proxy}\
         }}\n",
        domain = params.domain,
        challenge = challenge_location(params.upstream),
        fullchain = paths.fullchain.display(),
        privkey = paths.privkey.display(),
        proxy = proxy_location(params.upstream, true),
    )
}
