use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

// Who a quota applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Principal {
    Anonymous(String),     // sha256 fingerprint
    Authenticated(String), // user id from the identity provider
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    Anonymous,
    Authenticated,
}

impl PrincipalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalKind::Anonymous => "anonymous",
            PrincipalKind::Authenticated => "authenticated",
        }
    }
}

impl Principal {
    pub fn kind(&self) -> PrincipalKind {
        match self {
            Principal::Anonymous(_) => PrincipalKind::Anonymous,
            Principal::Authenticated(_) => PrincipalKind::Authenticated,
        }
    }

    pub fn is_guest(&self) -> bool {
        self.kind() == PrincipalKind::Anonymous
    }

    // Resolve from request headers. The identity header is only trusted
    // because the gateway runs behind the identity provider's proxy.
    pub fn from_headers(headers: &HeaderMap, identity_header: &str) -> Self {
        if let Some(user) = header_str(headers, identity_header) {
            return Principal::Authenticated(user.to_string());
        }

        let client_ip = header_str(headers, "x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .or_else(|| header_str(headers, "x-real-ip"))
            .unwrap_or("unknown");
        let user_agent = header_str(headers, "user-agent").unwrap_or("");

        Principal::Anonymous(make_fingerprint(client_ip, user_agent))
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // fingerprints are long, a prefix is enough for logs
            Principal::Anonymous(fp) => {
                write!(f, "anon:{}", fp.chars().take(12).collect::<String>())
            }
            Principal::Authenticated(id) => write!(f, "user:{}", id),
        }
    }
}

// Anonymous fingerprint (hash of client address + user agent)
pub fn make_fingerprint(client_ip: &str, user_agent: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(client_ip);
    hasher.update([0u8]);
    hasher.update(user_agent);
    format!("{:x}", hasher.finalize())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
