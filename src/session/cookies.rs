//! Cookie sources accepted by `Session::login_*`.

use std::path::Path;

use crate::error::{OverleafError, Result};

/// A single name/value cookie with optional scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Cookie domain; `None` means host-only for the service host.
    pub domain: Option<String>,
    pub path: Option<String>,
}

impl Cookie {
    /// Create a host-only cookie.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
        }
    }

    /// Scope the cookie to a domain (e.g. ".overleaf.com").
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Check whether this cookie would be sent to `host`.
    pub fn applies_to(&self, host: &str) -> bool {
        match &self.domain {
            Some(domain) => domain_matches(domain, host),
            None => true,
        }
    }

    /// `Set-Cookie` style string understood by the reqwest cookie jar.
    pub(crate) fn to_set_cookie(&self, host: &str) -> String {
        let mut out = format!("{}={}", self.name, self.value);
        if let Some(domain) = &self.domain {
            let bare = domain.trim_start_matches('.');
            // Host-only when the domain is the service host itself; the jar
            // rejects Domain attributes that are IP literals.
            if !bare.eq_ignore_ascii_case(host) {
                out.push_str("; Domain=");
                out.push_str(bare);
            }
        }
        out.push_str("; Path=");
        out.push_str(self.path.as_deref().unwrap_or("/"));
        out
    }
}

/// Domain-suffix match, ignoring a leading dot and ASCII case.
pub fn domain_matches(cookie_domain: &str, host: &str) -> bool {
    let domain = cookie_domain.trim_start_matches('.').to_ascii_lowercase();
    let host = host.to_ascii_lowercase();
    if domain.is_empty() {
        return false;
    }
    host == domain || host.ends_with(&format!(".{}", domain))
}

/// Parse a `Cookie` request header ("a=1; b=2") into host-only cookies.
pub fn parse_cookie_header(header: &str) -> Vec<Cookie> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some(Cookie::new(name, value.trim()))
        })
        .collect()
}

/// Parse Netscape `cookies.txt` content.
///
/// Lines are `domain  include_subdomains  path  secure  expiry  name  value`,
/// tab separated. `#HttpOnly_` prefixed lines are cookies, other `#` lines
/// are comments.
pub fn parse_netscape_cookies(content: &str) -> Result<Vec<Cookie>> {
    let mut cookies = Vec::new();
    for (lineno, raw) in content.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        let line = match line.strip_prefix("#HttpOnly_") {
            Some(rest) => rest,
            None if line.starts_with('#') || line.trim().is_empty() => continue,
            None => line,
        };

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 7 {
            return Err(OverleafError::InvalidConfig(format!(
                "Malformed cookie file line {}",
                lineno + 1
            )));
        }

        cookies.push(Cookie {
            name: fields[5].to_string(),
            value: fields[6].to_string(),
            domain: Some(fields[0].to_string()),
            path: Some(fields[2].to_string()),
        });
    }
    Ok(cookies)
}

/// Read and parse a Netscape `cookies.txt` file.
pub fn load_cookie_file<P: AsRef<Path>>(path: P) -> Result<Vec<Cookie>> {
    let content = std::fs::read_to_string(path)?;
    parse_netscape_cookies(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_domain_matching() {
        assert!(domain_matches(".overleaf.com", "www.overleaf.com"));
        assert!(domain_matches("overleaf.com", "overleaf.com"));
        assert!(domain_matches("WWW.Overleaf.com", "www.overleaf.com"));
        assert!(!domain_matches(".example.com", "www.overleaf.com"));
        assert!(!domain_matches("leaf.com", "www.overleaf.com"));
        assert!(!domain_matches(".", "www.overleaf.com"));
    }

    #[test]
    fn test_parse_cookie_header() {
        let cookies = parse_cookie_header("overleaf_session2=s%3Aabc; GCLB=xyz ;  ; broken");
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0], Cookie::new("overleaf_session2", "s%3Aabc"));
        assert_eq!(cookies[1], Cookie::new("GCLB", "xyz"));
    }

    #[test]
    fn test_set_cookie_rendering() {
        let host_only = Cookie::new("a", "1");
        assert_eq!(host_only.to_set_cookie("www.overleaf.com"), "a=1; Path=/");

        let parent = Cookie::new("a", "1").with_domain(".overleaf.com");
        assert_eq!(
            parent.to_set_cookie("www.overleaf.com"),
            "a=1; Domain=overleaf.com; Path=/"
        );

        let same = Cookie::new("a", "1").with_domain("127.0.0.1");
        assert_eq!(same.to_set_cookie("127.0.0.1"), "a=1; Path=/");
    }

    #[test]
    fn test_parse_netscape_cookies() {
        let content = "# Netscape HTTP Cookie File\n\
                       \n\
                       .overleaf.com\tTRUE\t/\tTRUE\t0\toverleaf_session2\tsecret\n\
                       #HttpOnly_www.overleaf.com\tFALSE\t/\tTRUE\t0\tGCLB\tlb\n\
                       .example.com\tTRUE\t/\tFALSE\t0\tother\tx\n";
        let cookies = parse_netscape_cookies(content).unwrap();
        assert_eq!(cookies.len(), 3);
        assert_eq!(cookies[0].name, "overleaf_session2");
        assert_eq!(cookies[0].domain.as_deref(), Some(".overleaf.com"));
        assert_eq!(cookies[1].name, "GCLB");
        assert!(cookies[1].applies_to("www.overleaf.com"));
        assert!(!cookies[2].applies_to("www.overleaf.com"));
    }

    #[test]
    fn test_parse_netscape_rejects_short_lines() {
        let res = parse_netscape_cookies("overleaf.com\tTRUE\t/\n");
        assert!(matches!(res, Err(OverleafError::InvalidConfig(_))));
    }

    #[test]
    fn test_load_cookie_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, ".overleaf.com\tTRUE\t/\tTRUE\t0\tsession\tvalue").unwrap();
        let cookies = load_cookie_file(file.path()).unwrap();
        assert_eq!(cookies, vec![Cookie {
            name: "session".into(),
            value: "value".into(),
            domain: Some(".overleaf.com".into()),
            path: Some("/".into()),
        }]);
    }
}
