//! Authenticated session state.
//!
//! A [`Session`] is the explicit context every remote call goes through: it
//! owns the cookie jar, the HTTP client derived from it, and the CSRF token
//! cache. Lifecycle is `new` → `login_*` → (`invalidate`).

use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use reqwest::cookie::Jar;
use reqwest::header::{ACCEPT, CACHE_CONTROL, REFERER};
use reqwest::{Method, RequestBuilder};

use crate::config::ClientConfig;
use crate::error::{OverleafError, Result};
use crate::http::HttpClient;

use super::cookies::{Cookie, load_cookie_file, parse_cookie_header};
use super::metadata::meta_content;

/// Header carrying the CSRF token on mutating calls.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Shared handle to an Overleaf session.
///
/// Cloning is cheap; clones share authentication and the CSRF cache.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: ClientConfig,
    http: RwLock<Option<HttpClient>>,
    /// Most recent (project id, token) pair.
    csrf: Mutex<Option<(String, String)>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.inner.config.base_url.as_str())
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

impl Session {
    /// Create an unauthenticated session.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                config,
                http: RwLock::new(None),
                csrf: Mutex::new(None),
            }),
        }
    }

    /// Connection settings this session was created with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Check whether a `login_*` call has populated the session.
    pub fn is_authenticated(&self) -> bool {
        self.inner
            .http
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Authenticate from name/value pairs scoped to the service host.
    ///
    /// # Example
    /// ```no_run
    /// use overleaf_fs::{ClientConfig, Session};
    ///
    /// # fn example() -> overleaf_fs::Result<()> {
    /// let session = Session::new(ClientConfig::default());
    /// session.login_from_pairs([("overleaf_session2", "s%3A...")])?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn login_from_pairs<I, K, V>(&self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.login_from_cookies(
            pairs
                .into_iter()
                .map(|(name, value)| Cookie::new(name.as_ref(), value.as_ref())),
        )
    }

    /// Authenticate from an existing cookie store.
    ///
    /// Cookies scoped to other domains are dropped. A store with no matching
    /// cookie still initializes the session; the server then rejects calls
    /// with 401/403. Each call replaces the previous jar.
    pub fn login_from_cookies<I>(&self, cookies: I) -> Result<()>
    where
        I: IntoIterator<Item = Cookie>,
    {
        let config = &self.inner.config;
        let host = config.host().to_string();
        let jar = Arc::new(Jar::default());

        let mut accepted = 0usize;
        for cookie in cookies {
            if !cookie.applies_to(&host) {
                tracing::debug!(name = %cookie.name, domain = ?cookie.domain, "skipping foreign cookie");
                continue;
            }
            jar.add_cookie_str(&cookie.to_set_cookie(&host), &config.base_url);
            accepted += 1;
        }
        if accepted == 0 {
            tracing::warn!(%host, "no cookies matched the service domain");
        }

        let client = HttpClient::new(config, jar)?;
        *self.write_http() = Some(client);
        *self.lock_csrf() = None;
        tracing::debug!(accepted, "session initialized");
        Ok(())
    }

    /// Authenticate from a `Cookie` header string ("name=value; other=value").
    pub fn login_from_cookie_header(&self, header: &str) -> Result<()> {
        self.login_from_cookies(parse_cookie_header(header))
    }

    /// Authenticate from a Netscape `cookies.txt` export.
    pub fn login_from_cookie_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let cookies = load_cookie_file(path)?;
        self.login_from_cookies(cookies)
    }

    /// Drop cookies and cached tokens; the session must log in again.
    pub fn invalidate(&self) {
        *self.write_http() = None;
        *self.lock_csrf() = None;
    }

    /// Authenticated HTTP client, or `SessionNotInitialized`.
    pub fn http(&self) -> Result<HttpClient> {
        self.inner
            .http
            .read()
            .map_err(|_| OverleafError::SessionNotInitialized)?
            .clone()
            .ok_or(OverleafError::SessionNotInitialized)
    }

    /// Build a request against a service path.
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.inner.config.url(path);
        tracing::debug!(%method, %url, "request");
        Ok(self.http()?.request(method, &url))
    }

    /// GET a service page and return its body as text.
    pub async fn get_page(&self, path: &str) -> Result<String> {
        let http = self.http()?;
        let request = self.request(Method::GET, path)?;
        let response = http.send(request).await?;
        Ok(response.text().await?)
    }

    /// CSRF token for a project, fetched from the project page on cache miss.
    ///
    /// Only the most recent (project, token) pair is cached.
    pub async fn csrf_token(&self, project_id: &str) -> Result<String> {
        let cached = self
            .lock_csrf()
            .as_ref()
            .filter(|(cached_project, _)| cached_project == project_id)
            .map(|(_, token)| token.clone());
        if let Some(token) = cached {
            return Ok(token);
        }

        let page = self.get_page(&format!("project/{}", project_id)).await?;
        let token = meta_content(&page, "ol-csrfToken")
            .ok_or_else(|| OverleafError::MissingMetadata("ol-csrfToken".to_string()))?;

        *self.lock_csrf() = Some((project_id.to_string(), token.clone()));
        Ok(token)
    }

    /// Build a mutating request carrying the headers the editor sends.
    pub(crate) async fn project_request(
        &self,
        method: Method,
        project_id: &str,
        path: &str,
    ) -> Result<RequestBuilder> {
        let token = self.csrf_token(project_id).await?;
        let referer = self.inner.config.project_url(project_id);
        Ok(self
            .request(method, path)?
            .header(REFERER, referer)
            .header(ACCEPT, "application/json")
            .header(CACHE_CONTROL, "no-cache")
            .header(CSRF_HEADER, token))
    }

    fn write_http(&self) -> std::sync::RwLockWriteGuard<'_, Option<HttpClient>> {
        self.inner
            .http
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_csrf(&self) -> std::sync::MutexGuard<'_, Option<(String, String)>> {
        self.inner
            .csrf
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
