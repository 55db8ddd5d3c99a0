//! HTTP client wrapper for Overleaf web requests.

use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};

use crate::config::ClientConfig;
use crate::error::{OverleafError, Result};

/// HTTP client bound to one cookie jar.
///
/// Cloning is cheap; clones share the connection pool and the jar.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    jar: Arc<Jar>,
    basic_auth: Option<(String, String)>,
}

impl HttpClient {
    /// Create a new HTTP client applying the proxy, TLS and timeout settings.
    pub fn new(config: &ClientConfig, jar: Arc<Jar>) -> Result<Self> {
        let mut builder = Client::builder()
            .cookie_provider(jar.clone())
            .timeout(config.timeout)
            .connect_timeout(config.timeout);

        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| OverleafError::InvalidConfig(format!("Invalid proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        if !config.ssl_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(path) = &config.ca_cert {
            let pem = std::fs::read(path)?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                OverleafError::InvalidConfig(format!("Invalid CA certificate: {}", e))
            })?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder
            .build()
            .map_err(|e| OverleafError::InvalidConfig(format!("Failed to build client: {}", e)))?;

        Ok(Self {
            client,
            jar,
            basic_auth: config.basic_auth.clone(),
        })
    }

    /// Start a request, attaching basic-auth credentials when configured.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.basic_auth {
            Some((user, password)) => builder.basic_auth(user, Some(password)),
            None => builder,
        }
    }

    /// Send a request and fail on any non-success status.
    ///
    /// 401 and 403 map to [`OverleafError::RemoteUnauthorized`]; every other
    /// non-2xx status maps to [`OverleafError::RemoteRequestFailed`].
    pub async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        check_status(response)
    }

    /// `Cookie` header value the jar would send to `url`.
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        self.jar
            .cookies(url)
            .and_then(|value| value.to_str().ok().map(str::to_string))
    }
}

/// Map a response status onto the error taxonomy.
pub(crate) fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    tracing::debug!(status = status.as_u16(), %url, "request failed");
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(OverleafError::RemoteUnauthorized(
            format!("HTTP {} for {}", status.as_u16(), url),
        )),
        _ => Err(OverleafError::RemoteRequestFailed {
            status: status.as_u16(),
            url,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> (HttpClient, ClientConfig) {
        let config = ClientConfig::new(&server.uri()).unwrap();
        let client = HttpClient::new(&config, Arc::new(Jar::default())).unwrap();
        (client, config)
    }

    #[test]
    fn test_client_creation() {
        let config = ClientConfig::default();
        assert!(HttpClient::new(&config, Arc::new(Jar::default())).is_ok());
    }

    #[test]
    fn test_proxy_creation() {
        let config = ClientConfig::default().with_proxy("http://127.0.0.1:8080");
        assert!(HttpClient::new(&config, Arc::new(Jar::default())).is_ok());
    }

    #[test]
    fn test_proxy_invalid() {
        let config = ClientConfig::default().with_proxy(":::::::");
        let res = HttpClient::new(&config, Arc::new(Jar::default()));
        assert!(matches!(res, Err(OverleafError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string("fine"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/denied"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (client, config) = client_for(&server);

        let ok = client
            .send(client.request(Method::GET, &config.url("ok")))
            .await
            .unwrap();
        assert_eq!(ok.text().await.unwrap(), "fine");

        let denied = client
            .send(client.request(Method::GET, &config.url("denied")))
            .await;
        assert!(matches!(denied, Err(OverleafError::RemoteUnauthorized(_))));

        let broken = client
            .send(client.request(Method::GET, &config.url("broken")))
            .await;
        assert!(matches!(
            broken,
            Err(OverleafError::RemoteRequestFailed { status: 500, .. })
        ));
    }

    #[test]
    fn test_cookie_header_from_jar() {
        let config = ClientConfig::default();
        let jar = Arc::new(Jar::default());
        jar.add_cookie_str("overleaf_session2=abc; Path=/", &config.base_url);
        let client = HttpClient::new(&config, jar).unwrap();
        assert_eq!(
            client.cookie_header(&config.base_url).as_deref(),
            Some("overleaf_session2=abc")
        );
    }
}
