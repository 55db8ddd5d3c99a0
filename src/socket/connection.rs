//! Websocket connection derived from an authenticated HTTP session.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose};
use futures::{SinkExt, StreamExt};
use reqwest::{Method, Url};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};

use crate::config::ClientConfig;
use crate::error::{OverleafError, Result};
use crate::session::Session;

/// Blocking-style text transport used by the protocol client.
#[async_trait]
pub trait EventSocket: Send {
    /// Send one text frame.
    async fn send_text(&mut self, text: &str) -> Result<()>;

    /// Wait for the next text frame.
    async fn recv_text(&mut self) -> Result<String>;

    /// Close the connection.
    async fn close(&mut self) -> Result<()>;
}

/// Live websocket to the real-time service.
pub struct WsEventSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    read_timeout: Duration,
}

#[async_trait]
impl EventSocket for WsEventSocket {
    async fn send_text(&mut self, text: &str) -> Result<()> {
        tracing::debug!(frame = %text, "socket send");
        self.stream.send(Message::text(text.to_string())).await?;
        Ok(())
    }

    async fn recv_text(&mut self) -> Result<String> {
        loop {
            let next = timeout(self.read_timeout, self.stream.next())
                .await
                .map_err(|_| OverleafError::Timeout("waiting for a socket frame"))?;

            match next {
                Some(Ok(Message::Text(text))) => {
                    let text = text.as_str().to_owned();
                    tracing::debug!(frame = %text, "socket recv");
                    return Ok(text);
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(String::from_utf8_lossy(&data).into_owned());
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(OverleafError::Protocol(
                        "Socket closed by server".to_string(),
                    ));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self.stream.close(None).await {
            Ok(()) => Ok(()),
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// HTTP proxy endpoint for the websocket CONNECT tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    pub host: String,
    pub port: u16,
    /// Ready-made `Proxy-Authorization` value.
    pub authorization: Option<String>,
}

impl ProxyTarget {
    /// Parse a proxy URL; a missing scheme means `http://`.
    pub fn parse(proxy: &str) -> Result<Self> {
        let with_scheme = if proxy.contains("://") {
            proxy.to_string()
        } else {
            format!("http://{}", proxy)
        };
        let url = Url::parse(&with_scheme)
            .map_err(|e| OverleafError::InvalidConfig(format!("Invalid proxy: {}", e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| OverleafError::InvalidConfig("Proxy URL has no host".to_string()))?
            .to_string();
        let port = url.port_or_known_default().unwrap_or(80);

        let authorization = if url.username().is_empty() && url.password().is_none() {
            None
        } else {
            Some(basic_authorization(
                url.username(),
                url.password().unwrap_or_default(),
            ))
        };

        Ok(Self {
            host,
            port,
            authorization,
        })
    }
}

/// Socket connection parameters translated from the HTTP session.
#[derive(Debug, Clone)]
pub struct SocketParams {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub proxy: Option<ProxyTarget>,
}

impl SocketParams {
    /// Translate cookies, basic auth and proxy settings for a socket session id.
    pub fn new(
        config: &ClientConfig,
        cookie_header: Option<String>,
        socket_id: &str,
        project_id: &str,
    ) -> Result<Self> {
        let url = format!(
            "{}/socket.io/1/websocket/{}?projectId={}",
            config.websocket_base(),
            socket_id,
            project_id
        );

        let mut headers = Vec::new();
        if let Some(cookies) = cookie_header.filter(|c| !c.is_empty()) {
            headers.push(("Cookie".to_string(), cookies));
        }
        if let Some((user, password)) = &config.basic_auth {
            headers.push((
                "Authorization".to_string(),
                basic_authorization(user, password),
            ));
        }

        let proxy = config.proxy.as_deref().map(ProxyTarget::parse).transpose()?;

        Ok(Self {
            url,
            headers,
            proxy,
        })
    }
}

fn basic_authorization(user: &str, password: &str) -> String {
    let raw = format!("{}:{}", user, password);
    format!("Basic {}", general_purpose::STANDARD.encode(raw))
}

/// Extract the socket session id from a handshake body ("sid:hb:close:transports").
pub fn parse_handshake(body: &str) -> Result<String> {
    let sid = body.split(':').next().unwrap_or_default().trim();
    if sid.is_empty() {
        return Err(OverleafError::Protocol(format!(
            "Invalid socket handshake response: {:?}",
            body
        )));
    }
    Ok(sid.to_string())
}

fn tls_connector(config: &ClientConfig) -> Result<Option<Connector>> {
    if config.ssl_verify && config.ca_cert.is_none() {
        return Ok(None);
    }

    let mut builder = native_tls::TlsConnector::builder();
    if !config.ssl_verify {
        builder.danger_accept_invalid_certs(true);
    }
    if let Some(path) = &config.ca_cert {
        let pem = std::fs::read(path)?;
        let cert = native_tls::Certificate::from_pem(&pem)
            .map_err(|e| OverleafError::InvalidConfig(format!("Invalid CA certificate: {}", e)))?;
        builder.add_root_certificate(cert);
    }
    let connector = builder
        .build()
        .map_err(|e| OverleafError::InvalidConfig(format!("TLS setup failed: {}", e)))?;
    Ok(Some(Connector::NativeTls(connector)))
}

/// Open a CONNECT tunnel through an HTTP proxy.
async fn connect_via_proxy(proxy: &ProxyTarget, host: &str, port: u16) -> Result<TcpStream> {
    let mut stream = TcpStream::connect((proxy.host.as_str(), proxy.port)).await?;

    let mut request = format!(
        "CONNECT {host}:{port} HTTP/1.1\r\nHost: {host}:{port}\r\n",
        host = host,
        port = port
    );
    if let Some(auth) = &proxy.authorization {
        request.push_str(&format!("Proxy-Authorization: {}\r\n", auth));
    }
    request.push_str("\r\n");
    stream.write_all(request.as_bytes()).await?;

    // Read byte-wise so nothing past the header block is consumed.
    let mut head = Vec::with_capacity(256);
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if stream.read(&mut byte).await? == 0 {
            return Err(OverleafError::Protocol(
                "Proxy closed the connection during CONNECT".to_string(),
            ));
        }
        head.push(byte[0]);
        if head.len() > 16 * 1024 {
            return Err(OverleafError::Protocol("Oversized proxy response".to_string()));
        }
    }

    let status = parse_proxy_status(&head)?;
    let proxy_url = format!("{}:{}", proxy.host, proxy.port);
    match status {
        200..=299 => Ok(stream),
        407 => Err(OverleafError::RemoteUnauthorized(format!(
            "Proxy authentication required by {}",
            proxy_url
        ))),
        status => Err(OverleafError::RemoteRequestFailed {
            status,
            url: proxy_url,
        }),
    }
}

fn parse_proxy_status(head: &[u8]) -> Result<u16> {
    let text = String::from_utf8_lossy(head);
    text.lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| OverleafError::Protocol("Malformed proxy response".to_string()))
}

impl Session {
    /// Perform the socket.io handshake and open the project websocket.
    ///
    /// The session's cookies, basic-auth credentials, proxy and TLS
    /// settings are carried over to the websocket connection.
    pub async fn open_event_socket(&self, project_id: &str) -> Result<WsEventSocket> {
        let http = self.http()?;
        let config = self.config();

        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let request = self
            .request(Method::GET, "socket.io/1/")?
            .query(&[("projectId", project_id.to_string()), ("t", millis.to_string())]);
        let body = http.send(request).await?.text().await?;
        let socket_id = parse_handshake(&body)?;

        let params = SocketParams::new(
            config,
            http.cookie_header(&config.base_url),
            &socket_id,
            project_id,
        )?;
        connect(config, params).await
    }
}

async fn connect(config: &ClientConfig, params: SocketParams) -> Result<WsEventSocket> {
    let target = Url::parse(&params.url)
        .map_err(|e| OverleafError::Protocol(format!("Invalid socket URL: {}", e)))?;
    let host = target
        .host_str()
        .ok_or_else(|| OverleafError::Protocol("Socket URL has no host".to_string()))?
        .to_string();
    let port = target.port_or_known_default().unwrap_or(443);

    let mut request = params.url.as_str().into_client_request()?;
    for (name, value) in &params.headers {
        let value = HeaderValue::from_str(value)
            .map_err(|e| OverleafError::InvalidConfig(format!("Invalid {} header: {}", name, e)))?;
        let name = tungstenite::http::HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| OverleafError::InvalidConfig(format!("Invalid header name: {}", e)))?;
        request.headers_mut().insert(name, value);
    }

    let connector = tls_connector(config)?;
    let handshake = async {
        let stream = match &params.proxy {
            Some(proxy) => connect_via_proxy(proxy, &host, port).await?,
            None => TcpStream::connect((host.as_str(), port)).await?,
        };
        let (stream, _response) =
            tokio_tungstenite::client_async_tls_with_config(request, stream, None, connector)
                .await?;
        Ok::<_, OverleafError>(stream)
    };

    let stream = timeout(config.timeout, handshake)
        .await
        .map_err(|_| OverleafError::Timeout("connecting the event socket"))??;
    tracing::debug!(url = %params.url, "event socket connected");

    Ok(WsEventSocket {
        stream,
        read_timeout: config.timeout,
    })
}
