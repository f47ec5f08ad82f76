//! Duplex frame transport to the backend.

#[cfg(test)]
pub(crate) mod mock;

use std::{fmt::Debug, time::Duration};

use futures_util::{future::BoxFuture, Sink, Stream};
use snafu::prelude::*;
use tokio_tungstenite as websocket;
use url::Url;

/// A websocket frame
pub type Frame = websocket::tungstenite::Message;

/// Underlying websocket error
pub type WebsocketError = websocket::tungstenite::Error;

/// Default transport, a websocket client over tcp or tls
pub(crate) type WebsocketClient =
    websocket::WebSocketStream<websocket::MaybeTlsStream<tokio::net::TcpStream>>;

/// Error when open a transport
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module(error), context(suffix(false)))]
pub enum OpenError {
    /// connect to backend failed
    #[snafu(display("connect {url} failed: {source}"))]
    Connect {
        /// connected url
        url: String,
        /// source error
        source: WebsocketError,
    },

    /// open did not finish in time
    #[snafu(display("connect {url} timeout after {timeout:?}"))]
    Timeout {
        /// connected url
        url: String,
        /// configured open timeout
        timeout: Duration,
    },
}

/// An opened duplex frame transport
pub trait Transport:
    Stream<Item = Result<Frame, WebsocketError>>
    + Sink<Frame, Error = WebsocketError>
    + Send
    + Unpin
{
}

impl<T> Transport for T where
    T: Stream<Item = Result<Frame, WebsocketError>>
        + Sink<Frame, Error = WebsocketError>
        + Send
        + Unpin
{
}

/// Boxed transport held by the connection manager
pub type BoxTransport = Box<dyn Transport>;

/// Opens transports, the connection manager calls it once per connect attempt
#[async_trait::async_trait]
pub trait Connector: Send + Sync + 'static {
    /// open a transport to `url`
    async fn open(&self, url: &Url) -> Result<BoxTransport, WebsocketError>;
}

/// [Connector] using tokio-tungstenite
#[derive(Debug, Default, Clone, Copy)]
pub struct WebsocketConnector;

#[async_trait::async_trait]
impl Connector for WebsocketConnector {
    async fn open(&self, url: &Url) -> Result<BoxTransport, WebsocketError> {
        log::debug!("Connecting backend: {}", url);

        let (client, response): (WebsocketClient, _) =
            websocket::connect_async(url.as_str()).await?;

        log::debug!("Backend handshake response status: {}", response.status());

        Ok(Box::new(client))
    }
}

/// Open a transport using `connector`, bounded by `timeout` if given
pub(crate) fn open<C>(
    connector: std::sync::Arc<C>,
    url: Url,
    timeout: Option<Duration>,
) -> BoxFuture<'static, Result<BoxTransport, OpenError>>
where
    C: Connector + ?Sized,
{
    Box::pin(async move {
        let attempt = connector.open(&url);

        let result = match timeout {
            Some(timeout) => match tokio::time::timeout(timeout, attempt).await {
                Ok(result) => result,
                Err(_) => {
                    log::warn!("Open {} timeout", url);
                    return error::Timeout {
                        url: url.as_str(),
                        timeout,
                    }
                    .fail();
                }
            },
            None => attempt.await,
        };

        result.with_context(|_| error::Connect { url: url.as_str() })
    })
}

impl Debug for dyn Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Transport")
    }
}
