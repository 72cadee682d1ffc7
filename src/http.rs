use std::sync::LazyLock;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, instrument, trace};

use crate::{
    commands::CommandGateway,
    error::GatewayError,
    events::{Event, EventBus, SseParser, DRINK},
};

pub static REQWEST_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .user_agent("Mozilla/5.0 (compatible; hydrate_dashboard/0.1; +https://github.com/angeloanan/hydrate-reminder)")
        .build()
        .unwrap_or_default()
});

/// Talks to the host through its local HTTP bridge.
///
/// Commands are sent as `POST {base}/invoke/{command}` with the arguments as
/// the JSON body; the JSON response body is the command's return value.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    base: Url,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(base: Url) -> Self {
        Self {
            base,
            client: REQWEST_CLIENT.clone(),
        }
    }

    pub const fn base(&self) -> &Url {
        &self.base
    }

    /// `Url::join` drops the last segment unless the base ends with `/`.
    pub(crate) fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            segments.extend(path.split('/'));
        }
        url
    }
}

impl HttpGateway {
    /// Follows the host's `GET {base}/events` stream and republishes every
    /// event onto `bus`. Never returns `Ok`: a stream the host closed is
    /// reported as [`GatewayError::EventStream`].
    ///
    /// With `resync` set, a `drink` event is published as soon as the stream
    /// is open, standing in for whatever was missed while disconnected.
    #[instrument(skip_all, fields(base = %self.base, resync))]
    pub async fn pump_events(&self, bus: &EventBus, resync: bool) -> Result<(), GatewayError> {
        const COMMAND: &str = "events";
        let transport = |source| GatewayError::Transport {
            command: COMMAND,
            source,
        };

        let response = self
            .client
            .get(self.endpoint(COMMAND))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(transport)?;
        debug!("Subscribed to host events");
        if resync {
            bus.emit(Event::new(DRINK, Value::Null));
        }

        let mut parser = SseParser::default();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            for event in parser.push(&chunk.map_err(transport)?) {
                bus.emit(event);
            }
        }

        Err(GatewayError::EventStream(
            "host closed the event stream".to_owned(),
        ))
    }
}

#[async_trait]
impl CommandGateway for HttpGateway {
    #[instrument(skip(self, args))]
    async fn invoke(&self, command: &'static str, args: Value) -> Result<Value, GatewayError> {
        let url = self.endpoint(&format!("invoke/{command}"));
        let transport = |source| GatewayError::Transport { command, source };

        let response = self
            .client
            .post(url)
            .json(&args)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        trace!("Host answered {status}");

        if !status.is_success() {
            return Err(GatewayError::Rejected {
                command,
                message: if body.is_empty() {
                    status.to_string()
                } else {
                    body
                },
            });
        }

        // Unit-returning commands may answer with an empty body
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|source| GatewayError::Decode { command, source })
    }
}
