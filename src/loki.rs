use crate::error::SinkError;
use crate::payload::{PushRequest, StreamLabels};
use crate::record::LogRecord;
use crate::sink::LogSink;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Path of the Loki push endpoint.
pub const PUSH_PATH: &str = "/loki/api/v1/push";

/// Header carrying the tenant in multi-tenant Loki deployments.
pub const TENANT_HEADER: &str = "X-Scope-OrgID";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for [`LokiSink`].
///
/// Every field is read once by [`LokiSink::new`]; the sink never changes
/// it afterwards.
#[derive(Clone, Debug)]
pub struct LokiConfig {
    /// Base URL, with or without the push path, e.g. "http://localhost:3100".
    pub url: String,
    pub environment: String,
    pub application: String,
    pub host: String,
    /// Sent as `X-Scope-OrgID` when not blank.
    pub tenant: Option<String>,
    pub user: Option<String>,
    /// With Grafana Cloud this is the API key.
    pub password: Option<String>,
    pub timeout: Duration,
    /// Add the record's lower-case level as a `level` label.
    pub level_label: bool,
    /// Additional static labels. The fixed labels win on collision.
    pub extra_labels: BTreeMap<String, String>,
    /// Send record fields as Loki structured metadata.
    pub structured_metadata: bool,
}

impl LokiConfig {
    pub fn new(
        url: impl Into<String>,
        environment: impl Into<String>,
        application: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        LokiConfig {
            url: url.into(),
            environment: environment.into(),
            application: application.into(),
            host: host.into(),
            tenant: None,
            user: None,
            password: None,
            timeout: DEFAULT_TIMEOUT,
            level_label: false,
            extra_labels: BTreeMap::new(),
            structured_metadata: false,
        }
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    pub fn with_basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_level_label(mut self, enabled: bool) -> Self {
        self.level_label = enabled;
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_labels.insert(key.into(), value.into());
        self
    }

    pub fn with_structured_metadata(mut self, enabled: bool) -> Self {
        self.structured_metadata = enabled;
        self
    }
}

/// Turn a base URL into the push endpoint URL.
///
/// Strips one trailing slash, then appends [`PUSH_PATH`] unless the URL
/// already ends with it. Applying it to its own output is a no-op.
pub fn normalize_push_url(url: &str) -> String {
    let trimmed = url.strip_suffix('/').unwrap_or(url);
    if trimmed.ends_with(PUSH_PATH) {
        trimmed.to_string()
    } else {
        format!("{}{}", trimmed, PUSH_PATH)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Loki implementation of [`LogSink`] using the HTTP push API.
///
/// Holds only immutable state, so one instance can be shared across
/// threads and tasks behind an `Arc`.
#[derive(Clone)]
pub struct LokiSink {
    client: Client,
    push_url: String,
    labels: StreamLabels,
    tenant: Option<String>,
    credentials: Option<(String, String)>,
    level_label: bool,
    structured_metadata: bool,
}

impl LokiSink {
    /// Construct a new sink instance using the provided configuration.
    ///
    /// **Parameters**
    /// - `config`: [`LokiConfig`] describing target URL, stream labels and
    ///   optional tenant and authentication settings.
    ///
    /// **Returns**
    /// - A ready-to-use [`LokiSink`] that can be passed into
    ///   [`init_tracing`](crate::init::init_tracing) or called directly.
    /// - `Err(SinkError::Transport)` if the HTTP client cannot be built.
    pub fn new(config: LokiConfig) -> Result<Self, SinkError> {
        let client = Client::builder().timeout(config.timeout).build()?;

        let mut labels = config.extra_labels;
        labels.insert("application".to_string(), config.application);
        labels.insert("environment".to_string(), config.environment);
        labels.insert("host".to_string(), config.host);

        let tenant = non_blank(&config.tenant).map(str::to_string);
        let credentials = match (non_blank(&config.user), non_blank(&config.password)) {
            (Some(user), Some(password)) => Some((user.to_string(), password.to_string())),
            _ => None,
        };

        Ok(Self {
            client,
            push_url: normalize_push_url(&config.url),
            labels,
            tenant,
            credentials,
            level_label: config.level_label,
            structured_metadata: config.structured_metadata,
        })
    }

    /// Effective endpoint every request is posted to.
    pub fn push_url(&self) -> &str {
        &self.push_url
    }

    /// Stream labels for `record`: the static set plus `level` when enabled.
    pub fn labels_for(&self, record: &LogRecord) -> StreamLabels {
        let mut labels = self.labels.clone();
        if self.level_label {
            labels.insert("level".to_string(), record.level.label().to_string());
        }
        labels
    }

    /// Build the push body for `record` stamped with `sent_at`.
    pub fn payload(
        &self,
        record: &LogRecord,
        sent_at: DateTime<Utc>,
    ) -> Result<PushRequest, SinkError> {
        PushRequest::single(self.labels_for(record), record, sent_at, self.structured_metadata)
    }

    /// Prepare the POST with headers and auth applied, without sending it.
    pub fn request(&self, body: String) -> RequestBuilder {
        let mut req = self
            .client
            .post(&self.push_url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);

        if let Some(tenant) = &self.tenant {
            req = req.header(TENANT_HEADER, tenant);
        }
        if let Some((user, password)) = &self.credentials {
            req = req.basic_auth(user, Some(password));
        }
        req
    }
}

#[async_trait]
impl LogSink for LokiSink {
    async fn send(&self, record: &LogRecord) -> Result<(), SinkError> {
        let body = self.payload(record, Utc::now())?.to_json()?;
        let resp = self.request(body).send().await?;

        let status = resp.status();
        if status.is_success() {
            debug!(status = status.as_u16(), url = %self.push_url, "pushed log line to loki");
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            Err(SinkError::Status { status: status.as_u16(), body })
        }
    }
}
