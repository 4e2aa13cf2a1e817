use {
    tracing::{info, warn, error},
    serde::{Serialize, Deserialize},
    thiserror::Error,
    http::{HeaderValue, StatusCode, header::CONTENT_TYPE},
    counter_store::{Entity, EntityLookup, TableStore, TableStoreError, UpdateMode},
    crate::{
        config::CounterConfig,
        metrics::{CounterUpdateResult, Metrics},
        response::HttpResponse,
    },
};

pub const COUNT_PROPERTY: &str = "count";
pub const CONFIGURATION_ERROR_MESSAGE: &str = "Server Error: Connection string not configured.";
pub const PROCESSING_ERROR_MESSAGE: &str = "Error processing request";

#[derive(Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct CounterResponse {
    pub count: i64,
}

#[derive(Error, Debug)]
pub enum CounterError {
    #[error("connection string not configured")]
    ConnectionStringNotConfigured,

    #[error("table store error: {0}")]
    Store(#[from] TableStoreError),

    #[error("counter entity has invalid {COUNT_PROPERTY} property: {reason}")]
    InvalidCount { reason: String },

    #[error("failed to serialize response: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// What happened to the counter row during one call.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CounterUpdate {
    Incremented(i64),
    Created(i64),
}

impl CounterUpdate {
    pub fn count(&self) -> i64 {
        match self {
            Self::Incremented(v) | Self::Created(v) => *v,
        }
    }
}

/// Increments the visitor counter row and reports the new value.
///
/// Every call makes at most one write attempt. The read and the write are not tied
/// together by any version check, so concurrent calls may overwrite each other's
/// increment.
pub struct CounterHandler<S> {
    config: CounterConfig,
    store: S,
    metrics: Metrics,
}

impl<S: TableStore> CounterHandler<S> {
    pub fn new(config: CounterConfig, store: S, metrics: Metrics) -> Self {
        Self {
            config,
            store,
            metrics,
        }
    }

    /// Handles one request. Request contents do not matter, any call counts as a visit.
    pub async fn handle(&self) -> HttpResponse {
        info!("processing visitor counter request");

        match self.increment().await.and_then(render) {
            Ok(response) => response,
            Err(CounterError::ConnectionStringNotConfigured) => {
                warn!("connection string is not configured, set {}", crate::config::CONNECTION_STRING_ENV);
                response_configuration_error()
            },
            Err(err) => {
                error!("error updating visitor count: {err}");
                self.metrics.record_counter_update(CounterUpdateResult::Error);
                response_processing_error()
            },
        }
    }

    /// Get-then-put of the counter row, creating it on first use.
    pub async fn increment(&self) -> Result<CounterUpdate, CounterError> {
        if self.config.connection_string().is_none() {
            return Err(CounterError::ConnectionStringNotConfigured);
        }

        let key = self.config.counter_key();
        let update = match self.store.get_entity(&key).await? {
            EntityLookup::Found(mut entity) => {
                let new_count = next_count(&entity)?;
                entity.set_property(COUNT_PROPERTY, new_count);
                self.store.update_entity(&entity, UpdateMode::Replace).await?;
                info!("counter incremented to {new_count}");
                CounterUpdate::Incremented(new_count)
            },
            EntityLookup::NotFound => {
                info!("counter not found, creating new counter");
                let entity = Entity::new(key).with_property(COUNT_PROPERTY, 1);
                self.store.create_entity(&entity).await?;
                CounterUpdate::Created(1)
            },
        };

        self.metrics.record_counter_update(match update {
            CounterUpdate::Incremented(_) => CounterUpdateResult::Incremented,
            CounterUpdate::Created(_) => CounterUpdateResult::Created,
        });

        Ok(update)
    }
}

fn next_count(entity: &Entity) -> Result<i64, CounterError> {
    let current = match entity.property(COUNT_PROPERTY) {
        Some(value) => value.as_i64()
            .ok_or_else(|| CounterError::InvalidCount { reason: format!("expected integer, got: {value}") })?,
        None => return Err(CounterError::InvalidCount { reason: "property is missing".to_owned() }),
    };

    if current < 0 {
        return Err(CounterError::InvalidCount { reason: format!("count is negative: {current}") });
    }

    current.checked_add(1)
        .ok_or_else(|| CounterError::InvalidCount { reason: format!("count overflows when incremented: {current}") })
}

fn render(update: CounterUpdate) -> Result<HttpResponse, CounterError> {
    let body = serde_json::to_vec(&CounterResponse { count: update.count() })?;
    Ok(HttpResponse::new()
        .with_status(StatusCode::OK)
        .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .with_body(body))
}

fn response_configuration_error() -> HttpResponse {
    text_response(StatusCode::INTERNAL_SERVER_ERROR, CONFIGURATION_ERROR_MESSAGE)
}

fn response_processing_error() -> HttpResponse {
    text_response(StatusCode::INTERNAL_SERVER_ERROR, PROCESSING_ERROR_MESSAGE)
}

pub(crate) fn text_response(status: StatusCode, body: &str) -> HttpResponse {
    HttpResponse::new()
        .with_status(status)
        .with_header(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))
        .with_body(body)
}

#[cfg(test)]
mod tests {
    use {
        serde_json::json,
        counter_store::{EntityKey, SqliteTableStore},
        super::*,
    };

    fn counter(count: serde_json::Value) -> Entity {
        Entity::new(EntityKey::new("site-stats", "visitor-counter")).with_property(COUNT_PROPERTY, count)
    }

    #[test]
    fn next_count_increments() {
        assert_eq!(1, next_count(&counter(json!(0))).unwrap());
        assert_eq!(42, next_count(&counter(json!(41))).unwrap());
    }

    #[test]
    fn next_count_rejects_invalid_values() {
        for value in [json!("41"), json!(1.5), json!(-1), json!(i64::MAX), json!(null)] {
            assert!(
                matches!(next_count(&counter(value.clone())), Err(CounterError::InvalidCount { .. })),
                "expected {value} to be rejected",
            );
        }

        let missing = Entity::new(EntityKey::new("site-stats", "visitor-counter"));
        assert!(matches!(next_count(&missing), Err(CounterError::InvalidCount { .. })));
    }

    #[test]
    fn render_json() {
        let response = render(CounterUpdate::Incremented(7)).unwrap();
        assert_eq!(StatusCode::OK, response.status);
        assert_eq!(response.headers[CONTENT_TYPE], "application/json");
        assert_eq!(CounterResponse { count: 7 }, serde_json::from_slice(&response.body).unwrap());
    }

    #[tokio::test]
    async fn failure_after_read_is_recorded_as_error() {
        let store = SqliteTableStore::in_memory("VisitorStats").unwrap();
        store.create_entity(&counter(json!("many"))).await.unwrap();
        let metrics = Metrics::new().unwrap();
        let handler = CounterHandler::new(CounterConfig::new(Some("sqlite::memory:".to_owned())), store, metrics.clone());

        let response = handler.handle().await;
        assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, response.status);
        assert_eq!(PROCESSING_ERROR_MESSAGE, response.body_text());
        assert_eq!(1, metrics.counter_updates(CounterUpdateResult::Error));
        assert_eq!(0, metrics.counter_updates(CounterUpdateResult::Incremented));
    }
}
