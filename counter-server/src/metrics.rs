use {
    std::pin::Pin,
    tracing::{error, info},
    tokio::net::TcpListener,
    hyper::{Request, Response, body::Bytes, server::conn::http1, StatusCode},
    hyper_util::rt::{TokioIo, TokioTimer},
    http_body_util::Full,
    thiserror::Error,
    prometheus::{
        TextEncoder,
        Registry,
        IntGauge,
        IntCounter,
        IntCounterVec,
        register_int_gauge_with_registry,
        register_int_counter_with_registry,
        register_int_counter_vec_with_registry,
    },
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,

    pub(crate) http_requests_total: IntCounter,
    pub(crate) http_requests_in_flight: IntGauge,
    pub(crate) counter_updates_total: IntCounterVec,
}

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("failed to register: {reason}")]
    FailedToRegister {
        reason: String
    },

    #[error("failed to collect: {reason}")]
    FailedToCollect {
        reason: String
    },
}

/// Label values of `counter_updates_total`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CounterUpdateResult {
    Incremented,
    Created,
    Error,
}

impl CounterUpdateResult {
    fn as_label(&self) -> &'static str {
        match self {
            Self::Incremented => "incremented",
            Self::Created => "created",
            Self::Error => "error",
        }
    }
}

impl Metrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();
        let failed_to_register = |err: prometheus::Error| MetricsError::FailedToRegister { reason: format!("{err:?}") };

        let http_requests_total = register_int_counter_with_registry!("http_requests_total", "total http requests processed", registry)
            .map_err(failed_to_register)?;
        let http_requests_in_flight = register_int_gauge_with_registry!("http_requests_in_flight", "http requests being processed", registry)
            .map_err(failed_to_register)?;
        let counter_updates_total = register_int_counter_vec_with_registry!(
            "counter_updates_total",
            "visitor counter updates by outcome",
            &["result"],
            registry
        ).map_err(failed_to_register)?;

        Ok(Self {
            registry,
            http_requests_total,
            http_requests_in_flight,
            counter_updates_total,
        })
    }

    pub fn record_counter_update(&self, result: CounterUpdateResult) {
        self.counter_updates_total.with_label_values(&[result.as_label()]).inc();
    }

    pub fn counter_updates(&self, result: CounterUpdateResult) -> u64 {
        self.counter_updates_total.with_label_values(&[result.as_label()]).get()
    }

    pub fn http_requests(&self) -> u64 {
        self.http_requests_total.get()
    }

    pub fn encode(&self) -> Result<String, MetricsError> {
        let metrics = self.registry.gather();
        let encoder = TextEncoder::new();
        encoder.encode_to_string(&metrics)
            .map_err(|err| MetricsError::FailedToCollect { reason: format!("{err:?}") })
    }
}

pub async fn run_metrics_server(listener: TcpListener, metrics: Metrics) {
    if let Ok(addr) = listener.local_addr() {
        info!("running metrics server on {addr:?}");
    }

    let metrics_server = MetricsServer::new(metrics);
    loop {
        let (tcp, _) = match listener.accept().await {
            Ok(v) => v,
            Err(err) => {
                error!("failed to accept connection in metrics server: {err:?}");
                continue;
            }
        };
        let io = TokioIo::new(tcp);
        let metrics_server = metrics_server.clone();
        tokio::task::spawn(async move {
            if let Err(err) = http1::Builder::new()
                .timer(TokioTimer::new())
                .serve_connection(io, metrics_server)
                .await {
                    error!("error while handling metrics request: {err:?}");
                }
        });
    }
}

#[derive(Clone)]
struct MetricsServer {
    metrics: Metrics,
}

impl MetricsServer {
    pub fn new(metrics: Metrics) -> Self {
        Self {
            metrics,
        }
    }
}

impl<B> hyper::service::Service<Request<B>> for MetricsServer {
    type Response = Response<Full<Bytes>>;
    type Error = MetricsError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, _req: Request<B>) -> Self::Future {
        let metrics = match self.metrics.encode() {
            Ok(v) => v,
            Err(err) => {
                error!("failed to encode metrics: {err:?}");
                return Box::pin(async move {
                    let mut response = Response::new(Full::new(Bytes::from("internal server error.\n")));
                    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                    Ok(response)
                });
            }
        };
        Box::pin(async move { Ok(Response::new(Full::new(Bytes::from(metrics)))) })
    }
}

/// Decrements the gauge when dropped, so in-flight counts stay right on every exit path.
pub(crate) struct MetricGaugeDecreaseGuard {
    gauge: IntGauge,
}

impl MetricGaugeDecreaseGuard {
    pub(crate) fn wrap(gauge: IntGauge) -> Self {
        gauge.inc();
        Self { gauge }
    }
}

impl Drop for MetricGaugeDecreaseGuard {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}
