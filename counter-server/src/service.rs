use {
    std::{convert::Infallible, pin::Pin, sync::Arc},
    hyper::{Request, Response, body::Bytes, StatusCode},
    http_body_util::Full,
    counter_store::TableStore,
    crate::{
        handler::{CounterHandler, text_response},
        metrics::{Metrics, MetricGaugeDecreaseGuard},
        response::HttpResponse,
    },
};

/// Routes requests for the counter path to the handler. Method and body are ignored;
/// path matching is case-insensitive.
pub struct CounterService<S> {
    handler: Arc<CounterHandler<S>>,
    route: Arc<str>,
    metrics: Metrics,
}

impl<S> Clone for CounterService<S> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            route: self.route.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<S: TableStore + 'static> CounterService<S> {
    pub fn new(handler: CounterHandler<S>, route: impl AsRef<str>, metrics: Metrics) -> Self {
        Self {
            handler: Arc::new(handler),
            route: Arc::from(route.as_ref()),
            metrics,
        }
    }

    fn is_counter_route(&self, path: &str) -> bool {
        path.eq_ignore_ascii_case(&self.route)
    }
}

impl<S: TableStore + 'static, B> hyper::service::Service<Request<B>> for CounterService<S> {
    type Response = Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        let in_flight = MetricGaugeDecreaseGuard::wrap(self.metrics.http_requests_in_flight.clone());
        self.metrics.http_requests_total.inc();

        if !self.is_counter_route(req.uri().path()) {
            drop(in_flight);
            return Box::pin(async move { Ok(response_not_found().into()) });
        }

        let handler = self.handler.clone();
        Box::pin(async move {
            let response = handler.handle().await;
            drop(in_flight);
            Ok(response.into())
        })
    }
}

fn response_not_found() -> HttpResponse {
    text_response(StatusCode::NOT_FOUND, "not found.\n")
}
