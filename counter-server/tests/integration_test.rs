use {
    std::sync::{Arc, atomic::Ordering},
    tokio::{join, net::TcpListener, sync::{Barrier, oneshot}},
    hyper::{Request, StatusCode, header::CONTENT_TYPE, service::Service},
    http_body_util::BodyExt,
    counter_store::{BoxedTableStore, EmptyTableStore, TableStore, TableStoreError, connect},
    counter_server::{
        config::CounterConfig,
        handler::{CONFIGURATION_ERROR_MESSAGE, PROCESSING_ERROR_MESSAGE, CounterHandler, CounterResponse},
        metrics::{CounterUpdateResult, Metrics},
        response::HttpResponse,
        server::{open_table_store, serve},
        service::CounterService,
    },
    crate::spy_store::{FailOn, SpyStore, counter_key},
};


fn configured() -> CounterConfig {
    CounterConfig::new(Some("sqlite::memory:".to_owned()))
}

fn handler<S: TableStore>(store: S) -> CounterHandler<S> {
    CounterHandler::new(configured(), store, Metrics::new().unwrap())
}

fn count_of(response: &HttpResponse) -> i64 {
    assert_eq!(StatusCode::OK, response.status, "unexpected response: {}", response.body_text());
    assert_eq!(response.headers[CONTENT_TYPE], "application/json");
    serde_json::from_slice::<CounterResponse>(&response.body).unwrap().count
}

fn assert_processing_error(response: &HttpResponse) {
    assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, response.status);
    assert_eq!(PROCESSING_ERROR_MESSAGE, response.body_text());
}

#[tokio::test]
async fn first_call_creates_counter() {
    let store = SpyStore::empty();
    let response = handler(store.clone()).handle().await;

    assert_eq!(1, count_of(&response));
    assert_eq!(Some(1), store.count());
    assert_eq!(1, store.rows());
    assert_eq!(1, store.create_calls.load(Ordering::SeqCst));
    assert_eq!(0, store.update_calls.load(Ordering::SeqCst));
}

#[tokio::test]
async fn sequential_calls_count_up() {
    let store = SpyStore::empty();
    let handler = handler(store.clone());

    let mut counts = Vec::new();
    for _ in 0..5 {
        counts.push(count_of(&handler.handle().await));
    }

    assert_eq!(vec![1, 2, 3, 4, 5], counts);
    assert_eq!(Some(5), store.count());
    assert_eq!(1, store.create_calls.load(Ordering::SeqCst));
    assert_eq!(4, store.update_calls.load(Ordering::SeqCst));
}

#[tokio::test]
async fn existing_counter_is_incremented() {
    let store = SpyStore::with_count(1203);
    assert_eq!(1204, count_of(&handler(store.clone()).handle().await));
    assert_eq!(Some(1204), store.count());
}

#[tokio::test]
async fn missing_configuration_skips_store() {
    for connection_string in [None, Some(String::new()), Some("  ".to_owned())] {
        let store = SpyStore::with_count(3);
        let handler = CounterHandler::new(CounterConfig::new(connection_string), store.clone(), Metrics::new().unwrap());

        let response = handler.handle().await;
        assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, response.status);
        assert_eq!(CONFIGURATION_ERROR_MESSAGE, response.body_text());
        assert_eq!(0, store.total_calls());
        assert_eq!(Some(3), store.count());
    }
}

#[tokio::test]
async fn failed_fetch_leaves_count_unchanged() {
    let store = SpyStore::with_count(10);
    store.fail_on(FailOn::Get, || TableStoreError::Transport { reason: "operation timed out".to_owned() });

    assert_processing_error(&handler(store.clone()).handle().await);
    assert_eq!(Some(10), store.count());
    assert_eq!(0, store.update_calls.load(Ordering::SeqCst));
    assert_eq!(0, store.create_calls.load(Ordering::SeqCst));
}

#[tokio::test]
async fn store_errors_are_masked() {
    let errors: [fn() -> TableStoreError; 5] = [
        || TableStoreError::Transport { reason: "operation timed out".to_owned() },
        || TableStoreError::Service { status: 503, code: "ServerBusy".to_owned(), message: "The server is busy.".to_owned() },
        || TableStoreError::Service { status: 403, code: "AuthenticationFailed".to_owned(), message: "Signature did not match.".to_owned() },
        || TableStoreError::Serialization { reason: "failed to decode entity".to_owned() },
        || TableStoreError::InternalError { description: "failed to acquire connection".to_owned() },
    ];

    for error in errors {
        for (point, store) in [
            (FailOn::Get, SpyStore::with_count(4)),
            (FailOn::Update, SpyStore::with_count(4)),
            (FailOn::Create, SpyStore::empty()),
        ] {
            store.fail_on(point, error);
            let response = handler(store.clone()).handle().await;

            assert_processing_error(&response);
            assert_eq!(Some(4).filter(|_| point != FailOn::Create), store.count(), "store changed after failing {point:?}");
        }
    }
}

#[tokio::test]
async fn invalid_stored_count_is_masked() {
    let entity = counter_store::Entity::new(counter_key()).with_property("count", "many");
    let store = SpyStore::with_entity(entity);

    assert_processing_error(&handler(store.clone()).handle().await);
    assert_eq!(0, store.update_calls.load(Ordering::SeqCst));
}

#[tokio::test]
async fn concurrent_increments_lose_an_update() {
    let store = SpyStore::with_count(5);
    store.pause_reads_at(Arc::new(Barrier::new(2)));
    let handler = handler(store.clone());

    // both calls read 5 before either writes
    let (first, second) = join!(handler.handle(), handler.handle());

    assert_eq!(6, count_of(&first));
    assert_eq!(6, count_of(&second));
    assert_eq!(Some(6), store.count());
    assert_eq!(2, store.update_calls.load(Ordering::SeqCst));
}

#[tokio::test]
async fn concurrent_first_calls_race_on_create() {
    let store = SpyStore::empty();
    store.pause_reads_at(Arc::new(Barrier::new(2)));
    let handler = handler(store.clone());

    let (first, second) = join!(handler.handle(), handler.handle());
    let (succeeded, failed) = if first.status == StatusCode::OK { (first, second) } else { (second, first) };

    assert_eq!(1, count_of(&succeeded));
    assert_processing_error(&failed);
    assert_eq!(Some(1), store.count());
    assert_eq!(2, store.create_calls.load(Ordering::SeqCst));
}

#[tokio::test]
async fn counter_updates_are_recorded() {
    let metrics = Metrics::new().unwrap();
    let store = SpyStore::empty();
    let handler = CounterHandler::new(configured(), store.clone(), metrics.clone());

    handler.handle().await;
    handler.handle().await;
    store.fail_on(FailOn::Update, || TableStoreError::Transport { reason: "reset".to_owned() });
    handler.handle().await;

    assert_eq!(1, metrics.counter_updates(CounterUpdateResult::Created));
    assert_eq!(1, metrics.counter_updates(CounterUpdateResult::Incremented));
    assert_eq!(1, metrics.counter_updates(CounterUpdateResult::Error));
}

#[tokio::test]
async fn service_routes_counter_path_only() {
    let metrics = Metrics::new().unwrap();
    let store = SpyStore::empty();
    let service = CounterService::new(
        CounterHandler::new(configured(), store.clone(), metrics.clone()),
        "/api/GetVisitorCount",
        metrics.clone(),
    );

    let response = service.call(Request::get("/api/GetVisitorCount").body(()).unwrap()).await.unwrap();
    assert_eq!(StatusCode::OK, response.status());
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(CounterResponse { count: 1 }, serde_json::from_slice(&body).unwrap());

    let response = service.call(Request::post("/api/getvisitorcount?source=home").body(()).unwrap()).await.unwrap();
    assert_eq!(StatusCode::OK, response.status());

    let response = service.call(Request::get("/api/other").body(()).unwrap()).await.unwrap();
    assert_eq!(StatusCode::NOT_FOUND, response.status());

    assert_eq!(Some(2), store.count());
    assert_eq!(3, metrics.http_requests());
}

async fn start_server(config: CounterConfig, store: BoxedTableStore) -> (String, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let metrics = Metrics::new().unwrap();
    let service = CounterService::new(CounterHandler::new(config, store, metrics.clone()), "/api/GetVisitorCount", metrics);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn(serve(listener, service, async move {
        let _ = shutdown_rx.await;
    }));

    (format!("http://{addr}"), shutdown_tx)
}

#[tokio::test]
async fn http_counter_over_sqlite() {
    let config = configured();
    let store = connect(config.connection_string().unwrap(), &config.table_name).unwrap();
    let (base_url, shutdown) = start_server(config, store).await;
    let client = reqwest::Client::new();

    for expected in 1..=3 {
        let response = client.get(format!("{base_url}/api/GetVisitorCount")).send().await.unwrap();
        assert_eq!(200, response.status().as_u16());
        assert_eq!(response.headers()["content-type"], "application/json");
        let body: CounterResponse = serde_json::from_slice(&response.bytes().await.unwrap()).unwrap();
        assert_eq!(expected, body.count);
    }

    let response = client.get(format!("{base_url}/")).send().await.unwrap();
    assert_eq!(404, response.status().as_u16());

    shutdown.send(()).unwrap();
}

#[tokio::test]
async fn http_missing_configuration() {
    let (base_url, shutdown) = start_server(CounterConfig::new(None), BoxedTableStore::new(EmptyTableStore)).await;

    let response = reqwest::get(format!("{base_url}/api/GetVisitorCount")).await.unwrap();
    assert_eq!(500, response.status().as_u16());
    assert_eq!(CONFIGURATION_ERROR_MESSAGE, response.text().await.unwrap());

    shutdown.send(()).unwrap();
}

#[tokio::test]
async fn malformed_connection_string_fails_each_request() {
    for connection_string in ["AccountName=site", "AccountName=site;AccountKey=not base64!", "garbage"] {
        let config = CounterConfig::new(Some(connection_string.to_owned()));
        let store = open_table_store(&config);
        let response = CounterHandler::new(config, store, Metrics::new().unwrap()).handle().await;

        assert_processing_error(&response);
    }
}

#[tokio::test]
async fn http_malformed_connection_string() {
    let config = CounterConfig::new(Some("AccountName=site".to_owned()));
    let store = open_table_store(&config);
    let (base_url, shutdown) = start_server(config, store).await;

    for _ in 0..2 {
        let response = reqwest::get(format!("{base_url}/api/GetVisitorCount")).await.unwrap();
        assert_eq!(500, response.status().as_u16());
        assert_eq!(PROCESSING_ERROR_MESSAGE, response.text().await.unwrap());
    }

    shutdown.send(()).unwrap();
}
