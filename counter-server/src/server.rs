use {
    std::net::SocketAddr,
    tracing::{info, warn, error},
    tokio::net::TcpListener,
    hyper::server::conn::http1,
    hyper_util::rt::{TokioIo, TokioTimer},
    counter_store::{BoxedTableStore, EmptyTableStore, TableStore, UnavailableTableStore, connect},
    crate::{config::CounterConfig, error::ServerError, service::CounterService},
};

/// Opens the table store for `config`. Never fails: without a usable connection string
/// the returned store fails every call and the handler answers each request with 500.
pub fn open_table_store(config: &CounterConfig) -> BoxedTableStore {
    let Some(connection_string) = config.connection_string() else {
        warn!("connection string is not configured, every counter request will fail");
        return BoxedTableStore::new(EmptyTableStore);
    };

    match connect(connection_string, &config.table_name) {
        Ok(store) => store,
        Err(err) => {
            error!("failed to connect to table store, every counter request will fail: {err}");
            BoxedTableStore::new(UnavailableTableStore::new(err.to_string()))
        },
    }
}

pub async fn bind(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr).await
        .map_err(|err| ServerError::FailedToBind { addr, reason: format!("{err:?}") })
}

/// Accepts connections until `shutdown` completes. Connections that are already
/// open keep being served by their own tasks.
pub async fn serve<S: TableStore + 'static>(listener: TcpListener, service: CounterService<S>, shutdown: impl Future<Output = ()>) {
    if let Ok(addr) = listener.local_addr() {
        info!("running on {addr:?}");
    }

    tokio::pin!(shutdown);
    loop {
        let (tcp, _) = tokio::select! {
            _ = &mut shutdown => {
                info!("shutting down");
                return;
            },
            accepted = listener.accept() => match accepted {
                Ok(v) => v,
                Err(err) => {
                    error!("failed to accept connection: {err:?}");
                    continue;
                }
            },
        };

        let io = TokioIo::new(tcp);
        let service = service.clone();
        tokio::task::spawn(async move {
            if let Err(err) = http1::Builder::new()
                .timer(TokioTimer::new())
                .serve_connection(io, service)
                .await {
                    error!("error while serving connection: {err:?}");
                }
        });
    }
}
