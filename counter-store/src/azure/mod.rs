use {
    chrono::Utc,
    futures::future::{BoxFuture, FutureExt},
    reqwest::{
        Client,
        Method,
        RequestBuilder,
        StatusCode,
        Url,
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    },
    crate::{
        connection::AzureTablesAccount,
        entity::{Entity, EntityKey, EntityLookup, UpdateMode},
        error::{ConnectError, TableStoreError},
        store::TableStore,
    },
};

mod auth;
mod odata;

const API_VERSION: &str = "2019-02-02";
const DATA_SERVICE_VERSION: &str = "3.0";
const MAX_DATA_SERVICE_VERSION: &str = "3.0;NetFx";
// type annotations (Edm.Int64 and friends) are only returned with minimal metadata
const ACCEPT_MINIMAL_METADATA: &str = "application/json;odata=minimalmetadata";
const CONTENT_TYPE_JSON: &str = "application/json";

/// Table store backed by the Azure Table service REST api (storage accounts and
/// Cosmos DB Table API). Updates are sent with `If-Match: *`, so they never check
/// the entity version.
pub struct AzureTableStore {
    client: Client,
    account: AzureTablesAccount,
    table_name: String,
}

impl AzureTableStore {
    pub fn new(account: AzureTablesAccount, table_name: impl Into<String>) -> Result<Self, ConnectError> {
        let client = Client::builder()
            .user_agent(concat!("counter-store/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| ConnectError::HttpClient { reason: format!("{err:?}") })?;

        Ok(Self {
            client,
            account,
            table_name: table_name.into(),
        })
    }

    pub fn table_url(&self) -> Result<Url, TableStoreError> {
        parse_url(&format!("{}/{}", self.account.table_endpoint, self.table_name))
    }

    pub fn entity_url(&self, key: &EntityKey) -> Result<Url, TableStoreError> {
        parse_url(&format!(
            "{}/{}(PartitionKey='{}',RowKey='{}')",
            self.account.table_endpoint,
            self.table_name,
            encode_key(&key.partition_key),
            encode_key(&key.row_key),
        ))
    }

    fn request(&self, method: Method, url: Url) -> Result<RequestBuilder, TableStoreError> {
        let date = auth::request_date(Utc::now());
        let authorization = auth::shared_key_lite(&self.account.account_name, &self.account.account_key, &date, url.path())?;

        Ok(self.client.request(method, url)
            .header("x-ms-date", date)
            .header("x-ms-version", API_VERSION)
            .header("DataServiceVersion", DATA_SERVICE_VERSION)
            .header("MaxDataServiceVersion", MAX_DATA_SERVICE_VERSION)
            .header(ACCEPT, ACCEPT_MINIMAL_METADATA)
            .header(AUTHORIZATION, authorization))
    }

    async fn send(request: RequestBuilder) -> Result<(StatusCode, Vec<u8>), TableStoreError> {
        let response = request.send().await
            .map_err(|err| TableStoreError::Transport { reason: format!("failed to send request: {err:?}") })?;
        let status = response.status();
        let body = response.bytes().await
            .map_err(|err| TableStoreError::Transport { reason: format!("failed to read response body: {err:?}") })?;
        Ok((status, body.to_vec()))
    }

    async fn get(&self, key: &EntityKey) -> Result<EntityLookup, TableStoreError> {
        let request = self.request(Method::GET, self.entity_url(key)?)?;
        let (status, body) = Self::send(request).await?;

        match status {
            StatusCode::OK => odata::decode_entity(&body).map(EntityLookup::Found),
            // missing table is reported the same way as missing entity
            StatusCode::NOT_FOUND => Ok(EntityLookup::NotFound),
            status => Err(odata::decode_error(status.as_u16(), &body)),
        }
    }

    async fn create(&self, entity: &Entity) -> Result<(), TableStoreError> {
        let request = self.request(Method::POST, self.table_url()?)?
            .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
            .header("Prefer", "return-no-content")
            .body(odata::encode_entity(entity)?);
        let (status, body) = Self::send(request).await?;

        match status {
            StatusCode::CREATED | StatusCode::NO_CONTENT => Ok(()),
            StatusCode::CONFLICT if odata::error_code(&body).as_deref() == Some("EntityAlreadyExists") => {
                Err(TableStoreError::EntityAlreadyExists)
            },
            status => Err(odata::decode_error(status.as_u16(), &body)),
        }
    }

    async fn update(&self, entity: &Entity, mode: UpdateMode) -> Result<(), TableStoreError> {
        let method = match mode {
            UpdateMode::Replace => Method::PUT,
            UpdateMode::Merge => Method::from_bytes(b"MERGE")
                .map_err(|err| TableStoreError::InternalError { description: format!("failed to create merge method: {err:?}") })?,
        };
        let request = self.request(method, self.entity_url(&entity.key)?)?
            .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
            .header("If-Match", "*")
            .body(odata::encode_entity(entity)?);
        let (status, body) = Self::send(request).await?;

        match status {
            StatusCode::NO_CONTENT | StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND if odata::error_code(&body).as_deref() == Some("ResourceNotFound") => {
                Err(TableStoreError::EntityNotFound)
            },
            status => Err(odata::decode_error(status.as_u16(), &body)),
        }
    }
}

impl TableStore for AzureTableStore {
    fn get_entity<'a>(&'a self, key: &'a EntityKey) -> BoxFuture<'a, Result<EntityLookup, TableStoreError>> {
        self.get(key).boxed()
    }

    fn create_entity<'a>(&'a self, entity: &'a Entity) -> BoxFuture<'a, Result<(), TableStoreError>> {
        self.create(entity).boxed()
    }

    fn update_entity<'a>(&'a self, entity: &'a Entity, mode: UpdateMode) -> BoxFuture<'a, Result<(), TableStoreError>> {
        self.update(entity, mode).boxed()
    }
}

/// Single quotes are doubled, then the key is percent-encoded.
fn encode_key(key: &str) -> String {
    urlencoding::encode(&key.replace('\'', "''")).into_owned()
}

fn parse_url(url: &str) -> Result<Url, TableStoreError> {
    Url::parse(url)
        .map_err(|err| TableStoreError::InternalError { description: format!("failed to build table service url: {err:?}") })
}
