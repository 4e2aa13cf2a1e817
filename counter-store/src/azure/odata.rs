use {
    serde::Deserialize,
    serde_json::{Map, Value},
    crate::{
        entity::{Entity, EntityKey},
        error::TableStoreError,
    },
};

const PARTITION_KEY: &str = "PartitionKey";
const ROW_KEY: &str = "RowKey";
const TIMESTAMP: &str = "Timestamp";
const ODATA_TYPE_SUFFIX: &str = "@odata.type";
const EDM_INT64: &str = "Edm.Int64";

#[derive(Deserialize)]
struct ODataErrorBody {
    #[serde(rename = "odata.error")]
    error: ODataError,
}

#[derive(Deserialize)]
struct ODataError {
    code: String,
    message: ODataErrorMessage,
}

#[derive(Deserialize)]
struct ODataErrorMessage {
    value: String,
}

fn is_reserved(name: &str) -> bool {
    name == PARTITION_KEY
        || name == ROW_KEY
        || name == TIMESTAMP
        || name.starts_with("odata.")
        || name.ends_with(ODATA_TYPE_SUFFIX)
}

/// Json body for insert and update requests. Integers that do not fit into 32 bits
/// are sent as annotated `Edm.Int64` strings, the service would read them as doubles otherwise.
pub(crate) fn encode_entity(entity: &Entity) -> Result<Vec<u8>, TableStoreError> {
    let mut body = Map::new();
    body.insert(PARTITION_KEY.to_owned(), Value::String(entity.key.partition_key.clone()));
    body.insert(ROW_KEY.to_owned(), Value::String(entity.key.row_key.clone()));

    for (name, value) in &entity.properties {
        if is_reserved(name) {
            return Err(TableStoreError::Serialization { reason: format!("property name is reserved: {name}") });
        }

        match value {
            Value::Number(number) if number.is_i64() || number.is_u64() => {
                let number = number.as_i64()
                    .ok_or_else(|| TableStoreError::Serialization { reason: format!("property {name} does not fit into {EDM_INT64}") })?;
                if i32::try_from(number).is_ok() {
                    body.insert(name.clone(), value.clone());
                } else {
                    body.insert(name.clone(), Value::String(number.to_string()));
                    body.insert(format!("{name}{ODATA_TYPE_SUFFIX}"), Value::String(EDM_INT64.to_owned()));
                }
            },
            Value::Array(_) | Value::Object(_) => {
                return Err(TableStoreError::Serialization { reason: format!("property {name} has nested value, which is not supported") });
            },
            other => {
                body.insert(name.clone(), other.clone());
            },
        }
    }

    serde_json::to_vec(&body)
        .map_err(|err| TableStoreError::Serialization { reason: format!("failed to encode entity: {err:?}") })
}

/// Decodes an entity returned with `odata=minimalmetadata`. `Edm.Int64` values arrive as
/// strings and are turned back into numbers using their type annotation.
pub(crate) fn decode_entity(body: &[u8]) -> Result<Entity, TableStoreError> {
    let mut object: Map<String, Value> = serde_json::from_slice(body)
        .map_err(|err| TableStoreError::Serialization { reason: format!("failed to decode entity: {err:?}") })?;

    let partition_key = take_string(&mut object, PARTITION_KEY)?;
    let row_key = take_string(&mut object, ROW_KEY)?;

    let annotations: Vec<(String, Value)> = object.iter()
        .filter_map(|(name, value)| name.strip_suffix(ODATA_TYPE_SUFFIX).map(|property| (property.to_owned(), value.clone())))
        .collect();
    object.retain(|name, _| !is_reserved(name));

    for (property, edm_type) in annotations {
        if edm_type.as_str() != Some(EDM_INT64) {
            continue;
        }
        if let Some(Value::String(encoded)) = object.get(&property) {
            let number: i64 = encoded.parse()
                .map_err(|err| TableStoreError::Serialization { reason: format!("property {property} is not a valid {EDM_INT64}: {err:?}") })?;
            object.insert(property, Value::from(number));
        }
    }

    Ok(Entity::with_properties(EntityKey::new(partition_key, row_key), object))
}

fn take_string(object: &mut Map<String, Value>, name: &str) -> Result<String, TableStoreError> {
    match object.remove(name) {
        Some(Value::String(v)) => Ok(v),
        _ => Err(TableStoreError::Serialization { reason: format!("entity is missing {name}") }),
    }
}

pub(crate) fn error_code(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ODataErrorBody>(body).ok().map(|v| v.error.code)
}

pub(crate) fn decode_error(status: u16, body: &[u8]) -> TableStoreError {
    match serde_json::from_slice::<ODataErrorBody>(body) {
        Ok(v) => TableStoreError::Service {
            status,
            code: v.error.code,
            message: v.error.message.value,
        },
        Err(_) => TableStoreError::Service {
            status,
            code: "Unknown".to_owned(),
            message: String::from_utf8_lossy(body).chars().take(256).collect(),
        },
    }
}
