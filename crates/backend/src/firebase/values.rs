//! Conversion between plain JSON fields and Firestore's typed value encoding.

use serde_json::{json, Map, Value};

use crate::documents::{Document, Fields};
use crate::error::{BackendError, BackendResult};

pub(crate) fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(flag) => json!({ "booleanValue": flag }),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => json!({ "integerValue": integer.to_string() }),
            None => json!({ "doubleValue": number.as_f64() }),
        },
        Value::String(text) => json!({ "stringValue": text }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
    }
}

pub(crate) fn encode_fields(fields: &Fields) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(key, value)| (key.clone(), encode_value(value)))
            .collect(),
    )
}

pub(crate) fn decode_value(value: &Value) -> BackendResult<Value> {
    let Some((kind, inner)) = value.as_object().and_then(|object| object.iter().next()) else {
        return Err(BackendError::Decode(format!("malformed firestore value: {value}")));
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => Ok(Value::Bool(inner.as_bool().unwrap_or_default())),
        "integerValue" => match inner {
            Value::String(text) => text
                .parse::<i64>()
                .map(Value::from)
                .map_err(|error| BackendError::Decode(format!("integerValue {text}: {error}"))),
            Value::Number(_) => Ok(inner.clone()),
            other => Err(BackendError::Decode(format!("integerValue {other}"))),
        },
        "doubleValue" => match inner {
            Value::Number(_) => Ok(inner.clone()),
            // NaN and infinities arrive as strings and have no JSON form.
            _ => Ok(Value::Null),
        },
        "stringValue" | "timestampValue" | "bytesValue" | "referenceValue" | "geoPointValue" => {
            Ok(inner.clone())
        }
        "arrayValue" => {
            let items = inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect::<BackendResult<Vec<_>>>())
                .transpose()?
                .unwrap_or_default();
            Ok(Value::Array(items))
        }
        "mapValue" => Ok(Value::Object(decode_fields(inner.get("fields"))?)),
        other => Err(BackendError::Decode(format!("unsupported firestore value type {other}"))),
    }
}

pub(crate) fn decode_fields(fields: Option<&Value>) -> BackendResult<Fields> {
    let Some(fields) = fields.and_then(Value::as_object) else {
        return Ok(Map::new());
    };

    fields
        .iter()
        .map(|(key, value)| decode_value(value).map(|decoded| (key.clone(), decoded)))
        .collect()
}

/// Decode a REST document resource (`{ name, fields, createTime, updateTime }`).
pub(crate) fn decode_document(resource: &Value) -> BackendResult<Document> {
    let name = resource
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| BackendError::Decode("document without a name".to_string()))?;
    let id = name.rsplit('/').next().unwrap_or(name);

    Ok(Document::new(id, decode_fields(resource.get("fields"))?))
}
