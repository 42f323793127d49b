use mongodb::bson::{self, Bson, Document};
use serde::Serialize;
use serde_json::{Map, Value};

/// Renders a stored document as client JSON: ObjectIds become hex strings
/// and dates RFC 3339 strings.
pub fn document_to_json(document: Document) -> Value {
    Value::Object(
        document
            .into_iter()
            .map(|(key, value)| (key, bson_to_json(value)))
            .collect::<Map<String, Value>>(),
    )
}

pub fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::ObjectId(id) => Value::String(id.to_hex()),
        Bson::DateTime(date) => date
            .try_to_rfc3339_string()
            .map(Value::String)
            .unwrap_or_else(|_| Value::from(date.timestamp_millis())),
        Bson::Document(document) => document_to_json(document),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        Bson::String(s) => Value::String(s),
        Bson::Boolean(b) => Value::Bool(b),
        Bson::Int32(n) => Value::from(n),
        Bson::Int64(n) => Value::from(n),
        Bson::Double(n) => Value::from(n),
        Bson::Null | Bson::Undefined => Value::Null,
        other => other.into_relaxed_extjson(),
    }
}

/// Serializes a model through BSON so it renders like a stored document.
pub fn model_to_json<T: Serialize>(model: &T) -> Result<Value, bson::ser::Error> {
    Ok(document_to_json(bson::to_document(model)?))
}

pub fn documents_to_json(documents: Vec<Document>) -> Value {
    Value::Array(documents.into_iter().map(document_to_json).collect())
}
