// ==================== QUERY TRANSLATION ====================
// Converte os parâmetros where/sort/select/skip/limit/count das listagens
// em uma FindQuery para o store

use crate::database::FindQuery;
use mongodb::bson::{oid::ObjectId, Bson, Document};
use serde::Deserialize;
use thiserror::Error;
use utoipa::IntoParams;

/// Fields holding ObjectId references; string values are cast before querying.
const REFERENCE_FIELDS: &[&str] = &["_id", "assignedUser", "pendingTasks"];

/// Query string accepted by `GET /tasks` and `GET /users`.
///
/// Every value arrives as a raw string so malformed input produces our own
/// 400 envelope instead of an extractor error.
#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// JSON filter, e.g. `{"completed": false}`
    #[serde(rename = "where")]
    pub filter: Option<String>,
    /// JSON sort, e.g. `{"deadline": 1}`
    pub sort: Option<String>,
    /// JSON projection, e.g. `{"name": 1}`
    pub select: Option<String>,
    pub skip: Option<String>,
    pub limit: Option<String>,
    /// `true` returns only the number of matches
    pub count: Option<String>,
}

/// Query string accepted by `GET /tasks/{id}` and `GET /users/{id}`.
#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SelectParams {
    pub select: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("Invalid '{0}' parameter JSON")]
    InvalidJson(&'static str),

    #[error("Invalid '{0}' parameter. Must be a JSON object.")]
    NotAnObject(&'static str),

    #[error("Invalid \"skip\" parameter. Must be a non-negative integer.")]
    InvalidSkip,

    #[error("Invalid \"limit\" parameter. Must be a positive integer.")]
    InvalidLimit,
}

/// What a list request asks the store for.
#[derive(Debug, Clone, PartialEq)]
pub enum ListRequest {
    Rows(FindQuery),
    Count(FindQuery),
}

/// Translates list parameters into a store query. `default_limit` applies
/// when the request carries no `limit`.
pub fn translate(params: &ListParams, default_limit: Option<i64>) -> Result<ListRequest, QueryError> {
    let mut filter = parse_object("where", params.filter.as_deref())?.unwrap_or_default();
    cast_references(&mut filter);

    let sort = parse_object("sort", params.sort.as_deref())?;
    let projection = parse_object("select", params.select.as_deref())?;

    let skip = match non_empty(params.skip.as_deref()) {
        Some(raw) => Some(raw.parse::<u64>().map_err(|_| QueryError::InvalidSkip)?),
        None => None,
    };

    let limit = match non_empty(params.limit.as_deref()) {
        Some(raw) => match raw.parse::<i64>() {
            Ok(limit) if limit > 0 => Some(limit),
            _ => return Err(QueryError::InvalidLimit),
        },
        None => None,
    };

    let query = FindQuery {
        filter,
        sort,
        projection,
        skip,
        limit,
    };

    // A count is the cardinality of the filter alone.
    if non_empty(params.count.as_deref()) == Some("true") {
        Ok(ListRequest::Count(FindQuery::filter(query.filter)))
    } else {
        Ok(ListRequest::Rows(FindQuery {
            limit: query.limit.or(default_limit),
            ..query
        }))
    }
}

pub fn parse_projection(select: Option<&str>) -> Result<Option<Document>, QueryError> {
    parse_object("select", select)
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_object(param: &'static str, raw: Option<&str>) -> Result<Option<Document>, QueryError> {
    let Some(raw) = non_empty(raw) else {
        return Ok(None);
    };

    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|_| QueryError::InvalidJson(param))?;
    if !value.is_object() {
        return Err(QueryError::NotAnObject(param));
    }

    match Bson::try_from(value) {
        Ok(Bson::Document(document)) => Ok(Some(document)),
        _ => Err(QueryError::InvalidJson(param)),
    }
}

/// Casts 24-hex strings under reference fields to ObjectIds, including
/// inside operator documents (`{"$in": [...]}`) and `$and`/`$or` clauses.
fn cast_references(filter: &mut Document) {
    for (key, value) in filter.iter_mut() {
        match key.as_str() {
            "$and" | "$or" | "$nor" => {
                if let Bson::Array(clauses) = value {
                    for clause in clauses.iter_mut() {
                        if let Bson::Document(clause) = clause {
                            cast_references(clause);
                        }
                    }
                }
            }
            field if REFERENCE_FIELDS.contains(&field) => cast_value(value),
            _ => {}
        }
    }
}

fn cast_value(value: &mut Bson) {
    if let Some(id) = value.as_str().and_then(|raw| ObjectId::parse_str(raw).ok()) {
        *value = Bson::ObjectId(id);
        return;
    }

    match value {
        Bson::Array(items) => items.iter_mut().for_each(cast_value),
        Bson::Document(operators) => operators
            .iter_mut()
            .filter(|(op, _)| op.starts_with('$'))
            .for_each(|(_, arg)| cast_value(arg)),
        _ => {}
    }
}
