//! # List query options
//!
//! The list endpoint accepts the React-Admin style parameters:
//!
//! - `filter`: JSON object. `q` is a free-text search over the entity's
//!   searchable fields, every other key must be a filterable field. String
//!   values holding a UUID match exactly, other strings match as substrings,
//!   numbers and booleans match exactly, arrays match any of their elements
//!   and `null` matches missing values.
//! - `range`: `[start, end]`, both inclusive.
//! - `sort`: `["column", "ASC"|"DESC"]` or a bare column name.
//! - `select`: comma separated list of fields to return. The `id` key is
//!   always kept. Selected fields also feed scope resolution.
//!
//! Responses go through a [`Projection`], which applies `select` and drops the
//! fields the caller's scopes do not cover.

use hyper::HeaderMap;
use hyper::header::{CONTENT_RANGE, HeaderValue};
use sea_orm::{ColumnTrait, Condition, Order, Value};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use serde_with::{StringWithSeparator, formats::CommaSeparator, serde_as};
use std::collections::{BTreeMap, BTreeSet};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::config::ApiConfig;
use crate::entity::ApiEntity;
use crate::validation::{ValidationError, ValidationErrors};

/// Raw query-string parameters of a list request.
#[serde_as]
#[derive(Debug, Clone, Deserialize, IntoParams, ToSchema, Default, PartialEq, Eq)]
#[into_params(parameter_in = Query)]
pub struct QueryOptions {
    /// JSON-encoded filter, e.g. `{"q": "bolt"}` or `{"category": "hardware"}`
    #[param(example = json!({"q": "search text", "category": "hardware"}))]
    pub filter: Option<String>,
    /// Inclusive range for pagination, e.g. `[0,19]`
    #[param(example = "[0,19]")]
    pub range: Option<String>,
    /// Sort column and direction, e.g. `["name", "ASC"]`
    #[param(example = r#"["name", "ASC"]"#)]
    pub sort: Option<String>,
    /// Comma separated list of requested fields, e.g. `name,cost`
    #[serde_as(as = "Option<StringWithSeparator::<CommaSeparator, String>>")]
    #[param(value_type = Option<String>, example = "name,cost")]
    #[schema(value_type = Option<String>)]
    pub select: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl From<SortDirection> for Order {
    fn from(direction: SortDirection) -> Self {
        match direction {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        }
    }
}

/// A list query whose parameters have been checked against the entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    pub filters: BTreeMap<String, JsonValue>,
    pub search: Option<String>,
    pub offset: u64,
    pub limit: u64,
    pub sort: Option<(String, SortDirection)>,
    pub select: Vec<String>,
}

impl ParsedQuery {
    /// First page, no filters, default order.
    #[must_use]
    pub fn unfiltered(limit: u64) -> Self {
        Self {
            filters: BTreeMap::new(),
            search: None,
            offset: 0,
            limit,
            sort: None,
            select: Vec::new(),
        }
    }
}

impl QueryOptions {
    /// Every field named by `filter`, `sort` or `select`.
    ///
    /// Malformed parameters are skipped here; [`QueryOptions::parse`] reports them.
    #[must_use]
    pub fn referenced_fields(&self) -> BTreeSet<String> {
        let mut fields = BTreeSet::new();

        if let Some(filter) = self.filter.as_deref() {
            if let Ok(map) = serde_json::from_str::<Map<String, JsonValue>>(filter) {
                fields.extend(map.into_iter().map(|(key, _)| key).filter(|key| key != "q"));
            }
        }
        if let Some(sort) = self.sort.as_deref() {
            if let Ok(Some((column, _))) = parse_sort(sort) {
                fields.insert(column);
            }
        }
        if let Some(select) = &self.select {
            fields.extend(
                select
                    .iter()
                    .map(|field| field.trim())
                    .filter(|field| !field.is_empty())
                    .map(ToString::to_string),
            );
        }

        fields
    }

    /// Check every parameter against `T`'s field lists and the paging limits.
    ///
    /// # Errors
    /// Returns one [`ValidationError`] per malformed or unknown parameter.
    pub fn parse<T: ApiEntity>(&self, config: &ApiConfig) -> Result<ParsedQuery, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut parsed = ParsedQuery::unfiltered(config.page_size);

        if let Some(filter) = self.filter.as_deref() {
            match parse_filter::<T>(filter) {
                Ok((filters, search)) => {
                    parsed.filters = filters;
                    parsed.search = search;
                }
                Err(filter_errors) => {
                    for error in filter_errors.errors() {
                        errors.add(error.clone());
                    }
                }
            }
        }

        if let Some(range) = self.range.as_deref() {
            match parse_range(range, config.max_page_size) {
                Ok((offset, limit)) => {
                    parsed.offset = offset;
                    parsed.limit = limit;
                }
                Err(error) => errors.add(error),
            }
        }

        if let Some(sort) = self.sort.as_deref() {
            match parse_sort(sort) {
                Ok(Some((column, direction))) => {
                    if T::sortable_fields().contains(&column.as_str()) {
                        parsed.sort = Some((column, direction));
                    } else {
                        errors.add(ValidationError::new(
                            "sort",
                            format!("'{column}' is not sortable"),
                        ));
                    }
                }
                Ok(None) => {}
                Err(error) => errors.add(error),
            }
        }

        for field in self
            .select
            .iter()
            .flatten()
            .map(|field| field.trim())
            .filter(|field| !field.is_empty())
        {
            if T::selectable_fields().contains(&field) {
                parsed.select.push(field.to_string());
            } else {
                errors.add(ValidationError::new(
                    "select",
                    format!("'{field}' is not selectable"),
                ));
            }
        }

        errors.result().map(|()| parsed)
    }
}

type ParsedFilter = (BTreeMap<String, JsonValue>, Option<String>);

fn parse_filter<T: ApiEntity>(filter: &str) -> Result<ParsedFilter, ValidationErrors> {
    let map: Map<String, JsonValue> = serde_json::from_str(filter).map_err(|_| {
        ValidationErrors::from(ValidationError::new("filter", "Must be a JSON object"))
    })?;

    let mut errors = ValidationErrors::new();
    let mut filters = BTreeMap::new();
    let mut search = None;

    for (key, value) in map {
        if key == "q" {
            match value {
                JsonValue::String(text) if !text.trim().is_empty() => {
                    if T::searchable_fields().is_empty() {
                        errors.add(ValidationError::new(
                            "filter",
                            format!("{} have no searchable fields for 'q'", T::RESOURCE_NAME),
                        ));
                    } else {
                        search = Some(text.trim().to_string());
                    }
                }
                JsonValue::String(_) | JsonValue::Null => {}
                _ => errors.add(ValidationError::new("filter", "'q' must be a string")),
            }
            continue;
        }

        if !T::filterable_fields().contains(&key.as_str()) {
            errors.add(ValidationError::new(
                "filter",
                format!("'{key}' is not filterable"),
            ));
            continue;
        }

        let supported = match &value {
            JsonValue::Array(items) => items.iter().all(|item| scalar_value(item).is_some()),
            JsonValue::Object(_) => false,
            _ => true,
        };
        if supported {
            filters.insert(key, value);
        } else {
            errors.add(ValidationError::new(
                "filter",
                format!("Unsupported value for '{key}'"),
            ));
        }
    }

    errors.result().map(|()| (filters, search))
}

fn parse_range(range: &str, max_page_size: u64) -> Result<(u64, u64), ValidationError> {
    let bounds: Vec<u64> = serde_json::from_str(range)
        .map_err(|_| ValidationError::new("range", "Must be a JSON array [start, end]"))?;

    match bounds.as_slice() {
        [start, end] if end >= start => {
            let limit = (end - start).saturating_add(1).min(max_page_size);
            Ok((*start, limit))
        }
        [_, _] => Err(ValidationError::new(
            "range",
            "End must not be smaller than start",
        )),
        _ => Err(ValidationError::new(
            "range",
            "Must be a JSON array [start, end]",
        )),
    }
}

fn parse_sort(sort: &str) -> Result<Option<(String, SortDirection)>, ValidationError> {
    let trimmed = sort.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let (column, direction) = if trimmed.starts_with('[') {
        let parts: Vec<String> = serde_json::from_str(trimmed).map_err(|_| {
            ValidationError::new("sort", "Must be a JSON array [column, direction]")
        })?;
        match parts.as_slice() {
            [column] => (column.clone(), None),
            [column, direction] => (column.clone(), Some(direction.clone())),
            _ => {
                return Err(ValidationError::new(
                    "sort",
                    "Must be a JSON array [column, direction]",
                ));
            }
        }
    } else {
        (trimmed.to_string(), None)
    };

    let direction = match direction.as_deref().map(str::to_ascii_uppercase).as_deref() {
        None | Some("ASC") => SortDirection::Asc,
        Some("DESC") => SortDirection::Desc,
        Some(other) => {
            return Err(ValidationError::new(
                "sort",
                format!("Unknown direction '{other}'"),
            ));
        }
    };

    Ok(Some((column, direction)))
}

fn scalar_value(value: &JsonValue) -> Option<Value> {
    match value {
        JsonValue::String(text) => {
            let text = text.trim();
            Some(Uuid::parse_str(text).map_or_else(|_| Value::from(text.to_string()), Value::from))
        }
        JsonValue::Bool(flag) => Some(Value::from(*flag)),
        JsonValue::Number(number) => number
            .as_i64()
            .map(Value::from)
            .or_else(|| number.as_f64().map(Value::from)),
        JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => None,
    }
}

/// Build the `WHERE` condition for a parsed query.
///
/// `column` resolves a field name to the entity column.
///
/// # Errors
/// Returns the name of the first field `column` cannot resolve.
pub fn build_condition<C, F>(
    query: &ParsedQuery,
    searchable: &[&str],
    column: F,
) -> Result<Condition, String>
where
    C: ColumnTrait + Copy,
    F: Fn(&str) -> Option<C>,
{
    let mut condition = Condition::all();

    if let Some(text) = &query.search {
        let mut any = Condition::any();
        for name in searchable {
            let col = column(name).ok_or_else(|| (*name).to_string())?;
            any = any.add(col.contains(text.as_str()));
        }
        condition = condition.add(any);
    }

    for (key, value) in &query.filters {
        let col = column(key).ok_or_else(|| key.clone())?;
        condition = match value {
            JsonValue::Null => condition.add(col.is_null()),
            // Substring match for plain text, exact match for UUIDs
            JsonValue::String(text) if Uuid::parse_str(text.trim()).is_err() => {
                condition.add(col.contains(text.trim()))
            }
            JsonValue::Array(items) => {
                condition.add(col.is_in(items.iter().filter_map(scalar_value)))
            }
            scalar => match scalar_value(scalar) {
                Some(value) => condition.add(col.eq(value)),
                None => condition,
            },
        };
    }

    Ok(condition)
}

/// Resolve the sort column, falling back to `default` ascending.
///
/// # Errors
/// Returns the sort field name when `column` cannot resolve it.
pub fn build_order<C, F>(query: &ParsedQuery, default: C, column: F) -> Result<(C, Order), String>
where
    C: ColumnTrait + Copy,
    F: Fn(&str) -> Option<C>,
{
    match &query.sort {
        Some((name, direction)) => {
            let col = column(name).ok_or_else(|| name.clone())?;
            Ok((col, (*direction).into()))
        }
        None => Ok((default, Order::Asc)),
    }
}

/// `Content-Range: {resource} {start}-{end}/{total}` for a list response, or
/// `{resource} */{total}` when the page holds no rows.
#[must_use]
pub fn content_range(offset: u64, limit: u64, total: u64, resource: &str) -> HeaderMap {
    let end = offset.saturating_add(limit).min(total);
    let range = if limit == 0 || offset >= end {
        format!("{resource} */{total}")
    } else {
        format!("{resource} {offset}-{}/{total}", end - 1)
    };
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&range) {
        headers.insert(CONTENT_RANGE, value);
    }
    headers
}

/// Decides which keys of a serialized record reach the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    selected: BTreeSet<String>,
    withheld: BTreeSet<String>,
}

impl Projection {
    /// Keep `select` (plus `id`), or everything when `select` is empty, and
    /// always drop `withheld`.
    #[must_use]
    pub fn new(select: &[String], withheld: BTreeSet<String>) -> Self {
        Self {
            selected: select.iter().cloned().collect(),
            withheld,
        }
    }

    fn keeps(&self, key: &str) -> bool {
        let selected = self.selected.is_empty() || key == "id" || self.selected.contains(key);
        selected && !self.withheld.contains(key)
    }

    /// Serialize `record` and strip the keys this projection hides.
    ///
    /// # Errors
    /// Returns the serializer's error if `record` cannot become JSON.
    pub fn apply<T: Serialize>(&self, record: &T) -> Result<JsonValue, serde_json::Error> {
        let mut value = serde_json::to_value(record)?;
        if let JsonValue::Object(map) = &mut value {
            map.retain(|key, _| self.keeps(key));
        }
        Ok(value)
    }
}
