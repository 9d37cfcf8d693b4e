//! Query and page models shared by every CRUD route.

use crate::error::AppError;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

pub const DEFAULT_PAGE_NUMBER: u64 = 1;
pub const DEFAULT_PAGE_SIZE: u64 = 12;
pub const DEFAULT_SORT: &str = "desc";
pub const DEFAULT_ORDERBY: &str = "created_time";

/// List query: sort options plus column filters (every other query parameter).
#[derive(Clone, Debug, PartialEq)]
pub struct BaseQueryReq {
    pub sort: String,
    pub orderby: String,
    pub filters: Map<String, Value>,
}

impl Default for BaseQueryReq {
    fn default() -> Self {
        BaseQueryReq {
            sort: DEFAULT_SORT.to_string(),
            orderby: DEFAULT_ORDERBY.to_string(),
            filters: Map::new(),
        }
    }
}

impl BaseQueryReq {
    pub fn from_params(mut params: HashMap<String, String>) -> Self {
        let sort = params.remove("sort").unwrap_or_else(|| DEFAULT_SORT.to_string());
        let orderby = params.remove("orderby").unwrap_or_else(|| DEFAULT_ORDERBY.to_string());
        BaseQueryReq {
            sort,
            orderby,
            filters: params.into_iter().map(|(k, v)| (k, Value::String(v))).collect(),
        }
    }

    pub fn filter(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.insert(column.to_string(), value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BasePageQueryReq {
    pub page_number: u64,
    pub page_size: u64,
    pub query: BaseQueryReq,
}

impl Default for BasePageQueryReq {
    fn default() -> Self {
        BasePageQueryReq {
            page_number: DEFAULT_PAGE_NUMBER,
            page_size: DEFAULT_PAGE_SIZE,
            query: BaseQueryReq::default(),
        }
    }
}

impl BasePageQueryReq {
    pub fn from_params(mut params: HashMap<String, String>) -> Result<Self, AppError> {
        let page_number = parse_u64(&mut params, "page_number")?.unwrap_or(DEFAULT_PAGE_NUMBER);
        let page_size = parse_u64(&mut params, "page_size")?.unwrap_or(DEFAULT_PAGE_SIZE);
        Ok(BasePageQueryReq {
            page_number,
            page_size,
            query: BaseQueryReq::from_params(params),
        })
    }
}

fn parse_u64(params: &mut HashMap<String, String>, key: &str) -> Result<Option<u64>, AppError> {
    params
        .remove(key)
        .map(|v| {
            v.trim()
                .parse::<u64>()
                .map_err(|_| AppError::Validation(format!("{} must be a positive integer, got {}", key, v)))
        })
        .transpose()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BasePageResp<T> {
    pub page_number: u64,
    pub page_size: u64,
    pub page_count: u64,
    pub count: u64,
    pub sort: String,
    pub orderby: String,
    pub data: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn page_query_defaults() {
        let q = BasePageQueryReq::from_params(HashMap::new()).unwrap();
        assert_eq!(q, BasePageQueryReq::default());
        assert_eq!(q.query.orderby, "created_time");
    }

    #[test]
    fn remaining_params_become_filters() {
        let q = BasePageQueryReq::from_params(params(&[
            ("page_number", "3"),
            ("sort", "asc"),
            ("username", "alice"),
        ]))
        .unwrap();
        assert_eq!(q.page_number, 3);
        assert_eq!(q.page_size, 12);
        assert_eq!(q.query.sort, "asc");
        assert_eq!(q.query.filters.get("username"), Some(&json!("alice")));
        assert_eq!(q.query.filters.len(), 1);
    }

    #[test]
    fn bad_page_number_is_rejected() {
        assert!(BasePageQueryReq::from_params(params(&[("page_size", "many")])).is_err());
    }
}
