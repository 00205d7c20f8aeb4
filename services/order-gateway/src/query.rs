//! Query coordinator (C8): parses and normalizes query parameters,
//! enforces the page-size ceiling, applies default sorts, and
//! delegates to the order and error repositories.

use std::collections::HashMap;
use std::sync::Arc;

use feed_common::PartnerId;

use crate::error_repository::{ErrorFilters, ErrorRepository, ErrorStatistics};
use crate::order::{ErrorCode, ErrorEvent, OrderEvent};
use crate::repository::{OrderFilters, OrderRepository, OrderStatistics, Page, Pagination, Sort, SortField, SortOrder};
use crate::validation::parse_instant;

/// Raw query-string parameters as a transport layer would hand them
/// over, before normalization. Every value is a plain string: this
/// module owns parsing, not the HTTP layer.
pub type RawQuery = HashMap<String, String>;

#[derive(Debug, Clone)]
pub struct QueryError {
    pub field: String,
    pub message: String,
}

impl QueryError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Parses `/api/orders`-style query parameters into filters,
/// pagination, and sort.
pub fn parse_order_query(raw: &RawQuery) -> Result<(OrderFilters, Pagination, Sort), QueryError> {
    let filters = OrderFilters {
        partner_id: parse_partner(raw, "partnerId")?,
        customer_id: raw.get("customerId").cloned(),
        product_id: raw.get("productId").cloned(),
        from_date: parse_date(raw, "fromDate")?,
        to_date: parse_date(raw, "toDate")?,
        min_amount: parse_f64(raw, "minAmount")?,
        max_amount: parse_f64(raw, "maxAmount")?,
    };

    let pagination = parse_pagination(raw)?;
    let sort = parse_sort(raw)?;

    Ok((filters, pagination, sort))
}

/// Parses `/api/errors`-style query parameters into filters and
/// pagination. Errors are always sorted newest-first.
pub fn parse_error_query(raw: &RawQuery) -> Result<(ErrorFilters, Pagination), QueryError> {
    let filters = ErrorFilters {
        partner_id: parse_partner(raw, "partnerId")?,
        error_code: parse_error_code(raw)?,
        from_date: parse_date(raw, "fromDate")?,
        to_date: parse_date(raw, "toDate")?,
    };
    let pagination = parse_pagination(raw)?;
    Ok((filters, pagination))
}

fn parse_partner(raw: &RawQuery, field: &str) -> Result<Option<PartnerId>, QueryError> {
    match raw.get(field) {
        None => Ok(None),
        Some(value) => PartnerId::parse(value)
            .map(Some)
            .ok_or_else(|| QueryError::new(field, format!("unknown partner id: {value}"))),
    }
}

fn parse_error_code(raw: &RawQuery) -> Result<Option<ErrorCode>, QueryError> {
    match raw.get("errorCode") {
        None => Ok(None),
        Some(value) => serde_json::from_value::<ErrorCode>(serde_json::Value::String(value.clone()))
            .map(Some)
            .map_err(|_| QueryError::new("errorCode", format!("unknown error code: {value}"))),
    }
}

fn parse_date(raw: &RawQuery, field: &str) -> Result<Option<chrono::DateTime<chrono::Utc>>, QueryError> {
    match raw.get(field) {
        None => Ok(None),
        Some(value) => parse_instant(value)
            .map(Some)
            .ok_or_else(|| QueryError::new(field, format!("unparseable timestamp: {value}"))),
    }
}

fn parse_f64(raw: &RawQuery, field: &str) -> Result<Option<f64>, QueryError> {
    match raw.get(field) {
        None => Ok(None),
        Some(value) => value
            .parse::<f64>()
            .map(Some)
            .map_err(|_| QueryError::new(field, format!("not a number: {value}"))),
    }
}

fn parse_pagination(raw: &RawQuery) -> Result<Pagination, QueryError> {
    let page = match raw.get("page") {
        None => 1,
        Some(v) => v.parse::<u32>().map_err(|_| QueryError::new("page", format!("not an integer: {v}")))?,
    };
    let page_size = match raw.get("pageSize") {
        None => 20,
        Some(v) => v.parse::<u32>().map_err(|_| QueryError::new("pageSize", format!("not an integer: {v}")))?,
    };
    Ok(Pagination { page, page_size }.normalized())
}

fn parse_sort(raw: &RawQuery) -> Result<Sort, QueryError> {
    let field = match raw.get("sortBy").map(String::as_str) {
        None => SortField::ProcessedAt,
        Some("processedAt") => SortField::ProcessedAt,
        Some("transactionTime") => SortField::TransactionTime,
        Some("grossAmount") => SortField::GrossAmount,
        Some("sequenceNumber") => SortField::SequenceNumber,
        Some(other) => return Err(QueryError::new("sortBy", format!("unknown sort field: {other}"))),
    };
    let order = match raw.get("sortOrder").map(String::as_str) {
        None | Some("desc") => SortOrder::Desc,
        Some("asc") => SortOrder::Asc,
        Some(other) => return Err(QueryError::new("sortOrder", format!("unknown sort order: {other}"))),
    };
    Ok(Sort { field, order })
}

/// Coordinates reads across both repositories for the query-facing
/// endpoints. Holds no mutable state of its own.
pub struct QueryCoordinator {
    orders: Arc<OrderRepository>,
    errors: Arc<ErrorRepository>,
}

impl QueryCoordinator {
    #[must_use]
    pub const fn new(orders: Arc<OrderRepository>, errors: Arc<ErrorRepository>) -> Self {
        Self { orders, errors }
    }

    pub fn list_orders(&self, raw: &RawQuery) -> Result<Page<OrderEvent>, QueryError> {
        let (filters, pagination, sort) = parse_order_query(raw)?;
        Ok(self.orders.find_many(&filters, pagination, &sort))
    }

    #[must_use]
    pub fn order_by_id(&self, id: uuid::Uuid) -> Option<OrderEvent> {
        self.orders.find_by_id(id)
    }

    #[must_use]
    pub fn order_by_external_id(&self, partner: PartnerId, external_id: &str) -> Option<OrderEvent> {
        self.orders.find_by_external_id(partner, external_id)
    }

    pub fn order_statistics(&self, raw: &RawQuery) -> Result<OrderStatistics, QueryError> {
        let (filters, _, _) = parse_order_query(raw)?;
        Ok(self.orders.get_statistics(&filters))
    }

    pub fn list_errors(&self, raw: &RawQuery) -> Result<Page<ErrorEvent>, QueryError> {
        let (filters, pagination) = parse_error_query(raw)?;
        Ok(self.errors.find_many(&filters, pagination))
    }

    #[must_use]
    pub fn error_by_id(&self, id: uuid::Uuid) -> Option<ErrorEvent> {
        self.errors.find_by_id(id)
    }

    pub fn error_statistics(&self, raw: &RawQuery) -> Result<ErrorStatistics, QueryError> {
        let (filters, _) = parse_error_query(raw)?;
        Ok(self.errors.get_statistics(&filters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> RawQuery {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn accepts_short_and_canonical_partner_forms() {
        let (filters, _, _) = parse_order_query(&query(&[("partnerId", "A")])).unwrap();
        assert_eq!(filters.partner_id, Some(PartnerId::PartnerA));

        let (filters, _, _) = parse_order_query(&query(&[("partnerId", "PARTNER_B")])).unwrap();
        assert_eq!(filters.partner_id, Some(PartnerId::PartnerB));
    }

    #[test]
    fn unknown_partner_is_rejected() {
        let err = parse_order_query(&query(&[("partnerId", "PARTNER_C")])).unwrap_err();
        assert_eq!(err.field, "partnerId");
    }

    #[test]
    fn page_size_is_clamped_to_the_ceiling() {
        let (_, pagination, _) = parse_order_query(&query(&[("pageSize", "500")])).unwrap();
        assert_eq!(pagination.page_size, 100);
    }

    #[test]
    fn default_sort_is_processed_at_desc() {
        let (_, _, sort) = parse_order_query(&query(&[])).unwrap();
        assert_eq!(sort.field, SortField::ProcessedAt);
        assert_eq!(sort.order, SortOrder::Desc);
    }

    #[test]
    fn unknown_sort_field_is_rejected() {
        let err = parse_order_query(&query(&[("sortBy", "bogus")])).unwrap_err();
        assert_eq!(err.field, "sortBy");
    }
}
