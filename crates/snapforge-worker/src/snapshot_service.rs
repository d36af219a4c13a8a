//! Per-phase data load: build the warehouse query, drive it to completion,
//! and turn each result row into a [`SnapshotRow`].
//!
//! The warehouse's JSON encoding of a row is loosely typed: a numeric
//! column can arrive as a JSON number or as a string holding the same
//! digits depending on which internal table produced it, `deleted` is
//! always the literal string `"true"`/`"false"` rather than a JSON
//! boolean, and date columns are `YYYYMMDD` integers (also sometimes
//! string-encoded). This module absorbs that inconsistency once, at the
//! boundary, so every downstream consumer works with a fully typed row.

use std::future::Future;

use serde_json::{Map, Value};

use snapforge_common::types::{SnapshotRow, SnapshotRowKind, TenantContext};
use snapforge_common::{Result, SnapError};

use crate::remote_query::RemoteQueryClient;

/// A refresh that has never synced before anchors on this date, which is
/// always before any row's real `changeTs` and therefore loads everything.
pub const FULL_REFRESH_ANCHOR: i64 = 19_000_101;

/// Names of the fixed identity columns a raw row carries, before loose
/// typing normalisation. Everything else on the row is carried through to
/// [`SnapshotRow::extra`] unchanged.
#[derive(Debug, Clone)]
pub struct RowSchema {
    pub company_field: &'static str,
    pub facility_field: &'static str,
    pub change_ts_field: &'static str,
    pub deleted_field: &'static str,
}

impl RowSchema {
    /// The field names the warehouse uses uniformly across all four
    /// snapshot tables.
    pub const STANDARD: RowSchema = RowSchema {
        company_field: "company",
        facility_field: "facility",
        change_ts_field: "changeTs",
        deleted_field: "deleted",
    };
}

/// Parse one warehouse row into a [`SnapshotRow`] of the given kind.
pub fn parse_row(kind: SnapshotRowKind, schema: &RowSchema, raw: &Value) -> Result<SnapshotRow> {
    let obj = raw
        .as_object()
        .ok_or_else(|| SnapError::Parse("warehouse row was not a JSON object".to_string()))?;

    let company = extract_string_loose(obj, schema.company_field)?;
    let facility = extract_string_loose(obj, schema.facility_field)?;
    let change_ts = extract_i64_loose(obj, schema.change_ts_field)?;
    let deleted = extract_bool_loose(obj, schema.deleted_field)?;

    let mut extra = Map::new();
    for (key, value) in obj {
        if key == schema.company_field
            || key == schema.facility_field
            || key == schema.change_ts_field
            || key == schema.deleted_field
        {
            continue;
        }
        extra.insert(key.clone(), value.clone());
    }

    Ok(SnapshotRow {
        kind,
        company,
        facility,
        change_ts,
        deleted,
        extra: Value::Object(extra),
    })
}

/// Parse every row in a page, failing the whole page on the first
/// malformed row — a page is a single warehouse response and is expected
/// to be internally consistent.
pub fn parse_page(
    kind: SnapshotRowKind,
    schema: &RowSchema,
    rows: &[Value],
) -> Result<Vec<SnapshotRow>> {
    rows.iter().map(|row| parse_row(kind, schema, row)).collect()
}

fn extract_string_loose(obj: &Map<String, Value>, field: &str) -> Result<String> {
    match obj.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Null) | None => Err(SnapError::Parse(format!("missing field: {field}"))),
        Some(other) => Err(SnapError::Parse(format!(
            "field {field} had unexpected shape: {other}"
        ))),
    }
}

fn extract_i64_loose(obj: &Map<String, Value>, field: &str) -> Result<i64> {
    match obj.get(field) {
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| SnapError::Parse(format!("field {field} was not an integer"))),
        Some(Value::String(s)) => s
            .parse::<i64>()
            .map_err(|_| SnapError::Parse(format!("field {field} was not a numeric string"))),
        Some(Value::Null) | None => Err(SnapError::Parse(format!("missing field: {field}"))),
        Some(other) => Err(SnapError::Parse(format!(
            "field {field} had unexpected shape: {other}"
        ))),
    }
}

fn extract_bool_loose(obj: &Map<String, Value>, field: &str) -> Result<bool> {
    match obj.get(field) {
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) => match s.to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(SnapError::Parse(format!(
                "field {field} had unexpected boolean string: {other}"
            ))),
        },
        Some(Value::Null) | None => Err(SnapError::Parse(format!("missing field: {field}"))),
        Some(other) => Err(SnapError::Parse(format!(
            "field {field} had unexpected shape: {other}"
        ))),
    }
}

/// Natural-key column name each snapshot kind's SQL projects its identity
/// into; callers use this when upserting a parsed row.
pub fn natural_key_field(kind: SnapshotRowKind) -> &'static str {
    match kind {
        SnapshotRowKind::PlannedOrder | SnapshotRowKind::ManufacturingOrder => "productionOrder",
        SnapshotRowKind::CustomerOrderLine => "orderLineKey",
        SnapshotRowKind::PreAllocation => "preAllocationKey",
    }
}

/// Scope and anchor every phase query is built from: which tenant to load,
/// and how far back to look. A full refresh anchors on
/// [`FULL_REFRESH_ANCHOR`]; an incremental one would pass the refresh job's
/// last successful `changeTs` watermark instead (not currently surfaced by
/// the coordinator, which always does a truncate-then-full-load, but the
/// query builder supports it since the warehouse schema does).
#[derive(Debug, Clone)]
pub struct PhaseLoadParams {
    pub tenant: TenantContext,
    pub last_sync_anchor: i64,
}

impl PhaseLoadParams {
    pub fn full_refresh(tenant: TenantContext) -> Self {
        Self {
            tenant,
            last_sync_anchor: FULL_REFRESH_ANCHOR,
        }
    }
}

/// Drives the warehouse side of one refresh phase: builds the phase's SQL,
/// submits and pages it through the [`RemoteQueryClient`], and parses each
/// page into typed rows for the caller to persist.
#[derive(Clone)]
pub struct SnapshotService {
    remote: RemoteQueryClient,
}

impl SnapshotService {
    pub fn new(remote: RemoteQueryClient) -> Self {
        Self { remote }
    }

    /// Planned (not yet released) manufacturing orders, firmed only.
    pub async fn load_mops<F, Fut>(&self, params: &PhaseLoadParams, on_rows: F) -> Result<i64>
    where
        F: FnMut(Vec<SnapshotRow>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.load(SnapshotRowKind::PlannedOrder, &build_mops_sql(params), on_rows)
            .await
    }

    /// Released-or-earlier manufacturing orders.
    pub async fn load_mos<F, Fut>(&self, params: &PhaseLoadParams, on_rows: F) -> Result<i64>
    where
        F: FnMut(Vec<SnapshotRow>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.load(
            SnapshotRowKind::ManufacturingOrder,
            &build_mos_sql(params),
            on_rows,
        )
        .await
    }

    /// Reserved customer-order lines, plus the pre-allocations that resolve
    /// their links back to supply orders. Two warehouse queries make up one
    /// `cos` phase; their counts are summed for the phase total.
    pub async fn load_cos<F, Fut>(&self, params: &PhaseLoadParams, mut on_rows: F) -> Result<i64>
    where
        F: FnMut(Vec<SnapshotRow>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let lines = self
            .load(
                SnapshotRowKind::CustomerOrderLine,
                &build_cos_lines_sql(params),
                &mut on_rows,
            )
            .await?;

        let pre_allocations = self
            .load(
                SnapshotRowKind::PreAllocation,
                &build_pre_allocations_sql(params),
                &mut on_rows,
            )
            .await?;

        Ok(lines + pre_allocations)
    }

    async fn load<F, Fut>(&self, kind: SnapshotRowKind, sql: &str, mut on_rows: F) -> Result<i64>
    where
        F: FnMut(Vec<SnapshotRow>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.remote
            .execute_with_pagination(sql, |page| {
                let parsed = parse_page(kind, &RowSchema::STANDARD, &page);
                let mut on_rows = &mut on_rows;
                async move { on_rows(parsed?).await }
            })
            .await
    }
}

fn build_mops_sql(params: &PhaseLoadParams) -> String {
    format!(
        r#"SELECT company, facility, changeTs, deleted, productionOrder,
                  poType, itemNumber, orderedQty, status
           FROM planned_orders
           WHERE company = '{company}' AND facility = '{facility}'
             AND changeTs >= {anchor}
             AND status = 'firmed'"#,
        company = sql_literal(&params.tenant.company),
        facility = sql_literal(&params.tenant.facility),
        anchor = params.last_sync_anchor,
    )
}

fn build_mos_sql(params: &PhaseLoadParams) -> String {
    format!(
        r#"SELECT company, facility, changeTs, deleted, productionOrder,
                  itemNumber, orderedQty, status
           FROM manufacturing_orders
           WHERE company = '{company}' AND facility = '{facility}'
             AND changeTs >= {anchor}
             AND status <= 'released'"#,
        company = sql_literal(&params.tenant.company),
        facility = sql_literal(&params.tenant.facility),
        anchor = params.last_sync_anchor,
    )
}

fn build_cos_lines_sql(params: &PhaseLoadParams) -> String {
    format!(
        r#"SELECT company, facility, changeTs, deleted, orderLineKey,
                  orderNumber, lineNumber, itemNumber, orderedQty
           FROM customer_order_lines
           WHERE company = '{company}' AND facility = '{facility}'
             AND changeTs >= {anchor}
             AND status = 'reserved'"#,
        company = sql_literal(&params.tenant.company),
        facility = sql_literal(&params.tenant.facility),
        anchor = params.last_sync_anchor,
    )
}

/// Resolves customer-order links for supply orders both directly and one
/// hop through a distribution or purchase order.
fn build_pre_allocations_sql(params: &PhaseLoadParams) -> String {
    format!(
        r#"SELECT pa.company, pa.facility, pa.changeTs, pa.deleted, pa.preAllocationKey,
                  pa.supplyOrder, pa.demandOrder,
                  COALESCE(hop.demandOrder, pa.demandOrder) AS resolvedDemandOrder
           FROM pre_allocations pa
           LEFT JOIN pre_allocations hop
             ON hop.supplyOrder = pa.demandOrder
            AND hop.company = pa.company
            AND hop.facility = pa.facility
           WHERE pa.company = '{company}' AND pa.facility = '{facility}'
             AND pa.changeTs >= {anchor}"#,
        company = sql_literal(&params.tenant.company),
        facility = sql_literal(&params.tenant.facility),
        anchor = params.last_sync_anchor,
    )
}

/// Escapes single quotes in a tenant identifier before splicing it into
/// warehouse SQL text. Tenant values come from configuration, not end-user
/// input, but the warehouse protocol has no bind-parameter mechanism of its
/// own, so the client is the only place this can be done.
fn sql_literal(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_row_with_string_typed_numeric_columns() {
        let raw = serde_json::json!({
            "company": "1000",
            "facility": "100",
            "changeTs": "20260115",
            "deleted": "false",
            "productionOrder": "PO-1",
        });

        let row = parse_row(SnapshotRowKind::ManufacturingOrder, &RowSchema::STANDARD, &raw)
            .unwrap();

        assert_eq!(row.company, "1000");
        assert_eq!(row.facility, "100");
        assert_eq!(row.change_ts, 20260115);
        assert!(!row.deleted);
        assert_eq!(row.extra["productionOrder"], "PO-1");
        assert!(row.extra.get("company").is_none());
    }

    #[test]
    fn parses_row_with_native_typed_numeric_columns() {
        let raw = serde_json::json!({
            "company": 1000,
            "facility": 100,
            "changeTs": 20260115,
            "deleted": true,
        });

        let row =
            parse_row(SnapshotRowKind::PlannedOrder, &RowSchema::STANDARD, &raw).unwrap();

        assert_eq!(row.company, "1000");
        assert_eq!(row.change_ts, 20260115);
        assert!(row.deleted);
    }

    #[test]
    fn rejects_row_missing_a_required_field() {
        let raw = serde_json::json!({ "company": "1000" });
        let result = parse_row(SnapshotRowKind::CustomerOrderLine, &RowSchema::STANDARD, &raw);
        assert!(result.is_err());
    }

    #[test]
    fn parse_page_stops_at_first_bad_row() {
        let rows = vec![
            serde_json::json!({
                "company": "1000", "facility": "100", "changeTs": "20260101", "deleted": "false"
            }),
            serde_json::json!({ "company": "1000" }),
        ];
        let result = parse_page(SnapshotRowKind::PreAllocation, &RowSchema::STANDARD, &rows);
        assert!(result.is_err());
    }

    fn tenant() -> TenantContext {
        TenantContext {
            company: "1000".to_string(),
            facility: "100".to_string(),
        }
    }

    #[test]
    fn query_builders_scope_to_tenant_and_escape_quotes() {
        let params = PhaseLoadParams::full_refresh(TenantContext {
            company: "O'Brien".to_string(),
            facility: "100".to_string(),
        });

        let sql = build_mops_sql(&params);
        assert!(sql.contains("O''Brien"));
        assert!(sql.contains("status = 'firmed'"));

        let sql = build_mos_sql(&params);
        assert!(sql.contains("status <= 'released'"));

        let sql = build_cos_lines_sql(&params);
        assert!(sql.contains("status = 'reserved'"));
    }

    #[tokio::test]
    async fn load_mops_submits_parses_and_returns_row_count() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/jobs/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"queryId": "q-1"})),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/jobs/q-1/status/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "FINISHED",
                "recordCount": 1,
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/jobs/q-1/result/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                "company": "1000", "facility": "100", "changeTs": 20260101,
                "deleted": "false", "productionOrder": "MOP-1",
            }])))
            .mount(&server)
            .await;

        let remote = RemoteQueryClient::new(crate::remote_query::RemoteQueryClientConfig {
            base_url: server.uri(),
            bearer_token: "token".to_string(),
            http_timeout: std::time::Duration::from_secs(5),
            page_size: 100,
            poll_interval: std::time::Duration::from_millis(1),
        })
        .unwrap();

        let service = SnapshotService::new(remote);
        let params = PhaseLoadParams::full_refresh(tenant());

        let mut rows = Vec::new();
        let count = service
            .load_mops(&params, |page| {
                rows.extend(page);
                async move { Ok(()) }
            })
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind, SnapshotRowKind::PlannedOrder);
        assert_eq!(rows[0].extra["productionOrder"], "MOP-1");
    }
}
