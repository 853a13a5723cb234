//! Query composition over the kind-specific read views.
//!
//! # Responsibility
//! - Build the base join for a resource kind.
//! - Append team scoping, accumulated predicates, order and pagination.
//! - Run the composed query through a `RecordStore` and shape the result.
//!
//! # Invariants
//! - `<table>.team = ?` is always the first predicate.
//! - Base joins select single-entity columns under `SELECT DISTINCT`; child
//!   tables are pre-aggregated or used for filtering only, so tags,
//!   attachments and comments never multiply rows.
//! - Only structural SQL is composed here; every value is a bound parameter.

use crate::error::{EntityError, EntityResult};
use crate::model::entity::{EntityKind, FieldValue, Record, TeamId};
use crate::query::filter::{FilterField, FilterSet, OrderField, Predicate, PredicateOp};
use log::{debug, error, warn};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::time::Instant;

const EXPERIMENTS_VIEW_SQL: &str = "SELECT DISTINCT
    experiments.*,
    status.name AS category,
    status.color AS color,
    uploads.attachment IS NOT NULL AS has_attachment,
    comments.last_comment AS last_comment
FROM experiments
LEFT JOIN status ON (status.id = experiments.status)
LEFT JOIN experiments_tags ON (experiments_tags.item_id = experiments.id)
LEFT JOIN (
    SELECT DISTINCT item_id AS attachment
    FROM uploads
    WHERE type = 'experiments'
) AS uploads ON (uploads.attachment = experiments.id)
LEFT JOIN (
    SELECT exp_id, MAX(datetime) AS last_comment
    FROM experiments_comments
    GROUP BY exp_id
) AS comments ON (comments.exp_id = experiments.id)
WHERE experiments.team = ?";

const ITEMS_VIEW_SQL: &str = "SELECT DISTINCT
    items.*,
    items_types.name AS category,
    items_types.color AS color,
    users.firstname || ' ' || users.lastname AS fullname,
    uploads.attachment IS NOT NULL AS has_attachment
FROM items
LEFT JOIN items_types ON (items_types.id = items.type)
LEFT JOIN users ON (users.userid = items.userid)
LEFT JOIN items_tags ON (items_tags.item_id = items.id)
LEFT JOIN (
    SELECT DISTINCT item_id AS attachment
    FROM uploads
    WHERE type = 'items'
) AS uploads ON (uploads.attachment = items.id)
WHERE items.team = ?";

/// Fully composed SQL plus its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedQuery {
    pub kind: EntityKind,
    pub sql: String,
    pub params: Vec<Value>,
}

/// Caller-facing result shape of a read.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadResult {
    /// Exactly one row matched.
    Single(Record),
    /// Zero or several rows matched.
    Many(Vec<Record>),
}

impl ReadResult {
    /// Collapses a one-row sequence into `Single`.
    pub fn from_rows(mut rows: Vec<Record>) -> Self {
        if rows.len() == 1 {
            if let Some(record) = rows.pop() {
                return Self::Single(record);
            }
        }
        Self::Many(rows)
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Many(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_records(self) -> Vec<Record> {
        match self {
            Self::Single(record) => vec![record],
            Self::Many(rows) => rows,
        }
    }
}

/// Persistence collaborator: runs a composed query and returns rows by
/// column name.
pub trait RecordStore {
    fn fetch_records(&self, query: &ComposedQuery) -> EntityResult<Vec<Record>>;
}

/// SQLite-backed record store.
pub struct SqliteRecordStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRecordStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl RecordStore for SqliteRecordStore<'_> {
    fn fetch_records(&self, query: &ComposedQuery) -> EntityResult<Vec<Record>> {
        let mut stmt = self.conn.prepare(&query.sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut rows = stmt.query(params_from_iter(query.params.iter()))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Record::new();
            for (index, column) in columns.iter().enumerate() {
                record.insert(column.as_str(), FieldValue::from(row.get_ref(index)?));
            }
            records.push(record);
        }
        Ok(records)
    }
}

/// Composes the read query for `kind`, scoped to `team`.
///
/// # Errors
/// - `InvalidArgument` when a set filter or the order has no column in this
///   kind's view (bookable on experiments, last comment on items).
pub fn compose(kind: EntityKind, filters: &FilterSet, team: TeamId) -> EntityResult<ComposedQuery> {
    let mut sql = String::from(base_sql(kind));
    let mut params = vec![Value::Integer(team)];

    for predicate in filters.predicates() {
        push_predicate(kind, predicate, &mut sql, &mut params)?;
    }

    let order_column = order_column(kind, filters.order()).ok_or_else(|| {
        EntityError::InvalidArgument(format!(
            "order {:?} is not available for {kind}",
            filters.order()
        ))
    })?;
    let direction = filters.sort().as_sql();
    sql.push_str(&format!(" ORDER BY {order_column} {direction}"));
    if filters.order() != OrderField::Id {
        sql.push_str(&format!(", {}.id {direction}", kind.table()));
    }

    match filters.limit() {
        Some(limit) => {
            sql.push_str(" LIMIT ?");
            params.push(Value::Integer(i64::from(limit)));
            if filters.offset() > 0 {
                sql.push_str(" OFFSET ?");
                params.push(Value::Integer(i64::from(filters.offset())));
            }
        }
        None if filters.offset() > 0 => {
            sql.push_str(" LIMIT -1 OFFSET ?");
            params.push(Value::Integer(i64::from(filters.offset())));
        }
        None => {}
    }

    Ok(ComposedQuery { kind, sql, params })
}

/// Runs the composed query and returns the raw row sequence.
pub fn execute<S: RecordStore + ?Sized>(
    store: &S,
    kind: EntityKind,
    filters: &FilterSet,
    team: TeamId,
) -> EntityResult<Vec<Record>> {
    let query = compose(kind, filters, team)?;
    let started_at = Instant::now();
    match store.fetch_records(&query) {
        Ok(records) => {
            debug!(
                "event=entity_query module=query status=ok kind={} filters={} rows={} duration_ms={}",
                kind,
                filters.predicates().count(),
                records.len(),
                started_at.elapsed().as_millis()
            );
            Ok(records)
        }
        Err(err) => {
            error!(
                "event=entity_query module=query status=error kind={} duration_ms={} error={}",
                kind,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

/// Runs the composed query and collapses a single-row result.
pub fn read<S: RecordStore + ?Sized>(
    store: &S,
    kind: EntityKind,
    filters: &FilterSet,
    team: TeamId,
) -> EntityResult<ReadResult> {
    execute(store, kind, filters, team).map(ReadResult::from_rows)
}

/// [`execute`] for a resource type given by name.
///
/// # Errors
/// - `UnsupportedKind` when `kind_name` is neither experiments nor items.
pub fn execute_named<S: RecordStore + ?Sized>(
    store: &S,
    kind_name: &str,
    filters: &FilterSet,
    team: TeamId,
) -> EntityResult<Vec<Record>> {
    let kind = kind_name.parse::<EntityKind>().map_err(|err| {
        warn!("event=entity_query module=query status=rejected error_code=unsupported_kind");
        err
    })?;
    execute(store, kind, filters, team)
}

fn base_sql(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Experiments => EXPERIMENTS_VIEW_SQL,
        EntityKind::Items => ITEMS_VIEW_SQL,
    }
}

fn filter_columns(kind: EntityKind, field: FilterField) -> Option<&'static [&'static str]> {
    let columns: &'static [&'static str] = match (kind, field) {
        (EntityKind::Experiments, FilterField::Id) => &["experiments.id"],
        (EntityKind::Experiments, FilterField::Owner) => &["experiments.userid"],
        (EntityKind::Experiments, FilterField::Title) => &["experiments.title"],
        (EntityKind::Experiments, FilterField::Date) => &["experiments.date"],
        (EntityKind::Experiments, FilterField::Body) => &["experiments.body"],
        (EntityKind::Experiments, FilterField::Bookable) => return None,
        (EntityKind::Experiments, FilterField::Category) => &["experiments.status"],
        (EntityKind::Experiments, FilterField::Tag) => &["experiments_tags.tag"],
        (EntityKind::Experiments, FilterField::Query) => &[
            "experiments.title",
            "experiments.body",
            "experiments.date",
        ],
        (EntityKind::Items, FilterField::Id) => &["items.id"],
        (EntityKind::Items, FilterField::Owner) => &["items.userid"],
        (EntityKind::Items, FilterField::Title) => &["items.title"],
        (EntityKind::Items, FilterField::Date) => &["items.date"],
        (EntityKind::Items, FilterField::Body) => &["items.body"],
        (EntityKind::Items, FilterField::Bookable) => &["items.bookable"],
        (EntityKind::Items, FilterField::Category) => &["items.type"],
        (EntityKind::Items, FilterField::Tag) => &["items_tags.tag"],
        (EntityKind::Items, FilterField::Query) => &["items.title", "items.body", "items.date"],
    };
    Some(columns)
}

fn order_column(kind: EntityKind, order: OrderField) -> Option<&'static str> {
    let column = match (kind, order) {
        (EntityKind::Experiments, OrderField::Id) => "experiments.id",
        (EntityKind::Experiments, OrderField::Date) => "experiments.date",
        (EntityKind::Experiments, OrderField::Title) => "experiments.title",
        (EntityKind::Experiments, OrderField::Owner) => "experiments.userid",
        (EntityKind::Experiments, OrderField::LastComment) => "last_comment",
        (EntityKind::Items, OrderField::Id) => "items.id",
        (EntityKind::Items, OrderField::Date) => "items.date",
        (EntityKind::Items, OrderField::Title) => "items.title",
        (EntityKind::Items, OrderField::Owner) => "items.userid",
        (EntityKind::Items, OrderField::LastComment) => return None,
        (_, OrderField::Category) => "category",
    };
    Some(column)
}

fn push_predicate(
    kind: EntityKind,
    predicate: &Predicate,
    sql: &mut String,
    params: &mut Vec<Value>,
) -> EntityResult<()> {
    let columns = filter_columns(kind, predicate.field).ok_or_else(|| {
        EntityError::InvalidArgument(format!(
            "{} filter is not available for {kind}",
            predicate.field.as_str()
        ))
    })?;
    let expected_params = match predicate.op {
        PredicateOp::Between => 2,
        _ => 1,
    };
    if predicate.params.len() != expected_params {
        return Err(EntityError::InvalidArgument(format!(
            "{} filter expects {expected_params} value(s), got {}",
            predicate.field.as_str(),
            predicate.params.len()
        )));
    }

    let column = columns[0];
    let fragment = match predicate.op {
        PredicateOp::Eq => format!("{column} = ?"),
        PredicateOp::Like => format!("{column} LIKE ? ESCAPE '\\'"),
        PredicateOp::AtLeast => format!("{column} >= ?"),
        PredicateOp::AtMost => format!("{column} <= ?"),
        PredicateOp::Between => format!("{column} BETWEEN ? AND ?"),
        PredicateOp::LikeAny => {
            let alternatives: Vec<String> = columns
                .iter()
                .map(|column| format!("{column} LIKE ? ESCAPE '\\'"))
                .collect();
            format!("({})", alternatives.join(" OR "))
        }
    };
    sql.push_str(" AND ");
    sql.push_str(&fragment);

    if predicate.op == PredicateOp::LikeAny {
        for _ in columns {
            params.push(predicate.params[0].clone());
        }
    } else {
        params.extend(predicate.params.iter().cloned());
    }
    Ok(())
}
