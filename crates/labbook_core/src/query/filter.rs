//! Filter accumulator for record reads.
//!
//! # Responsibility
//! - Hold one optional predicate descriptor per filter field.
//! - Hold order, sort direction and pagination state.
//!
//! # Invariants
//! - Predicates are emitted in `FilterField::CONCAT_ORDER`, whatever the
//!   order their setters were called in.
//! - A set filter stays set for the lifetime of the accumulator.
//! - Order and sort are whitelisted values; no caller text reaches SQL.

use crate::error::{EntityError, EntityResult};
use crate::model::entity::{check_entity_id, EntityId, UserId};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;

/// Longest accepted text filter input, in chars.
pub const MAX_FILTER_TEXT_CHARS: usize = 255;
pub const DEFAULT_ORDER: OrderField = OrderField::Id;
pub const DEFAULT_SORT: SortDirection = SortDirection::Desc;

const FILTER_SLOTS: usize = 9;

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})$").expect("valid date regex"));

/// Filterable field of a record view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterField {
    Id,
    Owner,
    Title,
    Date,
    Body,
    Bookable,
    Category,
    Tag,
    /// Free-text search across title, body and date.
    Query,
}

impl FilterField {
    /// Order in which set predicates are concatenated into the final query.
    pub const CONCAT_ORDER: [FilterField; FILTER_SLOTS] = [
        FilterField::Id,
        FilterField::Owner,
        FilterField::Title,
        FilterField::Date,
        FilterField::Body,
        FilterField::Bookable,
        FilterField::Category,
        FilterField::Tag,
        FilterField::Query,
    ];

    fn slot(self) -> usize {
        Self::CONCAT_ORDER
            .iter()
            .position(|field| *field == self)
            .unwrap_or_default()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Owner => "owner",
            Self::Title => "title",
            Self::Date => "date",
            Self::Body => "body",
            Self::Bookable => "bookable",
            Self::Category => "category",
            Self::Tag => "tag",
            Self::Query => "query",
        }
    }
}

/// Comparison applied by a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateOp {
    /// `column = ?`
    Eq,
    /// `column LIKE ? ESCAPE '\'`
    Like,
    /// `column >= ?`
    AtLeast,
    /// `column <= ?`
    AtMost,
    /// `column BETWEEN ? AND ?`
    Between,
    /// `(c1 LIKE ? ESCAPE '\' OR c2 LIKE ? ESCAPE '\' ...)`, one shared pattern.
    LikeAny,
}

/// Structured predicate: which field, how it compares, and the bound values.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: FilterField,
    pub op: PredicateOp,
    pub params: Vec<Value>,
}

impl Predicate {
    fn new(field: FilterField, op: PredicateOp, params: Vec<Value>) -> Self {
        Self { field, op, params }
    }
}

/// Date constraint on `YYYYMMDD` dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFilter {
    On(i64),
    From(i64),
    Until(i64),
    Between(i64, i64),
}

impl DateFilter {
    /// Parses one `YYYYMMDD` date that exists on the calendar.
    pub fn parse_date(raw: &str) -> EntityResult<i64> {
        let trimmed = raw.trim();
        let caps = DATE_RE.captures(trimmed).ok_or_else(|| {
            EntityError::InvalidArgument(format!("date must be YYYYMMDD, got `{trimmed}`"))
        })?;
        let year: u32 = caps[1].parse().unwrap_or_default();
        let month: u32 = caps[2].parse().unwrap_or_default();
        let day: u32 = caps[3].parse().unwrap_or_default();
        if day == 0 || day > days_in_month(year, month) {
            return Err(EntityError::InvalidArgument(format!(
                "date is out of range: `{trimmed}`"
            )));
        }
        trimmed
            .parse()
            .map_err(|_| EntityError::InvalidArgument(format!("invalid date `{trimmed}`")))
    }

    fn into_predicate(self) -> EntityResult<Predicate> {
        let predicate = match self {
            Self::On(date) => Predicate::new(
                FilterField::Date,
                PredicateOp::Eq,
                vec![Value::Integer(check_date(date)?)],
            ),
            Self::From(date) => Predicate::new(
                FilterField::Date,
                PredicateOp::AtLeast,
                vec![Value::Integer(check_date(date)?)],
            ),
            Self::Until(date) => Predicate::new(
                FilterField::Date,
                PredicateOp::AtMost,
                vec![Value::Integer(check_date(date)?)],
            ),
            Self::Between(from, to) => {
                let from = check_date(from)?;
                let to = check_date(to)?;
                if from > to {
                    return Err(EntityError::InvalidArgument(format!(
                        "date range start {from} is after end {to}"
                    )));
                }
                Predicate::new(
                    FilterField::Date,
                    PredicateOp::Between,
                    vec![Value::Integer(from), Value::Integer(to)],
                )
            }
        };
        Ok(predicate)
    }
}

/// Zero for months outside 1..=12.
fn days_in_month(year: u32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if year % 4 == 0 && (year % 100 != 0 || year % 400 == 0) => 29,
        2 => 28,
        _ => 0,
    }
}

fn check_date(date: i64) -> EntityResult<i64> {
    DateFilter::parse_date(&date.to_string())
}

/// Whitelisted sort column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderField {
    Id,
    Date,
    Title,
    Category,
    Owner,
    /// Latest comment timestamp. Experiments only.
    LastComment,
}

impl OrderField {
    /// Parses a caller-supplied order name.
    pub fn parse(raw: &str) -> EntityResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "id" => Ok(Self::Id),
            "date" => Ok(Self::Date),
            "title" => Ok(Self::Title),
            "cat" | "category" | "status" => Ok(Self::Category),
            "owner" | "userid" => Ok(Self::Owner),
            "comment" | "lastcomment" => Ok(Self::LastComment),
            other => Err(EntityError::InvalidArgument(format!(
                "unsupported order `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(raw: &str) -> EntityResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(EntityError::InvalidArgument(format!(
                "unsupported sort direction `{other}`"
            ))),
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Accumulated filters plus order/sort/pagination state for one read.
///
/// There is no way to unset a filter; build a new `FilterSet` instead.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSet {
    slots: [Option<Predicate>; FILTER_SLOTS],
    order: OrderField,
    sort: SortDirection,
    limit: u32,
    offset: u32,
}

impl Default for FilterSet {
    fn default() -> Self {
        Self {
            slots: Default::default(),
            order: DEFAULT_ORDER,
            sort: DEFAULT_SORT,
            limit: 0,
            offset: 0,
        }
    }
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulator holding only an id filter.
    pub fn by_id(id: EntityId) -> EntityResult<Self> {
        let mut filters = Self::new();
        filters.set_id_filter(id)?;
        Ok(filters)
    }

    pub fn set_id_filter(&mut self, id: EntityId) -> EntityResult<()> {
        let id = check_entity_id(id)?;
        self.put(Predicate::new(
            FilterField::Id,
            PredicateOp::Eq,
            vec![Value::Integer(id)],
        ));
        Ok(())
    }

    /// Restricts rows to those owned by `user_id`.
    pub fn set_owner_filter(&mut self, user_id: UserId) -> EntityResult<()> {
        let user_id = check_entity_id(user_id)?;
        self.put(Predicate::new(
            FilterField::Owner,
            PredicateOp::Eq,
            vec![Value::Integer(user_id)],
        ));
        Ok(())
    }

    /// Substring match on the title.
    pub fn set_title_filter(&mut self, title: &str) -> EntityResult<()> {
        let pattern = like_pattern(&normalize_filter_text(FilterField::Title, title)?);
        self.put(Predicate::new(
            FilterField::Title,
            PredicateOp::Like,
            vec![Value::Text(pattern)],
        ));
        Ok(())
    }

    pub fn set_date_filter(&mut self, date: DateFilter) -> EntityResult<()> {
        self.put(date.into_predicate()?);
        Ok(())
    }

    /// Substring match on the body.
    pub fn set_body_filter(&mut self, body: &str) -> EntityResult<()> {
        let pattern = like_pattern(&normalize_filter_text(FilterField::Body, body)?);
        self.put(Predicate::new(
            FilterField::Body,
            PredicateOp::Like,
            vec![Value::Text(pattern)],
        ));
        Ok(())
    }

    /// Only bookable rows. Items only; composing it for experiments fails.
    pub fn set_bookable_filter(&mut self) {
        self.put(Predicate::new(
            FilterField::Bookable,
            PredicateOp::Eq,
            vec![Value::Integer(1)],
        ));
    }

    /// Status (experiments) or item type (items) id.
    pub fn set_category_filter(&mut self, category_id: i64) -> EntityResult<()> {
        let category_id = check_entity_id(category_id)?;
        self.put(Predicate::new(
            FilterField::Category,
            PredicateOp::Eq,
            vec![Value::Integer(category_id)],
        ));
        Ok(())
    }

    /// Exact tag match.
    pub fn set_tag_filter(&mut self, tag: &str) -> EntityResult<()> {
        let tag = normalize_filter_text(FilterField::Tag, tag)?;
        self.put(Predicate::new(
            FilterField::Tag,
            PredicateOp::Eq,
            vec![Value::Text(tag)],
        ));
        Ok(())
    }

    /// Free-text match across title, body and date.
    pub fn set_query_filter(&mut self, query: &str) -> EntityResult<()> {
        let pattern = like_pattern(&normalize_filter_text(FilterField::Query, query)?);
        self.put(Predicate::new(
            FilterField::Query,
            PredicateOp::LikeAny,
            vec![Value::Text(pattern)],
        ));
        Ok(())
    }

    /// Sets the row limit. Negative values coerce to 0, and 0 means unlimited.
    pub fn set_limit(&mut self, limit: i64) {
        self.limit = u32::try_from(limit.max(0)).unwrap_or(u32::MAX);
    }

    /// Parses and sets the row limit from caller input.
    pub fn set_limit_str(&mut self, raw: &str) -> EntityResult<()> {
        let trimmed = raw.trim();
        let limit = trimmed.parse::<i64>().map_err(|_| {
            EntityError::InvalidArgument(format!("limit must be an integer, got `{trimmed}`"))
        })?;
        self.set_limit(limit);
        Ok(())
    }

    /// Rows to skip before the first returned row.
    pub fn set_offset(&mut self, offset: u32) {
        self.offset = offset;
    }

    pub fn set_order(&mut self, order: OrderField) {
        self.order = order;
    }

    pub fn set_order_name(&mut self, raw: &str) -> EntityResult<()> {
        self.order = OrderField::parse(raw)?;
        Ok(())
    }

    pub fn set_sort(&mut self, sort: SortDirection) {
        self.sort = sort;
    }

    pub fn set_sort_name(&mut self, raw: &str) -> EntityResult<()> {
        self.sort = SortDirection::parse(raw)?;
        Ok(())
    }

    /// Set predicates, in concatenation order.
    pub fn predicates(&self) -> impl Iterator<Item = &Predicate> {
        self.slots.iter().flatten()
    }

    pub fn predicate(&self, field: FilterField) -> Option<&Predicate> {
        self.slots[field.slot()].as_ref()
    }

    pub fn has_filters(&self) -> bool {
        self.slots.iter().any(Option::is_some)
    }

    pub fn order(&self) -> OrderField {
        self.order
    }

    pub fn sort(&self) -> SortDirection {
        self.sort
    }

    /// Effective limit; `None` means unlimited.
    pub fn limit(&self) -> Option<u32> {
        (self.limit > 0).then_some(self.limit)
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    fn put(&mut self, predicate: Predicate) {
        let slot = predicate.field.slot();
        self.slots[slot] = Some(predicate);
    }
}

fn normalize_filter_text(field: FilterField, raw: &str) -> EntityResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EntityError::InvalidArgument(format!(
            "{} filter cannot be blank",
            field.as_str()
        )));
    }
    if trimmed.chars().count() > MAX_FILTER_TEXT_CHARS {
        return Err(EntityError::InvalidArgument(format!(
            "{} filter exceeds {MAX_FILTER_TEXT_CHARS} chars",
            field.as_str()
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(EntityError::InvalidArgument(format!(
            "{} filter contains control characters",
            field.as_str()
        )));
    }
    Ok(trimmed.to_string())
}

/// Wraps `text` as a substring LIKE pattern, escaping `\`, `%` and `_`.
fn like_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for ch in text.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
