//! Request-scoped record context.
//!
//! # Responsibility
//! - Hold the identity of the record a request works on (kind, id) and the
//!   requester acting on it.
//! - Materialize that record lazily, once per id, through the query composer.
//! - Route entitlement checks for the cached or a supplied record.
//!
//! # Invariants
//! - The cached record always belongs to the currently set id; `set_id`
//!   drops it.
//! - `get_record` issues at most one store query per id.

use crate::error::{EntityError, EntityResult};
use crate::model::access::{Access, Permissions, Requester};
use crate::model::entity::{check_entity_id, parse_entity_id, EntityId, EntityKind, Record};
use crate::permission::resolver::{require_or_fail, resolve};
use crate::permission::team_groups::TeamGroupDirectory;
use crate::query::composer::{self, ReadResult, RecordStore};
use crate::query::filter::FilterSet;
use log::warn;

/// One request's view of an experiment or item.
pub struct EntityContext<'s, S: RecordStore + ?Sized> {
    store: &'s S,
    kind: EntityKind,
    requester: Requester,
    id: Option<EntityId>,
    filters: FilterSet,
    record: Option<Record>,
}

impl<'s, S: RecordStore + ?Sized> EntityContext<'s, S> {
    pub fn new(store: &'s S, kind: EntityKind, requester: Requester) -> Self {
        Self {
            store,
            kind,
            requester,
            id: None,
            filters: FilterSet::new(),
            record: None,
        }
    }

    /// Builds a context for a resource type given by name.
    ///
    /// # Errors
    /// - `NotApplicable` when `type_name` names no record-bearing kind.
    pub fn from_type_name(
        store: &'s S,
        type_name: &str,
        requester: Requester,
    ) -> EntityResult<Self> {
        let kind = EntityKind::from_type_name(type_name).ok_or_else(|| {
            warn!("event=context_init module=context status=rejected error_code=not_applicable");
            EntityError::NotApplicable(type_name.trim().to_string())
        })?;
        Ok(Self::new(store, kind, requester))
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn requester(&self) -> &Requester {
        &self.requester
    }

    pub fn id(&self) -> Option<EntityId> {
        self.id
    }

    /// Sets the record id and drops any cached record.
    pub fn set_id(&mut self, id: EntityId) -> EntityResult<()> {
        self.id = Some(check_entity_id(id)?);
        self.record = None;
        Ok(())
    }

    /// [`Self::set_id`] from untrusted text.
    pub fn set_id_str(&mut self, raw: &str) -> EntityResult<()> {
        self.set_id(parse_entity_id(raw)?)
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn filters_mut(&mut self) -> &mut FilterSet {
        &mut self.filters
    }

    /// Restricts collection reads to records owned by the requester.
    pub fn set_owner_filter(&mut self) -> EntityResult<()> {
        self.filters.set_owner_filter(self.requester.user_id)
    }

    /// Returns the record for the current id, querying the store on first use.
    ///
    /// # Errors
    /// - `InvalidArgument` when no id is set.
    /// - `NotFound` when no row in the requester's team has this id.
    pub fn get_record(&mut self) -> EntityResult<&Record> {
        self.ensure_loaded()?;
        self.record.as_ref().ok_or_else(|| {
            EntityError::InvalidData("record cache empty after load".to_string())
        })
    }

    /// Cached record, if one has been loaded for the current id.
    pub fn cached_record(&self) -> Option<&Record> {
        self.record.as_ref()
    }

    /// Runs the accumulated filters (plus the id, when set) and returns every
    /// matching row.
    pub fn read_all(&self) -> EntityResult<Vec<Record>> {
        let filters = self.collection_filters()?;
        composer::execute(self.store, self.kind, &filters, self.requester.team)
    }

    /// [`Self::read_all`] with a single-row result collapsed.
    pub fn read(&self) -> EntityResult<ReadResult> {
        self.read_all().map(ReadResult::from_rows)
    }

    /// Entitlement of the requester on the current record.
    pub fn permissions<G: TeamGroupDirectory + ?Sized>(
        &mut self,
        groups: &G,
    ) -> EntityResult<Permissions> {
        self.ensure_loaded()?;
        match self.record.as_ref() {
            Some(record) => resolve(self.kind, record, &self.requester, groups),
            None => Ok(Permissions::NONE),
        }
    }

    /// Entitlement of the requester on an explicitly supplied record.
    pub fn permissions_for<G: TeamGroupDirectory + ?Sized>(
        &self,
        record: &Record,
        groups: &G,
    ) -> EntityResult<Permissions> {
        resolve(self.kind, record, &self.requester, groups)
    }

    /// Gate in front of any read or write on the current record.
    pub fn require<G: TeamGroupDirectory + ?Sized>(
        &mut self,
        access: Access,
        groups: &G,
    ) -> EntityResult<()> {
        self.ensure_loaded()?;
        match self.record.as_ref() {
            Some(record) => require_or_fail(self.kind, record, &self.requester, groups, access),
            None => Err(EntityError::PermissionDenied {
                kind: self.kind,
                id: self.id,
                access,
            }),
        }
    }

    fn ensure_loaded(&mut self) -> EntityResult<()> {
        if self.record.is_some() {
            return Ok(());
        }
        let id = self.id.ok_or_else(|| {
            EntityError::InvalidArgument("no record id set on context".to_string())
        })?;

        let filters = FilterSet::by_id(id)?;
        match composer::read(self.store, self.kind, &filters, self.requester.team)? {
            ReadResult::Single(record) => {
                self.record = Some(record);
                Ok(())
            }
            ReadResult::Many(rows) if rows.is_empty() => Err(EntityError::NotFound {
                kind: self.kind,
                id,
            }),
            ReadResult::Many(rows) => Err(EntityError::InvalidData(format!(
                "id filter matched {} rows",
                rows.len()
            ))),
        }
    }

    fn collection_filters(&self) -> EntityResult<FilterSet> {
        let mut filters = self.filters.clone();
        if let Some(id) = self.id {
            filters.set_id_filter(id)?;
        }
        Ok(filters)
    }
}
