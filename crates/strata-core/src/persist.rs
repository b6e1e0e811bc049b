//! Object persistence: reconstruction, pagination, and permission-checked
//! CRUD over the table store.

use crate::error::Error;
use crate::security::{AccessOp, CapabilityIssuer, PermissionPolicy, SecurityError};
use crate::session::{SearchArgs, Session, SessionManager};
use crate::store::{ColumnValue, StoredRow, TableStore};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use strata_model::{Cardinality, FieldArg, Instance, ModelDef, ModelRegistry, Relation};
use strata_proto::{CapabilityOp, Filter, SearchHandle, Value};
use tracing::debug;

/// Visitation key for the reconstruction cycle guard.
type VisitKey = (String, String, String);

/// The persistence engine.
///
/// Owns the table store and enforces the permission policy and capability
/// checks around every operation. Only server code holds a `Persistence`;
/// clients reach it through the remote-call boundary.
pub struct Persistence {
    store: TableStore,
    registry: Arc<ModelRegistry>,
    policy: Arc<dyn PermissionPolicy>,
    issuer: CapabilityIssuer,
    sessions: Arc<SessionManager>,
}

impl Persistence {
    /// Assemble the engine.
    pub fn new(
        store: TableStore,
        registry: Arc<ModelRegistry>,
        policy: Arc<dyn PermissionPolicy>,
        issuer: CapabilityIssuer,
        sessions: Arc<SessionManager>,
    ) -> Self {
        Self {
            store,
            registry,
            policy,
            issuer,
            sessions,
        }
    }

    /// The session manager serving this engine.
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// The model registry serving this engine.
    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    fn def(&self, class_name: &str) -> Result<Arc<ModelDef>, Error> {
        self.registry
            .get(class_name)
            .ok_or_else(|| Error::UnknownModel(class_name.to_string()))
    }

    /// Fetch one object by identifier.
    ///
    /// Returns `None` both for missing rows and for denied reads, so
    /// callers cannot distinguish absence from denial. When
    /// `with_capability` is set, update and delete tokens are attached for
    /// whichever operations the policy grants.
    pub fn get_object(
        &self,
        class_name: &str,
        uid: &str,
        with_capability: bool,
        max_depth: Option<u32>,
    ) -> Result<Option<Instance>, Error> {
        if !self
            .policy
            .has_permission(AccessOp::Read, class_name, Some(uid))
        {
            debug!(class_name, uid, "read denied, returning none");
            return Ok(None);
        }

        let def = self.def(class_name)?;
        let row = self.store.table(def.table_name()).get_by_uid(uid)?;
        let mut visited = HashSet::new();
        let instance = self.reconstruct(&def, row.as_ref(), &mut visited, max_depth, 0)?;

        Ok(instance.map(|mut instance| {
            if with_capability {
                self.attach_capabilities(&mut instance, class_name, uid);
            }
            instance
        }))
    }

    fn attach_capabilities(&self, instance: &mut Instance, class_name: &str, uid: &str) {
        let update = self
            .policy
            .has_permission(AccessOp::Update, class_name, Some(uid))
            .then(|| self.issuer.issue(CapabilityOp::Update, class_name, uid));
        let delete = self
            .policy
            .has_permission(AccessOp::Delete, class_name, Some(uid))
            .then(|| self.issuer.issue(CapabilityOp::Delete, class_name, uid));
        instance.set_capabilities(update, delete);
    }

    /// Rebuild an instance graph from a stored row.
    ///
    /// `visited` tracks `(class, uid, relationship)` keys for relationships
    /// carrying a cross-reference; revisiting one abandons the rest of the
    /// row's relationship resolution, which bounds cyclic graphs. Beyond
    /// `max_depth`, relationship slots stay unset.
    fn reconstruct(
        &self,
        def: &Arc<ModelDef>,
        row: Option<&StoredRow>,
        visited: &mut HashSet<VisitKey>,
        max_depth: Option<u32>,
        depth: u32,
    ) -> Result<Option<Instance>, Error> {
        let Some(row) = row else {
            return Ok(None);
        };

        let mut fields: Vec<(String, FieldArg)> = Vec::new();
        for attr in def.attributes() {
            if attr.identifier {
                continue;
            }
            if let Some(ColumnValue::Scalar(value)) = row.column(&attr.name) {
                fields.push((attr.name.clone(), FieldArg::Value(value.clone())));
            }
        }

        let within_depth = max_depth.map_or(true, |limit| depth < limit);
        let mut filled: HashSet<&str> = HashSet::new();

        for rel in def.relationships() {
            if rel.cross_reference.is_some() {
                let key = (def.name().to_string(), row.uid.clone(), rel.name.clone());
                if visited.contains(&key) {
                    break;
                }
                visited.insert(key);
            }

            if !within_depth {
                continue;
            }

            let target_def = self.def(&rel.target)?;
            let target_table = self.store.table(target_def.table_name());
            match rel.cardinality {
                Cardinality::One => {
                    let inner = match row.column(&rel.name).and_then(ColumnValue::as_link) {
                        Some(link_uid) => {
                            let target_row = target_table.get_by_uid(link_uid)?;
                            self.reconstruct(
                                &target_def,
                                target_row.as_ref(),
                                visited,
                                max_depth,
                                depth + 1,
                            )?
                        }
                        None => None,
                    };
                    fields.push((rel.name.clone(), FieldArg::One(inner)));
                }
                Cardinality::Many => {
                    let mut items = Vec::new();
                    if let Some(uids) = row.column(&rel.name).and_then(ColumnValue::as_link_set) {
                        for link_uid in uids {
                            let target_row = target_table.get_by_uid(link_uid)?;
                            if let Some(item) = self.reconstruct(
                                &target_def,
                                target_row.as_ref(),
                                visited,
                                max_depth,
                                depth + 1,
                            )? {
                                items.push(item);
                            }
                        }
                    }
                    fields.push((rel.name.clone(), FieldArg::Many(items)));
                }
            }
            filled.insert(rel.name.as_str());
        }

        // Depth-gated or cycle-abandoned slots are explicitly unset
        for rel in def.relationships() {
            if filled.contains(rel.name.as_str()) {
                continue;
            }
            let unset = match rel.cardinality {
                Cardinality::One => FieldArg::One(None),
                Cardinality::Many => FieldArg::Many(Vec::new()),
            };
            fields.push((rel.name.clone(), unset));
        }

        let mut instance = Instance::new(Arc::clone(def), fields)?;
        instance.set_uid(row.uid.clone());
        if def.attribute(def.identifier()).is_some() {
            instance.set(def.identifier(), Value::String(row.uid.clone()))?;
        }
        Ok(Some(instance))
    }

    /// Start a paginated search, storing the arguments in the session.
    ///
    /// Counts matching rows without materializing them and returns a handle
    /// referencing the stored cursor.
    pub fn basic_search(
        &self,
        session: &Session,
        class_name: &str,
        filters: Vec<Filter>,
        page_length: u64,
        max_depth: Option<u32>,
    ) -> Result<SearchHandle, Error> {
        let def = self.def(class_name)?;
        let total_length = self.store.table(def.table_name()).count(&filters)?;
        let cursor_id = session.store_cursor(SearchArgs {
            class_name: class_name.to_string(),
            filters,
        });
        debug!(class_name, %cursor_id, total_length, "search cursor stored");

        Ok(SearchHandle {
            class_name: class_name.to_string(),
            cursor_id,
            page_length,
            max_depth,
            total_length,
        })
    }

    /// Fetch one page of a stored search.
    ///
    /// Re-executes the stored search and slices the requested page. Each
    /// row passes through [`Persistence::get_object`], so read permission
    /// is re-checked and capabilities re-derived per object; denied rows
    /// are omitted. The cursor is removed when the last page is served. A
    /// missing cursor yields an empty final page.
    pub fn fetch_objects(
        &self,
        session: &Session,
        cursor_id: &str,
        page: u64,
        page_length: u64,
        max_depth: Option<u32>,
    ) -> Result<(Vec<Instance>, bool), Error> {
        let Some(args) = session.cursor(cursor_id) else {
            debug!(cursor_id, "cursor missing, returning empty page");
            return Ok((Vec::new(), true));
        };

        let def = self.def(&args.class_name)?;
        let rows = self.store.table(def.table_name()).search(&args.filters)?;

        // page and page_length come off the wire; an overflowing window is
        // past the end of any result set
        let start = page
            .checked_mul(page_length)
            .map_or(usize::MAX, |s| usize::try_from(s).unwrap_or(usize::MAX));
        let end = start.saturating_add(usize::try_from(page_length).unwrap_or(usize::MAX));
        let is_last_page = end >= rows.len();
        let slice = rows.get(start..end.min(rows.len())).unwrap_or(&[]);

        let mut objects = Vec::with_capacity(slice.len());
        for row in slice {
            if let Some(instance) =
                self.get_object(&args.class_name, &row.uid, true, max_depth)?
            {
                objects.push(instance);
            }
        }

        if is_last_page {
            session.remove_cursor(cursor_id);
        }

        Ok((objects, is_last_page))
    }

    /// Create or update an object, maintaining cross-reference columns.
    ///
    /// Creation requires `Create` permission and assigns a fresh uid.
    /// Updates require a valid update capability. Every related object
    /// must already be saved. The row write and any cross-reference
    /// appends commit in one transaction.
    pub fn save_object(&self, instance: &Instance) -> Result<Instance, Error> {
        let def = instance.def().clone();
        let class_name = def.name();

        let mut columns: Vec<(String, ColumnValue)> = Vec::new();
        for attr in def.attributes() {
            if attr.identifier {
                continue;
            }
            columns.push((
                attr.name.clone(),
                ColumnValue::Scalar(instance.get(&attr.name)?.clone()),
            ));
        }

        // Cross-reference appends, resolved before the uid is known
        let mut xrefs: Vec<(String, String, String)> = Vec::new();
        for rel in def.relationships() {
            let target_def = self.def(&rel.target)?;
            let target_table = self.store.table(target_def.table_name());
            match instance.relation(&rel.name)? {
                Relation::One(inner) => {
                    let link = match inner {
                        Some(related) => {
                            let target_uid = related.uid().ok_or_else(|| {
                                Error::InvalidReference(format!(
                                    "relationship '{}' of '{}' points at an unsaved '{}'",
                                    rel.name, class_name, rel.target
                                ))
                            })?;
                            if target_table.get_by_uid(target_uid)?.is_none() {
                                return Err(Error::InvalidReference(format!(
                                    "relationship '{}' of '{}' points at missing '{}:{}'",
                                    rel.name, class_name, rel.target, target_uid
                                )));
                            }
                            Some(target_uid.to_string())
                        }
                        None => None,
                    };
                    if let (Some(target_uid), Some(column)) = (&link, &rel.cross_reference) {
                        xrefs.push((
                            target_def.table_name().to_string(),
                            target_uid.clone(),
                            column.clone(),
                        ));
                    }
                    columns.push((rel.name.clone(), ColumnValue::Link(link)));
                }
                Relation::Many(items) => {
                    let mut uids = Vec::with_capacity(items.len());
                    for related in items {
                        let target_uid = related.uid().ok_or_else(|| {
                            Error::InvalidReference(format!(
                                "relationship '{}' of '{}' contains an unsaved '{}'",
                                rel.name, class_name, rel.target
                            ))
                        })?;
                        uids.push(target_uid.to_string());
                    }
                    if !uids.is_empty() {
                        let members = uids.iter().map(|uid| Value::from(uid.clone())).collect();
                        let found = target_table.search(&[Filter::any_of("uid", members)])?;
                        let found_uids: HashSet<&str> =
                            found.iter().map(|row| row.uid.as_str()).collect();
                        if let Some(missing) =
                            uids.iter().find(|uid| !found_uids.contains(uid.as_str()))
                        {
                            return Err(Error::InvalidReference(format!(
                                "relationship '{}' of '{}' contains missing '{}:{}'",
                                rel.name, class_name, rel.target, missing
                            )));
                        }
                    }
                    columns.push((rel.name.clone(), ColumnValue::LinkSet(uids)));
                }
            }
        }

        let mut tx = self.store.transaction();
        let uid = match instance.uid() {
            None => {
                if !self
                    .policy
                    .has_permission(AccessOp::Create, class_name, None)
                {
                    return Err(SecurityError::Authorization(format!(
                        "create denied for model '{}'",
                        class_name
                    ))
                    .into());
                }
                let uid = uuid::Uuid::new_v4().simple().to_string();
                let row = StoredRow {
                    uid: uid.clone(),
                    columns,
                };
                tx.insert(def.table_name(), row);
                debug!(class_name, %uid, "creating object");
                uid
            }
            Some(uid) => {
                self.issuer.require(
                    instance.update_capability(),
                    CapabilityOp::Update,
                    class_name,
                    uid,
                )?;
                // The capability may outlive the row it was issued for
                if self.store.table(def.table_name()).get_by_uid(uid)?.is_none() {
                    return Err(Error::NotFound(format!("{}:{}", class_name, uid)));
                }
                tx.update_columns(def.table_name(), uid, columns);
                debug!(class_name, uid, "updating object");
                uid.to_string()
            }
        };

        for (table, target_uid, column) in xrefs {
            tx.append_link(table, target_uid, column, uid.clone());
        }
        tx.commit()?;

        let mut saved = instance.clone();
        saved.set_uid(uid.clone());
        if def.attribute(def.identifier()).is_some() {
            saved.set(def.identifier(), Value::String(uid.clone()))?;
        }
        self.attach_capabilities(&mut saved, class_name, &uid);
        Ok(saved)
    }

    /// Delete an object. Requires a valid delete capability. No cascade:
    /// rows referencing the deleted object keep their dangling links.
    pub fn delete_object(&self, instance: &Instance) -> Result<(), Error> {
        let def = instance.def();
        let class_name = def.name();
        let uid = instance.uid().ok_or_else(|| {
            Error::InvalidReference(format!("cannot delete unsaved '{}'", class_name))
        })?;

        self.issuer.require(
            instance.delete_capability(),
            CapabilityOp::Delete,
            class_name,
            uid,
        )?;
        if self.store.table(def.table_name()).get_by_uid(uid)?.is_none() {
            return Err(Error::NotFound(format!("{}:{}", class_name, uid)));
        }

        let mut tx = self.store.transaction();
        tx.delete(def.table_name(), uid);
        tx.commit()?;
        debug!(class_name, uid, "deleted object");
        Ok(())
    }
}

/// Convenience constructor used by the server binary and tests.
impl Persistence {
    /// Open a persistence engine over a store path with the given policy
    /// and capability secret.
    pub fn open(
        path: impl AsRef<std::path::Path>,
        registry: Arc<ModelRegistry>,
        policy: Arc<dyn PermissionPolicy>,
        capability_secret: &[u8],
        session_timeout: Duration,
    ) -> Result<Self, Error> {
        Ok(Self::new(
            TableStore::open(path)?,
            registry,
            policy,
            CapabilityIssuer::new(capability_secret),
            Arc::new(SessionManager::new(session_timeout)),
        ))
    }
}
