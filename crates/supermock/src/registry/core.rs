//! RuleRegistry: the single writer of the Space → Group → Rule hierarchy.

use super::types::{
    strip_leading_slashes, Group, GroupUpdate, RegistryError, Rule, Space, SpaceDetail,
    SpaceUpdate,
};
use crate::metrics;
use crate::routing::{RefreshScope, RouteCompiler};
use crate::store::{reorder, Database, Persistence};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error};

/// Owns the rule hierarchy and keeps the published routes in step with it.
///
/// Every mutation runs under the database lock, so mutations are serialised
/// and validation sees a consistent view. A failed mutation leaves the
/// database untouched. A successful one is persisted and schedules a route
/// refresh scoped to the space it touched.
pub struct RuleRegistry {
    db: Arc<Mutex<Database>>,
    compiler: RouteCompiler,
    persistence: Box<dyn Persistence>,
}

impl RuleRegistry {
    pub fn new(
        db: Arc<Mutex<Database>>,
        compiler: RouteCompiler,
        persistence: Box<dyn Persistence>,
    ) -> Self {
        Self {
            db,
            compiler,
            persistence,
        }
    }

    pub fn compiler(&self) -> &RouteCompiler {
        &self.compiler
    }

    /// Copy of the whole database.
    pub fn snapshot(&self) -> Database {
        self.db.lock().clone()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn list_spaces(&self) -> Vec<Space> {
        self.db.lock().spaces.iter().cloned().collect()
    }

    pub fn get_space(&self, id: &str) -> Option<Space> {
        self.db.lock().spaces.get(id).cloned()
    }

    pub fn get_group(&self, id: &str) -> Option<Group> {
        self.db.lock().groups.get(id).cloned()
    }

    pub fn get_rule(&self, id: &str) -> Option<Rule> {
        self.db.lock().rules.get(id).cloned()
    }

    /// A space with its groups and their rules, in routing order.
    pub fn space_detail(&self, id: &str) -> Option<SpaceDetail> {
        let db = self.db.lock();
        let space = db.spaces.get(id)?.clone();
        let groups: Vec<Group> = space
            .group_ids
            .iter()
            .filter_map(|gid| db.groups.get(gid).cloned())
            .collect();
        let rules = groups
            .iter()
            .flat_map(|g| g.rule_ids.iter())
            .filter_map(|rid| db.rules.get(rid).cloned())
            .collect();
        Some(SpaceDetail {
            space,
            groups,
            rules,
        })
    }

    // ------------------------------------------------------------------
    // Spaces
    // ------------------------------------------------------------------

    pub fn add_space(
        &self,
        path: &str,
        description: Option<String>,
    ) -> Result<Space, RegistryError> {
        let path = required(Some(path), "path")?;
        let path = strip_leading_slashes(&path).to_string();
        if path.is_empty() {
            return Err(RegistryError::Validation("path must not be empty".into()));
        }

        self.mutate(|db| {
            if db.spaces.find(|s| s.path == path).is_some() {
                return Err(RegistryError::Conflict(format!(
                    "space path '{path}' already exists"
                )));
            }
            let space = db.spaces.insert(Space {
                id: String::new(),
                path,
                description,
                group_ids: Vec::new(),
            });
            debug!("Added space {} at /{}", space.id, space.path);
            let scope = RefreshScope::space(&space.id);
            Ok((space, scope))
        })
    }

    /// Update path and description. Group order is never taken from the input.
    pub fn update_space(&self, attrs: SpaceUpdate) -> Result<Space, RegistryError> {
        let id = required(attrs.id.as_deref(), "id")?;
        let path = required(attrs.path.as_deref(), "path")?;
        let path = strip_leading_slashes(&path).to_string();
        if path.is_empty() {
            return Err(RegistryError::Validation("path must not be empty".into()));
        }

        self.mutate(|db| {
            if db.spaces.find(|s| s.path == path && s.id != id).is_some() {
                return Err(RegistryError::Conflict(format!(
                    "space path '{path}' already exists"
                )));
            }
            let space = db
                .spaces
                .get_mut(&id)
                .ok_or_else(|| RegistryError::not_found("space", &id))?;
            space.path = path;
            space.description = attrs.description;
            let space = space.clone();
            Ok((space, RefreshScope::space(&id)))
        })
    }

    /// Remove a space together with its groups and their rules.
    pub fn remove_space(&self, id: &str) -> Result<Space, RegistryError> {
        self.mutate(|db| {
            let space = db
                .spaces
                .remove(id)
                .ok_or_else(|| RegistryError::not_found("space", id))?;
            for gid in &space.group_ids {
                if let Some(group) = db.groups.remove(gid) {
                    for rid in &group.rule_ids {
                        db.rules.remove(rid);
                    }
                }
            }
            debug!("Removed space {} with {} groups", id, space.group_ids.len());
            Ok((space, RefreshScope::space(id)))
        })
    }

    // ------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------

    /// Insert a group into a space at `index` (clamped; appended when absent).
    pub fn add_group(
        &self,
        space_id: &str,
        name: &str,
        index: Option<usize>,
    ) -> Result<Group, RegistryError> {
        let name = required(Some(name), "name")?;

        self.mutate(|db| {
            if !db.spaces.contains(space_id) {
                return Err(RegistryError::Validation(format!(
                    "unknown space '{space_id}'"
                )));
            }
            let group = db.groups.insert(Group {
                id: String::new(),
                name,
                rule_ids: Vec::new(),
            });
            if let Some(space) = db.spaces.get_mut(space_id) {
                insert_at(&mut space.group_ids, group.id.clone(), index);
            }
            Ok((group, RefreshScope::space(space_id)))
        })
    }

    /// Rename a group. Rule order is never taken from the input.
    pub fn update_group(&self, attrs: GroupUpdate) -> Result<Group, RegistryError> {
        let id = required(attrs.id.as_deref(), "id")?;
        let name = required(attrs.name.as_deref(), "name")?;

        self.mutate(|db| {
            let group = db
                .groups
                .get_mut(&id)
                .ok_or_else(|| RegistryError::not_found("group", &id))?;
            group.name = name;
            let group = group.clone();
            Ok((group, scope_of_group(db, &id)))
        })
    }

    /// Remove a group from a space, deleting its rules.
    pub fn remove_group(&self, id: &str, space_id: &str) -> Result<Group, RegistryError> {
        self.mutate(|db| {
            let space = db
                .spaces
                .get_mut(space_id)
                .ok_or_else(|| RegistryError::not_found("space", space_id))?;
            let pos = space
                .group_ids
                .iter()
                .position(|g| g == id)
                .ok_or_else(|| RegistryError::not_found("group", id))?;
            space.group_ids.remove(pos);

            let group = db
                .groups
                .remove(id)
                .ok_or_else(|| RegistryError::not_found("group", id))?;
            for rid in &group.rule_ids {
                db.rules.remove(rid);
            }
            Ok((group, RefreshScope::space(space_id)))
        })
    }

    // ------------------------------------------------------------------
    // Rules
    // ------------------------------------------------------------------

    /// Insert a rule into a group at `index` (clamped; appended when absent).
    ///
    /// Any id on the input is replaced. `type` defaults to `static` and
    /// `method` to `all`.
    pub fn add_rule(
        &self,
        group_id: &str,
        mut rule: Rule,
        index: Option<usize>,
    ) -> Result<Rule, RegistryError> {
        required(Some(rule.path.as_str()), "path")?;
        rule.normalize();

        self.mutate(|db| {
            if !db.groups.contains(group_id) {
                return Err(RegistryError::Validation(format!(
                    "unknown group '{group_id}'"
                )));
            }
            let rule = db.rules.insert(rule);
            if let Some(group) = db.groups.get_mut(group_id) {
                insert_at(&mut group.rule_ids, rule.id.clone(), index);
            }
            debug!("Added rule {} {} /{}", rule.id, rule.method, rule.path);
            Ok((rule, scope_of_group(db, group_id)))
        })
    }

    /// Replace a rule's definition. The rule stays in its group and position.
    pub fn update_rule(&self, mut rule: Rule) -> Result<Rule, RegistryError> {
        let id = required(Some(rule.id.as_str()), "id")?;
        required(Some(rule.path.as_str()), "path")?;
        rule.id = id;
        rule.normalize();

        self.mutate(|db| {
            if !db.rules.update(rule.clone()) {
                return Err(RegistryError::not_found("rule", &rule.id));
            }
            let owner = db
                .groups
                .find(|g| g.rule_ids.contains(&rule.id))
                .map(|g| g.id.clone());
            let scope = match owner {
                Some(group_id) => scope_of_group(db, &group_id),
                None => RefreshScope::Full,
            };
            Ok((rule, scope))
        })
    }

    pub fn remove_rule(&self, id: &str, group_id: &str) -> Result<Rule, RegistryError> {
        self.mutate(|db| {
            let group = db
                .groups
                .get_mut(group_id)
                .ok_or_else(|| RegistryError::not_found("group", group_id))?;
            let pos = group
                .rule_ids
                .iter()
                .position(|r| r == id)
                .ok_or_else(|| RegistryError::not_found("rule", id))?;
            group.rule_ids.remove(pos);

            let rule = db
                .rules
                .remove(id)
                .ok_or_else(|| RegistryError::not_found("rule", id))?;
            Ok((rule, scope_of_group(db, group_id)))
        })
    }

    /// Move a rule to another group (or position), or copy it under a new id.
    pub fn move_rule(
        &self,
        rule_id: &str,
        from_group_id: &str,
        to_group_id: &str,
        index: Option<usize>,
        copy: bool,
    ) -> Result<Rule, RegistryError> {
        self.mutate(|db| {
            let source = db
                .groups
                .get(from_group_id)
                .ok_or_else(|| RegistryError::not_found("group", from_group_id))?;
            if !source.rule_ids.iter().any(|r| r == rule_id) {
                return Err(RegistryError::not_found("rule", rule_id));
            }
            if !db.groups.contains(to_group_id) {
                return Err(RegistryError::Validation(format!(
                    "unknown group '{to_group_id}'"
                )));
            }
            let original = db
                .rules
                .get(rule_id)
                .cloned()
                .ok_or_else(|| RegistryError::not_found("rule", rule_id))?;

            let moved = if copy {
                db.rules.insert(original)
            } else {
                if let Some(source) = db.groups.get_mut(from_group_id) {
                    source.rule_ids.retain(|r| r != rule_id);
                }
                original
            };
            if let Some(target) = db.groups.get_mut(to_group_id) {
                insert_at(&mut target.rule_ids, moved.id.clone(), index);
            }

            let scope = scope_of_group(db, from_group_id).merge(scope_of_group(db, to_group_id));
            Ok((moved, scope))
        })
    }

    // ------------------------------------------------------------------
    // Ordering
    // ------------------------------------------------------------------

    /// Reorder a space's groups. `order` must be an exact permutation.
    pub fn sort_group(&self, space_id: &str, order: &[String]) -> Result<Space, RegistryError> {
        self.mutate(|db| {
            let space = db
                .spaces
                .get_mut(space_id)
                .ok_or_else(|| RegistryError::not_found("space", space_id))?;
            space.group_ids = reorder(&space.group_ids, order).ok_or_else(|| {
                RegistryError::Conflict("group order must list exactly the space's groups".into())
            })?;
            let space = space.clone();
            Ok((space, RefreshScope::space(space_id)))
        })
    }

    /// Reorder a group's rules. `order` must be an exact permutation.
    pub fn sort_rule(&self, group_id: &str, order: &[String]) -> Result<Group, RegistryError> {
        self.mutate(|db| {
            let group = db
                .groups
                .get_mut(group_id)
                .ok_or_else(|| RegistryError::not_found("group", group_id))?;
            group.rule_ids = reorder(&group.rule_ids, order).ok_or_else(|| {
                RegistryError::Conflict("rule order must list exactly the group's rules".into())
            })?;
            let group = group.clone();
            Ok((group, scope_of_group(db, group_id)))
        })
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Run a mutation under the lock, persist it and schedule a refresh.
    ///
    /// `op` must validate before it changes anything: an `Err` is returned
    /// as-is and nothing is saved.
    fn mutate<T, F>(&self, op: F) -> Result<T, RegistryError>
    where
        F: FnOnce(&mut Database) -> Result<(T, RefreshScope), RegistryError>,
    {
        let (value, scope) = {
            let mut db = self.db.lock();
            let (value, scope) = op(&mut db)?;
            if let Err(e) = self.persistence.save(&db) {
                error!(
                    "Failed to persist registry to {}: {}",
                    self.persistence.describe(),
                    e
                );
            }
            (value, scope)
        };
        metrics::record_mutation();
        // The lock is released first: without a runtime the refresh runs inline.
        self.compiler.refresh(scope);
        Ok(value)
    }
}

/// Refresh scope for whatever space holds `group_id`, or everything.
fn scope_of_group(db: &Database, group_id: &str) -> RefreshScope {
    db.spaces
        .find(|s| s.group_ids.iter().any(|g| g == group_id))
        .map(|s| RefreshScope::space(&s.id))
        .unwrap_or(RefreshScope::Full)
}

fn insert_at(list: &mut Vec<String>, id: String, index: Option<usize>) {
    let pos = index.map_or(list.len(), |i| i.min(list.len()));
    list.insert(pos, id);
}

fn required(value: Option<&str>, field: &str) -> Result<String, RegistryError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(RegistryError::Validation(format!("{field} is required"))),
    }
}
