use chrono::Utc;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use crate::client::traits::{
    AssetClient, AuditClient, CustomMetadataClient, LineageClient, SearchClient,
};
use crate::error::{CatalogError, CatalogResult};
use crate::logic::{AssetFilterEvaluator, LineageWalker};
use crate::model::{
    generate_guid, generate_short_id, Asset, AssetDetail, AssetType, AssetUpdater, AttributeDef,
    AttributeType, AuditAction, AuditDetail, AuditSearchRequest, AuditSearchResponse,
    CustomMetadataDef, EntityAudit, EntityStatus, Guid, LineageRequest, LineageResponse,
    MutationResponse, SearchRequest, SearchResponse, UserContext,
};

#[derive(Debug, Clone)]
enum IndexWrite {
    Upsert(Asset),
    Remove(Guid),
}

#[derive(Debug, Clone)]
struct PendingIndexWrite {
    /// Search call count that must be exceeded before the write is visible
    visible_after: u64,
    write: IndexWrite,
}

#[derive(Debug, Default)]
struct CatalogState {
    assets: HashMap<Guid, Asset>,
    by_qualified_name: HashMap<(AssetType, String), Guid>,
    /// What search sees; trails `assets` by the configured lag
    index: HashMap<Guid, Asset>,
    pending: VecDeque<PendingIndexWrite>,
    search_calls: u64,
    failing_searches: u32,
    /// Oldest first, retained after purge
    audits: HashMap<Guid, Vec<EntityAudit>>,
    audit_sequence: u64,
    custom_metadata: HashMap<String, CustomMetadataDef>,
}

/// Reference catalog held entirely in memory.
///
/// Reads by guid or qualified name are immediately consistent; search reads an index that
/// only sees a write after `index_lag` further search calls.
#[derive(Debug, Clone)]
pub struct InMemoryCatalog {
    state: Arc<RwLock<CatalogState>>,
    index_lag: u64,
    user: UserContext,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::with_index_lag(0)
    }

    pub fn with_index_lag(index_lag: u64) -> Self {
        Self {
            state: Arc::new(RwLock::new(CatalogState::default())),
            index_lag,
            user: UserContext::system(),
        }
    }

    /// Handle over the same catalog that attributes writes to `user`
    pub fn for_user(&self, user: UserContext) -> Self {
        Self {
            state: Arc::clone(&self.state),
            index_lag: self.index_lag,
            user,
        }
    }

    /// Make the next `count` searches fail with a transient error
    pub fn fail_next_searches(&self, count: u32) {
        self.state.write().failing_searches = count;
    }

    pub fn pending_index_writes(&self) -> usize {
        self.state.read().pending.len()
    }

    pub fn search_calls(&self) -> u64 {
        self.state.read().search_calls
    }

    /// Apply every pending index write immediately
    pub fn flush_index(&self) {
        let mut state = self.state.write();
        while let Some(pending) = state.pending.pop_front() {
            Self::apply_index_write(&mut state, pending.write);
        }
    }

    fn stage_index(&self, state: &mut CatalogState, write: IndexWrite) {
        let visible_after = state.search_calls + self.index_lag;
        state.pending.push_back(PendingIndexWrite {
            visible_after,
            write,
        });
    }

    fn apply_index_write(state: &mut CatalogState, write: IndexWrite) {
        match write {
            IndexWrite::Upsert(asset) => {
                state.index.insert(asset.guid.clone(), asset);
            }
            IndexWrite::Remove(guid) => {
                state.index.remove(&guid);
            }
        }
    }

    fn record_audit(
        &self,
        state: &mut CatalogState,
        asset: &Asset,
        action: AuditAction,
        detail: AuditDetail,
    ) {
        state.audit_sequence += 1;
        let entry = EntityAudit {
            entity_guid: asset.guid.clone(),
            entity_qualified_name: asset.qualified_name.clone(),
            type_name: asset.asset_type(),
            action,
            user: self.user.user_id.clone(),
            timestamp: Utc::now(),
            event_key: format!("{}:{}", asset.guid, state.audit_sequence),
            detail,
        };
        state
            .audits
            .entry(asset.guid.clone())
            .or_default()
            .push(entry);
    }

    fn touch(&self, asset: &mut Asset) {
        asset.updated_by = self.user.user_id.clone();
        asset.updated_at = Utc::now();
    }

    /// Store a changed asset and queue it for the index
    fn commit(&self, state: &mut CatalogState, asset: Asset) {
        self.stage_index(state, IndexWrite::Upsert(asset.clone()));
        state.assets.insert(asset.guid.clone(), asset);
    }

    fn lookup_guid(
        state: &CatalogState,
        type_name: AssetType,
        qualified_name: &str,
    ) -> CatalogResult<Guid> {
        state
            .by_qualified_name
            .get(&(type_name, qualified_name.to_string()))
            .cloned()
            .ok_or_else(|| {
                CatalogError::NotFound(format!("{} '{}' does not exist", type_name, qualified_name))
            })
    }

    fn existing(state: &CatalogState, guid: &Guid) -> CatalogResult<Asset> {
        state
            .assets
            .get(guid)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("No asset with guid {}", guid)))
    }

    fn require_active(state: &CatalogState, guid: &Guid, role: &str) -> CatalogResult<Asset> {
        match state.assets.get(guid) {
            Some(asset) if asset.is_active() => Ok(asset.clone()),
            _ => Err(CatalogError::NotFound(format!(
                "{} {} does not exist or is not active",
                role, guid
            ))),
        }
    }

    /// The containing asset whose containment changes when a child is created
    fn container(state: &CatalogState, asset: &Asset) -> CatalogResult<Option<Asset>> {
        if let Some((parent_type, parent_qn)) = asset.detail.parent_qualified_name() {
            let parent = state
                .by_qualified_name
                .get(&(parent_type, parent_qn.to_string()))
                .and_then(|guid| state.assets.get(guid))
                .filter(|parent| parent.is_active())
                .ok_or_else(|| {
                    CatalogError::InvalidRequest(format!(
                        "{} '{}' requires an existing {} '{}'",
                        asset.asset_type(),
                        asset.name,
                        parent_type,
                        parent_qn
                    ))
                })?;
            return Ok(Some(parent.clone()));
        }

        let glossary_guid = match &asset.detail {
            AssetDetail::GlossaryCategory {
                parent_category: Some(parent),
                ..
            } => return Self::require_active(state, parent, "Parent category").map(Some),
            other => other.glossary_guid(),
        };
        match glossary_guid {
            Some(guid) => match state.assets.get(guid) {
                Some(glossary)
                    if glossary.is_active() && glossary.asset_type() == AssetType::Glossary =>
                {
                    Ok(Some(glossary.clone()))
                }
                _ => Err(CatalogError::InvalidRequest(format!(
                    "{} '{}' requires an existing glossary {}",
                    asset.asset_type(),
                    asset.name,
                    guid
                ))),
            },
            None => Ok(None),
        }
    }

    fn validate_links(state: &CatalogState, asset: &Asset) -> CatalogResult<()> {
        let glossary = asset.detail.glossary_guid();
        for guid in asset.detail.linked_guids() {
            if Some(guid) == glossary {
                continue;
            }
            if Self::require_active(state, guid, "Related asset").is_err() {
                return Err(CatalogError::InvalidRequest(format!(
                    "{} '{}' references missing asset {}",
                    asset.asset_type(),
                    asset.name,
                    guid
                )));
            }
        }
        Ok(())
    }

    fn assign_qualified_name(state: &CatalogState, asset: &mut Asset) -> CatalogResult<()> {
        if !asset.asset_type().has_assigned_qualified_name() {
            if asset.qualified_name.is_empty() {
                return Err(CatalogError::InvalidRequest(format!(
                    "{} '{}' is missing a qualified name",
                    asset.asset_type(),
                    asset.name
                )));
            }
            return Ok(());
        }
        asset.qualified_name = match asset.detail.glossary_guid() {
            None => generate_short_id(),
            Some(glossary_guid) => {
                let glossary = Self::existing(state, glossary_guid)?;
                format!("{}@{}", generate_short_id(), glossary.qualified_name)
            }
        };
        Ok(())
    }

    fn save_sync(&self, mut asset: Asset) -> CatalogResult<MutationResponse> {
        if asset.name.trim().is_empty() {
            return Err(CatalogError::InvalidRequest(
                "Assets require a display name".to_string(),
            ));
        }
        if asset.qualified_name == asset.name {
            return Err(CatalogError::InvalidRequest(format!(
                "Qualified name of '{}' must differ from its display name",
                asset.name
            )));
        }

        let mut state = self.state.write();

        let existing_guid = if !asset.qualified_name.is_empty() {
            state
                .by_qualified_name
                .get(&(asset.asset_type(), asset.qualified_name.clone()))
                .cloned()
        } else {
            None
        };

        match existing_guid {
            Some(guid) => self.replace_locked(&mut state, guid, asset),
            None => {
                let container = Self::container(&state, &asset)?;
                Self::validate_links(&state, &asset)?;
                Self::assign_qualified_name(&state, &mut asset)?;

                let now = Utc::now();
                asset.guid = generate_guid();
                asset.status = EntityStatus::Active;
                asset.created_by = self.user.user_id.clone();
                asset.updated_by = self.user.user_id.clone();
                asset.created_at = now;
                asset.updated_at = now;

                let mut attributes = Map::new();
                attributes.insert("name".to_string(), Value::String(asset.name.clone()));
                attributes.insert(
                    "qualifiedName".to_string(),
                    Value::String(asset.qualified_name.clone()),
                );
                self.record_audit(
                    &mut state,
                    &asset,
                    AuditAction::EntityCreate,
                    AuditDetail {
                        attributes,
                        ..AuditDetail::default()
                    },
                );
                state.by_qualified_name.insert(
                    (asset.asset_type(), asset.qualified_name.clone()),
                    asset.guid.clone(),
                );
                log::debug!("Created {} {}", asset.asset_type(), asset.qualified_name);
                self.commit(&mut state, asset.clone());

                let mut response = MutationResponse::created(asset);
                if let Some(mut parent) = container {
                    self.touch(&mut parent);
                    self.commit(&mut state, parent.clone());
                    response.updated.push(parent);
                }
                Ok(response)
            }
        }
    }

    /// Full replacement of the mutable attributes of an existing asset
    fn replace_locked(
        &self,
        state: &mut CatalogState,
        guid: Guid,
        incoming: Asset,
    ) -> CatalogResult<MutationResponse> {
        let current = Self::existing(state, &guid)?;
        Self::validate_links(state, &incoming)?;

        let mut replaced = current.clone();
        replaced.name = incoming.name;
        replaced.description = incoming.description;
        replaced.owner_users = incoming.owner_users;
        replaced.owner_groups = incoming.owner_groups;
        replaced.certificate = incoming.certificate;
        replaced.announcement = incoming.announcement;
        replaced.detail = incoming.detail;

        let attributes = Self::changed_attributes(&current, &replaced);
        if attributes.is_empty() {
            self.record_audit(
                state,
                &current,
                AuditAction::EntityUpdate,
                AuditDetail::default(),
            );
            return Ok(MutationResponse::default());
        }

        self.touch(&mut replaced);
        self.record_audit(
            state,
            &replaced,
            AuditAction::EntityUpdate,
            AuditDetail {
                attributes,
                ..AuditDetail::default()
            },
        );
        self.commit(state, replaced.clone());
        Ok(MutationResponse::updated(replaced))
    }

    fn changed_attributes(before: &Asset, after: &Asset) -> Map<String, Value> {
        fn diff<T: PartialEq + serde::Serialize>(
            out: &mut Map<String, Value>,
            name: &str,
            before: &T,
            after: &T,
        ) {
            if before != after {
                out.insert(
                    name.to_string(),
                    serde_json::to_value(after).unwrap_or(Value::Null),
                );
            }
        }

        let mut out = Map::new();
        diff(&mut out, "name", &before.name, &after.name);
        diff(&mut out, "description", &before.description, &after.description);
        diff(&mut out, "ownerUsers", &before.owner_users, &after.owner_users);
        diff(&mut out, "ownerGroups", &before.owner_groups, &after.owner_groups);
        diff(&mut out, "certificate", &before.certificate, &after.certificate);
        diff(&mut out, "announcement", &before.announcement, &after.announcement);
        diff(&mut out, "detail", &before.detail, &after.detail);
        out
    }

    fn update_sync(&self, updater: AssetUpdater) -> CatalogResult<MutationResponse> {
        let mut state = self.state.write();
        let guid = Self::lookup_guid(&state, updater.type_name, &updater.qualified_name)?;
        let mut asset = Self::existing(&state, &guid)?;

        for change in &updater.changes {
            for linked in change.linked_guids() {
                Self::require_active(&state, linked, "Related asset")?;
            }
        }

        let attributes = updater
            .apply(&mut asset)
            .map_err(CatalogError::InvalidRequest)?;
        if attributes.is_empty() {
            self.record_audit(
                &mut state,
                &asset,
                AuditAction::EntityUpdate,
                AuditDetail::default(),
            );
            return Ok(MutationResponse::default());
        }

        self.touch(&mut asset);
        self.record_audit(
            &mut state,
            &asset,
            AuditAction::EntityUpdate,
            AuditDetail {
                attributes,
                ..AuditDetail::default()
            },
        );
        log::debug!("Updated {} {}", asset.asset_type(), asset.qualified_name);
        self.commit(&mut state, asset.clone());
        Ok(MutationResponse::updated(asset))
    }

    fn delete_sync(&self, guid: &Guid) -> CatalogResult<MutationResponse> {
        let mut state = self.state.write();
        let mut asset = Self::existing(&state, guid)?;
        if asset.status == EntityStatus::Deleted {
            return Ok(MutationResponse::default());
        }
        asset.status = EntityStatus::Deleted;
        self.touch(&mut asset);
        self.record_audit(
            &mut state,
            &asset,
            AuditAction::EntityDelete,
            AuditDetail::default(),
        );
        self.commit(&mut state, asset.clone());
        Ok(MutationResponse::deleted(asset))
    }

    fn restore_sync(
        &self,
        type_name: AssetType,
        qualified_name: &str,
    ) -> CatalogResult<MutationResponse> {
        let mut state = self.state.write();
        let guid = Self::lookup_guid(&state, type_name, qualified_name)?;
        let mut asset = Self::existing(&state, &guid)?;
        if asset.is_active() {
            return Ok(MutationResponse::default());
        }
        asset.status = EntityStatus::Active;
        self.touch(&mut asset);
        self.record_audit(
            &mut state,
            &asset,
            AuditAction::EntityRestore,
            AuditDetail::default(),
        );
        self.commit(&mut state, asset.clone());
        Ok(MutationResponse::updated(asset))
    }

    fn purge_sync(&self, guid: &Guid) -> CatalogResult<MutationResponse> {
        let mut state = self.state.write();
        let mut asset = state
            .assets
            .remove(guid)
            .ok_or_else(|| CatalogError::NotFound(format!("No asset with guid {}", guid)))?;
        state
            .by_qualified_name
            .remove(&(asset.asset_type(), asset.qualified_name.clone()));
        asset.status = EntityStatus::Deleted;
        self.record_audit(
            &mut state,
            &asset,
            AuditAction::EntityPurge,
            AuditDetail::default(),
        );
        self.stage_index(&mut state, IndexWrite::Remove(guid.clone()));
        log::debug!("Purged {} {}", asset.asset_type(), asset.qualified_name);
        Ok(MutationResponse::deleted(asset))
    }

    fn add_tags_sync(
        &self,
        type_name: AssetType,
        qualified_name: &str,
        tags: Vec<String>,
    ) -> CatalogResult<MutationResponse> {
        if tags.iter().any(|tag| tag.trim().is_empty()) {
            return Err(CatalogError::InvalidRequest("Tag names must not be empty".to_string()));
        }

        let mut state = self.state.write();
        let guid = Self::lookup_guid(&state, type_name, qualified_name)?;
        let mut asset = Self::existing(&state, &guid)?;

        let mut added = false;
        for tag in tags {
            if asset.tags.contains(&tag) {
                continue;
            }
            asset.tags.push(tag.clone());
            added = true;
            self.record_audit(
                &mut state,
                &asset,
                AuditAction::ClassificationAdd,
                AuditDetail {
                    tags: vec![tag],
                    ..AuditDetail::default()
                },
            );
        }
        if !added {
            return Ok(MutationResponse::default());
        }
        self.touch(&mut asset);
        self.commit(&mut state, asset.clone());
        Ok(MutationResponse::updated(asset))
    }

    fn remove_tag_sync(
        &self,
        type_name: AssetType,
        qualified_name: &str,
        tag: &str,
    ) -> CatalogResult<MutationResponse> {
        let mut state = self.state.write();
        let guid = Self::lookup_guid(&state, type_name, qualified_name)?;
        let mut asset = Self::existing(&state, &guid)?;

        let Some(position) = asset.tags.iter().position(|t| t == tag) else {
            return Err(CatalogError::NotFound(format!(
                "Tag '{}' is not assigned to {}",
                tag, qualified_name
            )));
        };
        asset.tags.remove(position);
        self.touch(&mut asset);
        self.record_audit(
            &mut state,
            &asset,
            AuditAction::ClassificationDelete,
            AuditDetail {
                tags: vec![tag.to_string()],
                ..AuditDetail::default()
            },
        );
        self.commit(&mut state, asset.clone());
        Ok(MutationResponse::updated(asset))
    }

    fn search_sync(&self, request: &SearchRequest) -> CatalogResult<SearchResponse> {
        request.validate().map_err(CatalogError::InvalidRequest)?;

        let mut state = self.state.write();
        state.search_calls += 1;
        if state.failing_searches > 0 {
            state.failing_searches -= 1;
            return Err(CatalogError::Transient(
                "Search index temporarily unavailable".to_string(),
            ));
        }

        let calls = state.search_calls;
        while state
            .pending
            .front()
            .map(|p| p.visible_after < calls)
            .unwrap_or(false)
        {
            if let Some(pending) = state.pending.pop_front() {
                Self::apply_index_write(&mut state, pending.write);
            }
        }

        Ok(AssetFilterEvaluator::search(state.index.values(), request))
    }

    fn lineage_sync(&self, request: &LineageRequest) -> CatalogResult<LineageResponse> {
        let state = self.state.read();
        let base = Self::existing(&state, &request.guid)?;
        if !base.is_active() {
            return Err(CatalogError::InvalidRequest(format!(
                "Lineage requires an active asset, {} is {}",
                base.guid, base.status
            )));
        }
        Ok(LineageWalker::new(&state.assets).walk(&request.guid, request.direction, request.depth))
    }

    fn audit_sync(&self, request: &AuditSearchRequest) -> CatalogResult<AuditSearchResponse> {
        let state = self.state.read();
        let Some(entries) = state.audits.get(&request.guid) else {
            return Err(CatalogError::NotFound(format!(
                "No audit history for {}",
                request.guid
            )));
        };
        let matching: Vec<&EntityAudit> = entries
            .iter()
            .rev()
            .filter(|entry| match &request.actions {
                Some(actions) => actions.contains(&entry.action),
                None => true,
            })
            .collect();
        Ok(AuditSearchResponse {
            total_count: matching.len(),
            entries: matching
                .into_iter()
                .take(request.size)
                .cloned()
                .collect(),
        })
    }

    fn custom_metadata_def(state: &CatalogState, set_name: &str) -> CatalogResult<CustomMetadataDef> {
        state
            .custom_metadata
            .get(set_name)
            .cloned()
            .ok_or_else(|| {
                CatalogError::NotFound(format!("Custom metadata '{}' does not exist", set_name))
            })
    }

    fn check_value(attribute: &AttributeDef, value: &Value) -> bool {
        fn scalar(attribute_type: AttributeType, value: &Value) -> bool {
            match attribute_type {
                AttributeType::String | AttributeType::Options => value.is_string(),
                AttributeType::Integer | AttributeType::Date => value.is_i64(),
                AttributeType::Decimal => value.is_number(),
                AttributeType::Boolean => value.is_boolean(),
            }
        }
        match value {
            Value::Null => true,
            Value::Array(items) if attribute.multi_valued => {
                items.iter().all(|item| scalar(attribute.attribute_type, item))
            }
            other if !attribute.multi_valued => scalar(attribute.attribute_type, other),
            _ => false,
        }
    }

    /// Translate display-named values to internal names, validating types
    fn translate_values(
        definition: &CustomMetadataDef,
        values: BTreeMap<String, Value>,
    ) -> CatalogResult<BTreeMap<String, Value>> {
        let mut translated = BTreeMap::new();
        for (display_name, value) in values {
            let attribute = definition.attribute(&display_name).ok_or_else(|| {
                CatalogError::InvalidRequest(format!(
                    "'{}' is not an attribute of custom metadata '{}'",
                    display_name, definition.display_name
                ))
            })?;
            if !Self::check_value(attribute, &value) {
                return Err(CatalogError::InvalidRequest(format!(
                    "Value {} does not match type {:?} of '{}'",
                    value, attribute.attribute_type, display_name
                )));
            }
            translated.insert(attribute.internal_name.clone(), value);
        }
        Ok(translated)
    }

    fn write_custom_metadata(
        &self,
        guid: &Guid,
        set_name: &str,
        values: Option<BTreeMap<String, Value>>,
        merge: bool,
    ) -> CatalogResult<MutationResponse> {
        let mut state = self.state.write();
        let definition = Self::custom_metadata_def(&state, set_name)?;
        let mut asset = Self::existing(&state, guid)?;
        let before = asset.custom_metadata.get(&definition.internal_name).cloned();

        match values {
            None => {
                asset.custom_metadata.remove(&definition.internal_name);
            }
            Some(values) => {
                let translated = Self::translate_values(&definition, values)?;
                let entry = asset
                    .custom_metadata
                    .entry(definition.internal_name.clone())
                    .or_default();
                if !merge {
                    entry.clear();
                }
                for (name, value) in translated {
                    if value.is_null() {
                        entry.remove(&name);
                    } else {
                        entry.insert(name, value);
                    }
                }
                if entry.is_empty() {
                    asset.custom_metadata.remove(&definition.internal_name);
                }
            }
        }

        let after = asset.custom_metadata.get(&definition.internal_name).cloned();
        if before == after {
            return Ok(MutationResponse::default());
        }

        let mut snapshot = Map::new();
        let display_values: Map<String, Value> = after
            .unwrap_or_default()
            .into_iter()
            .map(|(internal, value)| {
                let name = definition
                    .display_attribute_name(&internal)
                    .unwrap_or(internal.as_str())
                    .to_string();
                (name, value)
            })
            .collect();
        snapshot.insert(
            definition.display_name.clone(),
            Value::Object(display_values),
        );

        self.touch(&mut asset);
        self.record_audit(
            &mut state,
            &asset,
            AuditAction::CustomMetadataUpdate,
            AuditDetail {
                custom_metadata: snapshot,
                ..AuditDetail::default()
            },
        );
        self.commit(&mut state, asset.clone());
        Ok(MutationResponse::updated(asset))
    }

    fn create_custom_metadata_sync(
        &self,
        mut definition: CustomMetadataDef,
    ) -> CatalogResult<CustomMetadataDef> {
        if definition.display_name.trim().is_empty() {
            return Err(CatalogError::InvalidRequest(
                "Custom metadata requires a display name".to_string(),
            ));
        }
        let mut state = self.state.write();
        if state.custom_metadata.contains_key(&definition.display_name) {
            return Err(CatalogError::Conflict(format!(
                "Custom metadata '{}' already exists",
                definition.display_name
            )));
        }
        let mut names = std::collections::HashSet::new();
        for attribute in &definition.attributes {
            if !names.insert(attribute.display_name.as_str()) {
                return Err(CatalogError::InvalidRequest(format!(
                    "Attribute '{}' is declared twice",
                    attribute.display_name
                )));
            }
        }
        definition.internal_name.clear();
        for attribute in &mut definition.attributes {
            attribute.internal_name.clear();
        }
        definition.assign_internal_names();
        state
            .custom_metadata
            .insert(definition.display_name.clone(), definition.clone());
        Ok(definition)
    }

    fn add_attribute_sync(
        &self,
        set_name: &str,
        mut attribute: AttributeDef,
    ) -> CatalogResult<CustomMetadataDef> {
        let mut state = self.state.write();
        let mut definition = Self::custom_metadata_def(&state, set_name)?;
        if definition.attribute(&attribute.display_name).is_some() {
            return Err(CatalogError::Conflict(format!(
                "Attribute '{}' already exists on '{}'",
                attribute.display_name, set_name
            )));
        }
        attribute.internal_name.clear();
        attribute.archived = false;
        attribute.archived_at = None;
        definition.attributes.push(attribute);
        definition.assign_internal_names();
        state
            .custom_metadata
            .insert(set_name.to_string(), definition.clone());
        Ok(definition)
    }

    fn archive_attribute_sync(
        &self,
        set_name: &str,
        attribute_name: &str,
    ) -> CatalogResult<CustomMetadataDef> {
        let mut state = self.state.write();
        let mut definition = Self::custom_metadata_def(&state, set_name)?;
        let attribute = definition.attribute_mut(attribute_name).ok_or_else(|| {
            CatalogError::NotFound(format!(
                "Attribute '{}' does not exist on '{}'",
                attribute_name, set_name
            ))
        })?;
        attribute.archive(Utc::now().timestamp_millis());
        state
            .custom_metadata
            .insert(set_name.to_string(), definition.clone());
        Ok(definition)
    }

    fn purge_custom_metadata_sync(&self, set_name: &str) -> CatalogResult<()> {
        let mut state = self.state.write();
        let definition = Self::custom_metadata_def(&state, set_name)?;
        let in_use = state
            .assets
            .values()
            .any(|asset| asset.custom_metadata.contains_key(&definition.internal_name));
        if in_use {
            return Err(CatalogError::Conflict(format!(
                "Custom metadata '{}' is still set on assets",
                set_name
            )));
        }
        state.custom_metadata.remove(set_name);
        Ok(())
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AssetClient for InMemoryCatalog {
    async fn save(&self, asset: Asset) -> CatalogResult<MutationResponse> {
        self.save_sync(asset)
    }

    async fn update(&self, updater: AssetUpdater) -> CatalogResult<MutationResponse> {
        self.update_sync(updater)
    }

    async fn get_by_guid(&self, guid: &Guid) -> CatalogResult<Asset> {
        Self::existing(&self.state.read(), guid)
    }

    async fn get_by_qualified_name(
        &self,
        type_name: AssetType,
        qualified_name: &str,
    ) -> CatalogResult<Asset> {
        let state = self.state.read();
        let guid = Self::lookup_guid(&state, type_name, qualified_name)?;
        Self::existing(&state, &guid)
    }

    async fn delete(&self, guid: &Guid) -> CatalogResult<MutationResponse> {
        self.delete_sync(guid)
    }

    async fn restore(
        &self,
        type_name: AssetType,
        qualified_name: &str,
    ) -> CatalogResult<MutationResponse> {
        self.restore_sync(type_name, qualified_name)
    }

    async fn purge(&self, guid: &Guid) -> CatalogResult<MutationResponse> {
        self.purge_sync(guid)
    }

    async fn add_tags(
        &self,
        type_name: AssetType,
        qualified_name: &str,
        tags: Vec<String>,
    ) -> CatalogResult<MutationResponse> {
        self.add_tags_sync(type_name, qualified_name, tags)
    }

    async fn remove_tag(
        &self,
        type_name: AssetType,
        qualified_name: &str,
        tag: &str,
    ) -> CatalogResult<MutationResponse> {
        self.remove_tag_sync(type_name, qualified_name, tag)
    }
}

#[async_trait::async_trait]
impl SearchClient for InMemoryCatalog {
    async fn search(&self, request: &SearchRequest) -> CatalogResult<SearchResponse> {
        self.search_sync(request)
    }
}

#[async_trait::async_trait]
impl LineageClient for InMemoryCatalog {
    async fn lineage(&self, request: &LineageRequest) -> CatalogResult<LineageResponse> {
        self.lineage_sync(request)
    }
}

#[async_trait::async_trait]
impl AuditClient for InMemoryCatalog {
    async fn audit_search(
        &self,
        request: &AuditSearchRequest,
    ) -> CatalogResult<AuditSearchResponse> {
        self.audit_sync(request)
    }
}

#[async_trait::async_trait]
impl CustomMetadataClient for InMemoryCatalog {
    async fn create_custom_metadata(
        &self,
        definition: CustomMetadataDef,
    ) -> CatalogResult<CustomMetadataDef> {
        self.create_custom_metadata_sync(definition)
    }

    async fn get_custom_metadata(&self, display_name: &str) -> CatalogResult<CustomMetadataDef> {
        Self::custom_metadata_def(&self.state.read(), display_name)
    }

    async fn add_custom_metadata_attribute(
        &self,
        set_name: &str,
        attribute: AttributeDef,
    ) -> CatalogResult<CustomMetadataDef> {
        self.add_attribute_sync(set_name, attribute)
    }

    async fn archive_custom_metadata_attribute(
        &self,
        set_name: &str,
        attribute_name: &str,
    ) -> CatalogResult<CustomMetadataDef> {
        self.archive_attribute_sync(set_name, attribute_name)
    }

    async fn purge_custom_metadata(&self, set_name: &str) -> CatalogResult<()> {
        self.purge_custom_metadata_sync(set_name)
    }

    async fn update_custom_metadata(
        &self,
        guid: &Guid,
        set_name: &str,
        values: BTreeMap<String, Value>,
    ) -> CatalogResult<MutationResponse> {
        self.write_custom_metadata(guid, set_name, Some(values), true)
    }

    async fn replace_custom_metadata(
        &self,
        guid: &Guid,
        set_name: &str,
        values: BTreeMap<String, Value>,
    ) -> CatalogResult<MutationResponse> {
        self.write_custom_metadata(guid, set_name, Some(values), false)
    }

    async fn remove_custom_metadata(
        &self,
        guid: &Guid,
        set_name: &str,
    ) -> CatalogResult<MutationResponse> {
        self.write_custom_metadata(guid, set_name, None, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttributeType, ConnectorType, SearchFilter};
    use serde_json::json;

    async fn connection_and_database(catalog: &InMemoryCatalog) -> (Asset, Asset) {
        let connection = catalog
            .save(Asset::connection("conn", ConnectorType::Snowflake, vec![]))
            .await
            .unwrap()
            .created
            .remove(0);
        let database = catalog
            .save(Asset::database("db", &connection.qualified_name))
            .await
            .unwrap()
            .created
            .remove(0);
        (connection, database)
    }

    #[tokio::test]
    async fn test_child_creation_updates_parent() {
        let catalog = InMemoryCatalog::new();
        let connection = catalog
            .save(Asset::connection("conn", ConnectorType::Snowflake, vec![]))
            .await
            .unwrap()
            .created
            .remove(0);

        let response = catalog
            .save(Asset::database("db", &connection.qualified_name))
            .await
            .unwrap();

        assert_eq!(response.shape(), (1, 1, 0));
        assert_eq!(response.updated[0].guid, connection.guid);
        assert!(response.overlapping_guids().is_empty());
        assert!(!response.created[0].guid.is_empty());
    }

    #[tokio::test]
    async fn test_missing_parent_is_invalid_request() {
        let catalog = InMemoryCatalog::new();
        let error = catalog
            .save(Asset::database("db", "default/snowflake/missing"))
            .await
            .unwrap_err();
        assert!(error.is_invalid_request());
    }

    #[tokio::test]
    async fn test_search_lags_behind_writes() {
        let catalog = InMemoryCatalog::with_index_lag(2);
        let (connection, _) = connection_and_database(&catalog).await;
        let request = SearchRequest::new().qualified_name_prefix(&connection.qualified_name);

        assert_eq!(catalog.search(&request).await.unwrap().approximate_count, 0);
        assert_eq!(catalog.search(&request).await.unwrap().approximate_count, 0);
        assert_eq!(catalog.search(&request).await.unwrap().approximate_count, 2);
        assert_eq!(catalog.pending_index_writes(), 0);
    }

    #[tokio::test]
    async fn test_injected_search_failures_are_transient() {
        let catalog = InMemoryCatalog::new();
        catalog.fail_next_searches(1);
        let error = catalog.search(&SearchRequest::new()).await.unwrap_err();
        assert!(error.is_transient());
        assert!(catalog.search(&SearchRequest::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_restore_purge_lifecycle() {
        let catalog = InMemoryCatalog::new();
        let (_, database) = connection_and_database(&catalog).await;

        let deleted = catalog.delete(&database.guid).await.unwrap();
        assert_eq!(deleted.shape(), (0, 0, 1));
        assert_eq!(deleted.deleted[0].status, EntityStatus::Deleted);
        assert!(catalog.delete(&database.guid).await.unwrap().is_empty());

        let restored = catalog
            .restore(AssetType::Database, &database.qualified_name)
            .await
            .unwrap();
        assert_eq!(restored.updated[0].status, EntityStatus::Active);

        let purged = catalog.purge(&database.guid).await.unwrap();
        assert_eq!(purged.shape(), (0, 0, 1));
        assert!(catalog
            .get_by_guid(&database.guid)
            .await
            .unwrap_err()
            .is_not_found());

        let audit = catalog
            .audit_search(&AuditSearchRequest::for_guid(&database.guid))
            .await
            .unwrap();
        let actions: Vec<AuditAction> = audit.entries.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![
                AuditAction::EntityPurge,
                AuditAction::EntityRestore,
                AuditAction::EntityDelete,
                AuditAction::EntityCreate,
            ]
        );
    }

    #[tokio::test]
    async fn test_noop_update_is_empty_but_audited() {
        let catalog = InMemoryCatalog::new();
        let (_, database) = connection_and_database(&catalog).await;

        let first = catalog
            .update(AssetUpdater::for_asset(&database).description("sales"))
            .await
            .unwrap();
        assert_eq!(first.shape(), (0, 1, 0));

        let again = catalog
            .update(AssetUpdater::for_asset(&database).description("sales"))
            .await
            .unwrap();
        assert!(again.is_empty());

        let audit = catalog
            .audit_search(&AuditSearchRequest::for_guid(&database.guid))
            .await
            .unwrap();
        assert!(audit.entries[0].is_noop());
        assert!(!audit.entries[1].is_noop());
    }

    #[tokio::test]
    async fn test_glossary_names_are_assigned() {
        let catalog = InMemoryCatalog::new();
        let glossary = catalog
            .save(Asset::glossary("Business"))
            .await
            .unwrap()
            .created
            .remove(0);
        let term = catalog
            .save(Asset::glossary_term("Revenue", &glossary.guid))
            .await
            .unwrap();

        assert_eq!(term.shape(), (1, 1, 0));
        assert!(term.created[0]
            .qualified_name
            .ends_with(&format!("@{}", glossary.qualified_name)));
        assert_ne!(glossary.qualified_name, glossary.name);
    }

    #[tokio::test]
    async fn test_stale_see_also_reference_is_not_found() {
        let catalog = InMemoryCatalog::new();
        let glossary = catalog.save(Asset::glossary("G")).await.unwrap().created.remove(0);
        let first = catalog
            .save(Asset::glossary_term("A", &glossary.guid))
            .await
            .unwrap()
            .created
            .remove(0);
        let second = catalog
            .save(Asset::glossary_term("B", &glossary.guid))
            .await
            .unwrap()
            .created
            .remove(0);
        catalog.purge(&second.guid).await.unwrap();

        let error = catalog
            .update(AssetUpdater::for_asset(&first).see_also(vec![second.guid.clone()]))
            .await
            .unwrap_err();
        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn test_rejected_tags_leave_asset_and_audit_untouched() {
        let catalog = InMemoryCatalog::new();
        let (_, database) = connection_and_database(&catalog).await;
        let before = catalog
            .audit_search(&AuditSearchRequest::for_guid(&database.guid))
            .await
            .unwrap();

        let error = catalog
            .add_tags(
                AssetType::Database,
                &database.qualified_name,
                vec!["PII".to_string(), " ".to_string()],
            )
            .await
            .unwrap_err();
        assert!(matches!(error, CatalogError::InvalidRequest(_)));

        let after = catalog
            .audit_search(&AuditSearchRequest::for_guid(&database.guid))
            .await
            .unwrap();
        assert_eq!(after.total_count, before.total_count);
        assert!(after
            .entries
            .iter()
            .all(|entry| entry.action != AuditAction::ClassificationAdd));

        let stored = catalog.get_by_guid(&database.guid).await.unwrap();
        assert!(stored.tags.is_empty());
    }

    #[tokio::test]
    async fn test_tags_add_and_remove() {
        let catalog = InMemoryCatalog::new();
        let (_, database) = connection_and_database(&catalog).await;

        let added = catalog
            .add_tags(
                AssetType::Database,
                &database.qualified_name,
                vec!["PII".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(added.updated[0].tags, vec!["PII".to_string()]);

        catalog
            .remove_tag(AssetType::Database, &database.qualified_name, "PII")
            .await
            .unwrap();
        let error = catalog
            .remove_tag(AssetType::Database, &database.qualified_name, "PII")
            .await
            .unwrap_err();
        assert!(error.is_not_found());

        let tagged = catalog
            .search(&SearchRequest::new().filter(SearchFilter::Tag("PII".to_string())))
            .await
            .unwrap();
        assert_eq!(tagged.approximate_count, 0);
    }

    #[tokio::test]
    async fn test_custom_metadata_merge_replace_and_remove() {
        let catalog = InMemoryCatalog::new();
        let (_, database) = connection_and_database(&catalog).await;
        let definition = catalog
            .create_custom_metadata(
                CustomMetadataDef::new("Quality")
                    .with_attribute(AttributeDef::new("Score", AttributeType::Integer))
                    .with_attribute(AttributeDef::new("Owner", AttributeType::String)),
            )
            .await
            .unwrap();
        let score = definition.internal_attribute_name("Score").unwrap().to_string();
        let owner = definition.internal_attribute_name("Owner").unwrap().to_string();

        catalog
            .update_custom_metadata(
                &database.guid,
                "Quality",
                BTreeMap::from([("Score".to_string(), json!(7))]),
            )
            .await
            .unwrap();
        let merged = catalog
            .update_custom_metadata(
                &database.guid,
                "Quality",
                BTreeMap::from([("Owner".to_string(), json!("ana"))]),
            )
            .await
            .unwrap();
        let asset = &merged.updated[0];
        assert_eq!(
            asset.custom_metadata_value(&definition.internal_name, &score),
            Some(&json!(7))
        );

        let replaced = catalog
            .replace_custom_metadata(
                &database.guid,
                "Quality",
                BTreeMap::from([("Owner".to_string(), json!("bo"))]),
            )
            .await
            .unwrap();
        let asset = &replaced.updated[0];
        assert_eq!(asset.custom_metadata_value(&definition.internal_name, &score), None);
        assert_eq!(
            asset.custom_metadata_value(&definition.internal_name, &owner),
            Some(&json!("bo"))
        );

        let wrong_type = catalog
            .update_custom_metadata(
                &database.guid,
                "Quality",
                BTreeMap::from([("Score".to_string(), json!("high"))]),
            )
            .await
            .unwrap_err();
        assert!(wrong_type.is_invalid_request());

        assert!(matches!(
            catalog.purge_custom_metadata("Quality").await,
            Err(CatalogError::Conflict(_))
        ));
        catalog
            .remove_custom_metadata(&database.guid, "Quality")
            .await
            .unwrap();
        catalog.purge_custom_metadata("Quality").await.unwrap();
    }
}
