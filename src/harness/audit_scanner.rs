use crate::error::HarnessError;
use crate::model::{AuditAction, EntityAudit};

/// Cursor over a newest-first audit list that reads from the oldest entry forward.
///
/// No-op updates are skipped everywhere; `next_update_matching` also tolerates tag entries
/// and intermediate updates that do not satisfy its predicate.
#[derive(Debug, Clone)]
pub struct AuditScanner {
    entries: Vec<EntityAudit>,
    consumed: usize,
}

impl AuditScanner {
    pub fn new(newest_first: Vec<EntityAudit>) -> Self {
        Self {
            entries: newest_first,
            consumed: 0,
        }
    }

    pub fn has_next(&self) -> bool {
        self.consumed < self.entries.len()
    }

    pub fn remaining(&self) -> usize {
        self.entries.len() - self.consumed
    }

    pub fn peek_next(&self) -> Option<&EntityAudit> {
        if !self.has_next() {
            return None;
        }
        self.entries.get(self.entries.len() - 1 - self.consumed)
    }

    pub fn advance(&mut self) -> Option<EntityAudit> {
        let entry = self.peek_next().cloned();
        if entry.is_some() {
            self.consumed += 1;
        }
        entry
    }

    fn exhausted(&self, expected: &str) -> HarnessError {
        HarnessError::AuditExhausted {
            expected: expected.to_string(),
            scanned: self.consumed,
        }
    }

    /// Next meaningful entry, which must carry `action`
    pub fn next_expecting(&mut self, action: AuditAction) -> Result<EntityAudit, HarnessError> {
        loop {
            let entry = self
                .advance()
                .ok_or_else(|| self.exhausted(&action.to_string()))?;
            if entry.is_noop() {
                continue;
            }
            if entry.action == action {
                return Ok(entry);
            }
            return Err(HarnessError::UnexpectedAudit {
                expected: action.to_string(),
                found: entry.action,
                event_key: entry.event_key,
            });
        }
    }

    /// Next entity update whose snapshot satisfies `predicate`
    pub fn next_update_matching<P>(
        &mut self,
        description: &str,
        predicate: P,
    ) -> Result<EntityAudit, HarnessError>
    where
        P: Fn(&EntityAudit) -> bool,
    {
        loop {
            let entry = self.advance().ok_or_else(|| self.exhausted(description))?;
            if entry.is_noop() || entry.action.is_tag_action() {
                continue;
            }
            if entry.action != AuditAction::EntityUpdate {
                return Err(HarnessError::UnexpectedAudit {
                    expected: description.to_string(),
                    found: entry.action,
                    event_key: entry.event_key,
                });
            }
            if predicate(&entry) {
                return Ok(entry);
            }
            log::debug!("Tolerating intermediate update {}", entry.event_key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssetType, AuditDetail};
    use chrono::Utc;
    use serde_json::{json, Map, Value};

    fn audit(seq: u32, action: AuditAction, attributes: Vec<(&str, Value)>) -> EntityAudit {
        let attributes: Map<String, Value> = attributes
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        EntityAudit {
            entity_guid: "g".to_string(),
            entity_qualified_name: "default/snowflake/1/db".to_string(),
            type_name: AssetType::Database,
            action,
            user: "harness".to_string(),
            timestamp: Utc::now(),
            event_key: format!("g:{}", seq),
            detail: AuditDetail {
                attributes,
                ..AuditDetail::default()
            },
        }
    }

    fn owner_group_history() -> Vec<EntityAudit> {
        let mut oldest_first = vec![
            audit(1, AuditAction::EntityCreate, vec![("name", json!("db"))]),
            audit(2, AuditAction::EntityUpdate, vec![("ownerGroups", json!(["X"]))]),
            audit(3, AuditAction::EntityUpdate, vec![("ownerGroups", Value::Null)]),
        ];
        oldest_first.reverse();
        oldest_first
    }

    #[test]
    fn test_scans_oldest_to_newest() {
        let mut scanner = AuditScanner::new(owner_group_history());

        let create = scanner.next_expecting(AuditAction::EntityCreate).unwrap();
        assert_eq!(create.event_key, "g:1");

        let set = scanner
            .next_update_matching("owner group set", |e| {
                e.attribute("ownerGroups") == Some(&json!(["X"]))
            })
            .unwrap();
        assert_eq!(set.event_key, "g:2");

        let cleared = scanner
            .next_update_matching("owner group cleared", |e| {
                e.attribute("ownerGroups") == Some(&Value::Null)
            })
            .unwrap();
        assert_eq!(cleared.event_key, "g:3");
        assert!(!scanner.has_next());
    }

    #[test]
    fn test_exhaustion_is_reported() {
        let mut scanner = AuditScanner::new(owner_group_history());
        scanner.next_expecting(AuditAction::EntityCreate).unwrap();

        let error = scanner
            .next_update_matching("description set", |e| e.attribute("description").is_some())
            .unwrap_err();
        assert!(matches!(error, HarnessError::AuditExhausted { scanned: 3, .. }));
    }

    #[test]
    fn test_unexpected_action_fails() {
        let mut scanner = AuditScanner::new(owner_group_history());
        let error = scanner.next_expecting(AuditAction::EntityDelete).unwrap_err();
        assert!(matches!(
            error,
            HarnessError::UnexpectedAudit {
                found: AuditAction::EntityCreate,
                ..
            }
        ));
    }

    #[test]
    fn test_noop_and_tag_entries_are_skipped() {
        let mut oldest_first = vec![
            audit(1, AuditAction::EntityCreate, vec![]),
            audit(2, AuditAction::EntityUpdate, vec![]),
            audit(3, AuditAction::ClassificationAdd, vec![]),
            audit(4, AuditAction::EntityUpdate, vec![("description", json!("d"))]),
        ];
        oldest_first.reverse();
        let mut scanner = AuditScanner::new(oldest_first);

        assert_eq!(scanner.peek_next().map(|e| e.event_key.as_str()), Some("g:1"));
        scanner.next_expecting(AuditAction::EntityCreate).unwrap();
        assert_eq!(scanner.remaining(), 3);
        let update = scanner
            .next_update_matching("description", |e| e.attribute("description").is_some())
            .unwrap();
        assert_eq!(update.event_key, "g:4");
    }
}
