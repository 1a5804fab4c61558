//! In-memory store over persistent maps
//!
//! A transaction clones the table set (O(1) with `im`), works on the copy
//! while holding the store mutex, and swaps it in only on success.

use chrono::{DateTime, Utc};
use eam_artifact::{ArtifactId, ArtifactKind, ArtifactRecord, ArtifactRef, InitiativeId, UserId};
use im::{OrdMap, Vector};
use parking_lot::Mutex;

use super::{Store, StoreTx};
use crate::audit::AuditEvent;
use crate::conflict::{Conflict, ConflictId};
use crate::error::{StoreError, VcError};
use crate::initiative::{Initiative, Participant};
use crate::lock::Lock;
use crate::version::{BaselineEntry, ShadowVersion};

#[derive(Debug, Clone, Default)]
struct Tables {
    locks: OrdMap<ArtifactRef, Lock>,
    baselines: OrdMap<ArtifactRef, BaselineEntry>,
    revisions: OrdMap<(ArtifactRef, u64), BaselineEntry>,
    shadows: OrdMap<(ArtifactRef, InitiativeId), ShadowVersion>,
    initiatives: OrdMap<InitiativeId, Initiative>,
    participants: OrdMap<(InitiativeId, UserId), Participant>,
    conflicts: OrdMap<ConflictId, Conflict>,
    audit: Vector<AuditEvent>,
    sequences: OrdMap<ArtifactKind, i64>,
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn transaction<R, F>(&self, f: F) -> Result<R, VcError>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<R, VcError>,
    {
        let mut guard = self.tables.lock();
        let mut working = guard.clone();
        let result = f(&mut MemoryTx {
            tables: &mut working,
        })?;
        *guard = working;
        Ok(result)
    }
}

fn retain<K, V>(map: &OrdMap<K, V>, keep: impl Fn(&K, &V) -> bool) -> OrdMap<K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    map.iter()
        .filter(|(k, v)| keep(k, v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

struct MemoryTx<'a> {
    tables: &'a mut Tables,
}

impl StoreTx for MemoryTx<'_> {
    fn lock(&mut self, artifact: &ArtifactRef) -> Result<Option<Lock>, StoreError> {
        Ok(self.tables.locks.get(artifact).cloned())
    }

    fn insert_lock(&mut self, lock: &Lock) -> Result<(), StoreError> {
        if self.tables.locks.contains_key(&lock.artifact) {
            return Err(StoreError::LockExists(lock.artifact));
        }
        self.tables.locks.insert(lock.artifact, lock.clone());
        Ok(())
    }

    fn delete_lock(&mut self, artifact: &ArtifactRef) -> Result<bool, StoreError> {
        Ok(self.tables.locks.remove(artifact).is_some())
    }

    fn locks(&mut self, initiative: Option<&InitiativeId>) -> Result<Vec<Lock>, StoreError> {
        Ok(self
            .tables
            .locks
            .values()
            .filter(|l| initiative.map_or(true, |i| &l.initiative_id == i))
            .cloned()
            .collect())
    }

    fn delete_expired_locks(&mut self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let before = self.tables.locks.len();
        self.tables.locks = retain(&self.tables.locks, |_, l| l.is_active(now));
        Ok(before - self.tables.locks.len())
    }

    fn baseline(&mut self, artifact: &ArtifactRef) -> Result<Option<BaselineEntry>, StoreError> {
        Ok(self.tables.baselines.get(artifact).cloned())
    }

    fn baselines(&mut self, kind: ArtifactKind) -> Result<Vec<BaselineEntry>, StoreError> {
        Ok(self
            .tables
            .baselines
            .values()
            .filter(|b| b.artifact.kind == kind)
            .cloned()
            .collect())
    }

    fn put_baseline(&mut self, entry: &BaselineEntry) -> Result<(), StoreError> {
        self.tables
            .revisions
            .insert((entry.artifact, entry.revision), entry.clone());
        self.tables.baselines.insert(entry.artifact, entry.clone());
        Ok(())
    }

    fn delete_baseline(&mut self, artifact: &ArtifactRef) -> Result<bool, StoreError> {
        self.tables.revisions = retain(&self.tables.revisions, |(a, _), _| a != artifact);
        Ok(self.tables.baselines.remove(artifact).is_some())
    }

    fn revision(
        &mut self,
        artifact: &ArtifactRef,
        revision: u64,
    ) -> Result<Option<ArtifactRecord>, StoreError> {
        Ok(self
            .tables
            .revisions
            .get(&(*artifact, revision))
            .map(|entry| entry.record.clone()))
    }

    fn revisions(&mut self, artifact: &ArtifactRef) -> Result<Vec<BaselineEntry>, StoreError> {
        Ok(self
            .tables
            .revisions
            .range((*artifact, 0)..=(*artifact, u64::MAX))
            .map(|(_, entry)| entry.clone())
            .collect())
    }

    fn next_artifact_id(&mut self, kind: ArtifactKind) -> Result<ArtifactId, StoreError> {
        let highest = self
            .tables
            .baselines
            .keys()
            .filter(|a| a.kind == kind)
            .map(|a| a.id.0)
            .max()
            .unwrap_or(0);
        let next = self
            .tables
            .sequences
            .get(&kind)
            .copied()
            .unwrap_or(0)
            .max(highest)
            + 1;
        self.tables.sequences.insert(kind, next);
        Ok(ArtifactId(next))
    }

    fn shadow(
        &mut self,
        artifact: &ArtifactRef,
        initiative: &InitiativeId,
    ) -> Result<Option<ShadowVersion>, StoreError> {
        Ok(self
            .tables
            .shadows
            .get(&(*artifact, initiative.clone()))
            .cloned())
    }

    fn shadows_for_initiative(
        &mut self,
        initiative: &InitiativeId,
    ) -> Result<Vec<ShadowVersion>, StoreError> {
        Ok(self
            .tables
            .shadows
            .values()
            .filter(|s| &s.initiative_id == initiative)
            .cloned()
            .collect())
    }

    fn shadows_for_artifact(&mut self, artifact: &ArtifactRef) -> Result<Vec<ShadowVersion>, StoreError> {
        Ok(self
            .tables
            .shadows
            .values()
            .filter(|s| &s.artifact == artifact)
            .cloned()
            .collect())
    }

    fn put_shadow(&mut self, shadow: &ShadowVersion) -> Result<(), StoreError> {
        self.tables.shadows.insert(
            (shadow.artifact, shadow.initiative_id.clone()),
            shadow.clone(),
        );
        Ok(())
    }

    fn delete_shadow(
        &mut self,
        artifact: &ArtifactRef,
        initiative: &InitiativeId,
    ) -> Result<bool, StoreError> {
        Ok(self
            .tables
            .shadows
            .remove(&(*artifact, initiative.clone()))
            .is_some())
    }

    fn initiative(&mut self, id: &InitiativeId) -> Result<Option<Initiative>, StoreError> {
        Ok(self.tables.initiatives.get(id).cloned())
    }

    fn initiatives(&mut self) -> Result<Vec<Initiative>, StoreError> {
        Ok(self.tables.initiatives.values().cloned().collect())
    }

    fn put_initiative(&mut self, initiative: &Initiative) -> Result<(), StoreError> {
        self.tables
            .initiatives
            .insert(initiative.initiative_id.clone(), initiative.clone());
        Ok(())
    }

    fn participants(&mut self, id: &InitiativeId) -> Result<Vec<Participant>, StoreError> {
        Ok(self
            .tables
            .participants
            .values()
            .filter(|p| &p.initiative_id == id)
            .cloned()
            .collect())
    }

    fn participant(
        &mut self,
        id: &InitiativeId,
        user: UserId,
    ) -> Result<Option<Participant>, StoreError> {
        Ok(self.tables.participants.get(&(id.clone(), user)).cloned())
    }

    fn put_participant(&mut self, participant: &Participant) -> Result<(), StoreError> {
        self.tables.participants.insert(
            (participant.initiative_id.clone(), participant.user_id),
            participant.clone(),
        );
        Ok(())
    }

    fn conflict(&mut self, id: &ConflictId) -> Result<Option<Conflict>, StoreError> {
        Ok(self.tables.conflicts.get(id).cloned())
    }

    fn conflicts(&mut self, initiative: &InitiativeId) -> Result<Vec<Conflict>, StoreError> {
        Ok(self
            .tables
            .conflicts
            .values()
            .filter(|c| &c.initiative_id == initiative)
            .cloned()
            .collect())
    }

    fn conflicts_for_artifact(&mut self, artifact: &ArtifactRef) -> Result<Vec<Conflict>, StoreError> {
        Ok(self
            .tables
            .conflicts
            .values()
            .filter(|c| &c.artifact == artifact)
            .cloned()
            .collect())
    }

    fn put_conflict(&mut self, conflict: &Conflict) -> Result<(), StoreError> {
        self.tables
            .conflicts
            .insert(conflict.id.clone(), conflict.clone());
        Ok(())
    }

    fn delete_conflicts(&mut self, initiative: &InitiativeId) -> Result<usize, StoreError> {
        let before = self.tables.conflicts.len();
        self.tables.conflicts = retain(&self.tables.conflicts, |_, c| &c.initiative_id != initiative);
        Ok(before - self.tables.conflicts.len())
    }

    fn last_audit(&mut self) -> Result<Option<AuditEvent>, StoreError> {
        Ok(self.tables.audit.last().cloned())
    }

    fn append_audit(&mut self, event: &AuditEvent) -> Result<(), StoreError> {
        self.tables.audit.push_back(event.clone());
        Ok(())
    }

    fn audit(&mut self, artifact: Option<&ArtifactRef>) -> Result<Vec<AuditEvent>, StoreError> {
        Ok(self
            .tables
            .audit
            .iter()
            .filter(|e| artifact.map_or(true, |a| e.artifact.as_ref() == Some(a)))
            .cloned()
            .collect())
    }
}
