use bevy::prelude::*;

use crate::components::SpawnedBy;

/// Live entities a boss has spawned, in spawn order, never more than `capacity`.
#[derive(Component, Clone, Debug, Default)]
pub struct SpawnedEntityRegistry {
    entries: Vec<Entity>,
    capacity: usize,
}

impl SpawnedEntityRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn remaining_capacity(&self) -> usize {
        self.capacity.saturating_sub(self.entries.len())
    }

    pub fn entries(&self) -> &[Entity] {
        &self.entries
    }

    /// Returns false when full or already tracked.
    pub fn try_register(&mut self, entity: Entity) -> bool {
        if self.is_full() || self.entries.contains(&entity) {
            return false;
        }
        self.entries.push(entity);
        true
    }

    /// Drops every entry `is_alive` rejects. Returns how many were removed.
    pub fn prune(&mut self, mut is_alive: impl FnMut(Entity) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entity| is_alive(*entity));
        before - self.entries.len()
    }
}

pub(crate) fn prune_registries(
    mut registries: Query<(Entity, &mut SpawnedEntityRegistry)>,
    spawned: Query<(), With<SpawnedBy>>,
) {
    for (owner, mut registry) in registries.iter_mut() {
        if registry.is_empty() {
            continue;
        }
        let removed = registry.prune(|entity| spawned.contains(entity));
        if removed > 0 {
            debug!(
                "[Nemesis spawn] {:?} lost {} adds ({} alive)",
                owner,
                removed,
                registry.len()
            );
        }
    }
}
