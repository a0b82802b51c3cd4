use indexmap::IndexSet;

use crate::comp::{AccessMode, ComponentType};
use crate::util::DbgTypeId;

/// The component types a system reads and writes, for job scheduling.
///
/// A type is in at most one of the two sets; writing supersedes reading.
#[derive(Debug, Default, Clone)]
pub struct ComponentDependencies {
    readers: IndexSet<DbgTypeId>,
    writers: IndexSet<DbgTypeId>,
}

impl ComponentDependencies {
    /// Records an access. Subtractive requirements access no data and are ignored.
    pub fn add_reader_writer(&mut self, ty: ComponentType) {
        match ty.access {
            AccessMode::ReadOnly => {
                if !self.writers.contains(&ty.ty) {
                    self.readers.insert(ty.ty);
                }
            }
            AccessMode::ReadWrite => {
                self.readers.shift_remove(&ty.ty);
                self.writers.insert(ty.ty);
            }
            AccessMode::Subtractive => {}
        }
    }

    /// Merges all accesses of `other` into `self`.
    pub fn merge(&mut self, other: &Self) {
        for &ty in &other.writers {
            self.readers.shift_remove(&ty);
            self.writers.insert(ty);
        }
        for &ty in &other.readers {
            if !self.writers.contains(&ty) {
                self.readers.insert(ty);
            }
        }
    }

    /// The types only read.
    pub fn readers(&self) -> impl Iterator<Item = DbgTypeId> + '_ { self.readers.iter().copied() }

    /// The types written.
    pub fn writers(&self) -> impl Iterator<Item = DbgTypeId> + '_ { self.writers.iter().copied() }

    /// Whether `ty` is only read.
    pub fn is_reader(&self, ty: DbgTypeId) -> bool { self.readers.contains(&ty) }

    /// Whether `ty` is written.
    pub fn is_writer(&self, ty: DbgTypeId) -> bool { self.writers.contains(&ty) }

    /// Whether there are no accesses.
    pub fn is_empty(&self) -> bool { self.readers.is_empty() && self.writers.is_empty() }

    /// Checks whether two jobs with these dependencies can run concurrently.
    pub fn check_conflicts_with(&self, other: &Self) -> Result<(), String> {
        // ensure that `this` holds the unique access to generate correct error message
        for (this, that) in [(self, other), (other, self)] {
            if let Some(ty) = this.writers.iter().find(|ty| that.writers.contains(*ty)) {
                return Err(format!(
                    "unique access to {ty} requested but unique access is requested again by \
                     another job"
                ));
            }
            if let Some(ty) = this.writers.iter().find(|ty| that.readers.contains(*ty)) {
                return Err(format!(
                    "unique access to {ty} requested but shared access is requested by another \
                     job"
                ));
            }
        }
        Ok(())
    }
}
