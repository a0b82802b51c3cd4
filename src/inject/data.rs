use crate::comp::ComponentType;

/// Binds one declared field to the component type it requires.
///
/// The index in group is resolved once, after the query of the owning aggregate is known.
#[derive(Debug, Clone)]
pub struct InjectionData {
    /// The required component type and access mode.
    pub component_type: ComponentType,
    /// The name of the declared field.
    pub field_name:     &'static str,
    /// Whether the field only allows reading.
    pub is_read_only:   bool,
    index_in_group:     Option<usize>,
}

impl InjectionData {
    /// Creates an unbound descriptor.
    pub fn new(
        component_type: ComponentType,
        field_name: &'static str,
        is_read_only: bool,
    ) -> Self {
        Self { component_type, field_name, is_read_only, index_in_group: None }
    }

    /// The position of the component type in the matched group, or `None` if not bound yet.
    pub fn index_in_group(&self) -> Option<usize> { self.index_in_group }

    /// Records the position of the component type in the matched group.
    ///
    /// # Panics
    /// Panics if the descriptor is already bound to another index.
    pub(crate) fn bind(&mut self, index: usize) {
        if let Some(previous) = self.index_in_group {
            assert_eq!(
                previous, index,
                "Field `{}` is already bound to index {previous}",
                self.field_name
            );
        }
        self.index_in_group = Some(index);
    }

    pub(crate) fn bound_index(&self) -> usize {
        self.index_in_group.expect("descriptor is bound during setup")
    }
}
