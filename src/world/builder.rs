use super::World;

/// The default allocation hint passed to [`Manager::on_create`](super::Manager::on_create).
pub const DEFAULT_CAPACITY_HINT: usize = 10;

/// This type is used to configure a world before it is created.
#[derive(Debug, Clone)]
pub struct Builder {
    pub(crate) name:          String,
    pub(crate) capacity_hint: usize,
}

impl Default for Builder {
    fn default() -> Self {
        Self { name: String::from("Default World"), capacity_hint: DEFAULT_CAPACITY_HINT }
    }
}

impl Builder {
    /// Creates a builder with the default configuration.
    pub fn new() -> Self { Self::default() }

    /// Sets the name of the world, used in diagnostics.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the allocation hint passed to each manager when it is created.
    pub fn capacity_hint(mut self, capacity_hint: usize) -> Self {
        self.capacity_hint = capacity_hint;
        self
    }

    /// Constructs the world from the builder.
    pub fn build(self) -> World { World::from_builder(self) }
}
