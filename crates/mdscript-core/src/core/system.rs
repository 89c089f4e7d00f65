use super::exec::ExecutionMode;

/// The catalog of declared particle types, indexed in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParticleTypes {
    names: Vec<String>,
}

impl ParticleTypes {
    /// Builds the catalog. A name declared more than once keeps its first index.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut catalog = Self::default();
        for name in names {
            let name = name.into();
            if !catalog.names.contains(&name) {
                catalog.names.push(name);
            }
        }
        catalog
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name_by_type(&self, type_id: usize) -> Option<&str> {
        self.names.get(type_id).map(String::as_str)
    }

    pub fn type_by_name(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names.iter().map(String::as_str).enumerate()
    }
}

/// What a context knows about the simulated system once it has been initialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemDefinition {
    pub particle_types: ParticleTypes,
    pub exec_mode: ExecutionMode,
}

impl SystemDefinition {
    pub fn new(particle_types: ParticleTypes, exec_mode: ExecutionMode) -> Self {
        Self {
            particle_types,
            exec_mode,
        }
    }
}
