use std::fmt;

/// How a group picks its particles. Resolution into concrete particle indices is done by
/// the numerical engine; the coordinator only stores and forwards the selector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupSelector {
    All,
    Type(String),
    TagRange { first: u32, last: u32 },
}

/// A named, immutable subset of particles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Group {
    name: String,
    selector: GroupSelector,
}

impl Group {
    pub fn new(name: impl Into<String>, selector: GroupSelector) -> Self {
        Self {
            name: name.into(),
            selector,
        }
    }

    /// Every particle in the system.
    pub fn all() -> Self {
        Self::new("all", GroupSelector::All)
    }

    /// All particles of the named type. The group takes the type's name.
    pub fn of_type(type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self::new(type_name.clone(), GroupSelector::Type(type_name))
    }

    /// Particles with tags in `first..=last`.
    pub fn tags(name: impl Into<String>, first: u32, last: u32) -> Self {
        Self::new(name, GroupSelector::TagRange { first, last })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn selector(&self) -> &GroupSelector {
        &self.selector
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
