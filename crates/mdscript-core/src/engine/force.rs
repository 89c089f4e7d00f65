use super::error::IntegrateError;
use super::ids::ForceId;
use crate::core::stepper::ForceHandle;
use slotmap::SlotMap;
use tracing::warn;

/// An external force compute tracked by the context.
#[derive(Debug)]
pub struct Force {
    name: String,
    enabled: bool,
    handle: Option<ForceHandle>,
}

impl Force {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn handle(&self) -> Option<&ForceHandle> {
        self.handle.as_ref()
    }

    pub(crate) fn compute(&self) -> Result<&ForceHandle, IntegrateError> {
        self.handle.as_ref().ok_or_else(|| {
            IntegrateError::InternalConsistency(format!(
                "force '{}' has no backing compute",
                self.name
            ))
        })
    }

    #[cfg(test)]
    pub(crate) fn detach(&mut self) {
        self.handle = None;
    }
}

/// Every force ever added, in the order it was added.
#[derive(Debug, Default)]
pub struct ForceRegistry {
    forces: SlotMap<ForceId, Force>,
    order: Vec<ForceId>,
}

impl ForceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, handle: ForceHandle) -> ForceId {
        let name = handle.borrow().name().to_string();
        let id = self.forces.insert(Force {
            name,
            enabled: true,
            handle: Some(handle),
        });
        self.order.push(id);
        id
    }

    pub fn get(&self, id: ForceId) -> Result<&Force, IntegrateError> {
        self.forces.get(id).ok_or(IntegrateError::UnknownForce(id))
    }

    pub(crate) fn get_mut(&mut self, id: ForceId) -> Result<&mut Force, IntegrateError> {
        self.forces
            .get_mut(id)
            .ok_or(IntegrateError::UnknownForce(id))
    }

    /// Re-enables a force. Returns `false` (after a warning) if it was already enabled.
    pub fn enable(&mut self, id: ForceId) -> Result<bool, IntegrateError> {
        let force = self.get_mut(id)?;
        force.compute()?;
        if force.enabled {
            warn!(
                "Ignoring command to enable force '{}' that is already enabled",
                force.name
            );
            return Ok(false);
        }
        force.enabled = true;
        Ok(true)
    }

    /// Disables a force. Returns `false` (after a warning) if it was already disabled.
    pub fn disable(&mut self, id: ForceId) -> Result<bool, IntegrateError> {
        let force = self.get_mut(id)?;
        force.compute()?;
        if !force.enabled {
            warn!(
                "Ignoring command to disable force '{}' that is already disabled",
                force.name
            );
            return Ok(false);
        }
        force.enabled = false;
        Ok(true)
    }

    /// All tracked forces in insertion order, enabled or not.
    pub fn iter(&self) -> impl Iterator<Item = (ForceId, &Force)> {
        self.order
            .iter()
            .filter_map(|&id| self.forces.get(id).map(|f| (id, f)))
    }

    pub fn enabled(&self) -> impl Iterator<Item = (ForceId, &Force)> {
        self.iter().filter(|(_, f)| f.enabled)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
