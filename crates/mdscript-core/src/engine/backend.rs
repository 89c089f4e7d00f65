use super::error::IntegrateError;
use crate::core::exec::ExecutionMode;
use crate::core::recording::{Journal, RecordingFactory};
use crate::core::stepper::StepperFactory;
use std::rc::Rc;

/// The stepper factories available to a context, one per execution backend.
///
/// An engine built without accelerator support provides no parallel factory; selecting the
/// parallel backend then fails the same way an unrecognized backend would.
#[derive(Debug)]
pub struct Backends {
    serial: Box<dyn StepperFactory>,
    parallel: Option<Box<dyn StepperFactory>>,
}

impl Backends {
    pub fn new(serial: Box<dyn StepperFactory>) -> Self {
        Self {
            serial,
            parallel: None,
        }
    }

    pub fn with_parallel(mut self, parallel: Box<dyn StepperFactory>) -> Self {
        self.parallel = Some(parallel);
        self
    }

    /// Serial and parallel recording factories sharing `journal`.
    pub fn recording(journal: &Rc<Journal>) -> Self {
        Self::new(Box::new(RecordingFactory::new(
            ExecutionMode::Cpu,
            journal.clone(),
        )))
        .with_parallel(Box::new(RecordingFactory::new(
            ExecutionMode::Gpu,
            journal.clone(),
        )))
    }

    /// Picks the factory for `mode`.
    pub fn select(&self, mode: ExecutionMode) -> Result<&dyn StepperFactory, IntegrateError> {
        match mode {
            ExecutionMode::Cpu => Ok(self.serial.as_ref()),
            ExecutionMode::Gpu => self.parallel.as_deref().ok_or_else(|| {
                IntegrateError::Configuration(format!(
                    "Invalid execution mode: '{mode}' is not available in this engine"
                ))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_the_factory_matching_the_mode() {
        let backends = Backends::recording(&Journal::new());
        assert_eq!(
            backends.select(ExecutionMode::Cpu).unwrap().backend(),
            ExecutionMode::Cpu
        );
        assert_eq!(
            backends.select(ExecutionMode::Gpu).unwrap().backend(),
            ExecutionMode::Gpu
        );
    }

    #[test]
    fn missing_parallel_factory_is_a_configuration_error() {
        let serial_only = Backends::new(Box::new(RecordingFactory::new(
            ExecutionMode::Cpu,
            Journal::new(),
        )));
        let result = serial_only.select(ExecutionMode::Gpu);
        assert!(matches!(result, Err(IntegrateError::Configuration(msg)) if msg.contains("Invalid execution mode")));
    }
}
