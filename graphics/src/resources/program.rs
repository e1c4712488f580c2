//! Shader program resource.

use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::Mutex;

use crate::types::{ProgramDescriptor, ProgramStatus};

use super::ResourceCore;

/// A linked vertex + fragment program.
///
/// Compilation happens on the driver thread. Callers poll [`Program::status`]
/// and, on failure, read the compiler log from [`Program::diagnostic`].
/// Draws issued with a failed program are skipped.
pub struct Program {
    pub(super) core: ResourceCore,
    descriptor: ProgramDescriptor,
    status: AtomicU8,
    diagnostic: Mutex<Option<String>>,
}

impl Program {
    pub(crate) fn new(core: ResourceCore, descriptor: ProgramDescriptor) -> Self {
        Self {
            core,
            descriptor,
            status: AtomicU8::new(ProgramStatus::Compiling as u8),
            diagnostic: Mutex::new(None),
        }
    }

    /// Current compilation status.
    pub fn status(&self) -> ProgramStatus {
        ProgramStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Compiler log of a failed compilation.
    pub fn diagnostic(&self) -> Option<String> {
        self.diagnostic.lock().clone()
    }

    /// Get the program descriptor.
    pub fn descriptor(&self) -> &ProgramDescriptor {
        &self.descriptor
    }

    /// Get the program label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    pub(crate) fn set_failed(&self, log: String) {
        *self.diagnostic.lock() = Some(log);
        self.status.store(ProgramStatus::FailedCompile as u8, Ordering::Release);
    }

    pub(crate) fn set_compiled(&self) {
        self.status.store(ProgramStatus::Compiled as u8, Ordering::Release);
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("status", &self.status())
            .field("label", &self.descriptor.label)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ResourceKind;
    use crate::resources::tests::detached_core;

    #[test]
    fn test_status_transitions() {
        let program = Program::new(
            detached_core(ResourceKind::Program),
            ProgramDescriptor::new("vs", "fs"),
        );
        assert_eq!(program.status(), ProgramStatus::Compiling);
        assert_eq!(program.diagnostic(), None);

        program.set_failed("fragment shader: empty source".to_string());
        assert_eq!(program.status(), ProgramStatus::FailedCompile);
        assert_eq!(program.diagnostic().as_deref(), Some("fragment shader: empty source"));
    }
}
