//! Shader program descriptors and compile status.

/// Source code for the stages of a graphics program.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ProgramDescriptor {
    /// Debug label.
    pub label: Option<String>,
    /// Vertex stage source.
    pub vertex_source: String,
    /// Fragment stage source.
    pub fragment_source: String,
}

impl ProgramDescriptor {
    /// Create a program from vertex and fragment sources.
    pub fn new(vertex_source: impl Into<String>, fragment_source: impl Into<String>) -> Self {
        Self {
            label: None,
            vertex_source: vertex_source.into(),
            fragment_source: fragment_source.into(),
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Compilation state of a program, polled by the code that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProgramStatus {
    /// Waiting for the driver thread to compile it.
    Compiling = 0,
    /// Ready for use in a pipeline.
    Compiled = 1,
    /// The driver rejected it; see the program's diagnostic.
    FailedCompile = 2,
}

impl ProgramStatus {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Compiled,
            2 => Self::FailedCompile,
            _ => Self::Compiling,
        }
    }
}
