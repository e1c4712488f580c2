//! Draw call arguments.

/// Arguments for a non-indexed draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawArgs {
    /// Number of vertices to draw.
    pub vertex_count: u32,
    /// Index of the first vertex to draw.
    pub first_vertex: u32,
    /// Number of instances to draw.
    pub instance_count: u32,
    /// Instance ID of the first instance to draw.
    pub first_instance: u32,
}

impl DrawArgs {
    /// Create draw arguments.
    pub fn new(
        vertex_count: u32,
        first_vertex: u32,
        instance_count: u32,
        first_instance: u32,
    ) -> Self {
        Self {
            vertex_count,
            first_vertex,
            instance_count,
            first_instance,
        }
    }

    /// A single instance of `vertex_count` vertices.
    pub fn vertices(vertex_count: u32) -> Self {
        Self::new(vertex_count, 0, 1, 0)
    }
}

/// Arguments for an indexed draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawIndexedArgs {
    /// Number of indices to draw.
    pub index_count: u32,
    /// Index of the first index to draw.
    pub first_index: u32,
    /// Value added to each index before fetching vertices.
    pub base_vertex: i32,
    /// Number of instances to draw.
    pub instance_count: u32,
    /// Instance ID of the first instance to draw.
    pub first_instance: u32,
}

impl DrawIndexedArgs {
    /// Create indexed draw arguments.
    pub fn new(
        index_count: u32,
        first_index: u32,
        base_vertex: i32,
        instance_count: u32,
        first_instance: u32,
    ) -> Self {
        Self {
            index_count,
            first_index,
            base_vertex,
            instance_count,
            first_instance,
        }
    }

    /// A single instance of `index_count` indices.
    pub fn indices(index_count: u32) -> Self {
        Self::new(index_count, 0, 0, 1, 0)
    }
}
