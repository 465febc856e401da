/// GL object namespaces. Each namespace has its own client-id → service-id table.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IdNamespace {
    Buffers = 0,
    Framebuffers = 1,
    ProgramsAndShaders = 2,
    Renderbuffers = 3,
    Textures = 4,
    Queries = 5,
    VertexArrays = 6,
    Samplers = 7,
    TransformFeedbacks = 8,
    Syncs = 9,
    Valuebuffers = 10,
}

impl IdNamespace {
    pub const COUNT: usize = 11;

    pub const ALL: [IdNamespace; Self::COUNT] = [
        Self::Buffers,
        Self::Framebuffers,
        Self::ProgramsAndShaders,
        Self::Renderbuffers,
        Self::Textures,
        Self::Queries,
        Self::VertexArrays,
        Self::Samplers,
        Self::TransformFeedbacks,
        Self::Syncs,
        Self::Valuebuffers,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}
