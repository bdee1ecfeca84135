/// Type of body, determining how it behaves in the simulation
///
/// The type follows from the mass: a body with zero mass is static.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyType {
    /// Dynamic bodies are fully simulated (affected by forces, collisions, etc.)
    Dynamic,

    /// Static bodies don't move and aren't affected by forces or collisions
    Static,
}
