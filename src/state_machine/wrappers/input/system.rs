/// The [`SystemResource`] trait marks a value the runner draws from the ambient system context,
/// such as the wall clock.
///
/// Machines never call [`generate`](SystemResource::generate) themselves. The runner does, and
/// hands the value over through [`SystemInput::System`] so replays stay reproducible.
pub trait SystemResource {
    /// Produce an instance of this resource from the implicit system context alone.
    fn generate() -> Self;
}

/// A [`StateMachine`](crate::state_machine::StateMachine) input wrapper that interleaves
/// regular input `I` with system resource updates `S`.
#[derive(Debug, Clone, PartialEq)]
pub enum SystemInput<I, S> {
    Input(I),
    System(S),
}

impl<I, S: SystemResource> SystemInput<I, S> {
    /// Sample the system resource right now.
    pub fn sample_system() -> Self {
        Self::System(S::generate())
    }
}
