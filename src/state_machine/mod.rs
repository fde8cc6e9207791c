pub mod camera;
pub mod guidance;
pub mod navigation;
pub mod proximity;
pub mod smoothing;
pub mod wrappers;

/// The [`StateMachine`] trait provides calling semantics for the pure core of the engine and
/// marks the invariants that keep it deterministic.
///
/// # Functionality
/// A machine accepts a single [`Input`](StateMachine::Input) type, usually an enum of every kind
/// of event it reacts to, and yields a single [`Output`](StateMachine::Output) type that callers
/// drain with [`poll_output`](StateMachine::poll_output) until it returns `None`.
///
/// Keeping the dispatch in this trait lets the inherent impl of a machine focus on the actual
/// logic (smoothing a fix, deciding whether to recenter) instead of on how it is called.
///
/// # Invariants
/// Given the same sequence of inputs, a machine produces the same sequence of outputs. Replaying
/// a recorded session through the [`NavigationMachine`](navigation::NavigationMachine) must
/// reproduce every alert, access code and recenter exactly.
///
/// Implementors *must* uphold the following.
///
/// ## No Interior Mutability
/// State is mutated only through `&mut self`. No [`std::cell`] containers, no [`std::sync`]
/// locks and no shared smart pointers such as [`Arc`](std::sync::Arc), whose reference counts
/// are not pure.
///
/// ## No IO
/// No filesystem, network or geolocation access. Persisting the last known position, fetching a
/// route or a places listing and requesting a one-shot fix are all emitted as effects for the
/// runner to perform.
///
/// ### No System Time
/// Reading [`std::time::SystemTime`] or [`std::time::Instant`] is forbidden. Cooldowns, the
/// follow suppression window and recalibration throttling compare against a clock that arrives
/// as input.
///
/// ### No System RNG
/// Random values come from a PRNG seeded once at construction.
///
/// ## No Concurrency, No Async
/// Machines never spawn threads or tasks and never hold futures. Completions of effects are fed
/// back as ordinary inputs.
///
/// # Side Effects
/// Logging through `tracing` is allowed as long as no decision depends on it.
///
/// # Handling Time via Injection
/// The runner ([`Navigator`](crate::navigator::Navigator)) reads the clock and hands it over
/// through [`SystemInput::System`](wrappers::input::SystemInput::System) before each input. See
/// the [`wrappers`] module.
pub trait StateMachine {
    /// The type of input that is [processed](StateMachine::process_input) by the state machine.
    type Input;
    /// The type of output that is [polled](StateMachine::poll_output) by the state machine.
    type Output;

    /// Process the provided `input` into the state machine.
    fn process_input(&mut self, input: Self::Input);

    /// Poll the state machine for output, returning the first available output if present.
    fn poll_output(&mut self) -> Option<Self::Output>;
}
