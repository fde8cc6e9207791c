//! Wrappers that let a runner inject ambient system resources (the clock) into a pure
//! [`StateMachine`](super::StateMachine) as ordinary input.

pub mod input;
