pub mod system;

pub use system::{SystemInput, SystemResource};
