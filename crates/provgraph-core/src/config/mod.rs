pub mod settings;

pub use settings::{ComponentSpec, KernelConfig};
