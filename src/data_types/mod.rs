pub mod dataset;
pub mod dimension;
pub mod measurement;
pub mod settings;
pub mod viewport;

pub use dataset::*;
pub use dimension::*;
pub use measurement::*;
pub use settings::*;
pub use viewport::*;
