pub mod decompose;
pub mod error;
pub mod parser;
pub mod quality;
pub mod state;

pub use error::CotError;
pub use parser::{contains_artifacts, parse_response, ParseLayer, ParsedAnswer};
pub use state::{CotConfig, CotController, CotResult, StepResult};
