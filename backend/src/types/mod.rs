mod environment;
mod error;
mod extractors;

pub use environment::{Environment, DEFAULT_PORT};
pub use error::{ApiErrorResponse, AppError};
pub use extractors::ProofPayload;
