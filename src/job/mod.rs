mod outcome;
mod request;
mod types;

pub use outcome::{Generation, JobOutcome, PollState};
pub use request::{Credentials, JobRequest};
pub use types::{Operation, Provider};
