use std::error::Error;
use std::fmt;

/// Exhaustion of one of the machine's memory regions.
///
/// These are fatal to the running computation: no operation returns a
/// sentinel value in place of memory it could not get, and a machine that
/// reported one is not left in a resumable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceError {
    HeapOverflow,
    LocalOverflow,
    TrailOverflow,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResourceError::HeapOverflow => write!(f, "global stack overflow"),
            ResourceError::LocalOverflow => write!(f, "local stack overflow"),
            ResourceError::TrailOverflow => write!(f, "trail overflow"),
        }
    }
}

impl Error for ResourceError {}

pub type MachineResult<T> = Result<T, ResourceError>;
