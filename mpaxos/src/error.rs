use std::io;
use std::time::Duration;

use thiserror::Error;

/// Failures at the transport seam. None of these reach the application
/// API; the proposer counts any of them as a vote that never arrived.
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("meet io related error")]
    IoError(#[from] io::Error),
    #[error("message codec error")]
    CodecError(#[from] bincode::Error),
    #[error("no reply within {0:?}")]
    Timeout(Duration),
}
