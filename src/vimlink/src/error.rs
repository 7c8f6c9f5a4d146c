use thiserror::Error;
use vimlink_core::InstallationError;
use vimlink_rpc::RpcError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("unexpected reply to {method}: expected {expected}")]
    UnexpectedReply {
        method: &'static str,
        expected: &'static str,
    },
    #[error("batched call {index} failed: {message}")]
    Batch { index: usize, message: String },
    #[error("view panicked while producing its lines")]
    ViewPanicked,
    #[error("failed to load installation id: {0}")]
    Installation(#[from] InstallationError),
    #[error("failed to open the host channel: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
