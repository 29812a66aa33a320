use thiserror::Error;

/// Failure modes of the codec.
///
/// Seed failures are terminal for an encoder; the decoder never surfaces
/// them because a failed triangulation just waits for more blocks.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("message_bytes / block_bytes is too small, try reducing block_bytes")]
    InputTooSmall,
    #[error("message_bytes / block_bytes is too large, try increasing block_bytes")]
    InputTooLarge,
    #[error("input parameters were incorrect")]
    BadInput,
    #[error("check matrix peel seed is not invertible for this block count")]
    BadPeelSeed,
    #[error("check matrix dense seed is not invertible for this block count")]
    BadDenseSeed,
    #[error("codec wants more blocks before it can solve the message")]
    NeedMoreBlocks,
    #[error("ran out of extra decoder rows, must give up on this message")]
    NeedMoreExtra,
    #[error("out of memory, try reducing the message size")]
    OutOfMemory,
}
