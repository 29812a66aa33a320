//! Order-independent decoder.

use crate::codec::Codec;
use crate::error::Error;

/// Collects `(id, block)` pairs until the message can be reconstructed.
///
/// Any N distinct blocks usually suffice; when the first N happen to be
/// rank-deficient the decoder keeps accepting blocks and folds each one
/// into the partially solved system until a solution exists.
///
/// ```no_run
/// # fn main() -> Result<(), riptide_fec::Error> {
/// let mut decoder = riptide_fec::Decoder::new(64 * 1300, 1300)?;
/// # let blocks: Vec<(u32, Vec<u8>)> = vec![];
/// for (id, block) in blocks {
///     if decoder.read(id, &block)? {
///         break;
///     }
/// }
/// let mut message = vec![0u8; 64 * 1300];
/// decoder.reconstruct(&mut message)?;
/// # Ok(())
/// # }
/// ```
pub struct Decoder {
    codec: Codec<'static>,
}

impl Decoder {
    /// Prepares to decode a message of `message_bytes` split into blocks
    /// of `block_bytes`.
    pub fn new(message_bytes: usize, block_bytes: usize) -> Result<Decoder, Error> {
        crate::init()?;
        Ok(Decoder {
            codec: Codec::new_decoder(message_bytes, block_bytes)?,
        })
    }

    /// Number of message blocks N.
    pub fn block_count(&self) -> u32 {
        self.codec.block_count()
    }

    /// Feeds one received block. Returns `Ok(true)` once the message is
    /// solvable; further calls are no-ops. Feeding order does not matter.
    pub fn read(&mut self, id: u32, block_in: &[u8]) -> Result<bool, Error> {
        self.codec.decode_feed(id, block_in)
    }

    /// Whether enough blocks have arrived to reconstruct.
    pub fn is_ready(&self) -> bool {
        self.codec.is_ready()
    }

    /// Writes the decoded message into `message_out`, whose length must be
    /// exactly the message size given to `new`.
    pub fn reconstruct(&mut self, message_out: &mut [u8]) -> Result<(), Error> {
        self.codec.reconstruct(message_out)
    }
}
