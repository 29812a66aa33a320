//! Systematic rateless encoder.

use crate::codec::Codec;
use crate::error::Error;

/// Encodes one message into an unbounded stream of blocks.
///
/// The message buffer is borrowed for the life of the encoder; the first
/// `block_count()` output ids reproduce it verbatim (zero-padded at the
/// final block), every later id is a fresh parity block.
///
/// ```no_run
/// # fn main() -> Result<(), riptide_fec::Error> {
/// let message = [0u8; 64 * 1300];
/// let encoder = riptide_fec::Encoder::new(&message, 1300)?;
/// let mut block = [0u8; 1300];
/// for id in 0..encoder.block_count() + 8 {
///     encoder.write(id, &mut block);
///     // hand (id, block) to the transport
/// }
/// # Ok(())
/// # }
/// ```
pub struct Encoder<'a> {
    codec: Codec<'a>,
}

impl<'a> Encoder<'a> {
    /// Prepares `message` for streaming with the given block size.
    ///
    /// Solves the check matrix up front; the per-block `write` cost after
    /// that is a handful of block XORs.
    pub fn new(message: &'a [u8], block_bytes: usize) -> Result<Encoder<'a>, Error> {
        crate::init()?;
        Ok(Encoder {
            codec: Codec::new_encoder(message, block_bytes)?,
        })
    }

    /// Number of message blocks N.
    pub fn block_count(&self) -> u32 {
        self.codec.block_count()
    }

    /// Seed for the sparse peeling rows.
    pub fn p_seed(&self) -> u32 {
        self.codec.p_seed()
    }

    /// Seed for the dense and heavy rows.
    pub fn d_seed(&self) -> u32 {
        self.codec.d_seed()
    }

    /// Writes output block `id` into `block_out`, which must be exactly
    /// the block size. Pure and idempotent for a given id.
    pub fn write(&self, id: u32, block_out: &mut [u8]) {
        self.codec.encode(id, block_out);
    }
}
