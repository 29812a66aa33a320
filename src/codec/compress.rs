//! (2) Compression: build the compact GE system out of the peel result.
//!
//! The peeled submatrix is conceptually diagonalised; only the mixing and
//! deferred columns of each peeled row carry information, and those land in
//! the N-row compression matrix. Deferred rows are copied into the GE
//! matrix, dense rows are synthesised by the shuffle code, heavy rows are
//! seeded from the dense seed, and an invertible overlay ties the dense
//! rows to the mixing columns.

use crate::params::{HEAVY_ROWS, LIST_TERM};
use crate::prng::CodecRng;
use crate::rowgen::shuffle_deck16;

use super::{Codec, Mark};

impl<'a> Codec<'a> {
    /// Assigns GE columns to deferred columns and seeds the compression
    /// matrix with their incidence bits.
    pub(super) fn set_deferred_columns(&mut self) {
        let mut ge_column_i = 0usize;
        let mut defer_i = self.defer_cols_head;
        while defer_i != LIST_TERM {
            let refs = &self.refs[defer_i as usize];
            for &row_i in &refs.rows[..refs.count as usize] {
                self.compress.flip_bit(row_i as usize, ge_column_i);
            }

            self.ge_col_map[ge_column_i] = defer_i;
            let column = &mut self.cols[defer_i as usize];
            column.ge_column = ge_column_i as u16;

            defer_i = column.next;
            ge_column_i += 1;
        }
        debug_assert_eq!(ge_column_i, self.defer_count);

        // Mixing columns occupy the remaining GE columns in order.
        for mix_i in 0..self.mix() {
            self.ge_col_map[self.defer_count + mix_i] = (self.n() + mix_i) as u16;
        }
    }

    /// Sets the three mixing-column bits for each deferred row and tags the
    /// row so later passes can recognise it as deferred.
    pub(super) fn set_mixing_columns_for_deferred_rows(&mut self) {
        let mut defer_row_i = self.defer_rows_head;
        while defer_row_i != LIST_TERM {
            let row = &mut self.rows[defer_row_i as usize];
            row.peel_column = LIST_TERM;
            let spec = row.spec;
            let next = row.next;

            for x in self.mix_columns(&spec) {
                self.compress
                    .flip_bit(defer_row_i as usize, self.defer_count + x as usize);
            }

            defer_row_i = next;
        }
    }

    /// Diagonalises the peeled rows in forward solution order, making the
    /// mixing/deferred columns of every row that references them dense and
    /// accumulating temporary block values in the peeled columns' slots.
    ///
    /// The first XOR of each row value is fused with the input-block copy
    /// through the `is_copied` flag.
    pub(super) fn peel_diagonal(&mut self) {
        let mut peel_row_i = self.peel_head;
        while peel_row_i != LIST_TERM {
            let (spec, next, peel_column_i) = {
                let row = &self.rows[peel_row_i as usize];
                (row.spec, row.next, row.peel_column)
            };

            for x in self.mix_columns(&spec) {
                self.compress
                    .flip_bit(peel_row_i as usize, self.defer_count + x as usize);
            }

            // The row's value starts as its input block, zero-padded.
            if !self.rows[peel_row_i as usize].is_copied {
                let src = self.input.block(peel_row_i as usize, self.block_bytes);
                self.recovery.set_ext(peel_column_i as usize, src);
                // No later row merges into this one, so is_copied can stay.
            }

            let ref_count = self.refs[peel_column_i as usize].count as usize;
            for ref_i in 0..ref_count {
                let ref_row_i = self.refs[peel_column_i as usize].rows[ref_i];
                if ref_row_i == peel_row_i {
                    continue;
                }

                self.compress
                    .xor_rows(ref_row_i as usize, peel_row_i as usize);

                let ref_column_i = self.rows[ref_row_i as usize].peel_column;
                if ref_column_i == LIST_TERM {
                    continue;
                }
                // Merge this row's value into the referencing peeled row,
                // fusing with its input copy on first contact.
                if self.rows[ref_row_i as usize].is_copied {
                    self.recovery
                        .xor(ref_column_i as usize, peel_column_i as usize);
                } else {
                    let src = self.input.block(ref_row_i as usize, self.block_bytes);
                    self.recovery.set_ext(ref_column_i as usize, src);
                    self.recovery
                        .xor(ref_column_i as usize, peel_column_i as usize);
                    self.rows[ref_row_i as usize].is_copied = true;
                }
            }

            peel_row_i = next;
        }
    }

    /// Copies deferred rows out of the compression matrix into their final
    /// GE rows, right after the dense rows.
    pub(super) fn copy_deferred_rows(&mut self) {
        let mut ge_row_i = self.dense();
        let mut defer_row_i = self.defer_rows_head;
        while defer_row_i != LIST_TERM {
            self.ge
                .copy_row_from(ge_row_i, self.compress.row(defer_row_i as usize));
            self.ge_row_map[ge_row_i] = defer_row_i;

            defer_row_i = self.rows[defer_row_i as usize].next;
            ge_row_i += 1;
        }
        debug_assert_eq!(ge_row_i, self.dense() + self.defer_count);
    }

    /// Shuffle code: synthesises the D dense rows as a random-looking
    /// near-balanced matrix, two bit flips per derivative row.
    ///
    /// Each block of D columns shuffles a target-row deck and a bit deck,
    /// emits one half-weight seed row, then derives the remaining rows by
    /// flipping one set and one clear bit each, reshuffling the bit order
    /// between halves. The reshuffles are part of the wire contract.
    pub(super) fn multiply_dense_rows(&mut self) {
        let mut rng = CodecRng::with_seed(self.params.d_seed);

        let dense = self.dense();
        let n = self.n();
        let temp_row = self.ge.rows() - 1;

        let mut rows_deck = vec![0u16; dense];
        let mut bits_deck = vec![0u16; dense];

        let mut column_i = 0usize;
        while column_i < n {
            let max_x = dense.min(n - column_i);

            shuffle_deck16(&mut rng, &mut rows_deck);
            shuffle_deck16(&mut rng, &mut bits_deck);

            let set_count = (dense + 1) >> 1;

            // Seed row: XOR of the first half of the bit deck.
            self.ge.clear_row(temp_row);
            for ii in 0..set_count {
                self.flip_dense_bit(temp_row, column_i, bits_deck[ii] as usize, max_x);
            }
            let mut row_out = 0usize;
            self.store_dense_row(temp_row, rows_deck[row_out]);
            row_out += 1;

            shuffle_deck16(&mut rng, &mut bits_deck);

            let loop_count = dense >> 1;
            for ii in 0..loop_count {
                self.flip_dense_bit(temp_row, column_i, bits_deck[ii] as usize, max_x);
                self.flip_dense_bit(
                    temp_row,
                    column_i,
                    bits_deck[set_count + ii] as usize,
                    max_x,
                );
                self.store_dense_row(temp_row, rows_deck[row_out]);
                row_out += 1;
            }

            shuffle_deck16(&mut rng, &mut bits_deck);

            let second_loop_count = loop_count - 1 + (dense & 1);
            for ii in 0..second_loop_count {
                self.flip_dense_bit(temp_row, column_i, bits_deck[ii] as usize, max_x);
                self.flip_dense_bit(
                    temp_row,
                    column_i,
                    bits_deck[set_count + ii] as usize,
                    max_x,
                );
                self.store_dense_row(temp_row, rows_deck[row_out]);
                row_out += 1;
            }
            debug_assert_eq!(row_out, dense);

            column_i += dense;
        }
    }

    /// Folds matrix column `column_i + bit_i` into the scratch GE row:
    /// peeled columns contribute their compression row, deferred columns
    /// their GE column bit.
    fn flip_dense_bit(&mut self, temp_row: usize, column_i: usize, bit_i: usize, max_x: usize) {
        if bit_i >= max_x {
            return;
        }
        let col = column_i + bit_i;
        if self.cols[col].mark == Mark::Peel {
            let src = self.cols[col].peel_row as usize;
            self.ge.xor_row_from(temp_row, self.compress.row(src));
        } else {
            let ge_column_i = self.cols[col].ge_column as usize;
            self.ge.flip_bit(temp_row, ge_column_i);
        }
    }

    fn store_dense_row(&mut self, temp_row: usize, dest: u16) {
        self.ge.xor_rows(dest as usize, temp_row);
    }

    /// Seeds the heavy GF(256) rows and overlays the identity that ties
    /// them to the last heavy mixing columns.
    pub(super) fn set_heavy_rows(&mut self) {
        let mut rng = CodecRng::with_seed(self.params.d_seed);

        for row_i in 0..HEAVY_ROWS {
            let row = self.heavy.raw_row_mut(row_i);
            let mut col = 0usize;
            while col < self.heavy_cols {
                row[col..col + 4].copy_from_slice(&rng.next_u32().to_le_bytes());
                col += 4;
            }
        }

        let identity_base = self.heavy_cols - HEAVY_ROWS;
        for i in 0..HEAVY_ROWS {
            for j in 0..HEAVY_ROWS {
                self.heavy
                    .set(i, identity_base + j, (i == j) as u8);
            }
        }
    }
}
