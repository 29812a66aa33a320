//! (4) Substitution: turn the triangular system into block values.
//!
//! Order matters: column values are initialised along the pivot order,
//! dense/heavy contributions are added by replaying the shuffle code
//! against blocks instead of bits, the subdiagonal records left behind by
//! triangularisation are folded in, the upper triangle is eliminated
//! right-to-left with windowed tables, and finally the peeled rows are
//! regenerated in forward solution order.

use crate::gf256;
use crate::params::LIST_TERM;
use crate::prng::CodecRng;
use crate::rowgen::shuffle_deck16;

use super::{Codec, Mark};

// Window activation thresholds by remaining pivot index.
const WINDOW_THRESHOLD_4: usize = 20 + 4;
const WINDOW_THRESHOLD_5: usize = 40 + 5;
const WINDOW_THRESHOLD_6: usize = 64 + 6;
const WINDOW_THRESHOLD_7: usize = 128 + 7;

impl<'a> Codec<'a> {
    /// Assigns the initial value of every pivot's column: zero for dense
    /// and seeded heavy rows, the input block plus solved peeled columns
    /// for rows that carry received data. Unused rows are tagged so the
    /// dense value pass skips them.
    pub(super) fn initialize_column_values(&mut self) {
        let pivot_count = self.pivot_count();

        for i in 0..pivot_count {
            let column_i = self.ge_col_map[i] as usize;
            let id = self.pivots[i];

            if !self.is_input_backed(id) {
                // Dense and seeded heavy rows sum to zero.
                self.recovery.clear(column_i);
                self.ge_row_map[id as usize] = column_i as u16;
                continue;
            }

            let row_slot = self.ge_row_map[id as usize] as usize;
            let spec = self.rows[row_slot].spec;
            let src = self.input.block(row_slot, self.block_bytes);
            self.recovery.set_ext(column_i, src);
            for c in self.peel_columns(&spec) {
                if self.cols[c as usize].mark == Mark::Peel {
                    self.recovery.xor(column_i, c as usize);
                }
            }
        }

        // Extra rows that never became pivots must not receive dense
        // contributions.
        for i in pivot_count..self.pivot_rows {
            let id = self.pivots[i];
            if !self.is_input_backed(id) {
                self.ge_row_map[id as usize] = LIST_TERM;
            }
        }
    }

    /// Replays the shuffle-code walk of the dense rows against the solved
    /// peeled column blocks, accumulating each dense row's value into the
    /// column it pivots.
    pub(super) fn multiply_dense_values(&mut self) {
        let mut rng = CodecRng::with_seed(self.params.d_seed);

        let dense = self.dense();
        let n = self.n();
        let temp = n + self.mix();

        let mut rows_deck = vec![0u16; dense];
        let mut bits_deck = vec![0u16; dense];

        let mut column_i = 0usize;
        while column_i < n {
            let max_x = dense.min(n - column_i);

            shuffle_deck16(&mut rng, &mut rows_deck);
            shuffle_deck16(&mut rng, &mut bits_deck);
            let set_count = (dense + 1) >> 1;
            let mut row_out = 0usize;

            // Seed row, fusing the first copy with the first XOR.
            let mut combo: Option<usize> = None;
            for ii in 0..set_count {
                let bit_i = bits_deck[ii] as usize;
                if bit_i >= max_x || self.cols[column_i + bit_i].mark != Mark::Peel {
                    continue;
                }
                let src = column_i + bit_i;
                match combo {
                    None => combo = Some(src),
                    Some(c) if c == temp => self.recovery.xor(temp, src),
                    Some(c) => {
                        self.recovery.xor_set(temp, c, src);
                        combo = Some(temp);
                    }
                }
            }
            match combo {
                None => self.recovery.clear(temp),
                Some(c) => {
                    if c != temp {
                        self.recovery.copy(temp, c);
                    }
                    self.add_dense_value(rows_deck[row_out], temp);
                }
            }
            row_out += 1;

            shuffle_deck16(&mut rng, &mut bits_deck);

            let loop_count = dense >> 1;
            for ii in 0..loop_count {
                self.flip_dense_value(temp, column_i, bits_deck[ii], bits_deck[set_count + ii], max_x);
                self.add_dense_value(rows_deck[row_out], temp);
                row_out += 1;
            }

            shuffle_deck16(&mut rng, &mut bits_deck);

            let second_loop_count = loop_count - 1 + (dense & 1);
            for ii in 0..second_loop_count {
                self.flip_dense_value(temp, column_i, bits_deck[ii], bits_deck[set_count + ii], max_x);
                self.add_dense_value(rows_deck[row_out], temp);
                row_out += 1;
            }

            column_i += dense;
        }
    }

    fn flip_dense_value(&mut self, temp: usize, column_i: usize, bit0: u16, bit1: u16, max_x: usize) {
        let b0 = bit0 as usize;
        let b1 = bit1 as usize;
        let p0 = b0 < max_x && self.cols[column_i + b0].mark == Mark::Peel;
        let p1 = b1 < max_x && self.cols[column_i + b1].mark == Mark::Peel;
        if p0 && p1 {
            self.recovery.xor_add(temp, column_i + b0, column_i + b1);
        } else if p0 {
            self.recovery.xor(temp, column_i + b0);
        } else if p1 {
            self.recovery.xor(temp, column_i + b1);
        }
    }

    fn add_dense_value(&mut self, dense_row: u16, temp: usize) {
        let dest = self.ge_row_map[dense_row as usize];
        if dest != LIST_TERM {
            self.recovery.xor(dest as usize, temp);
        }
    }

    /// Folds in the subdiagonal records left by triangularisation: set
    /// bits for binary rows, coefficient bytes for heavy rows. Promoted
    /// rows also replay their binary bits below the heavy columns.
    pub(super) fn add_subdiagonal_values(&mut self) {
        let pivot_count = self.pivot_count();

        for i in 0..pivot_count {
            let column_i = self.ge_col_map[i] as usize;
            let id = self.pivots[i];

            if self.is_heavy_id(id) {
                let hrow = self.heavy_index(id);
                let bin = self.heavy_binary_row[hrow];
                if bin != LIST_TERM {
                    for j in 0..self.first_heavy_col.min(i) {
                        if self.ge.bit(bin as usize, j) {
                            self.recovery.xor(column_i, self.ge_col_map[j] as usize);
                        }
                    }
                }
                for j in self.first_heavy_col..i {
                    let code = self.heavy.get(hrow, j - self.first_heavy_col);
                    if code != 0 {
                        let src = self.ge_col_map[j] as usize;
                        let (dst, s) = self.recovery.block_pair(column_i, src);
                        gf256::mem_mul_add(dst, code, s);
                    }
                }
            } else {
                for j in 0..i {
                    if self.ge.bit(id as usize, j) {
                        self.recovery.xor(column_i, self.ge_col_map[j] as usize);
                    }
                }
            }
        }
    }

    #[inline]
    fn pivot_column(&self, pivot_i: usize) -> usize {
        self.ge_col_map[pivot_i] as usize
    }

    /// Divides a heavy pivot's value by its diagonal byte when needed.
    fn normalize_heavy_pivot(&mut self, pivot_i: usize) {
        let id = self.pivots[pivot_i];
        if !self.is_heavy_id(id) {
            return;
        }
        let code = self
            .heavy
            .get(self.heavy_index(id), pivot_i - self.first_heavy_col);
        if code != 1 {
            let col = self.pivot_column(pivot_i);
            gf256::mem_div(self.recovery.block_mut(col), code);
        }
    }

    /// Eliminates column `src_pivot` from the pivot row at `dest_pivot`.
    fn backsub_one(&mut self, dest_pivot: usize, src_pivot: usize) {
        let dest_id = self.pivots[dest_pivot];
        let dcol = self.pivot_column(dest_pivot);
        let scol = self.pivot_column(src_pivot);
        if self.is_heavy_id(dest_id) {
            let code = self
                .heavy
                .get(self.heavy_index(dest_id), src_pivot - self.first_heavy_col);
            if code != 0 {
                let (dst, s) = self.recovery.block_pair(dcol, scol);
                gf256::mem_mul_add(dst, code, s);
            }
        } else if self.ge.bit(dest_id as usize, src_pivot) {
            self.recovery.xor(dcol, scol);
        }
    }

    /// Windowed elimination of the upper triangle, w = 4..7 by pivot
    /// index, with scratch storage borrowed from dead peeled-column slots.
    pub(super) fn back_substitute_above_diagonal(&mut self) {
        let pivot_count = self.pivot_count();
        let mut pivot_i = pivot_count - 1;

        if pivot_i >= WINDOW_THRESHOLD_5 {
            let (mut w, mut next_check_i) = if pivot_i >= WINDOW_THRESHOLD_7 {
                (7, WINDOW_THRESHOLD_7)
            } else if pivot_i >= WINDOW_THRESHOLD_6 {
                (6, WINDOW_THRESHOLD_6)
            } else {
                (5, WINDOW_THRESHOLD_5)
            };
            let mut win_lim = 1usize << w;

            // Borrow dead peeled-column value slots for the window table.
            let mut win_table = [0usize; 128];
            let mut jj = 1usize;
            for column_i in 0..self.n() {
                if self.cols[column_i].mark == Mark::Peel {
                    win_table[jj] = column_i;
                    jj += 1;
                    if jj >= win_lim {
                        break;
                    }
                }
            }

            if jj >= win_lim {
                loop {
                    let backsub_i = pivot_i - w + 1;

                    // Diagonalise inside the window.
                    for src_pivot in (backsub_i + 1..=pivot_i).rev() {
                        self.normalize_heavy_pivot(src_pivot);
                        for dest_pivot in backsub_i..src_pivot {
                            self.backsub_one(dest_pivot, src_pivot);
                        }
                    }
                    self.normalize_heavy_pivot(backsub_i);

                    // Window table: powers of two alias the pivot columns,
                    // composites accumulate in the borrowed slots.
                    win_table[1] = self.pivot_column(backsub_i);
                    win_table[2] = self.pivot_column(backsub_i + 1);
                    self.recovery.xor_set(win_table[3], win_table[1], win_table[2]);
                    win_table[4] = self.pivot_column(backsub_i + 2);
                    for ii in 1..4 {
                        self.recovery
                            .xor_set(win_table[4 + ii], win_table[ii], win_table[4]);
                    }
                    win_table[8] = self.pivot_column(backsub_i + 3);
                    for ii in 1..8 {
                        self.recovery
                            .xor_set(win_table[8 + ii], win_table[ii], win_table[8]);
                    }
                    if w >= 5 {
                        win_table[16] = self.pivot_column(backsub_i + 4);
                        for ii in 1..16 {
                            self.recovery
                                .xor_set(win_table[16 + ii], win_table[ii], win_table[16]);
                        }
                        if w >= 6 {
                            win_table[32] = self.pivot_column(backsub_i + 5);
                            for ii in 1..32 {
                                self.recovery
                                    .xor_set(win_table[32 + ii], win_table[ii], win_table[32]);
                            }
                            if w >= 7 {
                                win_table[64] = self.pivot_column(backsub_i + 6);
                                for ii in 1..64 {
                                    self.recovery
                                        .xor_set(win_table[64 + ii], win_table[ii], win_table[64]);
                                }
                            }
                        }
                    }

                    // Heavy rows above the window cannot use the bit table;
                    // eliminate their window columns directly.
                    if backsub_i > self.first_heavy_col {
                        for above_i in self.first_heavy_col..backsub_i {
                            let id = self.pivots[above_i];
                            if !self.is_heavy_id(id) {
                                continue;
                            }
                            let hrow = self.heavy_index(id);
                            let dcol = self.pivot_column(above_i);
                            for src_pivot in backsub_i..=pivot_i {
                                let code = self
                                    .heavy
                                    .get(hrow, src_pivot - self.first_heavy_col);
                                if code != 0 {
                                    let scol = self.pivot_column(src_pivot);
                                    let (dst, s) = self.recovery.block_pair(dcol, scol);
                                    gf256::mem_mul_add(dst, code, s);
                                }
                            }
                        }
                    }

                    // One table lookup per binary row above the window.
                    let first_word = backsub_i >> 6;
                    let shift0 = backsub_i & 63;
                    let last_word = pivot_i >> 6;
                    for above_i in 0..backsub_i {
                        let id = self.pivots[above_i];
                        if self.is_heavy_id(id) {
                            continue;
                        }
                        let row = self.ge.row(id as usize);
                        let win_bits = if first_word == last_word {
                            (row[first_word] >> shift0) as usize & (win_lim - 1)
                        } else {
                            ((row[first_word] >> shift0) as usize
                                | (row[first_word + 1] << (64 - shift0)) as usize)
                                & (win_lim - 1)
                        };
                        if win_bits != 0 {
                            self.recovery
                                .xor(self.pivot_column(above_i), win_table[win_bits]);
                        }
                    }

                    pivot_i -= w;
                    if pivot_i < next_check_i {
                        if pivot_i >= WINDOW_THRESHOLD_6 {
                            w = 6;
                            next_check_i = WINDOW_THRESHOLD_6;
                        } else if pivot_i >= WINDOW_THRESHOLD_5 {
                            w = 5;
                            next_check_i = WINDOW_THRESHOLD_5;
                        } else if pivot_i >= WINDOW_THRESHOLD_4 {
                            w = 4;
                            next_check_i = WINDOW_THRESHOLD_4;
                        } else {
                            break;
                        }
                        win_lim = 1 << w;
                    }
                }
            }
        }

        // Scalar back-substitution over the remaining low pivots.
        for p in (0..=pivot_i).rev() {
            self.normalize_heavy_pivot(p);
            for above_i in 0..p {
                self.backsub_one(above_i, p);
            }
        }
    }

    /// Regenerates each peeled row in forward solution order to produce
    /// the remaining recovery blocks.
    pub(super) fn substitute(&mut self) {
        let n = self.n();
        let mut row_i = self.peel_head;
        while row_i != LIST_TERM {
            let (spec, next, dest_column_i) = {
                let row = &self.rows[row_i as usize];
                (row.spec, row.next, row.peel_column)
            };
            let dest = dest_column_i as usize;

            // Start from the input block and the three mixing columns.
            let src = self.input.block(row_i as usize, self.block_bytes);
            self.recovery.set_ext(dest, src);
            for m in self.mix_columns(&spec) {
                self.recovery.xor(dest, n + m as usize);
            }

            // Add the other peeling columns of the row; the solved column
            // itself is the destination.
            if spec.peel_weight >= 2 {
                for c in self.peel_columns(&spec) {
                    if c != dest_column_i {
                        self.recovery.xor(dest, c as usize);
                    }
                }
            }

            row_i = next;
        }
    }
}
