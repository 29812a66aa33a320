//! Resume: fold a late row into a partially triangularised system.
//!
//! A new row arrives as a binary GE row and is eliminated against every
//! already-solved pivot. If one of those pivots is a heavy row the new row
//! is promoted to GF(256) on the spot: its remaining columns move into a
//! fresh heavy matrix row, with eliminated positions keeping their
//! coefficients so the value replay stays valid. A promoted row keeps its
//! binary GE row alive as the replay record for the columns below the
//! heavy region.

use log::trace;

use crate::error::Error;
use crate::gf256;

use super::{Codec, Input, Mark};

impl<'a> Codec<'a> {
    /// Feeds one extra `(id, block)` into the failed triangulation.
    /// `Ok(true)` when the whole matrix is now solved.
    pub(super) fn resume_solve(&mut self, id: u32, block: &[u8]) -> Result<bool, Error> {
        let (bin_id, pivot_pos, row_slot) = self.claim_extra_row()?;

        if let Input::Owned(buf) = &mut self.input {
            buf.set_ext(row_slot, block);
        }

        let spec = self.generate_row_spec(id);
        {
            let row = &mut self.rows[row_slot];
            row.id = id;
            row.spec = spec;
        }

        // Stage the row in binary form: mixing bits, then peeled columns
        // resolved through the compression matrix, deferred columns as
        // direct GE bits.
        self.ge.clear_row(bin_id as usize);
        for x in self.mix_columns(&spec) {
            self.ge
                .flip_bit(bin_id as usize, self.defer_count + x as usize);
        }
        for c in self.peel_columns(&spec) {
            let column = &self.cols[c as usize];
            if column.mark == Mark::Peel {
                let src = column.peel_row as usize;
                self.ge.xor_row_from(bin_id as usize, self.compress.row(src));
            } else {
                self.ge.flip_bit(bin_id as usize, column.ge_column as usize);
            }
        }

        // Eliminate the new row against every solved pivot. Hitting a
        // heavy pivot promotes the row, which also moves its candidate
        // entry into the heavy zone right away.
        let p = self.resume_pivot;
        let mut entry_pos = pivot_pos;
        let mut heavy_self: Option<usize> = None;
        for j in 0..p {
            if let Some(hrow) = heavy_self {
                self.resume_eliminate_heavy(hrow, j);
                continue;
            }
            if !self.ge.bit(bin_id as usize, j) {
                continue;
            }
            let pivot_id = self.pivots[j];
            if self.is_heavy_id(pivot_id) {
                let hrow = self.promote_to_heavy(bin_id, row_slot, j, pivot_id)?;
                let hid = (self.first_heavy_id() + hrow) as u16;
                entry_pos = self.demote_entry_to_heavy_zone(entry_pos, hid);
                heavy_self = Some(hrow);
            } else {
                self.ge.eliminate(bin_id as usize, pivot_id as usize, j);
            }
        }

        // Does the reduced row supply the missing pivot?
        let supplies = match heavy_self {
            Some(hrow) => self.heavy.get(hrow, p - self.first_heavy_col) != 0,
            None => self.ge.bit(bin_id as usize, p),
        };
        if !supplies {
            trace!("extra row {} does not reach pivot {}", id, p);
            return Ok(false);
        }

        // Install the row as pivot p and continue triangularisation.
        self.place_resume_pivot(p, entry_pos);

        if !self.triangle(p + 1) {
            trace!("triangle failed again at pivot {}", self.resume_pivot);
            return Ok(false);
        }
        Ok(true)
    }

    /// Finds storage for a new extra row: a fresh slot while any remain,
    /// otherwise a dead binary candidate left over from an earlier resume
    /// attempt.
    fn claim_extra_row(&mut self) -> Result<(u16, usize, usize), Error> {
        let n = self.n();
        if self.used_rows < n + self.extra_count {
            let extra_i = self.used_rows - n;
            let bin_id = (self.dense() + self.defer_count + extra_i) as u16;
            let row_slot = self.used_rows;
            self.used_rows += 1;
            self.ge_row_map[bin_id as usize] = row_slot as u16;

            // Insert ahead of the heavy candidates. The zone boundary can
            // lag behind the resume pivot once heavy rows have pivoted, so
            // clamp to keep solved entries untouched.
            let pos = self.pivot_rows;
            self.pivots[pos] = bin_id;
            self.pivot_rows += 1;
            let q = self.first_heavy_pivot.max(self.resume_pivot);
            let pos = if q < pos {
                self.pivots.swap(q, pos);
                q
            } else {
                pos
            };
            self.first_heavy_pivot = pos + 1;

            return Ok((bin_id, pos, row_slot));
        }

        // Reuse a binary candidate that never became a pivot.
        for pos in self.resume_pivot..self.pivot_rows {
            let id = self.pivots[pos];
            if self.is_heavy_id(id) || (id as usize) < self.dense() {
                continue;
            }
            let row_slot = self.ge_row_map[id as usize] as usize;
            trace!("reusing dead extra row slot {}", row_slot);
            return Ok((id, pos, row_slot));
        }
        Err(Error::NeedMoreExtra)
    }

    /// Converts the staged binary row into a fresh heavy row because pivot
    /// `j` is held by a heavy row. Returns the new heavy matrix row.
    fn promote_to_heavy(
        &mut self,
        bin_id: u16,
        row_slot: usize,
        j: usize,
        pivot_id: u16,
    ) -> Result<usize, Error> {
        if self.promoted_rows >= self.extra_count {
            return Err(Error::NeedMoreExtra);
        }
        let hrow = crate::params::HEAVY_ROWS + self.promoted_rows;
        self.promoted_rows += 1;

        let fhc = self.first_heavy_col;
        let pivot_hrow = self.heavy_index(pivot_id);
        let hcol = j - fhc;
        let inv = gf256::inv(self.heavy.get(pivot_hrow, hcol));

        trace!("promoting extra row to heavy slot {} at pivot {}", hrow, j);

        // Columns below j carry over their binary replay bits; column j
        // records the scaling inverse; later columns fold in the pivot.
        for k in fhc..j {
            let bit = self.ge.bit(bin_id as usize, k) as u8;
            self.heavy.set(hrow, k - fhc, bit);
        }
        self.heavy.set(hrow, hcol, inv);
        for k in j + 1..self.pivot_count() {
            let bit = self.ge.bit(bin_id as usize, k) as u8;
            let product = gf256::mul(self.heavy.get(pivot_hrow, k - fhc), inv);
            self.heavy.set(hrow, k - fhc, bit ^ product);
        }

        let hid = (self.first_heavy_id() + hrow) as u16;
        self.heavy_binary_row[hrow] = bin_id;
        self.ge_row_map[hid as usize] = row_slot as u16;

        Ok(hrow)
    }

    /// One elimination step of the promoted row against solved pivot `j`.
    fn resume_eliminate_heavy(&mut self, hrow: usize, j: usize) {
        let fhc = self.first_heavy_col;
        if j < fhc {
            // Solved binary pivots below the heavy region cannot intersect
            // a heavy row.
            return;
        }
        let hcol = j - fhc;
        let code = self.heavy.get(hrow, hcol);
        if code == 0 {
            return;
        }

        let pivot_id = self.pivots[j];
        if self.is_heavy_id(pivot_id) {
            let pivot_hrow = self.heavy_index(pivot_id);
            let x = gf256::div(code, self.heavy.get(pivot_hrow, hcol));
            self.heavy.set(hrow, hcol, x);
            let (dst, src) = self.heavy.row_pair(hrow, pivot_hrow);
            gf256::mem_mul_add(&mut dst[hcol + 1..], x, &src[hcol + 1..]);
        } else {
            // Binary pivot: each set bit past j contributes the code byte.
            for k in j + 1..self.pivot_count() {
                if self.ge.bit(pivot_id as usize, k) {
                    let at = k - fhc;
                    let v = self.heavy.get(hrow, at) ^ code;
                    self.heavy.set(hrow, at, v);
                }
            }
        }
    }

    /// Rewrites the candidate entry at `pos` to a heavy id and moves it
    /// into the heavy zone of the pivot tail.
    fn demote_entry_to_heavy_zone(&mut self, pos: usize, hid: u16) -> usize {
        self.pivots[pos] = hid;
        debug_assert!(pos < self.first_heavy_pivot);
        let last_binary = self.first_heavy_pivot - 1;
        self.pivots.swap(pos, last_binary);
        self.first_heavy_pivot = last_binary;
        last_binary
    }

    /// Installs the candidate at `entry_pos` as pivot `p`, keeping the
    /// binary/heavy zone split intact.
    fn place_resume_pivot(&mut self, p: usize, entry_pos: usize) {
        let entry = self.pivots[entry_pos];
        let fhp = self.first_heavy_pivot;
        if self.is_heavy_id(entry) && p < fhp {
            // Displaced binary candidate fills the heavy-zone hole.
            self.pivots[entry_pos] = self.pivots[fhp];
            self.pivots[fhp] = self.pivots[p];
            self.pivots[p] = entry;
            self.first_heavy_pivot = fhp + 1;
        } else {
            self.pivots.swap(p, entry_pos);
        }
    }
}
