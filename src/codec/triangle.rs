//! (3) Triangularisation of the GE matrix.
//!
//! Row swaps are pivot-array swaps. Eliminated positions keep their
//! coefficients (bit or byte) as the record the value passes replay later.
//! Heavy rows ride in the tail of the candidate region of the pivot array
//! so they are always tried last; `first_heavy_pivot` tracks the boundary.

use log::trace;

use crate::gf256;

use super::Codec;

impl<'a> Codec<'a> {
    /// Brings columns `from..pivot_count` to upper-triangular form.
    /// On failure records `resume_pivot` and leaves the partial state for
    /// the resume path.
    pub(super) fn triangle(&mut self, from: usize) -> bool {
        let pivot_count = self.pivot_count();
        for p in from..pivot_count {
            let found = if p < self.first_heavy_col {
                self.pivot_binary_phase(p)
            } else {
                self.pivot_heavy_phase(p)
            };
            if !found {
                self.resume_pivot = p;
                return false;
            }
        }
        true
    }

    /// Columns not covered by heavy rows: only binary candidates apply.
    fn pivot_binary_phase(&mut self, p: usize) -> bool {
        let fhp = self.first_heavy_pivot.max(p);

        let mut found = None;
        for j in p..fhp {
            if self.ge.bit(self.pivots[j] as usize, p) {
                found = Some(j);
                break;
            }
        }
        let Some(j) = found else {
            return false;
        };
        self.pivots.swap(p, j);
        let pivot_id = self.pivots[p] as usize;

        for k in p + 1..fhp {
            let id = self.pivots[k] as usize;
            if self.ge.bit(id, p) {
                self.ge.eliminate(id, pivot_id, p);
            }
        }
        true
    }

    /// Columns inside the heavy region: binary candidates first, and any
    /// heavy row with a non-zero byte here must have that byte cancelled
    /// against the chosen pivot.
    fn pivot_heavy_phase(&mut self, p: usize) -> bool {
        let pivot_count = self.pivot_count();
        let fhp = self.first_heavy_pivot.max(p);
        let hcol = p - self.first_heavy_col;

        // Prefer a binary pivot.
        for j in p..fhp {
            let id = self.pivots[j] as usize;
            if !self.ge.bit(id, p) {
                continue;
            }
            self.pivots.swap(p, j);

            for k in p + 1..fhp {
                let kid = self.pivots[k] as usize;
                if self.ge.bit(kid, p) {
                    self.ge.eliminate(kid, id, p);
                }
            }

            // Scale the binary pivot into each heavy row that still sees
            // this column; the row's byte at `hcol` stays as the record.
            for k in fhp.max(p + 1)..self.pivot_rows {
                let hid = self.pivots[k];
                debug_assert!(self.is_heavy_id(hid));
                let hrow = self.heavy_index(hid);
                let code = self.heavy.get(hrow, hcol);
                if code == 0 {
                    continue;
                }
                for c in p + 1..pivot_count {
                    if self.ge.bit(id, c) {
                        let at = c - self.first_heavy_col;
                        let v = self.heavy.get(hrow, at) ^ code;
                        self.heavy.set(hrow, at, v);
                    }
                }
            }
            return true;
        }

        // Fall back to promoting a heavy row into the pivot position.
        for j in fhp..self.pivot_rows {
            let hid = self.pivots[j];
            let hrow = self.heavy_index(hid);
            let code = self.heavy.get(hrow, hcol);
            if code == 0 {
                continue;
            }
            trace!("pivot {} taken by heavy row {}", p, hrow);
            self.place_heavy_pivot(p, j);

            for k in p + 1..self.pivot_rows {
                let kid = self.pivots[k];
                if !self.is_heavy_id(kid) {
                    continue;
                }
                let krow = self.heavy_index(kid);
                let rem = self.heavy.get(krow, hcol);
                if rem == 0 {
                    continue;
                }
                let x = gf256::div(rem, code);
                self.heavy.set(krow, hcol, x);
                let (dst, src) = self.heavy.row_pair(krow, hrow);
                gf256::mem_mul_add(&mut dst[hcol + 1..], x, &src[hcol + 1..]);
            }
            return true;
        }

        false
    }

    /// Moves the heavy candidate at `j` into pivot position `p`, keeping
    /// binary candidates ahead of the heavy tail.
    fn place_heavy_pivot(&mut self, p: usize, j: usize) {
        let fhp = self.first_heavy_pivot;
        if p < fhp {
            let e = self.pivots[j];
            self.pivots[j] = self.pivots[fhp];
            self.pivots[fhp] = self.pivots[p];
            self.pivots[p] = e;
            self.first_heavy_pivot = fhp + 1;
        } else {
            self.pivots.swap(p, j);
        }
    }
}
