//! (1) Peeling: the opportunistic greedy solver.
//!
//! Columns move Todo → Peel when a row of residual weight 1 claims them,
//! or Todo → Defer when greedy peeling hands them to Gaussian elimination.
//! Solving a column "avalanches": every row referencing it drops a unit of
//! residual weight, which can cascade into further solves.

use log::trace;

use crate::params::{LIST_TERM, REF_LIST_MAX};

use super::{Codec, Mark};

impl<'a> Codec<'a> {
    /// Materialises row `id` into slot `row_i` and peels if it already has
    /// residual weight one. Returns false if a column's reference list
    /// overflows, which condemns the whole message (bad peel seed).
    pub(super) fn opportunistic_peeling(&mut self, row_i: u16, id: u32) -> bool {
        let spec = self.generate_row_spec(id);
        {
            let row = &mut self.rows[row_i as usize];
            row.id = id;
            row.spec = spec;
            row.is_copied = false;
            row.peel_column = LIST_TERM;
        }

        let mut unmarked_count = 0u16;
        let mut unmarked = [0u16; 2];
        for column_i in self.peel_columns(&spec) {
            let refs = &mut self.refs[column_i as usize];
            if refs.count as usize >= REF_LIST_MAX {
                trace!("reference list overflow at column {}", column_i);
                return false;
            }
            refs.rows[refs.count as usize] = row_i;
            refs.count += 1;

            if self.cols[column_i as usize].mark == Mark::Todo {
                unmarked[(unmarked_count & 1) as usize] = column_i;
                unmarked_count += 1;
            }
        }
        self.rows[row_i as usize].unmarked_count = unmarked_count;

        match unmarked_count {
            0 => {
                // Nothing left to solve: straight to the deferred rows.
                self.rows[row_i as usize].next = self.defer_rows_head;
                self.defer_rows_head = row_i;
            }
            1 => self.peel(row_i, unmarked[0]),
            2 => {
                let row = &mut self.rows[row_i as usize];
                row.unmarked = unmarked;
                self.cols[unmarked[0] as usize].w2_refs += 1;
                self.cols[unmarked[1] as usize].w2_refs += 1;
            }
            _ => {}
        }

        true
    }

    /// Solves `column_i` with `row_i` and propagates the avalanche.
    pub(super) fn peel(&mut self, row_i: u16, column_i: u16) {
        self.mark_peeled(row_i, column_i);
        self.avalanche(column_i);
    }

    fn mark_peeled(&mut self, row_i: u16, column_i: u16) {
        let column = &mut self.cols[column_i as usize];
        column.mark = Mark::Peel;
        column.peel_row = row_i;

        let row = &mut self.rows[row_i as usize];
        row.peel_column = column_i;
        row.is_copied = false;
        row.next = LIST_TERM;

        // Append to the peeled list: forward order is the solution order.
        if self.peel_tail != LIST_TERM {
            self.rows[self.peel_tail as usize].next = row_i;
        } else {
            self.peel_head = row_i;
        }
        self.peel_tail = row_i;
    }

    /// Walks the incidence lists of newly solved/deferred columns, reducing
    /// referencing rows and peeling any that reach residual weight one.
    pub(super) fn avalanche(&mut self, column_i: u16) {
        let mut stack = std::mem::take(&mut self.avalanche_stack);
        stack.clear();
        stack.push(column_i);

        while let Some(col) = stack.pop() {
            let ref_count = self.refs[col as usize].count as usize;
            for ref_i in 0..ref_count {
                let ref_row_i = self.refs[col as usize].rows[ref_i];
                let row = &mut self.rows[ref_row_i as usize];
                if row.unmarked_count == 0 {
                    continue;
                }
                row.unmarked_count -= 1;

                match row.unmarked_count {
                    1 => {
                        // The other remembered column may solve now.
                        let other = if row.unmarked[0] == col {
                            row.unmarked[1]
                        } else {
                            row.unmarked[0]
                        };
                        if self.cols[other as usize].mark == Mark::Todo {
                            self.mark_peeled(ref_row_i, other);
                            stack.push(other);
                        } else {
                            let row = &mut self.rows[ref_row_i as usize];
                            row.next = self.defer_rows_head;
                            self.defer_rows_head = ref_row_i;
                        }
                    }
                    2 => {
                        // The remembered pair may be stale; regenerate the
                        // row to find which columns actually remain.
                        let spec = self.rows[ref_row_i as usize].spec;
                        let mut found = 0u16;
                        let mut pair = [0u16; 2];
                        for c in self.peel_columns(&spec) {
                            let column = &mut self.cols[c as usize];
                            if column.mark == Mark::Todo {
                                if (found as usize) < pair.len() {
                                    pair[found as usize] = c;
                                }
                                found += 1;
                                column.w2_refs += 1;
                            }
                        }
                        self.rows[ref_row_i as usize].unmarked = pair;

                        if found <= 1 {
                            // Drop out of consideration for this cascade.
                            self.rows[ref_row_i as usize].unmarked_count = 0;
                            if found == 1 {
                                self.mark_peeled(ref_row_i, pair[0]);
                                stack.push(pair[0]);
                            } else {
                                let row = &mut self.rows[ref_row_i as usize];
                                row.next = self.defer_rows_head;
                                self.defer_rows_head = ref_row_i;
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        self.avalanche_stack = stack;
    }

    /// After opportunistic peeling stalls, repeatedly defer the column that
    /// unlocks the most weight-2 rows and resume the avalanche, until no
    /// Todo column remains.
    pub(super) fn greedy_peeling(&mut self) {
        self.defer_cols_head = LIST_TERM;
        self.defer_count = 0;

        loop {
            let mut best_column = LIST_TERM;
            let mut best_w2 = 0u16;
            let mut best_refs = 0u16;

            for column_i in 0..self.n() {
                let column = &self.cols[column_i];
                if column.mark != Mark::Todo {
                    continue;
                }
                let w2 = column.w2_refs;
                if w2 >= best_w2 {
                    let ref_count = self.refs[column_i].count;
                    if w2 > best_w2 || ref_count >= best_refs {
                        best_column = column_i as u16;
                        best_w2 = w2;
                        best_refs = ref_count;
                    }
                }
            }

            if best_column == LIST_TERM {
                break;
            }

            let column = &mut self.cols[best_column as usize];
            column.mark = Mark::Defer;
            column.next = self.defer_cols_head;
            self.defer_cols_head = best_column;
            self.defer_count += 1;

            self.avalanche(best_column);
        }

        trace!("greedy peeling deferred {} columns", self.defer_count);
    }
}
