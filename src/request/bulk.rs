//! Lazy GETBULK repetition expansion.

use super::Request;

/// Pull-based iterator over the repeater sub-requests of a GETBULK.
///
/// Each call to [`next_index`](Self::next_index) yields the index of the next
/// repeater sub-request to process, appending it first if it does not exist
/// yet. A new sub-request copies the OID of the same column in the previous
/// row. Expansion ends when
///
/// - `non_repeaters + max_repetitions * repeaters` sub-requests exist,
/// - the last complete row is `endOfMibView` in every column (that row is
///   kept, anything after it dropped), or
/// - the response already reaches the size limit (a partly built row is
///   dropped).
#[derive(Debug, Clone)]
pub struct RepetitionCursor {
    next: usize,
}

impl RepetitionCursor {
    /// Start at the first repeater of `request`.
    pub fn new(request: &Request) -> Self {
        let next = request.bulk_shape().map_or(0, |shape| shape.non_repeaters);
        Self { next }
    }

    /// Resume at `index`, for re-driving a partially processed request.
    pub fn at(index: usize) -> Self {
        Self { next: index }
    }

    /// Position of the next repeater sub-request.
    pub fn position(&self) -> usize {
        self.next
    }

    /// Index of the next repeater sub-request, or `None` when expansion is over.
    pub fn next_index(&mut self, request: &mut Request) -> Option<usize> {
        let shape = request.bulk_shape()?;
        if shape.repeaters == 0 || shape.max_repetitions == 0 {
            return None;
        }
        let cursor = self.next;
        if cursor >= shape.capacity() {
            return None;
        }

        if cursor > shape.non_repeaters && (cursor - shape.non_repeaters) % shape.repeaters == 0 {
            let row = &request.subrequests()[cursor - shape.repeaters..cursor];
            if row.iter().all(|sub| sub.value().is_end_of_mib_view()) {
                request.truncate(cursor);
                return None;
            }
        }

        if cursor >= request.len() {
            if request.response_size() >= request.max_response_size() {
                if (cursor - shape.non_repeaters) % shape.repeaters != 0 {
                    Self::truncate_row(request, cursor);
                }
                return None;
            }
            let next = request.subrequests()[cursor - shape.repeaters].next_repetition(cursor);
            request.push_subrequest(next);
        }

        self.next += 1;
        Some(cursor)
    }

    /// Drop the repetition row containing `index` and everything after it.
    ///
    /// Returns the number of sub-requests kept.
    pub fn truncate_row(request: &mut Request, index: usize) -> usize {
        let Some(shape) = request.bulk_shape() else {
            return request.len();
        };
        if shape.repeaters == 0 || index < shape.non_repeaters {
            return request.len();
        }
        let row = (index - shape.non_repeaters) / shape.repeaters;
        let keep = shape.non_repeaters + row * shape.repeaters;
        request.truncate(keep);
        keep
    }
}
