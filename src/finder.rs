use crate::model::SeatId;

// ── Contiguous-run search ─────────────────────────────────────────

/// Find up to `max_results` disjoint runs of exactly `block_length`
/// consecutive ids among `available_ids`.
///
/// Input is deduplicated and sorted, so insertion order never matters. Within
/// a maximal run the slicing cursor advances by `block_length` after each
/// emission — returned ranges never overlap and never waste available ids on
/// shifted-by-one variants of the same block. Results are ascending by start.
///
/// A run shorter than `block_length` contributes nothing. Empty input, or a
/// `block_length` longer than every run, yields an empty result. Argument
/// validation (`block_length >= 1`, `max_results >= 1`) is the facade's job;
/// a zero here simply yields nothing.
pub fn find_runs(
    available_ids: &[SeatId],
    block_length: u64,
    max_results: usize,
) -> Vec<(SeatId, SeatId)> {
    if block_length == 0 || max_results == 0 || available_ids.is_empty() {
        return Vec::new();
    }
    // A block longer than the id space can never fit.
    if block_length > SeatId::MAX as u64 {
        return Vec::new();
    }

    let mut ids = available_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    let mut out = Vec::new();
    let block = block_length as SeatId;

    let mut i = 0;
    while i < ids.len() && out.len() < max_results {
        // Extend ids[i] to its maximal consecutive run ids[i]..=ids[j].
        let mut j = i;
        while j + 1 < ids.len() && ids[j + 1] == ids[j] + 1 {
            j += 1;
        }
        let run_end = ids[j];

        let mut cursor = ids[i];
        while out.len() < max_results {
            let Some(slice_end) = cursor.checked_add(block - 1) else {
                break;
            };
            if slice_end > run_end {
                break;
            }
            out.push((cursor, slice_end));
            match slice_end.checked_add(1) {
                Some(next) => cursor = next,
                None => break,
            }
        }

        i = j + 1;
    }

    out
}
