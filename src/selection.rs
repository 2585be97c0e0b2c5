//! Selection policies.
//!
//! Two independent, stateless algorithms decide which scored images survive:
//!
//! * [`select_best_per_group`] — comparative selection: partition the batch
//!   into consecutive fixed-size groups and keep the single highest-scored
//!   image of each group. Exactly one survivor per group, always.
//! * [`select_top_percent`] — absolute selection: compute a percentile
//!   threshold over the batch's score distribution and keep every image
//!   scoring **strictly above** it.
//!
//! Both preserve input order in their output and assume nothing about score
//! ranges — only the total order of the scores matters. When the score slice
//! is shorter than the item list (a scorer misbehaved), the unscored tail is
//! ignored rather than panicking; the scoring adapter has already logged the
//! mismatch.
//!
//! The strict `>` in [`select_top_percent`] means `percent = 0` drops only
//! images tied with the minimum score, `percent = 100` usually keeps
//! nothing, and a single-image batch is never retained for `percent > 0`
//! (the percentile of one score is that score itself).

use crate::error::SiftError;

/// Keep the best-scored item of each consecutive `group_size`-sized group.
///
/// The last group may be shorter. Ties within a group break toward the first
/// occurrence (argmax semantics), making selection fully deterministic.
/// Output order is ascending group order, so it equals input order.
///
/// Returns `ceil(len / group_size)` items for a fully scored input.
///
/// # Errors
///
/// Returns [`SiftError::InvalidGroupSize`] when `group_size` is zero.
///
/// # Example
///
/// ```
/// use framesift::select_best_per_group;
///
/// let items = vec!["a", "b", "c", "d", "e"];
/// let scores = [1.0, 5.0, 2.0, 9.0, 3.0];
/// let best = select_best_per_group(items, &scores, 2)?;
/// assert_eq!(best, vec!["b", "d", "e"]);
/// # Ok::<(), framesift::SiftError>(())
/// ```
pub fn select_best_per_group<T>(
    items: Vec<T>,
    scores: &[f64],
    group_size: usize,
) -> Result<Vec<T>, SiftError> {
    if group_size < 1 {
        return Err(SiftError::InvalidGroupSize(group_size));
    }

    // Tolerate a short score slice by only considering scored items.
    let scored_len = items.len().min(scores.len());

    // Winning positions, ascending because groups are consecutive.
    let mut winners = Vec::with_capacity(scored_len.div_ceil(group_size));
    for (group_index, group) in scores[..scored_len].chunks(group_size).enumerate() {
        let mut best_offset = 0;
        for (offset, &score) in group.iter().enumerate() {
            // Strict > keeps the first occurrence on ties.
            if score > group[best_offset] {
                best_offset = offset;
            }
        }
        winners.push(group_index * group_size + best_offset);
    }

    log::debug!(
        "Selected {} best images from {} ({}-sized groups)",
        winners.len(),
        items.len(),
        group_size,
    );

    let mut next_winner = winners.into_iter().peekable();
    let selected = items
        .into_iter()
        .enumerate()
        .filter_map(|(position, item)| {
            if next_winner.peek() == Some(&position) {
                next_winner.next();
                Some(item)
            } else {
                None
            }
        })
        .collect();
    Ok(selected)
}

/// Keep every item whose score is strictly greater than the `percent`-th
/// percentile of the batch's scores.
///
/// The threshold uses the standard linear-interpolation percentile
/// definition, so `percent = 90` keeps roughly the top decile. Output order
/// preserves input order. An empty input yields an empty output.
///
/// # Errors
///
/// Returns [`SiftError::InvalidPercent`] when `percent` is outside
/// `0.0..=100.0` or not finite.
///
/// # Example
///
/// ```
/// use framesift::select_top_percent;
///
/// let items = vec!["a", "b", "c", "d", "e"];
/// let scores = [10.0, 20.0, 30.0, 40.0, 90.0];
/// let top = select_top_percent(items, &scores, 80.0)?;
/// assert_eq!(top, vec!["e"]);
/// # Ok::<(), framesift::SiftError>(())
/// ```
pub fn select_top_percent<T>(
    items: Vec<T>,
    scores: &[f64],
    percent: f64,
) -> Result<Vec<T>, SiftError> {
    if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
        return Err(SiftError::InvalidPercent(percent));
    }

    let scored_len = items.len().min(scores.len());
    if scored_len == 0 {
        return Ok(Vec::new());
    }

    let threshold = percentile(&scores[..scored_len], percent);
    let selected: Vec<T> = items
        .into_iter()
        .take(scored_len)
        .zip(scores)
        .filter_map(|(item, &score)| (score > threshold).then_some(item))
        .collect();

    log::debug!(
        "Selected {selected_len} of {scored_len} images above the {percent}th percentile ({threshold})",
        selected_len = selected.len(),
    );
    Ok(selected)
}

/// The `percent`-th percentile of `scores` using linear interpolation.
///
/// `scores` must be non-empty; `percent` must be within `0.0..=100.0`.
fn percentile(scores: &[f64], percent: f64) -> f64 {
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = percent / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let fraction = rank - lower as f64;
        sorted[lower] + fraction * (sorted[upper] - sorted[lower])
    }
}
