use crate::track::Track;

/// Cross-correlation-based ad-break detector.
///
/// Slides `ad`'s full flattened sample stream across `target`'s, reporting
/// every window whose normalized correlation against a perfect self-match of
/// `ad` is at least `0.95` of that reference value. Matches are reported as
/// `"start,end"` (inclusive) pairs, one per line, in ascending order of
/// `start`; overlapping matches are suppressed by resuming the scan right
/// after the end of a match rather than at `start + 1`.
///
/// This reads both tracks' entire sample streams up front rather than
/// special-casing a single contiguous block, unlike the block-bound fast
/// path the algorithm originated from: a segmented track's samples are not
/// guaranteed contiguous in memory, so there is no single-block case to fast
/// path here.
pub fn identify(target: &Track, ad: &Track) -> String {
    let target_len = target.length();
    let ad_len = ad.length();

    if ad_len == 0 || target_len == 0 || ad_len > target_len {
        return String::new();
    }

    let mut target_buf = vec![0i16; target_len];
    target.read(&mut target_buf, 0);
    let mut ad_buf = vec![0i16; ad_len];
    ad.read(&mut ad_buf, 0);

    let reference: f64 =
        ad_buf.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>() / ad_len as f64;

    // A silent ad has reference == 0, which would make every window's
    // correlation satisfy `corr >= 0.95 * reference` (both sides zero) and
    // report the whole track as one giant match. Treat a silent ad as
    // unmatchable instead.
    if reference == 0.0 {
        return String::new();
    }

    let threshold = 0.95 * reference;
    let mut matches = Vec::new();
    let mut pos = 0usize;

    while pos + ad_len <= target_len {
        let corr: f64 = target_buf[pos..pos + ad_len]
            .iter()
            .zip(ad_buf.iter())
            .map(|(&t, &a)| (t as f64) * (a as f64))
            .sum::<f64>()
            / ad_len as f64;

        if corr >= threshold {
            let end = pos + ad_len - 1;
            matches.push(format!("{},{}", pos, end));
            pos = end + 1;
        } else {
            pos += 1;
        }
    }

    tracing::debug!(found = matches.len(), "identify complete");
    matches.join("\n")
}
