use crate::signal::Peaks;

/// Strict local maxima above `threshold`.
///
/// Index `i` qualifies only when `0 < i < len - 1` and it is strictly greater
/// than both neighbors and the threshold. Plateaus never qualify.
pub fn find_peaks(values: &[f64], threshold: f64) -> Peaks {
    if values.len() < 3 {
        return Peaks::default();
    }
    let indices = values
        .windows(3)
        .enumerate()
        .filter(|(_, w)| w[1] > w[0] && w[1] > w[2] && w[1] > threshold)
        .map(|(i, _)| i + 1)
        .collect();
    Peaks::from_indices(indices)
}
