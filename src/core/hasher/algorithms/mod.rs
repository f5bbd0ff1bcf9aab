//! Hash algorithm implementations.

mod average;
mod difference;
mod perceptual;
mod structural;

pub use average::{average_hash, AverageHasher};
pub use difference::{difference_hash, DifferenceHasher};
pub use perceptual::{perceptual_hash, PerceptualHasher};
pub use structural::{structural_block_hash, StructuralBlockHasher};

/// Median of a non-empty slice; an even count averages the middle pair
fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::median;

    #[test]
    fn median_of_odd_count() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
    }

    #[test]
    fn median_of_even_count_averages_middle() {
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    }
}
