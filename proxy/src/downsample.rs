//! Block-mean downsampling of raw channel samples.

use core::num::NonZeroUsize;

use thiserror::Error as ThisError;

/// Errors returned by [`reduce`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum DownsampleError {
    #[error("cannot downsample an empty sample sequence")]
    EmptyInput,
}

/// Reduce `samples` by averaging contiguous blocks of `block_size` samples.
///
/// * `block_size == 1` returns a copy of the input.
/// * Otherwise the input is truncated to a whole number of blocks and each block
///   is replaced by its arithmetic mean.
/// * If the input is shorter than one block, the result is the mean of all samples.
///
/// # Errors
///
/// Returns [`DownsampleError::EmptyInput`] if `samples` is empty.
pub fn reduce(samples: &[f64], block_size: NonZeroUsize) -> Result<Vec<f64>, DownsampleError> {
    if samples.is_empty() {
        return Err(DownsampleError::EmptyInput);
    }
    let block_size = block_size.get();
    if block_size == 1 {
        return Ok(samples.to_vec());
    }
    if samples.len() < block_size {
        return Ok(vec![mean(samples)]);
    }
    // chunks_exact drops the trailing partial block
    Ok(samples.chunks_exact(block_size).map(mean).collect())
}

/// Resolve a block size from a raw property token.
///
/// Absent, non-numeric and non-positive values all resolve to 1.
#[must_use]
pub fn block_size_from(token: Option<&str>) -> NonZeroUsize {
    token
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .and_then(NonZeroUsize::new)
        .unwrap_or(NonZeroUsize::MIN)
}

#[expect(
    clippy::cast_precision_loss,
    reason = "sample counts are far below 2^52"
)]
fn mean(block: &[f64]) -> f64 {
    block.iter().sum::<f64>() / block.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nz(value: usize) -> NonZeroUsize {
        NonZeroUsize::new(value).unwrap()
    }

    #[test]
    fn identity_for_block_size_one() {
        let samples = [3.0, -1.5, 8.25];
        let reduced = reduce(&samples, nz(1)).unwrap();
        assert_eq!(reduced, samples.to_vec());
    }

    #[test]
    fn averages_whole_blocks() {
        assert_eq!(reduce(&[1.0, 2.0, 3.0, 4.0], nz(2)).unwrap(), vec![1.5, 3.5]);
    }

    #[test]
    fn drops_trailing_partial_block() {
        let reduced = reduce(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 100.0], nz(3)).unwrap();
        assert_eq!(reduced, vec![2.0, 5.0]);
    }

    #[test]
    fn falls_back_to_overall_mean_when_shorter_than_a_block() {
        assert_eq!(reduce(&[1.0, 2.0, 3.0], nz(5)).unwrap(), vec![2.0]);
    }

    #[test]
    fn rejects_empty_input() {
        assert_eq!(reduce(&[], nz(4)), Err(DownsampleError::EmptyInput));
        assert_eq!(reduce(&[], nz(1)), Err(DownsampleError::EmptyInput));
    }

    #[test]
    fn output_length_follows_block_count() {
        let samples: Vec<f64> = (0..103).map(f64::from).collect();
        for block in 1..=120 {
            let reduced = reduce(&samples, nz(block)).unwrap();
            let expected = (samples.len() / block).max(1);
            assert_eq!(reduced.len(), expected, "block size {block}");
        }
    }

    #[test]
    fn output_does_not_alias_input() {
        let mut samples = vec![1.0, 2.0];
        let reduced = reduce(&samples, nz(1)).unwrap();
        if let Some(first) = samples.first_mut() {
            *first = 99.0;
        }
        assert_eq!(reduced, vec![1.0, 2.0]);
    }

    #[test]
    fn block_size_parsing_defaults_to_one() {
        assert_eq!(block_size_from(None).get(), 1);
        assert_eq!(block_size_from(Some("abc")).get(), 1);
        assert_eq!(block_size_from(Some("0")).get(), 1);
        assert_eq!(block_size_from(Some("-4")).get(), 1);
        assert_eq!(block_size_from(Some(" 8 ")).get(), 8);
    }
}
