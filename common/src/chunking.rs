//! Splitting of long payloads into APDU-sized chunks.

use core::ops::Range;

use crate::constants::MAX_APDU_DATA_LENGTH;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub range: Range<usize>,
    pub is_first: bool,
    pub is_last: bool,
}

/// Splits `total` bytes into consecutive chunks of at most 255 bytes.
///
/// When `avoid_boundary` is set, no chunk except the final one may end
/// exactly at that offset; a chunk that would is shortened by one byte.
/// Some app firmware misparses a chunk ending right before the chain id.
///
/// An empty payload still yields a single empty chunk.
pub fn plan_chunks(total: usize, avoid_boundary: Option<usize>) -> Vec<Chunk> {
    let mut ranges = Vec::new();
    let mut offset = 0;
    while offset < total {
        let mut size = MAX_APDU_DATA_LENGTH.min(total - offset);
        let end = offset + size;
        if avoid_boundary == Some(end) && end != total {
            size -= 1;
        }
        ranges.push(offset..offset + size);
        offset += size;
    }
    if ranges.is_empty() {
        ranges.push(0..0);
    }

    let count = ranges.len();
    ranges
        .into_iter()
        .enumerate()
        .map(|(i, range)| Chunk {
            range,
            is_first: i == 0,
            is_last: i + 1 == count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges(chunks: &[Chunk]) -> Vec<Range<usize>> {
        chunks.iter().map(|c| c.range.clone()).collect()
    }

    #[test]
    fn test_plan_small_payload() {
        let chunks = plan_chunks(10, None);
        assert_eq!(ranges(&chunks), vec![0..10]);
        assert!(chunks[0].is_first && chunks[0].is_last);
    }

    #[test]
    fn test_plan_exact_multiple() {
        assert_eq!(ranges(&plan_chunks(510, None)), vec![0..255, 255..510]);
    }

    #[test]
    fn test_plan_long_payload() {
        let chunks = plan_chunks(600, None);
        assert_eq!(ranges(&chunks), vec![0..255, 255..510, 510..600]);
        assert!(chunks[0].is_first && !chunks[0].is_last);
        assert!(!chunks[1].is_first && !chunks[1].is_last);
        assert!(chunks[2].is_last);
    }

    #[test]
    fn test_plan_avoids_boundary() {
        assert_eq!(
            ranges(&plan_chunks(258, Some(255))),
            vec![0..254, 254..258]
        );
        assert_eq!(
            ranges(&plan_chunks(600, Some(510))),
            vec![0..255, 255..509, 509..600]
        );
    }

    #[test]
    fn test_plan_boundary_at_end_is_kept() {
        assert_eq!(ranges(&plan_chunks(255, Some(255))), vec![0..255]);
    }

    #[test]
    fn test_plan_empty_payload() {
        let chunks = plan_chunks(0, None);
        assert_eq!(ranges(&chunks), vec![0..0]);
        assert!(chunks[0].is_first && chunks[0].is_last);
    }
}
