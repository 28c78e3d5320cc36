use proptest::prelude::*;
use sentinel_evidence::{chunk, Embedder, HashEmbedder};

proptest! {
    #[test]
    fn windows_reassemble_the_input(s in ".{0,400}", size in 1usize..64) {
        let joined: String = chunk(&s, size).iter().map(|w| w.text).collect();
        prop_assert_eq!(joined, s);
    }

    #[test]
    fn window_count_is_ceil_of_len_over_size(s in ".{0,400}", size in 1usize..64) {
        let len = s.chars().count();
        prop_assert_eq!(chunk(&s, size).len(), len.div_ceil(size));
    }

    #[test]
    fn spans_are_contiguous_and_bounded(s in ".{0,400}", size in 1usize..64) {
        let windows = chunk(&s, size);
        let mut cursor = 0;
        for w in &windows {
            prop_assert_eq!(w.span.start, cursor);
            prop_assert!(w.span.len() >= 1 && w.span.len() <= size);
            prop_assert_eq!(w.text.chars().count(), w.span.len());
            cursor = w.span.end;
        }
        prop_assert_eq!(cursor, s.chars().count());
    }

    #[test]
    fn hash_embedding_is_bit_for_bit_deterministic(s in ".{0,200}") {
        let embedder = HashEmbedder::new(64);
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let a = rt.block_on(embedder.encode(&s)).unwrap();
        let b = rt.block_on(embedder.encode(&s)).unwrap();
        let a_bits: Vec<u32> = a.iter().map(|x| x.to_bits()).collect();
        let b_bits: Vec<u32> = b.iter().map(|x| x.to_bits()).collect();
        prop_assert_eq!(a_bits, b_bits);
    }
}
