use crate::{
    chain::{matches_fingerprint, ChainRng, DecimalHasher},
    problem::SortOrder,
    solver::{Attempt, Search},
    types::{Fingerprint, Nonce},
};

/// Sorted-list challenge: draw `nb_elements` numbers, sort them, and hash
/// their decimal forms in order.
pub struct SortedListSearch {
    rng: ChainRng,
    fingerprint: Fingerprint,
    order: SortOrder,
    list: Vec<u64>,
}

impl SortedListSearch {
    pub fn new(
        reference: &[u8],
        fingerprint: Fingerprint,
        nb_elements: usize,
        order: SortOrder,
        initial_nonce: Nonce,
    ) -> Self {
        Self {
            rng: ChainRng::new(reference, initial_nonce),
            fingerprint,
            order,
            list: vec![0; nb_elements],
        }
    }

    /// Nonce behind the seed the next attempt will use.
    pub fn nonce(&self) -> Nonce {
        self.rng.nonce()
    }
}

impl Search for SortedListSearch {
    fn attempt(&mut self) -> Attempt {
        for value in self.list.iter_mut() {
            *value = self.rng.next_u64();
        }

        match self.order {
            SortOrder::Ascending => self.list.sort_unstable(),
            SortOrder::Descending => self.list.sort_unstable_by(|a, b| b.cmp(a)),
        }

        let mut hasher = DecimalHasher::new();
        for value in &self.list {
            hasher.update(*value);
        }

        if matches_fingerprint(&hasher.finalize(), &self.fingerprint) {
            return Attempt::Found(self.rng.nonce());
        }

        self.rng.advance();
        Attempt::Miss
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

    fn search(prefix: &str, order: SortOrder) -> SortedListSearch {
        SortedListSearch::new(ZERO_HASH.as_bytes(), Fingerprint::parse(prefix).unwrap(), 10, order, 42)
    }

    #[test]
    fn finds_on_first_seed() {
        let mut search = search("c46db72f", SortOrder::Ascending);
        assert_eq!(search.attempt(), Attempt::Found(42));
    }

    #[test]
    fn reports_nonce_of_the_matching_seed() {
        // the chain from nonce 42 goes 42 -> 13456022957796054247 -> 4977525706291668934
        let mut search = search("8287ea12", SortOrder::Ascending);
        assert_eq!(search.attempt(), Attempt::Miss);
        assert_eq!(search.nonce(), 13456022957796054247);
        assert_eq!(search.attempt(), Attempt::Found(13456022957796054247));
    }

    #[test]
    fn descending_order_changes_the_digest() {
        let mut search = search("06ddac88", SortOrder::Descending);
        assert_eq!(search.attempt(), Attempt::Miss);
        assert_eq!(search.attempt(), Attempt::Miss);
        assert_eq!(search.attempt(), Attempt::Found(4977525706291668934));

        // the ascending digest for the first seed is not a descending match
        let mut search = SortedListSearch::new(
            ZERO_HASH.as_bytes(),
            Fingerprint::parse("c46db72f").unwrap(),
            10,
            SortOrder::Descending,
            42,
        );
        assert_eq!(search.attempt(), Attempt::Miss);
    }

    #[test]
    fn finds_a_short_prefix() {
        let mut search = search("0", SortOrder::Ascending);
        let found = (0..10_000).find_map(|_| match search.attempt() {
            Attempt::Found(nonce) => Some(nonce),
            _ => None,
        });
        assert!(found.is_some());
    }
}
