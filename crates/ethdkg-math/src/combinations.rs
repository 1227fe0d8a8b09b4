//! Lazy k-subset enumeration
//!
//! [`NChooseK`] yields the `k`-subsets of `0..n` in lexicographic order, one
//! at a time, so a caller can stop at the first witness or cap the search.

/// Lexicographic generator of `k`-subsets of `0..n`
#[derive(Debug, Clone)]
pub struct NChooseK {
    n: usize,
    k: usize,
    next: Option<Vec<usize>>,
    limit: Option<usize>,
    produced: usize,
}

impl NChooseK {
    /// All `k`-subsets of `0..n`; empty when `k > n`
    pub fn new(n: usize, k: usize) -> Self {
        Self {
            n,
            k,
            next: (k <= n).then(|| (0..k).collect()),
            limit: None,
            produced: 0,
        }
    }

    /// Stop after yielding `limit` subsets
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Optional form of [`NChooseK::with_limit`]
    pub fn with_optional_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Subsets yielded so far
    pub fn produced(&self) -> usize {
        self.produced
    }

    /// `true` once the cap stopped the enumeration before it was complete
    pub fn limit_reached(&self) -> bool {
        self.next.is_some() && self.limit.is_some_and(|limit| self.produced >= limit)
    }

    /// Start over from the first subset, keeping the limit
    pub fn restart(&mut self) {
        *self = Self::new(self.n, self.k).with_optional_limit(self.limit);
    }

    /// Total number of subsets, saturating at `u128::MAX`
    pub fn total(&self) -> u128 {
        binomial(self.n, self.k)
    }

    fn advance(&self, current: &[usize]) -> Option<Vec<usize>> {
        let (n, k) = (self.n, self.k);
        let pivot = (0..k).rev().find(|&i| current[i] < n - k + i)?;

        let mut next = current.to_vec();
        next[pivot] += 1;
        for i in pivot + 1..k {
            next[i] = next[i - 1] + 1;
        }
        Some(next)
    }
}

impl Iterator for NChooseK {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.limit.is_some_and(|limit| self.produced >= limit) {
            return None;
        }
        let current = self.next.take()?;
        self.next = self.advance(&current);
        self.produced += 1;
        Some(current)
    }
}

/// `C(n, k)`, saturating
pub fn binomial(n: usize, k: usize) -> u128 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    (0..k).fold(1u128, |acc, i| {
        acc.saturating_mul((n - i) as u128) / (i as u128 + 1)
    })
}
