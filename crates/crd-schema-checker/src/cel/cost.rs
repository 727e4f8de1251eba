//! The static cost model used to estimate the worst case evaluation cost of an
//! expression.
//!
//! Costs are abstract units which roughly correspond to the operations the
//! runtime performs. All arithmetic saturates at [`u64::MAX`], which stands for
//! an unbounded cost.

/// Cost of traversing a single byte of a string.
pub const STRING_TRAVERSAL_COST_FACTOR: f64 = 0.1;

/// Cost per byte of matching against a regular expression.
pub const REGEX_STRING_LENGTH_COST_FACTOR: f64 = 0.25;

pub const LIST_CREATE_BASE_COST: u64 = 10;
pub const MAP_CREATE_BASE_COST: u64 = 30;
pub const SELECT_AND_IDENT_COST: u64 = 1;
pub const CONST_COST: u64 = 0;

/// Size of a value whose size is not known statically.
pub const UNBOUNDED: u64 = u64::MAX;

/// A `[min, max]` cost range.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CostEstimate {
    pub min: u64,
    pub max: u64,
}

impl CostEstimate {
    pub const ZERO: Self = Self::fixed(0);

    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    pub const fn fixed(cost: u64) -> Self {
        Self::new(cost, cost)
    }

    #[must_use]
    pub fn add(self, other: Self) -> Self {
        Self {
            min: self.min.saturating_add(other.min),
            max: self.max.saturating_add(other.max),
        }
    }

    #[must_use]
    pub fn add_fixed(self, cost: u64) -> Self {
        self.add(Self::fixed(cost))
    }

    /// Multiplies both bounds by `factor`.
    #[must_use]
    pub fn multiply(self, factor: u64) -> Self {
        Self {
            min: self.min.saturating_mul(factor),
            max: self.max.saturating_mul(factor),
        }
    }

    /// Returns the cost of either `self` or `other`, whichever is taken.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

/// Returns `ceil(size * factor)`, keeping unbounded sizes unbounded.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn scaled(size: u64, factor: f64) -> u64 {
    if size == UNBOUNDED {
        return UNBOUNDED;
    }

    // Sizes are bounded by the request size long before they lose precision
    // as a float.
    let cost = (size as f64 * factor).ceil();

    if cost >= u64::MAX as f64 {
        UNBOUNDED
    } else {
        cost as u64
    }
}

/// Cost of traversing a string or bytes value of `size` bytes.
pub fn traversal_cost(size: u64) -> u64 {
    scaled(size, STRING_TRAVERSAL_COST_FACTOR)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, 0)]
    #[case(1, 1)]
    #[case(10, 1)]
    #[case(11, 2)]
    #[case(1000, 100)]
    #[case(UNBOUNDED, UNBOUNDED)]
    fn traversal(#[case] size: u64, #[case] expected: u64) {
        assert_eq!(traversal_cost(size), expected);
    }

    #[test]
    fn arithmetic_saturates() {
        let cost = CostEstimate::fixed(u64::MAX - 1).add_fixed(10);
        assert_eq!(cost, CostEstimate::fixed(u64::MAX));

        let cost = CostEstimate::new(2, u64::MAX / 2).multiply(3);
        assert_eq!(cost, CostEstimate::new(6, u64::MAX));
    }

    #[test]
    fn union_takes_the_widest_range() {
        let cost = CostEstimate::new(1, 5).union(CostEstimate::new(3, 10));
        assert_eq!(cost, CostEstimate::new(1, 10));
    }
}
