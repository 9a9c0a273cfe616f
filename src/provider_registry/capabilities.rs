use serde::{Deserialize, Serialize};

/// Bitset of model indices a given Auth (or provider) can serve. Runtime
/// representation is identical to `u64`; the newtype just encodes intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ModelMask(u64);

impl ModelMask {
    #[inline(always)]
    pub fn none() -> Self {
        Self(0)
    }

    #[inline(always)]
    pub fn all() -> Self {
        Self(u64::MAX)
    }

    #[inline(always)]
    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    #[inline(always)]
    pub fn bits(&self) -> u64 {
        self.0
    }

    #[inline(always)]
    pub fn supports(&self, index: usize) -> bool {
        (self.0 & (1u64 << index)) != 0
    }

    #[inline(always)]
    pub fn enable(&mut self, index: usize) {
        self.0 |= 1u64 << index;
    }

    #[inline(always)]
    pub fn disable(&mut self, index: usize) {
        self.0 &= !(1u64 << index);
    }

    #[inline(always)]
    pub fn contains_all(&self, required: ModelMask) -> bool {
        (self.0 & required.0) == required.0
    }

    #[inline(always)]
    pub fn intersects(&self, other: ModelMask) -> bool {
        (self.0 & other.0) != 0
    }

    #[inline(always)]
    pub fn merge(&self, other: ModelMask) -> Self {
        Self(self.0 | other.0)
    }
}

impl std::ops::BitOr for ModelMask {
    type Output = Self;
    #[inline(always)]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitAnd for ModelMask {
    type Output = Self;
    #[inline(always)]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// Thinking/reasoning capability metadata for one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thinking {
    pub min: i64,
    pub max: i64,
    pub zero_allowed: bool,
    pub dynamic_allowed: bool,
    /// Discrete effort levels (`low|medium|high`), when the provider exposes
    /// thinking as a level rather than a numeric budget.
    pub levels: Option<&'static [&'static str]>,
}

impl Thinking {
    pub const fn none() -> Self {
        Self {
            min: 0,
            max: 0,
            zero_allowed: true,
            dynamic_allowed: false,
            levels: None,
        }
    }

    /// Clamps a requested budget to the registered range. Dynamic (`-1`)
    /// requests yield `-1` when dynamic is allowed, else the midpoint (or
    /// `min` when the midpoint is non-positive and zero is disallowed).
    pub fn normalize_budget(&self, requested: i64) -> i64 {
        if requested == -1 {
            if self.dynamic_allowed {
                return -1;
            }
            let mid = (self.min + self.max) / 2;
            return if mid <= 0 && !self.zero_allowed {
                self.min.max(1)
            } else {
                mid
            };
        }
        requested.clamp(self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_budget_clamps_to_range() {
        let t = Thinking {
            min: 0,
            max: 100,
            zero_allowed: true,
            dynamic_allowed: false,
            levels: None,
        };
        assert_eq!(t.normalize_budget(500), 100);
        assert_eq!(t.normalize_budget(-5), 0);
    }

    #[test]
    fn normalize_budget_dynamic_without_support_falls_back_to_midpoint() {
        let t = Thinking {
            min: 0,
            max: 100,
            zero_allowed: true,
            dynamic_allowed: false,
            levels: None,
        };
        assert_eq!(t.normalize_budget(-1), 50);
    }

    #[test]
    fn normalize_budget_dynamic_with_support_passes_through() {
        let t = Thinking {
            min: 0,
            max: 100,
            zero_allowed: true,
            dynamic_allowed: true,
            levels: None,
        };
        assert_eq!(t.normalize_budget(-1), -1);
    }

    #[test]
    fn normalize_budget_nonpositive_midpoint_without_zero_uses_min() {
        let t = Thinking {
            min: 1,
            max: 1,
            zero_allowed: false,
            dynamic_allowed: false,
            levels: None,
        };
        assert_eq!(t.normalize_budget(-1), 1);
    }

    #[test]
    fn mask_supports_and_merge() {
        let mut m = ModelMask::none();
        m.enable(2);
        assert!(m.supports(2));
        assert!(!m.supports(1));
        let merged = m.merge(ModelMask::from_bits(1 << 1));
        assert!(merged.supports(1) && merged.supports(2));
    }
}
