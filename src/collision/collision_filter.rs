use bitflags::bitflags;

use crate::shapes::Shape;

#[cfg(feature = "serialize")]
use serde::{Serialize, Deserialize};

bitflags! {
    /// A bit mask naming the collision categories a shape belongs to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
    pub struct CollisionCategory: u16 {
        /// Default category
        const DEFAULT    = 0x0001;

        /// Static scenery
        const STATIC     = 0x0002;

        /// Dynamic objects
        const DYNAMIC    = 0x0004;

        /// Character objects
        const CHARACTER  = 0x0008;

        /// Fast projectiles
        const PROJECTILE = 0x0010;

        /// Sensor volumes
        const SENSOR     = 0x0020;

        /// Debris
        const DEBRIS     = 0x0040;

        const GROUP8     = 0x0080;
        const GROUP9     = 0x0100;
        const GROUP10    = 0x0200;
        const GROUP11    = 0x0400;
        const GROUP12    = 0x0800;
        const GROUP13    = 0x1000;
        const GROUP14    = 0x2000;
        const GROUP15    = 0x4000;
        const GROUP16    = 0x8000;

        /// Every category
        const ALL        = 0xFFFF;
    }
}

impl Default for CollisionCategory {
    fn default() -> Self {
        CollisionCategory::DEFAULT
    }
}

/// Collision filtering data carried by each shape
///
/// Shapes sharing a non-zero group always collide (positive group) or never
/// collide (negative group). Otherwise each shape's category must be in the
/// other's mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct FilterData {
    pub category_bits: CollisionCategory,
    pub mask_bits: CollisionCategory,
    pub group_index: i16,
}

impl Default for FilterData {
    fn default() -> Self {
        Self {
            category_bits: CollisionCategory::DEFAULT,
            mask_bits: CollisionCategory::ALL,
            group_index: 0,
        }
    }
}

impl FilterData {
    /// Creates filter data from a category, a mask and a group
    pub fn new(category_bits: CollisionCategory, mask_bits: CollisionCategory, group_index: i16) -> Self {
        Self {
            category_bits,
            mask_bits,
            group_index,
        }
    }

    /// Applies the group and mask rules to two filters
    pub fn should_collide(&self, other: &FilterData) -> bool {
        if self.group_index == other.group_index && self.group_index != 0 {
            return self.group_index > 0;
        }

        self.mask_bits.intersects(other.category_bits) && other.mask_bits.intersects(self.category_bits)
    }
}

/// Decides whether two shapes should generate a contact
pub trait ContactFilter: Send + Sync {
    /// Returns whether the two shapes should be tested for collision
    fn should_collide(&self, shape1: &Shape, shape2: &Shape) -> bool;
}

/// The default filter, based on each shape's group and mask bits
#[derive(Debug, Default, Clone, Copy)]
pub struct GroupMaskFilter;

impl ContactFilter for GroupMaskFilter {
    fn should_collide(&self, shape1: &Shape, shape2: &Shape) -> bool {
        shape1.get_filter().should_collide(&shape2.get_filter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_overrides_mask() {
        let a = FilterData::new(CollisionCategory::DEFAULT, CollisionCategory::empty(), 3);
        let b = FilterData::new(CollisionCategory::DYNAMIC, CollisionCategory::empty(), 3);
        assert!(a.should_collide(&b));

        let c = FilterData::new(CollisionCategory::DEFAULT, CollisionCategory::ALL, -2);
        let d = FilterData::new(CollisionCategory::DEFAULT, CollisionCategory::ALL, -2);
        assert!(!c.should_collide(&d));
    }

    #[test]
    fn test_mask_is_symmetric() {
        let a = FilterData::new(CollisionCategory::DEFAULT, CollisionCategory::STATIC, 0);
        let b = FilterData::new(CollisionCategory::STATIC, CollisionCategory::DYNAMIC, 0);
        assert!(!a.should_collide(&b));
        assert!(!b.should_collide(&a));

        let c = FilterData::new(CollisionCategory::DYNAMIC, CollisionCategory::STATIC, 0);
        assert!(b.should_collide(&c));
        assert!(c.should_collide(&b));
    }
}
