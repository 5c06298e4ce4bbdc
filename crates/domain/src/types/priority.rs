//! Item priority tiers
//!
//! A constructed [`ItemPriority`] is always one of the three tiers. Raw values
//! are checked where they are converted (`TryFrom<u8>`, `FromStr`, serde), so
//! queues never have to deal with an out-of-range priority.

use serde::{Deserialize, Serialize};

use crate::{impl_domain_conversions, SpoolError};

/// Priority tier of a work item, ordered `Low < Normal < High`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum ItemPriority {
    Low = 0,
    #[default]
    Normal = 1,
    High = 2,
}

impl_domain_conversions!(ItemPriority {
    Low => "low",
    Normal => "normal",
    High => "high",
});

impl ItemPriority {
    /// All tiers, highest first (dequeue order)
    pub const DESCENDING: [Self; 3] = [Self::High, Self::Normal, Self::Low];
}

impl TryFrom<u8> for ItemPriority {
    type Error = SpoolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Low),
            1 => Ok(Self::Normal),
            2 => Ok(Self::High),
            other => Err(SpoolError::InvalidArgument(format!(
                "item priority {other} is out of range (0 = low, 1 = normal, 2 = high)"
            ))),
        }
    }
}

impl From<ItemPriority> for u8 {
    fn from(priority: ItemPriority) -> Self {
        priority as Self
    }
}

/// Work items that carry their own priority tier
pub trait Prioritized {
    /// Tier the item is routed to on enqueue
    fn item_priority(&self) -> ItemPriority;
}

impl<T: Prioritized + ?Sized> Prioritized for Box<T> {
    fn item_priority(&self) -> ItemPriority {
        (**self).item_priority()
    }
}

impl<T: Prioritized + ?Sized> Prioritized for std::sync::Arc<T> {
    fn item_priority(&self) -> ItemPriority {
        (**self).item_priority()
    }
}
