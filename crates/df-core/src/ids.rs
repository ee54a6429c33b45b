use core::fmt;
use core::num::NonZeroU32;

/// Position of a model type in a system, in registration order.
///
/// Stored as `index + 1` so `Option<ModelId>` stays four bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(NonZeroU32);

impl ModelId {
    pub fn from_usize(index: usize) -> Self {
        let raw = u32::try_from(index)
            .ok()
            .and_then(|i| i.checked_add(1))
            .and_then(NonZeroU32::new);
        match raw {
            Some(raw) => Self(raw),
            None => panic!("model index {index} exceeds u32"),
        }
    }

    pub fn as_usize(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

impl fmt::Debug for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelId({})", self.as_usize())
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model#{}", self.as_usize())
    }
}
