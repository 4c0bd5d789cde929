use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub const fn value(&self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }
    };
}

numeric_id!(
    /// Identifier of an escrowed task. Verification sessions are keyed by it too.
    TaskId,
    "task"
);
numeric_id!(
    /// Identifier of an appeal raised against a verified task.
    DisputeId,
    "dispute"
);
numeric_id!(
    /// External entity a task is performed against, resolved through the registry.
    TargetEntityId,
    "target"
);

/// Monotonic id source for one entity arena. Ids start at 1 and are never reused.
#[derive(Debug)]
pub struct IdAllocator<T> {
    next: AtomicU64,
    _marker: PhantomData<fn() -> T>,
}

impl<T: From<u64>> IdAllocator<T> {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            _marker: PhantomData,
        }
    }

    pub fn next_id(&self) -> T {
        T::from(self.next.fetch_add(1, Ordering::SeqCst))
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::SeqCst) - 1
    }
}

impl<T: From<u64>> Default for IdAllocator<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_is_monotonic() {
        let ids: IdAllocator<TaskId> = IdAllocator::new();
        let first = ids.next_id();
        let second = ids.next_id();

        assert_eq!(first, TaskId::new(1));
        assert_eq!(second, TaskId::new(2));
        assert!(second > first);
        assert_eq!(ids.issued(), 2);
    }

    #[test]
    fn test_display_and_serde() {
        let id = DisputeId::new(7);
        assert_eq!(id.to_string(), "dispute-7");
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");
        let parsed: DisputeId = serde_json::from_str("7").unwrap();
        assert_eq!(parsed, id);
    }
}
