use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A row change on one table, carrying the before and/or after image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChangeEvent<T> {
    Created { new: T },
    Modified { old: T, new: T },
    Removed { old: T },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Modified,
    Removed,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::Modified => "modified",
            EventKind::Removed => "removed",
        }
    }
}

impl<T> ChangeEvent<T> {
    pub fn kind(&self) -> EventKind {
        match self {
            ChangeEvent::Created { .. } => EventKind::Created,
            ChangeEvent::Modified { .. } => EventKind::Modified,
            ChangeEvent::Removed { .. } => EventKind::Removed,
        }
    }

    /// The row as it is after the change, if it still exists.
    pub fn new_row(&self) -> Option<&T> {
        match self {
            ChangeEvent::Created { new } | ChangeEvent::Modified { new, .. } => Some(new),
            ChangeEvent::Removed { .. } => None,
        }
    }
}

impl<T: Clone> ChangeEvent<T> {
    /// Rewrites the event as seen by a subscriber who can only read rows
    /// accepted by `visible`. A row leaving the subscriber's view arrives as
    /// `removed`, a row entering it as `created`.
    pub fn project(&self, visible: impl Fn(&T) -> bool) -> Option<ChangeEvent<T>> {
        match self {
            ChangeEvent::Created { new } => visible(new).then(|| self.clone()),
            ChangeEvent::Removed { old } => visible(old).then(|| self.clone()),
            ChangeEvent::Modified { old, new } => match (visible(old), visible(new)) {
                (true, true) => Some(self.clone()),
                (false, true) => Some(ChangeEvent::Created { new: new.clone() }),
                (true, false) => Some(ChangeEvent::Removed { old: old.clone() }),
                (false, false) => None,
            },
        }
    }
}
