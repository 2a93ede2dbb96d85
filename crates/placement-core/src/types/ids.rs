//! Identifier newtypes

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identity of a placed instance
    InstanceId
);
id_type!(
    /// Node in the host scene graph (what a raycast hits)
    SceneNodeId
);
id_type!(
    /// Persisted world anchor owned by the persistence layer
    WorldAnchorId
);
id_type!(
    /// Detected plane anchor
    PlaneId
);
id_type!(
    /// Durable annotation
    AnnotationId
);
