//! The state shape contract and partial updates.
//!
//! Every namespace stores one value of a type implementing [`StateShape`].
//! Updates arrive as the type's associated `Partial`, which is merged onto the
//! current value **at the top level only**: each field present in the partial
//! replaces the stored field wholesale, nested values are never deep-merged,
//! and absent fields are left untouched.
//!
//! Two ways to get an implementation:
//!
//! - [`partial_state!`](crate::partial_state) declares a struct together with
//!   its partial companion (all fields `Option<_>`).
//! - `serde_json::Map<String, Value>` implements the trait with itself as the
//!   partial, for dynamically shaped objects.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// A complete, flat state record that can be shallow-merged and persisted.
///
/// The `Serialize`/`DeserializeOwned` bounds define the persisted form (JSON).
pub trait StateShape: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Partial update produced by reducers and accepted by `set_state`.
    type Partial: Send + 'static;

    /// Overwrites every field present in `partial`, leaving the rest untouched.
    fn merge(&mut self, partial: Self::Partial);
}

impl StateShape for Map<String, Value> {
    type Partial = Self;

    fn merge(&mut self, partial: Self::Partial) {
        for (key, value) in partial {
            self.insert(key, value);
        }
    }
}

/// Declares a state struct and its partial-update companion.
///
/// The partial struct has the same fields wrapped in `Option`, derives `Clone`
/// and `Default`, and gets one builder setter per field. The generated
/// [`StateShape`] impl copies every `Some` field onto the state.
///
/// Attributes on the state struct (derives, serde options) are passed through;
/// the state struct must at least derive `Clone`, `Serialize` and `Deserialize`.
///
/// # Example
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use statebus::domain::StateShape;
///
/// statebus::partial_state! {
///     #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
///     pub struct User => UserPatch {
///         pub name: String,
///         pub age: u32,
///     }
/// }
///
/// let mut user = User { name: "Ada".into(), age: 36 };
/// user.merge(UserPatch::default().age(37));
/// assert_eq!(user, User { name: "Ada".into(), age: 37 });
/// ```
#[macro_export]
macro_rules! partial_state {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident => $partial:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        #[doc = concat!("Partial update for [`", stringify!($name), "`]; `None` fields are left untouched.")]
        #[derive(Clone, Default)]
        $vis struct $partial {
            $(
                $field_vis $field: ::core::option::Option<$ty>,
            )*
        }

        impl $partial {
            $(
                #[must_use]
                #[allow(dead_code)]
                $field_vis fn $field(mut self, value: $ty) -> Self {
                    self.$field = ::core::option::Option::Some(value);
                    self
                }
            )*
        }

        impl $crate::domain::StateShape for $name {
            type Partial = $partial;

            fn merge(&mut self, partial: Self::Partial) {
                $(
                    if let ::core::option::Option::Some(value) = partial.$field {
                        self.$field = value;
                    }
                )*
            }
        }
    };
}
