//! Typed partial updates
//!
//! Each record gets a companion patch struct where every field is optional:
//! - required record fields become `Option<T>` (absent = unchanged)
//! - optional record fields become `Option<Option<T>>` (absent = unchanged,
//!   `null` = clear)
//!
//! Unknown fields are rejected at decode time.

/// Serde adapter distinguishing an absent field from an explicit `null`
pub(crate) mod nullable {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[allow(clippy::ref_option)]
    pub(crate) fn serialize<S, T>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub(crate) fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

/// Generate a patch struct for a record
///
/// Field names on the right of `=>` are the camelCase wire names reported by
/// `apply_to`.
macro_rules! artifact_patch {
    (
        $(#[$meta:meta])*
        $patch:ident for $record:ident {
            required { $($req:ident : $req_ty:ty => $req_name:literal),* $(,)? }
            optional { $($opt:ident : $opt_ty:ty => $opt_name:literal),* $(,)? }
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "camelCase", deny_unknown_fields)]
        pub struct $patch {
            $(
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $req: Option<$req_ty>,
            )*
            $(
                #[serde(
                    default,
                    skip_serializing_if = "Option::is_none",
                    with = "crate::patch::nullable"
                )]
                pub $opt: Option<Option<$opt_ty>>,
            )*
        }

        impl $patch {
            /// Whether no field is set
            #[must_use]
            pub fn is_empty(&self) -> bool {
                true $(&& self.$req.is_none())* $(&& self.$opt.is_none())*
            }

            /// Merge onto `record`, returning the fields whose value changed
            pub fn apply_to(&self, record: &mut $record) -> Vec<&'static str> {
                let mut changed = Vec::new();
                $(
                    if let Some(value) = &self.$req {
                        if record.$req != *value {
                            record.$req = value.clone();
                            changed.push($req_name);
                        }
                    }
                )*
                $(
                    if let Some(value) = &self.$opt {
                        if record.$opt != *value {
                            record.$opt = value.clone();
                            changed.push($opt_name);
                        }
                    }
                )*
                changed
            }
        }
    };
}

pub(crate) use artifact_patch;
