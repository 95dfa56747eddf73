use std::fmt::Display;

use super::error::ConfigurationError;

/// Declares a closed set of Kubernetes policy values with their exact API spelling.
macro_rules! policy_enum {
    (
        $(#[$meta:meta])*
        $name:ident, field = $field:literal,
        { $($(#[$vmeta:meta])* $variant:ident),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                $variant,
            )+
        }

        impl $name {
            pub const FIELD: &'static str = $field;
            pub const ALLOWED: &'static [&'static str] = &[$(stringify!($variant)),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant),)+
                }
            }

            /// Parses the Kubernetes spelling, case-sensitively.
            pub fn parse(value: &str) -> Result<Self, ConfigurationError> {
                match value {
                    $(stringify!($variant) => Ok($name::$variant),)+
                    other => Err(ConfigurationError::InvalidEnumValue {
                        field: Self::FIELD,
                        value: other.to_string(),
                        allowed: Self::ALLOWED,
                    }),
                }
            }

            pub fn parse_or_default(
                value: Option<&str>,
            ) -> Result<Self, ConfigurationError> {
                value.map_or(Ok(Self::default()), Self::parse)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ConfigurationError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

policy_enum! {
    /// How overlapping runs of the same CronJob are handled.
    ConcurrencyPolicy, field = "concurrencyPolicy",
    {
        /// Runs may overlap.
        #[default]
        Allow,
        /// Skip the new run while the previous one is still active.
        Forbid,
        /// Cancel the active run and start the new one.
        Replace,
    }
}

policy_enum! {
    /// How pod completions are tracked.
    CompletionMode, field = "completionMode",
    {
        #[default]
        NonIndexed,
        Indexed,
    }
}

policy_enum! {
    /// Restart policy of the job's pod.
    RestartPolicy, field = "restartPolicy",
    {
        #[default]
        OnFailure,
        Never,
    }
}

policy_enum! {
    /// When the kubelet pulls the container image.
    ImagePullPolicy, field = "imagePullPolicy",
    {
        Always,
        #[default]
        IfNotPresent,
        Never,
    }
}
