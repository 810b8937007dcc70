// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

macro_rules! issue_token {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> u64 {
                self.0
            }

            /// The token issued after this one. Saturates instead of wrapping so
            /// a later token never compares equal to an earlier one.
            pub const fn next(self) -> Self {
                Self(self.0.saturating_add(1))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "#{}", self.0)
            }
        }
    };
}

issue_token!(ListToken);
issue_token!(FetchToken);
issue_token!(SubmitToken);
issue_token!(DeleteToken);
