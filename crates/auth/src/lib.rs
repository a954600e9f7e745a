// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential lifecycle for `gwx`: one OAuth2 token on disk, safe to share
//! between concurrent invocations, plus the scope registry that decides what
//! to ask for at login.

pub mod config;
pub mod error;
pub mod granted;
pub mod lock;
pub mod oauth;
pub mod persist;
pub mod scopes;
pub mod session;
pub mod store;
pub mod token;

pub use error::AuthError;
pub use granted::GrantedStore;
pub use lock::{LockConfig, LockGuard};
pub use scopes::ScopeSet;
pub use store::TokenStore;
pub use token::{merge, Token};

#[cfg(test)]
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
