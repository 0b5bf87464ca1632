// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cloud transport: session management and address resolution.
//!
//! - [`SessionManager`]: logs in with indefinite retry and issues
//!   authenticated requests
//! - [`ResolverCache`]: TTL-aware DNS cache the session's HTTP client
//!   resolves through, so requests rotate across the service's addresses

mod resolver;
mod session;

pub use resolver::{AddressLookup, LookupFuture, ResolvedAddress, ResolverCache, SystemLookup};
pub use session::{CONTEXT_KEY_HEADER, CloudRequest, Session, SessionConfig, SessionManager};
