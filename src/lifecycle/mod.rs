//! # System Lifecycle
//!
//! Starting, wiring and stopping the storefront.
//!
//! ## Startup Order
//!
//! 1. **Stores**: one actor per collection, spawned first since everything
//!    else holds their clients.
//! 2. **Shared collaborators**: the id allocator (over the counter store), the
//!    cache, and the broker.
//! 3. **Usecases**: each gets clones of the collaborators it needs.
//! 4. **Consumers**: subscribed before `start` returns, so no order created
//!    afterwards can slip past inventory unseen (short of a broker failure).
//!
//! ## Graceful Shutdown
//!
//! 1. **Close the broker**: consumers drain what they already received and exit.
//! 2. **Drop usecases**: closes the senders of every store channel.
//! 3. **Stores exit**: each actor answers the requests already queued, logs
//!    its final size and returns.
//!
//! Store actors only see their channel close when *every* client is gone. A
//! usecase clone kept past `shutdown` keeps its store alive and makes
//! `shutdown` wait.
//!
//! ## Observability
//!
//! [`setup_tracing`] installs the subscriber; see [`tracing`](self::tracing)
//! for what gets logged at which level.

pub mod system;
pub mod tracing;

pub use self::system::*;
pub use self::tracing::*;
