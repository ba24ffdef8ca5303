//! # Mod API
//!
//! Contracts shared by every mod in this workspace. A mod never talks to the
//! host game directly; it talks to the collaborators defined here and the host
//! binary supplies concrete implementations.
//!
//! ## Collaborators
//!
//! - [`Clock`] - wall time in UTC
//! - [`RandomPicker`] - uniform shuffles and picks
//! - [`Messenger`] - fire-and-forget chat broadcast / private message
//! - [`RewardGrantor`] - potentially failing reward delivery
//! - [`PlayerDirectory`] - asynchronous display-name lookup, fronted by [`NameCache`]

pub mod clock;
pub mod logging;
pub mod messaging;
pub mod names;
pub mod random;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use logging::setup_logging;
pub use messaging::{render_template, GrantError, Messenger, Reward, RewardGrantor};
pub use names::{fallback_name, NameCache, PlayerDirectory};
pub use random::{shuffle, RandomPicker, ThreadRandom};
pub use types::PlayerId;
