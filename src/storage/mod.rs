//!  Storage is organized through [state_store::RedundantStateStore].
//!  The basic idea is:
//!   - The whole state is rewritten into several files on every transition.
//!   - Each file holds the pretty printed state, a newline and a SHA-1 digest of the state.
//!   - On startup the newest copy whose digest matches is used, the rest are ignored.

pub mod record;
pub mod state_store;
