//! Dashboard store with a single transition function.
//!
//! Architecture:
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │  Dispatcher  │────►│   Decoded    │────►│   Reducer    │
//! │  (service)   │     │   events     │     │ (atomic fn)  │
//! └──────────────┘     └──────────────┘     └──────────────┘
//!                                                  │
//!                                                  ▼
//!                      ┌──────────────┐     ┌──────────────┐
//!                      │    Views     │◄────│    State     │
//!                      │ (read-only)  │     │  (hashed)    │
//!                      └──────────────┘     └──────────────┘
//! ```
//!
//! Every external event maps to exactly one transition. A transition either
//! replaces all the fields it owns or leaves the state untouched.

pub mod events;
pub mod reducer;
pub mod state;
