//! # Core Application Logic
//!
//! This module contains Susu's business logic.
//! It knows nothing about any specific UI technology.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │         CORE            │
//!                    │  (this module)          │
//!                    │                         │
//!                    │  • State (app data)     │
//!                    │  • Action (events)      │
//!                    │  • update() (reducer)   │
//!                    │                         │
//!                    │  I/O only via Effects   │
//!                    └───────────┬─────────────┘
//!                                │
//!            ┌───────────────────┼───────────────────┐
//!            ▼                   ▼                   ▼
//!     ┌────────────┐      ┌────────────┐      ┌────────────┐
//!     │    CLI     │      │  Storage   │      │ Inference  │
//!     │  Adapter   │      │ (files /   │      │ (OpenRouter│
//!     │  (stdin)   │      │  memory)   │      │  or mock)  │
//!     └────────────┘      └────────────┘      └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`state`]: The `App` struct, all application state in one place
//! - [`action`]: The `Action` enum and the `update()` reducer
//! - [`attachment`], [`composer`], [`dispatch`]: one turn, from files to reply
//! - [`thread_store`], [`session`]: what gets persisted, and where
//! - [`storage`], [`auth`], [`config`]: ambient plumbing

pub mod action;
pub mod attachment;
pub mod auth;
pub mod composer;
pub mod config;
pub mod dispatch;
pub mod session;
pub mod state;
pub mod storage;
pub mod thread_store;

pub use action::{Action, Effect, update};
pub use state::App;
