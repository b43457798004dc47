// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod events;
pub mod flush;
pub mod history;
pub mod identity;
pub mod reconcile;
pub mod roster;
pub mod scheduler;
pub mod sheets;
pub mod sync;

pub use events::SyncEvent;
pub use flush::{FlushEngine, FlushOutcome, SkipReason};
pub use identity::{GoogleIdentity, IdentityProvider, StaticIdentity};
pub use reconcile::{ReconcileAction, Recomputed, Reconciler, TotalsSource};
pub use roster::RosterService;
pub use scheduler::SyncScheduler;
pub use sheets::{SheetsApi, SheetsClient};
pub use sync::SyncService;
