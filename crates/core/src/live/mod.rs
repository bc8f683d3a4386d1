//! The live procedure aggregate and its building blocks.
//!
//! Data flows one way: store → subscription adapters → aggregate pump →
//! derived rules → consumers. Mutations go the other way, through
//! [`crate::mutations::ProcedureMutations`], and re-enter via the
//! subscriptions.

pub mod aggregate;
pub(crate) mod document;
pub(crate) mod singleton;
pub mod status;
