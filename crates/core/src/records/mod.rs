//! The three optional clinical sub-records of a procedure.
//!
//! Each lives in its own singleton sub-collection under the procedure
//! document and has cardinality 0..1: absence means "not yet created", which
//! is normal application state, never an error.

pub mod pacu;
pub mod pre_anaesthetic;
pub mod surgery;
