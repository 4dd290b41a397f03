//! Domain models for Clinicore.
//!
//! Every type except [`clinic::Clinic`] carries an owning-clinic
//! reference. Visits and attachments derive theirs from the parent
//! patient; staff and audit events hold it directly.

pub mod attachment;
pub mod audit;
pub mod clinic;
pub mod patient;
pub mod staff;
pub mod visit;
