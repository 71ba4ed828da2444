//! Core types for Listkeeper.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod address;
pub mod email;
pub mod id;
pub mod phone;
pub mod status;

pub use address::{ContactAddress, ContactAddressError, ContactKind};
pub use email::{Email, EmailError};
pub use id::*;
pub use phone::{PhoneNumber, PhoneNumberError};
pub use status::{SubscriptionStatus, SubscriptionStatusError, SuppressionKind};
