//! # plutocon-domain
//!
//! Pure domain model for a Plutocon beacon session.
//!
//! ## Responsibilities
//! - The fixed **characteristic schema** (UUID constants and default read order)
//! - The **characteristic cache** holding last-known raw values
//! - The **value codec**: big-endian integers, strings, firmware versions,
//!   the 128-bit identifier and the coordinates packed into it
//! - **Connection states** and the **device identity**
//! - Error conventions shared by every layer
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod cache;
pub mod characteristic;
pub mod codec;
pub mod device;
pub mod error;
pub mod state;
pub mod version;
