//! Rocket Shoes Core - Shared types library.
//!
//! This crate provides the domain types shared by the Rocket Shoes components:
//! - `storefront` - Cart manager, catalog client, storage and HTTP surface
//! - `cli` - Command-line front end for the cart
//!
//! # Architecture
//!
//! The core crate contains only types and pure cart arithmetic - no I/O, no
//! storage access, no HTTP clients. Stock checks and persistence live in the
//! storefront crate.
//!
//! # Modules
//!
//! - [`types`] - Product ids, prices, products, stock and cart line items

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
