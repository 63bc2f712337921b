//! Rocket Shoes Storefront library.
//!
//! Stock-checked shopping cart with write-through persistence, plus the
//! JSON HTTP surface that exposes it to UI clients.
//!
//! # Modules
//!
//! - [`cart`] - `CartManager` and operation outcomes
//! - [`catalog`] - Product/stock lookups (REST client and in-memory)
//! - [`storage`] - Persistent key-value stores for the cart
//! - [`notify`] - User-facing notices
//! - [`routes`] - axum handlers for the cart API

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod config;
pub mod error;
pub mod notify;
pub mod routes;
pub mod state;
pub mod storage;
