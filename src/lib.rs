// Coral wallet core: multi-ledger balances, append-only transaction log,
// donations, coupons, points rules, and the wallet security guard.

pub mod config;
pub mod coupons;
pub mod database;
pub mod error;
pub mod http;
pub mod ledger;
pub mod models;
pub mod points;
pub mod security;
pub mod store;
pub mod transfer;
