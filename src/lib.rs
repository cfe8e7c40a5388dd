//! Comment insights service library.
//!
//! Collects comments left on a user's Instagram and YouTube content, matches
//! them to stored content records, classifies them through an external
//! insights service and caches the analysis per user, platform filter and
//! time range.

pub mod analysis;
pub mod auth;
pub mod cache;
pub mod classify;
pub mod collectors;
pub mod config;
pub mod content;
pub mod db;
pub mod model;
pub mod web;
