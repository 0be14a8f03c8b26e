#![doc = "couch-sync-core: core logic library for couch-sync."]

//! This crate holds the data model, the cluster collaborator traits and the
//! three pipelines: push (local tree to cluster), pull (cluster to local tree)
//! and export (view query results to JSON files).
//! The HTTP client implementing the traits lives in the `couch-sync` crate.
//!
//! # Usage
//! Build a [`contract::Cluster`] implementation and hand it to
//! [`push::push`], [`pull::pull`] or [`export::export`].

pub mod config;
pub mod contract;
pub mod error;
pub mod export;
pub mod index;
pub mod local;
pub mod model;
pub mod provision;
pub mod pull;
pub mod push;
pub mod reconcile;
pub mod report;
pub mod sanitize;
