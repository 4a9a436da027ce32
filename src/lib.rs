//! # docqa
//!
//! Ask questions of your documents. docqa splits documents into sentence
//! or chunk units, embeds them, and answers a question with the single
//! best-matching unit, attributed to the document it came from, plus a
//! confidence score. An optional answer composer rewrites the retrieved
//! passages into prose without losing the attribution.
//!
//! Retrieval logic lives in the `docqa-core` crate. This crate adds the
//! concrete pieces around it: embedding backends, composers, SQLite
//! persistence, document extraction, the CLI, and the HTTP server.
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌────────────┐
//! │  Documents   │──▶│  docqa-core │──▶│   SQLite   │
//! │ TXT/PDF/DOCX │   │ Embed+Index │   │  snapshot  │
//! └──────────────┘   └──────┬──────┘   └────────────┘
//!                           │
//!                ┌──────────┴─────────┐
//!                ▼                    ▼
//!           ┌──────────┐        ┌──────────┐
//!           │   CLI    │        │   HTTP   │
//!           │ (docqa)  │        │  (axum)  │
//!           └──────────┘        └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docqa init                          # create database
//! docqa ingest ./handbook             # ingest a directory
//! docqa ask "Where is the fire exit?"
//! docqa serve                         # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`embedding`] | Embedding providers |
//! | [`compose`] | Answer composers |
//! | [`extract`] | PDF/DOCX/text extraction |
//! | [`sqlite_storage`] | Durable knowledge base |
//! | [`server`] | HTTP API |

pub mod app;
pub mod ask;
pub mod compose;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod http;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod server;
pub mod sqlite_storage;
pub mod stats;
