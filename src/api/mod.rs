//! Public API for embedding the importer

pub mod import_api;
