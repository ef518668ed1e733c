//! Laravel editor assistance: call-site detection and argument resolution
//! over PHP and Blade source, plus the project indexes the features consume.
//!
//! The pipeline is lexical throughout. [`scanner`] tokenizes a document into
//! strings, comments, identifiers and delimiters without building a syntax
//! tree; [`detect`] walks those tokens to locate the call under a cursor and
//! [`autocomplete`] resolves which argument the cursor sits in. [`facades`]
//! maps `use` aliases back to fully qualified facade names so `Route::get`
//! is recognized under any import alias. [`features`] wires the detection
//! core to concrete assistance domains (views, routes, config keys, ...)
//! against the file-system snapshots built by [`index`].

pub mod autocomplete;
pub mod detect;
pub mod facades;
pub mod features;
pub mod index;
pub mod project;
pub mod scanner;
pub mod text;
