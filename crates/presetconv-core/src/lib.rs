//! # presetconv-core
//!
//! A library for analyzing, parsing and converting GP-5 presets into GP-50
//! presets.
//!
//! This crate provides the core functionality for:
//! - Inspecting unknown preset binaries (strings, patterns, header guesses)
//! - Parsing signature-tagged preset files into a typed model
//! - Converting models between formats under configurable rules
//! - Serializing models back to their byte layout
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`binary`]: Bounds-checked cursor reader and growable writer
//! - [`analyzer`]: Format-agnostic structural analysis and hex dumps
//! - [`layout`]: Per-format byte layout tables and signature registry
//! - [`parser`]: Signature detection and extraction into [`PresetModel`]
//! - [`rules`]: Parameter renames, effect mappings and value ranges
//! - [`convert`]: Rule-driven model conversion
//! - [`writer`]: Serialization, the inverse of parsing
//! - [`validate`]: Model validation against a layout
//! - [`fsio`]: File reading, verified writing with backups, discovery
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use presetconv_core::{fsio, ConversionEngine, FormatParser, FormatWriter};
//!
//! let parser = FormatParser::new();
//! let source = parser.parse_file("clean.gp5")?;
//!
//! let conversion = ConversionEngine::gp5_to_gp50().convert_with_report(&source)?;
//! for warning in &conversion.warnings {
//!     eprintln!("warning: {}", warning);
//! }
//!
//! let bytes = FormatWriter::new().write(&conversion.preset)?;
//! fsio::write_file("clean.gp50", &bytes, fsio::WriteOptions::default())?;
//! # Ok::<(), presetconv_core::Error>(())
//! ```
//!
//! ## Extensibility
//!
//! - [`ChecksumValidator`]: Plug per-format integrity checks into the parser
//! - [`LayoutRegistry`]: Register additional or corrected format layouts
//! - [`ConversionRuleSet`]: Load conversion rules from TOML
//!

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod analyzer;
pub mod binary;
pub mod convert;
pub mod error;
pub mod fsio;
pub mod layout;
pub mod model;
pub mod parser;
pub mod rules;
pub mod validate;
pub mod writer;

// Re-export primary types for convenience
pub use analyzer::{AnalysisReport, Analyzer, AnalyzerConfig, Comparison, HexDumper};
pub use binary::{ByteReader, ByteWriter, Endian};
pub use convert::{Conversion, ConversionEngine};
pub use error::{Error, Result};
pub use layout::{FieldKind, FormatLayout, LayoutRegistry, ParamField};
pub use model::{EffectKind, EffectSpec, FormatTag, PresetModel, Value};
pub use parser::{ChecksumValidator, FormatParser, NoChecksum, ParserConfig};
pub use rules::{ConversionRuleSet, EffectMapping, ParamRange};
pub use validate::{ValidationReport, Validator};
pub use writer::FormatWriter;

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
