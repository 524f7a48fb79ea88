//! Crux extraction and the structured debate output schema.

pub mod extractor;
pub mod output;

pub use extractor::{settling_question, Camp, CruxAnalysis, CruxAssumption, CruxExtractor};
pub use output::{DebateOutput, EvidenceLedgerEntry, FaultLine, OutputCrux, OutputFlipCondition};
