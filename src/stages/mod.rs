//! Pipeline stages
//!
//! One entry point per stage. Each reads its inputs from the paths it is
//! given, writes its outputs, and returns a report; the binaries under
//! `src/bin/` only parse arguments and print.
//!
//! ```text
//! raw_data ──load_data──> extracted.csv ──preprocess──┬─> train.csv ──train──> model.bin
//!                                                     └─> test.csv ─────┐         │
//!                                                                       └─evaluate┘
//! ```

pub mod evaluate;
pub mod load_data;
pub mod preprocess;
pub mod train;

pub use evaluate::EvaluationReport;
pub use load_data::LoadReport;
pub use preprocess::SplitReport;
pub use train::TrainingReport;
