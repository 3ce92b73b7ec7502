// Flow survey interchange file import

pub mod csv_line;
pub mod timebase;
pub mod trace_importer;

// Re-export commonly used items
pub use timebase::{ColumnKind, TimeBaseGroup};
pub use trace_importer::{parse_file, ParseResult, TraceImporter};
