//! Result cursors and the reader handed to result handlers.

mod cursor;
mod reader;
mod result_set;

pub use cursor::{BufferedCursor, ColumnSchema, ResultCursor};
pub use reader::SpResultsReader;
pub use result_set::ResultSet;
