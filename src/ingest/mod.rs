pub mod date;
pub mod loader;
pub mod parser;

pub use date::{parse_query_date, parse_timestamp};
pub use loader::Loader;
pub use parser::{parse_line, parse_row};
