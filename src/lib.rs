pub mod api_server;
pub mod app;
pub mod cli;
pub mod config;
pub mod event;
pub mod export;
pub mod parser;
pub mod schedule;
pub mod table;

use env_logger::Env;

pub fn init_logger() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            use chrono::Local;
            use std::io::Write;
            writeln!(
                buf,
                "{} [{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();
}

// Re-export commonly used types
pub use config::Config;
pub use event::{Priority, StructuredEvent};
pub use export::{
    CalendarRecord, CalendarSerializer, Export, ExportError, ExportSettings, UnparseablePolicy,
};
pub use parser::{EventBuilder, ParseError};
pub use table::{normalize_rows, ColumnMapping, RawRow, TableEvent};
