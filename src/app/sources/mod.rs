pub mod records;

pub use records::load_records;
