// Adapters to the outside world: the conversion engine and batch input files.

pub mod converters;
pub mod sources;
