pub mod libreoffice;

pub use libreoffice::LibreOfficeConverter;
