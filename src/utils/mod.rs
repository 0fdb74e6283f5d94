mod file_io;
pub use file_io::*;
