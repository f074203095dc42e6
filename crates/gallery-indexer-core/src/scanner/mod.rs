pub mod extensions;
pub mod metadata;
pub mod walk;

pub use extensions::{normalize_extension, ExtensionSet};
pub use metadata::read_file_record;
pub use walk::{ScanTally, Scanner};
