//! STEP exchange file support

pub mod extract;
pub mod parser;

use std::borrow::Cow;
use std::path::Path;

pub use extract::{extract_instances, frame_rotation};
pub use parser::{parse, Assembly, FileKind, PlacementFrame, Product, Usage};

/// Read an exchange file as text
///
/// Bytes that are not UTF-8 (Latin-1 product names are common) are replaced
/// rather than rejected. A file that cannot be read yields empty text, which
/// parses to an empty assembly.
pub fn read_file(path: &Path) -> String {
    match std::fs::read(path) {
        Ok(bytes) => decode(&bytes).into_owned(),
        Err(e) => {
            tracing::warn!("cannot read {}: {}", path.display(), e);
            String::new()
        }
    }
}

fn decode(bytes: &[u8]) -> Cow<'_, str> {
    let text = String::from_utf8_lossy(bytes);
    if matches!(text, Cow::Owned(_)) {
        tracing::debug!("replaced invalid UTF-8 sequences");
    }
    text
}
