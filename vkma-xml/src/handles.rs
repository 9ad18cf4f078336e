//! Handle discovery: scans raw header text for handle-defining macro
//! invocations.
//!
//! ```c
//! VK_DEFINE_HANDLE(VmaAllocator)
//! VK_DEFINE_NON_DISPATCHABLE_HANDLE(VmaPool) // parent: VmaAllocator
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::diagnostics::{Diagnostics, Stage};
use crate::model::Handle;

static DISPATCHABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"VK_DEFINE_HANDLE\(([A-Za-z_0-9]+)\)").expect("dispatchable handle pattern")
});
static NON_DISPATCHABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"VK_DEFINE_NON_DISPATCHABLE_HANDLE\(([A-Za-z_0-9]+)\)")
        .expect("non-dispatchable handle pattern")
});

const PARENT_MARKER: &str = " // parent: ";

/// Scan every header in `files`. Unreadable files are reported and skipped.
/// When a name is found more than once, the first occurrence wins.
pub fn load_handle_list(files: &[PathBuf], diagnostics: &mut Diagnostics) -> BTreeMap<String, Handle> {
    let mut handles = BTreeMap::new();
    for file in files {
        match std::fs::read_to_string(file) {
            Ok(source) => {
                let before = handles.len();
                scan_source(&source, &mut handles);
                debug!(
                    file = %file.display(),
                    found = handles.len() - before,
                    "scanned header for handles"
                );
            }
            Err(e) => diagnostics.error(
                Stage::Handles,
                None,
                format!(
                    "ignoring {}: unable to read it ({e}); make sure it exists and is accessible",
                    file.display()
                ),
            ),
        }
    }
    info!(handles = handles.len(), "handle scan complete");
    handles
}

/// Collect handle macro invocations from one header's text.
pub fn scan_source(source: &str, out: &mut BTreeMap<String, Handle>) {
    append_handles(&DISPATCHABLE, source, true, out);
    append_handles(&NON_DISPATCHABLE, source, false, out);
}

fn append_handles(
    pattern: &Regex,
    source: &str,
    dispatchable: bool,
    out: &mut BTreeMap<String, Handle>,
) {
    for captures in pattern.captures_iter(source) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        // The macro's own `#define VK_DEFINE_HANDLE(object) ...` is not a use.
        let line_start = source[..whole.start()].rfind('\n').map_or(0, |i| i + 1);
        if source[line_start..whole.start()].trim_start().starts_with("#define") {
            continue;
        }
        let rest = &source[whole.end()..];
        let line = rest.split('\n').next().unwrap_or_default().trim_end_matches('\r');
        let parent = parse_parent(line);
        out.entry(name.as_str().to_string()).or_insert(Handle {
            dispatchable,
            parent,
        });
    }
}

/// Parent annotation from the remainder of a macro line; `none` means no parent.
fn parse_parent(line: &str) -> Option<String> {
    let pos = line.find(PARENT_MARKER)?;
    let parent = line[pos + PARENT_MARKER.len()..].trim();
    if parent.is_empty() || parent == "none" {
        None
    } else {
        Some(parent.to_string())
    }
}
