//! `CF_HDROP` payload layout.
//!
//! A file-drop clipboard payload is a `DROPFILES` header followed by a list of
//! NUL-terminated UTF-16LE paths, with one extra NUL closing the list:
//!
//! ```text
//! offset  size  field
//!      0     4  pFiles  offset of the path list (always 20)
//!      4     8  pt      drop point, unused (0, 0)
//!     12     4  fNC     non-client flag, 0
//!     16     4  fWide   1 = paths are UTF-16
//!     20     …  path\0path\0\0
//! ```
//!
//! Building the bytes is kept separate from the Win32 calls so it can be checked
//! on every platform.

use std::path::Path;

pub const DROPFILES_HEADER_LEN: usize = 20;

pub fn build_file_drop_payload<P: AsRef<Path>>(paths: &[P]) -> Vec<u8> {
    let units: Vec<Vec<u16>> = paths.iter().map(|p| wide(p.as_ref())).collect();
    let list_units: usize = units.iter().map(|u| u.len() + 1).sum::<usize>() + 1;
    let mut out = Vec::with_capacity(DROPFILES_HEADER_LEN + list_units * 2);

    out.extend_from_slice(&(DROPFILES_HEADER_LEN as u32).to_le_bytes());
    out.extend_from_slice(&0i32.to_le_bytes());
    out.extend_from_slice(&0i32.to_le_bytes());
    out.extend_from_slice(&0i32.to_le_bytes());
    out.extend_from_slice(&1i32.to_le_bytes());

    for path in &units {
        for unit in path {
            out.extend_from_slice(&unit.to_le_bytes());
        }
        out.extend_from_slice(&0u16.to_le_bytes());
    }
    out.extend_from_slice(&0u16.to_le_bytes());
    out
}

#[cfg(windows)]
fn wide(path: &Path) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;
    path.as_os_str().encode_wide().collect()
}

#[cfg(not(windows))]
fn wide(path: &Path) -> Vec<u16> {
    path.to_string_lossy().encode_utf16().collect()
}
