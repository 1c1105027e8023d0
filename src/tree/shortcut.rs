//! Windows shell link (`.lnk`) detection and target resolution.

use std::io;
use std::path::{Path, PathBuf};

use crate::utils::config::SHORTCUT_EXTENSION;

/// Turns a shortcut file into the path it points at.
pub trait ShortcutResolver: Send + Sync {
    fn resolve(&self, shortcut: &Path) -> io::Result<PathBuf>;
}

/// True if `path` names a Windows shortcut (extension match, case-insensitive).
pub fn is_shortcut(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_ascii_lowercase().ends_with(SHORTCUT_EXTENSION))
        .unwrap_or(false)
}

/// Reads the LinkInfo block of a shell link: local base path + common path suffix, or
/// network share name + suffix. Every offset is bounds-checked; malformed input is `InvalidData`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LnkResolver;

const HEADER_SIZE: usize = 0x4C;
const LINK_FLAGS_OFFSET: usize = 0x14;
const HAS_LINK_TARGET_ID_LIST: u32 = 0x01;
const HAS_LINK_INFO: u32 = 0x02;
const VOLUME_ID_AND_LOCAL_BASE_PATH: u32 = 0x01;
const COMMON_NETWORK_RELATIVE_LINK: u32 = 0x02;

impl ShortcutResolver for LnkResolver {
    fn resolve(&self, shortcut: &Path) -> io::Result<PathBuf> {
        let bytes = std::fs::read(shortcut)?;
        parse_lnk_target(&bytes).map(PathBuf::from)
    }
}

/// Extract the target path string from raw `.lnk` bytes.
pub fn parse_lnk_target(link: &[u8]) -> io::Result<String> {
    if read_u32(link, 0)? as usize != HEADER_SIZE {
        return Err(invalid("not a shell link header"));
    }
    let flags = read_u32(link, LINK_FLAGS_OFFSET)?;

    let mut offset = HEADER_SIZE;
    if flags & HAS_LINK_TARGET_ID_LIST != 0 {
        // The size field does not count itself.
        offset += 2 + read_u16(link, offset)? as usize;
    }
    if flags & HAS_LINK_INFO == 0 {
        return Err(invalid("shell link has no LinkInfo block"));
    }

    let info = offset;
    let info_flags = read_u32(link, info + 0x08)?;
    let suffix = read_cstr(link, info + read_u32(link, info + 0x18)? as usize)?;

    if info_flags & VOLUME_ID_AND_LOCAL_BASE_PATH != 0 {
        let base = read_cstr(link, info + read_u32(link, info + 0x10)? as usize)?;
        Ok(base + &suffix)
    } else if info_flags & COMMON_NETWORK_RELATIVE_LINK != 0 {
        let network = info + read_u32(link, info + 0x14)? as usize;
        let share = read_cstr(link, network + read_u32(link, network + 0x08)? as usize)?;
        if suffix.is_empty() {
            Ok(share)
        } else {
            Ok(format!("{share}\\{suffix}"))
        }
    } else {
        Err(invalid("shell link has neither a local nor a network target"))
    }
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

fn slice(bytes: &[u8], off: usize, len: usize) -> io::Result<&[u8]> {
    off.checked_add(len)
        .and_then(|end| bytes.get(off..end))
        .ok_or_else(|| invalid("shell link truncated"))
}

fn read_u16(bytes: &[u8], off: usize) -> io::Result<u16> {
    let b = slice(bytes, off, 2)?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

fn read_u32(bytes: &[u8], off: usize) -> io::Result<u32> {
    let b = slice(bytes, off, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// NUL-terminated string in the system code page; decoded lossily.
fn read_cstr(bytes: &[u8], off: usize) -> io::Result<String> {
    let rest = bytes
        .get(off..)
        .ok_or_else(|| invalid("shell link string offset out of range"))?;
    let len = rest
        .iter()
        .position(|b| *b == 0)
        .ok_or_else(|| invalid("unterminated string in shell link"))?;
    Ok(String::from_utf8_lossy(&rest[..len]).into_owned())
}
