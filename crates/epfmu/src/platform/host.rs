// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Host name published in the discovery document.

/// Fallback when the system refuses to name itself.
const FALLBACK_HOST: &str = "localhost";

/// Host name of this machine, or `localhost`.
pub fn host_name() -> String {
    system_host_name().unwrap_or_else(|| FALLBACK_HOST.to_string())
}

/// Get system hostname (Unix/Linux).
#[cfg(unix)]
fn system_host_name() -> Option<String> {
    let mut buf = [0u8; 256];
    // SAFETY:
    // - buf is a valid mutable buffer with known size (256 bytes)
    // - gethostname writes at most buf.len() bytes including NUL terminator
    let ret = unsafe { libc::gethostname(buf.as_mut_ptr().cast::<libc::c_char>(), buf.len()) };
    if ret != 0 {
        return None;
    }

    // Truncated names are not guaranteed to be NUL terminated.
    let end = buf.iter().position(|&b| b == 0)?;
    let hostname = String::from_utf8_lossy(&buf[..end]).into_owned();
    if hostname.is_empty() {
        None
    } else {
        Some(hostname)
    }
}

/// Get system hostname (Windows).
#[cfg(windows)]
fn system_host_name() -> Option<String> {
    std::env::var("COMPUTERNAME").ok().filter(|h| !h.is_empty())
}

#[cfg(not(any(unix, windows)))]
fn system_host_name() -> Option<String> {
    None
}
