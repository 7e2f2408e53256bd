// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `socket.cfg` discovery document.
//!
//! The simulation reads this file from its working directory to find the
//! adapter's listening socket. The byte layout is fixed by the client.

use std::fs;
use std::io;
use std::path::Path;

/// Where the simulation should connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub port: u16,
    pub hostname: String,
}

impl Endpoint {
    /// Render the discovery document.
    pub fn to_document(&self) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n\
             <BCVTB-client>\n  \
             <ipc>\n    \
             <socket port=\"{}\" hostname=\"{}\"/>\n  \
             </ipc>\n\
             </BCVTB-client>\n",
            self.port,
            escape_attribute(&self.hostname)
        )
    }

    /// Parse a discovery document.
    pub fn from_document(text: &str) -> Result<Self, String> {
        let doc = roxmltree::Document::parse(text)
            .map_err(|e| format!("invalid discovery document: {}", e))?;
        let socket = doc
            .descendants()
            .find(|n| n.tag_name().name() == "socket")
            .ok_or_else(|| "missing <socket> element".to_string())?;
        let port = socket
            .attribute("port")
            .ok_or_else(|| "missing port attribute".to_string())?
            .parse::<u16>()
            .map_err(|e| format!("invalid port: {}", e))?;
        let hostname = socket
            .attribute("hostname")
            .ok_or_else(|| "missing hostname attribute".to_string())?
            .to_string();
        Ok(Self { port, hostname })
    }
}

/// Write the discovery document to `path`.
pub fn write_discovery_file(path: &Path, endpoint: &Endpoint) -> io::Result<()> {
    fs::write(path, endpoint.to_document())
}

/// Read a discovery document from `path`.
pub fn read_discovery_file(path: &Path) -> io::Result<Endpoint> {
    let text = fs::read_to_string(path)?;
    Endpoint::from_document(&text).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_layout() {
        let endpoint = Endpoint {
            port: 40123,
            hostname: "buildhost".into(),
        };
        assert_eq!(
            endpoint.to_document(),
            "<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<BCVTB-client>\n  <ipc>\n    \
             <socket port=\"40123\" hostname=\"buildhost\"/>\n  </ipc>\n</BCVTB-client>\n"
        );
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("socket.cfg");
        let endpoint = Endpoint {
            port: 5,
            hostname: "a&b".into(),
        };
        write_discovery_file(&path, &endpoint).unwrap();
        assert_eq!(read_discovery_file(&path).unwrap(), endpoint);
    }

    #[test]
    fn test_rejects_missing_port() {
        let err = Endpoint::from_document("<BCVTB-client><ipc><socket hostname=\"h\"/></ipc></BCVTB-client>")
            .unwrap_err();
        assert!(err.contains("port"));
    }
}
