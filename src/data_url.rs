//! `data:` URL modules.
//!
//! The resolver's fast path: `data:<mime>[;base64],<payload>` is decoded
//! in place and classified onto a loader without touching the
//! filesystem. Imports of relative paths from inside a data URL module
//! have nothing to resolve against and fail with an unresolved-import
//! error.

use crate::{error::ResolveError, loader::Loader};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime: String,
    pub loader: Loader,
    pub contents: Vec<u8>,
}

impl DataUrl {
    /// # Errors
    ///
    /// * [ResolveError::InvalidDataUrl] when the URL has no comma, an
    ///   empty MIME, or undecodable base64 payload.
    pub fn parse(url: &str) -> Result<Self, ResolveError> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| ResolveError::InvalidDataUrl(url.to_string()))?;
        let comma =
            rest.find(',').ok_or_else(|| ResolveError::InvalidDataUrl(url.to_string()))?;
        let (head, payload) = (&rest[..comma], &rest[comma + 1..]);

        let mut parts = head.split(';');
        let mime = parts.next().unwrap_or("");
        let mime = if mime.is_empty() { "text/plain" } else { mime };
        let is_base64 = parts.any(|p| p == "base64");

        let contents = if is_base64 {
            decode_base64(payload)
                .ok_or_else(|| ResolveError::InvalidDataUrl(url.to_string()))?
        } else {
            decode_percent(payload)
        };

        let loader = match mime {
            "text/javascript" | "application/javascript" => Loader::Js,
            "text/css" => Loader::Css,
            "application/json" => Loader::Json,
            _ => Loader::Base64,
        };

        Ok(Self { mime: mime.to_string(), loader, contents })
    }
}

fn decode_percent(payload: &str) -> Vec<u8> {
    let bytes = payload.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hi = (bytes[i + 1] as char).to_digit(16);
            let lo = (bytes[i + 2] as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

fn decode_base64(payload: &str) -> Option<Vec<u8>> {
    fn value(c: u8) -> Option<u32> {
        match c {
            b'A'..=b'Z' => Some(u32::from(c - b'A')),
            b'a'..=b'z' => Some(u32::from(c - b'a') + 26),
            b'0'..=b'9' => Some(u32::from(c - b'0') + 52),
            b'+' => Some(62),
            b'/' => Some(63),
            _ => None,
        }
    }

    let trimmed = payload.trim_end_matches('=');
    let mut out = Vec::with_capacity(trimmed.len() * 3 / 4);
    let mut acc: u32 = 0;
    let mut bits = 0u32;
    for &byte in trimmed.as_bytes() {
        // Whitespace is tolerated, as in browsers.
        if byte.is_ascii_whitespace() {
            continue;
        }
        acc = (acc << 6) | value(byte)?;
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            out.push((acc >> bits) as u8);
        }
    }
    Some(out)
}
