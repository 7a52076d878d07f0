/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use super::host::looks_like_ipv4;
use crate::value::Value;
use http::uri::Authority;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::collections::BTreeMap;
use std::net::Ipv6Addr;
use std::str::FromStr;

/// Characters encoded inside a path, where `/` keeps its meaning.
const PATH_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    // Sub-delims are legal in a path but services expect them encoded.
    .add(b':')
    .add(b',')
    .add(b'?')
    .add(b'#')
    .add(b'[')
    .add(b']')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'@')
    .add(b'!')
    .add(b'$')
    .add(b'&')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'*')
    .add(b'+')
    .add(b';')
    .add(b'=')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'"')
    .add(b'^')
    .add(b'`')
    .add(b'\\');

/// Characters encoded by `uriEncode`: everything but unreserved characters.
const URI_ENCODE_SET: &AsciiSet = &PATH_SET.add(b'/');

pub(crate) fn uri_encode(value: &str) -> String {
    utf8_percent_encode(value, URI_ENCODE_SET).to_string()
}

/// Splits an `http` or `https` URL into `scheme`, `authority`, `path`, `normalizedPath`,
/// and `isIp`.
///
/// Returns `None` for other schemes, URLs with a query string, and unparsable authorities.
pub(crate) fn parse_url(value: &str) -> Option<Value> {
    let (scheme, rest) = value.split_once("://")?;
    if scheme != "http" && scheme != "https" {
        return None;
    }
    let rest = rest.split('#').next().unwrap_or_default();
    if rest.contains('?') {
        return None;
    }
    let (authority, path) = match rest.find('/') {
        Some(index) => rest.split_at(index),
        None => (rest, ""),
    };
    let host = host_of(authority)?;
    let is_ip = looks_like_ipv4(host) || is_ipv6_literal(host);

    let mut url = BTreeMap::new();
    url.insert("scheme".to_string(), Value::from(scheme));
    url.insert("authority".to_string(), Value::from(authority));
    url.insert("path".to_string(), Value::from(path));
    url.insert("normalizedPath".to_string(), Value::from(normalize_path(path)));
    url.insert("isIp".to_string(), Value::Bool(is_ip));
    Some(Value::Object(url))
}

/// Validates `authority` and returns its host, including brackets around IPv6 literals.
fn host_of(authority: &str) -> Option<&str> {
    Authority::from_str(authority).ok()?;
    let host_and_port = authority.rsplit('@').next().unwrap_or(authority);
    let (host, port) = if host_and_port.starts_with('[') {
        let end = host_and_port.find(']')?;
        let (host, port) = host_and_port.split_at(end + 1);
        (host, port.strip_prefix(':'))
    } else {
        match host_and_port.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (host_and_port, None),
        }
    };
    match port {
        Some(port) if !port.is_empty() => {
            port.parse::<u16>().ok()?;
        }
        _ => {}
    }
    Some(host)
}

fn is_ipv6_literal(host: &str) -> bool {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .map(|h| h.split('%').next().unwrap_or_default())
        .is_some_and(|h| Ipv6Addr::from_str(h).is_ok())
}

/// Removes dot segments, percent-encodes, and guarantees a trailing `/`.
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    let mut normalized = String::new();
    if path.starts_with('/') {
        normalized.push('/');
    }
    normalized.push_str(&segments.join("/"));
    if path.ends_with('/') && !segments.is_empty() {
        normalized.push('/');
    }
    let mut normalized = utf8_percent_encode(&normalized, PATH_SET).to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}
