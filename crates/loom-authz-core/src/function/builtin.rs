// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Built-in match functions.
//!
//! Every function takes the request-side value first and the policy-side
//! pattern second, e.g. `keyMatch2(r.obj, p.obj)`.

use std::collections::HashMap;
use std::net::IpAddr;

use ipnet::IpNet;

use super::cache;
use crate::error::FunctionError;

/// Glob-style match where `*` matches any run of characters, `/` included.
pub fn wildcard_match(value: &str, pattern: &str) -> bool {
	if pattern == "*" {
		return true;
	}

	let (mut p_idx, mut v_idx) = (0usize, 0usize);
	let (mut star_idx, mut match_idx) = (None, 0usize);
	let pattern_bytes = pattern.as_bytes();
	let value_bytes = value.as_bytes();

	while v_idx < value_bytes.len() {
		if p_idx < pattern_bytes.len() && pattern_bytes[p_idx] == b'*' {
			star_idx = Some(p_idx);
			match_idx = v_idx;
			p_idx += 1;
			continue;
		}

		if p_idx < pattern_bytes.len() && pattern_bytes[p_idx] == value_bytes[v_idx] {
			p_idx += 1;
			v_idx += 1;
			continue;
		}

		if let Some(star) = star_idx {
			p_idx = star + 1;
			match_idx += 1;
			v_idx = match_idx;
			continue;
		}

		return false;
	}

	while p_idx < pattern_bytes.len() && pattern_bytes[p_idx] == b'*' {
		p_idx += 1;
	}

	p_idx == pattern_bytes.len()
}

/// `/foo/bar` matches `/foo/*`; `*` spans path segments.
pub fn key_match(key: &str, pattern: &str) -> bool {
	wildcard_match(key, pattern)
}

/// `/resource/1` matches `/resource/:id`; `:name` is one segment, `*` spans
/// segments.
pub fn key_match2(key: &str, pattern: &str) -> Result<bool, FunctionError> {
	let regex = cache::compiled(&colon_pattern(pattern, false))?;
	Ok(regex.is_match(key))
}

/// `/resource/1` matches `/resource/{id}`; `{name}` is one segment.
pub fn key_match3(key: &str, pattern: &str) -> Result<bool, FunctionError> {
	let (source, _) = brace_pattern(pattern, false);
	let regex = cache::compiled(&source)?;
	Ok(regex.is_match(key))
}

/// Like [`key_match3`], but a placeholder repeated in the pattern must bind
/// the same value each time: `/p/{id}/c/{id}` matches `/p/1/c/1` only.
pub fn key_match4(key: &str, pattern: &str) -> Result<bool, FunctionError> {
	let (source, names) = brace_pattern(pattern, true);
	let regex = cache::compiled(&source)?;
	let Some(captures) = regex.captures(key) else {
		return Ok(false);
	};

	let mut bound: HashMap<&str, &str> = HashMap::new();
	for (index, name) in names.iter().enumerate() {
		let value = captures.get(index + 1).map_or("", |m| m.as_str());
		match bound.get(name.as_str()) {
			Some(previous) if *previous != value => return Ok(false),
			Some(_) => {}
			None => {
				bound.insert(name, value);
			}
		}
	}
	Ok(true)
}

/// Returns the part of `key` covered by the first `*` of `pattern`, or an
/// empty string when the prefix before it does not match.
pub fn key_get(key: &str, pattern: &str) -> String {
	let Some(star) = pattern.find('*') else {
		return String::new();
	};
	match (key.get(..star), pattern.get(..star)) {
		(Some(key_prefix), Some(pattern_prefix))
			if key.len() > star && key_prefix == pattern_prefix =>
		{
			key[star..].to_string()
		}
		_ => String::new(),
	}
}

/// Returns the value bound to `:variable` when `key` matches the
/// [`key_match2`] pattern, or an empty string.
pub fn key_get2(key: &str, pattern: &str, variable: &str) -> Result<String, FunctionError> {
	let names = colon_names(pattern);
	let regex = cache::compiled(&colon_pattern(pattern, true))?;
	let Some(captures) = regex.captures(key) else {
		return Ok(String::new());
	};
	Ok(names
		.iter()
		.position(|name| name == variable)
		.and_then(|index| captures.get(index + 1))
		.map(|m| m.as_str().to_string())
		.unwrap_or_default())
}

/// Unanchored regular-expression search of `pattern` in `key`.
pub fn regex_match(key: &str, pattern: &str) -> Result<bool, FunctionError> {
	let regex = cache::compiled(pattern)?;
	Ok(regex.is_match(key))
}

/// `ip` must be an address; `network` is an address or a CIDR block.
pub fn ip_match(ip: &str, network: &str) -> Result<bool, FunctionError> {
	let address: IpAddr = ip
		.trim()
		.parse()
		.map_err(|_| FunctionError::InvalidArgument(format!("`{ip}` is not an IP address")))?;

	let network = network.trim();
	if let Ok(net) = network.parse::<IpNet>() {
		return Ok(net.contains(&address));
	}
	match network.parse::<IpAddr>() {
		Ok(other) => Ok(address == other),
		Err(_) => Err(FunctionError::InvalidArgument(format!(
			"`{network}` is neither an IP address nor a CIDR block"
		))),
	}
}

/// Path glob: `*` and `?` stay within one segment, `**` crosses segments.
pub fn glob_match(key: &str, pattern: &str) -> Result<bool, FunctionError> {
	let mut source = String::from("^");
	let mut chars = pattern.chars().peekable();
	while let Some(c) = chars.next() {
		match c {
			'*' if chars.peek() == Some(&'*') => {
				chars.next();
				source.push_str(".*");
			}
			'*' => source.push_str("[^/]*"),
			'?' => source.push_str("[^/]"),
			other => push_literal(&mut source, other),
		}
	}
	source.push('$');
	let regex = cache::compiled(&source)?;
	Ok(regex.is_match(key))
}

fn push_literal(source: &mut String, c: char) {
	let mut buf = [0u8; 4];
	source.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}

/// Translates a `:name` pattern into an anchored regex.
fn colon_pattern(pattern: &str, capture: bool) -> String {
	let segment = if capture { "([^/]+)" } else { "[^/]+" };
	let mut source = String::from("^");
	let mut chars = pattern.chars().peekable();
	while let Some(c) = chars.next() {
		match c {
			'*' => source.push_str(".*"),
			':' if chars.peek().is_some_and(|n| *n != '/') => {
				while chars.peek().is_some_and(|n| *n != '/') {
					chars.next();
				}
				source.push_str(segment);
			}
			other => push_literal(&mut source, other),
		}
	}
	source.push('$');
	source
}

fn colon_names(pattern: &str) -> Vec<String> {
	let mut names = Vec::new();
	let mut chars = pattern.chars().peekable();
	while let Some(c) = chars.next() {
		if c == ':' && chars.peek().is_some_and(|n| *n != '/') {
			let mut name = String::new();
			while let Some(n) = chars.peek().copied().filter(|n| *n != '/') {
				name.push(n);
				chars.next();
			}
			names.push(name);
		}
	}
	names
}

/// Translates a `{name}` pattern into an anchored regex, returning the
/// placeholder names in order of appearance.
fn brace_pattern(pattern: &str, capture: bool) -> (String, Vec<String>) {
	let segment = if capture { "([^/]+)" } else { "[^/]+" };
	let mut source = String::from("^");
	let mut names = Vec::new();
	let mut rest = pattern;

	while let Some(c) = rest.chars().next() {
		if c == '{' {
			if let Some(end) = rest.find('}') {
				names.push(rest[1..end].to_string());
				source.push_str(segment);
				rest = &rest[end + 1..];
				continue;
			}
		}
		if c == '*' {
			source.push_str(".*");
		} else {
			push_literal(&mut source, c);
		}
		rest = &rest[c.len_utf8()..];
	}

	source.push('$');
	(source, names)
}
