// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Column encoding for timestamps.
//!
//! Times are stored as RFC3339 UTC text with a fixed nine-digit fraction and a
//! `Z` suffix. Fixed width keeps lexical order equal to chronological order,
//! which the root-key window query relies on.
//!
//! That only holds for four-digit years. Outside `0000..=9999` the encoding
//! gains a sign (`+10000-…`, `-0001-…`), so stored values are restricted to
//! that range and query bounds past its end are clamped.

use chrono::{DateTime, Datelike, SecondsFormat, Utc};

use crate::error::{DbError, Result};

/// The last instant a column can hold.
const LATEST_STORABLE: &str = "9999-12-31T23:59:59.999999999Z";

fn format(time: &DateTime<Utc>) -> String {
	time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Whether `time` lies after every storable instant.
pub(crate) fn is_past_storable(time: &DateTime<Utc>) -> bool {
	time.year() > 9999
}

/// Encode a value for storage.
///
/// Returns `Err(DbError::BadRequest)` for times outside years `0000..=9999`.
pub(crate) fn encode(column: &str, time: &DateTime<Utc>) -> Result<String> {
	if !(0..=9999).contains(&time.year()) {
		return Err(DbError::BadRequest(format!(
			"{column} out of storable range: {time}"
		)));
	}
	Ok(format(time))
}

/// Encode a comparison bound.
///
/// Bounds past the storable range clamp to [`LATEST_STORABLE`]. Bounds before
/// it keep their leading `-`, which already sorts below every stored value.
pub(crate) fn encode_bound(time: &DateTime<Utc>) -> String {
	if is_past_storable(time) {
		LATEST_STORABLE.to_string()
	} else {
		format(time)
	}
}

pub(crate) fn decode(column: &str, value: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("Invalid {column}: {e}")))
}
