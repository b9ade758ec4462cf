//! Negotiation payload inspection.
//!
//! The coordinator does not interpret media semantics. It only checks that an
//! offer is a well-formed session description and enumerates the media stream
//! identifiers it declares, so they can be registered with the directory.
//!
//! Stream identifiers come from `a=msid:<stream> [<track>]` and from the
//! legacy `a=ssrc:<ssrc> msid:<stream> [<track>]` form. The RFC 8830 "no
//! stream" identifier `-` is skipped.

use crate::errors::ScError;
use common::types::StreamId;

/// The parts of a session description the coordinator cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    media_sections: usize,
    streams: Vec<StreamId>,
}

impl SessionDescription {
    /// Parse a session description.
    ///
    /// # Errors
    ///
    /// Returns `ScError::Parse` if the text is empty, does not start with a
    /// `v=` line, contains a line that is not `<letter>=<value>`, or declares
    /// no media section.
    pub fn parse(sdp: &str) -> Result<Self, ScError> {
        let mut lines = sdp
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .peekable();

        match lines.peek() {
            None => return Err(ScError::Parse("empty session description".to_string())),
            Some((_, first)) if !first.starts_with("v=") => {
                return Err(ScError::Parse("v= must be the first line".to_string()));
            }
            Some(_) => {}
        }

        let mut media_sections = 0;
        let mut streams: Vec<StreamId> = Vec::new();

        for (index, line) in lines {
            let (kind, value) = split_line(line).ok_or_else(|| {
                ScError::Parse(format!("line {} is not <type>=<value>", index + 1))
            })?;

            match kind {
                'm' => media_sections += 1,
                'a' => {
                    if let Some(stream) = stream_of_attribute(value) {
                        let stream = StreamId::from(stream);
                        if !streams.contains(&stream) {
                            streams.push(stream);
                        }
                    }
                }
                _ => {}
            }
        }

        if media_sections == 0 {
            return Err(ScError::Parse("no m= section".to_string()));
        }

        Ok(Self {
            media_sections,
            streams,
        })
    }

    /// Declared stream identifiers, de-duplicated, in first-seen order.
    #[must_use]
    pub fn streams(&self) -> &[StreamId] {
        &self.streams
    }

    #[must_use]
    pub fn into_streams(self) -> Vec<StreamId> {
        self.streams
    }

    #[must_use]
    pub fn media_sections(&self) -> usize {
        self.media_sections
    }
}

fn split_line(line: &str) -> Option<(char, &str)> {
    let mut chars = line.chars();
    let kind = chars.next().filter(char::is_ascii_alphabetic)?;
    let rest = chars.as_str();
    let value = rest.strip_prefix('=')?;
    Some((kind, value))
}

fn stream_of_attribute(value: &str) -> Option<&str> {
    let msid = if let Some(rest) = value.strip_prefix("msid:") {
        rest
    } else if let Some(rest) = value.strip_prefix("ssrc:") {
        let (_ssrc, attribute) = rest.split_once(' ')?;
        attribute.trim_start().strip_prefix("msid:")?
    } else {
        return None;
    };

    msid.split_whitespace().next().filter(|s| *s != "-")
}
