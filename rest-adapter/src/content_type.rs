/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Payload kinds and content-type resolution.
//!
//! An endpoint either declares what it produces or asks for `auto`, in which case the kind
//! is inferred from the `content-type` of the first response. Declared kinds are validated
//! against the observed header instead.

use crate::model::{EndpointConfig, PRODUCES_AUTO};
use crate::polling::endpoint_poller::{EndpointResponse, PollError};
use crate::publication::TopicValue;
use std::fmt::{Display, Formatter};
use thiserror::Error;

const JSON_IDENTIFIERS: &[&str] = &["json", "application/json", "text/json"];
const PLAIN_TEXT_IDENTIFIERS: &[&str] = &["string", "text/plain"];
const BINARY_IDENTIFIERS: &[&str] = &["binary", "application/octet-stream"];

/// Concrete payload kind of an endpoint.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EndpointType {
    Json,
    PlainText,
    Binary,
}

/// Kind of topic created on the broker for an endpoint.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TopicType {
    Json,
    Binary,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContentTypeError {
    #[error("unsupported endpoint type \"{0}\"")]
    UnsupportedProduces(String),
    #[error("the content type {content_type} of the response is not suitable for an endpoint producing {endpoint_type}")]
    Mismatch {
        content_type: String,
        endpoint_type: EndpointType,
    },
}

impl EndpointType {
    /// Looks up a configured `produces` value. `auto` is not a concrete type.
    pub fn from_identifier(identifier: &str) -> Result<Self, ContentTypeError> {
        let identifier = identifier.trim();
        if JSON_IDENTIFIERS.contains(&identifier) {
            Ok(EndpointType::Json)
        } else if PLAIN_TEXT_IDENTIFIERS.contains(&identifier) {
            Ok(EndpointType::PlainText)
        } else if BINARY_IDENTIFIERS.contains(&identifier) {
            Ok(EndpointType::Binary)
        } else {
            Err(ContentTypeError::UnsupportedProduces(identifier.to_string()))
        }
    }

    /// Canonical identifier, suitable for [`EndpointConfig::produces`].
    pub fn identifier(&self) -> &'static str {
        match self {
            EndpointType::Json => JSON_IDENTIFIERS[0],
            EndpointType::PlainText => PLAIN_TEXT_IDENTIFIERS[0],
            EndpointType::Binary => BINARY_IDENTIFIERS[0],
        }
    }

    pub fn topic_type(&self) -> TopicType {
        match self {
            EndpointType::Json => TopicType::Json,
            EndpointType::PlainText | EndpointType::Binary => TopicType::Binary,
        }
    }

    pub fn can_handle(&self, content_type: &str) -> bool {
        let content_type = content_type.trim().to_ascii_lowercase();
        match self {
            EndpointType::Json => {
                content_type.starts_with("application/json") || content_type.starts_with("text/json")
            }
            EndpointType::PlainText => {
                content_type.starts_with("text/plain") || EndpointType::Json.can_handle(&content_type)
            }
            EndpointType::Binary => true,
        }
    }

    /// Best guess for a response content type; binary when nothing more specific fits.
    pub fn infer_from_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(content_type) if EndpointType::Json.can_handle(content_type) => {
                EndpointType::Json
            }
            Some(content_type) if EndpointType::PlainText.can_handle(content_type) => {
                EndpointType::PlainText
            }
            _ => EndpointType::Binary,
        }
    }

    /// Converts a response body into the value published for this kind.
    pub fn parse(&self, response: &EndpointResponse) -> Result<TopicValue, PollError> {
        match self {
            EndpointType::Json => {
                let text = decode_text(response)?;
                serde_json::from_str(&text)
                    .map(TopicValue::Json)
                    .map_err(|err| PollError::Parse(err.to_string()))
            }
            EndpointType::PlainText => decode_text(response).map(TopicValue::Text),
            EndpointType::Binary => Ok(TopicValue::Binary(response.body().clone())),
        }
    }
}

impl Display for EndpointType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.identifier())
    }
}

/// Resolves the concrete type of an endpoint from its first response.
///
/// `auto` infers from the `content-type` header. An explicit type accepts a response with no
/// header and otherwise requires the header to be compatible.
pub fn resolve(
    endpoint: &EndpointConfig,
    response: &EndpointResponse,
) -> Result<EndpointType, ContentTypeError> {
    let content_type = response.content_type();

    if endpoint.produces == PRODUCES_AUTO {
        return Ok(EndpointType::infer_from_content_type(content_type));
    }

    let endpoint_type = EndpointType::from_identifier(&endpoint.produces)?;
    match content_type {
        None => Ok(endpoint_type),
        Some(content_type) if endpoint_type.can_handle(content_type) => Ok(endpoint_type),
        Some(content_type) => Err(ContentTypeError::Mismatch {
            content_type: content_type.to_string(),
            endpoint_type,
        }),
    }
}

fn charset(content_type: Option<&str>) -> Option<String> {
    content_type?
        .split(';')
        .skip(1)
        .filter_map(|parameter| parameter.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches('"').to_ascii_lowercase())
}

fn decode_text(response: &EndpointResponse) -> Result<String, PollError> {
    let body = response.body();
    match charset(response.content_type()).as_deref() {
        None | Some("utf-8") | Some("utf8") | Some("us-ascii") => String::from_utf8(body.to_vec())
            .map_err(|err| PollError::Parse(format!("response is not valid UTF-8: {err}"))),
        Some("iso-8859-1") | Some("latin1") | Some("latin-1") => {
            Ok(body.iter().map(|byte| char::from(*byte)).collect())
        }
        Some(other) => Err(PollError::Parse(format!("unsupported charset {other}"))),
    }
}
