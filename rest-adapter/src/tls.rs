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

//! Trust material shared by the broker session and the HTTP layer.

use crate::model::Model;
use std::fmt::{Debug, Formatter};
use std::fs;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("unable to read truststore {path}: {reason}")]
    Unreadable { path: String, reason: String },
    #[error("truststore {0} contains no PEM certificates")]
    NoCertificates(String),
    #[error("invalid certificate in truststore {path}: {reason}")]
    InvalidCertificate { path: String, reason: String },
}

/// Root certificates loaded from the configured truststore.
#[derive(Clone)]
pub struct TlsContext {
    truststore: String,
    certificates: Vec<reqwest::Certificate>,
}

impl TlsContext {
    /// Builds the context for a model. `Ok(None)` when no truststore is configured.
    pub fn from_model(model: &Model) -> Result<Option<Self>, TlsError> {
        match model.truststore.as_deref() {
            Some(path) => Self::from_pem_file(path).map(Some),
            None => Ok(None),
        }
    }

    pub fn from_pem_file(path: &str) -> Result<Self, TlsError> {
        let contents = fs::read(path).map_err(|err| TlsError::Unreadable {
            path: path.to_string(),
            reason: err.to_string(),
        })?;
        Self::from_pem(path, &contents)
    }

    /// Parses every certificate block of a PEM bundle. Other PEM sections are skipped.
    pub fn from_pem(truststore: &str, contents: &[u8]) -> Result<Self, TlsError> {
        let invalid = |reason: String| TlsError::InvalidCertificate {
            path: truststore.to_string(),
            reason,
        };

        let der_certificates =
            rustls_pemfile::certs(&mut &contents[..]).map_err(|err| invalid(err.to_string()))?;
        if der_certificates.is_empty() {
            return Err(TlsError::NoCertificates(truststore.to_string()));
        }

        let certificates = der_certificates
            .iter()
            .map(|der| reqwest::Certificate::from_der(der).map_err(|err| invalid(err.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            truststore: truststore.to_string(),
            certificates,
        })
    }

    pub fn truststore(&self) -> &str {
        &self.truststore
    }

    pub fn certificates(&self) -> &[reqwest::Certificate] {
        &self.certificates
    }
}

impl Debug for TlsContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsContext")
            .field("truststore", &self.truststore)
            .field("certificates", &self.certificates.len())
            .finish()
    }
}
