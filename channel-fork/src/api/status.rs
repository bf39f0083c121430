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

//! Status-style failure reported by channel transports.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Coarse failure category carried by a [`ChannelError`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ChannelErrorCode {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    Unavailable,
    Closed,
    Internal,
}

impl Display for ChannelErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ChannelErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ChannelErrorCode::NotFound => "NOT_FOUND",
            ChannelErrorCode::AlreadyExists => "ALREADY_EXISTS",
            ChannelErrorCode::Unavailable => "UNAVAILABLE",
            ChannelErrorCode::Closed => "CLOSED",
            ChannelErrorCode::Internal => "INTERNAL",
        };
        f.write_str(label)
    }
}

/// Failure returned by [`ChannelNode`](crate::ChannelNode) and
/// [`Channel`](crate::Channel) operations.
///
/// ```
/// use channel_fork::{ChannelError, ChannelErrorCode};
///
/// let err = ChannelError::fail_with_code(ChannelErrorCode::Closed, "channel already closed");
/// assert_eq!(err.code(), ChannelErrorCode::Closed);
/// assert_eq!(err.to_string(), "CLOSED: channel already closed");
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChannelError {
    code: ChannelErrorCode,
    message: String,
}

impl ChannelError {
    pub fn fail_with_code(code: ChannelErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ChannelErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for ChannelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl Error for ChannelError {}
