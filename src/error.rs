/* This file is part of DarkFi (https://dark.fi)
 *
 * Copyright (C) 2020-2023 Dyne.org foundation
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

#[derive(Debug, thiserror::Error)]
pub enum CircViewError {
    #[error("RPC peer returned an error: {0}")]
    RpcError(String),
    #[error("Unexpected RPC reply")]
    UnexpectedReply,
    #[error("Control connection lost")]
    ConnectionLost,
    #[error("Unable to contact control port on any candidate port")]
    NoControlPort,
    #[error("Display node `{0}` has no parent node in the tree")]
    UnknownParentNode(String),
    #[error("Stream `{0}` is not attached to any circuit")]
    StreamNotAttached(String),
    #[error("Json serialization error: `{0}`")]
    SerdeJsonError(String),
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("SetLogger (log crate) failed: {0}")]
    SetLoggerError(String),
    #[error("URL parse error: {0}")]
    UrlParse(String),
    #[error("TOML parse error: {0}")]
    TomlParse(String),
    #[error("Async channel error: {0}")]
    ChannelError(String),
}

pub type CircViewResult<T> = std::result::Result<T, CircViewError>;

impl From<serde_json::Error> for CircViewError {
    fn from(err: serde_json::Error) -> CircViewError {
        CircViewError::SerdeJsonError(err.to_string())
    }
}

impl From<std::io::Error> for CircViewError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.kind())
    }
}

impl From<log::SetLoggerError> for CircViewError {
    fn from(err: log::SetLoggerError) -> Self {
        Self::SetLoggerError(err.to_string())
    }
}

impl From<url::ParseError> for CircViewError {
    fn from(err: url::ParseError) -> Self {
        Self::UrlParse(err.to_string())
    }
}

impl From<toml::de::Error> for CircViewError {
    fn from(err: toml::de::Error) -> Self {
        Self::TomlParse(err.to_string())
    }
}

impl<T> From<async_channel::SendError<T>> for CircViewError {
    fn from(err: async_channel::SendError<T>) -> Self {
        Self::ChannelError(err.to_string())
    }
}

impl From<async_channel::RecvError> for CircViewError {
    fn from(err: async_channel::RecvError) -> Self {
        Self::ChannelError(err.to_string())
    }
}
