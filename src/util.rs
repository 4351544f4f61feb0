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

use std::{
    env,
    path::{Path, PathBuf},
};

use chrono::Utc;

use crate::error::{CircViewError, CircViewResult};

/// Timestamp string for entities first observed without a peer-supplied
/// creation time.
pub fn now_timestamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Numeric sort key for protocol-assigned ids. Non-numeric ids sort last.
pub fn numeric_id(id: &str) -> u64 {
    id.parse().unwrap_or(u64::MAX)
}

/// Returns the path to the user's home directory, from `$HOME`.
pub fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME").and_then(|h| if h.is_empty() { None } else { Some(h) }).map(PathBuf::from)
}

/// Returns `$XDG_CONFIG_HOME`, `$HOME/.config`, or `None`.
pub fn config_dir() -> Option<PathBuf> {
    env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .filter(|p| p.is_absolute())
        .or_else(|| home_dir().map(|h| h.join(".config")))
}

pub fn expand_path(path: &str) -> CircViewResult<PathBuf> {
    let ret: PathBuf;

    if let Some(remains) = path.strip_prefix("~/") {
        match home_dir() {
            Some(homedir) => ret = homedir.join(remains),
            None => return Err(CircViewError::Io(std::io::ErrorKind::NotFound)),
        }
    } else if path == "~" {
        match home_dir() {
            Some(homedir) => ret = homedir,
            None => return Err(CircViewError::Io(std::io::ErrorKind::NotFound)),
        }
    } else {
        ret = PathBuf::from(path);
    }

    Ok(ret)
}

/// Join a path with `config_dir()/circview`.
pub fn join_config_path(file: &Path) -> CircViewResult<PathBuf> {
    let mut path = PathBuf::new();

    if let Some(v) = config_dir() {
        path.push(v);
    }

    path.push("circview");
    path.push(file);

    Ok(path)
}

pub fn get_config_path(arg: Option<String>, fallback: &str) -> CircViewResult<PathBuf> {
    if let Some(a) = arg {
        expand_path(&a)
    } else {
        join_config_path(&PathBuf::from(fallback))
    }
}
