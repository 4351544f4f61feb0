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
    fs,
    fs::{create_dir_all, File},
    io::Write,
    marker::PhantomData,
    path::{Path, PathBuf},
    str,
};

use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::CircViewResult;

pub const CONFIG_FILE: &str = "circview_config.toml";
pub const CONFIG_FILE_CONTENTS: &[u8] = include_bytes!("../circview_config.toml");

/// Candidate control ports and the host they live on. Passed around
/// explicitly; there is no global port list.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CircViewConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_ports")]
    pub ports: Vec<u16>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

// Messenger, browser bundle, system daemon; probed in that order.
fn default_ports() -> Vec<u16> {
    vec![9153, 9151, 9051]
}

impl Default for CircViewConfig {
    fn default() -> Self {
        Self { host: default_host(), ports: default_ports() }
    }
}

pub struct Config<T> {
    config: PhantomData<T>,
}

impl<T: Default + Serialize + DeserializeOwned> Config<T> {
    pub fn load(path: PathBuf) -> CircViewResult<T> {
        let toml = fs::read(&path)?;
        let str_buff = str::from_utf8(&toml)
            .map_err(|e| crate::error::CircViewError::TomlParse(e.to_string()))?;
        let config: T = toml::from_str(str_buff)?;
        Ok(config)
    }
}

/// Write the default config file if one does not exist yet.
pub fn spawn_config(path: &Path, contents: &[u8]) -> CircViewResult<()> {
    if path.exists() {
        return Ok(())
    }

    if let Some(outdir) = path.parent() {
        create_dir_all(outdir)?;
    }

    let mut file = File::create(path)?;
    file.write_all(contents)?;
    info!("Wrote default config file to {:?}", path);

    Ok(())
}
