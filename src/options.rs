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

#[derive(clap::Parser)]
#[clap(name = "circview", about = "Anonymity network circuit and stream monitor", version)]
pub struct Args {
    /// Increase verbosity (-vvv supported)
    #[clap(short, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Logfile path
    #[clap(long, default_value = "~/.local/circview/circview.log")]
    pub log_path: String,

    /// Control port to connect to (skips probing the config candidates)
    #[clap(short, long)]
    pub port: Option<u16>,

    /// Sets a custom config file
    #[clap(short, long)]
    pub config: Option<String>,
}
