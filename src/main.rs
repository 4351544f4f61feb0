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

use std::fs::File;

use async_std::sync::Arc;
use clap::Parser;
use easy_parallel::Parallel;
use log::{error, info, LevelFilter};
use simplelog::WriteLogger;
use smol::Executor;

use circview::{
    config::{spawn_config, CircViewConfig, Config, CONFIG_FILE, CONFIG_FILE_CONTENTS},
    error::CircViewResult,
    options::Args,
    rpc::ControlRpc,
    ui::TermTree,
    util::{expand_path, get_config_path},
    DataParser, Model, View,
};

#[async_std::main]
async fn main() -> CircViewResult<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let log_path = expand_path(&args.log_path)?;
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(&log_path)?;
    WriteLogger::init(level, simplelog::Config::default(), file)?;
    info!("Log level: {}", level);

    let config_path = get_config_path(args.config, CONFIG_FILE)?;
    spawn_config(&config_path, CONFIG_FILE_CONTENTS)?;
    let config = Config::<CircViewConfig>::load(config_path)?;

    // A port given on the command line replaces the candidate list.
    let ports = match args.port {
        Some(port) => vec![port],
        None => config.ports.clone(),
    };

    let rpc = Arc::new(ControlRpc::probe(&config.host, &ports).await?);

    let model = Model::new();
    let view = View::new(Box::new(TermTree::new()));
    let parser = DataParser::new(model, rpc.clone(), view);

    let (event_send, event_recv) = async_channel::unbounded();
    let (_stop_send, stop_recv) = async_channel::unbounded::<()>();

    let nthreads = std::thread::available_parallelism().map_or(4, |n| n.get());
    let ex = Arc::new(Executor::new());
    let ex2 = ex.clone();
    let (signal, shutdown) = async_channel::unbounded::<()>();

    let (_, result) = Parallel::new()
        .each(0..nthreads, |_| smol::future::block_on(ex.run(shutdown.recv())))
        .finish(|| {
            smol::future::block_on(async move {
                // Await the subscription ack before issuing the listing
                // requests: the client matches replies to one in-flight
                // request at a time. Only the notification drain runs
                // concurrently; losing it closes the queue, which ends
                // the worker with ConnectionLost.
                rpc.subscribe_events().await?;

                let sub_rpc = rpc.clone();
                ex2.spawn(async move {
                    if let Err(e) = sub_rpc.drain_notifications(event_send).await {
                        error!("Event subscription ended: {}", e);
                    }
                })
                .detach();

                parser.init_state().await?;
                let result = parser.run(event_recv, stop_recv).await;
                drop(signal);
                result
            })
        });

    result
}
