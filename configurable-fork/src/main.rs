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

mod config;

use crate::config::Config;
use attributes_static_file::AttributesStaticFile;
use channel_fork::{
    join_identity, AttributeValue, Attributes, BytesMessage, Channel, ChannelError,
    ChannelErrorCode, ChannelNode, EngineState, ForkModule, Persistence, StopReason, INCOMING_CHANNEL,
    MESSAGE_FILTER, PAYLOAD_ENVELOPE,
};
use clap::Parser;
use memory_channel_node::MemoryNode;
use std::fs::File;
use std::io::Read;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command()]
struct ForkArgs {
    #[arg(short, long, value_name = "FILE")]
    config: String,
}

async fn set_text(
    attributes: &AttributesStaticFile,
    name: &str,
    value: &str,
) -> Result<(), ChannelError> {
    if !attributes.has(name).await {
        attributes.add(name).await.map_err(|e| {
            ChannelError::fail_with_code(ChannelErrorCode::Internal, e.to_string())
        })?;
    }
    attributes
        .set(name, AttributeValue::Text(value.to_string()))
        .await
        .map_err(|e| ChannelError::fail_with_code(ChannelErrorCode::InvalidArgument, e.to_string()))
}

#[tokio::main]
async fn main() -> Result<(), ChannelError> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    info!("Started configurable-fork");

    // Get the config file.
    let args = ForkArgs::parse();
    let mut file = File::open(args.config).map_err(|e| {
        ChannelError::fail_with_code(ChannelErrorCode::NotFound, format!("File not found: {e:?}"))
    })?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).map_err(|e| {
        ChannelError::fail_with_code(
            ChannelErrorCode::Internal,
            format!("Unable to read config file: {e:?}"),
        )
    })?;

    let config: Config = json5::from_str(&contents).map_err(|e| {
        ChannelError::fail_with_code(
            ChannelErrorCode::InvalidArgument,
            format!("Unable to parse config file: {e:?}"),
        )
    })?;

    let attributes = match config.attributes_config {
        Some(attributes_config) => AttributesStaticFile::new(attributes_config.file_path),
        None => Ok(AttributesStaticFile::default()),
    }
    .map_err(|e| ChannelError::fail_with_code(ChannelErrorCode::InvalidArgument, e.to_string()))?;

    // Values in the main config win over the attributes file.
    let fork_config = config.fork_config;
    set_text(&attributes, INCOMING_CHANNEL, &fork_config.incoming_channel).await?;
    if let Some(filter) = fork_config.message_filter.as_deref() {
        set_text(&attributes, MESSAGE_FILTER, filter).await?;
    }
    if let Some(envelope) = fork_config.payload_envelope.as_deref() {
        set_text(&attributes, PAYLOAD_ENVELOPE, envelope).await?;
    }
    let attributes = Arc::new(attributes);

    let node = Arc::new(MemoryNode::new(&config.node_identity));
    let module = Arc::new(ForkModule::new("configurable-fork"));
    let run = tokio::spawn({
        let module = module.clone();
        let node = node.clone();
        let attributes = attributes.clone();
        async move { module.run(node, attributes).await }
    });

    while module.state().await == EngineState::Starting && !run.is_finished() {
        tokio::task::yield_now().await;
    }
    if module.state().await != EngineState::Running {
        let outcome = run
            .await
            .map_err(|e| ChannelError::fail_with_code(ChannelErrorCode::Internal, e.to_string()))?;
        return match outcome {
            Ok(state) => {
                warn!("Fork module ended during startup in state {state}");
                Ok(())
            }
            Err(e) => Err(ChannelError::fail_with_code(
                ChannelErrorCode::InvalidArgument,
                e.to_string(),
            )),
        };
    }

    // Each stdin line is published on the inbound channel as one message.
    let inbound_identity = join_identity(&config.node_identity, &fork_config.incoming_channel);
    let inbound = node
        .open_channel(&inbound_identity, Persistence::Persistent)
        .await?;
    info!("Reading messages for {inbound_identity} from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let reason = loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => {
                    if let Err(e) = inbound.publish(BytesMessage::from(line.as_str())).await {
                        warn!("Unable to publish input line: {e}");
                    }
                }
                Ok(None) => break StopReason::EndOfInput,
                Err(e) => {
                    warn!("Unable to read stdin: {e:?}");
                    break StopReason::EndOfInput;
                }
            },
            _ = tokio::signal::ctrl_c() => break StopReason::UserDirected,
        }
    };

    module.stop(reason).await;
    let state = run
        .await
        .map_err(|e| ChannelError::fail_with_code(ChannelErrorCode::Internal, e.to_string()))?
        .map_err(|e| ChannelError::fail_with_code(ChannelErrorCode::Internal, e.to_string()))?;

    for destination in module.known_destinations().await {
        info!("Forked channel: {destination}");
    }
    if state != EngineState::Stopped {
        warn!("Fork module ended in state {state}");
    }
    Ok(())
}
