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

use crate::api::attributes::Attributes;
use crate::api::channel::{Channel, ChannelNode, Persistence};
use crate::api::module_state::{EngineState, StopReason};
use crate::control_plane::engine_state::ModuleState;
use crate::control_plane::module_config::{ModuleConfig, StartupError};
use crate::control_plane::teardown::{self, TeardownReport};
use crate::data_plane::fork_listener::ForkListener;
use crate::observability::events;
use crate::routing::fork_router::ForkRouter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

const COMPONENT: &str = "fork_module";

/// Content-based fan-out module.
///
/// A module is run once. [`ForkModule::run`] blocks until [`ForkModule::stop`]
/// is called (from another task), then closes every channel it opened.
pub struct ForkModule {
    name: String,
    module_id: String,
    state: ModuleState,
    started: AtomicBool,
    stop_signal: watch::Sender<bool>,
    router: Mutex<Option<Arc<ForkRouter>>>,
    teardown_report: Mutex<Option<TeardownReport>>,
}

impl ForkModule {
    pub fn new(name: &str) -> Self {
        let module_id = format!("{name}:{}", uuid::Uuid::new_v4());
        let (stop_signal, _) = watch::channel(false);
        Self {
            name: name.to_string(),
            state: ModuleState::new(&module_id),
            module_id,
            started: AtomicBool::new(false),
            stop_signal,
            router: Mutex::new(None),
            teardown_report: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unique per instance; attached to every log event as `module_id`.
    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    /// Starts the module and waits for a stop request.
    ///
    /// Returns the terminal state after a stop. Startup failures move the
    /// module to ERROR, release anything already opened, and are returned as
    /// errors.
    pub async fn run(
        &self,
        node: Arc<dyn ChannelNode>,
        attributes: Arc<dyn Attributes>,
    ) -> Result<EngineState, StartupError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(StartupError::AlreadyStarted);
        }
        let mut stop_requested = self.stop_signal.subscribe();

        info!(
            event = events::MODULE_START,
            component = COMPONENT,
            module_id = self.module_id.as_str(),
            node = node.default_identity(),
            "starting fork module"
        );
        self.state.bind(attributes.clone()).await;

        let config = match ModuleConfig::load(node.default_identity(), attributes.as_ref()).await
        {
            Ok(config) => config,
            Err(err) => {
                error!(
                    event = events::MODULE_CONFIG_FAILED,
                    component = COMPONENT,
                    module_id = self.module_id.as_str(),
                    err = %err,
                    "invalid module configuration"
                );
                return self.abort(err, None, None).await;
            }
        };

        let inbound_identity = config.inbound_identity;
        let router = Arc::new(ForkRouter::new(
            &self.module_id,
            &inbound_identity,
            config.extractor,
            node.clone(),
            attributes,
        ));
        *self.router.lock().await = Some(router.clone());

        if *stop_requested.borrow() {
            info!(
                event = events::MODULE_START_SKIPPED,
                component = COMPONENT,
                module_id = self.module_id.as_str(),
                inbound = inbound_identity.as_str(),
                "stop requested during startup, not opening inbound channel"
            );
            self.teardown(Some(&router), None).await;
            return Ok(self.state.current().await);
        }

        let inbound = match node
            .open_channel(&inbound_identity, Persistence::Persistent)
            .await
        {
            Ok(inbound) => {
                info!(
                    event = events::MODULE_INBOUND_OPEN_OK,
                    component = COMPONENT,
                    module_id = self.module_id.as_str(),
                    inbound = inbound_identity.as_str(),
                    "opened inbound channel"
                );
                inbound
            }
            Err(err) => {
                error!(
                    event = events::MODULE_INBOUND_OPEN_FAILED,
                    component = COMPONENT,
                    module_id = self.module_id.as_str(),
                    inbound = inbound_identity.as_str(),
                    err = %err,
                    "unable to open inbound channel"
                );
                return self
                    .abort(StartupError::InboundOpenFailed(err), Some(&router), None)
                    .await;
            }
        };

        let listener = Arc::new(ForkListener::new(router.clone()));
        if let Err(err) = inbound.subscribe(listener).await {
            error!(
                event = events::MODULE_SUBSCRIBE_FAILED,
                component = COMPONENT,
                module_id = self.module_id.as_str(),
                inbound = inbound_identity.as_str(),
                err = %err,
                "unable to subscribe to inbound channel"
            );
            return self
                .abort(
                    StartupError::SubscribeFailed(err),
                    Some(&router),
                    Some((inbound_identity, inbound)),
                )
                .await;
        }
        info!(
            event = events::MODULE_SUBSCRIBE_OK,
            component = COMPONENT,
            module_id = self.module_id.as_str(),
            inbound = inbound_identity.as_str(),
            "subscribed to inbound channel"
        );

        // a stop during startup already moved the state to STOPPED
        if self.state.transition_to(EngineState::Running).await {
            // the sender lives in `self`, so this only returns once stopped
            let _ = stop_requested.wait_for(|stopped| *stopped).await;
        }

        self.teardown(Some(&router), Some((inbound_identity, inbound)))
            .await;
        Ok(self.state.current().await)
    }

    /// Requests a stop. Safe to call before, during or after [`ForkModule::run`].
    pub async fn stop(&self, reason: StopReason) {
        info!(
            event = events::MODULE_STOP_REQUESTED,
            component = COMPONENT,
            module_id = self.module_id.as_str(),
            reason = %reason,
            "stop requested"
        );
        self.state.transition_to(EngineState::Stopped).await;
        self.stop_signal.send_replace(true);
    }

    pub async fn state(&self) -> EngineState {
        self.state.current().await
    }

    /// Sorted identifiers of every destination that received a message.
    pub async fn known_destinations(&self) -> Vec<String> {
        match self.router.lock().await.as_ref() {
            Some(router) => router.known_destinations().await,
            None => Vec::new(),
        }
    }

    /// Number of forked destination channels currently open.
    pub async fn destination_count(&self) -> usize {
        match self.router.lock().await.as_ref() {
            Some(router) => router.destination_count().await,
            None => 0,
        }
    }

    /// Result of the teardown pass, once `run` has finished.
    pub async fn teardown_report(&self) -> Option<TeardownReport> {
        *self.teardown_report.lock().await
    }

    async fn abort(
        &self,
        err: StartupError,
        router: Option<&Arc<ForkRouter>>,
        inbound: Option<(String, Arc<dyn Channel>)>,
    ) -> Result<EngineState, StartupError> {
        if !self.state.transition_to(EngineState::Error).await {
            warn!(
                event = events::MODULE_STATE_REJECTED,
                component = COMPONENT,
                module_id = self.module_id.as_str(),
                err = %err,
                "startup failed after stop was requested"
            );
        }
        self.teardown(router, inbound).await;
        Err(err)
    }

    /// Closes forked destinations, then the default destination, then the
    /// inbound channel.
    async fn teardown(
        &self,
        router: Option<&Arc<ForkRouter>>,
        inbound: Option<(String, Arc<dyn Channel>)>,
    ) {
        info!(
            event = events::TEARDOWN_START,
            component = COMPONENT,
            module_id = self.module_id.as_str(),
            dispatched = router.map(|router| router.dispatched()).unwrap_or_default(),
            "tearing down module channels"
        );

        let mut report = TeardownReport::default();
        if let Some(router) = router {
            router.stop_accepting();
            let forked = router.close_forked_channels().await;
            report.merge(teardown::close_all(&self.module_id, forked).await);
            let default = router.close_default_channel().await.into_iter().collect();
            report.merge(teardown::close_all(&self.module_id, default).await);
        }
        if let Some(inbound) = inbound {
            report.merge(teardown::close_all(&self.module_id, vec![inbound]).await);
        }

        teardown::log_done(&self.module_id, report);
        *self.teardown_report.lock().await = Some(report);
    }
}
