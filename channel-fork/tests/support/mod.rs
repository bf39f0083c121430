#![allow(dead_code)]

use attributes_static_file::AttributesStaticFile;
use channel_fork::{
    Channel, ChannelNode, EngineState, ForkModule, Persistence, StartupError, StopReason,
};
use integration_test_utils::wait_for_state;
use memory_channel_node::MemoryNode;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub(crate) const NODE_IDENTITY: &str = "ndn:/node";
pub(crate) const INBOUND_IDENTITY: &str = "ndn:/node/test-fork";
pub(crate) const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) struct RunningFork {
    pub(crate) module: Arc<ForkModule>,
    pub(crate) node: Arc<MemoryNode>,
    pub(crate) attributes: Arc<AttributesStaticFile>,
    run: JoinHandle<Result<EngineState, StartupError>>,
}

pub(crate) fn fork_attributes(filter: Option<&str>, envelope: Option<&str>) -> AttributesStaticFile {
    let mut config = json!({ "incoming-channel": "test-fork" });
    if let Some(filter) = filter {
        config["message-filter"] = json!(filter);
    }
    if let Some(envelope) = envelope {
        config["payload-envelope"] = json!(envelope);
    }
    AttributesStaticFile::from_json_str(&config.to_string())
        .expect("test attributes should parse")
}

pub(crate) async fn start_fork(filter: Option<&str>, envelope: Option<&str>) -> RunningFork {
    start_fork_on(Arc::new(MemoryNode::new(NODE_IDENTITY)), filter, envelope).await
}

pub(crate) async fn start_fork_on(
    node: Arc<MemoryNode>,
    filter: Option<&str>,
    envelope: Option<&str>,
) -> RunningFork {
    integration_test_utils::init_logging();

    let module = Arc::new(ForkModule::new("fork-test"));
    let attributes = Arc::new(fork_attributes(filter, envelope));
    let run = tokio::spawn({
        let module = module.clone();
        let node = node.clone();
        let attributes = attributes.clone();
        async move { module.run(node, attributes).await }
    });
    wait_for_state(&module, EngineState::Running, STARTUP_TIMEOUT).await;

    RunningFork {
        module,
        node,
        attributes,
        run,
    }
}

impl RunningFork {
    /// A publisher-side handle on the inbound channel.
    pub(crate) async fn inbound(&self) -> Arc<dyn Channel> {
        self.node
            .open_channel(INBOUND_IDENTITY, Persistence::Persistent)
            .await
            .expect("inbound channel should open")
    }

    pub(crate) async fn stop(self) -> EngineState {
        self.module.stop(StopReason::UserDirected).await;
        self.run
            .await
            .expect("run task should not panic")
            .expect("run should end cleanly")
    }
}
