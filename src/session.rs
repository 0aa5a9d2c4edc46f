use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::config::LayoutConfig;
use crate::error::Error;
use crate::layout::compute_layout;
use crate::model::FlowGraph;
use crate::output::LayoutResult;

/// Proof that a layout request was issued; see [`LayoutSession::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutTicket {
    generation: u64,
}

impl LayoutTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Last-request-wins coordination for a view that re-lays out on every
/// snapshot. Each [`begin`](Self::begin) supersedes the tickets before it;
/// results computed for a superseded ticket are dropped.
#[derive(Debug, Clone, Default)]
pub struct LayoutSession {
    generation: Arc<AtomicU64>,
}

impl LayoutSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> LayoutTicket {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        LayoutTicket { generation }
    }

    pub fn is_current(&self, ticket: LayoutTicket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.generation
    }

    /// Runs the pipeline on the blocking pool. `Ok(None)` means a newer
    /// request was issued while this one was computing.
    pub async fn layout_async(
        &self,
        ticket: LayoutTicket,
        graph: FlowGraph,
        config: LayoutConfig,
    ) -> Result<Option<LayoutResult>, Error> {
        let result = tokio::task::spawn_blocking(move || compute_layout(&graph, &config))
            .await
            .map_err(|err| Error::Join(err.to_string()))?;

        if !self.is_current(ticket) {
            debug!(
                generation = ticket.generation,
                "discarding superseded layout"
            );
            return Ok(None);
        }
        Ok(Some(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{RunRecord, TaskRecord};
    use crate::model::GraphBuilder;

    fn graph() -> FlowGraph {
        let run = RunRecord::new("r", "run")
            .task(TaskRecord::leaf("a"))
            .task(TaskRecord::leaf("b"))
            .depends("a", "b");
        GraphBuilder::default().build(&run).unwrap()
    }

    #[test]
    fn newer_ticket_supersedes_older() {
        let session = LayoutSession::new();
        let first = session.begin();
        assert!(session.is_current(first));
        let second = session.begin();
        assert!(!session.is_current(first));
        assert!(session.is_current(second));
        assert!(second.generation() > first.generation());
    }

    #[tokio::test]
    async fn current_ticket_gets_result() {
        let session = LayoutSession::new();
        let ticket = session.begin();
        let result = session
            .layout_async(ticket, graph(), LayoutConfig::default())
            .await
            .unwrap();
        assert_eq!(result.map(|r| r.nodes.len()), Some(2));
    }

    #[tokio::test]
    async fn stale_ticket_yields_none() {
        let session = LayoutSession::new();
        let stale = session.begin();
        let _newer = session.begin();
        let result = session
            .layout_async(stale, graph(), LayoutConfig::default())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn clones_share_the_generation() {
        let session = LayoutSession::new();
        let handle = session.clone();
        let ticket = session.begin();
        handle.begin();
        let result = session
            .layout_async(ticket, graph(), LayoutConfig::default())
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
