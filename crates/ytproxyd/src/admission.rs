//! Turns classified commands into synchronous responses.
//!
//! Administrative commands are answered from shared state; admission commands
//! pass the watch gate and land in the query queue.

use tracing::{debug, info};

use crate::protocol::{Command, PeerEntry, QueryRequest, Reply, Response};
use crate::queue::{Query, QueryQueue};
use crate::transport::{ConnectionRegistry, ResponseSink, TRANSPORT_TARGET};
use crate::watch::WatchLock;

/// Shared state every connection handler consults.
#[derive(Debug, Clone)]
pub(crate) struct Admission {
    queue: QueryQueue,
    watch: WatchLock,
    registry: ConnectionRegistry,
}

impl Admission {
    pub(crate) fn new(queue: QueryQueue, watch: WatchLock, registry: ConnectionRegistry) -> Self {
        Self {
            queue,
            watch,
            registry,
        }
    }

    /// Produces the immediate reply for `command` received on `origin`.
    pub(crate) fn handle(&self, command: Command, origin: &ResponseSink) -> Response {
        match command {
            Command::CurrentQueue => Response::Queue(self.queue.snapshot()),
            Command::CurrentConnections => Response::Connections(
                self.registry
                    .peers()
                    .into_iter()
                    .map(PeerEntry::from)
                    .collect(),
            ),
            Command::CancelWatch => {
                let was_engaged = self.watch.release();
                info!(
                    target: TRANSPORT_TARGET,
                    peer = %origin.peer(),
                    was_engaged,
                    "watch cancelled"
                );
                Reply::watch_cancelled().into()
            }
            Command::Submit(request) => self.admit(request, origin).into(),
            Command::Malformed { kind } => {
                debug!(
                    target: TRANSPORT_TARGET,
                    peer = %origin.peer(),
                    kind = %kind,
                    "malformed admission line"
                );
                Reply::malformed().into()
            }
            Command::Unknown => Reply::unknown_query().into(),
        }
    }

    fn admit(&self, request: QueryRequest, origin: &ResponseSink) -> Reply {
        if self.watch.is_engaged() {
            debug!(
                target: TRANSPORT_TARGET,
                peer = %origin.peer(),
                id = %request.id,
                kind = %request.kind,
                "admission rejected by watch lock"
            );
            return Reply::watch_locked(&request.id);
        }

        let engages_watch = request.kind.engages_watch();
        let reply_id = request.id.clone();
        let kind = request.kind;
        let position = self.queue.enqueue(Query::new(request, origin.clone()));
        if engages_watch {
            self.watch.engage();
        }
        info!(
            target: TRANSPORT_TARGET,
            peer = %origin.peer(),
            id = %reply_id,
            kind = %kind,
            queue_position = position,
            "query admitted"
        );
        Reply::admitted(&reply_id, position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::{fixture, rstest};

    use crate::protocol::{QueryKind, ReplyStatus};
    use crate::test_support::{discard_sink, request};

    #[fixture]
    fn admission() -> Admission {
        Admission::new(QueryQueue::new(), WatchLock::new(), ConnectionRegistry::new())
    }

    fn submit(kind: QueryKind, id: &str) -> Command {
        Command::Submit(request(kind, id, "https://example/stop/1"))
    }

    fn reply(response: Response) -> Reply {
        match response {
            Response::Reply(reply) => reply,
            other => panic!("expected reply, got {other:?}"),
        }
    }

    #[rstest]
    fn admission_reports_queue_position(admission: Admission) {
        let sink = discard_sink();
        let first = reply(admission.handle(submit(QueryKind::StopInfo, "1"), &sink));
        let second = reply(admission.handle(submit(QueryKind::RouteInfo, "2"), &sink));
        assert_eq!(first, Reply::admitted("1", 0));
        assert_eq!(second, Reply::admitted("2", 1));
        assert_eq!(admission.queue.len(), 2);
    }

    #[rstest]
    fn watch_query_is_enqueued_then_locks(admission: Admission) {
        let sink = discard_sink();
        let ack = reply(admission.handle(submit(QueryKind::WatchVehiclesInfo, "w"), &sink));
        assert_eq!(ack, Reply::admitted("w", 0));
        assert!(admission.watch.is_engaged());

        let rejected = reply(admission.handle(submit(QueryKind::StopInfo, "s"), &sink));
        assert_eq!(rejected, Reply::watch_locked("s"));
        assert_eq!(admission.queue.len(), 1);
    }

    #[rstest]
    #[case(QueryKind::StopInfo)]
    #[case(QueryKind::Echo)]
    #[case(QueryKind::WatchVehiclesInfo)]
    fn locked_gate_rejects_every_kind(admission: Admission, #[case] kind: QueryKind) {
        admission.watch.engage();
        let response = reply(admission.handle(submit(kind, "x"), &discard_sink()));
        assert_eq!(response.status(), ReplyStatus::Error);
        assert!(admission.queue.is_empty());
    }

    #[rstest]
    fn cancel_watch_reopens_gate(admission: Admission) {
        admission.watch.engage();
        let response = reply(admission.handle(Command::CancelWatch, &discard_sink()));
        assert_eq!(response, Reply::watch_cancelled());
        assert!(!admission.watch.is_engaged());
    }

    #[rstest]
    fn cancel_watch_when_open_still_confirms(admission: Admission) {
        let response = reply(admission.handle(Command::CancelWatch, &discard_sink()));
        assert_eq!(response, Reply::watch_cancelled());
    }

    #[rstest]
    fn unknown_and_malformed_leave_queue_alone(admission: Admission) {
        let sink = discard_sink();
        assert_eq!(
            reply(admission.handle(Command::Unknown, &sink)),
            Reply::unknown_query()
        );
        assert_eq!(
            reply(admission.handle(
                Command::Malformed {
                    kind: QueryKind::StopInfo
                },
                &sink
            )),
            Reply::malformed()
        );
        assert!(admission.queue.is_empty());
    }

    #[rstest]
    fn current_queue_lists_pending_entries(admission: Admission) {
        let sink = discard_sink();
        admission.handle(submit(QueryKind::StopInfo, "1"), &sink);
        match admission.handle(Command::CurrentQueue, &sink) {
            Response::Queue(entries) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].id, "1");
                assert_eq!(entries[0].kind, QueryKind::StopInfo);
            }
            other => panic!("expected queue snapshot, got {other:?}"),
        }
    }

    #[rstest]
    fn current_connections_reads_registry(admission: Admission) {
        match admission.handle(Command::CurrentConnections, &discard_sink()) {
            Response::Connections(peers) => assert!(peers.is_empty()),
            other => panic!("expected connections, got {other:?}"),
        }
    }
}
