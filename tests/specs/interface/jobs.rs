//! Remote job specs
//!
//! A client driving jobs end to end over an in-process binding: call
//! framing, dispatch, the engine cycle and the broadcast back.

use crate::prelude::*;
use tokio::io::DuplexStream;
use weft_interface::{
    ActionRegistry, Client, Interface, InterfaceConfig, JobId, JobState, NullBinding,
    NullConnector, Server,
};

fn patrol_server() -> (Server<FakeClock>, NullConnector) {
    let mut registry = ActionRegistry::new();
    registry.register_model(&patrol_model(), "walk the perimeter");
    let (binding, connector) = NullBinding::new();
    let engine = ExecutionEngine::new(Plan::new(), FakeClock::new(), EngineConfig::default());
    let interface = Interface::new(engine, registry);
    (
        Server::new(Box::new(binding), interface, InterfaceConfig::default()),
        connector,
    )
}

async fn connect(
    server: &mut Server<FakeClock>,
    connector: &NullConnector,
) -> Client<DuplexStream> {
    let stream = connector.connect().unwrap();
    let config = InterfaceConfig::default();
    let (client, served) = tokio::join!(
        Client::connect(stream, &config),
        server.process_pending_requests()
    );
    served.unwrap();
    client.unwrap()
}

#[tokio::test]
async fn a_started_job_reports_once_per_cycle_boundary() {
    let (mut server, connector) = patrol_server();
    let mut client = connect(&mut server, &connector).await;

    let (job, served) = tokio::join!(
        client.start_job("Patrol", BTreeMap::new()),
        server.process_pending_requests()
    );
    served.unwrap();
    let job = job.unwrap();
    assert_eq!(job, JobId(1));

    server.run_cycle().await.unwrap();
    client.poll().await.unwrap();
    assert_eq!(client.last_cycle(), Some(0));
    assert_eq!(
        client.take_job_progress(),
        vec![(JobId(1), JobState::Started, "Patrol".to_string())]
    );

    // a quiet cycle adds its marker and nothing else
    server.run_cycle().await.unwrap();
    client.poll().await.unwrap();
    assert_eq!(client.last_cycle(), Some(1));
    assert!(client.take_job_progress().is_empty());
    assert!(client.take_notifications().is_empty());

    let (jobs, served) = tokio::join!(client.jobs(), server.process_pending_requests());
    served.unwrap();
    assert_eq!(
        jobs.unwrap(),
        vec![(JobId(1), "Patrol".to_string(), JobState::Started)]
    );
}

#[tokio::test]
async fn a_killed_job_reports_dropped_within_one_cycle() {
    let (mut server, connector) = patrol_server();
    let mut client = connect(&mut server, &connector).await;

    let (job, served) = tokio::join!(
        client.start_job("Patrol", BTreeMap::new()),
        server.process_pending_requests()
    );
    served.unwrap();
    let job = job.unwrap();
    server.run_cycle().await.unwrap();
    client.poll().await.unwrap();
    client.take_job_progress();

    let (killed, served) = tokio::join!(client.kill_job(job), server.process_pending_requests());
    served.unwrap();
    killed.unwrap();
    server.run_cycle().await.unwrap();
    client.poll().await.unwrap();

    assert_eq!(
        client.take_job_progress(),
        vec![(job, JobState::Dropped, "Patrol".to_string())]
    );
    let (jobs, served) = tokio::join!(client.jobs(), server.process_pending_requests());
    served.unwrap();
    assert_eq!(
        jobs.unwrap(),
        vec![(job, "Patrol".to_string(), JobState::Dropped)]
    );
}
