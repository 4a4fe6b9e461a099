use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use futures_util::StreamExt;
use vault_db::{MemoryStore, Store};
use vault_events::{DeliveryPolicy, EventStream, SubscriberRegistry, Updater};
use vault_listener::{CallbackOutcome, Listener, ListenerError};
use vault_types::{
    ConnectionPayload, CredentialAttribute, CredentialPayload, CredentialRole, CredentialUpdate,
    JobInfo, JobResult, JobStatus, MessagePayload, NewJob, ProofAttribute, ProofPayload,
    ProofRole, ProofUpdate, ProtocolType,
};

const TENANT: &str = "tenant-a";

fn harness() -> (Arc<MemoryStore>, Listener) {
    let store = Arc::new(MemoryStore::new());
    let registry = Arc::new(SubscriberRegistry::new(DeliveryPolicy::DropAfter(
        Duration::from_secs(1),
    )));
    let listener = Listener::new(Updater::new(store.clone(), registry));
    (store, listener)
}

fn info(job_id: &str) -> JobInfo {
    JobInfo {
        job_id: job_id.to_string(),
        tenant_id: TENANT.to_string(),
        connection_id: "conn-1".to_string(),
    }
}

fn at(secs: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).single().unwrap()
}

async fn next_description(live: &mut EventStream) -> String {
    tokio::time::timeout(Duration::from_secs(1), live.next())
        .await
        .expect("an event should arrive")
        .expect("stream should be open")
        .description
}

async fn assert_quiet(live: &mut EventStream) {
    assert!(
        tokio::time::timeout(Duration::from_millis(50), live.next())
            .await
            .is_err(),
        "no further event expected"
    );
}

fn processed(outcome: CallbackOutcome) -> vault_types::Job {
    match outcome {
        CallbackOutcome::Processed { job } => job,
        other => panic!("expected a processed callback, got {other:?}"),
    }
}

fn credential_offer(initiated_by_us: bool, role: CredentialRole) -> CredentialPayload {
    CredentialPayload {
        role,
        schema_id: "schema:email".to_string(),
        cred_def_id: "cred-def:1".to_string(),
        attributes: vec![CredentialAttribute {
            name: "email".to_string(),
            value: "alice@example.com".to_string(),
        }],
        initiated_by_us,
    }
}

#[tokio::test]
async fn connection_callback_completes_the_invitation_job() {
    let (store, listener) = harness();
    store
        .add_job(&NewJob::new(
            "job-1",
            TENANT,
            ProtocolType::Connection,
            true,
            JobStatus::Waiting,
        ))
        .unwrap();
    let mut live = listener.updater().subscribe_until_dropped(TENANT).await;

    let outcome = listener
        .add_connection(
            info("job-1"),
            ConnectionPayload {
                our_did: "did:our".to_string(),
                their_did: "did:their".to_string(),
                their_endpoint: "http://their.example".to_string(),
                their_label: "Bob".to_string(),
            },
        )
        .await;

    let job = processed(outcome);
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.result, JobResult::Success);
    assert_eq!(job.connection_id.as_deref(), Some("conn-1"));
    assert_eq!(job.protocol_connection_id.as_deref(), Some("conn-1"));

    assert_eq!(next_description(&mut live).await, "Established connection to Bob");
    assert_quiet(&mut live).await;

    let connection = store.get_connection(TENANT, "conn-1").unwrap();
    assert!(connection.invited);
    assert_eq!(store.list_events(TENANT, 10).unwrap().len(), 1);
}

#[tokio::test]
async fn connection_callback_for_unknown_job_fails_without_writes() {
    let (store, listener) = harness();

    let outcome = listener
        .add_connection(
            info("missing"),
            ConnectionPayload {
                our_did: "did:our".to_string(),
                their_did: "did:their".to_string(),
                their_endpoint: "http://their.example".to_string(),
                their_label: "Bob".to_string(),
            },
        )
        .await;

    match outcome {
        CallbackOutcome::Failed { error } => assert!(error.is_not_found(), "got {error}"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(store.get_connection(TENANT, "conn-1").is_err());
    assert_eq!(store.event_count(), 0);
}

fn connection_payload() -> ConnectionPayload {
    ConnectionPayload {
        our_did: "did:our".to_string(),
        their_did: "did:their".to_string(),
        their_endpoint: "http://their.example".to_string(),
        their_label: "Bob".to_string(),
    }
}

#[tokio::test]
async fn redelivered_connection_callback_leaves_the_job_alone() {
    let (store, listener) = harness();
    store
        .add_job(&NewJob::new(
            "job-1",
            TENANT,
            ProtocolType::Connection,
            true,
            JobStatus::Waiting,
        ))
        .unwrap();

    processed(listener.add_connection(info("job-1"), connection_payload()).await);
    let mut live = listener.updater().subscribe_until_dropped(TENANT).await;

    let outcome = listener
        .add_connection(info("job-1"), connection_payload())
        .await;
    assert!(matches!(outcome, CallbackOutcome::Unchanged { ref job_id } if job_id == "job-1"));
    assert_quiet(&mut live).await;
    assert_eq!(store.event_count(), 1);
}

#[tokio::test]
async fn connection_callback_for_a_credential_job_is_invalid() {
    let (store, listener) = harness();
    processed(
        listener
            .add_credential(info("job-1"), credential_offer(false, CredentialRole::Holder))
            .await,
    );

    let outcome = listener
        .add_connection(info("job-1"), connection_payload())
        .await;
    assert!(matches!(
        outcome,
        CallbackOutcome::Failed {
            error: ListenerError::Invalid(_)
        }
    ));

    let job = store.get_job(TENANT, "job-1").unwrap();
    assert_eq!((job.status, job.result), (JobStatus::Pending, JobResult::None));
    assert!(store.get_connection(TENANT, "conn-1").is_err());
    assert_eq!(store.event_count(), 1);
}

#[tokio::test]
async fn received_credential_offer_fails_on_decline() {
    let (store, listener) = harness();
    let mut live = listener.updater().subscribe_until_dropped(TENANT).await;

    let job = processed(
        listener
            .add_credential(info("job-1"), credential_offer(false, CredentialRole::Holder))
            .await,
    );
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.result, JobResult::None);
    assert_eq!(next_description(&mut live).await, "Offer for credential schema:email");

    let job = processed(
        listener
            .update_credential(
                info("job-1"),
                CredentialUpdate {
                    failed_at: Some(at(10)),
                    ..Default::default()
                },
            )
            .await,
    );
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.result, JobResult::Failure);
    assert_eq!(next_description(&mut live).await, "Credential schema:email declined");
    assert_quiet(&mut live).await;

    assert_eq!(store.list_events(TENANT, 10).unwrap().len(), 2);
}

#[tokio::test]
async fn credential_milestones_stay_put_and_completed_jobs_do_not_move() {
    let (store, listener) = harness();
    let job = processed(
        listener
            .add_credential(info("job-1"), credential_offer(true, CredentialRole::Issuer))
            .await,
    );
    assert_eq!(job.status, JobStatus::Waiting);
    let credential_id = job.protocol_credential_id.clone().unwrap();
    let mut live = listener.updater().subscribe_until_dropped(TENANT).await;

    // Approval keeps an issuer job waiting but is still journaled.
    let job = processed(
        listener
            .update_credential(
                info("job-1"),
                CredentialUpdate {
                    approved_at: Some(at(1)),
                    ..Default::default()
                },
            )
            .await,
    );
    assert_eq!((job.status, job.result), (JobStatus::Waiting, JobResult::None));
    assert_eq!(next_description(&mut live).await, "Credential schema:email approved");
    assert_eq!(store.event_count(), 2);

    let job = processed(
        listener
            .update_credential(
                info("job-1"),
                CredentialUpdate {
                    approved_at: Some(at(2)),
                    issued_at: Some(at(3)),
                    failed_at: None,
                },
            )
            .await,
    );
    assert_eq!((job.status, job.result), (JobStatus::Completed, JobResult::Success));
    assert_eq!(next_description(&mut live).await, "Credential schema:email issued");

    let credential = store.get_credential(TENANT, &credential_id).unwrap();
    assert_eq!(credential.milestones.approved, Some(at(1)));
    assert_eq!(credential.milestones.completed, Some(at(3)));

    let events_before = store.event_count();
    let outcome = listener
        .update_credential(
            info("job-1"),
            CredentialUpdate {
                failed_at: Some(at(4)),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(outcome, CallbackOutcome::Unchanged { ref job_id } if job_id == "job-1"));
    assert_eq!(store.event_count(), events_before);
    assert_quiet(&mut live).await;

    let stored = store.get_job(TENANT, "job-1").unwrap();
    assert_eq!((stored.status, stored.result), (JobStatus::Completed, JobResult::Success));
    let credential = store.get_credential(TENANT, &credential_id).unwrap();
    assert_eq!(credential.milestones.failed, Some(at(4)));
}

#[tokio::test]
async fn repeated_proof_approval_is_journaled_each_time() {
    let (store, listener) = harness();
    processed(
        listener
            .add_proof(
                info("job-5"),
                ProofPayload {
                    role: ProofRole::Prover,
                    attributes: Vec::new(),
                    initiated_by_us: false,
                },
            )
            .await,
    );

    for _ in 0..2 {
        let job = processed(
            listener
                .update_proof(
                    info("job-5"),
                    ProofUpdate {
                        approved_at: Some(at(1)),
                        ..Default::default()
                    },
                )
                .await,
        );
        assert_eq!(job.status, JobStatus::Waiting);
    }

    let descriptions: Vec<String> = store
        .list_events(TENANT, 10)
        .unwrap()
        .into_iter()
        .map(|event| event.description)
        .collect();
    assert_eq!(
        descriptions,
        ["Proof approved", "Proof approved", "Request for proof"]
    );
}

#[tokio::test]
async fn verifier_proof_run_completes_on_verification() {
    let (store, listener) = harness();
    let mut live = listener.updater().subscribe_until_dropped(TENANT).await;

    let job = processed(
        listener
            .add_proof(
                info("job-9"),
                ProofPayload {
                    role: ProofRole::Verifier,
                    attributes: vec![ProofAttribute {
                        name: "email".to_string(),
                        value: None,
                        cred_def_id: Some("cred-def:1".to_string()),
                    }],
                    initiated_by_us: true,
                },
            )
            .await,
    );
    assert_eq!(job.status, JobStatus::Waiting);
    assert_eq!(next_description(&mut live).await, "Requesting proof");

    let job = processed(
        listener
            .update_proof(
                info("job-9"),
                ProofUpdate {
                    verified_at: Some(at(5)),
                    ..Default::default()
                },
            )
            .await,
    );
    assert_eq!((job.status, job.result), (JobStatus::Completed, JobResult::Success));
    assert_eq!(next_description(&mut live).await, "Proof verified");

    let proof = store
        .get_proof(TENANT, job.protocol_proof_id.as_deref().unwrap())
        .unwrap();
    assert!(proof.result);
    assert_eq!(proof.milestones.completed, Some(at(5)));
}

#[tokio::test]
async fn prover_side_describes_the_request() {
    let (_, listener) = harness();
    let mut live = listener.updater().subscribe_until_dropped(TENANT).await;

    let job = processed(
        listener
            .add_proof(
                info("job-2"),
                ProofPayload {
                    role: ProofRole::Prover,
                    attributes: Vec::new(),
                    initiated_by_us: false,
                },
            )
            .await,
    );
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(next_description(&mut live).await, "Request for proof");
}

#[tokio::test]
async fn received_message_is_a_completed_job() {
    let (store, listener) = harness();
    let mut live = listener.updater().subscribe_until_dropped(TENANT).await;

    let job = processed(
        listener
            .add_message(
                info("msg-1"),
                MessagePayload {
                    text: "hello there".to_string(),
                    sent_by_us: false,
                },
            )
            .await,
    );
    assert_eq!(job.protocol_type, ProtocolType::BasicMessage);
    assert_eq!((job.status, job.result), (JobStatus::Completed, JobResult::Success));
    assert!(job.protocol_message_id.is_some());
    assert_eq!(next_description(&mut live).await, "Received message hello there");

    assert!(store.get_job(TENANT, "msg-1").is_ok());
}

#[tokio::test]
async fn message_update_is_unsupported() {
    let (store, listener) = harness();

    let outcome = listener.update_message(info("msg-1")).await;
    assert!(matches!(
        outcome,
        CallbackOutcome::Unsupported {
            protocol: ProtocolType::BasicMessage,
            action: "update",
        }
    ));
    assert_eq!(store.event_count(), 0);
}

#[tokio::test]
async fn credential_update_on_a_proof_job_is_invalid() {
    let (_, listener) = harness();
    processed(
        listener
            .add_proof(
                info("job-3"),
                ProofPayload {
                    role: ProofRole::Verifier,
                    attributes: Vec::new(),
                    initiated_by_us: true,
                },
            )
            .await,
    );

    let outcome = listener
        .update_credential(info("job-3"), CredentialUpdate::default())
        .await;
    assert!(matches!(
        outcome,
        CallbackOutcome::Failed {
            error: ListenerError::Invalid(_)
        }
    ));
}

#[tokio::test]
async fn failed_event_write_keeps_the_new_job() {
    let (store, listener) = harness();
    store.fail_event_writes(true);

    let outcome = listener
        .add_credential(info("job-1"), credential_offer(false, CredentialRole::Holder))
        .await;
    assert!(matches!(outcome, CallbackOutcome::Failed { .. }));
    assert!(store.get_job(TENANT, "job-1").is_ok());
}
