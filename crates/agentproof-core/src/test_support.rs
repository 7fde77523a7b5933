//! Mock collaborators shared by the unit tests in this crate.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::Notify;

use agentproof_contracts::{
    agent::{AgentRecord, Uaid},
    error::{AgentProofError, AgentProofResult},
    outcome::{ChannelHandle, ProofToken},
    search::SearchRequest,
};

use crate::{
    stages::StagePipeline,
    traits::{ChannelNegotiator, IdentityVerifier, RegistryClient},
};

/// Ordered record of collaborator calls (and, in session tests, commits).
pub(crate) type Journal = Arc<Mutex<Vec<String>>>;

/// How a mock collaborator answers.
#[derive(Clone)]
pub(crate) enum Behaviour {
    Succeed,
    Fail(fn() -> AgentProofError),
    /// Never answers.
    Hang,
    /// Answers successfully once the gate is notified.
    WaitFor(Arc<Notify>),
}

impl Behaviour {
    async fn gate(&self) -> AgentProofResult<()> {
        match self {
            Behaviour::Succeed => Ok(()),
            Behaviour::Fail(make) => Err(make()),
            Behaviour::Hang => std::future::pending().await,
            Behaviour::WaitFor(gate) => {
                gate.notified().await;
                Ok(())
            }
        }
    }
}

struct Mock {
    behaviour: Mutex<Behaviour>,
    journal: Journal,
}

impl Mock {
    fn new(journal: Journal) -> Self {
        Self {
            behaviour: Mutex::new(Behaviour::Succeed),
            journal,
        }
    }

    async fn call(&self, entry: String) -> AgentProofResult<()> {
        self.journal.lock().unwrap().push(entry);
        let behaviour = self.behaviour.lock().unwrap().clone();
        behaviour.gate().await
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

pub(crate) struct MockRegistry {
    mock: Mock,
    directory: HashMap<Uaid, AgentRecord>,
}

impl MockRegistry {
    pub(crate) fn set_behaviour(&self, behaviour: Behaviour) {
        *self.mock.behaviour.lock().unwrap() = behaviour;
    }

    /// The resolved record the registry holds for `uaid`.
    pub(crate) fn profile(&self, uaid: &str) -> AgentRecord {
        self.directory[&Uaid::new(uaid)].clone()
    }
}

#[async_trait]
impl RegistryClient for MockRegistry {
    async fn search(&self, request: &SearchRequest) -> AgentProofResult<Vec<AgentRecord>> {
        self.mock.call(format!("search:{}", request.query())).await?;
        let needle = request.query().to_lowercase();
        let mut hits: Vec<AgentRecord> = self
            .directory
            .values()
            .filter(|a| a.name.to_lowercase().contains(&needle))
            .map(|a| AgentRecord {
                registry: None,
                communication_protocol: None,
                ..a.clone()
            })
            .collect();
        hits.sort_by(|a, b| a.uaid.cmp(&b.uaid));
        hits.truncate(request.limit() as usize);
        Ok(hits)
    }

    async fn resolve_uaid(&self, uaid: &Uaid) -> AgentProofResult<AgentRecord> {
        self.mock.call(format!("resolve:{uaid}")).await?;
        self.directory
            .get(uaid)
            .cloned()
            .ok_or_else(|| AgentProofError::UnknownAgent {
                uaid: uaid.to_string(),
            })
    }
}

// ── On-chain verifier ─────────────────────────────────────────────────────────

pub(crate) struct MockVerifier {
    mock: Mock,
}

impl MockVerifier {
    pub(crate) fn set_behaviour(&self, behaviour: Behaviour) {
        *self.mock.behaviour.lock().unwrap() = behaviour;
    }
}

#[async_trait]
impl IdentityVerifier for MockVerifier {
    async fn verify_identity(&self, profile: &AgentRecord) -> AgentProofResult<ProofToken> {
        self.mock.call(format!("verify:{}", profile.uaid)).await?;
        Ok(ProofToken::new("T1"))
    }
}

// ── Channel negotiator ────────────────────────────────────────────────────────

pub(crate) struct MockNegotiator {
    mock: Mock,
    issued: AtomicU64,
    released: Mutex<Vec<String>>,
    stall_release: AtomicBool,
}

impl MockNegotiator {
    pub(crate) fn set_behaviour(&self, behaviour: Behaviour) {
        *self.mock.behaviour.lock().unwrap() = behaviour;
    }

    /// Make every later `release` call never return.
    pub(crate) fn stall_release(&self) {
        self.stall_release.store(true, Ordering::SeqCst);
    }

    pub(crate) fn released(&self) -> Vec<String> {
        self.released.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelNegotiator for MockNegotiator {
    async fn establish(
        &self,
        profile: &AgentRecord,
        _proof: &ProofToken,
    ) -> AgentProofResult<ChannelHandle> {
        self.mock.call(format!("establish:{}", profile.uaid)).await?;
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ChannelHandle::new(format!("H{n}"), format!("fp-H{n}")))
    }

    async fn release(&self, handle: &ChannelHandle) {
        if self.stall_release.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.released.lock().unwrap().push(handle.id.clone());
    }
}

// ── Harness ───────────────────────────────────────────────────────────────────

/// A registry seeded with two resolvable agents, plus succeeding verifier
/// and negotiator, all writing to one journal.
pub(crate) struct Harness {
    pub(crate) registry: Arc<MockRegistry>,
    pub(crate) verifier: Arc<MockVerifier>,
    pub(crate) negotiator: Arc<MockNegotiator>,
    journal: Journal,
}

impl Harness {
    pub(crate) fn new() -> Self {
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));

        let directory = [
            AgentRecord::new("did:hol:123", "Assistant Alpha")
                .with_trust_score(87.0)
                .with_registry("hashgraph-online")
                .with_protocol("A2A"),
            AgentRecord::new("did:hol:456", "Research Assistant Beta")
                .with_trust_score(64.0)
                .with_registry("hashgraph-online")
                .with_protocol("Standard"),
        ]
        .into_iter()
        .map(|a| (a.uaid.clone(), a))
        .collect();

        Self {
            registry: Arc::new(MockRegistry {
                mock: Mock::new(Arc::clone(&journal)),
                directory,
            }),
            verifier: Arc::new(MockVerifier {
                mock: Mock::new(Arc::clone(&journal)),
            }),
            negotiator: Arc::new(MockNegotiator {
                mock: Mock::new(Arc::clone(&journal)),
                issued: AtomicU64::new(0),
                released: Mutex::new(Vec::new()),
                stall_release: AtomicBool::new(false),
            }),
            journal,
        }
    }

    pub(crate) fn pipeline(&self) -> StagePipeline {
        StagePipeline::new(
            Arc::clone(&self.registry) as Arc<dyn RegistryClient>,
            Arc::clone(&self.verifier) as Arc<dyn IdentityVerifier>,
            Arc::clone(&self.negotiator) as Arc<dyn ChannelNegotiator>,
        )
    }

    pub(crate) fn journal_handle(&self) -> Journal {
        Arc::clone(&self.journal)
    }

    pub(crate) fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub(crate) async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within 2s"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
