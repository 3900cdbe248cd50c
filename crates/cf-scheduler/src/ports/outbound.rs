//! Outbound (Driven) ports for the transfer scheduler.
//!
//! These traits define the collaborators the scheduler drives: the protocol
//! engine, the local file store, the downstream PDU consumer and its
//! flow-control token.

use crate::domain::{EngineDirective, EngineError, Indication, PutRequest, SinkError, TransactionId};
use std::io::{self, Write};

/// Protocol engine that runs the per-transaction state machines.
///
/// The engine never calls back into the scheduler. Indications it produces
/// are queued and collected with [`TransferEngine::take_indications`] after
/// each call returns.
pub trait TransferEngine {
    /// Offers one outbound transfer.
    ///
    /// # Returns
    /// - `Ok(())`: accepted, an allocation indication will follow
    /// - `Err`: rejected, nothing was started
    fn offer_transfer(&mut self, request: &PutRequest) -> Result<(), EngineError>;

    /// Cancel, abandon, suspend or resume one or all transactions.
    fn give_request(&mut self, directive: &EngineDirective) -> Result<(), EngineError>;

    /// Advances every transaction one step.
    fn cycle_each_transaction(&mut self);

    /// Drains indications produced since the last call.
    fn take_indications(&mut self) -> Vec<Indication>;

    fn is_suspended(&self, id: &TransactionId) -> bool;
}

/// Directory listing entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

impl DirEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
        }
    }
}

/// Local file system as the scheduler sees it.
pub trait FileStore {
    fn list_dir(&self, dir: &str) -> io::Result<Vec<DirEntry>>;

    /// True while a writer still holds the file open.
    fn is_open(&self, path: &str) -> bool;

    fn remove_file(&self, path: &str) -> io::Result<()>;

    /// Creates or truncates `path` for a snapshot dump.
    fn create(&self, path: &str) -> io::Result<Box<dyn Write>>;
}

/// Downstream consumer of outgoing PDUs.
pub trait PduSink {
    fn send(&mut self, channel: u8, pdu: &[u8]) -> Result<(), SinkError>;
}

/// Countable flow-control token shared with a downstream consumer.
///
/// Acquisition is always a zero-timeout poll.
pub trait HandshakeToken: Send + Sync {
    fn try_take(&self) -> bool;

    fn give(&self);
}

/// Mock collaborators for testing.
#[cfg(test)]
pub mod mocks {
    use super::*;
    use crate::domain::{
        ConditionCode, DirectiveVerb, EntityId, FinalStatus, IndicationKind, Role, TransactionTarget,
    };
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};
    use std::rc::Rc;

    /// Engine that records every call and can auto-allocate accepted offers.
    pub struct MockEngine {
        pub offers: Vec<PutRequest>,
        pub directives: Vec<EngineDirective>,
        pub cycles: usize,
        pub reject_offers: bool,
        pub reject_directives: bool,
        /// When set, accepted offers are allocated under this entity.
        pub auto_allocate: Option<EntityId>,
        pub next_trans: u32,
        pub queued: Vec<Indication>,
        pub suspended: HashSet<TransactionId>,
    }

    impl MockEngine {
        pub fn new() -> Self {
            Self {
                offers: Vec::new(),
                directives: Vec::new(),
                cycles: 0,
                reject_offers: false,
                reject_directives: false,
                auto_allocate: None,
                next_trans: 1,
                queued: Vec::new(),
                suspended: HashSet::new(),
            }
        }

        pub fn allocating(flight: EntityId) -> Self {
            Self {
                auto_allocate: Some(flight),
                ..Self::new()
            }
        }

        pub fn push(&mut self, indication: Indication) {
            self.queued.push(indication);
        }
    }

    impl TransferEngine for MockEngine {
        fn offer_transfer(&mut self, request: &PutRequest) -> Result<(), EngineError> {
            if self.reject_offers {
                return Err(EngineError::Rejected(request.source_file.clone()));
            }
            self.offers.push(request.clone());

            if let Some(flight) = self.auto_allocate {
                let role = match request.class.number() {
                    1 => Role::Class1Sender,
                    _ => Role::Class2Sender,
                };
                let id = TransactionId::new(flight, self.next_trans);
                self.next_trans += 1;
                self.queued.push(
                    Indication::new(IndicationKind::MachineAllocated, role, id)
                        .with_files(request.source_file.clone(), request.dest_file.clone()),
                );
            }
            Ok(())
        }

        fn give_request(&mut self, directive: &EngineDirective) -> Result<(), EngineError> {
            if self.reject_directives {
                return Err(EngineError::Rejected(directive.to_string()));
            }
            self.directives.push(*directive);

            if let (DirectiveVerb::Suspend, TransactionTarget::Id(id)) =
                (directive.verb, directive.target)
            {
                self.suspended.insert(id);
                self.queued.push(
                    Indication::new(IndicationKind::Suspended, Role::Class1Sender, id)
                        .with_outcome(FinalStatus::Unknown, ConditionCode::SuspendRequestReceived),
                );
            }
            Ok(())
        }

        fn cycle_each_transaction(&mut self) {
            self.cycles += 1;
        }

        fn take_indications(&mut self) -> Vec<Indication> {
            std::mem::take(&mut self.queued)
        }

        fn is_suspended(&self, id: &TransactionId) -> bool {
            self.suspended.contains(id)
        }
    }

    /// In-memory file store.
    #[derive(Default)]
    pub struct MockFileStore {
        pub dirs: HashMap<String, Vec<DirEntry>>,
        pub open: HashSet<String>,
        pub removed: RefCell<Vec<String>>,
        pub written: Rc<RefCell<HashMap<String, Vec<u8>>>>,
    }

    impl MockFileStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_dir(mut self, dir: &str, entries: Vec<DirEntry>) -> Self {
            self.dirs.insert(dir.to_string(), entries);
            self
        }

        pub fn with_open(mut self, path: &str) -> Self {
            self.open.insert(path.to_string());
            self
        }

        pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
            self.written.borrow().get(path).cloned()
        }
    }

    struct CapturingWriter {
        path: String,
        files: Rc<RefCell<HashMap<String, Vec<u8>>>>,
    }

    impl Write for CapturingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.files
                .borrow_mut()
                .entry(self.path.clone())
                .or_default()
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl FileStore for MockFileStore {
        fn list_dir(&self, dir: &str) -> io::Result<Vec<DirEntry>> {
            self.dirs
                .get(dir)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, dir.to_string()))
        }

        fn is_open(&self, path: &str) -> bool {
            self.open.contains(path)
        }

        fn remove_file(&self, path: &str) -> io::Result<()> {
            self.removed.borrow_mut().push(path.to_string());
            Ok(())
        }

        fn create(&self, path: &str) -> io::Result<Box<dyn Write>> {
            self.written.borrow_mut().insert(path.to_string(), Vec::new());
            Ok(Box::new(CapturingWriter {
                path: path.to_string(),
                files: Rc::clone(&self.written),
            }))
        }
    }

    /// PDU sink that records sends and can be told to fail.
    #[derive(Default)]
    pub struct MockPduSink {
        pub sent: Vec<(u8, Vec<u8>)>,
        pub fail: bool,
    }

    impl PduSink for MockPduSink {
        fn send(&mut self, channel: u8, pdu: &[u8]) -> Result<(), SinkError> {
            if self.fail {
                return Err(SinkError::Unavailable(channel));
            }
            self.sent.push((channel, pdu.to_vec()));
            Ok(())
        }
    }

    /// Counting token without a runtime.
    pub struct MockToken {
        permits: std::sync::atomic::AtomicU32,
    }

    impl MockToken {
        pub fn new(permits: u32) -> Self {
            Self {
                permits: std::sync::atomic::AtomicU32::new(permits),
            }
        }

        pub fn permits(&self) -> u32 {
            self.permits.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    impl HandshakeToken for MockToken {
        fn try_take(&self) -> bool {
            self.permits
                .fetch_update(
                    std::sync::atomic::Ordering::SeqCst,
                    std::sync::atomic::Ordering::SeqCst,
                    |p| p.checked_sub(1),
                )
                .is_ok()
        }

        fn give(&self) {
            self.permits.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }
}
