//! Loopback transfer engine.
//!
//! Runs outbound transactions entirely in-process. The source is read on
//! offer and segmented into file-data PDUs. One cycle after EOF the copy is
//! written under a local receive root, standing in for the receiver's
//! Finished. Every step emits the indication a real engine would, so the
//! scheduler sees the full lifecycle.
//!
//! Incoming transactions are started with [`LoopbackEngine::receive_file`]
//! and run the same stages from the receiving side.
//!
//! PDUs are queued in an outbox rather than sent. The host drains the outbox
//! through the scheduler's output gate with [`crate::flush_output`].

use cf_scheduler::{
    ConditionCode, DirectiveVerb, EngineDirective, EngineError, EntityId, FinalStatus, Indication,
    IndicationKind, PduDirection, PutRequest, Role, TransactionId, TransactionTarget, TransferClass,
};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File-data segment size in bytes.
pub const SEGMENT_SIZE: usize = 512;

/// Transactions stop advancing while the outbox holds this many PDUs.
pub const OUTBOX_LIMIT: usize = 64;

const PDU_METADATA: u8 = 0x07;
const PDU_FILE_DATA: u8 = 0x10;
const PDU_EOF: u8 = 0x04;
const PDU_FINISHED: u8 = 0x05;
const PDU_ACK: u8 = 0x06;

/// One encoded PDU waiting for the output gate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingPdu {
    pub id: TransactionId,
    pub direction: PduDirection,
    pub bytes: Vec<u8>,
}

impl OutgoingPdu {
    fn encode(id: TransactionId, direction: PduDirection, kind: u8, payload: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(5 + payload.len());
        bytes.push(kind);
        bytes.extend_from_slice(&id.number.to_be_bytes());
        bytes.extend_from_slice(payload);
        Self {
            id,
            direction,
            bytes,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Metadata,
    Data,
    Eof,
    /// EOF sent, delivery happens on the next cycle.
    Closing,
    Finished(FinalStatus, ConditionCode),
}

#[derive(Debug)]
struct Transfer {
    id: TransactionId,
    role: Role,
    source_file: String,
    dest_file: String,
    data: Vec<u8>,
    offset: usize,
    stage: Stage,
    suspended: bool,
}

impl Transfer {
    fn indication(&self, kind: IndicationKind) -> Indication {
        Indication::new(kind, self.role, self.id)
            .with_files(self.source_file.clone(), self.dest_file.clone())
    }
}

pub struct LoopbackEngine {
    local: EntityId,
    receive_root: PathBuf,
    next_trans: u32,
    transfers: Vec<Transfer>,
    indications: Vec<Indication>,
    outbox: VecDeque<OutgoingPdu>,
}

impl LoopbackEngine {
    pub fn new(local: EntityId, receive_root: impl Into<PathBuf>) -> Self {
        Self {
            local,
            receive_root: receive_root.into(),
            next_trans: 1,
            transfers: Vec::new(),
            indications: Vec::new(),
            outbox: VecDeque::new(),
        }
    }

    pub fn receive_root(&self) -> &Path {
        &self.receive_root
    }

    /// Transactions not yet deallocated.
    pub fn in_flight(&self) -> usize {
        self.transfers.len()
    }

    pub fn outbox_len(&self) -> usize {
        self.outbox.len()
    }

    pub fn next_pdu(&mut self) -> Option<OutgoingPdu> {
        self.outbox.pop_front()
    }

    /// Puts a gated PDU back at the head of the outbox.
    pub fn requeue_pdu(&mut self, pdu: OutgoingPdu) {
        self.outbox.push_front(pdu);
    }

    fn allocate_number(&mut self) -> u32 {
        let number = self.next_trans;
        self.next_trans = self.next_trans.checked_add(1).unwrap_or(1);
        number
    }

    fn delivery_path(&self, dest_file: &str) -> PathBuf {
        self.receive_root.join(dest_file.trim_start_matches('/'))
    }

    /// Writes the delivered copy. Any failure is a filestore rejection.
    fn deliver(&self, transfer: &Transfer) -> Stage {
        let path = self.delivery_path(&transfer.dest_file);
        let written = path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| fs::write(&path, &transfer.data));

        match written {
            Ok(()) => {
                debug!(trans = %transfer.id, path = %path.display(), "Delivered");
                Stage::Finished(FinalStatus::Successful, ConditionCode::NoError)
            }
            Err(e) => {
                warn!(trans = %transfer.id, path = %path.display(), error = %e, "Delivery failed");
                Stage::Finished(FinalStatus::Cancelled, ConditionCode::FilestoreRejection)
            }
        }
    }

    /// Starts an incoming transaction as if `id.source` had sent `data`.
    pub fn receive_file(
        &mut self,
        id: TransactionId,
        class: TransferClass,
        source_file: &str,
        dest_file: &str,
        data: Vec<u8>,
    ) {
        let role = match class {
            TransferClass::Unacknowledged => Role::Class1Receiver,
            TransferClass::Acknowledged => Role::Class2Receiver,
        };
        let transfer = Transfer {
            id,
            role,
            source_file: source_file.to_string(),
            dest_file: dest_file.to_string(),
            data,
            offset: 0,
            stage: Stage::Metadata,
            suspended: false,
        };

        info!(trans = %id, bytes = transfer.data.len(), "Loopback incoming transaction");
        // Names are unknown until metadata arrives.
        self.indications
            .push(Indication::new(IndicationKind::MachineAllocated, role, id));
        self.transfers.push(transfer);
    }

    fn push_pdu(&mut self, i: usize, kind: u8, payload: &[u8]) {
        let t = &self.transfers[i];
        let direction = if t.role.is_receiver() {
            PduDirection::TowardSender
        } else {
            PduDirection::TowardReceiver
        };
        self.outbox
            .push_back(OutgoingPdu::encode(t.id, direction, kind, payload));
    }

    fn push_indication(&mut self, i: usize, kind: IndicationKind) {
        let indication = self.transfers[i].indication(kind);
        self.indications.push(indication);
    }

    /// Advances transfer `i` one stage and returns the stage it reaches.
    ///
    /// Senders emit every PDU. Receivers emit only the class 2 responses.
    fn step(&mut self, i: usize) -> Stage {
        let sending = self.transfers[i].role.is_sender();
        let acknowledged = self.transfers[i].role == Role::Class2Receiver;
        let stage = self.transfers[i].stage;

        match stage {
            Stage::Metadata => {
                if sending {
                    let dest = self.transfers[i].dest_file.clone();
                    self.push_pdu(i, PDU_METADATA, dest.as_bytes());
                    self.push_indication(i, IndicationKind::MetadataSent);
                } else {
                    self.push_indication(i, IndicationKind::MetadataReceived);
                }
                if self.transfers[i].data.is_empty() {
                    Stage::Eof
                } else {
                    Stage::Data
                }
            }
            Stage::Data => {
                let t = &self.transfers[i];
                let (start, end) = (t.offset, (t.offset + SEGMENT_SIZE).min(t.data.len()));
                let done = end == t.data.len();
                if sending {
                    let segment = t.data[start..end].to_vec();
                    self.push_pdu(i, PDU_FILE_DATA, &segment);
                    self.push_indication(i, IndicationKind::FileSegmentSent);
                } else {
                    self.push_indication(i, IndicationKind::FileSegmentReceived);
                }
                self.transfers[i].offset = end;
                if done {
                    Stage::Eof
                } else {
                    Stage::Data
                }
            }
            Stage::Eof => {
                let size = (self.transfers[i].data.len() as u64).to_be_bytes();
                if sending {
                    self.push_pdu(i, PDU_EOF, &size);
                    self.push_indication(i, IndicationKind::EofSent);
                } else {
                    self.push_indication(i, IndicationKind::EofReceived);
                    if acknowledged {
                        self.push_pdu(i, PDU_ACK, &[PDU_EOF]);
                    }
                }
                Stage::Closing
            }
            Stage::Closing => {
                let stage = self.deliver(&self.transfers[i]);
                if acknowledged {
                    let code = match stage {
                        Stage::Finished(_, condition) => condition.code(),
                        _ => 0,
                    };
                    self.push_pdu(i, PDU_FINISHED, &[code]);
                }
                stage
            }
            Stage::Finished(..) => stage,
        }
    }

    fn targets(&self, target: &TransactionTarget) -> Result<Vec<usize>, EngineError> {
        match target {
            TransactionTarget::All => Ok((0..self.transfers.len()).collect()),
            TransactionTarget::Id(id) => self
                .transfers
                .iter()
                .position(|t| t.id == *id)
                .map(|i| vec![i])
                .ok_or_else(|| EngineError::UnknownTransaction(id.to_string())),
        }
    }
}

impl cf_scheduler::TransferEngine for LoopbackEngine {
    fn offer_transfer(&mut self, request: &PutRequest) -> Result<(), EngineError> {
        let data = fs::read(&request.source_file)
            .map_err(|e| EngineError::Rejected(format!("{}: {e}", request.source_file)))?;

        let role = match request.class {
            TransferClass::Unacknowledged => Role::Class1Sender,
            TransferClass::Acknowledged => Role::Class2Sender,
        };
        let id = TransactionId::new(self.local, self.allocate_number());
        let transfer = Transfer {
            id,
            role,
            source_file: request.source_file.clone(),
            dest_file: request.dest_file.clone(),
            data,
            offset: 0,
            stage: Stage::Metadata,
            suspended: false,
        };

        info!(
            trans = %id,
            peer = %request.peer,
            bytes = transfer.data.len(),
            "Loopback transaction allocated"
        );
        self.indications
            .push(transfer.indication(IndicationKind::MachineAllocated));
        self.indications
            .push(transfer.indication(IndicationKind::TransactionStarted));
        self.transfers.push(transfer);
        Ok(())
    }

    fn give_request(&mut self, directive: &EngineDirective) -> Result<(), EngineError> {
        let targets = self.targets(&directive.target)?;

        for i in targets {
            let transfer = &mut self.transfers[i];
            match directive.verb {
                DirectiveVerb::Cancel => {
                    transfer.stage =
                        Stage::Finished(FinalStatus::Cancelled, ConditionCode::CancelRequestReceived);
                    transfer.suspended = false;
                }
                DirectiveVerb::Abandon => {
                    self.indications
                        .push(transfer.indication(IndicationKind::Abandoned));
                    transfer.stage = Stage::Finished(FinalStatus::Abandoned, ConditionCode::NoError);
                    transfer.suspended = false;
                }
                DirectiveVerb::Suspend if !transfer.suspended => {
                    transfer.suspended = true;
                    self.indications.push(
                        transfer
                            .indication(IndicationKind::Suspended)
                            .with_outcome(FinalStatus::Unknown, ConditionCode::SuspendRequestReceived),
                    );
                }
                DirectiveVerb::Resume if transfer.suspended => {
                    transfer.suspended = false;
                    self.indications
                        .push(transfer.indication(IndicationKind::Resumed));
                }
                DirectiveVerb::Suspend | DirectiveVerb::Resume => {}
            }
        }
        debug!(directive = %directive, "Directive applied");
        Ok(())
    }

    fn cycle_each_transaction(&mut self) {
        for i in 0..self.transfers.len() {
            let t = &self.transfers[i];
            if t.suspended
                || matches!(t.stage, Stage::Finished(..))
                || self.outbox.len() >= OUTBOX_LIMIT
            {
                continue;
            }
            let next = self.step(i);
            self.transfers[i].stage = next;
        }

        // Deallocate what finished, including transfers finished by a directive.
        let mut kept = Vec::with_capacity(self.transfers.len());
        for transfer in self.transfers.drain(..) {
            match transfer.stage {
                Stage::Finished(status, condition) => {
                    info!(
                        trans = %transfer.id,
                        status = ?status,
                        condition = condition.as_str(),
                        "Loopback transaction finished"
                    );
                    self.indications.push(
                        transfer
                            .indication(IndicationKind::MachineDeallocated)
                            .with_outcome(status, condition),
                    );
                }
                _ => kept.push(transfer),
            }
        }
        self.transfers = kept;
    }

    fn take_indications(&mut self) -> Vec<Indication> {
        std::mem::take(&mut self.indications)
    }

    fn is_suspended(&self, id: &TransactionId) -> bool {
        self.transfers.iter().any(|t| t.id == *id && t.suspended)
    }
}
