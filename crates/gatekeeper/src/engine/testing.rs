//! In-process fakes and a harness for engine tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use gate_common::{ApiError, GateError, GroupInfo, UserAuthSession, UserInfo};
use parking_lot::Mutex;
use tempfile::{NamedTempFile, TempDir};

use super::{EngineParts, VerificationEngine};
use crate::collaborators::{
    CallbackQuery, ChannelAudit, ChatId, ChemistryToolkit, IncomingMessage, InlineKeyboard,
    MessageId, MessagingClient, Molecule, RenderRequest, RenderedImage,
};
use crate::compounds::library_fixture;
use crate::config::{ChallengeConfig, GroupDefaultsConfig, RateLimitConfig};
use crate::preapproval::PreApprovalList;
use crate::protocol::{ButtonCommand, ButtonPayload};
use crate::store::{KvStore, MemoryStore, RecordKind, SessionRepository};
use gate_common::Region;

pub(crate) const BOT_USER_ID: i64 = 1;
pub(crate) const USER_ID: i64 = 4_001;
pub(crate) const GROUP_ID: i64 = 9_001;

/// One call made against the fake messenger
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Text { chat: ChatId, text: String, reply_to: Option<MessageId> },
    Photo { chat: ChatId, message: MessageId, caption: String, keyboard: InlineKeyboard },
    EditCaption { chat: ChatId, message: MessageId, caption: String },
    Delete { chat: ChatId, ids: Vec<MessageId> },
    Answer { query: i64, text: String, alert: bool },
    JoinRequest { group: i64, user: i64, approve: bool },
}

#[derive(Default)]
pub(crate) struct FakeMessenger {
    calls: Mutex<Vec<Call>>,
    next_message_id: AtomicI64,
    edit_failure: Mutex<Option<ApiError>>,
    join_failure: Mutex<Option<ApiError>>,
}

impl FakeMessenger {
    fn new() -> Self {
        Self {
            next_message_id: AtomicI64::new(1_000),
            ..Default::default()
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn next_id(&self) -> MessageId {
        self.next_message_id.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn calls_matching(&self, pred: impl Fn(&Call) -> bool) -> Vec<Call> {
        self.calls.lock().iter().filter(|c| pred(c)).cloned().collect()
    }

    /// Texts sent with `send_text`, in order
    pub(crate) fn sent_texts(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn last_answer(&self) -> Option<(String, bool)> {
        self.calls.lock().iter().rev().find_map(|c| match c {
            Call::Answer { text, alert, .. } => Some((text.clone(), *alert)),
            _ => None,
        })
    }

    pub(crate) fn fail_edits_with(&self, error: ApiError) {
        *self.edit_failure.lock() = Some(error);
    }

    pub(crate) fn fail_join_requests_with(&self, error: ApiError) {
        *self.join_failure.lock() = Some(error);
    }
}

#[async_trait]
impl MessagingClient for FakeMessenger {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId, ApiError> {
        self.record(Call::Text {
            chat: chat_id,
            text: text.to_string(),
            reply_to,
        });
        Ok(self.next_id())
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        _png: &[u8],
        caption: &str,
        keyboard: &InlineKeyboard,
        _reply_to: Option<MessageId>,
    ) -> Result<MessageId, ApiError> {
        let message = self.next_id();
        self.record(Call::Photo {
            chat: chat_id,
            message,
            caption: caption.to_string(),
            keyboard: keyboard.clone(),
        });
        Ok(message)
    }

    async fn edit_message_caption(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        caption: &str,
        _keyboard: &InlineKeyboard,
    ) -> Result<(), ApiError> {
        self.record(Call::EditCaption {
            chat: chat_id,
            message: message_id,
            caption: caption.to_string(),
        });
        match self.edit_failure.lock().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn delete_messages(&self, chat_id: ChatId, message_ids: &[MessageId]) -> Result<(), ApiError> {
        self.record(Call::Delete {
            chat: chat_id,
            ids: message_ids.to_vec(),
        });
        Ok(())
    }

    async fn answer_callback(&self, query_id: i64, text: &str, show_alert: bool) -> Result<(), ApiError> {
        self.record(Call::Answer {
            query: query_id,
            text: text.to_string(),
            alert: show_alert,
        });
        Ok(())
    }

    async fn process_join_request(&self, group_id: i64, user_id: i64, approve: bool) -> Result<(), ApiError> {
        self.record(Call::JoinRequest {
            group: group_id,
            user: user_id,
            approve,
        });
        match self.join_failure.lock().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn resolve_user(&self, user_id: i64) -> Result<UserInfo, ApiError> {
        Ok(UserInfo {
            user_id,
            name: format!("user{user_id}"),
        })
    }

    async fn resolve_group(&self, group_id: i64) -> Result<GroupInfo, ApiError> {
        Ok(GroupInfo {
            group_id,
            name: format!("group{group_id}"),
        })
    }
}

/// Memory store whose session writes can be made to fail
#[derive(Default)]
pub(crate) struct FakeStore {
    inner: MemoryStore,
    fail_session_writes: AtomicBool,
}

impl FakeStore {
    pub(crate) fn fail_session_writes(&self, fail: bool) {
        self.fail_session_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl KvStore for FakeStore {
    async fn get(&self, kind: RecordKind, key: i64) -> Result<Option<Vec<u8>>, GateError> {
        self.inner.get(kind, key).await
    }

    async fn put(&self, kind: RecordKind, key: i64, value: &[u8]) -> Result<(), GateError> {
        if kind == RecordKind::Session && self.fail_session_writes.load(Ordering::SeqCst) {
            return Err(GateError::Store("connection reset".into()));
        }
        self.inner.put(kind, key, value).await
    }

    async fn delete(&self, kind: RecordKind, key: i64) -> Result<(), GateError> {
        self.inner.delete(kind, key).await
    }

    async fn next_sequence(&self) -> Result<i32, GateError> {
        self.inner.next_sequence().await
    }
}

/// Limits loose enough to stay out of the way of a test
pub(crate) fn relaxed_rate_limit() -> RateLimitConfig {
    RateLimitConfig {
        new_challenge_capacity: 100,
        new_challenge_refill_ms: 60_000,
        callback_capacity: 100,
        callback_refill_ms: 60_000,
        command_capacity: 100,
        command_refill_ms: 60_000,
        anti_shock_capacity: 1_000,
        anti_shock_refill_ms: 60_000,
    }
}

/// Chemistry stub: every record parses to the same drawing
pub(crate) struct FakeChemistry {
    chiral_atoms: Vec<u32>,
    highlighted: Arc<Mutex<Vec<u32>>>,
}

impl FakeChemistry {
    pub(crate) fn new(chiral_atoms: Vec<u32>) -> Self {
        Self {
            chiral_atoms,
            highlighted: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Atoms highlighted by the most recent render
    pub(crate) fn last_highlighted(&self) -> Vec<u32> {
        self.highlighted.lock().clone()
    }
}

impl ChemistryToolkit for FakeChemistry {
    fn parse(&self, record: &str) -> Result<Box<dyn Molecule>, GateError> {
        if record.is_empty() {
            return Err(GateError::Chemistry("empty record".into()));
        }
        Ok(Box::new(FakeMolecule {
            chiral_atoms: self.chiral_atoms.clone(),
            highlighted: Arc::clone(&self.highlighted),
        }))
    }
}

struct FakeMolecule {
    chiral_atoms: Vec<u32>,
    highlighted: Arc<Mutex<Vec<u32>>>,
}

/// Atom positions in a 720x432 drawing: cell A1 and cell C2
const COORDINATES: [(f32, f32); 2] = [(10.0, 10.0), (300.0, 200.0)];

impl Molecule for FakeMolecule {
    fn chiral_centers(&self) -> Result<Vec<u32>, GateError> {
        Ok(self.chiral_atoms.clone())
    }

    fn render(&self, request: &RenderRequest) -> Result<RenderedImage, GateError> {
        *self.highlighted.lock() = request.highlighted_atoms.clone();
        Ok(RenderedImage {
            png: vec![0x89, b'P', b'N', b'G'],
            width: request.size,
            height: request.size * 3 / 5,
        })
    }

    fn atom_coordinate(&self, _request: &RenderRequest, atom: u32) -> Result<(f32, f32), GateError> {
        COORDINATES
            .get(atom as usize)
            .copied()
            .ok_or_else(|| GateError::Chemistry(format!("no atom {atom}")))
    }
}

/// Engine wired to fakes, an in-memory store and a three-compound library
pub(crate) struct Harness {
    pub(crate) engine: VerificationEngine,
    pub(crate) messenger: Arc<FakeMessenger>,
    pub(crate) chemistry: Arc<FakeChemistry>,
    pub(crate) store: Arc<FakeStore>,
    pub(crate) user_id: i64,
    groups_dir: TempDir,
    next_incoming_id: AtomicI64,
    next_query_id: AtomicI64,
    _files: Vec<NamedTempFile>,
}

impl Harness {
    pub(crate) async fn new() -> Self {
        Self::build(vec![0, 1], relaxed_rate_limit()).await
    }

    pub(crate) async fn with_chiral_atoms(chiral_atoms: Vec<u32>) -> Self {
        Self::build(chiral_atoms, relaxed_rate_limit()).await
    }

    pub(crate) async fn with_rate_limit(rate_limit: RateLimitConfig) -> Self {
        Self::build(vec![0, 1], rate_limit).await
    }

    async fn build(chiral_atoms: Vec<u32>, rate_limit: RateLimitConfig) -> Self {
        let (library, files) = library_fixture().await;
        let groups_dir = tempfile::tempdir().unwrap();
        let messenger = Arc::new(FakeMessenger::new());
        let chemistry = Arc::new(FakeChemistry::new(chiral_atoms));
        let store = Arc::new(FakeStore::default());

        let client: Arc<dyn MessagingClient> = messenger.clone();
        let engine = VerificationEngine::new(EngineParts {
            repository: SessionRepository::new(store.clone(), GroupDefaultsConfig::default()),
            library: Arc::new(library),
            preapproval: Arc::new(PreApprovalList::new(groups_dir.path())),
            client: client.clone(),
            chemistry: chemistry.clone(),
            audit: Arc::new(ChannelAudit::new(client, 0)),
            bot_user_id: BOT_USER_ID,
            challenge: ChallengeConfig::default(),
            rate_limit,
        });

        Self {
            engine,
            messenger,
            chemistry,
            store,
            user_id: USER_ID,
            groups_dir,
            next_incoming_id: AtomicI64::new(1),
            next_query_id: AtomicI64::new(1),
            _files: files,
        }
    }

    pub(crate) fn user(&self) -> UserInfo {
        UserInfo {
            user_id: self.user_id,
            name: format!("user{}", self.user_id),
        }
    }

    pub(crate) fn group(&self) -> GroupInfo {
        GroupInfo {
            group_id: GROUP_ID,
            name: format!("group{GROUP_ID}"),
        }
    }

    pub(crate) async fn session(&self) -> Option<UserAuthSession> {
        self.engine.repository().get_session(self.user_id).await.unwrap()
    }

    /// Write the pre-approval list of the harness group
    pub(crate) fn pre_approve(&self, user_ids: &[i64]) {
        let mut ids: Vec<u64> = user_ids.iter().map(|id| *id as u64).collect();
        ids.sort_unstable();
        let path = PreApprovalList::new(self.groups_dir.path()).list_path(GROUP_ID);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let bytes: Vec<u8> = ids.iter().flat_map(|id| id.to_be_bytes()).collect();
        std::fs::write(path, bytes).unwrap();
    }

    /// Private message from the harness user
    pub(crate) fn command(&self, text: &str) -> IncomingMessage {
        IncomingMessage {
            chat_id: self.user_id,
            message_id: self.next_incoming_id.fetch_add(1, Ordering::SeqCst),
            sender: self.user(),
            text: text.to_string(),
            is_private: true,
        }
    }

    pub(crate) fn callback(&self, data: &str) -> CallbackQuery {
        CallbackQuery {
            query_id: self.next_query_id.fetch_add(1, Ordering::SeqCst),
            chat_id: self.user_id,
            sender_id: self.user_id,
            data: data.to_string(),
        }
    }

    pub(crate) async fn click_region(&self, session: &UserAuthSession, id: u8, selected: bool) {
        let payload = ButtonPayload::for_region(session.current_challenge_id, Region::unpack(id), selected);
        self.engine
            .handle_callback_query(&self.callback(&payload.to_callback_data()))
            .await;
    }

    pub(crate) async fn click_submit(&self, session: &UserAuthSession) {
        let payload = ButtonPayload::new(session.current_challenge_id, false, ButtonCommand::Submit, 0);
        self.engine
            .handle_callback_query(&self.callback(&payload.to_callback_data()))
            .await;
    }

    /// `/cc1` without a join request; returns the stored session
    pub(crate) async fn start_self_test(&self) -> UserAuthSession {
        self.engine.handle_private_message(&self.command("/cc1")).await;
        self.session().await.unwrap()
    }

    /// Join request followed by `/ccg`; returns the stored session
    pub(crate) async fn start_group_challenge(&self) -> UserAuthSession {
        let handled = self
            .engine
            .handle_join_request(self.user_id, &self.group())
            .await
            .unwrap();
        assert!(handled);
        self.engine.handle_private_message(&self.command("/ccg")).await;
        self.session().await.unwrap()
    }
}
