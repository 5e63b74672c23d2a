//! In-memory tracker for tests. Holds a small board model, applies writes to
//! it, records every call, and fails on demand.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use boardsync_core::remote::{RemoteBoard, RemoteCard, RemoteCredential, RemoteLabel, RemoteList};

use crate::{require_credential, CardFields, ClientError, Operation, RemoteTracker};

/// Which error class an injected failure produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Auth,
    Remote(u16),
    Transport,
}

impl Failure {
    fn into_error(self, operation: Operation) -> ClientError {
        match self {
            Failure::Auth => ClientError::Auth {
                operation,
                message: "mock: token rejected".into(),
            },
            Failure::Remote(status) => ClientError::Remote {
                operation,
                status,
                message: "mock: remote failure".into(),
            },
            Failure::Transport => ClientError::Transport {
                operation,
                message: "mock: connection reset".into(),
            },
        }
    }
}

/// One recorded call: operation plus the id it targeted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: Operation,
    pub target: String,
}

#[derive(Default)]
struct State {
    boards: Vec<RemoteBoard>,
    /// board id -> lists, in board order
    lists: HashMap<String, Vec<RemoteList>>,
    /// list id -> cards, in list order
    cards: HashMap<String, Vec<RemoteCard>>,
    /// board id -> labels
    labels: HashMap<String, Vec<RemoteLabel>>,
    failures: HashMap<(Operation, Option<String>), Failure>,
    calls: Vec<Call>,
    next_id: u64,
}

impl State {
    fn board_of_list(&self, list_id: &str) -> Option<String> {
        self.lists
            .iter()
            .find(|(_, lists)| lists.iter().any(|l| l.id == list_id))
            .map(|(board, _)| board.clone())
    }

    fn find_card_mut(&mut self, card_id: &str) -> Option<(&String, &mut RemoteCard)> {
        self.cards.iter_mut().find_map(|(list, cards)| {
            cards.iter_mut().find(|c| c.id == card_id).map(|c| (list, c))
        })
    }

    fn fresh_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

#[derive(Default)]
pub struct MockTracker {
    state: Mutex<State>,
}

impl MockTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // a panicking test thread should not hide the state from the rest
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_board(self, id: &str, name: &str) -> Self {
        self.state().boards.push(RemoteBoard {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            url: format!("https://trello.com/b/{id}"),
        });
        self
    }

    pub fn with_list(self, board_id: &str, id: &str, name: &str, closed: bool) -> Self {
        self.state()
            .lists
            .entry(board_id.to_string())
            .or_default()
            .push(RemoteList {
                id: id.into(),
                name: name.into(),
                closed,
            });
        self
    }

    pub fn with_card(self, list_id: &str, card: RemoteCard) -> Self {
        self.state()
            .cards
            .entry(list_id.to_string())
            .or_default()
            .push(card);
        self
    }

    pub fn with_label(self, board_id: &str, label: RemoteLabel) -> Self {
        self.state()
            .labels
            .entry(board_id.to_string())
            .or_default()
            .push(label);
        self
    }

    /// Fail every call of `operation`.
    pub fn fail(&self, operation: Operation, failure: Failure) {
        self.state().failures.insert((operation, None), failure);
    }

    /// Fail `operation` only when it targets `target`.
    pub fn fail_for(&self, operation: Operation, target: &str, failure: Failure) {
        self.state()
            .failures
            .insert((operation, Some(target.to_string())), failure);
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Change a card as if someone edited it on the tracker.
    pub fn edit_card(&self, card_id: &str, f: impl FnOnce(&mut RemoteCard)) {
        if let Some((_, card)) = self.state().find_card_mut(card_id) {
            f(card);
        }
    }

    pub fn add_card(&self, list_id: &str, card: RemoteCard) {
        self.state()
            .cards
            .entry(list_id.to_string())
            .or_default()
            .push(card);
    }

    pub fn card(&self, card_id: &str) -> Option<RemoteCard> {
        self.state()
            .cards
            .values()
            .flatten()
            .find(|c| c.id == card_id)
            .cloned()
    }

    pub fn labels(&self, board_id: &str) -> Vec<RemoteLabel> {
        self.state().labels.get(board_id).cloned().unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn count(&self, operation: Operation) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Record the call, then apply any injected failure.
    fn enter(
        &self,
        cred: &RemoteCredential,
        operation: Operation,
        target: &str,
    ) -> Result<MutexGuard<'_, State>, ClientError> {
        require_credential(cred, operation)?;
        let mut state = self.state();
        state.calls.push(Call {
            operation,
            target: target.to_string(),
        });
        let failure = state
            .failures
            .get(&(operation, Some(target.to_string())))
            .or_else(|| state.failures.get(&(operation, None)))
            .copied();
        match failure {
            Some(f) => Err(f.into_error(operation)),
            None => Ok(state),
        }
    }
}

fn not_found(operation: Operation, what: String) -> ClientError {
    ClientError::Remote {
        operation,
        status: 404,
        message: format!("mock: {what} not found"),
    }
}

fn apply_fields(state: &State, card: &mut RemoteCard, fields: &CardFields, board: Option<&str>) {
    if let Some(ref name) = fields.name {
        card.name = name.clone();
    }
    if let Some(ref desc) = fields.desc {
        card.desc = Some(desc.clone());
    }
    if let Some(due) = fields.due {
        card.due = due
            .and_hms_opt(12, 0, 0)
            .map(|dt| Utc.from_utc_datetime(&dt));
    }
    if let Some(closed) = fields.closed {
        card.closed = closed;
    }
    if fields.id_labels.is_some() {
        let known = board
            .and_then(|b| state.labels.get(b))
            .cloned()
            .unwrap_or_default();
        card.labels = fields
            .label_ids()
            .into_iter()
            .filter_map(|id| known.iter().find(|l| l.id == id).cloned())
            .collect();
    }
}

#[async_trait]
impl RemoteTracker for MockTracker {
    async fn fetch_boards(&self, cred: &RemoteCredential) -> Result<Vec<RemoteBoard>, ClientError> {
        let state = self.enter(cred, Operation::FetchBoards, "me")?;
        Ok(state.boards.clone())
    }

    async fn fetch_lists(
        &self,
        cred: &RemoteCredential,
        board_id: &str,
    ) -> Result<Vec<RemoteList>, ClientError> {
        let state = self.enter(cred, Operation::FetchLists, board_id)?;
        Ok(state.lists.get(board_id).cloned().unwrap_or_default())
    }

    async fn fetch_cards(
        &self,
        cred: &RemoteCredential,
        list_id: &str,
    ) -> Result<Vec<RemoteCard>, ClientError> {
        let state = self.enter(cred, Operation::FetchCards, list_id)?;
        Ok(state.cards.get(list_id).cloned().unwrap_or_default())
    }

    async fn fetch_labels(
        &self,
        cred: &RemoteCredential,
        board_id: &str,
    ) -> Result<Vec<RemoteLabel>, ClientError> {
        let state = self.enter(cred, Operation::FetchLabels, board_id)?;
        Ok(state.labels.get(board_id).cloned().unwrap_or_default())
    }

    async fn create_card(
        &self,
        cred: &RemoteCredential,
        list_id: &str,
        fields: &CardFields,
    ) -> Result<RemoteCard, ClientError> {
        let mut state = self.enter(cred, Operation::CreateCard, list_id)?;
        let board = state
            .board_of_list(list_id)
            .ok_or_else(|| not_found(Operation::CreateCard, format!("list {list_id}")))?;
        let id = state.fresh_id("card");
        let mut card = RemoteCard {
            id: id.clone(),
            name: String::new(),
            desc: None,
            due: None,
            closed: false,
            labels: Vec::new(),
            short_url: Some(format!("https://trello.com/c/{id}")),
            id_list: Some(list_id.to_string()),
        };
        apply_fields(&state, &mut card, fields, Some(board.as_str()));
        state
            .cards
            .entry(list_id.to_string())
            .or_default()
            .push(card.clone());
        Ok(card)
    }

    async fn update_card(
        &self,
        cred: &RemoteCredential,
        card_id: &str,
        fields: &CardFields,
    ) -> Result<RemoteCard, ClientError> {
        let mut state = self.enter(cred, Operation::UpdateCard, card_id)?;
        let (list_id, mut card) = state
            .find_card_mut(card_id)
            .map(|(list, card)| (list.clone(), card.clone()))
            .ok_or_else(|| not_found(Operation::UpdateCard, format!("card {card_id}")))?;
        let board = state.board_of_list(&list_id);
        apply_fields(&state, &mut card, fields, board.as_deref());
        if let Some((_, stored)) = state.find_card_mut(card_id) {
            *stored = card.clone();
        }
        Ok(card)
    }

    async fn delete_card(&self, cred: &RemoteCredential, card_id: &str) -> Result<(), ClientError> {
        let mut state = self.enter(cred, Operation::DeleteCard, card_id)?;
        let mut removed = false;
        for cards in state.cards.values_mut() {
            let before = cards.len();
            cards.retain(|c| c.id != card_id);
            removed |= cards.len() != before;
        }
        if removed {
            Ok(())
        } else {
            Err(not_found(Operation::DeleteCard, format!("card {card_id}")))
        }
    }

    async fn create_label(
        &self,
        cred: &RemoteCredential,
        board_id: &str,
        name: &str,
        color: &str,
    ) -> Result<RemoteLabel, ClientError> {
        let mut state = self.enter(cred, Operation::CreateLabel, board_id)?;
        let label = RemoteLabel {
            id: state.fresh_id("label"),
            name: name.to_string(),
            color: Some(color.to_string()),
        };
        state
            .labels
            .entry(board_id.to_string())
            .or_default()
            .push(label.clone());
        Ok(label)
    }
}
