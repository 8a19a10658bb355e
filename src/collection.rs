//! Local snapshot of one backend-owned resource, kept in step with the
//! backend by reconciling each mutation's outcome instead of re-fetching.
//!
//! `RemoteCollection` covers keyed lists (bookings, reels, gallery, bento,
//! feedback); `RemoteDocument` covers singleton documents (pricing, room
//! image sets). Both follow the same rules:
//! - a failed call leaves the cached value exactly as it was;
//! - a successful call splices the backend's answer into the cache;
//! - at most one mutation per record (or per document) is in flight, and the
//!   marker is cleared however the call ends, including when the future is
//!   dropped half-way.
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::model::Keyed;

/// Backend operations for one keyed resource. Only `list` is mandatory;
/// the rest default to `Unsupported`.
#[async_trait]
pub trait CollectionSource: Send + Sync {
    type Item: Keyed + Clone + Send + Sync + 'static;
    type Draft: Send + 'static;
    type Patch: Send + 'static;

    fn name(&self) -> &'static str;

    async fn list(&self) -> ApiResult<Vec<Self::Item>>;

    async fn create(&self, _draft: Self::Draft) -> ApiResult<Self::Item> {
        Err(ApiError::Unsupported("create"))
    }

    /// Returns the record as it should appear after the change.
    async fn update(&self, _current: &Self::Item, _patch: Self::Patch) -> ApiResult<Self::Item> {
        Err(ApiError::Unsupported("update"))
    }

    async fn delete(&self, _current: &Self::Item) -> ApiResult<()> {
        Err(ApiError::Unsupported("delete"))
    }
}

/// Yes/no prompt shown before destructive actions.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Placement {
    Front,
    #[default]
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pending {
    Updating,
    Deleting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Declined,
}

struct ListState<T> {
    items: Vec<Arc<T>>,
    pending: HashMap<String, Pending>,
}

pub struct RemoteCollection<S: CollectionSource> {
    source: S,
    state: Mutex<ListState<S::Item>>,
}

/// Clears a record's in-flight marker when dropped.
struct PendingGuard<'a, T> {
    state: &'a Mutex<ListState<T>>,
    id: String,
}

impl<T> Drop for PendingGuard<'_, T> {
    fn drop(&mut self) {
        lock(self.state).pending.remove(&self.id);
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<S: CollectionSource> RemoteCollection<S> {
    /// Starts empty; call `load` to fill it.
    pub fn new(source: S) -> Self {
        Self {
            source,
            state: Mutex::new(ListState {
                items: Vec::new(),
                pending: HashMap::new(),
            }),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn items(&self) -> Vec<Arc<S::Item>> {
        lock(&self.state).items.clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.state).items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &str) -> Option<Arc<S::Item>> {
        lock(&self.state)
            .items
            .iter()
            .find(|item| item.key() == id)
            .cloned()
    }

    pub fn pending(&self, id: &str) -> Option<Pending> {
        lock(&self.state).pending.get(id).copied()
    }

    /// Replace the snapshot with a full listing. On failure the previous
    /// snapshot stays; there is no automatic retry.
    pub async fn load(&self) -> ApiResult<usize> {
        match self.source.list().await {
            Ok(items) => {
                let count = items.len();
                lock(&self.state).items = items.into_iter().map(Arc::new).collect();
                info!(resource = self.source.name(), count, "collection loaded");
                Ok(count)
            }
            Err(err) => {
                warn!(resource = self.source.name(), error = %err, "load failed; keeping previous snapshot");
                Err(err)
            }
        }
    }

    pub async fn create(&self, draft: S::Draft, placement: Placement) -> ApiResult<Arc<S::Item>> {
        let created = match self.source.create(draft).await {
            Ok(item) => Arc::new(item),
            Err(err) => {
                warn!(resource = self.source.name(), error = %err, "create failed");
                return Err(err);
            }
        };
        let mut state = lock(&self.state);
        match placement {
            Placement::Front => state.items.insert(0, created.clone()),
            Placement::Back => state.items.push(created.clone()),
        }
        debug!(resource = self.source.name(), id = created.key(), "record created");
        Ok(created)
    }

    pub async fn update(&self, id: &str, patch: S::Patch) -> ApiResult<Arc<S::Item>> {
        let (current, guard) = self.begin(id, Pending::Updating)?;
        let result = self.source.update(&current, patch).await;
        drop(guard);

        let updated = match result {
            Ok(item) => Arc::new(item),
            Err(err) => {
                warn!(resource = self.source.name(), id, error = %err, "update failed");
                return Err(err);
            }
        };
        let mut state = lock(&self.state);
        if let Some(slot) = state.items.iter_mut().find(|item| item.key() == id) {
            *slot = updated.clone();
        }
        debug!(resource = self.source.name(), id, "record updated");
        Ok(updated)
    }

    /// Ask first; a declined prompt sends nothing.
    pub async fn delete(&self, id: &str, confirm: &dyn Confirm) -> ApiResult<DeleteOutcome> {
        self.check_idle(id)?;
        if !confirm.confirm(&format!("Delete {} {}?", self.source.name(), id)) {
            debug!(resource = self.source.name(), id, "delete declined");
            return Ok(DeleteOutcome::Declined);
        }

        let (current, guard) = self.begin(id, Pending::Deleting)?;
        let result = self.source.delete(&current).await;
        drop(guard);

        if let Err(err) = result {
            warn!(resource = self.source.name(), id, error = %err, "delete failed");
            return Err(err);
        }
        lock(&self.state).items.retain(|item| item.key() != id);
        info!(resource = self.source.name(), id, "record deleted");
        Ok(DeleteOutcome::Deleted)
    }

    fn check_idle(&self, id: &str) -> ApiResult<Arc<S::Item>> {
        idle_record(&lock(&self.state), id)
    }

    /// Check and mark under one lock so two callers cannot both start.
    fn begin(
        &self,
        id: &str,
        kind: Pending,
    ) -> ApiResult<(Arc<S::Item>, PendingGuard<'_, S::Item>)> {
        let mut state = lock(&self.state);
        let current = idle_record(&state, id)?;
        state.pending.insert(id.to_string(), kind);
        drop(state);
        Ok((
            current,
            PendingGuard {
                state: &self.state,
                id: id.to_string(),
            },
        ))
    }
}

fn idle_record<T: Keyed>(state: &ListState<T>, id: &str) -> ApiResult<Arc<T>> {
    if state.pending.contains_key(id) {
        return Err(ApiError::Busy(id.to_string()));
    }
    state
        .items
        .iter()
        .find(|item| item.key() == id)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(id.to_string()))
}

/// Backend operations for a singleton document.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    type Doc: Clone + Send + Sync + 'static;

    fn name(&self) -> &'static str;

    async fn fetch(&self) -> ApiResult<Self::Doc>;

    /// Returns the document as it should appear after the save. Sources that
    /// only change through narrower writes keep the default.
    async fn save(&self, _doc: &Self::Doc) -> ApiResult<Self::Doc> {
        Err(ApiError::Unsupported("save"))
    }
}

struct DocState<D> {
    doc: Option<Arc<D>>,
    busy: bool,
}

pub struct RemoteDocument<S: DocumentSource> {
    source: S,
    state: Mutex<DocState<S::Doc>>,
}

struct BusyGuard<'a, D> {
    state: &'a Mutex<DocState<D>>,
}

impl<D> Drop for BusyGuard<'_, D> {
    fn drop(&mut self) {
        lock(self.state).busy = false;
    }
}

impl<S: DocumentSource> RemoteDocument<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            state: Mutex::new(DocState {
                doc: None,
                busy: false,
            }),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn current(&self) -> Option<Arc<S::Doc>> {
        lock(&self.state).doc.clone()
    }

    pub fn is_busy(&self) -> bool {
        lock(&self.state).busy
    }

    pub async fn load(&self) -> ApiResult<Arc<S::Doc>> {
        match self.source.fetch().await {
            Ok(doc) => {
                let doc = Arc::new(doc);
                lock(&self.state).doc = Some(doc.clone());
                info!(resource = self.source.name(), "document loaded");
                Ok(doc)
            }
            Err(err) => {
                warn!(resource = self.source.name(), error = %err, "load failed; keeping previous document");
                Err(err)
            }
        }
    }

    pub async fn save(&self, doc: S::Doc) -> ApiResult<Arc<S::Doc>> {
        let source = &self.source;
        self.apply(|_| async move { source.save(&doc).await }).await
    }

    /// Run one mutation against the loaded document. `op` gets the current
    /// value and returns the value to cache once the backend accepted it.
    pub async fn apply<F, Fut>(&self, op: F) -> ApiResult<Arc<S::Doc>>
    where
        F: FnOnce(Arc<S::Doc>) -> Fut,
        Fut: Future<Output = ApiResult<S::Doc>>,
    {
        let current = {
            let mut state = lock(&self.state);
            if state.busy {
                return Err(ApiError::Busy(self.source.name().to_string()));
            }
            let Some(doc) = state.doc.clone() else {
                return Err(ApiError::NotFound(self.source.name().to_string()));
            };
            state.busy = true;
            doc
        };
        let guard = BusyGuard { state: &self.state };
        let result = op(current).await;
        drop(guard);

        match result {
            Ok(doc) => {
                let doc = Arc::new(doc);
                lock(&self.state).doc = Some(doc.clone());
                debug!(resource = self.source.name(), "document updated");
                Ok(doc)
            }
            Err(err) => {
                warn!(resource = self.source.name(), error = %err, "document change failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use tokio::sync::Mutex as AsyncMutex;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: String,
        label: String,
    }

    impl Keyed for Row {
        fn key(&self) -> &str {
            &self.id
        }
    }

    fn row(id: &str, label: &str) -> Row {
        Row {
            id: id.into(),
            label: label.into(),
        }
    }

    #[derive(Default)]
    struct Scripted {
        lists: AsyncMutex<VecDeque<ApiResult<Vec<Row>>>>,
        fail_mutations: bool,
        calls: AsyncMutex<Vec<String>>,
    }

    #[async_trait]
    impl CollectionSource for Scripted {
        type Item = Row;
        type Draft = Row;
        type Patch = String;

        fn name(&self) -> &'static str {
            "row"
        }

        async fn list(&self) -> ApiResult<Vec<Row>> {
            self.calls.lock().await.push("list".into());
            self.lists
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn create(&self, draft: Row) -> ApiResult<Row> {
            self.calls.lock().await.push(format!("create {}", draft.id));
            if self.fail_mutations {
                return Err(ApiError::validation("rejected"));
            }
            Ok(draft)
        }

        async fn update(&self, current: &Row, patch: String) -> ApiResult<Row> {
            self.calls.lock().await.push(format!("update {}", current.id));
            if self.fail_mutations {
                return Err(ApiError::validation("rejected"));
            }
            Ok(Row {
                id: current.id.clone(),
                label: patch,
            })
        }

        async fn delete(&self, current: &Row) -> ApiResult<()> {
            self.calls.lock().await.push(format!("delete {}", current.id));
            if self.fail_mutations {
                return Err(ApiError::validation("rejected"));
            }
            Ok(())
        }
    }

    async fn loaded(fail_mutations: bool) -> RemoteCollection<Scripted> {
        let source = Scripted {
            lists: AsyncMutex::new(VecDeque::from(vec![Ok(vec![
                row("a", "one"),
                row("b", "two"),
                row("c", "three"),
            ])])),
            fail_mutations,
            ..Default::default()
        };
        let coll = RemoteCollection::new(source);
        coll.load().await.unwrap();
        coll
    }

    fn yes(_: &str) -> bool {
        true
    }

    #[tokio::test]
    async fn failed_load_keeps_previous_snapshot() {
        let coll = loaded(false).await;
        coll.source()
            .lists
            .lock()
            .await
            .push_back(Err(ApiError::validation("offline")));
        let before = coll.items();
        assert!(coll.load().await.is_err());
        let after = coll.items();
        assert_eq!(before.len(), after.len());
        assert!(before.iter().zip(&after).all(|(x, y)| Arc::ptr_eq(x, y)));
    }

    #[tokio::test]
    async fn first_failed_load_leaves_empty() {
        let source = Scripted {
            lists: AsyncMutex::new(VecDeque::from(vec![Err(ApiError::validation("down"))])),
            ..Default::default()
        };
        let coll = RemoteCollection::new(source);
        assert!(coll.load().await.is_err());
        assert!(coll.is_empty());
    }

    #[tokio::test]
    async fn update_replaces_in_place_and_keeps_others() {
        let coll = loaded(false).await;
        let before = coll.items();
        coll.update("b", "TWO".into()).await.unwrap();
        let after = coll.items();
        assert_eq!(after.len(), 3);
        assert_eq!(after[1].label, "TWO");
        assert!(Arc::ptr_eq(&before[0], &after[0]));
        assert!(Arc::ptr_eq(&before[2], &after[2]));
        assert_eq!(coll.pending("b"), None);
    }

    #[tokio::test]
    async fn failed_update_leaves_entry_and_clears_marker() {
        let coll = loaded(true).await;
        assert!(coll.update("a", "nope".into()).await.is_err());
        assert_eq!(coll.get("a").unwrap().label, "one");
        assert_eq!(coll.pending("a"), None);
    }

    #[tokio::test]
    async fn create_respects_placement() {
        let coll = loaded(false).await;
        coll.create(row("z", "front"), Placement::Front).await.unwrap();
        coll.create(row("y", "back"), Placement::Back).await.unwrap();
        let ids: Vec<String> = coll.items().iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec!["z", "a", "b", "c", "y"]);
    }

    #[tokio::test]
    async fn delete_removes_exactly_one() {
        let coll = loaded(false).await;
        let outcome = coll.delete("c", &yes).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Deleted);
        assert_eq!(coll.len(), 2);
        assert!(coll.get("c").is_none());
    }

    #[tokio::test]
    async fn failed_delete_keeps_membership() {
        let coll = loaded(true).await;
        assert!(coll.delete("a", &yes).await.is_err());
        assert_eq!(coll.len(), 3);
        assert!(coll.get("a").is_some());
        assert_eq!(coll.pending("a"), None);
    }

    #[tokio::test]
    async fn declined_delete_sends_nothing() {
        let coll = loaded(false).await;
        let no = |_: &str| false;
        assert_eq!(coll.delete("a", &no).await.unwrap(), DeleteOutcome::Declined);
        assert_eq!(coll.len(), 3);
        assert_eq!(*coll.source().calls.lock().await, vec!["list".to_string()]);
    }

    #[tokio::test]
    async fn unknown_id_is_rejected_without_a_call() {
        let coll = loaded(false).await;
        let err = coll.update("missing", "x".into()).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert_eq!(coll.source().calls.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn second_mutation_on_pending_record_is_busy() {
        let coll = loaded(false).await;
        let (_current, guard) = coll.begin("a", Pending::Updating).unwrap();
        assert_eq!(coll.pending("a"), Some(Pending::Updating));
        let err = coll.delete("a", &yes).await.unwrap_err();
        assert!(matches!(err, ApiError::Busy(_)));
        drop(guard);
        assert_eq!(coll.pending("a"), None);
        coll.delete("a", &yes).await.unwrap();
    }

    struct Doc {
        saves: AsyncMutex<Vec<u32>>,
        fail: bool,
    }

    #[async_trait]
    impl DocumentSource for Doc {
        type Doc = u32;

        fn name(&self) -> &'static str {
            "counter"
        }

        async fn fetch(&self) -> ApiResult<u32> {
            Ok(1)
        }

        async fn save(&self, doc: &u32) -> ApiResult<u32> {
            self.saves.lock().await.push(*doc);
            if self.fail {
                return Err(ApiError::validation("nope"));
            }
            Ok(*doc)
        }
    }

    #[tokio::test]
    async fn document_requires_load_before_save() {
        let doc = RemoteDocument::new(Doc {
            saves: AsyncMutex::new(Vec::new()),
            fail: false,
        });
        assert!(matches!(doc.save(5).await, Err(ApiError::NotFound(_))));
        doc.load().await.unwrap();
        assert_eq!(*doc.save(5).await.unwrap(), 5);
        assert_eq!(doc.current().as_deref(), Some(&5));
        assert!(!doc.is_busy());
    }

    #[tokio::test]
    async fn failed_document_save_keeps_value() {
        let doc = RemoteDocument::new(Doc {
            saves: AsyncMutex::new(Vec::new()),
            fail: true,
        });
        doc.load().await.unwrap();
        assert!(doc.save(9).await.is_err());
        assert_eq!(doc.current().as_deref(), Some(&1));
        assert!(!doc.is_busy());
    }

    #[tokio::test]
    async fn concurrent_begin_marks_once() {
        let coll = loaded(false).await;
        let start = std::sync::Barrier::new(8);
        let held = std::sync::Barrier::new(8);
        let started = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        start.wait();
                        let attempt = coll.begin("a", Pending::Updating);
                        let ok = attempt.is_ok();
                        held.wait();
                        drop(attempt);
                        ok
                    })
                })
                .collect();
            workers
                .into_iter()
                .map(|w| w.join().unwrap())
                .filter(|ok| *ok)
                .count()
        });
        assert_eq!(started, 1);
        assert_eq!(coll.pending("a"), None);
    }

    struct FetchOnly;

    #[async_trait]
    impl DocumentSource for FetchOnly {
        type Doc = u32;

        fn name(&self) -> &'static str {
            "fetch only"
        }

        async fn fetch(&self) -> ApiResult<u32> {
            Ok(3)
        }
    }

    #[tokio::test]
    async fn whole_document_save_is_opt_in() {
        let doc = RemoteDocument::new(FetchOnly);
        doc.load().await.unwrap();
        let err = doc.save(4).await.unwrap_err();
        assert!(matches!(err, ApiError::Unsupported("save")));
        assert_eq!(doc.current().as_deref(), Some(&3));
        assert!(!doc.is_busy());
    }
}
