//! Offline-aware synchronization engine
//!
//! The [`SyncEngine`] is the single owner of the tag set, the photo cache
//! and the pending-operations queue. Every read and write goes through it.
//!
//! ## Mutation Flow
//!
//! 1. **Optimistic step** (under the state lock): validate, pick the slot,
//!    write the photo to the cache and the local store. The caller gets a
//!    [`MutationHandle`] as soon as this step is done.
//! 2. **Remote step** (on the slot's lane): upload the photo, then insert
//!    or update the tag.
//! 3. **Settle** (under the state lock), by [`RemoteOutcome`]:
//!    - success: apply the tag
//!    - connectivity failure: apply the tag and queue a [`SyncItem`]
//!    - hard failure: roll the photo back and notify the user
//!
//! ## Replay
//!
//! Queued items are resubmitted in FIFO order when the network comes back
//! and the server answers, or on every tick of the periodic server check.
//! A connectivity failure ends the cycle; any other failure abandons the
//! item.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::ControlFlow;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use phototag_core::config::Config;
use phototag_core::domain::{
    Credentials, DomainError, PhotoPayload, SyncItem, SyncOperation, TagEntry, TagSet, UserId,
    UserProfile, DELETED_PHOTO,
};
use phototag_core::ports::{
    keys, ILocalStore, INotificationService, IRemoteClient, Notification, RemoteOutcome,
};

use crate::connectivity::ConnectivityMonitor;
use crate::lanes::SlotLanes;
use crate::queue::PendingQueue;
use crate::scheduler::ServerCheck;
use crate::SyncError;

/// Filename to payload map shared with subscribers
pub type PhotoMap = Arc<BTreeMap<String, PhotoPayload>>;

/// Notice shown when a publish is refused
const UPLOAD_FAILED: &str = "Could not upload post";

/// Notice shown when an update is refused
const CHANGE_FAILED: &str = "Could not change post";

// ============================================================================
// Public types
// ============================================================================

/// Engine settings
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Interval of the periodic server check
    pub server_check_interval: Duration,
    /// Identity to use instead of the one stored under `userId`
    pub user_id: Option<UserId>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            server_check_interval: Duration::from_secs(10),
            user_id: None,
        }
    }
}

impl EngineOptions {
    /// Derives engine settings from the configuration file
    pub fn from_config(config: &Config) -> Result<Self, SyncError> {
        let user_id = config
            .account
            .user_id
            .as_deref()
            .map(UserId::new)
            .transpose()?;
        Ok(Self {
            server_check_interval: config.server_check_interval(),
            user_id,
        })
    }
}

/// How `update` treats the slot's photo
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoChange {
    /// Leave the photo as it is
    Keep,
    /// Mark the slot deleted
    Delete,
    /// Upload a new photo for the slot
    Replace(PhotoPayload),
}

impl PhotoChange {
    /// Interprets the wire convention: `""` keeps, `"na"` deletes,
    /// anything else is a base64 payload
    pub fn from_wire(photo: &str) -> Result<Self, DomainError> {
        match photo {
            "" => Ok(PhotoChange::Keep),
            DELETED_PHOTO => Ok(PhotoChange::Delete),
            other => Ok(PhotoChange::Replace(PhotoPayload::new(other)?)),
        }
    }
}

/// Final state of a mutation once the server has answered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum MutationStatus {
    /// The server accepted the mutation
    Synced,
    /// The server was unreachable; the mutation waits in the queue
    Queued(SyncOperation),
    /// The server refused the mutation; local changes were undone
    RolledBack(String),
}

/// Outcome of a mutation for one slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationOutcome {
    pub slot: usize,
    #[serde(flatten)]
    pub status: MutationStatus,
}

/// Completion handle returned by [`SyncEngine::publish`] and
/// [`SyncEngine::update`]
///
/// Dropping the handle does not cancel the mutation.
#[derive(Debug)]
pub struct MutationHandle {
    slot: usize,
    rx: oneshot::Receiver<MutationOutcome>,
}

impl MutationHandle {
    /// Slot the mutation targets
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Waits for the remote step to settle
    pub async fn outcome(self) -> Result<MutationOutcome, SyncError> {
        self.rx.await.map_err(|_| SyncError::ShuttingDown)
    }
}

/// Summary of one replay cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    /// Items the server confirmed
    pub synced: usize,
    /// Items removed without a remote call (photo or slot missing)
    pub dropped: usize,
    /// Items the server refused; removed and not retried
    pub abandoned: usize,
    /// The cycle stopped early because the server became unreachable
    pub still_offline: bool,
    /// The cycle stopped early because local state was unusable
    pub halted: Option<String>,
    /// Items left in the queue after the cycle
    pub remaining: usize,
}

impl ReplayReport {
    /// Returns true if the cycle made no remote calls and changed nothing
    pub fn is_empty(&self) -> bool {
        self.synced == 0 && self.dropped == 0 && self.abandoned == 0 && !self.still_offline
    }
}

/// Snapshot of the engine for status displays
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub user_id: Option<String>,
    pub tags_loaded: bool,
    /// Non-deleted slots
    pub live_slots: usize,
    /// `numberOfTags`
    pub allocated_slots: usize,
    pub cached_photos: usize,
    pub pending: Vec<SyncItem>,
    pub network_available: bool,
    pub server_check_armed: bool,
    /// Seconds between periodic server checks
    pub server_check_interval_secs: u64,
    pub last_replay: Option<DateTime<Utc>>,
}

// ============================================================================
// Internal state
// ============================================================================

/// Everything guarded by the state lock
#[derive(Debug)]
struct EngineState {
    user: Option<UserId>,
    tags: Option<TagSet>,
    photos: PhotoMap,
    queue: PendingQueue,
    /// Slots allocated by publishes that have not settled yet
    reserved: BTreeSet<usize>,
    last_replay: Option<DateTime<Utc>>,
}

impl EngineState {
    fn require_user(&self) -> Result<UserId, SyncError> {
        self.user
            .clone()
            .ok_or_else(|| SyncError::Configuration("no user id is known; sign in first".into()))
    }
}

/// Remote step of a publish or update
#[derive(Debug)]
struct MutationJob {
    user: UserId,
    slot: usize,
    file_name: String,
    entry: TagEntry,
    /// Photo to upload before the tag call
    photo: Option<PhotoPayload>,
    /// Cache entry the optimistic photo write replaced
    previous: Option<PhotoPayload>,
    /// Insert a fresh tag rather than update an existing slot
    insert: bool,
    /// Slot was reserved by the optimistic step
    reserved: bool,
    /// Operation queued on a connectivity failure
    queued_op: SyncOperation,
    /// Notice shown on a hard failure
    failure_notice: &'static str,
}

/// Result of replaying one item
#[derive(Debug)]
enum ReplayStep {
    Synced,
    Dropped,
    Abandoned,
    Offline,
    Halted(String),
}

struct EngineCore {
    store: Arc<dyn ILocalStore + Send + Sync>,
    remote: Arc<dyn IRemoteClient + Send + Sync>,
    notifier: Arc<dyn INotificationService + Send + Sync>,
    connectivity: Arc<ConnectivityMonitor>,
    state: Mutex<EngineState>,
    lanes: SlotLanes,
    server_check: ServerCheck,
    /// Serializes replay cycles
    replay_lock: Mutex<()>,
    tags_tx: watch::Sender<Option<TagSet>>,
    photos_tx: watch::Sender<PhotoMap>,
    self_ref: Weak<EngineCore>,
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Owner of the tag set, photo cache and pending queue
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct SyncEngine {
    core: Arc<EngineCore>,
}

impl SyncEngine {
    /// Opens the engine, restoring state from the local store
    ///
    /// Restores the user identity (unless `options.user_id` overrides it),
    /// the pending queue, the tag set snapshot and the cached photos of
    /// live slots. Nothing is fetched from the server.
    pub async fn open(
        store: Arc<dyn ILocalStore + Send + Sync>,
        remote: Arc<dyn IRemoteClient + Send + Sync>,
        notifier: Arc<dyn INotificationService + Send + Sync>,
        connectivity: Arc<ConnectivityMonitor>,
        options: EngineOptions,
    ) -> Result<Self, SyncError> {
        let user = match options.user_id {
            Some(user) => Some(user),
            None => load_user_id(store.as_ref()).await?,
        };
        let queue = PendingQueue::load(store.as_ref()).await?;
        let tags = load_tags_snapshot(store.as_ref()).await?;

        let mut photos = BTreeMap::new();
        if let Some(tags) = &tags {
            for name in tags.live_file_names() {
                if let Some(photo) = load_photo(store.as_ref(), &name).await? {
                    photos.insert(name, photo);
                }
            }
        }
        let photos: PhotoMap = Arc::new(photos);

        info!(
            user = ?user.as_ref().map(UserId::as_str),
            tags_loaded = tags.is_some(),
            cached_photos = photos.len(),
            pending = queue.len(),
            "Sync engine opened"
        );

        let (tags_tx, _) = watch::channel(tags.clone());
        let (photos_tx, _) = watch::channel(photos.clone());
        let state = EngineState {
            user,
            tags,
            photos,
            queue,
            reserved: BTreeSet::new(),
            last_replay: None,
        };

        let core = Arc::new_cyclic(|self_ref| EngineCore {
            store,
            remote,
            notifier,
            connectivity,
            state: Mutex::new(state),
            lanes: SlotLanes::new(),
            server_check: ServerCheck::new(options.server_check_interval),
            replay_lock: Mutex::new(()),
            tags_tx,
            photos_tx,
            self_ref: self_ref.clone(),
        });

        Ok(Self { core })
    }

    // --- Reads ---

    /// Returns the tag set, loading it if needed
    ///
    /// Uses the in-memory set, then the local snapshot, then the server.
    /// A server fetch is persisted as the new snapshot.
    #[tracing::instrument(skip(self))]
    pub async fn get_tags(&self) -> Result<TagSet, SyncError> {
        self.core.get_tags().await
    }

    /// Returns the photo cache, downloading missing photos of live slots
    ///
    /// Downloads only happen while the network is available; failures are
    /// logged and the photo is left out.
    #[tracing::instrument(skip(self))]
    pub async fn get_photos(&self) -> Result<PhotoMap, SyncError> {
        self.core.get_photos().await
    }

    /// Subscribes to tag set changes
    pub fn subscribe_tags(&self) -> watch::Receiver<Option<TagSet>> {
        self.core.tags_tx.subscribe()
    }

    /// Subscribes to photo cache changes
    pub fn subscribe_photos(&self) -> watch::Receiver<PhotoMap> {
        self.core.photos_tx.subscribe()
    }

    /// Returns the queued items in replay order
    pub async fn pending(&self) -> Vec<SyncItem> {
        self.core.state.lock().await.queue.snapshot()
    }

    /// Reports the current engine state
    pub async fn status(&self) -> EngineStatus {
        let st = self.core.state.lock().await;
        EngineStatus {
            user_id: st.user.as_ref().map(|u| u.as_str().to_string()),
            tags_loaded: st.tags.is_some(),
            live_slots: st.tags.as_ref().map_or(0, TagSet::live_count),
            allocated_slots: st.tags.as_ref().map_or(0, TagSet::number_of_tags),
            cached_photos: st.photos.len(),
            pending: st.queue.snapshot(),
            network_available: self.core.connectivity.is_available(),
            server_check_armed: self.core.server_check.is_armed(),
            server_check_interval_secs: self.core.server_check.interval().as_secs(),
            last_replay: st.last_replay,
        }
    }

    /// Returns true while the periodic server check is running
    pub fn is_server_check_armed(&self) -> bool {
        self.core.server_check.is_armed()
    }

    /// Asks the server's liveness endpoint whether it answers
    pub async fn is_server_reachable(&self) -> bool {
        self.core.remote.is_server_reachable().await
    }

    /// Returns the connectivity monitor the engine listens to
    pub fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
        &self.core.connectivity
    }

    // --- Mutations ---

    /// Stores the user identity and persists it under `userId`
    pub async fn set_user_id(&self, user: UserId) -> Result<(), SyncError> {
        let mut st = self.core.state.lock().await;
        self.core
            .store
            .put(keys::USER_ID, user.as_str().as_bytes())
            .await?;
        info!(user = %user, "User id set");
        st.user = Some(user);
        Ok(())
    }

    /// Signs in and makes the returned user the current identity
    ///
    /// The profile is persisted under `userDetails` and the id under
    /// `userId`. Switching to a different user is refused while posts are
    /// queued; otherwise the previous user's tag set and photos are
    /// dropped from memory and the tag snapshot is deleted.
    #[tracing::instrument(skip(self, credentials), fields(email = credentials.email()))]
    pub async fn login(&self, credentials: &Credentials) -> Result<UserProfile, SyncError> {
        let profile = self.core.remote.login(credentials).await?;
        let user = profile.user_id()?;

        let mut st = self.core.state.lock().await;
        let other_user = st.user.as_ref().is_some_and(|current| *current != user);
        let other_tags = st.tags.as_ref().is_some_and(|tags| tags.id != user.as_str());
        let switching = other_user || other_tags;
        if switching {
            if !st.queue.is_empty() {
                return Err(SyncError::Configuration(format!(
                    "{} post(s) are not synced yet; sync them before switching users",
                    st.queue.len()
                )));
            }
            self.core.store.delete(keys::TAGS).await?;
            st.tags = None;
            st.photos = Arc::new(BTreeMap::new());
            self.core.publish_tags(&st);
            self.core.publish_photos(&st);
        }

        let json = serde_json::to_vec(&profile).map_err(anyhow::Error::from)?;
        self.core.store.put(keys::PROFILE, &json).await?;
        self.core
            .store
            .put(keys::USER_ID, user.as_str().as_bytes())
            .await?;
        info!(user = %user, switching, "Signed in");
        st.user = Some(user);
        Ok(profile)
    }

    /// Forgets the signed-in user
    ///
    /// Removes the stored identity and profile. Refused while posts are
    /// queued, since replaying them needs the identity.
    pub async fn logout(&self) -> Result<(), SyncError> {
        let mut st = self.core.state.lock().await;
        if !st.queue.is_empty() {
            return Err(SyncError::Configuration(format!(
                "{} post(s) are not synced yet; sync them before signing out",
                st.queue.len()
            )));
        }
        self.core.store.delete(keys::USER_ID).await?;
        self.core.store.delete(keys::PROFILE).await?;
        st.user = None;
        info!("Signed out");
        Ok(())
    }

    /// Returns the stored profile of the signed-in user, if any
    pub async fn profile(&self) -> Result<Option<UserProfile>, SyncError> {
        let Some(bytes) = self.core.store.get(keys::PROFILE).await? else {
            return Ok(None);
        };
        match UserProfile::from_json(&bytes) {
            Ok(profile) => Ok(Some(profile)),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable stored profile");
                Ok(None)
            }
        }
    }

    /// Publishes a new post into the first empty slot
    ///
    /// Returns once the photo is cached locally; the handle resolves when
    /// the server has answered.
    #[tracing::instrument(skip(self, photo))]
    pub async fn publish(
        &self,
        photo: PhotoPayload,
        description: &str,
        location: &str,
        people: &str,
    ) -> Result<MutationHandle, SyncError> {
        self.core
            .publish(
                photo,
                description.to_string(),
                location.to_string(),
                people.to_string(),
            )
            .await
    }

    /// Updates the post in `slot`
    ///
    /// See [`PhotoChange`] for how the photo is treated. Returns once the
    /// local step is done; the handle resolves when the server has
    /// answered.
    #[tracing::instrument(skip(self, change))]
    pub async fn update(
        &self,
        slot: usize,
        description: &str,
        change: PhotoChange,
        location: &str,
        people: &str,
    ) -> Result<MutationHandle, SyncError> {
        self.core
            .update(
                slot,
                description.to_string(),
                change,
                location.to_string(),
                people.to_string(),
            )
            .await
    }

    /// Marks the post in `slot` deleted
    pub async fn delete(&self, slot: usize) -> Result<MutationHandle, SyncError> {
        let current = {
            let st = self.core.state.lock().await;
            let tags = st.tags.as_ref().ok_or(SyncError::TagsNotLoaded)?;
            tags.require_entry(slot)?
        };
        self.update(
            slot,
            &current.description,
            PhotoChange::Delete,
            &current.location,
            &current.people,
        )
        .await
    }

    // --- Replay and connectivity ---

    /// Resubmits every queued item once, in order
    ///
    /// Concurrent calls wait for the running cycle and then replay
    /// whatever is left. An empty queue makes no remote calls. Fails with
    /// [`SyncError::TagsNotLoaded`] while items are queued but no tag set
    /// is loaded; the queue is left untouched. If items remain afterwards
    /// and the network is available, the periodic server check is armed.
    #[tracing::instrument(skip(self))]
    pub async fn replay(&self) -> Result<ReplayReport, SyncError> {
        self.core.replay().await
    }

    /// Handles a network-available edge
    ///
    /// With pending items, probes the server: replays now if it answers,
    /// otherwise arms the periodic server check.
    #[tracing::instrument(skip(self))]
    pub async fn on_network_available(&self) {
        self.core.on_network_available().await;
    }

    /// Handles a network-lost edge by disarming the periodic server check
    pub fn on_network_lost(&self) {
        info!("Network lost");
        self.core.server_check.disarm();
    }

    /// Reacts to connectivity changes until `cancel` fires, then shuts down
    ///
    /// An initially available network is treated as an available edge.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut rx = self.core.connectivity.subscribe();
        info!("Sync engine running");

        if *rx.borrow_and_update() {
            self.on_network_available().await;
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let available = *rx.borrow_and_update();
                    if available {
                        self.on_network_available().await;
                    } else {
                        self.on_network_lost();
                    }
                }
            }
        }

        self.shutdown().await;
    }

    /// Stops the periodic check and waits for in-flight remote work
    pub async fn shutdown(&self) {
        info!("Sync engine shutting down");
        self.core.server_check.shutdown();
        self.core.lanes.close();
        self.core.lanes.wait().await;
        info!("Sync engine stopped");
    }
}

// ============================================================================
// EngineCore: reads
// ============================================================================

impl EngineCore {
    async fn get_tags(&self) -> Result<TagSet, SyncError> {
        let user = {
            let st = self.state.lock().await;
            if let Some(tags) = &st.tags {
                return Ok(tags.clone());
            }
            st.user.clone()
        };

        if let Some(tags) = load_tags_snapshot(self.store.as_ref()).await? {
            debug!("Loaded tags from local snapshot");
            return Ok(self.install_tags(tags, false).await);
        }

        let user = user.ok_or_else(|| {
            SyncError::Configuration("no user id is known; sign in first".into())
        })?;
        let tags = self.remote.fetch_tags(&user).await?;
        info!(
            number_of_tags = tags.number_of_tags(),
            "Fetched tags from server"
        );
        Ok(self.install_tags(tags, true).await)
    }

    /// Installs a loaded tag set unless another load won the race
    async fn install_tags(&self, tags: TagSet, persist: bool) -> TagSet {
        let mut st = self.state.lock().await;
        if let Some(existing) = &st.tags {
            return existing.clone();
        }
        st.tags = Some(tags.clone());
        if persist {
            if let Err(e) = self.persist_tags(&st).await {
                error!(error = %e, "Failed to persist fetched tags");
            }
        }
        self.publish_tags(&st);
        tags
    }

    async fn get_photos(&self) -> Result<PhotoMap, SyncError> {
        let names = {
            let st = self.state.lock().await;
            let tags = st.tags.as_ref().ok_or(SyncError::TagsNotLoaded)?;
            tags.live_file_names()
                .into_iter()
                .filter(|name| !st.photos.contains_key(name))
                .collect::<Vec<_>>()
        };

        let mut found = Vec::new();
        let mut missing = Vec::new();
        for name in names {
            match load_photo(self.store.as_ref(), &name).await? {
                Some(photo) => found.push((name, photo)),
                None => missing.push(name),
            }
        }

        let mut downloaded = Vec::new();
        if !missing.is_empty() && self.connectivity.is_available() {
            debug!(count = missing.len(), "Downloading missing photos");
            let mut downloads = JoinSet::new();
            for name in missing {
                let remote = Arc::clone(&self.remote);
                downloads.spawn(async move {
                    let result = remote.download_photo(&name).await;
                    (name, result)
                });
            }
            while let Some(joined) = downloads.join_next().await {
                match joined {
                    Ok((name, Ok(photo))) => downloaded.push((name, photo)),
                    Ok((name, Err(e))) => {
                        warn!(file_name = %name, error = %e, "Photo download failed")
                    }
                    Err(e) => warn!(error = %e, "Photo download task failed"),
                }
            }
        } else if !missing.is_empty() {
            debug!(
                count = missing.len(),
                "Network unavailable, skipping photo downloads"
            );
        }

        let mut st = self.state.lock().await;
        for (name, photo) in &downloaded {
            self.store.put(name, photo.as_str().as_bytes()).await?;
        }
        let photos = Arc::make_mut(&mut st.photos);
        for (name, photo) in found.into_iter().chain(downloaded) {
            photos.entry(name).or_insert(photo);
        }
        self.publish_photos(&st);
        Ok(st.photos.clone())
    }
}

// ============================================================================
// EngineCore: mutations
// ============================================================================

impl EngineCore {
    async fn publish(
        self: &Arc<Self>,
        photo: PhotoPayload,
        description: String,
        location: String,
        people: String,
    ) -> Result<MutationHandle, SyncError> {
        let mut st = self.state.lock().await;
        let user = st.require_user()?;
        let tags = st.tags.as_ref().ok_or(SyncError::TagsNotLoaded)?;
        let slot = tags.find_empty_slot(&st.reserved);
        let insert = slot >= tags.number_of_tags();
        let file_name = user.file_name_for(slot);

        let previous = self.write_photo(&mut st, &file_name, photo.clone()).await?;
        st.reserved.insert(slot);
        drop(st);

        info!(slot, file_name = %file_name, insert, "Publishing post");

        let job = MutationJob {
            entry: TagEntry {
                description,
                photo: file_name.clone(),
                location,
                people,
            },
            user,
            slot,
            file_name,
            photo: Some(photo),
            previous,
            insert,
            reserved: true,
            queued_op: if insert {
                SyncOperation::New
            } else {
                SyncOperation::Update
            },
            failure_notice: UPLOAD_FAILED,
        };
        self.submit_mutation(job).await
    }

    async fn update(
        self: &Arc<Self>,
        slot: usize,
        description: String,
        change: PhotoChange,
        location: String,
        people: String,
    ) -> Result<MutationHandle, SyncError> {
        let mut st = self.state.lock().await;
        let user = st.require_user()?;
        let tags = st.tags.as_ref().ok_or(SyncError::TagsNotLoaded)?;
        let current = tags.require_entry(slot)?;
        let file_name = user.file_name_for(slot);

        let (photo_field, photo, queued_op) = match change {
            PhotoChange::Keep => (current.photo, None, SyncOperation::UpdateTagsOrDelete),
            PhotoChange::Delete => (
                DELETED_PHOTO.to_string(),
                None,
                SyncOperation::UpdateTagsOrDelete,
            ),
            PhotoChange::Replace(photo) => (file_name.clone(), Some(photo), SyncOperation::Update),
        };

        let previous = match &photo {
            Some(photo) => self.write_photo(&mut st, &file_name, photo.clone()).await?,
            None => None,
        };
        drop(st);

        info!(slot, operation = %queued_op, "Updating post");

        let job = MutationJob {
            user,
            slot,
            file_name,
            entry: TagEntry {
                description,
                photo: photo_field,
                location,
                people,
            },
            photo,
            previous,
            insert: false,
            reserved: false,
            queued_op,
            failure_notice: CHANGE_FAILED,
        };
        self.submit_mutation(job).await
    }

    /// Hands the remote step to the slot's lane
    async fn submit_mutation(self: &Arc<Self>, job: MutationJob) -> Result<MutationHandle, SyncError> {
        let slot = job.slot;
        let (tx, rx) = oneshot::channel();
        let core = Arc::clone(self);
        let undo = (job.photo.clone(), job.previous.clone(), job.file_name.clone(), job.reserved);

        let submitted = self.lanes.submit(slot, async move {
            let outcome = core.run_mutation(job).await;
            let _ = tx.send(outcome);
        });

        if let Err(e) = submitted {
            let (photo, previous, file_name, reserved) = undo;
            let mut st = self.state.lock().await;
            if reserved {
                st.reserved.remove(&slot);
            }
            if let Some(photo) = photo {
                self.rollback_photo(&mut st, &file_name, &photo, previous)
                    .await?;
            }
            return Err(e);
        }

        Ok(MutationHandle { slot, rx })
    }

    /// Remote step: upload, then insert or update the tag
    async fn run_mutation(&self, job: MutationJob) -> MutationOutcome {
        let mut outcome = RemoteOutcome::Success;

        if let Some(photo) = &job.photo {
            let result = self
                .remote
                .upload_photo(&job.user, job.slot, &job.file_name, photo)
                .await;
            outcome = RemoteOutcome::classify(&result);
        }

        if !matches!(outcome, RemoteOutcome::Hard(_)) {
            let result = if job.insert {
                self.remote
                    .insert_new_tag(&job.user, job.slot, &job.entry)
                    .await
            } else {
                self.remote.update_tag(&job.user, job.slot, &job.entry).await
            };
            outcome = outcome.then(RemoteOutcome::classify(&result));
        }

        let status = self.settle_mutation(&job, outcome).await;
        MutationOutcome {
            slot: job.slot,
            status,
        }
    }

    /// Applies, queues or rolls back according to the remote outcome
    async fn settle_mutation(&self, job: &MutationJob, outcome: RemoteOutcome) -> MutationStatus {
        let mut st = self.state.lock().await;
        if job.reserved {
            st.reserved.remove(&job.slot);
        }

        let status = match outcome {
            RemoteOutcome::Success => {
                self.apply_tag(&mut st, job.slot, job.entry.clone()).await;
                MutationStatus::Synced
            }
            RemoteOutcome::Connectivity => {
                self.apply_tag(&mut st, job.slot, job.entry.clone()).await;
                self.enqueue(&mut st, SyncItem::new(job.slot, job.queued_op))
                    .await;
                MutationStatus::Queued(job.queued_op)
            }
            RemoteOutcome::Hard(reason) => {
                if let Some(photo) = &job.photo {
                    if let Err(e) = self
                        .rollback_photo(&mut st, &job.file_name, photo, job.previous.clone())
                        .await
                    {
                        error!(slot = job.slot, error = %e, "Failed to roll back photo");
                    }
                }
                MutationStatus::RolledBack(reason)
            }
        };
        drop(st);

        match &status {
            MutationStatus::Synced => info!(slot = job.slot, "Post synced"),
            MutationStatus::Queued(operation) => {
                info!(slot = job.slot, operation = %operation, "Server unreachable, post queued")
            }
            MutationStatus::RolledBack(reason) => {
                warn!(slot = job.slot, reason = %reason, "Server refused post, rolled back");
                let notice = Notification::error(job.failure_notice, reason.clone());
                if let Err(e) = self.notifier.notify(&notice).await {
                    warn!(error = %e, "Failed to deliver notification");
                }
            }
        }
        status
    }
}

// ============================================================================
// EngineCore: replay and scheduling
// ============================================================================

impl EngineCore {
    async fn replay(self: &Arc<Self>) -> Result<ReplayReport, SyncError> {
        let _cycle = self.replay_lock.lock().await;

        let snapshot = {
            let st = self.state.lock().await;
            st.require_user()?;
            let snapshot = st.queue.snapshot();
            if !snapshot.is_empty() && st.tags.is_none() {
                warn!(pending = snapshot.len(), "Tags not loaded, keeping posts queued");
                return Err(SyncError::TagsNotLoaded);
            }
            snapshot
        };

        let mut report = ReplayReport::default();
        if snapshot.is_empty() {
            debug!("There are no pending posts to replay");
            self.server_check.disarm();
            return Ok(report);
        }

        info!(pending = snapshot.len(), "Replaying pending posts");

        for item in snapshot {
            let (tx, rx) = oneshot::channel();
            let core = Arc::clone(self);
            self.lanes.submit(item.id, async move {
                let _ = tx.send(core.replay_item(item).await);
            })?;

            match rx.await.map_err(|_| SyncError::ShuttingDown)? {
                ReplayStep::Synced => report.synced += 1,
                ReplayStep::Dropped => report.dropped += 1,
                ReplayStep::Abandoned => report.abandoned += 1,
                ReplayStep::Offline => {
                    info!(slot = item.id, "Server unreachable again, stopping replay");
                    report.still_offline = true;
                    break;
                }
                ReplayStep::Halted(reason) => {
                    report.halted = Some(reason);
                    break;
                }
            }
        }

        let mut st = self.state.lock().await;
        st.last_replay = Some(Utc::now());
        report.remaining = st.queue.len();
        drop(st);
        if report.remaining == 0 {
            self.server_check.disarm();
        } else if self.connectivity.is_available() {
            // Items left behind are retried by the periodic check
            self.arm_server_check();
        }

        info!(
            synced = report.synced,
            dropped = report.dropped,
            abandoned = report.abandoned,
            remaining = report.remaining,
            "Replay finished"
        );
        Ok(report)
    }

    async fn replay_item(&self, item: SyncItem) -> ReplayStep {
        let (user, entry) = {
            let st = self.state.lock().await;
            let Some(user) = st.user.clone() else {
                return ReplayStep::Halted("no user id".into());
            };
            (user, st.tags.as_ref().map(|tags| tags.entry(item.id)))
        };

        let Some(entry) = entry else {
            return ReplayStep::Halted("tags not loaded".into());
        };
        let Some(entry) = entry else {
            warn!(slot = item.id, "Queued slot no longer exists, dropping");
            self.forget(&item, None).await;
            return ReplayStep::Dropped;
        };

        debug!(slot = item.id, operation = %item.operation, "Replaying item");

        let result = if item.operation.uploads_photo() {
            let photo = match self.cached_photo(&entry.photo).await {
                Ok(Some(photo)) => photo,
                Ok(None) => {
                    warn!(
                        slot = item.id,
                        file_name = %entry.photo,
                        "No cached photo for queued post, dropping"
                    );
                    self.forget(&item, None).await;
                    return ReplayStep::Dropped;
                }
                Err(e) => {
                    error!(slot = item.id, error = %e, "Failed to read cached photo");
                    return ReplayStep::Halted(e.to_string());
                }
            };

            let upload = self
                .remote
                .upload_photo(&user, item.id, &entry.photo, &photo)
                .await;
            match RemoteOutcome::classify(&upload) {
                RemoteOutcome::Success => {}
                RemoteOutcome::Connectivity => return ReplayStep::Offline,
                RemoteOutcome::Hard(reason) => return self.abandon(&item, &entry, reason).await,
            }

            match item.operation {
                SyncOperation::New => self.remote.insert_new_tag(&user, item.id, &entry).await,
                _ => self.remote.update_tag(&user, item.id, &entry).await,
            }
        } else {
            self.remote.update_tag(&user, item.id, &entry).await
        };

        match RemoteOutcome::classify(&result) {
            RemoteOutcome::Success => {
                self.forget(&item, None).await;
                debug!(slot = item.id, "Queued post synced");
                ReplayStep::Synced
            }
            RemoteOutcome::Connectivity => ReplayStep::Offline,
            RemoteOutcome::Hard(reason) => self.abandon(&item, &entry, reason).await,
        }
    }

    /// Drops an item the server refused, along with its cached photo
    async fn abandon(&self, item: &SyncItem, entry: &TagEntry, reason: String) -> ReplayStep {
        warn!(
            slot = item.id,
            operation = %item.operation,
            reason = %reason,
            "Server refused queued post, abandoning"
        );
        self.forget(item, Some(&entry.photo)).await;
        ReplayStep::Abandoned
    }

    /// Removes an item from the queue, optionally removing a cached photo
    async fn forget(&self, item: &SyncItem, photo: Option<&str>) {
        let mut st = self.state.lock().await;
        st.queue.remove_first(item);
        if let Err(e) = st.queue.save(self.store.as_ref()).await {
            error!(error = %e, "Failed to persist pending queue");
        }
        if let Some(name) = photo.filter(|name| *name != DELETED_PHOTO) {
            if let Err(e) = self.remove_photo(&mut st, name).await {
                error!(file_name = %name, error = %e, "Failed to remove cached photo");
            }
        }
    }

    async fn on_network_available(self: &Arc<Self>) {
        info!("Network available");
        if self.state.lock().await.queue.is_empty() {
            return;
        }

        if self.remote.is_server_reachable().await {
            if let Err(e) = self.replay_with_tags().await {
                warn!(error = %e, "Replay after network return failed");
                self.arm_server_check();
            }
        } else {
            debug!("Server not reachable yet, arming periodic check");
            self.arm_server_check();
        }
    }

    fn arm_server_check(&self) {
        let engine = self.self_ref.clone();
        self.server_check.arm(move || {
            let engine = engine.clone();
            async move {
                let Some(core) = engine.upgrade() else {
                    return ControlFlow::Break(());
                };
                core.server_check_tick().await;
                ControlFlow::Continue(())
            }
        });
    }

    async fn server_check_tick(self: &Arc<Self>) {
        if self.state.lock().await.queue.is_empty() {
            self.server_check.disarm();
            return;
        }
        if !self.connectivity.is_available() {
            debug!("Network unavailable, skipping server check");
            return;
        }
        if !self.remote.is_server_reachable().await {
            debug!("Server still unreachable");
            return;
        }
        if let Err(e) = self.replay_with_tags().await {
            warn!(error = %e, "Periodic replay failed");
        }
    }

    /// Loads the tag set if needed, then replays
    async fn replay_with_tags(self: &Arc<Self>) -> Result<ReplayReport, SyncError> {
        self.get_tags().await?;
        self.replay().await
    }
}

// ============================================================================
// EngineCore: state helpers (caller holds the state lock)
// ============================================================================

impl EngineCore {
    fn publish_tags(&self, st: &EngineState) {
        self.tags_tx.send_replace(st.tags.clone());
    }

    fn publish_photos(&self, st: &EngineState) {
        self.photos_tx.send_replace(st.photos.clone());
    }

    async fn persist_tags(&self, st: &EngineState) -> anyhow::Result<()> {
        if let Some(tags) = &st.tags {
            self.store.put(keys::TAGS, &tags.to_json()?).await?;
        }
        Ok(())
    }

    /// Writes `entry` into `slot`, persists and publishes the tag set
    async fn apply_tag(&self, st: &mut EngineState, slot: usize, entry: TagEntry) {
        let Some(tags) = st.tags.as_mut() else {
            warn!(slot, "Tags unloaded while a mutation was in flight");
            return;
        };
        tags.apply(slot, entry);
        if let Err(e) = self.persist_tags(st).await {
            error!(slot, error = %e, "Failed to persist tags");
        }
        self.publish_tags(st);
    }

    /// Appends to the queue, persists it and arms the server check
    async fn enqueue(&self, st: &mut EngineState, item: SyncItem) {
        st.queue.push(item);
        if let Err(e) = st.queue.save(self.store.as_ref()).await {
            error!(slot = item.id, error = %e, "Failed to persist pending queue");
        }
        info!(
            slot = item.id,
            operation = %item.operation,
            pending = st.queue.len(),
            "Post added to pending queue"
        );
        if self.connectivity.is_available() {
            self.arm_server_check();
        }
    }

    /// Caches a photo locally, returning the entry it replaced
    async fn write_photo(
        &self,
        st: &mut EngineState,
        file_name: &str,
        photo: PhotoPayload,
    ) -> anyhow::Result<Option<PhotoPayload>> {
        self.store
            .put(file_name, photo.as_str().as_bytes())
            .await?;
        let previous = Arc::make_mut(&mut st.photos).insert(file_name.to_string(), photo);
        self.publish_photos(st);
        Ok(previous)
    }

    /// Undoes an optimistic photo write
    ///
    /// Skipped when a later write to the same filename has superseded it.
    async fn rollback_photo(
        &self,
        st: &mut EngineState,
        file_name: &str,
        written: &PhotoPayload,
        previous: Option<PhotoPayload>,
    ) -> anyhow::Result<()> {
        if st.photos.get(file_name) != Some(written) {
            debug!(file_name, "Photo superseded, skipping rollback");
            return Ok(());
        }
        match previous {
            Some(photo) => {
                self.store
                    .put(file_name, photo.as_str().as_bytes())
                    .await?;
                Arc::make_mut(&mut st.photos).insert(file_name.to_string(), photo);
            }
            None => {
                self.store.delete(file_name).await?;
                Arc::make_mut(&mut st.photos).remove(file_name);
            }
        }
        self.publish_photos(st);
        Ok(())
    }

    async fn remove_photo(&self, st: &mut EngineState, file_name: &str) -> anyhow::Result<()> {
        self.store.delete(file_name).await?;
        if Arc::make_mut(&mut st.photos).remove(file_name).is_some() {
            self.publish_photos(st);
        }
        Ok(())
    }

    /// Looks a photo up in memory, then in the local store
    async fn cached_photo(&self, file_name: &str) -> anyhow::Result<Option<PhotoPayload>> {
        if let Some(photo) = self.state.lock().await.photos.get(file_name) {
            return Ok(Some(photo.clone()));
        }
        load_photo(self.store.as_ref(), file_name).await
    }
}

// ============================================================================
// Store loading
// ============================================================================

async fn load_user_id(store: &dyn ILocalStore) -> anyhow::Result<Option<UserId>> {
    let Some(bytes) = store.get(keys::USER_ID).await? else {
        return Ok(None);
    };
    let user = String::from_utf8(bytes)
        .ok()
        .and_then(|raw| UserId::new(raw).ok());
    if user.is_none() {
        warn!("Ignoring unreadable stored user id");
    }
    Ok(user)
}

async fn load_tags_snapshot(store: &dyn ILocalStore) -> anyhow::Result<Option<TagSet>> {
    let Some(bytes) = store.get(keys::TAGS).await? else {
        return Ok(None);
    };
    match TagSet::from_json(&bytes) {
        Ok(tags) => Ok(Some(tags)),
        Err(e) => {
            warn!(error = %e, "Ignoring unreadable tags snapshot");
            Ok(None)
        }
    }
}

async fn load_photo(store: &dyn ILocalStore, file_name: &str) -> anyhow::Result<Option<PhotoPayload>> {
    let Some(bytes) = store.get(file_name).await? else {
        return Ok(None);
    };
    let photo = String::from_utf8(bytes)
        .ok()
        .and_then(|raw| PhotoPayload::new(raw).ok());
    if photo.is_none() {
        warn!(file_name, "Ignoring unreadable cached photo");
    }
    Ok(photo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_photo_change_from_wire() {
        assert_eq!(PhotoChange::from_wire("").unwrap(), PhotoChange::Keep);
        assert_eq!(PhotoChange::from_wire("na").unwrap(), PhotoChange::Delete);
        assert!(matches!(
            PhotoChange::from_wire("aGVsbG8=").unwrap(),
            PhotoChange::Replace(_)
        ));
    }

    #[test]
    fn test_mutation_outcome_json() {
        let outcome = MutationOutcome {
            slot: 2,
            status: MutationStatus::Queued(SyncOperation::New),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"slot": 2, "status": "queued", "detail": "NEW"})
        );
    }

    #[test]
    fn test_engine_options_from_config() {
        let config = phototag_core::config::ConfigBuilder::new()
            .account_user_id("u1_")
            .sync_server_check_interval_secs(3)
            .build();
        let options = EngineOptions::from_config(&config).unwrap();
        assert_eq!(options.user_id.unwrap().as_str(), "u1_");
        assert_eq!(options.server_check_interval, Duration::from_secs(3));
    }

    #[test]
    fn test_report_is_empty() {
        assert!(ReplayReport::default().is_empty());
        let report = ReplayReport {
            dropped: 1,
            ..Default::default()
        };
        assert!(!report.is_empty());
    }
}
