//! Notification center.
//!
//! A single task owns the `NotificationFeed`. It follows the session: when
//! a ready session with a token and a known user id appears it fetches the
//! list once and subscribes to the push channel for that user; when the
//! user or token changes, or the session is cleared, the old subscription
//! is dropped and the list emptied. Not-ready sessions published while a
//! restore runs are ignored. User actions reach the task as commands and
//! are mirrored to the backend before the local list changes.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::feed::{NotificationFeed, NotificationRecord};
use super::push::{PushChannel, PushSubscription};
use crate::api::NotificationApi;
use crate::auth::{AuthError, Session};

const COMMAND_BUFFER: usize = 16;

/// What observers see after every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedSnapshot {
    /// User the feed is active for, if any.
    pub user_id: Option<String>,
    /// Records, newest first.
    pub records: Vec<NotificationRecord>,
    /// Number of unread records.
    pub unread: usize,
    /// The backend rejected the session token; the owner should log out.
    pub auth_rejected: bool,
}

impl FeedSnapshot {
    pub fn is_active(&self) -> bool {
        self.user_id.is_some()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Notifications are unavailable until you log in")]
    Inactive,

    #[error("Notification not found: {0}")]
    NotFound(String),

    #[error("Notification center has shut down")]
    Closed,

    #[error(transparent)]
    Api(#[from] AuthError),
}

impl FeedError {
    pub fn is_authorization(&self) -> bool {
        matches!(self, FeedError::Api(e) if e.is_authorization())
    }
}

type Reply = oneshot::Sender<Result<(), FeedError>>;

enum FeedCommand {
    MarkRead { id: String, reply: Reply },
    MarkAllRead { reply: Reply },
    Delete { id: String, reply: Reply },
    ClearAll { reply: Reply },
    Refresh { reply: Reply },
}

/// Handle to the notification task.
pub struct NotificationCenter {
    commands: mpsc::Sender<FeedCommand>,
    snapshot: watch::Receiver<FeedSnapshot>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl NotificationCenter {
    /// Spawns the notification task following `session`.
    pub fn spawn(
        session: watch::Receiver<Session>,
        api: Arc<dyn NotificationApi>,
        push: Arc<dyn PushChannel>,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(FeedSnapshot::default());
        let shutdown = CancellationToken::new();

        let worker = Worker {
            api,
            push,
            feed: NotificationFeed::new(),
            active: None,
            subscription: None,
            auth_rejected: false,
            snapshot: snapshot_tx,
        };
        let task = tokio::spawn(worker.run(session, commands_rx, shutdown.clone()));

        Self {
            commands: commands_tx,
            snapshot: snapshot_rx,
            shutdown,
            task,
        }
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.snapshot.clone()
    }

    pub async fn mark_as_read(&self, id: &str) -> Result<(), FeedError> {
        let id = id.to_string();
        self.request(|reply| FeedCommand::MarkRead { id, reply })
            .await
    }

    pub async fn mark_all_as_read(&self) -> Result<(), FeedError> {
        self.request(|reply| FeedCommand::MarkAllRead { reply })
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), FeedError> {
        let id = id.to_string();
        self.request(|reply| FeedCommand::Delete { id, reply }).await
    }

    pub async fn clear_all(&self) -> Result<(), FeedError> {
        self.request(|reply| FeedCommand::ClearAll { reply }).await
    }

    /// Refetches the list from the backend.
    pub async fn refresh(&self) -> Result<(), FeedError> {
        self.request(|reply| FeedCommand::Refresh { reply }).await
    }

    async fn request(&self, build: impl FnOnce(Reply) -> FeedCommand) -> Result<(), FeedError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| FeedError::Closed)?;
        response.await.map_err(|_| FeedError::Closed)?
    }

    /// Stops the task and drops any live subscription.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!("Notification task ended abnormally: {e}");
        }
    }
}

/// User and token the feed is currently active for.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveUser {
    user_id: String,
    token: String,
}

impl ActiveUser {
    fn from_session(session: &Session) -> Option<Self> {
        if !session.ready {
            return None;
        }
        Some(Self {
            user_id: session.user_id()?,
            token: session.token.clone()?,
        })
    }
}

struct Worker {
    api: Arc<dyn NotificationApi>,
    push: Arc<dyn PushChannel>,
    feed: NotificationFeed,
    active: Option<ActiveUser>,
    subscription: Option<PushSubscription>,
    auth_rejected: bool,
    snapshot: watch::Sender<FeedSnapshot>,
}

impl Worker {
    async fn run(
        mut self,
        mut session: watch::Receiver<Session>,
        mut commands: mpsc::Receiver<FeedCommand>,
        shutdown: CancellationToken,
    ) {
        let current = session.borrow_and_update().clone();
        self.reconcile(&current).await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = session.changed() => {
                    if changed.is_err() {
                        tracing::debug!("Session store dropped, stopping notification task");
                        break;
                    }
                    let current = session.borrow_and_update().clone();
                    self.reconcile(&current).await;
                }
                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                pushed = next_push(&mut self.subscription) => match pushed {
                    Some(record) => {
                        tracing::debug!(id = %record.id, "Received pushed notification");
                        if self.feed.push(record) {
                            self.publish();
                        }
                    }
                    None => {
                        tracing::warn!("Push channel closed; notifications will update on refresh");
                        self.subscription = None;
                    }
                },
            }
        }

        self.subscription = None;
        tracing::debug!("Notification task stopped");
    }

    /// Activates, switches or deactivates the feed to match the session.
    ///
    /// A session that is still restoring leaves the feed as it is; only the
    /// ready session at the end of the cycle can switch users.
    async fn reconcile(&mut self, session: &Session) {
        if !session.ready {
            return;
        }
        let next = ActiveUser::from_session(session);
        if next == self.active {
            return;
        }

        if let Some(previous) = &self.active {
            tracing::debug!(user_id = %previous.user_id, "Deactivating notification feed");
        }
        self.subscription = None;
        self.feed.clear();
        self.auth_rejected = false;
        self.active = next.clone();

        if let Some(active) = next {
            tracing::info!(user_id = %active.user_id, "Activating notification feed");
            match self.api.list_notifications(&active.token).await {
                Ok(records) => self.feed.replace(records),
                Err(e) if e.is_authorization() => {
                    tracing::warn!("Notification fetch rejected: {e}");
                    self.auth_rejected = true;
                    self.publish();
                    return;
                }
                Err(e) => tracing::warn!("Failed to fetch notifications: {e}"),
            }

            match self.push.subscribe(&active.user_id).await {
                Ok(subscription) => self.subscription = Some(subscription),
                Err(e) => tracing::warn!("Push subscription failed: {e:#}"),
            }
        }

        self.publish();
    }

    async fn handle(&mut self, command: FeedCommand) {
        match command {
            FeedCommand::MarkRead { id, reply } => {
                let result = self.mark_read(&id).await;
                let _ = reply.send(result);
            }
            FeedCommand::MarkAllRead { reply } => {
                let result = self.mark_all_read().await;
                let _ = reply.send(result);
            }
            FeedCommand::Delete { id, reply } => {
                let result = self.delete(&id).await;
                let _ = reply.send(result);
            }
            FeedCommand::ClearAll { reply } => {
                let result = self.clear_all().await;
                let _ = reply.send(result);
            }
            FeedCommand::Refresh { reply } => {
                let result = self.refresh().await;
                let _ = reply.send(result);
            }
        }
    }

    fn token(&self) -> Result<String, FeedError> {
        self.active
            .as_ref()
            .map(|a| a.token.clone())
            .ok_or(FeedError::Inactive)
    }

    /// Records an authorization failure before handing the error back.
    fn api_error(&mut self, error: AuthError) -> FeedError {
        if error.is_authorization() {
            self.auth_rejected = true;
            self.publish();
        }
        FeedError::Api(error)
    }

    async fn mark_read(&mut self, id: &str) -> Result<(), FeedError> {
        let token = self.token()?;
        let record = self
            .feed
            .get(id)
            .ok_or_else(|| FeedError::NotFound(id.to_string()))?;
        if record.is_read {
            return Ok(());
        }

        if let Err(e) = self.api.mark_notification_read(&token, id).await {
            return Err(self.api_error(e));
        }
        self.feed.mark_as_read(id);
        self.publish();
        Ok(())
    }

    async fn mark_all_read(&mut self) -> Result<(), FeedError> {
        let token = self.token()?;
        if let Err(e) = self.api.mark_all_notifications_read(&token).await {
            return Err(self.api_error(e));
        }
        self.feed.mark_all_as_read();
        self.publish();
        Ok(())
    }

    async fn delete(&mut self, id: &str) -> Result<(), FeedError> {
        let token = self.token()?;
        if self.feed.get(id).is_none() {
            return Err(FeedError::NotFound(id.to_string()));
        }

        if let Err(e) = self.api.delete_notification(&token, id).await {
            return Err(self.api_error(e));
        }
        self.feed.delete(id);
        self.publish();
        Ok(())
    }

    async fn clear_all(&mut self) -> Result<(), FeedError> {
        let token = self.token()?;
        if let Err(e) = self.api.clear_notifications(&token).await {
            return Err(self.api_error(e));
        }
        self.feed.clear();
        self.publish();
        Ok(())
    }

    async fn refresh(&mut self) -> Result<(), FeedError> {
        let token = self.token()?;
        match self.api.list_notifications(&token).await {
            Ok(records) => {
                self.feed.replace(records);
                self.publish();
                Ok(())
            }
            Err(e) => Err(self.api_error(e)),
        }
    }

    fn publish(&self) {
        self.snapshot.send_replace(FeedSnapshot {
            user_id: self.active.as_ref().map(|a| a.user_id.clone()),
            records: self.feed.records().to_vec(),
            unread: self.feed.unread_count(),
            auth_rejected: self.auth_rejected,
        });
    }
}

/// Waits for the next pushed record; pends forever without a subscription.
async fn next_push(subscription: &mut Option<PushSubscription>) -> Option<NotificationRecord> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Profile, Role};
    use crate::notifications::push::PushHub;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeApi {
        initial: Vec<NotificationRecord>,
        calls: Mutex<Vec<String>>,
        reject: bool,
        /// Fail every write with a server error; listing still works.
        writes_fail: bool,
    }

    impl FakeApi {
        fn with(initial: Vec<NotificationRecord>) -> Arc<Self> {
            Arc::new(Self {
                initial,
                ..Self::default()
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) -> Result<(), AuthError> {
            let is_write = !call.starts_with("list:");
            self.calls.lock().unwrap().push(call);
            if self.reject {
                Err(AuthError::Unauthorized { status: 401 })
            } else if self.writes_fail && is_write {
                Err(AuthError::ServerError {
                    status: 500,
                    message: "database unavailable".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl NotificationApi for FakeApi {
        async fn list_notifications(
            &self,
            token: &str,
        ) -> Result<Vec<NotificationRecord>, AuthError> {
            self.record(format!("list:{token}"))?;
            Ok(self.initial.clone())
        }

        async fn mark_notification_read(&self, _token: &str, id: &str) -> Result<(), AuthError> {
            self.record(format!("read:{id}"))
        }

        async fn mark_all_notifications_read(&self, _token: &str) -> Result<(), AuthError> {
            self.record("read-all".to_string())
        }

        async fn delete_notification(&self, _token: &str, id: &str) -> Result<(), AuthError> {
            self.record(format!("delete:{id}"))
        }

        async fn clear_notifications(&self, _token: &str) -> Result<(), AuthError> {
            self.record("clear".to_string())
        }
    }

    fn session(user_id: &str, token: &str) -> Session {
        Session {
            token: Some(token.to_string()),
            role: Some(Role::User),
            profile: Some(Profile {
                id: user_id.to_string(),
                role: Some(Role::User),
                ..Profile::default()
            }),
            ready: true,
        }
    }

    async fn wait_for(
        rx: &mut watch::Receiver<FeedSnapshot>,
        predicate: impl FnMut(&FeedSnapshot) -> bool,
    ) -> FeedSnapshot {
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(predicate))
            .await
            .expect("timed out waiting for snapshot")
            .expect("center stopped")
            .clone()
    }

    async fn wait_for_subscriber(hub: &PushHub, user_id: &str) {
        for _ in 0..200 {
            if hub.subscriber_count(user_id) > 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("no subscriber for {user_id}");
    }

    #[tokio::test]
    async fn test_inactive_without_session() {
        let (_tx, rx) = watch::channel(Session::cleared());
        let center = NotificationCenter::spawn(rx, FakeApi::with(vec![]), Arc::new(PushHub::new()));

        let err = center.mark_as_read("n1").await.unwrap_err();
        assert!(matches!(err, FeedError::Inactive));
        assert!(!center.snapshot().is_active());
        center.shutdown().await;
    }

    #[tokio::test]
    async fn test_activation_fetches_and_counts() {
        let api = FakeApi::with(vec![
            NotificationRecord::new("a", "one"),
            NotificationRecord {
                is_read: true,
                ..NotificationRecord::new("b", "two")
            },
        ]);
        let (_tx, rx) = watch::channel(session("u1", "tok"));
        let center = NotificationCenter::spawn(rx, api.clone(), Arc::new(PushHub::new()));

        let mut snapshots = center.subscribe();
        let snapshot = wait_for(&mut snapshots, |s| s.is_active()).await;
        assert_eq!(snapshot.records.len(), 2);
        assert_eq!(snapshot.unread, 1);
        assert_eq!(api.calls(), vec!["list:tok".to_string()]);
        center.shutdown().await;
    }

    #[tokio::test]
    async fn test_push_then_mark_read() {
        let hub = Arc::new(PushHub::new());
        let (_tx, rx) = watch::channel(session("u1", "tok"));
        let api = FakeApi::with(vec![]);
        let center = NotificationCenter::spawn(rx, api.clone(), hub.clone());
        let mut snapshots = center.subscribe();
        wait_for(&mut snapshots, |s| s.is_active()).await;
        wait_for_subscriber(&hub, "u1").await;

        hub.publish("u1", NotificationRecord::new("n1", "New applicant"));
        let snapshot = wait_for(&mut snapshots, |s| s.records.len() == 1).await;
        assert_eq!(snapshot.records[0].id, "n1");
        assert_eq!(snapshot.unread, 1);

        center.mark_as_read("n1").await.unwrap();
        let snapshot = center.snapshot();
        assert!(snapshot.records[0].is_read);
        assert_eq!(snapshot.unread, 0);
        assert!(api.calls().contains(&"read:n1".to_string()));
        center.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let (_tx, rx) = watch::channel(session("u1", "tok"));
        let center = NotificationCenter::spawn(rx, FakeApi::with(vec![]), Arc::new(PushHub::new()));
        let mut snapshots = center.subscribe();
        wait_for(&mut snapshots, |s| s.is_active()).await;

        assert!(matches!(
            center.delete("ghost").await,
            Err(FeedError::NotFound(_))
        ));
        center.shutdown().await;
    }

    #[tokio::test]
    async fn test_refresh_replaces_local_state() {
        let hub = Arc::new(PushHub::new());
        let api = FakeApi::with(vec![NotificationRecord::new("a", "one")]);
        let (_tx, rx) = watch::channel(session("u1", "tok"));
        let center = NotificationCenter::spawn(rx, api.clone(), hub.clone());
        let mut snapshots = center.subscribe();
        wait_for(&mut snapshots, |s| s.is_active()).await;
        wait_for_subscriber(&hub, "u1").await;

        hub.publish("u1", NotificationRecord::new("p1", "pushed only"));
        wait_for(&mut snapshots, |s| s.records.len() == 2).await;

        center.refresh().await.unwrap();
        let snapshot = center.snapshot();
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(snapshot.records[0].id, "a");
        assert_eq!(snapshot.unread, 1);
        assert_eq!(api.calls().iter().filter(|c| *c == "list:tok").count(), 2);
        center.shutdown().await;
    }

    #[tokio::test]
    async fn test_logout_tears_down_feed() {
        let hub = Arc::new(PushHub::new());
        let api = FakeApi::with(vec![NotificationRecord::new("a", "one")]);
        let (tx, rx) = watch::channel(session("u1", "tok"));
        let center = NotificationCenter::spawn(rx, api, hub.clone());
        let mut snapshots = center.subscribe();
        wait_for(&mut snapshots, |s| s.is_active()).await;
        wait_for_subscriber(&hub, "u1").await;

        tx.send_replace(Session::cleared());
        let snapshot = wait_for(&mut snapshots, |s| !s.is_active()).await;
        assert!(snapshot.records.is_empty());
        assert_eq!(snapshot.unread, 0);

        for _ in 0..200 {
            if hub.subscriber_count("u1") == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(hub.subscriber_count("u1"), 0);
        center.shutdown().await;
    }

    #[tokio::test]
    async fn test_rejected_fetch_flags_session() {
        let api = Arc::new(FakeApi {
            reject: true,
            ..FakeApi::default()
        });
        let hub = Arc::new(PushHub::new());
        let (_tx, rx) = watch::channel(session("u1", "tok"));
        let center = NotificationCenter::spawn(rx, api, hub.clone());

        let mut snapshots = center.subscribe();
        let snapshot = wait_for(&mut snapshots, |s| s.auth_rejected).await;
        assert!(snapshot.records.is_empty());
        assert_eq!(hub.subscriber_count("u1"), 0);
        center.shutdown().await;
    }

    #[tokio::test]
    async fn test_server_error_leaves_feed_unchanged() {
        let api = Arc::new(FakeApi {
            initial: vec![
                NotificationRecord::new("a", "one"),
                NotificationRecord::new("b", "two"),
            ],
            writes_fail: true,
            ..FakeApi::default()
        });
        let (_tx, rx) = watch::channel(session("u1", "tok"));
        let center = NotificationCenter::spawn(rx, api.clone(), Arc::new(PushHub::new()));
        let mut snapshots = center.subscribe();
        let before = wait_for(&mut snapshots, |s| s.is_active()).await;

        let err = center.mark_as_read("a").await.unwrap_err();
        assert!(matches!(err, FeedError::Api(AuthError::ServerError { status: 500, .. })));
        assert!(!err.is_authorization());

        let err = center.delete("b").await.unwrap_err();
        assert!(matches!(err, FeedError::Api(AuthError::ServerError { .. })));

        let after = center.snapshot();
        assert_eq!(after.records, before.records);
        assert_eq!(after.unread, 2);
        assert!(!after.auth_rejected);
        assert_eq!(
            api.calls(),
            vec!["list:tok".to_string(), "read:a".to_string(), "delete:b".to_string()]
        );
        center.shutdown().await;
    }

    #[tokio::test]
    async fn test_restoring_same_session_keeps_subscription() {
        let hub = Arc::new(PushHub::new());
        let api = FakeApi::with(vec![NotificationRecord::new("a", "one")]);
        let (tx, rx) = watch::channel(session("u1", "tok"));
        let center = NotificationCenter::spawn(rx, api.clone(), hub.clone());
        let mut snapshots = center.subscribe();
        wait_for(&mut snapshots, |s| s.is_active()).await;
        wait_for_subscriber(&hub, "u1").await;

        // A restore cycle republishes the same credentials, first not ready
        tx.send_replace(Session {
            ready: false,
            ..session("u1", "tok")
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(hub.publish("u1", NotificationRecord::new("p1", "during restore")), 1);
        wait_for(&mut snapshots, |s| s.records.len() == 2).await;

        tx.send_replace(session("u1", "tok"));
        hub.publish("u1", NotificationRecord::new("p2", "after restore"));
        let snapshot = wait_for(&mut snapshots, |s| s.records.len() == 3).await;
        assert_eq!(snapshot.records[0].id, "p2");
        assert_eq!(snapshot.unread, 3);
        assert_eq!(api.calls(), vec!["list:tok".to_string()]);
        assert_eq!(hub.subscriber_count("u1"), 1);
        center.shutdown().await;
    }

    #[test]
    fn test_active_user_requires_ready_session_with_user() {
        assert!(ActiveUser::from_session(&Session::cleared()).is_none());

        let loading = Session {
            ready: false,
            ..session("u1", "tok")
        };
        assert!(ActiveUser::from_session(&loading).is_none());

        // Profile unavailable and the token carries no id claim
        let anonymous = Session {
            profile: None,
            ..session("u1", "opaque")
        };
        assert!(ActiveUser::from_session(&anonymous).is_none());

        let active = ActiveUser::from_session(&session("u1", "tok")).unwrap();
        assert_eq!(active.user_id, "u1");
        assert_eq!(active.token, "tok");
    }
}
